//! Reference court geometry.
//!
//! A [`CourtReferenceModel`] holds the canonical, top-down, distortion-free
//! pixel coordinates of every court landmark plus the named line segments
//! they belong to. It is built once from a [`CourtSpec`] and never mutated,
//! so a single instance can be shared (e.g. behind an `Arc`) by any number
//! of worker threads.
//!
//! ```
//! use court_keypoints_reference::{CourtReferenceModel, CourtSpec};
//!
//! let model = CourtReferenceModel::new(CourtSpec::pickleball()).expect("valid spec");
//! assert_eq!(model.num_landmarks(), 14);
//! assert_eq!(model.num_channels(), 15);
//! ```

mod mask;
mod model;
mod spec;

pub use mask::build_reference_mask;
pub use model::{CourtReferenceModel, ReferenceError, ReferenceLine};
pub use spec::{CourtKind, CourtSpec, PickleballDimensions, TennisDimensions};
