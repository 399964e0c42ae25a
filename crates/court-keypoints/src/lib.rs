//! Court landmark detection support: heatmap codec plus homography-based
//! reconciliation against a reference court.
//!
//! This crate provides:
//! - re-exports of the underlying crates (`core`, `reference`, `heatmap`)
//! - [`reconcile`]: recover occluded or out-of-frame landmarks
//! - [`pipeline`]: training-target and inference orchestration
//! - [`io`]: JSON config/dataset/report helpers and PNG glue (feature `image`)
//!
//! ## Quickstart
//!
//! ```
//! use std::sync::Arc;
//! use court_keypoints::core::{ImageBounds, Landmark, LandmarkSet};
//! use court_keypoints::pipeline::TrainingSampleBuilder;
//! use court_keypoints::reconcile::ReconcileParams;
//! use court_keypoints::reference::{CourtReferenceModel, CourtSpec};
//! use court_keypoints::heatmap::EncoderParams;
//!
//! let model = Arc::new(CourtReferenceModel::new(CourtSpec::pickleball()).unwrap());
//! let builder = TrainingSampleBuilder::new(
//!     model.clone(),
//!     EncoderParams::default(),
//!     ReconcileParams::default(),
//! );
//!
//! // Annotations in reference coordinates, with one landmark unlabeled.
//! let mut kps: LandmarkSet = model
//!     .landmark_coordinates()
//!     .iter()
//!     .map(|p| Landmark::new(p.x, p.y))
//!     .collect();
//! kps.set(9, Landmark::Missing);
//!
//! let (w, h) = model.canvas_size();
//! let sample = builder.build(&kps, ImageBounds::new(w as f64, h as f64)).unwrap();
//! assert!(sample.landmarks.get(9).is_present());
//! assert_eq!(sample.heatmaps.channels(), 15);
//! ```

pub use court_keypoints_core as core;
pub use court_keypoints_heatmap as heatmap;
pub use court_keypoints_reference as reference;

pub use court_keypoints_core::{Homography, ImageBounds, Landmark, LandmarkSet};
pub use court_keypoints_reference::{CourtReferenceModel, CourtSpec};

pub mod io;
pub mod pipeline;
pub mod reconcile;
pub mod refine;
