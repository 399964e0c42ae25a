//! Heatmap codec for court landmarks.
//!
//! Training targets are `K + 1` channel score maps at `1 / scale` of the
//! image resolution: one CenterNet-style gaussian per visible landmark and a
//! synthetic court-center channel. The decoder inverts this with
//! thresholding, local-maximum search and non-maximum suppression.
//!
//! ```
//! use court_keypoints_core::{ImageBounds, Landmark, LandmarkSet};
//! use court_keypoints_heatmap::{DecoderParams, EncoderParams, GaussianHeatmapEncoder, HeatmapDecoder};
//!
//! let mut kps = LandmarkSet::missing(4);
//! kps.set(2, Landmark::new(320.0, 180.0));
//!
//! let encoder = GaussianHeatmapEncoder::new(EncoderParams { scale: 2, radius: 12 });
//! let (stack, _) = encoder
//!     .encode(&kps, ImageBounds::new(640.0, 360.0), [(0, 3), (1, 2)])
//!     .unwrap();
//!
//! let decoder = HeatmapDecoder::new(DecoderParams::default());
//! let (decoded, _) = decoder.decode_stack(&stack, 4).unwrap();
//! let p = decoded.get(2).position().unwrap();
//! assert!((p.x - 320.0).abs() <= 2.0 && (p.y - 180.0).abs() <= 2.0);
//! ```

mod decode;
mod encode;
mod stack;

pub use decode::{DecoderParams, HeatmapDecoder, Peak};
pub use encode::{draw_gaussian, CenterStatus, EncodeReport, EncoderParams, GaussianHeatmapEncoder};
pub use stack::{HeatmapError, HeatmapStack, ScoreMapMut, ScoreMapView};
