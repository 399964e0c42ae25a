//! Core types and utilities for court keypoint detection.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! know about any concrete court layout, heatmap format or neural network.
//!
//! - [`geometry`]: line intersection, bounds and collinearity tests.
//! - [`Homography`]: planar projective transforms and DLT estimation.
//! - [`Landmark`] / [`LandmarkSet`]: index-aligned keypoints with an explicit
//!   missing state.
//! - [`GrayImage`] / [`GrayImageView`]: minimal 8-bit rasters.

pub mod geometry;
mod homography;
mod image;
mod landmark;
mod logger;

pub use geometry::{in_bounds, is_general_position, line_intersection, Segment};
pub use homography::{
    estimate_homography, estimate_homography_robust, homography_from_4pt, reprojection_errors,
    Homography, RobustHomography, RobustParams, HOMOGENEOUS_EPS,
};
pub use image::{GrayImage, GrayImageView};
pub use landmark::{ImageBounds, Landmark, LandmarkSet};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, parse_level_filter};
