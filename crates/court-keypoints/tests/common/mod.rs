#![allow(dead_code)]

use std::sync::Arc;

use court_keypoints::core::{homography_from_4pt, Homography, ImageBounds, LandmarkSet};
use court_keypoints::reference::{CourtReferenceModel, CourtSpec};
use nalgebra::Point2;

pub fn pickleball() -> Arc<CourtReferenceModel> {
    Arc::new(CourtReferenceModel::new(CourtSpec::pickleball()).expect("pickleball model"))
}

pub fn frame() -> ImageBounds {
    ImageBounds::new(1280.0, 720.0)
}

/// Broadcast-style view: far baseline narrow and high, near baseline wide.
pub fn broadcast_view() -> Homography {
    let reference = [
        Point2::new(180.0, 300.0),
        Point2::new(580.0, 300.0),
        Point2::new(180.0, 1180.0),
        Point2::new(580.0, 1180.0),
    ];
    let image = [
        Point2::new(440.0, 120.0),
        Point2::new(840.0, 120.0),
        Point2::new(160.0, 660.0),
        Point2::new(1120.0, 660.0),
    ];
    homography_from_4pt(&reference, &image).expect("well-posed corners")
}

/// Every reference landmark projected through `h`.
pub fn projected(model: &CourtReferenceModel, h: &Homography) -> Vec<Point2<f64>> {
    model
        .landmark_coordinates()
        .iter()
        .map(|p| h.project(*p).expect("finite projection"))
        .collect()
}

pub fn full_set(points: &[Point2<f64>]) -> LandmarkSet {
    LandmarkSet::from_points(points.iter().map(|p| Some(*p)))
}

pub fn assert_near(actual: Point2<f64>, expected: Point2<f64>, tol: f64) {
    let d = (actual - expected).norm();
    assert!(
        d <= tol,
        "expected ({:.3}, {:.3}), got ({:.3}, {:.3}), distance {:.4} > {}",
        expected.x,
        expected.y,
        actual.x,
        actual.y,
        d,
        tol
    );
}
