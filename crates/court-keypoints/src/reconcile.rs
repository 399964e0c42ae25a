//! Recover missing or out-of-frame landmarks through the reference court.
//!
//! Visible observations are paired with the reference model by landmark
//! index, a reference -> image homography is estimated from those pairs, and
//! reference points are projected back into the image for the indices that
//! need them.

use std::sync::Arc;

use crate::core::{
    estimate_homography, estimate_homography_robust, is_general_position, reprojection_errors,
    Homography, ImageBounds, Landmark, LandmarkSet, RobustParams,
};
use crate::reference::CourtReferenceModel;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Homography fitting strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomographyEstimator {
    /// Normalized DLT over every visible correspondence.
    #[default]
    LeastSquares,
    /// Best 4-point hypothesis by inlier count, refit on its inliers.
    Robust,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileParams {
    /// Minimum visible landmarks before a homography is attempted. Values
    /// below 4 are treated as 4.
    pub min_correspondences: usize,
    pub estimator: HomographyEstimator,
    /// Sine-of-angle tolerance for the general-position test on the
    /// reference side.
    pub collinearity_tol: f64,
    /// Inlier gate in image pixels, used by [`HomographyEstimator::Robust`].
    pub inlier_threshold_px: f64,
}

impl Default for ReconcileParams {
    fn default() -> Self {
        Self {
            min_correspondences: 4,
            estimator: HomographyEstimator::LeastSquares,
            collinearity_tol: 1e-3,
            inlier_threshold_px: 5.0,
        }
    }
}

/// Which indices receive projected reference points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Only indices that are missing or outside the image.
    FillMissing,
    /// Every index, visible ones included.
    ReprojectAll,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileError {
    #[error("{visible} visible landmarks, need at least {required}")]
    InsufficientCorrespondences { visible: usize, required: usize },
    #[error("visible landmarks do not determine a homography")]
    DegenerateGeometry,
    #[error("expected {expected} landmarks, got {got}")]
    LandmarkCountMismatch { expected: usize, got: usize },
}

/// Outcome of a successful reconciliation.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    pub landmarks: LandmarkSet,
    /// Reference -> image transform.
    pub homography: Homography,
    /// Indices whose value was replaced by a projection.
    pub filled: Vec<usize>,
    /// Indices that needed a projection but hit the line at infinity.
    pub unresolved: Vec<usize>,
    /// Mean pixel distance between projected and observed visible points
    /// (robust inliers only when [`HomographyEstimator::Robust`] is used).
    pub mean_reprojection_error: f64,
}

#[derive(Clone, Debug)]
pub struct HomographyReconciler {
    model: Arc<CourtReferenceModel>,
    params: ReconcileParams,
}

impl HomographyReconciler {
    pub fn new(model: Arc<CourtReferenceModel>, params: ReconcileParams) -> Self {
        Self { model, params }
    }

    pub fn model(&self) -> &CourtReferenceModel {
        &self.model
    }

    pub fn params(&self) -> &ReconcileParams {
        &self.params
    }

    fn required(&self) -> usize {
        self.params.min_correspondences.max(4)
    }

    fn fit(
        &self,
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
    ) -> Result<(Homography, f64), ReconcileError> {
        let (h, mean) = match self.params.estimator {
            HomographyEstimator::LeastSquares => {
                let h = estimate_homography(src, dst).ok_or(ReconcileError::DegenerateGeometry)?;
                let errors = reprojection_errors(&h, src, dst);
                let mean = errors.iter().sum::<f64>() / errors.len() as f64;
                (h, mean)
            }
            HomographyEstimator::Robust => {
                let robust = RobustParams {
                    inlier_threshold: self.params.inlier_threshold_px,
                    ..RobustParams::default()
                };
                let fit = estimate_homography_robust(src, dst, &robust)
                    .ok_or(ReconcileError::DegenerateGeometry)?;
                (fit.homography, fit.mean_error)
            }
        };
        if !h.is_well_conditioned() || !mean.is_finite() {
            return Err(ReconcileError::DegenerateGeometry);
        }
        Ok((h, mean))
    }

    /// Estimate the reference -> image homography from the visible part of
    /// `observed` and project reference points according to `mode`.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, observed), fields(k = observed.len()))
    )]
    pub fn try_reconcile(
        &self,
        observed: &LandmarkSet,
        bounds: ImageBounds,
        mode: ReconcileMode,
    ) -> Result<Reconciled, ReconcileError> {
        let reference = self.model.landmark_coordinates();
        if observed.len() != reference.len() {
            return Err(ReconcileError::LandmarkCountMismatch {
                expected: reference.len(),
                got: observed.len(),
            });
        }

        let visible = observed.visible_indices(&bounds);
        let required = self.required();
        if visible.len() < required {
            return Err(ReconcileError::InsufficientCorrespondences {
                visible: visible.len(),
                required,
            });
        }

        let mut src = Vec::with_capacity(visible.len());
        let mut dst = Vec::with_capacity(visible.len());
        for &i in &visible {
            if let Some(p) = observed.get(i).position() {
                src.push(reference[i]);
                dst.push(p);
            }
        }
        let tol = self.params.collinearity_tol;
        if !is_general_position(&src, tol) || !is_general_position(&dst, tol) {
            return Err(ReconcileError::DegenerateGeometry);
        }

        let (homography, mean_reprojection_error) = self.fit(&src, &dst)?;

        let mut landmarks = observed.clone();
        let mut filled = Vec::new();
        let mut unresolved = Vec::new();
        for (i, r) in reference.iter().enumerate() {
            if mode == ReconcileMode::FillMissing && observed.get(i).is_visible(&bounds) {
                continue;
            }
            match homography.project(*r) {
                Some(p) => {
                    landmarks.set(i, Landmark::Present(p));
                    filled.push(i);
                }
                None => unresolved.push(i),
            }
        }

        log::debug!(
            "reconciled from {} visible landmarks: {} filled, {} unresolved, mean error {:.3}px",
            visible.len(),
            filled.len(),
            unresolved.len(),
            mean_reprojection_error
        );

        Ok(Reconciled {
            landmarks,
            homography,
            filled,
            unresolved,
            mean_reprojection_error,
        })
    }

    /// As [`Self::try_reconcile`], returning `observed` unchanged when no
    /// homography can be established.
    pub fn reconcile(
        &self,
        observed: &LandmarkSet,
        bounds: ImageBounds,
        mode: ReconcileMode,
    ) -> LandmarkSet {
        match self.try_reconcile(observed, bounds, mode) {
            Ok(r) => r.landmarks,
            Err(err) => {
                log::debug!("reconciliation skipped: {err}");
                observed.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CourtSpec;

    fn reconciler(params: ReconcileParams) -> HomographyReconciler {
        let model = CourtReferenceModel::new(CourtSpec::pickleball()).expect("model");
        HomographyReconciler::new(Arc::new(model), params)
    }

    #[test]
    fn wrong_length_is_rejected() {
        let r = reconciler(ReconcileParams::default());
        let err = r
            .try_reconcile(
                &LandmarkSet::missing(5),
                ImageBounds::new(100.0, 100.0),
                ReconcileMode::FillMissing,
            )
            .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::LandmarkCountMismatch {
                expected: 14,
                got: 5
            }
        );
    }

    #[test]
    fn min_correspondences_is_clamped_to_four() {
        let r = reconciler(ReconcileParams {
            min_correspondences: 1,
            ..Default::default()
        });
        let mut set = LandmarkSet::missing(14);
        for i in 0..3 {
            set.set(i, Landmark::new(10.0 * i as f64, 5.0));
        }
        let err = r
            .try_reconcile(&set, ImageBounds::new(100.0, 100.0), ReconcileMode::FillMissing)
            .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::InsufficientCorrespondences {
                visible: 3,
                required: 4
            }
        );
    }

    #[test]
    fn collinear_reference_subset_is_degenerate() {
        // 0, 4, 8, 6, 2: the left sideline
        let r = reconciler(ReconcileParams::default());
        let mut set = LandmarkSet::missing(14);
        for (k, i) in [0usize, 4, 8, 6, 2].into_iter().enumerate() {
            set.set(i, Landmark::new(50.0 + k as f64, 20.0 + 30.0 * k as f64));
        }
        let err = r
            .try_reconcile(&set, ImageBounds::new(500.0, 500.0), ReconcileMode::FillMissing)
            .unwrap_err();
        assert_eq!(err, ReconcileError::DegenerateGeometry);
    }

    #[test]
    fn identity_mapping_fills_from_reference() {
        let r = reconciler(ReconcileParams::default());
        let reference = r.model().landmark_coordinates().to_vec();
        let mut set = LandmarkSet::from_points(reference.iter().map(|p| Some(*p)));
        set.set(5, Landmark::Missing);

        let out = r
            .try_reconcile(&set, ImageBounds::new(760.0, 1480.0), ReconcileMode::FillMissing)
            .expect("reconciled");
        assert_eq!(out.filled, vec![5]);
        assert!(out.unresolved.is_empty());
        let p = out.landmarks.get(5).position().expect("filled");
        assert!((p - reference[5]).norm() < 1e-6);
        assert!(out.mean_reprojection_error < 1e-6);
        let deviation = (out.homography.h - Homography::identity().h).abs().max();
        assert!(deviation < 1e-9, "homography deviates from identity by {deviation}");
    }
}
