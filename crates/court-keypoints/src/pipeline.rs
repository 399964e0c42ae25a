//! Training-target and inference post-processing orchestration.
//!
//! Per-sample problems (too few visible landmarks, degenerate geometry, no
//! court center) are reported through [`ReconcileStatus`] and
//! [`BatchStats`]; only shape mismatches are returned as errors.

use std::sync::Arc;

use crate::core::{GrayImageView, Homography, ImageBounds, Landmark, LandmarkSet};
use crate::heatmap::{
    DecoderParams, EncodeReport, EncoderParams, GaussianHeatmapEncoder, HeatmapDecoder,
    HeatmapError, HeatmapStack,
};
use crate::reconcile::{
    HomographyReconciler, ReconcileError, ReconcileMode, ReconcileParams, Reconciled,
};
use crate::reference::CourtReferenceModel;
use crate::refine::{BrightLineRefiner, KeypointRefiner};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Heatmap(#[from] HeatmapError),
}

/// What the reconciliation step did for one sample.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ReconcileStatus {
    Applied {
        filled: Vec<usize>,
        unresolved: Vec<usize>,
    },
    Skipped {
        reason: ReconcileError,
    },
    NotRequested,
}

impl ReconcileStatus {
    fn from_result(result: Result<Reconciled, ReconcileError>) -> (Option<Reconciled>, Self) {
        match result {
            Ok(r) => {
                let status = ReconcileStatus::Applied {
                    filled: r.filled.clone(),
                    unresolved: r.unresolved.clone(),
                };
                (Some(r), status)
            }
            Err(reason) => {
                log::debug!("reconciliation skipped: {reason}");
                (None, ReconcileStatus::Skipped { reason })
            }
        }
    }
}

/// Counters accumulated over a batch of samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub samples: usize,
    pub reconciled: usize,
    pub skipped_insufficient: usize,
    pub skipped_degenerate: usize,
    pub missing_center: usize,
}

impl BatchStats {
    fn record_status(&mut self, status: &ReconcileStatus) {
        match status {
            ReconcileStatus::Applied { .. } => self.reconciled += 1,
            ReconcileStatus::Skipped {
                reason: ReconcileError::InsufficientCorrespondences { .. },
            } => self.skipped_insufficient += 1,
            ReconcileStatus::Skipped { .. } => self.skipped_degenerate += 1,
            ReconcileStatus::NotRequested => {}
        }
    }

    pub fn record_training(&mut self, sample: &TrainingSample) {
        self.samples += 1;
        self.record_status(&sample.reconcile);
        if !sample.encode.center.is_rendered() {
            self.missing_center += 1;
        }
    }

    pub fn record_inference(&mut self, result: &InferenceResult) {
        self.samples += 1;
        self.record_status(&result.reconcile);
        if result.center.is_none() {
            self.missing_center += 1;
        }
    }

    pub fn merge(&mut self, other: &BatchStats) {
        self.samples += other.samples;
        self.reconciled += other.reconciled;
        self.skipped_insufficient += other.skipped_insufficient;
        self.skipped_degenerate += other.skipped_degenerate;
        self.missing_center += other.missing_center;
    }
}

/// One training example: reconciled landmarks and their target heatmaps.
#[derive(Clone, Debug)]
pub struct TrainingSample {
    pub landmarks: LandmarkSet,
    pub heatmaps: HeatmapStack,
    pub encode: EncodeReport,
    pub reconcile: ReconcileStatus,
}

/// Fills occluded landmarks through the reference court, then renders
/// `K + 1` channel targets.
#[derive(Clone, Debug)]
pub struct TrainingSampleBuilder {
    model: Arc<CourtReferenceModel>,
    encoder: GaussianHeatmapEncoder,
    reconciler: HomographyReconciler,
}

impl TrainingSampleBuilder {
    pub fn new(
        model: Arc<CourtReferenceModel>,
        encoder: EncoderParams,
        reconcile: ReconcileParams,
    ) -> Self {
        Self {
            encoder: GaussianHeatmapEncoder::new(encoder),
            reconciler: HomographyReconciler::new(Arc::clone(&model), reconcile),
            model,
        }
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, raw), fields(k = raw.len()))
    )]
    pub fn build(
        &self,
        raw: &LandmarkSet,
        bounds: ImageBounds,
    ) -> Result<TrainingSample, PipelineError> {
        let expected = self.model.num_landmarks();
        if raw.len() != expected {
            return Err(ReconcileError::LandmarkCountMismatch {
                expected,
                got: raw.len(),
            }
            .into());
        }

        let needs_fill = raw.visible_indices(&bounds).len() < expected;
        let (landmarks, reconcile) = if needs_fill {
            let result = self
                .reconciler
                .try_reconcile(raw, bounds, ReconcileMode::FillMissing);
            match ReconcileStatus::from_result(result) {
                (Some(r), status) => (r.landmarks, status),
                (None, status) => (raw.clone(), status),
            }
        } else {
            (raw.clone(), ReconcileStatus::NotRequested)
        };

        let (heatmaps, encode) = self
            .encoder
            .encode(&landmarks, bounds, self.model.center_diagonals())?;

        Ok(TrainingSample {
            landmarks,
            heatmaps,
            encode,
            reconcile,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceParams {
    pub decoder: DecoderParams,
    pub reconcile: ReconcileParams,
    /// Replace every decoded landmark by its reference projection when a
    /// homography can be fitted.
    pub use_homography: bool,
    /// Snap decoded landmarks onto nearby line paint (needs the frame).
    pub use_refine_kps: bool,
    /// Landmark indices never refined.
    pub refine_skip: Vec<usize>,
    pub refiner: BrightLineRefiner,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            decoder: DecoderParams::default(),
            reconcile: ReconcileParams::default(),
            use_homography: false,
            use_refine_kps: false,
            refine_skip: Vec::new(),
            refiner: BrightLineRefiner::default(),
        }
    }
}

/// Decoded landmarks for one frame.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InferenceResult {
    pub landmarks: LandmarkSet,
    /// Peak score per landmark channel.
    pub scores: Vec<Option<f32>>,
    /// Court center decoded from the synthetic channel.
    pub center: Option<Point2<f64>>,
    pub homography: Option<Homography>,
    pub reconcile: ReconcileStatus,
}

/// Turns predicted heatmaps into final landmark coordinates.
pub struct InferencePostProcessor {
    model: Arc<CourtReferenceModel>,
    params: InferenceParams,
    decoder: HeatmapDecoder,
    reconciler: HomographyReconciler,
    refiner: Box<dyn KeypointRefiner>,
}

impl std::fmt::Debug for InferencePostProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferencePostProcessor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl InferencePostProcessor {
    pub fn new(model: Arc<CourtReferenceModel>, params: InferenceParams) -> Self {
        Self {
            decoder: HeatmapDecoder::new(params.decoder),
            reconciler: HomographyReconciler::new(Arc::clone(&model), params.reconcile),
            refiner: Box::new(params.refiner),
            model,
            params,
        }
    }

    /// Replace the image refiner used when `use_refine_kps` is set.
    pub fn with_refiner(mut self, refiner: Box<dyn KeypointRefiner>) -> Self {
        self.refiner = refiner;
        self
    }

    pub fn params(&self) -> &InferenceParams {
        &self.params
    }

    fn refine_all(&self, landmarks: &mut LandmarkSet, image: &GrayImageView<'_>) {
        for i in 0..landmarks.len() {
            if self.params.refine_skip.contains(&i) {
                continue;
            }
            if let Some(p) = landmarks.get(i).position() {
                landmarks.set(i, Landmark::Present(self.refiner.refine(image, p)));
            }
        }
    }

    /// Decode `stack` (`K + 1` channels) into landmarks for an image of
    /// `bounds`. `image` is only read when refinement is enabled.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, stack, image), fields(channels = stack.channels()))
    )]
    pub fn process(
        &self,
        stack: &HeatmapStack,
        bounds: ImageBounds,
        image: Option<&GrayImageView<'_>>,
    ) -> Result<InferenceResult, PipelineError> {
        let k = self.model.num_landmarks();
        if stack.channels() != k + 1 {
            return Err(HeatmapError::ChannelCountMismatch {
                expected: k + 1,
                got: stack.channels(),
            }
            .into());
        }

        let (mut landmarks, scores) = self.decoder.decode_stack(stack, k)?;
        let center = stack
            .channel(k)
            .and_then(|view| self.decoder.decode_channel(&view))
            .map(|peak| peak.position);

        if self.params.use_refine_kps {
            match image {
                Some(img) => self.refine_all(&mut landmarks, img),
                None => log::warn!("keypoint refinement requested without an image"),
            }
        }

        let (homography, reconcile) = if self.params.use_homography {
            let result = self
                .reconciler
                .try_reconcile(&landmarks, bounds, ReconcileMode::ReprojectAll);
            match ReconcileStatus::from_result(result) {
                (Some(r), status) => {
                    landmarks = r.landmarks;
                    (Some(r.homography), status)
                }
                (None, status) => (None, status),
            }
        } else {
            (None, ReconcileStatus::NotRequested)
        };

        Ok(InferenceResult {
            landmarks,
            scores,
            center,
            homography,
            reconcile,
        })
    }
}
