//! JSON configuration, dataset and report helpers, plus PNG glue for the
//! heatmap channels (feature `image`).

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::core::{ImageBounds, LandmarkSet};
use crate::heatmap::{CenterStatus, DecoderParams, EncoderParams, HeatmapError};
use crate::pipeline::{
    BatchStats, InferenceParams, InferencePostProcessor, InferenceResult, ReconcileStatus,
    TrainingSampleBuilder,
};
use crate::reconcile::ReconcileParams;
use crate::reference::{CourtReferenceModel, CourtSpec, ReferenceError};
use crate::refine::BrightLineRefiner;
use serde::{Deserialize, Serialize};

#[cfg(feature = "image")]
use crate::core::{GrayImage, GrayImageView};
#[cfg(feature = "image")]
use crate::heatmap::HeatmapStack;

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "image")]
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Reference(#[from] ReferenceError),
    #[error(transparent)]
    Heatmap(#[from] HeatmapError),
    #[error("heatmap channel {index} not found")]
    MissingChannel { index: usize },
}

fn default_image_width() -> f64 {
    1280.0
}

fn default_image_height() -> f64 {
    720.0
}

/// Everything the training and inference pipelines need, as one JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub court: CourtSpec,
    /// Full-resolution frame size the landmarks live in.
    #[serde(default = "default_image_width")]
    pub image_width: f64,
    #[serde(default = "default_image_height")]
    pub image_height: f64,
    #[serde(default)]
    pub encoder: EncoderParams,
    #[serde(default)]
    pub decoder: DecoderParams,
    #[serde(default)]
    pub reconcile: ReconcileParams,
    #[serde(default)]
    pub use_homography: bool,
    #[serde(default)]
    pub use_refine_kps: bool,
    #[serde(default)]
    pub refine_skip: Vec<usize>,
    #[serde(default)]
    pub refiner: BrightLineRefiner,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            court: CourtSpec::default(),
            image_width: default_image_width(),
            image_height: default_image_height(),
            encoder: EncoderParams::default(),
            decoder: DecoderParams::default(),
            reconcile: ReconcileParams::default(),
            use_homography: false,
            use_refine_kps: false,
            refine_skip: Vec::new(),
            refiner: BrightLineRefiner::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn bounds(&self) -> ImageBounds {
        ImageBounds::new(self.image_width, self.image_height)
    }

    /// Build the validated, shareable reference model.
    pub fn build_model(&self) -> Result<Arc<CourtReferenceModel>, IoError> {
        Ok(Arc::new(CourtReferenceModel::new(self.court)?))
    }

    pub fn inference_params(&self) -> InferenceParams {
        InferenceParams {
            decoder: self.decoder,
            reconcile: self.reconcile,
            use_homography: self.use_homography,
            use_refine_kps: self.use_refine_kps,
            refine_skip: self.refine_skip.clone(),
            refiner: self.refiner,
        }
    }

    pub fn training_builder(&self, model: Arc<CourtReferenceModel>) -> TrainingSampleBuilder {
        TrainingSampleBuilder::new(model, self.encoder, self.reconcile)
    }

    pub fn post_processor(&self, model: Arc<CourtReferenceModel>) -> InferencePostProcessor {
        InferencePostProcessor::new(model, self.inference_params())
    }
}

/// One annotated frame: `{ "id": ..., "kps": [[x, y] | null, ...] }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub id: String,
    pub kps: LandmarkSet,
}

/// Load an annotation file (a JSON array of [`DatasetEntry`]).
pub fn load_dataset(path: impl AsRef<Path>) -> Result<Vec<DatasetEntry>, IoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodeSampleReport {
    pub id: String,
    pub reconcile: ReconcileStatus,
    pub center: CenterStatus,
    /// Landmark channels that received a peak.
    pub drawn: usize,
    pub landmarks: LandmarkSet,
    pub channels: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodeBatchReport {
    pub config_path: String,
    pub dataset_path: String,
    pub stats: BatchStats,
    pub samples: Vec<EncodeSampleReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecodeReport {
    pub config_path: String,
    pub heatmaps_dir: String,
    pub image_path: Option<String>,
    pub result: InferenceResult,
}

/// Write any serializable report as pretty JSON.
pub fn write_report<T: Serialize>(report: &T, path: impl AsRef<Path>) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}

/// File name of heatmap channel `index` inside a channel directory.
pub fn channel_file_name(index: usize) -> String {
    format!("channel_{index:02}.png")
}

/// Convert an `image::GrayImage` into the lightweight core view type.
#[cfg(feature = "image")]
pub fn gray_view(img: &::image::GrayImage) -> GrayImageView<'_> {
    GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Read any supported image file as 8-bit grayscale.
#[cfg(feature = "image")]
pub fn load_gray(path: impl AsRef<Path>) -> Result<GrayImage, IoError> {
    let img = image::open(path)?.to_luma8();
    Ok(GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.into_raw(),
    })
}

/// Write an 8-bit grayscale image; the format follows the file extension.
#[cfg(feature = "image")]
pub fn save_gray(img: &GrayImage, path: impl AsRef<Path>) -> Result<(), IoError> {
    let expected = img.width * img.height;
    let buf = ::image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .ok_or(HeatmapError::BufferLength {
            expected,
            got: img.data.len(),
        })?;
    buf.save(path)?;
    Ok(())
}

/// Write every channel of `stack` as `channel_XX.png` under `dir`.
#[cfg(feature = "image")]
pub fn save_heatmap_channels(
    stack: &HeatmapStack,
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, IoError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(stack.channels());
    for index in 0..stack.channels() {
        let gray = stack
            .channel_to_gray(index)
            .ok_or(IoError::MissingChannel { index })?;
        let path = dir.join(channel_file_name(index));
        save_gray(&gray, &path)?;
        paths.push(path);
    }
    Ok(paths)
}

/// Read `channels` PNGs named by [`channel_file_name`] back into a stack.
#[cfg(feature = "image")]
pub fn load_heatmap_channels(
    dir: impl AsRef<Path>,
    channels: usize,
) -> Result<HeatmapStack, IoError> {
    let dir = dir.as_ref();
    let mut images = Vec::with_capacity(channels);
    for index in 0..channels {
        let path = dir.join(channel_file_name(index));
        if !path.is_file() {
            return Err(IoError::MissingChannel { index });
        }
        images.push(load_gray(&path)?);
    }
    Ok(HeatmapStack::from_gray_channels(&images)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: PipelineConfig = serde_json::from_str(
            r#"{ "court": { "type": "tennis" }, "image_width": 1920, "use_homography": true }"#,
        )
        .unwrap();
        assert_eq!(cfg.court, CourtSpec::tennis());
        assert_eq!(cfg.bounds(), ImageBounds::new(1920.0, 720.0));
        assert_eq!(cfg.encoder, EncoderParams::default());
        assert!(cfg.use_homography);
        assert!(cfg.inference_params().use_homography);
    }

    #[test]
    fn channel_names_are_zero_padded() {
        assert_eq!(channel_file_name(3), "channel_03.png");
        assert_eq!(channel_file_name(14), "channel_14.png");
    }
}
