//! Landmark -> training target encoding.

use crate::stack::{HeatmapError, HeatmapStack, ScoreMapMut};
use court_keypoints_core::{line_intersection, ImageBounds, LandmarkSet, Segment};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Target rendering parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderParams {
    /// Integer downscale from image to heatmap resolution.
    pub scale: u32,
    /// Gaussian radius in heatmap pixels.
    pub radius: u32,
}

impl Default for EncoderParams {
    fn default() -> Self {
        Self {
            scale: 2,
            radius: 55,
        }
    }
}

/// What happened to the synthetic center channel.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CenterStatus {
    Rendered { x: f64, y: f64 },
    /// At least one diagonal endpoint is missing.
    MissingEndpoints,
    /// The diagonals are parallel or degenerate.
    NoIntersection,
    /// Intersection exists but lies outside the image.
    OutOfBounds { x: f64, y: f64 },
}

impl CenterStatus {
    pub fn is_rendered(&self) -> bool {
        matches!(self, CenterStatus::Rendered { .. })
    }
}

/// Per-sample summary of [`GaussianHeatmapEncoder::encode`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EncodeReport {
    /// `true` for each landmark channel that received a peak.
    pub drawn: Vec<bool>,
    pub center: CenterStatus,
}

/// Two-dimensional gaussian of side `2 * radius + 1`, peak 1.0.
fn gaussian_kernel(radius: usize) -> Vec<f32> {
    let diameter = 2 * radius + 1;
    let sigma = diameter as f64 / 6.0;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let r = radius as f64;
    let mut kernel = Vec::with_capacity(diameter * diameter);
    for y in 0..diameter {
        for x in 0..diameter {
            let dx = x as f64 - r;
            let dy = y as f64 - r;
            kernel.push((-(dx * dx + dy * dy) / two_sigma_sq).exp() as f32);
        }
    }
    // peak is exp(0) == 1
    let floor = f32::EPSILON;
    for v in kernel.iter_mut() {
        if *v < floor {
            *v = 0.0;
        }
    }
    kernel
}

/// Paste a gaussian centered at integer pixel `center` into `map` with an
/// element-wise max. The kernel is clipped at the map border.
pub fn draw_gaussian(map: &mut ScoreMapMut<'_>, center: (i64, i64), radius: u32) {
    let kernel = gaussian_kernel(radius as usize);
    paste_max(map, center, radius as i64, &kernel);
}

fn paste_max(map: &mut ScoreMapMut<'_>, center: (i64, i64), radius: i64, kernel: &[f32]) {
    let (cx, cy) = center;
    let (w, h) = (map.width as i64, map.height as i64);
    let side = 2 * radius + 1;

    let x0 = (cx - radius).max(0);
    let x1 = (cx + radius).min(w - 1);
    let y0 = (cy - radius).max(0);
    let y1 = (cy + radius).min(h - 1);
    if x0 > x1 || y0 > y1 {
        return;
    }

    for y in y0..=y1 {
        let ky = y - (cy - radius);
        let row = y as usize * map.width;
        for x in x0..=x1 {
            let kx = x - (cx - radius);
            let g = kernel[(ky * side + kx) as usize];
            let dst = &mut map.data[row + x as usize];
            if g > *dst {
                *dst = g;
            }
        }
    }
}

/// Renders one gaussian peak per visible landmark plus the court center.
#[derive(Clone, Debug)]
pub struct GaussianHeatmapEncoder {
    params: EncoderParams,
    kernel: Vec<f32>,
}

impl GaussianHeatmapEncoder {
    pub fn new(params: EncoderParams) -> Self {
        let params = EncoderParams {
            scale: params.scale.max(1),
            radius: params.radius,
        };
        Self {
            kernel: gaussian_kernel(params.radius as usize),
            params,
        }
    }

    pub fn params(&self) -> &EncoderParams {
        &self.params
    }

    /// Heatmap `(width, height)` for an image of `bounds`.
    pub fn output_size(&self, bounds: ImageBounds) -> (usize, usize) {
        let s = self.params.scale as f64;
        let w = (bounds.width / s).floor();
        let h = (bounds.height / s).floor();
        if w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0 {
            (w as usize, h as usize)
        } else {
            (0, 0)
        }
    }

    /// Heatmap cell of image point `p`, clamped into a `w x h` map so that
    /// points on the far image edge still get a peak.
    fn to_cell(&self, p: Point2<f64>, w: usize, h: usize) -> (i64, i64) {
        let s = self.params.scale as f64;
        let cx = ((p.x / s).floor() as i64).clamp(0, w as i64 - 1);
        let cy = ((p.y / s).floor() as i64).clamp(0, h as i64 - 1);
        (cx, cy)
    }

    fn center_status(
        landmarks: &LandmarkSet,
        bounds: &ImageBounds,
        diagonals: [(usize, usize); 2],
    ) -> CenterStatus {
        let [(a0, a1), (b0, b1)] = diagonals;
        let ends = [a0, a1, b0, b1].map(|i| landmarks.get(i).position());
        let [Some(p0), Some(p1), Some(q0), Some(q1)] = ends else {
            return CenterStatus::MissingEndpoints;
        };
        match line_intersection(&Segment::new(p0, p1), &Segment::new(q0, q1)) {
            None => CenterStatus::NoIntersection,
            Some(c) if bounds.contains(c) => CenterStatus::Rendered { x: c.x, y: c.y },
            Some(c) => CenterStatus::OutOfBounds { x: c.x, y: c.y },
        }
    }

    /// Build the `K + 1` channel training target for `landmarks`.
    ///
    /// Channel `i < K` carries landmark `i` when it is present and inside
    /// `bounds`. Channel `K` carries the intersection of the two
    /// `diagonals` (pairs of landmark indices).
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, landmarks), fields(k = landmarks.len()))
    )]
    pub fn encode(
        &self,
        landmarks: &LandmarkSet,
        bounds: ImageBounds,
        diagonals: [(usize, usize); 2],
    ) -> Result<(HeatmapStack, EncodeReport), HeatmapError> {
        let (w, h) = self.output_size(bounds);
        let k = landmarks.len();
        let mut stack = HeatmapStack::zeros(k + 1, w, h)?;
        let radius = self.params.radius as i64;

        let mut drawn = vec![false; k];
        for (i, lm) in landmarks.iter().enumerate() {
            if !lm.is_visible(&bounds) {
                continue;
            }
            let Some(p) = lm.position() else { continue };
            if let Some(mut map) = stack.channel_mut(i) {
                paste_max(&mut map, self.to_cell(p, w, h), radius, &self.kernel);
                drawn[i] = true;
            }
        }

        let center = Self::center_status(landmarks, &bounds, diagonals);
        match center {
            CenterStatus::Rendered { x, y } => {
                if let Some(mut map) = stack.channel_mut(k) {
                    paste_max(
                        &mut map,
                        self.to_cell(Point2::new(x, y), w, h),
                        radius,
                        &self.kernel,
                    );
                }
            }
            other => log::debug!("center channel left empty: {other:?}"),
        }

        Ok((stack, EncodeReport { drawn, center }))
    }
}
