//! Image-based nudging of decoded keypoints onto nearby court paint.

use crate::core::GrayImageView;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Moves a decoded keypoint closer to the true landmark using the source
/// image. Implementations return the input unchanged when they cannot do
/// better.
pub trait KeypointRefiner: Send + Sync {
    fn refine(&self, image: &GrayImageView<'_>, p: Point2<f64>) -> Point2<f64>;
}

/// Pass-through refiner.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRefinement;

impl KeypointRefiner for NoRefinement {
    fn refine(&self, _image: &GrayImageView<'_>, p: Point2<f64>) -> Point2<f64> {
        p
    }
}

/// Snaps to the intensity-weighted centroid of bright (line) pixels in a
/// square window, separated from the background by Otsu's threshold.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightLineRefiner {
    /// Window is `2 * half_window + 1` pixels on each side.
    pub half_window: u32,
    /// Minimum `max - min` intensity inside the window.
    pub min_contrast: u8,
}

impl Default for BrightLineRefiner {
    fn default() -> Self {
        Self {
            half_window: 10,
            min_contrast: 40,
        }
    }
}

/// Otsu threshold of a 256-bin histogram; pixels `> t` are foreground.
fn otsu_threshold(hist: &[u32; 256]) -> u8 {
    let total: f64 = hist.iter().map(|&c| c as f64).sum();
    if total == 0.0 {
        return 0;
    }
    let sum_all: f64 = hist.iter().enumerate().map(|(v, &c)| v as f64 * c as f64).sum();

    let mut best_t = 0u8;
    let mut best_var = -1.0;
    let (mut w0, mut sum0) = (0.0f64, 0.0f64);
    for (t, &c) in hist.iter().enumerate() {
        w0 += c as f64;
        sum0 += t as f64 * c as f64;
        let w1 = total - w0;
        if w0 == 0.0 || w1 == 0.0 {
            continue;
        }
        let m0 = sum0 / w0;
        let m1 = (sum_all - sum0) / w1;
        let var = w0 * w1 * (m0 - m1) * (m0 - m1);
        if var > best_var {
            best_var = var;
            best_t = t as u8;
        }
    }
    best_t
}

impl KeypointRefiner for BrightLineRefiner {
    fn refine(&self, image: &GrayImageView<'_>, p: Point2<f64>) -> Point2<f64> {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return p;
        }
        let r = self.half_window as i64;
        let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
        let (x0, y0, x1, y1) = (cx - r, cy - r, cx + r, cy + r);
        if x0 < 0 || y0 < 0 || x1 >= image.width as i64 || y1 >= image.height as i64 {
            return p;
        }

        let mut hist = [0u32; 256];
        let (mut lo, mut hi) = (u8::MAX, u8::MIN);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let v = image.get(x, y).unwrap_or(0);
                hist[v as usize] += 1;
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        if hi.saturating_sub(lo) < self.min_contrast {
            return p;
        }

        let t = otsu_threshold(&hist);
        let (mut sx, mut sy, mut sw) = (0.0f64, 0.0f64, 0.0f64);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let v = image.get(x, y).unwrap_or(0);
                if v > t {
                    let w = (v - t) as f64;
                    sx += w * x as f64;
                    sy += w * y as f64;
                    sw += w;
                }
            }
        }
        if sw > 0.0 {
            Point2::new(sx / sw, sy / sw)
        } else {
            p
        }
    }
}
