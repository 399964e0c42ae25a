//! Score map -> landmark decoding.

use crate::stack::{HeatmapError, HeatmapStack, ScoreMapView};
use court_keypoints_core::{GrayImageView, Landmark, LandmarkSet};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Peak extraction parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderParams {
    /// Scores at or below this value are background (score units, `[0, 1]`).
    pub threshold: f32,
    /// Non-maximum suppression radius in heatmap pixels.
    pub max_radius: u32,
    /// Heatmap to image downscale factor.
    pub scale: u32,
}

impl Default for DecoderParams {
    fn default() -> Self {
        Self {
            threshold: 170.0 / 255.0,
            max_radius: 25,
            scale: 2,
        }
    }
}

/// A decoded landmark in full-resolution image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Peak {
    pub position: Point2<f64>,
    pub score: f32,
}

trait ScoreSource {
    fn dims(&self) -> (usize, usize);
    fn sample_count(&self) -> usize;
    /// Caller guarantees `x < width && y < height`.
    fn score(&self, x: usize, y: usize) -> f32;
}

impl ScoreSource for ScoreMapView<'_> {
    fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn sample_count(&self) -> usize {
        self.data.len()
    }

    fn score(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }
}

impl ScoreSource for GrayImageView<'_> {
    fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn sample_count(&self) -> usize {
        self.data.len()
    }

    fn score(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x] as f32 / 255.0
    }
}

/// Local-maximum peak finder with greedy non-maximum suppression.
#[derive(Clone, Debug, Default)]
pub struct HeatmapDecoder {
    params: DecoderParams,
}

impl HeatmapDecoder {
    pub fn new(params: DecoderParams) -> Self {
        Self {
            params: DecoderParams {
                scale: params.scale.max(1),
                ..params
            },
        }
    }

    pub fn params(&self) -> &DecoderParams {
        &self.params
    }

    /// Strongest peak of one channel, or `None` if nothing clears the
    /// threshold.
    pub fn decode_channel(&self, view: &ScoreMapView<'_>) -> Option<Peak> {
        self.peaks(view).into_iter().next()
    }

    /// As [`Self::decode_channel`], on an 8-bit map (`value / 255`).
    pub fn decode_u8_channel(&self, view: &GrayImageView<'_>) -> Option<Peak> {
        self.peaks(view).into_iter().next()
    }

    /// Every peak surviving suppression, strongest first.
    pub fn decode_channel_peaks(&self, view: &ScoreMapView<'_>) -> Vec<Peak> {
        self.peaks(view)
    }

    fn peaks<S: ScoreSource + ?Sized>(&self, src: &S) -> Vec<Peak> {
        let (w, h) = src.dims();
        if w == 0 || h == 0 || w.checked_mul(h).is_none_or(|n| src.sample_count() < n) {
            return Vec::new();
        }
        let t = self.params.threshold;
        let r = self.params.max_radius as f64;

        // raster order keeps the later stable sort tie-breaking deterministic
        let mut candidates: Vec<(usize, usize, f32)> = Vec::new();
        for y in 0..h {
            for x in 0..w {
                let v = src.score(x, y);
                if v.is_nan() || v <= t || !is_local_max(src, x, y, v) {
                    continue;
                }
                candidates.push((x, y, v));
            }
        }
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut kept: Vec<(usize, usize, f32)> = Vec::new();
        for c in candidates {
            let suppressed = kept.iter().any(|k| {
                let dx = c.0 as f64 - k.0 as f64;
                let dy = c.1 as f64 - k.1 as f64;
                dx * dx + dy * dy <= r * r
            });
            if !suppressed {
                kept.push(c);
            }
        }

        let s = self.params.scale as f64;
        kept.into_iter()
            .map(|(x, y, score)| {
                let c = parabolic_peak(src, x, y);
                Peak {
                    position: Point2::new(c.x * s, c.y * s),
                    score,
                }
            })
            .collect()
    }

    /// Decode the first `k` channels of `stack`.
    ///
    /// Returns the landmark set (missing where no peak was found) and the
    /// per-channel peak score.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, stack), fields(channels = stack.channels()))
    )]
    pub fn decode_stack(
        &self,
        stack: &HeatmapStack,
        k: usize,
    ) -> Result<(LandmarkSet, Vec<Option<f32>>), HeatmapError> {
        if stack.channels() < k {
            return Err(HeatmapError::ChannelCountMismatch {
                expected: k,
                got: stack.channels(),
            });
        }
        let mut landmarks = LandmarkSet::missing(k);
        let mut scores = vec![None; k];
        for i in 0..k {
            let Some(view) = stack.channel(i) else {
                continue;
            };
            if let Some(peak) = self.decode_channel(&view) {
                landmarks.set(i, Landmark::Present(peak.position));
                scores[i] = Some(peak.score);
            }
        }
        log::debug!(
            "decoded {}/{} channels above threshold {:.3}",
            landmarks.count_present(),
            k,
            self.params.threshold
        );
        Ok((landmarks, scores))
    }
}

fn is_local_max<S: ScoreSource + ?Sized>(src: &S, x: usize, y: usize, v: f32) -> bool {
    let (w, h) = src.dims();
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                continue;
            }
            if src.score(nx as usize, ny as usize) > v {
                return false;
            }
        }
    }
    true
}

/// Sub-cell position of the maximum at `(px, py)`: a parabola through the
/// two neighbours on each axis. An axis clipped by the map border, or with a
/// profile that is not concave, keeps the integer coordinate.
fn parabolic_peak<S: ScoreSource + ?Sized>(src: &S, px: usize, py: usize) -> Point2<f64> {
    let (w, h) = src.dims();
    let c = src.score(px, py) as f64;
    let dx = if px > 0 && px + 1 < w {
        vertex_offset(src.score(px - 1, py) as f64, c, src.score(px + 1, py) as f64)
    } else {
        0.0
    };
    let dy = if py > 0 && py + 1 < h {
        vertex_offset(src.score(px, py - 1) as f64, c, src.score(px, py + 1) as f64)
    } else {
        0.0
    };
    Point2::new(px as f64 + dx, py as f64 + dy)
}

fn vertex_offset(left: f64, center: f64, right: f64) -> f64 {
    let curvature = left - 2.0 * center + right;
    if curvature.is_nan() || curvature >= 0.0 {
        return 0.0;
    }
    (0.5 * (left - right) / curvature).clamp(-0.5, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::draw_gaussian;
    use crate::stack::ScoreMapMut;
    use approx::assert_abs_diff_eq;
    use court_keypoints_core::GrayImage;

    fn blank(w: usize, h: usize) -> Vec<f32> {
        vec![0.0; w * h]
    }

    fn view(w: usize, h: usize, data: &[f32]) -> ScoreMapView<'_> {
        ScoreMapView {
            width: w,
            height: h,
            data,
        }
    }

    fn blob(buf: &mut [f32], w: usize, h: usize, c: (i64, i64), radius: u32, gain: f32) {
        let mut tmp = blank(w, h);
        draw_gaussian(
            &mut ScoreMapMut {
                width: w,
                height: h,
                data: &mut tmp,
            },
            c,
            radius,
        );
        for (d, s) in buf.iter_mut().zip(tmp) {
            *d = d.max(s * gain);
        }
    }

    #[test]
    fn symmetric_blob_decodes_to_its_center() {
        let (w, h) = (64, 48);
        let mut buf = blank(w, h);
        blob(&mut buf, w, h, (20, 30), 10, 1.0);
        let dec = HeatmapDecoder::new(DecoderParams::default());
        let peak = dec.decode_channel(&view(w, h, &buf)).expect("peak");
        assert_abs_diff_eq!(peak.position.x, 40.0, epsilon = 1e-6);
        assert_abs_diff_eq!(peak.position.y, 60.0, epsilon = 1e-6);
        assert_eq!(peak.score, 1.0);
    }

    #[test]
    fn weaker_nearby_blob_is_suppressed() {
        let (w, h) = (120, 60);
        let mut buf = blank(w, h);
        blob(&mut buf, w, h, (30, 30), 6, 1.0);
        blob(&mut buf, w, h, (45, 30), 6, 0.8);
        blob(&mut buf, w, h, (100, 30), 6, 0.9);

        let dec = HeatmapDecoder::new(DecoderParams {
            max_radius: 25,
            scale: 1,
            ..Default::default()
        });
        let peaks = dec.decode_channel_peaks(&view(w, h, &buf));
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].score, 1.0);
        // refinement stays on the winning blob
        assert_abs_diff_eq!(peaks[0].position.x, 30.0, epsilon = 1e-6);
        assert_abs_diff_eq!(peaks[1].position.x, 100.0, epsilon = 1e-6);
        assert!((peaks[1].score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn below_threshold_is_none() {
        let (w, h) = (32, 32);
        let mut buf = blank(w, h);
        blob(&mut buf, w, h, (16, 16), 5, 0.5);
        let dec = HeatmapDecoder::new(DecoderParams::default());
        assert!(dec.decode_channel(&view(w, h, &buf)).is_none());
    }

    #[test]
    fn u8_channel_uses_strict_threshold() {
        let mut img = GrayImage::new(16, 16);
        img.put(4, 5, 170);
        let dec = HeatmapDecoder::new(DecoderParams::default());
        assert!(dec.decode_u8_channel(&img.view()).is_none());

        img.put(4, 5, 171);
        let peak = dec.decode_u8_channel(&img.view()).expect("peak");
        assert_eq!(peak.position, Point2::new(8.0, 10.0));
    }

    #[test]
    fn stack_decoding_marks_empty_channels_missing() {
        let (w, h) = (40, 40);
        let mut stack = HeatmapStack::zeros(3, w, h).unwrap();
        draw_gaussian(&mut stack.channel_mut(1).unwrap(), (10, 12), 8);
        let dec = HeatmapDecoder::new(DecoderParams::default());

        let (set, scores) = dec.decode_stack(&stack, 2).unwrap();
        assert_eq!(set.get(0), Landmark::Missing);
        let p = set.get(1).position().expect("present");
        assert_abs_diff_eq!(p.x, 20.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 24.0, epsilon = 1e-6);
        assert_eq!(scores, vec![None, Some(1.0)]);

        assert_eq!(
            dec.decode_stack(&stack, 4).unwrap_err(),
            HeatmapError::ChannelCountMismatch {
                expected: 4,
                got: 3
            }
        );
    }

    #[test]
    fn blobs_clipped_by_the_border_keep_their_peak_cell() {
        let (w, h) = (64, 48);
        let dec = HeatmapDecoder::new(DecoderParams::default());
        for (cell, expected) in [
            ((0, 20), (0.0, 40.0)),
            ((63, 47), (126.0, 94.0)),
            ((2, 2), (4.0, 4.0)),
            ((32, 0), (64.0, 0.0)),
        ] {
            let mut buf = blank(w, h);
            blob(&mut buf, w, h, cell, 30, 1.0);
            let peak = dec.decode_channel(&view(w, h, &buf)).expect("peak");
            assert_abs_diff_eq!(peak.position.x, expected.0, epsilon = 1e-6);
            assert_abs_diff_eq!(peak.position.y, expected.1, epsilon = 1e-6);
        }
    }

    #[test]
    fn asymmetric_neighbours_shift_the_peak_by_a_sub_cell() {
        let (w, h) = (9, 9);
        let mut buf = blank(w, h);
        buf[4 * w + 3] = 0.8;
        buf[4 * w + 4] = 1.0;
        buf[4 * w + 5] = 0.9;
        let dec = HeatmapDecoder::new(DecoderParams {
            scale: 1,
            ..Default::default()
        });
        let peak = dec.decode_channel(&view(w, h, &buf)).expect("peak");
        // vertex of the parabola through (-1, 0.8), (0, 1.0), (1, 0.9)
        assert_abs_diff_eq!(peak.position.x, 4.0 + 1.0 / 6.0, epsilon = 1e-6);
        assert_abs_diff_eq!(peak.position.y, 4.0, epsilon = 1e-6);
    }

    #[test]
    fn short_u8_buffer_yields_no_peak() {
        let data = [255u8; 10];
        let view = GrayImageView {
            width: 16,
            height: 16,
            data: &data,
        };
        let dec = HeatmapDecoder::new(DecoderParams::default());
        assert!(dec.decode_u8_channel(&view).is_none());
    }
}
