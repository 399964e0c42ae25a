use crate::model::CourtReferenceModel;
use court_keypoints_core::{GrayImage, Segment};

/// Intensity of drawn court lines.
const LINE_VALUE: u8 = 255;

fn draw_segment(img: &mut GrayImage, segment: &Segment, thickness: u32) {
    let len = segment.length();
    let steps = (len * 2.0).ceil().max(1.0) as usize;
    let lo = -((thickness.saturating_sub(1) / 2) as i64);
    let hi = lo + thickness.max(1) as i64 - 1;

    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let p = segment.a + (segment.b - segment.a) * t;
        let (cx, cy) = (p.x.round() as i64, p.y.round() as i64);
        for dy in lo..=hi {
            for dx in lo..=hi {
                img.put(cx + dx, cy + dy, LINE_VALUE);
            }
        }
    }
}

/// Max filter with a 3x3 window.
fn dilate_3x3(img: &GrayImage) -> GrayImage {
    let mut out = GrayImage::new(img.width, img.height);
    for y in 0..img.height as i64 {
        for x in 0..img.width as i64 {
            let mut v = 0u8;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if let Some(s) = img.get(x + dx, y + dy) {
                        v = v.max(s);
                    }
                }
            }
            out.put(x, y, v);
        }
    }
    out
}

/// Render the court lines onto a black canvas of `model.canvas_size()`.
///
/// Used for visual inspection only; nothing in the codec depends on it.
pub fn build_reference_mask(model: &CourtReferenceModel) -> GrayImage {
    let (w, h) = model.canvas_size();
    let mut img = GrayImage::new(w, h);
    let thickness = model.spec().line_width();
    for line in model.reference_lines() {
        draw_segment(&mut img, &line.segment, thickness);
    }
    dilate_3x3(&img)
}
