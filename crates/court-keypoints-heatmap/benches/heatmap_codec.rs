use criterion::{black_box, criterion_group, criterion_main, Criterion};

use court_keypoints_core::{ImageBounds, LandmarkSet};
use court_keypoints_heatmap::{DecoderParams, EncoderParams, GaussianHeatmapEncoder, HeatmapDecoder};
use court_keypoints_reference::{CourtReferenceModel, CourtSpec};
use nalgebra::Point2;

/// Reference landmarks squeezed into a 1280x720 frame.
fn sample() -> (LandmarkSet, ImageBounds, [(usize, usize); 2]) {
    let model = CourtReferenceModel::new(CourtSpec::pickleball()).expect("model");
    let (cw, ch) = model.canvas_size();
    let sx = 1280.0 / cw as f64;
    let sy = 720.0 / ch as f64;
    let set = LandmarkSet::from_points(
        model
            .landmark_coordinates()
            .iter()
            .map(|p| Some(Point2::new(p.x * sx, p.y * sy))),
    );
    (set, ImageBounds::new(1280.0, 720.0), model.center_diagonals())
}

fn bench_encode(c: &mut Criterion) {
    let (set, bounds, diagonals) = sample();
    let encoder = GaussianHeatmapEncoder::new(EncoderParams::default());
    c.bench_function("encode_14kp_640x360", |b| {
        b.iter(|| encoder.encode(black_box(&set), bounds, diagonals))
    });
}

fn bench_decode(c: &mut Criterion) {
    let (set, bounds, diagonals) = sample();
    let encoder = GaussianHeatmapEncoder::new(EncoderParams::default());
    let (stack, _) = encoder.encode(&set, bounds, diagonals).expect("encode");
    let decoder = HeatmapDecoder::new(DecoderParams::default());
    c.bench_function("decode_15ch_640x360", |b| {
        b.iter(|| decoder.decode_stack(black_box(&stack), 15))
    });
}

criterion_group!(heatmap_codec, bench_encode, bench_decode);
criterion_main!(heatmap_codec);
