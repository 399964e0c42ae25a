use crate::geometry::is_general_position;
use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};
use serde::{Deserialize, Serialize};

/// Scale-relative floor on the homogeneous coordinate `w` during projection.
pub const HOMOGENEOUS_EPS: f64 = 1e-9;

/// Collinearity tolerance for the minimal 4-point solver.
const MIN_QUAD_SINE: f64 = 1e-6;

/// Planar projective transform, `p_dst ~ H * p_src`.
///
/// Estimated matrices are normalized so that `h[(2, 2)] == 1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        let h = &self.h;
        [
            [h[(0, 0)], h[(0, 1)], h[(0, 2)]],
            [h[(1, 0)], h[(1, 1)], h[(1, 2)]],
            [h[(2, 0)], h[(2, 1)], h[(2, 2)]],
        ]
    }

    /// Map `p` through the transform.
    ///
    /// Returns `None` when the point lands on (or numerically near) the line
    /// at infinity, or when the result is not finite.
    #[inline]
    pub fn project(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        let scale = (self.h[(2, 0)] * p.x).abs() + (self.h[(2, 1)] * p.y).abs() + self.h[(2, 2)].abs();
        if !w.is_finite() || w.abs() <= HOMOGENEOUS_EPS * scale.max(f64::MIN_POSITIVE) {
            return None;
        }
        let q = Point2::new(v[0] / w, v[1] / w);
        (q.x.is_finite() && q.y.is_finite()).then_some(q)
    }

    pub fn inverse(&self) -> Option<Self> {
        let inv = self.h.try_inverse()?;
        Some(Self::new(normalize_homography(inv).unwrap_or(inv)))
    }

    /// Finite entries and a determinant that is not vanishing relative to
    /// the matrix magnitude.
    pub fn is_well_conditioned(&self) -> bool {
        well_conditioned(&self.h)
    }
}

impl From<[[f64; 3]; 3]> for Homography {
    fn from(rows: [[f64; 3]; 3]) -> Self {
        Self::from_array(rows)
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        h.to_array()
    }
}

fn well_conditioned(h: &Matrix3<f64>) -> bool {
    if h.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let mag = h.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if mag <= f64::MIN_POSITIVE {
        return false;
    }
    h.determinant().abs() > 1e-12 * mag * mag * mag
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

/// Translate to the centroid and scale so the mean distance is sqrt(2).
fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let (sx, sy) = pts.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);

    let mean_dist = pts
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 {
        return None;
    }
    Some(h / s)
}

fn denormalize_homography(
    hn: Matrix3<f64>,
    t_src: Matrix3<f64>,
    t_dst: Matrix3<f64>,
) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    Some(t_dst_inv * hn * t_src)
}

/// Least-squares DLT estimate of `H` such that `dst ~ H * src`.
///
/// Uses Hartley normalization on both point sets. Exactly four
/// correspondences go through [`homography_from_4pt`]. Returns `None` for
/// mismatched/short inputs and for rank-deficient (degenerate) systems.
pub fn estimate_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Homography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    if src.len() == 4 {
        let s: &[Point2<f64>; 4] = src.try_into().ok()?;
        let d: &[Point2<f64>; 4] = dst.try_into().ok()?;
        return homography_from_4pt(s, d);
    }

    let (r, tr) = normalize_points(src);
    let (i, ti) = normalize_points(dst);

    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let (x, y) = (r[k].x, r[k].y);
        let (u, v) = (i[k].x, i[k].y);

        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;

        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }

    // h is the right singular vector of the smallest singular value.
    let svd = a.svd(false, true);
    let vt = svd.v_t?;
    let sv = &svd.singular_values;
    if sv.len() < 9 || sv.iter().any(|s| !s.is_finite()) {
        return None;
    }
    let mut order: Vec<usize> = (0..sv.len()).collect();
    order.sort_by(|&p, &q| sv[p].total_cmp(&sv[q]));
    let (smallest, second) = (order[0], order[1]);

    // A second (near) null direction means the correspondences do not pin
    // down a unique transform.
    if sv[second] <= 1e-10 * sv[order[order.len() - 1]] {
        return None;
    }

    let h = vt.row(smallest);
    let hn = Matrix3::<f64>::from_row_slice(&[h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]]);
    if !well_conditioned(&hn) {
        return None;
    }

    // H = Ti^{-1} * Hn * Tr
    let h_den = denormalize_homography(hn, tr, ti)?;
    let h_den = normalize_homography(h_den)?;
    let out = Homography::new(h_den);
    out.is_well_conditioned().then_some(out)
}

/// Exact `H` such that `dst ~ H * src` from 4 correspondences.
///
/// Corner order must be consistent between `src` and `dst`. Returns `None`
/// when three of the source or destination points are collinear.
pub fn homography_from_4pt(src: &[Point2<f64>; 4], dst: &[Point2<f64>; 4]) -> Option<Homography> {
    if !is_general_position(src, MIN_QUAD_SINE) || !is_general_position(dst, MIN_QUAD_SINE) {
        return None;
    }

    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    let (src_n, t_src) = normalize_points(src);
    let (dst_n, t_dst) = normalize_points(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let (x, y) = (src_n[k].x, src_n[k].y);
        let (u, v) = (dst_n[k].x, dst_n[k].y);

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let x = a.lu().solve(&b)?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );
    if !well_conditioned(&hn) {
        return None;
    }

    let h_den = denormalize_homography(hn, t_src, t_dst)?;
    let h_den = normalize_homography(h_den)?;
    let out = Homography::new(h_den);
    out.is_well_conditioned().then_some(out)
}

/// Euclidean distance `|H * src[k] - dst[k]|` per correspondence;
/// `f64::INFINITY` where the projection is undefined.
pub fn reprojection_errors(h: &Homography, src: &[Point2<f64>], dst: &[Point2<f64>]) -> Vec<f64> {
    src.iter()
        .zip(dst)
        .map(|(s, d)| h.project(*s).map_or(f64::INFINITY, |p| (p - *d).norm()))
        .collect()
}

/// Settings for [`estimate_homography_robust`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RobustParams {
    /// Reprojection distance (destination units) under which a
    /// correspondence counts as an inlier.
    pub inlier_threshold: f64,
    /// Cap on the number of minimal 4-point subsets evaluated.
    pub max_subsets: usize,
}

impl Default for RobustParams {
    fn default() -> Self {
        Self {
            inlier_threshold: 5.0,
            max_subsets: 5000,
        }
    }
}

/// Result of [`estimate_homography_robust`].
#[derive(Clone, Debug)]
pub struct RobustHomography {
    pub homography: Homography,
    /// Inlier flag per input correspondence.
    pub inliers: Vec<bool>,
    /// Mean reprojection error over inliers.
    pub mean_error: f64,
}

fn four_subsets(n: usize) -> impl Iterator<Item = [usize; 4]> {
    (0..n).flat_map(move |a| {
        ((a + 1)..n).flat_map(move |b| {
            ((b + 1)..n).flat_map(move |c| ((c + 1)..n).map(move |d| [a, b, c, d]))
        })
    })
}

fn score_inliers(errors: &[f64], threshold: f64) -> (usize, f64) {
    let (count, sum) = errors
        .iter()
        .filter(|e| **e <= threshold)
        .fold((0usize, 0.0), |(c, s), e| (c + 1, s + e));
    let mean = if count > 0 { sum / count as f64 } else { f64::INFINITY };
    (count, mean)
}

/// Outlier-tolerant estimate of `dst ~ H * src`.
///
/// Deterministic: evaluates minimal 4-point subsets in lexicographic order
/// (up to `params.max_subsets`), keeps the hypothesis with the most inliers
/// (ties broken by mean error), and refits a least-squares DLT on its
/// inliers.
pub fn estimate_homography_robust(
    src: &[Point2<f64>],
    dst: &[Point2<f64>],
    params: &RobustParams,
) -> Option<RobustHomography> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }

    let mut best: Option<(usize, f64, Homography)> = None;
    for quad in four_subsets(src.len()).take(params.max_subsets.max(1)) {
        let s = quad.map(|k| src[k]);
        let d = quad.map(|k| dst[k]);
        let Some(h) = homography_from_4pt(&s, &d) else {
            continue;
        };
        let errors = reprojection_errors(&h, src, dst);
        let (count, mean) = score_inliers(&errors, params.inlier_threshold);
        let better = match best {
            None => count >= 4,
            Some((bc, bm, _)) => count > bc || (count == bc && mean < bm),
        };
        if better {
            best = Some((count, mean, h));
        }
    }

    let (_, _, hypothesis) = best?;
    let errors = reprojection_errors(&hypothesis, src, dst);
    let inliers: Vec<bool> = errors.iter().map(|e| *e <= params.inlier_threshold).collect();
    let (in_src, in_dst): (Vec<_>, Vec<_>) = src
        .iter()
        .zip(dst)
        .zip(&inliers)
        .filter(|(_, keep)| **keep)
        .map(|((s, d), _)| (*s, *d))
        .unzip();

    let refined = estimate_homography(&in_src, &in_dst).unwrap_or(hypothesis);
    let errors = reprojection_errors(&refined, src, dst);
    let inliers: Vec<bool> = errors.iter().map(|e| *e <= params.inlier_threshold).collect();
    let (count, mean_error) = score_inliers(&errors, params.inlier_threshold);
    if count < 4 {
        return None;
    }

    Some(RobustHomography {
        homography: refined,
        inliers,
        mean_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point2<f64>, b: Point2<f64>, tol: f64) {
        let dx = (a.x - b.x).abs();
        let dy = (a.y - b.y).abs();
        assert!(
            dx < tol && dy < tol,
            "expected ({:.6},{:.6}) ~ ({:.6},{:.6}) within {}",
            a.x,
            a.y,
            b.x,
            b.y,
            tol
        );
    }

    fn court_like_truth() -> Homography {
        Homography::new(Matrix3::new(
            0.9, 0.25, 140.0, //
            0.02, 0.55, 60.0, //
            0.00002, 0.0004, 1.0,
        ))
    }

    fn grid(nx: usize, ny: usize, step: f64) -> Vec<Point2<f64>> {
        (0..ny)
            .flat_map(|y| (0..nx).map(move |x| Point2::new(x as f64 * step, y as f64 * step)))
            .collect()
    }

    #[test]
    fn inverse_round_trips_points() {
        let h = court_like_truth();
        let inv = h.inverse().expect("invertible");
        for p in [
            Point2::new(0.0, 0.0),
            Point2::new(50.0, -20.0),
            Point2::new(320.0, 200.0),
        ] {
            let q = h.project(p).expect("finite");
            assert_close(inv.project(q).expect("finite"), p, 1e-6);
        }
    }

    #[test]
    fn projection_on_line_at_infinity_is_rejected() {
        // w = 0.001 * x + 1 vanishes at x = -1000.
        let h = Homography::new(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.001, 0.0, 1.0));
        assert!(h.project(Point2::new(-1000.0, 3.0)).is_none());
        assert!(h.project(Point2::new(10.0, 3.0)).is_some());
    }

    #[test]
    fn four_point_solver_recovers_h() {
        let truth = court_like_truth();
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(400.0, 0.0),
            Point2::new(400.0, 880.0),
            Point2::new(0.0, 880.0),
        ];
        let dst = src.map(|p| truth.project(p).expect("finite"));
        let h = homography_from_4pt(&src, &dst).expect("recoverable");
        for p in [Point2::new(200.0, 440.0), Point2::new(60.0, 700.0)] {
            assert_close(h.project(p).unwrap(), truth.project(p).unwrap(), 1e-6);
        }
    }

    #[test]
    fn four_point_solver_rejects_collinear_triples() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 100.0),
            Point2::new(0.0, 200.0),
            Point2::new(50.0, 0.0),
        ];
        let dst = src;
        assert!(homography_from_4pt(&src, &dst).is_none());
    }

    #[test]
    fn dlt_handles_overdetermined_case() {
        let truth = court_like_truth();
        let src = grid(3, 4, 100.0);
        let dst: Vec<_> = src.iter().map(|p| truth.project(*p).unwrap()).collect();
        let h = estimate_homography(&src, &dst).expect("estimate");
        assert_close(
            h.project(Point2::new(150.0, 250.0)).unwrap(),
            truth.project(Point2::new(150.0, 250.0)).unwrap(),
            1e-6,
        );
        assert!(reprojection_errors(&h, &src, &dst).iter().all(|e| *e < 1e-6));
    }

    #[test]
    fn dlt_rejects_collinear_configuration() {
        let src: Vec<_> = (0..6).map(|k| Point2::new(k as f64 * 10.0, 0.0)).collect();
        let dst: Vec<_> = src.iter().map(|p| Point2::new(p.x * 2.0, 5.0)).collect();
        assert!(estimate_homography(&src, &dst).is_none());
    }

    #[test]
    fn mismatched_input_lengths_fail() {
        let src = [Point2::new(0.0, 0.0); 5];
        let dst = [Point2::new(1.0, 1.0); 4];
        assert!(estimate_homography(&src, &dst).is_none());
        assert!(estimate_homography(&src[..3], &dst[..3]).is_none());
    }

    #[test]
    fn robust_estimate_ignores_gross_outlier() {
        let truth = court_like_truth();
        let src = grid(3, 3, 150.0);
        let mut dst: Vec<_> = src.iter().map(|p| truth.project(*p).unwrap()).collect();
        dst[4].x += 80.0;
        dst[4].y -= 45.0;

        let robust = estimate_homography_robust(&src, &dst, &RobustParams::default())
            .expect("robust estimate");
        assert!(!robust.inliers[4]);
        assert_eq!(robust.inliers.iter().filter(|f| **f).count(), 8);
        assert!(robust.mean_error < 1e-6);
        let p = Point2::new(150.0, 150.0);
        assert_close(
            robust.homography.project(p).unwrap(),
            truth.project(p).unwrap(),
            1e-6,
        );
    }

    #[test]
    fn serde_uses_row_major_array() {
        let h = Homography::from_array([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 1.0]]);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, "[[1.0,2.0,3.0],[4.0,5.0,6.0],[7.0,8.0,1.0]]");
        let back: Homography = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
