//! Stateless 2D geometry helpers.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Relative tolerance on `|d1 x d2| / (|d1| |d2|)` below which two lines are
/// treated as parallel.
pub const PARALLEL_EPS: f64 = 1e-9;

/// A line segment given by two endpoints. Used both as a finite segment
/// (rendering) and as the infinite line through its endpoints (intersection).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub a: Point2<f64>,
    pub b: Point2<f64>,
}

impl Segment {
    pub fn new(a: Point2<f64>, b: Point2<f64>) -> Self {
        Self { a, b }
    }

    #[inline]
    pub fn length(&self) -> f64 {
        (self.b - self.a).norm()
    }
}

/// Intersection of the two infinite lines through `s1` and `s2`.
///
/// Returns `None` when the lines are parallel (within [`PARALLEL_EPS`],
/// scale-relative) or when either segment has zero length.
pub fn line_intersection(s1: &Segment, s2: &Segment) -> Option<Point2<f64>> {
    let d1 = s1.b - s1.a;
    let d2 = s2.b - s2.a;
    let n1 = d1.norm();
    let n2 = d2.norm();
    if !(n1 > f64::EPSILON && n2 > f64::EPSILON) {
        return None;
    }

    let det = d1.x * d2.y - d1.y * d2.x;
    if !det.is_finite() || det.abs() <= PARALLEL_EPS * n1 * n2 {
        return None;
    }

    // s1.a + t * d1 == s2.a + u * d2  =>  t = (w x d2) / (d1 x d2)
    let w = s2.a - s1.a;
    let t = (w.x * d2.y - w.y * d2.x) / det;
    let p = s1.a + d1 * t;
    (p.x.is_finite() && p.y.is_finite()).then_some(p)
}

/// Inclusive bounds test on `[0, width] x [0, height]`.
///
/// Non-finite coordinates are never in bounds.
#[inline]
pub fn in_bounds(x: f64, y: f64, width: f64, height: f64) -> bool {
    x.is_finite() && y.is_finite() && x >= 0.0 && x <= width && y >= 0.0 && y <= height
}

/// Sine of the angle at `a` in the triangle `(a, b, c)`; 0 for coincident points.
fn spread_sine(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let denom = ab.norm() * ac.norm();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (ab.x * ac.y - ab.y * ac.x).abs() / denom
}

fn is_collinear(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>, tol: f64) -> bool {
    spread_sine(a, b, c) < tol || spread_sine(b, c, a) < tol || spread_sine(c, a, b) < tol
}

/// True if at least one 4-subset of `points` has no three collinear points,
/// i.e. the set can determine a homography.
pub fn is_general_position(points: &[Point2<f64>], tol: f64) -> bool {
    let n = points.len();
    if n < 4 {
        return false;
    }
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                if is_collinear(points[i], points[j], points[k], tol) {
                    continue;
                }
                for l in (k + 1)..n {
                    let (p, q, r, s) = (points[i], points[j], points[k], points[l]);
                    if !is_collinear(p, q, s, tol)
                        && !is_collinear(p, r, s, tol)
                        && !is_collinear(q, r, s, tol)
                    {
                        return true;
                    }
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(ax: f64, ay: f64, bx: f64, by: f64) -> Segment {
        Segment::new(Point2::new(ax, ay), Point2::new(bx, by))
    }

    #[test]
    fn right_angle_returns_exact_corner() {
        let p = line_intersection(&seg(0.0, 0.0, 10.0, 0.0), &seg(5.0, -5.0, 5.0, 5.0))
            .expect("lines intersect");
        assert_eq!(p, Point2::new(5.0, 0.0));
    }

    #[test]
    fn intersection_extends_beyond_segments() {
        let p = line_intersection(&seg(0.0, 0.0, 1.0, 1.0), &seg(10.0, 0.0, 9.0, 1.0))
            .expect("lines intersect");
        approx::assert_abs_diff_eq!(p.x, 5.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(p.y, 5.0, epsilon = 1e-12);
    }

    #[test]
    fn court_diagonals_meet_at_center() {
        // Pickleball outer corners: 0=(180,300) 1=(580,300) 2=(180,1180) 3=(580,1180).
        let p = line_intersection(
            &seg(180.0, 300.0, 580.0, 1180.0),
            &seg(580.0, 300.0, 180.0, 1180.0),
        )
        .expect("diagonals intersect");
        approx::assert_abs_diff_eq!(p.x, 380.0, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(p.y, 740.0, epsilon = 1e-9);
    }

    #[test]
    fn parallel_lines_have_no_intersection() {
        assert!(line_intersection(&seg(0.0, 0.0, 10.0, 0.0), &seg(0.0, 3.0, 10.0, 3.0)).is_none());
        assert!(line_intersection(&seg(0.0, 0.0, 10.0, 10.0), &seg(5.0, 5.0, 20.0, 20.0)).is_none());
    }

    #[test]
    fn degenerate_segment_has_no_intersection() {
        assert!(line_intersection(&seg(1.0, 1.0, 1.0, 1.0), &seg(0.0, 0.0, 5.0, 5.0)).is_none());
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(in_bounds(0.0, 0.0, 1280.0, 720.0));
        assert!(in_bounds(1280.0, 720.0, 1280.0, 720.0));
        assert!(!in_bounds(-0.01, 10.0, 1280.0, 720.0));
        assert!(!in_bounds(10.0, 720.5, 1280.0, 720.0));
        assert!(!in_bounds(f64::NAN, 10.0, 1280.0, 720.0));
    }

    #[test]
    fn general_position_rejects_collinear_sets() {
        let line: Vec<Point2<f64>> = (0..6).map(|i| Point2::new(i as f64 * 10.0, 5.0)).collect();
        assert!(!is_general_position(&line, 1e-3));

        // Three on a line plus one off it still has no valid quad.
        let mut t = line[..3].to_vec();
        t.push(Point2::new(0.0, 50.0));
        assert!(!is_general_position(&t, 1e-3));

        let quad = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(is_general_position(&quad, 1e-3));
    }
}
