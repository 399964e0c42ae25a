//! Canonical landmark coordinates and reference lines for a court layout.

use crate::spec::{CourtKind, CourtSpec, PickleballDimensions, TennisDimensions};
use court_keypoints_core::{line_intersection, Segment};
use nalgebra::Point2;
use serde::Serialize;

/// Court specification validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReferenceError {
    #[error("{name} must be finite and > 0 (got {value})")]
    InvalidDimension { name: &'static str, value: f64 },
    #[error("{name} does not fit inside the court")]
    ZoneExceedsCourt { name: &'static str },
}

/// A named court line in reference coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub name: &'static str,
    pub segment: Segment,
}

/// Immutable reference geometry of one court layout.
#[derive(Clone, Debug)]
pub struct CourtReferenceModel {
    spec: CourtSpec,
    keypoints: Vec<Point2<f64>>,
    lines: Vec<ReferenceLine>,
    canvas: (usize, usize),
    diagonals: [(usize, usize); 2],
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ReferenceError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ReferenceError::InvalidDimension { name, value })
    }
}

fn require_border(name: &'static str, value: f64) -> Result<(), ReferenceError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ReferenceError::InvalidDimension { name, value })
    }
}

fn line(name: &'static str, a: Point2<f64>, b: Point2<f64>) -> ReferenceLine {
    ReferenceLine {
        name,
        segment: Segment::new(a, b),
    }
}

fn canvas_size(court_w: f64, court_h: f64, border_x: f64, border_y: f64) -> (usize, usize) {
    (
        (court_w + 2.0 * border_x).ceil() as usize,
        (court_h + 2.0 * border_y).ceil() as usize,
    )
}

/// Landmark order:
/// 0/1 top baseline L/R, 2/3 bottom baseline L/R, 4/5 top kitchen line L/R,
/// 6/7 bottom kitchen line L/R, 8/9 net L/R, 10/11 top center line ends,
/// 12/13 bottom center line ends.
fn pickleball(d: &PickleballDimensions) -> Result<CourtReferenceModel, ReferenceError> {
    require_positive("court_length", d.court_length)?;
    require_positive("court_width", d.court_width)?;
    require_positive("non_volley_zone", d.non_volley_zone)?;
    require_positive("service_area_length", d.service_area_length)?;
    require_border("top_bottom_border", d.top_bottom_border)?;
    require_border("right_left_border", d.right_left_border)?;
    let half = d.court_length / 2.0;
    if d.non_volley_zone >= half {
        return Err(ReferenceError::ZoneExceedsCourt {
            name: "non_volley_zone",
        });
    }
    if d.service_area_length > half {
        return Err(ReferenceError::ZoneExceedsCourt {
            name: "service_area_length",
        });
    }

    let left = d.right_left_border;
    let right = left + d.court_width;
    let mid_x = left + d.court_width / 2.0;
    let top = d.top_bottom_border;
    let bottom = top + d.court_length;
    let net_y = top + half;
    let kitchen_top = net_y - d.non_volley_zone;
    let kitchen_bottom = net_y + d.non_volley_zone;

    let p = Point2::new;
    let keypoints = vec![
        p(left, top),
        p(right, top),
        p(left, bottom),
        p(right, bottom),
        p(left, kitchen_top),
        p(right, kitchen_top),
        p(left, kitchen_bottom),
        p(right, kitchen_bottom),
        p(left, net_y),
        p(right, net_y),
        p(mid_x, top),
        p(mid_x, top + d.service_area_length),
        p(mid_x, kitchen_bottom),
        p(mid_x, bottom),
    ];

    let lines = vec![
        line("baseline_top", p(left, top), p(right, top)),
        line("baseline_bottom", p(left, bottom), p(right, bottom)),
        line("net", p(left, net_y), p(right, net_y)),
        line("left_sideline", p(left, top), p(left, bottom)),
        line("right_sideline", p(right, top), p(right, bottom)),
        line("non_volley_line_top", p(left, kitchen_top), p(right, kitchen_top)),
        line(
            "non_volley_line_bottom",
            p(left, kitchen_bottom),
            p(right, kitchen_bottom),
        ),
        line("top_middle_line", p(mid_x, top), p(mid_x, top + d.service_area_length)),
        line("bottom_middle_line", p(mid_x, kitchen_bottom), p(mid_x, bottom)),
    ];

    Ok(CourtReferenceModel {
        spec: CourtSpec::Pickleball(*d),
        keypoints,
        lines,
        canvas: canvas_size(
            d.court_width,
            d.court_length,
            d.right_left_border,
            d.top_bottom_border,
        ),
        diagonals: [(0, 3), (1, 2)],
    })
}

/// Landmark order:
/// 0/1 top baseline, 2/3 bottom baseline, 4/5 left singles line top/bottom,
/// 6/7 right singles line top/bottom, 8/9 top service line L/R,
/// 10/11 bottom service line L/R, 12/13 center service line top/bottom.
fn tennis(d: &TennisDimensions) -> Result<CourtReferenceModel, ReferenceError> {
    require_positive("court_length", d.court_length)?;
    require_positive("doubles_width", d.doubles_width)?;
    require_positive("singles_inset", d.singles_inset)?;
    require_positive("service_line_depth", d.service_line_depth)?;
    require_border("top_bottom_border", d.top_bottom_border)?;
    require_border("right_left_border", d.right_left_border)?;
    if 2.0 * d.singles_inset >= d.doubles_width {
        return Err(ReferenceError::ZoneExceedsCourt {
            name: "singles_inset",
        });
    }
    if 2.0 * d.service_line_depth >= d.court_length {
        return Err(ReferenceError::ZoneExceedsCourt {
            name: "service_line_depth",
        });
    }

    let left = d.right_left_border;
    let right = left + d.doubles_width;
    let inner_left = left + d.singles_inset;
    let inner_right = right - d.singles_inset;
    let mid_x = left + d.doubles_width / 2.0;
    let top = d.top_bottom_border;
    let bottom = top + d.court_length;
    let net_y = top + d.court_length / 2.0;
    let service_top = top + d.service_line_depth;
    let service_bottom = bottom - d.service_line_depth;

    let p = Point2::new;
    let keypoints = vec![
        p(left, top),
        p(right, top),
        p(left, bottom),
        p(right, bottom),
        p(inner_left, top),
        p(inner_left, bottom),
        p(inner_right, top),
        p(inner_right, bottom),
        p(inner_left, service_top),
        p(inner_right, service_top),
        p(inner_left, service_bottom),
        p(inner_right, service_bottom),
        p(mid_x, service_top),
        p(mid_x, service_bottom),
    ];

    let lines = vec![
        line("baseline_top", p(left, top), p(right, top)),
        line("baseline_bottom", p(left, bottom), p(right, bottom)),
        line("net", p(left, net_y), p(right, net_y)),
        line("left_court_line", p(left, top), p(left, bottom)),
        line("right_court_line", p(right, top), p(right, bottom)),
        line("left_inner_line", p(inner_left, top), p(inner_left, bottom)),
        line("right_inner_line", p(inner_right, top), p(inner_right, bottom)),
        line("middle_line", p(mid_x, service_top), p(mid_x, service_bottom)),
        line("top_inner_line", p(inner_left, service_top), p(inner_right, service_top)),
        line(
            "bottom_inner_line",
            p(inner_left, service_bottom),
            p(inner_right, service_bottom),
        ),
    ];

    Ok(CourtReferenceModel {
        spec: CourtSpec::Tennis(*d),
        keypoints,
        lines,
        canvas: canvas_size(
            d.doubles_width,
            d.court_length,
            d.right_left_border,
            d.top_bottom_border,
        ),
        diagonals: [(0, 3), (1, 2)],
    })
}

impl CourtReferenceModel {
    /// Validate `spec` and compute the reference geometry.
    pub fn new(spec: CourtSpec) -> Result<Self, ReferenceError> {
        match &spec {
            CourtSpec::Pickleball(d) => pickleball(d),
            CourtSpec::Tennis(d) => tennis(d),
        }
    }

    #[inline]
    pub fn spec(&self) -> &CourtSpec {
        &self.spec
    }

    #[inline]
    pub fn kind(&self) -> CourtKind {
        self.spec.kind()
    }

    /// Canonical landmark positions, in fixed semantic order.
    #[inline]
    pub fn landmark_coordinates(&self) -> &[Point2<f64>] {
        &self.keypoints
    }

    /// Canonical position of landmark `index`.
    #[inline]
    pub fn landmark(&self, index: usize) -> Option<Point2<f64>> {
        self.keypoints.get(index).copied()
    }

    /// Named line segments; only used to render the debug mask.
    #[inline]
    pub fn reference_lines(&self) -> &[ReferenceLine] {
        &self.lines
    }

    /// Number of physical landmarks (K).
    #[inline]
    pub fn num_landmarks(&self) -> usize {
        self.keypoints.len()
    }

    /// Heatmap channels: one per landmark plus the synthetic center.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.keypoints.len() + 1
    }

    /// `(width, height)` of the reference canvas including borders.
    #[inline]
    pub fn canvas_size(&self) -> (usize, usize) {
        self.canvas
    }

    /// Landmark index pairs whose connecting lines cross at the court center.
    #[inline]
    pub fn center_diagonals(&self) -> [(usize, usize); 2] {
        self.diagonals
    }

    /// Court center in reference coordinates.
    pub fn center_point(&self) -> Option<Point2<f64>> {
        let [(a0, a1), (b0, b1)] = self.diagonals;
        let d0 = Segment::new(self.landmark(a0)?, self.landmark(a1)?);
        let d1 = Segment::new(self.landmark(b0)?, self.landmark(b1)?);
        line_intersection(&d0, &d1)
    }
}
