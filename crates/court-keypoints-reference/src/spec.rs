//! Physical court parameters, expressed in reference-canvas pixels.

use serde::{Deserialize, Serialize};

/// Supported court layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourtKind {
    Pickleball,
    Tennis,
}

/// Pickleball court, scaled to 20 px per foot by default.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickleballDimensions {
    /// Baseline to baseline (44 ft).
    pub court_length: f64,
    /// Sideline to sideline (20 ft).
    pub court_width: f64,
    /// Net to kitchen line (7 ft).
    pub non_volley_zone: f64,
    /// Baseline to the far end of the top center line (15 ft).
    pub service_area_length: f64,
    pub top_bottom_border: f64,
    pub right_left_border: f64,
    /// Rendered line thickness in pixels (debug mask only).
    pub line_width: u32,
}

impl Default for PickleballDimensions {
    fn default() -> Self {
        Self {
            court_length: 880.0,
            court_width: 400.0,
            non_volley_zone: 140.0,
            service_area_length: 300.0,
            top_bottom_border: 300.0,
            right_left_border: 180.0,
            line_width: 1,
        }
    }
}

/// Tennis court (doubles outline with singles sidelines).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TennisDimensions {
    pub court_length: f64,
    pub doubles_width: f64,
    /// Distance from a doubles sideline to the adjacent singles sideline.
    pub singles_inset: f64,
    /// Baseline to service line.
    pub service_line_depth: f64,
    pub top_bottom_border: f64,
    pub right_left_border: f64,
    pub line_width: u32,
}

impl Default for TennisDimensions {
    fn default() -> Self {
        Self {
            court_length: 2374.0,
            doubles_width: 1093.0,
            singles_inset: 137.0,
            service_line_depth: 549.0,
            top_bottom_border: 561.0,
            right_left_border: 286.0,
            line_width: 1,
        }
    }
}

/// Court type plus its dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CourtSpec {
    Pickleball(PickleballDimensions),
    Tennis(TennisDimensions),
}

impl Default for CourtSpec {
    fn default() -> Self {
        Self::pickleball()
    }
}

impl CourtSpec {
    pub fn pickleball() -> Self {
        CourtSpec::Pickleball(PickleballDimensions::default())
    }

    pub fn tennis() -> Self {
        CourtSpec::Tennis(TennisDimensions::default())
    }

    /// Default dimensions for `kind`.
    pub fn for_kind(kind: CourtKind) -> Self {
        match kind {
            CourtKind::Pickleball => Self::pickleball(),
            CourtKind::Tennis => Self::tennis(),
        }
    }

    pub fn kind(&self) -> CourtKind {
        match self {
            CourtSpec::Pickleball(_) => CourtKind::Pickleball,
            CourtSpec::Tennis(_) => CourtKind::Tennis,
        }
    }

    pub fn line_width(&self) -> u32 {
        match self {
            CourtSpec::Pickleball(d) => d.line_width,
            CourtSpec::Tennis(d) => d.line_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_tag_selects_court_and_fills_defaults() {
        let spec: CourtSpec =
            serde_json::from_str(r#"{ "type": "pickleball", "court_length": 900.0 }"#).unwrap();
        let CourtSpec::Pickleball(d) = spec else {
            panic!("expected pickleball, got {spec:?}");
        };
        assert_eq!(d.court_length, 900.0);
        assert_eq!(d.court_width, 400.0);

        let spec: CourtSpec = serde_json::from_str(r#"{ "type": "tennis" }"#).unwrap();
        assert_eq!(spec, CourtSpec::tennis());
        assert_eq!(spec.kind(), CourtKind::Tennis);
    }
}
