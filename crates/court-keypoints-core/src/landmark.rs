use crate::geometry::in_bounds;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Declared full-resolution size of the image landmarks live in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageBounds {
    pub width: f64,
    pub height: f64,
}

impl ImageBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Inclusive containment test, see [`in_bounds`].
    #[inline]
    pub fn contains(&self, p: Point2<f64>) -> bool {
        in_bounds(p.x, p.y, self.width, self.height)
    }
}

/// One semantically fixed court keypoint. Its identity is its index in the
/// owning [`LandmarkSet`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Landmark {
    Present(Point2<f64>),
    #[default]
    Missing,
}

impl Landmark {
    /// Present landmark at `(x, y)`; non-finite input collapses to `Missing`.
    pub fn new(x: f64, y: f64) -> Self {
        if x.is_finite() && y.is_finite() {
            Landmark::Present(Point2::new(x, y))
        } else {
            Landmark::Missing
        }
    }

    #[inline]
    pub fn position(&self) -> Option<Point2<f64>> {
        match self {
            Landmark::Present(p) => Some(*p),
            Landmark::Missing => None,
        }
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        matches!(self, Landmark::Present(_))
    }

    /// Present and inside `bounds`.
    #[inline]
    pub fn is_visible(&self, bounds: &ImageBounds) -> bool {
        self.position().is_some_and(|p| bounds.contains(p))
    }
}

impl From<Option<Point2<f64>>> for Landmark {
    fn from(p: Option<Point2<f64>>) -> Self {
        p.map_or(Landmark::Missing, |p| Landmark::new(p.x, p.y))
    }
}

/// Ordered, fixed-length set of landmarks for one sample.
///
/// Serializes as the dataset `kps` array: `[[x, y] | null, ...]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Option<[f64; 2]>>", into = "Vec<Option<[f64; 2]>>")]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
}

impl LandmarkSet {
    /// `len` landmarks, all missing.
    pub fn missing(len: usize) -> Self {
        Self {
            landmarks: vec![Landmark::Missing; len],
        }
    }

    pub fn from_landmarks(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Option<Point2<f64>>>,
    {
        Self {
            landmarks: points.into_iter().map(Landmark::from).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Landmark at `index`; out-of-range indices read as `Missing`.
    #[inline]
    pub fn get(&self, index: usize) -> Landmark {
        self.landmarks.get(index).copied().unwrap_or_default()
    }

    /// Replace the landmark at `index`. Returns `false` if out of range.
    pub fn set(&mut self, index: usize, landmark: Landmark) -> bool {
        match self.landmarks.get_mut(index) {
            Some(slot) => {
                *slot = landmark;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.iter()
    }

    pub fn as_slice(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Indices of landmarks that are present and inside `bounds`.
    pub fn visible_indices(&self, bounds: &ImageBounds) -> Vec<usize> {
        self.landmarks
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_visible(bounds))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn count_present(&self) -> usize {
        self.landmarks.iter().filter(|l| l.is_present()).count()
    }

    pub fn positions(&self) -> Vec<Option<Point2<f64>>> {
        self.landmarks.iter().map(Landmark::position).collect()
    }
}

impl From<Vec<Option<[f64; 2]>>> for LandmarkSet {
    fn from(raw: Vec<Option<[f64; 2]>>) -> Self {
        Self::from_points(raw.into_iter().map(|p| p.map(|[x, y]| Point2::new(x, y))))
    }
}

impl From<LandmarkSet> for Vec<Option<[f64; 2]>> {
    fn from(set: LandmarkSet) -> Self {
        set.landmarks
            .iter()
            .map(|l| l.position().map(|p| [p.x, p.y]))
            .collect()
    }
}

impl FromIterator<Landmark> for LandmarkSet {
    fn from_iter<T: IntoIterator<Item = Landmark>>(iter: T) -> Self {
        Self::from_landmarks(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_coordinates_become_missing() {
        assert_eq!(Landmark::new(f64::NAN, 3.0), Landmark::Missing);
        assert_eq!(Landmark::new(1.0, f64::INFINITY), Landmark::Missing);
        assert!(Landmark::new(1.0, 2.0).is_present());
    }

    #[test]
    fn visibility_uses_inclusive_bounds() {
        let b = ImageBounds::new(1280.0, 720.0);
        assert!(Landmark::new(1280.0, 720.0).is_visible(&b));
        assert!(!Landmark::new(1281.0, 10.0).is_visible(&b));
        assert!(!Landmark::Missing.is_visible(&b));
    }

    #[test]
    fn set_preserves_length_and_alignment() {
        let mut set = LandmarkSet::missing(3);
        assert!(set.set(1, Landmark::new(5.0, 6.0)));
        assert!(!set.set(3, Landmark::new(1.0, 1.0)));
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(1).position(), Some(Point2::new(5.0, 6.0)));
        assert_eq!(set.get(7), Landmark::Missing);
        assert_eq!(set.visible_indices(&ImageBounds::new(10.0, 10.0)), vec![1]);
    }

    #[test]
    fn serde_matches_dataset_kps_format() {
        let set: LandmarkSet = serde_json::from_str("[[10.0, 20.5], null, [-3.0, 4.0]]").unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(1), Landmark::Missing);
        assert_eq!(set.get(2).position(), Some(Point2::new(-3.0, 4.0)));
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, "[[10.0,20.5],null,[-3.0,4.0]]");
    }
}
