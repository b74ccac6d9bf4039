//! Coordinate normalization.
//!
//! Triangulation predicates compare determinants against a fixed
//! [`EPSILON`](crate::geometry::predicates::EPSILON). Mapping the input into a
//! unit-sized box first keeps that tolerance meaningful regardless of the
//! font units the outline arrives in.

use crate::geometry::point::Point2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while deriving a normalization transform.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum NormalizerError {
    /// No points were supplied.
    #[error("Cannot normalize an empty point set")]
    EmptyInput,
    /// The bounding box has no extent (a single distinct point) or is not finite.
    #[error("Degenerate bounding box with largest dimension {extent}")]
    DegenerateBounds {
        /// The larger of the bounding box's width and height.
        extent: f64,
    },
}

// =============================================================================
// AXIS-ALIGNED BOUNDING BOX
// =============================================================================

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Lower-left corner.
    pub min: Point2,
    /// Upper-right corner.
    pub max: Point2,
}

impl Aabb {
    /// Bounding box of `points`, or `None` when the iterator is empty.
    ///
    /// ```rust
    /// use glyphmesh::geometry::normalizer::Aabb;
    /// use glyphmesh::geometry::point::Point2;
    ///
    /// let bounds = Aabb::from_points([Point2::new(1.0, 5.0), Point2::new(-2.0, 3.0)]).unwrap();
    /// assert_eq!(bounds.min, Point2::new(-2.0, 3.0));
    /// assert_eq!(bounds.width(), 3.0);
    /// ```
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point2>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self { min: first, max: first }, |bounds, p| Self {
            min: Point2::new(bounds.min.x.min(p.x), bounds.min.y.min(p.y)),
            max: Point2::new(bounds.max.x.max(p.x), bounds.max.y.max(p.y)),
        }))
    }

    /// Horizontal extent.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Vertical extent.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Larger of width and height.
    #[must_use]
    pub fn max_extent(&self) -> f64 {
        self.width().max(self.height())
    }

    /// Center of the box.
    #[must_use]
    pub fn center(&self) -> Point2 {
        Point2::new(
            0.5 * (self.min.x + self.max.x),
            0.5 * (self.min.y + self.max.y),
        )
    }
}

// =============================================================================
// NORMALIZER
// =============================================================================

/// Uniform scale-and-translate transform into (roughly) the unit square.
///
/// Points are mapped with `(p - min) / d_max` where `d_max` is the larger
/// bounding-box dimension, so the aspect ratio is preserved and every
/// normalized coordinate lies in `[0, 1]`.
///
/// ```rust
/// use glyphmesh::geometry::normalizer::Normalizer;
/// use glyphmesh::geometry::point::Point2;
///
/// let points = [Point2::new(10.0, 10.0), Point2::new(30.0, 20.0)];
/// let normalizer = Normalizer::new(points).unwrap();
/// assert_eq!(normalizer.normalize(Point2::new(30.0, 20.0)), Point2::new(1.0, 0.5));
/// assert_eq!(normalizer.unnormalize(Point2::new(1.0, 0.5)), Point2::new(30.0, 20.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    origin: Point2,
    scale: f64,
}

impl Normalizer {
    /// Derives the transform from the bounding box of `points`.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizerError::EmptyInput`] for no points and
    /// [`NormalizerError::DegenerateBounds`] when the bounding box has zero or
    /// non-finite extent.
    pub fn new<I>(points: I) -> Result<Self, NormalizerError>
    where
        I: IntoIterator<Item = Point2>,
    {
        let bounds = Aabb::from_points(points).ok_or(NormalizerError::EmptyInput)?;
        Self::from_bounds(&bounds)
    }

    /// Derives the transform from a precomputed bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizerError::DegenerateBounds`] when the box has zero or
    /// non-finite extent.
    pub fn from_bounds(bounds: &Aabb) -> Result<Self, NormalizerError> {
        let extent = bounds.max_extent();
        if !(extent.is_finite() && extent > 0.0) || !bounds.min.is_finite() {
            return Err(NormalizerError::DegenerateBounds { extent });
        }
        Ok(Self {
            origin: bounds.min,
            scale: extent,
        })
    }

    /// The transform that leaves every point unchanged.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            origin: Point2::new(0.0, 0.0),
            scale: 1.0,
        }
    }

    /// Bounding-box minimum the transform is anchored at.
    #[must_use]
    pub const fn origin(&self) -> Point2 {
        self.origin
    }

    /// Uniform scale factor (`d_max`).
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Maps an input point into normalized space.
    #[inline]
    #[must_use]
    pub fn normalize(&self, p: Point2) -> Point2 {
        Point2::new(
            (p.x - self.origin.x) / self.scale,
            (p.y - self.origin.y) / self.scale,
        )
    }

    /// Maps a normalized point back into input space.
    #[inline]
    #[must_use]
    pub fn unnormalize(&self, p: Point2) -> Point2 {
        Point2::new(
            p.x.mul_add(self.scale, self.origin.x),
            p.y.mul_add(self.scale, self.origin.y),
        )
    }

    /// Normalizes every point of a slice.
    #[must_use]
    pub fn normalize_all(&self, points: &[Point2]) -> Vec<Point2> {
        points.iter().map(|&p| self.normalize(p)).collect()
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::identity()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_aabb_from_points() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());

        let bounds = Aabb::from_points([
            Point2::new(1.0, -1.0),
            Point2::new(-3.0, 2.0),
            Point2::new(0.0, 5.0),
        ])
        .unwrap();
        assert_eq!(bounds.min, Point2::new(-3.0, -1.0));
        assert_eq!(bounds.max, Point2::new(1.0, 5.0));
        assert_relative_eq!(bounds.max_extent(), 6.0);
        assert_eq!(bounds.center(), Point2::new(-1.0, 2.0));
    }

    #[test]
    fn test_normalize_uses_larger_dimension() {
        let normalizer =
            Normalizer::new([Point2::new(0.0, 0.0), Point2::new(10.0, 2.0)]).unwrap();
        assert_relative_eq!(normalizer.scale(), 10.0);
        let n = normalizer.normalize(Point2::new(5.0, 2.0));
        assert_relative_eq!(n.x, 0.5);
        assert_relative_eq!(n.y, 0.2);
    }

    #[test]
    fn test_normalize_round_trip() {
        let points = [
            Point2::new(-512.25, 300.0),
            Point2::new(1024.0, -7.5),
            Point2::new(3.125, 900.75),
        ];
        let normalizer = Normalizer::new(points).unwrap();
        for p in points {
            let back = normalizer.unnormalize(normalizer.normalize(p));
            assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
            assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_normalizer_errors() {
        let empty = Normalizer::new(std::iter::empty());
        assert_eq!(empty, Err(NormalizerError::EmptyInput));

        let single = Normalizer::new([Point2::new(1.0, 1.0), Point2::new(1.0, 1.0)]);
        assert!(
            matches!(single, Err(NormalizerError::DegenerateBounds { .. })),
            "Expected degenerate bounds, got {single:?}"
        );

        let infinite = Normalizer::new([Point2::new(0.0, 0.0), Point2::new(f64::INFINITY, 1.0)]);
        assert!(matches!(infinite, Err(NormalizerError::DegenerateBounds { .. })));
    }

    #[test]
    fn test_identity_normalizer() {
        let p = Point2::new(3.5, -2.0);
        assert_eq!(Normalizer::identity().normalize(p), p);
        assert_eq!(Normalizer::default().unnormalize(p), p);
    }
}
