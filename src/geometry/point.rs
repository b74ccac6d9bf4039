//! 2D points and their position identity.
//!
//! # Position identity
//!
//! Mesh vertices are identified by their coordinates: two vertices at the same
//! position are the same vertex. [`Point2`] keeps IEEE 754 `PartialEq`
//! semantics, so hashing goes through [`PositionKey`], which compares the bit
//! patterns of both coordinates after folding `-0.0` into `0.0`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};

// =============================================================================
// POINT STRUCT DEFINITION
// =============================================================================

/// A point in the plane.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::geometry::point::Point2;
///
/// let p = Point2::new(1.0, 2.0);
/// assert_eq!(p.x, 1.0);
/// assert_eq!(p.to_array(), [1.0, 2.0]);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Point2 {
    /// Creates a point from its coordinates.
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns the coordinates as an array.
    #[inline]
    #[must_use]
    pub const fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Returns `true` if both coordinates are finite.
    #[inline]
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Squared Euclidean distance to `other`.
    #[inline]
    #[must_use]
    pub fn squared_distance(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to `other`.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.squared_distance(other).sqrt()
    }

    /// The identity key used for position-based deduplication.
    #[inline]
    #[must_use]
    pub fn key(self) -> PositionKey {
        PositionKey::from(self)
    }
}

// =============================================================================
// TRAIT IMPLEMENTATIONS
// =============================================================================

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<[f64; 2]> for Point2 {
    #[inline]
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<(f64, f64)> for Point2 {
    #[inline]
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl From<Point2> for [f64; 2] {
    #[inline]
    fn from(p: Point2) -> Self {
        p.to_array()
    }
}

impl Add for Point2 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point2 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

// =============================================================================
// POSITION KEY
// =============================================================================

/// Hashable identity of a position.
///
/// Two points share a key exactly when their coordinates are equal, treating
/// `0.0` and `-0.0` as the same value.
///
/// ```rust
/// use glyphmesh::geometry::point::Point2;
///
/// assert_eq!(Point2::new(0.0, 1.0).key(), Point2::new(-0.0, 1.0).key());
/// assert_ne!(Point2::new(0.0, 1.0).key(), Point2::new(0.0, 1.0 + 1e-12).key());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey([u64; 2]);

impl From<Point2> for PositionKey {
    #[inline]
    fn from(p: Point2) -> Self {
        // Adding 0.0 folds -0.0 into +0.0 and leaves every other value unchanged.
        Self([(p.x + 0.0).to_bits(), (p.y + 0.0).to_bits()])
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collections::FastHashSet;

    #[test]
    fn test_point_arithmetic() {
        let a = Point2::new(1.0, 2.0);
        let b = Point2::new(3.0, -1.0);
        assert_eq!(a + b, Point2::new(4.0, 1.0));
        assert_eq!(b - a, Point2::new(2.0, -3.0));
        assert_eq!(a * 2.0, Point2::new(2.0, 4.0));
        assert!((a.squared_distance(b) - 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_position_key_dedups_signed_zero() {
        let mut seen = FastHashSet::default();
        assert!(seen.insert(Point2::new(0.0, 0.0).key()));
        assert!(!seen.insert(Point2::new(-0.0, 0.0).key()));
        assert!(!seen.insert(Point2::new(0.0, -0.0).key()));
        assert!(seen.insert(Point2::new(f64::EPSILON, 0.0).key()));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_point_conversions_and_display() {
        let p: Point2 = [1.5, -2.0].into();
        assert_eq!(p, Point2::from((1.5, -2.0)));
        let arr: [f64; 2] = p.into();
        assert_eq!(arr, [1.5, -2.0]);
        assert_eq!(p.to_string(), "(1.5, -2)");
        assert!(p.is_finite());
        assert!(!Point2::new(f64::NAN, 0.0).is_finite());
    }
}
