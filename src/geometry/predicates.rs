//! Geometric predicates for planar triangulation.
//!
//! Every predicate works on `f64` coordinates and absorbs floating-point noise
//! with the fixed tolerance [`EPSILON`]. Degenerate input never produces an
//! error from the classification predicates: parallel segments do not
//! intersect, collinear quadrilaterals are not convex, and so on. Only
//! [`circumcenter`] (and [`in_circumcircle`], which depends on it) reports
//! degeneracy, because it has no meaningful answer for collinear points.

use crate::geometry::point::Point2;
use thiserror::Error;

/// Tolerance used by every epsilon-aware predicate in this module.
pub const EPSILON: f64 = 1e-5;

// =============================================================================
// CLASSIFICATION ENUMS
// =============================================================================

/// Winding of a triangle or polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Negative signed area (ties are reported as clockwise)
    CLOCKWISE,
    /// Positive signed area
    COUNTERCLOCKWISE,
}

impl Orientation {
    /// The opposite winding.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::CLOCKWISE => Self::COUNTERCLOCKWISE,
            Self::COUNTERCLOCKWISE => Self::CLOCKWISE,
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CLOCKWISE => write!(f, "CLOCKWISE"),
            Self::COUNTERCLOCKWISE => write!(f, "COUNTERCLOCKWISE"),
        }
    }
}

/// Position of a point relative to a directed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineSide {
    /// The point is to the left of the line
    LEFT,
    /// The point is on the line (within [`EPSILON`])
    ON,
    /// The point is to the right of the line
    RIGHT,
}

impl std::fmt::Display for LineSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LEFT => write!(f, "LEFT"),
            Self::ON => write!(f, "ON"),
            Self::RIGHT => write!(f, "RIGHT"),
        }
    }
}

/// Position of a point relative to a circumcircle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InCircle {
    /// The point is outside the circumcircle
    OUTSIDE,
    /// The point is on the circumcircle (within `2 * EPSILON` on squared distances)
    BOUNDARY,
    /// The point is inside the circumcircle
    INSIDE,
}

impl std::fmt::Display for InCircle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OUTSIDE => write!(f, "OUTSIDE"),
            Self::BOUNDARY => write!(f, "BOUNDARY"),
            Self::INSIDE => write!(f, "INSIDE"),
        }
    }
}

/// Errors from circumcircle computations.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CircumcenterError {
    /// The three points are collinear, so no circle passes through them.
    #[error("Degenerate triangle ({a}, {b}, {c}): circumcenter is undefined")]
    DegenerateTriangle {
        /// First corner.
        a: Point2,
        /// Second corner.
        b: Point2,
        /// Third corner.
        c: Point2,
    },
}

// =============================================================================
// ORIENTATION
// =============================================================================

/// Twice the signed area of triangle `(a, b, c)`; positive when counter-clockwise.
#[inline]
#[must_use]
pub fn signed_area2(a: Point2, b: Point2, c: Point2) -> f64 {
    (b.x - a.x).mul_add(c.y - a.y, -((b.y - a.y) * (c.x - a.x)))
}

/// Smallest doubled area a triangle created by the triangulation may have.
///
/// One font unit of a 2048-unit em is about `5e-4` after normalization, so a
/// unit triangle on an integer grid stays well above this floor.
pub const MIN_FACE_AREA2: f64 = EPSILON * EPSILON;

/// `true` when `(a, b, c)` is clockwise with at least [`MIN_FACE_AREA2`].
///
/// ```rust
/// use glyphmesh::geometry::point::Point2;
/// use glyphmesh::geometry::predicates::is_strictly_clockwise;
///
/// let (a, b, c) = (Point2::new(0.0, 0.0), Point2::new(0.0, 1.0), Point2::new(1.0, 0.0));
/// assert!(is_strictly_clockwise(a, b, c));
/// assert!(!is_strictly_clockwise(a, c, b));
/// assert!(!is_strictly_clockwise(a, Point2::new(0.5, 0.0), c));
/// ```
#[inline]
#[must_use]
pub fn is_strictly_clockwise(a: Point2, b: Point2, c: Point2) -> bool {
    signed_area2(a, b, c) < -MIN_FACE_AREA2
}

/// Orientation of triangle `(a, b, c)`.
///
/// Zero area is reported as [`Orientation::CLOCKWISE`]; callers that care
/// about near-collinear input apply their own tolerance.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::geometry::point::Point2;
/// use glyphmesh::geometry::predicates::{orientation, Orientation};
///
/// let a = Point2::new(0.0, 0.0);
/// let b = Point2::new(1.0, 0.0);
/// let c = Point2::new(0.0, 1.0);
/// assert_eq!(orientation(a, b, c), Orientation::COUNTERCLOCKWISE);
/// assert_eq!(orientation(a, c, b), Orientation::CLOCKWISE);
/// ```
#[inline]
#[must_use]
pub fn orientation(a: Point2, b: Point2, c: Point2) -> Orientation {
    if signed_area2(a, b, c) > 0.0 {
        Orientation::COUNTERCLOCKWISE
    } else {
        Orientation::CLOCKWISE
    }
}

/// Classifies `p` against the directed line `a -> b`.
#[must_use]
pub fn side_of_line(a: Point2, b: Point2, p: Point2) -> LineSide {
    let det = (a.x - p.x).mul_add(b.y - p.y, -((a.y - p.y) * (b.x - p.x)));
    if det < -EPSILON {
        LineSide::RIGHT
    } else if det > EPSILON {
        LineSide::LEFT
    } else {
        LineSide::ON
    }
}

// =============================================================================
// CIRCUMCIRCLE
// =============================================================================

/// Center of the circle through `a`, `b` and `c`.
///
/// # Errors
///
/// Returns [`CircumcenterError::DegenerateTriangle`] when the points are
/// collinear or the result is not finite.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::geometry::point::Point2;
/// use glyphmesh::geometry::predicates::circumcenter;
///
/// let center = circumcenter(
///     Point2::new(0.0, 0.0),
///     Point2::new(2.0, 0.0),
///     Point2::new(0.0, 2.0),
/// )
/// .unwrap();
/// assert!((center.x - 1.0).abs() < 1e-12 && (center.y - 1.0).abs() < 1e-12);
/// ```
pub fn circumcenter(a: Point2, b: Point2, c: Point2) -> Result<Point2, CircumcenterError> {
    let degenerate = CircumcenterError::DegenerateTriangle { a, b, c };

    // The closed form below is written for clockwise input.
    let (a, b) = match orientation(a, b, c) {
        Orientation::CLOCKWISE => (a, b),
        Orientation::COUNTERCLOCKWISE => (b, a),
    };

    let x1 = b.x - a.x;
    let y1 = b.y - a.y;
    let x2 = c.x - a.x;
    let y2 = c.y - a.y;

    let det = x1.mul_add(y2, -(x2 * y1));
    if det.abs() < f64::MIN_POSITIVE {
        return Err(degenerate);
    }

    let l10 = x1.mul_add(x1, y1 * y1);
    let l20 = x2.mul_add(x2, y2 * y2);
    let denominator = 2.0 * det;

    let center = Point2::new(
        a.x + y2.mul_add(l10, -(y1 * l20)) / denominator,
        a.y + x1.mul_add(l20, -(x2 * l10)) / denominator,
    );
    if center.is_finite() {
        Ok(center)
    } else {
        Err(degenerate)
    }
}

/// Classifies `p` against the circumcircle of `(a, b, c)`.
///
/// # Errors
///
/// Propagates [`CircumcenterError`] for collinear `a`, `b`, `c`.
pub fn in_circumcircle(
    a: Point2,
    b: Point2,
    c: Point2,
    p: Point2,
) -> Result<InCircle, CircumcenterError> {
    let center = circumcenter(a, b, c)?;
    let radius_squared = center.squared_distance(a);
    let distance_squared = center.squared_distance(p);
    let tolerance = 2.0 * EPSILON;

    Ok(if distance_squared < radius_squared - tolerance {
        InCircle::INSIDE
    } else if distance_squared > radius_squared + tolerance {
        InCircle::OUTSIDE
    } else {
        InCircle::BOUNDARY
    })
}

// =============================================================================
// SEGMENTS AND QUADRILATERALS
// =============================================================================

/// Tests whether segment `a1 a2` intersects segment `b1 b2`.
///
/// With `include_endpoints` the segments may touch at their endpoints; without
/// it only proper crossings count. Parallel and near-parallel segments never
/// intersect.
#[must_use]
pub fn segments_intersect(
    a1: Point2,
    a2: Point2,
    b1: Point2,
    b2: Point2,
    include_endpoints: bool,
) -> bool {
    let denominator = (b2.y - b1.y).mul_add(a2.x - a1.x, -((b2.x - b1.x) * (a2.y - a1.y)));
    if denominator.abs() <= EPSILON {
        return false;
    }

    let u_a = (b2.x - b1.x).mul_add(a1.y - b1.y, -((b2.y - b1.y) * (a1.x - b1.x))) / denominator;
    let u_b = (a2.x - a1.x).mul_add(a1.y - b1.y, -((a2.y - a1.y) * (a1.x - b1.x))) / denominator;

    if include_endpoints {
        let range = -EPSILON..=1.0 + EPSILON;
        range.contains(&u_a) && range.contains(&u_b)
    } else {
        let inside = |u: f64| u > EPSILON && u < 1.0 - EPSILON;
        inside(u_a) && inside(u_b)
    }
}

#[inline]
fn opposite_signs(x: f64, y: f64) -> bool {
    (x > 0.0 && y < 0.0) || (x < 0.0 && y > 0.0)
}

/// `true` when the open segments `a1 a2` and `b1 b2` cross at a single
/// interior point of both.
///
/// Unlike [`segments_intersect`] this compares exact orientation signs, so
/// short segments are not treated as parallel. Touching at an endpoint and
/// collinear overlap do not count.
#[must_use]
pub fn segments_cross(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> bool {
    opposite_signs(signed_area2(a1, a2, b1), signed_area2(a1, a2, b2))
        && opposite_signs(signed_area2(b1, b2, a1), signed_area2(b1, b2, a2))
}

/// Tests whether the two triangles sharing diagonal `a b`, with apexes `c`
/// and `d`, form a strictly convex quadrilateral.
///
/// Flipping `a b` to `c d` is geometrically legal exactly when this holds.
#[must_use]
pub fn is_quadrilateral_convex(a: Point2, b: Point2, c: Point2, d: Point2) -> bool {
    segments_cross(a, b, c, d)
}

/// Projects `point` onto the segment `a b`.
///
/// Returns the parameter `t` of the foot point (`0` at `a`, `1` at `b`) and
/// the perpendicular distance, or `None` when the foot point does not fall
/// strictly between `a` and `b`.
#[must_use]
pub fn project_onto_segment_interior(a: Point2, b: Point2, point: Point2) -> Option<(f64, f64)> {
    let length_squared = a.squared_distance(b);
    if length_squared <= 0.0 {
        return None;
    }
    let t = (point.x - a.x).mul_add(b.x - a.x, (point.y - a.y) * (b.y - a.y)) / length_squared;
    if t <= 0.0 || t >= 1.0 {
        return None;
    }
    Some((t, signed_area2(a, b, point).abs() / length_squared.sqrt()))
}

/// Delaunay flip criterion for edge `a b` with apexes `c` (own face) and `d`
/// (neighbouring face).
///
/// The edge should be flipped when `d` lies strictly inside the circumcircle
/// of `(a, b, c)`, the quadrilateral is convex, and the flipped configuration
/// would not itself put `a` inside or on the circle of `(b, c, d)`. The last
/// condition stops near co-circular quads from flipping back and forth.
#[must_use]
pub fn violates_delaunay(a: Point2, b: Point2, c: Point2, d: Point2) -> bool {
    if !matches!(in_circumcircle(a, b, c, d), Ok(InCircle::INSIDE)) {
        return false;
    }
    if !is_quadrilateral_convex(a, b, c, d) {
        return false;
    }
    matches!(in_circumcircle(b, c, d, a), Ok(InCircle::OUTSIDE))
}

// =============================================================================
// POLYGONS
// =============================================================================

/// Signed area of a closed polygon (shoelace formula); positive when
/// counter-clockwise. The closing edge is implicit.
#[must_use]
pub fn polygon_signed_area(polygon: &[Point2]) -> f64 {
    let n = polygon.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let p = polygon[i];
            let q = polygon[(i + 1) % n];
            p.x.mul_add(q.y, -(q.x * p.y))
        })
        .sum();
    0.5 * twice
}

/// Winding of a closed polygon, or `None` when its area vanishes.
#[must_use]
pub fn polygon_winding(polygon: &[Point2]) -> Option<Orientation> {
    let area = polygon_signed_area(polygon);
    if area.abs() <= EPSILON * EPSILON {
        None
    } else if area > 0.0 {
        Some(Orientation::COUNTERCLOCKWISE)
    } else {
        Some(Orientation::CLOCKWISE)
    }
}

/// Even-odd containment test of `p` against a closed polygon.
#[must_use]
pub fn point_in_polygon(p: Point2, polygon: &[Point2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let pi = polygon[i];
        let pj = polygon[j];
        if (pi.y > p.y) != (pj.y > p.y) {
            let x_cross = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

// =============================================================================
// TESTS
// =============================================================================
