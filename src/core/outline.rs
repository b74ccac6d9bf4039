//! Glyph outline classification and triangulation.
//!
//! A glyph arrives as a bag of closed contours with no hierarchy. Contours
//! wound like the largest one are outer boundaries; the others are holes and
//! belong to the smallest outer boundary that contains them. Each group is
//! triangulated on its own, so the "i" of a font yields two groups and the
//! "B" one group with two holes.

use crate::core::conversion::Triangle2;
use crate::core::triangulation::{ConstrainedTriangulation, TriangulationOptions};
use crate::geometry::point::Point2;
use crate::geometry::predicates::{
    Orientation, point_in_polygon, polygon_signed_area, polygon_winding,
};
use serde::{Deserialize, Serialize};

/// One outer contour with the holes it encloses.
///
/// The outer loop is counter-clockwise and every hole clockwise.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlineGroup {
    /// Counter-clockwise outer boundary
    pub outer: Vec<Point2>,
    /// Clockwise holes inside `outer`
    pub holes: Vec<Vec<Point2>>,
}

/// Triangles of a whole glyph.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlineTriangulation {
    /// Clockwise triangles of every group that succeeded
    pub triangles: Vec<Triangle2>,
    /// Groups triangulated
    pub groups: usize,
    /// Groups skipped because their triangulation failed
    pub failed_groups: usize,
}

fn oriented(mut contour: Vec<Point2>, winding: Orientation) -> Vec<Point2> {
    if polygon_winding(&contour).is_some_and(|w| w != winding) {
        contour.reverse();
    }
    contour
}

/// Splits contours into outer boundaries and their holes.
///
/// Contours with fewer than three points or no area are ignored, as are holes
/// no outer contour contains.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::outline::classify_contours;
/// use glyphmesh::geometry::point::Point2;
///
/// let square = |min: f64, max: f64| {
///     vec![
///         Point2::new(min, min),
///         Point2::new(max, min),
///         Point2::new(max, max),
///         Point2::new(min, max),
///     ]
/// };
/// let mut hole = square(2.0, 3.0);
/// hole.reverse();
///
/// let groups = classify_contours(&[hole, square(0.0, 5.0)]);
/// assert_eq!(groups.len(), 1);
/// assert_eq!(groups[0].outer, square(0.0, 5.0));
/// assert_eq!(groups[0].holes.len(), 1);
/// ```
#[must_use]
pub fn classify_contours(contours: &[Vec<Point2>]) -> Vec<OutlineGroup> {
    let measured: Vec<(&Vec<Point2>, f64)> = contours
        .iter()
        .filter(|c| c.len() >= 3)
        .map(|c| (c, polygon_signed_area(c)))
        .filter(|&(_, area)| area != 0.0 && area.is_finite())
        .collect();

    let Some(&(_, dominant)) = measured
        .iter()
        .max_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
    else {
        return Vec::new();
    };

    let (outers, holes): (Vec<_>, Vec<_>) = measured
        .into_iter()
        .partition(|&(_, area)| (area > 0.0) == (dominant > 0.0));

    let mut groups: Vec<OutlineGroup> = outers
        .iter()
        .map(|&(contour, _)| OutlineGroup {
            outer: oriented(contour.clone(), Orientation::COUNTERCLOCKWISE),
            holes: Vec::new(),
        })
        .collect();

    for (hole, _) in holes {
        let owner = outers
            .iter()
            .enumerate()
            .filter(|(_, (outer, _))| hole.iter().all(|&p| point_in_polygon(p, outer)))
            .min_by(|(_, (_, a)), (_, (_, b))| a.abs().total_cmp(&b.abs()))
            .map(|(i, _)| i);
        match owner {
            Some(i) => groups[i]
                .holes
                .push(oriented(hole.clone(), Orientation::CLOCKWISE)),
            None => tracing::warn!(
                "Dropping a hole of {} points that no outer contour contains",
                hole.len()
            ),
        }
    }
    groups
}

/// Classifies `contours` and triangulates every group.
///
/// A group whose triangulation fails is logged and skipped so one malformed
/// contour does not cost the whole glyph.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::outline::triangulate_outline;
/// use glyphmesh::core::triangulation::TriangulationOptions;
/// use glyphmesh::geometry::point::Point2;
///
/// // Two separate squares, such as the stem and dot of an "i".
/// let stem = vec![
///     Point2::new(0.0, 0.0),
///     Point2::new(1.0, 0.0),
///     Point2::new(1.0, 3.0),
///     Point2::new(0.0, 3.0),
/// ];
/// let dot = vec![
///     Point2::new(0.0, 4.0),
///     Point2::new(1.0, 4.0),
///     Point2::new(1.0, 5.0),
///     Point2::new(0.0, 5.0),
/// ];
/// let result = triangulate_outline(&[stem, dot], TriangulationOptions::default());
/// assert_eq!(result.groups, 2);
/// assert_eq!(result.triangles.len(), 4);
/// ```
#[must_use]
pub fn triangulate_outline(
    contours: &[Vec<Point2>],
    options: TriangulationOptions,
) -> OutlineTriangulation {
    let mut result = OutlineTriangulation::default();
    for group in classify_contours(contours) {
        let triangles = ConstrainedTriangulation::new(&[], &group.outer, &group.holes, options)
            .map_err(|e| e.to_string())
            .and_then(|cdt| cdt.triangles().map_err(|e| e.to_string()));
        match triangles {
            Ok(triangles) => {
                result.triangles.extend(triangles);
                result.groups += 1;
            }
            Err(error) => {
                tracing::warn!(
                    "Skipping outline group with {} points and {} holes: {error}",
                    group.outer.len(),
                    group.holes.len()
                );
                result.failed_groups += 1;
            }
        }
    }
    result
}
