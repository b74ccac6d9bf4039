//! Delaunay empty-circumcircle property validation.

use crate::core::collections::FastHashSet;
use crate::core::edge::EdgeKey;
use crate::core::half_edge_mesh::{HalfEdgeKey, HalfEdgeMesh, MeshError};
use crate::geometry::predicates::violates_delaunay;
use thiserror::Error;

/// Errors that can occur during Delaunay property validation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DelaunayValidationError {
    /// An interior edge fails the circumcircle test.
    #[error("Edge {half_edge:?} violates the Delaunay property")]
    DelaunayViolation {
        /// One half-edge of the offending edge.
        half_edge: HalfEdgeKey,
    },
    /// The mesh references a missing element.
    #[error("Mesh corruption: {source}")]
    Mesh {
        /// The underlying mesh error.
        #[from]
        source: MeshError,
    },
}

/// Finds interior edges whose neighbouring apex lies strictly inside the
/// circumcircle of the edge's own face.
///
/// Edges in `constraints` are exempt, as are boundary edges. Each offending
/// edge is reported once. Degenerate faces, for which no circumcircle exists,
/// are skipped.
///
/// # Errors
///
/// [`DelaunayValidationError::Mesh`] if the mesh is inconsistent.
///
/// # Examples
///
/// ```
/// use glyphmesh::core::half_edge_mesh::HalfEdgeMesh;
/// use glyphmesh::core::util::delaunay_validation::find_delaunay_violations;
/// use glyphmesh::geometry::point::Point2;
///
/// let mut mesh = HalfEdgeMesh::new();
/// let a = mesh.insert_vertex(Point2::new(0.0, 0.0));
/// let b = mesh.insert_vertex(Point2::new(1.0, 0.0));
/// let c = mesh.insert_vertex(Point2::new(1.0, 1.0));
/// let d = mesh.insert_vertex(Point2::new(0.0, 1.0));
/// mesh.add_triangle(a, b, c).unwrap();
/// mesh.add_triangle(a, c, d).unwrap();
///
/// assert!(find_delaunay_violations(&mesh, None).unwrap().is_empty());
/// ```
pub fn find_delaunay_violations(
    mesh: &HalfEdgeMesh,
    constraints: Option<&FastHashSet<EdgeKey>>,
) -> Result<Vec<HalfEdgeKey>, DelaunayValidationError> {
    let mut seen: FastHashSet<EdgeKey> = FastHashSet::default();
    let mut violations = Vec::new();

    for (half_edge, record) in mesh.half_edges() {
        let Some(twin) = record.opposite() else {
            continue;
        };
        let edge = EdgeKey::of_half_edge(mesh, half_edge)?;
        if constraints.is_some_and(|set| set.contains(&edge)) || !seen.insert(edge) {
            continue;
        }

        let (a, b) = mesh.edge_positions(half_edge)?;
        let c = mesh.position(mesh.apex(half_edge)?)?;
        let d = mesh.position(mesh.apex(twin)?)?;
        if violates_delaunay(a, b, c, d) || violates_delaunay(b, a, d, c) {
            violations.push(half_edge);
        }
    }

    tracing::debug!(
        "find_delaunay_violations: {} of {} edges violate",
        violations.len(),
        seen.len()
    );
    Ok(violations)
}

/// Checks the Delaunay property over every unconstrained interior edge.
///
/// # Errors
///
/// [`DelaunayValidationError::DelaunayViolation`] naming the first offending
/// edge, or [`DelaunayValidationError::Mesh`] for a corrupt mesh.
pub fn is_delaunay(
    mesh: &HalfEdgeMesh,
    constraints: Option<&FastHashSet<EdgeKey>>,
) -> Result<(), DelaunayValidationError> {
    match find_delaunay_violations(mesh, constraints)?.first() {
        Some(&half_edge) => Err(DelaunayValidationError::DelaunayViolation { half_edge }),
        None => Ok(()),
    }
}
