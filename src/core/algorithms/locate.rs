//! Point location by triangulation walk.
//!
//! Starting from a hint face (or the first live face), the walk tests the
//! query point against each edge of the current face. Faces are clockwise, so
//! a point inside lies to the right of (or on) all three edges; a point to the
//! left of an edge lies beyond it, and the walk crosses to the neighbour on
//! that side. On a Delaunay triangulation this visibility walk always
//! terminates; on other meshes it may cycle, which the step ceiling catches.
//!
//! # References
//!
//! - O. Devillers, S. Pion, and M. Teillaud, "Walking in a Triangulation",
//!   International Journal of Foundations of Computer Science, 2001.

use crate::core::algorithms::bounded::{Bounded, IterationLimits, bounded};
use crate::core::half_edge_mesh::{FaceKey, HalfEdgeKey, HalfEdgeMesh, MeshError, VertexKey};
use crate::geometry::point::Point2;
use crate::geometry::predicates::{
    EPSILON, LineSide, project_onto_segment_interior, side_of_line, signed_area2,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

/// Where a point falls relative to a face that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateResult {
    /// Point is strictly inside the face
    InsideFace(FaceKey),
    /// Point is on an edge of the face (the half-edge belongs to the face)
    OnEdge(HalfEdgeKey),
    /// Point coincides with a vertex of the face within tolerance
    OnVertex(VertexKey),
}

/// Error during point location.
///
/// Every variant is recoverable: callers may retry from another face or fall
/// back to [`locate_brute_force`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocateError {
    /// Mesh has no faces
    #[error("Cannot locate in empty mesh")]
    EmptyMesh,

    /// The walk left the mesh through a boundary edge
    #[error("Walk exited the mesh from face {face:?} while locating {point}")]
    ExitedMesh {
        /// Last face visited
        face: FaceKey,
        /// Query point
        point: Point2,
    },

    /// The walk did not settle within its ceiling (numerical cycling)
    #[error("Walk did not terminate within {steps} steps - possible numerical degeneracy")]
    StepLimitExceeded {
        /// The exhausted ceiling
        steps: usize,
    },

    /// Mesh references were inconsistent
    #[error("Mesh error during walk: {source}")]
    Mesh {
        #[from]
        /// The underlying mesh error
        source: MeshError,
    },
}

/// How the builder chooses the face a walk starts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HintStrategy {
    /// Start from a face created by the previous insertion
    #[default]
    LastInserted,
    /// Start from the first live face
    FirstFace,
    /// Start from a random face drawn from a generator seeded with this value
    Seeded(u64),
}

/// Locates the face containing `point`, starting from `hint`.
///
/// A missing or stale hint falls back to the first live face.
///
/// # Errors
///
/// See [`LocateError`].
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::algorithms::locate::locate;
/// use glyphmesh::core::half_edge_mesh::HalfEdgeMesh;
/// use glyphmesh::geometry::point::Point2;
///
/// let mut mesh = HalfEdgeMesh::new();
/// let a = mesh.insert_vertex(Point2::new(0.0, 0.0));
/// let b = mesh.insert_vertex(Point2::new(1.0, 0.0));
/// let c = mesh.insert_vertex(Point2::new(1.0, 1.0));
/// let d = mesh.insert_vertex(Point2::new(0.0, 1.0));
/// let lower = mesh.add_triangle(a, b, c).unwrap();
/// let upper = mesh.add_triangle(a, c, d).unwrap();
///
/// assert_eq!(locate(&mesh, Point2::new(0.9, 0.1), Some(upper)).unwrap(), lower);
/// assert_eq!(locate(&mesh, Point2::new(0.1, 0.9), Some(lower)).unwrap(), upper);
/// ```
pub fn locate(
    mesh: &HalfEdgeMesh,
    point: Point2,
    hint: Option<FaceKey>,
) -> Result<FaceKey, LocateError> {
    walk(
        mesh,
        point,
        hint,
        IterationLimits::DEFAULT.walk_steps,
        Containment::Tolerant,
        None,
    )
}

/// Like [`locate`], appending every visited face to `visited`.
///
/// # Errors
///
/// See [`LocateError`].
pub fn locate_with_trace(
    mesh: &HalfEdgeMesh,
    point: Point2,
    hint: Option<FaceKey>,
    visited: &mut Vec<FaceKey>,
) -> Result<FaceKey, LocateError> {
    walk(
        mesh,
        point,
        hint,
        IterationLimits::DEFAULT.walk_steps,
        Containment::Tolerant,
        Some(visited),
    )
}

/// How a walk decides that the query point lies beyond an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Containment {
    /// [`side_of_line`] with its [`EPSILON`] band; points ON an edge belong to
    /// both faces sharing it
    #[default]
    Tolerant,
    /// Raw determinant signs. A face found this way really contains the
    /// point, however small its edges are.
    Exact,
}

impl Containment {
    #[inline]
    fn is_beyond(self, a: Point2, b: Point2, point: Point2) -> bool {
        match self {
            Self::Tolerant => side_of_line(a, b, point) == LineSide::LEFT,
            Self::Exact => signed_area2(a, b, point) > 0.0,
        }
    }
}

/// `true` when `point` is right of or on every edge of `face`.
///
/// # Errors
///
/// [`MeshError`] for a stale face.
pub fn face_contains(
    mesh: &HalfEdgeMesh,
    face: FaceKey,
    point: Point2,
    containment: Containment,
) -> Result<bool, MeshError> {
    for half_edge in mesh.face_half_edges(face)? {
        let (a, b) = mesh.edge_positions(half_edge)?;
        if containment.is_beyond(a, b, point) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// The triangulation walk with an explicit step ceiling, containment rule and
/// optional trace.
///
/// # Errors
///
/// See [`LocateError`].
pub fn walk(
    mesh: &HalfEdgeMesh,
    point: Point2,
    hint: Option<FaceKey>,
    max_steps: usize,
    containment: Containment,
    mut visited: Option<&mut Vec<FaceKey>>,
) -> Result<FaceKey, LocateError> {
    let mut current = match hint.filter(|&face| mesh.contains_face(face)) {
        Some(face) => face,
        None => mesh.face_keys().next().ok_or(LocateError::EmptyMesh)?,
    };

    let outcome = bounded("triangulation walk", max_steps, |_| {
        if let Some(trace) = visited.as_deref_mut() {
            trace.push(current);
        }
        for half_edge in mesh.face_half_edges(current)? {
            let (a, b) = mesh.edge_positions(half_edge)?;
            if containment.is_beyond(a, b, point) {
                let Some(twin) = mesh.opposite(half_edge)? else {
                    return Err(LocateError::ExitedMesh {
                        face: current,
                        point,
                    });
                };
                current = mesh.face_of(twin)?;
                return Ok(ControlFlow::Continue(()));
            }
        }
        Ok(ControlFlow::Break(current))
    })?;

    match outcome {
        Bounded::Completed { value, .. } => Ok(value),
        Bounded::Exhausted(exceeded) => Err(LocateError::StepLimitExceeded {
            steps: exceeded.limit,
        }),
    }
}

/// Scans every face for one containing `point`.
///
/// Used as the fallback when a walk fails.
///
/// # Errors
///
/// [`MeshError`] if the mesh is inconsistent.
pub fn locate_brute_force(
    mesh: &HalfEdgeMesh,
    point: Point2,
    containment: Containment,
) -> Result<Option<FaceKey>, MeshError> {
    for face in mesh.face_keys() {
        if face_contains(mesh, face, point, containment)? {
            return Ok(Some(face));
        }
    }
    Ok(None)
}

/// Refines a containing face into inside / on-edge / on-vertex.
///
/// A point within [`EPSILON`] of a corner is reported as that vertex. A point
/// within [`EPSILON`] perpendicular distance of an edge, whose projection falls
/// strictly between the edge's endpoints, is reported on that edge; when
/// several edges qualify (sliver faces) the nearest wins. Distances are
/// Euclidean, so short edges do not widen the band.
///
/// # Errors
///
/// [`MeshError`] for a stale face.
pub fn classify_in_face(
    mesh: &HalfEdgeMesh,
    face: FaceKey,
    point: Point2,
) -> Result<LocateResult, MeshError> {
    for vertex in mesh.face_vertices(face)? {
        if mesh.position(vertex)?.squared_distance(point) <= EPSILON * EPSILON {
            return Ok(LocateResult::OnVertex(vertex));
        }
    }

    let mut nearest: Option<(HalfEdgeKey, f64)> = None;
    for half_edge in mesh.face_half_edges(face)? {
        let (a, b) = mesh.edge_positions(half_edge)?;
        let Some((_, distance)) = project_onto_segment_interior(a, b, point) else {
            continue;
        };
        if distance <= EPSILON && nearest.is_none_or(|(_, best)| distance < best) {
            nearest = Some((half_edge, distance));
        }
    }

    Ok(match nearest {
        Some((half_edge, _)) => LocateResult::OnEdge(half_edge),
        None => LocateResult::InsideFace(face),
    })
}

/// Picks a uniformly random live face.
pub fn random_face<R: Rng>(mesh: &HalfEdgeMesh, rng: &mut R) -> Option<FaceKey> {
    let count = mesh.number_of_faces();
    if count == 0 {
        return None;
    }
    mesh.face_keys().nth(rng.random_range(0..count))
}

// =============================================================================
// TESTS
// =============================================================================
