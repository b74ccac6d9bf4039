//! End-to-end constrained triangulation of an outline.
//!
//! [`ConstrainedTriangulation::new`] runs the whole pipeline:
//!
//! 1. Validate input: finite coordinates, loops with at least three distinct
//!    points and non-zero area, counter-clockwise hull, clockwise holes
//! 2. Normalize every point into the unit box
//! 3. Build the Delaunay mesh incrementally inside a super triangle
//! 4. Enforce the hull and hole loops as constraint edges
//! 5. Optionally flood-fill away the faces outside the hull and inside holes
//! 6. Remove the super triangle
//! 7. Map vertices back to their exact input coordinates
//!
//! Exhausted iteration ceilings never fail the request; they are collected in
//! the [`TriangulationReport`] next to the stage counters.

use crate::core::algorithms::bounded::{IterationLimitExceeded, IterationLimits};
use crate::core::algorithms::constrained::{ConstraintError, ConstraintRefiner, ConstraintStats};
use crate::core::algorithms::incremental_insertion::{
    IncrementalDelaunay, InsertionError, InsertionStats,
};
use crate::core::algorithms::locate::HintStrategy;
use crate::core::collections::{FastHashMap, FastHashSet};
use crate::core::conversion::{IndexedMesh, Triangle2, UpAxis, mesh_to_triangles};
use crate::core::edge::EdgeKey;
use crate::core::half_edge_mesh::{HalfEdgeMesh, MeshError, VertexKey};
use crate::core::util::delaunay_validation::{DelaunayValidationError, is_delaunay};
use crate::geometry::normalizer::{Aabb, Normalizer, NormalizerError};
use crate::geometry::point::{Point2, PositionKey};
use crate::geometry::predicates::{Orientation, polygon_winding};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// OPTIONS
// =============================================================================

/// What to do with a loop wound the wrong way.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindingPolicy {
    /// Fail with [`TriangulationError::InvalidWinding`]
    #[default]
    Reject,
    /// Reverse the loop and carry on
    Reorient,
}

/// Knobs for a triangulation request.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::triangulation::{TriangulationOptionsBuilder, WindingPolicy};
///
/// let options = TriangulationOptionsBuilder::default()
///     .winding(WindingPolicy::Reorient)
///     .remove_superfluous(false)
///     .build()
///     .unwrap();
/// assert!(options.normalize);
/// assert!(!options.remove_superfluous);
/// ```
#[derive(Builder, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[builder(default)]
pub struct TriangulationOptions {
    /// Delete faces outside the hull and inside holes.
    pub remove_superfluous: bool,
    /// Work in unit-box coordinates so the fixed tolerances suit any input scale.
    pub normalize: bool,
    /// Handling of hull/hole loops with the wrong winding.
    pub winding: WindingPolicy,
    /// Start face strategy for point location.
    pub hint: HintStrategy,
    /// Ceilings for every iterative stage.
    pub limits: IterationLimits,
}

impl Default for TriangulationOptions {
    fn default() -> Self {
        Self {
            remove_superfluous: true,
            normalize: true,
            winding: WindingPolicy::default(),
            hint: HintStrategy::default(),
            limits: IterationLimits::DEFAULT,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Which input loop an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoopRole {
    /// The outer boundary
    Hull,
    /// The hole at this index
    Hole(usize),
}

impl fmt::Display for LoopRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hull => write!(f, "hull"),
            Self::Hole(index) => write!(f, "hole {index}"),
        }
    }
}

/// Errors that reject a triangulation request.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TriangulationError {
    /// Nothing to triangulate
    #[error("Triangulation input is empty")]
    EmptyInput,

    /// NaN or infinite coordinate in the input
    #[error("Input point {point} has a non-finite coordinate")]
    NonFiniteCoordinate {
        /// The offending point
        point: Point2,
    },

    /// Fewer than three distinct points, or zero area
    #[error("The {role} is degenerate: {distinct} distinct points, zero or negligible area")]
    DegenerateLoop {
        /// The offending loop
        role: LoopRole,
        /// Distinct points left after removing repeats
        distinct: usize,
    },

    /// Hull not counter-clockwise, or hole not clockwise
    #[error("The {role} is wound {found:?}; expected {expected:?}")]
    InvalidWinding {
        /// The offending loop
        role: LoopRole,
        /// Required winding
        expected: Orientation,
        /// Actual winding
        found: Orientation,
    },

    /// A loop point did not end up in the mesh
    #[error("Loop point {point} has no vertex in the mesh")]
    UnresolvedVertex {
        /// The missing point
        point: Point2,
    },

    /// Bounding box could not be normalized
    #[error(transparent)]
    Normalizer(#[from] NormalizerError),

    /// Incremental construction failed
    #[error(transparent)]
    Insertion(#[from] InsertionError),

    /// Constraint recovery failed
    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    /// Mesh references were inconsistent
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

// =============================================================================
// REPORT
// =============================================================================

/// What each stage did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TriangulationReport {
    /// Incremental construction counters
    pub insertion: InsertionStats,
    /// Constraint recovery and flood fill counters
    pub constraints: ConstraintStats,
    /// Faces deleted together with the super triangle
    pub super_faces_removed: usize,
    /// Vertices dropped because no face uses them any more
    pub isolated_vertices_removed: usize,
    /// Every ceiling that cut a stage short
    pub exhausted: Vec<IterationLimitExceeded>,
}

impl TriangulationReport {
    /// `true` when no ceiling was hit and every constraint was recovered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.exhausted.is_empty() && self.constraints.incomplete == 0
    }
}

// =============================================================================
// TRIANGULATION
// =============================================================================

/// A finished triangulation with its constraint edges and stage report.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::triangulation::{ConstrainedTriangulation, TriangulationOptions};
/// use glyphmesh::geometry::point::Point2;
///
/// let hull = [
///     Point2::new(0.0, 0.0),
///     Point2::new(4.0, 0.0),
///     Point2::new(4.0, 4.0),
///     Point2::new(0.0, 4.0),
/// ];
/// let cdt = ConstrainedTriangulation::new(&[], &hull, &[], TriangulationOptions::default())
///     .unwrap();
///
/// let triangles = cdt.triangles().unwrap();
/// assert_eq!(triangles.len(), 2);
/// assert_eq!(triangles.iter().map(|t| t.area()).sum::<f64>(), 16.0);
/// assert!(cdt.report().is_complete());
/// ```
#[derive(Clone, Debug)]
pub struct ConstrainedTriangulation {
    mesh: HalfEdgeMesh,
    constraints: FastHashSet<EdgeKey>,
    normalizer: Normalizer,
    report: TriangulationReport,
}

impl ConstrainedTriangulation {
    /// Triangulates `points` together with a counter-clockwise `hull` and
    /// clockwise `holes`, enforcing every loop segment as an edge.
    ///
    /// # Errors
    ///
    /// See [`TriangulationError`]. Iteration ceilings are reported, not raised.
    pub fn new(
        points: &[Point2],
        hull: &[Point2],
        holes: &[Vec<Point2>],
        options: TriangulationOptions,
    ) -> Result<Self, TriangulationError> {
        let hull = prepare_loop(hull, LoopRole::Hull, Orientation::COUNTERCLOCKWISE, options)?;
        let holes = holes
            .iter()
            .enumerate()
            .map(|(i, hole)| {
                prepare_loop(hole, LoopRole::Hole(i), Orientation::CLOCKWISE, options)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let loops: Vec<&[Point2]> = std::iter::once(hull.as_slice())
            .chain(holes.iter().map(Vec::as_slice))
            .collect();
        Self::run(points, &loops, options)
    }

    /// Unconstrained Delaunay triangulation of `points`.
    ///
    /// One or two distinct points give an empty triangulation rather than an
    /// error.
    ///
    /// # Errors
    ///
    /// [`TriangulationError::EmptyInput`] for no points and
    /// [`TriangulationError::NonFiniteCoordinate`] for NaN or infinite input.
    /// See [`TriangulationError`] for the rest.
    pub fn from_points(
        points: &[Point2],
        options: TriangulationOptions,
    ) -> Result<Self, TriangulationError> {
        Self::run(points, &[], options)
    }

    fn run(
        points: &[Point2],
        loops: &[&[Point2]],
        options: TriangulationOptions,
    ) -> Result<Self, TriangulationError> {
        if let Some(&point) = points.iter().find(|p| !p.is_finite()) {
            return Err(TriangulationError::NonFiniteCoordinate { point });
        }

        // Loop points go first so the outline drives the early topology.
        let mut seen: FastHashSet<PositionKey> = FastHashSet::default();
        let input: Vec<Point2> = loops
            .iter()
            .flat_map(|l| l.iter())
            .chain(points)
            .copied()
            .filter(|p| seen.insert(p.key()))
            .collect();
        if input.is_empty() {
            return Err(TriangulationError::EmptyInput);
        }
        if loops.is_empty() && input.len() < 3 {
            tracing::debug!(
                "{} distinct points span no triangle; returning an empty triangulation",
                input.len()
            );
            return Ok(Self {
                mesh: HalfEdgeMesh::new(),
                constraints: FastHashSet::default(),
                normalizer: Normalizer::identity(),
                report: TriangulationReport::default(),
            });
        }

        let normalizer = if options.normalize {
            Normalizer::new(input.iter().copied())?
        } else {
            Normalizer::identity()
        };
        let working = normalizer.normalize_all(&input);
        let originals: FastHashMap<PositionKey, Point2> = working
            .iter()
            .map(|p| p.key())
            .zip(input.iter().copied())
            .collect();
        tracing::debug!(
            "Triangulating {} unique points and {} loops (scale {})",
            input.len(),
            loops.len(),
            normalizer.scale()
        );

        let bounds =
            Aabb::from_points(working.iter().copied()).ok_or(TriangulationError::EmptyInput)?;
        let mut dt = IncrementalDelaunay::new(&bounds, options.hint, options.limits);
        dt.insert_all(working.iter().copied())?;

        let loop_keys = loops
            .iter()
            .map(|l| resolve_loop(&dt, l, &normalizer))
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = TriangulationReport::default();
        report.exhausted.extend_from_slice(dt.exhausted());
        let constraints = {
            let mut refiner = ConstraintRefiner::new(dt.mesh_mut(), options.limits);
            for vertices in &loop_keys {
                refiner.insert_loop(vertices)?;
            }
            if options.remove_superfluous && !loop_keys.is_empty() {
                refiner.remove_superfluous()?;
            }
            report.constraints = *refiner.stats();
            report.exhausted.extend_from_slice(refiner.exhausted());
            refiner.into_constraints()
        };

        report.super_faces_removed = dt.remove_super_triangle()?;
        report.insertion = *dt.stats();

        let mut mesh = dt.into_mesh();
        report.isolated_vertices_removed = mesh.remove_isolated_vertices();
        mesh.map_positions(|_, p| {
            originals
                .get(&p.key())
                .copied()
                .unwrap_or_else(|| normalizer.unnormalize(p))
        });

        if !report.is_complete() {
            tracing::warn!(
                "Triangulation finished with {} exhausted ceilings and {} incomplete constraints",
                report.exhausted.len(),
                report.constraints.incomplete
            );
        }
        tracing::debug!(
            "Triangulation produced {} faces over {} vertices",
            mesh.number_of_faces(),
            mesh.number_of_vertices()
        );

        Ok(Self {
            mesh,
            constraints,
            normalizer,
            report,
        })
    }

    /// The finished mesh, in input coordinates.
    #[must_use]
    pub const fn mesh(&self) -> &HalfEdgeMesh {
        &self.mesh
    }

    /// Takes the mesh out of the triangulation.
    #[must_use]
    pub fn into_mesh(self) -> HalfEdgeMesh {
        self.mesh
    }

    /// Stage counters and exhausted ceilings.
    #[must_use]
    pub const fn report(&self) -> &TriangulationReport {
        &self.report
    }

    /// Edges enforced from the input loops.
    #[must_use]
    pub const fn constraint_edges(&self) -> &FastHashSet<EdgeKey> {
        &self.constraints
    }

    /// `true` when `u v` was enforced from an input loop.
    #[must_use]
    pub fn is_constraint(&self, u: VertexKey, v: VertexKey) -> bool {
        self.constraints.contains(&EdgeKey::new(u, v))
    }

    /// Number of triangles.
    #[must_use]
    pub fn number_of_triangles(&self) -> usize {
        self.mesh.number_of_faces()
    }

    /// One clockwise triangle per face.
    ///
    /// # Errors
    ///
    /// [`MeshError`] if the mesh is inconsistent.
    pub fn triangles(&self) -> Result<Vec<Triangle2>, MeshError> {
        mesh_to_triangles(&self.mesh)
    }

    /// The triangles lifted to `height` along `up`, with shared vertices.
    ///
    /// # Errors
    ///
    /// [`MeshError`] if the mesh is inconsistent.
    pub fn indexed_mesh(&self, height: f64, up: UpAxis) -> Result<IndexedMesh, MeshError> {
        Ok(IndexedMesh::from_triangles(&self.triangles()?, height, up))
    }

    /// Checks the Delaunay property of every unconstrained interior edge.
    ///
    /// The check runs in the normalized frame the mesh was built in, so the
    /// tolerance means the same thing at every input scale.
    ///
    /// # Errors
    ///
    /// [`DelaunayValidationError`] naming the first offending edge.
    pub fn validate_delaunay(&self) -> Result<(), DelaunayValidationError> {
        let mut normalized = self.mesh.clone();
        normalized.map_positions(|_, p| self.normalizer.normalize(p));
        is_delaunay(&normalized, Some(&self.constraints))
    }
}

/// Unconstrained Delaunay triangulation of `points`.
///
/// One or two distinct points give an empty triangulation.
///
/// # Errors
///
/// See [`ConstrainedTriangulation::from_points`].
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::triangulation::{TriangulationOptions, triangulate_points};
/// use glyphmesh::geometry::point::Point2;
///
/// let points = [
///     Point2::new(0.0, 0.0),
///     Point2::new(2.0, 0.0),
///     Point2::new(1.0, 2.0),
///     Point2::new(1.0, 0.5),
/// ];
/// let dt = triangulate_points(&points, TriangulationOptions::default()).unwrap();
/// assert_eq!(dt.number_of_triangles(), 3);
/// dt.validate_delaunay().unwrap();
/// ```
pub fn triangulate_points(
    points: &[Point2],
    options: TriangulationOptions,
) -> Result<ConstrainedTriangulation, TriangulationError> {
    ConstrainedTriangulation::from_points(points, options)
}

// =============================================================================
// INPUT PREPARATION
// =============================================================================

/// Drops repeated consecutive points and a repeated closing point.
fn sanitize_loop(points: &[Point2]) -> Vec<Point2> {
    let mut cleaned: Vec<Point2> = Vec::with_capacity(points.len());
    for &p in points {
        if cleaned.last() != Some(&p) {
            cleaned.push(p);
        }
    }
    while cleaned.len() > 1 && cleaned.first() == cleaned.last() {
        cleaned.pop();
    }
    cleaned
}

fn prepare_loop(
    points: &[Point2],
    role: LoopRole,
    expected: Orientation,
    options: TriangulationOptions,
) -> Result<Vec<Point2>, TriangulationError> {
    if let Some(&point) = points.iter().find(|p| !p.is_finite()) {
        return Err(TriangulationError::NonFiniteCoordinate { point });
    }
    let mut cleaned = sanitize_loop(points);
    if cleaned.len() < 3 {
        return Err(TriangulationError::DegenerateLoop {
            role,
            distinct: cleaned.len(),
        });
    }

    // Judge the winding at unit scale so tiny glyph units are not mistaken
    // for zero area.
    let normalizer = Normalizer::new(cleaned.iter().copied())?;
    let Some(found) = polygon_winding(&normalizer.normalize_all(&cleaned)) else {
        return Err(TriangulationError::DegenerateLoop {
            role,
            distinct: cleaned.len(),
        });
    };

    if found != expected {
        match options.winding {
            WindingPolicy::Reject => {
                return Err(TriangulationError::InvalidWinding {
                    role,
                    expected,
                    found,
                });
            }
            WindingPolicy::Reorient => {
                tracing::debug!("Reversing the {role}: wound {found:?}, expected {expected:?}");
                cleaned.reverse();
            }
        }
    }
    Ok(cleaned)
}

fn resolve_loop(
    dt: &IncrementalDelaunay,
    points: &[Point2],
    normalizer: &Normalizer,
) -> Result<Vec<VertexKey>, TriangulationError> {
    let mut keys: Vec<VertexKey> = Vec::with_capacity(points.len());
    for &point in points {
        let vertex = dt
            .resolve(normalizer.normalize(point))
            .ok_or(TriangulationError::UnresolvedVertex { point })?;
        // Near-duplicate merges can make neighbours coincide.
        if keys.last() != Some(&vertex) {
            keys.push(vertex);
        }
    }
    while keys.len() > 1 && keys.first() == keys.last() {
        keys.pop();
    }
    Ok(keys)
}

// =============================================================================
// TESTS
// =============================================================================
