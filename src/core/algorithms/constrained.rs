//! Constraint edge recovery (Sloan's method) and superfluous triangle removal.
//!
//! Each constraint segment `u v` is forced into an existing Delaunay mesh by
//! flipping away every edge that crosses it:
//! 1. Split the segment at every vertex lying on it; each piece is recovered
//!    on its own
//! 2. Skip a piece if the mesh already has the edge in either direction
//! 3. Queue every edge that strictly crosses the piece
//! 4. Pop edges: an edge whose flip would fold the mesh or leave a sliver goes
//!    back to the end of the queue, otherwise the edge is flipped and the new
//!    diagonal is either re-queued (it still crosses) or remembered as new
//! 5. Restore the Delaunay property over the new edges, never flipping an
//!    enforced constraint
//!
//! Once all loops are in place, [`ConstraintRefiner::remove_superfluous`]
//! flood-fills from the outer side of every closed loop and deletes the faces
//! it reaches without crossing a constraint. Loops with a missing piece are
//! not used as sources, since the fill would leak through the gap.

use crate::core::algorithms::bounded::{
    Bounded, IterationLimitExceeded, IterationLimits, bounded,
};
use crate::core::collections::{FaceKeySet, FastHashSet};
use crate::core::edge::EdgeKey;
use crate::core::half_edge_mesh::{FaceKey, HalfEdgeKey, HalfEdgeMesh, MeshError, VertexKey};
use crate::geometry::point::Point2;
use crate::geometry::predicates::{
    EPSILON, project_onto_segment_interior, segments_cross, violates_delaunay,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::ControlFlow;
use thiserror::Error;

/// Errors raised while enforcing constraints.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConstraintError {
    /// Mesh references were inconsistent
    #[error("Mesh error during constraint recovery: {0}")]
    Mesh(#[from] MeshError),

    /// A loop needs at least two distinct vertices
    #[error("Constraint loop has {len} vertices; at least 2 are required")]
    LoopTooShort {
        /// Number of vertices supplied
        len: usize,
    },
}

/// Result of enforcing one constraint segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOutcome {
    /// The edge was created by flips
    Inserted,
    /// The edge already existed
    AlreadyPresent,
    /// The edge could not be created; the mesh is left valid without it
    Incomplete,
}

impl ConstraintOutcome {
    /// Outcome of a segment recovered as several pieces.
    fn combine(self, other: Self) -> Self {
        match (self, other) {
            (Self::Incomplete, _) | (_, Self::Incomplete) => Self::Incomplete,
            (Self::AlreadyPresent, Self::AlreadyPresent) => Self::AlreadyPresent,
            _ => Self::Inserted,
        }
    }
}

/// Counters collected while enforcing constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintStats {
    /// Constraints created by flipping
    pub inserted: usize,
    /// Constraints that already existed
    pub already_present: usize,
    /// Constraints that could not be created
    pub incomplete: usize,
    /// Vertices found lying on a constraint, splitting it into pieces
    pub collinear_splits: usize,
    /// Loops left out of the flood fill because a piece is missing
    pub open_loops: usize,
    /// Flips performed to remove crossing edges
    pub flips: usize,
    /// Flips performed while restoring the Delaunay property
    pub restoration_flips: usize,
    /// Faces deleted by the flood fill
    pub faces_removed: usize,
}

/// A loop as enforced: the input vertices plus any vertex found on one of its
/// segments, in loop order.
#[derive(Debug, Clone)]
struct EnforcedLoop {
    vertices: Vec<VertexKey>,
    closed: bool,
}

#[inline]
fn cdt_trace_enabled() -> bool {
    std::env::var_os("GLYPHMESH_CDT_TRACE").is_some()
}

/// Enforces constraint loops on a mesh it borrows for its lifetime.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::algorithms::bounded::IterationLimits;
/// use glyphmesh::core::algorithms::constrained::ConstraintRefiner;
/// use glyphmesh::core::algorithms::incremental_insertion::IncrementalDelaunay;
/// use glyphmesh::core::algorithms::locate::HintStrategy;
/// use glyphmesh::geometry::point::Point2;
///
/// let square = [
///     Point2::new(0.0, 0.0),
///     Point2::new(1.0, 0.0),
///     Point2::new(1.0, 1.0),
///     Point2::new(0.0, 1.0),
/// ];
/// let mut dt =
///     IncrementalDelaunay::from_points(&square, HintStrategy::default(), IterationLimits::default())
///         .unwrap();
/// let hull: Vec<_> = square.iter().map(|&p| dt.resolve(p).unwrap()).collect();
///
/// let mut refiner = ConstraintRefiner::new(dt.mesh_mut(), IterationLimits::default());
/// refiner.insert_loop(&hull).unwrap();
/// refiner.remove_superfluous().unwrap();
/// assert_eq!(refiner.constraints().len(), 4);
///
/// assert_eq!(dt.finish().unwrap().number_of_faces(), 2);
/// ```
#[derive(Debug)]
pub struct ConstraintRefiner<'a> {
    mesh: &'a mut HalfEdgeMesh,
    limits: IterationLimits,
    constraints: FastHashSet<EdgeKey>,
    loops: Vec<EnforcedLoop>,
    stats: ConstraintStats,
    exhausted: Vec<IterationLimitExceeded>,
}

impl<'a> ConstraintRefiner<'a> {
    /// Starts a refiner with no enforced constraints.
    pub fn new(mesh: &'a mut HalfEdgeMesh, limits: IterationLimits) -> Self {
        Self {
            mesh,
            limits,
            constraints: FastHashSet::default(),
            loops: Vec::new(),
            stats: ConstraintStats::default(),
            exhausted: Vec::new(),
        }
    }

    /// The mesh being refined.
    #[must_use]
    pub fn mesh(&self) -> &HalfEdgeMesh {
        self.mesh
    }

    /// Every constraint edge present in the mesh.
    #[must_use]
    pub const fn constraints(&self) -> &FastHashSet<EdgeKey> {
        &self.constraints
    }

    /// Counters collected so far.
    #[must_use]
    pub const fn stats(&self) -> &ConstraintStats {
        &self.stats
    }

    /// Ceilings hit so far.
    #[must_use]
    pub fn exhausted(&self) -> &[IterationLimitExceeded] {
        &self.exhausted
    }

    /// Releases the mesh, returning the enforced constraint set.
    #[must_use]
    pub fn into_constraints(self) -> FastHashSet<EdgeKey> {
        self.constraints
    }

    /// Enforces every segment of a closed loop, including the closing one.
    ///
    /// The loop is remembered as a flood-fill source for
    /// [`Self::remove_superfluous`]. A segment that cannot be recovered is
    /// counted as incomplete and logged; the remaining segments still run,
    /// but the loop will not seed the flood fill.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::LoopTooShort`] for fewer than two vertices and
    /// [`ConstraintError::Mesh`] if the mesh is inconsistent.
    pub fn insert_loop(&mut self, vertices: &[VertexKey]) -> Result<(), ConstraintError> {
        if vertices.len() < 2 {
            return Err(ConstraintError::LoopTooShort {
                len: vertices.len(),
            });
        }
        let mut enforced = EnforcedLoop {
            vertices: Vec::with_capacity(vertices.len()),
            closed: true,
        };
        for (i, &u) in vertices.iter().enumerate() {
            let v = vertices[(i + 1) % vertices.len()];
            if u == v {
                continue;
            }
            let (outcome, chain) = self.enforce_segment(u, v)?;
            if outcome == ConstraintOutcome::Incomplete {
                enforced.closed = false;
            }
            // The chain ends at v, which starts the next segment.
            enforced.vertices.extend(&chain[..chain.len() - 1]);
        }
        self.loops.push(enforced);
        Ok(())
    }

    /// Forces the segment `u v` into the mesh.
    ///
    /// Vertices lying on the segment split it into pieces, each of which
    /// becomes a constraint edge. The outcome is [`ConstraintOutcome::Incomplete`]
    /// if any piece failed and [`ConstraintOutcome::AlreadyPresent`] only if
    /// every piece already existed.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::Mesh`] if the mesh is inconsistent.
    pub fn insert_constraint(
        &mut self,
        u: VertexKey,
        v: VertexKey,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        Ok(self.enforce_segment(u, v)?.0)
    }

    /// Recovers `u v` piece by piece. Returns the combined outcome and the
    /// chain of vertices from `u` to `v`.
    fn enforce_segment(
        &mut self,
        u: VertexKey,
        v: VertexKey,
    ) -> Result<(ConstraintOutcome, Vec<VertexKey>), ConstraintError> {
        let chain = self.collinear_chain(u, v)?;
        if chain.len() > 2 {
            tracing::debug!(
                "Constraint {u:?} -> {v:?} passes through {} vertices; splitting it",
                chain.len() - 2
            );
            self.stats.collinear_splits += chain.len() - 2;
        }

        let mut outcome = ConstraintOutcome::AlreadyPresent;
        for piece in chain.windows(2) {
            outcome = outcome.combine(self.enforce_piece(piece[0], piece[1])?);
        }
        Ok((outcome, chain))
    }

    /// `u`, every vertex within [`EPSILON`] of the open segment `u v` ordered
    /// from `u`, then `v`.
    fn collinear_chain(&self, u: VertexKey, v: VertexKey) -> Result<Vec<VertexKey>, MeshError> {
        let p1 = self.mesh.position(u)?;
        let p2 = self.mesh.position(v)?;
        let mut on_segment: Vec<(f64, VertexKey)> = self
            .mesh
            .vertices()
            .filter(|&(w, _)| w != u && w != v)
            .filter_map(|(w, vertex)| {
                let (t, distance) = project_onto_segment_interior(p1, p2, vertex.position())?;
                (distance <= EPSILON).then_some((t, w))
            })
            .collect();
        on_segment.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut chain = Vec::with_capacity(on_segment.len() + 2);
        chain.push(u);
        chain.extend(on_segment.into_iter().map(|(_, w)| w));
        chain.push(v);
        Ok(chain)
    }

    /// Recovers one piece free of vertices.
    fn enforce_piece(
        &mut self,
        u: VertexKey,
        v: VertexKey,
    ) -> Result<ConstraintOutcome, ConstraintError> {
        let edge = EdgeKey::new(u, v);
        if self.mesh.contains_edge(u, v) {
            self.constraints.insert(edge);
            self.stats.already_present += 1;
            return Ok(ConstraintOutcome::AlreadyPresent);
        }

        let p1 = self.mesh.position(u)?;
        let p2 = self.mesh.position(v)?;
        let mut queue = self.crossing_edges(edge, p1, p2)?;
        tracing::debug!(
            "Constraint {p1} -> {p2}: {} crossing edges",
            queue.len()
        );

        let mut new_edges = Vec::new();
        let recovered = self.remove_crossings(edge, p1, p2, &mut queue, &mut new_edges)?;

        if !recovered || !self.mesh.contains_edge(u, v) {
            tracing::warn!("Constraint {p1} -> {p2} could not be recovered; leaving it out");
            self.stats.incomplete += 1;
            return Ok(ConstraintOutcome::Incomplete);
        }

        self.constraints.insert(edge);
        self.restore_delaunay(&new_edges)?;
        self.stats.inserted += 1;
        Ok(ConstraintOutcome::Inserted)
    }

    /// Returns `true` when `half_edge` strictly crosses the open segment
    /// `p1 p2` of `constraint`. Edges sharing an endpoint never cross.
    fn crosses(
        &self,
        half_edge: HalfEdgeKey,
        constraint: EdgeKey,
        p1: Point2,
        p2: Point2,
    ) -> Result<bool, MeshError> {
        let candidate = EdgeKey::of_half_edge(self.mesh, half_edge)?;
        if candidate.shares_endpoint(constraint) {
            return Ok(false);
        }
        let (a, b) = self.mesh.edge_positions(half_edge)?;
        Ok(segments_cross(p1, p2, a, b))
    }

    fn crossing_edges(
        &self,
        constraint: EdgeKey,
        p1: Point2,
        p2: Point2,
    ) -> Result<VecDeque<HalfEdgeKey>, MeshError> {
        let mut seen = FastHashSet::default();
        let mut queue = VecDeque::new();
        for (half_edge, _) in self.mesh.half_edges() {
            if !seen.insert(EdgeKey::of_half_edge(self.mesh, half_edge)?) {
                continue;
            }
            if self.crosses(half_edge, constraint, p1, p2)? {
                queue.push_back(half_edge);
            }
        }
        Ok(queue)
    }

    /// Flips crossing edges until none is left. Returns `false` when the
    /// segment had to be abandoned.
    fn remove_crossings(
        &mut self,
        constraint: EdgeKey,
        p1: Point2,
        p2: Point2,
        queue: &mut VecDeque<HalfEdgeKey>,
        new_edges: &mut Vec<HalfEdgeKey>,
    ) -> Result<bool, MeshError> {
        let trace = cdt_trace_enabled();
        let outcome = bounded("constraint recovery", self.limits.constraint_flips, |_| {
            let Some(half_edge) = queue.pop_front() else {
                return Ok(ControlFlow::Break(true));
            };
            let Some(twin) = self.mesh.opposite(half_edge)? else {
                tracing::warn!(
                    "Constraint {p1} -> {p2} crosses a boundary edge; aborting it"
                );
                return Ok(ControlFlow::Break(false));
            };

            if !self.mesh.is_flippable(half_edge)? {
                queue.push_back(half_edge);
                return Ok(ControlFlow::Continue(()));
            }
            let (a, b) = self.mesh.edge_positions(half_edge)?;
            let c = self.mesh.position(self.mesh.apex(half_edge)?)?;
            let d = self.mesh.position(self.mesh.apex(twin)?)?;

            self.mesh.flip_edge(half_edge)?;
            self.stats.flips += 1;
            if trace {
                tracing::debug!("[cdt] flip {a} {b} -> {c} {d}");
            }

            if self.crosses(half_edge, constraint, p1, p2)? {
                queue.push_back(half_edge);
            } else {
                new_edges.push(half_edge);
            }
            Ok::<_, MeshError>(ControlFlow::Continue(()))
        })?;

        Ok(match outcome {
            Bounded::Completed { value, .. } => value,
            Bounded::Exhausted(exceeded) => {
                self.exhausted.push(exceeded);
                false
            }
        })
    }

    /// Re-legalizes the edges created while recovering a constraint.
    fn restore_delaunay(&mut self, new_edges: &[HalfEdgeKey]) -> Result<(), MeshError> {
        let trace = cdt_trace_enabled();
        let outcome = bounded("delaunay restoration", self.limits.delaunay_passes, |_| {
            let mut flipped = false;
            for &half_edge in new_edges {
                let Some(twin) = self.mesh.opposite(half_edge)? else {
                    continue;
                };
                if self
                    .constraints
                    .contains(&EdgeKey::of_half_edge(self.mesh, half_edge)?)
                {
                    continue;
                }
                let (a, b) = self.mesh.edge_positions(half_edge)?;
                let c = self.mesh.position(self.mesh.apex(half_edge)?)?;
                let d = self.mesh.position(self.mesh.apex(twin)?)?;
                if violates_delaunay(a, b, c, d) && self.mesh.is_flippable(half_edge)? {
                    self.mesh.flip_edge(half_edge)?;
                    self.stats.restoration_flips += 1;
                    flipped = true;
                    if trace {
                        tracing::debug!("[cdt] restore {a} {b} -> {c} {d}");
                    }
                }
            }
            Ok::<_, MeshError>(if flipped {
                ControlFlow::Continue(())
            } else {
                ControlFlow::Break(())
            })
        })?;

        if let Bounded::Exhausted(exceeded) = outcome {
            self.exhausted.push(exceeded);
        }
        Ok(())
    }

    /// Deletes the faces on the outer side of every closed loop.
    ///
    /// The flood fill starts from the faces owning the half-edges that run
    /// along each loop in its own direction (outside a counter-clockwise hull,
    /// inside a clockwise hole) and never crosses a constraint edge. A loop
    /// with a piece that could not be recovered is skipped with a warning.
    /// Returns the number of faces removed.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::Mesh`] if the mesh is inconsistent.
    pub fn remove_superfluous(&mut self) -> Result<usize, ConstraintError> {
        let mut marked = FaceKeySet::default();
        let mut frontier: VecDeque<FaceKey> = VecDeque::new();

        for enforced in &self.loops {
            if !enforced.closed {
                tracing::warn!(
                    "Loop of {} vertices has a missing constraint; not flood-filling from it",
                    enforced.vertices.len()
                );
                self.stats.open_loops += 1;
                continue;
            }
            let vertices = &enforced.vertices;
            for (i, &u) in vertices.iter().enumerate() {
                let v = vertices[(i + 1) % vertices.len()];
                let Some(half_edge) = self.mesh.half_edge_between(u, v) else {
                    continue;
                };
                let face = self.mesh.face_of(half_edge)?;
                if marked.insert(face) {
                    frontier.push_back(face);
                }
            }
        }

        let outcome = bounded("flood fill", self.limits.flood_fill_faces, |_| {
            let Some(face) = frontier.pop_front() else {
                return Ok(ControlFlow::Break(()));
            };
            for half_edge in self.mesh.face_half_edges(face)? {
                if self
                    .constraints
                    .contains(&EdgeKey::of_half_edge(self.mesh, half_edge)?)
                {
                    continue;
                }
                let Some(twin) = self.mesh.opposite(half_edge)? else {
                    continue;
                };
                let neighbour = self.mesh.face_of(twin)?;
                if marked.insert(neighbour) {
                    frontier.push_back(neighbour);
                }
            }
            Ok::<_, MeshError>(ControlFlow::Continue(()))
        })?;
        if let Bounded::Exhausted(exceeded) = outcome {
            self.exhausted.push(exceeded);
        }

        for &face in &marked {
            self.mesh.delete_face(face)?;
        }
        self.stats.faces_removed += marked.len();
        tracing::debug!("Flood fill removed {} faces", marked.len());
        Ok(marked.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================
