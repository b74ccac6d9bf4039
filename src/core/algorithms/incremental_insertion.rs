//! Incremental Delaunay construction by point insertion and edge flips.
//!
//! The builder starts from a clockwise super triangle that strictly covers the
//! input bounds and inserts points one at a time:
//! 1. Locate the containing face (triangulation walk, brute-force fallback)
//! 2. Classify the point: inside the face, on one of its edges, or on a vertex
//! 3. Split the face into three, or the edge and its two faces into four,
//!    provided every new face is strictly clockwise; otherwise try the other
//!    split shapes and merge the point into the nearest corner as a last resort
//! 4. Legalize: pop edges opposite the new vertex off a stack and flip every
//!    edge that violates the circumcircle criterion, pushing the two far edges
//!    of each flip
//!
//! The super triangle stays in place until [`IncrementalDelaunay::remove_super_triangle`]
//! so that constraint recovery always works inside a region covered by faces.

use crate::core::algorithms::bounded::{
    Bounded, IterationLimitExceeded, IterationLimits, bounded,
};
use crate::core::algorithms::locate::{
    Containment, HintStrategy, LocateError, LocateResult, classify_in_face, locate_brute_force,
    random_face, walk,
};
use crate::core::collections::{FastHashMap, HalfEdgeStack};
use crate::core::half_edge_mesh::{FaceKey, HalfEdgeKey, HalfEdgeMesh, MeshError, VertexKey};
use crate::geometry::normalizer::Aabb;
use crate::geometry::point::{Point2, PositionKey};
use crate::geometry::predicates::{is_strictly_clockwise, violates_delaunay};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;

/// Distance of the super triangle's corners from the input, in multiples of
/// the larger bounding-box dimension.
const SUPER_TRIANGLE_SCALE: f64 = 100.0;

/// Error during incremental insertion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InsertionError {
    /// Mesh references were inconsistent
    #[error("Mesh error during insertion: {0}")]
    Mesh(#[from] MeshError),

    /// Point location failed in a way that is not recoverable by scanning
    #[error("Location error: {0}")]
    Location(#[from] LocateError),

    /// Coordinates must be finite
    #[error("Cannot insert non-finite point {point}")]
    NonFinitePoint {
        /// The rejected point
        point: Point2,
    },
}

/// What happened to one inserted point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionOutcome {
    /// A new vertex was created
    Inserted(VertexKey),
    /// A vertex already sits at exactly this position
    Duplicate(VertexKey),
    /// The point was within tolerance of an existing vertex and merged into it
    Merged(VertexKey),
    /// No face contains the point; it was left out
    Skipped,
}

impl InsertionOutcome {
    /// The vertex now representing the point, if any.
    #[must_use]
    pub const fn vertex(&self) -> Option<VertexKey> {
        match self {
            Self::Inserted(v) | Self::Duplicate(v) | Self::Merged(v) => Some(*v),
            Self::Skipped => None,
        }
    }
}

/// Counters collected while building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertionStats {
    /// Points that created a vertex
    pub inserted: usize,
    /// Exact duplicates
    pub duplicates: usize,
    /// Near-duplicates merged into an existing vertex
    pub merged: usize,
    /// Points no face contained
    pub skipped: usize,
    /// Insertions that split a face into three
    pub face_splits: usize,
    /// Insertions that split an edge
    pub edge_splits: usize,
    /// Legalization flips
    pub flips: usize,
    /// Walks that failed and fell back to a full scan
    pub walk_fallbacks: usize,
    /// Points merged because every split would have created a degenerate face
    pub degenerate_merges: usize,
}

/// How a located point is spliced into the mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Split {
    Face(FaceKey),
    Edge(HalfEdgeKey),
}

/// Incremental Delaunay triangulation under construction.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::algorithms::bounded::IterationLimits;
/// use glyphmesh::core::algorithms::incremental_insertion::IncrementalDelaunay;
/// use glyphmesh::core::algorithms::locate::HintStrategy;
/// use glyphmesh::geometry::point::Point2;
///
/// let points = [
///     Point2::new(0.0, 0.0),
///     Point2::new(1.0, 0.0),
///     Point2::new(0.5, 1.0),
/// ];
/// let mut dt = IncrementalDelaunay::from_points(
///     &points,
///     HintStrategy::default(),
///     IterationLimits::default(),
/// )
/// .unwrap();
/// let mesh = dt.finish().unwrap();
/// assert_eq!(mesh.number_of_faces(), 1);
/// assert_eq!(mesh.number_of_vertices(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct IncrementalDelaunay {
    mesh: HalfEdgeMesh,
    super_vertices: Option<[VertexKey; 3]>,
    last_face: Option<FaceKey>,
    hint: HintStrategy,
    rng: Option<StdRng>,
    limits: IterationLimits,
    aliases: FastHashMap<PositionKey, VertexKey>,
    stats: InsertionStats,
    exhausted: Vec<IterationLimitExceeded>,
}

impl IncrementalDelaunay {
    /// Creates an empty triangulation whose super triangle covers `bounds`.
    #[must_use]
    pub fn new(bounds: &Aabb, hint: HintStrategy, limits: IterationLimits) -> Self {
        let extent = bounds.max_extent();
        let extent = if extent.is_finite() && extent > 0.0 {
            extent
        } else {
            1.0
        };
        let reach = SUPER_TRIANGLE_SCALE * extent;
        let center = bounds.center();

        let mut mesh = HalfEdgeMesh::new();
        let corners = [
            mesh.insert_vertex(Point2::new(center.x - reach, center.y - reach)),
            mesh.insert_vertex(Point2::new(center.x, center.y + reach)),
            mesh.insert_vertex(Point2::new(center.x + reach, center.y - reach)),
        ];
        let face = mesh.create_face(corners);

        let rng = match hint {
            HintStrategy::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
            HintStrategy::LastInserted | HintStrategy::FirstFace => None,
        };

        Self {
            mesh,
            super_vertices: Some(corners),
            last_face: Some(face),
            hint,
            rng,
            limits,
            aliases: FastHashMap::default(),
            stats: InsertionStats::default(),
            exhausted: Vec::new(),
        }
    }

    /// Builds a triangulation of `points` in input order.
    ///
    /// # Errors
    ///
    /// See [`IncrementalDelaunay::insert`].
    pub fn from_points(
        points: &[Point2],
        hint: HintStrategy,
        limits: IterationLimits,
    ) -> Result<Self, InsertionError> {
        let bounds = Aabb::from_points(points.iter().copied()).unwrap_or(Aabb {
            min: Point2::new(0.0, 0.0),
            max: Point2::new(1.0, 1.0),
        });
        let mut dt = Self::new(&bounds, hint, limits);
        dt.insert_all(points.iter().copied())?;
        Ok(dt)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The mesh, including the super triangle until it is removed.
    #[must_use]
    pub const fn mesh(&self) -> &HalfEdgeMesh {
        &self.mesh
    }

    /// Mutable access for constraint recovery.
    pub const fn mesh_mut(&mut self) -> &mut HalfEdgeMesh {
        &mut self.mesh
    }

    /// Counters collected so far.
    #[must_use]
    pub const fn stats(&self) -> &InsertionStats {
        &self.stats
    }

    /// Ceilings hit so far.
    #[must_use]
    pub fn exhausted(&self) -> &[IterationLimitExceeded] {
        &self.exhausted
    }

    /// The auxiliary corners, until [`Self::remove_super_triangle`] runs.
    #[must_use]
    pub const fn super_vertices(&self) -> Option<[VertexKey; 3]> {
        self.super_vertices
    }

    /// Returns `true` for the auxiliary super-triangle corners.
    #[must_use]
    pub fn is_super_vertex(&self, vertex: VertexKey) -> bool {
        self.super_vertices
            .is_some_and(|corners| corners.contains(&vertex))
    }

    /// The vertex standing for an input position, following near-duplicate merges.
    #[must_use]
    pub fn resolve(&self, point: Point2) -> Option<VertexKey> {
        self.mesh
            .vertex_at(point)
            .or_else(|| self.aliases.get(&point.key()).copied())
    }

    // -------------------------------------------------------------------------
    // Insertion
    // -------------------------------------------------------------------------

    /// Inserts every point in iteration order.
    ///
    /// # Errors
    ///
    /// Stops at the first [`InsertionError`].
    pub fn insert_all<I>(&mut self, points: I) -> Result<(), InsertionError>
    where
        I: IntoIterator<Item = Point2>,
    {
        for point in points {
            self.insert(point)?;
        }
        Ok(())
    }

    /// Inserts one point and restores the Delaunay property around it.
    ///
    /// # Errors
    ///
    /// [`InsertionError::NonFinitePoint`] for NaN or infinite coordinates and
    /// [`InsertionError::Mesh`] if the mesh turns out to be inconsistent.
    /// Points that cannot be located are skipped, not errors.
    pub fn insert(&mut self, point: Point2) -> Result<InsertionOutcome, InsertionError> {
        if !point.is_finite() {
            return Err(InsertionError::NonFinitePoint { point });
        }
        if let Some(existing) = self.resolve(point) {
            self.stats.duplicates += 1;
            return Ok(InsertionOutcome::Duplicate(existing));
        }

        let Some(face) = self.find_face(point)? else {
            tracing::warn!("No face contains {point}; skipping it");
            self.stats.skipped += 1;
            return Ok(InsertionOutcome::Skipped);
        };

        let located = classify_in_face(&self.mesh, face, point)?;
        if let LocateResult::OnVertex(existing) = located {
            tracing::warn!("{point} is within tolerance of vertex {existing:?}; merging into it");
            return Ok(self.merge_into(point, existing));
        }

        let Some(split) = self.choose_split(face, located, point)? else {
            let existing = self.nearest_corner(face, point)?;
            tracing::warn!(
                "Every split at {point} would create a degenerate face; merging into {existing:?}"
            );
            self.stats.degenerate_merges += 1;
            return Ok(self.merge_into(point, existing));
        };
        let (vertex, stack) = match split {
            Split::Face(face) => {
                self.stats.face_splits += 1;
                self.split_face(face, point)?
            }
            Split::Edge(half_edge) => {
                self.stats.edge_splits += 1;
                self.split_edge(half_edge, point)?
            }
        };

        self.legalize(stack)?;
        self.stats.inserted += 1;
        Ok(InsertionOutcome::Inserted(vertex))
    }

    fn start_face(&mut self) -> Option<FaceKey> {
        match self.hint {
            HintStrategy::LastInserted => self
                .last_face
                .filter(|&face| self.mesh.contains_face(face)),
            HintStrategy::FirstFace => None,
            HintStrategy::Seeded(_) => self
                .rng
                .as_mut()
                .and_then(|rng| random_face(&self.mesh, rng)),
        }
    }

    fn merge_into(&mut self, point: Point2, existing: VertexKey) -> InsertionOutcome {
        self.aliases.insert(point.key(), existing);
        self.stats.merged += 1;
        InsertionOutcome::Merged(existing)
    }

    fn find_face(&mut self, point: Point2) -> Result<Option<FaceKey>, InsertionError> {
        let hint = self.start_face();
        let near = match walk(
            &self.mesh,
            point,
            hint,
            self.limits.walk_steps,
            Containment::Tolerant,
            None,
        ) {
            Ok(face) => Some(face),
            Err(LocateError::Mesh { source }) => return Err(source.into()),
            Err(error) => {
                tracing::debug!("Walk failed ({error}); retrying with exact containment");
                if let LocateError::StepLimitExceeded { steps } = error {
                    self.exhausted.push(IterationLimitExceeded {
                        label: "triangulation walk",
                        limit: steps,
                    });
                }
                None
            }
        };

        // The tolerant walk may stop one face short of the point; settle on
        // the face that holds it exactly.
        match walk(
            &self.mesh,
            point,
            near.or(hint),
            self.limits.walk_steps,
            Containment::Exact,
            None,
        ) {
            Ok(face) => Ok(Some(face)),
            Err(LocateError::Mesh { source }) => Err(source.into()),
            Err(error) => {
                tracing::debug!("Exact walk failed ({error}); scanning all faces for {point}");
                self.stats.walk_fallbacks += 1;
                match locate_brute_force(&self.mesh, point, Containment::Exact)? {
                    Some(face) => Ok(Some(face)),
                    None => Ok(locate_brute_force(&self.mesh, point, Containment::Tolerant)?),
                }
            }
        }
    }

    /// First split of `face` whose new faces are all strictly clockwise.
    ///
    /// The classification is tried first, then a three-way face split, then
    /// a split of each interior edge of the face.
    fn choose_split(
        &self,
        face: FaceKey,
        located: LocateResult,
        point: Point2,
    ) -> Result<Option<Split>, MeshError> {
        let mut candidates = Vec::with_capacity(5);
        match located {
            LocateResult::OnEdge(half_edge) => candidates.push(Split::Edge(half_edge)),
            LocateResult::InsideFace(_) | LocateResult::OnVertex(_) => {}
        }
        candidates.push(Split::Face(face));
        for half_edge in self.mesh.face_half_edges(face)? {
            if self.mesh.opposite(half_edge)?.is_some() {
                candidates.push(Split::Edge(half_edge));
            }
        }

        for candidate in candidates {
            if self.split_is_valid(candidate, point)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn split_is_valid(&self, split: Split, point: Point2) -> Result<bool, MeshError> {
        let corners = match split {
            Split::Face(face) => {
                let [a, b, c] = self.mesh.face_vertices(face)?;
                vec![[a, b], [b, c], [c, a]]
            }
            Split::Edge(half_edge) => {
                let a = self.mesh.origin(half_edge)?;
                let b = self.mesh.target(half_edge)?;
                let c = self.mesh.apex(half_edge)?;
                let mut pairs = vec![[b, c], [c, a]];
                if let Some(twin) = self.mesh.opposite(half_edge)? {
                    let d = self.mesh.apex(twin)?;
                    pairs.extend([[a, d], [d, b]]);
                }
                pairs
            }
        };
        // Each new face is (u, w, point) up to rotation.
        for [u, w] in corners {
            let (pu, pw) = (self.mesh.position(u)?, self.mesh.position(w)?);
            if !is_strictly_clockwise(pu, pw, point) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn nearest_corner(&self, face: FaceKey, point: Point2) -> Result<VertexKey, MeshError> {
        let [a, b, c] = self.mesh.face_vertices(face)?;
        let mut nearest = (a, self.mesh.position(a)?.squared_distance(point));
        for vertex in [b, c] {
            let distance = self.mesh.position(vertex)?.squared_distance(point);
            if distance < nearest.1 {
                nearest = (vertex, distance);
            }
        }
        Ok(nearest.0)
    }

    /// Replaces `face` by three faces fanning around the new vertex.
    fn split_face(
        &mut self,
        face: FaceKey,
        point: Point2,
    ) -> Result<(VertexKey, HalfEdgeStack), MeshError> {
        let [a, b, c] = self.mesh.face_vertices(face)?;
        self.mesh.delete_face(face)?;
        let v = self.mesh.insert_vertex(point);

        let mut stack = HalfEdgeStack::new();
        for corners in [[a, b, v], [b, c, v], [c, a, v]] {
            let created = self.mesh.create_face(corners);
            stack.push(self.mesh.face_half_edges(created)?[0]);
            self.last_face = Some(created);
        }
        Ok((v, stack))
    }

    /// Splits `half_edge` at the new vertex, replacing its face (and the
    /// neighbouring face, if any) by two faces each.
    fn split_edge(
        &mut self,
        half_edge: HalfEdgeKey,
        point: Point2,
    ) -> Result<(VertexKey, HalfEdgeStack), MeshError> {
        let a = self.mesh.origin(half_edge)?;
        let b = self.mesh.target(half_edge)?;
        let c = self.mesh.apex(half_edge)?;
        let face = self.mesh.face_of(half_edge)?;
        let neighbour = match self.mesh.opposite(half_edge)? {
            Some(twin) => Some((self.mesh.face_of(twin)?, self.mesh.apex(twin)?)),
            None => None,
        };

        self.mesh.delete_face(face)?;
        if let Some((twin_face, _)) = neighbour {
            self.mesh.delete_face(twin_face)?;
        }
        let v = self.mesh.insert_vertex(point);

        // (a, b, c) -> (a, v, c) + (v, b, c); (b, a, d) -> (b, v, d) + (v, a, d).
        // Each entry pairs the corners with the ring slot of the edge facing v.
        let mut pieces = vec![([a, v, c], 2), ([v, b, c], 1)];
        if let Some((_, d)) = neighbour {
            pieces.extend([([b, v, d], 2), ([v, a, d], 1)]);
        }

        let mut stack = HalfEdgeStack::new();
        for (corners, far_edge) in pieces {
            let created = self.mesh.create_face(corners);
            stack.push(self.mesh.face_half_edges(created)?[far_edge]);
            self.last_face = Some(created);
        }
        Ok((v, stack))
    }

    /// Flips edges off `stack` until none violates the circumcircle criterion.
    fn legalize(&mut self, mut stack: HalfEdgeStack) -> Result<(), InsertionError> {
        let mesh = &mut self.mesh;
        let stats = &mut self.stats;

        let outcome = bounded("edge legalization", self.limits.legalization_flips, |_| {
            let Some(half_edge) = stack.pop() else {
                return Ok(ControlFlow::Break(()));
            };
            let Some(twin) = mesh.opposite(half_edge)? else {
                return Ok(ControlFlow::Continue(()));
            };
            let (a, b) = mesh.edge_positions(half_edge)?;
            let c = mesh.position(mesh.apex(half_edge)?)?;
            let d = mesh.position(mesh.apex(twin)?)?;

            if violates_delaunay(a, b, c, d) && mesh.is_flippable(half_edge)? {
                let far = [mesh.next(twin)?, mesh.prev(twin)?];
                mesh.flip_edge(half_edge)?;
                stats.flips += 1;
                stack.extend(far);
            }
            Ok::<_, MeshError>(ControlFlow::Continue(()))
        })?;

        if let Bounded::Exhausted(exceeded) = outcome {
            self.exhausted.push(exceeded);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Finishing
    // -------------------------------------------------------------------------

    /// Deletes every face touching a super-triangle corner, then the corners.
    ///
    /// Returns the number of faces removed; a second call removes nothing.
    ///
    /// # Errors
    ///
    /// [`MeshError`] if the mesh is inconsistent.
    pub fn remove_super_triangle(&mut self) -> Result<usize, MeshError> {
        let Some(corners) = self.super_vertices.take() else {
            return Ok(0);
        };
        let mut doomed = Vec::new();
        for face in self.mesh.face_keys() {
            if self
                .mesh
                .face_vertices(face)?
                .iter()
                .any(|v| corners.contains(v))
            {
                doomed.push(face);
            }
        }
        for &face in &doomed {
            self.mesh.delete_face(face)?;
        }
        for corner in corners {
            self.mesh.remove_isolated_vertex(corner)?;
        }
        tracing::debug!("Removed {} faces incident to the super triangle", doomed.len());
        Ok(doomed.len())
    }

    /// Removes the super triangle and returns the finished mesh.
    ///
    /// # Errors
    ///
    /// [`InsertionError::Mesh`] if the mesh is inconsistent.
    pub fn finish(&mut self) -> Result<HalfEdgeMesh, InsertionError> {
        self.remove_super_triangle()?;
        Ok(std::mem::take(&mut self.mesh))
    }

    /// Returns the mesh as it stands, super triangle included if still present.
    #[must_use]
    pub fn into_mesh(self) -> HalfEdgeMesh {
        self.mesh
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::util::delaunay_validation::find_delaunay_violations;
    use crate::geometry::point::PositionKey;
    use rand::Rng;

    fn unit_bounds() -> Aabb {
        Aabb {
            min: Point2::new(0.0, 0.0),
            max: Point2::new(1.0, 1.0),
        }
    }

    fn random_points(seed: u64, count: usize) -> Vec<Point2> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| Point2::new(rng.random_range(0.0..1.0), rng.random_range(0.0..1.0)))
            .collect()
    }

    /// Undirected edges as sorted position-key pairs.
    fn edge_set(mesh: &HalfEdgeMesh) -> Vec<(PositionKey, PositionKey)> {
        let mut edges: Vec<_> = mesh
            .half_edges()
            .map(|(h, _)| {
                let (a, b) = mesh.edge_positions(h).unwrap();
                let (ka, kb) = (a.key(), b.key());
                if ka <= kb { (ka, kb) } else { (kb, ka) }
            })
            .collect();
        edges.sort_unstable();
        edges.dedup();
        edges
    }

    #[test]
    fn test_insert_into_super_triangle_splits_face() {
        let mut dt = IncrementalDelaunay::new(
            &unit_bounds(),
            HintStrategy::default(),
            IterationLimits::default(),
        );
        assert_eq!(dt.mesh().number_of_faces(), 1);

        let outcome = dt.insert(Point2::new(0.5, 0.5)).unwrap();
        assert!(matches!(outcome, InsertionOutcome::Inserted(_)));
        assert_eq!(dt.mesh().number_of_faces(), 3);
        assert_eq!(dt.mesh().number_of_vertices(), 4);
        assert_eq!(dt.stats().face_splits, 1);
        dt.mesh().validate().unwrap();
    }

    #[test]
    fn test_duplicates_and_near_duplicates() {
        let mut dt = IncrementalDelaunay::new(
            &unit_bounds(),
            HintStrategy::default(),
            IterationLimits::default(),
        );
        let first = dt.insert(Point2::new(0.25, 0.25)).unwrap().vertex().unwrap();

        let duplicate = dt.insert(Point2::new(0.25, 0.25)).unwrap();
        assert_eq!(duplicate, InsertionOutcome::Duplicate(first));

        let near = Point2::new(0.25 + 1e-7, 0.25);
        let merged = dt.insert(near).unwrap();
        assert_eq!(merged, InsertionOutcome::Merged(first));
        assert_eq!(dt.resolve(near), Some(first));

        // A repeat of the merged position resolves through the alias.
        assert_eq!(dt.insert(near).unwrap(), InsertionOutcome::Duplicate(first));

        assert_eq!(dt.stats().inserted, 1);
        assert_eq!(dt.stats().duplicates, 2);
        assert_eq!(dt.stats().merged, 1);
        assert_eq!(dt.mesh().number_of_vertices(), 4);
    }

    #[test]
    fn test_point_on_edge_splits_edge() {
        let mut dt = IncrementalDelaunay::new(
            &unit_bounds(),
            HintStrategy::default(),
            IterationLimits::default(),
        );
        dt.insert(Point2::new(0.0, 0.0)).unwrap();
        dt.insert(Point2::new(1.0, 0.0)).unwrap();
        let before = dt.mesh().number_of_faces();

        dt.insert(Point2::new(0.5, 0.0)).unwrap();
        assert_eq!(dt.stats().edge_splits, 1);
        assert_eq!(dt.mesh().number_of_faces(), before + 2);
        dt.mesh().validate().unwrap();
    }

    #[test]
    fn test_non_finite_point_is_rejected() {
        let mut dt = IncrementalDelaunay::new(
            &unit_bounds(),
            HintStrategy::default(),
            IterationLimits::default(),
        );
        let result = dt.insert(Point2::new(f64::NAN, 0.0));
        assert!(
            matches!(result, Err(InsertionError::NonFinitePoint { .. })),
            "Expected non-finite rejection, got {result:?}"
        );
    }

    #[test]
    fn test_face_count_before_super_triangle_removal() {
        let points = random_points(11, 40);
        let dt = IncrementalDelaunay::from_points(
            &points,
            HintStrategy::default(),
            IterationLimits::default(),
        )
        .unwrap();
        let inserted = dt.stats().inserted;
        assert_eq!(inserted + dt.stats().merged, points.len());
        // A triangulation of n interior points inside a triangle has 2n + 1 faces.
        assert_eq!(dt.mesh().number_of_faces(), 2 * inserted + 1);
        dt.mesh().validate().unwrap();
    }

    #[test]
    fn test_random_points_are_delaunay() {
        for seed in [1, 2, 3] {
            let points = random_points(seed, 60);
            let mut dt = IncrementalDelaunay::from_points(
                &points,
                HintStrategy::default(),
                IterationLimits::default(),
            )
            .unwrap();
            assert!(dt.exhausted().is_empty());
            let mesh = dt.finish().unwrap();
            mesh.validate().unwrap();
            let violations = find_delaunay_violations(&mesh, None).unwrap();
            assert!(
                violations.is_empty(),
                "seed {seed}: {} Delaunay violations",
                violations.len()
            );
        }
    }

    #[test]
    fn test_hint_strategy_does_not_change_result() {
        let points = random_points(5, 50);
        let build = |hint| {
            let mut dt =
                IncrementalDelaunay::from_points(&points, hint, IterationLimits::default())
                    .unwrap();
            edge_set(&dt.finish().unwrap())
        };
        let reference = build(HintStrategy::LastInserted);
        assert_eq!(build(HintStrategy::FirstFace), reference);
        assert_eq!(build(HintStrategy::Seeded(42)), reference);
        assert_eq!(build(HintStrategy::Seeded(42)), build(HintStrategy::Seeded(42)));
    }

    #[test]
    fn test_remove_super_triangle_is_idempotent() {
        let points = random_points(9, 10);
        let mut dt = IncrementalDelaunay::from_points(
            &points,
            HintStrategy::default(),
            IterationLimits::default(),
        )
        .unwrap();
        let corners = dt.super_vertices().unwrap();
        assert!(dt.is_super_vertex(corners[0]));

        let removed = dt.remove_super_triangle().unwrap();
        assert!(removed > 0);
        assert_eq!(dt.remove_super_triangle().unwrap(), 0);
        assert!(dt.super_vertices().is_none());
        assert_eq!(dt.mesh().number_of_vertices(), points.len());
        dt.mesh().validate().unwrap();
    }

    fn assert_strictly_clockwise(mesh: &HalfEdgeMesh) {
        for face in mesh.face_keys() {
            let [a, b, c] = mesh.face_positions(face).unwrap();
            assert!(
                is_strictly_clockwise(a, b, c),
                "Face {face:?} is degenerate or inverted: {a} {b} {c}"
            );
        }
    }

    /// Integer font units in a 2048 em, mapped into the unit box.
    fn clustered_grid_points(seed: u64, count: usize) -> Vec<Point2> {
        let unit = 1.0 / 2048.0;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        points.extend((0..count).map(|_| {
            let x: u32 = rng.random_range(1000..1040);
            let y: u32 = rng.random_range(1000..1040);
            Point2::new(f64::from(x) * unit, f64::from(y) * unit)
        }));
        points
    }

    #[test]
    fn test_point_beside_short_edge_splits_face() {
        let unit = 1.0 / 2048.0;
        let mut dt = IncrementalDelaunay::new(
            &unit_bounds(),
            HintStrategy::default(),
            IterationLimits::default(),
        );
        dt.insert(Point2::new(0.5, 0.5)).unwrap();
        dt.insert(Point2::new(0.5 + unit, 0.5)).unwrap();
        dt.insert(Point2::new(0.5, 0.6)).unwrap();
        let edge_splits = dt.stats().edge_splits;

        // Twenty thousandths above an edge one font unit long.
        let outcome = dt.insert(Point2::new(0.5 + unit / 4.0, 0.52)).unwrap();
        assert!(matches!(outcome, InsertionOutcome::Inserted(_)));
        assert_eq!(dt.stats().edge_splits, edge_splits);
        dt.mesh().validate().unwrap();
        assert_strictly_clockwise(dt.mesh());
    }

    #[test]
    fn test_clustered_integer_grid_keeps_faces_clockwise() {
        for seed in [1, 7, 23, 99] {
            let points = clustered_grid_points(seed, 60);
            let mut dt = IncrementalDelaunay::from_points(
                &points,
                HintStrategy::default(),
                IterationLimits::default(),
            )
            .unwrap();
            dt.mesh().validate().unwrap();
            assert_strictly_clockwise(dt.mesh());
            assert_eq!(dt.mesh().number_of_faces(), 2 * dt.stats().inserted + 1);

            let mesh = dt.finish().unwrap();
            let area: f64 = mesh
                .face_keys()
                .map(|face| {
                    let [a, b, c] = mesh.face_positions(face).unwrap();
                    -0.5 * crate::geometry::predicates::signed_area2(a, b, c)
                })
                .sum();
            approx::assert_relative_eq!(area, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_legalization_skips_unflippable_edges() {
        // Rows of collinear integer points produce co-circular and nearly
        // degenerate quads at every step.
        let unit = 1.0 / 2048.0;
        let points: Vec<Point2> = (0..8)
            .flat_map(|i| (0..8).map(move |j| (i, j)))
            .map(|(i, j)| Point2::new(0.5 + f64::from(i) * unit, 0.5 + f64::from(j) * unit))
            .collect();
        let mut dt = IncrementalDelaunay::from_points(
            &points,
            HintStrategy::default(),
            IterationLimits::default(),
        )
        .unwrap();
        assert!(dt.exhausted().is_empty());
        assert_eq!(dt.stats().inserted, points.len());
        let mesh = dt.finish().unwrap();
        mesh.validate().unwrap();
        assert_strictly_clockwise(&mesh);
        // A 7 x 7 block of unit squares, two triangles each.
        assert_eq!(mesh.number_of_faces(), 98);
    }

    #[test]
    fn test_legalization_ceiling_is_reported() {
        let points = random_points(3, 30);
        let limits = IterationLimits::default().with_legalization_flips(1);
        let dt = IncrementalDelaunay::from_points(&points, HintStrategy::default(), limits)
            .unwrap();
        assert!(!dt.exhausted().is_empty());
        assert!(
            dt.exhausted()
                .iter()
                .all(|e| e.label == "edge legalization" && e.limit == 1)
        );
        dt.mesh().validate().unwrap();
    }
}
