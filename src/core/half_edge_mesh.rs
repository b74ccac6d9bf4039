//! Arena-backed half-edge mesh for planar triangulations.
//!
//! Vertices, half-edges and faces live in [`StorageMap`] arenas and refer to
//! each other through typed keys. A half-edge stores its destination vertex,
//! its face, the `next`/`prev` half-edges around that face and, for interior
//! edges, the `opposite` half-edge of the neighbouring face. The origin of a
//! half-edge is the destination of its `prev`.
//!
//! Faces are triangles stored in **clockwise** order. Two lookup tables are
//! maintained alongside the arenas:
//!
//! - a position index, enforcing one vertex per position;
//! - a directed edge index `(origin, destination) -> half-edge`, enforcing one
//!   half-edge per ordered vertex pair and giving O(1) edge queries.
//!
//! Both tables make the planar-graph invariants checkable through
//! [`HalfEdgeMesh::validate`].

use crate::core::collections::{
    Entry, FaceHalfEdges, FaceVertices, FastHashMap, FastHashSet, StorageMap,
    fast_hash_map_with_capacity,
};
use crate::geometry::point::{Point2, PositionKey};
use crate::geometry::predicates::{
    Orientation, is_quadrilateral_convex, is_strictly_clockwise, orientation,
};
use slotmap::{Key, new_key_type};
use thiserror::Error;

// =============================================================================
// KEYS
// =============================================================================

new_key_type! {
    /// Handle of a vertex in a [`HalfEdgeMesh`].
    pub struct VertexKey;
}

new_key_type! {
    /// Handle of a half-edge in a [`HalfEdgeMesh`].
    pub struct HalfEdgeKey;
}

new_key_type! {
    /// Handle of a triangular face in a [`HalfEdgeMesh`].
    pub struct FaceKey;
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by mesh queries and topological operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    /// A vertex key does not refer to a live vertex.
    #[error("Vertex {vertex:?} not found in mesh")]
    MissingVertex {
        /// The stale key.
        vertex: VertexKey,
    },
    /// A half-edge key does not refer to a live half-edge.
    #[error("Half-edge {half_edge:?} not found in mesh")]
    MissingHalfEdge {
        /// The stale key.
        half_edge: HalfEdgeKey,
    },
    /// A face key does not refer to a live face.
    #[error("Face {face:?} not found in mesh")]
    MissingFace {
        /// The stale key.
        face: FaceKey,
    },
    /// A triangle was requested with a repeated vertex.
    #[error("Triangle {vertices:?} repeats a vertex")]
    RepeatedVertex {
        /// The requested corners.
        vertices: FaceVertices,
    },
    /// Creating the face would produce a second half-edge for an ordered vertex pair.
    #[error("Half-edge {origin:?} -> {target:?} already exists")]
    DuplicateHalfEdge {
        /// Origin of the conflicting half-edge.
        origin: VertexKey,
        /// Destination of the conflicting half-edge.
        target: VertexKey,
    },
    /// Boundary half-edges have no second face to flip into.
    #[error("Cannot flip boundary half-edge {half_edge:?}")]
    BoundaryEdge {
        /// The half-edge passed to the flip.
        half_edge: HalfEdgeKey,
    },
    /// The two faces around the half-edge do not form a convex quadrilateral.
    #[error("Cannot flip half-edge {half_edge:?}: quadrilateral is not convex")]
    NonConvexQuadrilateral {
        /// The half-edge passed to the flip.
        half_edge: HalfEdgeKey,
    },
    /// The vertex still has incident half-edges.
    #[error("Vertex {vertex:?} is still referenced by a half-edge")]
    VertexInUse {
        /// The vertex that could not be removed.
        vertex: VertexKey,
    },
}

/// Invariant violations found by [`HalfEdgeMesh::validate`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MeshValidationError {
    /// A face's half-edges do not form a closed three-cycle owned by that face.
    #[error("Face {face:?} does not own a closed cycle of three half-edges")]
    BrokenFaceCycle {
        /// The offending face.
        face: FaceKey,
    },
    /// `next` and `prev` disagree.
    #[error("Half-edge {half_edge:?} has inconsistent next/prev links")]
    InconsistentNextPrev {
        /// The offending half-edge.
        half_edge: HalfEdgeKey,
    },
    /// `opposite.opposite` does not lead back.
    #[error("Half-edge {half_edge:?} has an asymmetric opposite link")]
    AsymmetricOpposite {
        /// The offending half-edge.
        half_edge: HalfEdgeKey,
    },
    /// The opposite half-edge does not run between the same vertices in reverse.
    #[error("Half-edge {half_edge:?} is paired with a half-edge of different endpoints")]
    MismatchedOpposite {
        /// The offending half-edge.
        half_edge: HalfEdgeKey,
    },
    /// A reverse half-edge exists but is not linked as the opposite.
    #[error("Half-edge {half_edge:?} is missing its opposite link")]
    UnlinkedOpposite {
        /// The offending half-edge.
        half_edge: HalfEdgeKey,
    },
    /// Two half-edges span the same ordered vertex pair.
    #[error("More than one half-edge runs {origin:?} -> {target:?}")]
    DuplicateDirectedEdge {
        /// Shared origin.
        origin: VertexKey,
        /// Shared destination.
        target: VertexKey,
    },
    /// The directed edge index disagrees with the arena.
    #[error("Directed edge index is out of sync for half-edge {half_edge:?}")]
    EdgeIndexMismatch {
        /// The half-edge whose index entry is wrong.
        half_edge: HalfEdgeKey,
    },
    /// Two vertices share a position.
    #[error("Vertex {vertex:?} duplicates the position of another vertex")]
    DuplicatePosition {
        /// The shadowed vertex.
        vertex: VertexKey,
    },
    /// The position index disagrees with the arena.
    #[error("Position index is out of sync for vertex {vertex:?}")]
    PositionIndexMismatch {
        /// The vertex whose index entry is wrong.
        vertex: VertexKey,
    },
    /// A dangling key was found while walking the mesh.
    #[error("Dangling reference: {0}")]
    Dangling(#[from] MeshError),
}

// =============================================================================
// ELEMENTS
// =============================================================================

/// A mesh vertex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    position: Point2,
}

impl Vertex {
    /// Position of the vertex.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> Point2 {
        self.position
    }
}

/// A directed edge bounding one face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HalfEdge {
    target: VertexKey,
    face: FaceKey,
    next: HalfEdgeKey,
    prev: HalfEdgeKey,
    opposite: Option<HalfEdgeKey>,
}

impl HalfEdge {
    /// Destination vertex.
    #[inline]
    #[must_use]
    pub const fn target(&self) -> VertexKey {
        self.target
    }

    /// Face this half-edge bounds.
    #[inline]
    #[must_use]
    pub const fn face(&self) -> FaceKey {
        self.face
    }

    /// Next half-edge around the face.
    #[inline]
    #[must_use]
    pub const fn next(&self) -> HalfEdgeKey {
        self.next
    }

    /// Previous half-edge around the face.
    #[inline]
    #[must_use]
    pub const fn prev(&self) -> HalfEdgeKey {
        self.prev
    }

    /// Reverse half-edge in the neighbouring face; `None` on the boundary.
    #[inline]
    #[must_use]
    pub const fn opposite(&self) -> Option<HalfEdgeKey> {
        self.opposite
    }
}

/// A triangular face, identified by one of its half-edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Face {
    edge: HalfEdgeKey,
}

impl Face {
    /// The half-edge leaving the face's first vertex.
    #[inline]
    #[must_use]
    pub const fn edge(&self) -> HalfEdgeKey {
        self.edge
    }
}

// =============================================================================
// MESH
// =============================================================================

/// Planar triangle mesh in half-edge form.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::half_edge_mesh::HalfEdgeMesh;
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
/// assert_eq!(mesh.number_of_faces(), 2);
/// assert!(mesh.contains_edge(a, c));
/// assert!(mesh.validate().is_ok());
/// ```
#[derive(Clone, Debug, Default)]
pub struct HalfEdgeMesh {
    vertices: StorageMap<VertexKey, Vertex>,
    half_edges: StorageMap<HalfEdgeKey, HalfEdge>,
    faces: StorageMap<FaceKey, Face>,
    position_index: FastHashMap<PositionKey, VertexKey>,
    edge_index: FastHashMap<(VertexKey, VertexKey), HalfEdgeKey>,
}

impl HalfEdgeMesh {
    /// Creates an empty mesh.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty mesh sized for roughly `vertices` vertices.
    #[must_use]
    pub fn with_capacity(vertices: usize) -> Self {
        let faces = vertices.saturating_mul(2);
        let half_edges = faces.saturating_mul(3);
        Self {
            vertices: StorageMap::with_capacity_and_key(vertices),
            half_edges: StorageMap::with_capacity_and_key(half_edges),
            faces: StorageMap::with_capacity_and_key(faces),
            position_index: fast_hash_map_with_capacity(vertices),
            edge_index: fast_hash_map_with_capacity(half_edges),
        }
    }

    // -------------------------------------------------------------------------
    // Counts and iteration
    // -------------------------------------------------------------------------

    /// Number of live vertices.
    #[must_use]
    pub fn number_of_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of live half-edges.
    #[must_use]
    pub fn number_of_half_edges(&self) -> usize {
        self.half_edges.len()
    }

    /// Number of live faces.
    #[must_use]
    pub fn number_of_faces(&self) -> usize {
        self.faces.len()
    }

    /// Returns `true` when the mesh has no faces.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Iterates over vertices.
    pub fn vertices(&self) -> impl Iterator<Item = (VertexKey, &Vertex)> {
        self.vertices.iter()
    }

    /// Iterates over half-edges.
    pub fn half_edges(&self) -> impl Iterator<Item = (HalfEdgeKey, &HalfEdge)> {
        self.half_edges.iter()
    }

    /// Iterates over faces.
    pub fn faces(&self) -> impl Iterator<Item = (FaceKey, &Face)> {
        self.faces.iter()
    }

    /// Iterates over face keys.
    pub fn face_keys(&self) -> impl Iterator<Item = FaceKey> + '_ {
        self.faces.keys()
    }

    // -------------------------------------------------------------------------
    // Element access
    // -------------------------------------------------------------------------

    /// Vertex by key.
    #[must_use]
    pub fn get_vertex(&self, vertex: VertexKey) -> Option<&Vertex> {
        self.vertices.get(vertex)
    }

    /// Half-edge by key.
    #[must_use]
    pub fn get_half_edge(&self, half_edge: HalfEdgeKey) -> Option<&HalfEdge> {
        self.half_edges.get(half_edge)
    }

    /// Face by key.
    #[must_use]
    pub fn get_face(&self, face: FaceKey) -> Option<&Face> {
        self.faces.get(face)
    }

    /// Returns `true` if `face` is live.
    #[must_use]
    pub fn contains_face(&self, face: FaceKey) -> bool {
        self.faces.contains_key(face)
    }

    /// Half-edge by key, as a `Result`.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingHalfEdge`] for a stale key.
    pub fn half_edge(&self, half_edge: HalfEdgeKey) -> Result<&HalfEdge, MeshError> {
        self.half_edges
            .get(half_edge)
            .ok_or(MeshError::MissingHalfEdge { half_edge })
    }

    /// Position of a vertex.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingVertex`] for a stale key.
    pub fn position(&self, vertex: VertexKey) -> Result<Point2, MeshError> {
        self.vertices
            .get(vertex)
            .map(Vertex::position)
            .ok_or(MeshError::MissingVertex { vertex })
    }

    /// Vertex at exactly `position`, if any.
    #[must_use]
    pub fn vertex_at(&self, position: Point2) -> Option<VertexKey> {
        self.position_index.get(&position.key()).copied()
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Destination vertex of a half-edge.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingHalfEdge`] for a stale key.
    pub fn target(&self, half_edge: HalfEdgeKey) -> Result<VertexKey, MeshError> {
        Ok(self.half_edge(half_edge)?.target)
    }

    /// Origin vertex of a half-edge (destination of its `prev`).
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingHalfEdge`] for a stale key.
    pub fn origin(&self, half_edge: HalfEdgeKey) -> Result<VertexKey, MeshError> {
        let prev = self.half_edge(half_edge)?.prev;
        self.target(prev)
    }

    /// Next half-edge around the face.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingHalfEdge`] for a stale key.
    pub fn next(&self, half_edge: HalfEdgeKey) -> Result<HalfEdgeKey, MeshError> {
        Ok(self.half_edge(half_edge)?.next)
    }

    /// Previous half-edge around the face.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingHalfEdge`] for a stale key.
    pub fn prev(&self, half_edge: HalfEdgeKey) -> Result<HalfEdgeKey, MeshError> {
        Ok(self.half_edge(half_edge)?.prev)
    }

    /// Opposite half-edge, `None` on the boundary.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingHalfEdge`] for a stale key.
    pub fn opposite(&self, half_edge: HalfEdgeKey) -> Result<Option<HalfEdgeKey>, MeshError> {
        Ok(self.half_edge(half_edge)?.opposite)
    }

    /// Face owning a half-edge.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingHalfEdge`] for a stale key.
    pub fn face_of(&self, half_edge: HalfEdgeKey) -> Result<FaceKey, MeshError> {
        Ok(self.half_edge(half_edge)?.face)
    }

    /// Vertex of the half-edge's face that is not on the half-edge.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingHalfEdge`] for a stale key.
    pub fn apex(&self, half_edge: HalfEdgeKey) -> Result<VertexKey, MeshError> {
        let next = self.next(half_edge)?;
        self.target(next)
    }

    /// Origin and destination positions of a half-edge.
    ///
    /// # Errors
    ///
    /// [`MeshError`] for a stale key.
    pub fn edge_positions(&self, half_edge: HalfEdgeKey) -> Result<(Point2, Point2), MeshError> {
        Ok((
            self.position(self.origin(half_edge)?)?,
            self.position(self.target(half_edge)?)?,
        ))
    }

    /// The three half-edges of a face, starting at [`Face::edge`].
    ///
    /// # Errors
    ///
    /// [`MeshError`] for a stale key.
    pub fn face_half_edges(&self, face: FaceKey) -> Result<FaceHalfEdges, MeshError> {
        let e0 = self
            .faces
            .get(face)
            .ok_or(MeshError::MissingFace { face })?
            .edge;
        let e1 = self.next(e0)?;
        let e2 = self.next(e1)?;
        Ok([e0, e1, e2])
    }

    /// The three vertices of a face in clockwise order.
    ///
    /// # Errors
    ///
    /// [`MeshError`] for a stale key.
    pub fn face_vertices(&self, face: FaceKey) -> Result<FaceVertices, MeshError> {
        let [e0, e1, e2] = self.face_half_edges(face)?;
        Ok([self.target(e2)?, self.target(e0)?, self.target(e1)?])
    }

    /// The three corner positions of a face in clockwise order.
    ///
    /// # Errors
    ///
    /// [`MeshError`] for a stale key.
    pub fn face_positions(&self, face: FaceKey) -> Result<[Point2; 3], MeshError> {
        let [a, b, c] = self.face_vertices(face)?;
        Ok([self.position(a)?, self.position(b)?, self.position(c)?])
    }

    /// Half-edge running `origin -> target`, if present.
    #[must_use]
    pub fn half_edge_between(&self, origin: VertexKey, target: VertexKey) -> Option<HalfEdgeKey> {
        self.edge_index.get(&(origin, target)).copied()
    }

    /// Returns `true` if `u` and `v` are joined by an edge in either direction.
    #[must_use]
    pub fn contains_edge(&self, u: VertexKey, v: VertexKey) -> bool {
        self.edge_index.contains_key(&(u, v)) || self.edge_index.contains_key(&(v, u))
    }

    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Inserts a vertex, returning the existing one when the position is taken.
    pub fn insert_vertex(&mut self, position: Point2) -> VertexKey {
        let key = position.key();
        if let Some(&existing) = self.position_index.get(&key) {
            return existing;
        }
        let vertex = self.vertices.insert(Vertex { position });
        self.position_index.insert(key, vertex);
        vertex
    }

    /// Adds a triangle on existing vertices, reordering them clockwise if needed.
    ///
    /// Opposite links to already present neighbours are set up automatically.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingVertex`] for stale keys, [`MeshError::RepeatedVertex`]
    /// when two corners coincide and [`MeshError::DuplicateHalfEdge`] when one
    /// of the directed edges is already owned by another face.
    pub fn add_triangle(
        &mut self,
        a: VertexKey,
        b: VertexKey,
        c: VertexKey,
    ) -> Result<FaceKey, MeshError> {
        if a == b || b == c || c == a {
            return Err(MeshError::RepeatedVertex {
                vertices: [a, b, c],
            });
        }
        let (pa, pb, pc) = (self.position(a)?, self.position(b)?, self.position(c)?);
        let corners = match orientation(pa, pb, pc) {
            Orientation::CLOCKWISE => [a, b, c],
            Orientation::COUNTERCLOCKWISE => [a, c, b],
        };
        for i in 0..3 {
            let (origin, target) = (corners[i], corners[(i + 1) % 3]);
            if self.edge_index.contains_key(&(origin, target)) {
                return Err(MeshError::DuplicateHalfEdge { origin, target });
            }
        }
        Ok(self.create_face(corners))
    }

    /// Creates a face from clockwise, distinct, live vertices whose directed
    /// edges are not yet in use.
    pub(crate) fn create_face(&mut self, corners: FaceVertices) -> FaceKey {
        let face = self.faces.insert(Face {
            edge: HalfEdgeKey::null(),
        });
        let ring: FaceHalfEdges = std::array::from_fn(|i| {
            self.half_edges.insert(HalfEdge {
                target: corners[(i + 1) % 3],
                face,
                next: HalfEdgeKey::null(),
                prev: HalfEdgeKey::null(),
                opposite: None,
            })
        });
        self.link_face(face, ring);
        for (i, &half_edge) in ring.iter().enumerate() {
            self.register_half_edge(half_edge, corners[i], corners[(i + 1) % 3]);
        }
        face
    }

    /// Points `face` and the three half-edges of `ring` at each other.
    fn link_face(&mut self, face: FaceKey, ring: FaceHalfEdges) {
        for i in 0..3 {
            let he = &mut self.half_edges[ring[i]];
            he.face = face;
            he.next = ring[(i + 1) % 3];
            he.prev = ring[(i + 2) % 3];
        }
        self.faces[face].edge = ring[0];
    }

    /// Records a half-edge in the edge index and pairs it with its reverse.
    fn register_half_edge(&mut self, half_edge: HalfEdgeKey, origin: VertexKey, target: VertexKey) {
        self.edge_index.insert((origin, target), half_edge);
        if let Some(&twin) = self.edge_index.get(&(target, origin)) {
            self.half_edges[half_edge].opposite = Some(twin);
            self.half_edges[twin].opposite = Some(half_edge);
        }
    }

    // -------------------------------------------------------------------------
    // Topological operations
    // -------------------------------------------------------------------------

    /// `true` when [`Self::flip_edge`] would succeed on `half_edge`: it has an
    /// opposite, the quadrilateral is strictly convex, both replacement faces
    /// are strictly clockwise and the other diagonal is not already an edge.
    ///
    /// # Errors
    ///
    /// [`MeshError`] for a stale key.
    pub fn is_flippable(&self, half_edge: HalfEdgeKey) -> Result<bool, MeshError> {
        let Some(twin) = self.opposite(half_edge)? else {
            return Ok(false);
        };
        let a = self.origin(half_edge)?;
        let b = self.target(half_edge)?;
        let c = self.apex(half_edge)?;
        let d = self.apex(twin)?;
        let (pa, pb, pc, pd) = (
            self.position(a)?,
            self.position(b)?,
            self.position(c)?,
            self.position(d)?,
        );
        Ok(is_quadrilateral_convex(pa, pb, pc, pd)
            && is_strictly_clockwise(pc, pd, pb)
            && is_strictly_clockwise(pd, pc, pa)
            && !self.contains_edge(c, d))
    }

    /// Replaces the diagonal shared by the two faces of `half_edge` with the
    /// quadrilateral's other diagonal.
    ///
    /// The two face slots and all six half-edge slots are reused: afterwards
    /// `half_edge` runs between the two former apexes, with its own former
    /// apex as origin, and its opposite runs the other way.
    ///
    /// # Errors
    ///
    /// [`MeshError::BoundaryEdge`] when the half-edge has no opposite and
    /// [`MeshError::NonConvexQuadrilateral`] when the flip would fold the mesh
    /// or leave a sliver face (see [`Self::is_flippable`]).
    pub fn flip_edge(&mut self, half_edge: HalfEdgeKey) -> Result<(), MeshError> {
        let h = half_edge;
        let t = self.opposite(h)?.ok_or(MeshError::BoundaryEdge { half_edge })?;
        if !self.is_flippable(h)? {
            return Err(MeshError::NonConvexQuadrilateral { half_edge });
        }
        let (hn, hp) = (self.next(h)?, self.prev(h)?);
        let (tn, tp) = (self.next(t)?, self.prev(t)?);

        let a = self.target(hp)?;
        let b = self.target(h)?;
        let c = self.target(hn)?;
        let d = self.target(tn)?;

        let (f, g) = (self.face_of(h)?, self.face_of(t)?);

        self.edge_index.remove(&(a, b));
        self.edge_index.remove(&(b, a));

        // (a, b, c) + (b, a, d)  ->  (c, d, b) + (d, c, a)
        self.link_face(f, [h, tp, hn]);
        self.link_face(g, [t, hp, tn]);
        self.half_edges[h].target = d;
        self.half_edges[t].target = c;

        self.edge_index.insert((c, d), h);
        self.edge_index.insert((d, c), t);
        Ok(())
    }

    /// Removes a face and its three half-edges, turning the edges it shared
    /// with neighbours into boundary edges. Vertices are kept.
    ///
    /// # Errors
    ///
    /// [`MeshError`] for a stale key.
    pub fn delete_face(&mut self, face: FaceKey) -> Result<(), MeshError> {
        let ring = self.face_half_edges(face)?;
        let mut endpoints = [(VertexKey::null(), VertexKey::null()); 3];
        for (slot, &half_edge) in endpoints.iter_mut().zip(&ring) {
            *slot = (self.origin(half_edge)?, self.target(half_edge)?);
        }

        for (&half_edge, endpoint) in ring.iter().zip(&endpoints) {
            let twin = self
                .half_edges
                .remove(half_edge)
                .and_then(|he| he.opposite);
            if let Some(twin_he) = twin.and_then(|twin| self.half_edges.get_mut(twin)) {
                twin_he.opposite = None;
            }
            self.edge_index.remove(endpoint);
        }
        self.faces.remove(face);
        Ok(())
    }

    /// Removes a vertex no half-edge refers to.
    ///
    /// # Errors
    ///
    /// [`MeshError::MissingVertex`] for a stale key and
    /// [`MeshError::VertexInUse`] if the vertex is still part of a face.
    pub fn remove_isolated_vertex(&mut self, vertex: VertexKey) -> Result<(), MeshError> {
        let position = self.position(vertex)?;
        if self.half_edges.values().any(|he| he.target == vertex) {
            return Err(MeshError::VertexInUse { vertex });
        }
        self.vertices.remove(vertex);
        let key = position.key();
        if self.position_index.get(&key) == Some(&vertex) {
            self.position_index.remove(&key);
        }
        Ok(())
    }

    /// Removes every vertex no half-edge points to. Returns how many went.
    pub fn remove_isolated_vertices(&mut self) -> usize {
        let referenced: FastHashSet<VertexKey> =
            self.half_edges.values().map(|he| he.target).collect();
        let isolated: Vec<VertexKey> = self
            .vertices
            .keys()
            .filter(|v| !referenced.contains(v))
            .collect();
        for &vertex in &isolated {
            if let Some(removed) = self.vertices.remove(vertex) {
                let key = removed.position.key();
                if self.position_index.get(&key) == Some(&vertex) {
                    self.position_index.remove(&key);
                }
            }
        }
        isolated.len()
    }

    /// Moves every vertex to `transform(key, position)` and rebuilds the
    /// position index.
    ///
    /// If two vertices land on the same position, the first one keeps the
    /// index entry and a warning is logged.
    pub fn map_positions<F>(&mut self, mut transform: F)
    where
        F: FnMut(VertexKey, Point2) -> Point2,
    {
        self.position_index.clear();
        for (key, vertex) in &mut self.vertices {
            vertex.position = transform(key, vertex.position);
            match self.position_index.entry(vertex.position.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(key);
                }
                Entry::Occupied(_) => tracing::warn!(
                    "Vertex {key:?} collapsed onto an existing position {} after transform",
                    vertex.position
                ),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Checks the structural invariants of the mesh: closed face cycles,
    /// symmetric opposites, unique directed edges and unique vertex positions.
    ///
    /// # Errors
    ///
    /// Returns the first [`MeshValidationError`] found.
    pub fn validate(&self) -> Result<(), MeshValidationError> {
        for (face, record) in &self.faces {
            let [e0, e1, e2] = self.face_half_edges(face)?;
            if self.next(e2)? != e0 || record.edge != e0 {
                return Err(MeshValidationError::BrokenFaceCycle { face });
            }
            for half_edge in [e0, e1, e2] {
                if self.face_of(half_edge)? != face {
                    return Err(MeshValidationError::BrokenFaceCycle { face });
                }
                if self.prev(self.next(half_edge)?)? != half_edge {
                    return Err(MeshValidationError::InconsistentNextPrev { half_edge });
                }
            }
        }

        let mut seen: FastHashSet<(VertexKey, VertexKey)> = FastHashSet::default();
        for (half_edge, record) in &self.half_edges {
            if !self.faces.contains_key(record.face) {
                return Err(MeshError::MissingFace { face: record.face }.into());
            }
            let origin = self.origin(half_edge)?;
            let target = record.target;
            if !seen.insert((origin, target)) {
                return Err(MeshValidationError::DuplicateDirectedEdge { origin, target });
            }
            if self.edge_index.get(&(origin, target)) != Some(&half_edge) {
                return Err(MeshValidationError::EdgeIndexMismatch { half_edge });
            }
            match record.opposite {
                Some(twin) => {
                    if self.opposite(twin)? != Some(half_edge) {
                        return Err(MeshValidationError::AsymmetricOpposite { half_edge });
                    }
                    if self.origin(twin)? != target || self.target(twin)? != origin {
                        return Err(MeshValidationError::MismatchedOpposite { half_edge });
                    }
                }
                None => {
                    if self.edge_index.contains_key(&(target, origin)) {
                        return Err(MeshValidationError::UnlinkedOpposite { half_edge });
                    }
                }
            }
        }
        if self.edge_index.len() != self.half_edges.len() {
            let half_edge = self
                .edge_index
                .values()
                .copied()
                .find(|&h| !self.half_edges.contains_key(h))
                .unwrap_or_default();
            return Err(MeshValidationError::EdgeIndexMismatch { half_edge });
        }

        for (vertex, record) in &self.vertices {
            match self.position_index.get(&record.position.key()) {
                Some(&indexed) if indexed == vertex => {}
                Some(_) => return Err(MeshValidationError::DuplicatePosition { vertex }),
                None => return Err(MeshValidationError::PositionIndexMismatch { vertex }),
            }
        }
        if self.position_index.len() != self.vertices.len() {
            let vertex = self
                .position_index
                .values()
                .copied()
                .find(|&v| !self.vertices.contains_key(v))
                .unwrap_or_default();
            return Err(MeshValidationError::PositionIndexMismatch { vertex });
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::predicates::signed_area2;

    /// Unit square split along `a c`.
    fn square() -> (HalfEdgeMesh, [VertexKey; 4]) {
        let mut mesh = HalfEdgeMesh::new();
        let a = mesh.insert_vertex(Point2::new(0.0, 0.0));
        let b = mesh.insert_vertex(Point2::new(1.0, 0.0));
        let c = mesh.insert_vertex(Point2::new(1.0, 1.0));
        let d = mesh.insert_vertex(Point2::new(0.0, 1.0));
        mesh.add_triangle(a, b, c).unwrap();
        mesh.add_triangle(a, c, d).unwrap();
        (mesh, [a, b, c, d])
    }

    fn assert_faces_clockwise(mesh: &HalfEdgeMesh) {
        for face in mesh.face_keys() {
            let [a, b, c] = mesh.face_positions(face).unwrap();
            assert!(
                signed_area2(a, b, c) < 0.0,
                "Face {face:?} is not clockwise: {a} {b} {c}"
            );
        }
    }

    #[test]
    fn test_insert_vertex_deduplicates_by_position() {
        let mut mesh = HalfEdgeMesh::new();
        let a = mesh.insert_vertex(Point2::new(1.0, 2.0));
        let b = mesh.insert_vertex(Point2::new(1.0, 2.0));
        let c = mesh.insert_vertex(Point2::new(-0.0, 0.0));
        let d = mesh.insert_vertex(Point2::new(0.0, 0.0));
        assert_eq!(a, b);
        assert_eq!(c, d);
        assert_eq!(mesh.number_of_vertices(), 2);
        assert_eq!(mesh.vertex_at(Point2::new(1.0, 2.0)), Some(a));
        assert_eq!(mesh.vertex_at(Point2::new(3.0, 2.0)), None);
    }

    #[test]
    fn test_add_triangle_links_opposites_and_orients_clockwise() {
        let (mesh, [a, b, c, d]) = square();
        assert_eq!(mesh.number_of_faces(), 2);
        assert_eq!(mesh.number_of_half_edges(), 6);
        assert_faces_clockwise(&mesh);

        let ac = mesh
            .half_edge_between(a, c)
            .or_else(|| mesh.half_edge_between(c, a))
            .unwrap();
        let twin = mesh.opposite(ac).unwrap().unwrap();
        assert_eq!(mesh.opposite(twin).unwrap(), Some(ac));
        assert_ne!(mesh.face_of(ac).unwrap(), mesh.face_of(twin).unwrap());

        assert!(mesh.contains_edge(a, b));
        assert!(mesh.contains_edge(d, a));
        assert!(!mesh.contains_edge(b, d));
        mesh.validate().unwrap();
    }

    #[test]
    fn test_add_triangle_rejects_duplicates() {
        let (mut mesh, [a, b, c, _]) = square();
        let result = mesh.add_triangle(a, b, c);
        assert!(
            matches!(result, Err(MeshError::DuplicateHalfEdge { .. })),
            "Expected duplicate half-edge, got {result:?}"
        );
        let result = mesh.add_triangle(a, a, c);
        assert!(matches!(result, Err(MeshError::RepeatedVertex { .. })));
        assert_eq!(mesh.number_of_faces(), 2);
    }

    #[test]
    fn test_face_navigation_is_consistent() {
        let (mesh, _) = square();
        for face in mesh.face_keys() {
            let ring = mesh.face_half_edges(face).unwrap();
            let vertices = mesh.face_vertices(face).unwrap();
            for (i, &half_edge) in ring.iter().enumerate() {
                assert_eq!(mesh.origin(half_edge).unwrap(), vertices[i]);
                assert_eq!(mesh.target(half_edge).unwrap(), vertices[(i + 1) % 3]);
                assert_eq!(mesh.apex(half_edge).unwrap(), vertices[(i + 2) % 3]);
            }
        }
    }

    #[test]
    fn test_flip_edge_swaps_diagonal() {
        let (mut mesh, [a, b, c, d]) = square();
        let diagonal = mesh.half_edge_between(a, c).unwrap();
        mesh.flip_edge(diagonal).unwrap();

        assert!(!mesh.contains_edge(a, c));
        assert!(mesh.contains_edge(b, d));
        assert_eq!(mesh.number_of_faces(), 2);
        assert_eq!(mesh.number_of_half_edges(), 6);
        assert_faces_clockwise(&mesh);
        mesh.validate().unwrap();

        // The flipped half-edge is the new diagonal.
        let (o, t) = (mesh.origin(diagonal).unwrap(), mesh.target(diagonal).unwrap());
        assert!((o, t) == (b, d) || (o, t) == (d, b));

        // Flipping back restores the original diagonal.
        mesh.flip_edge(diagonal).unwrap();
        assert!(mesh.contains_edge(a, c));
        mesh.validate().unwrap();
    }

    #[test]
    fn test_flip_edge_rejects_boundary_and_reflex() {
        let (mut mesh, [a, b, ..]) = square();
        let boundary = mesh
            .half_edge_between(a, b)
            .or_else(|| mesh.half_edge_between(b, a))
            .unwrap();
        let result = mesh.flip_edge(boundary);
        assert_eq!(
            result,
            Err(MeshError::BoundaryEdge {
                half_edge: boundary
            })
        );

        // Arrowhead: the two triangles around p-q form a reflex quadrilateral.
        let mut mesh = HalfEdgeMesh::new();
        let p = mesh.insert_vertex(Point2::new(0.0, 0.0));
        let q = mesh.insert_vertex(Point2::new(1.0, 0.0));
        let r = mesh.insert_vertex(Point2::new(2.0, 1.0));
        let s = mesh.insert_vertex(Point2::new(2.0, -1.0));
        mesh.add_triangle(p, q, r).unwrap();
        mesh.add_triangle(q, p, s).unwrap();
        let pq = mesh
            .half_edge_between(p, q)
            .or_else(|| mesh.half_edge_between(q, p))
            .unwrap();
        let result = mesh.flip_edge(pq);
        assert!(
            matches!(result, Err(MeshError::NonConvexQuadrilateral { .. })),
            "Expected non-convex rejection, got {result:?}"
        );
        mesh.validate().unwrap();
    }

    #[test]
    fn test_flip_refuses_to_leave_a_sliver() {
        // b sits a hair outside the line c-d: the quad is convex, but the
        // flipped face (c, d, b) would have almost no area.
        let mut mesh = HalfEdgeMesh::new();
        let a = mesh.insert_vertex(Point2::new(0.0, 0.0));
        let b = mesh.insert_vertex(Point2::new(1.0 + 1e-11, 0.0));
        let c = mesh.insert_vertex(Point2::new(1.0, 1.0));
        let d = mesh.insert_vertex(Point2::new(1.0, -1.0));
        mesh.add_triangle(a, b, c).unwrap();
        mesh.add_triangle(b, a, d).unwrap();
        let ab = mesh
            .half_edge_between(a, b)
            .or_else(|| mesh.half_edge_between(b, a))
            .unwrap();

        assert!(!mesh.is_flippable(ab).unwrap());
        let result = mesh.flip_edge(ab);
        assert!(
            matches!(result, Err(MeshError::NonConvexQuadrilateral { .. })),
            "Expected sliver rejection, got {result:?}"
        );
        assert!(mesh.contains_edge(a, b));
        mesh.validate().unwrap();
        assert_faces_clockwise(&mesh);

        let (healthy, [sa, _, sc, _]) = square();
        let diagonal = healthy.half_edge_between(sa, sc).unwrap();
        assert!(healthy.is_flippable(diagonal).unwrap());
    }

    #[test]
    fn test_delete_face_turns_shared_edge_into_boundary() {
        let (mut mesh, [a, _, c, _]) = square();
        let ac = mesh.half_edge_between(a, c).unwrap();
        let ca = mesh.half_edge_between(c, a).unwrap();
        let doomed = mesh.face_of(ac).unwrap();

        mesh.delete_face(doomed).unwrap();
        assert_eq!(mesh.number_of_faces(), 1);
        assert_eq!(mesh.number_of_half_edges(), 3);
        assert_eq!(mesh.opposite(ca).unwrap(), None);
        assert!(mesh.half_edge_between(a, c).is_none());
        assert_eq!(mesh.number_of_vertices(), 4);
        mesh.validate().unwrap();

        assert_eq!(
            mesh.delete_face(doomed),
            Err(MeshError::MissingFace { face: doomed })
        );
    }

    #[test]
    fn test_remove_isolated_vertex() {
        let (mut mesh, [a, b, c, d]) = square();
        assert_eq!(
            mesh.remove_isolated_vertex(b),
            Err(MeshError::VertexInUse { vertex: b })
        );
        let face_with_b = mesh
            .face_keys()
            .find(|&f| mesh.face_vertices(f).unwrap().contains(&b))
            .unwrap();
        mesh.delete_face(face_with_b).unwrap();
        assert!(mesh.contains_edge(a, c));
        mesh.remove_isolated_vertex(b).unwrap();
        assert_eq!(mesh.vertex_at(Point2::new(1.0, 0.0)), None);
        assert_eq!(mesh.number_of_vertices(), 3);
        assert!(mesh.get_vertex(d).is_some());
        mesh.validate().unwrap();
    }

    #[test]
    fn test_remove_isolated_vertices_keeps_referenced_ones() {
        let (mut mesh, _) = square();
        mesh.insert_vertex(Point2::new(5.0, 5.0));
        mesh.insert_vertex(Point2::new(6.0, 5.0));
        assert_eq!(mesh.remove_isolated_vertices(), 2);
        assert_eq!(mesh.number_of_vertices(), 4);
        assert_eq!(mesh.vertex_at(Point2::new(5.0, 5.0)), None);
        assert_eq!(mesh.remove_isolated_vertices(), 0);
        mesh.validate().unwrap();
    }

    #[test]
    fn test_map_positions_rebuilds_index() {
        let (mut mesh, [a, ..]) = square();
        mesh.map_positions(|_, p| Point2::new(p.x * 10.0 + 1.0, p.y * 10.0));
        assert_eq!(mesh.vertex_at(Point2::new(1.0, 0.0)), Some(a));
        assert_eq!(mesh.vertex_at(Point2::new(0.0, 0.0)), None);
        assert_eq!(mesh.position(a).unwrap(), Point2::new(1.0, 0.0));
        mesh.validate().unwrap();
    }

    #[test]
    fn test_stale_keys_are_errors() {
        let mesh = HalfEdgeMesh::new();
        let stale = HalfEdgeKey::null();
        assert_eq!(
            mesh.target(stale),
            Err(MeshError::MissingHalfEdge { half_edge: stale })
        );
        assert!(mesh.face_vertices(FaceKey::null()).is_err());
        assert!(mesh.validate().is_ok());
        assert!(mesh.is_empty());
    }
}
