//! Canonical undirected edge identifiers.
//!
//! A half-edge mesh stores every interior edge twice, once per direction.
//! Constraint bookkeeping and deduplication need a single identity per edge,
//! so [`EdgeKey`]:
//!
//! - identifies an edge purely by its two endpoint [`VertexKey`]s
//! - canonicalizes endpoint ordering so `(a, b)` and `(b, a)` map to the same edge
//! - is `Copy`/`Hash`/`Ord` for fast use in sets and maps
//!
//! Ordering follows the internal slotmap key order and is only stable within
//! one mesh.

use crate::core::half_edge_mesh::{HalfEdgeKey, HalfEdgeMesh, MeshError, VertexKey};
use slotmap::Key;

/// Canonical identifier for an (undirected) edge.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::edge::EdgeKey;
/// use glyphmesh::core::half_edge_mesh::HalfEdgeMesh;
/// use glyphmesh::geometry::point::Point2;
///
/// let mut mesh = HalfEdgeMesh::new();
/// let a = mesh.insert_vertex(Point2::new(0.0, 0.0));
/// let b = mesh.insert_vertex(Point2::new(1.0, 0.0));
///
/// let edge = EdgeKey::new(a, b);
/// assert_eq!(edge, EdgeKey::new(b, a));
/// assert!(edge.contains(a) && edge.contains(b));
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    v0: VertexKey,
    v1: VertexKey,
}

impl EdgeKey {
    /// Creates a new canonical edge key.
    ///
    /// The endpoints are reordered so that `v0 <= v1` under the raw key order.
    #[must_use]
    pub fn new(a: VertexKey, b: VertexKey) -> Self {
        let a_raw = a.data().as_ffi();
        let b_raw = b.data().as_ffi();

        if a_raw <= b_raw {
            Self { v0: a, v1: b }
        } else {
            Self { v0: b, v1: a }
        }
    }

    /// Key of the edge a half-edge runs along.
    ///
    /// # Errors
    ///
    /// [`MeshError`] for a stale half-edge.
    pub fn of_half_edge(mesh: &HalfEdgeMesh, half_edge: HalfEdgeKey) -> Result<Self, MeshError> {
        Ok(Self::new(mesh.origin(half_edge)?, mesh.target(half_edge)?))
    }

    /// Returns the first (canonical) endpoint.
    #[inline]
    #[must_use]
    pub const fn v0(self) -> VertexKey {
        self.v0
    }

    /// Returns the second (canonical) endpoint.
    #[inline]
    #[must_use]
    pub const fn v1(self) -> VertexKey {
        self.v1
    }

    /// Returns both endpoints in canonical order.
    #[inline]
    #[must_use]
    pub const fn endpoints(self) -> (VertexKey, VertexKey) {
        (self.v0, self.v1)
    }

    /// Returns `true` if `vertex` is one of the endpoints.
    #[inline]
    #[must_use]
    pub fn contains(self, vertex: VertexKey) -> bool {
        self.v0 == vertex || self.v1 == vertex
    }

    /// Returns `true` if the two edges share an endpoint.
    #[must_use]
    pub fn shares_endpoint(self, other: Self) -> bool {
        self.contains(other.v0) || self.contains(other.v1)
    }
}

impl From<(VertexKey, VertexKey)> for EdgeKey {
    #[inline]
    fn from((a, b): (VertexKey, VertexKey)) -> Self {
        Self::new(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collections::FastHashSet;
    use crate::geometry::point::Point2;

    fn three_vertices() -> (HalfEdgeMesh, [VertexKey; 3]) {
        let mut mesh = HalfEdgeMesh::new();
        let a = mesh.insert_vertex(Point2::new(0.0, 0.0));
        let b = mesh.insert_vertex(Point2::new(1.0, 0.0));
        let c = mesh.insert_vertex(Point2::new(0.0, 1.0));
        (mesh, [a, b, c])
    }

    #[test]
    fn edge_key_is_canonical() {
        let (_, [a, b, _]) = three_vertices();
        let e1 = EdgeKey::new(a, b);
        let e2 = EdgeKey::new(b, a);
        assert_eq!(e1, e2);
        assert_eq!(e1.v0().data().as_ffi().min(e1.v1().data().as_ffi()), e1.v0().data().as_ffi());
        assert_eq!(EdgeKey::from((b, a)), e1);
    }

    #[test]
    fn edge_key_of_half_edge_ignores_direction() {
        let (mut mesh, [a, b, c]) = three_vertices();
        mesh.add_triangle(a, b, c).unwrap();
        let forward = mesh.half_edge_between(a, b).or_else(|| mesh.half_edge_between(b, a)).unwrap();
        assert_eq!(EdgeKey::of_half_edge(&mesh, forward).unwrap(), EdgeKey::new(a, b));
    }

    #[test]
    fn edge_key_shares_endpoint() {
        let (_, [a, b, c]) = three_vertices();
        assert!(EdgeKey::new(a, b).shares_endpoint(EdgeKey::new(b, c)));
        assert!(!EdgeKey::new(a, b).contains(c));
    }

    #[test]
    fn edge_key_is_hashable() {
        let (_, [a, b, c]) = three_vertices();
        let mut set: FastHashSet<EdgeKey> = FastHashSet::default();
        set.insert(EdgeKey::new(a, b));
        set.insert(EdgeKey::new(b, a));
        set.insert(EdgeKey::new(b, c));
        assert_eq!(set.len(), 2);
    }
}
