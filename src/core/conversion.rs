//! Conversions between the half-edge mesh and flat triangle lists.
//!
//! [`mesh_to_triangles`] and [`triangles_to_mesh`] move between topology and
//! plain geometry; [`IndexedMesh::from_triangles`] lifts a triangle list into
//! 3D and shares vertices by position, the layout renderers consume.

use crate::core::collections::{Entry, FastHashMap};
use crate::core::half_edge_mesh::{HalfEdgeMesh, MeshError};
use crate::geometry::point::Point2;
use crate::geometry::predicates::{Orientation, orientation, signed_area2};
use serde::{Deserialize, Serialize};

// =============================================================================
// TRIANGLES
// =============================================================================

/// A triangle as three corner positions.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::conversion::Triangle2;
/// use glyphmesh::geometry::point::Point2;
/// use glyphmesh::geometry::predicates::Orientation;
///
/// let t = Triangle2::new(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0));
/// assert_eq!(t.orientation(), Orientation::COUNTERCLOCKWISE);
/// assert_eq!(t.oriented_clockwise().orientation(), Orientation::CLOCKWISE);
/// assert_eq!(t.area(), 0.5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Triangle2 {
    /// First corner.
    pub a: Point2,
    /// Second corner.
    pub b: Point2,
    /// Third corner.
    pub c: Point2,
}

impl Triangle2 {
    /// Creates a triangle with corners in the given order.
    #[must_use]
    pub const fn new(a: Point2, b: Point2, c: Point2) -> Self {
        Self { a, b, c }
    }

    /// The corners in order.
    #[must_use]
    pub const fn vertices(&self) -> [Point2; 3] {
        [self.a, self.b, self.c]
    }

    /// Twice the signed area; positive when counter-clockwise.
    #[must_use]
    pub fn signed_area2(&self) -> f64 {
        signed_area2(self.a, self.b, self.c)
    }

    /// Unsigned area.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.signed_area2().abs() / 2.0
    }

    /// Mean of the corners.
    #[must_use]
    pub fn centroid(&self) -> Point2 {
        Point2::new(
            (self.a.x + self.b.x + self.c.x) / 3.0,
            (self.a.y + self.b.y + self.c.y) / 3.0,
        )
    }

    /// Winding of the corners.
    #[must_use]
    pub fn orientation(&self) -> Orientation {
        orientation(self.a, self.b, self.c)
    }

    /// The same triangle with the opposite winding.
    #[must_use]
    pub const fn reversed(self) -> Self {
        Self::new(self.b, self.a, self.c)
    }

    /// The same triangle wound clockwise.
    #[must_use]
    pub fn oriented_clockwise(self) -> Self {
        match self.orientation() {
            Orientation::CLOCKWISE => self,
            Orientation::COUNTERCLOCKWISE => self.reversed(),
        }
    }
}

impl From<[Point2; 3]> for Triangle2 {
    fn from([a, b, c]: [Point2; 3]) -> Self {
        Self::new(a, b, c)
    }
}

/// One clockwise triangle per face, in face iteration order.
///
/// # Errors
///
/// [`MeshError`] if a face references missing elements.
pub fn mesh_to_triangles(mesh: &HalfEdgeMesh) -> Result<Vec<Triangle2>, MeshError> {
    mesh.face_keys()
        .map(|face| mesh.face_positions(face).map(Triangle2::from))
        .collect()
}

/// Builds a half-edge mesh from triangles, sharing vertices by position and
/// linking neighbours across shared edges.
///
/// # Errors
///
/// [`MeshError::RepeatedVertex`] for a triangle with coincident corners and
/// [`MeshError::DuplicateHalfEdge`] when two triangles overlap along an edge
/// with the same winding.
///
/// # Examples
///
/// ```rust
/// use glyphmesh::core::conversion::{Triangle2, mesh_to_triangles, triangles_to_mesh};
/// use glyphmesh::geometry::point::Point2;
///
/// let (a, b, c, d) = (
///     Point2::new(0.0, 0.0),
///     Point2::new(1.0, 0.0),
///     Point2::new(1.0, 1.0),
///     Point2::new(0.0, 1.0),
/// );
/// let mesh = triangles_to_mesh(&[Triangle2::new(a, b, c), Triangle2::new(a, c, d)]).unwrap();
/// assert_eq!(mesh.number_of_vertices(), 4);
/// assert_eq!(mesh_to_triangles(&mesh).unwrap().len(), 2);
/// ```
pub fn triangles_to_mesh(triangles: &[Triangle2]) -> Result<HalfEdgeMesh, MeshError> {
    let mut mesh = HalfEdgeMesh::with_capacity(triangles.len() + 2);
    for triangle in triangles {
        let [a, b, c] = triangle.vertices().map(|p| mesh.insert_vertex(p));
        mesh.add_triangle(a, b, c)?;
    }
    Ok(mesh)
}

// =============================================================================
// LIFTED MESH
// =============================================================================

/// Which 3D axis the glyph plane's normal points along.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpAxis {
    /// `(x, y)` maps to `(x, height, y)`
    Y,
    /// `(x, y)` maps to `(x, y, height)`
    #[default]
    Z,
}

impl UpAxis {
    /// Lifts a planar point to 3D at `height`.
    #[must_use]
    pub const fn lift(self, p: Point2, height: f64) -> [f64; 3] {
        match self {
            Self::Y => [p.x, height, p.y],
            Self::Z => [p.x, p.y, height],
        }
    }
}

/// Position-deduplicated triangle mesh in 3D.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedMesh {
    /// Unique vertex positions, in first-occurrence order.
    pub positions: Vec<[f64; 3]>,
    /// Corner indices into `positions`, one entry per triangle.
    pub triangles: Vec<[u32; 3]>,
}

fn position_key(p: [f64; 3]) -> [u64; 3] {
    p.map(|c| (c + 0.0).to_bits())
}

impl IndexedMesh {
    /// Lifts `triangles` to the plane at `height` and shares identical
    /// positions. Triangle winding is preserved.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use glyphmesh::core::conversion::{IndexedMesh, Triangle2, UpAxis};
    /// use glyphmesh::geometry::point::Point2;
    ///
    /// let (a, b, c, d) = (
    ///     Point2::new(0.0, 0.0),
    ///     Point2::new(1.0, 0.0),
    ///     Point2::new(1.0, 1.0),
    ///     Point2::new(0.0, 1.0),
    /// );
    /// let mesh = IndexedMesh::from_triangles(
    ///     &[Triangle2::new(a, c, b), Triangle2::new(a, d, c)],
    ///     2.0,
    ///     UpAxis::Y,
    /// );
    /// assert_eq!(mesh.positions.len(), 4);
    /// assert_eq!(mesh.positions[1], [1.0, 2.0, 1.0]);
    /// assert_eq!(mesh.triangles, vec![[0, 1, 2], [0, 3, 1]]);
    /// ```
    #[must_use]
    pub fn from_triangles(triangles: &[Triangle2], height: f64, up: UpAxis) -> Self {
        let mut mesh = Self::default();
        let mut index: FastHashMap<[u64; 3], u32> = FastHashMap::default();

        for triangle in triangles {
            let corners = triangle.vertices().map(|p| {
                let lifted = up.lift(p, height);
                match index.entry(position_key(lifted)) {
                    Entry::Occupied(slot) => *slot.get(),
                    Entry::Vacant(slot) => {
                        let next = u32::try_from(mesh.positions.len()).unwrap_or(u32::MAX);
                        mesh.positions.push(lifted);
                        *slot.insert(next)
                    }
                }
            });
            mesh.triangles.push(corners);
        }
        mesh
    }

    /// Number of unique vertices.
    #[must_use]
    pub fn number_of_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn number_of_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Flattened corner indices, three per triangle.
    #[must_use]
    pub fn flat_indices(&self) -> Vec<u32> {
        self.triangles.iter().flatten().copied().collect()
    }
}
