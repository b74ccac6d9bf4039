//! # glyphmesh
//!
//! Constrained Delaunay triangulation of glyph outlines, for generating text
//! meshes.
//!
//! # Features
//!
//! - Incremental 2D Delaunay triangulation with stack-driven edge legalization
//! - Constraint edge recovery by flipping (Sloan's method) for outer loops and holes
//! - Flood-fill removal of the triangles outside the outline and inside holes
//! - Arena-backed half-edge mesh with invariant validation
//! - Outline classification for glyphs with several contours
//! - Conversion to flat triangle lists and to a lifted, vertex-shared 3D mesh
//! - Serialization/Deserialization of value and output types with [serde](https://serde.rs)
//!
//! # Basic Usage
//!
//! A square with a square hole, the hull counter-clockwise and the hole clockwise:
//!
//! ```rust
//! use glyphmesh::prelude::*;
//!
//! let hull = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(10.0, 0.0),
//!     Point2::new(10.0, 10.0),
//!     Point2::new(0.0, 10.0),
//! ];
//! let hole = vec![
//!     Point2::new(4.0, 4.0),
//!     Point2::new(4.0, 6.0),
//!     Point2::new(6.0, 6.0),
//!     Point2::new(6.0, 4.0),
//! ];
//!
//! let cdt = ConstrainedTriangulation::new(&[], &hull, &[hole], TriangulationOptions::default())
//!     .unwrap();
//!
//! assert_eq!(cdt.number_of_triangles(), 8);
//! assert!(cdt.report().is_complete());
//!
//! let mesh = cdt.indexed_mesh(0.0, UpAxis::Z).unwrap();
//! assert_eq!(mesh.number_of_vertices(), 8);
//! ```
//!
//! # Pipeline
//!
//! 1. **Validation** - finite coordinates, loops with three or more distinct
//!    points and non-zero area, counter-clockwise hull and clockwise holes
//!    (rejected, or reversed under [`WindingPolicy::Reorient`](core::triangulation::WindingPolicy))
//! 2. **Normalization** - every point is mapped into the unit box so the fixed
//!    `1e-5` tolerance of [`geometry::predicates`] suits any font unit
//! 3. **Incremental Delaunay** - points are inserted into a covering super
//!    triangle ([`core::algorithms::incremental_insertion`])
//! 4. **Constraint recovery** - every loop segment is forced into the mesh
//!    ([`core::algorithms::constrained`])
//! 5. **Superfluous removal** - a flood fill from the outer side of each loop
//!    deletes faces without crossing a constraint
//! 6. **Cleanup** - the super triangle goes, vertices return to their exact
//!    input coordinates
//!
//! # Mesh Invariants
//!
//! [`HalfEdgeMesh::validate`](core::half_edge_mesh::HalfEdgeMesh::validate) checks:
//!
//! - **Face cycles** – each face owns a closed cycle of three half-edges with
//!   consistent `next`/`prev` links.
//! - **Opposites** – interior half-edges pair up with a reverse half-edge that
//!   points back.
//! - **Unique directed edges** – one half-edge per ordered vertex pair.
//! - **Unique positions** – no two vertices share coordinates.
//!
//! The Delaunay property of unconstrained edges is checked separately by
//! [`core::util::delaunay_validation`].
//!
//! # Numerical Limits
//!
//! Predicates use plain `f64` arithmetic with a fixed tolerance. Nearly
//! coincident points are merged into the existing vertex, degenerate
//! circumcircles never request a flip, and every iterative stage runs under a
//! ceiling from [`IterationLimits`](core::algorithms::bounded::IterationLimits).
//! Hitting a ceiling logs a warning and keeps the partial mesh; the
//! [`TriangulationReport`](core::triangulation::TriangulationReport) lists what
//! was cut short.

// Forbid unsafe code throughout the entire crate
#![forbid(unsafe_code)]

#[macro_use]
extern crate derive_builder;

/// Mesh storage, construction algorithms and the triangulation pipeline.
pub mod core {
    /// Triangulation algorithms for construction and constraint recovery
    pub mod algorithms {
        /// Ceiling-guarded loops shared by every iterative stage
        pub mod bounded;
        /// Constraint edge recovery and superfluous triangle removal
        pub mod constrained;
        /// Incremental Delaunay construction
        pub mod incremental_insertion;
        /// Point location by triangulation walk
        pub mod locate;
    }
    /// High-performance collection types used by the mesh and algorithms
    pub mod collections;
    pub mod conversion;
    pub mod edge;
    pub mod half_edge_mesh;
    pub mod outline;
    pub mod triangulation;
    pub mod util;
}

/// Planar geometry: points, tolerant predicates and the coordinate normalizer.
pub mod geometry {
    pub mod normalizer;
    pub mod point;
    pub mod predicates;
}

/// A prelude module that re-exports commonly used types and functions.
///
/// ```rust
/// use glyphmesh::prelude::*;
///
/// let p = Point2::new(1.0, 2.0);
/// assert_eq!(orientation(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), p), Orientation::COUNTERCLOCKWISE);
/// ```
pub mod prelude {
    pub use crate::core::algorithms::bounded::{
        Bounded, IterationLimitExceeded, IterationLimits, bounded,
    };
    pub use crate::core::algorithms::constrained::{
        ConstraintError, ConstraintOutcome, ConstraintRefiner, ConstraintStats,
    };
    pub use crate::core::algorithms::incremental_insertion::{
        IncrementalDelaunay, InsertionError, InsertionOutcome, InsertionStats,
    };
    pub use crate::core::algorithms::locate::{
        Containment, HintStrategy, LocateError, LocateResult, face_contains, locate,
        locate_with_trace,
    };
    pub use crate::core::collections::{
        FastHashMap, FastHashSet, SmallBuffer, fast_hash_map_with_capacity,
        fast_hash_set_with_capacity,
    };
    pub use crate::core::conversion::{
        IndexedMesh, Triangle2, UpAxis, mesh_to_triangles, triangles_to_mesh,
    };
    pub use crate::core::edge::EdgeKey;
    pub use crate::core::half_edge_mesh::{
        FaceKey, HalfEdgeKey, HalfEdgeMesh, MeshError, MeshValidationError, VertexKey,
    };
    pub use crate::core::outline::{
        OutlineGroup, OutlineTriangulation, classify_contours, triangulate_outline,
    };
    pub use crate::core::triangulation::{
        ConstrainedTriangulation, LoopRole, TriangulationError, TriangulationOptions,
        TriangulationOptionsBuilder, TriangulationReport, WindingPolicy, triangulate_points,
    };
    pub use crate::core::util::delaunay_validation::{
        DelaunayValidationError, find_delaunay_violations, is_delaunay,
    };
    pub use crate::geometry::normalizer::{Aabb, Normalizer, NormalizerError};
    pub use crate::geometry::point::{Point2, PositionKey};
    pub use crate::geometry::predicates::{
        CircumcenterError, EPSILON, InCircle, LineSide, MIN_FACE_AREA2, Orientation, circumcenter,
        in_circumcircle, is_quadrilateral_convex, is_strictly_clockwise, orientation,
        point_in_polygon, polygon_signed_area, polygon_winding, project_onto_segment_interior,
        segments_cross, segments_intersect, side_of_line, signed_area2, violates_delaunay,
    };
}

/// The function `is_normal` checks that structs implement `auto` traits.
/// Traits are checked at compile time, so this function is only used for
/// testing.
#[must_use]
pub const fn is_normal<T: Sized + Send + Sync + Unpin>() -> bool {
    true
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::is_normal;
    use crate::prelude::*;

    // =============================================================================
    // TYPE SAFETY TESTS
    // =============================================================================

    #[test]
    fn normal_types() {
        assert!(is_normal::<Point2>());
        assert!(is_normal::<HalfEdgeMesh>());
        assert!(is_normal::<IncrementalDelaunay>());
        assert!(is_normal::<ConstrainedTriangulation>());
        assert!(is_normal::<TriangulationReport>());
        assert!(is_normal::<TriangulationOptions>());
        assert!(is_normal::<IndexedMesh>());
        assert!(is_normal::<TriangulationError>());
    }

    #[test]
    fn test_prelude_collections_exports() {
        let mut map: FastHashMap<u64, usize> = FastHashMap::default();
        map.insert(123, 456);
        assert_eq!(map.get(&123), Some(&456));

        let mut set: FastHashSet<u64> = FastHashSet::default();
        set.insert(789);
        assert!(set.contains(&789));

        let mut buffer: SmallBuffer<i32, 8> = SmallBuffer::new();
        buffer.push(42);
        assert_eq!(buffer.len(), 1);

        let map_with_cap = fast_hash_map_with_capacity::<u64, usize>(100);
        assert!(map_with_cap.capacity() >= 100);

        let set_with_cap = fast_hash_set_with_capacity::<u64>(50);
        assert!(set_with_cap.capacity() >= 50);
    }

    #[test]
    fn test_prelude_pipeline_exports() {
        let points = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        let dt = triangulate_points(&points, TriangulationOptions::default()).unwrap();
        let triangles = dt.triangles().unwrap();
        assert_eq!(triangles.len(), 1);
        assert_eq!(triangles[0].orientation(), Orientation::CLOCKWISE);
    }
}
