//! Collection aliases used throughout the mesh and its algorithms.
//!
//! Hashing uses `rustc_hash` (keys are internal handles and coordinates, never
//! attacker-controlled), short per-face buffers use `smallvec`, and the mesh
//! arenas use `slotmap` with the backend chosen by the `dense-slotmap`
//! feature.

use crate::core::half_edge_mesh::{FaceKey, HalfEdgeKey, VertexKey};
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use smallvec::SmallVec;

#[cfg(not(feature = "dense-slotmap"))]
use slotmap::SlotMap;

#[cfg(feature = "dense-slotmap")]
use slotmap::DenseSlotMap;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Arena backing the half-edge mesh.
///
/// - **default**: `DenseSlotMap` (via the default `dense-slotmap` feature)
/// - **--no-default-features**: `SlotMap`
///
/// Either backend iterates in a deterministic order for a given sequence of
/// insertions and removals.
#[cfg(not(feature = "dense-slotmap"))]
pub type StorageMap<K, V> = SlotMap<K, V>;

#[cfg(feature = "dense-slotmap")]
pub type StorageMap<K, V> = DenseSlotMap<K, V>;

// =============================================================================
// HASHING
// =============================================================================

/// `HashMap` with the Fx hasher.
///
/// ```rust
/// use glyphmesh::core::collections::FastHashMap;
///
/// let mut map: FastHashMap<u64, usize> = FastHashMap::default();
/// map.insert(7, 1);
/// assert_eq!(map.get(&7), Some(&1));
/// ```
pub type FastHashMap<K, V> = FxHashMap<K, V>;

/// `HashSet` with the Fx hasher.
pub type FastHashSet<T> = FxHashSet<T>;

pub use std::collections::hash_map::Entry;

/// Creates a [`FastHashMap`] with room for `capacity` entries.
#[must_use]
pub fn fast_hash_map_with_capacity<K, V>(capacity: usize) -> FastHashMap<K, V> {
    FastHashMap::with_capacity_and_hasher(capacity, FxBuildHasher::default())
}

/// Creates a [`FastHashSet`] with room for `capacity` entries.
#[must_use]
pub fn fast_hash_set_with_capacity<T>(capacity: usize) -> FastHashSet<T> {
    FastHashSet::with_capacity_and_hasher(capacity, FxBuildHasher::default())
}

// =============================================================================
// SMALL BUFFERS
// =============================================================================

/// Inline-first vector; spills to the heap past `N` elements.
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

/// The three half-edges of a face.
pub type FaceHalfEdges = [HalfEdgeKey; 3];

/// The three vertices of a face, in clockwise order.
pub type FaceVertices = [VertexKey; 3];

/// Set of faces, used for visited tracking and deletion marks.
pub type FaceKeySet = FastHashSet<FaceKey>;

/// Work stack of half-edges awaiting a Delaunay check.
pub type HalfEdgeStack = SmallBuffer<HalfEdgeKey, 16>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_constructors() {
        let map: FastHashMap<u32, u32> = fast_hash_map_with_capacity(32);
        assert!(map.capacity() >= 32);
        let set: FastHashSet<u32> = fast_hash_set_with_capacity(16);
        assert!(set.capacity() >= 16);
    }

    #[test]
    fn test_small_buffer_spills() {
        let mut buffer: SmallBuffer<u32, 2> = SmallBuffer::new();
        buffer.extend([1, 2]);
        assert!(!buffer.spilled());
        buffer.push(3);
        assert!(buffer.spilled());
    }
}
