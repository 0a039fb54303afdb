//! Traits for mesh types.

use crate::{Aabb, Triangle};

/// Read access to mesh topology.
///
/// Analysis code is written against this trait so that it never needs
/// mutable access to the mesh it inspects.
pub trait MeshTopology {
    /// Get the number of vertices.
    fn vertex_count(&self) -> usize;

    /// Get the number of faces (triangles).
    fn face_count(&self) -> usize;

    /// Check if the mesh is empty.
    fn is_empty(&self) -> bool {
        self.vertex_count() == 0 || self.face_count() == 0
    }

    /// Get a triangle by face index with resolved vertex positions.
    ///
    /// Returns `None` if the face index or one of its vertex indices is
    /// out of bounds.
    fn triangle(&self, face_index: usize) -> Option<Triangle>;
}

/// Trait for types that can compute a bounding box.
pub trait MeshBounds {
    /// Compute the axis-aligned bounding box.
    ///
    /// Returns an empty AABB if the mesh has no vertices.
    fn bounds(&self) -> Aabb;
}
