//! Indexed triangle mesh.

use crate::{Aabb, MeshBounds, MeshTopology, Triangle, Vertex};
use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh.
///
/// Stores vertices and faces separately, with faces referencing vertices by
/// index. Analysis treats a mesh as immutable: face indices reported by any
/// detector index into `faces` of the mesh that was analyzed.
///
/// # Winding Order
///
/// Faces use **counter-clockwise (CCW) winding** when viewed from outside,
/// so normals point outward by the right-hand rule.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex, MeshTopology};
///
/// let mesh = IndexedMesh::from_parts(
///     vec![
///         Vertex::from_coords(0.0, 0.0, 0.0),
///         Vertex::from_coords(1.0, 0.0, 0.0),
///         Vertex::from_coords(0.0, 1.0, 0.0),
///     ],
///     vec![[0, 1, 2]],
/// );
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.face_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    /// Each face is `[v0, v1, v2]` with counter-clockwise winding.
    pub faces: Vec<[u32; 3]>,
}

impl IndexedMesh {
    /// Create a new empty mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Create a mesh from vertices and faces.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    /// Index of the first face referencing a vertex that does not exist.
    #[must_use]
    pub fn first_invalid_face(&self) -> Option<usize> {
        let n = self.vertices.len();
        self.faces
            .iter()
            .position(|f| f.iter().any(|&v| v as usize >= n))
    }

    /// Compute the signed volume of the mesh.
    ///
    /// Sum of signed tetrahedra formed by each face and the origin. Positive
    /// for a closed mesh with outward normals; meaningless for open meshes.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;

        for tri in self.triangles() {
            let (v0, v1, v2) = (tri.v0.coords, tri.v1.coords, tri.v2.coords);
            volume += v0.dot(&v1.cross(&v2));
        }

        volume / 6.0
    }

    /// Absolute value of [`signed_volume`](Self::signed_volume).
    #[inline]
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// Flip all face normals by reversing winding order.
    pub fn flip_normals(&mut self) {
        for face in &mut self.faces {
            face.swap(1, 2);
        }
    }

    /// Append another mesh, offsetting its face indices.
    #[allow(clippy::cast_possible_truncation)]
    // Truncation: mesh indices are u32, so vertex counts > 4B are unsupported
    pub fn merge(&mut self, other: &Self) {
        let vertex_offset = self.vertices.len() as u32;

        self.vertices.extend(other.vertices.iter().copied());
        self.faces.extend(
            other
                .faces
                .iter()
                .map(|f| [f[0] + vertex_offset, f[1] + vertex_offset, f[2] + vertex_offset]),
        );
    }

    /// Iterate over the triangles whose vertex indices are all valid.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.faces.len()).filter_map(move |i| self.triangle(i))
    }
}

impl MeshTopology for IndexedMesh {
    #[inline]
    fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    fn face_count(&self) -> usize {
        self.faces.len()
    }

    fn triangle(&self, face_index: usize) -> Option<Triangle> {
        let [i0, i1, i2] = *self.faces.get(face_index)?;
        Some(Triangle {
            v0: self.vertices.get(i0 as usize)?.position,
            v1: self.vertices.get(i1 as usize)?.position,
            v2: self.vertices.get(i2 as usize)?.position,
        })
    }
}

impl MeshBounds for IndexedMesh {
    fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| &v.position))
    }
}

/// Create a closed axis-aligned box between two corners.
///
/// 8 vertices, 12 triangles, outward-facing normals.
///
/// # Example
///
/// ```
/// use mesh_types::{axis_box, Point3};
///
/// let slab = axis_box(Point3::new(-5.0, -5.0, 0.0), Point3::new(5.0, 5.0, 2.0));
/// assert!((slab.volume() - 200.0).abs() < 1e-9);
/// ```
#[must_use]
pub fn axis_box(min: Point3<f64>, max: Point3<f64>) -> IndexedMesh {
    let b = Aabb::new(min, max);
    let (lo, hi) = (b.min, b.max);
    let mut mesh = IndexedMesh::with_capacity(8, 12);

    mesh.vertices.push(Vertex::from_coords(lo.x, lo.y, lo.z)); // 0
    mesh.vertices.push(Vertex::from_coords(hi.x, lo.y, lo.z)); // 1
    mesh.vertices.push(Vertex::from_coords(hi.x, hi.y, lo.z)); // 2
    mesh.vertices.push(Vertex::from_coords(lo.x, hi.y, lo.z)); // 3
    mesh.vertices.push(Vertex::from_coords(lo.x, lo.y, hi.z)); // 4
    mesh.vertices.push(Vertex::from_coords(hi.x, lo.y, hi.z)); // 5
    mesh.vertices.push(Vertex::from_coords(hi.x, hi.y, hi.z)); // 6
    mesh.vertices.push(Vertex::from_coords(lo.x, hi.y, hi.z)); // 7

    mesh.faces.extend_from_slice(&[
        // Bottom (-Z)
        [0, 2, 1],
        [0, 3, 2],
        // Top (+Z)
        [4, 5, 6],
        [4, 6, 7],
        // Front (-Y)
        [0, 1, 5],
        [0, 5, 4],
        // Back (+Y)
        [3, 7, 6],
        [3, 6, 2],
        // Left (-X)
        [0, 4, 7],
        [0, 7, 3],
        // Right (+X)
        [1, 2, 6],
        [1, 6, 5],
    ]);

    mesh
}

/// Create a unit cube from (0,0,0) to (1,1,1).
#[must_use]
pub fn unit_cube() -> IndexedMesh {
    axis_box(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
}

/// Create a closed axis-aligned box whose sides are split into a grid.
///
/// Each side gets `divisions x divisions` quads (two triangles each) and
/// grid vertices are shared along the box edges, so the result is
/// watertight. `divisions` is clamped to at least 1.
///
/// # Example
///
/// ```
/// use mesh_types::{subdivided_box, MeshTopology, Point3};
///
/// let b = subdivided_box(Point3::origin(), Point3::new(10.0, 10.0, 10.0), 4);
/// assert_eq!(b.face_count(), 6 * 4 * 4 * 2);
/// assert!(b.is_watertight());
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn subdivided_box(min: Point3<f64>, max: Point3<f64>, divisions: u32) -> IndexedMesh {
    use hashbrown::HashMap;

    let n = divisions.max(1);
    let b = Aabb::new(min, max);
    let size = b.size();
    let mut mesh = IndexedMesh::with_capacity((6 * (n + 1) * (n + 1)) as usize, (12 * n * n) as usize);
    let mut index: HashMap<[u32; 3], u32> = HashMap::new();

    let mut vertex = |mesh: &mut IndexedMesh, grid: [u32; 3]| -> u32 {
        *index.entry(grid).or_insert_with(|| {
            let t = |axis: usize| b.min[axis] + size[axis] * f64::from(grid[axis]) / f64::from(n);
            mesh.vertices.push(Vertex::from_coords(t(0), t(1), t(2)));
            (mesh.vertices.len() - 1) as u32
        })
    };

    for axis in 0..3 {
        let u = (axis + 1) % 3;
        let v = (axis + 2) % 3;
        for side in [0, n] {
            for i in 0..n {
                for j in 0..n {
                    let mut corner = |di: u32, dj: u32| {
                        let mut grid = [0; 3];
                        grid[axis] = side;
                        grid[u] = i + di;
                        grid[v] = j + dj;
                        vertex(&mut mesh, grid)
                    };
                    let (p00, p10, p11, p01) = (corner(0, 0), corner(1, 0), corner(1, 1), corner(0, 1));
                    // e_u x e_v points along +axis, so the max side keeps this order.
                    if side == n {
                        mesh.faces.push([p00, p10, p11]);
                        mesh.faces.push([p00, p11, p01]);
                    } else {
                        mesh.faces.push([p00, p11, p10]);
                        mesh.faces.push([p00, p01, p11]);
                    }
                }
            }
        }
    }

    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn mesh_is_empty() {
        let mesh = IndexedMesh::new();
        assert!(mesh.is_empty());

        let mut mesh2 = IndexedMesh::new();
        mesh2.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        assert!(mesh2.is_empty());
    }

    #[test]
    fn invalid_face_is_found() {
        let mut cube = unit_cube();
        assert_eq!(cube.first_invalid_face(), None);
        cube.faces.push([0, 1, 99]);
        assert_eq!(cube.first_invalid_face(), Some(12));
        // The invalid face is skipped by the triangle iterator.
        assert_eq!(cube.triangles().count(), 12);
    }

    #[test]
    fn unit_cube_volume() {
        let cube = unit_cube();
        assert!((cube.signed_volume() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn flipped_box_has_negative_volume() {
        let mut slab = axis_box(Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 2.0, 1.0));
        slab.flip_normals();
        assert!((slab.signed_volume() + 8.0).abs() < 1e-10);
    }

    #[test]
    fn box_normals_point_outward() {
        let slab = axis_box(Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 2.0, 1.0));
        let b = slab.bounds();
        let center = Point3::from((b.min.coords + b.max.coords) / 2.0);
        for tri in slab.triangles() {
            let n = tri.normal().unwrap_or_else(Vector3::zeros);
            assert!(n.dot(&(tri.centroid() - center)) > 0.0);
        }
    }

    #[test]
    fn subdivided_box_is_closed_and_shares_vertices() {
        let b = subdivided_box(Point3::origin(), Point3::new(10.0, 20.0, 30.0), 3);
        assert_eq!(b.face_count(), 6 * 9 * 2);
        // 6 * 16 grid points minus duplicates on the 12 edges and 8 corners
        assert_eq!(b.vertex_count(), 6 * 3 * 3 + 2);
        assert!(b.is_watertight());
        assert!((b.volume() - 6000.0).abs() < 1e-9);
    }

    #[test]
    fn mesh_merge_offsets_indices() {
        let mut a = unit_cube();
        let b = axis_box(Point3::new(5.0, 0.0, 0.0), Point3::new(6.0, 1.0, 1.0));
        a.merge(&b);
        assert_eq!(a.vertex_count(), 16);
        assert_eq!(a.faces[12], [8, 10, 9]);
        assert!((a.volume() - 2.0).abs() < 1e-10);
    }
}
