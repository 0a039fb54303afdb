//! Edge topology: unique edges and watertightness.

use hashbrown::HashMap;

use crate::IndexedMesh;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A unique undirected edge of a mesh.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshEdge {
    /// Endpoint vertex indices, smaller index first.
    pub vertices: [u32; 2],
    /// Euclidean length in millimeters.
    pub length: f64,
    /// Faces that use this edge, in face order.
    pub faces: Vec<u32>,
}

#[derive(Default)]
struct EdgeUse {
    faces: Vec<u32>,
    /// Uses in the `lo -> hi` direction.
    forward: u32,
    /// Uses in the `hi -> lo` direction.
    backward: u32,
}

impl IndexedMesh {
    fn edge_uses(&self) -> HashMap<(u32, u32), EdgeUse> {
        let mut uses: HashMap<(u32, u32), EdgeUse> = HashMap::with_capacity(self.faces.len() * 3 / 2);

        for (face_idx, face) in self.faces.iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let face_idx = face_idx as u32;
            for k in 0..3 {
                let a = face[k];
                let b = face[(k + 1) % 3];
                if a == b {
                    continue;
                }
                let entry = uses.entry((a.min(b), a.max(b))).or_default();
                entry.faces.push(face_idx);
                if a < b {
                    entry.forward += 1;
                } else {
                    entry.backward += 1;
                }
            }
        }

        uses
    }

    /// Collect the unique undirected edges, sorted by vertex pair.
    ///
    /// Edges referencing out-of-range vertices are skipped.
    #[must_use]
    pub fn unique_edges(&self) -> Vec<MeshEdge> {
        let mut edges: Vec<MeshEdge> = self
            .edge_uses()
            .into_iter()
            .filter_map(|((a, b), edge_use)| {
                let pa = self.vertices.get(a as usize)?.position;
                let pb = self.vertices.get(b as usize)?.position;
                Some(MeshEdge {
                    vertices: [a, b],
                    length: (pb - pa).norm(),
                    faces: edge_use.faces,
                })
            })
            .collect();
        edges.sort_unstable_by_key(|e| e.vertices);
        edges
    }

    /// Check whether the mesh is a closed, consistently wound surface.
    ///
    /// Every undirected edge must be shared by exactly two faces that
    /// traverse it in opposite directions.
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        if self.faces.is_empty() {
            return false;
        }
        self.edge_uses()
            .values()
            .all(|u| u.forward == 1 && u.backward == 1)
    }

    /// Count edges used by a single face (holes in the surface).
    #[must_use]
    pub fn boundary_edge_count(&self) -> usize {
        self.edge_uses()
            .values()
            .filter(|u| u.faces.len() == 1)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Vertex, unit_cube};

    use super::*;

    #[test]
    fn cube_edges() {
        let cube = unit_cube();
        let edges = cube.unique_edges();
        // 12 box edges + 6 face diagonals
        assert_eq!(edges.len(), 18);
        assert!(edges.iter().all(|e| e.faces.len() == 2));
        assert!(edges.iter().all(|e| e.vertices[0] < e.vertices[1]));
    }

    #[test]
    fn cube_is_watertight() {
        let cube = unit_cube();
        assert!(cube.is_watertight());
        assert_eq!(cube.boundary_edge_count(), 0);
    }

    #[test]
    fn open_box_is_not_watertight() {
        let mut cube = unit_cube();
        cube.faces.truncate(10);
        assert!(!cube.is_watertight());
        assert_eq!(cube.boundary_edge_count(), 4);
    }

    #[test]
    fn inconsistent_winding_is_not_watertight() {
        let mut cube = unit_cube();
        cube.faces[0].swap(1, 2);
        assert!(!cube.is_watertight());
    }

    #[test]
    fn single_triangle_edges() {
        let mesh = IndexedMesh::from_parts(
            vec![
                Vertex::from_coords(0.0, 0.0, 0.0),
                Vertex::from_coords(3.0, 0.0, 0.0),
                Vertex::from_coords(0.0, 4.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let edges = mesh.unique_edges();
        assert_eq!(edges.len(), 3);
        assert!((edges[2].length - 5.0).abs() < 1e-12);
        assert!(!mesh.is_watertight());
    }
}
