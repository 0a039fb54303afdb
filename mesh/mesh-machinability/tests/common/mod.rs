//! Mesh fixtures shared by the integration tests.

#![allow(dead_code)]

use mesh_types::{IndexedMesh, Point3, Vertex, axis_box};

/// Axis-aligned cube with one corner at the origin.
pub fn cube(size: f64) -> IndexedMesh {
    axis_box(Point3::origin(), Point3::new(size, size, size))
}

/// Cube with a sealed, inward-facing box cavity.
pub fn block_with_cavity(outer: f64, cavity_min: f64, cavity_max: f64) -> IndexedMesh {
    let mut block = cube(outer);
    let mut cavity = axis_box(
        Point3::new(cavity_min, cavity_min, cavity_min),
        Point3::new(cavity_max, cavity_max, cavity_max),
    );
    cavity.flip_normals();
    block.merge(&cavity);
    block
}

/// Two upward-facing triangles with the same footprint, at z = 10 and z = 0.
pub fn stacked_upward_triangles() -> IndexedMesh {
    IndexedMesh::from_parts(
        vec![
            Vertex::from_coords(0.0, 0.0, 10.0),
            Vertex::from_coords(10.0, 0.0, 10.0),
            Vertex::from_coords(0.0, 10.0, 10.0),
            Vertex::from_coords(0.0, 0.0, 0.0),
            Vertex::from_coords(10.0, 0.0, 0.0),
            Vertex::from_coords(0.0, 10.0, 0.0),
        ],
        vec![[0, 1, 2], [3, 4, 5]],
    )
}

/// Flat `n x n` grid of 1 mm cells at height `z`.
pub fn plate(n: u32, z: f64) -> IndexedMesh {
    let mut mesh = IndexedMesh::new();
    for j in 0..=n {
        for i in 0..=n {
            mesh.vertices
                .push(Vertex::from_coords(f64::from(i), f64::from(j), z));
        }
    }
    let idx = |i: u32, j: u32| j * (n + 1) + i;
    for j in 0..n {
        for i in 0..n {
            mesh.faces.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
            mesh.faces.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
        }
    }
    mesh
}

/// Two 10 mm blocks whose facing sides are `gap` mm apart along X.
pub fn facing_blocks(gap: f64) -> IndexedMesh {
    let mut mesh = cube(10.0);
    mesh.merge(&axis_box(
        Point3::new(10.0 + gap, 0.0, 0.0),
        Point3::new(20.0 + gap, 10.0, 10.0),
    ));
    mesh
}
