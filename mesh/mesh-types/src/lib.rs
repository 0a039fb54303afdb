//! Input mesh types for machinability analysis.
//!
//! This crate is the contract between the mesh loading/repair stage and the
//! analysis engine. It provides:
//!
//! - [`Vertex`] - A point in 3D space
//! - [`IndexedMesh`] - A triangle mesh with indexed vertices
//! - [`Triangle`] - A concrete triangle with vertex positions
//! - [`Aabb`] - Axis-aligned bounding box with boundary-plane queries
//! - [`MeshEdge`] - A unique undirected edge with its incident faces
//!
//! No file I/O or repair happens here: meshes arrive already loaded,
//! oriented, and free of duplicate or unreferenced vertices.
//!
//! # Units
//!
//! All coordinates are `f64` millimeters.
//!
//! # Coordinate System
//!
//! Right-handed, Z up:
//! - X: width (left/right)
//! - Y: depth (front/back)
//! - Z: height (up/down), the default spindle axis
//!
//! Face winding is **counter-clockwise (CCW) when viewed from outside**.
//! Normals point outward by the right-hand rule.
//!
//! # Example
//!
//! ```
//! use mesh_types::{axis_box, MeshTopology, Point3};
//!
//! let block = axis_box(Point3::new(0.0, 0.0, 0.0), Point3::new(40.0, 20.0, 10.0));
//! assert_eq!(block.face_count(), 12);
//! assert!(block.is_watertight());
//! assert!((block.volume() - 8000.0).abs() < 1e-9);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod bounds;
mod mesh;
mod topology;
mod traits;
mod triangle;
mod vertex;

pub use bounds::Aabb;
pub use mesh::{IndexedMesh, axis_box, subdivided_box, unit_cube};
pub use topology::MeshEdge;
pub use traits::{MeshBounds, MeshTopology};
pub use triangle::Triangle;
pub use vertex::Vertex;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};
