//! Vertex type.

use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A mesh vertex.
///
/// Only the position is carried; face normals are derived from winding.
///
/// # Example
///
/// ```
/// use mesh_types::Vertex;
///
/// let v = Vertex::from_coords(1.0, 2.0, 3.0);
/// assert!((v.position.z - 3.0).abs() < f64::EPSILON);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    /// Position in millimeters.
    pub position: Point3<f64>,
}

impl Vertex {
    /// Create a vertex at the given position.
    #[inline]
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self { position }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    #[must_use]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Check that all coordinates are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.iter().all(|c| c.is_finite())
    }
}

impl From<Point3<f64>> for Vertex {
    fn from(position: Point3<f64>) -> Self {
        Self::new(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_from_point() {
        let v: Vertex = Point3::new(4.0, 5.0, 6.0).into();
        assert!((v.position.x - 4.0).abs() < f64::EPSILON);
        assert!(v.is_finite());
    }

    #[test]
    fn vertex_non_finite() {
        let v = Vertex::from_coords(f64::NAN, 0.0, 0.0);
        assert!(!v.is_finite());
    }
}
