//! Axis-aligned bounding box.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box (AABB).
///
/// Besides the usual extent queries, the box answers the boundary-plane
/// distance questions the machinability heuristics ask: how far a point is
/// from each of the six stock faces, and how deep it sits along each axis.
///
/// # Example
///
/// ```
/// use mesh_types::{Aabb, Point3};
///
/// let aabb = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0));
///
/// assert_eq!(aabb.axis_depths(&Point3::new(1.0, 4.0, 5.0)), [1.0, 4.0, 5.0]);
/// assert!((aabb.nearest_plane_distance(&Point3::new(1.0, 5.0, 5.0)) - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner (smallest x, y, z values).
    pub min: Point3<f64>,
    /// Maximum corner (largest x, y, z values).
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a new AABB from minimum and maximum corners.
    ///
    /// The corners are swapped per axis if given in the wrong order.
    #[must_use]
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self {
            min: Point3::new(min.x.min(max.x), min.y.min(max.y), min.z.min(max.z)),
            max: Point3::new(min.x.max(max.x), min.y.max(max.y), min.z.max(max.z)),
        }
    }

    /// Create an empty (inverted) AABB, the identity for expansion.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Point3::new is not const in nalgebra
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Create an AABB from an iterator of points.
    ///
    /// Returns an empty AABB if the iterator is empty.
    #[must_use]
    pub fn from_points<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> Self {
        let mut aabb = Self::empty();
        for point in points {
            aabb.expand_to_include(point);
        }
        aabb
    }

    /// Check if the AABB is empty (min > max on any axis).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Width, depth, and height of the box.
    #[inline]
    #[must_use]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Grow the box to include a point.
    pub fn expand_to_include(&mut self, point: &Point3<f64>) {
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(point[axis]);
            self.max[axis] = self.max[axis].max(point[axis]);
        }
    }

    /// Return a copy grown by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        let m = Vector3::repeat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Absolute distances from `point` to the six boundary planes.
    ///
    /// Ordered `[min.x, max.x, min.y, max.y, min.z, max.z]`.
    #[must_use]
    pub fn plane_distances(&self, point: &Point3<f64>) -> [f64; 6] {
        [
            (point.x - self.min.x).abs(),
            (point.x - self.max.x).abs(),
            (point.y - self.min.y).abs(),
            (point.y - self.max.y).abs(),
            (point.z - self.min.z).abs(),
            (point.z - self.max.z).abs(),
        ]
    }

    /// Distance from `point` to the closest of the six boundary planes.
    #[must_use]
    pub fn nearest_plane_distance(&self, point: &Point3<f64>) -> f64 {
        self.plane_distances(point)
            .into_iter()
            .fold(f64::INFINITY, f64::min)
    }

    /// Per-axis depth of `point` inside the box.
    ///
    /// For each axis this is `min(point - min, max - point)`: how far the
    /// point is from the nearer of that axis' two planes. Negative outside.
    #[must_use]
    pub fn axis_depths(&self, point: &Point3<f64>) -> [f64; 3] {
        [0, 1, 2].map(|axis| (point[axis] - self.min[axis]).min(self.max[axis] - point[axis]))
    }

    /// Check whether `point` lies within `tolerance` of a boundary plane
    /// on the given axis (0 = X, 1 = Y, 2 = Z).
    #[must_use]
    pub fn near_axis_plane(&self, point: &Point3<f64>, axis: usize, tolerance: f64) -> bool {
        axis < 3
            && ((point[axis] - self.min[axis]).abs() < tolerance
                || (point[axis] - self.max[axis]).abs() < tolerance)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block() -> Aabb {
        Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 20.0, 30.0))
    }

    #[test]
    fn aabb_from_points() {
        let points = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 5.0, 3.0),
            Point3::new(-2.0, 8.0, 1.0),
        ];

        let aabb = Aabb::from_points(points.iter());
        assert!((aabb.min.x - (-2.0)).abs() < f64::EPSILON);
        assert!((aabb.max.y - 8.0).abs() < f64::EPSILON);
        assert!((aabb.max.z - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn aabb_empty() {
        let aabb = Aabb::empty();
        assert!(aabb.is_empty());
    }

    #[test]
    fn aabb_new_reorders_corners() {
        let aabb = Aabb::new(Point3::new(5.0, 0.0, 0.0), Point3::new(0.0, 1.0, 1.0));
        assert!((aabb.min.x - 0.0).abs() < f64::EPSILON);
        assert!((aabb.max.x - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn plane_distances_ordered() {
        let d = block().plane_distances(&Point3::new(1.0, 5.0, 29.0));
        assert!((d[0] - 1.0).abs() < 1e-12);
        assert!((d[1] - 9.0).abs() < 1e-12);
        assert!((d[2] - 5.0).abs() < 1e-12);
        assert!((d[3] - 15.0).abs() < 1e-12);
        assert!((d[4] - 29.0).abs() < 1e-12);
        assert!((d[5] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn axis_depths_take_nearer_plane() {
        let d = block().axis_depths(&Point3::new(5.0, 4.0, 20.0));
        assert!((d[0] - 5.0).abs() < 1e-12);
        assert!((d[1] - 4.0).abs() < 1e-12);
        assert!((d[2] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn near_axis_plane_checks_both_sides() {
        let aabb = block();
        let p = Point3::new(9.5, 10.0, 15.0);
        assert!(aabb.near_axis_plane(&p, 0, 1.0));
        assert!(!aabb.near_axis_plane(&p, 1, 1.0));
        assert!(!aabb.near_axis_plane(&p, 3, 1.0));
    }

    #[test]
    fn aabb_expanded() {
        let expanded = block().expanded(2.0);
        assert!((expanded.min.x - (-2.0)).abs() < f64::EPSILON);
        assert!((expanded.max.z - 32.0).abs() < f64::EPSILON);
    }
}
