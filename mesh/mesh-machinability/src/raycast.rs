//! Closest-hit ray queries against a triangle soup.
//!
//! A bounding volume hierarchy split at the centroid median of the longest
//! axis, one triangle per leaf. Built once per mesh and shared read-only by
//! every detector thread.

use mesh_types::{Aabb, Point3, Triangle, Vector3};

use crate::error::{MachinabilityError, MachinabilityResult};

/// Padding added to every node box so axis-aligned triangles stay hittable.
const BOX_EPSILON: f64 = 1e-9;

/// Direction components smaller than this are treated as zero.
const DIRECTION_EPSILON: f64 = 1e-12;

/// A ray hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Distance along the (unit) ray direction.
    pub distance: f64,
    /// Index of the face that was hit.
    pub face: u32,
}

/// Acceleration structure answering "first face along this ray".
///
/// Holds only boxes and face indices; queries read the triangles it was
/// built from.
#[derive(Debug)]
pub struct RayCaster {
    face_count: usize,
    root: BvhNode,
}

impl RayCaster {
    /// Build over triangles indexed by face.
    ///
    /// Returns `None` for an empty slice.
    #[must_use]
    pub fn build(triangles: &[Triangle]) -> Option<Self> {
        let centroids: Vec<Point3<f64>> = triangles.iter().map(Triangle::centroid).collect();
        let mut indices: Vec<usize> = (0..triangles.len()).collect();
        let root = BvhNode::build(triangles, &centroids, &mut indices)?;
        Some(Self {
            face_count: triangles.len(),
            root,
        })
    }

    /// Number of faces in the structure.
    #[must_use]
    pub const fn face_count(&self) -> usize {
        self.face_count
    }

    /// Closest hit with distance greater than `t_min`.
    ///
    /// `triangles` must be the slice the caster was built from.
    /// `direction` is normalized here, so distances are in mesh units.
    ///
    /// # Errors
    ///
    /// Returns [`MachinabilityError::RayCast`] if `triangles` has a different
    /// length than the build input, or the origin or direction is not finite,
    /// or the direction has zero length.
    #[allow(clippy::cast_possible_truncation)]
    pub fn closest_hit(
        &self,
        triangles: &[Triangle],
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        t_min: f64,
    ) -> MachinabilityResult<Option<RayHit>> {
        if triangles.len() != self.face_count {
            return Err(MachinabilityError::ray_cast(format!(
                "caster built over {} faces, queried with {}",
                self.face_count,
                triangles.len()
            )));
        }
        if !origin.coords.iter().all(|c| c.is_finite()) {
            return Err(MachinabilityError::ray_cast(format!(
                "non-finite ray origin {origin:?}"
            )));
        }
        let Some(direction) = direction.try_normalize(DIRECTION_EPSILON) else {
            return Err(MachinabilityError::ray_cast(format!(
                "degenerate ray direction {direction:?}"
            )));
        };
        if !direction.iter().all(|c| c.is_finite()) {
            return Err(MachinabilityError::ray_cast("non-finite ray direction"));
        }

        let dir_inv = direction.map(|d| {
            if d.abs() > DIRECTION_EPSILON {
                1.0 / d
            } else {
                f64::MAX
            }
        });

        let ray = Ray {
            origin,
            direction: &direction,
            dir_inv: &dir_inv,
            t_min,
        };

        Ok(trace(&self.root, &ray, triangles, f64::INFINITY).map(|(distance, face)| {
            RayHit {
                distance,
                face: face as u32,
            }
        }))
    }
}

struct Ray<'a> {
    origin: &'a Point3<f64>,
    direction: &'a Vector3<f64>,
    dir_inv: &'a Vector3<f64>,
    t_min: f64,
}

/// Slab test. Returns the entry and exit distances.
fn slab_interval(aabb: &Aabb, origin: &Point3<f64>, dir_inv: &Vector3<f64>) -> Option<(f64, f64)> {
    let mut t_near = f64::NEG_INFINITY;
    let mut t_far = f64::INFINITY;
    for axis in 0..3 {
        let t1 = (aabb.min[axis] - origin[axis]) * dir_inv[axis];
        let t2 = (aabb.max[axis] - origin[axis]) * dir_inv[axis];
        t_near = t_near.max(t1.min(t2));
        t_far = t_far.min(t1.max(t2));
    }

    if t_far >= t_near && t_far >= 0.0 {
        Some((t_near.max(0.0), t_far))
    } else {
        None
    }
}

#[derive(Debug)]
enum BvhNode {
    Leaf {
        aabb: Aabb,
        face_idx: usize,
    },
    Internal {
        aabb: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn build(
        triangles: &[Triangle],
        centroids: &[Point3<f64>],
        indices: &mut [usize],
    ) -> Option<Self> {
        match *indices {
            [] => return None,
            [idx] => {
                return Some(Self::Leaf {
                    aabb: triangles[idx].bounds().expanded(BOX_EPSILON),
                    face_idx: idx,
                });
            }
            _ => {}
        }

        let mut aabb = Aabb::empty();
        for &idx in indices.iter() {
            let tri = &triangles[idx];
            for p in [&tri.v0, &tri.v1, &tri.v2] {
                aabb.expand_to_include(p);
            }
        }
        let aabb = aabb.expanded(BOX_EPSILON);

        let extent = aabb.size();
        let axis = if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        };

        let mid = indices.len() / 2;
        indices.select_nth_unstable_by(mid, |&a, &b| {
            centroids[a][axis].total_cmp(&centroids[b][axis])
        });
        let (left_indices, right_indices) = indices.split_at_mut(mid);

        let left = Self::build(triangles, centroids, left_indices);
        let right = Self::build(triangles, centroids, right_indices);

        match (left, right) {
            (Some(l), Some(r)) => Some(Self::Internal {
                aabb,
                left: Box::new(l),
                right: Box::new(r),
            }),
            (Some(n), None) | (None, Some(n)) => Some(n),
            (None, None) => None,
        }
    }

    const fn aabb(&self) -> &Aabb {
        match self {
            Self::Leaf { aabb, .. } | Self::Internal { aabb, .. } => aabb,
        }
    }
}

/// Closest hit below `max_dist`, visiting the right subtree only up to the
/// left subtree's hit.
fn trace(node: &BvhNode, ray: &Ray<'_>, triangles: &[Triangle], max_dist: f64) -> Option<(f64, usize)> {
    let (t_near, _) = slab_interval(node.aabb(), ray.origin, ray.dir_inv)?;
    if t_near > max_dist {
        return None;
    }

    match node {
        BvhNode::Leaf { face_idx, .. } => triangles[*face_idx]
            .ray_intersect(ray.origin, ray.direction, ray.t_min)
            .filter(|&t| t <= max_dist)
            .map(|t| (t, *face_idx)),
        BvhNode::Internal { left, right, .. } => {
            let hit_left = trace(left, ray, triangles, max_dist);
            let max_dist_right = hit_left.map_or(max_dist, |(t, _)| t);
            let hit_right = trace(right, ray, triangles, max_dist_right);

            match (hit_left, hit_right) {
                (Some(l), Some(r)) => Some(if l.0 <= r.0 { l } else { r }),
                (Some(h), None) | (None, Some(h)) => Some(h),
                (None, None) => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::axis_box;

    fn block() -> Vec<Triangle> {
        axis_box(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 10.0))
            .triangles()
            .collect()
    }

    #[test]
    fn test_empty_build() {
        assert!(RayCaster::build(&[]).is_none());
    }

    #[test]
    fn test_hits_near_wall_first() {
        let tris = block();
        let Some(rc) = RayCaster::build(&tris) else {
            panic!("caster should build");
        };
        assert_eq!(rc.face_count(), 12);

        let origin = Point3::new(-5.0, 3.0, 4.0);
        let hit = rc
            .closest_hit(&tris, &origin, &Vector3::new(1.0, 0.0, 0.0), 0.0)
            .ok()
            .flatten();
        let Some(hit) = hit else {
            panic!("ray should hit the -X wall");
        };
        assert_relative_eq!(hit.distance, 5.0, epsilon = 1e-9);
        // Left (-X) side faces are 8 and 9.
        assert!(hit.face == 8 || hit.face == 9);
    }

    #[test]
    fn test_direction_is_normalized() {
        let tris = block();
        let Some(rc) = RayCaster::build(&tris) else {
            panic!("caster should build");
        };
        let hit = rc
            .closest_hit(&tris, &Point3::new(5.0, 5.0, 25.0), &Vector3::new(0.0, 0.0, -4.0), 0.0)
            .ok()
            .flatten();
        assert!(hit.is_some_and(|h| (h.distance - 15.0).abs() < 1e-9));
    }

    #[test]
    fn test_t_min_skips_close_hits() {
        let tris = block();
        let Some(rc) = RayCaster::build(&tris) else {
            panic!("caster should build");
        };
        // Starting on the bottom face, looking up: the bottom is at t = 0.
        let hit = rc
            .closest_hit(&tris, &Point3::new(3.0, 3.0, 0.0), &Vector3::z(), 0.1)
            .ok()
            .flatten();
        assert!(hit.is_some_and(|h| (h.distance - 10.0).abs() < 1e-9));
    }

    #[test]
    fn test_miss() {
        let tris = block();
        let Some(rc) = RayCaster::build(&tris) else {
            panic!("caster should build");
        };
        let hit = rc.closest_hit(&tris, &Point3::new(20.0, 20.0, 20.0), &Vector3::x(), 0.0);
        assert!(matches!(hit, Ok(None)));
    }

    #[test]
    fn test_non_finite_input_is_an_error() {
        let tris = block();
        let Some(rc) = RayCaster::build(&tris) else {
            panic!("caster should build");
        };
        assert!(
            rc.closest_hit(&tris, &Point3::new(f64::NAN, 0.0, 0.0), &Vector3::x(), 0.0)
                .is_err()
        );
        assert!(
            rc.closest_hit(&tris, &Point3::origin(), &Vector3::zeros(), 0.0)
                .is_err()
        );
    }

    #[test]
    fn test_query_needs_the_build_triangles() {
        let tris = block();
        let Some(rc) = RayCaster::build(&tris) else {
            panic!("caster should build");
        };
        let hit = rc.closest_hit(&tris[..6], &Point3::new(5.0, 5.0, 25.0), &(-Vector3::z()), 0.0);
        assert!(matches!(hit, Err(MachinabilityError::RayCast(_))));
    }

    #[test]
    fn test_slab_interval() {
        let aabb = Aabb::new(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let dir_inv = Vector3::new(f64::MAX, f64::MAX, 1.0);
        assert!(slab_interval(&aabb, &Point3::new(0.5, 0.5, -1.0), &dir_inv).is_some());
        assert!(slab_interval(&aabb, &Point3::new(5.0, 5.0, -1.0), &dir_inv).is_none());
    }
}
