//! Axis-aligned bounding box and the slab test used by BVH traversal.
//! Grounded in the source `AABB`/`AABB::Intersect` (scattered across
//! `object.h`/`scene.cpp` revisions) and generalized per spec §3/§4.1: the
//! slab test consumes `ray.sign`/`ray.inv_dir` rather than re-deriving them,
//! and `apply_transform` takes the min/max of the 8 transformed corners
//! rather than the (unsound, rotation-breaking) corner pair.

use glam::{Affine3A, Vec3};

use crate::ray::Ray;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub bounds: [Vec3; 2],
    pub center: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        debug_assert!(min.x <= max.x && min.y <= max.y && min.z <= max.z);
        Self {
            bounds: [min, max],
            center: (min + max) * 0.5,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY))
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(p);
            max = max.max(p);
        }
        Self::new(min, max)
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(
            self.bounds[0].min(other.bounds[0]),
            self.bounds[1].max(other.bounds[1]),
        )
    }

    /// Transform the box by taking the min/max of all 8 transformed corners —
    /// never the naive transform of just `bounds[0]`/`bounds[1]`, which is
    /// unsound the moment `t` contains a rotation.
    pub fn apply_transform(&self, t: Affine3A) -> Aabb {
        let [min, max] = self.bounds;
        let corners = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ];
        Aabb::from_points(corners.into_iter().map(|c| t.transform_point3(c)))
    }

    pub fn extent(&self) -> Vec3 {
        self.bounds[1] - self.bounds[0]
    }

    /// Slab test. Returns true iff the ray intersects the box at some `t >= 0`.
    /// Does not require the direction to be axis-aligned.
    pub fn hit(&self, ray: &Ray) -> bool {
        self.hit_before(ray, f32::INFINITY)
    }

    /// Slab test bounded by an existing closest hit distance, used to skip
    /// subtrees that can't possibly beat the current best `t`.
    pub fn hit_before(&self, ray: &Ray, max_t: f32) -> bool {
        let mut tmin = (self.bounds[ray.sign[0]].x - ray.origin.x) * ray.inv_dir.x;
        let mut tmax = (self.bounds[1 - ray.sign[0]].x - ray.origin.x) * ray.inv_dir.x;
        let tymin = (self.bounds[ray.sign[1]].y - ray.origin.y) * ray.inv_dir.y;
        let tymax = (self.bounds[1 - ray.sign[1]].y - ray.origin.y) * ray.inv_dir.y;
        if tmin > tymax || tymin > tmax {
            return false;
        }
        tmin = tmin.max(tymin);
        tmax = tmax.min(tymax);
        let tzmin = (self.bounds[ray.sign[2]].z - ray.origin.z) * ray.inv_dir.z;
        let tzmax = (self.bounds[1 - ray.sign[2]].z - ray.origin.z) * ray.inv_dir.z;
        if tmin > tzmax || tzmin > tmax {
            return false;
        }
        tmin = tmin.max(tzmin);
        tmax = tmax.min(tzmax);
        tmin <= tmax && tmax >= 0.0 && tmin <= max_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn transform_contains_transformed_primitive() {
        let b = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let t = Affine3A::from_rotation_translation(
            Quat::from_rotation_z(FRAC_PI_2),
            Vec3::new(5.0, 0.0, 0.0),
        );
        let transformed = b.apply_transform(t);
        // A corner rotated 90 degrees about Z should still land inside the box.
        let corner = t.transform_point3(Vec3::new(1.0, 1.0, 1.0));
        assert!(transformed.bounds[0].x <= corner.x && corner.x <= transformed.bounds[1].x);
        assert!(transformed.bounds[0].y <= corner.y && corner.y <= transformed.bounds[1].y);
    }

    #[test]
    fn slab_test_hits_centered_box() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(b.hit(&ray));
    }

    #[test]
    fn slab_test_misses_box_behind_ray() {
        let b = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(!b.hit(&ray));
    }
}
