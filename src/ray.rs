//! Ray and hit-record value types. Ported from `ray.h`/`ray.cpp`: the
//! original kept `Origin`/`Direction`/`Time`/`N`(medium IOR)/`Ignore`(object
//! id) on a small value type passed by reference through `Scene::RayCast`;
//! `inv_dir`/`sign` are an addition so the AABB slab test (§4.1) doesn't
//! recompute reciprocals on every node.

use glam::{Mat3, Vec2, Vec3};

use crate::material::Material;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub inv_dir: Vec3,
    pub sign: [usize; 3],
    /// Refractive index of the medium the ray currently travels through. 1.0 = vacuum.
    pub n: f32,
    /// Shutter-fraction in [0, 1) used for motion blur sampling.
    pub time: f32,
    /// Object id to skip during intersection (prevents self-shadowing by emissive objects). -1 = none.
    pub ignore_object_id: i32,
    /// Populated by `Scene::cast` after the query; distance to the hit, or infinity.
    pub dist: f32,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self::with_time(origin, direction, 0.0)
    }

    pub fn with_time(origin: Vec3, direction: Vec3, time: f32) -> Self {
        let inv_dir = Vec3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        let sign = [
            (direction.x < 0.0) as usize,
            (direction.y < 0.0) as usize,
            (direction.z < 0.0) as usize,
        ];
        Self {
            origin,
            direction,
            inv_dir,
            sign,
            n: 1.0,
            time,
            ignore_object_id: -1,
            dist: f32::INFINITY,
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Result of a successful ray-scene intersection. `object_index` replaces the
/// source's `Object*` with an arena index (Design Notes: no pointer aliasing).
#[derive(Clone, Debug)]
pub struct RayHit {
    pub t: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub material: Material,
    pub diffuse_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub bump_texture: Option<usize>,
    pub u: f32,
    pub v: f32,
    pub tbn: Mat3,
    pub object_index: usize,
    pub object_id: i32,
}

impl RayHit {
    pub fn uv(&self) -> Vec2 {
        Vec2::new(self.u, self.v)
    }
}
