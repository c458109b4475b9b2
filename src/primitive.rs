//! Local-space primitive geometry: triangle faces and spheres. Ported from
//! `object.cpp`'s `Face::Face`/`Face::Hit` and `Sphere::Load`/`Sphere::Hit`.
//! Vertex positions are copied by value at construction (Design Notes: no
//! `Vector3f*` aliasing into the scene's vertex array).

use glam::{Mat3, Vec2, Vec3};

use crate::aabb::Aabb;
use crate::bvh::BvhPrimitive;
use crate::ray::Ray;

/// Result of a local-space primitive intersection, before the owning
/// `Object` promotes it to world space and attaches material/texture data.
#[derive(Clone, Copy, Debug)]
pub struct LocalHit {
    pub t: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub u: f32,
    pub v: f32,
    pub tbn: Mat3,
}

#[derive(Clone, Debug)]
pub struct Face {
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
    pub normal: Vec3,
    v0v1: Vec3,
    v0v2: Vec3,
    uv0: Vec2,
    uv1: Vec2,
    uv2: Vec2,
    tbn: Mat3,
    aabb: Aabb,
    /// Per-vertex smoothed normals, set by the owning mesh when
    /// `shadingMode="smooth"`.
    pub smooth_normals: Option<(Vec3, Vec3, Vec3)>,
}

impl Face {
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3, uv0: Vec2, uv1: Vec2, uv2: Vec2) -> Self {
        let normal = (v1 - v0).cross(v2 - v0).normalize();
        let v0v1 = v1 - v0;
        let v0v2 = v2 - v0;
        let aabb = Aabb::from_points([v0, v1, v2]);

        // Tangent/bitangent from the UV-to-edge linear map, inverted; falls
        // back to an arbitrary frame when the UVs are degenerate (all zero,
        // as when the scene has no texcoords at all).
        let duv1 = uv1 - uv0;
        let duv2 = uv2 - uv0;
        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        let (t, b) = if det.abs() > 1e-12 {
            let inv_det = 1.0 / det;
            let t = (v0v1 * duv2.y - v0v2 * duv1.y) * inv_det;
            let b = (v0v2 * duv1.x - v0v1 * duv2.x) * inv_det;
            (t, b)
        } else {
            let t = v0v1.normalize();
            let b = normal.cross(t);
            (t, b)
        };
        let tbn = Mat3::from_cols(t, b, normal);

        Self {
            v0,
            v1,
            v2,
            normal,
            v0v1,
            v0v2,
            uv0,
            uv1,
            uv2,
            tbn,
            aabb,
            smooth_normals: None,
        }
    }

    /// Möller-Trumbore intersection in local space. `det` threshold and
    /// rejection order follow `Face::Hit` exactly.
    pub fn hit(&self, ray: &Ray) -> Option<LocalHit> {
        let pvec = ray.direction.cross(self.v0v2);
        let det = self.v0v1.dot(pvec);
        if det.abs() < 1e-9 {
            return None;
        }
        let inv_det = 1.0 / det;
        let tvec = ray.origin - self.v0;
        let u = tvec.dot(pvec) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let qvec = tvec.cross(self.v0v1);
        let v = ray.direction.dot(qvec) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = self.v0v2.dot(qvec) * inv_det;
        if t < 0.0 {
            return None;
        }

        let point = self.v0 + u * self.v0v1 + v * self.v0v2;
        let mut normal = if let Some((n0, n1, n2)) = self.smooth_normals {
            (n0 + u * (n1 - n0) + v * (n2 - n0)).normalize()
        } else {
            self.normal
        };
        if ray.direction.dot(normal) > 0.0 {
            normal = -normal;
        }
        let uv = self.uv0 + u * (self.uv1 - self.uv0) + v * (self.uv2 - self.uv0);

        Some(LocalHit { t, point, normal, u: uv.x, v: uv.y, tbn: self.tbn })
    }
}

impl BvhPrimitive for Face {
    fn aabb(&self) -> Aabb {
        self.aabb
    }
}

/// Sphere in local space. `epsilon` is the source's hard-coded `0.01`
/// self-intersection guard, made configurable per spec (Design Notes, Open
/// Question resolution).
#[derive(Clone, Copy, Debug)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.center - Vec3::splat(self.radius), self.center + Vec3::splat(self.radius))
    }

    pub fn hit(&self, ray: &Ray, epsilon: f32) -> Option<LocalHit> {
        let oc = ray.origin - self.center;
        let a = ray.direction.dot(ray.direction);
        let b = 2.0 * oc.dot(ray.direction);
        let c = oc.dot(oc) - self.radius * self.radius;
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrt_d = discriminant.sqrt();
        let mut t = (-b - sqrt_d) / (2.0 * a);
        if t < epsilon {
            t = (-b + sqrt_d) / (2.0 * a);
        }
        if t < epsilon {
            return None;
        }

        let point = ray.origin + ray.direction * t;
        let normal = (point - self.center).normalize();

        // UV from the unit normal direction (matches Sphere::Hit's first
        // theta/phi pass, computed from `hit.Normal` rather than radius-scaled p).
        let theta = normal.y.clamp(-1.0, 1.0).acos();
        let phi = normal.z.atan2(normal.x);
        let u = (-phi + std::f32::consts::PI) / (2.0 * std::f32::consts::PI);
        let v = theta / std::f32::consts::PI;

        // Analytic TBN from the radius-scaled local point, per the source.
        let p = point - self.center;
        let theta2 = (p.y / self.radius).clamp(-1.0, 1.0).acos();
        let phi2 = p.z.atan2(p.x);
        let tangent = Vec3::new(p.z * 2.0 * std::f32::consts::PI, 0.0, p.x * -2.0 * std::f32::consts::PI);
        let bitangent = Vec3::new(
            p.y * phi2.cos() * std::f32::consts::PI,
            -self.radius * theta2.sin() * std::f32::consts::PI,
            p.y * phi2.sin() * std::f32::consts::PI,
        );
        let tbn = Mat3::from_cols(tangent, bitangent, normal);

        Some(LocalHit { t, point, normal, u, v, tbn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_triangle_is_rejected() {
        let f = Face::new(Vec3::ZERO, Vec3::ZERO, Vec3::ZERO, Vec2::ZERO, Vec2::ZERO, Vec2::ZERO);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert!(f.hit(&ray).is_none());
    }

    #[test]
    fn triangle_hit_reproduces_point_at_t() {
        let f = Face::new(
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.5, 1.0),
        );
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let hit = f.hit(&ray).expect("should hit");
        let reproduced = ray.at(hit.t);
        assert!((reproduced - hit.point).length() < 1e-4);
        assert!(ray.direction.dot(hit.normal) <= 0.0);
    }

    #[test]
    fn sphere_tangent_case_never_nan() {
        let s = Sphere { center: Vec3::ZERO, radius: 1.0 };
        let ray = Ray::new(Vec3::new(1.0, 0.0, -5.0), Vec3::Z);
        if let Some(hit) = s.hit(&ray, 0.01) {
            assert!(hit.t.is_finite());
            assert!(!hit.normal.x.is_nan());
        }
    }

    #[test]
    fn sphere_epsilon_rejects_self_intersection() {
        let s = Sphere { center: Vec3::ZERO, radius: 1.0 };
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(s.hit(&ray, 0.01).is_none());
    }
}
