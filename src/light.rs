//! Light variants and their sampling/radiance evaluation. Ported from
//! `light.cpp` (Point/Area/Directional/Spot/Environment) and
//! `objectlight.cpp` (LightSphere's cone sampling); LightMesh's area-weighted
//! triangle sampling follows spec §4.4 directly since the corpus's own
//! `LightMesh::SamplePoint` was never filled in past its header/pseudocode.
//!
//! The sphere/mesh variants don't own object geometry themselves — they're
//! `Object ∧ Light` in the source (Design Notes: capability sets, not
//! diamond inheritance), so here they're free functions taking the geometry
//! the owning `Object` resolves, called from `scene.rs`/`tracer.rs`.

use glam::{Affine3A, Vec3};
use rand::Rng;

#[derive(Clone, Copy, Debug)]
pub struct LightSample {
    pub point: Vec3,
    pub dir: Vec3,
    pub distance: f32,
    pub light_normal: Vec3,
}

#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    pub position: Vec3,
    pub intensity: Vec3,
}

impl PointLight {
    pub fn sample(&self, point: Vec3) -> LightSample {
        let d = self.position - point;
        let r = d.length();
        LightSample { point: self.position, dir: d / r, distance: r, light_normal: Vec3::ZERO }
    }

    pub fn luminance(&self, point: Vec3) -> Vec3 {
        let r = (self.position - point).length();
        self.intensity / (r * r)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AreaLight {
    pub position: Vec3,
    pub normal: Vec3,
    pub radiance: Vec3,
    pub size: f32,
    u: Vec3,
    v: Vec3,
}

impl AreaLight {
    pub fn new(position: Vec3, normal: Vec3, radiance: Vec3, size: f32) -> Self {
        let normal = normal.normalize();
        let x = normal.x.abs();
        let y = normal.y.abs();
        let z = normal.z.abs();
        let np = if x <= y && x <= z {
            Vec3::new(1.0, normal.y, normal.z)
        } else if y <= x && y <= z {
            Vec3::new(normal.x, 1.0, normal.z)
        } else {
            Vec3::new(normal.x, normal.y, 1.0)
        }
        .normalize();
        let u = np.cross(normal).normalize();
        let v = normal.cross(u).normalize();
        Self { position, normal, radiance, size, u, v }
    }

    /// `r1, r2` are centered in [-0.5, 0.5) — confirmed against the source's
    /// `AreaLight::SamplePoint` (`rnd(generator) - .5f`).
    pub fn sample(&self, point: Vec3, rng: &mut impl Rng) -> LightSample {
        let r1 = rng.gen::<f32>() - 0.5;
        let r2 = rng.gen::<f32>() - 0.5;
        let sample = self.position + self.size * (self.u * r1 + self.v * r2);
        let d = sample - point;
        let r = d.length();
        LightSample { point: sample, dir: d / r, distance: r, light_normal: self.normal }
    }

    pub fn luminance(&self, point: Vec3, sample: Vec3) -> Vec3 {
        let r = (sample - point).length();
        let l = (point - sample).normalize();
        let teta = self.normal.dot(l).abs();
        (self.radiance * teta * self.size * self.size) / (r * r)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub radiance: Vec3,
}

impl DirectionalLight {
    pub fn sample(&self) -> LightSample {
        LightSample { point: Vec3::ZERO, dir: -self.direction, distance: f32::MAX, light_normal: Vec3::ZERO }
    }

    pub fn luminance(&self) -> Vec3 {
        self.radiance
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub intensity: Vec3,
    /// Full coverage angle in degrees.
    pub coverage_angle: f32,
    /// Full falloff (penumbra) angle in degrees.
    pub falloff_angle: f32,
}

impl SpotLight {
    pub fn sample(&self) -> LightSample {
        LightSample { point: self.position, dir: -self.direction, distance: 0.0, light_normal: Vec3::ZERO }
    }

    /// `sample` is the light's own position, matching the source's call with
    /// `lsample` = `Position`; distance is computed from the shaded point.
    pub fn luminance(&self, point: Vec3, sample: Vec3) -> Vec3 {
        let dir = (point - sample).normalize();
        let r = (point - sample).length();
        let alpha = self.coverage_angle;
        let beta = self.falloff_angle;
        let theta = dir.dot(self.direction).clamp(-1.0, 1.0).acos().to_degrees().abs();
        if theta > alpha / 2.0 {
            Vec3::ZERO
        } else if theta > beta / 2.0 {
            let theta_rad = theta.to_radians();
            let f = (theta_rad.cos() - (alpha / 2.0).to_radians().cos())
                / ((beta / 2.0).to_radians().cos() - (alpha / 2.0).to_radians().cos());
            f.powi(4) * self.intensity / (r * r)
        } else {
            self.intensity / (r * r)
        }
    }
}

/// HDR lat-long environment map, sampled by direction.
pub struct EnvironmentLight {
    pub image_index: usize,
}

impl EnvironmentLight {
    /// Hemisphere-uniform rejection sample against `normal`. Bounded attempt
    /// count per spec §7 ("shadow-sampling loops with rejection must bound
    /// their attempts"); returns `None` on exhaustion rather than looping forever.
    pub fn sample(&self, normal: Vec3, rng: &mut impl Rng) -> Option<LightSample> {
        const MAX_ATTEMPTS: u32 = 1000;
        for _ in 0..MAX_ATTEMPTS {
            let x = rng.gen::<f32>() * 2.0 - 1.0;
            let y = rng.gen::<f32>() * 2.0 - 1.0;
            let z = rng.gen::<f32>() * 2.0 - 1.0;
            let candidate = Vec3::new(x, y, z);
            if candidate.length_squared() <= 1.0 && normal.dot(candidate) > 0.0 {
                let dir = candidate.normalize();
                return Some(LightSample { point: dir, dir, distance: f32::MAX, light_normal: Vec3::ZERO });
            }
        }
        None
    }

    /// Maps a direction to lat-long UV, matching `EnvironmentLight::GetColor`.
    pub fn direction_to_uv(direction: Vec3) -> (f32, f32) {
        let phi_g = direction.z.atan2(direction.x);
        let theta_g = direction.y.clamp(-1.0, 1.0).acos();
        let u = (-phi_g + std::f32::consts::PI) / (2.0 * std::f32::consts::PI);
        let v = theta_g / std::f32::consts::PI;
        (u, v)
    }

    /// Luminance is the HDR sample scaled by 2π, matching
    /// `EnvironmentLight::GetLuminance`.
    pub fn luminance_from_color(color: Vec3) -> Vec3 {
        color * 2.0 * std::f32::consts::PI
    }
}

/// Cone sampling of a sphere light's subtended solid angle from a shaded
/// point, per `LightSphere::SamplePoint`/`GetLuminance`.
pub fn sample_sphere_light(
    point: Vec3,
    center_local: Vec3,
    radius: f32,
    world_from_local: Affine3A,
    local_from_world: Affine3A,
    rng: &mut impl Rng,
) -> LightSample {
    let p_local = local_from_world.transform_point3(point);
    let d = (center_local - p_local).length();
    let rd = (radius / d).min(1.0);
    let cos_theta_max = (1.0 - rd * rd).sqrt();
    let r1 = rng.gen::<f32>();
    let r2 = rng.gen::<f32>();
    let theta_i = (1.0 - r1 + r1 * cos_theta_max).acos();
    let phi_i = 2.0 * std::f32::consts::PI * r2;
    let w = (center_local - p_local).normalize();

    let x = w.x.abs();
    let y = w.y.abs();
    let z = w.z.abs();
    let np = if x <= y && x <= z {
        Vec3::new(1.0, w.y, w.z)
    } else if y <= x && y <= z {
        Vec3::new(w.x, 1.0, w.z)
    } else {
        Vec3::new(w.x, w.y, 1.0)
    }
    .normalize();
    let u = np.cross(w).normalize();
    let v = w.cross(u).normalize();

    let l_local = (w * theta_i.cos() + v * theta_i.sin() * phi_i.cos() + u * theta_i.sin() * phi_i.sin()).normalize();

    let dir = world_from_local.transform_vector3(l_local).normalize();
    let sp_local = center_local - l_local * radius;
    let sp = world_from_local.transform_point3(sp_local);
    LightSample { point: sp, dir, distance: (sp - point).length(), light_normal: Vec3::ZERO }
}

pub fn luminance_sphere_light(
    point: Vec3,
    center_local: Vec3,
    radius: f32,
    local_from_world: Affine3A,
    radiance: Vec3,
) -> Vec3 {
    let p_local = local_from_world.transform_point3(point);
    let d = (center_local - p_local).length();
    let rd = (radius / d).min(1.0);
    let cos_theta_max = (1.0 - rd * rd).sqrt();
    radiance * (2.0 * std::f32::consts::PI * (1.0 - cos_theta_max))
}

/// Area-weighted triangle pick plus uniform barycentric sample, per spec
/// §4.4's `u' = 1 - sqrt(xi1)`, `v' = sqrt(xi1) * (1 - xi2)`.
/// `cumulative_areas[i]` is the running sum of triangle areas up to and
/// including triangle `i`; `total_area` is the grand total.
pub fn sample_mesh_light(
    point: Vec3,
    triangles: &[(Vec3, Vec3, Vec3)],
    cumulative_areas: &[f32],
    total_area: f32,
    rng: &mut impl Rng,
) -> (LightSample, Vec3) {
    let target = rng.gen::<f32>() * total_area;
    let idx = cumulative_areas.partition_point(|&a| a < target).min(triangles.len() - 1);
    let (v0, v1, v2) = triangles[idx];
    let xi1 = rng.gen::<f32>();
    let xi2 = rng.gen::<f32>();
    let u = 1.0 - xi1.sqrt();
    let v = xi1.sqrt() * (1.0 - xi2);
    let w = 1.0 - u - v;
    let sample = v0 * u + v1 * v + v2 * w;
    let light_normal = (v1 - v0).cross(v2 - v0).normalize();
    let d = sample - point;
    let r = d.length();
    (LightSample { point: sample, dir: d / r, distance: r, light_normal }, light_normal)
}

pub fn luminance_mesh_light(point: Vec3, sample: Vec3, light_normal: Vec3, total_area: f32, radiance: Vec3) -> Vec3 {
    let r = (sample - point).length();
    let l = (point - sample).normalize();
    let teta = light_normal.dot(l).abs();
    (radiance * teta * total_area) / (r * r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_light_falloff_matches_inverse_square() {
        let light = PointLight { position: Vec3::new(0.0, 0.0, 5.0), intensity: Vec3::splat(25.0) };
        let lum = light.luminance(Vec3::ZERO);
        assert!((lum.x - 1.0).abs() < 1e-4);
    }

    #[test]
    fn directional_light_has_infinite_distance() {
        let light = DirectionalLight { direction: Vec3::new(0.0, -1.0, 0.0), radiance: Vec3::ONE };
        let s = light.sample();
        assert_eq!(s.distance, f32::MAX);
        assert_eq!(s.dir, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn spot_light_outside_coverage_is_black() {
        let light = SpotLight {
            position: Vec3::ZERO,
            direction: Vec3::new(0.0, -1.0, 0.0),
            intensity: Vec3::ONE,
            coverage_angle: 30.0,
            falloff_angle: 10.0,
        };
        let far_point = Vec3::new(100.0, -1.0, 0.0);
        assert_eq!(light.luminance(far_point, Vec3::ZERO), Vec3::ZERO);
    }
}
