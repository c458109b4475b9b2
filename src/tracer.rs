//! Recursive Whitted-style light transport. Ported one-for-one from
//! `Scene::Trace` (mirror/dielectric/conductor branches, emissive-object
//! shortcut, background miss handling) and `Material::Shade` (ambient +
//! per-light shadow loop), kept as free functions over `Scene` rather than
//! methods on it so the recursion stays a plain call stack.

use glam::Vec3;
use rand::Rng;

use crate::material::MaterialType;
use crate::ray::{Ray, RayHit};
use crate::scene::{LightKind, Scene};
use crate::texture::SamplerData;
use crate::util::{beer_lambert, fresnel_conductor, fresnel_dielectric, reflect, refract};

/// Traces `ray` through the scene, returning its contribution to the pixel.
/// `pixel_uv` is `(x / width, y / height)`, used only for the background
/// texture's 2D sample when the ray escapes the scene.
pub fn trace(ray: &Ray, scene: &Scene, depth: i32, pixel_uv: (f32, f32), rng: &mut impl Rng) -> Vec3 {
    if depth < 0 {
        return Vec3::ZERO;
    }
    let Some(hit) = scene.cast(ray) else {
        return miss_color(scene, ray, pixel_uv);
    };

    let mut color = Vec3::ZERO;
    match hit.material.kind {
        MaterialType::Mirror => {
            let r = reflect(ray.direction, hit.normal);
            let next = Ray::with_time(hit.point + hit.normal * scene.shadow_ray_epsilon, r, ray.time);
            let cl = trace(&next, scene, depth - 1, pixel_uv, rng);
            color += hit.material.mirror_reflectance * cl;
        }
        MaterialType::Dielectric => {
            color += trace_dielectric(ray, &hit, scene, depth, pixel_uv, rng);
        }
        MaterialType::Conductor => {
            let r = reflect(ray.direction, hit.normal);
            let ndi = -hit.normal.dot(ray.direction);
            let fr = fresnel_conductor(ndi, hit.material.refraction_index, hit.material.absorption_index);
            let next = Ray::with_time(hit.point + hit.normal * scene.shadow_ray_epsilon, r, ray.time);
            let cl = trace(&next, scene, depth - 1, pixel_uv, rng);
            color += hit.material.mirror_reflectance * cl * fr;
        }
        MaterialType::Default => {}
    }

    // Inside a dielectric medium (n != 1): only the recursive term matters,
    // matching `Scene::Trace`'s `if (ray.N != 1) return color;`.
    if (ray.n - 1.0).abs() > f32::EPSILON {
        return color;
    }

    if let Some(light_id) = scene.objects[hit.object_index].light_id {
        match &scene.lights[light_id] {
            LightKind::Sphere { radiance, .. } | LightKind::Mesh { radiance, .. } => {
                return color + *radiance;
            }
            _ => {}
        }
    }

    color + shade_direct(ray, &hit, scene, rng)
}

fn trace_dielectric(ray: &Ray, hit: &RayHit, scene: &Scene, depth: i32, pixel_uv: (f32, f32), rng: &mut impl Rng) -> Vec3 {
    let n1 = ray.n;
    let n2 = if ray.n == 1.0 { hit.material.refraction_index } else { 1.0 };
    let mut cos_i = -ray.direction.dot(hit.normal);
    let mut normal = hit.normal;
    if cos_i < 0.0 {
        cos_i = -cos_i;
        normal = -normal;
    }
    let r = reflect(ray.direction, normal);

    match refract(ray.direction, normal, n1, n2) {
        None => {
            // total internal reflection
            let mut rray = Ray::with_time(hit.point + normal * scene.shadow_ray_epsilon, r, ray.time);
            rray.n = ray.n;
            let mut l1 = trace(&rray, scene, depth - 1, pixel_uv, rng);
            if ray.n != 1.0 {
                if let Some(rhit) = scene.cast(&rray) {
                    l1 *= beer_lambert(hit.material.absorption_coefficient, rhit.t);
                }
            }
            l1
        }
        Some(refracted) => {
            let cos_t = (-refracted.dot(normal)).abs();
            let fr = fresnel_dielectric(cos_i, cos_t, n1, n2);
            let ft = 1.0 - fr;

            let mut rray = Ray::with_time(hit.point + normal * scene.shadow_ray_epsilon, r, ray.time);
            rray.n = ray.n;
            let mut l1 = trace(&rray, scene, depth - 1, pixel_uv, rng) * fr;

            let mut tray = Ray::with_time(hit.point - normal * scene.shadow_ray_epsilon, refracted, ray.time);
            tray.n = n2;
            let mut l0 = trace(&tray, scene, depth - 1, pixel_uv, rng) * ft;

            if ray.n == 1.0 {
                if let Some(thit) = scene.cast(&tray) {
                    l0 *= beer_lambert(hit.material.absorption_coefficient, thit.t);
                }
            } else if let Some(rhit) = scene.cast(&rray) {
                l1 *= beer_lambert(hit.material.absorption_coefficient, rhit.t);
            }
            l0 + l1
        }
    }
}

/// Ambient term plus the per-light shadow-ray shading loop, matching
/// `Material::Shade`. Normal/bump perturbation is applied first, per the
/// source's hit-normal setup before `Shade` is invoked.
fn shade_direct(ray: &Ray, hit: &RayHit, scene: &Scene, rng: &mut impl Rng) -> Vec3 {
    let data = SamplerData { u: hit.u, v: hit.v, point: hit.point, normal: hit.normal };

    if let Some(idx) = hit.diffuse_texture {
        let tex = &scene.textures[idx];
        if matches!(tex.role, crate::texture::TextureRole::Diffuse { decal: crate::texture::DecalMode::ReplaceAll }) {
            return tex.diffuse_color(data, &scene.images);
        }
    }

    let mut shading_normal = hit.normal;
    if let Some(idx) = hit.normal_texture {
        shading_normal = scene.textures[idx].sample_normal(data, &scene.images);
    } else if let Some(idx) = hit.bump_texture {
        let tangent = hit.tbn.x_axis;
        let bitangent = hit.tbn.y_axis;
        shading_normal = scene.textures[idx].sample_bump(data, tangent, bitangent, hit.normal, &scene.images);
    }

    let texture_color = hit.diffuse_texture.map(|idx| {
        let tex = &scene.textures[idx];
        let decal = match tex.role {
            crate::texture::TextureRole::Diffuse { decal } => decal,
            _ => crate::texture::DecalMode::ReplaceKd,
        };
        (tex.diffuse_color(data, &scene.images), decal)
    });

    let (ka, kd, ks) = hit.material.prepared_reflectances(scene.gamma, texture_color);

    let mut color = ka * scene.ambient_intensity;

    for light in &scene.lights {
        let sp = hit.point + shading_normal * scene.shadow_ray_epsilon;
        let Some(sample) = light.sample(sp, shading_normal, scene, rng) else { continue };

        let mut shadow_ray = Ray::with_time(sp, sample.dir, ray.time);
        shadow_ray.ignore_object_id = light.object_index().map(|i| scene.objects[i].id).unwrap_or(-1);

        if scene.cast_any(&shadow_ray, sample.distance) {
            continue;
        }

        let view_dir = (ray.origin - hit.point).normalize();
        let lum = light.luminance(hit.point, &sample, scene);
        color += hit.material.brdf.shade(kd, ks, sample.dir, shading_normal, view_dir, lum);
    }

    color
}

fn miss_color(scene: &Scene, ray: &Ray, pixel_uv: (f32, f32)) -> Vec3 {
    if let Some(back) = &scene.background_texture {
        let data = SamplerData { u: pixel_uv.0, v: pixel_uv.1, point: Vec3::ZERO, normal: Vec3::ZERO };
        return back.background_color(data, &scene.images) * 255.0;
    }
    if scene.has_environment_light() {
        return scene.sample_environment_color(ray.direction);
    }
    scene.background_color
}
