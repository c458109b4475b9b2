//! The assembled scene graph: resource arenas (materials, images, meshes,
//! objects), the top-level BVH, and the light list. Ported from `Scene`'s
//! constructor/`Load`/`RayCast` in `scene.cpp`; XML parsing itself lives in
//! `scene_io.rs` so this module only holds the in-memory representation and
//! the intersection/lighting queries the tracer drives.

use glam::Vec3;
use rand::Rng;

use crate::light::{
    sample_mesh_light, sample_sphere_light, luminance_mesh_light, luminance_sphere_light, AreaLight, DirectionalLight,
    EnvironmentLight, LightSample, PointLight, SpotLight,
};
use crate::material::Material;
use crate::object::{Geometry, Mesh, Object};
use crate::ray::{Ray, RayHit};
use crate::texture::{Image, Texture};

pub enum LightKind {
    Point(PointLight),
    Area(AreaLight),
    Directional(DirectionalLight),
    Spot(SpotLight),
    Environment(EnvironmentLight),
    /// Sphere/mesh area lights: geometry is resolved through the owning
    /// `Object`, found by `object_index` (spec §3's `Object ∧ Light`).
    Sphere { object_index: usize, radiance: Vec3 },
    Mesh { object_index: usize, radiance: Vec3, triangles: Vec<(Vec3, Vec3, Vec3)>, cumulative_areas: Vec<f32>, total_area: f32 },
}

impl LightKind {
    pub fn object_index(&self) -> Option<usize> {
        match self {
            LightKind::Sphere { object_index, .. } | LightKind::Mesh { object_index, .. } => Some(*object_index),
            _ => None,
        }
    }

    pub fn sample(&self, point: Vec3, normal: Vec3, scene: &Scene, rng: &mut impl Rng) -> Option<LightSample> {
        match self {
            LightKind::Point(l) => Some(l.sample(point)),
            LightKind::Area(l) => Some(l.sample(point, rng)),
            LightKind::Directional(l) => Some(l.sample()),
            LightKind::Spot(l) => Some(l.sample()),
            LightKind::Environment(l) => l.sample(normal, rng),
            LightKind::Sphere { object_index, .. } => {
                let obj = &scene.objects[*object_index];
                let Geometry::Sphere(sphere) = &obj.geometry else { unreachable!("sphere light must own Sphere geometry") };
                Some(sample_sphere_light(point, sphere.center, sphere.radius, obj.local_to_world, obj.world_to_local, rng))
            }
            LightKind::Mesh { triangles, cumulative_areas, total_area, .. } => {
                Some(sample_mesh_light(point, triangles, cumulative_areas, *total_area, rng).0)
            }
        }
    }

    pub fn luminance(&self, point: Vec3, sample: &LightSample, scene: &Scene) -> Vec3 {
        match self {
            LightKind::Point(l) => l.luminance(point),
            LightKind::Area(l) => l.luminance(point, sample.point),
            LightKind::Directional(l) => l.luminance(),
            LightKind::Spot(l) => l.luminance(point, sample.point),
            LightKind::Environment(_) => {
                let color = scene.sample_environment_color(sample.dir);
                EnvironmentLight::luminance_from_color(color)
            }
            LightKind::Sphere { object_index, radiance } => {
                let obj = &scene.objects[*object_index];
                let Geometry::Sphere(sphere) = &obj.geometry else { unreachable!() };
                luminance_sphere_light(point, sphere.center, sphere.radius, obj.world_to_local, *radiance)
            }
            LightKind::Mesh { radiance, total_area, .. } => {
                luminance_mesh_light(point, sample.point, sample.light_normal, *total_area, *radiance)
            }
        }
    }
}

pub struct Scene {
    pub background_color: Vec3,
    pub background_texture: Option<Texture>,
    pub shadow_ray_epsilon: f32,
    pub intersection_test_epsilon: f32,
    pub max_recursion_depth: i32,
    pub ambient_intensity: Vec3,
    pub materials: Vec<Material>,
    pub images: Vec<Image>,
    pub meshes: Vec<Mesh>,
    pub objects: Vec<Object>,
    pub lights: Vec<LightKind>,
    pub textures: Vec<Texture>,
    pub gamma: f32,
    root: Option<crate::bvh::Bvh>,
}

impl Scene {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        background_color: Vec3,
        background_texture: Option<Texture>,
        shadow_ray_epsilon: f32,
        intersection_test_epsilon: f32,
        max_recursion_depth: i32,
        ambient_intensity: Vec3,
        materials: Vec<Material>,
        images: Vec<Image>,
        meshes: Vec<Mesh>,
        objects: Vec<Object>,
        lights: Vec<LightKind>,
        textures: Vec<Texture>,
        gamma: f32,
    ) -> Self {
        Self {
            background_color,
            background_texture,
            shadow_ray_epsilon: if shadow_ray_epsilon == 0.0 { 0.001 } else { shadow_ray_epsilon },
            intersection_test_epsilon,
            max_recursion_depth: if max_recursion_depth == 0 { 1 } else { max_recursion_depth },
            ambient_intensity,
            materials,
            images,
            meshes,
            objects,
            lights,
            textures,
            gamma,
            root: None,
        }
    }

    /// Builds the top-level BVH over all objects. Must be called once after
    /// construction, matching `Scene::Load`.
    pub fn build_bvh(&mut self) {
        self.root = Some(crate::bvh::Bvh::build(&self.objects));
    }

    /// Closest-hit query across all objects; `ignore_object_id` mirrors the
    /// source's `ray.Ignore` self-shadow guard.
    pub fn cast(&self, ray: &Ray) -> Option<RayHit> {
        let root = self.root.as_ref().expect("Scene::build_bvh must run before casting rays");
        let test = |idx: usize, ray: &Ray| -> Option<(f32, RayHit)> {
            let obj = &self.objects[idx];
            if obj.id == ray.ignore_object_id {
                return None;
            }
            let hit = obj.hit(ray, &self.meshes, &self.objects, self.intersection_test_epsilon)?;
            Some((
                hit.t,
                RayHit {
                    t: hit.t,
                    point: hit.point,
                    normal: hit.normal,
                    material: self.materials[obj.material_id],
                    diffuse_texture: obj.diffuse_texture,
                    normal_texture: obj.normal_texture,
                    bump_texture: obj.bump_texture,
                    u: hit.u,
                    v: hit.v,
                    tbn: hit.tbn,
                    object_index: idx,
                    object_id: obj.id,
                },
            ))
        };
        root.hit_closest(ray, &test).map(|(_, h)| h)
    }

    /// Bounded any-hit query used for shadow rays (`closest = false`).
    pub fn cast_any(&self, ray: &Ray, max_dist: f32) -> bool {
        let Some(root) = self.root.as_ref() else { return false };
        let test = |idx: usize, ray: &Ray, max_t: f32| -> Option<f32> {
            let obj = &self.objects[idx];
            if obj.id == ray.ignore_object_id {
                return None;
            }
            obj.hit_any(ray, max_t, &self.meshes, &self.objects, self.intersection_test_epsilon).then_some(0.0)
        };
        root.hit_any(ray, max_dist, &test)
    }

    /// Samples the equirectangular background image by world direction, used
    /// both for environment-light luminance and camera-miss background color.
    pub fn sample_environment_color(&self, direction: Vec3) -> Vec3 {
        let Some(LightKind::Environment(env)) = self.lights.iter().find(|l| matches!(l, LightKind::Environment(_))) else {
            return Vec3::ZERO;
        };
        let (u, v) = EnvironmentLight::direction_to_uv(direction);
        let image = &self.images[env.image_index];
        let px = (u * (image.width as f32 - 1.0)).round().max(0.0) as i64;
        let py = (v * (image.height as f32 - 1.0)).round().max(0.0) as i64;
        image.fetch(px, py)
    }

    pub fn has_environment_light(&self) -> bool {
        self.lights.iter().any(|l| matches!(l, LightKind::Environment(_)))
    }
}
