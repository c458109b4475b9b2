//! Scene objects: meshes, mesh instances, lone triangles and spheres, each
//! carrying their own local-to-world transform, material binding and texture
//! bindings. Ported from `object.cpp`'s `Object`/`Mesh`/`MeshInstance`/
//! `Triangle`/`Sphere` hierarchy, collapsed into one struct plus a geometry
//! enum (Design Notes: capability sets over diamond inheritance — emissive
//! behavior is a `light_id` a plain object can also carry, not a distinct
//! class branch).
//!
//! Motion-blur ray transforms follow the source exactly (pretranslate by
//! `-motion*time` going to local space, `+motion*time` coming back). The
//! motion-blurred *bounding box*, however, uses the union of the box at t=0
//! and t=1 rather than the source's `1 + |motion|` axis-scale hack, which
//! under-bounds fast-moving meshes along the opposite axes (Design Notes,
//! Open Question resolution — see DESIGN.md).

use glam::{Affine3A, Mat3, Vec3};

use crate::aabb::Aabb;
use crate::bvh::{Bvh, BvhPrimitive};
use crate::primitive::{Face, LocalHit, Sphere};
use crate::ray::Ray;

/// A triangle mesh: owned faces plus a BVH over them, in local space.
pub struct Mesh {
    pub faces: Vec<Face>,
    bvh: Bvh,
    pub local_aabb: Aabb,
}

impl Mesh {
    /// Builds the BVH and, when `smooth`, averages per-vertex normals across
    /// all faces sharing a vertex — an O(n²) adjacency scan matching
    /// `Mesh::Load`'s normal-smoothing pass (acceptable: meshes in this
    /// renderer's target scenes are modest, and the scan only runs once at load).
    pub fn new(mut faces: Vec<Face>, smooth: bool) -> Self {
        if smooth {
            smooth_normals(&mut faces);
        }
        let local_aabb = faces.iter().map(|f| f.aabb()).reduce(|a, b| a.union(&b)).unwrap_or_else(Aabb::empty);
        let bvh = Bvh::build(&faces);
        Self { faces, bvh, local_aabb }
    }

    fn hit_local(&self, ray: &Ray) -> Option<LocalHit> {
        let test = |idx: usize, ray: &Ray| -> Option<(f32, LocalHit)> { self.faces[idx].hit(ray).map(|h| (h.t, h)) };
        self.bvh.hit_closest(ray, &test).map(|(_, h)| h)
    }

    fn hit_any_local(&self, ray: &Ray, max_t: f32) -> bool {
        let test = |idx: usize, ray: &Ray, max_t: f32| -> Option<f32> {
            self.faces[idx].hit(ray).filter(|h| h.t < max_t).map(|h| h.t)
        };
        self.bvh.hit_any(ray, max_t, &test)
    }
}

fn smooth_normals(faces: &mut [Face]) {
    let n = faces.len();
    let mut accum = vec![Vec3::ZERO; n];
    for i in 0..n {
        for j in 0..n {
            let shares_vertex = [faces[i].v0, faces[i].v1, faces[i].v2]
                .iter()
                .any(|v| (*v - faces[j].v0).length_squared() < 1e-10 || (*v - faces[j].v1).length_squared() < 1e-10 || (*v - faces[j].v2).length_squared() < 1e-10);
            if shares_vertex {
                accum[i] += faces[j].normal;
            }
        }
    }
    for (face, sum) in faces.iter_mut().zip(accum) {
        let smoothed = sum.normalize();
        face.smooth_normals = Some((smoothed, smoothed, smoothed));
    }
}

pub enum Geometry {
    Mesh { mesh_index: usize },
    /// Shares the base mesh's BVH by index; when `reset_transform` is false
    /// the base object's own transform is composed underneath this one's,
    /// matching `MeshInstance::Load`'s `!ResetTransform` branch.
    MeshInstance { base_mesh_index: usize, base_object_index: usize, reset_transform: bool },
    Triangle(Face),
    Sphere(Sphere),
}

pub struct ObjectHit {
    pub t: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub u: f32,
    pub v: f32,
    pub tbn: Mat3,
}

pub struct Object {
    pub id: i32,
    pub material_id: usize,
    pub geometry: Geometry,
    pub local_to_world: Affine3A,
    pub world_to_local: Affine3A,
    pub motion_blur: Vec3,
    pub diffuse_texture: Option<usize>,
    pub normal_texture: Option<usize>,
    pub bump_texture: Option<usize>,
    /// Index into `Scene.lights`, set when this object is also a light source
    /// (sphere/mesh area lights — spec §3's `Object ∧ Light`).
    pub light_id: Option<usize>,
    world_aabb: Aabb,
}

impl Object {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i32,
        material_id: usize,
        geometry: Geometry,
        local_to_world: Affine3A,
        motion_blur: Vec3,
        diffuse_texture: Option<usize>,
        normal_texture: Option<usize>,
        bump_texture: Option<usize>,
        light_id: Option<usize>,
        meshes: &[Mesh],
    ) -> Self {
        let world_to_local = local_to_world.inverse();
        let local_aabb = match &geometry {
            Geometry::Mesh { mesh_index } => meshes[*mesh_index].local_aabb,
            Geometry::MeshInstance { base_mesh_index, .. } => meshes[*base_mesh_index].local_aabb,
            Geometry::Triangle(face) => face.aabb(),
            Geometry::Sphere(sphere) => sphere.aabb(),
        };
        let world_aabb = motion_blurred_world_aabb(local_aabb, local_to_world, motion_blur);
        Self {
            id,
            material_id,
            geometry,
            local_to_world,
            world_to_local,
            motion_blur,
            diffuse_texture,
            normal_texture,
            bump_texture,
            light_id,
            world_aabb,
        }
    }

    fn effective_world_to_local(&self, meshes: &[Mesh], objects: &[Object]) -> Affine3A {
        match &self.geometry {
            Geometry::MeshInstance { base_object_index, reset_transform, .. } if !reset_transform => {
                objects[*base_object_index].local_to_world.inverse() * self.world_to_local
            }
            _ => self.world_to_local,
        }
    }

    fn effective_local_to_world(&self, objects: &[Object]) -> Affine3A {
        match &self.geometry {
            Geometry::MeshInstance { base_object_index, reset_transform, .. } if !reset_transform => {
                self.local_to_world * objects[*base_object_index].local_to_world
            }
            _ => self.local_to_world,
        }
    }

    /// Transforms `ray` to local space (applying the motion-blur pretranslate
    /// per `Mesh::Hit`/`Sphere::Hit`), intersects, then promotes the hit back
    /// to world space.
    pub fn hit(&self, ray: &Ray, meshes: &[Mesh], objects: &[Object], epsilon: f32) -> Option<ObjectHit> {
        let wtl = self.effective_world_to_local(meshes, objects);
        let ltw = self.effective_local_to_world(objects);

        let offset = self.motion_blur * ray.time;
        let local_origin = wtl.transform_point3(ray.origin - offset);
        let local_dir = wtl.transform_vector3(ray.direction);
        let local_ray = Ray::with_time(local_origin, local_dir, ray.time);

        let local_hit = match &self.geometry {
            Geometry::Mesh { mesh_index } => meshes[*mesh_index].hit_local(&local_ray)?,
            Geometry::MeshInstance { base_mesh_index, .. } => meshes[*base_mesh_index].hit_local(&local_ray)?,
            Geometry::Triangle(face) => face.hit(&local_ray)?,
            Geometry::Sphere(sphere) => sphere.hit(&local_ray, epsilon)?,
        };

        let world_point = ltw.transform_point3(local_hit.point) + offset;
        let normal_matrix = Mat3::from(ltw.matrix3).inverse().transpose();
        let world_normal = (normal_matrix * local_hit.normal).normalize();
        let t = (world_point - ray.origin).length();

        Some(ObjectHit { t, point: world_point, normal: world_normal, u: local_hit.u, v: local_hit.v, tbn: local_hit.tbn })
    }

    pub fn hit_any(&self, ray: &Ray, max_t: f32, meshes: &[Mesh], objects: &[Object], epsilon: f32) -> bool {
        let wtl = self.effective_world_to_local(meshes, objects);
        let offset = self.motion_blur * ray.time;
        let local_origin = wtl.transform_point3(ray.origin - offset);
        let local_dir = wtl.transform_vector3(ray.direction);
        let local_ray = Ray::with_time(local_origin, local_dir, ray.time);

        match &self.geometry {
            Geometry::Mesh { mesh_index } => meshes[*mesh_index].hit_any_local(&local_ray, max_t),
            Geometry::MeshInstance { base_mesh_index, .. } => meshes[*base_mesh_index].hit_any_local(&local_ray, max_t),
            Geometry::Triangle(face) => face.hit(&local_ray).is_some_and(|h| h.t < max_t),
            Geometry::Sphere(sphere) => sphere.hit(&local_ray, epsilon).is_some_and(|h| h.t < max_t),
        }
    }
}

impl BvhPrimitive for Object {
    fn aabb(&self) -> Aabb {
        self.world_aabb
    }
}

/// Union of the transformed box at shutter-open (t=0) and shutter-close
/// (t=1), per the Open Question resolution recorded in DESIGN.md.
fn motion_blurred_world_aabb(local_aabb: Aabb, local_to_world: Affine3A, motion_blur: Vec3) -> Aabb {
    let at_t0 = local_aabb.apply_transform(local_to_world);
    if motion_blur == Vec3::ZERO {
        return at_t0;
    }
    let shifted = Aabb::new(at_t0.bounds[0] + motion_blur, at_t0.bounds[1] + motion_blur);
    at_t0.union(&shifted)
}

/// Builds a world-space triangle soup for area-light sampling (mesh lights),
/// expressed directly in world coordinates so `light.rs`'s free functions
/// stay decoupled from `Object`/`Mesh`.
pub fn world_triangles(object: &Object, meshes: &[Mesh], objects: &[Object]) -> Vec<(Vec3, Vec3, Vec3)> {
    let ltw = object.effective_local_to_world(objects);
    let faces: &[Face] = match &object.geometry {
        Geometry::Mesh { mesh_index } => &meshes[*mesh_index].faces,
        Geometry::MeshInstance { base_mesh_index, .. } => &meshes[*base_mesh_index].faces,
        Geometry::Triangle(face) => std::slice::from_ref(face),
        Geometry::Sphere(_) => return Vec::new(),
    };
    faces
        .iter()
        .map(|f| (ltw.transform_point3(f.v0), ltw.transform_point3(f.v1), ltw.transform_point3(f.v2)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn unit_sphere_object(meshes: &[Mesh]) -> Object {
        Object::new(
            1,
            0,
            Geometry::Sphere(Sphere { center: Vec3::ZERO, radius: 1.0 }),
            Affine3A::from_translation(Vec3::new(0.0, 0.0, 5.0)),
            Vec3::ZERO,
            None,
            None,
            None,
            None,
            meshes,
        )
    }

    #[test]
    fn stationary_sphere_hit_round_trips_through_transforms() {
        let meshes: Vec<Mesh> = Vec::new();
        let objects: Vec<Object> = Vec::new();
        let obj = unit_sphere_object(&meshes);
        let ray = Ray::new(Vec3::new(0.0, 0.0, -10.0), Vec3::Z);
        let hit = obj.hit(&ray, &meshes, &objects, 0.01).expect("should hit translated sphere");
        assert!((hit.point.z - 4.0).abs() < 1e-3);
    }

    #[test]
    fn motion_blurred_aabb_covers_both_endpoints() {
        let local = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let ltw = Affine3A::from_rotation_translation(Quat::IDENTITY, Vec3::ZERO);
        let motion = Vec3::new(10.0, 0.0, 0.0);
        let aabb = motion_blurred_world_aabb(local, ltw, motion);
        assert!(aabb.bounds[1].x >= 11.0 - 1e-4);
        assert!(aabb.bounds[0].x <= -1.0 + 1e-4);
    }
}
