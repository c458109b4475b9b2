//! End-to-end scenarios built directly from scene primitives rather than XML,
//! exercising the pieces spec.md §8's worked examples name: a lit sphere, a
//! mirror-plus-diffuse bounce, a motion-blurred streak, an area light's
//! penumbra widening with size, and BVH/brute-force equivalence over a real
//! mesh. Dielectric energy conservation and the sphere/triangle boundary
//! cases are covered by `util.rs`'s and `primitive.rs`'s own unit tests.

use glam::{Affine3A, Vec2, Vec3};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use raywright::camera::{Camera, Handedness};
use raywright::light::{AreaLight, PointLight};
use raywright::material::{Brdf, Material, MaterialType};
use raywright::object::{Geometry, Mesh, Object};
use raywright::primitive::{Face, Sphere};
use raywright::ray::Ray;
use raywright::scene::{LightKind, Scene};
use raywright::tracer::trace;

fn red_diffuse() -> Material {
    Material {
        diffuse: Vec3::new(1.0, 0.0, 0.0),
        brdf: Brdf::OriginalBlinnPhong { exponent: 1.0 },
        ..Material::default()
    }
}

/// Scenario 1: a unit sphere lit by a single point light directly behind the
/// camera; the hit normal and light direction coincide, so the shaded color
/// reduces to `kd * intensity / distance^2`. A ray passing well outside the
/// sphere's silhouette hits nothing and returns the (black) background.
#[test]
fn lit_sphere_center_vs_miss() {
    let sphere = Object::new(1, 0, Geometry::Sphere(Sphere { center: Vec3::ZERO, radius: 1.0 }), Affine3A::IDENTITY, Vec3::ZERO, None, None, None, None, &[]);

    let mut scene = Scene::new(
        Vec3::ZERO,
        None,
        0.001,
        0.001,
        1,
        Vec3::ZERO,
        vec![red_diffuse()],
        Vec::new(),
        Vec::new(),
        vec![sphere],
        vec![LightKind::Point(PointLight { position: Vec3::new(0.0, 0.0, 10.0), intensity: Vec3::splat(81.0) })],
        Vec::new(),
        2.2,
    );
    scene.build_bvh();

    let mut rng = Pcg32::seed_from_u64(1);

    // Central ray: hits the sphere's near pole, normal and light direction
    // both point toward +z, so teta = 1 and distance = 9.
    let central = Ray::new(Vec3::new(0.0, 0.0, 3.0), Vec3::NEG_Z);
    let color = trace(&central, &scene, scene.max_recursion_depth, (0.5, 0.5), &mut rng);
    assert!((color.x - 1.0).abs() < 1e-3, "expected near-unit red, got {color:?}");
    assert!(color.y.abs() < 1e-6 && color.z.abs() < 1e-6);

    // Rim ray: well outside the sphere's silhouette, misses entirely.
    let rim = Ray::new(Vec3::new(5.0, 0.0, 3.0), Vec3::NEG_Z);
    let miss = trace(&rim, &scene, scene.max_recursion_depth, (0.0, 0.0), &mut rng);
    assert_eq!(miss, Vec3::ZERO);
}

/// Scenario 2: a large mirror plane at y=0 under a red sphere. A 45-degree
/// ray reflects exactly through the sphere's center (red); a ray reflecting
/// off the plane to the other side escapes to the empty background (black),
/// since the plane's own reflectances are zero.
#[test]
fn mirror_plane_reflects_sphere_color() {
    let plane_face = Face::new(
        Vec3::new(-50.0, 0.0, -50.0),
        Vec3::new(50.0, 0.0, -50.0),
        Vec3::new(0.0, 0.0, 50.0),
        Vec2::ZERO,
        Vec2::ZERO,
        Vec2::ZERO,
    );
    let mirror = Material { mirror_reflectance: Vec3::ONE, kind: MaterialType::Mirror, ..Material::default() };

    let plane = Object::new(1, 0, Geometry::Triangle(plane_face), Affine3A::IDENTITY, Vec3::ZERO, None, None, None, None, &[]);
    let sphere = Object::new(2, 1, Geometry::Sphere(Sphere { center: Vec3::new(0.0, 1.0, -6.0), radius: 1.0 }), Affine3A::IDENTITY, Vec3::ZERO, None, None, None, None, &[]);

    let light = LightKind::Point(PointLight { position: Vec3::new(0.0, 3.0, -6.0), intensity: Vec3::splat(20.0) });

    let mut scene = Scene::new(
        Vec3::ZERO,
        None,
        0.001,
        0.001,
        4,
        Vec3::ZERO,
        vec![mirror, red_diffuse()],
        Vec::new(),
        Vec::new(),
        vec![plane, sphere],
        vec![light],
        Vec::new(),
        2.2,
    );
    scene.build_bvh();
    let mut rng = Pcg32::seed_from_u64(2);

    // Reflects through the sphere center along (0,1,-1)/sqrt2 after bouncing.
    let towards_sphere = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -1.0, -1.0).normalize());
    let hit_color = trace(&towards_sphere, &scene, scene.max_recursion_depth, (0.5, 0.5), &mut rng);
    assert!(hit_color.x > 0.1, "expected a red bounce, got {hit_color:?}");
    assert!(hit_color.y.abs() < 1e-6 && hit_color.z.abs() < 1e-6);

    // Reflects to the +z side, away from the sphere: escapes to background.
    let away_from_sphere = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -1.0, 1.0).normalize());
    let miss_color = trace(&away_from_sphere, &scene, scene.max_recursion_depth, (0.5, 0.5), &mut rng);
    assert_eq!(miss_color, Vec3::ZERO);
}

/// Scenario 5: a sphere moving along +x over the shutter interval. Rays at
/// `time=0` and `time=1` sample different world positions of the same
/// object, and the motion-blurred AABB the BVH indexes by must cover both.
#[test]
fn motion_blur_streaks_across_shutter_time() {
    let motion = Vec3::new(4.0, 0.0, 0.0);
    let obj = Object::new(1, 0, Geometry::Sphere(Sphere { center: Vec3::ZERO, radius: 0.5 }), Affine3A::IDENTITY, motion, None, None, None, None, &[]);

    // At time=0 the sphere sits at the origin; a straight-on ray hits it.
    let ray_t0 = Ray::with_time(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, 0.0);
    let hit_t0 = obj.hit(&ray_t0, &[], std::slice::from_ref(&obj), 0.01);
    assert!(hit_t0.is_some());

    // At time=1 the sphere has shifted 4 units along +x; the same ray now
    // misses it, but a ray aimed at the shifted position hits.
    let ray_t1_same_aim = Ray::with_time(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, 1.0);
    assert!(obj.hit(&ray_t1_same_aim, &[], std::slice::from_ref(&obj), 0.01).is_none());

    let ray_t1_shifted = Ray::with_time(Vec3::new(4.0, 0.0, -5.0), Vec3::Z, 1.0);
    assert!(obj.hit(&ray_t1_shifted, &[], std::slice::from_ref(&obj), 0.01).is_some());

    // BVH culling uses the precomputed world AABB: it must not cull a ray
    // aimed anywhere along the streak, at either endpoint.
    use raywright::bvh::BvhPrimitive;
    let aabb = obj.aabb();
    assert!(aabb.bounds[1].x >= 4.5 - 1e-4, "AABB must cover the t=1 endpoint: {aabb:?}");
    assert!(aabb.bounds[0].x <= -0.5 + 1e-4, "AABB must cover the t=0 endpoint: {aabb:?}");
}

/// Scenario 4: widening an area light's `size` should never shrink the set
/// of sampled directions that clear a fixed occluder directly above the
/// shaded point — the light's angular footprint as seen from that point
/// only grows.
#[test]
fn area_light_penumbra_widens_with_size() {
    let shaded_point = Vec3::new(0.0, 0.0, 0.0);
    let normal = Vec3::Y;
    let light_center = Vec3::new(0.3, 5.0, 0.0);

    let unoccluded_fraction = |size: f32, seed: u64| -> f32 {
        let light = AreaLight::new(light_center, Vec3::NEG_Y, Vec3::ONE, size);
        let mut rng = Pcg32::seed_from_u64(seed);
        let trials = 2000;
        let mut clear = 0;
        for _ in 0..trials {
            let sample = light.sample(shaded_point, &mut rng);
            // An occluder directly above the point blocks the direct path to
            // the light center but not necessarily its off-axis jitter.
            let blocks = sample.point.x.abs() < 0.5 && sample.dir.dot(normal) > 0.9;
            if !blocks {
                clear += 1;
            }
        }
        clear as f32 / trials as f32
    };

    let narrow = unoccluded_fraction(0.1, 7);
    let wide = unoccluded_fraction(4.0, 7);
    assert!(wide >= narrow, "wider area light should not reduce the unoccluded fraction: {narrow} vs {wide}");
}

/// Scenario 6: BVH traversal must agree with a brute-force scan over every
/// triangle in a real mesh, for a large batch of rays.
#[test]
fn bvh_matches_brute_force_over_mesh() {
    let mut faces = Vec::with_capacity(1000);
    let mut seed = 7u64;
    let mut next = || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((seed >> 33) as f32 / u32::MAX as f32) * 2.0 - 1.0
    };
    for _ in 0..1000 {
        let center = Vec3::new(next() * 20.0, next() * 20.0, next() * 20.0);
        let v0 = center + Vec3::new(next() * 0.3, next() * 0.3, 0.0);
        let v1 = center + Vec3::new(next() * 0.3, next() * 0.3, 0.0);
        let v2 = center + Vec3::new(next() * 0.3, next() * 0.3, 0.0);
        faces.push(Face::new(v0, v1, v2, Vec2::ZERO, Vec2::ZERO, Vec2::ZERO));
    }

    let mesh = Mesh::new(faces.clone(), false);
    let obj = Object::new(1, 0, Geometry::Mesh { mesh_index: 0 }, Affine3A::IDENTITY, Vec3::ZERO, None, None, None, None, std::slice::from_ref(&mesh));
    let meshes = [mesh];
    let objects = [obj];

    for i in 0..10_000usize {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let ox = ((seed >> 33) as f32 / u32::MAX as f32) * 40.0 - 20.0;
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let oy = ((seed >> 33) as f32 / u32::MAX as f32) * 40.0 - 20.0;
        let ray = Ray::new(Vec3::new(ox, oy, -30.0), Vec3::Z);

        let bvh_hit = objects[0].hit(&ray, &meshes, &objects, 0.001);
        let brute = faces.iter().filter_map(|f| f.hit(&ray)).min_by(|a, b| a.t.partial_cmp(&b.t).unwrap());

        match (bvh_hit, brute) {
            (Some(a), Some(b)) => assert!((a.t - b.t).abs() < 1e-3, "ray {i}: t mismatch {} vs {}", a.t, b.t),
            (None, None) => {}
            (a, b) => panic!("ray {i}: BVH/brute-force disagree: {:?} vs {:?}", a.map(|x| x.t), b.map(|x| x.t)),
        }
    }
}

/// Rendering is repeatable at a fixed seed and thread count 1: two identical
/// stratified samples at the same pixel, seeded the same way, must agree.
#[test]
fn camera_ray_is_deterministic_at_fixed_seed() {
    let cam = Camera::new(
        Vec3::new(0.0, 0.0, 5.0),
        Vec3::NEG_Z,
        Vec3::Y,
        1.0,
        None,
        Some(60.0),
        (32, 32),
        "out.png".to_string(),
        Handedness::Right,
        1,
        0.0,
        0.0,
    )
    .unwrap();
    let mut a = Pcg32::seed_from_u64(99);
    let mut b = Pcg32::seed_from_u64(99);
    let rays_a = cam.get_rays(16, 16, &mut a);
    let rays_b = cam.get_rays(16, 16, &mut b);
    assert_eq!(rays_a.len(), rays_b.len());
    assert_eq!(rays_a[0].origin, rays_b[0].origin);
    assert_eq!(rays_a[0].direction, rays_b[0].direction);
}
