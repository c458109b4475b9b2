// This file contains benchmarks for the purpose of guarding against
// performance regressions. To run them, use `cargo bench`.

use criterion::{criterion_group, criterion_main, Criterion};
use glam::{Affine3A, Vec2, Vec3};

use raywright::camera::{Camera, Handedness};
use raywright::light::PointLight;
use raywright::material::{Brdf, Material};
use raywright::object::{Geometry, Mesh, Object};
use raywright::primitive::Face;
use raywright::render::render_camera;
use raywright::scene::{LightKind, Scene};

fn grid_mesh(n: u32) -> Mesh {
    let mut faces = Vec::with_capacity((n * n * 2) as usize);
    let step = 20.0 / n as f32;
    for i in 0..n {
        for j in 0..n {
            let x0 = -10.0 + i as f32 * step;
            let z0 = -10.0 + j as f32 * step;
            let v00 = Vec3::new(x0, 0.0, z0);
            let v10 = Vec3::new(x0 + step, 0.0, z0);
            let v01 = Vec3::new(x0, 0.0, z0 + step);
            let v11 = Vec3::new(x0 + step, 0.0, z0 + step);
            faces.push(Face::new(v00, v10, v11, Vec2::ZERO, Vec2::ZERO, Vec2::ZERO));
            faces.push(Face::new(v00, v11, v01, Vec2::ZERO, Vec2::ZERO, Vec2::ZERO));
        }
    }
    Mesh::new(faces, false)
}

fn benchmark_scene(grid_resolution: u32, num_samples: u32) -> (Scene, Camera) {
    let mesh = grid_mesh(grid_resolution);
    let material = Material { diffuse: Vec3::new(0.6, 0.6, 0.6), brdf: Brdf::OriginalBlinnPhong { exponent: 8.0 }, ..Material::default() };
    let object = Object::new(1, 0, Geometry::Mesh { mesh_index: 0 }, Affine3A::IDENTITY, Vec3::ZERO, None, None, None, None, std::slice::from_ref(&mesh));

    let light = LightKind::Point(PointLight { position: Vec3::new(5.0, 8.0, 5.0), intensity: Vec3::splat(200.0) });

    let mut scene = Scene::new(Vec3::ZERO, None, 0.001, 0.001, 2, Vec3::splat(0.1), vec![material], Vec::new(), vec![mesh], vec![object], vec![light], Vec::new(), 2.2);
    scene.build_bvh();

    let camera = Camera::new(
        Vec3::new(0.0, 5.0, 15.0),
        Vec3::new(0.0, -0.3, -1.0),
        Vec3::Y,
        1.0,
        None,
        Some(60.0),
        (320, 240),
        "bench.png".to_string(),
        Handedness::Right,
        num_samples,
        0.0,
        0.0,
    )
    .unwrap();
    (scene, camera)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Performance regression tests");
    group.sample_size(10);

    group.bench_function("Grid mesh, 1 sample, 1 thread", |b| {
        let (scene, camera) = benchmark_scene(64, 1);
        b.iter(|| render_camera(&scene, &camera, 1, 0))
    });
    group.bench_function("Grid mesh, 16 samples, 1 thread", |b| {
        let (scene, camera) = benchmark_scene(64, 16);
        b.iter(|| render_camera(&scene, &camera, 1, 0))
    });
    group.bench_function("Grid mesh, 16 samples, 4 threads", |b| {
        let (scene, camera) = benchmark_scene(64, 16);
        b.iter(|| render_camera(&scene, &camera, 4, 0))
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
