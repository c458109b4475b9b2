//! XML scene loader. Ported from `Scene::Scene`'s constructor order
//! (background → epsilons → cameras → images → BRDFs → lights → materials →
//! vertex/UV data → objects → transformations → texture maps) and
//! `Object::Load`'s deferred transform-string composition: objects are first
//! parsed into `ObjectSpec`s holding raw ids, then resolved once the
//! `Transformations` and `Textures` blocks have been read, mirroring the
//! source's two-pass `Scene()` constructor + `Scene::Load()` split.

use std::collections::HashMap;

use glam::{Affine3A, Vec2, Vec3};
use roxmltree::{Document, Node};

use crate::camera::{Camera, Handedness, NearPlane};
use crate::error::{ConfigError, InvariantError, RenderError, ResourceError, Result};
use crate::light::{AreaLight, DirectionalLight, EnvironmentLight, PointLight, SpotLight};
use crate::material::{Brdf, Material, MaterialType};
use crate::object::{world_triangles, Geometry, Mesh, Object};
use crate::primitive::{Face, Sphere};
use crate::ply;
use crate::scene::{LightKind, Scene};
use crate::texture::{
    CheckerBoard, DecalMode, Image, ImageSample, Interpolation, NoiseConversion, Perlin, Sampler, Texture, TextureRole, Voronoi,
};
use crate::tonemap::{Gamma as TmGamma, ToneMapper};

/// A camera plus the tone mapper its `Tonemap` block selected, if any.
pub struct LoadedCamera {
    pub camera: Camera,
    pub tone_mapper: Option<ToneMapper>,
}

pub struct LoadedScene {
    pub scene: Scene,
    pub cameras: Vec<LoadedCamera>,
}

// --- small XML helpers -------------------------------------------------

fn child<'a, 'b>(node: Node<'a, 'b>, name: &str) -> Option<Node<'a, 'b>> {
    node.children().find(|c| c.is_element() && c.tag_name().name() == name)
}

fn children_named<'a, 'b>(node: Node<'a, 'b>, name: &'b str) -> impl Iterator<Item = Node<'a, 'b>> {
    node.children().filter(move |c| c.is_element() && c.tag_name().name() == name)
}

fn element_children<'a, 'b>(node: Node<'a, 'b>) -> impl Iterator<Item = Node<'a, 'b>> {
    node.children().filter(|c| c.is_element())
}

fn text_of(node: Node) -> &str {
    node.text().unwrap_or("").trim()
}

fn parse_floats(s: &str) -> Vec<f32> {
    s.split_whitespace().filter_map(|t| t.parse().ok()).collect()
}

fn parse_ints(s: &str) -> Vec<i64> {
    s.split_whitespace().filter_map(|t| t.parse().ok()).collect()
}

fn vec3_child(node: Node, name: &str) -> Vec3 {
    let Some(c) = child(node, name) else { return Vec3::ZERO };
    let v = parse_floats(text_of(c));
    Vec3::new(*v.first().unwrap_or(&0.0), *v.get(1).unwrap_or(&0.0), *v.get(2).unwrap_or(&0.0))
}

/// Missing `name` child keeps `default`; a present-but-unparseable one is a
/// fatal `NumericParse`, and a parsed non-finite value (scene text can spell
/// `NaN`/`inf`, which `f32::parse` accepts) is a fatal `NonFinite`.
fn f32_child(node: Node, name: &str, default: f32) -> Result<f32> {
    let Some(c) = child(node, name) else { return Ok(default) };
    let text = text_of(c);
    let value: f32 = text
        .parse()
        .map_err(|_| ConfigError::NumericParse { element: node.tag_name().name().to_string(), field: name.to_string(), text: text.to_string() })?;
    if !value.is_finite() {
        return Err(InvariantError::NonFinite { context: "scene XML numeric field" }.into());
    }
    Ok(value)
}

fn i64_child(node: Node, name: &str, default: i64) -> Result<i64> {
    let Some(c) = child(node, name) else { return Ok(default) };
    let text = text_of(c);
    let value = text
        .parse()
        .map_err(|_| ConfigError::NumericParse { element: node.tag_name().name().to_string(), field: name.to_string(), text: text.to_string() })?;
    Ok(value)
}

fn bool_attr(node: Node, name: &str, default: bool) -> bool {
    node.attribute(name).map(|s| s == "true" || s == "1").unwrap_or(default)
}

fn i64_attr(node: Node, name: &str, default: i64) -> Result<i64> {
    let Some(text) = node.attribute(name) else { return Ok(default) };
    let value = text
        .parse()
        .map_err(|_| ConfigError::NumericParse { element: node.tag_name().name().to_string(), field: name.to_string(), text: text.to_string() })?;
    Ok(value)
}

// --- top-level entry point ---------------------------------------------

pub fn load_scene(path: &str) -> Result<LoadedScene> {
    let xml = std::fs::read_to_string(path).map_err(|e| ConfigError::Io { path: path.to_string(), source: e })?;
    let doc = Document::parse(&xml).map_err(ConfigError::Xml)?;
    let root = doc.root_element();
    let base_dir = std::path::Path::new(path).parent().unwrap_or_else(|| std::path::Path::new("."));

    let background_color = vec3_child(root, "BackgroundColor");
    let shadow_ray_epsilon = f32_child(root, "ShadowRayEpsilon", 0.0)?;
    let max_recursion_depth = i64_child(root, "MaxRecursionDepth", 0)? as i32;
    let intersection_test_epsilon = f32_child(root, "IntersectionTestEpsilon", 0.01)?;
    let gamma = f32_child(root, "Gamma", 2.2)?;

    let cameras_raw = load_cameras(root)?;

    let images = load_images(root, base_dir)?;

    let brdfs = load_brdfs(root)?;

    let (ambient_intensity, light_specs) = load_light_specs(root)?;

    let materials = load_materials(root, &brdfs)?;

    let vertex_data = parse_floats(child(root, "VertexData").map(text_of).unwrap_or(""))
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]))
        .collect::<Vec<_>>();
    let uv_data = parse_floats(child(root, "TexCoordData").map(text_of).unwrap_or(""))
        .chunks_exact(2)
        .map(|c| Vec2::new(c[0], c[1]))
        .collect::<Vec<_>>();

    let object_specs = load_object_specs(root, base_dir)?;

    let transforms = load_transformations(root);

    let (textures, background_texture, texture_id_map) = load_textures(root)?;

    let mut meshes: Vec<Mesh> = Vec::new();
    let mut mesh_index_by_object: HashMap<i32, usize> = HashMap::new();
    let mut objects: Vec<Object> = Vec::new();
    let mut object_index_by_id: HashMap<i32, usize> = HashMap::new();
    let mut lights: Vec<LightKind> = Vec::new();

    // Resolve AmbientLight + simple light kinds first; sphere/mesh lights are
    // resolved alongside their owning objects below, matching the source's
    // `Objects.push_back(ls); Lights.push_back(ls);` pairing.
    for spec in light_specs {
        lights.push(spec);
    }

    for spec in &object_specs {
        let local_to_world = resolve_transform(&spec.transform_tokens, &transforms);
        let (diffuse_texture, normal_texture, bump_texture) = resolve_texture_bindings(spec.tex_ids, &textures, &texture_id_map);
        let material_id = (spec.material_id - 1).max(0) as usize;

        match &spec.kind {
            ObjectKind::Mesh { faces, smooth } => {
                let mesh = Mesh::new(faces.clone(), *smooth);
                meshes.push(mesh);
                let mesh_index = meshes.len() - 1;
                mesh_index_by_object.insert(spec.id, mesh_index);
                let obj = Object::new(
                    spec.id,
                    material_id,
                    Geometry::Mesh { mesh_index },
                    local_to_world,
                    spec.motion_blur,
                    diffuse_texture,
                    normal_texture,
                    bump_texture,
                    None,
                    &meshes,
                );
                object_index_by_id.insert(spec.id, objects.len());
                objects.push(obj);
            }
            ObjectKind::LightMesh { faces, smooth, radiance } => {
                let mesh = Mesh::new(faces.clone(), *smooth);
                meshes.push(mesh);
                let mesh_index = meshes.len() - 1;
                mesh_index_by_object.insert(spec.id, mesh_index);
                let light_id = lights.len();
                let obj = Object::new(
                    spec.id,
                    material_id,
                    Geometry::Mesh { mesh_index },
                    local_to_world,
                    spec.motion_blur,
                    diffuse_texture,
                    normal_texture,
                    bump_texture,
                    Some(light_id),
                    &meshes,
                );
                let object_index = objects.len();
                object_index_by_id.insert(spec.id, object_index);
                let triangles = world_triangles(&obj, &meshes, &objects);
                let (cumulative_areas, total_area) = triangle_areas(&triangles);
                objects.push(obj);
                lights.push(LightKind::Mesh { object_index, radiance: *radiance, triangles, cumulative_areas, total_area });
            }
            ObjectKind::Triangle { indices } => {
                let face = build_face(*indices, &vertex_data, &uv_data, 0, 0);
                let obj = Object::new(
                    spec.id,
                    material_id,
                    Geometry::Triangle(face),
                    local_to_world,
                    spec.motion_blur,
                    diffuse_texture,
                    normal_texture,
                    bump_texture,
                    None,
                    &meshes,
                );
                object_index_by_id.insert(spec.id, objects.len());
                objects.push(obj);
            }
            ObjectKind::Sphere { center_id, radius } => {
                let center = vertex_data.get((*center_id - 1) as usize).copied().unwrap_or(Vec3::ZERO);
                let sphere = Sphere { center, radius: *radius };
                let obj = Object::new(
                    spec.id,
                    material_id,
                    Geometry::Sphere(sphere),
                    local_to_world,
                    spec.motion_blur,
                    diffuse_texture,
                    normal_texture,
                    bump_texture,
                    None,
                    &meshes,
                );
                object_index_by_id.insert(spec.id, objects.len());
                objects.push(obj);
            }
            ObjectKind::LightSphere { center_id, radius, radiance } => {
                let center = vertex_data.get((*center_id - 1) as usize).copied().unwrap_or(Vec3::ZERO);
                let sphere = Sphere { center, radius: *radius };
                let light_id = lights.len();
                let obj = Object::new(
                    spec.id,
                    material_id,
                    Geometry::Sphere(sphere),
                    local_to_world,
                    spec.motion_blur,
                    diffuse_texture,
                    normal_texture,
                    bump_texture,
                    Some(light_id),
                    &meshes,
                );
                let object_index = objects.len();
                object_index_by_id.insert(spec.id, object_index);
                objects.push(obj);
                lights.push(LightKind::Sphere { object_index, radiance: *radiance });
            }
            ObjectKind::MeshInstance { base_mesh_id, reset_transform } => {
                // Deferred: base object/mesh indices are resolved in a second
                // pass below once every non-instance object exists.
                let _ = (base_mesh_id, reset_transform);
            }
        }
    }

    // Second pass: MeshInstances, resolved after every Mesh/LightMesh they
    // might reference has been built (source: instances always name an
    // already-declared base mesh, but order in the XML isn't guaranteed here).
    for spec in &object_specs {
        if let ObjectKind::MeshInstance { base_mesh_id, reset_transform } = &spec.kind {
            let local_to_world = resolve_transform(&spec.transform_tokens, &transforms);
            let (diffuse_texture, normal_texture, bump_texture) =
                resolve_texture_bindings(spec.tex_ids, &textures, &texture_id_map);
            let material_id = (spec.material_id - 1).max(0) as usize;
            let base_mesh_index = *mesh_index_by_object.get(base_mesh_id).ok_or_else(|| {
                RenderError::Config(ConfigError::DanglingReference { element: "MeshInstance".into(), id: *base_mesh_id as i64 })
            })?;
            let base_object_index = *object_index_by_id.get(base_mesh_id).ok_or_else(|| {
                RenderError::Config(ConfigError::DanglingReference { element: "MeshInstance".into(), id: *base_mesh_id as i64 })
            })?;
            let obj = Object::new(
                spec.id,
                material_id,
                Geometry::MeshInstance { base_mesh_index, base_object_index, reset_transform: *reset_transform },
                local_to_world,
                spec.motion_blur,
                diffuse_texture,
                normal_texture,
                bump_texture,
                None,
                &meshes,
            );
            object_index_by_id.insert(spec.id, objects.len());
            objects.push(obj);
        }
    }

    let mut scene = Scene::new(
        background_color,
        background_texture,
        shadow_ray_epsilon,
        intersection_test_epsilon,
        max_recursion_depth,
        ambient_intensity,
        materials,
        images,
        meshes,
        objects,
        lights,
        textures,
        gamma,
    );
    scene.build_bvh();

    let cameras = cameras_raw.into_iter().map(|(camera, tone_mapper)| LoadedCamera { camera, tone_mapper }).collect();

    Ok(LoadedScene { scene, cameras })
}

fn triangle_areas(triangles: &[(Vec3, Vec3, Vec3)]) -> (Vec<f32>, f32) {
    let mut cumulative = Vec::with_capacity(triangles.len());
    let mut total = 0.0f32;
    for (v0, v1, v2) in triangles {
        total += 0.5 * (*v1 - *v0).cross(*v2 - *v0).length();
        cumulative.push(total);
    }
    (cumulative, total)
}

fn build_face(indices: (i64, i64, i64), vertices: &[Vec3], uvs: &[Vec2], vertex_offset: i64, uv_offset: i64) -> Face {
    let v0 = vertices.get((indices.0 - 1 + vertex_offset) as usize).copied().unwrap_or(Vec3::ZERO);
    let v1 = vertices.get((indices.1 - 1 + vertex_offset) as usize).copied().unwrap_or(Vec3::ZERO);
    let v2 = vertices.get((indices.2 - 1 + vertex_offset) as usize).copied().unwrap_or(Vec3::ZERO);
    let in_range = |i: i64| (i - 1 + uv_offset) >= 0 && ((i - 1 + uv_offset) as usize) < uvs.len();
    let (uv0, uv1, uv2) = if in_range(indices.0) && in_range(indices.1) && in_range(indices.2) {
        (
            uvs[(indices.0 - 1 + uv_offset) as usize],
            uvs[(indices.1 - 1 + uv_offset) as usize],
            uvs[(indices.2 - 1 + uv_offset) as usize],
        )
    } else {
        (Vec2::ZERO, Vec2::ZERO, Vec2::ZERO)
    };
    Face::new(v0, v1, v2, uv0, uv1, uv2)
}

// --- cameras -------------------------------------------------------------

fn load_cameras(root: Node) -> Result<Vec<(Camera, Option<ToneMapper>)>> {
    let Some(cameras_node) = child(root, "Cameras") else { return Ok(Vec::new()) };
    let mut out = Vec::new();
    for cam in element_children(cameras_node) {
        let position = vec3_child(cam, "Position");
        let up = vec3_child(cam, "Up");
        let near_distance = f32_child(cam, "NearDistance", 1.0)?;
        let image_resolution = {
            let v = parse_ints(child(cam, "ImageResolution").map(text_of).unwrap_or("1 1"));
            (*v.first().unwrap_or(&1) as u32, *v.get(1).unwrap_or(&1) as u32)
        };
        let image_name = child(cam, "ImageName").map(text_of).unwrap_or("out.png").to_string();
        let num_samples = i64_child(cam, "NumSamples", 1)? as u32;
        let focus_distance = f32_child(cam, "FocusDistance", 0.0)?;
        let aperture_size = f32_child(cam, "ApertureSize", 0.0)?;
        let handedness = if cam.attribute("handedness") == Some("left") { Handedness::Left } else { Handedness::Right };

        let is_look_at = cam.attribute("type") == Some("lookAt");
        let gaze = if is_look_at {
            child(cam, "GazePoint").map(|_| vec3_child(cam, "GazePoint") - position).unwrap_or_else(|| vec3_child(cam, "Gaze"))
        } else {
            vec3_child(cam, "Gaze")
        };
        let fov_y = child(cam, "FovY").map(|c| text_of(c).parse().unwrap_or(90.0));
        let near_plane = if is_look_at && fov_y.is_some() {
            None
        } else {
            child(cam, "NearPlane").map(|n| {
                let v = parse_floats(text_of(n));
                NearPlane {
                    left: *v.first().unwrap_or(&-1.0),
                    right: *v.get(1).unwrap_or(&1.0),
                    bottom: *v.get(2).unwrap_or(&-1.0),
                    top: *v.get(3).unwrap_or(&1.0),
                }
            })
        };

        let camera = Camera::new(
            position, gaze, up, near_distance, near_plane, fov_y, image_resolution, image_name, handedness, num_samples,
            focus_distance, aperture_size,
        )?;

        let tone_mapper = child(cam, "Tonemap").map(parse_tonemap).transpose()?;
        out.push((camera, tone_mapper));
    }
    Ok(out)
}

fn parse_tonemap(node: Node) -> Result<ToneMapper> {
    let kind = node.attribute("type").unwrap_or("photographic");
    let gamma_text = child(node, "Gamma").map(text_of).unwrap_or("2.2");
    let gamma_val = gamma_text.parse().unwrap_or(2.2);
    let gamma = if gamma_text.eq_ignore_ascii_case("srgb") { TmGamma::Srgb } else { TmGamma::Value(gamma_val) };
    let tmo = parse_floats(child(node, "TMOOptions").map(text_of).unwrap_or("0.18 0"));
    Ok(match kind {
        "filmic" => ToneMapper::Filmic {
            exposure_bias: *tmo.first().unwrap_or(&1.0),
            white_point: *tmo.get(1).unwrap_or(&11.2),
            gamma: gamma_val,
        },
        "aces" => ToneMapper::Aces { exposure_bias: *tmo.first().unwrap_or(&1.0), gamma: gamma_val },
        _ => ToneMapper::Photographic {
            key_value: *tmo.first().unwrap_or(&0.18),
            burn_percent: *tmo.get(1).unwrap_or(&0.0),
            saturation: f32_child(node, "Saturation", 1.0)?,
            gamma,
        },
    })
}

// --- images / BRDFs -------------------------------------------------------

fn load_images(root: Node, base_dir: &std::path::Path) -> Result<Vec<Image>> {
    let Some(images_node) = child(root, "Textures").and_then(|t| child(t, "Images")) else { return Ok(Vec::new()) };
    let mut out = Vec::new();
    for img in element_children(images_node) {
        let rel = text_of(img);
        let path = base_dir.join(rel);
        let dynamic = image::open(&path).map_err(|e| ResourceError::Image { path: path.display().to_string(), source: e })?;
        out.push(Image::from_dynamic(&dynamic));
    }
    Ok(out)
}

fn load_brdfs(root: Node) -> Result<Vec<Brdf>> {
    let Some(brdfs_node) = child(root, "BRDFs") else { return Ok(Vec::new()) };
    let mut out = Vec::new();
    for node in element_children(brdfs_node) {
        let exponent = f32_child(node, "Exponent", 1.0)?;
        let tag = node.tag_name().name();
        let brdf = match tag {
            "OriginalPhong" => Brdf::OriginalPhong { exponent },
            "ModifiedPhong" => Brdf::ModifiedPhong { exponent, normalized: bool_attr(node, "normalized", false) },
            "OriginalBlinnPhong" => Brdf::OriginalBlinnPhong { exponent },
            "ModifiedBlinnPhong" => Brdf::ModifiedBlinnPhong { exponent, normalized: bool_attr(node, "normalized", false) },
            "TorranceSparrow" => Brdf::TorranceSparrow { exponent, kdfresnel: bool_attr(node, "kdfresnel", false), n: 1.0, k: 0.0 },
            other => {
                return Err(ConfigError::UnknownEnumValue { element: "BRDFs".to_string(), attribute: "tag".to_string(), value: other.to_string() }.into())
            }
        };
        out.push(brdf);
    }
    Ok(out)
}

// --- lights ----------------------------------------------------------------

fn load_light_specs(root: Node) -> Result<(Vec3, Vec<LightKind>)> {
    let Some(lights_node) = child(root, "Lights") else { return Ok((Vec3::ZERO, Vec::new())) };
    let ambient = child(lights_node, "AmbientLight").map(vec3_of_node).unwrap_or(Vec3::ZERO);

    let mut out = Vec::new();
    for node in children_named(lights_node, "PointLight") {
        out.push(LightKind::Point(PointLight { position: vec3_child(node, "Position"), intensity: vec3_child(node, "Intensity") }));
    }
    for node in children_named(lights_node, "AreaLight") {
        out.push(LightKind::Area(AreaLight::new(
            vec3_child(node, "Position"),
            vec3_child(node, "Normal"),
            vec3_child(node, "Radiance"),
            f32_child(node, "Size", 1.0)?,
        )));
    }
    for node in children_named(lights_node, "DirectionalLight") {
        out.push(LightKind::Directional(DirectionalLight {
            direction: vec3_child(node, "Direction").normalize(),
            radiance: vec3_child(node, "Radiance"),
        }));
    }
    for node in children_named(lights_node, "SpotLight") {
        out.push(LightKind::Spot(SpotLight {
            position: vec3_child(node, "Position"),
            direction: vec3_child(node, "Direction").normalize(),
            intensity: vec3_child(node, "Intensity"),
            coverage_angle: f32_child(node, "CoverageAngle", 1.0)?,
            falloff_angle: f32_child(node, "FalloffAngle", 1.0)?,
        }));
    }
    for node in children_named(lights_node, "SphericalDirectionalLight") {
        let image_index = i64_child(node, "ImageId", 0)? as usize;
        out.push(LightKind::Environment(EnvironmentLight { image_index }));
    }
    Ok((ambient, out))
}

fn vec3_of_node(node: Node) -> Vec3 {
    let v = parse_floats(text_of(node));
    Vec3::new(*v.first().unwrap_or(&0.0), *v.get(1).unwrap_or(&0.0), *v.get(2).unwrap_or(&0.0))
}

// --- materials ---------------------------------------------------------

fn load_materials(root: Node, brdfs: &[Brdf]) -> Result<Vec<Material>> {
    let Some(materials_node) = child(root, "Materials") else { return Ok(Vec::new()) };
    let mut out = Vec::new();
    for node in element_children(materials_node) {
        let kind = match node.attribute("type") {
            Some("conductor") => MaterialType::Conductor,
            Some("dielectric") => MaterialType::Dielectric,
            Some("mirror") => MaterialType::Mirror,
            Some("default") | None => MaterialType::Default,
            Some(other) => {
                return Err(ConfigError::UnknownEnumValue { element: "Material".to_string(), attribute: "type".to_string(), value: other.to_string() }.into())
            }
        };
        let refraction_index = f32_child(node, "RefractionIndex", 1.0)?;
        let absorption_index = f32_child(node, "AbsorptionIndex", 0.0)?;
        let phong_exponent = f32_child(node, "PhongExponent", 1.0)?;

        // `Brdf->n = RefractionIndex; Brdf->k = AbsorptionIndex;` in the
        // source happens unconditionally after BRDF resolution, whether the
        // material referenced a shared BRDF or fell back to a default one.
        let mut brdf = match node.attribute("BRDF").and_then(|s| s.parse::<usize>().ok()) {
            Some(id) => brdfs.get(id).copied().unwrap_or(Brdf::OriginalBlinnPhong { exponent: phong_exponent }),
            None => Brdf::OriginalBlinnPhong { exponent: phong_exponent },
        };
        if let Brdf::TorranceSparrow { n, k, .. } = &mut brdf {
            *n = refraction_index;
            *k = absorption_index;
        }

        out.push(Material {
            ambient: vec3_child(node, "AmbientReflectance"),
            diffuse: vec3_child(node, "DiffuseReflectance"),
            specular: vec3_child(node, "SpecularReflectance"),
            phong_exponent,
            mirror_reflectance: vec3_child(node, "MirrorReflectance"),
            refraction_index,
            absorption_index,
            absorption_coefficient: vec3_child(node, "AbsorptionCoefficient"),
            roughness: f32_child(node, "Roughness", 0.0)?,
            kind,
            brdf,
            degamma: bool_attr(node, "degamma", false),
        });
    }
    Ok(out)
}

// --- transformations -----------------------------------------------------

struct Transforms {
    translations: Vec<Affine3A>,
    rotations: Vec<Affine3A>,
    scalings: Vec<Affine3A>,
    composite: Vec<Affine3A>,
}

fn load_transformations(root: Node) -> Transforms {
    let mut t = Transforms { translations: Vec::new(), rotations: Vec::new(), scalings: Vec::new(), composite: Vec::new() };
    let Some(node) = child(root, "Transformations") else { return t };
    for c in element_children(node) {
        match c.tag_name().name() {
            "Translation" => {
                let v = parse_floats(text_of(c));
                t.translations.push(Affine3A::from_translation(Vec3::new(*v.first().unwrap_or(&0.0), *v.get(1).unwrap_or(&0.0), *v.get(2).unwrap_or(&0.0))));
            }
            "Scaling" => {
                let v = parse_floats(text_of(c));
                t.scalings.push(Affine3A::from_scale(Vec3::new(*v.first().unwrap_or(&1.0), *v.get(1).unwrap_or(&1.0), *v.get(2).unwrap_or(&1.0))));
            }
            "Rotation" => {
                let v = parse_floats(text_of(c));
                let angle = v.first().copied().unwrap_or(0.0).to_radians();
                let axis = Vec3::new(*v.get(1).unwrap_or(&0.0), *v.get(2).unwrap_or(&0.0), *v.get(3).unwrap_or(&1.0)).normalize_or_zero();
                t.rotations.push(Affine3A::from_axis_angle(if axis == Vec3::ZERO { Vec3::Y } else { axis }, angle));
            }
            "Composite" => {
                let v = parse_floats(text_of(c));
                if v.len() >= 16 {
                    let m = glam::Mat4::from_cols_array(&[
                        v[0], v[4], v[8], v[12], v[1], v[5], v[9], v[13], v[2], v[6], v[10], v[14], v[3], v[7], v[11], v[15],
                    ]);
                    t.composite.push(Affine3A::from_mat4(m));
                }
            }
            _ => {}
        }
    }
    t
}

/// Walks a `"t1 s2 r3"`-style transform string, composing transforms in
/// document order as `token * accumulated` — matches `Object::Load`'s
/// `LocalToWorld = scene.Translations[id - 1] * LocalToWorld;` loop.
fn resolve_transform(tokens: &str, transforms: &Transforms) -> Affine3A {
    let mut ltw = Affine3A::IDENTITY;
    let mut it = tokens.split_whitespace().peekable();
    while let Some(tok) = it.next() {
        let (kind, id) = tok.split_at(1);
        let Ok(id) = id.parse::<usize>() else { continue };
        if id == 0 {
            continue;
        }
        let idx = id - 1;
        ltw = match kind {
            "t" => transforms.translations.get(idx).copied().unwrap_or(Affine3A::IDENTITY) * ltw,
            "s" => transforms.scalings.get(idx).copied().unwrap_or(Affine3A::IDENTITY) * ltw,
            "r" => transforms.rotations.get(idx).copied().unwrap_or(Affine3A::IDENTITY) * ltw,
            "c" => transforms.composite.get(idx).copied().unwrap_or(Affine3A::IDENTITY),
            _ => ltw,
        };
    }
    ltw
}

// --- textures ------------------------------------------------------------

/// Parses the late `Textures/TextureMap` block (source: `Scene::Scene`
/// parses these after `Objects`). Returns the texture arena alongside a
/// `HashMap` from the XML `id` attribute to that arena index, since ids are
/// sparse/assigned by the scene author rather than by document order.
fn load_textures(root: Node) -> Result<(Vec<Texture>, Option<Texture>, HashMap<i64, usize>)> {
    let Some(textures_node) = child(root, "Textures") else { return Ok((Vec::new(), None, HashMap::new())) };
    let mut by_xml_id: HashMap<i64, usize> = HashMap::new();
    let mut out: Vec<Texture> = Vec::new();
    let mut background = None;

    for node in children_named(textures_node, "TextureMap") {
        let decal_text = child(node, "DecalMode").map(text_of).unwrap_or("");
        let sampler = build_sampler(node)?;
        let id = i64_attr(node, "id", 0)?;

        match decal_text {
            "replace_background" => {
                background = Some(Texture { sampler, role: TextureRole::Background });
            }
            "replace_normal" => {
                out.push(Texture { sampler, role: TextureRole::Normal });
                by_xml_id.insert(id, out.len() - 1);
            }
            "bump_normal" => {
                let factor = f32_child(node, "BumpFactor", 1.0)?;
                out.push(Texture { sampler, role: TextureRole::Bump { factor } });
                by_xml_id.insert(id, out.len() - 1);
            }
            "blend_kd" => {
                out.push(Texture { sampler, role: TextureRole::Diffuse { decal: DecalMode::BlendKd } });
                by_xml_id.insert(id, out.len() - 1);
            }
            "replace_all" => {
                out.push(Texture { sampler, role: TextureRole::Diffuse { decal: DecalMode::ReplaceAll } });
                by_xml_id.insert(id, out.len() - 1);
            }
            "replace_kd" => {
                out.push(Texture { sampler, role: TextureRole::Diffuse { decal: DecalMode::ReplaceKd } });
                by_xml_id.insert(id, out.len() - 1);
            }
            other => {
                return Err(ConfigError::UnknownEnumValue { element: "TextureMap".to_string(), attribute: "DecalMode".to_string(), value: other.to_string() }.into())
            }
        }
    }

    Ok((out, background, by_xml_id))
}

fn build_sampler(node: Node) -> Result<Sampler> {
    Ok(match node.attribute("type").unwrap_or("image") {
        "perlin" => {
            let conversion = if child(node, "NoiseConversion").map(text_of) == Some("absval") { NoiseConversion::AbsVal } else { NoiseConversion::Linear };
            Sampler::Perlin(Perlin::new(conversion, f32_child(node, "NoiseScale", 1.0)?))
        }
        "checkerboard" => Sampler::CheckerBoard(CheckerBoard {
            black: vec3_child(node, "BlackColor"),
            white: vec3_child(node, "WhiteColor"),
            scale: f32_child(node, "Scale", 1.0)?,
            offset: f32_child(node, "Offset", 0.0)?,
        }),
        "voronoi" => Sampler::Voronoi(Voronoi { size: f32_child(node, "Size", 1.0)? }),
        "image" => Sampler::Image(ImageSample {
            image_index: i64_child(node, "ImageId", 0)? as usize,
            interpolation: if child(node, "Interpolation").map(text_of) == Some("bilinear") { Interpolation::Bilinear } else { Interpolation::Nearest },
            normalizer: f32_child(node, "Normalizer", 255.0)?,
        }),
        other => {
            return Err(ConfigError::UnknownEnumValue { element: "TextureMap".to_string(), attribute: "type".to_string(), value: other.to_string() }.into())
        }
    })
}

/// Resolves an object's `Textures "id1 id2"` attribute pair into diffuse/
/// normal/bump bindings by looking up each nonzero id's arena role, matching
/// `Object::Load`'s `dynamic_cast` cascade over `_texIds`.
fn resolve_texture_bindings(
    tex_ids: (i64, i64),
    textures: &[Texture],
    texture_id_map: &HashMap<i64, usize>,
) -> (Option<usize>, Option<usize>, Option<usize>) {
    let mut diffuse = None;
    let mut normal = None;
    let mut bump = None;
    for id in [tex_ids.0, tex_ids.1] {
        if id == 0 {
            continue;
        }
        let Some(&idx) = texture_id_map.get(&id) else { continue };
        let Some(tex) = textures.get(idx) else { continue };
        match tex.role {
            TextureRole::Diffuse { .. } => diffuse = diffuse.or(Some(idx)),
            TextureRole::Normal => normal = normal.or(Some(idx)),
            TextureRole::Bump { .. } => bump = bump.or(Some(idx)),
            TextureRole::Background => {}
        }
    }
    (diffuse, normal, bump)
}

// --- objects ---------------------------------------------------------------

enum ObjectKind {
    Mesh { faces: Vec<Face>, smooth: bool },
    LightMesh { faces: Vec<Face>, smooth: bool, radiance: Vec3 },
    MeshInstance { base_mesh_id: i32, reset_transform: bool },
    Triangle { indices: (i64, i64, i64) },
    Sphere { center_id: i64, radius: f32 },
    LightSphere { center_id: i64, radius: f32, radiance: Vec3 },
}

struct ObjectSpec {
    id: i32,
    material_id: i64,
    transform_tokens: String,
    motion_blur: Vec3,
    tex_ids: (i64, i64),
    kind: ObjectKind,
}

fn parse_common(node: Node) -> Result<(i32, i64, String, Vec3, (i64, i64))> {
    let id = i64_attr(node, "id", 0)? as i32;
    let material_id = i64_child(node, "Material", 1)?;
    let transform_tokens = child(node, "Transformations").map(text_of).unwrap_or("").to_string();
    let motion_blur = child(node, "MotionBlur").map(vec3_of_node).unwrap_or(Vec3::ZERO);
    let tex_ids = {
        let v = parse_ints(child(node, "Textures").map(text_of).unwrap_or("0 0"));
        (*v.first().unwrap_or(&0), *v.get(1).unwrap_or(&0))
    };
    Ok((id, material_id, transform_tokens, motion_blur, tex_ids))
}

fn load_object_specs(root: Node, base_dir: &std::path::Path) -> Result<Vec<ObjectSpec>> {
    let Some(objects_node) = child(root, "Objects") else { return Ok(Vec::new()) };
    let vertex_data = parse_floats(child(root, "VertexData").map(text_of).unwrap_or(""))
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]))
        .collect::<Vec<_>>();
    let uv_data = parse_floats(child(root, "TexCoordData").map(text_of).unwrap_or(""))
        .chunks_exact(2)
        .map(|c| Vec2::new(c[0], c[1]))
        .collect::<Vec<_>>();

    let mut out = Vec::new();
    for node in element_children(objects_node) {
        let (id, material_id, transform_tokens, motion_blur, tex_ids) = parse_common(node)?;
        let tag = node.tag_name().name();
        let kind = match tag {
            "Mesh" => {
                let (faces, smooth) = load_mesh_faces(node, &vertex_data, &uv_data, base_dir)?;
                ObjectKind::Mesh { faces, smooth }
            }
            "LightMesh" => {
                let (faces, smooth) = load_mesh_faces(node, &vertex_data, &uv_data, base_dir)?;
                ObjectKind::LightMesh { faces, smooth, radiance: vec3_child(node, "Radiance") }
            }
            "MeshInstance" => ObjectKind::MeshInstance {
                base_mesh_id: i64_child(node, "BaseMeshId", 0)? as i32,
                reset_transform: bool_attr(node, "resetTransform", false),
            },
            "Triangle" => {
                let v = parse_ints(child(node, "Indices").map(text_of).unwrap_or("1 1 1"));
                ObjectKind::Triangle { indices: (*v.first().unwrap_or(&1), *v.get(1).unwrap_or(&1), *v.get(2).unwrap_or(&1)) }
            }
            "Sphere" => ObjectKind::Sphere { center_id: i64_child(node, "Center", 1)?, radius: f32_child(node, "Radius", 1.0)? },
            "LightSphere" => ObjectKind::LightSphere {
                center_id: i64_child(node, "Center", 1)?,
                radius: f32_child(node, "Radius", 1.0)?,
                radiance: vec3_child(node, "Radiance"),
            },
            other => return Err(ConfigError::UnknownEnumValue { element: "Objects".to_string(), attribute: "tag".to_string(), value: other.to_string() }.into()),
        };
        out.push(ObjectSpec { id, material_id, transform_tokens, motion_blur, tex_ids, kind });
    }
    Ok(out)
}

/// Resolves a `<Faces>` block (inline indices, or a `plyFile` attribute) into
/// local-space `Face`s, matching `Mesh::Mesh`/`Mesh::Load`'s two branches.
fn load_mesh_faces(node: Node, vertex_data: &[Vec3], uv_data: &[Vec2], base_dir: &std::path::Path) -> Result<(Vec<Face>, bool)> {
    let Some(faces_node) = child(node, "Faces") else {
        return Err(ConfigError::MissingElement { parent: node.tag_name().name().to_string(), element: "Faces".to_string() }.into());
    };
    let smooth = faces_node.attribute("shadingMode") == Some("smooth");
    let vertex_offset = i64_attr(faces_node, "vertexOffset", 0)?;
    let tex_offset = i64_attr(faces_node, "textureOffset", 0)?;

    if let Some(ply_path) = faces_node.attribute("plyFile").filter(|s| !s.is_empty()) {
        let path = base_dir.join(ply_path);
        let mesh_data = ply::load(&path)?;
        let faces = mesh_data
            .triangles
            .iter()
            .map(|&(a, b, c)| {
                let uv = |i: usize| mesh_data.uvs.get(i).copied().unwrap_or(Vec2::ZERO);
                Face::new(mesh_data.positions[a], mesh_data.positions[b], mesh_data.positions[c], uv(a), uv(b), uv(c))
            })
            .collect();
        return Ok((faces, smooth));
    }

    let indices = parse_ints(text_of(faces_node));
    let faces = indices
        .chunks_exact(3)
        .map(|c| build_face((c[0], c[1], c[2]), vertex_data, uv_data, vertex_offset, tex_offset))
        .collect();
    Ok((faces, smooth))
}
