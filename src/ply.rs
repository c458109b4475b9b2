//! Minimal PLY mesh loader for the `Faces plyFile="..."` attribute. The
//! source delegates to `miniply` (`plyLoader.h`'s `load_trimesh_from_ply`);
//! here `ply-rs` plays the same role, read generically through
//! `DefaultElement` since we only need `x/y/z`, optional `u/v`, and a
//! `vertex_indices` list per face.

use std::fs::File;
use std::io::BufReader;

use glam::{Vec2, Vec3};
use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};

use crate::error::{ResourceError, Result};

pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    /// Triangle vertex index triples, 0-based into `positions`. Faces with
    /// more than 3 vertices are fan-triangulated, matching the source's
    /// polygon-triangulation fallback.
    pub triangles: Vec<(usize, usize, usize)>,
}

fn float_prop(elem: &DefaultElement, name: &str) -> f32 {
    match elem.get(name) {
        Some(Property::Float(v)) => *v,
        Some(Property::Double(v)) => *v as f32,
        _ => 0.0,
    }
}

fn index_list(elem: &DefaultElement, name: &str) -> Vec<usize> {
    match elem.get(name) {
        Some(Property::ListInt(v)) => v.iter().map(|&i| i as usize).collect(),
        Some(Property::ListUInt(v)) => v.iter().map(|&i| i as usize).collect(),
        Some(Property::ListUChar(v)) => v.iter().map(|&i| i as usize).collect(),
        _ => Vec::new(),
    }
}

pub fn load(path: &std::path::Path) -> Result<MeshData> {
    let file = File::open(path).map_err(|e| ResourceError::Mesh { path: path.display().to_string(), reason: e.to_string() })?;
    let mut reader = BufReader::new(file);
    let parser = Parser::<DefaultElement>::new();
    let ply = parser
        .read_ply(&mut reader)
        .map_err(|e| ResourceError::Mesh { path: path.display().to_string(), reason: e.to_string() })?;

    let vertices = ply.payload.get("vertex").ok_or_else(|| ResourceError::Mesh {
        path: path.display().to_string(),
        reason: "PLY file has no vertex element".to_string(),
    })?;
    let has_uv = vertices.first().is_some_and(|v| v.contains_key("u") || v.contains_key("s"));

    let positions: Vec<Vec3> = vertices.iter().map(|v| Vec3::new(float_prop(v, "x"), float_prop(v, "y"), float_prop(v, "z"))).collect();
    let uvs: Vec<Vec2> = if has_uv {
        vertices
            .iter()
            .map(|v| {
                let u = if v.contains_key("u") { float_prop(v, "u") } else { float_prop(v, "s") };
                let vv = if v.contains_key("v") { float_prop(v, "v") } else { float_prop(v, "t") };
                Vec2::new(u, vv)
            })
            .collect()
    } else {
        Vec::new()
    };

    let mut triangles = Vec::new();
    if let Some(faces) = ply.payload.get("face") {
        for face in faces {
            let idx = if face.contains_key("vertex_indices") {
                index_list(face, "vertex_indices")
            } else {
                index_list(face, "vertex_index")
            };
            // Fan triangulation for polygons with more than 3 vertices,
            // matching the source's triangulation fallback for non-triangle faces.
            for i in 1..idx.len().saturating_sub(1) {
                triangles.push((idx[0], idx[i], idx[i + 1]));
            }
        }
    }

    Ok(MeshData { positions, uvs, triangles })
}
