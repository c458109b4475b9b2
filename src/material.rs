//! Material reflectances and BRDF shading. Ported one-for-one from
//! `material.cpp`'s `Material::Shade` and the five `BRDF::Shade`
//! implementations. The source models `BRDF` as a class hierarchy reached
//! through a `ResourceLocator` singleton; here it's a tagged enum owned
//! directly by `Material` (Design Notes: capability sets, not inheritance).

use glam::Vec3;

use crate::util::reflect;

/// Mirror-reflect `dir` about `normal` (roughness=0 case of the tracer's
/// `Reflect`, used by the BRDF specular lobes where no stochastic perturbation applies).
#[inline]
fn reflect_sharp(dir: Vec3, normal: Vec3) -> Vec3 {
    reflect(dir, normal)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterialType {
    Default,
    Conductor,
    Dielectric,
    Mirror,
}

#[derive(Clone, Copy, Debug)]
pub enum Brdf {
    OriginalPhong {
        exponent: f32,
    },
    ModifiedPhong {
        exponent: f32,
        normalized: bool,
    },
    OriginalBlinnPhong {
        exponent: f32,
    },
    ModifiedBlinnPhong {
        exponent: f32,
        normalized: bool,
    },
    TorranceSparrow {
        exponent: f32,
        kdfresnel: bool,
        n: f32,
        k: f32,
    },
}

impl Brdf {
    /// `kd`, `ks` already have texturing/degamma applied by the caller.
    /// `light_dir`/`normal`/`view_dir` point away from the shaded point.
    pub fn shade(&self, kd: Vec3, ks: Vec3, light_dir: Vec3, normal: Vec3, view_dir: Vec3, luminance: Vec3) -> Vec3 {
        match *self {
            Brdf::OriginalPhong { exponent } => {
                let teta = light_dir.dot(normal).max(0.0);
                let mut color = kd * luminance * teta;
                let r = reflect_sharp(light_dir, normal);
                let cosar = r.dot(-view_dir).max(0.0);
                color += ks * luminance * cosar.powf(exponent);
                color
            }
            Brdf::ModifiedPhong { exponent, normalized } => {
                let teta = light_dir.dot(normal).max(0.0);
                let mut color = if normalized {
                    kd * luminance * teta / std::f32::consts::PI
                } else {
                    kd * luminance * teta
                };
                let r = reflect_sharp(light_dir, normal);
                let cosar = r.dot(-view_dir).max(0.0);
                if normalized {
                    color += ks * luminance * cosar.powf(exponent) * teta * ((exponent + 2.0) / (2.0 * std::f32::consts::PI));
                } else {
                    color += ks * luminance * cosar.powf(exponent) * teta;
                }
                color
            }
            Brdf::OriginalBlinnPhong { exponent } => {
                let teta = light_dir.dot(normal).max(0.0);
                let mut color = kd * luminance * teta;
                let h = (light_dir + view_dir).normalize();
                let spec = h.dot(normal).max(0.0).powf(exponent);
                color += ks * luminance * spec;
                color
            }
            Brdf::ModifiedBlinnPhong { exponent, normalized } => {
                let teta = light_dir.dot(normal).max(0.0);
                let mut color = if normalized {
                    kd * luminance * teta / std::f32::consts::PI
                } else {
                    kd * luminance * teta
                };
                let h = (light_dir + view_dir).normalize();
                let phi = h.dot(normal).max(0.0).powf(exponent);
                if normalized {
                    color += ks * luminance * teta * phi * ((exponent + 8.0) / (8.0 * std::f32::consts::PI));
                } else {
                    color += ks * luminance * teta * phi;
                }
                color
            }
            Brdf::TorranceSparrow { exponent, kdfresnel, n, k } => {
                let n_dot_l = normal.dot(light_dir).max(0.0);
                if n_dot_l <= 0.0 {
                    return Vec3::ZERO;
                }
                let h = (light_dir + view_dir).normalize();
                let n_dot_h = normal.dot(h).max(0.0);
                let n_dot_v = normal.dot(view_dir).max(0.0);
                let v_dot_h = light_dir.dot(h).max(0.0);

                let ndi = n_dot_v;
                let rs = ((n * n + k * k) - 2.0 * n * ndi + ndi * ndi) / ((n * n + k * k) + 2.0 * n * ndi + ndi * ndi);
                let rp = ((n * n + k * k) * ndi * ndi - 2.0 * n * ndi + 1.0) / ((n * n + k * k) * ndi * ndi + 2.0 * n * ndi + 1.0);
                let f = (rs + rp) / 2.0;

                let d = (exponent + 2.0) * n_dot_h.powf(exponent) / (2.0 * std::f32::consts::PI);

                let two_n_dot_h = 2.0 * n_dot_h;
                let g1 = (two_n_dot_h * n_dot_v) / v_dot_h;
                let g2 = (two_n_dot_h * n_dot_l) / v_dot_h;
                let g = 1.0f32.min(g1.min(g2));

                let rs_term = (f * d * g) / (4.0 * n_dot_l * n_dot_v);
                let kdf = if kdfresnel { 1.0 - f } else { 1.0 };
                kd * luminance * n_dot_l * std::f32::consts::FRAC_1_PI * kdf + ks * luminance * n_dot_l * rs_term
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Material {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub phong_exponent: f32,
    pub mirror_reflectance: Vec3,
    pub refraction_index: f32,
    pub absorption_index: f32,
    pub absorption_coefficient: Vec3,
    pub roughness: f32,
    pub kind: MaterialType,
    pub brdf: Brdf,
    pub degamma: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Vec3::ZERO,
            diffuse: Vec3::ZERO,
            specular: Vec3::ZERO,
            phong_exponent: 1.0,
            mirror_reflectance: Vec3::ZERO,
            refraction_index: 1.0,
            absorption_index: 0.0,
            absorption_coefficient: Vec3::ZERO,
            roughness: 0.0,
            kind: MaterialType::Default,
            brdf: Brdf::OriginalBlinnPhong { exponent: 1.0 },
            degamma: false,
        }
    }
}

fn degamma(c: Vec3, gamma: f32) -> Vec3 {
    Vec3::new(c.x.powf(gamma), c.y.powf(gamma), c.z.powf(gamma))
}

impl Material {
    /// Reflectances with texture decal and degamma applied, matching the
    /// `kd`/`ks` preparation at the top of `Material::Shade`.
    pub fn prepared_reflectances(&self, gamma: f32, texture_color: Option<(Vec3, crate::texture::DecalMode)>) -> (Vec3, Vec3, Vec3) {
        let mut ka = self.ambient;
        let mut kd = self.diffuse;
        let mut ks = self.specular;
        if self.degamma {
            ka = degamma(ka, gamma);
            kd = degamma(kd, gamma);
            ks = degamma(ks, gamma);
        }
        if let Some((color, mode)) = texture_color {
            match mode {
                crate::texture::DecalMode::ReplaceKd => kd = color,
                crate::texture::DecalMode::BlendKd => kd = (kd + color) / 2.0,
                _ => {}
            }
        }
        (ka, kd, ks)
    }
}
