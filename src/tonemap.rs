//! HDR tonemapping operators, applied to the full framebuffer after
//! rendering. Ported from `tonemapper.h`'s `PhotographicToneMapper`,
//! `FilmicTonemapper` (Uncharted2) and `ACESToneMapper`.

use glam::{Mat3, Vec3};

fn luminance(rgb: Vec3) -> f32 {
    0.212671 * rgb.x + 0.71516 * rgb.y + 0.072169 * rgb.z
}

fn linear_to_srgb(linear: f32) -> f32 {
    let srgb = if linear <= 0.0031308 { linear * 12.92 } else { 1.055 * linear.powf(1.0 / 2.4) - 0.055 };
    srgb * 255.0
}

#[derive(Clone, Copy, Debug)]
pub enum Gamma {
    Value(f32),
    Srgb,
}

#[derive(Clone, Copy, Debug)]
pub enum ToneMapper {
    /// Reinhard photographic operator. `key_value`/`burn_percent` are the
    /// source's `TMOOptions` pair; `saturation` is the per-channel exponent
    /// applied before the luminance scale.
    Photographic { key_value: f32, burn_percent: f32, saturation: f32, gamma: Gamma },
    /// Uncharted2 filmic curve. `exposure_bias`/`white_point` are `TMOOptions`.
    Filmic { exposure_bias: f32, white_point: f32, gamma: f32 },
    Aces { exposure_bias: f32, gamma: f32 },
}

impl ToneMapper {
    /// Maps a full linear-HDR framebuffer to 8-bit RGB(255-alpha) pixels.
    /// Matches the source's `Map(pixels, data)`, operating on the whole
    /// buffer at once since the photographic operator needs the global
    /// average/percentile luminance.
    pub fn map(&self, pixels: &[Vec3]) -> Vec<[u8; 4]> {
        match *self {
            ToneMapper::Photographic { key_value, burn_percent, saturation, gamma } => {
                map_photographic(pixels, key_value, burn_percent, saturation, gamma)
            }
            ToneMapper::Filmic { exposure_bias, white_point, gamma } => map_filmic(pixels, exposure_bias, white_point, gamma),
            ToneMapper::Aces { exposure_bias, gamma } => map_aces(pixels, exposure_bias, gamma),
        }
    }
}

fn map_photographic(pixels: &[Vec3], key_value: f32, burn_percent: f32, saturation: f32, gamma: Gamma) -> Vec<[u8; 4]> {
    let clamped: Vec<Vec3> = pixels.iter().map(|p| if p.x < 0.0 || p.y < 0.0 || p.z < 0.0 { Vec3::ZERO } else { *p }).collect();
    let lws: Vec<f32> = clamped.iter().map(|p| luminance(*p)).collect();

    let mut log_sum = 0.0f32;
    for &lw in &lws {
        if lw > 0.0 {
            log_sum += (lw + 1e-6).ln();
        }
    }
    let avg_lw = (log_sum / lws.len() as f32).exp();

    let ls: Vec<f32> = lws.iter().map(|&lw| (key_value / avg_lw) * lw).collect();

    let mut sorted = ls.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let ratio = (100.0 - burn_percent) / 100.0;
    let rn = ((ls.len() as f32 * ratio) as i64 - 1).clamp(0, ls.len() as i64 - 1) as usize;
    let lwhite = sorted[rn] * sorted[rn];

    let scaled: Vec<f32> = ls.iter().map(|&l| (l * (1.0 + (l / lwhite))) / (1.0 + l)).collect();

    let g = match gamma {
        Gamma::Value(g) => 1.0 / g,
        Gamma::Srgb => 1.0,
    };

    clamped
        .iter()
        .zip(lws.iter())
        .zip(scaled.iter())
        .map(|((p, &lw), &scale)| {
            let tone = |c: f32| (c / lw).powf(saturation) * scale;
            let (tx, ty, tz) = (tone(p.x).clamp(0.0, 1.0), tone(p.y).clamp(0.0, 1.0), tone(p.z).clamp(0.0, 1.0));
            let (rd, gd, bd) = match gamma {
                Gamma::Srgb => (linear_to_srgb(tx) as u8, linear_to_srgb(ty) as u8, linear_to_srgb(tz) as u8),
                Gamma::Value(_) => ((tx.powf(g) * 255.0).floor() as u8, (ty.powf(g) * 255.0).floor() as u8, (tz.powf(g) * 255.0).floor() as u8),
            };
            [rd, gd, bd, 255]
        })
        .collect()
}

fn uncharted2_partial(x: Vec3) -> Vec3 {
    const A: f32 = 0.15;
    const B: f32 = 0.50;
    const C: f32 = 0.10;
    const D: f32 = 0.20;
    const E: f32 = 0.02;
    const F: f32 = 0.30;
    (x * (x * A + B * C) + D * E) / (x * (x * A + B) + D * F) - Vec3::splat(E / F)
}

fn map_filmic(pixels: &[Vec3], exposure_bias: f32, white_point: f32, gamma: f32) -> Vec<[u8; 4]> {
    let white_scale = Vec3::ONE / uncharted2_partial(Vec3::splat(white_point));
    let g = 1.0 / gamma;
    pixels
        .iter()
        .map(|&p| {
            let mapped = uncharted2_partial(p * exposure_bias) * white_scale;
            let tx = mapped.x.clamp(0.0, 1.0);
            let ty = mapped.y.clamp(0.0, 1.0);
            let tz = mapped.z.clamp(0.0, 1.0);
            [
                (tx.powf(g) * 255.0).floor() as u8,
                (ty.powf(g) * 255.0).floor() as u8,
                (tz.powf(g) * 255.0).floor() as u8,
                255,
            ]
        })
        .collect()
}

fn rtt_and_odt_fit(v: Vec3) -> Vec3 {
    let a = v * (v + Vec3::splat(0.0245786)) - Vec3::splat(0.000090537);
    let b = v * (v * 0.983729 + Vec3::splat(0.4329510)) + Vec3::splat(0.238081);
    a / b
}

fn aces_fitted(v: Vec3) -> Vec3 {
    let input = Mat3::from_cols_array(&[0.59719, 0.07600, 0.02840, 0.35458, 0.90834, 0.13383, 0.04823, 0.01566, 0.83777]);
    let output = Mat3::from_cols_array(&[1.60475, -0.10208, -0.00327, -0.53108, 1.10813, -0.07276, -0.07367, -0.00605, 1.07602]);
    output * rtt_and_odt_fit(input * v)
}

fn map_aces(pixels: &[Vec3], exposure_bias: f32, gamma: f32) -> Vec<[u8; 4]> {
    let g = 1.0 / gamma;
    pixels
        .iter()
        .map(|&p| {
            let mapped = aces_fitted(p * exposure_bias);
            let tx = mapped.x.clamp(0.0, 1.0);
            let ty = mapped.y.clamp(0.0, 1.0);
            let tz = mapped.z.clamp(0.0, 1.0);
            [
                (tx.powf(g) * 255.0).floor() as u8,
                (ty.powf(g) * 255.0).floor() as u8,
                (tz.powf(g) * 255.0).floor() as u8,
                255,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photographic_maps_black_to_black() {
        let tm = ToneMapper::Photographic { key_value: 0.18, burn_percent: 10.0, saturation: 1.0, gamma: Gamma::Value(2.2) };
        let pixels = vec![Vec3::ZERO; 16];
        let out = tm.map(&pixels);
        assert!(out.iter().all(|p| p[0] == 0 && p[1] == 0 && p[2] == 0));
    }

    #[test]
    fn filmic_output_is_clamped_to_byte_range() {
        let tm = ToneMapper::Filmic { exposure_bias: 2.0, white_point: 11.2, gamma: 2.2 };
        let pixels = vec![Vec3::splat(1000.0), Vec3::ZERO, Vec3::splat(0.5)];
        let out = tm.map(&pixels);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn aces_is_finite_for_extreme_input() {
        let tm = ToneMapper::Aces { exposure_bias: 1.0, gamma: 2.2 };
        let out = tm.map(&[Vec3::splat(1e6)]);
        assert_eq!(out[0][3], 255);
    }
}
