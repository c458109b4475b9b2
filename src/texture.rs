//! Samplers and texture roles. Ported from `texture.h`/`texture.cpp`: the
//! source's `Image`/`ImageSampler`/`PerlinSampler`/`CheckerBoardSampler`/
//! `VoronoiSampler` hierarchy becomes a `Sampler` enum (Design Notes:
//! capability sets, not inheritance), and `Texture`/`BackgroundTexture`/
//! `DiffuseTexture`/`NormalTexture`/`BumpTexture` become a `TextureRole`
//! tag carried alongside a shared `Sampler`.

use glam::Vec3;
use image::{DynamicImage, GenericImageView};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecalMode {
    ReplaceKd,
    BlendKd,
    ReplaceAll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    Bilinear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoiseConversion {
    Linear,
    AbsVal,
}

/// Data the original passed as `SamplerData`: surface point and UV for a
/// single sample, plus the shading normal for bump perturbation.
#[derive(Clone, Copy, Debug, Default)]
pub struct SamplerData {
    pub u: f32,
    pub v: f32,
    pub point: Vec3,
    pub normal: Vec3,
}

/// Decoded image backing an `ImageSampler`. Loaded once at scene-load time
/// via the `image` crate and shared by reference (Design Notes: no hidden
/// global mutability — this replaces the source's `ResourceLocator` image
/// table with a plain `Scene.images: Vec<Image>` arena).
pub struct Image {
    pub width: u32,
    pub height: u32,
    /// Raw RGB floats in [0, data_max], row-major.
    pixels: Vec<[f32; 3]>,
}

impl Image {
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        let (width, height) = img.dimensions();
        let rgb = img.to_rgb32f();
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for p in rgb.pixels() {
            pixels.push([p[0] * 255.0, p[1] * 255.0, p[2] * 255.0]);
        }
        Self { width, height, pixels }
    }

    /// Clamped fetch, matching the source's clamp-to-edge `Image::Fetch`.
    pub fn fetch(&self, x: i64, y: i64) -> Vec3 {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        let p = self.pixels[(y * self.width + x) as usize];
        Vec3::new(p[0], p[1], p[2])
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CheckerBoard {
    pub black: Vec3,
    pub white: Vec3,
    pub scale: f32,
    pub offset: f32,
}

impl CheckerBoard {
    /// Sample on a 3D world point, for textures bound to an Object.
    pub fn sample_3d(&self, point: Vec3) -> Vec3 {
        let p = point * self.scale + Vec3::splat(self.offset);
        let parity = (p.x.floor() as i64 + p.y.floor() as i64 + p.z.floor() as i64).rem_euclid(2);
        if parity == 0 { self.black } else { self.white }
    }

    /// Sample on 2D UV, for the Background texture role.
    pub fn sample_2d(&self, u: f32, v: f32) -> Vec3 {
        let pu = u * self.scale + self.offset;
        let pv = v * self.scale + self.offset;
        let parity = (pu.floor() as i64 + pv.floor() as i64).rem_euclid(2);
        if parity == 0 { self.black } else { self.white }
    }
}

#[derive(Clone, Debug)]
pub struct Perlin {
    pub conversion: NoiseConversion,
    pub noise_scale: f32,
    ptable: Vec<usize>,
    grad: Vec<Vec3>,
}

const PERLIN_TABLE_SIZE: usize = 16;

impl Perlin {
    /// Permutation table and gradients, generated the way the source does
    /// (fixed seed 60, Fisher-Yates shuffle of 0..16, uniform gradients in
    /// [-1,1]^3) so renders stay reproducible across runs.
    pub fn new(conversion: NoiseConversion, noise_scale: f32) -> Self {
        use rand::{Rng, SeedableRng};
        use rand::seq::SliceRandom;
        let mut rng = rand_pcg::Pcg32::seed_from_u64(60);
        let mut ptable: Vec<usize> = (0..PERLIN_TABLE_SIZE).collect();
        ptable.shuffle(&mut rng);
        ptable.extend_from_within(0..PERLIN_TABLE_SIZE);
        let grad = (0..PERLIN_TABLE_SIZE)
            .map(|_| {
                Vec3::new(
                    2.0 * rng.gen::<f32>() - 1.0,
                    2.0 * rng.gen::<f32>() - 1.0,
                    2.0 * rng.gen::<f32>() - 1.0,
                )
            })
            .collect();
        Self { conversion, noise_scale, ptable, grad }
    }

    fn hash(&self, x: usize, y: usize, z: usize) -> usize {
        self.ptable[self.ptable[self.ptable[x] + y] + z]
    }

    fn fade(t: f32) -> f32 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t.clamp(0.0, 1.0)
    }

    fn noise(&self, p: Vec3) -> f32 {
        let mask = PERLIN_TABLE_SIZE - 1;
        let x0 = (p.x.floor() as i64 as usize) & mask;
        let y0 = (p.y.floor() as i64 as usize) & mask;
        let z0 = (p.z.floor() as i64 as usize) & mask;
        let x1 = x0 + 1;
        let y1 = y0 + 1;
        let z1 = z0 + 1;

        let g000 = self.grad[self.hash(x0, y0, z0)];
        let g001 = self.grad[self.hash(x0, y0, z1)];
        let g010 = self.grad[self.hash(x0, y1, z0)];
        let g011 = self.grad[self.hash(x0, y1, z1)];
        let g100 = self.grad[self.hash(x1, y0, z0)];
        let g101 = self.grad[self.hash(x1, y0, z1)];
        let g110 = self.grad[self.hash(x1, y1, z0)];
        let g111 = self.grad[self.hash(x1, y1, z1)];

        let dx = p.x - p.x.floor();
        let dy = p.y - p.y.floor();
        let dz = p.z - p.z.floor();

        let u = Self::fade(dx);
        let v = Self::fade(dy);
        let w = Self::fade(dz);

        let d000 = g000.dot(Vec3::new(dx, dy, dz));
        let d001 = g001.dot(Vec3::new(dx, dy, dz - 1.0));
        let d010 = g010.dot(Vec3::new(dx, dy - 1.0, dz));
        let d011 = g011.dot(Vec3::new(dx, dy - 1.0, dz - 1.0));
        let d100 = g100.dot(Vec3::new(dx - 1.0, dy, dz));
        let d101 = g101.dot(Vec3::new(dx - 1.0, dy, dz - 1.0));
        let d110 = g110.dot(Vec3::new(dx - 1.0, dy - 1.0, dz));
        let d111 = g111.dot(Vec3::new(dx - 1.0, dy - 1.0, dz - 1.0));

        let sx1 = Self::lerp(d000, d100, u);
        let sx2 = Self::lerp(d010, d110, u);
        let sy1 = Self::lerp(sx1, sx2, v);
        let sx1 = Self::lerp(d001, d101, u);
        let sx2 = Self::lerp(d011, d111, u);
        let sy2 = Self::lerp(sx1, sx2, v);
        Self::lerp(sy1, sy2, w)
    }

    pub fn sample(&self, point: Vec3) -> Vec3 {
        let mut sum = self.noise(point * self.noise_scale);
        sum = match self.conversion {
            NoiseConversion::Linear => (sum + 1.0) / 2.0,
            NoiseConversion::AbsVal => sum.abs(),
        };
        Vec3::splat(sum)
    }

    fn sample_bump_gradient(&self, data: SamplerData) -> Vec3 {
        let eps = 0.001;
        let c = self.sample(data.point).x;
        let dx = (self.sample(data.point + Vec3::X * eps).x - c) / eps;
        let dy = (self.sample(data.point + Vec3::Y * eps).x - c) / eps;
        let dz = (self.sample(data.point + Vec3::Z * eps).x - c) / eps;
        Vec3::new(dx, dy, dz)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Voronoi {
    pub size: f32,
}

impl Voronoi {
    fn random3to1(p: Vec3, d: Vec3) -> f32 {
        let x = p.dot(d).sin() * 23453.2342;
        x - x.floor()
    }

    fn random3to3(p: Vec3) -> Vec3 {
        Vec3::new(
            Self::random3to1(p, Vec3::new(124.3, 232.4, 634.1)),
            Self::random3to1(p, Vec3::new(742.5, 145.3, 314.6)),
            Self::random3to1(p, Vec3::new(923.9, 236.5, 892.6)),
        )
    }

    pub fn sample(&self, point: Vec3) -> Vec3 {
        let p = point * self.size;
        let cx = p.x.floor();
        let cy = p.y.floor();
        let cz = p.z.floor();
        let mut min = 10.0f32;
        for i in -1..=1 {
            for j in -1..=1 {
                for k in -1..=1 {
                    let cell = Vec3::new(cx + i as f32, cy + j as f32, cz + k as f32);
                    let cell_position = cell + Self::random3to3(cell);
                    let dist = (cell_position - p).length();
                    if dist < min {
                        min = dist;
                    }
                }
            }
        }
        Vec3::splat(min)
    }

    fn sample_bump_gradient(&self, data: SamplerData) -> Vec3 {
        let eps = 0.001;
        let c = self.sample(data.point).x;
        let dx = (self.sample(data.point + Vec3::X * eps).x - c) / eps;
        let dy = (self.sample(data.point + Vec3::Y * eps).x - c) / eps;
        let dz = (self.sample(data.point + Vec3::Z * eps).x - c) / eps;
        Vec3::new(dx, dy, dz)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ImageSample {
    pub image_index: usize,
    pub interpolation: Interpolation,
    pub normalizer: f32,
}

impl ImageSample {
    fn sample(&self, image: &Image, u: f32, v: f32) -> Vec3 {
        let u = u - u.floor();
        let v = v - v.floor();
        match self.interpolation {
            Interpolation::Nearest => {
                let x = (u * (image.width as f32 - 1.0)) as i64;
                let y = (v * (image.height as f32 - 1.0)) as i64;
                image.fetch(x, y) / self.normalizer
            }
            Interpolation::Bilinear => {
                let fx = u * (image.width as f32 - 1.0);
                let fy = v * (image.height as f32 - 1.0);
                let p = fx as i64;
                let q = fy as i64;
                let dx = fx - p as f32;
                let dy = fy - q as f32;
                let p00 = image.fetch(p, q);
                let p01 = image.fetch(p, q + 1);
                let p10 = image.fetch(p + 1, q);
                let p11 = image.fetch(p + 1, q + 1);
                let sum = p00 * (1.0 - dx) * (1.0 - dy)
                    + p10 * dx * (1.0 - dy)
                    + p01 * (1.0 - dx) * dy
                    + p11 * dx * dy;
                sum / self.normalizer
            }
        }
    }

    fn bump_gradient(&self, image: &Image, u: f32, v: f32) -> (f32, f32) {
        let u = u - u.floor();
        let v = v - v.floor();
        let x = (u * (image.width as f32 - 1.0)) as i64;
        let y = (v * (image.height as f32 - 1.0)) as i64;
        let c = image.fetch(x, y);
        let cx = image.fetch(x + 1, y);
        let cy = image.fetch(x, y + 1);
        let dx = ((cx.x - c.x) + (cx.y - c.y) + (cx.z - c.z)) / 3.0;
        let dy = ((cy.x - c.x) + (cy.y - c.y) + (cy.z - c.z)) / 3.0;
        (dx, dy)
    }
}

/// Tagged union over the four sampler kinds. `Sampler::sample` takes the
/// image arena because `ImageSample` only stores an index into it.
#[derive(Clone, Debug)]
pub enum Sampler {
    Image(ImageSample),
    Perlin(Perlin),
    CheckerBoard(CheckerBoard),
    Voronoi(Voronoi),
}

impl Sampler {
    pub fn sample(&self, data: SamplerData, images: &[Image]) -> Vec3 {
        match self {
            Sampler::Image(s) => s.sample(&images[s.image_index], data.u, data.v),
            Sampler::Perlin(s) => s.sample(data.point),
            Sampler::CheckerBoard(s) => s.sample_3d(data.point),
            Sampler::Voronoi(s) => s.sample(data.point),
        }
    }

    /// 2D UV variant used by the Background texture role, where Checkerboard
    /// operates on UV instead of a world point.
    pub fn sample_background(&self, data: SamplerData, images: &[Image]) -> Vec3 {
        match self {
            Sampler::CheckerBoard(s) => s.sample_2d(data.u, data.v),
            other => other.sample(data, images),
        }
    }

    /// Perturbed normal, given the tangent/bitangent/(outward) normal frame
    /// and a bump strength factor. Image sampling uses finite texel
    /// differences; procedural samplers use an epsilon-gradient.
    pub fn sample_bump(&self, data: SamplerData, t: Vec3, b: Vec3, n: Vec3, factor: f32, images: &[Image]) -> Vec3 {
        match self {
            Sampler::Image(s) => {
                let (dx, dy) = s.bump_gradient(&images[s.image_index], data.u, data.v);
                (n - factor * (t * dx + b * dy)).normalize()
            }
            Sampler::Perlin(s) => {
                let grad = s.sample_bump_gradient(data);
                let gp = grad.dot(n) * n;
                let go = grad - gp;
                n - factor * go
            }
            Sampler::Voronoi(s) => {
                let grad = s.sample_bump_gradient(data);
                let gp = grad.dot(n) * n;
                let go = grad - gp;
                n - factor * go
            }
            Sampler::CheckerBoard(_) => n,
        }
    }
}

/// A texture binding: shared sampler plus the role it plays on an object.
#[derive(Clone, Debug)]
pub enum TextureRole {
    Background,
    Diffuse { decal: DecalMode },
    Normal,
    Bump { factor: f32 },
}

#[derive(Clone, Debug)]
pub struct Texture {
    pub sampler: Sampler,
    pub role: TextureRole,
}

impl Texture {
    pub fn diffuse_color(&self, data: SamplerData, images: &[Image]) -> Vec3 {
        self.sampler.sample(data, images)
    }

    pub fn background_color(&self, data: SamplerData, images: &[Image]) -> Vec3 {
        self.sampler.sample_background(data, images)
    }

    /// Decoded normal-map sample, mapped from [0,1]^3 to a unit vector.
    pub fn sample_normal(&self, data: SamplerData, images: &[Image]) -> Vec3 {
        (self.sampler.sample(data, images) - Vec3::splat(0.5)).normalize()
    }

    pub fn sample_bump(&self, data: SamplerData, t: Vec3, b: Vec3, geom_normal: Vec3, images: &[Image]) -> Vec3 {
        let factor = match self.role {
            TextureRole::Bump { factor } => factor,
            _ => 1.0,
        };
        let mut n = t.cross(b);
        if n.dot(geom_normal) < 0.0 {
            n = -n;
        }
        self.sampler.sample_bump(data, t, b, n, factor, images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkerboard_alternates_parity() {
        let cb = CheckerBoard { black: Vec3::ZERO, white: Vec3::ONE, scale: 1.0, offset: 0.0 };
        assert_eq!(cb.sample_3d(Vec3::new(0.5, 0.5, 0.5)), Vec3::ZERO);
        assert_eq!(cb.sample_3d(Vec3::new(1.5, 0.5, 0.5)), Vec3::ONE);
    }

    #[test]
    fn perlin_noise_has_no_nan() {
        let p = Perlin::new(NoiseConversion::Linear, 1.0);
        for i in 0..50 {
            let point = Vec3::new(i as f32 * 0.37, -i as f32 * 0.11, i as f32 * 0.9);
            let s = p.sample(point);
            assert!(s.x.is_finite());
        }
    }

    #[test]
    fn voronoi_distance_nonnegative() {
        let v = Voronoi { size: 1.0 };
        let s = v.sample(Vec3::new(1.3, 2.7, -0.4));
        assert!(s.x >= 0.0);
    }
}
