//! Pinhole camera: frame construction, stratified pixel sampling,
//! depth-of-field, and shutter-time motion blur sampling. Frame and
//! `GetRay` math ported from `camera.cpp`; DoF/stratified sampling/time
//! jitter added per spec §4.3 (not present in the source camera, which only
//! emits a single ray per pixel).

use glam::Vec3;
use rand::Rng;

use crate::error::{InvariantError, Result};
use crate::ray::Ray;

#[derive(Clone, Copy, Debug)]
pub struct NearPlane {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Right,
    Left,
}

pub struct Camera {
    pub position: Vec3,
    pub image_resolution: (u32, u32),
    pub image_name: String,
    pub num_samples: u32,
    pub focus_distance: f32,
    pub aperture_size: f32,
    gaze: Vec3,
    u: Vec3,
    v: Vec3,
    w: Vec3,
    img_center: Vec3,
    q: Vec3,
    near_plane: NearPlane,
}

impl Camera {
    /// `near_distance`-relative pinhole frame. When `near_plane` is `None`,
    /// derives it from `fov_y` (degrees) and the image aspect ratio, matching
    /// the source's `type="lookAt"` branch. Errors if `gaze`/`up` is a zero
    /// vector or the two are parallel, since either degenerates the frame
    /// basis into NaNs rather than a usable camera.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        position: Vec3,
        gaze: Vec3,
        up: Vec3,
        near_distance: f32,
        near_plane: Option<NearPlane>,
        fov_y: Option<f32>,
        image_resolution: (u32, u32),
        image_name: String,
        handedness: Handedness,
        num_samples: u32,
        focus_distance: f32,
        aperture_size: f32,
    ) -> Result<Self> {
        let near_plane = near_plane.unwrap_or_else(|| {
            let fov_y = fov_y.expect("lookAt camera requires fov_y when near_plane is absent");
            let rad = fov_y.to_radians() / 2.0;
            let top = rad.tan() * near_distance;
            let aspect = image_resolution.0 as f32 / image_resolution.1 as f32;
            let right = top * aspect;
            NearPlane { left: -right, right, bottom: -top, top }
        });

        if gaze.length_squared() == 0.0 {
            return Err(InvariantError::ZeroDirection { context: "camera Gaze" }.into());
        }
        if up.length_squared() == 0.0 {
            return Err(InvariantError::ZeroDirection { context: "camera Up" }.into());
        }
        let gaze = gaze.normalize();
        let up = up.normalize();
        let w = -gaze;
        let cross = up.cross(w);
        if cross.length_squared() == 0.0 {
            return Err(InvariantError::ZeroDirection { context: "camera Up parallel to Gaze" }.into());
        }
        let mut u = cross.normalize();
        if handedness == Handedness::Left {
            u = -u;
        }
        let v = w.cross(u).normalize();
        let img_center = position - w * near_distance;
        let q = img_center + v * near_plane.top + u * near_plane.left;

        Ok(Self {
            position,
            image_resolution,
            image_name,
            num_samples: num_samples.max(1),
            focus_distance,
            aperture_size,
            gaze,
            u,
            v,
            w,
            img_center,
            q,
            near_plane,
        })
    }

    fn pixel_ray(&self, su: f32, sv: f32) -> Ray {
        let s = self.q + self.u * su - self.v * sv;
        Ray::new(self.position, (s - self.position).normalize())
    }

    /// Generates the per-pixel sample set: a single centered ray when
    /// `num_samples <= 1`, otherwise an N×N stratified grid (`N = sqrt`,
    /// `M = num_samples / N`) each jittered within its cell and given a
    /// uniform shutter time, then offset across the lens aperture when DoF
    /// is enabled.
    pub fn get_rays(&self, x: u32, y: u32, rng: &mut impl Rng) -> Vec<Ray> {
        let width_span = self.near_plane.right - self.near_plane.left;
        let height_span = self.near_plane.top - self.near_plane.bottom;
        let px_w = width_span / self.image_resolution.0 as f32;
        let px_h = height_span / self.image_resolution.1 as f32;

        if self.num_samples <= 1 {
            let su = (x as f32 + 0.5) * px_w;
            let sv = (y as f32 + 0.5) * px_h;
            return vec![self.with_dof(self.pixel_ray(su, sv), rng)];
        }

        let n = (self.num_samples as f32).sqrt().round().max(1.0) as u32;
        let m = (self.num_samples / n).max(1);
        let mut rays = Vec::with_capacity((n * m) as usize);
        for i in 0..n {
            for j in 0..m {
                let jx: f32 = rng.gen();
                let jy: f32 = rng.gen();
                let cell_u = (i as f32 + jx) / n as f32;
                let cell_v = (j as f32 + jy) / m as f32;
                let su = (x as f32 + cell_u) * px_w;
                let sv = (y as f32 + cell_v) * px_h;
                let mut ray = self.with_dof(self.pixel_ray(su, sv), rng);
                ray.time = rng.gen::<f32>();
                rays.push(ray);
            }
        }
        rays
    }

    fn with_dof(&self, ray: Ray, rng: &mut impl Rng) -> Ray {
        if self.aperture_size <= 0.0 {
            return ray;
        }
        let focal_point = ray.origin + ray.direction * self.focus_distance;
        let rx: f32 = rng.gen::<f32>() - 0.5;
        let ry: f32 = rng.gen::<f32>() - 0.5;
        let origin = ray.origin + (self.u * rx + self.v * ry) * self.aperture_size;
        Ray::new(origin, (focal_point - origin).normalize())
    }

    pub fn gaze(&self) -> Vec3 {
        self.gaze
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_sample_ray_points_at_gaze_center() {
        let cam = Camera::new(
            Vec3::new(0.0, 0.0, 3.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::Y,
            1.0,
            None,
            Some(90.0),
            (100, 100),
            "out".to_string(),
            Handedness::Right,
            1,
            0.0,
            0.0,
        )
        .unwrap();
        let mut rng = rand::thread_rng();
        let rays = cam.get_rays(50, 50, &mut rng);
        assert_eq!(rays.len(), 1);
        assert!(rays[0].direction.dot(Vec3::new(0.0, 0.0, -1.0)) > 0.9);
    }

    #[test]
    fn stratified_sampling_produces_n_squared_rays() {
        let cam = Camera::new(
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::Y,
            1.0,
            None,
            Some(90.0),
            (64, 64),
            "out".to_string(),
            Handedness::Right,
            16,
            0.0,
            0.0,
        )
        .unwrap();
        let mut rng = rand::thread_rng();
        let rays = cam.get_rays(0, 0, &mut rng);
        assert_eq!(rays.len(), 16);
    }
}
