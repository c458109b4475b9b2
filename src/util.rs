//! Small vector-math helpers shared across modules. `reflect`/`refract`/
//! `create_cartesian` are carried over from the teacher's `kernels/src/util.rs`
//! (written there for the GPU path-tracing kernel); the rest are new, grounded
//! in `scene.cpp`'s `Trace` and `camera.cpp`'s frame construction.

use glam::Vec3;

pub fn reflect(i: Vec3, normal: Vec3) -> Vec3 {
    i - normal * 2.0 * i.dot(normal)
}

/// `i` and `normal` point away from the surface on the incident side;
/// `in_ior`/`out_ior` are the refractive indices either side of the
/// interface. Returns `None` on total internal reflection.
pub fn refract(i: Vec3, normal: Vec3, in_ior: f32, out_ior: f32) -> Option<Vec3> {
    let eta = in_ior / out_ior;
    let n_dot_i = normal.dot(i);
    let k = 1.0 - eta * eta * (1.0 - n_dot_i * n_dot_i);
    if k < 0.0 {
        None
    } else {
        Some((eta * i - (eta * n_dot_i + k.sqrt()) * normal).normalize())
    }
}

/// Build a right-handed orthonormal basis with `up` as one axis, used both
/// by the camera frame and by rough-mirror reflection perturbation.
pub fn create_cartesian(up: Vec3) -> (Vec3, Vec3, Vec3) {
    let arbitrary = if up.x.abs() < 0.99 {
        Vec3::X
    } else {
        Vec3::Y
    };
    let right = arbitrary.cross(up).normalize();
    let forward = up.cross(right).normalize();
    (up, right, forward)
}

/// Dielectric Fresnel reflectance split into `r_s`/`r_p` (s/p polarization),
/// averaged. `cos_i` is the cosine of the incident angle measured from the
/// surface normal, `n1`/`n2` the refractive indices either side.
pub fn fresnel_dielectric(cos_i: f32, cos_t: f32, n1: f32, n2: f32) -> f32 {
    let rs = (n1 * cos_i - n2 * cos_t) / (n1 * cos_i + n2 * cos_t);
    let rp = (n2 * cos_i - n1 * cos_t) / (n2 * cos_i + n1 * cos_t);
    (rs * rs + rp * rp) / 2.0
}

/// Conductor Fresnel reflectance from complex IOR `n + ik`, per
/// `TorranceSparrow::Shade`'s `rs`/`rp` formulas.
pub fn fresnel_conductor(cos_i: f32, n: f32, k: f32) -> f32 {
    let n2k2 = n * n + k * k;
    let rs = (n2k2 - 2.0 * n * cos_i + cos_i * cos_i) / (n2k2 + 2.0 * n * cos_i + cos_i * cos_i);
    let rp = (n2k2 * cos_i * cos_i - 2.0 * n * cos_i + 1.0) / (n2k2 * cos_i * cos_i + 2.0 * n * cos_i + 1.0);
    (rs + rp) / 2.0
}

/// Beer-Lambert attenuation of `absorption` over `distance`.
pub fn beer_lambert(absorption_coefficient: Vec3, distance: f32) -> Vec3 {
    Vec3::new(
        (-absorption_coefficient.x * distance).exp(),
        (-absorption_coefficient.y * distance).exp(),
        (-absorption_coefficient.z * distance).exp(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_preserves_length_and_angle() {
        let dir = Vec3::new(1.0, -1.0, 0.0).normalize();
        let n = Vec3::Y;
        let r = reflect(dir, n);
        assert!((r.length() - 1.0).abs() < 1e-5);
        assert!((r.dot(n) - (-dir.dot(n))).abs() < 1e-5);
    }

    #[test]
    fn fresnel_energy_conserved_with_refraction() {
        let n1 = 1.0f32;
        let n2 = 1.5f32;
        let cos_i = 0.8f32;
        let sin_i = (1.0 - cos_i * cos_i).sqrt();
        let sin_t = sin_i * n1 / n2;
        let cos_t = (1.0 - sin_t * sin_t).sqrt();
        let fr = fresnel_dielectric(cos_i, cos_t, n1, n2);
        let ft = 1.0 - fr;
        assert!(fr >= 0.0 && fr <= 1.0);
        assert!((fr + ft - 1.0).abs() < 1e-6);
    }

    #[test]
    fn beer_lambert_attenuates_monotonically() {
        let k = Vec3::new(0.5, 0.1, 1.0);
        let a = beer_lambert(k, 1.0);
        let b = beer_lambert(k, 2.0);
        assert!(b.x <= a.x && b.y <= a.y && b.z <= a.z);
        assert!(a.x <= 1.0 && a.y <= 1.0 && a.z <= 1.0);
    }
}
