//! Perspective thin-lens camera.
//!
//! Besides generating primary rays, the camera exposes its importance
//! function `We` so light paths can be connected to it. The image plane is
//! placed at distance 1 for the importance normalization; with a lens radius
//! of zero the camera is a pinhole.

use crate::sampler::Sampler;
use crate::spectrum::Spectrum;
use lux_math::warp::concentric_disk;
use lux_math::{Ray, Vec2, Vec3};
use std::f32::consts::PI;

/// Lens point sampled as seen from a scene point.
#[derive(Debug, Clone, Copy)]
pub struct CameraIiSample {
    /// Unit direction from the scene point towards the lens
    pub wi: Vec3,
    pub p_lens: Vec3,
    pub importance: Spectrum,
    /// Solid-angle density at the scene point
    pub pdf: f32,
    pub raster: Vec2,
}

/// Camera for generating rays into the scene.
#[derive(Debug, Clone)]
pub struct Camera {
    // Image settings
    pub image_width: u32,
    pub image_height: u32,

    // Camera positioning
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    // Lens settings
    vfov: f32,        // Vertical field of view in degrees
    lens_radius: f32, // 0 for a pinhole
    focus_dist: f32,  // Distance from camera to plane of perfect focus

    // Cached computed values (set by initialize())
    center: Vec3,
    u: Vec3,
    v: Vec3,
    forward: Vec3,
    half_width: f32,
    half_height: f32,
    image_area: f32,
    lens_area: f32,
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        let mut camera = Self {
            image_width: 256,
            image_height: 256,
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 90.0,
            lens_radius: 0.0,
            focus_dist: 1.0,
            center: Vec3::ZERO,
            u: Vec3::X,
            v: Vec3::Y,
            forward: -Vec3::Z,
            half_width: 1.0,
            half_height: 1.0,
            image_area: 4.0,
            lens_area: 1.0,
        };
        camera.initialize();
        camera
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Set lens settings.
    pub fn with_lens(mut self, vfov: f32, lens_radius: f32, focus_dist: f32) -> Self {
        self.vfov = vfov;
        self.lens_radius = lens_radius.max(0.0);
        self.focus_dist = focus_dist;
        self
    }

    /// Recompute cached values (must be called after changing settings).
    pub fn initialize(&mut self) {
        self.center = self.look_from;

        self.forward = (self.look_at - self.look_from).normalize();
        self.u = self.forward.cross(self.vup).normalize();
        self.v = self.u.cross(self.forward);

        let aspect = self.image_width as f32 / self.image_height as f32;
        self.half_height = (self.vfov.to_radians() / 2.0).tan();
        self.half_width = self.half_height * aspect;
        self.image_area = 4.0 * self.half_width * self.half_height;
        self.lens_area = if self.lens_radius > 0.0 {
            PI * self.lens_radius * self.lens_radius
        } else {
            1.0
        };
    }

    pub fn position(&self) -> Vec3 {
        self.center
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn is_pinhole(&self) -> bool {
        self.lens_radius == 0.0
    }

    fn lens_point(&self, u: Vec2) -> Vec3 {
        if self.is_pinhole() {
            return self.center;
        }
        let d = concentric_disk(u) * self.lens_radius;
        self.center + d.x * self.u + d.y * self.v
    }

    /// Direction through raster position `raster` on the plane at distance 1.
    fn raster_to_direction(&self, raster: Vec2) -> Vec3 {
        let sx = 2.0 * raster.x / self.image_width as f32 - 1.0;
        let sy = 1.0 - 2.0 * raster.y / self.image_height as f32;
        self.forward + sx * self.half_width * self.u + sy * self.half_height * self.v
    }

    /// Generate a ray for pixel (x, y), jittered inside the pixel and over the lens.
    pub fn generate_ray(&self, x: u32, y: u32, sampler: &mut dyn Sampler) -> Ray {
        let raster = Vec2::new(x as f32, y as f32) + sampler.get2();
        let u_lens = sampler.get2();
        self.generate_ray_at(raster, u_lens)
    }

    /// Ray through a raster position, for a given lens sample.
    pub fn generate_ray_at(&self, raster: Vec2, u_lens: Vec2) -> Ray {
        let dir = self.raster_to_direction(raster);
        if self.is_pinhole() {
            return Ray::new(self.center, dir.normalize());
        }
        let p_focus = self.center + dir * self.focus_dist;
        let origin = self.lens_point(u_lens);
        Ray::new(origin, (p_focus - origin).normalize())
    }

    /// Raster position a ray leaving the lens maps to, if it lands on the image.
    pub fn raster_pos(&self, ray: &Ray) -> Option<Vec2> {
        let cos = ray.direction.dot(self.forward);
        if cos <= 0.0 {
            return None;
        }
        // Every lens ray through a pixel crosses the focus plane at the same point
        let p_focus = ray.at(self.focus_dist / cos);
        let q = p_focus - self.center;
        let z = q.dot(self.forward);
        if z <= 0.0 {
            return None;
        }
        let sx = q.dot(self.u) / (z * self.half_width);
        let sy = q.dot(self.v) / (z * self.half_height);
        let raster = Vec2::new(
            (sx + 1.0) * 0.5 * self.image_width as f32,
            (1.0 - sy) * 0.5 * self.image_height as f32,
        );
        let inside = raster.x >= 0.0
            && raster.y >= 0.0
            && raster.x < self.image_width as f32
            && raster.y < self.image_height as f32;
        inside.then_some(raster)
    }

    /// Importance `We` carried by a ray leaving the lens.
    pub fn ie(&self, ray: &Ray) -> Spectrum {
        if self.raster_pos(ray).is_none() {
            return Spectrum::ZERO;
        }
        let cos = ray.direction.dot(self.forward);
        let cos2 = cos * cos;
        Spectrum::splat(1.0 / (self.image_area * self.lens_area * cos2 * cos2))
    }

    /// `(pdf_pos, pdf_dir)` of [`Camera::generate_ray`] producing `ray`.
    pub fn pdf_ie(&self, ray: &Ray) -> (f32, f32) {
        if self.raster_pos(ray).is_none() {
            return (0.0, 0.0);
        }
        let cos = ray.direction.dot(self.forward);
        (1.0 / self.lens_area, 1.0 / (self.image_area * cos * cos * cos))
    }

    /// Sample a lens point to connect the scene point `ref_p` to the camera.
    pub fn sample_ii(&self, ref_p: Vec3, u: Vec2) -> Option<CameraIiSample> {
        let p_lens = self.lens_point(u);
        let to_lens = p_lens - ref_p;
        let dist2 = to_lens.length_squared();
        if dist2 == 0.0 {
            return None;
        }
        let wi = to_lens / dist2.sqrt();

        let ray = Ray::new(p_lens, -wi);
        let raster = self.raster_pos(&ray)?;
        let importance = self.ie(&ray);

        let cos = self.forward.dot(wi).abs();
        if cos == 0.0 {
            return None;
        }
        let pdf = dist2 / (cos * self.lens_area);

        Some(CameraIiSample {
            wi,
            p_lens,
            importance,
            pdf,
            raster,
        })
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::IndependentSampler;

    fn test_camera(lens_radius: f32) -> Camera {
        let mut camera = Camera::new()
            .with_resolution(80, 60)
            .with_position(Vec3::new(0.0, 1.0, 5.0), Vec3::new(0.0, 1.0, 0.0), Vec3::Y)
            .with_lens(40.0, lens_radius, 5.0);
        camera.initialize();
        camera
    }

    #[test]
    fn test_camera_initialize() {
        let camera = test_camera(0.0);
        assert_eq!(camera.position(), Vec3::new(0.0, 1.0, 5.0));
        assert!((camera.forward() + Vec3::Z).length() < 0.001);
        assert!((camera.u - Vec3::X).length() < 0.001);
    }

    #[test]
    fn test_camera_ray_direction() {
        let camera = test_camera(0.0);
        let mut sampler = IndependentSampler::new(42);
        sampler.set_pixel(40, 30);

        // Center ray should point roughly towards -Z
        let ray = camera.generate_ray(40, 30, &mut sampler);
        assert!(ray.direction.z < -0.99);
        // Top-left pixel points up and left
        let ray = camera.generate_ray_at(Vec2::ZERO, Vec2::splat(0.5));
        assert!(ray.direction.x < 0.0 && ray.direction.y > 0.0);
    }

    #[test]
    fn test_raster_pos_roundtrip() {
        for lens_radius in [0.0, 0.2] {
            let camera = test_camera(lens_radius);
            let mut sampler = IndependentSampler::new(7);
            for y in (0..60).step_by(7) {
                for x in (0..80).step_by(9) {
                    sampler.set_pixel(x, y);
                    let ray = camera.generate_ray(x, y, &mut sampler);
                    let raster = camera.raster_pos(&ray).expect("camera ray lands on the image");
                    assert_eq!(raster.x as u32, x, "lens {lens_radius}");
                    assert_eq!(raster.y as u32, y, "lens {lens_radius}");
                }
            }
        }
    }

    #[test]
    fn test_importance_over_pdf_is_one() {
        // Sampling a camera ray with the camera's own densities has unit weight
        for lens_radius in [0.0, 0.2] {
            let camera = test_camera(lens_radius);
            let ray = camera.generate_ray_at(Vec2::new(13.3, 51.7), Vec2::new(0.3, 0.8));
            let we = camera.ie(&ray).x;
            let (pdf_pos, pdf_dir) = camera.pdf_ie(&ray);
            let cos = ray.direction.dot(camera.forward());
            let weight = we * cos / (pdf_pos * pdf_dir);
            assert!((weight - 1.0).abs() < 1e-3, "weight {weight}");
        }
    }

    #[test]
    fn test_sample_ii_projects_point() {
        let camera = test_camera(0.0);
        // A point straight ahead lands in the middle of the image
        let s = camera.sample_ii(Vec3::new(0.0, 1.0, -5.0), Vec2::splat(0.5)).unwrap();
        assert!((s.raster - Vec2::new(40.0, 30.0)).length() < 1e-3);
        assert!((s.wi - Vec3::Z).length() < 1e-5);
        assert!((s.pdf - 100.0).abs() < 1e-2);

        // Behind the camera
        assert!(camera.sample_ii(Vec3::new(0.0, 1.0, 10.0), Vec2::splat(0.5)).is_none());
    }
}
