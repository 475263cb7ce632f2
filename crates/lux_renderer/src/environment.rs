//! Distant lighting surrounding the scene.
//!
//! Directions point from the scene towards the environment. Equirectangular
//! maps are y-up: `theta = acos(y)` runs down the image rows and
//! `phi = atan2(z, x)` in `[0, 2pi)` across the columns.

use crate::distribution::PiecewiseIndependent2D;
use crate::light::{LightLeSample, PDF_EPSILON};
use crate::spectrum::{Spectrum, SpectrumExt};
use crate::{RenderError, RenderResult};
use lux_math::warp::{concentric_disk, uniform_sphere, UNIFORM_SPHERE_PDF};
use lux_math::{Frame, Ray, UVec2, Vec2, Vec3};
use std::f32::consts::PI;
use std::path::Path;

/// Direction sampled towards the environment.
#[derive(Debug, Clone, Copy)]
pub struct EnvLiSample {
    pub wi: Vec3,
    pub radiance: Spectrum,
    /// Solid-angle density
    pub pdf: f32,
}

pub trait Environment: Send + Sync {
    /// Radiance arriving from direction `dir`.
    fn radiance(&self, dir: Vec3) -> Spectrum;

    fn sample_li(&self, u: Vec2) -> Option<EnvLiSample>;

    /// Solid-angle density of [`Environment::sample_li`] choosing `dir`.
    fn pdf_li(&self, dir: Vec3) -> f32;

    /// Power reaching a scene bounded by a sphere of radius `scene_radius`.
    fn power(&self, scene_radius: f32) -> f32;

    /// Emit a ray into a scene bounded by the sphere `(center, radius)`: a
    /// direction from [`Environment::sample_li`] and an origin on the disk
    /// facing it.
    fn sample_le(&self, center: Vec3, radius: f32, u_dir: Vec2, u_pos: Vec2) -> Option<LightLeSample> {
        let sample = self.sample_li(u_dir)?;
        let frame = Frame::from_normal(sample.wi);
        let d = concentric_disk(u_pos);
        let origin = center + radius * (sample.wi + frame.s * d.x + frame.t * d.y);
        let direction = -sample.wi;

        Some(LightLeSample {
            p: origin,
            ray: Ray::new(origin, direction),
            n: direction,
            radiance: sample.radiance,
            pdf_pos: 1.0 / (PI * radius * radius),
            pdf_dir: sample.pdf,
        })
    }

    /// `(pdf_pos, pdf_dir)` of emitting a ray travelling along `direction`.
    fn pdf_le(&self, radius: f32, direction: Vec3) -> (f32, f32) {
        (1.0 / (PI * radius * radius), self.pdf_li(-direction))
    }
}

/// Same radiance from every direction.
#[derive(Debug, Clone)]
pub struct ConstantEnvironment {
    radiance: Spectrum,
}

impl ConstantEnvironment {
    pub fn new(radiance: Spectrum) -> Self {
        Self { radiance }
    }
}

impl Environment for ConstantEnvironment {
    fn radiance(&self, _dir: Vec3) -> Spectrum {
        self.radiance
    }

    fn sample_li(&self, u: Vec2) -> Option<EnvLiSample> {
        if self.radiance.is_black() {
            return None;
        }
        Some(EnvLiSample {
            wi: uniform_sphere(u),
            radiance: self.radiance,
            pdf: UNIFORM_SPHERE_PDF,
        })
    }

    fn pdf_li(&self, _dir: Vec3) -> f32 {
        UNIFORM_SPHERE_PDF
    }

    fn power(&self, scene_radius: f32) -> f32 {
        PI * scene_radius * scene_radius * 4.0 * PI * self.radiance.luminance()
    }
}

/// Equirectangular environment map, importance sampled by luminance.
pub struct ImageEnvironment {
    width: u32,
    height: u32,
    pixels: Vec<Spectrum>,
    distribution: PiecewiseIndependent2D,
}

impl ImageEnvironment {
    /// Build from row-major linear RGB pixels, top row first.
    pub fn new(width: u32, height: u32, pixels: Vec<Spectrum>) -> RenderResult<Self> {
        if width == 0 || height == 0 || pixels.len() != (width as usize) * (height as usize) {
            return Err(RenderError::InvalidScene(format!(
                "environment map {}x{} needs {} pixels, got {}",
                width,
                height,
                width as usize * height as usize,
                pixels.len()
            )));
        }

        // Rows cover equal theta bands whose solid angle shrinks with sin(theta)
        let weights: Vec<f32> = pixels
            .iter()
            .enumerate()
            .map(|(i, px)| {
                let row = i / width as usize;
                let theta = PI * (row as f32 + 0.5) / height as f32;
                px.luminance().max(0.0) * theta.sin()
            })
            .collect();
        let distribution = PiecewiseIndependent2D::new(&weights, width, height);

        log::debug!("Environment map {}x{}", width, height);

        Ok(Self {
            width,
            height,
            pixels,
            distribution,
        })
    }

    /// Load an equirectangular map (HDR, EXR, PNG, ...).
    pub fn open(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let img = image::open(path)?.into_rgb32f();
        let (width, height) = img.dimensions();
        let pixels = img
            .pixels()
            .map(|p| Spectrum::new(p[0], p[1], p[2]))
            .collect();
        log::info!("Loaded environment {} ({}x{})", path.display(), width, height);
        Self::new(width, height, pixels)
    }

    fn direction_to_uv(dir: Vec3) -> Vec2 {
        let theta = dir.y.clamp(-1.0, 1.0).acos();
        let mut phi = dir.z.atan2(dir.x);
        if phi < 0.0 {
            phi += 2.0 * PI;
        }
        Vec2::new(phi / (2.0 * PI), theta / PI)
    }

    fn uv_to_direction(uv: Vec2) -> Vec3 {
        let theta = uv.y * PI;
        let phi = uv.x * 2.0 * PI;
        let sin_theta = theta.sin();
        Vec3::new(sin_theta * phi.cos(), theta.cos(), sin_theta * phi.sin())
    }

    fn cell(&self, uv: Vec2) -> UVec2 {
        let x = ((uv.x * self.width as f32) as u32).min(self.width - 1);
        let y = ((uv.y * self.height as f32) as u32).min(self.height - 1);
        UVec2::new(x, y)
    }

    /// Converts a cell probability to a solid-angle density.
    fn solid_angle_pdf(&self, pmf: f32, sin_theta: f32) -> f32 {
        if sin_theta <= 0.0 {
            return 0.0;
        }
        pmf * (self.width * self.height) as f32 / (2.0 * PI * PI * sin_theta)
    }
}

impl Environment for ImageEnvironment {
    fn radiance(&self, dir: Vec3) -> Spectrum {
        let c = self.cell(Self::direction_to_uv(dir));
        self.pixels[(c.y * self.width + c.x) as usize]
    }

    fn sample_li(&self, u: Vec2) -> Option<EnvLiSample> {
        let (cell, pmf, jitter) = self.distribution.sample(u);
        let uv = (cell.as_vec2() + jitter) / self.distribution.resolution().as_vec2();
        let wi = Self::uv_to_direction(uv);
        let pdf = self.solid_angle_pdf(pmf, (uv.y * PI).sin());
        if !pdf.is_finite() || pdf < PDF_EPSILON {
            return None;
        }
        Some(EnvLiSample {
            wi,
            radiance: self.pixels[(cell.y * self.width + cell.x) as usize],
            pdf,
        })
    }

    fn pdf_li(&self, dir: Vec3) -> f32 {
        let uv = Self::direction_to_uv(dir);
        let pmf = self.distribution.pmf(self.cell(uv));
        self.solid_angle_pdf(pmf, (uv.y * PI).sin())
    }

    fn power(&self, scene_radius: f32) -> f32 {
        // Sum of luminance * sin(theta) over pixels, times the per-pixel (phi, theta) extent
        let integral =
            self.distribution.sum() * (2.0 * PI / self.width as f32) * (PI / self.height as f32);
        PI * scene_radius * scene_radius * integral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn gradient_map() -> ImageEnvironment {
        let (w, h) = (16, 8);
        let pixels = (0..w * h)
            .map(|i| {
                let x = (i % w) as f32;
                Spectrum::splat(0.1 + x * x)
            })
            .collect();
        ImageEnvironment::new(w, h, pixels).unwrap()
    }

    #[test]
    fn test_uv_direction_roundtrip() {
        for dir in [
            Vec3::new(0.3, 0.5, -0.2).normalize(),
            Vec3::new(-0.7, -0.1, 0.4).normalize(),
            Vec3::new(0.1, 0.9, 0.3).normalize(),
        ] {
            let uv = ImageEnvironment::direction_to_uv(dir);
            assert!((ImageEnvironment::uv_to_direction(uv) - dir).length() < 1e-4);
        }
    }

    #[test]
    fn test_image_environment_pdf_consistent() {
        let env = gradient_map();
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..500 {
            let s = match env.sample_li(Vec2::new(rng.gen(), rng.gen())) {
                Some(s) => s,
                None => continue,
            };
            let pdf = env.pdf_li(s.wi);
            assert!((pdf - s.pdf).abs() / s.pdf < 1e-2, "{pdf} vs {}", s.pdf);
            assert_eq!(env.radiance(s.wi), s.radiance);
        }
    }

    #[test]
    fn test_image_environment_pdf_integrates_to_one() {
        let env = gradient_map();
        // Midpoint rule over (theta, phi); the grid refines the 16x8 cells exactly
        let (nt, np) = (256, 512);
        let (dt, dp) = (PI / nt as f32, 2.0 * PI / np as f32);
        let mut integral = 0.0f64;
        for i in 0..nt {
            let theta = (i as f32 + 0.5) * dt;
            for j in 0..np {
                let uv = Vec2::new((j as f32 + 0.5) / np as f32, theta / PI);
                let dir = ImageEnvironment::uv_to_direction(uv);
                integral += f64::from(env.pdf_li(dir) * theta.sin() * dt * dp);
            }
        }
        assert!((integral - 1.0).abs() < 1e-3, "integral {integral}");
    }

    #[test]
    fn test_constant_environment_power_matches_image() {
        let constant = ConstantEnvironment::new(Spectrum::ONE);
        let image = ImageEnvironment::new(64, 32, vec![Spectrum::ONE; 64 * 32]).unwrap();
        let a = constant.power(2.0);
        let b = image.power(2.0);
        assert!((a - b).abs() / a < 1e-2, "{a} vs {b}");
    }

    #[test]
    fn test_image_environment_rejects_bad_size() {
        assert!(matches!(
            ImageEnvironment::new(4, 4, vec![Spectrum::ONE; 3]),
            Err(RenderError::InvalidScene(_))
        ));
    }

    #[test]
    fn test_environment_sample_le_hits_scene_disk() {
        let env = ConstantEnvironment::new(Spectrum::ONE);
        let s = env
            .sample_le(Vec3::ZERO, 2.0, Vec2::new(0.3, 0.6), Vec2::new(0.5, 0.5))
            .unwrap();
        // Disk center lies on the line through the scene center
        assert!((s.ray.origin.length() - 2.0).abs() < 1e-4);
        assert!(s.ray.direction.dot(-s.ray.origin.normalize()) > 0.999);
        assert!((s.pdf_pos - 1.0 / (4.0 * PI)).abs() < 1e-6);
    }
}
