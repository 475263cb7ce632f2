//! Diffuse area lights attached to scene objects.

use crate::primitive::Primitive;
use crate::scene::ObjectId;
use crate::spectrum::{Spectrum, SpectrumExt};
use lux_math::warp::cosine_hemisphere;
use lux_math::{Frame, Ray, Vec2, Vec3};
use std::f32::consts::{FRAC_1_PI, PI};

/// Densities below this are treated as failed samples.
pub const PDF_EPSILON: f32 = 1e-8;

/// Point sampled on a light as seen from a receiving point.
#[derive(Debug, Clone, Copy)]
pub struct LightLiSample {
    /// Unit direction from the receiver towards the light
    pub wi: Vec3,
    pub p: Vec3,
    pub n: Vec3,
    pub radiance: Spectrum,
    /// Solid-angle density at the receiver
    pub pdf: f32,
}

/// Emitted ray for particle tracing.
#[derive(Debug, Clone, Copy)]
pub struct LightLeSample {
    /// Emission point on the surface (the ray origin is pushed off it)
    pub p: Vec3,
    pub ray: Ray,
    /// Normal the emission cosine is measured against
    pub n: Vec3,
    pub radiance: Spectrum,
    /// Area density of the origin
    pub pdf_pos: f32,
    /// Solid-angle density of the direction
    pub pdf_dir: f32,
}

/// Uniform diffuse emitter covering an object's surface.
#[derive(Debug, Clone)]
pub struct AreaLight {
    object: ObjectId,
    radiance: Spectrum,
    two_sided: bool,
}

impl AreaLight {
    pub fn new(object: ObjectId, radiance: Spectrum, two_sided: bool) -> Self {
        Self {
            object,
            radiance,
            two_sided,
        }
    }

    /// Object whose surface emits.
    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn is_two_sided(&self) -> bool {
        self.two_sided
    }

    /// Radiance leaving a surface point with normal `n` along `w`.
    pub fn le(&self, n: Vec3, w: Vec3) -> Spectrum {
        if self.two_sided || n.dot(w) > 0.0 {
            self.radiance
        } else {
            Spectrum::ZERO
        }
    }

    pub fn sample_li(&self, shape: &dyn Primitive, ref_p: Vec3, u: Vec2) -> Option<LightLiSample> {
        let p = shape.uniform_sample(u);
        let n = shape.normal_geom(p);
        let to_light = p - ref_p;
        let dist2 = to_light.length_squared();
        if dist2 == 0.0 {
            return None;
        }
        let wi = to_light / dist2.sqrt();

        let radiance = self.le(n, -wi);
        if radiance.is_black() {
            return None;
        }

        let pdf = area_to_solid_angle(1.0 / shape.surface_area(), dist2, n.dot(wi).abs());
        if !pdf.is_finite() || pdf < PDF_EPSILON {
            return None;
        }

        Some(LightLiSample {
            wi,
            p,
            n,
            radiance,
            pdf,
        })
    }

    /// Solid-angle density of [`AreaLight::sample_li`] choosing `p` (normal `n`) from `ref_p`.
    pub fn pdf_li(&self, shape: &dyn Primitive, ref_p: Vec3, p: Vec3, n: Vec3) -> f32 {
        let to_light = p - ref_p;
        let dist2 = to_light.length_squared();
        if dist2 == 0.0 {
            return 0.0;
        }
        let wi = to_light / dist2.sqrt();
        if !self.two_sided && n.dot(-wi) <= 0.0 {
            return 0.0;
        }
        let pdf = area_to_solid_angle(1.0 / shape.surface_area(), dist2, n.dot(wi).abs());
        if pdf.is_finite() {
            pdf
        } else {
            0.0
        }
    }

    /// Emit a ray: a uniform point and a cosine-weighted direction.
    pub fn sample_le(&self, shape: &dyn Primitive, u_pos: Vec2, u_dir: Vec2) -> Option<LightLeSample> {
        let p = shape.uniform_sample(u_pos);
        let mut n = shape.normal_geom(p);

        let mut u_dir = u_dir;
        let mut side_pdf = 1.0;
        if self.two_sided {
            side_pdf = 0.5;
            if u_dir.x < 0.5 {
                u_dir.x *= 2.0;
            } else {
                u_dir.x = (u_dir.x - 0.5) * 2.0;
                n = -n;
            }
        }

        let local = cosine_hemisphere(u_dir);
        let w = Frame::from_normal(n).to_world(local);
        let pdf_dir = side_pdf * local.z * FRAC_1_PI;
        if pdf_dir < PDF_EPSILON {
            return None;
        }

        Some(LightLeSample {
            p,
            ray: Ray::spawn(p, n, w),
            n,
            radiance: self.radiance,
            pdf_pos: 1.0 / shape.surface_area(),
            pdf_dir,
        })
    }

    /// `(pdf_pos, pdf_dir)` of [`AreaLight::sample_le`] emitting along `w` from a point with normal `n`.
    pub fn pdf_le(&self, shape: &dyn Primitive, n: Vec3, w: Vec3) -> (f32, f32) {
        let cos = n.dot(w);
        let pdf_dir = if self.two_sided {
            0.5 * cos.abs() * FRAC_1_PI
        } else {
            cos.max(0.0) * FRAC_1_PI
        };
        (1.0 / shape.surface_area(), pdf_dir)
    }

    /// Total emitted power (luminance).
    pub fn power(&self, shape: &dyn Primitive) -> f32 {
        let sides = if self.two_sided { 2.0 } else { 1.0 };
        self.radiance.luminance() * shape.surface_area() * PI * sides
    }
}

/// Convert an area density to solid angle at a receiver `dist2` away.
#[inline]
pub fn area_to_solid_angle(pdf_area: f32, dist2: f32, cos_light: f32) -> f32 {
    if cos_light == 0.0 {
        return 0.0;
    }
    pdf_area * dist2 / cos_light
}
