//! Material trait for surface scattering.
//!
//! All directions point away from the surface. `n` is the shading normal;
//! integrators flip it towards `wo` for reflective materials and leave it
//! untouched for transmissive ones, which need to know which side is inside.
//! Returned values exclude the cosine foreshortening term.

use crate::spectrum::Spectrum;
use bitflags::bitflags;
use lux_math::warp::{cosine_hemisphere, cosine_hemisphere_pdf};
use lux_math::{Frame, Vec2, Vec3};
use std::f32::consts::FRAC_1_PI;

bitflags! {
    /// Scattering lobes a material (or a single sample) uses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BsdfFlags: u8 {
        const REFLECTION = 1 << 0;
        const TRANSMISSION = 1 << 1;
        const DIFFUSE = 1 << 2;
        const GLOSSY = 1 << 3;
        /// Dirac distribution, never reachable by area sampling
        const DELTA = 1 << 4;
    }
}

impl BsdfFlags {
    #[inline]
    pub fn is_delta(self) -> bool {
        self.contains(BsdfFlags::DELTA)
    }

    #[inline]
    pub fn is_transmissive(self) -> bool {
        self.contains(BsdfFlags::TRANSMISSION)
    }
}

/// Which quantity is carried along the path.
///
/// Camera paths carry radiance, light paths carry importance. Refraction
/// scales the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Radiance,
    Importance,
}

/// A sampled scattering direction.
#[derive(Debug, Clone, Copy)]
pub struct BsdfSample {
    pub wi: Vec3,
    pub value: Spectrum,
    /// Solid-angle density, or the discrete probability for delta lobes
    pub pdf: f32,
    pub flags: BsdfFlags,
    /// Relative index of refraction `eta_t / eta_i` crossed by `wi`; 1 for reflection
    pub eta: f32,
}

/// Trait for materials that describe how light interacts with surfaces.
pub trait Material: Send + Sync {
    fn flags(&self) -> BsdfFlags;

    /// BSDF value for the pair of directions. Zero for delta materials.
    fn eval(&self, n: Vec3, wo: Vec3, wi: Vec3, mode: TransportMode) -> Spectrum;

    /// Solid-angle density of sampling `wi` given `wo`. Zero for delta materials.
    fn pdf(&self, n: Vec3, wo: Vec3, wi: Vec3, mode: TransportMode) -> f32;

    /// Sample an incident direction. `None` when the sample is rejected.
    fn sample(&self, n: Vec3, wo: Vec3, u: Vec2, mode: TransportMode) -> Option<BsdfSample>;

    fn is_delta(&self) -> bool {
        self.flags().is_delta()
    }
}

/// Lambertian (diffuse) material.
#[derive(Debug, Clone)]
pub struct Lambertian {
    albedo: Spectrum,
}

impl Lambertian {
    /// Create a new Lambertian material with the given albedo color.
    pub fn new(albedo: Spectrum) -> Self {
        Self { albedo }
    }
}

impl Material for Lambertian {
    fn flags(&self) -> BsdfFlags {
        BsdfFlags::REFLECTION | BsdfFlags::DIFFUSE
    }

    fn eval(&self, n: Vec3, wo: Vec3, wi: Vec3, _mode: TransportMode) -> Spectrum {
        if same_hemisphere(n, wo, wi) {
            self.albedo * FRAC_1_PI
        } else {
            Spectrum::ZERO
        }
    }

    fn pdf(&self, n: Vec3, wo: Vec3, wi: Vec3, _mode: TransportMode) -> f32 {
        if same_hemisphere(n, wo, wi) {
            cosine_hemisphere_pdf(n.dot(wi).abs())
        } else {
            0.0
        }
    }

    fn sample(&self, n: Vec3, wo: Vec3, u: Vec2, _mode: TransportMode) -> Option<BsdfSample> {
        let side = if n.dot(wo) < 0.0 { -n } else { n };
        let wi = Frame::from_normal(side).to_world(cosine_hemisphere(u));
        let pdf = cosine_hemisphere_pdf(side.dot(wi));
        if pdf <= 0.0 {
            return None;
        }
        Some(BsdfSample {
            wi,
            value: self.albedo * FRAC_1_PI,
            pdf,
            flags: self.flags(),
            eta: 1.0,
        })
    }
}

/// Perfect specular reflector.
#[derive(Debug, Clone)]
pub struct Mirror {
    albedo: Spectrum,
}

impl Mirror {
    pub fn new(albedo: Spectrum) -> Self {
        Self { albedo }
    }
}

impl Material for Mirror {
    fn flags(&self) -> BsdfFlags {
        BsdfFlags::REFLECTION | BsdfFlags::DELTA
    }

    fn eval(&self, _n: Vec3, _wo: Vec3, _wi: Vec3, _mode: TransportMode) -> Spectrum {
        Spectrum::ZERO
    }

    fn pdf(&self, _n: Vec3, _wo: Vec3, _wi: Vec3, _mode: TransportMode) -> f32 {
        0.0
    }

    fn sample(&self, n: Vec3, wo: Vec3, _u: Vec2, _mode: TransportMode) -> Option<BsdfSample> {
        let wi = reflect(wo, n);
        let cos = n.dot(wi).abs();
        if cos == 0.0 {
            return None;
        }
        Some(BsdfSample {
            wi,
            value: self.albedo / cos,
            pdf: 1.0,
            flags: self.flags(),
            eta: 1.0,
        })
    }
}

/// Dielectric (glass) material: specular reflection and refraction.
#[derive(Debug, Clone)]
pub struct Dielectric {
    /// Index of refraction
    ior: f32,
}

impl Dielectric {
    /// Create a new Dielectric material.
    ///
    /// - `ior`: Index of refraction (1.0 = air, 1.5 = glass, 2.4 = diamond)
    pub fn new(ior: f32) -> Self {
        Self { ior }
    }

    /// Schlick's approximation for reflectance
    fn reflectance(cosine: f32, ior: f32) -> f32 {
        let r0 = ((1.0 - ior) / (1.0 + ior)).powi(2);
        r0 + (1.0 - r0) * (1.0 - cosine).powi(5)
    }
}

impl Material for Dielectric {
    fn flags(&self) -> BsdfFlags {
        BsdfFlags::REFLECTION | BsdfFlags::TRANSMISSION | BsdfFlags::DELTA
    }

    fn eval(&self, _n: Vec3, _wo: Vec3, _wi: Vec3, _mode: TransportMode) -> Spectrum {
        Spectrum::ZERO
    }

    fn pdf(&self, _n: Vec3, _wo: Vec3, _wi: Vec3, _mode: TransportMode) -> f32 {
        0.0
    }

    fn sample(&self, n: Vec3, wo: Vec3, u: Vec2, mode: TransportMode) -> Option<BsdfSample> {
        // `n` is the outward normal: wo on its side means we are entering
        let entering = n.dot(wo) > 0.0;
        let (eta_i, eta_t, nn) = if entering {
            (1.0, self.ior, n)
        } else {
            (self.ior, 1.0, -n)
        };
        let ratio = eta_i / eta_t;

        let cos_i = nn.dot(wo).clamp(0.0, 1.0);
        let sin2_t = ratio * ratio * (1.0 - cos_i * cos_i);
        let total_internal = sin2_t >= 1.0;
        let cos_t = (1.0 - sin2_t).max(0.0).sqrt();

        let fresnel = if total_internal {
            1.0
        } else {
            // Schlick must use the angle on the optically thinner side
            let cos = if eta_i > eta_t { cos_t } else { cos_i };
            Self::reflectance(cos, ratio)
        };

        if u.x < fresnel {
            let wi = reflect(wo, nn);
            if cos_i == 0.0 {
                return None;
            }
            return Some(BsdfSample {
                wi,
                value: Spectrum::splat(fresnel / cos_i),
                pdf: fresnel,
                flags: BsdfFlags::REFLECTION | BsdfFlags::DELTA,
                eta: 1.0,
            });
        }

        if cos_t == 0.0 {
            return None;
        }
        let wi = (-wo * ratio + (ratio * cos_i - cos_t) * nn).normalize();
        let mut value = Spectrum::splat((1.0 - fresnel) / cos_t);
        if mode == TransportMode::Radiance {
            value *= ratio * ratio;
        }
        Some(BsdfSample {
            wi,
            value,
            pdf: 1.0 - fresnel,
            flags: BsdfFlags::TRANSMISSION | BsdfFlags::DELTA,
            eta: eta_t / eta_i,
        })
    }
}

// =============================================================================
// Helper functions
// =============================================================================

/// Mirror `wo` (pointing away from the surface) about `n`.
#[inline]
pub fn reflect(wo: Vec3, n: Vec3) -> Vec3 {
    2.0 * wo.dot(n) * n - wo
}

#[inline]
fn same_hemisphere(n: Vec3, wo: Vec3, wi: Vec3) -> bool {
    n.dot(wo) * n.dot(wi) > 0.0
}
