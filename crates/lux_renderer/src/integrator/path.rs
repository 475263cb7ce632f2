//! Unidirectional path tracing with next-event estimation.

use super::{eta_scale_factor, mis_weight, oriented_shading_normal, russian_roulette, PixelTracer};
use crate::config::{MisHeuristic, RenderConfig};
use crate::film::SplatBuffer;
use crate::light::PDF_EPSILON;
use crate::material::TransportMode;
use crate::sampler::Sampler;
use crate::scene::{ObjectKind, Scene};
use crate::spectrum::{Spectrum, SpectrumExt};
use lux_math::{Ray, Vec3};

/// Path tracer state carried between bounces for weighting emission that
/// is hit by BSDF sampling.
#[derive(Debug, Clone, Copy)]
struct PrevBounce {
    p: Vec3,
    pdf: f32,
    /// Camera ray or delta lobe: emission was not sampled directly
    specular: bool,
}

pub struct PathTracer {
    max_depth: usize,
    rr_start_depth: usize,
    direct_light: bool,
    mis: MisHeuristic,
}

impl PathTracer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            rr_start_depth: config.rr_start_depth,
            direct_light: config.direct_light,
            mis: config.mis,
        }
    }

    /// Weight for emission reached by BSDF sampling whose direct-sampling
    /// density is `pdf_light`.
    fn emission_weight(&self, prev: &PrevBounce, pdf_light: f32) -> f32 {
        if prev.specular || !self.direct_light {
            1.0
        } else {
            mis_weight(self.mis, prev.pdf, pdf_light)
        }
    }
}

impl PixelTracer for PathTracer {
    fn trace_pixel(&self, scene: &Scene, ray: &Ray, sampler: &mut dyn Sampler, _splats: &SplatBuffer) -> Spectrum {
        let mut l = Spectrum::ZERO;
        let mut beta = Spectrum::ONE;
        let mut eta_scale = 1.0;
        let mut ray = *ray;
        let mut prev = PrevBounce {
            p: ray.origin,
            pdf: 0.0,
            specular: true,
        };

        for depth in 0..self.max_depth {
            let Some(hit) = scene.intersect(&ray) else {
                let le = scene.environment_radiance(ray.direction);
                if !le.is_black() {
                    let w = self.emission_weight(&prev, scene.pdf_li_env(ray.direction));
                    l += beta * le * w;
                }
                break;
            };
            let wo = -ray.direction;

            let material = match hit.kind {
                ObjectKind::Light { light } => {
                    let le = scene.light(light).le(hit.ng, wo);
                    if !le.is_black() {
                        let pdf_light = scene.pdf_li_light(light, prev.p, hit.p, hit.ng);
                        l += beta * le * self.emission_weight(&prev, pdf_light);
                    }
                    // Emitters absorb
                    break;
                }
                ObjectKind::Surface { material } => scene.material(material),
            };

            let flags = material.flags();
            let ns = oriented_shading_normal(hit.ns, wo, flags.is_transmissive());

            if self.direct_light && !flags.is_delta() {
                if let Some(ls) = scene.sample_li_light_and_env(hit.p, hit.ng, sampler) {
                    let f = material.eval(ns, wo, ls.wi, TransportMode::Radiance);
                    if !f.is_black() {
                        let pdf_bsdf = material.pdf(ns, wo, ls.wi, TransportMode::Radiance);
                        let w = mis_weight(self.mis, ls.pdf, pdf_bsdf);
                        l += beta * f * ls.radiance * (ns.dot(ls.wi).abs() * w / ls.pdf);
                    }
                }
            }

            let Some(bs) = material.sample(ns, wo, sampler.get2(), TransportMode::Radiance) else {
                break;
            };
            if !bs.pdf.is_finite() || bs.pdf < PDF_EPSILON {
                break;
            }
            beta *= bs.value * (ns.dot(bs.wi).abs() / bs.pdf);
            eta_scale *= eta_scale_factor(&bs, TransportMode::Radiance);
            if beta.is_black() || beta.has_nan() {
                break;
            }

            prev = PrevBounce {
                p: hit.p,
                pdf: bs.pdf,
                specular: bs.flags.is_delta(),
            };
            ray = Ray::spawn(hit.p, hit.ng, bs.wi);

            if depth + 1 >= self.rr_start_depth {
                match russian_roulette(beta, eta_scale, sampler.get1()) {
                    Some(b) => beta = b,
                    None => break,
                }
            }
        }

        l
    }

    fn name(&self) -> &'static str {
        "path"
    }
}
