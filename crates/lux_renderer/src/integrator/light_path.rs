//! Light tracing: paths start on emitters and every non-specular vertex is
//! connected to the camera. All contributions are splats.

use super::{oriented_shading_normal, russian_roulette, shading_normal_correction, Integrator};
use crate::config::RenderConfig;
use crate::film::{Film, ImageBuffer, SplatBuffer};
use crate::light::PDF_EPSILON;
use crate::light_sampling::Emitter;
use crate::material::TransportMode;
use crate::sampler::{hash_seed, IndependentSampler, Sampler};
use crate::scene::{ObjectKind, Scene};
use crate::spectrum::{Spectrum, SpectrumExt};
use crate::RenderResult;
use lux_math::Ray;
use rayon::prelude::*;
use std::time::Instant;

/// Light paths traced by one work item.
const BATCH_SIZE: usize = 4096;

/// Per-path tracing parameters, shared by the workers of a pass.
#[derive(Debug, Clone, Copy)]
struct LightTracer {
    max_depth: usize,
    rr_start_depth: usize,
}

pub struct LightPathIntegrator {
    tracer: LightTracer,
    pool: rayon::ThreadPool,
    seed: u64,
    sampler: Box<dyn Sampler>,
    /// Never written; resolves to black under the splats
    film: Film,
    splats: SplatBuffer,
    passes: u32,
    modified: bool,
}

impl LightPathIntegrator {
    pub fn new(config: &RenderConfig) -> RenderResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads())
            .build()?;
        Ok(Self {
            tracer: LightTracer {
                max_depth: config.max_depth,
                rr_start_depth: config.rr_start_depth,
            },
            pool,
            seed: config.seed,
            sampler: Box::new(IndependentSampler::new(config.seed)),
            film: Film::new(config.width, config.height),
            splats: SplatBuffer::new(config.width, config.height),
            passes: 0,
            modified: false,
        })
    }
}

impl LightTracer {
    /// Trace one light path, splatting every camera connection.
    fn trace(&self, scene: &Scene, sampler: &mut dyn Sampler, splats: &SplatBuffer) {
        let camera = scene.camera();
        let u = sampler.get2();
        let Some((emitter, choice_pdf)) = scene.sample_light_and_env(u.x, u.y) else {
            return;
        };
        let u_pos = sampler.get2();
        let u_dir = sampler.get2();

        let le = match emitter {
            Emitter::Light(light) => {
                let Some(le) = scene.light(light).sample_le(scene.light_shape(light), u_pos, u_dir) else {
                    return;
                };

                // The emitter itself seen by the camera
                if let Some(cs) = camera.sample_ii(le.p, sampler.get2()) {
                    let radiance = scene.light(light).le(le.n, cs.wi);
                    if !radiance.is_black() && scene.unoccluded(le.p, le.n, cs.p_lens) {
                        let pdf = choice_pdf * le.pdf_pos * cs.pdf;
                        let value = radiance * cs.importance * (le.n.dot(cs.wi).abs() / pdf);
                        camera_splat(splats, cs.raster, value);
                    }
                }
                le
            }
            Emitter::Environment => {
                let Some(env) = scene.environment() else {
                    return;
                };
                let (center, radius) = scene.bounding_sphere();
                let Some(le) = env.sample_le(center, radius, u_dir, u_pos) else {
                    return;
                };
                le
            }
        };

        let pdf = choice_pdf * le.pdf_pos * le.pdf_dir;
        if !pdf.is_finite() || pdf < PDF_EPSILON {
            return;
        }
        let mut beta = le.radiance * (le.n.dot(le.ray.direction).abs() / pdf);
        let mut ray = le.ray;

        for depth in 0..self.max_depth {
            if beta.is_black() || beta.has_nan() {
                break;
            }
            let Some(hit) = scene.intersect(&ray) else {
                break;
            };
            let material = match hit.kind {
                ObjectKind::Light { .. } => break,
                ObjectKind::Surface { material } => scene.material(material),
            };
            let wo = -ray.direction;
            let flags = material.flags();
            let ns = oriented_shading_normal(hit.ns, wo, flags.is_transmissive());

            if !flags.is_delta() {
                if let Some(cs) = camera.sample_ii(hit.p, sampler.get2()) {
                    let f = material.eval(ns, wo, cs.wi, TransportMode::Importance);
                    if !f.is_black() && scene.unoccluded(hit.p, hit.ng, cs.p_lens) {
                        let correction =
                            shading_normal_correction(ns, hit.ng, wo, cs.wi, TransportMode::Importance);
                        let value = beta * f * cs.importance * (ns.dot(cs.wi).abs() * correction / cs.pdf);
                        camera_splat(splats, cs.raster, value);
                    }
                }
            }

            let Some(bs) = material.sample(ns, wo, sampler.get2(), TransportMode::Importance) else {
                break;
            };
            if !bs.pdf.is_finite() || bs.pdf < PDF_EPSILON {
                break;
            }
            let correction = shading_normal_correction(ns, hit.ng, wo, bs.wi, TransportMode::Importance);
            beta *= bs.value * (ns.dot(bs.wi).abs() * correction / bs.pdf);
            ray = Ray::spawn(hit.p, hit.ng, bs.wi);

            if depth + 1 >= self.rr_start_depth {
                match russian_roulette(beta, 1.0, sampler.get1()) {
                    Some(b) => beta = b,
                    None => break,
                }
            }
        }
    }
}

fn camera_splat(splats: &SplatBuffer, raster: lux_math::Vec2, value: Spectrum) {
    if value.has_nan() {
        crate::warn_once!("light path: non-finite camera contribution, dropped");
        return;
    }
    splats.splat(raster, value);
}

impl Integrator for LightPathIntegrator {
    fn render_one_pass(&mut self, scene: &Scene) {
        let camera = scene.camera();
        let (width, height) = (camera.image_width, camera.image_height);
        if self.modified || self.film.width() != width || self.film.height() != height {
            self.film = Film::new(width, height);
            self.splats = SplatBuffer::new(width, height);
            self.reset();
        }

        let start = Instant::now();
        let paths = (width as usize) * (height as usize);
        let batches = paths.div_ceil(BATCH_SIZE);
        let pass = u64::from(self.passes);
        let samplers: Vec<Box<dyn Sampler>> = (0..batches)
            .map(|batch| self.sampler.copy(hash_seed(&[self.seed, pass, batch as u64])))
            .collect();

        let tracer = self.tracer;
        let splats = &self.splats;
        self.pool.install(|| {
            samplers
                .into_par_iter()
                .enumerate()
                .for_each(|(batch, mut sampler)| {
                    let first = batch * BATCH_SIZE;
                    for i in first..paths.min(first + BATCH_SIZE) {
                        sampler.set_pixel((i - first) as u32, batch as u32);
                        tracer.trace(scene, sampler.as_mut(), splats);
                    }
                });
        });

        self.passes += 1;
        log::info!(
            "light path pass {} ({} paths) in {:.2?}",
            self.passes,
            paths,
            start.elapsed()
        );
    }

    fn reset(&mut self) {
        self.splats.clear();
        self.passes = 0;
        self.modified = false;
    }

    fn set_modified(&mut self) {
        self.modified = true;
    }

    fn passes(&self) -> u32 {
        self.passes
    }

    fn image(&self) -> ImageBuffer {
        let scale = if self.passes == 0 { 0.0 } else { 1.0 / self.passes as f32 };
        ImageBuffer::resolve(&self.film, &self.splats, scale)
    }

    fn name(&self) -> &'static str {
        "light_path"
    }
}
