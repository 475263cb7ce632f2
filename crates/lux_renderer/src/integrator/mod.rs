//! Progressive integrators.
//!
//! Every integrator renders the image one pass at a time: a pass adds one
//! sample to each pixel (or, for the light tracer, one light path per
//! pixel on average). Camera-driven estimators only describe how a single
//! pixel sample is traced ([`PixelTracer`]); [`PixelIndependentIntegrator`]
//! owns the film and schedules pixels over a rayon pool.

mod ao;
mod bdpt;
mod light_path;
mod path;

pub use ao::AoTracer;
pub use bdpt::BdptTracer;
pub use light_path::LightPathIntegrator;
pub use path::PathTracer;

use crate::config::{IntegratorKind, MisHeuristic, RenderConfig};
use crate::film::{accumulate, Film, ImageBuffer, SplatBuffer};
use crate::material::{BsdfSample, TransportMode};
use crate::sampler::{hash_seed, IndependentSampler, Sampler};
use crate::scene::Scene;
use crate::spectrum::{Spectrum, SpectrumExt};
use crate::{RenderError, RenderResult};
use lux_math::{Ray, Vec3};
use rayon::prelude::*;
use std::time::Instant;

/// A progressive renderer.
pub trait Integrator: Send {
    /// Add one pass of samples to the image.
    fn render_one_pass(&mut self, scene: &Scene);

    /// Drop everything accumulated so far.
    fn reset(&mut self);

    /// Mark the scene or camera as changed; the next pass starts over.
    fn set_modified(&mut self);

    /// Passes accumulated since the last reset.
    fn passes(&self) -> u32;

    /// Current estimate of the image.
    fn image(&self) -> ImageBuffer;

    fn name(&self) -> &'static str;
}

/// Estimates the radiance arriving along one camera ray.
///
/// Contributions that land on other pixels (light-to-camera connections)
/// go to `splats`.
pub trait PixelTracer: Send + Sync {
    fn trace_pixel(
        &self,
        scene: &Scene,
        ray: &Ray,
        sampler: &mut dyn Sampler,
        splats: &SplatBuffer,
    ) -> Spectrum;

    fn name(&self) -> &'static str;
}

/// Renders every pixel independently: one camera ray per pixel and pass,
/// averaged into the film.
///
/// Workers own disjoint runs of columns, so the film is written without
/// locks; only splats go through the shared [`SplatBuffer`].
pub struct PixelIndependentIntegrator<T: PixelTracer> {
    tracer: T,
    pool: rayon::ThreadPool,
    threads: usize,
    seed: u64,
    sampler: Box<dyn Sampler>,
    film: Film,
    splats: SplatBuffer,
    passes: u32,
    splat_scale: f32,
    modified: bool,
}

impl<T: PixelTracer> PixelIndependentIntegrator<T> {
    pub fn new(tracer: T, config: &RenderConfig) -> RenderResult<Self> {
        let threads = config.worker_threads();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
        Ok(Self {
            tracer,
            pool,
            threads,
            seed: config.seed,
            sampler: Box::new(IndependentSampler::new(config.seed)),
            film: Film::new(config.width, config.height),
            splats: SplatBuffer::new(config.width, config.height),
            passes: 0,
            splat_scale: 0.0,
            modified: false,
        })
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    /// Weight applied to splats when resolving the image.
    pub fn splat_scale(&self) -> f32 {
        self.splat_scale
    }

    fn scale_result(&mut self) {
        self.splat_scale = if self.passes == 0 {
            0.0
        } else {
            1.0 / self.passes as f32
        };
    }

    /// Start over when the camera resolution changed or a change was flagged.
    fn prepare(&mut self, width: u32, height: u32) {
        if self.modified || self.film.width() != width || self.film.height() != height {
            if self.film.width() != width || self.film.height() != height {
                self.film = Film::new(width, height);
                self.splats = SplatBuffer::new(width, height);
            }
            self.reset();
        }
    }
}

impl<T: PixelTracer> Integrator for PixelIndependentIntegrator<T> {
    fn render_one_pass(&mut self, scene: &Scene) {
        let camera = scene.camera();
        let (width, height) = (camera.image_width, camera.image_height);
        self.prepare(width, height);

        let start = Instant::now();
        let height_px = height as usize;
        let cols_per_worker = (width as usize).div_ceil(self.threads).max(1);
        let chunk_len = (cols_per_worker * height_px).max(1);
        let workers = (width as usize).div_ceil(cols_per_worker);

        // One sampler per worker, derived from the pass so passes differ
        let pass_seed = hash_seed(&[self.seed, u64::from(self.passes)]);
        let samplers: Vec<Box<dyn Sampler>> =
            (0..workers).map(|_| self.sampler.copy(pass_seed)).collect();

        let pass = self.passes;
        let tracer = &self.tracer;
        let splats = &self.splats;
        let film = &mut self.film;

        self.pool.install(|| {
            film.pixels_mut()
                .par_chunks_mut(chunk_len)
                .zip(samplers.into_par_iter())
                .enumerate()
                .for_each(|(worker, (cells, mut sampler))| {
                    for (i, cell) in cells.iter_mut().enumerate() {
                        let index = worker * chunk_len + i;
                        let x = (index / height_px) as u32;
                        let y = (index % height_px) as u32;

                        sampler.set_pixel(x, y);
                        let ray = camera.generate_ray(x, y, sampler.as_mut());
                        let mut l = tracer.trace_pixel(scene, &ray, sampler.as_mut(), splats);
                        if l.has_nan() {
                            crate::warn_once!("{}: non-finite radiance at pixel ({x}, {y}), dropped", tracer.name());
                            l = Spectrum::ZERO;
                        }
                        *cell = accumulate(*cell, l, pass);
                    }
                });
        });

        self.passes += 1;
        self.scale_result();
        log::info!(
            "{} pass {} ({}x{}) in {:.2?}",
            self.tracer.name(),
            self.passes,
            width,
            height,
            start.elapsed()
        );
    }

    fn reset(&mut self) {
        self.film.clear();
        self.splats.clear();
        self.passes = 0;
        self.splat_scale = 0.0;
        self.modified = false;
    }

    fn set_modified(&mut self) {
        self.modified = true;
    }

    fn passes(&self) -> u32 {
        self.passes
    }

    fn image(&self) -> ImageBuffer {
        ImageBuffer::resolve(&self.film, &self.splats, self.splat_scale)
    }

    fn name(&self) -> &'static str {
        self.tracer.name()
    }
}

/// Build the integrator a configuration asks for.
pub fn create_integrator(config: &RenderConfig) -> RenderResult<Box<dyn Integrator>> {
    config.validate()?;
    Ok(match config.integrator {
        IntegratorKind::Ao => Box::new(PixelIndependentIntegrator::new(AoTracer::new(config), config)?),
        IntegratorKind::Path => Box::new(PixelIndependentIntegrator::new(PathTracer::new(config), config)?),
        IntegratorKind::LightPath => Box::new(LightPathIntegrator::new(config)?),
        IntegratorKind::Bdpt => Box::new(PixelIndependentIntegrator::new(BdptTracer::new(config), config)?),
    })
}

/// Reject scene/integrator pairs that cannot produce an image.
pub fn check_scene(config: &RenderConfig, scene: &Scene) -> RenderResult<()> {
    if config.integrator == IntegratorKind::LightPath && scene.lights().is_empty() && scene.environment().is_none() {
        return Err(RenderError::InvalidScene(
            "light tracing needs an area light or an environment".to_string(),
        ));
    }
    Ok(())
}

/// `pdf_a² / (pdf_a² + pdf_b²)`
#[inline]
pub fn power_heuristic(pdf_a: f32, pdf_b: f32) -> f32 {
    let a = pdf_a * pdf_a;
    let b = pdf_b * pdf_b;
    if a == 0.0 {
        return 0.0;
    }
    if a.is_infinite() {
        return 1.0;
    }
    a / (a + b)
}

/// Weight of a sample drawn with density `pdf_a` when another strategy could
/// have produced it with density `pdf_b`.
#[inline]
pub fn mis_weight(heuristic: MisHeuristic, pdf_a: f32, pdf_b: f32) -> f32 {
    match heuristic {
        MisHeuristic::Power => power_heuristic(pdf_a, pdf_b),
        MisHeuristic::Fixed => {
            if pdf_a <= 0.0 {
                0.0
            } else if pdf_b <= 0.0 {
                1.0
            } else {
                0.5
            }
        }
    }
}

/// Survival test past the Russian roulette start depth. Returns the
/// reweighted throughput, or `None` when the path is terminated.
pub(crate) fn russian_roulette(beta: Spectrum, eta_scale: f32, u: f32) -> Option<Spectrum> {
    let q = (beta.max_component() * eta_scale).clamp(0.0, 1.0);
    (u < q).then(|| beta / q)
}

/// Factor radiance throughput picks up from a refraction: `eta²`.
pub(crate) fn eta_scale_factor(sample: &BsdfSample, mode: TransportMode) -> f32 {
    if mode == TransportMode::Radiance && sample.flags.is_transmissive() {
        sample.eta * sample.eta
    } else {
        1.0
    }
}

/// Adjoint correction for shading normals in importance transport.
pub(crate) fn shading_normal_correction(ns: Vec3, ng: Vec3, wo: Vec3, wi: Vec3, mode: TransportMode) -> f32 {
    if mode == TransportMode::Radiance {
        return 1.0;
    }
    let num = wo.dot(ns).abs() * wi.dot(ng).abs();
    let denom = wo.dot(ng).abs() * wi.dot(ns).abs();
    if denom == 0.0 {
        0.0
    } else {
        num / denom
    }
}

/// Shading normal a BSDF is evaluated with: turned towards `wo` unless the
/// surface transmits, where the side carries the refraction direction.
pub(crate) fn oriented_shading_normal(ns: Vec3, wo: Vec3, transmissive: bool) -> Vec3 {
    if !transmissive && ns.dot(wo) < 0.0 {
        -ns
    } else {
        ns
    }
}
