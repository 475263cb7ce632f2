//! Ambient occlusion: fraction of a cosine-weighted hemisphere left open
//! within a fixed distance. Useful as a quick geometry preview.

use super::PixelTracer;
use crate::config::RenderConfig;
use crate::film::SplatBuffer;
use crate::sampler::Sampler;
use crate::scene::Scene;
use crate::spectrum::Spectrum;
use lux_math::warp::cosine_hemisphere;
use lux_math::{Frame, Ray};

pub struct AoTracer {
    distance: f32,
}

impl AoTracer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            distance: config.ao_distance,
        }
    }
}

impl PixelTracer for AoTracer {
    fn trace_pixel(&self, scene: &Scene, ray: &Ray, sampler: &mut dyn Sampler, _splats: &SplatBuffer) -> Spectrum {
        let Some(hit) = scene.intersect(ray) else {
            return Spectrum::ONE;
        };

        let n = if hit.ns.dot(ray.direction) > 0.0 { -hit.ns } else { hit.ns };
        let dir = Frame::from_normal(n).to_world(cosine_hemisphere(sampler.get2()));
        let probe = Ray::spawn(hit.p, hit.ng, dir);
        if scene.occluded(&probe, self.distance) {
            Spectrum::ZERO
        } else {
            Spectrum::ONE
        }
    }

    fn name(&self) -> &'static str {
        "ao"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntegratorKind;
    use crate::integrator::tests::render;

    #[test]
    fn test_ao_values_in_unit_range() {
        let config = RenderConfig::default()
            .with_resolution(10, 10)
            .with_threads(2)
            .with_integrator(IntegratorKind::Ao);
        let image = render(&config, 4);
        for p in &image.pixels {
            assert!(p.cmpge(Spectrum::ZERO).all() && p.cmple(Spectrum::ONE).all());
        }
        // Inside a closed box corners are occluded, open walls are not
        let mean = image.mean().x;
        assert!(mean > 0.2 && mean < 1.0, "mean {mean}");
    }

    #[test]
    fn test_ao_open_sky() {
        let config = RenderConfig::default().with_resolution(4, 4);
        let tracer = AoTracer::new(&config);
        let scene = crate::scenes::cornell_box(&config).unwrap();
        let mut sampler = crate::sampler::IndependentSampler::new(0);
        let splats = SplatBuffer::new(4, 4);
        // Pointing away from everything
        let ray = Ray::new(lux_math::Vec3::new(0.0, 0.0, 1e4), lux_math::Vec3::Z);
        assert_eq!(tracer.trace_pixel(&scene, &ray, &mut sampler, &splats), Spectrum::ONE);
    }
}
