//! Light and environment selection for next-event estimation and emission.
//!
//! A scene-wide [`LightSelection`] picks one area light (uniformly or by
//! power) and decides between the lights and the environment. The `sample_li_*`
//! calls on [`Scene`] add a point on the chosen emitter and a shadow ray;
//! any failure yields `None`, which callers treat as a zero contribution.

use crate::config::{EnvSelectStrategy, LightSelectStrategy};
use crate::distribution::Piecewise1D;
use crate::light::PDF_EPSILON;
use crate::sampler::Sampler;
use crate::scene::{LightId, Scene};
use crate::spectrum::Spectrum;
use lux_math::{Ray, Vec3};

/// Something that emits light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emitter {
    Light(LightId),
    Environment,
}

/// Unoccluded emitter sample seen from a receiving point.
#[derive(Debug, Clone, Copy)]
pub struct LiSample {
    pub emitter: Emitter,
    /// Unit direction from the receiver towards the emitter
    pub wi: Vec3,
    /// Point and normal on the emitter; for the environment `p` is at
    /// infinity along `wi` and `n` is `-wi`
    pub p: Vec3,
    pub n: Vec3,
    pub radiance: Spectrum,
    /// Solid-angle density, selection probability included
    pub pdf: f32,
}

/// Discrete choice among the scene's emitters.
#[derive(Debug, Clone)]
pub(crate) struct LightSelection {
    lights: Option<Piecewise1D>,
    /// Probability of picking the environment over the area lights
    p_env: f32,
}

impl LightSelection {
    pub(crate) fn new(
        light_powers: &[f32],
        env_power: Option<f32>,
        light_select: LightSelectStrategy,
        env_select: EnvSelectStrategy,
    ) -> Self {
        let lights = (!light_powers.is_empty()).then(|| match light_select {
            LightSelectStrategy::Uniform => Piecewise1D::new(&vec![1.0; light_powers.len()]),
            // All-zero powers fall back to uniform inside the table
            LightSelectStrategy::ByPower => Piecewise1D::new(light_powers),
        });

        let total_light: f32 = light_powers.iter().filter(|p| p.is_finite()).sum();
        let p_env = match (env_power, lights.is_some()) {
            (None, _) => 0.0,
            (Some(_), false) => 1.0,
            (Some(_), true) if env_select == EnvSelectStrategy::Uniform => 0.5,
            (Some(env), true) => {
                let total = env + total_light;
                if total > 0.0 && total.is_finite() {
                    env / total
                } else {
                    0.5
                }
            }
        };

        log::debug!(
            "Light selection: {} lights ({:?}), environment probability {:.3}",
            light_powers.len(),
            light_select,
            p_env
        );

        Self { lights, p_env }
    }
}

impl Scene {
    /// Pick one area light. Returns `(light, probability)`.
    pub fn sample_one_light(&self, u: f32) -> Option<(LightId, f32)> {
        let lights = self.selection.lights.as_ref()?;
        let (index, pmf, _) = lights.sample(u);
        Some((index, pmf))
    }

    /// Pick the environment with probability [`Scene::pdf_sample_env`], an
    /// area light otherwise. Returns `(emitter, probability)`.
    pub fn sample_light_and_env(&self, u_env: f32, u_light: f32) -> Option<(Emitter, f32)> {
        let p_env = self.selection.p_env;
        if p_env > 0.0 && u_env < p_env {
            return Some((Emitter::Environment, p_env));
        }
        let (light, pmf) = self.sample_one_light(u_light)?;
        Some((Emitter::Light(light), (1.0 - p_env) * pmf))
    }

    /// Probability [`Scene::sample_one_light`] picks `light`.
    pub fn pdf_select_light(&self, light: LightId) -> f32 {
        self.selection.lights.as_ref().map_or(0.0, |l| l.pmf(light))
    }

    /// Probability [`Scene::sample_light_and_env`] picks `light`.
    pub fn pdf_sample_light(&self, light: LightId) -> f32 {
        (1.0 - self.selection.p_env) * self.pdf_select_light(light)
    }

    /// Probability [`Scene::sample_light_and_env`] picks the environment.
    pub fn pdf_sample_env(&self) -> f32 {
        self.selection.p_env
    }

    /// Sample a point on a specific area light from `p` (geometric normal `n`).
    /// The density excludes the light's selection probability.
    pub fn sample_li_light(&self, light: LightId, p: Vec3, n: Vec3, sampler: &mut dyn Sampler) -> Option<LiSample> {
        let s = self.light(light).sample_li(self.light_shape(light), p, sampler.get2())?;
        if !self.visible(p, n, s.p, s.n) {
            return None;
        }
        valid(LiSample {
            emitter: Emitter::Light(light),
            wi: s.wi,
            p: s.p,
            n: s.n,
            radiance: s.radiance,
            pdf: s.pdf,
        })
    }

    /// One light chosen by [`Scene::sample_one_light`], then a point on it.
    pub fn sample_li_one_light(&self, p: Vec3, n: Vec3, sampler: &mut dyn Sampler) -> Option<LiSample> {
        let (light, pmf) = self.sample_one_light(sampler.get1())?;
        let mut s = self.sample_li_light(light, p, n, sampler)?;
        s.pdf *= pmf;
        valid(s)
    }

    /// A direction towards the environment. The density excludes the
    /// environment's selection probability.
    pub fn sample_li_env(&self, p: Vec3, n: Vec3, sampler: &mut dyn Sampler) -> Option<LiSample> {
        let env = self.environment()?;
        let s = env.sample_li(sampler.get2())?;
        if self.occluded(&Ray::spawn(p, n, s.wi), f32::INFINITY) {
            return None;
        }
        valid(LiSample {
            emitter: Emitter::Environment,
            wi: s.wi,
            p: p + s.wi * f32::MAX.sqrt(),
            n: -s.wi,
            radiance: s.radiance,
            pdf: s.pdf,
        })
    }

    /// Environment or one light, chosen by [`Scene::sample_light_and_env`].
    pub fn sample_li_light_and_env(&self, p: Vec3, n: Vec3, sampler: &mut dyn Sampler) -> Option<LiSample> {
        let u = sampler.get2();
        let (emitter, pmf) = self.sample_light_and_env(u.x, u.y)?;
        let mut s = match emitter {
            Emitter::Environment => self.sample_li_env(p, n, sampler)?,
            Emitter::Light(light) => self.sample_li_light(light, p, n, sampler)?,
        };
        s.pdf *= pmf;
        valid(s)
    }

    /// Density of [`Scene::sample_li_light_and_env`] producing the point `light_p`
    /// (normal `light_n`) on `light`, seen from `ref_p`.
    pub fn pdf_li_light(&self, light: LightId, ref_p: Vec3, light_p: Vec3, light_n: Vec3) -> f32 {
        self.pdf_sample_light(light) * self.light(light).pdf_li(self.light_shape(light), ref_p, light_p, light_n)
    }

    /// Density of [`Scene::sample_li_light_and_env`] producing environment direction `dir`.
    pub fn pdf_li_env(&self, dir: Vec3) -> f32 {
        self.environment()
            .map_or(0.0, |env| self.pdf_sample_env() * env.pdf_li(dir))
    }
}

fn valid(s: LiSample) -> Option<LiSample> {
    (s.pdf.is_finite() && s.pdf >= PDF_EPSILON).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::environment::ConstantEnvironment;
    use crate::sampler::IndependentSampler;
    use crate::scene::SceneBuilder;
    use crate::{Camera, Lambertian, Quad};

    fn lit_scene(config: &RenderConfig, env: bool) -> Scene {
        let mut builder = SceneBuilder::new(Camera::new());
        let grey = builder.add_material(Lambertian::new(Spectrum::splat(0.5)));
        builder.add_object(Quad::new(Vec3::new(-2.0, 0.0, -2.0), Vec3::Z * 4.0, Vec3::X * 4.0), grey);
        for (i, power) in [1.0, 4.0, 10.0].iter().enumerate() {
            let x = i as f32 * 1.2 - 1.5;
            builder.add_area_light(
                Quad::new(Vec3::new(x, 2.0, -0.5), Vec3::X, Vec3::Z),
                Spectrum::splat(*power),
                false,
            );
        }
        if env {
            builder.set_environment(ConstantEnvironment::new(Spectrum::splat(0.2)));
        }
        builder.build(config).unwrap()
    }

    #[test]
    fn test_selection_pdfs_sum_to_one() {
        for (light_select, env_select) in [
            (LightSelectStrategy::ByPower, EnvSelectStrategy::ByPower),
            (LightSelectStrategy::Uniform, EnvSelectStrategy::Uniform),
        ] {
            let mut config = RenderConfig::default();
            config.light_select = light_select;
            config.env_select = env_select;
            for env in [false, true] {
                let scene = lit_scene(&config, env);
                let total: f32 = (0..scene.lights().len())
                    .map(|l| scene.pdf_sample_light(l))
                    .sum::<f32>()
                    + scene.pdf_sample_env();
                assert!((total - 1.0).abs() < 1e-5, "total {total}");
            }
        }
    }

    #[test]
    fn test_by_power_prefers_bright_lights() {
        let scene = lit_scene(&RenderConfig::default(), false);
        assert!(scene.pdf_select_light(2) > scene.pdf_select_light(1));
        assert!(scene.pdf_select_light(1) > scene.pdf_select_light(0));
        assert!((scene.pdf_select_light(2) - 10.0 / 15.0).abs() < 1e-5);
        assert_eq!(scene.pdf_sample_env(), 0.0);
    }

    #[test]
    fn test_sampled_choice_matches_pdf() {
        let scene = lit_scene(&RenderConfig::default(), true);
        for i in 0..100 {
            let u = (i as f32 + 0.5) / 100.0;
            let (emitter, pmf) = scene.sample_light_and_env(u, 1.0 - u).unwrap();
            let expected = match emitter {
                Emitter::Environment => scene.pdf_sample_env(),
                Emitter::Light(l) => scene.pdf_sample_light(l),
            };
            assert!((pmf - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sample_li_pdf_matches_lookup() {
        let scene = lit_scene(&RenderConfig::default(), true);
        let mut sampler = IndependentSampler::new(4);
        let p = Vec3::new(0.0, 0.0, 0.0);
        let mut found_light = false;
        for i in 0..64 {
            sampler.set_pixel(i, 0);
            let Some(s) = scene.sample_li_light_and_env(p, Vec3::Y, &mut sampler) else {
                continue;
            };
            let pdf = match s.emitter {
                Emitter::Light(l) => {
                    found_light = true;
                    scene.pdf_li_light(l, p, s.p, s.n)
                }
                Emitter::Environment => scene.pdf_li_env(s.wi),
            };
            assert!((pdf - s.pdf).abs() / s.pdf < 1e-3);
        }
        assert!(found_light);
    }

    #[test]
    fn test_sample_li_light_rejects_tiny_densities() {
        // Huge emitter just above the receiver: nearby points have solid-angle
        // densities far below PDF_EPSILON
        let config = RenderConfig::default();
        let mut builder = SceneBuilder::new(Camera::new());
        builder.add_area_light(
            Quad::new(Vec3::new(-5e4, 1.0, -5e4), Vec3::X * 1e5, Vec3::Z * 1e5),
            Spectrum::ONE,
            false,
        );
        let scene = builder.build(&config).unwrap();
        let mut sampler = IndependentSampler::new(8);
        let mut accepted = 0;
        for i in 0..256 {
            sampler.set_pixel(i, 0);
            if let Some(s) = scene.sample_li_light(0, Vec3::ZERO, Vec3::Y, &mut sampler) {
                assert!(s.pdf.is_finite() && s.pdf >= PDF_EPSILON, "pdf {}", s.pdf);
                accepted += 1;
            }
        }
        assert!(accepted > 0);
    }
}
