//! Bidirectional path tracing.
//!
//! Each pixel sample builds a camera subpath and a light subpath and
//! evaluates every connection strategy `(s, t)`: `s` light vertices joined
//! to `t` camera vertices. Strategies are combined with the power heuristic
//! over all ways the same path could have been sampled. `t = 1` strategies
//! land on arbitrary pixels and are splatted.
//!
//! Densities stored on vertices are area densities (solid angle for
//! vertices at infinity). `pdf_fwd` is the density of the vertex under the
//! walk that created it, `pdf_rev` the density had it been sampled from
//! the opposite end.

use super::{oriented_shading_normal, shading_normal_correction, PixelTracer};
use crate::config::{RenderConfig, TRACING_DEPTH_LIMIT};
use crate::film::SplatBuffer;
use crate::light::PDF_EPSILON;
use crate::light_sampling::Emitter;
use crate::material::TransportMode;
use crate::sampler::Sampler;
use crate::scene::{LightId, MaterialId, ObjectKind, Scene};
use crate::spectrum::{Spectrum, SpectrumExt};
use lux_math::{Ray, Vec2, Vec3};
use smallvec::SmallVec;
use std::f32::consts::PI;

/// Longest subpath: camera or emitter plus one vertex per bounce and the
/// terminating emitter.
const PATH_CAPACITY: usize = TRACING_DEPTH_LIMIT + 2;

type Path = SmallVec<[Vertex; PATH_CAPACITY]>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum VertexKind {
    Camera,
    AreaLight { light: LightId },
    /// Environment seen along `dir` (pointing away from the scene)
    EnvLight { dir: Vec3 },
    Surface { material: MaterialId },
}

#[derive(Debug, Clone, Copy)]
struct Vertex {
    kind: VertexKind,
    p: Vec3,
    /// Geometric normal; zero for the camera and the environment
    ng: Vec3,
    /// Shading normal the BSDF is evaluated with
    ns: Vec3,
    /// Unit direction towards the previous vertex of the subpath
    wo: Vec3,
    /// Subpath throughput up to this vertex
    beta: Spectrum,
    pdf_fwd: f32,
    pdf_rev: f32,
    /// Scattered by a delta lobe
    delta: bool,
}

impl Vertex {
    fn camera(p: Vec3, beta: Spectrum) -> Self {
        Self {
            kind: VertexKind::Camera,
            p,
            ng: Vec3::ZERO,
            ns: Vec3::ZERO,
            wo: Vec3::ZERO,
            beta,
            pdf_fwd: 0.0,
            pdf_rev: 0.0,
            delta: false,
        }
    }

    fn area_light(light: LightId, p: Vec3, n: Vec3, beta: Spectrum) -> Self {
        Self {
            kind: VertexKind::AreaLight { light },
            p,
            ng: n,
            ns: n,
            wo: Vec3::ZERO,
            beta,
            pdf_fwd: 0.0,
            pdf_rev: 0.0,
            delta: false,
        }
    }

    /// `p` is a point on the way to the environment; only directions are
    /// ever derived from it.
    fn env_light(dir: Vec3, p: Vec3, beta: Spectrum) -> Self {
        Self {
            kind: VertexKind::EnvLight { dir },
            p,
            ng: Vec3::ZERO,
            ns: Vec3::ZERO,
            wo: Vec3::ZERO,
            beta,
            pdf_fwd: 0.0,
            pdf_rev: 0.0,
            delta: false,
        }
    }

    fn is_on_surface(&self) -> bool {
        self.ng != Vec3::ZERO
    }

    fn is_light(&self) -> bool {
        matches!(self.kind, VertexKind::AreaLight { .. } | VertexKind::EnvLight { .. })
    }

    fn is_infinite(&self) -> bool {
        matches!(self.kind, VertexKind::EnvLight { .. })
    }

    /// Whether a deterministic connection to this vertex can carry energy.
    fn is_connectible(&self, scene: &Scene) -> bool {
        match self.kind {
            VertexKind::Camera | VertexKind::AreaLight { .. } => true,
            VertexKind::EnvLight { .. } => false,
            VertexKind::Surface { material } => !scene.material(material).is_delta(),
        }
    }

    /// Unit direction from `self` to `next`, `None` for coincident points.
    fn direction_to(&self, next: &Vertex) -> Option<Vec3> {
        if let VertexKind::EnvLight { dir } = next.kind {
            return Some(dir);
        }
        if let VertexKind::EnvLight { dir } = self.kind {
            return Some(-dir);
        }
        (next.p - self.p).try_normalize()
    }

    /// Convert a solid-angle density at `self` into an area density at `next`.
    fn convert_density(&self, pdf: f32, next: &Vertex) -> f32 {
        if next.is_infinite() {
            return pdf;
        }
        let w = next.p - self.p;
        let dist2 = w.length_squared();
        if dist2 == 0.0 {
            return 0.0;
        }
        let mut pdf = pdf / dist2;
        if next.is_on_surface() {
            pdf *= next.ng.dot(w / dist2.sqrt()).abs();
        }
        pdf
    }

    /// Area density at `next` of scattering from `self`, having arrived from `prev`.
    fn pdf(&self, scene: &Scene, prev: Option<&Vertex>, next: &Vertex) -> f32 {
        if self.is_light() {
            return self.pdf_light(scene, next);
        }
        let Some(wn) = self.direction_to(next) else {
            return 0.0;
        };
        let pdf = match self.kind {
            VertexKind::Camera => scene.camera().pdf_ie(&Ray::new(self.p, wn)).1,
            VertexKind::Surface { material } => {
                let Some(wp) = prev.and_then(|prev| self.direction_to(prev)) else {
                    return 0.0;
                };
                scene.material(material).pdf(self.ns, wp, wn, TransportMode::Radiance)
            }
            VertexKind::AreaLight { .. } | VertexKind::EnvLight { .. } => 0.0,
        };
        self.convert_density(pdf, next)
    }

    /// Area density at `v` of emitting from the light vertex `self`.
    fn pdf_light(&self, scene: &Scene, v: &Vertex) -> f32 {
        let Some(w) = self.direction_to(v) else {
            return 0.0;
        };
        let mut pdf = match self.kind {
            VertexKind::EnvLight { .. } => {
                let (_, radius) = scene.bounding_sphere();
                1.0 / (PI * radius * radius)
            }
            VertexKind::AreaLight { light } => {
                let dist2 = (v.p - self.p).length_squared();
                let (_, pdf_dir) = scene.light(light).pdf_le(scene.light_shape(light), self.ng, w);
                pdf_dir / dist2
            }
            _ => return 0.0,
        };
        if v.is_on_surface() {
            pdf *= v.ng.dot(w).abs();
        }
        pdf
    }

    /// Density of the light subpath starting at `self` (selection included),
    /// with `v` the vertex it continues to.
    fn pdf_light_origin(&self, scene: &Scene, v: &Vertex) -> f32 {
        match self.kind {
            VertexKind::EnvLight { dir } => scene.pdf_li_env(dir),
            VertexKind::AreaLight { light } => {
                let Some(w) = self.direction_to(v) else {
                    return 0.0;
                };
                let (pdf_pos, _) = scene.light(light).pdf_le(scene.light_shape(light), self.ng, w);
                pdf_pos * scene.pdf_sample_light(light)
            }
            _ => 0.0,
        }
    }

    /// Radiance the light vertex `self` emits towards `v`.
    fn le(&self, scene: &Scene, v: &Vertex) -> Spectrum {
        let Some(w) = self.direction_to(v) else {
            return Spectrum::ZERO;
        };
        match self.kind {
            VertexKind::AreaLight { light } => scene.light(light).le(self.ng, w),
            VertexKind::EnvLight { dir } => scene.environment_radiance(dir),
            _ => Spectrum::ZERO,
        }
    }

    /// BSDF at the surface vertex `self` for light flowing between `wo` and `next`.
    fn f(&self, scene: &Scene, next: &Vertex, mode: TransportMode) -> Spectrum {
        let VertexKind::Surface { material } = self.kind else {
            return Spectrum::ZERO;
        };
        let Some(wi) = self.direction_to(next) else {
            return Spectrum::ZERO;
        };
        scene.material(material).eval(self.ns, self.wo, wi, mode)
            * shading_normal_correction(self.ns, self.ng, self.wo, wi, mode)
    }
}

/// Geometry term between two finite vertices, visibility included.
fn geometry(scene: &Scene, a: &Vertex, b: &Vertex) -> f32 {
    let d = b.p - a.p;
    let dist2 = d.length_squared();
    if dist2 == 0.0 {
        return 0.0;
    }
    let d = d / dist2.sqrt();
    let mut g = 1.0 / dist2;
    if a.is_on_surface() {
        g *= a.ns.dot(d).abs();
    }
    if b.is_on_surface() {
        g *= b.ns.dot(d).abs();
    }
    if g == 0.0 || !scene.visible(a.p, a.ng, b.p, b.ng) {
        return 0.0;
    }
    g
}

/// Power-heuristic weight of strategy `(s, t)` for the path formed by
/// `light[..s]` and `camera[..t]`.
///
/// `sampled` replaces the connecting endpoint when the strategy sampled a
/// new one (`s = 1` resampling or `t = 1`). The subpaths are not modified:
/// every density the connection changes is recomputed on local copies.
fn mis_weight(
    scene: &Scene,
    light: &[Vertex],
    camera: &[Vertex],
    sampled: Option<&Vertex>,
    s: usize,
    t: usize,
) -> f32 {
    if s + t == 2 {
        return 1.0;
    }

    let mut lv: Path = light[..s].iter().copied().collect();
    let mut cv: Path = camera[..t].iter().copied().collect();
    if let Some(v) = sampled {
        if s == 1 {
            lv[0] = *v;
        } else if t == 1 {
            cv[0] = *v;
        }
    }

    // Densities of the connection endpoints and their predecessors in the
    // reverse direction
    let pt_rev = if s > 0 {
        lv[s - 1].pdf(scene, s.checked_sub(2).map(|i| &lv[i]), &cv[t - 1])
    } else {
        cv[t - 1].pdf_light_origin(scene, &cv[t - 2])
    };
    let pt_minus_rev = (t > 1).then(|| {
        if s > 0 {
            cv[t - 1].pdf(scene, Some(&lv[s - 1]), &cv[t - 2])
        } else {
            cv[t - 1].pdf_light(scene, &cv[t - 2])
        }
    });
    let qs_rev = (s > 0).then(|| cv[t - 1].pdf(scene, t.checked_sub(2).map(|i| &cv[i]), &lv[s - 1]));
    let qs_minus_rev = (s > 1).then(|| lv[s - 1].pdf(scene, Some(&cv[t - 1]), &lv[s - 2]));

    cv[t - 1].pdf_rev = pt_rev;
    cv[t - 1].delta = false;
    if let Some(pdf) = pt_minus_rev {
        cv[t - 2].pdf_rev = pdf;
    }
    if let Some(pdf) = qs_rev {
        lv[s - 1].pdf_rev = pdf;
        lv[s - 1].delta = false;
    }
    if let Some(pdf) = qs_minus_rev {
        lv[s - 2].pdf_rev = pdf;
    }

    let remap = |pdf: f32| if pdf != 0.0 { pdf } else { 1.0 };
    let mut sum = 0.0;

    let mut ri = 1.0;
    for i in (1..t).rev() {
        let ratio = remap(cv[i].pdf_rev) / remap(cv[i].pdf_fwd);
        ri *= ratio * ratio;
        if !cv[i].delta && !cv[i - 1].delta {
            sum += ri;
        }
    }

    let mut ri = 1.0;
    for i in (0..s).rev() {
        let ratio = remap(lv[i].pdf_rev) / remap(lv[i].pdf_fwd);
        ri *= ratio * ratio;
        // Emitters are never delta
        let delta_before = i > 0 && lv[i - 1].delta;
        if !lv[i].delta && !delta_before {
            sum += ri;
        }
    }

    1.0 / (1.0 + sum)
}

pub struct BdptTracer {
    max_depth: usize,
    max_connect_depth: usize,
    resample_light: bool,
}

impl BdptTracer {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_connect_depth: config.bdpt_connect_depth(),
            resample_light: config.bdpt_resample_light,
        }
    }

    /// Extend `path` from its last vertex along `ray`, up to `max_bounces`
    /// new vertices. Light-path walks stop silently at emitters; camera-path
    /// walks record them as the final vertex.
    #[allow(clippy::too_many_arguments)]
    fn random_walk(
        &self,
        scene: &Scene,
        mut ray: Ray,
        sampler: &mut dyn Sampler,
        mut beta: Spectrum,
        pdf: f32,
        max_bounces: usize,
        mode: TransportMode,
        path: &mut Path,
    ) {
        if max_bounces == 0 {
            return;
        }
        let mut pdf_fwd = pdf;
        let mut bounces = 0;

        loop {
            if beta.is_black() || beta.has_nan() {
                break;
            }
            let prev = path.len() - 1;
            let Some(hit) = scene.intersect(&ray) else {
                if mode == TransportMode::Radiance && scene.environment().is_some() {
                    let mut v = Vertex::env_light(ray.direction, ray.at(1.0), beta);
                    v.wo = -ray.direction;
                    v.pdf_fwd = pdf_fwd;
                    path.push(v);
                }
                break;
            };
            let wo = -ray.direction;

            let material = match hit.kind {
                ObjectKind::Light { light } => {
                    if mode == TransportMode::Radiance {
                        let mut v = Vertex::area_light(light, hit.p, hit.ng, beta);
                        v.wo = wo;
                        v.pdf_fwd = path[prev].convert_density(pdf_fwd, &v);
                        path.push(v);
                    }
                    break;
                }
                ObjectKind::Surface { material } => material,
            };

            let bsdf = scene.material(material);
            let flags = bsdf.flags();
            let ns = oriented_shading_normal(hit.ns, wo, flags.is_transmissive());
            let mut v = Vertex {
                kind: VertexKind::Surface { material },
                p: hit.p,
                ng: hit.ng,
                ns,
                wo,
                beta,
                pdf_fwd: 0.0,
                pdf_rev: 0.0,
                delta: false,
            };
            v.pdf_fwd = path[prev].convert_density(pdf_fwd, &v);
            path.push(v);
            let current = prev + 1;

            bounces += 1;
            if bounces >= max_bounces {
                break;
            }

            let Some(bs) = bsdf.sample(ns, wo, sampler.get2(), mode) else {
                break;
            };
            if !bs.pdf.is_finite() || bs.pdf < PDF_EPSILON {
                break;
            }
            beta *= bs.value
                * (ns.dot(bs.wi).abs() / bs.pdf)
                * shading_normal_correction(ns, hit.ng, wo, bs.wi, mode);
            pdf_fwd = bs.pdf;
            let mut pdf_rev = bsdf.pdf(ns, bs.wi, wo, mode);
            if bs.flags.is_delta() {
                path[current].delta = true;
                pdf_fwd = 0.0;
                pdf_rev = 0.0;
            }
            let rev = path[current].convert_density(pdf_rev, &path[prev]);
            path[prev].pdf_rev = rev;

            ray = Ray::spawn(hit.p, hit.ng, bs.wi);
        }
    }

    fn generate_camera_subpath(&self, scene: &Scene, ray: &Ray, sampler: &mut dyn Sampler, path: &mut Path) {
        let (_, pdf_dir) = scene.camera().pdf_ie(ray);
        path.push(Vertex::camera(ray.origin, Spectrum::ONE));
        if pdf_dir <= 0.0 {
            return;
        }
        self.random_walk(
            scene,
            *ray,
            sampler,
            Spectrum::ONE,
            pdf_dir,
            self.max_depth + 1,
            TransportMode::Radiance,
            path,
        );
    }

    fn generate_light_subpath(&self, scene: &Scene, sampler: &mut dyn Sampler, path: &mut Path) {
        let u = sampler.get2();
        let Some((emitter, choice_pdf)) = scene.sample_light_and_env(u.x, u.y) else {
            return;
        };
        let u_pos = sampler.get2();
        let u_dir = sampler.get2();

        match emitter {
            Emitter::Light(light) => {
                let Some(le) = scene.light(light).sample_le(scene.light_shape(light), u_pos, u_dir) else {
                    return;
                };
                let mut v = Vertex::area_light(light, le.p, le.n, le.radiance);
                v.pdf_fwd = le.pdf_pos * choice_pdf;
                path.push(v);

                let pdf = choice_pdf * le.pdf_pos * le.pdf_dir;
                let beta = le.radiance * (le.n.dot(le.ray.direction).abs() / pdf);
                self.random_walk(
                    scene,
                    le.ray,
                    sampler,
                    beta,
                    le.pdf_dir,
                    self.max_depth,
                    TransportMode::Importance,
                    path,
                );
            }
            Emitter::Environment => {
                let Some(env) = scene.environment() else {
                    return;
                };
                let (center, radius) = scene.bounding_sphere();
                let Some(le) = env.sample_le(center, radius, u_dir, u_pos) else {
                    return;
                };
                let dir = -le.ray.direction;
                let mut v = Vertex::env_light(dir, le.p, le.radiance);
                v.pdf_fwd = scene.pdf_li_env(dir);
                path.push(v);

                let beta = le.radiance / (choice_pdf * le.pdf_pos * le.pdf_dir);
                self.random_walk(
                    scene,
                    le.ray,
                    sampler,
                    beta,
                    le.pdf_dir,
                    self.max_depth,
                    TransportMode::Importance,
                    path,
                );
                // Rays from infinity: the first hit's density is the disk density
                if path.len() > 1 {
                    let first = &mut path[1];
                    first.pdf_fwd = le.pdf_pos;
                    if first.is_on_surface() {
                        first.pdf_fwd *= le.ray.direction.dot(first.ng).abs();
                    }
                }
            }
        }
    }

    /// Contribution of strategy `(s, t)`, MIS-weighted, together with the
    /// raster position it belongs to when `t = 1`.
    fn connect(
        &self,
        scene: &Scene,
        light: &[Vertex],
        camera: &[Vertex],
        s: usize,
        t: usize,
        sampler: &mut dyn Sampler,
    ) -> Option<(Spectrum, Option<Vec2>)> {
        let pt = &camera[t - 1];
        // Emitters absorb, nothing continues through them
        if t > 1 && s != 0 && pt.is_light() {
            return None;
        }

        let mut sampled = None;
        let mut raster = None;

        let l = if s == 0 {
            if !pt.is_light() {
                return None;
            }
            pt.beta * pt.le(scene, &camera[t - 2])
        } else if t == 1 {
            let qs = &light[s - 1];
            if !qs.is_connectible(scene) {
                return None;
            }
            let cs = scene.camera().sample_ii(qs.p, sampler.get2())?;
            if cs.pdf <= 0.0 || cs.importance.is_black() {
                return None;
            }
            let cam = Vertex::camera(cs.p_lens, cs.importance / cs.pdf);
            let mut l = qs.beta * qs.f(scene, &cam, TransportMode::Importance) * cam.beta;
            if qs.is_on_surface() {
                l *= cs.wi.dot(qs.ns).abs();
            }
            if l.is_black() || !scene.unoccluded(qs.p, qs.ng, cs.p_lens) {
                return None;
            }
            raster = Some(cs.raster);
            sampled = Some(cam);
            l
        } else if s == 1 {
            if !pt.is_connectible(scene) {
                return None;
            }
            if self.resample_light || light[0].is_infinite() {
                let ls = scene.sample_li_light_and_env(pt.p, pt.ng, sampler)?;
                let beta = ls.radiance / ls.pdf;
                let mut v = match ls.emitter {
                    Emitter::Light(id) => Vertex::area_light(id, ls.p, ls.n, beta),
                    Emitter::Environment => Vertex::env_light(ls.wi, pt.p + ls.wi, beta),
                };
                v.pdf_fwd = v.pdf_light_origin(scene, pt);
                let l = pt.beta * pt.f(scene, &v, TransportMode::Radiance) * v.beta * ls.wi.dot(pt.ns).abs();
                sampled = Some(v);
                l
            } else {
                // Reuse the light subpath's own emission point
                let qs = &light[0];
                if qs.pdf_fwd <= 0.0 {
                    return None;
                }
                let l = pt.beta * pt.f(scene, qs, TransportMode::Radiance) * qs.le(scene, pt) / qs.pdf_fwd;
                if l.is_black() {
                    return None;
                }
                l * geometry(scene, qs, pt)
            }
        } else {
            let qs = &light[s - 1];
            if !qs.is_connectible(scene) || !pt.is_connectible(scene) {
                return None;
            }
            let l = qs.beta
                * qs.f(scene, pt, TransportMode::Importance)
                * pt.f(scene, qs, TransportMode::Radiance)
                * pt.beta;
            if l.is_black() {
                return None;
            }
            l * geometry(scene, qs, pt)
        };

        if l.is_black() || l.has_nan() {
            return None;
        }
        let weight = mis_weight(scene, light, camera, sampled.as_ref(), s, t);
        Some((l * weight, raster))
    }
}

impl PixelTracer for BdptTracer {
    fn trace_pixel(&self, scene: &Scene, ray: &Ray, sampler: &mut dyn Sampler, splats: &SplatBuffer) -> Spectrum {
        let mut camera_path = Path::new();
        self.generate_camera_subpath(scene, ray, sampler, &mut camera_path);
        let mut light_path = Path::new();
        self.generate_light_subpath(scene, sampler, &mut light_path);

        let mut l = Spectrum::ZERO;
        for t in 1..=camera_path.len() {
            for s in 0..=light_path.len() {
                let len = s + t;
                if (s == 1 && t == 1) || len < 2 || len - 2 > self.max_depth || len > self.max_connect_depth {
                    continue;
                }
                let Some((contribution, raster)) = self.connect(scene, &light_path, &camera_path, s, t, sampler)
                else {
                    continue;
                };
                match raster {
                    Some(raster) => splats.splat(raster, contribution),
                    None => l += contribution,
                }
            }
        }
        l
    }

    fn name(&self) -> &'static str {
        "bdpt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IntegratorKind;
    use crate::config::EnvSelectStrategy;
    use crate::integrator::tests::{render, render_scene, rmse, sky_and_panel};
    use crate::sampler::IndependentSampler;
    use crate::scenes;

    fn subpaths(scene: &Scene, tracer: &BdptTracer, sampler: &mut dyn Sampler, x: u32, y: u32) -> (Path, Path) {
        sampler.set_pixel(x, y);
        let ray = scene.camera().generate_ray(x, y, sampler);
        let mut camera = Path::new();
        tracer.generate_camera_subpath(scene, &ray, sampler, &mut camera);
        let mut light = Path::new();
        tracer.generate_light_subpath(scene, sampler, &mut light);
        (camera, light)
    }

    #[test]
    fn test_subpath_structure() {
        let config = RenderConfig::default().with_resolution(8, 8);
        let scene = scenes::cornell_box(&config).unwrap();
        let tracer = BdptTracer::new(&config);
        let mut sampler = IndependentSampler::new(4);

        for i in 0..64 {
            let (camera, light) = subpaths(&scene, &tracer, &mut sampler, i % 8, i / 8);
            assert_eq!(camera[0].kind, VertexKind::Camera);
            assert!(camera.len() <= config.max_depth + 2);
            // Only the last camera vertex may be an emitter
            if camera.len() > 2 {
                for v in &camera[1..camera.len() - 1] {
                    assert!(matches!(v.kind, VertexKind::Surface { .. }));
                }
            }
            if let Some(first) = light.first() {
                assert!(matches!(first.kind, VertexKind::AreaLight { .. }));
                assert!(first.pdf_fwd > 0.0);
                assert!(light.len() <= config.max_depth + 1);
                for v in &light[1..] {
                    assert!(matches!(v.kind, VertexKind::Surface { .. }));
                }
            }
        }
    }

    #[test]
    fn test_mis_weight_two_vertex_paths() {
        let config = RenderConfig::default().with_resolution(8, 8);
        let scene = scenes::cornell_box(&config).unwrap();
        let tracer = BdptTracer::new(&config);
        let mut sampler = IndependentSampler::new(9);
        let (camera, light) = subpaths(&scene, &tracer, &mut sampler, 4, 4);
        assert_eq!(mis_weight(&scene, &light, &camera, None, 0, 2), 1.0);
        if !light.is_empty() {
            assert_eq!(mis_weight(&scene, &light, &camera, None, 2, 0), 1.0);
        }
    }

    #[test]
    fn test_mis_weights_in_unit_range() {
        let config = RenderConfig::default().with_resolution(8, 8);
        let scene = scenes::cornell_box(&config).unwrap();
        let tracer = BdptTracer::new(&config);
        let mut sampler = IndependentSampler::new(17);
        let mut checked = 0;

        for i in 0..256 {
            let (camera, light) = subpaths(&scene, &tracer, &mut sampler, i % 8, (i / 8) % 8);
            for t in 2..=camera.len() {
                for s in 2..=light.len() {
                    let w = mis_weight(&scene, &light, &camera, None, s, t);
                    assert!(w.is_finite() && (0.0..=1.0).contains(&w), "w({s},{t}) = {w}");
                    checked += 1;
                }
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_bdpt_matches_path_tracer_per_pixel() {
        let base = RenderConfig::default().with_resolution(12, 12).with_threads(2);
        let path = base.clone().with_integrator(IntegratorKind::Path);
        let reference = render(&path, 256);
        let noise_floor = rmse(&reference, &render(&path.clone().with_seed(1), 256));

        let mut bdpt = base.clone().with_integrator(IntegratorKind::Bdpt).with_seed(2);
        let resample = render(&bdpt, 256);
        bdpt.bdpt_resample_light = false;
        let reuse = render(&bdpt, 256);

        for (name, image) in [("resample", &resample), ("reuse", &reuse)] {
            let err = rmse(&reference, image);
            assert!(err < 1.5 * noise_floor, "{name}: rmse {err}, path noise {noise_floor}");
        }
    }

    #[test]
    fn test_bdpt_matches_path_tracer_under_sky() {
        let base = RenderConfig::default()
            .with_resolution(10, 10)
            .with_threads(2)
            .with_depth(4, 3);
        assert_eq!(base.env_select, EnvSelectStrategy::ByPower);
        let scene = sky_and_panel(&base).unwrap();
        assert!(scene.pdf_sample_env() > 0.0 && scene.pdf_sample_env() < 1.0);

        let path = base.clone().with_integrator(IntegratorKind::Path);
        let reference = render_scene(&path, &scene, 256);
        let noise_floor = rmse(&reference, &render_scene(&path.clone().with_seed(1), &scene, 256));

        let mut bdpt = base.clone().with_integrator(IntegratorKind::Bdpt).with_seed(2);
        for resample in [true, false] {
            bdpt.bdpt_resample_light = resample;
            let image = render_scene(&bdpt, &scene, 256);
            assert!(image.pixels.iter().all(|p| !p.has_nan()));
            let err = rmse(&reference, &image);
            assert!(
                err < 1.5 * noise_floor,
                "resample {resample}: rmse {err}, path noise {noise_floor}"
            );
        }
    }

    #[test]
    fn test_bdpt_glass_and_environment() {
        let config = RenderConfig::default()
            .with_resolution(10, 10)
            .with_threads(2)
            .with_integrator(IntegratorKind::Bdpt);
        let scene = scenes::glass_sphere(&config).unwrap();
        let mut integrator = crate::integrator::create_integrator(&config).unwrap();
        for _ in 0..4 {
            integrator.render_one_pass(&scene);
        }
        let image = integrator.image();
        assert!(image.pixels.iter().all(|p| !p.has_nan()));
        assert!(image.mean().max_component() > 0.0);
    }
}
