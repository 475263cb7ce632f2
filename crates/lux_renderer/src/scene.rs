//! Scene assembly and ray queries.
//!
//! Objects live in one arena addressed by [`ObjectId`]; the BVH, area lights
//! and hit records refer to them by index. Whether an object scatters or
//! emits is carried explicitly by [`ObjectKind`].

use crate::bvh::Bvh;
use crate::camera::Camera;
use crate::config::RenderConfig;
use crate::environment::Environment;
use crate::light::AreaLight;
use crate::light_sampling::LightSelection;
use crate::material::Material;
use crate::primitive::{Hittable, Primitive};
use crate::spectrum::Spectrum;
use crate::{RenderError, RenderResult};
use lux_math::{Aabb, Interval, Ray, Vec2, Vec3};

pub type ObjectId = usize;
pub type MaterialId = usize;
pub type LightId = usize;

/// What a surface does with light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Surface { material: MaterialId },
    /// Emitter; absorbs everything that reaches it
    Light { light: LightId },
}

pub struct Object {
    pub shape: Box<dyn Primitive>,
    pub kind: ObjectKind,
}

impl Hittable for Object {
    fn bound(&self) -> Aabb {
        self.shape.bound()
    }

    fn closest_hit(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        self.shape.closest_hit(ray, ray_t)
    }
}

/// Closest intersection along a ray.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceHit {
    pub t: f32,
    pub p: Vec3,
    /// Outward geometric normal
    pub ng: Vec3,
    /// Outward shading normal
    pub ns: Vec3,
    pub uv: Vec2,
    pub object: ObjectId,
    pub kind: ObjectKind,
}

/// Collects scene content, then validates it and builds the BVH.
pub struct SceneBuilder {
    camera: Camera,
    materials: Vec<Box<dyn Material>>,
    objects: Vec<Object>,
    lights: Vec<AreaLight>,
    environment: Option<Box<dyn Environment>>,
}

impl SceneBuilder {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            materials: Vec::new(),
            objects: Vec::new(),
            lights: Vec::new(),
            environment: None,
        }
    }

    pub fn add_material(&mut self, material: impl Material + 'static) -> MaterialId {
        self.materials.push(Box::new(material));
        self.materials.len() - 1
    }

    pub fn add_object(&mut self, shape: impl Primitive + 'static, material: MaterialId) -> ObjectId {
        self.objects.push(Object {
            shape: Box::new(shape),
            kind: ObjectKind::Surface { material },
        });
        self.objects.len() - 1
    }

    /// Add an emitting object with radiance `radiance`.
    pub fn add_area_light(
        &mut self,
        shape: impl Primitive + 'static,
        radiance: Spectrum,
        two_sided: bool,
    ) -> ObjectId {
        let object = self.objects.len();
        let light = self.lights.len();
        self.lights.push(AreaLight::new(object, radiance, two_sided));
        self.objects.push(Object {
            shape: Box::new(shape),
            kind: ObjectKind::Light { light },
        });
        object
    }

    pub fn set_environment(&mut self, environment: impl Environment + 'static) {
        self.environment = Some(Box::new(environment));
    }

    pub fn build(self, config: &RenderConfig) -> RenderResult<Scene> {
        for (id, object) in self.objects.iter().enumerate() {
            if let ObjectKind::Surface { material } = object.kind {
                if material >= self.materials.len() {
                    return Err(RenderError::InvalidScene(format!(
                        "object {id} uses material {material}, only {} defined",
                        self.materials.len()
                    )));
                }
            }
        }

        let mut camera = self.camera.with_resolution(config.width, config.height);
        camera.initialize();

        let bvh = Bvh::new(&self.objects);
        let (center, radius) = bvh.bound().union_point(camera.position()).bounding_sphere();
        let radius = radius.max(1e-3);

        let light_powers: Vec<f32> = self
            .lights
            .iter()
            .map(|l| l.power(self.objects[l.object()].shape.as_ref()))
            .collect();
        let env_power = self.environment.as_ref().map(|e| e.power(radius));
        let selection = LightSelection::new(&light_powers, env_power, config.light_select, config.env_select);

        log::info!(
            "Scene: {} objects, {} materials, {} area lights, environment: {}",
            self.objects.len(),
            self.materials.len(),
            self.lights.len(),
            if self.environment.is_some() { "yes" } else { "no" }
        );

        Ok(Scene {
            camera,
            materials: self.materials,
            objects: self.objects,
            lights: self.lights,
            environment: self.environment,
            bvh,
            center,
            radius,
            selection,
        })
    }
}

/// Immutable scene shared by all render threads.
pub struct Scene {
    camera: Camera,
    materials: Vec<Box<dyn Material>>,
    objects: Vec<Object>,
    lights: Vec<AreaLight>,
    environment: Option<Box<dyn Environment>>,
    bvh: Bvh,
    center: Vec3,
    radius: f32,
    pub(crate) selection: LightSelection,
}

impl Scene {
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn material(&self, id: MaterialId) -> &dyn Material {
        self.materials[id].as_ref()
    }

    pub fn object(&self, id: ObjectId) -> &Object {
        &self.objects[id]
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn lights(&self) -> &[AreaLight] {
        &self.lights
    }

    pub fn light(&self, id: LightId) -> &AreaLight {
        &self.lights[id]
    }

    /// Shape an area light emits from.
    pub fn light_shape(&self, id: LightId) -> &dyn Primitive {
        self.objects[self.lights[id].object()].shape.as_ref()
    }

    pub fn environment(&self) -> Option<&dyn Environment> {
        self.environment.as_deref()
    }

    /// Environment radiance along an escaped ray, black without an environment.
    pub fn environment_radiance(&self, dir: Vec3) -> Spectrum {
        self.environment.as_ref().map_or(Spectrum::ZERO, |e| e.radiance(dir))
    }

    /// Sphere enclosing the geometry and the camera.
    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        (self.center, self.radius)
    }

    pub fn intersect(&self, ray: &Ray) -> Option<SurfaceHit> {
        let (t, object) = self.bvh.closest_hit(&self.objects, ray, Interval::forward())?;
        let p = ray.at(t);
        let obj = &self.objects[object];
        Some(SurfaceHit {
            t,
            p,
            ng: obj.shape.normal_geom(p),
            ns: obj.shape.normal_shading(p),
            uv: obj.shape.surface_uv(p),
            object,
            kind: obj.kind,
        })
    }

    /// Whether anything blocks `ray` before `max_dist`.
    pub fn occluded(&self, ray: &Ray, max_dist: f32) -> bool {
        self.bvh.test_intersec(&self.objects, ray, Interval::new(0.0, max_dist))
    }

    /// Whether the segment from surface point `p` (geometric normal `n`) to
    /// `target` is free. `target` itself is not tested.
    pub fn unoccluded(&self, p: Vec3, n: Vec3, target: Vec3) -> bool {
        let (ray, dist) = Ray::spawn_to(p, n, target);
        dist <= 0.0 || !self.occluded(&ray, dist)
    }

    /// Mutual visibility of two surface points with geometric normals `n0` and `n1`.
    pub fn visible(&self, p0: Vec3, n0: Vec3, p1: Vec3, n1: Vec3) -> bool {
        self.unoccluded(p0, n0, lux_math::offset_origin(p1, n1, p0 - p1))
    }
}
