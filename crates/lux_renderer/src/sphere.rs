//! Sphere primitive for ray tracing.

use crate::primitive::{Hittable, Primitive};
use lux_math::warp::uniform_sphere;
use lux_math::{Aabb, Interval, Ray, Vec2, Vec3};
use std::f32::consts::PI;

/// A sphere primitive.
#[derive(Debug, Clone)]
pub struct Sphere {
    center: Vec3,
    radius: f32,
    bbox: Aabb,
}

impl Sphere {
    /// Create a new sphere.
    pub fn new(center: Vec3, radius: f32) -> Self {
        let radius = radius.max(0.0);
        let rvec = Vec3::splat(radius);
        let bbox = Aabb::from_points(center - rvec, center + rvec);

        Self {
            center,
            radius,
            bbox,
        }
    }

    /// Get the UV coordinates for a point on the unit sphere.
    fn get_sphere_uv(p: Vec3) -> Vec2 {
        // theta: angle down from +Y
        // phi: angle around Y axis from +X
        let theta = (-p.y).clamp(-1.0, 1.0).acos();
        let phi = (-p.z).atan2(p.x) + PI;

        Vec2::new(phi / (2.0 * PI), theta / PI)
    }
}

impl Hittable for Sphere {
    fn bound(&self) -> Aabb {
        self.bbox
    }

    fn closest_hit(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        let oc = self.center - ray.origin;
        let a = ray.direction.length_squared();
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Find the nearest root in the acceptable range
        let root = (h - sqrtd) / a;
        if ray_t.surrounds(root) {
            return Some(root);
        }
        let root = (h + sqrtd) / a;
        ray_t.surrounds(root).then_some(root)
    }
}

impl Primitive for Sphere {
    fn uniform_sample(&self, u: Vec2) -> Vec3 {
        self.center + self.radius * uniform_sphere(u)
    }

    fn normal_geom(&self, p: Vec3) -> Vec3 {
        (p - self.center).normalize()
    }

    fn surface_area(&self) -> f32 {
        4.0 * PI * self.radius * self.radius
    }

    fn surface_uv(&self, p: Vec3) -> Vec2 {
        Self::get_sphere_uv(self.normal_geom(p))
    }
}
