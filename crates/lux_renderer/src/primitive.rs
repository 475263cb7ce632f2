//! Geometry capabilities consumed by the BVH, the scene and the lights.

use lux_math::{Aabb, Interval, Ray, Vec2, Vec3};

/// Anything the BVH can bound and intersect.
pub trait Hittable {
    /// Get the axis-aligned bounding box of this object.
    fn bound(&self) -> Aabb;

    /// Distance to the closest intersection strictly inside `ray_t`, if any.
    fn closest_hit(&self, ray: &Ray, ray_t: Interval) -> Option<f32>;
}

/// A geometric primitive that can also be sampled, as area lights require.
pub trait Primitive: Hittable + Send + Sync {
    /// Uniformly distributed point on the surface (density `1 / surface_area`).
    fn uniform_sample(&self, u: Vec2) -> Vec3;

    /// Outward unit geometric normal at a surface point.
    fn normal_geom(&self, p: Vec3) -> Vec3;

    /// Unit shading normal at a surface point.
    fn normal_shading(&self, p: Vec3) -> Vec3 {
        self.normal_geom(p)
    }

    fn surface_area(&self) -> f32;

    /// Surface parameterization in `[0, 1]²`.
    fn surface_uv(&self, p: Vec3) -> Vec2;
}
