//! Triangle primitive for ray tracing.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use crate::primitive::{Hittable, Primitive};
use lux_math::warp::uniform_triangle;
use lux_math::{Aabb, Interval, Ray, Vec2, Vec3};

/// A triangle primitive.
#[derive(Debug, Clone)]
pub struct Triangle {
    /// Vertices
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    /// Pre-computed face normal (unit length)
    normal: Vec3,
    /// Optional smooth-shading normal override
    shading_normal: Option<Vec3>,
    area: f32,
    /// Bounding box
    bbox: Aabb,
}

impl Triangle {
    /// Create a new triangle from three vertices (counter-clockwise front face).
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        let cross = (v1 - v0).cross(v2 - v0);

        Self {
            v0,
            v1,
            v2,
            normal: cross.normalize_or_zero(),
            shading_normal: None,
            area: 0.5 * cross.length(),
            bbox: Aabb::from_triangle(v0, v1, v2),
        }
    }

    /// Create a triangle with a pre-computed shading normal.
    pub fn with_normal(v0: Vec3, v1: Vec3, v2: Vec3, normal: Vec3) -> Self {
        Self {
            shading_normal: Some(normal.normalize()),
            ..Self::new(v0, v1, v2)
        }
    }

    /// Barycentric `(u, v)` of a point assumed to lie in the triangle's plane.
    fn barycentric(&self, p: Vec3) -> Vec2 {
        let e1 = self.v1 - self.v0;
        let e2 = self.v2 - self.v0;
        let d = p - self.v0;
        let d11 = e1.dot(e1);
        let d12 = e1.dot(e2);
        let d22 = e2.dot(e2);
        let dp1 = d.dot(e1);
        let dp2 = d.dot(e2);
        let denom = d11 * d22 - d12 * d12;
        if denom == 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(
            (d22 * dp1 - d12 * dp2) / denom,
            (d11 * dp2 - d12 * dp1) / denom,
        )
    }
}

impl Hittable for Triangle {
    fn bound(&self) -> Aabb {
        self.bbox
    }

    /// Möller-Trumbore ray-triangle intersection algorithm.
    fn closest_hit(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < 1e-8 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(q);
        ray_t.surrounds(t).then_some(t)
    }
}

impl Primitive for Triangle {
    fn uniform_sample(&self, u: Vec2) -> Vec3 {
        let (b0, b1) = uniform_triangle(u);
        b0 * self.v0 + b1 * self.v1 + (1.0 - b0 - b1) * self.v2
    }

    fn normal_geom(&self, _p: Vec3) -> Vec3 {
        self.normal
    }

    fn normal_shading(&self, _p: Vec3) -> Vec3 {
        self.shading_normal.unwrap_or(self.normal)
    }

    fn surface_area(&self) -> f32 {
        self.area
    }

    fn surface_uv(&self, p: Vec3) -> Vec2 {
        self.barycentric(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_triangle() -> Triangle {
        // Triangle in XY plane at z=-1
        Triangle::new(
            Vec3::new(-1.0, -1.0, -1.0),
            Vec3::new(1.0, -1.0, -1.0),
            Vec3::new(0.0, 1.0, -1.0),
        )
    }

    #[test]
    fn test_triangle_hit() {
        let tri = test_triangle();
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));

        let t = tri.closest_hit(&ray, Interval::forward()).unwrap();
        assert!((t - 1.0).abs() < 0.001);
        assert_eq!(tri.normal_geom(ray.at(t)), Vec3::Z);
    }

    #[test]
    fn test_triangle_miss() {
        let tri = test_triangle();

        // Ray pointing away
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0));
        assert!(tri.closest_hit(&ray, Interval::forward()).is_none());

        // Beyond the allowed range
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        assert!(tri.closest_hit(&ray, Interval::new(0.0, 0.5)).is_none());
    }

    #[test]
    fn test_triangle_sampling() {
        let tri = test_triangle();
        assert!((tri.surface_area() - 2.0).abs() < 1e-5);
        for i in 0..10 {
            let p = tri.uniform_sample(Vec2::new(i as f32 / 10.0, 0.6));
            let uv = tri.surface_uv(p);
            assert!(uv.x >= -1e-4 && uv.y >= -1e-4 && uv.x + uv.y <= 1.0 + 1e-4);
            assert!((p.z + 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_triangle_shading_normal() {
        let tri = Triangle::with_normal(
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::new(0.0, 1.0, 1.0),
        );
        assert_eq!(tri.normal_geom(Vec3::ZERO), Vec3::Z);
        assert!((tri.normal_shading(Vec3::ZERO).length() - 1.0).abs() < 1e-5);
    }
}
