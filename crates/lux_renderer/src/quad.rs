//! Parallelogram primitive, used for walls and area lights.

use crate::primitive::{Hittable, Primitive};
use lux_math::{Aabb, Interval, Ray, Vec2, Vec3};

/// Parallelogram spanned by two edges from a corner.
///
/// The front face is the side `u × v` points to.
#[derive(Debug, Clone)]
pub struct Quad {
    corner: Vec3,
    u: Vec3,
    v: Vec3,
    normal: Vec3,
    /// `n / (n·n)` with `n = u × v`, projects plane offsets onto (u, v) coordinates
    w: Vec3,
    d: f32,
    area: f32,
    bbox: Aabb,
}

impl Quad {
    pub fn new(corner: Vec3, u: Vec3, v: Vec3) -> Self {
        let n = u.cross(v);
        let normal = n.normalize_or_zero();
        let len2 = n.length_squared();
        let w = if len2 > 0.0 { n / len2 } else { Vec3::ZERO };

        // Pad flat boxes so axis-aligned quads still have volume
        let bbox = Aabb::from_points(corner, corner + u + v)
            .union(&Aabb::from_points(corner + u, corner + v));
        let pad = Vec3::splat(1e-4);
        let bbox = Aabb::new(bbox.p_min - pad, bbox.p_max + pad);

        Self {
            corner,
            u,
            v,
            normal,
            w,
            d: normal.dot(corner),
            area: n.length(),
            bbox,
        }
    }

    /// Plane coordinates `(alpha, beta)` of a point, `[0, 1]²` inside the quad.
    fn plane_coords(&self, p: Vec3) -> Vec2 {
        let planar = p - self.corner;
        Vec2::new(
            self.w.dot(planar.cross(self.v)),
            self.w.dot(self.u.cross(planar)),
        )
    }
}

impl Hittable for Quad {
    fn bound(&self) -> Aabb {
        self.bbox
    }

    fn closest_hit(&self, ray: &Ray, ray_t: Interval) -> Option<f32> {
        let denom = self.normal.dot(ray.direction);

        // Parallel to the plane
        if denom.abs() < 1e-8 {
            return None;
        }

        let t = (self.d - self.normal.dot(ray.origin)) / denom;
        if !ray_t.surrounds(t) {
            return None;
        }

        let ab = self.plane_coords(ray.at(t));
        let unit = 0.0..=1.0;
        (unit.contains(&ab.x) && unit.contains(&ab.y)).then_some(t)
    }
}

impl Primitive for Quad {
    fn uniform_sample(&self, u: Vec2) -> Vec3 {
        self.corner + u.x * self.u + u.y * self.v
    }

    fn normal_geom(&self, _p: Vec3) -> Vec3 {
        self.normal
    }

    fn surface_area(&self) -> f32 {
        self.area
    }

    fn surface_uv(&self, p: Vec3) -> Vec2 {
        self.plane_coords(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> Quad {
        // 2x2 quad in the y=0 plane, facing +Y
        Quad::new(Vec3::new(-1.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 2.0), Vec3::new(2.0, 0.0, 0.0))
    }

    #[test]
    fn test_quad_normal_and_area() {
        let quad = floor();
        assert!((quad.normal_geom(Vec3::ZERO) - Vec3::Y).length() < 1e-6);
        assert!((quad.surface_area() - 4.0).abs() < 1e-5);
        assert!(quad.bound().p_max.y > quad.bound().p_min.y);
    }

    #[test]
    fn test_quad_hit_and_miss() {
        let quad = floor();
        let down = Ray::new(Vec3::new(0.5, 2.0, 0.5), -Vec3::Y);
        let t = quad.closest_hit(&down, Interval::forward()).unwrap();
        assert!((t - 2.0).abs() < 1e-5);

        let outside = Ray::new(Vec3::new(1.5, 2.0, 0.5), -Vec3::Y);
        assert!(quad.closest_hit(&outside, Interval::forward()).is_none());

        let parallel = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert!(quad.closest_hit(&parallel, Interval::forward()).is_none());
    }

    #[test]
    fn test_quad_sample_uv_roundtrip() {
        let quad = floor();
        let p = quad.uniform_sample(Vec2::new(0.25, 0.75));
        let uv = quad.surface_uv(p);
        assert!((uv - Vec2::new(0.25, 0.75)).length() < 1e-5);
    }
}
