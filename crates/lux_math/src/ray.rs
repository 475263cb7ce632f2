use crate::Vec3;

/// Distance a spawned ray origin is pushed off the surface it leaves.
pub const RAY_EPSILON: f32 = 1e-4;

/// A ray in 3D space with origin and direction.
///
/// Integrators keep `direction` normalized; the box test in [`crate::Aabb::hit`]
/// relies on it to detect axis-aligned rays.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// Push `p` off its surface along the normal, on the side `w` points to.
#[inline]
pub fn offset_origin(p: Vec3, n: Vec3, w: Vec3) -> Vec3 {
    let offset = n * RAY_EPSILON;
    if n.dot(w) < 0.0 {
        p - offset
    } else {
        p + offset
    }
}

impl Ray {
    /// Create a new ray.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Ray leaving the surface point `p` (geometric normal `n`) along `direction`.
    pub fn spawn(p: Vec3, n: Vec3, direction: Vec3) -> Self {
        Self::new(offset_origin(p, n, direction), direction)
    }

    /// Shadow ray from the surface point `p` towards `target`, together with the
    /// distance up to which occluders count. The target itself is excluded.
    pub fn spawn_to(p: Vec3, n: Vec3, target: Vec3) -> (Self, f32) {
        let origin = offset_origin(p, n, target - p);
        let d = target - origin;
        let dist = d.length();
        (Self::new(origin, d / dist), dist - 2.0 * RAY_EPSILON)
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);

        assert_eq!(ray.at(0.0), Vec3::ZERO);
        assert_eq!(ray.at(2.0), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(ray.at(-1.0), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_ray_spawn_side() {
        let up = Ray::spawn(Vec3::ZERO, Vec3::Y, Vec3::new(0.0, 1.0, 1.0).normalize());
        assert!(up.origin.y > 0.0);

        let down = Ray::spawn(Vec3::ZERO, Vec3::Y, -Vec3::Y);
        assert!(down.origin.y < 0.0);
    }

    #[test]
    fn test_ray_spawn_to() {
        let (ray, dist) = Ray::spawn_to(Vec3::ZERO, Vec3::Z, Vec3::new(0.0, 0.0, 4.0));
        assert!((ray.direction - Vec3::Z).length() < 1e-6);
        assert!(ray.origin.z > 0.0);
        assert!(dist < 4.0 && dist > 3.99);
    }
}
