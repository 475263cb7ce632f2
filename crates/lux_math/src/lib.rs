//! Lux math - vector types, rays, boxes and sample warps shared by the renderer.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod frame;
mod interval;
mod ray;
pub mod warp;

pub use aabb::{Aabb, AXIS_EPSILON};
pub use frame::{cube_map_face, Frame};
pub use interval::Interval;
pub use ray::{offset_origin, Ray, RAY_EPSILON};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a[2], 3.0);
    }
}
