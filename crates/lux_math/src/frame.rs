use crate::Vec3;

/// Orthonormal basis around a normal, used to move BSDF and emission
/// samples between local (z-up) and world space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    pub s: Vec3,
    pub t: Vec3,
    pub n: Vec3,
}

impl Frame {
    /// Build a frame from a unit normal (Duff et al. 2017, branchless).
    pub fn from_normal(n: Vec3) -> Self {
        let sign = 1.0_f32.copysign(n.z);
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;
        let s = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
        let t = Vec3::new(b, sign + n.y * n.y * a, -n.y);
        Self { s, t, n }
    }

    #[inline]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.s * v.x + self.t * v.y + self.n * v.z
    }

    #[inline]
    pub fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.s), v.dot(self.t), v.dot(self.n))
    }
}

/// Cube-map face whose axis dominates `d`: 0:+X 1:-X 2:+Y 3:-Y 4:+Z 5:-Z.
#[inline]
pub fn cube_map_face(d: Vec3) -> usize {
    let a = d.abs();
    let axis = if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    };
    2 * axis + usize::from(d[axis] < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_orthonormal() {
        for n in [
            Vec3::Z,
            -Vec3::Z,
            Vec3::X,
            Vec3::new(0.3, -0.4, 0.8).normalize(),
        ] {
            let f = Frame::from_normal(n);
            assert!(f.s.dot(f.t).abs() < 1e-5);
            assert!(f.s.dot(f.n).abs() < 1e-5);
            assert!((f.s.length() - 1.0).abs() < 1e-5);
            let v = Vec3::new(0.2, 0.5, -0.7);
            assert!((f.to_local(f.to_world(v)) - v).length() < 1e-5);
        }
    }

    #[test]
    fn test_cube_map_face() {
        assert_eq!(cube_map_face(Vec3::X), 0);
        assert_eq!(cube_map_face(-Vec3::X), 1);
        assert_eq!(cube_map_face(Vec3::new(0.1, 0.9, -0.2)), 2);
        assert_eq!(cube_map_face(Vec3::new(0.1, -0.9, -0.2)), 3);
        assert_eq!(cube_map_face(Vec3::new(0.1, 0.2, 0.5)), 4);
        assert_eq!(cube_map_face(Vec3::new(0.1, 0.2, -0.5)), 5);
    }
}
