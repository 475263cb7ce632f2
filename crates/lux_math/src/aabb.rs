use crate::{Ray, Vec3};

/// Tolerance used to classify a unit ray direction component as axis-aligned
/// (`|d| ≈ 1`) or parallel to a slab (`|d| ≈ 0`).
pub const AXIS_EPSILON: f32 = 1e-6;

/// Axis-Aligned Bounding Box for spatial acceleration structures (BVH).
///
/// `p_min <= p_max` componentwise, except for [`Aabb::EMPTY`]
/// (`+inf`/`-inf`), the identity element of [`Aabb::union`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub p_min: Vec3,
    pub p_max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// The empty box, used as a union seed.
    pub const EMPTY: Aabb = Aabb {
        p_min: Vec3::splat(f32::INFINITY),
        p_max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a box from its corners. The corners are assumed ordered.
    pub fn new(p_min: Vec3, p_max: Vec3) -> Self {
        Self { p_min, p_max }
    }

    /// Create an AABB from two arbitrary corner points.
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            p_min: a.min(b),
            p_max: a.max(b),
        }
    }

    /// Degenerate box holding a single point.
    pub fn from_point(p: Vec3) -> Self {
        Self { p_min: p, p_max: p }
    }

    /// Bounding box of a triangle.
    pub fn from_triangle(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            p_min: a.min(b).min(c),
            p_max: a.max(b).max(c),
        }
    }

    /// Box surrounding both `self` and `other`.
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            p_min: self.p_min.min(other.p_min),
            p_max: self.p_max.max(other.p_max),
        }
    }

    /// Box surrounding `self` and the point `p`.
    pub fn union_point(&self, p: Vec3) -> Aabb {
        Aabb {
            p_min: self.p_min.min(p),
            p_max: self.p_max.max(p),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.p_min.cmpgt(self.p_max).any()
    }

    /// Edge lengths of the box.
    pub fn diagonal(&self) -> Vec3 {
        self.p_max - self.p_min
    }

    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.diagonal();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    pub fn volume(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.diagonal();
        d.x * d.y * d.z
    }

    /// Returns the center point of the bounding box.
    pub fn centroid(&self) -> Vec3 {
        (self.p_min + self.p_max) * 0.5
    }

    /// Returns the index (0=X, 1=Y, 2=Z) of the axis with the longest extent.
    pub fn max_extent(&self) -> usize {
        let d = self.diagonal();
        if d.x > d.y && d.x > d.z {
            0
        } else if d.y > d.z {
            1
        } else {
            2
        }
    }

    /// Relative position of `p` inside the box along each axis (0 at `p_min`, 1 at `p_max`).
    /// Flat axes map to 0.
    pub fn offset(&self, p: Vec3) -> Vec3 {
        let mut o = p - self.p_min;
        let d = self.diagonal();
        for axis in 0..3 {
            if d[axis] > 0.0 {
                o[axis] /= d[axis];
            } else {
                o[axis] = 0.0;
            }
        }
        o
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.p_min).all() && p.cmple(self.p_max).all()
    }

    /// Radius and center of a sphere enclosing the box.
    pub fn bounding_sphere(&self) -> (Vec3, f32) {
        let center = self.centroid();
        let radius = if self.is_empty() {
            0.0
        } else {
            (self.p_max - center).length()
        };
        (center, radius)
    }

    /// Ray/box intersection returning the parametric entry and exit distances.
    ///
    /// The ray direction must be normalized. Axis-aligned rays (a component
    /// within [`AXIS_EPSILON`] of ±1) reduce to a 2-D in-rectangle test on
    /// the two other axes; a component within [`AXIS_EPSILON`] of 0 means
    /// the ray is parallel to that slab, which then bounds nothing and only
    /// requires the origin to lie between its planes. Division by near-zero
    /// components never happens. Faces are inclusive: a ray travelling
    /// exactly along a face hits the box.
    ///
    /// The box is hit iff `t_max >= 0 && t_max >= t_min`; `t_min` is negative
    /// when the origin lies inside.
    pub fn hit(&self, ray: &Ray) -> Option<(f32, f32)> {
        if self.is_empty() {
            return None;
        }
        let o = ray.origin;
        let d = ray.direction;

        for axis in 0..3 {
            if (d[axis].abs() - 1.0).abs() < AXIS_EPSILON {
                let (a, b) = ((axis + 1) % 3, (axis + 2) % 3);
                if !self.slab_contains(a, o[a]) || !self.slab_contains(b, o[b]) {
                    return None;
                }
                let inv = 1.0 / d[axis];
                let mut t0 = (self.p_min[axis] - o[axis]) * inv;
                let mut t1 = (self.p_max[axis] - o[axis]) * inv;
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                return (t1 >= 0.0 && t1 >= t0).then_some((t0, t1));
            }
        }

        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            if d[axis].abs() < AXIS_EPSILON {
                if !self.slab_contains(axis, o[axis]) {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d[axis];
            let mut t0 = (self.p_min[axis] - o[axis]) * inv;
            let mut t1 = (self.p_max[axis] - o[axis]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
        }

        (t_max >= 0.0 && t_max >= t_min).then_some((t_min, t_max))
    }

    #[inline]
    fn slab_contains(&self, axis: usize, x: f32) -> bool {
        self.p_min[axis] <= x && x <= self.p_max[axis]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn unit_box() -> Aabb {
        Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn test_aabb_from_points() {
        let aabb = Aabb::from_points(Vec3::new(10.0, 0.0, 10.0), Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(aabb.p_min, Vec3::ZERO);
        assert_eq!(aabb.p_max, Vec3::splat(10.0));
    }

    #[test]
    fn test_aabb_union() {
        let box1 = Aabb::from_points(Vec3::ZERO, Vec3::splat(5.0));
        let box2 = Aabb::from_points(Vec3::splat(3.0), Vec3::splat(10.0));
        let merged = box1.union(&box2);
        assert_eq!(merged.p_min, Vec3::ZERO);
        assert_eq!(merged.p_max, Vec3::splat(10.0));

        // EMPTY is the identity
        assert_eq!(Aabb::EMPTY.union(&box1), box1);
        assert!(Aabb::EMPTY.is_empty());
    }

    #[test]
    fn test_aabb_measures() {
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.surface_area(), 22.0);
        assert_eq!(aabb.volume(), 6.0);
        assert_eq!(aabb.centroid(), Vec3::new(0.5, 1.0, 1.5));
        assert_eq!(aabb.max_extent(), 2);
        assert_eq!(Aabb::EMPTY.surface_area(), 0.0);

        let tri = Aabb::from_triangle(Vec3::X, Vec3::Y, Vec3::Z);
        assert_eq!(tri.p_min, Vec3::ZERO);
        assert_eq!(tri.p_max, Vec3::ONE);
    }

    #[test]
    fn test_aabb_hit_general() {
        let aabb = unit_box();

        let dir = Vec3::new(1.0, 1.0, 1.0).normalize();
        let ray = Ray::new(Vec3::splat(-5.0), dir);
        let (t0, t1) = aabb.hit(&ray).expect("diagonal ray should hit");
        assert!(t0 > 0.0 && t1 > t0);

        // Box behind the ray
        let ray = Ray::new(Vec3::splat(5.0), dir);
        assert!(aabb.hit(&ray).is_none());

        // Misses off to the side
        let ray = Ray::new(Vec3::new(-5.0, 3.0, -5.0), Vec3::new(1.0, 0.0, 1.0).normalize());
        assert!(aabb.hit(&ray).is_none());
    }

    #[test]
    fn test_aabb_hit_axis_aligned_grazing() {
        let aabb = unit_box();

        // Travelling along +Z exactly on the x = 1 face: inclusive
        let ray = Ray::new(Vec3::new(1.0, 0.0, -5.0), Vec3::Z);
        let (t0, t1) = aabb.hit(&ray).expect("grazing ray counts as a hit");
        assert_eq!(t0, 4.0);
        assert_eq!(t1, 6.0);

        // Just outside the face
        let ray = Ray::new(Vec3::new(1.0001, 0.0, -5.0), Vec3::Z);
        assert!(aabb.hit(&ray).is_none());

        // Negative axis direction
        let ray = Ray::new(Vec3::new(0.0, 5.0, 0.0), -Vec3::Y);
        let (t0, t1) = aabb.hit(&ray).unwrap();
        assert_eq!((t0, t1), (4.0, 6.0));
    }

    #[test]
    fn test_aabb_hit_parallel_slab() {
        let aabb = unit_box();

        // Direction in the XY plane: parallel to the z slabs
        let dir = Vec3::new(1.0, 1.0, 0.0).normalize();
        let inside = Ray::new(Vec3::new(-3.0, -3.0, 0.5), dir);
        assert!(aabb.hit(&inside).is_some());

        let outside = Ray::new(Vec3::new(-3.0, -3.0, 1.5), dir);
        assert!(aabb.hit(&outside).is_none());
    }

    #[test]
    fn test_aabb_hit_origin_inside() {
        let aabb = unit_box();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let origin = Vec3::new(
                rng.gen_range(-0.99..0.99),
                rng.gen_range(-0.99..0.99),
                rng.gen_range(-0.99..0.99),
            );
            let dir = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
            .try_normalize()
            .unwrap_or(Vec3::X);
            let (t0, t1) = aabb.hit(&Ray::new(origin, dir)).expect("origin inside must hit");
            assert!(t0 <= 0.0 && 0.0 <= t1, "t0={t0} t1={t1}");
        }
    }

    #[test]
    fn test_aabb_empty_never_hit() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert!(Aabb::EMPTY.hit(&ray).is_none());
    }
}
