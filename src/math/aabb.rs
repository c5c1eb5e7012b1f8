use super::{Placement, Point3, Vector3};

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Point3,
    /// Maximum corner of the bounding box.
    pub max: Point3,
}

impl Aabb {
    /// Creates a box from its two corners.
    #[must_use]
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// A box centred at the origin with the given half-lengths.
    #[must_use]
    pub fn from_half_lengths(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            min: Point3::new(-dx, -dy, -dz),
            max: Point3::new(dx, dy, dz),
        }
    }

    /// An empty (inverted) box suitable for expansion.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Returns `true` if the box contains no point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expands the box to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Smallest box containing both boxes.
    #[must_use]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Overlap of both boxes, or `None` if they are disjoint.
    #[must_use]
    pub fn intersection(&self, other: &Aabb) -> Option<Aabb> {
        let out = Aabb {
            min: self.min.sup(&other.min),
            max: self.max.inf(&other.max),
        };
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// Test if two boxes overlap (touching counts as overlap).
    #[must_use]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Returns `true` if the point lies inside or on the box.
    #[must_use]
    pub fn contains_point(&self, p: &Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns `true` if `other` lies entirely within this box.
    #[must_use]
    pub fn contains_box(&self, other: &Aabb) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// The box grown by `margin` in every direction.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Aabb {
        let m = Vector3::repeat(margin);
        Aabb {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Centre of the box.
    #[must_use]
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Edge lengths along x, y and z.
    #[must_use]
    pub fn size(&self) -> Vector3 {
        self.max - self.min
    }

    /// Volume of the box (zero when empty).
    #[must_use]
    pub fn volume(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let s = self.size();
        s.x * s.y * s.z
    }

    /// Euclidean distance from a point to the box; zero inside.
    #[must_use]
    pub fn distance_to_point(&self, p: &Point3) -> f64 {
        let dx = (self.min.x - p.x).max(p.x - self.max.x).max(0.0);
        let dy = (self.min.y - p.y).max(p.y - self.max.y).max(0.0);
        let dz = (self.min.z - p.z).max(p.z - self.max.z).max(0.0);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Bounding box of this box after mapping it through `placement`.
    #[must_use]
    pub fn transformed(&self, placement: &Placement) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let mut out = Aabb::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.include_point(&placement.transform_point(&corner));
        }
        out
    }

    /// Ray-box intersection using the slab method.
    ///
    /// Returns `Some((t_enter, t_exit))` clipped to `t >= 0`, or `None` if the
    /// ray `origin + t * dir` misses the box.
    #[must_use]
    pub fn ray_intersection(&self, origin: &Point3, dir: &Vector3) -> Option<(f64, f64)> {
        let mut t_min = 0.0_f64;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            if d == 0.0 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inv;
            let mut t1 = (self.max[axis] - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max < t_min {
                return None;
            }
        }
        Some((t_min, t_max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn union_and_intersection() {
        let a = Aabb::new(p(0.0, 0.0, 0.0), p(2.0, 2.0, 2.0));
        let b = Aabb::new(p(1.0, 1.0, 1.0), p(3.0, 3.0, 3.0));
        let u = a.union(&b);
        assert_eq!(u.min, p(0.0, 0.0, 0.0));
        assert_eq!(u.max, p(3.0, 3.0, 3.0));
        let i = a.intersection(&b);
        assert_eq!(i, Some(Aabb::new(p(1.0, 1.0, 1.0), p(2.0, 2.0, 2.0))));
        let far = Aabb::new(p(5.0, 5.0, 5.0), p(6.0, 6.0, 6.0));
        assert!(a.intersection(&far).is_none());
        assert!(!a.overlaps(&far));
    }

    #[test]
    fn empty_box_grows_with_points() {
        let mut b = Aabb::empty();
        assert!(b.is_empty());
        b.include_point(&p(1.0, -1.0, 0.5));
        b.include_point(&p(-1.0, 2.0, 0.0));
        assert_eq!(b.min, p(-1.0, -1.0, 0.0));
        assert_eq!(b.max, p(1.0, 2.0, 0.5));
        assert!((b.volume() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn distance_outside_and_inside() {
        let b = Aabb::from_half_lengths(1.0, 1.0, 1.0);
        assert!(b.distance_to_point(&p(0.5, 0.0, 0.0)).abs() < 1e-12);
        assert!((b.distance_to_point(&p(4.0, 0.0, 0.0)) - 3.0).abs() < 1e-12);
        assert!((b.distance_to_point(&p(4.0, 5.0, 0.0)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn ray_slab_hits_and_misses() {
        let b = Aabb::from_half_lengths(1.0, 1.0, 1.0);
        let hit = b.ray_intersection(&p(-5.0, 0.0, 0.0), &Vector3::x());
        assert_eq!(hit, Some((4.0, 6.0)));
        let miss = b.ray_intersection(&p(-5.0, 3.0, 0.0), &Vector3::x());
        assert!(miss.is_none());
        let behind = b.ray_intersection(&p(5.0, 0.0, 0.0), &Vector3::x());
        assert!(behind.is_none());
        let inside = b.ray_intersection(&p(0.0, 0.0, 0.0), &Vector3::z());
        assert_eq!(inside, Some((0.0, 1.0)));
    }

    #[test]
    fn transformed_box_encloses_rotated_corners() {
        let b = Aabb::from_half_lengths(1.0, 2.0, 3.0);
        let pl = Placement::from_axis_angle(
            Vector3::z(),
            std::f64::consts::FRAC_PI_2,
            Vector3::new(10.0, 0.0, 0.0),
        )
        .unwrap_or_default();
        let t = b.transformed(&pl);
        assert!((t.min.x - 8.0).abs() < 1e-12);
        assert!((t.max.x - 12.0).abs() < 1e-12);
        assert!((t.min.y + 1.0).abs() < 1e-12);
        assert!((t.max.y - 1.0).abs() < 1e-12);
        assert!(b.contains_box(&Aabb::from_half_lengths(0.5, 0.5, 0.5)));
    }
}
