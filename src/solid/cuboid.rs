use std::fmt;

use crate::error::{GeometryError, Result};
use crate::math::{Aabb, Point3, Tolerance, Vector3};

use super::{normalize_or, EInside, ExitHit, MeasureCache, Solid};

/// A rectangular box centred at the origin, given by its half-lengths.
#[derive(Debug, Clone)]
pub struct Cuboid {
    half: Vector3,
    tolerance: Tolerance,
    cache: MeasureCache,
}

impl Cuboid {
    /// Creates a box with half-lengths `dx`, `dy`, `dz`.
    ///
    /// # Errors
    ///
    /// Returns an error if any half-length is below twice the surface
    /// tolerance.
    pub fn new(dx: f64, dy: f64, dz: f64, tolerance: Tolerance) -> Result<Self> {
        let min = 2.0 * tolerance.surface();
        for (parameter, value) in [("dx", dx), ("dy", dy), ("dz", dz)] {
            if !(value >= min) || !value.is_finite() {
                return Err(GeometryError::ParameterOutOfRange {
                    parameter,
                    value,
                    min,
                    max: f64::MAX,
                }
                .into());
            }
        }
        Ok(Self {
            half: Vector3::new(dx, dy, dz),
            tolerance,
            cache: MeasureCache::default(),
        })
    }

    /// Half-lengths along x, y and z.
    #[must_use]
    pub fn half_lengths(&self) -> Vector3 {
        self.half
    }

    /// Per-axis signed distance to the face pair (positive outside).
    fn axis_distances(&self, p: &Point3) -> Vector3 {
        p.coords.abs() - self.half
    }
}

impl Solid for Cuboid {
    fn classify(&self, p: &Point3) -> EInside {
        EInside::from_signed_distance(self.axis_distances(p).max(), self.tolerance.half())
    }

    fn surface_normal(&self, p: &Point3) -> Vector3 {
        let half = self.tolerance.half();
        let d = self.axis_distances(p);
        let mut sum = Vector3::zeros();
        for axis in 0..3 {
            if d[axis].abs() <= half {
                sum[axis] += p[axis].signum();
            }
        }
        if sum == Vector3::zeros() {
            // Off the surface: the face with the largest signed distance is nearest.
            let axis = d.imax();
            sum[axis] = p[axis].signum();
        }
        normalize_or(sum, Vector3::z())
    }

    fn distance_to_entry(&self, p: &Point3, v: &Vector3) -> f64 {
        let half = self.tolerance.half();

        // On or beyond a face and moving away from it: no entry.
        for axis in 0..3 {
            if p[axis].abs() - self.half[axis] >= -half && p[axis] * v[axis] >= 0.0 {
                return f64::INFINITY;
            }
        }

        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for axis in 0..3 {
            let inv = if v[axis] == 0.0 { f64::MAX } else { -1.0 / v[axis] };
            let h = self.half[axis].copysign(inv);
            t_min = t_min.max((p[axis] - h) * inv);
            t_max = t_max.min((p[axis] + h) * inv);
        }

        if t_max <= t_min + half {
            return f64::INFINITY;
        }
        if t_min < half {
            0.0
        } else {
            t_min
        }
    }

    fn safety_to_entry(&self, p: &Point3) -> f64 {
        self.axis_distances(p).max().max(0.0)
    }

    fn distance_to_exit(&self, p: &Point3, v: &Vector3, want_normal: bool) -> ExitHit {
        let half = self.tolerance.half();

        // On a face and moving out through it.
        for axis in 0..3 {
            if p[axis].abs() - self.half[axis] >= -half && p[axis] * v[axis] > 0.0 {
                let mut n = Vector3::zeros();
                n[axis] = p[axis].signum();
                return ExitHit::new(0.0, n, true, want_normal);
            }
        }

        let mut best = f64::INFINITY;
        let mut best_axis = 2;
        for axis in 0..3 {
            if v[axis] == 0.0 {
                continue;
            }
            let t = (self.half[axis].copysign(v[axis]) - p[axis]) / v[axis];
            if t < best {
                best = t;
                best_axis = axis;
            }
        }

        let mut n = Vector3::zeros();
        n[best_axis] = v[best_axis].signum();
        ExitHit::new(best.max(0.0), n, true, want_normal)
    }

    fn safety_to_exit(&self, p: &Point3) -> f64 {
        (-self.axis_distances(p).max()).max(0.0)
    }

    fn extent(&self) -> Aabb {
        Aabb::from_half_lengths(self.half.x, self.half.y, self.half.z)
    }

    fn volume(&self) -> f64 {
        self.cache
            .volume(|| 8.0 * self.half.x * self.half.y * self.half.z)
    }

    fn surface_area(&self) -> f64 {
        self.cache.area(|| {
            let h = self.half;
            8.0 * (h.x * h.y + h.y * h.z + h.z * h.x)
        })
    }

    fn tolerance(&self) -> Tolerance {
        self.tolerance
    }
}

impl fmt::Display for Cuboid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "box(dx={}, dy={}, dz={})",
            self.half.x, self.half.y, self.half.z
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn v(x: f64, y: f64, z: f64) -> Vector3 {
        Vector3::new(x, y, z).normalize()
    }

    fn cube(h: f64) -> Cuboid {
        Cuboid::new(h, h, h, Tolerance::default()).unwrap()
    }

    // ── classification ──

    #[test]
    fn classify_reference_points() {
        let b = cube(10.0);
        assert_eq!(b.classify(&p(5.0, 5.0, 5.0)), EInside::Inside);
        assert_eq!(b.classify(&p(10.0, 0.0, 0.0)), EInside::Surface);
        assert_eq!(b.classify(&p(11.0, 0.0, 0.0)), EInside::Outside);
        assert_eq!(b.classify(&p(10.0, 10.0, 10.0)), EInside::Surface);
        assert_eq!(b.classify(&p(10.0 + 0.4e-9, 0.0, 0.0)), EInside::Surface);
        assert_eq!(b.classify(&p(10.0 + 0.6e-9, 0.0, 0.0)), EInside::Outside);
    }

    #[test]
    fn rejects_thin_box() {
        let tol = Tolerance::default();
        assert!(Cuboid::new(1.0, 1e-10, 1.0, tol).is_err());
        assert!(Cuboid::new(f64::NAN, 1.0, 1.0, tol).is_err());
    }

    // ── normals ──

    #[test]
    fn face_edge_and_corner_normals() {
        let b = cube(10.0);
        assert_relative_eq!(b.surface_normal(&p(10.0, 1.0, 2.0)), Vector3::x());
        assert_relative_eq!(b.surface_normal(&p(1.0, -10.0, 2.0)), -Vector3::y());
        let edge = b.surface_normal(&p(10.0, 10.0, 0.0));
        assert_relative_eq!(edge, v(1.0, 1.0, 0.0), epsilon = 1e-12);
        let corner = b.surface_normal(&p(-10.0, 10.0, -10.0));
        assert_relative_eq!(corner, v(-1.0, 1.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn normal_off_surface_uses_nearest_face() {
        let b = cube(10.0);
        assert_relative_eq!(b.surface_normal(&p(1.0, 8.0, 2.0)), Vector3::y());
        assert_relative_eq!(b.surface_normal(&p(0.0, 0.0, -30.0)), -Vector3::z());
    }

    // ── distances ──

    #[test]
    fn entry_along_axis() {
        let b = cube(10.0);
        let d = b.distance_to_entry(&p(-20.0, 0.0, 0.0), &Vector3::x());
        assert_relative_eq!(d, 10.0);
    }

    #[test]
    fn entry_misses_and_moving_away() {
        let b = cube(10.0);
        assert!(b.distance_to_entry(&p(-20.0, 15.0, 0.0), &Vector3::x()).is_infinite());
        assert!(b.distance_to_entry(&p(-20.0, 0.0, 0.0), &(-Vector3::x())).is_infinite());
        assert!(b.distance_to_entry(&p(10.0, 0.0, 0.0), &Vector3::x()).is_infinite());
    }

    #[test]
    fn entry_from_surface_is_zero() {
        let b = cube(10.0);
        assert_eq!(b.distance_to_entry(&p(10.0, 3.0, 0.0), &(-Vector3::x())), 0.0);
    }

    #[test]
    fn oblique_entry_through_edge_region() {
        let b = cube(1.0);
        let dir = v(1.0, 1.0, 0.0);
        let d = b.distance_to_entry(&p(-3.0, -3.0, 0.0), &dir);
        assert_relative_eq!(d, 2.0 * 2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn exit_distance_and_normal() {
        let b = cube(10.0);
        let hit = b.distance_to_exit(&p(0.0, 0.0, 0.0), &Vector3::y(), true);
        assert_relative_eq!(hit.distance, 10.0);
        assert_eq!(hit.normal, Some(Vector3::y()));
        assert!(hit.convex);

        let on_face = b.distance_to_exit(&p(0.0, 0.0, -10.0), &(-Vector3::z()), true);
        assert_eq!(on_face.distance, 0.0);
        assert_eq!(on_face.normal, Some(-Vector3::z()));
    }

    #[test]
    fn safeties() {
        let b = cube(10.0);
        assert_relative_eq!(b.safety_to_exit(&p(7.0, 1.0, -2.0)), 3.0);
        assert_relative_eq!(b.safety_to_entry(&p(13.0, 0.0, 11.0)), 3.0);
        assert_eq!(b.safety_to_entry(&p(1.0, 1.0, 1.0)), 0.0);
    }

    #[test]
    fn volume_and_area() {
        let b = Cuboid::new(1.0, 2.0, 3.0, Tolerance::default()).unwrap();
        assert_relative_eq!(b.volume(), 48.0);
        assert_relative_eq!(b.surface_area(), 88.0);
        // Memoized value is stable.
        assert_relative_eq!(b.volume(), 48.0);
    }

    // ── properties ──

    #[test]
    fn random_interior_points_have_positive_exit() {
        let b = Cuboid::new(3.0, 4.0, 5.0, Tolerance::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            let q = p(
                rng.random_range(-2.9..2.9),
                rng.random_range(-3.9..3.9),
                rng.random_range(-4.9..4.9),
            );
            assert_eq!(b.classify(&q), EInside::Inside);
            assert!(b.safety_to_exit(&q) > 0.0);
            let dir = v(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0), 0.3);
            assert!(b.distance_to_exit(&q, &dir, false).distance > 0.0);
        }
    }

    #[test]
    fn entry_point_is_not_outside() {
        let b = Cuboid::new(3.0, 4.0, 5.0, Tolerance::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..1000 {
            let origin = p(
                rng.random_range(-30.0..30.0),
                rng.random_range(-30.0..30.0),
                rng.random_range(-30.0..30.0),
            );
            if b.classify(&origin) != EInside::Outside {
                continue;
            }
            let target = p(rng.random_range(-2.0..2.0), rng.random_range(-3.0..3.0), 0.0);
            let dir = (target - origin).normalize();
            let d = b.distance_to_entry(&origin, &dir);
            assert!(d.is_finite());
            assert_ne!(b.classify(&(origin + dir * d)), EInside::Outside);
        }
    }
}
