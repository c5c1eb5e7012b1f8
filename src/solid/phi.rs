use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3};

use super::EInside;

/// An azimuthal wedge `start <= phi <= start + delta` around the z axis.
///
/// The wedge is bounded by two half-planes containing the z axis. Their
/// outward normals point away from the wedge: the start face normal is the
/// start direction rotated by -90 degrees, the end face normal is the end
/// direction rotated by +90 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhiSection {
    start: f64,
    delta: f64,
    full: bool,
    /// Unit direction of the start half-plane in the xy plane.
    start_dir: (f64, f64),
    /// Unit direction of the end half-plane in the xy plane.
    end_dir: (f64, f64),
}

/// One of the two bounding half-planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhiFace {
    Start,
    End,
}

impl PhiSection {
    /// A full turn: no phi boundaries.
    #[must_use]
    pub fn full() -> Self {
        Self {
            start: 0.0,
            delta: TAU,
            full: true,
            start_dir: (1.0, 0.0),
            end_dir: (1.0, 0.0),
        }
    }

    /// A wedge of `delta` radians starting at `start`.
    ///
    /// A `delta` of at least one full turn yields [`PhiSection::full`].
    ///
    /// # Errors
    ///
    /// Returns an error if `delta` is not positive or either angle is not
    /// finite.
    pub fn new(start: f64, delta: f64) -> Result<Self> {
        if !start.is_finite() || !delta.is_finite() || delta <= 0.0 {
            return Err(GeometryError::ParameterOutOfRange {
                parameter: "delta phi",
                value: delta,
                min: 0.0,
                max: TAU,
            }
            .into());
        }
        if delta >= TAU - 1e-12 {
            return Ok(Self::full());
        }
        let start = start.rem_euclid(TAU);
        let end = start + delta;
        Ok(Self {
            start,
            delta,
            full: false,
            start_dir: (start.cos(), start.sin()),
            end_dir: (end.cos(), end.sin()),
        })
    }

    /// Returns `true` when the section covers the full turn.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Start angle in `[0, 2pi)`.
    #[must_use]
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Opening angle.
    #[must_use]
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// The bounding faces are convex only when the wedge opens at most pi.
    #[must_use]
    pub fn faces_convex(&self) -> bool {
        self.delta <= PI
    }

    /// Outward normal of a bounding face.
    #[must_use]
    pub fn normal(&self, face: PhiFace) -> Vector3 {
        match face {
            PhiFace::Start => Vector3::new(self.start_dir.1, -self.start_dir.0, 0.0),
            PhiFace::End => Vector3::new(-self.end_dir.1, self.end_dir.0, 0.0),
        }
    }

    fn dir(&self, face: PhiFace) -> (f64, f64) {
        match face {
            PhiFace::Start => self.start_dir,
            PhiFace::End => self.end_dir,
        }
    }

    /// Signed distance to the infinite plane of a face, positive on the
    /// side its outward normal points to.
    #[must_use]
    pub fn plane_distance(&self, face: PhiFace, p: &Point3) -> f64 {
        let n = self.normal(face);
        p.x * n.x + p.y * n.y
    }

    /// Returns `true` if the xy projection of `p` lies on the half of the
    /// face's plane that actually bounds the wedge.
    #[must_use]
    pub fn on_half_plane(&self, face: PhiFace, p: &Point3, half_tolerance: f64) -> bool {
        let (ux, uy) = self.dir(face);
        p.x * ux + p.y * uy >= -half_tolerance
    }

    /// Unsigned distance from `p` to a bounding half-plane.
    #[must_use]
    pub fn face_distance(&self, face: PhiFace, p: &Point3) -> f64 {
        let (ux, uy) = self.dir(face);
        if p.x * ux + p.y * uy >= 0.0 {
            self.plane_distance(face, p).abs()
        } else {
            p.x.hypot(p.y)
        }
    }

    /// Returns `true` if the azimuth of `p` lies within the wedge.
    #[must_use]
    pub fn contains_angle(&self, p: &Point3) -> bool {
        if self.full {
            return true;
        }
        let rel = (p.y.atan2(p.x) - self.start).rem_euclid(TAU);
        rel <= self.delta
    }

    /// Classifies `p` against the wedge alone.
    #[must_use]
    pub fn classify(&self, p: &Point3, half_tolerance: f64) -> EInside {
        if self.full {
            return EInside::Inside;
        }
        let nearest = self
            .face_distance(PhiFace::Start, p)
            .min(self.face_distance(PhiFace::End, p));
        if nearest <= half_tolerance {
            EInside::Surface
        } else if self.contains_angle(p) {
            EInside::Inside
        } else {
            EInside::Outside
        }
    }

    /// Faces within `half_tolerance` of `p`.
    pub fn touching_faces(&self, p: &Point3, half_tolerance: f64) -> impl Iterator<Item = PhiFace> + '_ {
        let p = *p;
        [PhiFace::Start, PhiFace::End]
            .into_iter()
            .filter(move |&f| !self.full && self.face_distance(f, &p) <= half_tolerance)
    }

    /// Lower bound on the distance from an inside point to either face.
    #[must_use]
    pub fn safety_inside(&self, p: &Point3) -> f64 {
        if self.full {
            return f64::INFINITY;
        }
        self.face_distance(PhiFace::Start, p)
            .min(self.face_distance(PhiFace::End, p))
    }

    /// Lower bound on the distance from `p` to the wedge; zero inside.
    #[must_use]
    pub fn safety_outside(&self, p: &Point3) -> f64 {
        if self.full || self.contains_angle(p) {
            return 0.0;
        }
        self.safety_inside(p)
    }

    /// Candidate crossing of a face plane along `p + t * v`.
    ///
    /// `entering` selects crossings against the outward normal. Returns the
    /// non-negative distance and the crossing point when the ray meets the
    /// face's half-plane in the requested sense; `None` otherwise. A point
    /// within the tolerance band of the plane yields distance zero.
    #[must_use]
    pub fn crossing(
        &self,
        face: PhiFace,
        p: &Point3,
        v: &Vector3,
        entering: bool,
        half_tolerance: f64,
    ) -> Option<(f64, Point3)> {
        if self.full {
            return None;
        }
        let n = self.normal(face);
        let vn = v.x * n.x + v.y * n.y;
        let s = self.plane_distance(face, p);
        let t = if entering {
            if vn >= 0.0 || s < -half_tolerance {
                return None;
            }
            if s <= half_tolerance {
                0.0
            } else {
                s / -vn
            }
        } else {
            if vn <= 0.0 || s > half_tolerance {
                return None;
            }
            if s >= -half_tolerance {
                0.0
            } else {
                -s / vn
            }
        };
        let hit = p + v * t;
        self.on_half_plane(face, &hit, half_tolerance).then_some((t, hit))
    }

    /// Bounding rectangle `(min_x, max_x, min_y, max_y)` of the wedge
    /// clipped to the annulus `rmin <= rho <= rmax`.
    #[must_use]
    pub fn xy_bounds(&self, rmin: f64, rmax: f64) -> (f64, f64, f64, f64) {
        if self.full {
            return (-rmax, rmax, -rmax, rmax);
        }
        let mut xs = Vec::with_capacity(8);
        let mut ys = Vec::with_capacity(8);
        for (cx, cy) in [self.start_dir, self.end_dir] {
            for r in [rmin, rmax] {
                xs.push(cx * r);
                ys.push(cy * r);
            }
        }
        // Axis directions swept by the wedge reach the outer radius.
        for k in 0..4_u8 {
            let angle = f64::from(k) * FRAC_PI_2;
            let rel = (angle - self.start).rem_euclid(TAU);
            if rel <= self.delta {
                xs.push(angle.cos() * rmax);
                ys.push(angle.sin() * rmax);
            }
        }
        let fold = |v: &[f64], pick: fn(f64, f64) -> f64, init: f64| v.iter().copied().fold(init, pick);
        (
            fold(&xs, f64::min, f64::INFINITY),
            fold(&xs, f64::max, f64::NEG_INFINITY),
            fold(&ys, f64::min, f64::INFINITY),
            fold(&ys, f64::max, f64::NEG_INFINITY),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn quarter() -> PhiSection {
        PhiSection::new(0.0, FRAC_PI_2).unwrap()
    }

    #[test]
    fn full_turn_contains_everything() {
        let s = PhiSection::new(0.3, TAU).unwrap();
        assert!(s.is_full());
        assert_eq!(s.classify(&p(-1.0, -1.0, 0.0), 1e-9), EInside::Inside);
    }

    #[test]
    fn quarter_wedge_classification() {
        let s = quarter();
        assert_eq!(s.classify(&p(1.0, 1.0, 0.0), 1e-9), EInside::Inside);
        assert_eq!(s.classify(&p(1.0, 0.0, 0.0), 1e-9), EInside::Surface);
        assert_eq!(s.classify(&p(0.0, 1.0, 5.0), 1e-9), EInside::Surface);
        assert_eq!(s.classify(&p(-1.0, 1.0, 0.0), 1e-9), EInside::Outside);
        assert_eq!(s.classify(&p(1.0, -1.0, 0.0), 1e-9), EInside::Outside);
        // On the axis both faces meet.
        assert_eq!(s.classify(&p(0.0, 0.0, 0.0), 1e-9), EInside::Surface);
    }

    #[test]
    fn face_normals_point_away_from_wedge() {
        let s = quarter();
        let ns = s.normal(PhiFace::Start);
        let ne = s.normal(PhiFace::End);
        assert!((ns - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-12);
        assert!((ne - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn entering_crossing_of_start_face() {
        let s = quarter();
        let hit = s.crossing(PhiFace::Start, &p(1.0, -2.0, 0.0), &Vector3::y(), true, 1e-9);
        let (t, q) = hit.unwrap();
        assert!((t - 2.0).abs() < 1e-12);
        assert!((q - p(1.0, 0.0, 0.0)).norm() < 1e-12);
        // Crossing the negative extension of the plane does not count.
        assert!(s
            .crossing(PhiFace::Start, &p(-1.0, -2.0, 0.0), &Vector3::y(), true, 1e-9)
            .is_none());
    }

    #[test]
    fn exiting_crossing_of_end_face() {
        let s = quarter();
        let (t, _) = s
            .crossing(PhiFace::End, &p(3.0, 1.0, 0.0), &(-Vector3::x()), false, 1e-9)
            .unwrap();
        assert!((t - 3.0).abs() < 1e-12);
    }

    #[test]
    fn wide_wedge_faces_are_not_convex() {
        assert!(quarter().faces_convex());
        assert!(!PhiSection::new(0.0, 1.5 * PI).unwrap().faces_convex());
    }

    #[test]
    fn bounds_of_first_quadrant() {
        let (x0, x1, y0, y1) = quarter().xy_bounds(1.0, 2.0);
        assert!(x0.abs() < 1e-12 && y0.abs() < 1e-12);
        assert!((x1 - 2.0).abs() < 1e-12 && (y1 - 2.0).abs() < 1e-12);
    }

    #[test]
    fn invalid_delta_rejected() {
        assert!(PhiSection::new(0.0, 0.0).is_err());
        assert!(PhiSection::new(0.0, -1.0).is_err());
    }
}
