use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

use tracing::debug;

use crate::error::{GeometryError, Result};
use crate::math::{solve_quadratic, Aabb, Point3, Tolerance, Vector3};

use super::phi::{PhiFace, PhiSection};
use super::{normalize_or, EInside, ExitHit, MeasureCache, Solid};

const ANGLE_EPS: f64 = 1e-12;

/// A polar range `start <= theta <= end` measured from +z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThetaRange {
    start: f64,
    end: f64,
}

impl ThetaRange {
    /// The whole range `[0, pi]`.
    #[must_use]
    pub fn full() -> Self {
        Self { start: 0.0, end: PI }
    }

    /// A range of `delta` radians starting at `start`, clipped at pi.
    ///
    /// # Errors
    ///
    /// Returns an error if `start` is outside `[0, pi)` or `delta` is not
    /// positive.
    pub fn new(start: f64, delta: f64) -> Result<Self> {
        if !(0.0..PI).contains(&start) {
            return Err(GeometryError::ParameterOutOfRange {
                parameter: "start theta",
                value: start,
                min: 0.0,
                max: PI,
            }
            .into());
        }
        if !(delta > 0.0) || !delta.is_finite() {
            return Err(GeometryError::ParameterOutOfRange {
                parameter: "delta theta",
                value: delta,
                min: 0.0,
                max: PI,
            }
            .into());
        }
        Ok(Self {
            start,
            end: (start + delta).min(PI),
        })
    }

    #[must_use]
    pub fn start(&self) -> f64 {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> f64 {
        self.end
    }

    #[must_use]
    pub fn delta(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        !self.has_start_face() && !self.has_end_face()
    }

    fn has_start_face(&self) -> bool {
        self.start > ANGLE_EPS
    }

    fn has_end_face(&self) -> bool {
        self.end < PI - ANGLE_EPS
    }
}

/// The half-cone `theta = alpha` with its apex at the origin; the plane
/// `z = 0` when `alpha` is a right angle.
#[derive(Debug, Clone, Copy)]
struct ThetaCone {
    cos: f64,
    sin: f64,
}

impl ThetaCone {
    fn new(alpha: f64) -> Self {
        Self {
            cos: alpha.cos(),
            sin: alpha.sin(),
        }
    }

    fn is_planar(&self) -> bool {
        self.cos.abs() < ANGLE_EPS
    }

    fn roots(&self, p: &Point3, v: &Vector3) -> Option<(f64, f64)> {
        if self.is_planar() {
            if v.z == 0.0 {
                return None;
            }
            let t = -p.z / v.z;
            return Some((t, t));
        }
        let c2 = self.cos * self.cos;
        let s2 = self.sin * self.sin;
        let a = (v.x * v.x + v.y * v.y) * c2 - v.z * v.z * s2;
        let half_b = (p.x * v.x + p.y * v.y) * c2 - p.z * v.z * s2;
        let c = (p.x * p.x + p.y * p.y) * c2 - p.z * p.z * s2;
        solve_quadratic(a, half_b, c)
    }

    fn on_nappe(&self, q: &Point3, half_tolerance: f64) -> bool {
        self.is_planar() || q.z * self.cos >= -half_tolerance
    }

    /// Sign of `d theta / dt` along `v` at `q`.
    fn rate(&self, q: &Point3, v: &Vector3) -> f64 {
        if self.is_planar() {
            return -v.z;
        }
        q.z * (q.x * v.x + q.y * v.y) - (q.x * q.x + q.y * q.y) * v.z
    }

    /// Unit vector of increasing theta on the cone at the azimuth of `q`.
    fn theta_hat(&self, q: &Point3) -> Vector3 {
        let rho = q.x.hypot(q.y);
        let (cphi, sphi) = if rho > 0.0 { (q.x / rho, q.y / rho) } else { (1.0, 0.0) };
        Vector3::new(self.cos * cphi, self.cos * sphi, -self.sin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SphereFace {
    Outer,
    Inner,
    Phi(PhiFace),
    ThetaStart,
    ThetaEnd,
}

/// A spherical shell `rmin <= r <= rmax`, optionally cut to a phi segment
/// and a theta range.
#[derive(Debug, Clone)]
pub struct Sphere {
    rmin: f64,
    rmax: f64,
    phi: PhiSection,
    theta: ThetaRange,
    start_cone: ThetaCone,
    end_cone: ThetaCone,
    tolerance: Tolerance,
    cache: MeasureCache,
}

impl Sphere {
    /// # Errors
    ///
    /// Returns an error if `rmin` is negative or the shell is thinner than
    /// twice the surface tolerance.
    pub fn new(
        rmin: f64,
        rmax: f64,
        phi: PhiSection,
        theta: ThetaRange,
        tolerance: Tolerance,
    ) -> Result<Self> {
        let min = 2.0 * tolerance.surface();
        if !(rmin >= 0.0) || !rmin.is_finite() {
            return Err(GeometryError::ParameterOutOfRange {
                parameter: "rmin",
                value: rmin,
                min: 0.0,
                max: f64::MAX,
            }
            .into());
        }
        if !(rmax - rmin >= min) || !rmax.is_finite() {
            return Err(GeometryError::ParameterOutOfRange {
                parameter: "rmax",
                value: rmax,
                min: rmin + min,
                max: f64::MAX,
            }
            .into());
        }
        Ok(Self {
            rmin,
            rmax,
            phi,
            theta,
            start_cone: ThetaCone::new(theta.start),
            end_cone: ThetaCone::new(theta.end),
            tolerance,
            cache: MeasureCache::default(),
        })
    }

    /// A full spherical shell (a solid ball when `rmin` is zero).
    ///
    /// # Errors
    ///
    /// See [`Sphere::new`].
    pub fn full(rmin: f64, rmax: f64, tolerance: Tolerance) -> Result<Self> {
        Self::new(rmin, rmax, PhiSection::full(), ThetaRange::full(), tolerance)
    }

    #[must_use]
    pub fn rmin(&self) -> f64 {
        self.rmin
    }

    #[must_use]
    pub fn rmax(&self) -> f64 {
        self.rmax
    }

    #[must_use]
    pub fn phi(&self) -> &PhiSection {
        &self.phi
    }

    #[must_use]
    pub fn theta(&self) -> &ThetaRange {
        &self.theta
    }

    fn has_inner(&self) -> bool {
        self.rmin > 0.0
    }

    /// Signed distances to the two theta cones, positive outside the range.
    fn theta_distances(&self, p: &Point3) -> (Option<f64>, Option<f64>) {
        let r = p.coords.norm();
        let theta = p.x.hypot(p.y).atan2(p.z);
        let gap = |angle: f64| r * angle.clamp(-FRAC_PI_2, FRAC_PI_2).sin();
        (
            self.theta
                .has_start_face()
                .then(|| gap(self.theta.start - theta)),
            self.theta.has_end_face().then(|| gap(theta - self.theta.end)),
        )
    }

    fn accepts(&self, q: &Point3, skip: SphereFace) -> bool {
        let half = self.tolerance.half();
        let r = q.coords.norm();
        if skip != SphereFace::Outer && r - self.rmax > half {
            return false;
        }
        if skip != SphereFace::Inner && self.has_inner() && self.rmin - r > half {
            return false;
        }
        if !matches!(skip, SphereFace::Phi(_)) && self.phi.classify(q, half) == EInside::Outside {
            return false;
        }
        let (ds, de) = self.theta_distances(q);
        if skip != SphereFace::ThetaStart && ds.is_some_and(|d| d > half) {
            return false;
        }
        !(skip != SphereFace::ThetaEnd && de.is_some_and(|d| d > half))
    }

    fn face_normal(&self, face: SphereFace, q: &Point3) -> Vector3 {
        let radial = q.coords.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z);
        match face {
            SphereFace::Outer => radial,
            SphereFace::Inner => -radial,
            SphereFace::Phi(f) => self.phi.normal(f),
            SphereFace::ThetaStart => -self.start_cone.theta_hat(q),
            SphereFace::ThetaEnd => self.end_cone.theta_hat(q),
        }
    }

    fn face_convex(&self, face: SphereFace) -> bool {
        match face {
            SphereFace::Outer => true,
            SphereFace::Inner => false,
            SphereFace::Phi(_) => self.phi.faces_convex(),
            SphereFace::ThetaStart => self.theta.start >= FRAC_PI_2,
            SphereFace::ThetaEnd => self.theta.end <= FRAC_PI_2,
        }
    }

    fn face_distances(&self, p: &Point3) -> Vec<(SphereFace, f64)> {
        let r = p.coords.norm();
        let mut out = vec![(SphereFace::Outer, (r - self.rmax).abs())];
        if self.has_inner() {
            out.push((SphereFace::Inner, (r - self.rmin).abs()));
        }
        if !self.phi.is_full() {
            for f in [PhiFace::Start, PhiFace::End] {
                out.push((SphereFace::Phi(f), self.phi.face_distance(f, p)));
            }
        }
        let (ds, de) = self.theta_distances(p);
        if let Some(d) = ds {
            out.push((SphereFace::ThetaStart, d.abs()));
        }
        if let Some(d) = de {
            out.push((SphereFace::ThetaEnd, d.abs()));
        }
        out
    }

    /// First crossing of a theta cone with the requested sign of the theta
    /// rate.
    fn theta_crossing(
        &self,
        cone: &ThetaCone,
        p: &Point3,
        v: &Vector3,
        limit: f64,
        increasing: bool,
        skip: Option<SphereFace>,
    ) -> Option<f64> {
        let half = self.tolerance.half();
        let (t1, t2) = cone.roots(p, v)?;
        [t1, t2].into_iter().find(|&t| {
            if t < 0.0 || t >= limit {
                return false;
            }
            let q = p + v * t;
            let rate = cone.rate(&q, v);
            let sense = if increasing { rate > 0.0 } else { rate < 0.0 };
            sense && cone.on_nappe(&q, half) && skip.is_none_or(|face| self.accepts(&q, face))
        })
    }

    fn sphere_roots(p: &Point3, v: &Vector3, radius: f64) -> Option<(f64, f64)> {
        solve_quadratic(v.norm_squared(), p.coords.dot(v), p.coords.norm_squared() - radius * radius)
    }
}

impl Solid for Sphere {
    fn classify(&self, p: &Point3) -> EInside {
        let half = self.tolerance.half();
        let r = p.coords.norm();
        let mut pos = EInside::from_signed_distance(r - self.rmax, half);
        if self.has_inner() {
            pos = pos.and(EInside::from_signed_distance(self.rmin - r, half));
        }
        if pos == EInside::Outside {
            return pos;
        }
        pos = pos.and(self.phi.classify(p, half));
        let (ds, de) = self.theta_distances(p);
        for d in [ds, de].into_iter().flatten() {
            pos = pos.and(EInside::from_signed_distance(d, half));
        }
        pos
    }

    fn surface_normal(&self, p: &Point3) -> Vector3 {
        let half = self.tolerance.half();
        let distances = self.face_distances(p);
        let mut sum = Vector3::zeros();
        for &(face, d) in &distances {
            if d <= half {
                sum += self.face_normal(face, p);
            }
        }
        if sum == Vector3::zeros() {
            let nearest = distances
                .iter()
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(SphereFace::Outer, |&(f, _)| f);
            return self.face_normal(nearest, p);
        }
        normalize_or(sum, self.face_normal(SphereFace::Outer, p))
    }

    fn distance_to_entry(&self, p: &Point3, v: &Vector3) -> f64 {
        let half = self.tolerance.half();
        let r = p.coords.norm();
        let pv = p.coords.dot(v);
        if r - self.rmax >= -half && pv >= 0.0 {
            return f64::INFINITY;
        }

        let mut best = f64::INFINITY;

        if (r - self.rmax).abs() <= half {
            if self.accepts(p, SphereFace::Outer) {
                best = 0.0;
            }
        } else if r > self.rmax {
            if let Some((t, _)) = Self::sphere_roots(p, v, self.rmax) {
                if t >= 0.0 && self.accepts(&(p + v * t), SphereFace::Outer) {
                    best = t;
                }
            }
        }

        if self.has_inner() {
            if (r - self.rmin).abs() <= half && pv > 0.0 {
                if self.accepts(p, SphereFace::Inner) {
                    best = 0.0;
                }
            } else if let Some((_, t)) = Self::sphere_roots(p, v, self.rmin) {
                // The far root leaves the bore, also for rays that start
                // beside the shell and pass through the cavity.
                let q = p + v * t;
                if t >= 0.0
                    && t < best
                    && q.coords.dot(v) > 0.0
                    && self.accepts(&q, SphereFace::Inner)
                {
                    best = t;
                }
            }
        }

        for face in [PhiFace::Start, PhiFace::End] {
            if let Some((t, q)) = self.phi.crossing(face, p, v, true, half) {
                if t < best && self.accepts(&q, SphereFace::Phi(face)) {
                    best = t;
                }
            }
        }

        // Entering the range means theta increasing through the start cone
        // and decreasing through the end cone.
        let (ds, de) = self.theta_distances(p);
        let cones = [
            (ds, self.start_cone, true, SphereFace::ThetaStart),
            (de, self.end_cone, false, SphereFace::ThetaEnd),
        ];
        for (dist, cone, increasing, face) in cones {
            let Some(dist) = dist else { continue };
            let rate = cone.rate(p, v);
            let into = if increasing { rate > 0.0 } else { rate < 0.0 };
            if dist.abs() <= half && into {
                if self.accepts(p, face) {
                    best = 0.0;
                }
            } else if let Some(t) = self.theta_crossing(&cone, p, v, best, increasing, Some(face)) {
                best = t;
            }
        }

        if best < half {
            0.0
        } else {
            best
        }
    }

    fn safety_to_entry(&self, p: &Point3) -> f64 {
        let r = p.coords.norm();
        let mut safe = r - self.rmax;
        if self.has_inner() {
            safe = safe.max(self.rmin - r);
        }
        safe = safe.max(self.phi.safety_outside(p));
        let (ds, de) = self.theta_distances(p);
        for d in [ds, de].into_iter().flatten() {
            safe = safe.max(d);
        }
        safe.max(0.0)
    }

    fn distance_to_exit(&self, p: &Point3, v: &Vector3, want_normal: bool) -> ExitHit {
        let half = self.tolerance.half();
        let r = p.coords.norm();
        let pv = p.coords.dot(v);
        let mut best = f64::INFINITY;
        let mut best_face = SphereFace::Outer;

        if r - self.rmax >= -half && pv > 0.0 {
            best = 0.0;
        } else if let Some((_, t)) = Self::sphere_roots(p, v, self.rmax) {
            best = t.max(0.0);
        }

        if self.has_inner() {
            if r - self.rmin <= half && pv < 0.0 {
                best = 0.0;
                best_face = SphereFace::Inner;
            } else if let Some((t, _)) = Self::sphere_roots(p, v, self.rmin) {
                if t >= 0.0 && t < best {
                    best = t;
                    best_face = SphereFace::Inner;
                }
            }
        }

        for face in [PhiFace::Start, PhiFace::End] {
            if let Some((t, _)) = self.phi.crossing(face, p, v, false, half) {
                if t < best {
                    best = t;
                    best_face = SphereFace::Phi(face);
                }
            }
        }

        // Leaving the range: theta decreasing through the start cone,
        // increasing through the end cone.
        let (ds, de) = self.theta_distances(p);
        let cones = [
            (ds, self.start_cone, false, SphereFace::ThetaStart),
            (de, self.end_cone, true, SphereFace::ThetaEnd),
        ];
        for (dist, cone, increasing, face) in cones {
            let Some(dist) = dist else { continue };
            let rate = cone.rate(p, v);
            let out = if increasing { rate > 0.0 } else { rate < 0.0 };
            if dist >= -half && out {
                best = 0.0;
                best_face = face;
            } else if let Some(t) = self.theta_crossing(&cone, p, v, best, increasing, None) {
                best = t;
                best_face = face;
            }
        }

        if !best.is_finite() {
            debug!(?p, ?v, "no exit face found from sphere");
            return ExitHit::new(0.0, self.surface_normal(p), false, want_normal);
        }
        let q = p + v * best;
        ExitHit::new(
            best,
            self.face_normal(best_face, &q),
            self.face_convex(best_face),
            want_normal,
        )
    }

    fn safety_to_exit(&self, p: &Point3) -> f64 {
        let r = p.coords.norm();
        let mut safe = self.rmax - r;
        if self.has_inner() {
            safe = safe.min(r - self.rmin);
        }
        safe = safe.min(self.phi.safety_inside(p));
        let (ds, de) = self.theta_distances(p);
        for d in [ds, de].into_iter().flatten() {
            safe = safe.min(-d);
        }
        safe.max(0.0)
    }

    fn extent(&self) -> Aabb {
        let (cs, ce) = (self.theta.start.cos(), self.theta.end.cos());
        let z_max = if cs >= 0.0 { self.rmax * cs } else { self.rmin * cs };
        let z_min = if ce <= 0.0 { self.rmax * ce } else { self.rmin * ce };
        let (ss, se) = (self.theta.start.sin(), self.theta.end.sin());
        let rho_max = if self.theta.start <= FRAC_PI_2 && self.theta.end >= FRAC_PI_2 {
            self.rmax
        } else {
            self.rmax * ss.max(se)
        };
        let rho_min = self.rmin * ss.min(se);
        let (x0, x1, y0, y1) = self.phi.xy_bounds(rho_min, rho_max);
        Aabb::new(Point3::new(x0, y0, z_min), Point3::new(x1, y1, z_max))
    }

    fn volume(&self) -> f64 {
        self.cache.volume(|| {
            let cubes = self.rmax.powi(3) - self.rmin.powi(3);
            self.phi.delta() * (self.theta.start.cos() - self.theta.end.cos()) * cubes / 3.0
        })
    }

    fn surface_area(&self) -> f64 {
        self.cache.area(|| {
            let dphi = self.phi.delta();
            let squares = self.rmax * self.rmax - self.rmin * self.rmin;
            let band = self.theta.start.cos() - self.theta.end.cos();
            let mut area = dphi * band * (self.rmax * self.rmax + self.rmin * self.rmin);
            if !self.phi.is_full() {
                area += self.theta.delta() * squares;
            }
            if self.theta.has_start_face() {
                area += 0.5 * dphi * self.theta.start.sin() * squares;
            }
            if self.theta.has_end_face() {
                area += 0.5 * dphi * self.theta.end.sin() * squares;
            }
            area
        })
    }

    fn tolerance(&self) -> Tolerance {
        self.tolerance
    }
}

impl fmt::Display for Sphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sphere(rmin={}, rmax={}, phi={}+{}, theta={}+{})",
            self.rmin,
            self.rmax,
            self.phi.start(),
            self.phi.delta(),
            self.theta.start,
            self.theta.delta()
        )
    }
}
