//! Query core shared by [`Tube`](super::Tube) and [`Cone`](super::Cone).
//!
//! Both solids are the region `R_in(z) <= rho <= R_out(z)`, `|z| <= dz`,
//! inside an optional phi wedge, where each radius varies linearly in z
//! (constant for a tube).

use tracing::debug;

use crate::math::{solve_quadratic, Aabb, Point3, Tolerance, Vector3};

use super::phi::{PhiFace, PhiSection};
use super::{normalize_or, EInside, ExitHit};

/// The surface `rho = tan * z + mid` (a cylinder when `tan == 0`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RadialSurface {
    tan: f64,
    mid: f64,
    sec: f64,
}

impl RadialSurface {
    /// Surface through radius `r1` at `-dz` and `r2` at `+dz`.
    pub(crate) fn new(r1: f64, r2: f64, dz: f64) -> Self {
        let tan = (r2 - r1) / (2.0 * dz);
        Self {
            tan,
            mid: 0.5 * (r1 + r2),
            sec: tan.hypot(1.0),
        }
    }

    fn radius_at(&self, z: f64) -> f64 {
        self.tan * z + self.mid
    }

    /// Perpendicular distance to the surface in the meridian plane,
    /// positive on the large-rho side.
    fn excess(&self, p: &Point3) -> f64 {
        (p.x.hypot(p.y) - self.radius_at(p.z)) / self.sec
    }

    /// Unit normal pointing to the large-rho side.
    fn normal(&self, p: &Point3) -> Vector3 {
        let rho = p.x.hypot(p.y);
        let (cx, cy) = if rho > 0.0 { (p.x / rho, p.y / rho) } else { (1.0, 0.0) };
        Vector3::new(cx, cy, -self.tan) / self.sec
    }

    /// Sign of the rate of change of `rho^2 - R(z)^2` along `v` at `q`:
    /// positive when moving towards the large-rho side.
    fn crossing_rate(&self, q: &Point3, v: &Vector3) -> f64 {
        q.x * v.x + q.y * v.y - self.tan * self.radius_at(q.z) * v.z
    }

    /// Parameters where `p + t * v` meets the (double) cone.
    fn roots(&self, p: &Point3, v: &Vector3) -> Option<(f64, f64)> {
        let rz = self.radius_at(p.z);
        let a = v.x * v.x + v.y * v.y - self.tan * self.tan * v.z * v.z;
        let half_b = p.x * v.x + p.y * v.y - self.tan * v.z * rz;
        let c = p.x * p.x + p.y * p.y - rz * rz;
        solve_quadratic(a, half_b, c)
    }

    /// Rejects the mirror nappe of the double cone.
    fn on_real_nappe(&self, q: &Point3, half_tolerance: f64) -> bool {
        self.radius_at(q.z) >= -half_tolerance
    }
}

/// Boundary faces of an axial shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AxialFace {
    Outer,
    Inner,
    Z,
    Phi(PhiFace),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AxialShell {
    outer: RadialSurface,
    inner: Option<RadialSurface>,
    dz: f64,
    phi: PhiSection,
    tolerance: Tolerance,
}

impl AxialShell {
    pub(crate) fn new(
        outer: RadialSurface,
        inner: Option<RadialSurface>,
        dz: f64,
        phi: PhiSection,
        tolerance: Tolerance,
    ) -> Self {
        Self {
            outer,
            inner,
            dz,
            phi,
            tolerance,
        }
    }

    fn z_excess(&self, p: &Point3) -> f64 {
        p.z.abs() - self.dz
    }

    /// Signed distance to the inner surface, positive inside the bore.
    fn bore_excess(&self, p: &Point3) -> Option<f64> {
        self.inner.map(|s| -s.excess(p))
    }

    pub(crate) fn classify(&self, p: &Point3) -> EInside {
        let half = self.tolerance.half();
        let mut pos = EInside::from_signed_distance(self.z_excess(p), half);
        if pos == EInside::Outside {
            return pos;
        }
        pos = pos.and(EInside::from_signed_distance(self.outer.excess(p), half));
        if let Some(bore) = self.bore_excess(p) {
            pos = pos.and(EInside::from_signed_distance(bore, half));
        }
        if pos == EInside::Outside {
            return pos;
        }
        pos.and(self.phi.classify(p, half))
    }

    /// Checks every constraint except `skip` with the tolerant band.
    fn accepts(&self, q: &Point3, skip: AxialFace) -> bool {
        let half = self.tolerance.half();
        if skip != AxialFace::Z && self.z_excess(q) > half {
            return false;
        }
        if skip != AxialFace::Outer && self.outer.excess(q) > half {
            return false;
        }
        if skip != AxialFace::Inner && self.bore_excess(q).is_some_and(|e| e > half) {
            return false;
        }
        matches!(skip, AxialFace::Phi(_)) || self.phi.classify(q, half) != EInside::Outside
    }

    fn face_normal(&self, face: AxialFace, q: &Point3) -> Vector3 {
        match face {
            AxialFace::Outer => self.outer.normal(q),
            AxialFace::Inner => self.inner.map_or(-Vector3::z(), |s| -s.normal(q)),
            AxialFace::Z => Vector3::new(0.0, 0.0, q.z.signum()),
            AxialFace::Phi(f) => self.phi.normal(f),
        }
    }

    fn face_convex(&self, face: AxialFace) -> bool {
        match face {
            AxialFace::Outer | AxialFace::Z => true,
            AxialFace::Inner => false,
            AxialFace::Phi(_) => self.phi.faces_convex(),
        }
    }

    /// Unsigned distances from `p` to the surface of each face.
    fn face_distances(&self, p: &Point3) -> Vec<(AxialFace, f64)> {
        let mut out = vec![
            (AxialFace::Z, self.z_excess(p).abs()),
            (AxialFace::Outer, self.outer.excess(p).abs()),
        ];
        if let Some(bore) = self.bore_excess(p) {
            out.push((AxialFace::Inner, bore.abs()));
        }
        if !self.phi.is_full() {
            for f in [PhiFace::Start, PhiFace::End] {
                out.push((AxialFace::Phi(f), self.phi.face_distance(f, p)));
            }
        }
        out
    }

    pub(crate) fn surface_normal(&self, p: &Point3) -> Vector3 {
        let half = self.tolerance.half();
        let distances = self.face_distances(p);
        let mut sum = Vector3::zeros();
        let mut touching = 0;
        for &(face, d) in &distances {
            if d <= half {
                sum += self.face_normal(face, p);
                touching += 1;
            }
        }
        if touching == 0 {
            let nearest = distances
                .iter()
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map_or(AxialFace::Z, |&(f, _)| f);
            return self.face_normal(nearest, p);
        }
        normalize_or(sum, self.face_normal(AxialFace::Z, p))
    }

    pub(crate) fn distance_to_entry(&self, p: &Point3, v: &Vector3) -> f64 {
        let half = self.tolerance.half();
        let z_excess = self.z_excess(p);
        if z_excess >= -half && p.z * v.z >= 0.0 {
            return f64::INFINITY;
        }
        let outer_excess = self.outer.excess(p);
        if outer_excess.abs() <= half && self.outer.crossing_rate(p, v) >= 0.0 {
            return f64::INFINITY;
        }

        let mut best = f64::INFINITY;

        if z_excess >= -half {
            let t = (z_excess / v.z.abs()).max(0.0);
            if self.accepts(&(p + v * t), AxialFace::Z) {
                best = t;
            }
        }

        if outer_excess.abs() <= half {
            if self.accepts(p, AxialFace::Outer) {
                best = 0.0;
            }
        } else if outer_excess > half {
            if let Some(t) = self.first_crossing(&self.outer, p, v, best, true, AxialFace::Outer) {
                best = t;
            }
        }

        if let (Some(inner), Some(bore)) = (self.inner, self.bore_excess(p)) {
            if bore.abs() <= half && inner.crossing_rate(p, v) > 0.0 {
                if self.accepts(p, AxialFace::Inner) {
                    best = 0.0;
                }
            } else if let Some(t) = self.first_crossing(&inner, p, v, best, false, AxialFace::Inner) {
                best = t;
            }
        }

        for face in [PhiFace::Start, PhiFace::End] {
            if let Some((t, q)) = self.phi.crossing(face, p, v, true, half) {
                if t < best && self.accepts(&q, AxialFace::Phi(face)) {
                    best = t;
                }
            }
        }

        if best < half {
            0.0
        } else {
            best
        }
    }

    /// Nearest root of `surface` along the ray that crosses towards its
    /// small-rho side (`inward`) or large-rho side and passes `accepts`.
    fn first_crossing(
        &self,
        surface: &RadialSurface,
        p: &Point3,
        v: &Vector3,
        limit: f64,
        inward: bool,
        face: AxialFace,
    ) -> Option<f64> {
        let half = self.tolerance.half();
        let (t1, t2) = surface.roots(p, v)?;
        [t1, t2].into_iter().find(|&t| {
            if t < 0.0 || t >= limit {
                return false;
            }
            let q = p + v * t;
            let rate = surface.crossing_rate(&q, v);
            let sense = if inward { rate < 0.0 } else { rate > 0.0 };
            sense && surface.on_real_nappe(&q, half) && self.accepts(&q, face)
        })
    }

    pub(crate) fn safety_to_entry(&self, p: &Point3) -> f64 {
        let mut safe = self.z_excess(p).max(self.outer.excess(p));
        if let Some(bore) = self.bore_excess(p) {
            safe = safe.max(bore);
        }
        safe.max(self.phi.safety_outside(p)).max(0.0)
    }

    pub(crate) fn distance_to_exit(&self, p: &Point3, v: &Vector3, want_normal: bool) -> ExitHit {
        let half = self.tolerance.half();
        let mut best = f64::INFINITY;
        let mut best_face = AxialFace::Z;

        if v.z != 0.0 {
            let t = if p.z * v.z > 0.0 && self.z_excess(p) >= -half {
                0.0
            } else {
                (self.dz.copysign(v.z) - p.z) / v.z
            };
            best = t.max(0.0);
        }

        if self.outer.excess(p) >= -half && self.outer.crossing_rate(p, v) > 0.0 {
            best = 0.0;
            best_face = AxialFace::Outer;
        } else if let Some(t) = self.exit_crossing(&self.outer, p, v, best, true) {
            best = t;
            best_face = AxialFace::Outer;
        }

        if let (Some(inner), Some(bore)) = (self.inner, self.bore_excess(p)) {
            if bore >= -half && inner.crossing_rate(p, v) < 0.0 {
                best = 0.0;
                best_face = AxialFace::Inner;
            } else if let Some(t) = self.exit_crossing(&inner, p, v, best, false) {
                best = t;
                best_face = AxialFace::Inner;
            }
        }

        for face in [PhiFace::Start, PhiFace::End] {
            if let Some((t, _)) = self.phi.crossing(face, p, v, false, half) {
                if t < best {
                    best = t;
                    best_face = AxialFace::Phi(face);
                }
            }
        }

        if !best.is_finite() {
            debug!(?p, ?v, "no exit face found from axial shell");
            return ExitHit::new(0.0, self.surface_normal(p), false, want_normal);
        }

        let q = p + v * best;
        let normal = if best_face == AxialFace::Z {
            Vector3::new(0.0, 0.0, v.z.signum())
        } else {
            self.face_normal(best_face, &q)
        };
        ExitHit::new(best, normal, self.face_convex(best_face), want_normal)
    }

    /// Nearest root where the ray leaves the material through `surface`:
    /// outwards through the outer surface, into the bore through the inner.
    fn exit_crossing(
        &self,
        surface: &RadialSurface,
        p: &Point3,
        v: &Vector3,
        limit: f64,
        outward: bool,
    ) -> Option<f64> {
        let half = self.tolerance.half();
        let (t1, t2) = surface.roots(p, v)?;
        [t1, t2].into_iter().find(|&t| {
            if t < 0.0 || t >= limit {
                return false;
            }
            let q = p + v * t;
            let rate = surface.crossing_rate(&q, v);
            let sense = if outward { rate > 0.0 } else { rate < 0.0 };
            sense && surface.on_real_nappe(&q, half)
        })
    }

    pub(crate) fn safety_to_exit(&self, p: &Point3) -> f64 {
        let mut safe = (-self.z_excess(p)).min(-self.outer.excess(p));
        if let Some(bore) = self.bore_excess(p) {
            safe = safe.min(-bore);
        }
        safe.min(self.phi.safety_inside(p)).max(0.0)
    }

    /// Bounding box given the smallest inner and largest outer radius.
    pub(crate) fn extent(&self, rmin: f64, rmax: f64) -> Aabb {
        let (x0, x1, y0, y1) = self.phi.xy_bounds(rmin, rmax);
        Aabb::new(Point3::new(x0, y0, -self.dz), Point3::new(x1, y1, self.dz))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cylinder_surface_excess_and_normal() {
        let s = RadialSurface::new(2.0, 2.0, 5.0);
        let p = Point3::new(3.0, 0.0, 1.0);
        assert!((s.excess(&p) - 1.0).abs() < 1e-12);
        assert!((s.normal(&p) - Vector3::x()).norm() < 1e-12);
    }

    #[test]
    fn cone_surface_excess_is_perpendicular() {
        // Radius 0 at z = -1, radius 2 at z = +1: 45 degree wall at slope 1.
        let s = RadialSurface::new(0.0, 2.0, 1.0);
        assert!((s.radius_at(0.0) - 1.0).abs() < 1e-12);
        let p = Point3::new(2.0, 0.0, 0.0);
        assert!((s.excess(&p) - 1.0 / 2f64.sqrt()).abs() < 1e-12);
        let n = s.normal(&p);
        assert!((n - Vector3::new(1.0, 0.0, -1.0).normalize()).norm() < 1e-12);
    }

    #[test]
    fn cone_roots_reject_mirror_nappe() {
        let s = RadialSurface::new(0.0, 2.0, 1.0);
        // Apex at z = -1; a ray along x at z = -3 only meets the mirror nappe.
        let p = Point3::new(-10.0, 0.0, -3.0);
        let v = Vector3::x();
        let (t1, t2) = s.roots(&p, &v).unwrap();
        for t in [t1, t2] {
            let q = p + v * t;
            assert!(!s.on_real_nappe(&q, 1e-9));
        }
    }
}
