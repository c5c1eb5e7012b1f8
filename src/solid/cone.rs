use std::fmt;

use crate::error::{GeometryError, Result};
use crate::math::{Aabb, Point3, Tolerance, Vector3};

use super::axial::{AxialShell, RadialSurface};
use super::phi::PhiSection;
use super::{EInside, ExitHit, MeasureCache, Solid};

/// A conical shell along z whose inner and outer radii vary linearly from
/// `(rmin1, rmax1)` at `z = -dz` to `(rmin2, rmax2)` at `z = +dz`.
#[derive(Debug, Clone)]
pub struct Cone {
    rmin1: f64,
    rmax1: f64,
    rmin2: f64,
    rmax2: f64,
    dz: f64,
    phi: PhiSection,
    shell: AxialShell,
    tolerance: Tolerance,
    cache: MeasureCache,
}

/// Radii of a cone at its two ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeRadii {
    pub rmin1: f64,
    pub rmax1: f64,
    pub rmin2: f64,
    pub rmax2: f64,
}

impl Cone {
    /// Creates a cone segment spanning `delta_phi` radians from `start_phi`.
    ///
    /// # Errors
    ///
    /// Returns an error if a radius is negative or not finite, an inner
    /// radius exceeds the outer radius at the same end, both ends are
    /// thinner than the surface tolerance, or `dz` is below twice the
    /// tolerance.
    pub fn new(
        radii: ConeRadii,
        dz: f64,
        start_phi: f64,
        delta_phi: f64,
        tolerance: Tolerance,
    ) -> Result<Self> {
        let ConeRadii {
            rmin1,
            rmax1,
            rmin2,
            rmax2,
        } = radii;
        let min = 2.0 * tolerance.surface();
        for (parameter, value) in [
            ("rmin1", rmin1),
            ("rmax1", rmax1),
            ("rmin2", rmin2),
            ("rmax2", rmax2),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(GeometryError::ParameterOutOfRange {
                    parameter,
                    value,
                    min: 0.0,
                    max: f64::MAX,
                }
                .into());
            }
        }
        if rmin1 > rmax1 || rmin2 > rmax2 {
            return Err(GeometryError::InvalidParameter {
                shape: "cone",
                reason: format!(
                    "inner radius exceeds outer radius ({rmin1} > {rmax1} or {rmin2} > {rmax2})"
                ),
            }
            .into());
        }
        if (rmax1 - rmin1).max(rmax2 - rmin2) < min {
            return Err(GeometryError::InvalidParameter {
                shape: "cone",
                reason: "wall thinner than the surface tolerance at both ends".into(),
            }
            .into());
        }
        if !(dz >= min) || !dz.is_finite() {
            return Err(GeometryError::ParameterOutOfRange {
                parameter: "dz",
                value: dz,
                min,
                max: f64::MAX,
            }
            .into());
        }
        let phi = PhiSection::new(start_phi, delta_phi)?;
        let inner = (rmin1 > 0.0 || rmin2 > 0.0).then(|| RadialSurface::new(rmin1, rmin2, dz));
        let shell = AxialShell::new(
            RadialSurface::new(rmax1, rmax2, dz),
            inner,
            dz,
            phi,
            tolerance,
        );
        Ok(Self {
            rmin1,
            rmax1,
            rmin2,
            rmax2,
            dz,
            phi,
            shell,
            tolerance,
            cache: MeasureCache::default(),
        })
    }

    /// Creates a cone covering the full turn.
    ///
    /// # Errors
    ///
    /// See [`Cone::new`].
    pub fn full(radii: ConeRadii, dz: f64, tolerance: Tolerance) -> Result<Self> {
        Self::new(radii, dz, 0.0, std::f64::consts::TAU, tolerance)
    }

    #[must_use]
    pub fn radii(&self) -> ConeRadii {
        ConeRadii {
            rmin1: self.rmin1,
            rmax1: self.rmax1,
            rmin2: self.rmin2,
            rmax2: self.rmax2,
        }
    }

    #[must_use]
    pub fn dz(&self) -> f64 {
        self.dz
    }

    #[must_use]
    pub fn phi(&self) -> &PhiSection {
        &self.phi
    }
}

impl Solid for Cone {
    fn classify(&self, p: &Point3) -> EInside {
        self.shell.classify(p)
    }

    fn surface_normal(&self, p: &Point3) -> Vector3 {
        self.shell.surface_normal(p)
    }

    fn distance_to_entry(&self, p: &Point3, v: &Vector3) -> f64 {
        self.shell.distance_to_entry(p, v)
    }

    fn safety_to_entry(&self, p: &Point3) -> f64 {
        self.shell.safety_to_entry(p)
    }

    fn distance_to_exit(&self, p: &Point3, v: &Vector3, want_normal: bool) -> ExitHit {
        self.shell.distance_to_exit(p, v, want_normal)
    }

    fn safety_to_exit(&self, p: &Point3) -> f64 {
        self.shell.safety_to_exit(p)
    }

    fn extent(&self) -> Aabb {
        self.shell
            .extent(self.rmin1.min(self.rmin2), self.rmax1.max(self.rmax2))
    }

    fn volume(&self) -> f64 {
        self.cache.volume(|| {
            let outer_mean = 0.5 * (self.rmax1 + self.rmax2);
            let outer_delta = self.rmax1 - self.rmax2;
            let inner_mean = 0.5 * (self.rmin1 + self.rmin2);
            let inner_delta = self.rmin1 - self.rmin2;
            self.phi.delta()
                * self.dz
                * (outer_mean * outer_mean - inner_mean * inner_mean
                    + (outer_delta * outer_delta - inner_delta * inner_delta) / 12.0)
        })
    }

    fn surface_area(&self) -> f64 {
        self.cache.area(|| {
            let h = 2.0 * self.dz;
            let inner_mean = 0.5 * (self.rmin1 + self.rmin2);
            let outer_mean = 0.5 * (self.rmax1 + self.rmax2);
            let inner_slant = (self.rmin2 - self.rmin1).hypot(h);
            let outer_slant = (self.rmax2 - self.rmax1).hypot(h);
            let caps = 0.5
                * (self.rmax1 * self.rmax1 - self.rmin1 * self.rmin1 + self.rmax2 * self.rmax2
                    - self.rmin2 * self.rmin2);
            let mut area =
                self.phi.delta() * (inner_mean * inner_slant + outer_mean * outer_slant + caps);
            if !self.phi.is_full() {
                area += 2.0 * h * (outer_mean - inner_mean);
            }
            area
        })
    }

    fn tolerance(&self) -> Tolerance {
        self.tolerance
    }
}

impl fmt::Display for Cone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cone(rmin1={}, rmax1={}, rmin2={}, rmax2={}, dz={}, phi={}+{})",
            self.rmin1,
            self.rmax1,
            self.rmin2,
            self.rmax2,
            self.dz,
            self.phi.start(),
            self.phi.delta()
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
    use std::f64::consts::{FRAC_PI_2, PI};

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn radii(rmin1: f64, rmax1: f64, rmin2: f64, rmax2: f64) -> ConeRadii {
        ConeRadii {
            rmin1,
            rmax1,
            rmin2,
            rmax2,
        }
    }

    /// Solid cone with its apex at `z = +10` and radius 10 at `z = -10`.
    fn pointed() -> Cone {
        Cone::full(radii(0.0, 10.0, 0.0, 0.0), 10.0, Tolerance::default()).unwrap()
    }

    /// Hollow frustum: radii 5..10 at the bottom, 2..4 at the top.
    fn frustum() -> Cone {
        Cone::full(radii(5.0, 10.0, 2.0, 4.0), 10.0, Tolerance::default()).unwrap()
    }

    #[test]
    fn rejects_crossed_radii() {
        let tol = Tolerance::default();
        assert!(Cone::full(radii(6.0, 5.0, 0.0, 1.0), 1.0, tol).is_err());
        assert!(Cone::full(radii(0.0, 0.0, 0.0, 0.0), 1.0, tol).is_err());
        assert!(Cone::full(radii(0.0, 1.0, 0.0, 1.0), -1.0, tol).is_err());
        assert!(Cone::full(radii(-1.0, 1.0, 0.0, 1.0), 1.0, tol).is_err());
    }

    #[test]
    fn classify_pointed_cone() {
        let c = pointed();
        assert_eq!(c.classify(&p(0.0, 0.0, 0.0)), EInside::Inside);
        assert_eq!(c.classify(&p(5.0, 0.0, 0.0)), EInside::Surface);
        assert_eq!(c.classify(&p(6.0, 0.0, 0.0)), EInside::Outside);
        assert_eq!(c.classify(&p(0.0, 0.0, 10.0)), EInside::Surface);
        assert_eq!(c.classify(&p(0.0, 0.0, 11.0)), EInside::Outside);
        assert_eq!(c.classify(&p(0.0, 9.0, -10.0)), EInside::Surface);
    }

    #[test]
    fn classify_hollow_frustum() {
        let c = frustum();
        // At z = 0 the wall spans 3.5 <= rho <= 7.
        assert_eq!(c.classify(&p(5.0, 0.0, 0.0)), EInside::Inside);
        assert_eq!(c.classify(&p(3.0, 0.0, 0.0)), EInside::Outside);
        assert_eq!(c.classify(&p(0.0, 7.0, 0.0)), EInside::Surface);
        assert_eq!(c.classify(&p(-3.5, 0.0, 0.0)), EInside::Surface);
    }

    #[test]
    fn lateral_normal_is_tilted() {
        let c = pointed();
        let n = c.surface_normal(&p(5.0, 0.0, 0.0));
        assert_relative_eq!(n, Vector3::new(2.0, 0.0, 1.0).normalize(), epsilon = 1e-12);
    }

    #[test]
    fn entry_towards_axis() {
        let c = pointed();
        let d = c.distance_to_entry(&p(20.0, 0.0, 0.0), &(-Vector3::x()));
        assert_relative_eq!(d, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn entry_from_below_through_base() {
        let c = pointed();
        let d = c.distance_to_entry(&p(3.0, 0.0, -30.0), &Vector3::z());
        assert_relative_eq!(d, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn entry_from_above_hits_the_slope() {
        let c = pointed();
        // Descending at rho = 2 meets the wall where R(z) = 5 - z/2 = 2.
        let d = c.distance_to_entry(&p(2.0, 0.0, 30.0), &(-Vector3::z()));
        assert_relative_eq!(d, 24.0, epsilon = 1e-9);
    }

    #[test]
    fn ray_above_the_apex_misses() {
        let c = pointed();
        // Stays above the apex and crosses the mirror nappe only.
        let dir = Vector3::new(40.0, 0.0, -1.0).normalize();
        let d = c.distance_to_entry(&p(-20.0, 0.0, 15.0), &dir);
        assert!(d.is_infinite());
    }

    #[test]
    fn exit_through_inner_cone() {
        let c = frustum();
        let hit = c.distance_to_exit(&p(5.0, 0.0, 0.0), &(-Vector3::x()), true);
        assert_relative_eq!(hit.distance, 1.5, epsilon = 1e-9);
        assert!(!hit.convex);
        let n = hit.normal.unwrap();
        assert!(n.x < 0.0);
    }

    #[test]
    fn exit_through_outer_cone() {
        let c = frustum();
        let hit = c.distance_to_exit(&p(5.0, 0.0, 0.0), &Vector3::x(), true);
        assert_relative_eq!(hit.distance, 2.0, epsilon = 1e-9);
        assert!(hit.convex);
    }

    #[test]
    fn safety_inside_cone_is_perpendicular() {
        let c = pointed();
        // Wall at rho = 5 - z/2; slope 1/2 so the perpendicular factor is 1/sqrt(1.25).
        let s = c.safety_to_exit(&p(0.0, 0.0, 0.0));
        assert_relative_eq!(s, 5.0 / 1.25f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn volume_of_pointed_cone() {
        let c = pointed();
        assert_relative_eq!(c.volume(), PI * 100.0 * 20.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn area_of_pointed_cone() {
        let c = pointed();
        let slant = 10f64.hypot(20.0);
        assert_relative_eq!(c.surface_area(), PI * 10.0 * slant + PI * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn segment_volume_scales_with_delta() {
        let full = frustum();
        let tol = Tolerance::default();
        let quarter = Cone::new(radii(5.0, 10.0, 2.0, 4.0), 10.0, 0.0, FRAC_PI_2, tol).unwrap();
        assert_relative_eq!(quarter.volume() * 4.0, full.volume(), epsilon = 1e-9);
        assert_eq!(quarter.classify(&p(-5.0, 0.1, 0.0)), EInside::Outside);
    }

    #[test]
    fn estimated_volume_agrees_with_formula() {
        let c = frustum();
        let est = c.estimate_volume(200_000, 5);
        assert!((est - c.volume()).abs() / c.volume() < 0.03);
    }

    #[test]
    fn entries_land_on_the_surface() {
        let c = frustum();
        let mut rng = StdRng::seed_from_u64(9);
        let mut checked = 0;
        while checked < 300 {
            let origin = p(
                rng.random_range(-30.0..30.0),
                rng.random_range(-30.0..30.0),
                rng.random_range(-30.0..30.0),
            );
            if c.classify(&origin) != EInside::Outside {
                continue;
            }
            let dir = Vector3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            )
            .normalize();
            let d = c.distance_to_entry(&origin, &dir);
            if d.is_finite() {
                let q = origin + dir * d;
                assert_eq!(c.classify(&q), EInside::Surface, "origin {origin:?} dir {dir:?}");
            }
            assert!(c.safety_to_entry(&origin) <= d + 1e-9);
            checked += 1;
        }
    }
}
