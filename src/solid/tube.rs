use std::fmt;

use crate::error::{GeometryError, Result};
use crate::math::{Aabb, Point3, Tolerance, Vector3};

use super::axial::{AxialShell, RadialSurface};
use super::phi::PhiSection;
use super::{EInside, ExitHit, MeasureCache, Solid};

/// A cylindrical tube along z: `rmin <= rho <= rmax`, `|z| <= dz`, with an
/// optional phi segment.
#[derive(Debug, Clone)]
pub struct Tube {
    rmin: f64,
    rmax: f64,
    dz: f64,
    phi: PhiSection,
    shell: AxialShell,
    tolerance: Tolerance,
    cache: MeasureCache,
}

impl Tube {
    /// Creates a tube segment spanning `delta_phi` radians from `start_phi`.
    ///
    /// # Errors
    ///
    /// Returns an error if `rmin` is negative, the wall is thinner than
    /// twice the surface tolerance, `dz` is below twice the tolerance or the
    /// phi segment is invalid.
    pub fn new(
        rmin: f64,
        rmax: f64,
        dz: f64,
        start_phi: f64,
        delta_phi: f64,
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
        let inner = (rmin > 0.0).then(|| RadialSurface::new(rmin, rmin, dz));
        let shell = AxialShell::new(
            RadialSurface::new(rmax, rmax, dz),
            inner,
            dz,
            phi,
            tolerance,
        );
        Ok(Self {
            rmin,
            rmax,
            dz,
            phi,
            shell,
            tolerance,
            cache: MeasureCache::default(),
        })
    }

    /// Creates a tube covering the full turn.
    ///
    /// # Errors
    ///
    /// See [`Tube::new`].
    pub fn full(rmin: f64, rmax: f64, dz: f64, tolerance: Tolerance) -> Result<Self> {
        Self::new(rmin, rmax, dz, 0.0, std::f64::consts::TAU, tolerance)
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
    pub fn dz(&self) -> f64 {
        self.dz
    }

    #[must_use]
    pub fn phi(&self) -> &PhiSection {
        &self.phi
    }
}

impl Solid for Tube {
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
        self.shell.extent(self.rmin, self.rmax)
    }

    fn volume(&self) -> f64 {
        self.cache.volume(|| {
            self.phi.delta() * self.dz * (self.rmax * self.rmax - self.rmin * self.rmin)
        })
    }

    fn surface_area(&self) -> f64 {
        self.cache.area(|| {
            let wall = self.rmax - self.rmin;
            let mut area = self.phi.delta() * (self.rmax + self.rmin) * (2.0 * self.dz + wall);
            if !self.phi.is_full() {
                area += 4.0 * self.dz * wall;
            }
            area
        })
    }

    fn tolerance(&self) -> Tolerance {
        self.tolerance
    }
}

impl fmt::Display for Tube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tube(rmin={}, rmax={}, dz={}, phi={}+{})",
            self.rmin,
            self.rmax,
            self.dz,
            self.phi.start(),
            self.phi.delta()
        )
    }
}
