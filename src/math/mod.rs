pub mod aabb;
pub mod placement;
pub mod quadratic;

pub use aabb::Aabb;
pub use placement::Placement;
pub use quadratic::solve_quadratic;

use crate::error::{GeometryError, Result};

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// 3x3 rotation matrix.
pub type Rotation3 = nalgebra::Rotation3<f64>;

/// Default surface tolerance, in length units.
pub const DEFAULT_SURFACE_TOLERANCE: f64 = 1e-9;

/// Geometric tolerance shared by every solid of one geometry.
///
/// A point whose distance to a boundary is at most `surface / 2` is on that
/// boundary. The value is passed explicitly to every solid factory so that
/// all classification and distance queries of a geometry agree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    surface: f64,
}

impl Tolerance {
    /// Creates a tolerance with the given surface thickness.
    ///
    /// # Errors
    ///
    /// Returns an error if `surface` is not a positive finite number.
    pub fn new(surface: f64) -> Result<Self> {
        if !surface.is_finite() || surface <= 0.0 {
            return Err(GeometryError::ParameterOutOfRange {
                parameter: "surface tolerance",
                value: surface,
                min: f64::MIN_POSITIVE,
                max: f64::MAX,
            }
            .into());
        }
        Ok(Self { surface })
    }

    /// Full surface thickness.
    #[must_use]
    pub fn surface(self) -> f64 {
        self.surface
    }

    /// Half of the surface thickness: the classification band on either
    /// side of a boundary.
    #[must_use]
    pub fn half(self) -> f64 {
        0.5 * self.surface
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            surface: DEFAULT_SURFACE_TOLERANCE,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_tolerance_is_one_nanometre() {
        let tol = Tolerance::default();
        assert!((tol.surface() - 1e-9).abs() < f64::EPSILON);
        assert!((tol.half() - 0.5e-9).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_non_positive_tolerance() {
        assert!(Tolerance::new(0.0).is_err());
        assert!(Tolerance::new(-1e-9).is_err());
        assert!(Tolerance::new(f64::NAN).is_err());
        assert!(Tolerance::new(1e-6).is_ok());
    }
}
