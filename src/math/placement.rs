use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion};

use crate::error::{GeometryError, Result};

use super::{Point3, Rotation3, Vector3};

/// A rigid placement: rotation followed by translation.
///
/// Maps coordinates of a daughter frame into its mother frame:
/// `p_mother = R * p_daughter + t`. Composition `mother.compose(&daughter)`
/// yields the placement of the daughter in the mother's own parent frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    iso: Isometry3<f64>,
}

impl Placement {
    /// Creates a placement from a rotation matrix and a translation vector.
    #[must_use]
    pub fn new(rotation: Rotation3, translation: Vector3) -> Self {
        Self {
            iso: Isometry3::from_parts(
                Translation3::from(translation),
                UnitQuaternion::from_rotation_matrix(&rotation),
            ),
        }
    }

    /// The identity placement.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            iso: Isometry3::identity(),
        }
    }

    /// A pure translation.
    #[must_use]
    pub fn from_translation(translation: Vector3) -> Self {
        Self {
            iso: Isometry3::from_parts(Translation3::from(translation), UnitQuaternion::identity()),
        }
    }

    /// A rotation by `angle` radians around `axis`, followed by `translation`.
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is zero-length.
    pub fn from_axis_angle(axis: Vector3, angle: f64, translation: Vector3) -> Result<Self> {
        let axis = Unit::try_new(axis, f64::EPSILON).ok_or(GeometryError::ZeroVector)?;
        Ok(Self {
            iso: Isometry3::from_parts(
                Translation3::from(translation),
                UnitQuaternion::from_axis_angle(&axis, angle),
            ),
        })
    }

    /// Rotation part as a matrix.
    #[must_use]
    pub fn rotation(&self) -> Rotation3 {
        self.iso.rotation.to_rotation_matrix()
    }

    /// Translation part.
    #[must_use]
    pub fn translation(&self) -> Vector3 {
        self.iso.translation.vector
    }

    /// Returns `true` if the placement is the identity within `eps`.
    #[must_use]
    pub fn is_identity(&self, eps: f64) -> bool {
        self.iso.translation.vector.norm() <= eps && self.iso.rotation.angle() <= eps
    }

    /// Applies `self` after `inner`: the result maps `inner`'s source frame
    /// directly into `self`'s target frame.
    #[must_use]
    pub fn compose(&self, inner: &Placement) -> Placement {
        Placement {
            iso: self.iso * inner.iso,
        }
    }

    /// The inverse placement.
    #[must_use]
    pub fn inverse(&self) -> Placement {
        Placement {
            iso: self.iso.inverse(),
        }
    }

    /// Maps a point from the source frame into the target frame.
    #[must_use]
    pub fn transform_point(&self, p: &Point3) -> Point3 {
        self.iso.transform_point(p)
    }

    /// Maps a direction from the source frame into the target frame.
    #[must_use]
    pub fn transform_vector(&self, v: &Vector3) -> Vector3 {
        self.iso.transform_vector(v)
    }

    /// Maps a point from the target frame back into the source frame.
    #[must_use]
    pub fn inverse_transform_point(&self, p: &Point3) -> Point3 {
        self.iso.inverse_transform_point(p)
    }

    /// Maps a direction from the target frame back into the source frame.
    #[must_use]
    pub fn inverse_transform_vector(&self, v: &Vector3) -> Vector3 {
        self.iso.inverse_transform_vector(v)
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    #[test]
    fn translation_moves_points_not_vectors() {
        let pl = Placement::from_translation(Vector3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(pl.transform_point(&p(0.0, 0.0, 0.0)), p(1.0, 2.0, 3.0));
        assert_relative_eq!(pl.transform_vector(&Vector3::x()), Vector3::x());
    }

    #[test]
    fn rotation_about_z() {
        let pl = Placement::from_axis_angle(Vector3::z(), FRAC_PI_2, Vector3::zeros()).unwrap();
        let q = pl.transform_point(&p(1.0, 0.0, 0.0));
        assert_relative_eq!(q, p(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn inverse_round_trips() {
        let pl = Placement::from_axis_angle(Vector3::new(1.0, 1.0, 0.0), 0.7, Vector3::new(5.0, -2.0, 1.0))
            .unwrap();
        let q = p(3.0, 4.0, -7.0);
        let back = pl.inverse_transform_point(&pl.transform_point(&q));
        assert_relative_eq!(back, q, epsilon = 1e-12);
        let back2 = pl.inverse().transform_point(&pl.transform_point(&q));
        assert_relative_eq!(back2, q, epsilon = 1e-12);
    }

    #[test]
    fn compose_applies_inner_first() {
        let outer = Placement::from_translation(Vector3::new(0.0, 0.0, 10.0));
        let inner = Placement::from_axis_angle(Vector3::z(), FRAC_PI_2, Vector3::new(1.0, 0.0, 0.0)).unwrap();
        let combined = outer.compose(&inner);
        let q = p(1.0, 0.0, 0.0);
        let expected = outer.transform_point(&inner.transform_point(&q));
        assert_relative_eq!(combined.transform_point(&q), expected, epsilon = 1e-12);
    }

    #[test]
    fn zero_axis_is_rejected() {
        assert!(Placement::from_axis_angle(Vector3::zeros(), 1.0, Vector3::zeros()).is_err());
    }

    #[test]
    fn rotation_matrix_round_trip() {
        let rot = Rotation3::from_axis_angle(&Vector3::y_axis(), 0.3);
        let pl = Placement::new(rot, Vector3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(pl.rotation(), rot, epsilon = 1e-12);
        assert_relative_eq!(pl.translation(), Vector3::new(1.0, 2.0, 3.0));
        assert!(Placement::identity().is_identity(1e-12));
        assert!(!pl.is_identity(1e-12));
    }
}
