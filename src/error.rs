use thiserror::Error;

use crate::math::Point3;

/// Top-level error type for the geonav kernel.
#[derive(Debug, Error)]
pub enum GeonavError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Navigation(#[from] NavigationError),
}

/// Errors raised while constructing solids or placements.
///
/// A solid whose parameters fail validation is never created.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("parameter {parameter} = {value} is out of range [{min}, {max}]")]
    ParameterOutOfRange {
        parameter: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid {shape} parameters: {reason}")]
    InvalidParameter {
        shape: &'static str,
        reason: String,
    },

    #[error("zero-length vector")]
    ZeroVector,

    #[error("invalid volume hierarchy: {0}")]
    InvalidHierarchy(String),
}

/// Errors raised by navigation queries.
///
/// Leaving the world is not an error; see [`Navigator::locate`](crate::navigator::Navigator::locate).
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("no world volume attached to the navigator")]
    NoWorld,

    #[error("volume not found in geometry: {0}")]
    UnknownVolume(String),

    #[error("navigator has no located position; call locate first")]
    NotLocated,

    #[error("track stuck after {steps} consecutive zero steps at {point}")]
    StuckTrack { steps: u32, point: Point3 },
}

/// Convenience type alias for results using [`GeonavError`].
pub type Result<T> = std::result::Result<T, GeonavError>;
