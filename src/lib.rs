pub mod diagnostic;
pub mod error;
pub mod math;
pub mod navigator;
pub mod solid;
pub mod volume;
pub mod voxel;

pub use diagnostic::{Diagnostic, DiagnosticHandler};
pub use error::{GeonavError, Result};
pub use math::{Placement, Point3, Tolerance, Vector3};
pub use navigator::{Navigator, NavigatorConfig, StepLimit, StepResult};
pub use solid::{EInside, Shape, Solid};
pub use volume::{Geometry, GeometryBuilder, VolumeId};
