//! Recoverable anomalies reported while navigating.
//!
//! Diagnostics are handed to a caller-supplied [`DiagnosticHandler`]. When
//! none is installed they are logged through `tracing`.

use std::fmt;
use std::sync::Arc;

use tracing::{error, warn};

use crate::math::Point3;

/// An anomaly the kernel recovered from, or gave up on.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Consecutive zero-length steps reached the warning threshold; the
    /// navigator is pushing the track forward.
    ZeroSteps { count: u32, point: Point3 },
    /// Consecutive zero-length steps reached the abandon threshold.
    StuckTrack { count: u32, point: Point3 },
    /// A boolean entry walk hit its iteration cap and returned the distance
    /// reached so far.
    BooleanWalkExhausted {
        operation: &'static str,
        iterations: usize,
        distance: f64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ZeroSteps { count, point } => write!(
                f,
                "{count} consecutive zero steps at ({}, {}, {}), pushing track",
                point.x, point.y, point.z
            ),
            Diagnostic::StuckTrack { count, point } => write!(
                f,
                "track stuck after {count} zero steps at ({}, {}, {})",
                point.x, point.y, point.z
            ),
            Diagnostic::BooleanWalkExhausted {
                operation,
                iterations,
                distance,
            } => write!(
                f,
                "{operation} entry walk gave up after {iterations} iterations at distance {distance}"
            ),
        }
    }
}

/// Callback receiving diagnostics.
pub type DiagnosticHandler = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

/// Logs a diagnostic at the level matching its severity.
pub fn log_diagnostic(diagnostic: &Diagnostic) {
    match diagnostic {
        Diagnostic::StuckTrack { count, point } => {
            error!(count, ?point, "{diagnostic}");
        }
        Diagnostic::ZeroSteps { count, point } => {
            warn!(count, ?point, "{diagnostic}");
        }
        Diagnostic::BooleanWalkExhausted {
            iterations,
            distance,
            ..
        } => {
            warn!(iterations, distance, "{diagnostic}");
        }
    }
}

/// Sends `diagnostic` to `handler`, or logs it when there is none.
pub(crate) fn report(handler: Option<&DiagnosticHandler>, diagnostic: &Diagnostic) {
    match handler {
        Some(h) => h(diagnostic),
        None => log_diagnostic(diagnostic),
    }
}
