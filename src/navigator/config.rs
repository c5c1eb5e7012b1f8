use crate::math::Tolerance;

/// Consecutive zero steps after which the track is pushed.
pub const DEFAULT_ZERO_STEP_WARN_THRESHOLD: u32 = 10;

/// Consecutive zero steps after which the track is abandoned.
pub const DEFAULT_ZERO_STEP_ABANDON_THRESHOLD: u32 = 25;

/// Push distance in units of the surface tolerance.
const PUSH_FACTOR: f64 = 100.0;

/// Parameters controlling navigator recovery from zero-length steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigatorConfig {
    /// Zero steps in a row before the navigator warns and pushes the track.
    pub zero_step_warn_threshold: u32,
    /// Zero steps in a row before the track is reported stuck.
    pub zero_step_abandon_threshold: u32,
    /// Distance added to a zero step once the warn threshold is reached.
    /// `None` means 100 times the geometry's surface tolerance.
    pub push_distance: Option<f64>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            zero_step_warn_threshold: DEFAULT_ZERO_STEP_WARN_THRESHOLD,
            zero_step_abandon_threshold: DEFAULT_ZERO_STEP_ABANDON_THRESHOLD,
            push_distance: None,
        }
    }
}

impl NavigatorConfig {
    #[must_use]
    pub fn with_zero_step_thresholds(mut self, warn: u32, abandon: u32) -> Self {
        self.zero_step_warn_threshold = warn.max(1);
        self.zero_step_abandon_threshold = abandon.max(self.zero_step_warn_threshold + 1);
        self
    }

    #[must_use]
    pub fn with_push_distance(mut self, distance: f64) -> Self {
        self.push_distance = Some(distance);
        self
    }

    /// Push distance for a geometry built with `tolerance`.
    #[must_use]
    pub fn push_distance_for(&self, tolerance: Tolerance) -> f64 {
        self.push_distance
            .unwrap_or(PUSH_FACTOR * tolerance.surface())
    }
}
