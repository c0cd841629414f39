//! Scheduler configuration.
//!
//! Every knob that would otherwise be a build-time flag lives here and is
//! handed to [`Scheduler::with_config`](crate::Scheduler::with_config).

use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FRAME_YIELD_MS: f64 = 1000.0 / 60.0;
pub const DEFAULT_CONTINUOUS_YIELD_MS: f64 = 50.0;
pub const DEFAULT_MAX_YIELD_MS: f64 = 300.0;
pub const DEFAULT_PROFILING_EVENT_LIMIT: usize = 524_288;
pub const MAX_FRAME_RATE: f64 = 125.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Slice length before the scheduler starts considering a yield.
    pub frame_yield_ms: f64,
    /// Below this much blocking time only discrete input forces a yield.
    pub continuous_yield_ms: f64,
    /// Past this much blocking time the scheduler always yields.
    pub max_yield_ms: f64,
    /// Consult the host's input-pending signal.
    pub enable_is_input_pending: bool,
    /// Treat continuous input (pointer moves, scrolling) as pending input too.
    pub enable_is_input_pending_continuous: bool,
    pub enable_profiling: bool,
    pub profiling_event_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_yield_ms: DEFAULT_FRAME_YIELD_MS,
            continuous_yield_ms: DEFAULT_CONTINUOUS_YIELD_MS,
            max_yield_ms: DEFAULT_MAX_YIELD_MS,
            enable_is_input_pending: false,
            enable_is_input_pending_continuous: false,
            enable_profiling: false,
            profiling_event_limit: DEFAULT_PROFILING_EVENT_LIMIT,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame_yield_ms(mut self, ms: f64) -> Self {
        self.frame_yield_ms = ms;
        self
    }

    pub fn with_continuous_yield_ms(mut self, ms: f64) -> Self {
        self.continuous_yield_ms = ms;
        self
    }

    pub fn with_max_yield_ms(mut self, ms: f64) -> Self {
        self.max_yield_ms = ms;
        self
    }

    pub fn with_input_pending(mut self, enabled: bool, include_continuous: bool) -> Self {
        self.enable_is_input_pending = enabled;
        self.enable_is_input_pending_continuous = include_continuous;
        self
    }

    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.enable_profiling = enabled;
        self
    }

    pub fn with_profiling_event_limit(mut self, limit: usize) -> Self {
        self.profiling_event_limit = limit;
        self
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if !(self.frame_yield_ms.is_finite() && self.frame_yield_ms > 0.0) {
            return Err(invalid("frame_yield_ms", "must be a positive number"));
        }
        if !(self.continuous_yield_ms >= self.frame_yield_ms) {
            return Err(invalid(
                "continuous_yield_ms",
                "must not be shorter than frame_yield_ms",
            ));
        }
        if !(self.max_yield_ms >= self.continuous_yield_ms) {
            return Err(invalid(
                "max_yield_ms",
                "must not be shorter than continuous_yield_ms",
            ));
        }
        if self.profiling_event_limit == 0 {
            return Err(invalid("profiling_event_limit", "must be non-zero"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> SchedulerError {
    SchedulerError::InvalidConfig {
        field,
        reason: reason.to_string(),
    }
}

/// Maps a forced frame rate to a frame interval.
///
/// `Ok(None)` means "reset to the configured default" (fps of zero).
pub fn frame_interval_for_fps(fps: f64) -> Result<Option<f64>, SchedulerError> {
    if !(0.0..=MAX_FRAME_RATE).contains(&fps) {
        return Err(SchedulerError::InvalidFrameRate(fps));
    }
    if fps > 0.0 {
        Ok(Some((1000.0 / fps).floor()))
    } else {
        Ok(None)
    }
}
