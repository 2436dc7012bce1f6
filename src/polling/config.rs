use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default time a single poll request may take before it is abandoned (20 seconds).
pub const DEFAULT_POLL_TIMEOUT_SECS: f64 = 20.0;

/// Default number of consecutive timeouts after which a session stops.
pub const DEFAULT_MAX_CONSECUTIVE_TIMEOUTS: u32 = 3;

/// Default pause between two poll steps (1 second).
pub const DEFAULT_POLL_DELAY_MILLIS: u64 = 1000;

/// Configuration of a long-polling session.
///
/// All fields are optional when deserialized:
///
/// ```toml
/// [polling]
/// timeout_secs = 20.0
/// max_consecutive_timeouts = 3
/// auto_start = true
/// delay_millis = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LongPollingOptions {
    /// Time a single request may take before the step counts as timed out.
    /// Fractions are allowed; negative values count as zero.
    pub timeout_secs: f64,
    /// Consecutive timeouts that end the session.
    pub max_consecutive_timeouts: u32,
    /// Start polling as soon as the session is created.
    pub auto_start: bool,
    /// Pause before the next step.
    pub delay_millis: u64,
}

impl LongPollingOptions {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_millis)
    }
}

impl Default for LongPollingOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            max_consecutive_timeouts: DEFAULT_MAX_CONSECUTIVE_TIMEOUTS,
            auto_start: true,
            delay_millis: DEFAULT_POLL_DELAY_MILLIS,
        }
    }
}
