//! Long-polling sessions.
//!
//! A [`LongPolling`] session repeatedly calls one endpoint. Each poll step
//! races the request against a timeout; consecutive timeouts are budgeted
//! and the caller's step handler decides whether polling continues.

mod config;
mod long_polling;

pub use config::{
    DEFAULT_MAX_CONSECUTIVE_TIMEOUTS, DEFAULT_POLL_DELAY_MILLIS, DEFAULT_POLL_TIMEOUT_SECS, LongPollingOptions,
};
pub use long_polling::{LongPolling, PollTarget};
