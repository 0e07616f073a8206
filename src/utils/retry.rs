//! Reconnect backoff.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

/// Longest pause between two reconnect attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Backoff for broker reconnects.
///
/// 100ms initial, 5s cap, jittered.
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(MAX_RECONNECT_DELAY)
        .with_max_times(30)
        .with_jitter()
}

/// Endless sequence of reconnect delays.
///
/// Follows [`connection_backoff`] and stays at the cap once it is exhausted.
/// Call [`ReconnectDelays::reset`] after a successful connection.
pub struct ReconnectDelays {
    delays: ExponentialBackoff,
}

impl ReconnectDelays {
    pub fn new() -> Self {
        Self {
            delays: connection_backoff().build(),
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        self.delays.next().unwrap_or(MAX_RECONNECT_DELAY)
    }

    pub fn reset(&mut self) {
        self.delays = connection_backoff().build();
    }
}

impl Default for ReconnectDelays {
    fn default() -> Self {
        Self::new()
    }
}
