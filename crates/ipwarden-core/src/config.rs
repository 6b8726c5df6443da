//! Configuration types for the poll engine.

use serde::{Deserialize, Serialize};

/// Poll engine configuration
///
/// The defaults match the deployed cadence: a five-minute base interval
/// with up to one minute of jitter either way, so every sleep lands in
/// the closed range `[interval - jitter, interval + jitter]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Base interval between poll cycles, in seconds
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Maximum jitter applied to each sleep, in seconds
    ///
    /// Jitter desynchronizes fleets of instances polling the same
    /// IP-echo service. Set to 0 to disable.
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log) rather
    /// than blocking the poll cycle.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl PollConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("poll interval must be > 0"));
        }
        if self.jitter_secs > self.interval_secs {
            return Err(crate::Error::config(
                "jitter must not exceed the poll interval",
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            jitter_secs: default_jitter_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_jitter_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    64
}
