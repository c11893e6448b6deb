use std::{fmt, time::Duration};

use super::error::PollIntervalValidationError;

/// Validated interval between the end of one sampling pass and the start of the next.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Eq, Ord)]
pub struct PollInterval(Duration);

impl PollInterval {
    pub const MIN: Self = Self(Duration::from_millis(1));

    pub const MAX: Self = Self(Duration::from_secs(60 * 60));

    pub fn millis(millis: u64) -> Result<Self, PollIntervalValidationError> {
        Self::try_from(Duration::from_millis(millis))
    }

    /// Returns the poll interval as a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self(Duration::from_millis(500))
    }
}

impl TryFrom<Duration> for PollInterval {
    type Error = PollIntervalValidationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        if value < Self::MIN.0 {
            return Err(PollIntervalValidationError::TooShort);
        }

        if value > Self::MAX.0 {
            return Err(PollIntervalValidationError::TooLong);
        }

        Ok(Self(value))
    }
}

impl fmt::Display for PollInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// Configuration for a [`Listener`](super::Listener).
#[derive(Clone, Debug)]
pub struct ListenerConfig {
    interval: PollInterval,
    shutdown_timeout: Duration,
    update_channel_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            interval: PollInterval::default(),
            shutdown_timeout: Duration::from_secs(6),
            update_channel_capacity: 100,
        }
    }
}

impl ListenerConfig {
    /// Returns the interval between sampling passes.
    pub fn interval(&self) -> PollInterval {
        self.interval
    }

    /// Returns the timeout duration for graceful shutdown operations.
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the capacity of the status update channel.
    pub fn update_channel_capacity(&self) -> usize {
        self.update_channel_capacity
    }

    /// Sets the interval between sampling passes.
    ///
    /// Callbacks run on the sampling task, so slow callbacks stretch the effective interval.
    ///
    /// Default: `500` milliseconds
    pub fn with_interval(mut self, interval: PollInterval) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the timeout duration for graceful shutdown operations.
    ///
    /// Default: `6` seconds
    pub fn with_shutdown_timeout(mut self, secs: u64) -> Self {
        self.shutdown_timeout = Duration::from_secs(secs);
        self
    }

    /// Sets the capacity of the status update channel. Slow receivers lag past this many updates.
    ///
    /// Default: `100`
    pub fn with_update_channel_capacity(mut self, capacity: usize) -> Self {
        self.update_channel_capacity = capacity.max(1);
        self
    }
}

impl From<PollInterval> for ListenerConfig {
    fn from(value: PollInterval) -> Self {
        Self::default().with_interval(value)
    }
}

#[derive(Clone, Debug)]
pub(super) struct ListenerProcessConfig {
    interval: Duration,
}

impl ListenerProcessConfig {
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl From<&ListenerConfig> for ListenerProcessConfig {
    fn from(value: &ListenerConfig) -> Self {
        Self {
            interval: value.interval.as_duration(),
        }
    }
}
