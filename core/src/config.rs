//! Session configuration.
//!
//! All values are constants supplied by the host agent. Nothing here is
//! negotiated at runtime.

use chrono::Duration;

/// Default storage key for the serialized session record.
pub const DEFAULT_STORAGE_KEY: &str = "__TELEMETRY_SESSION__";

/// Session lifecycle and persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum age of a session since it was started.
    ///
    /// Default: 4 hours
    pub max_session_duration: Duration,

    /// Maximum time without activity.
    ///
    /// Default: 15 minutes
    pub inactivity_timeout: Duration,

    /// Minimum interval between throttled storage writes.
    ///
    /// Default: 1 second
    pub storage_update_interval: std::time::Duration,

    /// Key under which the session record is stored.
    ///
    /// Default: `"__TELEMETRY_SESSION__"`
    pub storage_key: String,
}

impl SessionConfig {
    /// Create a configuration with the default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_session_duration: Duration::hours(4),
            inactivity_timeout: Duration::minutes(15),
            storage_update_interval: std::time::Duration::from_secs(1),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }

    /// Set the maximum session duration.
    #[must_use]
    pub const fn with_max_session_duration(mut self, duration: Duration) -> Self {
        self.max_session_duration = duration;
        self
    }

    /// Set the inactivity timeout.
    #[must_use]
    pub const fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Set the write throttle interval.
    #[must_use]
    pub const fn with_storage_update_interval(mut self, interval: std::time::Duration) -> Self {
        self.storage_update_interval = interval;
        self
    }

    /// Set the storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}
