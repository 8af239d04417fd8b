//! Environment module - dependency injection traits
//!
//! Time and id generation are injected so the lifecycle rules stay
//! deterministic under test.

use crate::record::SessionId;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```ignore
/// // Production - uses system clock
/// struct SystemClock;
/// impl Clock for SystemClock {
///     fn now(&self) -> DateTime<Utc> {
///         Utc::now()
///     }
/// }
///
/// // Test - fixed time for deterministic tests
/// struct FixedClock { time: DateTime<Utc> }
/// impl Clock for FixedClock {
///     fn now(&self) -> DateTime<Utc> {
///         self.time
///     }
/// }
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Source of fresh session identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a new, non-empty identifier.
    fn generate(&self) -> SessionId;
}

/// Short random alphanumeric ids.
///
/// Ten characters by default, which is plenty for correlating the events of
/// one visit without bloating every payload.
#[derive(Debug, Clone, Copy)]
pub struct ShortIdGenerator {
    length: usize,
}

impl ShortIdGenerator {
    /// Default id length.
    pub const DEFAULT_LENGTH: usize = 10;

    /// Create a generator with the default length.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            length: Self::DEFAULT_LENGTH,
        }
    }

    /// Create a generator producing ids of `length` characters (minimum 1).
    #[must_use]
    pub fn with_length(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }
}

impl Default for ShortIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for ShortIdGenerator {
    fn generate(&self) -> SessionId {
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        SessionId::from_generated(id)
    }
}
