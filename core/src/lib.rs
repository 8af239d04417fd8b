//! # Telemetry Session Core
//!
//! Core types and rules for the user session attached to every telemetry
//! event emitted by a browser agent.
//!
//! A session is a short opaque identifier plus two timestamps. This crate
//! decides, given a stored record and the current time, whether the session
//! is still valid and, if not, whether it should be extended (same id) or
//! replaced (new id). It performs no I/O.
//!
//! ## Core Concepts
//!
//! - **Record**: [`SessionRecord`], the single persisted entity
//! - **Lifecycle**: [`classify`] and [`decide`], pure functions over a record and a clock reading
//! - **Reducer**: Pure function `(State, Action, Environment) → Effects`
//! - **Environment**: Injected [`Clock`] and [`IdGenerator`]
//!
//! ## Example
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use telemetry_session_core::{decide, Decision, SessionConfig, SessionId, SessionRecord};
//!
//! let started = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
//! let record = SessionRecord::new(SessionId::new("abc123").unwrap(), started);
//! let config = SessionConfig::default();
//!
//! // 16 minutes without activity: extended under the same id.
//! let decision = decide(Some(&record), started + Duration::minutes(16), &config);
//! assert_eq!(decision, Decision::Extend(record.session_id.clone()));
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{SmallVec, smallvec};

pub mod config;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod record;
pub mod reducer;

pub use config::SessionConfig;
pub use environment::{Clock, IdGenerator, ShortIdGenerator, SystemClock};
pub use error::{Result, SessionError};
pub use lifecycle::{ActivityState, Decision, ExpiryReason, classify, decide};
pub use record::{SessionId, SessionRecord};
pub use reducer::Reducer;
