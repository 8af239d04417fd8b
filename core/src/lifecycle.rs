//! Session lifecycle rules.
//!
//! Two thresholds govern a session:
//!
//! ```text
//! started ──────────────── max_session_duration ──────────────▶
//!           last_activity ── inactivity_timeout ──▶
//! ```
//!
//! A record is active while both ages are strictly below their threshold.
//! Exceeding exactly one threshold extends the session under the same id;
//! exceeding both (or having no record) replaces it with a new id.

use crate::config::SessionConfig;
use crate::environment::IdGenerator;
use crate::record::{SessionId, SessionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a session is no longer active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpiryReason {
    /// Age since `started` reached the maximum session duration.
    MaxSessionTimeout,
    /// Age since `last_activity` reached the inactivity timeout.
    InactivityTimeout,
    /// Both thresholds were reached.
    AllTimeout,
}

impl ExpiryReason {
    /// Stable string form (`max-session-timeout`, `inactivity-timeout`, `all-timeout`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MaxSessionTimeout => "max-session-timeout",
            Self::InactivityTimeout => "inactivity-timeout",
            Self::AllTimeout => "all-timeout",
        }
    }
}

impl fmt::Display for ExpiryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a record against the clock.
///
/// `active == false` with no reason means there was no record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityState {
    /// Both thresholds still hold.
    pub active: bool,
    /// Set when the record exists but has expired.
    pub reason: Option<ExpiryReason>,
}

impl ActivityState {
    /// No session existed.
    pub const ABSENT: Self = Self {
        active: false,
        reason: None,
    };

    /// Returns `true` when there was no previous session.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        !self.active && self.reason.is_none()
    }
}

/// Classify `record` at `now`.
///
/// The duration check runs first and the inactivity check second, so a
/// single failing check determines the reason; when both fail the reason is
/// [`ExpiryReason::AllTimeout`].
#[must_use]
pub fn classify(
    record: Option<&SessionRecord>,
    now: DateTime<Utc>,
    config: &SessionConfig,
) -> ActivityState {
    let Some(record) = record else {
        return ActivityState::ABSENT;
    };

    let mut reason = None;

    let max_duration_valid = record.age(now) < config.max_session_duration;
    if !max_duration_valid {
        reason = Some(ExpiryReason::MaxSessionTimeout);
    }

    let inactivity_valid = record.idle(now) < config.inactivity_timeout;
    if !inactivity_valid {
        reason = Some(ExpiryReason::InactivityTimeout);
    }

    if !max_duration_valid && !inactivity_valid {
        reason = Some(ExpiryReason::AllTimeout);
    }

    ActivityState {
        active: max_duration_valid && inactivity_valid,
        reason,
    }
}

/// What to do with the current record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Still active: refresh activity under the same id.
    Keep(SessionRecord),
    /// One threshold reached: start a fresh record reusing this id.
    Extend(SessionId),
    /// Both thresholds reached, or no record: mint a new id.
    Replace,
}

impl Decision {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Keep(_) => "keep",
            Self::Extend(_) => "extend",
            Self::Replace => "replace",
        }
    }

    /// Build the record that should become current at `now`.
    ///
    /// - `Keep` moves `last_activity` to `now` and preserves `started`
    /// - `Extend` restarts both timestamps under the existing id
    /// - `Replace` restarts both timestamps under a newly generated id
    #[must_use]
    pub fn into_record<G>(self, now: DateTime<Utc>, ids: &G) -> SessionRecord
    where
        G: IdGenerator + ?Sized,
    {
        match self {
            Self::Keep(record) => record.touched(now),
            Self::Extend(session_id) => SessionRecord::new(session_id, now),
            Self::Replace => SessionRecord::new(ids.generate(), now),
        }
    }
}

/// Decide whether to keep, extend or replace `record` at `now`.
#[must_use]
pub fn decide(
    record: Option<&SessionRecord>,
    now: DateTime<Utc>,
    config: &SessionConfig,
) -> Decision {
    let state = classify(record, now, config);

    match (record, state.reason) {
        (Some(record), _) if state.active => Decision::Keep(record.clone()),
        (
            Some(record),
            Some(ExpiryReason::MaxSessionTimeout | ExpiryReason::InactivityTimeout),
        ) => Decision::Extend(record.session_id.clone()),
        _ => Decision::Replace,
    }
}
