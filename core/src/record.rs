//! Session record types.
//!
//! The record is stored under a single key as JSON:
//!
//! ```text
//! {"sessionId":"k3v9Qm2xLp","lastActivity":1735690500000,"started":1735689600000}
//! ```
//!
//! Timestamps are epoch milliseconds.

use crate::error::{Result, SessionError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Opaque session identifier.
///
/// Never empty once constructed through [`SessionId::new`]. Deserialized
/// values are checked by [`SessionRecord::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing identifier (for example one received from a
    /// previous page or another agent).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidRecord`] if `id` is empty or blank.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SessionError::InvalidRecord(
                "session id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Used by generators that guarantee a non-empty value.
    pub(crate) const fn from_generated(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Session Record
// ═══════════════════════════════════════════════════════════════════════

/// The persisted session record.
///
/// Invariants: `session_id` is non-empty and `last_activity >= started`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Stable across extensions, replaced on reset.
    pub session_id: SessionId,

    /// Most recent activity that touched this record.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_activity: DateTime<Utc>,

    /// When this record was (re)created.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a fresh record with `started == last_activity == now`.
    #[must_use]
    pub const fn new(session_id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            last_activity: now,
            started: now,
        }
    }

    /// Same id and start, activity moved to `now`.
    ///
    /// `last_activity` never moves before `started`, even if the clock went
    /// backwards between calls.
    #[must_use]
    pub fn touched(&self, now: DateTime<Utc>) -> Self {
        Self {
            session_id: self.session_id.clone(),
            last_activity: now.max(self.started),
            started: self.started,
        }
    }

    /// Time elapsed since the record was started.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.started)
    }

    /// Time elapsed since the last recorded activity.
    #[must_use]
    pub fn idle(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_activity)
    }

    /// Check the record invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidRecord`] if the id is empty or the
    /// timestamps are inverted.
    pub fn validate(&self) -> Result<()> {
        if self.session_id.as_str().trim().is_empty() {
            return Err(SessionError::InvalidRecord(
                "session id must not be empty".to_string(),
            ));
        }
        if self.last_activity < self.started {
            return Err(SessionError::InvalidRecord(format!(
                "last activity {} precedes start {}",
                self.last_activity, self.started
            )));
        }
        Ok(())
    }

    /// Serialize to the stored JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate the stored JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Serialization`] for malformed JSON and
    /// [`SessionError::InvalidRecord`] for a record that breaks an invariant.
    pub fn from_json(raw: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(raw)?;
        record.validate()?;
        Ok(record)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_session_id_rejects_empty() {
        assert!(SessionId::new("").is_err());
        assert!(SessionId::new("   ").is_err());
        assert_eq!(SessionId::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_new_record_has_equal_timestamps() {
        let record = SessionRecord::new(SessionId::new("abc").unwrap(), t0());
        assert_eq!(record.started, record.last_activity);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_wire_format_uses_camel_case_and_millis() {
        let record = SessionRecord {
            session_id: SessionId::new("abc").unwrap(),
            last_activity: t0() + Duration::seconds(90),
            started: t0(),
        };

        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(json["sessionId"], "abc");
        assert_eq!(json["started"], 1_735_689_600_000_i64);
        assert_eq!(json["lastActivity"], 1_735_689_690_000_i64);
    }

    #[test]
    fn test_parses_record_written_by_another_agent() {
        let raw = r#"{"sessionId":"xyz","lastActivity":1735689690000,"started":1735689600000}"#;
        let record = SessionRecord::from_json(raw).unwrap();
        assert_eq!(record.session_id.as_str(), "xyz");
        assert_eq!(record.started, t0());
        assert_eq!(record.idle(t0() + Duration::seconds(100)), Duration::seconds(10));
    }

    #[test]
    fn test_rejects_corrupt_and_invalid_records() {
        assert!(matches!(
            SessionRecord::from_json("{not json"),
            Err(SessionError::Serialization(_))
        ));
        assert!(matches!(
            SessionRecord::from_json(r#"{"sessionId":"","lastActivity":1,"started":1}"#),
            Err(SessionError::InvalidRecord(_))
        ));
        assert!(matches!(
            SessionRecord::from_json(r#"{"sessionId":"a","lastActivity":1,"started":2}"#),
            Err(SessionError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_touched_keeps_id_and_start() {
        let record = SessionRecord::new(SessionId::new("abc").unwrap(), t0());
        let later = record.touched(t0() + Duration::minutes(3));
        assert_eq!(later.session_id, record.session_id);
        assert_eq!(later.started, t0());
        assert_eq!(later.last_activity, t0() + Duration::minutes(3));

        // Clock went backwards: activity clamps to start.
        let skewed = record.touched(t0() - Duration::minutes(1));
        assert_eq!(skewed.last_activity, t0());
    }
}
