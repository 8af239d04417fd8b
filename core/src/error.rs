//! Error types for session persistence and record handling.
//!
//! None of these errors ever reach the host agent: the storage adapter and
//! the session manager log them and degrade (in-memory mode, or a fresh
//! session). They exist so the seams between layers stay explicit.

use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Failure modes of session storage and session records.
#[derive(Debug, Error)]
pub enum SessionError {
    // ═══════════════════════════════════════════════════════════
    // Storage Errors
    // ═══════════════════════════════════════════════════════════

    /// The persistent storage mechanism is disabled or inaccessible.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A write was rejected (for example quota exceeded).
    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    /// A read failed.
    #[error("Storage read failed: {0}")]
    StorageRead(String),

    // ═══════════════════════════════════════════════════════════
    // Record Errors
    // ═══════════════════════════════════════════════════════════

    /// The stored value is not valid JSON for a session record.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The record parsed but violates a record invariant.
    #[error("Invalid session record: {0}")]
    InvalidRecord(String),
}

impl SessionError {
    /// Returns `true` if this error came from the storage mechanism itself
    /// rather than from the data stored in it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use telemetry_session_core::SessionError;
    /// assert!(SessionError::StorageWrite("quota".into()).is_storage_error());
    /// assert!(!SessionError::InvalidRecord("empty id".into()).is_storage_error());
    /// ```
    #[must_use]
    pub const fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::StorageWrite(_) | Self::StorageRead(_)
        )
    }
}
