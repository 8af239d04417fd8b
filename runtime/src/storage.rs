//! Best-effort key/value persistence.
//!
//! [`StorageBackend`] is the raw mechanism (browser local storage, a file, a
//! shared map). [`WebStorage`] wraps it with a one-time availability probe
//! and swallows every failure, so callers never branch on availability or
//! handle storage errors themselves.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use telemetry_session_core::{Result, SessionError};

/// Sentinel key written and removed by the availability probe.
pub const PROBE_KEY: &str = "__telemetry_storage_test__";

/// Raw key/value storage mechanism.
///
/// Implementations report failures; [`WebStorage`] decides what to do with
/// them.
pub trait StorageBackend: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the mechanism rejects the read.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the mechanism rejects the write (for example
    /// quota exceeded).
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the mechanism rejects the delete.
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Storage adapter with graceful degradation.
///
/// The probe runs once at construction. When it fails every operation is a
/// no-op and reads return `None`.
#[derive(Clone)]
pub struct WebStorage {
    /// `None` when the probe failed or no backend exists.
    backend: Option<Arc<dyn StorageBackend>>,
}

impl WebStorage {
    /// Probe `backend` and wrap it.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        let available = match probe_backend(backend.as_ref()) {
            Ok(()) => {
                tracing::debug!("Persistent storage available");
                true
            },
            Err(error) => {
                tracing::info!(error = %error, "Persistent storage is not available");
                false
            },
        };

        Self {
            backend: available.then_some(backend),
        }
    }

    /// An adapter with no persistent mechanism at all.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self { backend: None }
    }

    /// Whether the backing mechanism passed the probe.
    #[must_use]
    pub const fn probe(&self) -> bool {
        self.backend.is_some()
    }

    /// Read `key`; `None` if missing, unavailable, or the read failed.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let backend = self.backend.as_ref()?;
        match backend.get_item(key) {
            Ok(value) => value,
            Err(error) => {
                tracing::debug!(key, error = %error, "Could not read item from storage");
                None
            },
        }
    }

    /// Write `key`; failures are logged and dropped.
    pub fn set(&self, key: &str, value: &str) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if let Err(error) = backend.set_item(key, value) {
            metrics::counter!("session.storage.write_failures").increment(1);
            tracing::debug!(key, error = %error, "Could not set item in storage");
        }
    }

    /// Delete `key`; failures are logged and dropped.
    pub fn remove(&self, key: &str) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if let Err(error) = backend.remove_item(key) {
            tracing::debug!(key, error = %error, "Could not remove item from storage");
        }
    }
}

impl std::fmt::Debug for WebStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebStorage")
            .field("available", &self.probe())
            .finish()
    }
}

fn probe_backend(backend: &dyn StorageBackend) -> Result<()> {
    backend.set_item(PROBE_KEY, PROBE_KEY)?;
    backend.remove_item(PROBE_KEY)
}

/// In-process storage shared by every clone.
///
/// Clones see the same map, which makes this a stand-in for one browser
/// profile shared by several tabs.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self
            .items
            .lock()
            .map_err(|_| SessionError::StorageRead("Mutex lock failed".to_string()))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items
            .lock()
            .map_err(|_| SessionError::StorageWrite("Mutex lock failed".to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items
            .lock()
            .map_err(|_| SessionError::StorageWrite("Mutex lock failed".to_string()))?
            .remove(key);
        Ok(())
    }
}
