//! Session manager.
//!
//! Owns the session state for one execution context (one tab), runs the
//! [`SessionReducer`] for every signal and executes the effects it returns
//! against the storage adapter.
//!
//! ```text
//! on_activity ──▶ Throttle ──┐
//! on_visible ────────────────┼──▶ reduce ──▶ Persist / Discard ──▶ WebStorage
//! on_external_storage_change ┘          └──▶ SessionChanged ──▶ observer
//! ```

use crate::meta::MetaSession;
use crate::reducer::{
    SessionAction, SessionEffect, SessionEnvironment, SessionReducer, SessionState, StorageMode,
};
use crate::storage::WebStorage;
use crate::throttle::Throttle;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use telemetry_session_core::{Clock, IdGenerator, Reducer, SessionConfig, SessionId, SessionRecord};

/// Called with the new record whenever the effective session id changes.
pub type SessionObserver = Arc<dyn Fn(&SessionRecord) + Send + Sync>;

struct Inner<C, G> {
    reducer: SessionReducer<C, G>,
    env: SessionEnvironment<C, G>,
    state: Mutex<SessionState>,
    observer: Mutex<Option<SessionObserver>>,
}

impl<C, G> Inner<C, G>
where
    C: Clock,
    G: IdGenerator,
{
    fn dispatch(&self, action: SessionAction) {
        let changed = {
            let mut state = self.lock_state();
            let effects = self.reducer.reduce(&mut state, action, &self.env);

            // Storage is written under the state lock so two signals cannot
            // interleave their read and write of the session key.
            let mut changed = None;
            for effect in effects {
                match effect {
                    SessionEffect::None => {},
                    SessionEffect::Persist(record) => self.persist(&record),
                    SessionEffect::Discard => {
                        self.env.storage.remove(&self.reducer.config().storage_key);
                    },
                    SessionEffect::SessionChanged(record) => changed = Some(record),
                }
            }
            changed
        };

        if let Some(record) = changed {
            let observer = self
                .observer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            if let Some(observer) = observer {
                observer(&record);
            }
        }
    }

    fn persist(&self, record: &SessionRecord) {
        match record.to_json() {
            Ok(json) => self.env.storage.set(&self.reducer.config().storage_key, &json),
            Err(error) => {
                tracing::debug!(error = %error, "Could not serialize session record");
            },
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Tracks the user session of one execution context.
///
/// The storage mode is chosen once at construction: persistent when the
/// storage adapter passed its probe, in-memory otherwise. No method returns
/// an error or panics; storage failures only degrade session continuity.
///
/// Cloning yields a handle to the same manager.
pub struct SessionManager<C, G> {
    inner: Arc<Inner<C, G>>,
    throttle: Throttle,
}

impl<C, G> SessionManager<C, G>
where
    C: Clock + 'static,
    G: IdGenerator + 'static,
{
    /// Create a manager and initialize the session.
    ///
    /// In persistent mode a still-valid stored session is continued, so a
    /// page reload keeps its session.
    #[must_use]
    pub fn new(clock: C, ids: G, storage: WebStorage, config: SessionConfig) -> Self {
        Self::build(clock, ids, storage, config, None)
    }

    /// Create a manager whose session continues `seed` (for example an id
    /// handed over from another page or agent).
    #[must_use]
    pub fn with_seed(
        clock: C,
        ids: G,
        storage: WebStorage,
        config: SessionConfig,
        seed: SessionId,
    ) -> Self {
        Self::build(clock, ids, storage, config, Some(seed))
    }

    fn build(
        clock: C,
        ids: G,
        storage: WebStorage,
        config: SessionConfig,
        seed: Option<SessionId>,
    ) -> Self {
        let mode = if storage.probe() {
            StorageMode::Persistent
        } else {
            tracing::info!("Persistent storage unavailable, using in-memory session management");
            StorageMode::InMemory
        };

        let interval = config.storage_update_interval;
        let inner = Arc::new(Inner {
            reducer: SessionReducer::new(config),
            env: SessionEnvironment::new(clock, ids, storage),
            state: Mutex::new(SessionState::new(mode)),
            observer: Mutex::new(None),
        });

        let throttled = Arc::clone(&inner);
        let throttle = Throttle::new(interval, move || throttled.dispatch(SessionAction::Touch));

        inner.dispatch(SessionAction::Initialize { seed });

        Self { inner, throttle }
    }

    /// Record activity. Cheap; storage is touched at most once per
    /// `storage_update_interval`.
    pub fn on_activity(&self) {
        self.throttle.call();
    }

    /// The page became visible again: re-evaluate immediately.
    pub fn on_visible(&self) {
        self.inner.dispatch(SessionAction::Touch);
    }

    /// Page visibility changed.
    ///
    /// Hiding flushes throttled activity so it is not lost with the page;
    /// becoming visible re-evaluates the session.
    pub fn on_visibility_change(&self, visible: bool) {
        if visible {
            self.on_visible();
        } else {
            self.flush_pending();
        }
    }

    /// Another execution context changed storage.
    ///
    /// Changes to keys other than the session key are ignored.
    pub fn on_external_storage_change(&self, key: &str, new_value: Option<String>) {
        if key != self.inner.reducer.config().storage_key {
            return;
        }
        self.inner
            .dispatch(SessionAction::ExternalChange { new_value });
    }

    /// Run any throttled activity now (page hide or unload).
    ///
    /// Returns `true` if activity was pending.
    pub fn flush_pending(&self) -> bool {
        self.throttle.flush()
    }

    /// End the session: the stored record is removed and the next activity
    /// starts a new one.
    pub fn end_session(&self) {
        self.inner.dispatch(SessionAction::End);
    }

    /// The current record, if a session is active in this context.
    #[must_use]
    pub fn current(&self) -> Option<SessionRecord> {
        self.inner.lock_state().current.clone()
    }

    /// The current session id.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner
            .lock_state()
            .current
            .as_ref()
            .map(|record| record.session_id.clone())
    }

    /// The storage mode chosen at construction.
    #[must_use]
    pub fn mode(&self) -> StorageMode {
        self.inner.lock_state().mode
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        self.inner.reducer.config()
    }

    /// Register the callback run whenever the session id changes,
    /// replacing any previous one.
    pub fn set_observer<F>(&self, observer: F)
    where
        F: Fn(&SessionRecord) + Send + Sync + 'static,
    {
        *self
            .inner
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(observer));
    }

    /// Host metadata for the current session.
    ///
    /// Starts a session first if none is active (after
    /// [`end_session`](Self::end_session)).
    #[must_use]
    pub fn meta_session(&self, attributes: Option<HashMap<String, String>>) -> MetaSession {
        let session_id = match self.session_id() {
            Some(session_id) => session_id,
            None => {
                self.inner.dispatch(SessionAction::Touch);
                self.session_id()
                    .unwrap_or_else(|| self.inner.env.ids.generate())
            },
        };

        MetaSession {
            id: session_id,
            attributes,
        }
    }
}

impl<C, G> Clone for SessionManager<C, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            throttle: self.throttle.clone(),
        }
    }
}

impl<C, G> std::fmt::Debug for SessionManager<C, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SessionManager")
            .field("mode", &state.mode)
            .field("current", &state.current)
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}
