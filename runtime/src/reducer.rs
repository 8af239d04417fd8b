//! Session reducer.
//!
//! Decides what the current session record should be after each signal and
//! describes the resulting storage writes as [`SessionEffect`] values. The
//! [`SessionManager`](crate::SessionManager) executes them.
//!
//! # Signals
//!
//! - `Initialize`: page load. Re-evaluates the stored record (so a reload
//!   keeps the session) or starts one under a caller-supplied id
//! - `Touch`: activity (throttled) or the page becoming visible again
//! - `ExternalChange`: another tab wrote the session key
//! - `End`: explicit end of the session

use crate::storage::WebStorage;
use telemetry_session_core::{
    Clock, IdGenerator, Reducer, SessionConfig, SessionId, SessionRecord, SmallVec, classify,
    decide, smallvec,
};

/// Where the current record lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Shared storage; visible to every tab of the profile.
    Persistent,
    /// Process memory only; single execution context.
    InMemory,
}

/// Reducer state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Chosen once from storage availability.
    pub mode: StorageMode,
    /// Last record this context decided on or adopted.
    pub current: Option<SessionRecord>,
}

impl SessionState {
    /// Empty state for `mode`.
    #[must_use]
    pub const fn new(mode: StorageMode) -> Self {
        Self {
            mode,
            current: None,
        }
    }
}

/// Inputs to the session reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Page load.
    Initialize {
        /// Continue this id instead of evaluating the stored record.
        seed: Option<SessionId>,
    },
    /// Activity observed, or the page became visible.
    Touch,
    /// The session key was changed by another execution context.
    ExternalChange {
        /// The value written by the other context, if any.
        new_value: Option<String>,
    },
    /// Drop the current session.
    End,
}

/// Side effects requested by the reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    /// No effect.
    None,
    /// Write this record under the session key.
    Persist(SessionRecord),
    /// Remove the session key.
    Discard,
    /// The effective session id changed.
    SessionChanged(SessionRecord),
}

/// Injected dependencies.
#[derive(Debug, Clone)]
pub struct SessionEnvironment<C, G> {
    /// Time source.
    pub clock: C,
    /// Id source for replaced sessions.
    pub ids: G,
    /// Shared storage (may be unavailable).
    pub storage: WebStorage,
}

impl<C, G> SessionEnvironment<C, G> {
    /// Create an environment.
    #[must_use]
    pub const fn new(clock: C, ids: G, storage: WebStorage) -> Self {
        Self {
            clock,
            ids,
            storage,
        }
    }
}

/// Session lifecycle reducer.
///
/// Generic over the clock and id generator of its environment.
#[derive(Debug, Clone)]
pub struct SessionReducer<C, G> {
    config: SessionConfig,
    /// Phantom data to hold type parameters.
    _phantom: std::marker::PhantomData<(C, G)>,
}

impl<C, G> SessionReducer<C, G> {
    /// Create a reducer with `config`.
    #[must_use]
    pub const fn new(config: SessionConfig) -> Self {
        Self {
            config,
            _phantom: std::marker::PhantomData,
        }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Read the stored record, treating corrupt data as absent.
    #[must_use]
    pub fn read_record(&self, storage: &WebStorage) -> Option<SessionRecord> {
        let raw = storage.get(&self.config.storage_key)?;
        parse_record(&raw)
    }

    /// The record to evaluate: storage first, then our own last decision.
    ///
    /// A local record newer than the stored one under the same id means our
    /// last write was rejected, so the local one wins.
    fn load(&self, state: &SessionState, env: &SessionEnvironment<C, G>) -> Option<SessionRecord> {
        if state.mode == StorageMode::InMemory {
            return state.current.clone();
        }

        match self.read_record(&env.storage) {
            Some(stored) if superseded(&stored, state.current.as_ref()) => state.current.clone(),
            Some(stored) => Some(stored),
            None => state.current.clone(),
        }
    }

    fn evaluate(&self, state: &SessionState, env: &SessionEnvironment<C, G>) -> SessionRecord
    where
        C: Clock,
        G: IdGenerator,
    {
        let now = env.clock.now();
        let stored = self.load(state, env);
        let activity = classify(stored.as_ref(), now, &self.config);
        let decision = decide(stored.as_ref(), now, &self.config);

        metrics::counter!("session.decisions", "decision" => decision.kind()).increment(1);

        let previous = stored.as_ref().map(|record| record.session_id.as_str());
        let reason = activity.reason.map(|reason| reason.as_str());
        let next = decision.into_record(now, &env.ids);

        if previous == Some(next.session_id.as_str()) {
            tracing::trace!(
                session_id = %next.session_id,
                reason,
                "Session kept or extended"
            );
        } else {
            tracing::info!(
                previous,
                session_id = %next.session_id,
                reason,
                "Starting new session"
            );
        }

        next
    }

    fn commit(&self, state: &mut SessionState, next: SessionRecord) -> SmallVec<[SessionEffect; 4]> {
        let changed = state
            .current
            .as_ref()
            .is_none_or(|current| current.session_id != next.session_id);
        state.current = Some(next.clone());

        let mut effects: SmallVec<[SessionEffect; 4]> = SmallVec::new();
        if state.mode == StorageMode::Persistent {
            effects.push(SessionEffect::Persist(next.clone()));
        }
        if changed {
            effects.push(SessionEffect::SessionChanged(next));
        }
        if effects.is_empty() {
            effects.push(SessionEffect::None);
        }
        effects
    }

    /// Converge on whatever the shared storage now holds.
    ///
    /// Never mints an id: the only write is restoring our own still-active
    /// record when another context removed or corrupted the key.
    ///
    /// The event value is only a fallback for an unreadable key. It is
    /// ignored when it has expired or is an older copy of our own record.
    fn reconcile(
        &self,
        state: &mut SessionState,
        env: &SessionEnvironment<C, G>,
        new_value: Option<&str>,
    ) -> SmallVec<[SessionEffect; 4]>
    where
        C: Clock,
    {
        if state.mode == StorageMode::InMemory {
            tracing::trace!("Ignoring storage change in in-memory mode");
            return smallvec![SessionEffect::None];
        }

        let now = env.clock.now();
        let stored = self.read_record(&env.storage).or_else(|| {
            new_value.and_then(parse_record).filter(|record| {
                classify(Some(record), now, &self.config).active
                    && !superseded(record, state.current.as_ref())
            })
        });

        match stored {
            Some(record) if state.current.as_ref() == Some(&record) => {
                smallvec![SessionEffect::None]
            },
            Some(record) => {
                let changed = state
                    .current
                    .as_ref()
                    .is_none_or(|current| current.session_id != record.session_id);
                tracing::debug!(
                    session_id = %record.session_id,
                    changed,
                    "Adopting session written by another context"
                );
                state.current = Some(record.clone());
                if changed {
                    smallvec![SessionEffect::SessionChanged(record)]
                } else {
                    smallvec![SessionEffect::None]
                }
            },
            None => match state.current.as_ref() {
                Some(local) if classify(Some(local), now, &self.config).active => {
                    tracing::debug!(
                        session_id = %local.session_id,
                        "Session key cleared elsewhere, restoring active session"
                    );
                    smallvec![SessionEffect::Persist(local.clone())]
                },
                _ => {
                    state.current = None;
                    smallvec![SessionEffect::None]
                },
            },
        }
    }
}

impl<C, G> Reducer for SessionReducer<C, G>
where
    C: Clock,
    G: IdGenerator,
{
    type State = SessionState;
    type Action = SessionAction;
    type Effect = SessionEffect;
    type Environment = SessionEnvironment<C, G>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Self::Effect; 4]> {
        match action {
            SessionAction::Initialize { seed: Some(session_id) } => {
                tracing::debug!(session_id = %session_id, "Continuing supplied session id");
                let next = SessionRecord::new(session_id, env.clock.now());
                self.commit(state, next)
            },
            SessionAction::Initialize { seed: None } | SessionAction::Touch => {
                let next = self.evaluate(state, env);
                self.commit(state, next)
            },
            SessionAction::ExternalChange { new_value } => {
                self.reconcile(state, env, new_value.as_deref())
            },
            SessionAction::End => {
                if let Some(ended) = state.current.take() {
                    tracing::debug!(session_id = %ended.session_id, "Session ended");
                }
                match state.mode {
                    StorageMode::Persistent => smallvec![SessionEffect::Discard],
                    StorageMode::InMemory => smallvec![SessionEffect::None],
                }
            },
        }
    }
}

/// Same id as `local` but older activity: a write of ours that never landed.
fn superseded(record: &SessionRecord, local: Option<&SessionRecord>) -> bool {
    local.is_some_and(|local| {
        local.session_id == record.session_id && local.last_activity > record.last_activity
    })
}

fn parse_record(raw: &str) -> Option<SessionRecord> {
    match SessionRecord::from_json(raw) {
        Ok(record) => Some(record),
        Err(error) => {
            tracing::debug!(error = %error, "Ignoring unreadable stored session");
            None
        },
    }
}
