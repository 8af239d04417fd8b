//! Session-start notification.

use crate::meta::{EventEmitter, Meta, MetaSession, PushEventOptions};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Name of the event emitted when a new session becomes current.
pub const SESSION_START_EVENT: &str = "session_start";

/// Emits [`SESSION_START_EVENT`] once per distinct session.
///
/// Sessions are compared by `Arc` identity: the same `Arc` seen twice is
/// reported once, while two separate `Arc`s carrying the same id are two
/// sessions. Safe to call on every metadata change.
pub struct SessionStartNotifier<E> {
    emitter: E,
    notified: Mutex<Option<Arc<MetaSession>>>,
}

impl<E: EventEmitter> SessionStartNotifier<E> {
    /// Create a notifier that has reported nothing yet.
    #[must_use]
    pub const fn new(emitter: E) -> Self {
        Self {
            emitter,
            notified: Mutex::new(None),
        }
    }

    /// Report the session in `meta` if it has not been reported.
    ///
    /// Returns `true` if an event was emitted.
    pub fn notify(&self, meta: &Meta) -> bool {
        let Some(session) = meta.session.as_ref() else {
            return false;
        };

        {
            let mut notified = self.notified.lock().unwrap_or_else(PoisonError::into_inner);
            if notified
                .as_ref()
                .is_some_and(|previous| Arc::ptr_eq(previous, session))
            {
                return false;
            }
            *notified = Some(Arc::clone(session));
        }

        // Session id and attributes travel in the metadata of every event.
        self.emitter.push_event(
            SESSION_START_EVENT,
            HashMap::new(),
            PushEventOptions { skip_dedupe: true },
        );
        metrics::counter!("session.start_events").increment(1);
        tracing::debug!(session_id = %session.id, "Session start reported");
        true
    }

    /// The session most recently reported.
    #[must_use]
    pub fn last_notified(&self) -> Option<Arc<MetaSession>> {
        self.notified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<E> std::fmt::Debug for SessionStartNotifier<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStartNotifier").finish_non_exhaustive()
    }
}
