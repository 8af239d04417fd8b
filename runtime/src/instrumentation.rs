//! Wiring between the session manager and a host telemetry agent.
//!
//! - every outgoing payload counts as activity (before-send hook)
//! - a session id change updates the host metadata
//! - every new metadata session produces one `session_start` event

use crate::manager::SessionManager;
use crate::meta::{EventEmitter, MetaSession, Metas, Transports};
use crate::notifier::SessionStartNotifier;
use crate::reducer::StorageMode;
use std::sync::{Arc, Weak};
use telemetry_session_core::{Clock, IdGenerator};

/// Session instrumentation for a host agent.
///
/// Hooks and listeners registered on the agent hold only weak references
/// back to it.
pub struct SessionInstrumentation<A, C, G> {
    agent: Arc<A>,
    manager: SessionManager<C, G>,
    notifier: Arc<SessionStartNotifier<Weak<A>>>,
}

impl<A, C, G> SessionInstrumentation<A, C, G>
where
    A: EventEmitter + Metas + Transports + 'static,
    C: Clock + 'static,
    G: IdGenerator + 'static,
{
    /// Pair `manager` with `agent`. Nothing is registered until
    /// [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(agent: Arc<A>, manager: SessionManager<C, G>) -> Self {
        let notifier = Arc::new(SessionStartNotifier::new(Arc::downgrade(&agent)));
        Self {
            agent,
            manager,
            notifier,
        }
    }

    /// Register with the agent and report the current session.
    pub fn initialize(&self) {
        if self.manager.mode() == StorageMode::InMemory {
            tracing::debug!(
                "Persistent storage not supported or disabled, falling back to in-memory session management"
            );
        }

        let manager = self.manager.clone();
        self.agent.add_before_send_hook(Box::new(move |item| {
            manager.on_activity();
            Some(item)
        }));

        let agent = Arc::downgrade(&self.agent);
        self.manager.set_observer(move |record| {
            let Some(agent) = agent.upgrade() else {
                return;
            };
            let attributes = agent
                .value()
                .session
                .and_then(|session| session.attributes.clone());
            agent.set_session(Some(MetaSession {
                id: record.session_id.clone(),
                attributes,
            }));
        });

        self.sync_meta();
        self.notifier.notify(&self.agent.value());

        let notifier = Arc::clone(&self.notifier);
        self.agent.add_listener(Box::new(move |meta| {
            notifier.notify(meta);
        }));
    }

    /// The session manager driven by this instrumentation.
    #[must_use]
    pub const fn manager(&self) -> &SessionManager<C, G> {
        &self.manager
    }

    /// Make the host metadata carry the manager's session id.
    fn sync_meta(&self) {
        let meta = self.agent.value();
        let current = self.manager.session_id();
        let in_sync = match (meta.session.as_ref(), current.as_ref()) {
            (Some(session), Some(session_id)) => &session.id == session_id,
            _ => false,
        };
        if in_sync {
            return;
        }

        let attributes = meta
            .session
            .and_then(|session| session.attributes.clone());
        let session = self.manager.meta_session(attributes);
        tracing::debug!(session_id = %session.id, "Attaching session to agent metadata");
        self.agent.set_session(Some(session));
    }
}

impl<A, C, G> std::fmt::Debug for SessionInstrumentation<A, C, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInstrumentation")
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}
