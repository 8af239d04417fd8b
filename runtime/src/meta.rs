//! Host agent interfaces.
//!
//! The session layer plugs into a telemetry agent that owns event emission,
//! the metadata attached to every payload and the outgoing transports. These
//! traits are the only parts of the agent it touches.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use telemetry_session_core::SessionId;

/// Session block of the host metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaSession {
    /// Session identifier attached to every payload.
    pub id: SessionId,
    /// Free-form session attributes supplied by the application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, String>>,
}

impl MetaSession {
    /// Session metadata for `id` with no attributes.
    #[must_use]
    pub const fn new(id: SessionId) -> Self {
        Self {
            id,
            attributes: None,
        }
    }

    /// Attach attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// Snapshot of the host metadata.
///
/// Sessions are compared by `Arc` identity, so the host must hand out a new
/// `Arc` whenever the session changes.
#[derive(Debug, Clone, Default)]
pub struct Meta {
    /// Current session, if any.
    pub session: Option<Arc<MetaSession>>,
}

/// Options for [`EventEmitter::push_event`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushEventOptions {
    /// Bypass the host's duplicate-event filter.
    pub skip_dedupe: bool,
}

/// Outgoing telemetry payload seen by before-send hooks.
pub type TransportItem = serde_json::Value;

/// Called with the new metadata whenever it changes.
pub type MetaListener = Box<dyn Fn(&Meta) + Send + Sync>;

/// Inspects (and may drop) every outgoing item. `None` drops it.
pub type BeforeSendHook = Box<dyn Fn(TransportItem) -> Option<TransportItem> + Send + Sync>;

/// Event emission API of the host agent.
pub trait EventEmitter: Send + Sync {
    /// Emit a named event.
    fn push_event(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
        options: PushEventOptions,
    );
}

impl<T: EventEmitter + ?Sized> EventEmitter for Arc<T> {
    fn push_event(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
        options: PushEventOptions,
    ) {
        (**self).push_event(name, attributes, options);
    }
}

/// Emits through the agent while it is alive; a no-op afterwards.
impl<T: EventEmitter + ?Sized> EventEmitter for Weak<T> {
    fn push_event(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
        options: PushEventOptions,
    ) {
        if let Some(emitter) = self.upgrade() {
            emitter.push_event(name, attributes, options);
        }
    }
}

/// Metadata store of the host agent.
pub trait Metas: Send + Sync {
    /// Current metadata.
    fn value(&self) -> Meta;

    /// Replace the session block and notify listeners.
    fn set_session(&self, session: Option<MetaSession>);

    /// Subscribe to metadata changes.
    fn add_listener(&self, listener: MetaListener);
}

/// Transport pipeline of the host agent.
pub trait Transports: Send + Sync {
    /// Append a hook run on every item before it is sent.
    fn add_before_send_hook(&self, hook: BeforeSendHook);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_session_serializes_without_empty_attributes() {
        let session = MetaSession::new(SessionId::new("abc").unwrap());
        assert_eq!(
            serde_json::to_value(&session).unwrap(),
            serde_json::json!({ "id": "abc" })
        );
    }

    #[test]
    fn test_meta_session_with_attributes() {
        let attributes = HashMap::from([("plan".to_string(), "pro".to_string())]);
        let session = MetaSession::new(SessionId::new("abc").unwrap()).with_attributes(attributes);

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["attributes"]["plan"], "pro");
    }
}
