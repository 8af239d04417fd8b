//! # Telemetry Session Testing
//!
//! Testing utilities and helpers for the telemetry session crates.
//!
//! This crate provides:
//! - Deterministic clocks and id generators
//! - Storage backends that fail on demand
//! - A recording host agent for instrumentation tests
//! - The [`ReducerTest`] Given/When/Then harness
//!
//! ## Example
//!
//! ```ignore
//! use telemetry_session_testing::{ManualClock, SequentialIdGenerator};
//! use telemetry_session_runtime::{MemoryBackend, SessionManager, WebStorage};
//!
//! let clock = ManualClock::starting_at_test_epoch();
//! let storage = WebStorage::new(Arc::new(MemoryBackend::new()));
//! let manager = SessionManager::new(clock.clone(), SequentialIdGenerator::new(), storage, config);
//!
//! clock.advance(chrono::Duration::minutes(20));
//! manager.on_visible();
//! assert_eq!(manager.session_id().unwrap().as_str(), "session-1");
//! ```


use chrono::{DateTime, Utc};
use telemetry_session_core::{Clock, IdGenerator, SessionId};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, SessionId, Utc};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use telemetry_session_testing::mocks::FixedClock;
    /// use telemetry_session_core::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// The instant every test clock starts at (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// Clock moved forward by hand
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the code under test.
    ///
    /// ```
    /// use telemetry_session_testing::mocks::ManualClock;
    /// use telemetry_session_core::Clock;
    ///
    /// let clock = ManualClock::starting_at_test_epoch();
    /// let handle = clock.clone();
    /// let before = clock.now();
    /// handle.advance(chrono::Duration::minutes(5));
    /// assert_eq!(clock.now() - before, chrono::Duration::minutes(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock reading `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Create a clock reading [`test_epoch`]
        #[must_use]
        pub fn starting_at_test_epoch() -> Self {
            Self::new(test_epoch())
        }

        /// Move the clock forward (or backward, for negative durations)
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Predictable ids: `session-1`, `session-2`, ...
    ///
    /// Clones share the counter.
    #[derive(Debug, Clone)]
    pub struct SequentialIdGenerator {
        prefix: String,
        next: Arc<AtomicU64>,
    }

    impl SequentialIdGenerator {
        /// Ids prefixed with `session`
        #[must_use]
        pub fn new() -> Self {
            Self::with_prefix("session")
        }

        /// Ids prefixed with `prefix`, useful to tell tabs apart
        #[must_use]
        pub fn with_prefix(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: Arc::new(AtomicU64::new(1)),
            }
        }

        /// Number of ids handed out so far
        #[must_use]
        pub fn generated(&self) -> u64 {
            self.next.load(Ordering::SeqCst) - 1
        }
    }

    impl Default for SequentialIdGenerator {
        fn default() -> Self {
            Self::new()
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        #[allow(clippy::expect_used)]
        fn generate(&self) -> SessionId {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            SessionId::new(format!("{}-{n}", self.prefix))
                .expect("prefixed sequence ids are never blank")
        }
    }

    pub use agent::{MockAgent, RecordedEvent};
    pub use storage::{FailingBackend, QuotaBackend};

    /// Storage backends with controllable failures
    mod storage {
        use super::{Arc, AtomicBool, AtomicU64, Ordering};
        use telemetry_session_core::{Result, SessionError};
        use telemetry_session_runtime::{MemoryBackend, StorageBackend};

        /// Backend where every operation fails (disabled or sandboxed storage)
        #[derive(Debug, Clone, Copy, Default)]
        pub struct FailingBackend;

        impl StorageBackend for FailingBackend {
            fn get_item(&self, _key: &str) -> Result<Option<String>> {
                Err(SessionError::StorageUnavailable("storage disabled".to_string()))
            }

            fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
                Err(SessionError::StorageUnavailable("storage disabled".to_string()))
            }

            fn remove_item(&self, _key: &str) -> Result<()> {
                Err(SessionError::StorageUnavailable("storage disabled".to_string()))
            }
        }

        /// Working backend whose writes can be switched to "quota exceeded"
        ///
        /// Clones share the items and the switch.
        #[derive(Debug, Clone, Default)]
        pub struct QuotaBackend {
            inner: MemoryBackend,
            full: Arc<AtomicBool>,
            rejected: Arc<AtomicU64>,
        }

        impl QuotaBackend {
            /// Create a backend that accepts writes
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Start or stop rejecting writes
            pub fn set_full(&self, full: bool) {
                self.full.store(full, Ordering::SeqCst);
            }

            /// Number of writes rejected so far
            #[must_use]
            pub fn rejected_writes(&self) -> u64 {
                self.rejected.load(Ordering::SeqCst)
            }

            /// The underlying items
            #[must_use]
            pub const fn items(&self) -> &MemoryBackend {
                &self.inner
            }
        }

        impl StorageBackend for QuotaBackend {
            fn get_item(&self, key: &str) -> Result<Option<String>> {
                self.inner.get_item(key)
            }

            fn set_item(&self, key: &str, value: &str) -> Result<()> {
                if self.full.load(Ordering::SeqCst) {
                    self.rejected.fetch_add(1, Ordering::SeqCst);
                    return Err(SessionError::StorageWrite("quota exceeded".to_string()));
                }
                self.inner.set_item(key, value)
            }

            fn remove_item(&self, key: &str) -> Result<()> {
                self.inner.remove_item(key)
            }
        }
    }

    /// Recording host agent
    mod agent {
        use super::{Arc, Mutex, PoisonError};
        use std::collections::HashMap;
        use telemetry_session_runtime::{
            BeforeSendHook, EventEmitter, Meta, MetaListener, MetaSession, Metas,
            PushEventOptions, TransportItem, Transports,
        };

        type SharedListener = Arc<dyn Fn(&Meta) + Send + Sync>;
        type SharedHook = Arc<dyn Fn(TransportItem) -> Option<TransportItem> + Send + Sync>;

        /// An event captured by [`MockAgent`]
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct RecordedEvent {
            /// Event name
            pub name: String,
            /// Event attributes
            pub attributes: HashMap<String, String>,
            /// Emission options
            pub options: PushEventOptions,
        }

        /// In-memory host agent implementing every host trait
        ///
        /// `set_session` wraps the session in a new `Arc` each time and
        /// notifies listeners synchronously, like a real agent's metas store.
        #[derive(Default)]
        pub struct MockAgent {
            events: Mutex<Vec<RecordedEvent>>,
            meta: Mutex<Meta>,
            listeners: Mutex<Vec<SharedListener>>,
            hooks: Mutex<Vec<SharedHook>>,
        }

        impl MockAgent {
            /// Create an agent with no session metadata
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Create an agent whose metadata already carries `session`
            #[must_use]
            pub fn with_session(session: MetaSession) -> Self {
                let agent = Self::default();
                agent.lock_meta().session = Some(Arc::new(session));
                agent
            }

            /// Run `item` through every before-send hook, as a transport would
            pub fn send(&self, item: TransportItem) -> Option<TransportItem> {
                let hooks: Vec<SharedHook> = self
                    .hooks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                hooks.iter().try_fold(item, |item, hook| hook(item))
            }

            /// Every event emitted so far
            #[must_use]
            pub fn events(&self) -> Vec<RecordedEvent> {
                self.events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone()
            }

            /// Number of events named `name`
            #[must_use]
            pub fn count_events(&self, name: &str) -> usize {
                self.events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                    .filter(|event| event.name == name)
                    .count()
            }

            /// Number of registered before-send hooks
            #[must_use]
            pub fn hook_count(&self) -> usize {
                self.hooks.lock().unwrap_or_else(PoisonError::into_inner).len()
            }

            /// Number of registered metadata listeners
            #[must_use]
            pub fn listener_count(&self) -> usize {
                self.listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .len()
            }

            /// Id of the session in the current metadata
            #[must_use]
            pub fn session_id(&self) -> Option<String> {
                self.lock_meta()
                    .session
                    .as_ref()
                    .map(|session| session.id.to_string())
            }

            fn lock_meta(&self) -> std::sync::MutexGuard<'_, Meta> {
                self.meta.lock().unwrap_or_else(PoisonError::into_inner)
            }
        }

        impl EventEmitter for MockAgent {
            fn push_event(
                &self,
                name: &str,
                attributes: HashMap<String, String>,
                options: PushEventOptions,
            ) {
                self.events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(RecordedEvent {
                        name: name.to_string(),
                        attributes,
                        options,
                    });
            }
        }

        impl Metas for MockAgent {
            fn value(&self) -> Meta {
                self.lock_meta().clone()
            }

            fn set_session(&self, session: Option<MetaSession>) {
                let meta = {
                    let mut meta = self.lock_meta();
                    meta.session = session.map(Arc::new);
                    meta.clone()
                };
                let listeners: Vec<SharedListener> = self
                    .listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                for listener in listeners {
                    listener(&meta);
                }
            }

            fn add_listener(&self, listener: MetaListener) {
                self.listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(Arc::from(listener));
            }
        }

        impl Transports for MockAgent {
            fn add_before_send_hook(&self, hook: BeforeSendHook) {
                self.hooks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(Arc::from(hook));
            }
        }

        impl std::fmt::Debug for MockAgent {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct("MockAgent")
                    .field("events", &self.events())
                    .field("session_id", &self.session_id())
                    .finish_non_exhaustive()
            }
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    /// Install a `tracing` subscriber that writes through the test harness
    ///
    /// Honors `RUST_LOG`; safe to call from every test.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Serialize a stored record by hand, bypassing validation
    #[must_use]
    pub fn raw_record(session_id: &str, last_activity_ms: i64, started_ms: i64) -> String {
        serde_json::json!({
            "sessionId": session_id,
            "lastActivity": last_activity_ms,
            "started": started_ms,
        })
        .to_string()
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;

    /// Offsets in milliseconds within three maximum session durations.
    pub fn offsets_ms() -> impl Strategy<Value = i64> {
        0..3 * 4 * 60 * 60 * 1000_i64
    }

    /// Bursts of activity calls separated by gaps in milliseconds.
    pub fn activity_bursts() -> impl Strategy<Value = Vec<(usize, u64)>> {
        prop::collection::vec((1..50_usize, 0..5_000_u64), 1..10)
    }
}

// Re-export commonly used items
pub use mocks::{
    FailingBackend, FixedClock, ManualClock, MockAgent, QuotaBackend, RecordedEvent,
    SequentialIdGenerator, test_clock, test_epoch,
};
pub use reducer_test::ReducerTest;
