//! # Telemetry Session Runtime
//!
//! Imperative shell for user session tracking in a browser telemetry agent.
//!
//! The lifecycle rules in `telemetry-session-core` are pure; this crate
//! connects them to storage, timers and the host agent.
//!
//! ## Core Components
//!
//! - **`WebStorage`**: best-effort persistence with a one-time availability probe
//! - **`Throttle`**: trailing-edge rate limiter for activity-driven writes
//! - **`SessionReducer`**: decides the next record for each signal, as effect values
//! - **`SessionManager`**: executes those effects and exposes the public contract
//! - **`SessionStartNotifier`**: one `session_start` event per new session
//! - **`SessionInstrumentation`**: registers all of the above with a host agent
//!
//! ## Example
//!
//! ```ignore
//! use telemetry_session_runtime::{SessionInstrumentation, SessionManager, WebStorage};
//! use telemetry_session_core::{SessionConfig, ShortIdGenerator, SystemClock};
//!
//! let storage = WebStorage::new(Arc::new(browser_local_storage()));
//! let manager = SessionManager::new(
//!     SystemClock,
//!     ShortIdGenerator::new(),
//!     storage,
//!     SessionConfig::default(),
//! );
//!
//! let instrumentation = SessionInstrumentation::new(agent, manager);
//! instrumentation.initialize();
//! ```

/// Wiring into a host telemetry agent
pub mod instrumentation;

/// Session manager shell
pub mod manager;

/// Host agent interfaces
pub mod meta;

/// Session-start notification
pub mod notifier;

/// Session reducer, state, actions and effects
pub mod reducer;

/// Storage adapter and backends
pub mod storage;

/// Trailing-edge throttle
pub mod throttle;

pub use instrumentation::SessionInstrumentation;
pub use manager::{SessionManager, SessionObserver};
pub use meta::{
    BeforeSendHook, EventEmitter, Meta, MetaListener, MetaSession, Metas, PushEventOptions,
    TransportItem, Transports,
};
pub use notifier::{SESSION_START_EVENT, SessionStartNotifier};
pub use reducer::{
    SessionAction, SessionEffect, SessionEnvironment, SessionReducer, SessionState, StorageMode,
};
pub use storage::{MemoryBackend, PROBE_KEY, StorageBackend, WebStorage};
pub use throttle::Throttle;
