//! Session reducer tests
//!
//! Drive the reducer directly with Given-When-Then and inspect the effects it
//! describes, without a manager executing them.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use std::sync::Arc;
use telemetry_session_core::{
    Reducer, SessionConfig, SessionId, SessionRecord, config::DEFAULT_STORAGE_KEY,
};
use telemetry_session_runtime::{
    MemoryBackend, SessionAction, SessionEffect, SessionEnvironment, SessionReducer, SessionState,
    StorageBackend, StorageMode, WebStorage,
};
use telemetry_session_testing::reducer_test::assertions::{
    assert_effects_count, assert_no_effects, changed, persisted,
};
use telemetry_session_testing::{
    FixedClock, ReducerTest, SequentialIdGenerator, properties, test_clock, test_epoch,
};

// ============================================================================
// Test Fixtures
// ============================================================================

type Env = SessionEnvironment<FixedClock, SequentialIdGenerator>;

fn reducer() -> SessionReducer<FixedClock, SequentialIdGenerator> {
    SessionReducer::new(SessionConfig::default())
}

fn env_with(backend: &MemoryBackend, clock: FixedClock) -> Env {
    SessionEnvironment::new(
        clock,
        SequentialIdGenerator::new(),
        WebStorage::new(Arc::new(backend.clone())),
    )
}

fn env_at(backend: &MemoryBackend, at: DateTime<Utc>) -> Env {
    env_with(backend, FixedClock::new(at))
}

fn store(backend: &MemoryBackend, record: &SessionRecord) {
    backend
        .set_item(DEFAULT_STORAGE_KEY, &record.to_json().unwrap())
        .unwrap();
}

fn record(id: &str, started: DateTime<Utc>, last_activity: DateTime<Utc>) -> SessionRecord {
    SessionRecord {
        session_id: SessionId::new(id).unwrap(),
        last_activity,
        started,
    }
}

fn persistent_with(current: SessionRecord) -> SessionState {
    SessionState {
        mode: StorageMode::Persistent,
        current: Some(current),
    }
}

fn has_persist(effects: &[SessionEffect]) -> bool {
    effects
        .iter()
        .any(|effect| matches!(effect, SessionEffect::Persist(_)))
}

// ============================================================================
// Initialize
// ============================================================================

#[test]
fn test_initialize_with_empty_storage_starts_new_session() {
    let backend = MemoryBackend::new();

    ReducerTest::new(reducer())
        .with_env(env_with(&backend, test_clock()))
        .given_state(SessionState::new(StorageMode::Persistent))
        .when_action(SessionAction::Initialize { seed: None })
        .then_state(|state| {
            let current = state.current.as_ref().unwrap();
            assert_eq!(current.session_id.as_str(), "session-1");
            assert_eq!(current.started, test_epoch());
        })
        .then_effects(|effects| {
            assert_effects_count(effects, 2);
            assert_eq!(Some(persisted(effects)), changed(effects));
            assert_eq!(persisted(effects).session_id.as_str(), "session-1");
        })
        .run();
}

#[test]
fn test_initialize_continues_active_stored_session() {
    let backend = MemoryBackend::new();
    store(&backend, &record("from-reload", test_epoch(), test_epoch() + Duration::minutes(5)));
    let now = test_epoch() + Duration::minutes(10);

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, now))
        .given_state(SessionState::new(StorageMode::Persistent))
        .when_action(SessionAction::Initialize { seed: None })
        .then_state(move |state| {
            let current = state.current.as_ref().unwrap();
            assert_eq!(current.session_id.as_str(), "from-reload");
            assert_eq!(current.started, test_epoch());
            assert_eq!(current.last_activity, now);
        })
        .then_effects(|effects| {
            // New to this context, so observers hear about it.
            assert!(changed(effects).is_some());
            assert_eq!(persisted(effects).session_id.as_str(), "from-reload");
        })
        .run();
}

#[test]
fn test_initialize_with_seed_ignores_stored_session() {
    let backend = MemoryBackend::new();
    store(&backend, &record("stored", test_epoch(), test_epoch()));

    ReducerTest::new(reducer())
        .with_env(env_with(&backend, test_clock()))
        .given_state(SessionState::new(StorageMode::Persistent))
        .when_action(SessionAction::Initialize {
            seed: Some(SessionId::new("seeded").unwrap()),
        })
        .then_effects(|effects| {
            assert_eq!(persisted(effects).session_id.as_str(), "seeded");
        })
        .run();
}

// ============================================================================
// Touch
// ============================================================================

#[test]
fn test_touch_within_thresholds_keeps_session_quietly() {
    let backend = MemoryBackend::new();
    let current = record("a", test_epoch(), test_epoch());
    store(&backend, &current);
    let now = test_epoch() + Duration::minutes(3);

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, now))
        .given_state(persistent_with(current))
        .when_action(SessionAction::Touch)
        .then_effects(move |effects| {
            assert_effects_count(effects, 1);
            let written = persisted(effects);
            assert_eq!(written.session_id.as_str(), "a");
            assert_eq!(written.last_activity, now);
            assert!(changed(effects).is_none());
        })
        .run();
}

#[test]
fn test_touch_after_inactivity_extends_same_id() {
    let backend = MemoryBackend::new();
    let current = record("a", test_epoch(), test_epoch());
    store(&backend, &current);
    let now = test_epoch() + Duration::minutes(16);

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, now))
        .given_state(persistent_with(current))
        .when_action(SessionAction::Touch)
        .then_state(move |state| {
            let current = state.current.as_ref().unwrap();
            assert_eq!(current.session_id.as_str(), "a");
            assert_eq!(current.started, now);
        })
        .then_effects(|effects| {
            assert!(changed(effects).is_none());
        })
        .run();
}

#[test]
fn test_touch_with_corrupt_storage_replaces_session() {
    let backend = MemoryBackend::new();
    backend.set_item(DEFAULT_STORAGE_KEY, "{not json").unwrap();

    ReducerTest::new(reducer())
        .with_env(env_with(&backend, test_clock()))
        .given_state(SessionState::new(StorageMode::Persistent))
        .when_action(SessionAction::Touch)
        .then_effects(|effects| {
            assert_eq!(changed(effects).unwrap().session_id.as_str(), "session-1");
        })
        .run();
}

#[test]
fn test_touch_falls_back_to_local_record_when_storage_lost_it() {
    let backend = MemoryBackend::new();
    let local = record("local", test_epoch(), test_epoch());

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, test_epoch() + Duration::minutes(1)))
        .given_state(persistent_with(local))
        .when_action(SessionAction::Touch)
        .then_effects(|effects| {
            assert_eq!(persisted(effects).session_id.as_str(), "local");
            assert!(changed(effects).is_none());
        })
        .run();
}

#[test]
fn test_touch_prefers_newer_local_record_over_stale_stored_copy() {
    // Storage still holds the copy from before a rejected write.
    let backend = MemoryBackend::new();
    store(&backend, &record("a", test_epoch(), test_epoch()));
    let local = record("a", test_epoch(), test_epoch() + Duration::minutes(10));
    let now = test_epoch() + Duration::minutes(20);

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, now))
        .given_state(persistent_with(local))
        .when_action(SessionAction::Touch)
        .then_effects(move |effects| {
            // Ten minutes idle locally: kept, not extended.
            let written = persisted(effects);
            assert_eq!(written.session_id.as_str(), "a");
            assert_eq!(written.started, test_epoch());
            assert_eq!(written.last_activity, now);
            assert!(changed(effects).is_none());
        })
        .run();
}

#[test]
fn test_touch_prefers_stored_record_when_it_is_newer() {
    let backend = MemoryBackend::new();
    let refreshed_at = test_epoch() + Duration::minutes(10);
    store(&backend, &record("a", test_epoch(), refreshed_at));
    let now = test_epoch() + Duration::minutes(20);

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, now))
        .given_state(persistent_with(record("a", test_epoch(), test_epoch())))
        .when_action(SessionAction::Touch)
        .then_effects(|effects| {
            assert_eq!(persisted(effects).started, test_epoch());
        })
        .run();
}

#[test]
fn test_in_memory_touch_never_persists() {
    let backend = MemoryBackend::new();

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, test_epoch() + Duration::hours(6)))
        .given_state(SessionState {
            mode: StorageMode::InMemory,
            current: Some(record("a", test_epoch(), test_epoch())),
        })
        .when_action(SessionAction::Touch)
        .then_state(|state| {
            assert_eq!(state.current.as_ref().unwrap().session_id.as_str(), "session-1");
        })
        .then_effects(|effects| {
            assert_effects_count(effects, 1);
            assert!(!has_persist(effects));
            assert!(changed(effects).is_some());
        })
        .run();
}

// ============================================================================
// External Changes
// ============================================================================

#[test]
fn test_external_change_adopts_other_tab_session() {
    let backend = MemoryBackend::new();
    let theirs = record("theirs", test_epoch(), test_epoch() + Duration::minutes(1));
    store(&backend, &theirs);
    let expected = theirs.clone();

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, test_epoch() + Duration::minutes(1)))
        .given_state(persistent_with(record("ours", test_epoch(), test_epoch())))
        .when_action(SessionAction::ExternalChange {
            new_value: Some(theirs.to_json().unwrap()),
        })
        .then_state(move |state| {
            assert_eq!(state.current.as_ref(), Some(&expected));
        })
        .then_effects(|effects| {
            assert_effects_count(effects, 1);
            assert_eq!(changed(effects).unwrap().session_id.as_str(), "theirs");
        })
        .run();
}

#[test]
fn test_external_change_with_same_id_is_silent() {
    let backend = MemoryBackend::new();
    let ours = record("shared", test_epoch(), test_epoch());
    let refreshed = ours.touched(test_epoch() + Duration::minutes(2));
    store(&backend, &refreshed);

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, test_epoch() + Duration::minutes(2)))
        .given_state(persistent_with(ours))
        .when_action(SessionAction::ExternalChange { new_value: None })
        .then_state(move |state| {
            assert_eq!(state.current.as_ref(), Some(&refreshed));
        })
        .then_effects(assert_no_effects)
        .run();
}

#[test]
fn test_external_change_uses_event_value_when_storage_unreadable() {
    let backend = MemoryBackend::new();
    let theirs = record("theirs", test_epoch(), test_epoch() + Duration::minutes(1));
    let expected = theirs.clone();

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, test_epoch() + Duration::minutes(2)))
        .given_state(persistent_with(record("ours", test_epoch(), test_epoch())))
        .when_action(SessionAction::ExternalChange {
            new_value: Some(theirs.to_json().unwrap()),
        })
        .then_state(move |state| {
            assert_eq!(state.current.as_ref(), Some(&expected));
        })
        .then_effects(|effects| {
            assert!(!has_persist(effects));
            assert_eq!(changed(effects).unwrap().session_id.as_str(), "theirs");
        })
        .run();
}

#[test]
fn test_stale_event_value_does_not_replace_newer_local_record() {
    let backend = MemoryBackend::new();
    let stale = record("ours", test_epoch(), test_epoch());
    let local = stale.touched(test_epoch() + Duration::minutes(5));
    let expected_state = local.clone();
    let expected_write = local.clone();

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, test_epoch() + Duration::minutes(6)))
        .given_state(persistent_with(local))
        .when_action(SessionAction::ExternalChange {
            new_value: Some(stale.to_json().unwrap()),
        })
        .then_state(move |state| {
            assert_eq!(state.current.as_ref(), Some(&expected_state));
        })
        .then_effects(move |effects| {
            assert_eq!(effects, [SessionEffect::Persist(expected_write)]);
        })
        .run();
}

#[test]
fn test_expired_event_value_is_not_adopted() {
    let backend = MemoryBackend::new();
    let expired = record("old", test_epoch(), test_epoch());

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, test_epoch() + Duration::hours(5)))
        .given_state(SessionState::new(StorageMode::Persistent))
        .when_action(SessionAction::ExternalChange {
            new_value: Some(expired.to_json().unwrap()),
        })
        .then_state(|state| {
            assert!(state.current.is_none());
        })
        .then_effects(assert_no_effects)
        .run();
}

#[test]
fn test_external_removal_restores_active_local_session() {
    let backend = MemoryBackend::new();
    let local = record("local", test_epoch(), test_epoch());
    let expected = local.clone();

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, test_epoch() + Duration::minutes(1)))
        .given_state(persistent_with(local))
        .when_action(SessionAction::ExternalChange { new_value: None })
        .then_effects(move |effects| {
            assert_eq!(effects, [SessionEffect::Persist(expected)]);
        })
        .run();
}

#[test]
fn test_external_removal_of_expired_session_clears_it() {
    let backend = MemoryBackend::new();

    ReducerTest::new(reducer())
        .with_env(env_at(&backend, test_epoch() + Duration::hours(1)))
        .given_state(persistent_with(record("stale", test_epoch(), test_epoch())))
        .when_action(SessionAction::ExternalChange { new_value: None })
        .then_state(|state| {
            assert!(state.current.is_none());
        })
        .then_effects(assert_no_effects)
        .run();
}

#[test]
fn test_external_change_in_memory_mode_is_ignored() {
    let backend = MemoryBackend::new();
    store(&backend, &record("theirs", test_epoch(), test_epoch()));

    ReducerTest::new(reducer())
        .with_env(env_with(&backend, test_clock()))
        .given_state(SessionState {
            mode: StorageMode::InMemory,
            current: Some(record("ours", test_epoch(), test_epoch())),
        })
        .when_action(SessionAction::ExternalChange { new_value: None })
        .then_state(|state| {
            assert_eq!(state.current.as_ref().unwrap().session_id.as_str(), "ours");
        })
        .then_effects(assert_no_effects)
        .run();
}

// ============================================================================
// End
// ============================================================================

#[test]
fn test_end_discards_stored_session() {
    let backend = MemoryBackend::new();

    ReducerTest::new(reducer())
        .with_env(env_with(&backend, test_clock()))
        .given_state(SessionState::new(StorageMode::Persistent))
        .given_action(SessionAction::Initialize { seed: None })
        .when_action(SessionAction::End)
        .then_state(|state| {
            assert!(state.current.is_none());
        })
        .then_effects(|effects| {
            assert_eq!(effects, [SessionEffect::Discard]);
        })
        .run();
}

#[test]
fn test_touch_after_end_starts_new_session() {
    // The ended session is gone from storage too, so the touch starts over.
    let backend = MemoryBackend::new();

    ReducerTest::new(reducer())
        .with_env(env_with(&backend, test_clock()))
        .given_state(SessionState::new(StorageMode::Persistent))
        .given_action(SessionAction::Initialize { seed: None })
        .given_action(SessionAction::End)
        .when_action(SessionAction::Touch)
        .then_state(|state| {
            assert_eq!(state.current.as_ref().unwrap().session_id.as_str(), "session-2");
        })
        .then_effects(|effects| {
            assert_eq!(persisted(effects).session_id.as_str(), "session-2");
            assert_eq!(changed(effects).unwrap().session_id.as_str(), "session-2");
        })
        .run();
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_touch_always_persists_a_valid_current_record(
        started in properties::offsets_ms(),
        idle in properties::offsets_ms(),
        wait in properties::offsets_ms(),
    ) {
        let backend = MemoryBackend::new();
        let started = test_epoch() + Duration::milliseconds(started);
        let last_activity = started + Duration::milliseconds(idle);
        let now = last_activity + Duration::milliseconds(wait);
        let previous = record("previous", started, last_activity);
        store(&backend, &previous);

        let env = env_at(&backend, now);
        let mut state = persistent_with(previous);
        let effects = reducer().reduce(&mut state, SessionAction::Touch, &env);

        let written = persisted(&effects);
        prop_assert!(written.validate().is_ok());
        prop_assert_eq!(written.last_activity, now);
        prop_assert_eq!(state.current.as_ref(), Some(written));
        prop_assert_eq!(
            changed(&effects).is_some(),
            written.session_id.as_str() != "previous"
        );
    }
}
