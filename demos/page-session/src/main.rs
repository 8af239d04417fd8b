//! Page session demo
//!
//! Simulates two tabs of one browser profile sharing local storage: activity
//! bursts, a backgrounded tab coming back, a session replaced in one tab and
//! adopted by the other, and a session handed over to a new page.

use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;
use telemetry_session_core::{SessionConfig, SessionId, config::DEFAULT_STORAGE_KEY};
use telemetry_session_runtime::{
    MemoryBackend, SESSION_START_EVENT, SessionInstrumentation, SessionManager, StorageBackend,
    WebStorage,
};
use telemetry_session_testing::{ManualClock, MockAgent, SequentialIdGenerator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Tab = SessionInstrumentation<MockAgent, ManualClock, SequentialIdGenerator>;

fn open_tab(name: &str, clock: &ManualClock, storage: &MemoryBackend, seed: Option<SessionId>) -> (Arc<MockAgent>, Tab) {
    let web_storage = WebStorage::new(Arc::new(storage.clone()));
    let ids = SequentialIdGenerator::with_prefix(name);
    let config = SessionConfig::default();
    let manager = match seed {
        Some(seed) => SessionManager::with_seed(clock.clone(), ids, web_storage, config, seed),
        None => SessionManager::new(clock.clone(), ids, web_storage, config),
    };

    let agent = Arc::new(MockAgent::new());
    let tab = SessionInstrumentation::new(Arc::clone(&agent), manager);
    tab.initialize();
    (agent, tab)
}

/// Deliver the browser's storage event to the tabs that did not write.
fn broadcast(storage: &MemoryBackend, tabs: &[&Tab]) -> anyhow::Result<()> {
    let value = storage
        .get_item(DEFAULT_STORAGE_KEY)
        .context("reading shared storage")?;
    for tab in tabs {
        tab.manager()
            .on_external_storage_change(DEFAULT_STORAGE_KEY, value.clone());
    }
    Ok(())
}

fn report(name: &str, agent: &MockAgent) {
    tracing::info!(
        tab = name,
        session = %agent.session_id().unwrap_or_else(|| "-".to_string()),
        session_start_events = agent.count_events(SESSION_START_EVENT),
        "Tab state"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "page_session=debug,telemetry_session_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("=== Page Session Demo ===");

    let clock = ManualClock::starting_at_test_epoch();
    let storage = MemoryBackend::new();

    tracing::info!(">>> Tab A opens and sends a burst of telemetry");
    let (agent_a, tab_a) = open_tab("a", &clock, &storage, None);
    clock.advance(Duration::seconds(20));
    for n in 0..50 {
        agent_a.send(serde_json::json!({ "type": "measurement", "n": n }));
    }
    tokio::time::sleep(tab_a.manager().config().storage_update_interval * 2).await;
    report("tab A", &agent_a);

    tracing::info!(">>> Tab A is hidden for 20 minutes, then visible again");
    tab_a.manager().on_visibility_change(false);
    clock.advance(Duration::minutes(20));
    tab_a.manager().on_visibility_change(true);
    report("tab A", &agent_a);

    tracing::info!(">>> Tab B opens and joins the session");
    let (agent_b, tab_b) = open_tab("b", &clock, &storage, None);
    broadcast(&storage, &[&tab_a])?;
    report("tab A", &agent_a);
    report("tab B", &agent_b);

    tracing::info!(">>> Five idle hours later tab B becomes visible");
    clock.advance(Duration::hours(5));
    tab_b.manager().on_visible();
    broadcast(&storage, &[&tab_a])?;
    report("tab A", &agent_a);
    report("tab B", &agent_b);

    tracing::info!(">>> A new page continues a handed-over session id");
    let handed_over = SessionId::new("handed-over-42").context("invalid session id")?;
    let (agent_c, _tab_c) = open_tab("c", &clock, &storage, Some(handed_over));
    broadcast(&storage, &[&tab_a, &tab_b])?;
    report("tab A", &agent_a);
    report("tab B", &agent_b);
    report("tab C", &agent_c);

    tracing::info!("=== Demo Complete ===");
    Ok(())
}
