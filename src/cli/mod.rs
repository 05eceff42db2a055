//! Process bootstrap: load config, wire the store/registry/engine/scheduler,
//! and start the HTTP server.

use std::sync::Arc;

use anyhow::Result;

use crate::api;
use crate::config::AppConfig;
use crate::engine::Engine;
use crate::kv::InMemoryKvStore;
use crate::registry::RunnerRegistry;
use crate::scheduler::Scheduler;
use crate::store::SqliteStore;

pub async fn run_cli() -> Result<()> {
    let config = AppConfig::load();
    api::set_debug_mode(config.debug);

    let registry = Arc::new(RunnerRegistry::with_builtins());
    // Fatal per spec.md §7: a registry missing a runner for any `StepKind`
    // aborts the process before the server binds.
    registry.assert_complete();

    let store = Arc::new(SqliteStore::connect(&config.database_url).await?);
    let kv = InMemoryKvStore::new();

    let engine = Arc::new(Engine::new(store.clone(), registry, kv));
    let scheduler = Arc::new(Scheduler::new(store.clone(), engine.clone()));

    api::serve(&config.bind_addr(), store, engine, scheduler).await
}
