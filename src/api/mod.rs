mod errors;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::Engine;
use crate::scheduler::Scheduler;
use crate::store::ManagementStore;

pub use errors::set_debug_mode;

/// Shared application state accessible by all handlers.
pub struct AppState {
    pub store: Arc<dyn ManagementStore>,
    pub engine: Arc<Engine>,
    pub scheduler: Arc<Scheduler>,
    /// Cancelled when the process receives a shutdown signal; the
    /// `/jobs/execute-scheduled-tasks` handler blocks on this same token
    /// so it returns once cancellation is acknowledged (spec.md §9, open
    /// question c).
    pub cancel: CancellationToken,
}

/// Builds the route table over shared state. Split out from `serve` so
/// tests can exercise it with `tower::ServiceExt::oneshot` instead of
/// binding a real listener.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/task", post(handlers::create_task))
        .route("/task/{task_id}", get(handlers::get_task))
        .route(
            "/task/{task_id}/execute/{schedule_id}",
            post(handlers::execute_task),
        )
        .route("/schedule", post(handlers::create_schedule))
        .route(
            "/jobs/execute-scheduled-tasks",
            post(handlers::execute_scheduled_tasks),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the REST API server and wires the shared cancellation token to
/// Ctrl-C so `/jobs/execute-scheduled-tasks` unblocks on shutdown.
///
/// Shutdown goes through `axum::serve`'s graceful-shutdown hook rather than
/// racing `ctrl_c()` against the serve future directly: a `select!` between
/// the two would drop the serve future — and every in-flight connection
/// with it — the instant Ctrl-C won, cutting off a connection blocked
/// inside `/jobs/execute-scheduled-tasks` before it could send its 200.
/// Graceful shutdown instead stops accepting new connections and waits for
/// in-flight ones (including that handler's cancellation wait) to finish.
pub async fn serve(
    bind_addr: &str,
    store: Arc<dyn ManagementStore>,
    engine: Arc<Engine>,
    scheduler: Arc<Scheduler>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let state = Arc::new(AppState {
        store,
        engine,
        scheduler,
        cancel: cancel.clone(),
    });

    let app = router(state);

    let addr: SocketAddr = bind_addr.parse()?;
    info!("autotask API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown_signal = async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        cancel.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(Into::into)
}
