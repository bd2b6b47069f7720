//! Sigma server library logic.
//!
//! HTTP gateway that forwards raw SQL and bound parameters to the embedded
//! database owned by [`sigma_db::Database`] and returns the outcome as JSON.

pub mod api;
pub mod config;
pub mod tls;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    serve::Listener,
    Extension, Json, Router,
};
use serde_json::{json, Value};
use sigma_db::Database;
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The single database handle for the process.
    pub db: Database,
}

/// Maximum request body size (2 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Plain-text message served at `/`.
pub const WELCOME_MESSAGE: &str = "Welcome to Sigma-DB! Send raw SQL queries to /sql";

async fn root() -> &'static str {
    WELCOME_MESSAGE
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/sql", post(api::sql_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}

/// Serves `app` on any listener until `shutdown` resolves.
///
/// Plaintext TCP and [`tls::TlsListener`] both go through here, so the
/// gateway behaves the same on either transport. In-flight requests are
/// allowed to finish before this returns.
pub async fn serve<L>(
    listener: L,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()>
where
    L: Listener,
    L::Addr: std::fmt::Debug,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
