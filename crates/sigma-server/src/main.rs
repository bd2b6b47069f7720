//! Sigma server binary — raw SQL over HTTP against an embedded SQLite file.
//!
//! Opens the database, serves the gateway over plaintext or TLS with
//! structured logging, and closes the database after a graceful shutdown on
//! SIGTERM/SIGINT.

use sigma_db::{Database, DbRuntimeSettings};
use sigma_server::{app, config, serve, tls, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("SIGMA_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

/// Opens the database, or logs the failure and returns a handle that rejects
/// every query. The server starts either way.
fn open_database(config: &config::DatabaseConfig) -> Database {
    let settings = DbRuntimeSettings {
        busy_timeout_ms: config.busy_timeout_ms,
    };

    match Database::open(&config.path, settings) {
        Ok(db) => {
            tracing::info!(path = %config.path, "connected to the SQLite database");
            db
        }
        Err(e) => {
            tracing::error!(
                path = %config.path,
                error = %e,
                "error connecting to database, continuing without it"
            );
            Database::unavailable(&config.path, e.to_string())
        }
    }
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // The handle must exist before the listener accepts anything.
    let db = open_database(&config.database);
    let app = app(AppState { db: db.clone() });
    let addr = SocketAddr::new(config.server.host, config.server.port);

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    let served = if config.tls.enabled {
        let acceptor = tls::load_tls_acceptor(&config.tls)
            .expect("failed to load TLS material — check tls.cert_path and tls.key_path");
        let listener = tls::TlsListener::new(listener, acceptor)
            .expect("failed to start the TLS listener");
        tracing::info!(%addr, database = %db.path(), "sigma server running over TLS");
        serve(listener, app, shutdown_signal()).await
    } else {
        tracing::info!(%addr, database = %db.path(), "sigma server running");
        serve(listener, app, shutdown_signal()).await
    };

    if let Err(e) = served {
        tracing::error!(error = %e, "server error");
    }

    match db.close_async().await {
        Ok(()) => tracing::info!("database connection closed"),
        Err(e) => tracing::error!(error = %e, "error closing database"),
    }

    tracing::info!("sigma server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
