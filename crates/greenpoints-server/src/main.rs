//! # greenpoints-server
//!
//! HTTP node for the GreenPoints recycling network.
//!
//! The node serves:
//! - **Accounts and sessions** for the ADMIN, USER and EMPLOYEE role buckets
//! - **XP crediting** from manual entries and paired GP-Bin devices
//! - **Leaderboard and admin tooling** (moderation, stats, snapshots)
//! - **Per-IP rate limiting** to protect against abuse

mod admin;
mod api;
mod auth;
mod config;
mod device;
mod error;
mod rate_limit;

use std::time::Duration;

use greenpoints_store::Database;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Logging (RUST_LOG overrides the default filter)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,greenpoints_server=debug")),
        )
        .init();

    info!("Starting GreenPoints node v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Configuration from the environment
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Configuration loaded");

    // -----------------------------------------------------------------------
    // 3. Open the store
    // -----------------------------------------------------------------------
    let db = match &config.database_path {
        Some(path) => Database::open_at(path)?,
        None => Database::open_default()?,
    };
    let metadata = db.metadata()?;
    info!(
        network_id = %metadata.network_id,
        path = ?db.path(),
        "Store ready"
    );

    if admin::bootstrap_admin(&db, &config)? {
        info!("Bootstrap admin account seeded");
    }

    let http_addr = config.http_addr;
    let app_state = AppState::new(db, config);

    // -----------------------------------------------------------------------
    // 4. Periodic maintenance
    // -----------------------------------------------------------------------

    // Rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    let rl = app_state.rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rl.purge_stale(600.0).await;
        }
    });

    // Expired session cleanup (every 10 minutes)
    let db = app_state.db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(600));
        loop {
            interval.tick().await;
            if let Err(e) = db.lock().await.purge_expired_sessions(chrono::Utc::now()) {
                tracing::warn!(error = %e, "Session purge failed");
            }
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP API stopped with an error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, stopping node");
        }
    }

    Ok(())
}
