//! meshsim metrics collector
//!
//! Ingests test results from distributed agents, keeps running aggregates,
//! persists a snapshot after every result and streams updates to observers.

use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use meshsim_collector::config::CollectorConfig;
use meshsim_collector::{api, Collector, SnapshotStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = CollectorConfig::parse();

    // ── Collector ───────────────────────────────────────────────
    let store = SnapshotStore::new(&cfg.snapshot_path);
    let collector = if cfg.no_restore {
        Collector::new(Some(store))
    } else {
        match store.load().await {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    results = snapshot.results.len(),
                    last_updated = %snapshot.last_updated,
                    "restored metrics snapshot"
                );
                Collector::restore(snapshot, Some(store))
            }
            Ok(None) => Collector::new(Some(store)),
            Err(e) => {
                tracing::warn!(error = %e, "could not restore metrics snapshot, starting empty");
                Collector::new(Some(store))
            }
        }
    };

    // ── Router ──────────────────────────────────────────────────
    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(collector);

    // ── Listen ──────────────────────────────────────────────────
    tracing::info!("meshsim-collector listening on {}", cfg.listen_addr);
    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received SIGINT, shutting down");
        })
        .await?;

    Ok(())
}
