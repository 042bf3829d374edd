//! meshsim control service
//!
//! Single binary that runs:
//! - the network condition controller (profiles, scenarios) on one interface
//! - the peer mesh registry and its expiry sweep
//! - the HTTP API over both

use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use meshsim_control::config::ControlConfig;
use meshsim_control::registry::PeerRegistry;
use meshsim_control::{api, state};
use meshsim_netem::{Catalog, NetworkController};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = ControlConfig::parse();

    // ── Network controller ──────────────────────────────────────
    let catalog = Catalog::load_or_builtin(&cfg.catalog)?;
    tracing::info!(
        profiles = catalog.profiles().len(),
        scenarios = catalog.scenarios().len(),
        interface = %cfg.interface,
        dry_run = cfg.dry_run,
        "network catalog ready"
    );
    let controller = NetworkController::new(catalog, cfg.shaper(), &cfg.initial_profile);
    let startup_profile = controller.status().await.current_profile;
    if let Err(e) = controller.set_profile(&startup_profile).await {
        tracing::warn!(
            profile = %startup_profile,
            error = %e,
            "could not apply initial profile"
        );
    }

    // ── Peer registry ───────────────────────────────────────────
    let registry = PeerRegistry::with_ttl(cfg.peer_ttl());
    let _expiry = registry.spawn_expiry(cfg.expiry_interval());

    // ── Router ──────────────────────────────────────────────────
    let state = state::AppState::new(controller, registry);
    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // ── Listen ──────────────────────────────────────────────────
    tracing::info!("meshsim-control listening on {}", cfg.listen_addr);
    let listener = tokio::net::TcpListener::bind(cfg.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received SIGINT, shutting down");
        })
        .await?;

    Ok(())
}
