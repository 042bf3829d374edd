//! HTTP route tree.
//!
//! GET  /status       controller status
//! POST /profile      apply a network profile
//! POST /scenario     start a transition scenario
//! GET  /profiles     profile catalog
//! GET  /scenarios    scenario catalog
//! GET  /peers        registered mesh peers
//! POST /register     register or refresh a peer
//! GET  /mesh-status  derived mesh health
//! GET  /health       liveness probe

pub mod error;
pub mod mesh;
pub mod network;

use axum::routing::get;
use axum::{Json, Router};

use meshsim_common::protocol::HealthResponse;

use crate::state::AppState;

pub use error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(network::router())
        .merge(mesh::router())
        .route("/health", get(health))
}

/// Liveness only: answers as long as the process serves requests.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
