//! Peer mesh endpoints.
//!
//! GET  /peers        registered peers (unordered)
//! POST /register     upsert a peer
//! GET  /mesh-status  health snapshot derived from the peer count

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};

use meshsim_common::models::{MeshHealthSnapshot, PeerRecord};
use meshsim_common::protocol::{RegisterPeerRequest, RegisterPeerResponse};

use crate::api::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/peers", get(list_peers))
        .route("/register", post(register_peer))
        .route("/mesh-status", get(mesh_status))
}

async fn list_peers(State(state): State<AppState>) -> Json<Vec<PeerRecord>> {
    Json(state.registry().list_peers().await)
}

async fn register_peer(
    State(state): State<AppState>,
    body: Result<Json<RegisterPeerRequest>, JsonRejection>,
) -> Result<Json<RegisterPeerResponse>, ApiError> {
    let Json(body) = body?;
    let record = state.registry().register(body).await?;

    Ok(Json(RegisterPeerResponse {
        status: "registered".into(),
        peer_id: record.peer_id,
    }))
}

async fn mesh_status(State(state): State<AppState>) -> Json<MeshHealthSnapshot> {
    Json(state.registry().compute_health().await)
}
