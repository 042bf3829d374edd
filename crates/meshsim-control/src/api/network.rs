//! Network condition endpoints.
//!
//! GET  /status     current profile, running scenario, catalog names
//! POST /profile    apply a profile (`{"name": "..."}`)
//! POST /scenario   start a scenario (`{"name": "..."}`)
//! GET  /profiles   full profile definitions keyed by name
//! GET  /scenarios  full scenario definitions

use std::collections::BTreeMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use meshsim_common::models::{NetworkProfile, Scenario};
use meshsim_common::protocol::{
    NetworkStatus, ProfileApplied, RunScenarioRequest, ScenarioStarted, SetProfileRequest,
};

use crate::api::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        .route("/profile", post(set_profile))
        .route("/scenario", post(run_scenario))
        .route("/profiles", get(list_profiles))
        .route("/scenarios", get(list_scenarios))
}

async fn get_status(State(state): State<AppState>) -> Json<NetworkStatus> {
    Json(state.controller().status().await)
}

async fn set_profile(
    State(state): State<AppState>,
    body: Result<Json<SetProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileApplied>, ApiError> {
    let Json(body) = body?;
    state.controller().set_profile(&body.name).await?;

    Ok(Json(ProfileApplied {
        status: "success".into(),
        profile: body.name,
    }))
}

/// Returns as soon as the scenario is running; the steps play out in the
/// background.
async fn run_scenario(
    State(state): State<AppState>,
    body: Result<Json<RunScenarioRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ScenarioStarted>), ApiError> {
    let Json(body) = body?;
    let _run = state.controller().run_scenario(&body.name).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ScenarioStarted {
            status: "started".into(),
            scenario: body.name,
        }),
    ))
}

async fn list_profiles(State(state): State<AppState>) -> Json<BTreeMap<String, NetworkProfile>> {
    Json(state.controller().catalog().profiles().clone())
}

async fn list_scenarios(State(state): State<AppState>) -> Json<Vec<Scenario>> {
    Json(state.controller().catalog().scenarios().to_vec())
}
