//! HTTP route tree.
//!
//! POST /results         submit one test result
//! GET  /results         full history plus the running aggregate
//! GET  /mobile-metrics  per-platform and recovery summaries
//! GET  /health          liveness probe
//! GET  /ws              live observer stream

pub mod error;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use meshsim_common::protocol::{
    HealthResponse, MobileMetricsReport, ResultsResponse, SubmitResultResponse, TestResultInput,
};

use crate::collector::Collector;
use crate::ws;

pub use error::ApiError;

pub fn router() -> Router<Collector> {
    Router::new()
        .route("/results", get(list_results).post(submit_result))
        .route("/mobile-metrics", get(mobile_metrics))
        .route("/health", get(health))
        .route("/ws", get(ws::handler))
}

async fn submit_result(
    State(collector): State<Collector>,
    body: Result<Json<TestResultInput>, JsonRejection>,
) -> Result<Json<SubmitResultResponse>, ApiError> {
    let Json(body) = body?;
    let metrics = collector.submit_result(body).await?;

    Ok(Json(SubmitResultResponse {
        status: "success".into(),
        total_tests: metrics.total_tests,
    }))
}

async fn list_results(State(collector): State<Collector>) -> Json<ResultsResponse> {
    Json(collector.query_results().await)
}

async fn mobile_metrics(State(collector): State<Collector>) -> Json<MobileMetricsReport> {
    Json(collector.query_mobile_metrics().await)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
