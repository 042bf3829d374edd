//! HTTP and WebSocket message types.
//!
//! Request bodies accept the field names older tooling used (`profile`,
//! `scenario`, `ip_address`) as aliases.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AggregateMetrics, Platform, TestResult, TestStatus};

// ── Control API ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetProfileRequest {
    #[serde(alias = "profile")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunScenarioRequest {
    #[serde(alias = "scenario")]
    pub name: String,
}

/// Snapshot of the network controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub current_profile: String,
    pub active_scenario: Option<String>,
    /// Index of the step the running scenario is on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_step: Option<usize>,
    pub available_profiles: Vec<String>,
    pub available_scenarios: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileApplied {
    pub status: String,
    pub profile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioStarted {
    pub status: String,
    pub scenario: String,
}

/// Body of `POST /register`. A missing `peer_id` is reported as a
/// validation error rather than a decode error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPeerRequest {
    #[serde(default)]
    pub peer_id: String,
    pub platform: Platform,
    #[serde(alias = "ip_address")]
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub battery_level: Option<u8>,
    #[serde(default)]
    pub network_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPeerResponse {
    pub status: String,
    pub peer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".into(),
        }
    }
}

/// Error body rendered by both services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// ── Collector API ───────────────────────────────────────────────────

/// Body of `POST /results`. Everything is optional on the wire so that
/// missing required fields can be reported by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestResultInput {
    pub test_name: Option<String>,
    pub platform: Option<Platform>,
    pub status: Option<TestStatus>,
    pub execution_time: Option<f64>,
    pub battery_impact: Option<f64>,
    pub mesh_stability: Option<f64>,
    pub network_recovery_time: Option<f64>,
    pub recovery_success: Option<bool>,
}

impl From<TestResult> for TestResultInput {
    fn from(r: TestResult) -> Self {
        Self {
            test_name: Some(r.test_name),
            platform: Some(r.platform),
            status: Some(r.status),
            execution_time: Some(r.execution_time),
            battery_impact: r.battery_impact,
            mesh_stability: r.mesh_stability,
            network_recovery_time: r.network_recovery_time,
            recovery_success: r.recovery_success,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResultResponse {
    pub status: String,
    pub total_tests: u64,
}

/// Full history plus the current aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub results: Vec<TestResult>,
    pub metrics: AggregateMetrics,
}

/// On-disk snapshot, fully rewritten after every ingested result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub results: Vec<TestResult>,
    pub metrics: AggregateMetrics,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformSummary {
    pub count: usize,
    /// Percentage of passed results, 0–100.
    pub success_rate: f64,
    /// Mean over results that reported a battery impact.
    pub average_battery_impact: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilitySummary {
    pub samples: usize,
    pub average: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoverySummary {
    pub samples: usize,
    pub average_recovery_time: Option<f64>,
    /// Percentage of results with `recovery_success == true` among those
    /// that reported it.
    pub success_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MobileMetricsReport {
    pub platforms: BTreeMap<Platform, PlatformSummary>,
    pub mesh_stability: StabilitySummary,
    pub network_recovery: RecoverySummary,
}

// ── Observer stream ─────────────────────────────────────────────────

/// Messages pushed to live observers over `/ws`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum CollectorEvent {
    /// Baseline sent once on connect.
    #[serde(rename = "metrics.snapshot")]
    Snapshot(AggregateMetrics),

    #[serde(rename = "result.submitted")]
    ResultSubmitted {
        result: TestResult,
        metrics: AggregateMetrics,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_request_accepts_legacy_field() {
        let req: SetProfileRequest = serde_json::from_str(r#"{"profile":"3g"}"#).unwrap();
        assert_eq!(req.name, "3g");
        let req: SetProfileRequest = serde_json::from_str(r#"{"name":"4g"}"#).unwrap();
        assert_eq!(req.name, "4g");
    }

    #[test]
    fn register_request_without_peer_id_decodes_empty() {
        let req: RegisterPeerRequest = serde_json::from_str(
            r#"{"platform":"ios","ip_address":"10.0.0.5","port":7777}"#,
        )
        .unwrap();
        assert!(req.peer_id.is_empty());
        assert_eq!(req.address, "10.0.0.5");
        assert_eq!(req.battery_level, None);
    }

    #[test]
    fn collector_event_tagged_serialization() {
        let event = CollectorEvent::Snapshot(AggregateMetrics::default());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "metrics.snapshot");
        assert_eq!(json["payload"]["total_tests"], 0);

        let recovered: CollectorEvent = serde_json::from_value(json).unwrap();
        match recovered {
            CollectorEvent::Snapshot(m) => assert_eq!(m.total_tests, 0),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn result_input_tolerates_missing_fields() {
        let input: TestResultInput = serde_json::from_str(r#"{"test_name":"sync"}"#).unwrap();
        assert_eq!(input.test_name.as_deref(), Some("sync"));
        assert!(input.platform.is_none());
        assert!(input.status.is_none());
    }
}
