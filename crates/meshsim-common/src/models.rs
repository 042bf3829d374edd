//! Data models for the meshsim harness.
//!
//! Profiles and scenarios are loaded once by the control service and never
//! change afterwards. Peers are owned by the mesh registry, test results and
//! aggregates by the collector.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Network profiles ────────────────────────────────────────────────

/// Name of the profile that blocks all traffic instead of shaping it.
pub const OFFLINE_PROFILE: &str = "offline";

/// Emulated link characteristics for the test interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkProfile {
    /// Filled from the catalog key when loaded from a profile file.
    #[serde(default)]
    pub name: String,
    pub bandwidth_mbps: f64,
    pub latency_ms: u32,
    #[serde(default)]
    pub packet_loss_percent: f32,
    #[serde(default)]
    pub jitter_ms: u32,
}

impl NetworkProfile {
    pub fn is_offline(&self) -> bool {
        self.name == OFFLINE_PROFILE
    }

    /// Bandwidth in kbit/s, the unit `tc` rates are expressed in.
    pub fn rate_kbit(&self) -> u64 {
        (self.bandwidth_mbps * 1000.0).round().max(0.0) as u64
    }
}

// ── Scenarios ───────────────────────────────────────────────────────

/// One timed hold of a profile inside a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioStep {
    pub profile: String,
    pub duration_seconds: u64,
}

impl ScenarioStep {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_seconds)
    }
}

/// An ordered list of profile switches. Step order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<ScenarioStep>,
}

impl Scenario {
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(ScenarioStep::duration).sum()
    }
}

// ── Peers ───────────────────────────────────────────────────────────

/// Mobile platform of a simulated mesh participant or test agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    Android,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Ios => write!(f, "ios"),
            Platform::Android => write!(f, "android"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

/// A registered mesh participant. `last_seen` moves on every re-registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub peer_id: String,
    pub platform: Platform,
    pub address: String,
    pub port: u16,
    pub last_seen: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
}

// ── Mesh health ─────────────────────────────────────────────────────

/// Base one-hop latency of the modelled mesh.
pub const MESH_BASE_LATENCY_MS: f64 = 25.0;
/// Coordination overhead added per connected peer.
pub const MESH_PER_PEER_LATENCY_MS: f64 = 5.0;

/// Derived view of mesh quality. Never stored, always recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshHealthSnapshot {
    pub connected_peers: usize,
    pub health_score: f64,
    pub partition_count: usize,
    pub estimated_latency_ms: f64,
}

impl MeshHealthSnapshot {
    /// Tiered score from the connected-peer count.
    pub fn from_peer_count(connected_peers: usize) -> Self {
        let health_score = match connected_peers {
            0 => 0.0,
            1 => 0.4,
            2 => 0.7,
            _ => 0.9,
        };
        Self {
            connected_peers,
            health_score,
            partition_count: usize::from(connected_peers > 0),
            estimated_latency_ms: MESH_BASE_LATENCY_MS
                + connected_peers as f64 * MESH_PER_PEER_LATENCY_MS,
        }
    }
}

// ── Test results ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
}

/// A single test-run outcome reported by a test agent. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub platform: Platform,
    pub status: TestStatus,
    /// Milliseconds.
    pub execution_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_impact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh_stability: Option<f64>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_recovery_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_success: Option<bool>,
}

/// Running statistics over every result ingested so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub average_execution_time: f64,
    pub battery_impact: BTreeMap<Platform, f64>,
    pub mesh_stability: f64,
    pub network_recovery_time: f64,
}
