//! Network condition controller.
//!
//! Holds the single active profile and the single running scenario. Every
//! profile change clears the shaper before applying, so rules from an
//! earlier profile never accumulate.
//!
//! State machine:
//!
//! ```text
//! Idle ──run_scenario──▶ Running(name, 0) ──step──▶ Running(name, i+1)
//!   ▲                         │
//!   └──── last step done / shaping failure ──┘
//! ```
//!
//! A manual `set_profile` while a scenario runs is allowed; the next step
//! boundary overrides it.

use std::sync::Arc;

use meshsim_common::models::{Scenario, OFFLINE_PROFILE};
use meshsim_common::protocol::NetworkStatus;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::catalog::Catalog;
use crate::shaper::{ShapingError, TrafficShaper};

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("unknown profile: {0}")]
    ProfileNotFound(String),

    #[error("unknown scenario: {0}")]
    ScenarioNotFound(String),

    #[error("scenario '{active}' is already running")]
    ScenarioConflict { active: String },

    #[error("failed to apply profile '{profile}': {source}")]
    Shaping {
        profile: String,
        #[source]
        source: ShapingError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioState {
    Idle,
    Running { name: String, step_index: usize },
}

/// How a scenario run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Completed {
        scenario: String,
    },
    Aborted {
        scenario: String,
        step_index: usize,
        error: String,
    },
}

#[derive(Debug)]
struct ControllerState {
    current_profile: String,
    scenario: ScenarioState,
}

struct Inner {
    catalog: Catalog,
    shaper: Arc<dyn TrafficShaper>,
    state: Mutex<ControllerState>,
}

/// Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct NetworkController {
    inner: Arc<Inner>,
}

impl NetworkController {
    /// `initial_profile` is only recorded, not applied. Call
    /// [`set_profile`](Self::set_profile) to push it to the shaper.
    ///
    /// A name the catalog does not define is replaced by the first
    /// non-offline profile in name order.
    pub fn new(catalog: Catalog, shaper: Arc<dyn TrafficShaper>, initial_profile: &str) -> Self {
        let current_profile = if catalog.profile(initial_profile).is_some() {
            initial_profile.to_string()
        } else {
            let fallback = fallback_profile(&catalog);
            tracing::warn!(
                requested = %initial_profile,
                profile = %fallback,
                "initial profile not in catalog, starting from fallback"
            );
            fallback
        };
        Self {
            inner: Arc::new(Inner {
                catalog,
                shaper,
                state: Mutex::new(ControllerState {
                    current_profile,
                    scenario: ScenarioState::Idle,
                }),
            }),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub async fn status(&self) -> NetworkStatus {
        let state = self.inner.state.lock().await;
        let (active_scenario, scenario_step) = match &state.scenario {
            ScenarioState::Idle => (None, None),
            ScenarioState::Running { name, step_index } => (Some(name.clone()), Some(*step_index)),
        };
        NetworkStatus {
            current_profile: state.current_profile.clone(),
            active_scenario,
            scenario_step,
            available_profiles: self.inner.catalog.profile_names(),
            available_scenarios: self.inner.catalog.scenario_names(),
        }
    }

    pub async fn scenario_state(&self) -> ScenarioState {
        self.inner.state.lock().await.scenario.clone()
    }

    /// Clears the shaper, then applies `name`.
    ///
    /// On failure the interface may be left cleared; `current_profile`
    /// keeps its previous value and the next call starts from a clear again.
    pub async fn set_profile(&self, name: &str) -> Result<(), ControlError> {
        let profile = self
            .inner
            .catalog
            .profile(name)
            .ok_or_else(|| ControlError::ProfileNotFound(name.to_string()))?;

        let mut state = self.inner.state.lock().await;
        let shaping = |source| ControlError::Shaping {
            profile: name.to_string(),
            source,
        };
        self.inner.shaper.clear().await.map_err(shaping)?;
        self.inner.shaper.apply(profile).await.map_err(shaping)?;

        let previous = std::mem::replace(&mut state.current_profile, name.to_string());
        tracing::info!(profile = %name, previous = %previous, "network profile applied");
        Ok(())
    }

    /// Starts `name` in the background.
    ///
    /// The returned handle resolves when the scenario ends; dropping it does
    /// not stop the run.
    pub async fn run_scenario(
        &self,
        name: &str,
    ) -> Result<JoinHandle<ScenarioOutcome>, ControlError> {
        let scenario = self
            .inner
            .catalog
            .scenario(name)
            .cloned()
            .ok_or_else(|| ControlError::ScenarioNotFound(name.to_string()))?;

        {
            let mut state = self.inner.state.lock().await;
            if let ScenarioState::Running { name: active, .. } = &state.scenario {
                return Err(ControlError::ScenarioConflict {
                    active: active.clone(),
                });
            }
            state.scenario = ScenarioState::Running {
                name: scenario.name.clone(),
                step_index: 0,
            };
        }

        tracing::info!(
            scenario = %scenario.name,
            steps = scenario.steps.len(),
            total_secs = scenario.total_duration().as_secs(),
            "scenario started"
        );

        let controller = self.clone();
        Ok(tokio::spawn(async move { controller.drive(scenario).await }))
    }

    async fn drive(&self, scenario: Scenario) -> ScenarioOutcome {
        for (step_index, step) in scenario.steps.iter().enumerate() {
            self.enter_step(step_index).await;

            if let Err(e) = self.set_profile(&step.profile).await {
                tracing::error!(
                    scenario = %scenario.name,
                    step = step_index,
                    error = %e,
                    "scenario aborted"
                );
                self.finish().await;
                return ScenarioOutcome::Aborted {
                    scenario: scenario.name,
                    step_index,
                    error: e.to_string(),
                };
            }

            tracing::debug!(
                scenario = %scenario.name,
                step = step_index,
                profile = %step.profile,
                hold_secs = step.duration_seconds,
                "holding profile"
            );
            tokio::time::sleep(step.duration()).await;
        }

        self.finish().await;
        tracing::info!(scenario = %scenario.name, "scenario completed");
        ScenarioOutcome::Completed {
            scenario: scenario.name,
        }
    }

    async fn enter_step(&self, index: usize) {
        let mut state = self.inner.state.lock().await;
        if let ScenarioState::Running { step_index, .. } = &mut state.scenario {
            *step_index = index;
        }
    }

    async fn finish(&self) {
        self.inner.state.lock().await.scenario = ScenarioState::Idle;
    }
}

fn fallback_profile(catalog: &Catalog) -> String {
    let names = catalog.profile_names();
    names
        .iter()
        .find(|name| name.as_str() != OFFLINE_PROFILE)
        .or_else(|| names.first())
        .cloned()
        .unwrap_or_else(|| OFFLINE_PROFILE.to_string())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use meshsim_common::models::{NetworkProfile, ScenarioStep};
    use tokio::time::Instant;

    use super::*;
    use crate::shaper::{RecordingShaper, ShapingEvent};

    fn profile(name: &str) -> NetworkProfile {
        NetworkProfile {
            name: name.into(),
            bandwidth_mbps: 10.0,
            latency_ms: 20,
            packet_loss_percent: 0.0,
            jitter_ms: 0,
        }
    }

    /// Profiles A–E plus wifi/offline, scenario "walk" = the five-step
    /// sequence, "short" = a single ten-second step.
    fn test_catalog() -> Catalog {
        let step = |p: &str, d: u64| ScenarioStep {
            profile: p.into(),
            duration_seconds: d,
        };
        Catalog::new(
            ["A", "B", "C", "D", "E", "wifi", "offline"].map(profile),
            vec![
                Scenario {
                    name: "walk".into(),
                    description: None,
                    steps: vec![
                        step("A", 30),
                        step("B", 120),
                        step("C", 60),
                        step("D", 15),
                        step("E", 45),
                    ],
                },
                Scenario {
                    name: "short".into(),
                    description: None,
                    steps: vec![step("C", 10)],
                },
            ],
        )
        .unwrap()
    }

    fn controller() -> (NetworkController, Arc<RecordingShaper>) {
        let shaper = Arc::new(RecordingShaper::new());
        let controller = NetworkController::new(test_catalog(), shaper.clone(), "wifi");
        (controller, shaper)
    }

    #[tokio::test]
    async fn status_lists_catalog_and_initial_profile() {
        let (controller, shaper) = controller();
        let status = controller.status().await;
        assert_eq!(status.current_profile, "wifi");
        assert_eq!(status.active_scenario, None);
        assert_eq!(status.available_profiles.len(), 7);
        assert_eq!(status.available_scenarios, vec!["walk", "short"]);
        assert!(shaper.events().is_empty());
    }

    #[tokio::test]
    async fn unknown_initial_profile_falls_back_to_catalog_entry() {
        let shaper = Arc::new(RecordingShaper::new());
        let controller = NetworkController::new(test_catalog(), shaper.clone(), "lte");
        assert_eq!(controller.status().await.current_profile, "A");
        assert!(shaper.events().is_empty());

        let only_lte = Catalog::new([profile("lte")], Vec::new()).unwrap();
        let controller = NetworkController::new(only_lte, shaper, "wifi");
        assert_eq!(controller.status().await.current_profile, "lte");
        controller.set_profile("lte").await.unwrap();
    }

    #[tokio::test]
    async fn offline_is_only_a_last_resort_fallback() {
        let only_offline = Catalog::new([profile(OFFLINE_PROFILE)], Vec::new()).unwrap();
        let controller =
            NetworkController::new(only_offline, Arc::new(RecordingShaper::new()), "wifi");
        assert_eq!(controller.status().await.current_profile, OFFLINE_PROFILE);
    }

    #[tokio::test]
    async fn set_profile_clears_before_every_apply() {
        let (controller, shaper) = controller();
        controller.set_profile("offline").await.unwrap();
        controller.set_profile("wifi").await.unwrap();

        let kinds: Vec<&str> = shaper
            .events()
            .iter()
            .map(|e| match e {
                ShapingEvent::Cleared { .. } => "clear",
                ShapingEvent::Applied { .. } => "apply",
            })
            .collect();
        assert_eq!(kinds, vec!["clear", "apply", "clear", "apply"]);
        assert_eq!(shaper.applied(), vec!["offline", "wifi"]);
        assert_eq!(controller.status().await.current_profile, "wifi");
    }

    #[tokio::test]
    async fn set_profile_unknown_name() {
        let (controller, shaper) = controller();
        let err = controller.set_profile("satellite").await.unwrap_err();
        assert!(matches!(err, ControlError::ProfileNotFound(ref n) if n == "satellite"));
        assert!(shaper.events().is_empty());
    }

    #[tokio::test]
    async fn shaping_failure_keeps_previous_profile_name() {
        let (controller, shaper) = controller();
        shaper.fail_on("B");
        let err = controller.set_profile("B").await.unwrap_err();
        assert!(matches!(err, ControlError::Shaping { .. }));
        assert_eq!(controller.status().await.current_profile, "wifi");
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_steps_run_in_order_with_their_durations() {
        let (controller, shaper) = controller();
        let started = Instant::now();

        let handle = controller.run_scenario("walk").await.unwrap();
        let outcome = handle.await.unwrap();
        assert_eq!(
            outcome,
            ScenarioOutcome::Completed {
                scenario: "walk".into()
            }
        );

        let applied: Vec<(String, Duration)> = shaper
            .events()
            .into_iter()
            .filter_map(|e| match e {
                ShapingEvent::Applied { profile, at } => Some((profile, at - started)),
                ShapingEvent::Cleared { .. } => None,
            })
            .collect();
        let expected = [("A", 0), ("B", 30), ("C", 150), ("D", 210), ("E", 225)];
        assert_eq!(applied.len(), expected.len());
        for ((profile, offset), (want_profile, want_secs)) in applied.iter().zip(expected) {
            assert_eq!(profile, want_profile);
            assert_eq!(offset.as_secs(), want_secs);
        }

        assert_eq!(started.elapsed().as_secs(), 270);
        let status = controller.status().await;
        assert_eq!(status.current_profile, "E");
        assert_eq!(status.active_scenario, None);
    }

    #[tokio::test(start_paused = true)]
    async fn status_tracks_running_step() {
        let (controller, _shaper) = controller();
        let _handle = controller.run_scenario("walk").await.unwrap();

        tokio::time::sleep(Duration::from_secs(40)).await;
        let status = controller.status().await;
        assert_eq!(status.active_scenario.as_deref(), Some("walk"));
        assert_eq!(status.scenario_step, Some(1));
        assert_eq!(status.current_profile, "B");

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(controller.status().await.current_profile, "E");
        assert_eq!(
            controller.scenario_state().await,
            ScenarioState::Running {
                name: "walk".into(),
                step_index: 4
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_scenario_conflicts_until_first_completes() {
        let (controller, _shaper) = controller();
        let handle = controller.run_scenario("short").await.unwrap();

        let err = controller.run_scenario("walk").await.unwrap_err();
        assert!(matches!(err, ControlError::ScenarioConflict { ref active } if active == "short"));

        handle.await.unwrap();
        assert_eq!(controller.scenario_state().await, ScenarioState::Idle);

        let again = controller.run_scenario("walk").await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn unknown_scenario_is_not_found() {
        let (controller, _shaper) = controller();
        let err = controller.run_scenario("hike").await.unwrap_err();
        assert!(matches!(err, ControlError::ScenarioNotFound(_)));
        assert_eq!(controller.scenario_state().await, ScenarioState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn shaping_failure_aborts_remaining_steps() {
        let (controller, shaper) = controller();
        shaper.fail_on("C");
        let started = Instant::now();

        let outcome = controller.run_scenario("walk").await.unwrap().await.unwrap();
        match outcome {
            ScenarioOutcome::Aborted { step_index, .. } => assert_eq!(step_index, 2),
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(shaper.applied(), vec!["A", "B"]);
        assert_eq!(started.elapsed().as_secs(), 150);
        assert_eq!(controller.scenario_state().await, ScenarioState::Idle);
        assert_eq!(controller.status().await.current_profile, "B");
    }
}
