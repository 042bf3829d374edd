//! Static catalog of network profiles and transition scenarios.
//!
//! Loaded once at startup, read-only afterwards. Files use the layout the
//! network simulator has always read from `/etc/network-sim`:
//!
//! ```json
//! {
//!   "network_profiles": { "wifi": { "bandwidth_mbps": 100, "latency_ms": 5 } },
//!   "transition_scenarios": [
//!     { "name": "commute", "steps": [ { "profile": "wifi", "duration_seconds": 30 } ] }
//!   ]
//! }
//! ```
//!
//! The same shape is accepted as TOML when the file ends in `.toml`.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use meshsim_common::models::{NetworkProfile, Scenario, ScenarioStep, OFFLINE_PROFILE};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML catalog: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("catalog defines no network profiles")]
    Empty,

    #[error("scenario '{scenario}' references unknown profile '{profile}'")]
    UnknownProfile { scenario: String, profile: String },

    #[error("scenario '{0}' is defined more than once")]
    DuplicateScenario(String),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    network_profiles: BTreeMap<String, NetworkProfile>,
    #[serde(default)]
    transition_scenarios: Vec<Scenario>,
}

/// Validated set of profiles and scenarios.
#[derive(Debug, Clone)]
pub struct Catalog {
    profiles: BTreeMap<String, NetworkProfile>,
    scenarios: Vec<Scenario>,
}

impl Catalog {
    /// Every scenario step must name a profile in the catalog, so a running
    /// scenario can never hit an unknown profile.
    pub fn new(
        profiles: impl IntoIterator<Item = NetworkProfile>,
        scenarios: Vec<Scenario>,
    ) -> Result<Self, CatalogError> {
        let profiles: BTreeMap<String, NetworkProfile> = profiles
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        if profiles.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for scenario in &scenarios {
            if !seen.insert(scenario.name.as_str()) {
                return Err(CatalogError::DuplicateScenario(scenario.name.clone()));
            }
            if let Some(step) = scenario
                .steps
                .iter()
                .find(|s| !profiles.contains_key(&s.profile))
            {
                return Err(CatalogError::UnknownProfile {
                    scenario: scenario.name.clone(),
                    profile: step.profile.clone(),
                });
            }
        }

        Ok(Self {
            profiles,
            scenarios,
        })
    }

    /// Reads a JSON or TOML catalog file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file: CatalogFile = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&text)?,
            _ => serde_json::from_str(&text)?,
        };
        Self::from_file(file)
    }

    /// Loads `path`, falling back to [`Catalog::builtin`] when the file is
    /// missing or cannot be read. A file that reads but does not parse or
    /// validate is still an error.
    pub fn load_or_builtin(path: &Path) -> Result<Self, CatalogError> {
        match Self::load(path) {
            Ok(catalog) => {
                tracing::info!(
                    path = %path.display(),
                    profiles = catalog.profiles.len(),
                    scenarios = catalog.scenarios.len(),
                    "loaded network catalog"
                );
                Ok(catalog)
            }
            Err(CatalogError::Io { path, source }) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "network catalog unreadable, using built-in profiles"
                );
                Ok(Self::builtin())
            }
            Err(e) => Err(e),
        }
    }

    fn from_file(file: CatalogFile) -> Result<Self, CatalogError> {
        let profiles = file.network_profiles.into_iter().map(|(name, mut p)| {
            p.name = name;
            p
        });
        Self::new(profiles, file.transition_scenarios)
    }

    /// Mobile connectivity presets and a few common transition scenarios.
    pub fn builtin() -> Self {
        let profile = |name: &str, mbps: f64, latency: u32, loss: f32, jitter: u32| {
            NetworkProfile {
                name: name.into(),
                bandwidth_mbps: mbps,
                latency_ms: latency,
                packet_loss_percent: loss,
                jitter_ms: jitter,
            }
        };
        let scenario = |name: &str, description: &str, steps: &[(&str, u64)]| Scenario {
            name: name.into(),
            description: Some(description.into()),
            steps: steps
                .iter()
                .map(|(p, d)| ScenarioStep {
                    profile: (*p).into(),
                    duration_seconds: *d,
                })
                .collect(),
        };

        let profiles = vec![
            profile("wifi", 100.0, 5, 0.1, 1),
            profile("5g", 50.0, 15, 0.5, 3),
            profile("4g", 20.0, 30, 1.0, 5),
            profile("3g", 5.0, 100, 2.0, 20),
            profile("edge", 0.5, 500, 5.0, 50),
            profile(OFFLINE_PROFILE, 0.0, 0, 100.0, 0),
        ];
        let scenarios = vec![
            scenario(
                "commute",
                "Leave home wifi, ride through cellular coverage, lose signal in a tunnel",
                &[
                    ("wifi", 30),
                    ("4g", 120),
                    ("3g", 60),
                    (OFFLINE_PROFILE, 15),
                    ("wifi", 45),
                ],
            ),
            scenario(
                "elevator",
                "Short total outage between two cellular segments",
                &[("4g", 20), ("edge", 10), (OFFLINE_PROFILE, 30), ("4g", 20)],
            ),
            scenario(
                "degrading_signal",
                "Steady decline from wifi to no connectivity",
                &[
                    ("wifi", 60),
                    ("5g", 60),
                    ("4g", 60),
                    ("3g", 60),
                    ("edge", 60),
                    (OFFLINE_PROFILE, 30),
                ],
            ),
        ];

        Self {
            profiles: profiles.into_iter().map(|p| (p.name.clone(), p)).collect(),
            scenarios,
        }
    }

    pub fn profile(&self, name: &str) -> Option<&NetworkProfile> {
        self.profiles.get(name)
    }

    pub fn scenario(&self, name: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    pub fn profiles(&self) -> &BTreeMap<String, NetworkProfile> {
        &self.profiles
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn profile_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    pub fn scenario_names(&self) -> Vec<String> {
        self.scenarios.iter().map(|s| s.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn builtin_catalog_is_consistent() {
        let builtin = Catalog::builtin();
        let rebuilt = Catalog::new(
            builtin.profiles().values().cloned(),
            builtin.scenarios().to_vec(),
        )
        .unwrap();
        assert_eq!(rebuilt.profile_names(), builtin.profile_names());
        assert!(builtin.profile(OFFLINE_PROFILE).unwrap().is_offline());
        assert_eq!(
            builtin.scenario("commute").unwrap().total_duration(),
            Duration::from_secs(270)
        );
    }

    #[test]
    fn scenario_step_order_is_preserved() {
        let builtin = Catalog::builtin();
        let order: Vec<&str> = builtin
            .scenario("commute")
            .unwrap()
            .steps
            .iter()
            .map(|s| s.profile.as_str())
            .collect();
        assert_eq!(order, vec!["wifi", "4g", "3g", "offline", "wifi"]);
    }

    #[test]
    fn loads_json_file_and_names_profiles_from_keys() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "network_profiles": {{
                    "wifi": {{ "bandwidth_mbps": 100, "latency_ms": 5 }},
                    "offline": {{ "bandwidth_mbps": 0, "latency_ms": 0 }}
                }},
                "transition_scenarios": [
                    {{ "name": "blip", "steps": [
                        {{ "profile": "wifi", "duration_seconds": 10 }},
                        {{ "profile": "offline", "duration_seconds": 5 }}
                    ] }}
                ]
            }}"#
        )
        .unwrap();

        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.profile_names(), vec!["offline", "wifi"]);
        assert_eq!(catalog.profile("wifi").unwrap().name, "wifi");
        assert_eq!(catalog.profile("wifi").unwrap().jitter_ms, 0);
        assert_eq!(catalog.scenario_names(), vec!["blip"]);
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[network_profiles.lte]
bandwidth_mbps = 20.0
latency_ms = 30
packet_loss_percent = 1.0

[[transition_scenarios]]
name = "steady"
steps = [{{ profile = "lte", duration_seconds = 60 }}]
"#
        )
        .unwrap();

        let catalog = Catalog::load(file.path()).unwrap();
        assert_eq!(catalog.profile("lte").unwrap().latency_ms, 30);
        assert_eq!(catalog.scenario("steady").unwrap().steps.len(), 1);
    }

    #[test]
    fn rejects_scenario_with_unknown_profile() {
        let err = Catalog::new(
            Catalog::builtin().profiles().values().cloned(),
            vec![Scenario {
                name: "bad".into(),
                description: None,
                steps: vec![ScenarioStep {
                    profile: "satellite".into(),
                    duration_seconds: 10,
                }],
            }],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::UnknownProfile { ref profile, .. } if profile == "satellite"));
    }

    #[test]
    fn rejects_duplicate_scenarios_and_empty_catalogs() {
        let commute = Catalog::builtin().scenario("commute").unwrap().clone();
        let err = Catalog::new(
            Catalog::builtin().profiles().values().cloned(),
            vec![commute.clone(), commute],
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateScenario(_)));

        assert!(matches!(
            Catalog::new(Vec::new(), Vec::new()),
            Err(CatalogError::Empty)
        ));
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load_or_builtin(&dir.path().join("absent.json")).unwrap();
        assert!(catalog.scenario("commute").is_some());
    }

    #[test]
    fn unreadable_path_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load_or_builtin(dir.path()).unwrap();
        assert_eq!(catalog.profiles().len(), Catalog::builtin().profiles().len());
        assert!(catalog.profile("wifi").is_some());

        assert!(matches!(
            Catalog::load(dir.path()),
            Err(CatalogError::Io { .. })
        ));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            Catalog::load_or_builtin(file.path()),
            Err(CatalogError::Json(_))
        ));
    }
}
