//! Traffic-shaping backends.
//!
//! The controller only ever talks to [`TrafficShaper`]; the kernel `tc`
//! backend, the log-only dry-run backend and the recording backend used in
//! tests are interchangeable behind it.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use meshsim_common::models::NetworkProfile;
use tokio::process::Command;
use tokio::time::Instant;

use crate::impairment::{apply_args, clear_args, ImpairmentConfig};

#[derive(Debug, thiserror::Error)]
pub enum ShapingError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("{0}")]
    Backend(String),
}

/// Capability to emulate a network profile on some path.
///
/// `apply` is always preceded by `clear` so backends never have to merge
/// rules with a previous profile.
#[async_trait]
pub trait TrafficShaper: Send + Sync + 'static {
    async fn apply(&self, profile: &NetworkProfile) -> Result<(), ShapingError>;

    async fn clear(&self) -> Result<(), ShapingError>;
}

// ── tc / netem ──────────────────────────────────────────────────────

/// Shapes a Linux interface with `tc` (HTB for rate, netem for
/// delay/jitter/loss), optionally inside a network namespace.
#[derive(Debug, Clone)]
pub struct TcShaper {
    interface: String,
    netns: Option<String>,
    sudo: bool,
}

impl TcShaper {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            netns: None,
            sudo: false,
        }
    }

    /// Run every `tc` call through `ip netns exec <name>`.
    pub fn in_namespace(mut self, netns: impl Into<String>) -> Self {
        self.netns = Some(netns.into());
        self
    }

    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Full argv for one `tc` call, including the sudo/netns prefix.
    fn argv(&self, tc_args: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(tc_args.len() + 6);
        if self.sudo {
            argv.push("sudo".to_string());
        }
        if let Some(ns) = &self.netns {
            argv.extend(["ip", "netns", "exec", ns.as_str()].map(String::from));
        }
        argv.push("tc".to_string());
        argv.extend(tc_args.iter().cloned());
        argv
    }

    async fn exec(&self, tc_args: &[String]) -> Result<std::process::Output, ShapingError> {
        let argv = self.argv(tc_args);
        let command = argv.join(" ");
        tracing::debug!(%command, "running tc");
        Command::new(&argv[0])
            .args(&argv[1..])
            .output()
            .await
            .map_err(|source| ShapingError::Spawn { command, source })
    }
}

#[async_trait]
impl TrafficShaper for TcShaper {
    async fn apply(&self, profile: &NetworkProfile) -> Result<(), ShapingError> {
        let config = ImpairmentConfig::from_profile(profile);
        for args in apply_args(&self.interface, &config) {
            let output = self.exec(&args).await?;
            if !output.status.success() {
                return Err(ShapingError::Command {
                    command: self.argv(&args).join(" "),
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), ShapingError> {
        // Deleting a root qdisc that was never installed fails; that is
        // the expected state on first use.
        let output = self.exec(&clear_args(&self.interface)).await?;
        if !output.status.success() {
            tracing::debug!(
                interface = %self.interface,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "no root qdisc to remove"
            );
        }
        Ok(())
    }
}

// ── Dry run ─────────────────────────────────────────────────────────

/// Logs the `tc` commands it would run. Used on hosts without
/// `CAP_NET_ADMIN`.
#[derive(Debug, Clone)]
pub struct DryRunShaper {
    interface: String,
}

impl DryRunShaper {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }
}

#[async_trait]
impl TrafficShaper for DryRunShaper {
    async fn apply(&self, profile: &NetworkProfile) -> Result<(), ShapingError> {
        let config = ImpairmentConfig::from_profile(profile);
        for args in apply_args(&self.interface, &config) {
            tracing::info!(command = %format!("tc {}", args.join(" ")), "dry run");
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), ShapingError> {
        tracing::info!(
            command = %format!("tc {}", clear_args(&self.interface).join(" ")),
            "dry run"
        );
        Ok(())
    }
}

// ── Recording ───────────────────────────────────────────────────────

/// One call observed by a [`RecordingShaper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapingEvent {
    Cleared { at: Instant },
    Applied { profile: String, at: Instant },
}

/// In-memory backend that records every call and can be told to fail.
///
/// Used by tests across the workspace in place of `tc`.
#[derive(Debug, Default)]
pub struct RecordingShaper {
    events: Mutex<Vec<ShapingEvent>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingShaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `apply` of `profile` fail.
    pub fn fail_on(&self, profile: impl Into<String>) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(profile.into());
    }

    pub fn events(&self) -> Vec<ShapingEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Profiles applied so far, in order.
    pub fn applied(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ShapingEvent::Applied { profile, .. } => Some(profile),
                ShapingEvent::Cleared { .. } => None,
            })
            .collect()
    }

    fn push(&self, event: ShapingEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

#[async_trait]
impl TrafficShaper for RecordingShaper {
    async fn apply(&self, profile: &NetworkProfile) -> Result<(), ShapingError> {
        let fails = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&profile.name);
        if fails {
            return Err(ShapingError::Backend(format!(
                "injected failure for profile {}",
                profile.name
            )));
        }
        self.push(ShapingEvent::Applied {
            profile: profile.name.clone(),
            at: Instant::now(),
        });
        Ok(())
    }

    async fn clear(&self) -> Result<(), ShapingError> {
        self.push(ShapingEvent::Cleared { at: Instant::now() });
        Ok(())
    }
}
