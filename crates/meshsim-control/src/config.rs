//! Command-line / environment configuration for the control service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use meshsim_netem::shaper::{DryRunShaper, TcShaper};
use meshsim_netem::TrafficShaper;

/// meshsim control service.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "meshsim-control",
    about = "Network condition controller and peer mesh registry"
)]
pub struct ControlConfig {
    /// HTTP listen address.
    #[arg(long, env = "MESHSIM_LISTEN_ADDR", default_value = "0.0.0.0:9090")]
    pub listen_addr: SocketAddr,

    /// Interface the profiles are applied to.
    #[arg(long, env = "MESHSIM_INTERFACE", default_value = "eth0")]
    pub interface: String,

    /// Run `tc` inside this network namespace.
    #[arg(long, env = "MESHSIM_NETNS")]
    pub netns: Option<String>,

    /// Prefix `tc` invocations with sudo.
    #[arg(long, env = "MESHSIM_SUDO", default_value_t = false)]
    pub sudo: bool,

    /// Profile/scenario catalog (JSON or TOML). Built-in profiles are used
    /// when the file does not exist.
    #[arg(
        long,
        env = "MESHSIM_CATALOG",
        default_value = "/etc/network-sim/network-profiles.json"
    )]
    pub catalog: PathBuf,

    /// Profile applied at startup.
    #[arg(long, env = "MESHSIM_INITIAL_PROFILE", default_value = "wifi")]
    pub initial_profile: String,

    /// Log the shaping commands instead of running them.
    #[arg(long, env = "MESHSIM_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,

    /// Seconds after which an unrefreshed peer is dropped.
    #[arg(long, env = "MESHSIM_PEER_TTL_SECS", default_value_t = 120)]
    pub peer_ttl_secs: u64,

    /// Seconds between expiry sweeps.
    #[arg(long, env = "MESHSIM_EXPIRY_INTERVAL_SECS", default_value_t = 30)]
    pub expiry_interval_secs: u64,
}

impl ControlConfig {
    pub fn shaper(&self) -> Arc<dyn TrafficShaper> {
        if self.dry_run {
            return Arc::new(DryRunShaper::new(&self.interface));
        }
        let mut tc = TcShaper::new(&self.interface).with_sudo(self.sudo);
        if let Some(ns) = &self.netns {
            tc = tc.in_namespace(ns);
        }
        Arc::new(tc)
    }

    pub fn peer_ttl(&self) -> Duration {
        Duration::from_secs(self.peer_ttl_secs)
    }

    pub fn expiry_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_interval_secs.max(1))
    }
}
