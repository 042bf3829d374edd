//! Command-line / environment configuration for the collector service.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// meshsim metrics collector.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "meshsim-collector",
    about = "Test-result aggregation with live observers"
)]
pub struct CollectorConfig {
    /// HTTP listen address.
    #[arg(long, env = "MESHSIM_COLLECTOR_LISTEN_ADDR", default_value = "0.0.0.0:3001")]
    pub listen_addr: SocketAddr,

    /// Snapshot file rewritten after every ingested result.
    #[arg(
        long,
        env = "MESHSIM_SNAPSHOT_PATH",
        default_value = "test-results/metrics.json"
    )]
    pub snapshot_path: PathBuf,

    /// Start empty instead of reloading the previous snapshot.
    #[arg(long, env = "MESHSIM_NO_RESTORE", default_value_t = false)]
    pub no_restore: bool,
}
