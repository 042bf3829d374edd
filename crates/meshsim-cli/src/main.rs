//! meshsim command-line interface
//!
//! Thin dispatch over `docker compose` and the harness HTTP APIs.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use meshsim_cli::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    cli::run(Cli::parse()).await
}
