//! Command surface.
//!
//! Provisioning verbs (`start`, `stop`, `restart`, `logs`) go to
//! `docker compose`; query verbs call the control and collector APIs. No
//! command reimplements service logic.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::client::{CollectorClient, ControlClient};
use crate::compose::{Compose, ComposeVerb};

/// meshsim command-line interface.
#[derive(Parser, Debug)]
#[command(name = "meshsim", about = "Mobile mesh resilience harness", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Control service base URL.
    #[arg(long, env = "MESHSIM_CONTROL_URL", default_value = "http://localhost:9090")]
    pub control_url: String,

    /// Collector service base URL.
    #[arg(long, env = "MESHSIM_COLLECTOR_URL", default_value = "http://localhost:3001")]
    pub collector_url: String,

    /// Compose file describing the harness containers.
    #[arg(long, env = "MESHSIM_COMPOSE_FILE", default_value = "docker-compose.yml")]
    pub compose_file: PathBuf,

    /// Compose project name.
    #[arg(long, env = "MESHSIM_COMPOSE_PROJECT")]
    pub compose_project: Option<String>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start the harness containers.
    Start,
    /// Stop and remove the harness containers.
    Stop,
    /// Restart the harness containers.
    Restart,
    /// Show network conditions and mesh health.
    Status,
    /// Run a transition scenario.
    Scenario { name: String },
    /// Apply a single network profile.
    Profile { name: String },
    /// Show container logs, optionally for one service.
    Logs {
        service: Option<String>,
        #[arg(short, long, default_value_t = false)]
        follow: bool,
    },
    /// Show aggregated test metrics.
    Metrics,
}

impl Cli {
    fn compose(&self) -> Compose {
        Compose::new(&self.compose_file, self.compose_project.clone())
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Start => cli.compose().run(ComposeVerb::Up, None).await,
        Commands::Stop => cli.compose().run(ComposeVerb::Down, None).await,
        Commands::Restart => cli.compose().run(ComposeVerb::Restart, None).await,
        Commands::Logs { service, follow } => {
            cli.compose()
                .run(ComposeVerb::Logs { follow: *follow }, service.as_deref())
                .await
        }
        Commands::Status => {
            let control = ControlClient::new(&cli.control_url)?;
            let status = control.status().await?;
            let mesh = control.mesh_status().await?;

            println!("Network");
            println!("  profile:   {}", status.current_profile);
            match (&status.active_scenario, status.scenario_step) {
                (Some(name), Some(step)) => println!("  scenario:  {name} (step {step})"),
                (Some(name), None) => println!("  scenario:  {name}"),
                _ => println!("  scenario:  none"),
            }
            println!("  profiles:  {}", status.available_profiles.join(", "));
            println!("  scenarios: {}", status.available_scenarios.join(", "));
            println!("Mesh");
            println!("  peers:     {}", mesh.connected_peers);
            println!("  health:    {:.2}", mesh.health_score);
            println!("  latency:   {:.0} ms", mesh.estimated_latency_ms);
            Ok(())
        }
        Commands::Scenario { name } => {
            let control = ControlClient::new(&cli.control_url)?;
            let started = control.run_scenario(name).await?;
            println!("scenario '{}' {}", started.scenario, started.status);
            Ok(())
        }
        Commands::Profile { name } => {
            let control = ControlClient::new(&cli.control_url)?;
            let applied = control.set_profile(name).await?;
            println!("profile '{}' applied", applied.profile);
            Ok(())
        }
        Commands::Metrics => {
            let collector = CollectorClient::new(&cli.collector_url)?;
            let results = collector.results().await?;
            let report = collector.mobile_metrics().await?;
            let out = serde_json::json!({
                "metrics": results.metrics,
                "mobile": report,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            Ok(())
        }
    }
}
