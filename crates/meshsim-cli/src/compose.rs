//! Provisioning verbs, delegated to `docker compose`.

use std::path::PathBuf;

use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeVerb {
    Up,
    Down,
    Restart,
    Logs { follow: bool },
}

#[derive(Debug, Clone)]
pub struct Compose {
    file: PathBuf,
    project: Option<String>,
}

impl Compose {
    pub fn new(file: impl Into<PathBuf>, project: Option<String>) -> Self {
        Self {
            file: file.into(),
            project,
        }
    }

    /// Arguments passed to `docker`, optionally narrowed to one service.
    pub fn args(&self, verb: ComposeVerb, service: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-f".to_string(),
            self.file.display().to_string(),
        ];
        if let Some(project) = &self.project {
            args.extend(["-p".to_string(), project.clone()]);
        }
        match verb {
            ComposeVerb::Up => args.extend(["up".to_string(), "-d".to_string()]),
            ComposeVerb::Down => args.push("down".to_string()),
            ComposeVerb::Restart => args.push("restart".to_string()),
            ComposeVerb::Logs { follow } => {
                args.push("logs".to_string());
                if follow {
                    args.push("--follow".to_string());
                }
            }
        }
        if let Some(service) = service {
            args.push(service.to_string());
        }
        args
    }

    /// Runs the verb with inherited stdio and fails on a nonzero exit.
    pub async fn run(&self, verb: ComposeVerb, service: Option<&str>) -> anyhow::Result<()> {
        let args = self.args(verb, service);
        tracing::debug!(args = ?args, "running docker");
        let status = Command::new("docker").args(&args).status().await?;
        if !status.success() {
            anyhow::bail!("`docker {}` exited with {status}", args.join(" "));
        }
        Ok(())
    }
}
