/// Docker and Docker Compose integration
///
/// Thin layer over the Docker daemon (container lookup via bollard) and the
/// `docker` CLI (compose rendering, exec with captured stdout / fed stdin).

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use bollard::container::ListContainersOptions;
use bollard::Docker;
use serde_yaml::Value;
use tokio::process::Command;

use crate::utils::ContainerState;

/// Result of one command executed inside a container
#[derive(Debug)]
pub struct ExecOutcome {
    pub success: bool,
    pub stderr: String,
}

#[derive(Clone)]
pub struct DockerManager {
    docker: Docker,
}

impl DockerManager {
    pub fn new() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .context("Failed to connect to Docker daemon. Is Docker running?")?;

        Ok(Self { docker })
    }

    /// Check if Docker daemon is accessible
    pub async fn check_docker(&self) -> Result<bool> {
        match self.docker.ping().await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// Whether a container with exactly this name is currently running
    pub async fn container_running(&self, name: &str) -> Result<bool> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![name.to_string()]);

        // The name filter matches substrings; verify exact name and state
        let options = Some(ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        });

        let containers = self.docker.list_containers(options).await?;

        Ok(containers.into_iter().any(|c| {
            let exact = c
                .names
                .as_ref()
                .map(|names| names.iter().any(|n| n.trim_start_matches('/') == name))
                .unwrap_or(false);
            let running = c
                .state
                .as_deref()
                .map(|s| ContainerState::from(s).is_running())
                .unwrap_or(false);
            exact && running
        }))
    }

    /// Execute a `docker compose` subcommand in a service directory
    pub async fn compose_command(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("docker")
            .arg("compose")
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute docker compose command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Docker compose command failed: {}", stderr);
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Fully variable-resolved rendering of the service directory's compose
    /// file, parsed as YAML. None when the resolver is unavailable or the
    /// file does not interpolate cleanly; callers degrade to .env fallback.
    pub async fn resolve_descriptor(&self, dir: &Path) -> Option<Value> {
        let rendered = self.compose_command(dir, &["config"]).await.ok()?;
        serde_yaml::from_str(&rendered).ok()
    }

    /// Container name of a compose service in this directory, if it has one
    /// up or created (used for the conventional `db` service fallback)
    pub async fn compose_service_container(&self, dir: &Path, service: &str) -> Option<String> {
        let output = self
            .compose_command(dir, &["ps", "--all", "--format", "{{.Names}}", service])
            .await
            .ok()?;

        output
            .lines()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .map(|l| l.to_string())
    }

    /// Run a command inside a container, streaming its stdout to a file
    pub async fn exec_to_file(
        &self,
        container: &str,
        cmd: &[&str],
        out_path: &Path,
    ) -> Result<ExecOutcome> {
        let out_file = std::fs::File::create(out_path)
            .with_context(|| format!("Failed to create {}", out_path.display()))?;

        let output = Command::new("docker")
            .arg("exec")
            .arg(container)
            .args(cmd)
            .stdout(Stdio::from(out_file))
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute docker exec")?;

        Ok(ExecOutcome {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Run a command inside a container with its stdin fed from a file
    pub async fn exec_with_stdin(
        &self,
        container: &str,
        cmd: &[&str],
        in_path: &Path,
    ) -> Result<ExecOutcome> {
        let in_file = std::fs::File::open(in_path)
            .with_context(|| format!("Failed to open {}", in_path.display()))?;

        let output = Command::new("docker")
            .arg("exec")
            .arg("-i")
            .arg(container)
            .args(cmd)
            .stdin(Stdio::from(in_file))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute docker exec")?;

        Ok(ExecOutcome {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Run a command inside a container where failure is tolerated
    pub async fn exec_best_effort(&self, container: &str, cmd: &[&str]) -> bool {
        Command::new("docker")
            .arg("exec")
            .arg(container)
            .args(cmd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}
