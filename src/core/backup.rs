/// Backup driver
///
/// Runs the engine-appropriate logical dump inside the live container and
/// writes the timestamped artifact under `{dest}/{service}/`. A failed dump
/// leaves the partial file behind for inspection but reports the failure.

use std::path::PathBuf;

use crate::core::docker::DockerManager;
use crate::core::error::ServiceError;
use crate::core::inference::{DatabaseEngine, ServiceDescriptor};
use crate::utils::{artifact_path, artifact_timestamp};

/// The in-container dump command for a classified engine
pub fn dump_command(engine: &DatabaseEngine) -> Vec<String> {
    match engine {
        DatabaseEngine::Postgres { database, user, .. } => vec![
            "pg_dump".to_string(),
            "-U".to_string(),
            user.clone(),
            database.clone(),
        ],
        DatabaseEngine::SqliteFile { file_path, .. } => vec![
            "sqlite3".to_string(),
            file_path.clone(),
            ".dump".to_string(),
        ],
    }
}

pub struct BackupDriver<'a> {
    docker: &'a DockerManager,
    dest_root: PathBuf,
}

impl<'a> BackupDriver<'a> {
    pub fn new(docker: &'a DockerManager, dest_root: PathBuf) -> Self {
        Self { docker, dest_root }
    }

    /// Dump one classified service; returns the artifact path on success
    pub async fn backup(&self, desc: &ServiceDescriptor) -> Result<PathBuf, ServiceError> {
        let container = desc.engine.container();

        let running = self
            .docker
            .container_running(container)
            .await
            .map_err(|e| ServiceError::ExecutionFailure(e.to_string()))?;
        if !running {
            return Err(ServiceError::ContainerNotRunning(container.to_string()));
        }

        let service_dest = self.dest_root.join(&desc.name);
        std::fs::create_dir_all(&service_dest)?;

        let artifact = artifact_path(&self.dest_root, &desc.name, &artifact_timestamp());

        let cmd = dump_command(&desc.engine);
        let cmd_refs: Vec<&str> = cmd.iter().map(|s| s.as_str()).collect();

        let outcome = self
            .docker
            .exec_to_file(container, &cmd_refs, &artifact)
            .await
            .map_err(|e| ServiceError::ExecutionFailure(e.to_string()))?;

        if !outcome.success {
            // Partial artifact stays on disk for forensics
            return Err(ServiceError::ExecutionFailure(format!(
                "dump exited non-zero (partial file kept at {}): {}",
                artifact.display(),
                outcome.stderr
            )));
        }

        let size = std::fs::metadata(&artifact)?.len();
        if size == 0 {
            return Err(ServiceError::ExecutionFailure(format!(
                "dump produced an empty file at {}",
                artifact.display()
            )));
        }

        Ok(artifact)
    }
}
