/// Restore driver
///
/// Feeds a previously produced artifact back into the live container's
/// database. SQLite files are removed first so the replay amounts to a full
/// replace; Postgres replays are NOT idempotent and expect an empty target
/// (the runner warns the operator before acting).

use std::path::Path;

use crate::core::docker::DockerManager;
use crate::core::error::ServiceError;
use crate::core::inference::{DatabaseEngine, ServiceDescriptor};

/// The in-container client command the artifact gets piped into
pub fn restore_command(engine: &DatabaseEngine) -> Vec<String> {
    match engine {
        DatabaseEngine::Postgres { database, user, .. } => vec![
            "psql".to_string(),
            "-U".to_string(),
            user.clone(),
            "-d".to_string(),
            database.clone(),
        ],
        DatabaseEngine::SqliteFile { file_path, .. } => {
            vec!["sqlite3".to_string(), file_path.clone()]
        }
    }
}

pub struct RestoreDriver<'a> {
    docker: &'a DockerManager,
}

impl<'a> RestoreDriver<'a> {
    pub fn new(docker: &'a DockerManager) -> Self {
        Self { docker }
    }

    pub async fn restore(
        &self,
        desc: &ServiceDescriptor,
        artifact: &Path,
    ) -> Result<(), ServiceError> {
        if !artifact.is_file() {
            return Err(ServiceError::MissingArtifact(
                artifact.display().to_string(),
            ));
        }

        let container = desc.engine.container();

        let running = self
            .docker
            .container_running(container)
            .await
            .map_err(|e| ServiceError::ExecutionFailure(e.to_string()))?;
        if !running {
            return Err(ServiceError::ContainerNotRunning(container.to_string()));
        }

        if let DatabaseEngine::SqliteFile { file_path, .. } = &desc.engine {
            // Best effort: a failed removal is tolerated, the pipe below
            // still rebuilds the schema on top
            self.docker
                .exec_best_effort(container, &["rm", "-f", file_path])
                .await;
        }

        let cmd = restore_command(&desc.engine);
        let cmd_refs: Vec<&str> = cmd.iter().map(|s| s.as_str()).collect();

        let outcome = self
            .docker
            .exec_with_stdin(container, &cmd_refs, artifact)
            .await
            .map_err(|e| ServiceError::ExecutionFailure(e.to_string()))?;

        if !outcome.success {
            return Err(ServiceError::ExecutionFailure(format!(
                "restore exited non-zero: {}",
                outcome.stderr
            )));
        }

        Ok(())
    }
}
