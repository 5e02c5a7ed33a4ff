/// Batch runner
///
/// Drives the per-service pipeline (locate → load env → infer → act) one
/// service at a time, in input order. The contract is best effort across the
/// batch: every per-service failure is logged and the loop moves on; only
/// argument-shape errors (handled in the binaries) abort a run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use serde_yaml::Value;

use crate::core::backup::BackupDriver;
use crate::core::docker::DockerManager;
use crate::core::env_file::EnvFile;
use crate::core::error::ServiceError;
use crate::core::inference::{
    find_compose_file, postgres_candidates, recognized_key_synonyms, sqlite_candidates,
    DatabaseEngine, ServiceDescriptor,
};
use crate::core::locate::find_service_candidates;
use crate::core::restore::RestoreDriver;
use crate::utils::count_lines;

/// Per-service outcome category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    SkippedNotFound,
    SkippedNoDatabase,
    SkippedContainerNotRunning,
    Failed,
}

impl RunOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::SkippedNotFound => "skipped (not found)",
            RunOutcome::SkippedNoDatabase => "skipped (no database)",
            RunOutcome::SkippedContainerNotRunning => "skipped (container not running)",
            RunOutcome::Failed => "failed",
        }
    }

    fn glyph(&self) -> &'static str {
        match self {
            RunOutcome::Success => "✓",
            RunOutcome::Failed => "✗",
            _ => "!",
        }
    }
}

/// Which outcome category a per-service error falls into
pub fn outcome_for(error: &ServiceError) -> RunOutcome {
    match error {
        ServiceError::NotFound => RunOutcome::SkippedNotFound,
        ServiceError::NoDescriptor(_) => RunOutcome::SkippedNoDatabase,
        ServiceError::NoDatabase { .. } => RunOutcome::SkippedNoDatabase,
        ServiceError::ContainerNotRunning(_) => RunOutcome::SkippedContainerNotRunning,
        ServiceError::MissingArtifact(_) => RunOutcome::Failed,
        ServiceError::ExecutionFailure(_) => RunOutcome::Failed,
        ServiceError::Io(_) => RunOutcome::Failed,
    }
}

#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub service: String,
    pub outcome: RunOutcome,
    pub detail: Option<String>,
}

/// Progress/warning lines on stderr, prefixed per binary
pub struct Reporter {
    prefix: &'static str,
}

impl Reporter {
    pub fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }

    pub fn info(&self, msg: impl std::fmt::Display) {
        eprintln!("[{}] {}", self.prefix, msg);
    }

    pub fn warn(&self, msg: impl std::fmt::Display) {
        eprintln!("[{}] warning: {}", self.prefix, msg);
    }
}

/// Locate a service, load its env context, and classify its database engine
pub async fn classify_service(
    docker: &DockerManager,
    root: &Path,
    name: &str,
    reporter: &Reporter,
) -> Result<ServiceDescriptor, ServiceError> {
    let candidates = find_service_candidates(root, name);
    let dir = match candidates.first() {
        None => return Err(ServiceError::NotFound),
        Some(dir) => {
            if candidates.len() > 1 {
                reporter.warn(format!(
                    "{} candidates found for '{}', using first: {}",
                    candidates.len(),
                    name,
                    dir.display()
                ));
            }
            dir.clone()
        }
    };

    let compose_file = find_compose_file(&dir)
        .ok_or_else(|| ServiceError::NoDescriptor(dir.display().to_string()))?;

    // Fresh context per service: nothing from a previous iteration survives
    let env = EnvFile::load(&dir).map_err(|e| ServiceError::ExecutionFailure(e.to_string()))?;

    let raw_doc: Option<Value> = std::fs::read_to_string(&compose_file)
        .ok()
        .and_then(|text| serde_yaml::from_str(&text).ok());

    // Postgres first, over the variable-resolved rendering. Raw descriptors
    // contain unresolved ${VAR} placeholders, so skipping resolution is only
    // acceptable as a degraded fallback.
    let resolved = docker.resolve_descriptor(&dir).await;
    let pg = match (&resolved, &raw_doc) {
        (Some(doc), _) => postgres_candidates(doc, None),
        (None, Some(doc)) => {
            reporter.warn(format!(
                "could not resolve {}, scanning raw descriptor with .env fallback",
                compose_file.display()
            ));
            postgres_candidates(doc, Some(&env))
        }
        (None, None) => Vec::new(),
    };

    if pg.len() > 1 {
        reporter.warn(format!(
            "{} postgres service blocks in {}, using first",
            pg.len(),
            compose_file.display()
        ));
    }

    if let Some(mut candidate) = pg.into_iter().next() {
        if !candidate.is_complete() {
            candidate.fill_from_env(&env);
        }

        if let (Some(database), Some(user)) = (candidate.database, candidate.user) {
            let container = match candidate.container_name {
                Some(c) => c,
                // Conventional `db` service first, then the naming scheme
                None => match docker.compose_service_container(&dir, "db").await {
                    Some(c) => c,
                    None => format!("{}-db", name),
                },
            };

            return Ok(ServiceDescriptor {
                name: name.to_string(),
                directory: dir,
                engine: DatabaseEngine::Postgres {
                    container,
                    database,
                    user,
                },
            });
        }
    }

    // SQLite second, over the raw descriptor
    if let Some(doc) = &raw_doc {
        let sqlite = sqlite_candidates(doc, &env);
        if sqlite.len() > 1 {
            reporter.warn(format!(
                "{} sqlite service blocks in {}, using first",
                sqlite.len(),
                compose_file.display()
            ));
        }

        if let Some(candidate) = sqlite.into_iter().next() {
            return Ok(ServiceDescriptor {
                name: name.to_string(),
                directory: dir,
                engine: DatabaseEngine::SqliteFile {
                    container: candidate.container,
                    file_path: candidate.file_path,
                },
            });
        }
    }

    Err(ServiceError::NoDatabase {
        synonyms: recognized_key_synonyms(),
    })
}

fn report_error(name: &str, error: ServiceError, reporter: &Reporter) -> ServiceReport {
    let outcome = outcome_for(&error);
    match outcome {
        RunOutcome::Failed => reporter.warn(format!("'{}' failed: {}", name, error)),
        _ => reporter.info(format!("'{}' skipped: {}", name, error)),
    }

    ServiceReport {
        service: name.to_string(),
        outcome,
        detail: Some(error.to_string()),
    }
}

/// Back up each named service into `{dest_root}/{service}/`
pub async fn run_backup(
    docker: &DockerManager,
    root: &Path,
    names: &[String],
    dest_root: &Path,
) -> Result<Vec<ServiceReport>> {
    let reporter = Reporter::new("backup");

    std::fs::create_dir_all(dest_root)
        .with_context(|| format!("Failed to create {}", dest_root.display()))?;

    let driver = BackupDriver::new(docker, dest_root.to_path_buf());
    let mut reports = Vec::new();

    for name in names {
        reporter.info(format!("processing '{}'", name));

        let report = match classify_service(docker, root, name, &reporter).await {
            Err(e) => report_error(name, e, &reporter),
            Ok(desc) => {
                reporter.info(format!(
                    "'{}' uses {} (container '{}')",
                    name,
                    desc.engine.kind(),
                    desc.engine.container()
                ));

                match driver.backup(&desc).await {
                    Err(e) => report_error(name, e, &reporter),
                    Ok(artifact) => {
                        let lines = count_lines(&artifact).unwrap_or(0);
                        reporter.info(format!(
                            "wrote {} ({} lines)",
                            artifact.display(),
                            lines
                        ));
                        ServiceReport {
                            service: name.clone(),
                            outcome: RunOutcome::Success,
                            detail: Some(artifact.display().to_string()),
                        }
                    }
                }
            }
        };

        reports.push(report);
    }

    Ok(reports)
}

/// Restore each named service from its positionally paired artifact.
/// Callers must have validated that both lists are the same length.
pub async fn run_restore(
    docker: &DockerManager,
    root: &Path,
    names: &[String],
    artifacts: &[PathBuf],
) -> Result<Vec<ServiceReport>> {
    let reporter = Reporter::new("restore");
    let driver = RestoreDriver::new(docker);
    let mut reports = Vec::new();

    for (name, artifact) in names.iter().zip(artifacts.iter()) {
        reporter.info(format!("processing '{}' from {}", name, artifact.display()));

        let report = match classify_service(docker, root, name, &reporter).await {
            Err(e) => report_error(name, e, &reporter),
            Ok(desc) => {
                if matches!(desc.engine, DatabaseEngine::Postgres { .. }) {
                    reporter.warn(format!(
                        "replaying a postgres dump into '{}' is not idempotent; the target database should be empty",
                        name
                    ));
                }

                match driver.restore(&desc, artifact).await {
                    Err(e) => report_error(name, e, &reporter),
                    Ok(()) => {
                        reporter.info(format!("restored '{}'", name));
                        ServiceReport {
                            service: name.clone(),
                            outcome: RunOutcome::Success,
                            detail: None,
                        }
                    }
                }
            }
        };

        reports.push(report);
    }

    Ok(reports)
}

/// One line per service plus per-category counts
pub fn print_summary(reports: &[ServiceReport]) {
    println!("\n{:<4} {:<25} {:<34} Detail", "", "Service", "Outcome");
    println!("{}", "-".repeat(80));

    for report in reports {
        // Pad before colorizing: ANSI escape bytes would count toward the
        // field width and shift the column
        let glyph = format!("{:<4}", report.outcome.glyph());
        let glyph = match report.outcome {
            RunOutcome::Success => glyph.green(),
            RunOutcome::Failed => glyph.red(),
            _ => glyph.yellow(),
        };
        println!(
            "{} {:<25} {:<34} {}",
            glyph,
            report.service,
            report.outcome.label(),
            report.detail.as_deref().unwrap_or("-")
        );
    }

    let count = |outcome: RunOutcome| reports.iter().filter(|r| r.outcome == outcome).count();
    println!(
        "\n{} succeeded, {} not found, {} no database, {} container not running, {} failed",
        count(RunOutcome::Success),
        count(RunOutcome::SkippedNotFound),
        count(RunOutcome::SkippedNoDatabase),
        count(RunOutcome::SkippedContainerNotRunning),
        count(RunOutcome::Failed),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = std::fs::File::create(path).unwrap();
        write!(file, "{}", content).unwrap();
    }

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(outcome_for(&ServiceError::NotFound), RunOutcome::SkippedNotFound);
        assert_eq!(
            outcome_for(&ServiceError::NoDescriptor("x".into())),
            RunOutcome::SkippedNoDatabase
        );
        assert_eq!(
            outcome_for(&ServiceError::NoDatabase { synonyms: "".into() }),
            RunOutcome::SkippedNoDatabase
        );
        assert_eq!(
            outcome_for(&ServiceError::ContainerNotRunning("db".into())),
            RunOutcome::SkippedContainerNotRunning
        );
        assert_eq!(
            outcome_for(&ServiceError::MissingArtifact("f".into())),
            RunOutcome::Failed
        );
        assert_eq!(
            outcome_for(&ServiceError::ExecutionFailure("boom".into())),
            RunOutcome::Failed
        );
    }

    #[test]
    fn test_summary_glyphs_are_plain_and_pad_evenly() {
        for outcome in [
            RunOutcome::Success,
            RunOutcome::SkippedNotFound,
            RunOutcome::SkippedNoDatabase,
            RunOutcome::SkippedContainerNotRunning,
            RunOutcome::Failed,
        ] {
            let glyph = outcome.glyph();
            assert_eq!(glyph.chars().count(), 1);
            assert!(!glyph.contains('\x1b'));
            // Width formatting sees the bare glyph, so every row pads alike
            assert_eq!(format!("{:<4}", glyph).chars().count(), 4);
        }
    }

    #[tokio::test]
    async fn test_classify_sqlite_service_without_daemon() {
        // Only needs a lazily constructed client: the sqlite path never
        // contacts the daemon
        let Ok(docker) = DockerManager::new() else {
            return;
        };

        let root = TempDir::new().unwrap();
        write_file(
            root.path(),
            "apps/vaultwarden/docker-compose.yml",
            "services:\n  app:\n    image: linuxserver/app:latest\n    container_name: vaultwarden\n    environment:\n      - DB01_TYPE=sqlite3\n      - DB01_HOST=/data/db.sqlite3\n",
        );

        let reporter = Reporter::new("backup");
        let desc = classify_service(&docker, root.path(), "vaultwarden", &reporter)
            .await
            .unwrap();
        assert_eq!(
            desc.engine,
            DatabaseEngine::SqliteFile {
                container: "vaultwarden".to_string(),
                file_path: "/data/db.sqlite3".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_classify_reports_missing_and_undetected() {
        let Ok(docker) = DockerManager::new() else {
            return;
        };

        let root = TempDir::new().unwrap();
        // Directory exists but has no compose file
        std::fs::create_dir_all(root.path().join("plain")).unwrap();

        let reporter = Reporter::new("backup");

        let err = classify_service(&docker, root.path(), "ghost", &reporter)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));

        let err = classify_service(&docker, root.path(), "plain", &reporter)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NoDescriptor(_)));
    }

    /// Full backup-then-restore cycle against a throwaway Postgres
    /// container. Needs a reachable daemon and the postgres image; every
    /// environment step that can't be satisfied skips the test rather than
    /// failing it, matching how the docker-dependent tests guard themselves.
    #[tokio::test]
    async fn test_postgres_backup_restore_round_trip() {
        use crate::core::backup::BackupDriver;
        use crate::core::restore::RestoreDriver;

        let Ok(docker) = DockerManager::new() else {
            return;
        };
        if !docker.check_docker().await.unwrap_or(false) {
            return;
        }

        let container = "compose-backup-roundtrip";
        let cleanup = || {
            let _ = std::process::Command::new("docker")
                .args(["rm", "-f", container])
                .output();
        };
        cleanup();

        let started = std::process::Command::new("docker")
            .args([
                "run",
                "-d",
                "--name",
                container,
                "-e",
                "POSTGRES_DB=roundtrip",
                "-e",
                "POSTGRES_USER=roundtrip",
                "-e",
                "POSTGRES_PASSWORD=roundtrip",
                "postgres:15-alpine",
            ])
            .output();
        match started {
            Ok(out) if out.status.success() => {}
            // Image unavailable (offline) or run refused: nothing to test
            _ => return,
        }

        let mut ready = false;
        for _ in 0..30 {
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            if docker
                .exec_best_effort(container, &["pg_isready", "-U", "roundtrip"])
                .await
            {
                ready = true;
                break;
            }
        }
        if !ready {
            cleanup();
            return;
        }

        let seeded = docker
            .exec_best_effort(
                container,
                &[
                    "psql",
                    "-U",
                    "roundtrip",
                    "-d",
                    "roundtrip",
                    "-c",
                    "CREATE TABLE notes(v text); INSERT INTO notes VALUES ('a'),('b');",
                ],
            )
            .await;
        if !seeded {
            cleanup();
            return;
        }

        let desc = ServiceDescriptor {
            name: "roundtrip".to_string(),
            directory: PathBuf::from("."),
            engine: DatabaseEngine::Postgres {
                container: container.to_string(),
                database: "roundtrip".to_string(),
                user: "roundtrip".to_string(),
            },
        };

        let dest = TempDir::new().unwrap();
        let artifact = BackupDriver::new(&docker, dest.path().to_path_buf())
            .backup(&desc)
            .await
            .unwrap();
        assert!(artifact.is_file());

        // Freshly-emptied target of the same shape: the dump recreates the
        // table, so dropping it empties the database
        docker
            .exec_best_effort(
                container,
                &["psql", "-U", "roundtrip", "-d", "roundtrip", "-c", "DROP TABLE notes;"],
            )
            .await;

        RestoreDriver::new(&docker)
            .restore(&desc, &artifact)
            .await
            .unwrap();

        let check = dest.path().join("rows.txt");
        let outcome = docker
            .exec_to_file(
                container,
                &[
                    "psql",
                    "-U",
                    "roundtrip",
                    "-d",
                    "roundtrip",
                    "-t",
                    "-A",
                    "-c",
                    "SELECT v FROM notes ORDER BY v;",
                ],
                &check,
            )
            .await
            .unwrap();
        assert!(outcome.success, "row check failed: {}", outcome.stderr);

        let rows = std::fs::read_to_string(&check).unwrap();
        assert_eq!(rows.trim(), "a\nb");

        cleanup();
    }

    #[tokio::test]
    async fn test_run_continues_past_skipped_services() {
        let Ok(docker) = DockerManager::new() else {
            return;
        };

        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("plain")).unwrap();
        let dest = TempDir::new().unwrap();

        let names = vec!["ghost".to_string(), "plain".to_string()];
        let reports = run_backup(&docker, root.path(), &names, dest.path())
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].outcome, RunOutcome::SkippedNotFound);
        assert_eq!(reports[1].outcome, RunOutcome::SkippedNoDatabase);
    }
}
