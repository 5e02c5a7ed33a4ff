/// Helper utilities shared by the backup and restore binaries

use std::path::{Path, PathBuf};

use chrono::Local;

/// Expand a leading `~` to the invoking user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }

    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    PathBuf::from(path)
}

/// Timestamp used in artifact file names (local time)
pub fn artifact_timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Build the artifact path for a service backup:
/// `{dest}/{service}/{service}_{timestamp}.sql`
pub fn artifact_path(dest_root: &Path, service: &str, timestamp: &str) -> PathBuf {
    dest_root
        .join(service)
        .join(format!("{}_{}.sql", service, timestamp))
}

/// Count lines of a text file (for post-backup sanity logging)
pub fn count_lines(path: &Path) -> std::io::Result<usize> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().count())
}

/// Parse Docker container status to simplified state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    Paused,
    Restarting,
    Dead,
    Unknown,
}

impl From<&str> for ContainerState {
    fn from(status: &str) -> Self {
        let status_lower = status.to_lowercase();
        if status_lower.contains("up") || status_lower.contains("running") {
            ContainerState::Running
        } else if status_lower.contains("paused") {
            ContainerState::Paused
        } else if status_lower.contains("restarting") {
            ContainerState::Restarting
        } else if status_lower.contains("dead") || status_lower.contains("removing") {
            ContainerState::Dead
        } else if status_lower.contains("exited") || status_lower.contains("stopped") {
            ContainerState::Stopped
        } else {
            ContainerState::Unknown
        }
    }
}

impl ContainerState {
    pub fn is_running(&self) -> bool {
        matches!(self, ContainerState::Running)
    }
}
