/// Per-service failure taxonomy
///
/// Everything here is caught at the batch loop and logged; only argument
/// shape errors (handled in the binaries) abort a whole run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service directory not found")]
    NotFound,

    #[error("no compose file in {0}")]
    NoDescriptor(String),

    #[error("no database detected (recognized env keys: {synonyms})")]
    NoDatabase { synonyms: String },

    #[error("container '{0}' is not running")]
    ContainerNotRunning(String),

    #[error("backup file not found: {0}")]
    MissingArtifact(String),

    #[error("{0}")]
    ExecutionFailure(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
