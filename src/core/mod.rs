pub mod backup;
pub mod docker;
pub mod env_file;
pub mod error;
pub mod inference;
pub mod locate;
pub mod restore;
pub mod run;

pub use backup::BackupDriver;
pub use docker::DockerManager;
pub use env_file::EnvFile;
pub use error::ServiceError;
pub use inference::{DatabaseEngine, ServiceDescriptor};
pub use restore::RestoreDriver;
pub use run::{RunOutcome, ServiceReport};
