/// CLI argument parsing shared by the two binaries

use anyhow::Result;
use clap::Parser;

#[derive(Parser)]
#[command(name = "backup-databases")]
#[command(author, version, about = "Dump every named service's database to timestamped .sql artifacts")]
pub struct BackupCli {
    /// Comma-separated service directory names (e.g. "wikijs,miniflux")
    pub folder_names: String,

    /// Destination base directory; created if absent, `~` is expanded
    pub destination_path: String,

    /// Root of the homelab checkout to search for service directories
    #[arg(long, default_value = ".")]
    pub root: String,
}

#[derive(Parser)]
#[command(name = "restore-databases")]
#[command(author, version, about = "Feed previously produced .sql artifacts back into each service's database")]
pub struct RestoreCli {
    /// Comma-separated service directory names, paired 1:1 with backup_files
    pub folder_names: String,

    /// Comma-separated artifact paths, same order and count as folder_names
    pub backup_files: String,

    /// Root of the homelab checkout to search for service directories
    #[arg(long, default_value = ".")]
    pub root: String,
}

/// Split a comma-separated argument, trimming whitespace around each entry
/// and dropping empties
pub fn split_list(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Split and pair the restore lists; a count mismatch is a fatal
/// argument-shape error that must abort before any container is touched
pub fn paired_lists(names_arg: &str, files_arg: &str) -> Result<(Vec<String>, Vec<String>)> {
    let names = split_list(names_arg);
    let files = split_list(files_arg);

    if names.is_empty() {
        anyhow::bail!("no service names given");
    }
    if names.len() != files.len() {
        anyhow::bail!(
            "{} service names but {} backup files; the lists must pair 1:1",
            names.len(),
            files.len()
        );
    }

    Ok((names, files))
}
