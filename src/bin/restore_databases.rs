use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use compose_backup::cli::{paired_lists, RestoreCli};
use compose_backup::core::run::{print_summary, run_restore};
use compose_backup::core::DockerManager;
use compose_backup::utils::expand_tilde;

#[tokio::main]
async fn main() {
    let cli = match RestoreCli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    if let Err(e) = run(cli).await {
        eprintln!("[restore] error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: RestoreCli) -> Result<()> {
    // Pairing is positional; a count mismatch aborts before anything is
    // touched, unlike per-service failures which never stop the batch
    let (names, files) = paired_lists(&cli.folder_names, &cli.backup_files)?;
    let artifacts: Vec<PathBuf> = files.iter().map(|f| expand_tilde(f)).collect();

    let root = expand_tilde(&cli.root);

    let docker = DockerManager::new()?;
    let reports = run_restore(&docker, &root, &names, &artifacts).await?;

    print_summary(&reports);

    Ok(())
}
