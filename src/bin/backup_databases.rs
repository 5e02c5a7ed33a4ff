use anyhow::Result;
use clap::Parser;

use compose_backup::cli::{split_list, BackupCli};
use compose_backup::core::run::{print_summary, run_backup};
use compose_backup::core::DockerManager;
use compose_backup::utils::expand_tilde;

#[tokio::main]
async fn main() {
    // Argument-shape problems exit 1, per the original scripts' contract
    let cli = match BackupCli::try_parse() {
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
        eprintln!("[backup] error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: BackupCli) -> Result<()> {
    let names = split_list(&cli.folder_names);
    if names.is_empty() {
        anyhow::bail!("no service names given");
    }

    let dest_root = expand_tilde(&cli.destination_path);
    let root = expand_tilde(&cli.root);

    let docker = DockerManager::new()?;
    let reports = run_backup(&docker, &root, &names, &dest_root).await?;

    // Per-service failures are reported in the summary, not the exit code:
    // a scheduled run must not let one misconfigured service mask the rest
    print_summary(&reports);

    Ok(())
}
