use azure_core::error::{ErrorKind, ResultExt};
use clap::Parser;
use std::{fs::File, path::PathBuf, sync::Arc, time::Duration};
use storage_migration::{
    options::{DEFAULT_BLOB_COUNT, DEFAULT_CONTAINER_NAME, DEFAULT_LOCAL_DIR},
    prelude::*,
};

/// Copies freshly generated sample blobs from one storage account to another.
#[derive(Parser)]
#[clap(version, about)]
struct Args {
    /// Connection string of the source storage account.
    #[clap(env = "SOURCE_STORAGE_CONNECTION_STRING", hide_env_values = true)]
    source: String,
    /// Connection string of the destination storage account.
    #[clap(env = "DESTINATION_STORAGE_CONNECTION_STRING", hide_env_values = true)]
    destination: String,
    #[clap(long, default_value = DEFAULT_CONTAINER_NAME)]
    container: String,
    #[clap(long, default_value = DEFAULT_LOCAL_DIR)]
    local_dir: PathBuf,
    #[clap(long, default_value_t = DEFAULT_BLOB_COUNT)]
    blob_count: usize,
    /// Longest wait for deleted containers to disappear.
    #[clap(long, default_value_t = 40)]
    deletion_timeout_secs: u64,
    /// Longest wait for each server-side copy to finish.
    #[clap(long, default_value_t = 60)]
    copy_timeout_secs: u64,
    /// Write the migration report as JSON to this file.
    #[clap(long)]
    report: Option<PathBuf>,
}

impl Args {
    fn options(&self) -> MigrationOptions {
        let defaults = MigrationOptions::default();
        MigrationOptions::new()
            .container_name(self.container.clone())
            .local_dir(self.local_dir.clone())
            .blob_count(self.blob_count)
            .deletion_poll(
                defaults
                    .deletion_poll
                    .timeout(Duration::from_secs(self.deletion_timeout_secs)),
            )
            .copy_poll(
                defaults
                    .copy_poll
                    .timeout(Duration::from_secs(self.copy_timeout_secs)),
            )
    }
}

#[tokio::main]
async fn main() -> azure_core::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let source = AzureStorageAccount::from_connection_string(&args.source)
        .context(ErrorKind::Credential, "invalid source connection string")?;
    let destination = AzureStorageAccount::from_connection_string(&args.destination)
        .context(ErrorKind::Credential, "invalid destination connection string")?;

    let runner = MigrationRunner::new(Arc::new(source), Arc::new(destination), args.options());
    let report = runner.run().await?;

    log::info!(
        "Copied {} of {} blobs ({} pending, {} failed)",
        report.succeeded(),
        report.copies.len(),
        report.pending(),
        report.failed()
    );

    if let Some(path) = &args.report {
        let file = File::create(path)
            .with_context(ErrorKind::Io, || format!("failed to create {}", path.display()))?;
        report.write_json(file)?;
        log::info!("Wrote migration report to {}", path.display());
    }

    Ok(())
}
