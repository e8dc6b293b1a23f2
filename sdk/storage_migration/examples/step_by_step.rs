use std::sync::Arc;
use storage_migration::prelude::*;

#[tokio::main]
async fn main() -> azure_core::Result<()> {
    env_logger::init();

    // First we retrieve the connection strings from environment variables.
    let source = std::env::var("SOURCE_STORAGE_CONNECTION_STRING")
        .expect("Set env variable SOURCE_STORAGE_CONNECTION_STRING first!");
    let destination = std::env::var("DESTINATION_STORAGE_CONNECTION_STRING")
        .expect("Set env variable DESTINATION_STORAGE_CONNECTION_STRING first!");

    let container_name = std::env::args()
        .nth(1)
        .expect("please specify container name as command line parameter");

    let runner = MigrationRunner::new(
        Arc::new(AzureStorageAccount::from_connection_string(&source)?),
        Arc::new(AzureStorageAccount::from_connection_string(&destination)?),
        MigrationOptions::new()
            .container_name(container_name)
            .local_dir("migration_samples"),
    );

    let files = runner.generate_sample_files(5)?;
    println!("generated {} files", files.len());

    runner.clear_containers().await?;

    let uploaded = runner.upload_sample_files().await?;
    println!("uploaded == {:?}", uploaded);

    for copy in runner.copy_container().await? {
        println!("copy == {:#?}", copy);
    }

    Ok(())
}
