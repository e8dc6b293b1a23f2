//! Migrates a container of sample blobs from one Azure Storage account to
//! another with lease-protected server-side copies.
//!
//! ```no_run
//! use std::sync::Arc;
//! use storage_migration::prelude::*;
//!
//! # async fn migrate(source: &str, destination: &str) -> azure_core::Result<()> {
//! let source = AzureStorageAccount::from_connection_string(source)?;
//! let destination = AzureStorageAccount::from_connection_string(destination)?;
//! let runner = MigrationRunner::new(
//!     Arc::new(source),
//!     Arc::new(destination),
//!     MigrationOptions::new().blob_count(3),
//! );
//! let report = runner.run().await?;
//! println!("{} of {} copies succeeded", report.succeeded(), report.copies.len());
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod clients;
pub mod error;
pub mod options;
pub mod poll;
pub mod prelude;
pub mod report;
pub mod runner;
pub mod sample_files;
