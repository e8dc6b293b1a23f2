pub use crate::{
    blob::{BlobProperties, ContainerAccess, CopyStatus, LeaseDuration, LeaseId, LeaseState},
    clients::{AzureStorageAccount, StorageAccount},
    options::MigrationOptions,
    poll::PollOptions,
    report::{BlobCopyReport, MigrationReport},
    runner::MigrationRunner,
};
