use crate::{
    blob::{BlobProperties, ContainerAccess, CopyStatus, LeaseId, LeaseState},
    clients::StorageAccount,
    error::{codes, has_error_code, is_not_found},
    options::MigrationOptions,
    poll::{poll_until, Poll},
    report::{BlobCopyReport, MigrationReport},
    sample_files,
};
use azure_core::error::{Error, ErrorKind, ResultExt};
use bytes::Bytes;
use log::{debug, info, warn};
use std::{path::PathBuf, sync::Arc};

/// Moves the sample blobs from the source account to the destination
/// account, one step at a time.
///
/// The steps are exposed individually so they can be driven (and tested)
/// separately; [`MigrationRunner::run`] chains all four.
#[derive(Clone)]
pub struct MigrationRunner {
    source: Arc<dyn StorageAccount>,
    destination: Arc<dyn StorageAccount>,
    options: MigrationOptions,
}

impl std::fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("source", &self.source.account_name())
            .field("destination", &self.destination.account_name())
            .field("options", &self.options)
            .finish()
    }
}

impl MigrationRunner {
    pub fn new(
        source: Arc<dyn StorageAccount>,
        destination: Arc<dyn StorageAccount>,
        options: MigrationOptions,
    ) -> Self {
        Self {
            source,
            destination,
            options,
        }
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    fn container(&self) -> &str {
        &self.options.container_name
    }

    /// Generates, clears, uploads and copies, in that order.
    pub async fn run(&self) -> azure_core::Result<MigrationReport> {
        self.generate_sample_files(self.options.blob_count)?;
        self.clear_containers().await?;
        let uploaded = self.upload_sample_files().await?;
        let copies = self.copy_container().await?;

        Ok(MigrationReport {
            container: self.container().to_owned(),
            uploaded,
            copies,
        })
    }

    pub fn generate_sample_files(&self, count: usize) -> azure_core::Result<Vec<PathBuf>> {
        info!(
            "Generating {count} sample files in {}",
            self.options.local_dir.display()
        );
        sample_files::generate_sample_files(&self.options.local_dir, count)
    }

    /// Deletes the container on both accounts and waits until neither
    /// account reports it any more.
    ///
    /// A container that is already gone is not an error. If the deletion is
    /// still visible when the wait runs out, the run carries on: container
    /// creation keeps retrying while the service reports it as being deleted.
    pub async fn clear_containers(&self) -> azure_core::Result<()> {
        for account in [&self.source, &self.destination] {
            self.delete_container(account.as_ref()).await?;
        }
        for account in [&self.source, &self.destination] {
            self.wait_until_deleted(account.as_ref()).await?;
        }
        Ok(())
    }

    async fn delete_container(&self, account: &dyn StorageAccount) -> azure_core::Result<()> {
        let container = self.container();
        match account.delete_container(container).await {
            Ok(()) => {
                info!(
                    "Deleting container {container} on {}",
                    account.account_name()
                );
                Ok(())
            }
            Err(err) if is_not_found(&err) => {
                info!(
                    "Container {container} does not exist on {}",
                    account.account_name()
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn wait_until_deleted(&self, account: &dyn StorageAccount) -> azure_core::Result<()> {
        let container = self.container();
        let polled = poll_until(self.options.deletion_poll, || async move {
            Ok(if account.container_exists(container).await? {
                Poll::Pending(())
            } else {
                Poll::Ready(())
            })
        })
        .await?;

        if !polled.ready {
            warn!(
                "Container {container} is still visible on {} after {:?}",
                account.account_name(),
                self.options.deletion_poll.timeout
            );
        }
        Ok(())
    }

    /// Creates the container, retrying while the service still reports a
    /// previous incarnation as being deleted.
    async fn create_container(
        &self,
        account: &dyn StorageAccount,
        access: ContainerAccess,
    ) -> azure_core::Result<()> {
        let container = self.container();
        let polled = poll_until(self.options.deletion_poll, || async move {
            match account.create_container(container, access).await {
                Ok(()) => Ok(Poll::Ready(Ok(()))),
                Err(err) if has_error_code(&err, codes::CONTAINER_BEING_DELETED) => {
                    debug!(
                        "container {container} is being deleted on {}",
                        account.account_name()
                    );
                    Ok(Poll::Pending(Err(err)))
                }
                Err(err) => Err(err),
            }
        })
        .await?;
        polled.value
    }

    /// Creates the container unless it already exists.
    async fn ensure_container(
        &self,
        account: &dyn StorageAccount,
        access: ContainerAccess,
    ) -> azure_core::Result<()> {
        let container = self.container();
        match self.create_container(account, access).await {
            Ok(()) => {
                info!(
                    "Created container {container} on {}",
                    account.account_name()
                );
                Ok(())
            }
            Err(err) if has_error_code(&err, codes::CONTAINER_ALREADY_EXISTS) => {
                info!(
                    "Container {container} already exists on {}",
                    account.account_name()
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Creates the source container with public read access and uploads every
    /// file of the local directory into it under its file name.
    ///
    /// An existing container (`ContainerAlreadyExists`) is reused as is, the
    /// same as on the destination, so a run against a container that was not
    /// cleared gets as far as the first upload. Existing blobs are not
    /// overwritten: that upload fails with `BlobAlreadyExists`.
    pub async fn upload_sample_files(&self) -> azure_core::Result<Vec<String>> {
        let container = self.container();
        self.ensure_container(self.source.as_ref(), ContainerAccess::Container)
            .await?;

        let files = sample_files::list_sample_files(&self.options.local_dir)?;
        let mut uploaded = Vec::with_capacity(files.len());
        for path in files {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    Error::with_message(ErrorKind::DataConversion, || {
                        format!("{} has no valid blob name", path.display())
                    })
                })?
                .to_owned();
            let body = tokio::fs::read(&path)
                .await
                .with_context(ErrorKind::Io, || format!("failed to read {}", path.display()))?;

            info!("Uploading {name}");
            self.source
                .upload_blob(container, &name, Bytes::from(body))
                .await?;
            uploaded.push(name);
        }
        Ok(uploaded)
    }

    /// Creates the private destination container and copies every blob of the
    /// source container into it, one lease-protected server-side copy at a
    /// time.
    pub async fn copy_container(&self) -> azure_core::Result<Vec<BlobCopyReport>> {
        let container = self.container();
        self.ensure_container(self.destination.as_ref(), ContainerAccess::Private)
            .await?;

        let blobs = self.source.list_blobs(container).await?;
        let mut reports = Vec::with_capacity(blobs.len());
        for blob in blobs {
            reports.push(self.copy_blob(&blob).await?);
        }
        Ok(reports)
    }

    /// Copies one blob while holding a lease on the source.
    ///
    /// The lease is held until the copy is terminal (or the copy wait runs
    /// out) and is then broken if the source still reports it as leased. When
    /// the copy itself fails the lease is broken before the error is returned.
    pub async fn copy_blob(&self, blob: &str) -> azure_core::Result<BlobCopyReport> {
        let container = self.container();
        let lease_id = self
            .source
            .acquire_lease(container, blob, self.options.lease_duration)
            .await?;
        debug!("acquired lease {lease_id} on {blob}");

        let copied = match self.copy_leased_blob(blob).await {
            Ok(copied) => copied,
            Err(err) => {
                if let Err(break_err) = self.source.break_lease(container, blob).await {
                    warn!("failed to break lease {lease_id} on {blob}: {break_err}");
                }
                return Err(err);
            }
        };
        let lease_broken = self.break_lease_if_held(blob).await?;

        Ok(copied.into_report(blob, lease_id, lease_broken))
    }

    async fn copy_leased_blob(&self, blob: &str) -> azure_core::Result<CopiedBlob> {
        let container = self.container();
        let source_url = self.source.blob_url(container, blob)?;
        let accepted = self
            .destination
            .start_copy(container, blob, source_url)
            .await?;

        let destination = self.destination.as_ref();
        let polled = poll_until(self.options.copy_poll, || async move {
            let properties = destination.blob_properties(container, blob).await?;
            Ok(match properties.copy_status {
                Some(status) if !status.is_terminal() => Poll::Pending(properties),
                _ => Poll::Ready(properties),
            })
        })
        .await?;

        let properties = polled.value;
        let status = properties.copy_status.unwrap_or(accepted);
        if !polled.ready {
            warn!(
                "Copy of {blob} is still {status} after {:?}",
                self.options.copy_poll.timeout
            );
        }

        info!("Copying {blob}");
        info!("Copy status: {status}");
        info!(
            "Copy progress: {}",
            properties.copy_progress.as_deref().unwrap_or("unknown")
        );
        match properties.copy_completion_time {
            Some(time) => info!("Copy completion time: {time}"),
            None => info!("Copy completion time: not completed"),
        }
        info!("Total bytes copied: {}", properties.content_length);

        Ok(CopiedBlob { status, properties })
    }

    /// Breaks the source lease if, reading the source now, it is still held.
    async fn break_lease_if_held(&self, blob: &str) -> azure_core::Result<bool> {
        let container = self.container();
        let lease_state = self
            .source
            .blob_properties(container, blob)
            .await?
            .lease_state;
        if lease_state != LeaseState::Leased {
            info!("Source blob {blob} lease state: {lease_state}");
            return Ok(false);
        }

        match self.source.break_lease(container, blob).await {
            Ok(()) => {
                info!("Source blob {blob} lease state: {}", LeaseState::Broken);
                Ok(true)
            }
            Err(err) if has_error_code(&err, codes::LEASE_NOT_PRESENT_WITH_LEASE_OPERATION) => {
                debug!("lease on {blob} was already released");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}

struct CopiedBlob {
    status: CopyStatus,
    properties: BlobProperties,
}

impl CopiedBlob {
    fn into_report(self, blob: &str, lease_id: LeaseId, lease_broken: bool) -> BlobCopyReport {
        BlobCopyReport {
            name: blob.to_owned(),
            lease_id,
            status: self.status,
            progress: self.properties.copy_progress,
            completion_time: self.properties.copy_completion_time,
            size: self.properties.content_length,
            lease_broken,
        }
    }
}
