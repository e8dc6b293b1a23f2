mod azure_storage_account;

pub use azure_storage_account::AzureStorageAccount;

use crate::blob::{BlobProperties, ContainerAccess, CopyStatus, LeaseDuration, LeaseId};
use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

/// The operations the migration needs from one storage account.
///
/// Errors follow the service's shape: HTTP failures surface as
/// [`azure_core::error::ErrorKind::HttpResponse`] carrying the status and the
/// `x-ms-error-code`, so callers can tell an absent container from a denied
/// request regardless of the implementation behind the trait.
#[async_trait]
pub trait StorageAccount: Send + Sync {
    /// Name of the account, for logging.
    fn account_name(&self) -> &str;

    async fn create_container(
        &self,
        container: &str,
        access: ContainerAccess,
    ) -> azure_core::Result<()>;

    async fn delete_container(&self, container: &str) -> azure_core::Result<()>;

    async fn container_exists(&self, container: &str) -> azure_core::Result<bool>;

    /// Names of every blob in `container`, across all result pages.
    async fn list_blobs(&self, container: &str) -> azure_core::Result<Vec<String>>;

    /// Uploads a block blob. Fails with `BlobAlreadyExists` instead of
    /// overwriting.
    async fn upload_blob(&self, container: &str, blob: &str, body: Bytes)
        -> azure_core::Result<()>;

    fn blob_url(&self, container: &str, blob: &str) -> azure_core::Result<Url>;

    async fn blob_properties(
        &self,
        container: &str,
        blob: &str,
    ) -> azure_core::Result<BlobProperties>;

    async fn acquire_lease(
        &self,
        container: &str,
        blob: &str,
        duration: LeaseDuration,
    ) -> azure_core::Result<LeaseId>;

    async fn break_lease(&self, container: &str, blob: &str) -> azure_core::Result<()>;

    /// Starts a server-side copy of `source` into `container/blob` and returns
    /// the status the service reported when accepting it.
    async fn start_copy(
        &self,
        container: &str,
        blob: &str,
        source: Url,
    ) -> azure_core::Result<CopyStatus>;
}
