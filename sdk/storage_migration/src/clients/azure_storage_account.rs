use crate::{
    blob::{BlobProperties, ContainerAccess, CopyStatus, LeaseDuration, LeaseId, LeaseState},
    clients::StorageAccount,
};
use async_trait::async_trait;
use azure_core::{
    error::{Error, ErrorKind, ResultExt},
    prelude::IfMatchCondition,
};
use azure_storage::{CloudLocation, ConnectionString, StorageCredentials};
use azure_storage_blobs::{
    blob::{BlobProperties as SdkBlobProperties, CopyStatus as SdkCopyStatus},
    prelude::{BlobClient, BlobServiceClient, ClientBuilder, ContainerClient, PublicAccess},
};
use bytes::Bytes;
use futures::StreamExt;
use std::fmt;
use url::Url;

/// The well-known account used by Azurite and the legacy Azure Storage Emulator.
/// https://docs.microsoft.com/azure/storage/common/storage-use-azurite#well-known-storage-account-and-key
pub const EMULATOR_ACCOUNT: &str = "devstoreaccount1";

/// The well-known account key used by Azurite and the legacy Azure Storage Emulator.
/// https://docs.microsoft.com/azure/storage/common/storage-use-azurite#well-known-storage-account-and-key
pub const EMULATOR_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

const EMULATOR_ADDRESS: &str = "127.0.0.1";
const EMULATOR_BLOB_PORT: u16 = 10000;

/// [`StorageAccount`] backed by Azure Blob Storage.
#[derive(Clone)]
pub struct AzureStorageAccount {
    account: String,
    service_client: BlobServiceClient,
}

impl fmt::Debug for AzureStorageAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureStorageAccount")
            .field("account", &self.account)
            .finish()
    }
}

impl AzureStorageAccount {
    /// An account in the Azure public cloud.
    pub fn new(account: impl Into<String>, credentials: StorageCredentials) -> Self {
        let account = account.into();
        let service_client = ClientBuilder::new(account.clone(), credentials).blob_service_client();
        Self {
            account,
            service_client,
        }
    }

    /// The local Azurite (or legacy emulator) blob endpoint.
    pub fn emulator(address: impl Into<String>, port: u16) -> Self {
        let credentials = StorageCredentials::access_key(EMULATOR_ACCOUNT, EMULATOR_ACCOUNT_KEY);
        let location = CloudLocation::Emulator {
            address: address.into(),
            port,
        };
        Self {
            account: EMULATOR_ACCOUNT.to_owned(),
            service_client: ClientBuilder::with_location(location, credentials)
                .blob_service_client(),
        }
    }

    /// Builds a client from a storage connection string such as
    /// `DefaultEndpointsProtocol=https;AccountName=...;AccountKey=...`.
    ///
    /// `UseDevelopmentStorage=true` selects the local emulator. Otherwise a
    /// `BlobEndpoint` is used as is, an `EndpointSuffix` picks the cloud the
    /// account lives in, and anything else goes to the Azure public cloud.
    pub fn from_connection_string(connection_string: &str) -> azure_core::Result<Self> {
        let connection_string = ConnectionString::new(connection_string)?;

        if connection_string.use_development_storage == Some(true) {
            return Ok(Self::emulator(EMULATOR_ADDRESS, EMULATOR_BLOB_PORT));
        }

        let account = connection_string
            .account_name
            .ok_or_else(|| {
                Error::message(
                    ErrorKind::Credential,
                    "connection string does not name an AccountName",
                )
            })?
            .to_owned();
        let credentials = connection_string.storage_credentials()?;
        let location = cloud_location(&connection_string, account.clone())?;
        log::debug!("using {location:?} for {account}");

        Ok(Self {
            account,
            service_client: ClientBuilder::with_location(location, credentials)
                .blob_service_client(),
        })
    }

    fn container_client(&self, container: &str) -> ContainerClient {
        self.service_client.container_client(container)
    }

    fn blob_client(&self, container: &str, blob: &str) -> BlobClient {
        self.container_client(container).blob_client(blob)
    }
}

fn cloud_location(
    connection_string: &ConnectionString,
    account: String,
) -> azure_core::Result<CloudLocation> {
    if let Some(endpoint) = connection_string.blob_endpoint {
        let uri = Url::parse(endpoint)
            .with_context(ErrorKind::DataConversion, || {
                format!("failed to parse BlobEndpoint {endpoint}")
            })?;
        return Ok(CloudLocation::Custom {
            account,
            uri: uri.as_str().trim_end_matches('/').to_owned(),
        });
    }

    match connection_string.endpoint_suffix {
        Some(suffix) => {
            let protocol = connection_string
                .default_endpoints_protocol
                .as_ref()
                .map_or_else(|| "https".to_owned(), ToString::to_string);
            Ok(CloudLocation::Custom {
                uri: format!("{protocol}://{account}.blob.{suffix}"),
                account,
            })
        }
        None => Ok(CloudLocation::Public { account }),
    }
}

/// A blob without a lease reports no lease state at all.
fn lease_state(state: Option<&azure_core::LeaseState>) -> LeaseState {
    match state {
        None | Some(azure_core::LeaseState::Available) => LeaseState::Available,
        Some(azure_core::LeaseState::Leased) => LeaseState::Leased,
        Some(azure_core::LeaseState::Expired) => LeaseState::Expired,
        Some(azure_core::LeaseState::Breaking) => LeaseState::Breaking,
        Some(azure_core::LeaseState::Broken) => LeaseState::Broken,
    }
}

fn copy_status(status: &SdkCopyStatus) -> CopyStatus {
    match status {
        SdkCopyStatus::Pending => CopyStatus::Pending,
        SdkCopyStatus::Success => CopyStatus::Success,
        SdkCopyStatus::Aborted => CopyStatus::Aborted,
        SdkCopyStatus::Failed => CopyStatus::Failed,
    }
}

fn blob_properties(properties: &SdkBlobProperties) -> BlobProperties {
    BlobProperties {
        content_length: properties.content_length,
        lease_state: lease_state(properties.lease_state.as_ref()),
        copy_status: properties.copy_status.as_ref().map(copy_status),
        copy_progress: properties.copy_progress.as_ref().map(ToString::to_string),
        copy_completion_time: properties.copy_completion_time,
    }
}

#[async_trait]
impl StorageAccount for AzureStorageAccount {
    fn account_name(&self) -> &str {
        &self.account
    }

    async fn create_container(
        &self,
        container: &str,
        access: ContainerAccess,
    ) -> azure_core::Result<()> {
        let public_access = match access {
            ContainerAccess::Private => PublicAccess::None,
            ContainerAccess::Blob => PublicAccess::Blob,
            ContainerAccess::Container => PublicAccess::Container,
        };
        self.container_client(container)
            .create()
            .public_access(public_access)
            .into_future()
            .await?;
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> azure_core::Result<()> {
        self.container_client(container)
            .delete()
            .into_future()
            .await?;
        Ok(())
    }

    async fn container_exists(&self, container: &str) -> azure_core::Result<bool> {
        match self
            .container_client(container)
            .get_properties()
            .into_future()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if crate::error::is_not_found(&err) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn list_blobs(&self, container: &str) -> azure_core::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut stream = self.container_client(container).list_blobs().into_stream();
        while let Some(page) = stream.next().await {
            let page = page?;
            names.extend(page.blobs.blobs().map(|blob| blob.name.clone()));
        }
        Ok(names)
    }

    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        body: Bytes,
    ) -> azure_core::Result<()> {
        // If-None-Match: * turns an existing blob into a 409 BlobAlreadyExists.
        self.blob_client(container, blob)
            .put_block_blob(body)
            .if_match(IfMatchCondition::NotMatch("*".to_owned()))
            .into_future()
            .await?;
        Ok(())
    }

    fn blob_url(&self, container: &str, blob: &str) -> azure_core::Result<Url> {
        self.blob_client(container, blob).url()
    }

    async fn blob_properties(
        &self,
        container: &str,
        blob: &str,
    ) -> azure_core::Result<BlobProperties> {
        let response = self
            .blob_client(container, blob)
            .get_properties()
            .into_future()
            .await?;
        Ok(blob_properties(&response.blob.properties))
    }

    async fn acquire_lease(
        &self,
        container: &str,
        blob: &str,
        duration: LeaseDuration,
    ) -> azure_core::Result<LeaseId> {
        let duration = match duration {
            LeaseDuration::Infinite => azure_core::prelude::LeaseDuration::Infinite,
            LeaseDuration::Seconds(seconds) => azure_core::prelude::LeaseDuration::Seconds(seconds),
        };
        let response = self
            .blob_client(container, blob)
            .acquire_lease(duration)
            .into_future()
            .await?;
        response.lease_id.to_string().parse()
    }

    async fn break_lease(&self, container: &str, blob: &str) -> azure_core::Result<()> {
        self.blob_client(container, blob)
            .break_lease()
            .into_future()
            .await?;
        Ok(())
    }

    async fn start_copy(
        &self,
        container: &str,
        blob: &str,
        source: Url,
    ) -> azure_core::Result<CopyStatus> {
        let response = self
            .blob_client(container, blob)
            .copy(source)
            .into_future()
            .await?;
        Ok(copy_status(&response.copy_status))
    }
}
