//! An in-memory stand-in for a set of storage accounts.
//!
//! Every [`MockAccount`] handed out by one [`MockStorage`] lives in the same
//! world, so server-side copies between them resolve the source URL the way
//! the real service does. Containers can be made to linger after deletion,
//! copies can be held pending for a number of status reads, and every call is
//! recorded for later assertions.

use async_trait::async_trait;
use azure_core::{
    error::{Error, ErrorKind},
    StatusCode,
};
use bytes::Bytes;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use storage_migration::{
    blob::{BlobProperties, ContainerAccess, CopyStatus, LeaseDuration, LeaseId, LeaseState},
    clients::StorageAccount,
    error::{codes, http_error},
};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

const MOCK_BLOB_DOMAIN: &str = "blob.mock.invalid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateContainer,
    DeleteContainer,
    ContainerExists,
    ListBlobs,
    UploadBlob,
    BlobProperties,
    AcquireLease,
    BreakLease,
    StartCopy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub account: String,
    pub operation: Operation,
    pub container: String,
    pub blob: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct MockStorage {
    world: Arc<Mutex<World>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the account called `name`, created empty on first use.
    pub fn account(&self, name: &str) -> MockAccount {
        self.world()
            .accounts
            .entry(name.to_owned())
            .or_default();
        MockAccount {
            name: name.to_owned(),
            world: self.world.clone(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.world().calls.clone()
    }

    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Default)]
struct World {
    accounts: HashMap<String, AccountState>,
    calls: Vec<Call>,
}

#[derive(Debug)]
struct AccountState {
    containers: BTreeMap<String, ContainerState>,
    deletion_lag: u32,
    copy_lag: u32,
    copy_outcome: CopyStatus,
    lease_state_override: Option<LeaseState>,
    failures: HashMap<Operation, StatusCode>,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            containers: BTreeMap::new(),
            deletion_lag: 0,
            copy_lag: 0,
            copy_outcome: CopyStatus::Success,
            lease_state_override: None,
            failures: HashMap::new(),
        }
    }
}

#[derive(Debug)]
enum Phase {
    Live,
    /// Deleted, but still reported for this many more checks.
    Deleting(u32),
}

#[derive(Debug)]
struct ContainerState {
    access: ContainerAccess,
    phase: Phase,
    blobs: BTreeMap<String, BlobState>,
}

impl ContainerState {
    fn new(access: ContainerAccess) -> Self {
        Self {
            access,
            phase: Phase::Live,
            blobs: BTreeMap::new(),
        }
    }

    fn is_live(&self) -> bool {
        matches!(self.phase, Phase::Live)
    }
}

#[derive(Debug)]
struct BlobState {
    content: Bytes,
    lease_state: LeaseState,
    copy: Option<CopyState>,
}

impl BlobState {
    fn new(content: Bytes) -> Self {
        Self {
            content,
            lease_state: LeaseState::Available,
            copy: None,
        }
    }
}

#[derive(Debug)]
struct CopyState {
    status: CopyStatus,
    /// Status reads left before the copy settles on `outcome`.
    remaining_reads: u32,
    outcome: CopyStatus,
    completion_time: Option<OffsetDateTime>,
}

impl CopyState {
    fn start(lag: u32, outcome: CopyStatus) -> Self {
        let mut copy = Self {
            status: CopyStatus::Pending,
            remaining_reads: lag,
            outcome,
            completion_time: None,
        };
        if lag == 0 {
            copy.settle();
        }
        copy
    }

    fn settle(&mut self) {
        self.status = self.outcome;
        self.completion_time = Some(OffsetDateTime::now_utc());
    }

    fn observe(&mut self) {
        if self.status != CopyStatus::Pending {
            return;
        }
        self.remaining_reads = self.remaining_reads.saturating_sub(1);
        if self.remaining_reads == 0 {
            self.settle();
        }
    }
}

impl AccountState {
    fn check_failure(&self, operation: Operation) -> azure_core::Result<()> {
        match self.failures.get(&operation) {
            Some(status) => Err(http_error(
                *status,
                "InjectedFailure",
                format!("{operation:?} failed by request"),
            )),
            None => Ok(()),
        }
    }

    /// Advances a lingering deletion by one check and drops the container
    /// once it has run out. Returns whether it is still visible.
    fn observe_container(&mut self, container: &str) -> bool {
        let gone = match self.containers.get_mut(container) {
            None => return false,
            Some(state) => match &mut state.phase {
                Phase::Live => return true,
                Phase::Deleting(0) => true,
                Phase::Deleting(remaining) => {
                    *remaining -= 1;
                    false
                }
            },
        };
        if gone {
            self.containers.remove(container);
        }
        !gone
    }

    fn live_container(&mut self, container: &str) -> azure_core::Result<&mut ContainerState> {
        match self.containers.get_mut(container) {
            Some(state) if state.is_live() => Ok(state),
            _ => Err(http_error(
                StatusCode::NotFound,
                codes::CONTAINER_NOT_FOUND,
                format!("container {container} does not exist"),
            )),
        }
    }

    fn blob(&mut self, container: &str, blob: &str) -> azure_core::Result<&mut BlobState> {
        self.live_container(container)?
            .blobs
            .get_mut(blob)
            .ok_or_else(|| {
                http_error(
                    StatusCode::NotFound,
                    codes::BLOB_NOT_FOUND,
                    format!("blob {container}/{blob} does not exist"),
                )
            })
    }
}

/// One account of a [`MockStorage`] world.
#[derive(Debug, Clone)]
pub struct MockAccount {
    name: String,
    world: Arc<Mutex<World>>,
}

impl MockAccount {
    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut AccountState) -> T) -> T {
        let mut world = self.world();
        f(world.accounts.entry(self.name.clone()).or_default())
    }

    /// Records the call, then runs `f` unless a failure was injected for it.
    fn call<T>(
        &self,
        operation: Operation,
        container: &str,
        blob: Option<&str>,
        f: impl FnOnce(&mut AccountState) -> azure_core::Result<T>,
    ) -> azure_core::Result<T> {
        let mut world = self.world();
        world.calls.push(Call {
            account: self.name.clone(),
            operation,
            container: container.to_owned(),
            blob: blob.map(str::to_owned),
        });
        let state = world.accounts.entry(self.name.clone()).or_default();
        state.check_failure(operation)?;
        f(state)
    }

    /// Deleted containers stay visible for this many checks.
    pub fn set_deletion_lag(&self, checks: u32) {
        self.with_state(|state| state.deletion_lag = checks);
    }

    /// Copies into this account stay pending for this many status reads.
    pub fn set_copy_lag(&self, reads: u32) {
        self.with_state(|state| state.copy_lag = reads);
    }

    /// Status copies into this account end with once they stop pending.
    pub fn set_copy_outcome(&self, outcome: CopyStatus) {
        self.with_state(|state| state.copy_outcome = outcome);
    }

    /// Makes blob property reads report `lease_state` regardless of the
    /// actual lease.
    pub fn override_lease_state(&self, lease_state: Option<LeaseState>) {
        self.with_state(|state| state.lease_state_override = lease_state);
    }

    /// Every later call of `operation` on this account fails with `status`.
    pub fn fail(&self, operation: Operation, status: StatusCode) {
        self.with_state(|state| {
            state.failures.insert(operation, status);
        });
    }

    pub fn seed_container(&self, container: &str, access: ContainerAccess) {
        self.with_state(|state| {
            state
                .containers
                .insert(container.to_owned(), ContainerState::new(access));
        });
    }

    pub fn seed_blob(&self, container: &str, blob: &str, content: impl Into<Bytes>) {
        self.with_state(|state| {
            state
                .containers
                .entry(container.to_owned())
                .or_insert_with(|| ContainerState::new(ContainerAccess::Private))
                .blobs
                .insert(blob.to_owned(), BlobState::new(content.into()));
        });
    }

    /// Whether the container exists and is not being deleted.
    pub fn has_live_container(&self, container: &str) -> bool {
        self.with_state(|state| {
            state
                .containers
                .get(container)
                .map_or(false, ContainerState::is_live)
        })
    }

    pub fn container_access(&self, container: &str) -> Option<ContainerAccess> {
        self.with_state(|state| state.containers.get(container).map(|c| c.access))
    }

    pub fn blob_names(&self, container: &str) -> Vec<String> {
        self.with_state(|state| {
            state
                .containers
                .get(container)
                .map(|c| c.blobs.keys().cloned().collect())
                .unwrap_or_default()
        })
    }

    pub fn blob_content(&self, container: &str, blob: &str) -> Option<Bytes> {
        self.with_state(|state| {
            state
                .containers
                .get(container)
                .and_then(|c| c.blobs.get(blob))
                .map(|b| b.content.clone())
        })
    }

    /// The real lease state, ignoring any override.
    pub fn lease_state(&self, container: &str, blob: &str) -> Option<LeaseState> {
        self.with_state(|state| {
            state
                .containers
                .get(container)
                .and_then(|c| c.blobs.get(blob))
                .map(|b| b.lease_state)
        })
    }

    fn url(&self, container: &str, blob: &str) -> azure_core::Result<Url> {
        let base = format!("https://{}.{MOCK_BLOB_DOMAIN}", self.name);
        let mut url = Url::parse(&base).map_err(|err| {
            Error::full(ErrorKind::DataConversion, err, format!("invalid url {base}"))
        })?;
        url.path_segments_mut()
            .map_err(|_| Error::message(ErrorKind::DataConversion, "url cannot be a base"))?
            .pop_if_empty()
            .push(container)
            .push(blob);
        Ok(url)
    }
}

fn cannot_verify_copy_source(source: &Url) -> Error {
    http_error(
        StatusCode::NotFound,
        codes::CANNOT_VERIFY_COPY_SOURCE,
        format!("copy source {source} is not readable"),
    )
}

/// Splits `https://{account}.blob.mock.invalid/{container}/{blob}`.
fn parse_source(source: &Url) -> Option<(String, String, String)> {
    let account = source
        .host_str()?
        .strip_suffix(MOCK_BLOB_DOMAIN)?
        .strip_suffix('.')?
        .to_owned();
    let mut segments = source.path_segments()?;
    let container = segments.next()?.to_owned();
    let blob = segments.collect::<Vec<_>>().join("/");
    if blob.is_empty() {
        return None;
    }
    Some((account, container, blob))
}

#[async_trait]
impl StorageAccount for MockAccount {
    fn account_name(&self) -> &str {
        &self.name
    }

    async fn create_container(
        &self,
        container: &str,
        access: ContainerAccess,
    ) -> azure_core::Result<()> {
        self.call(Operation::CreateContainer, container, None, |state| {
            if state.observe_container(container) {
                let live = state
                    .containers
                    .get(container)
                    .map_or(false, ContainerState::is_live);
                return Err(if live {
                    http_error(
                        StatusCode::Conflict,
                        codes::CONTAINER_ALREADY_EXISTS,
                        format!("container {container} already exists"),
                    )
                } else {
                    http_error(
                        StatusCode::Conflict,
                        codes::CONTAINER_BEING_DELETED,
                        format!("container {container} is being deleted"),
                    )
                });
            }
            state
                .containers
                .insert(container.to_owned(), ContainerState::new(access));
            Ok(())
        })
    }

    async fn delete_container(&self, container: &str) -> azure_core::Result<()> {
        self.call(Operation::DeleteContainer, container, None, |state| {
            let lag = state.deletion_lag;
            let Some(existing) = state.containers.get_mut(container) else {
                return Err(http_error(
                    StatusCode::NotFound,
                    codes::CONTAINER_NOT_FOUND,
                    format!("container {container} does not exist"),
                ));
            };
            if !existing.is_live() {
                return Err(http_error(
                    StatusCode::Conflict,
                    codes::CONTAINER_BEING_DELETED,
                    format!("container {container} is being deleted"),
                ));
            }
            if lag > 0 {
                existing.phase = Phase::Deleting(lag);
                existing.blobs.clear();
                return Ok(());
            }
            state.containers.remove(container);
            Ok(())
        })
    }

    async fn container_exists(&self, container: &str) -> azure_core::Result<bool> {
        self.call(Operation::ContainerExists, container, None, |state| {
            Ok(state.observe_container(container))
        })
    }

    async fn list_blobs(&self, container: &str) -> azure_core::Result<Vec<String>> {
        self.call(Operation::ListBlobs, container, None, |state| {
            Ok(state.live_container(container)?.blobs.keys().cloned().collect())
        })
    }

    async fn upload_blob(
        &self,
        container: &str,
        blob: &str,
        body: Bytes,
    ) -> azure_core::Result<()> {
        self.call(Operation::UploadBlob, container, Some(blob), |state| {
            let existing = state.live_container(container)?;
            if existing.blobs.contains_key(blob) {
                return Err(http_error(
                    StatusCode::Conflict,
                    codes::BLOB_ALREADY_EXISTS,
                    format!("blob {container}/{blob} already exists"),
                ));
            }
            existing
                .blobs
                .insert(blob.to_owned(), BlobState::new(body));
            Ok(())
        })
    }

    fn blob_url(&self, container: &str, blob: &str) -> azure_core::Result<Url> {
        self.url(container, blob)
    }

    async fn blob_properties(
        &self,
        container: &str,
        blob: &str,
    ) -> azure_core::Result<BlobProperties> {
        self.call(Operation::BlobProperties, container, Some(blob), |state| {
            let lease_state_override = state.lease_state_override;
            let existing = state.blob(container, blob)?;
            let length = existing.content.len() as u64;

            let mut properties = BlobProperties::new(
                length,
                lease_state_override.unwrap_or(existing.lease_state),
            );
            if let Some(copy) = existing.copy.as_mut() {
                copy.observe();
                let copied = if copy.status == CopyStatus::Success {
                    length
                } else {
                    0
                };
                properties.copy_status = Some(copy.status);
                properties.copy_progress = Some(format!("{copied}/{length}"));
                properties.copy_completion_time = copy.completion_time;
            }
            Ok(properties)
        })
    }

    async fn acquire_lease(
        &self,
        container: &str,
        blob: &str,
        _duration: LeaseDuration,
    ) -> azure_core::Result<LeaseId> {
        self.call(Operation::AcquireLease, container, Some(blob), |state| {
            let existing = state.blob(container, blob)?;
            if existing.lease_state == LeaseState::Leased {
                return Err(http_error(
                    StatusCode::Conflict,
                    codes::LEASE_ALREADY_PRESENT,
                    format!("blob {container}/{blob} is already leased"),
                ));
            }
            existing.lease_state = LeaseState::Leased;
            Ok(LeaseId::new(Uuid::new_v4()))
        })
    }

    async fn break_lease(&self, container: &str, blob: &str) -> azure_core::Result<()> {
        self.call(Operation::BreakLease, container, Some(blob), |state| {
            let existing = state.blob(container, blob)?;
            if existing.lease_state != LeaseState::Leased {
                return Err(http_error(
                    StatusCode::Conflict,
                    codes::LEASE_NOT_PRESENT_WITH_LEASE_OPERATION,
                    format!("blob {container}/{blob} has no active lease"),
                ));
            }
            existing.lease_state = LeaseState::Broken;
            Ok(())
        })
    }

    async fn start_copy(
        &self,
        container: &str,
        blob: &str,
        source: Url,
    ) -> azure_core::Result<CopyStatus> {
        let mut world = self.world();
        world.calls.push(Call {
            account: self.name.clone(),
            operation: Operation::StartCopy,
            container: container.to_owned(),
            blob: Some(blob.to_owned()),
        });
        world
            .accounts
            .entry(self.name.clone())
            .or_default()
            .check_failure(Operation::StartCopy)?;

        let (source_account, source_container, source_blob) =
            parse_source(&source).ok_or_else(|| cannot_verify_copy_source(&source))?;
        let content = {
            let readable = world
                .accounts
                .get(&source_account)
                .and_then(|account| account.containers.get(&source_container))
                .filter(|c| {
                    c.is_live()
                        && (source_account == self.name || c.access != ContainerAccess::Private)
                })
                .and_then(|c| c.blobs.get(&source_blob));
            match readable {
                Some(existing) => existing.content.clone(),
                None => return Err(cannot_verify_copy_source(&source)),
            }
        };

        let state = world.accounts.entry(self.name.clone()).or_default();
        let (lag, outcome) = (state.copy_lag, state.copy_outcome);
        let destination = state.live_container(container)?;
        let mut copied = BlobState::new(content);
        copied.copy = Some(CopyState::start(lag, outcome));
        let status = copied.copy.as_ref().map_or(CopyStatus::Pending, |c| c.status);
        destination.blobs.insert(blob.to_owned(), copied);
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lingering_deletion_blocks_creation() {
        let storage = MockStorage::new();
        let account = storage.account("acct");
        account.seed_container("c", ContainerAccess::Private);
        account.set_deletion_lag(2);

        account.delete_container("c").await.unwrap();
        assert!(account.container_exists("c").await.unwrap());
        let err = account
            .create_container("c", ContainerAccess::Private)
            .await
            .unwrap_err();
        assert!(storage_migration::error::has_error_code(
            &err,
            codes::CONTAINER_BEING_DELETED
        ));
        assert!(!account.container_exists("c").await.unwrap());
        account
            .create_container("c", ContainerAccess::Private)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn copies_settle_after_the_configured_reads() {
        let storage = MockStorage::new();
        let source = storage.account("src");
        let destination = storage.account("dst");
        source.seed_container("c", ContainerAccess::Container);
        source.seed_blob("c", "b", "payload");
        destination.seed_container("c", ContainerAccess::Private);
        destination.set_copy_lag(2);

        let url = source.blob_url("c", "b").unwrap();
        assert_eq!(url.as_str(), "https://src.blob.mock.invalid/c/b");
        let status = destination.start_copy("c", "b", url).await.unwrap();
        assert_eq!(status, CopyStatus::Pending);

        let first = destination.blob_properties("c", "b").await.unwrap();
        assert_eq!(first.copy_status, Some(CopyStatus::Pending));
        let second = destination.blob_properties("c", "b").await.unwrap();
        assert_eq!(second.copy_status, Some(CopyStatus::Success));
        assert!(second.copy_completion_time.is_some());
        assert_eq!(second.content_length, 7);
    }

    #[tokio::test]
    async fn private_sources_cannot_be_copied_across_accounts() {
        let storage = MockStorage::new();
        let source = storage.account("src");
        let destination = storage.account("dst");
        source.seed_container("c", ContainerAccess::Private);
        source.seed_blob("c", "b", "payload");
        destination.seed_container("c", ContainerAccess::Private);

        let url = source.blob_url("c", "b").unwrap();
        let err = destination.start_copy("c", "b", url).await.unwrap_err();
        assert!(storage_migration::error::has_error_code(
            &err,
            codes::CANNOT_VERIFY_COPY_SOURCE
        ));
    }

    #[tokio::test]
    async fn injected_failures_are_recorded() {
        let storage = MockStorage::new();
        let account = storage.account("acct");
        account.fail(Operation::ListBlobs, StatusCode::Forbidden);

        let err = account.list_blobs("c").await.unwrap_err();
        assert_eq!(
            storage_migration::error::http_status(&err),
            Some(StatusCode::Forbidden)
        );
        assert_eq!(storage.calls().len(), 1);
        assert_eq!(storage.calls()[0].operation, Operation::ListBlobs);
    }
}
