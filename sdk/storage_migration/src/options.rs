use crate::{blob::LeaseDuration, poll::PollOptions};
use std::{path::PathBuf, time::Duration};

pub const DEFAULT_CONTAINER_NAME: &str = "df-container-1";
pub const DEFAULT_LOCAL_DIR: &str = "Blobs";
pub const DEFAULT_BLOB_COUNT: usize = 100;

/// Knobs of a migration run. The defaults reproduce the classic workflow:
/// one hundred sample blobs in `df-container-1`, staged under `Blobs/`.
#[derive(Debug, Clone)]
pub struct MigrationOptions {
    pub container_name: String,
    pub local_dir: PathBuf,
    pub blob_count: usize,
    pub lease_duration: LeaseDuration,
    /// Bounds the wait for deleted containers to disappear, and the retries of
    /// container creation while the service still reports the old one.
    pub deletion_poll: PollOptions,
    /// Bounds the wait for each server-side copy to reach a terminal status.
    pub copy_poll: PollOptions,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            container_name: DEFAULT_CONTAINER_NAME.to_owned(),
            local_dir: PathBuf::from(DEFAULT_LOCAL_DIR),
            blob_count: DEFAULT_BLOB_COUNT,
            lease_duration: LeaseDuration::Infinite,
            deletion_poll: PollOptions::new(
                Duration::from_millis(500),
                Duration::from_secs(8),
                Duration::from_secs(40),
            ),
            copy_poll: PollOptions::new(
                Duration::from_millis(250),
                Duration::from_secs(4),
                Duration::from_secs(60),
            ),
        }
    }
}

impl MigrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn container_name(mut self, container_name: impl Into<String>) -> Self {
        self.container_name = container_name.into();
        self
    }

    #[must_use]
    pub fn local_dir(mut self, local_dir: impl Into<PathBuf>) -> Self {
        self.local_dir = local_dir.into();
        self
    }

    #[must_use]
    pub fn blob_count(mut self, blob_count: usize) -> Self {
        self.blob_count = blob_count;
        self
    }

    #[must_use]
    pub fn lease_duration(mut self, lease_duration: LeaseDuration) -> Self {
        self.lease_duration = lease_duration;
        self
    }

    #[must_use]
    pub fn deletion_poll(mut self, deletion_poll: PollOptions) -> Self {
        self.deletion_poll = deletion_poll;
        self
    }

    #[must_use]
    pub fn copy_poll(mut self, copy_poll: PollOptions) -> Self {
        self.copy_poll = copy_poll;
        self
    }
}
