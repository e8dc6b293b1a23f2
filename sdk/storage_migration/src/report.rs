use crate::blob::{CopyStatus, LeaseId};
use azure_core::error::{ErrorKind, ResultExt};
use serde_derive::Serialize;
use std::io::Write;
use time::OffsetDateTime;

/// What happened to one blob during the copy step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobCopyReport {
    pub name: String,
    pub lease_id: LeaseId,
    /// Last status observed on the destination blob.
    pub status: CopyStatus,
    pub progress: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completion_time: Option<OffsetDateTime>,
    pub size: u64,
    /// Whether the runner broke the source lease after the copy.
    pub lease_broken: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub container: String,
    pub uploaded: Vec<String>,
    pub copies: Vec<BlobCopyReport>,
}

impl MigrationReport {
    pub fn succeeded(&self) -> usize {
        self.count(CopyStatus::Success)
    }

    pub fn pending(&self) -> usize {
        self.count(CopyStatus::Pending)
    }

    /// Copies the service gave up on, whether failed or aborted.
    pub fn failed(&self) -> usize {
        self.copies.len() - self.succeeded() - self.pending()
    }

    fn count(&self, status: CopyStatus) -> usize {
        self.copies
            .iter()
            .filter(|copy| copy.status == status)
            .count()
    }

    pub fn write_json<W: Write>(&self, writer: W) -> azure_core::Result<()> {
        serde_json::to_writer_pretty(writer, self)
            .context(ErrorKind::DataConversion, "failed to serialize migration report")
    }
}
