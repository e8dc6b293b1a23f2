use azure_core::error::{Error, ErrorKind};
use serde_derive::Serialize;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Public read access configured on a container at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAccess {
    /// Only authorized requests can read the container.
    Private,
    /// Anonymous clients can read blobs but cannot enumerate the container.
    Blob,
    /// Anonymous clients can read blobs and enumerate the container.
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseDuration {
    Infinite,
    /// Between 15 and 60 seconds.
    Seconds(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LeaseId(Uuid);

impl LeaseId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for LeaseId {
    type Err = Error;

    fn from_str(s: &str) -> azure_core::Result<Self> {
        Uuid::parse_str(s).map(Self).map_err(|err| {
            Error::full(
                ErrorKind::DataConversion,
                err,
                format!("invalid lease id '{s}'"),
            )
        })
    }
}

/// Lease state of a blob as reported by the service (`x-ms-lease-state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseState {
    Available,
    Leased,
    Expired,
    Breaking,
    Broken,
}

impl FromStr for LeaseState {
    type Err = Error;

    fn from_str(s: &str) -> azure_core::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "leased" => Ok(Self::Leased),
            "expired" => Ok(Self::Expired),
            "breaking" => Ok(Self::Breaking),
            "broken" => Ok(Self::Broken),
            _ => Err(Error::with_message(ErrorKind::DataConversion, || {
                format!("unknown lease state '{s}'")
            })),
        }
    }
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Available => "available",
            Self::Leased => "leased",
            Self::Expired => "expired",
            Self::Breaking => "breaking",
            Self::Broken => "broken",
        })
    }
}

/// Status of a server-side copy (`x-ms-copy-status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyStatus {
    Pending,
    Success,
    Aborted,
    Failed,
}

impl CopyStatus {
    /// Whether the service will no longer change this status on its own.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl FromStr for CopyStatus {
    type Err = Error;

    fn from_str(s: &str) -> azure_core::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "aborted" => Ok(Self::Aborted),
            "failed" => Ok(Self::Failed),
            _ => Err(Error::with_message(ErrorKind::DataConversion, || {
                format!("unknown copy status '{s}'")
            })),
        }
    }
}

impl fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        })
    }
}

/// The subset of blob properties the migration looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobProperties {
    pub content_length: u64,
    pub lease_state: LeaseState,
    pub copy_status: Option<CopyStatus>,
    pub copy_progress: Option<String>,
    pub copy_completion_time: Option<OffsetDateTime>,
}

impl BlobProperties {
    pub fn new(content_length: u64, lease_state: LeaseState) -> Self {
        Self {
            content_length,
            lease_state,
            copy_status: None,
            copy_progress: None,
            copy_completion_time: None,
        }
    }
}
