use azure_core::{
    error::{Error, ErrorKind},
    StatusCode,
};

/// `x-ms-error-code` values the migration reacts to.
pub mod codes {
    pub const CONTAINER_NOT_FOUND: &str = "ContainerNotFound";
    pub const CONTAINER_ALREADY_EXISTS: &str = "ContainerAlreadyExists";
    pub const CONTAINER_BEING_DELETED: &str = "ContainerBeingDeleted";
    pub const BLOB_NOT_FOUND: &str = "BlobNotFound";
    pub const BLOB_ALREADY_EXISTS: &str = "BlobAlreadyExists";
    pub const LEASE_ALREADY_PRESENT: &str = "LeaseAlreadyPresent";
    pub const LEASE_NOT_PRESENT_WITH_LEASE_OPERATION: &str = "LeaseNotPresentWithLeaseOperation";
    pub const CANNOT_VERIFY_COPY_SOURCE: &str = "CannotVerifyCopySource";
}

/// Builds the error the storage service would answer with.
pub fn http_error(status: StatusCode, error_code: &str, message: impl Into<String>) -> Error {
    Error::message(
        ErrorKind::HttpResponse {
            status,
            error_code: Some(error_code.to_owned()),
        },
        message.into(),
    )
}

pub fn http_status(error: &Error) -> Option<StatusCode> {
    match error.kind() {
        ErrorKind::HttpResponse { status, .. } => Some(*status),
        _ => None,
    }
}

pub fn error_code(error: &Error) -> Option<&str> {
    match error.kind() {
        ErrorKind::HttpResponse { error_code, .. } => error_code.as_deref(),
        _ => None,
    }
}

pub fn has_error_code(error: &Error, code: &str) -> bool {
    error_code(error) == Some(code)
}

pub fn is_not_found(error: &Error) -> bool {
    http_status(error) == Some(StatusCode::NotFound)
}
