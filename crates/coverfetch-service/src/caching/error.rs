use std::io;
use std::time::Duration;

use thiserror::Error;

/// An error that happens while resolving a cover.
///
/// A cache miss is not an error, it is the regular trigger to go to the origin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoverError {
    /// The cover was not found at the origin, or a local file does not exist.
    #[error("not found")]
    NotFound,
    /// The cover could not be fetched from the origin due to missing permissions.
    ///
    /// The attached string contains the origin's response status.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The cover could not be fetched from the origin due to a timeout.
    #[error("download timed out after {0:?}")]
    Timeout(Duration),
    /// The cover could not be fetched from the origin due to another problem,
    /// like connection loss, DNS resolution, or a 5xx server response.
    #[error("download failed: {0}")]
    DownloadError(String),
    /// The origin responded successfully, but without any content.
    #[error("origin returned no data")]
    EmptyBody,
    /// Reading, writing or renaming a local file failed.
    #[error("i/o failure: {0}")]
    Io(String),
    /// The origin reference is neither a remote URL nor a local file reference.
    #[error("invalid origin reference: {0}")]
    InvalidReference(String),
    /// The request was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,
}

/// The result of resolving a cover.
pub type CoverResult<T> = Result<T, CoverError>;

impl From<io::Error> for CoverError {
    #[track_caller]
    fn from(err: io::Error) -> Self {
        Self::from_io_error(err)
    }
}

impl CoverError {
    #[track_caller]
    pub fn from_io_error(err: io::Error) -> Self {
        let location = std::panic::Location::caller();
        tracing::error!(error = &err as &dyn std::error::Error, %location, "cover i/o failure");
        Self::Io(err.to_string())
    }

    /// Whether this error was caused by the origin, as opposed to the local disk.
    pub fn is_origin_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound
                | Self::PermissionDenied(_)
                | Self::Timeout(_)
                | Self::DownloadError(_)
                | Self::EmptyBody
        )
    }

    /// A short, stable name of the error variant, used to tag metrics.
    pub fn metrics_tag(&self) -> &'static str {
        match self {
            Self::NotFound => "notfound",
            Self::PermissionDenied(_) => "permissiondenied",
            Self::Timeout(_) => "timeout",
            Self::DownloadError(_) => "downloaderror",
            Self::EmptyBody => "emptybody",
            Self::Io(_) => "io",
            Self::InvalidReference(_) => "invalidreference",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let err: CoverError = io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into();
        assert_eq!(err, CoverError::Io("read-only".into()));
        assert!(!err.is_origin_error());
        assert_eq!(err.metrics_tag(), "io");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            CoverError::Timeout(Duration::from_secs(3)).to_string(),
            "download timed out after 3s"
        );
        assert_eq!(CoverError::EmptyBody.to_string(), "origin returned no data");
    }
}
