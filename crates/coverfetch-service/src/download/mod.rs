//! Fetching covers from their origin.
//!
//! The [`OriginClient`] trait is the seam between the cover pipeline and the network. The
//! production implementation is [`HttpOriginClient`], which speaks HTTP(S) through `reqwest`.

use std::error::Error;
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use url::Url;

use coverfetch_sources::SourceConfig;

use crate::caching::{CoverError, CoverResult};

mod headers;
mod http;

pub use headers::HeaderCache;
pub use http::HttpOriginClient;

/// The body of a cover, as a stream of chunks.
pub type ByteStream = BoxStream<'static, CoverResult<Bytes>>;

/// Fetches covers from their origin.
#[async_trait]
pub trait OriginClient: Send + Sync + fmt::Debug {
    /// Requests the cover at `url` with the given request `headers`.
    ///
    /// Resolves once the origin responded successfully, with the response body as a stream.
    /// The body is not inspected, an empty body is detected by the consumer.
    async fn fetch(
        &self,
        url: &Url,
        source: Option<&SourceConfig>,
        headers: &HeaderMap,
    ) -> CoverResult<ByteStream>;
}

impl CoverError {
    fn download_error(mut error: &dyn Error) -> Self {
        while let Some(src) = error.source() {
            error = src;
        }

        let mut error_string = error.to_string();

        // Special-case a few error strings
        if error_string.contains("certificate verify failed") {
            error_string = "certificate verify failed".to_string();
        }

        if error_string.contains("SSL routines") {
            error_string = "SSL error".to_string();
        }

        Self::DownloadError(error_string)
    }

    /// Converts an unsuccessful response status to an error.
    pub(crate) fn from_status(url: &Url, status: StatusCode) -> Self {
        debug_assert!(!status.is_success());

        if matches!(status, StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED) {
            tracing::debug!("Insufficient permissions to download `{url}`: {status}");
            Self::PermissionDenied(status.to_string())
        } else if status.is_client_error() {
            // If it's a client error, chances are it's a 404.
            tracing::debug!("Unexpected client error status code from `{url}`: {status}");
            Self::NotFound
        } else {
            tracing::debug!("Unexpected status code from `{url}`: {status}");
            Self::DownloadError(status.to_string())
        }
    }
}

impl From<reqwest::Error> for CoverError {
    fn from(error: reqwest::Error) -> Self {
        Self::download_error(&error)
    }
}

/// Makes sure `body` has at least one non-empty chunk.
///
/// Waits for the first chunk with data and returns a stream which yields it again, followed
/// by the rest of `body`. Fails with [`CoverError::EmptyBody`] if `body` ends before that.
pub async fn non_empty(mut body: ByteStream) -> CoverResult<ByteStream> {
    let first = loop {
        match body.try_next().await? {
            Some(chunk) if chunk.is_empty() => continue,
            Some(chunk) => break chunk,
            None => return Err(CoverError::EmptyBody),
        }
    };

    Ok(stream::once(async move { Ok(first) }).chain(body).boxed())
}
