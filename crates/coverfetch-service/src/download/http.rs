//! Support to download covers from HTTP origins.

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use url::Url;

use coverfetch_sources::SourceConfig;

use super::{ByteStream, OriginClient};
use crate::caching::{CoverError, CoverResult};
use crate::utils::http::{DownloadTimeouts, create_client};

/// Downloader implementation that supports the HTTP source.
#[derive(Debug)]
pub struct HttpOriginClient {
    client: reqwest::Client,
    no_ssl_client: reqwest::Client,
    timeouts: DownloadTimeouts,
}

impl HttpOriginClient {
    pub fn new(
        client: reqwest::Client,
        no_ssl_client: reqwest::Client,
        timeouts: DownloadTimeouts,
    ) -> Self {
        Self {
            client,
            no_ssl_client,
            timeouts,
        }
    }

    pub fn from_timeouts(timeouts: DownloadTimeouts) -> reqwest::Result<Self> {
        let client = create_client(&timeouts, false)?;
        let no_ssl_client = create_client(&timeouts, true)?;
        Ok(Self::new(client, no_ssl_client, timeouts))
    }
}

#[async_trait]
impl OriginClient for HttpOriginClient {
    async fn fetch(
        &self,
        url: &Url,
        source: Option<&SourceConfig>,
        headers: &HeaderMap,
    ) -> CoverResult<ByteStream> {
        let client = match source {
            Some(source) if source.accept_invalid_certs => &self.no_ssl_client,
            _ => &self.client,
        };

        tracing::debug!("Fetching cover from `{}`", url);

        let request = client.get(url.clone()).headers(headers.clone()).send();
        let response = tokio::time::timeout(self.timeouts.head, request)
            .await
            .map_err(|_| CoverError::Timeout(self.timeouts.head))??;

        let status = response.status();
        if !status.is_success() {
            return Err(CoverError::from_status(url, status));
        }

        let max_download = self.timeouts.max_download;
        let body = response.bytes_stream().map_err(move |e| {
            if e.is_timeout() {
                CoverError::Timeout(max_download)
            } else {
                e.into()
            }
        });

        Ok(body.boxed())
    }
}
