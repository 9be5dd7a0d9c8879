use std::path::PathBuf;
use std::sync::Arc;

use reqwest::header::HeaderMap;
use url::Url;

use coverfetch_sources::{OriginReference, SourceConfig, SourceId};

use crate::caching::{CoverError, CoverResult};
use crate::download::HeaderCache;
use crate::sources::SourceResolver;

/// Where a cover request is answered from.
#[derive(Debug, Clone)]
pub enum Origin {
    /// A cover behind a remote URL, fetched with the headers of its source.
    Remote(RemoteOrigin),
    /// A cover in a local file, which is read directly and never cached.
    Local(PathBuf),
}

/// A remote cover together with everything needed to request it.
#[derive(Debug, Clone)]
pub struct RemoteOrigin {
    pub url: Url,
    pub source: Option<Arc<SourceConfig>>,
    pub headers: Arc<HeaderMap>,
}

impl Origin {
    /// Classifies `reference` and, for remote covers, looks up the source and its headers.
    pub async fn for_reference(
        reference: &str,
        source_id: SourceId,
        sources: &dyn SourceResolver,
        headers: &HeaderCache,
    ) -> CoverResult<Self> {
        let reference: OriginReference = reference
            .parse()
            .map_err(|e: anyhow::Error| CoverError::InvalidReference(e.to_string()))?;

        match reference {
            OriginReference::Local(path) => Ok(Self::Local(path)),
            OriginReference::Remote(url) => {
                let source = sources.source_for(source_id).await;
                if source.is_none() {
                    tracing::debug!(source = %source_id, "Fetching cover of unknown source");
                }
                let headers = headers.headers_for(source_id, source.as_deref());

                Ok(Self::Remote(RemoteOrigin {
                    url,
                    source,
                    headers,
                }))
            }
        }
    }
}
