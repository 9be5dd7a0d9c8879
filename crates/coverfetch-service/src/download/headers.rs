use std::sync::Arc;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};

use coverfetch_sources::{SourceConfig, SourceId};

/// Memoizes the request headers sent to the origin of each source.
///
/// The headers are computed from a source the first time it is asked for, and reused for every
/// later request of that source. Requests for an unknown source get no headers at all.
#[derive(Debug, Clone)]
pub struct HeaderCache {
    headers: moka::sync::Cache<SourceId, Arc<HeaderMap>>,
}

impl Default for HeaderCache {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderCache {
    pub fn new() -> Self {
        let headers = moka::sync::Cache::builder().name("origin-headers").build();
        Self { headers }
    }

    pub fn headers_for(
        &self,
        source_id: SourceId,
        source: Option<&SourceConfig>,
    ) -> Arc<HeaderMap> {
        let Some(source) = source else {
            return Arc::default();
        };

        self.headers
            .get_with(source_id, || Arc::new(build_headers(source)))
    }
}

/// Builds the headers declared by `source`.
///
/// Unless the source declares its own, the `User-Agent` is explicitly sent empty, which
/// overrides the default one of the HTTP client.
fn build_headers(source: &SourceConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::USER_AGENT, HeaderValue::from_static(""));

    for (name, value) in &source.headers {
        let name = match HeaderName::try_from(name.as_str()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!(source = %source.id, "Skipping invalid header name `{name}`");
                continue;
            }
        };
        let value = match HeaderValue::try_from(value.as_str()) {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(source = %source.id, "Skipping invalid value of header `{name}`");
                continue;
            }
        };
        headers.insert(name, value);
    }

    headers
}
