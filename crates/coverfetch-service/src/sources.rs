//! Looking up the [`SourceConfig`] of an origin.
//!
//! The catalog of sources can be declared inline in the [`Config`], read from a YAML file which
//! is periodically re-read, or be supplied later on through [`DeferredSources`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use coverfetch_sources::{SourceConfig, SourceId};

use crate::config::Config;
use crate::utils::cached_field::CachedField;
use crate::utils::deferred::DeferredField;

/// Resolves a [`SourceId`] to its configuration.
#[async_trait]
pub trait SourceResolver: Send + Sync + fmt::Debug {
    async fn source_for(&self, id: SourceId) -> Option<Arc<SourceConfig>>;
}

/// A fixed catalog of sources.
#[derive(Debug, Default)]
pub struct StaticSources {
    sources: HashMap<SourceId, Arc<SourceConfig>>,
}

impl StaticSources {
    pub fn new(sources: impl IntoIterator<Item = SourceConfig>) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.id, Arc::new(source)))
            .collect();
        Self { sources }
    }

    pub fn get(&self, id: SourceId) -> Option<Arc<SourceConfig>> {
        self.sources.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl SourceResolver for StaticSources {
    async fn source_for(&self, id: SourceId) -> Option<Arc<SourceConfig>> {
        self.get(id)
    }
}

/// A catalog of sources read from a YAML file.
///
/// The file is re-read once the loaded catalog is older than the refresh interval. If reading
/// fails, the previously loaded catalog stays in use. Reading happens on the blocking pool.
#[derive(Debug, Clone)]
pub struct FileSources {
    inner: Arc<FileSourcesInner>,
}

#[derive(Debug)]
struct FileSourcesInner {
    path: PathBuf,
    catalog: CachedField<Arc<StaticSources>>,
}

impl FileSources {
    pub fn new(path: impl Into<PathBuf>, refresh: Duration) -> Self {
        let inner = FileSourcesInner {
            path: path.into(),
            catalog: CachedField::new(refresh),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Creates the catalog and loads it right away, failing if the file cannot be read.
    ///
    /// This blocks on reading the file.
    pub fn load(path: impl Into<PathBuf>, refresh: Duration) -> anyhow::Result<Self> {
        let sources = Self::new(path, refresh);
        let inner = &sources.inner;
        inner.catalog.try_obtain(|| read_catalog(&inner.path))?;
        Ok(sources)
    }

    async fn catalog(&self) -> Option<Arc<StaticSources>> {
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || inner.catalog()).await {
            Ok(catalog) => catalog,
            Err(error) => {
                tracing::error!(error = %error, "Failed to look up the sources catalog");
                self.inner.catalog.peek()
            }
        }
    }
}

impl FileSourcesInner {
    fn catalog(&self) -> Option<Arc<StaticSources>> {
        match self.catalog.try_obtain(|| read_catalog(&self.path)) {
            Ok(catalog) => Some(catalog),
            Err(error) => {
                tracing::error!(
                    error = ?error,
                    "Failed to reload sources from {}",
                    self.path.display()
                );
                self.catalog.peek()
            }
        }
    }
}

fn read_catalog(path: &Path) -> anyhow::Result<Arc<StaticSources>> {
    let file = std::fs::File::open(path).context("failed to open sources file")?;
    let sources: Vec<SourceConfig> =
        serde_yaml::from_reader(file).context("failed to parse sources YAML")?;
    tracing::debug!("Loaded {} sources from {}", sources.len(), path.display());
    Ok(Arc::new(StaticSources::new(sources)))
}

#[async_trait]
impl SourceResolver for FileSources {
    async fn source_for(&self, id: SourceId) -> Option<Arc<SourceConfig>> {
        self.catalog().await?.get(id)
    }
}

/// A catalog of sources which becomes available at some later point.
///
/// Lookups wait until a catalog is [installed](Self::install). Requests which never consult the
/// catalog, like those for local files, are not held up.
#[derive(Debug, Default)]
pub struct DeferredSources {
    inner: DeferredField<Arc<dyn SourceResolver>>,
}

impl DeferredSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the catalog, handing it back if one was installed already.
    pub fn install(
        &self,
        resolver: Arc<dyn SourceResolver>,
    ) -> Result<(), Arc<dyn SourceResolver>> {
        self.inner.initialize(resolver)
    }

    pub fn is_installed(&self) -> bool {
        self.inner.is_initialized()
    }
}

#[async_trait]
impl SourceResolver for DeferredSources {
    async fn source_for(&self, id: SourceId) -> Option<Arc<SourceConfig>> {
        self.inner.get().await.source_for(id).await
    }
}

/// Creates the source catalog declared in `config`.
///
/// A `sources_file` takes precedence over inline `sources`.
pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn SourceResolver>> {
    Ok(match &config.sources_file {
        Some(path) => Arc::new(FileSources::load(path, config.sources_refresh)?),
        None => Arc::new(StaticSources::new(config.sources.iter().cloned())),
    })
}
