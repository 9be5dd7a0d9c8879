//! Resolving the cover of an entity.
//!
//! The [`CoverService`] is the entry point of the pipeline. See the [`caching`](crate::caching)
//! module for an overview of the layers a request passes through.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use coverfetch_sources::Entity;

use crate::caching::{
    AtomicWriter, CoverError, CoverLocations, CoverResult, DirCoverLocations, IndirectionIndex,
    PathLocks, RequestKey, Signature, open_if_exists,
};
use crate::config::Config;
use crate::download::{ByteStream, HeaderCache, HttpOriginClient, OriginClient, non_empty};
use crate::sources::SourceResolver;
use crate::utils::http::DownloadTimeouts;

mod origin;
mod retention;

pub use origin::{Origin, RemoteOrigin};
pub use retention::{Retention, RetentionPolicy};

/// Where a [`Cover`] was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    /// The cached cover file of a kept entity.
    Disk,
    /// The origin, either streamed directly or through a freshly written cache file.
    Network,
    /// A local file the origin reference points to.
    Local,
    /// A cover supplied by the user.
    Custom,
}

impl ServedFrom {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Network => "network",
            Self::Local => "local",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for ServedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The contents of a [`Cover`].
pub enum CoverBody {
    /// An opened file, positioned at its start.
    File(tokio::fs::File),
    /// A stream of chunks coming straight from the origin.
    Stream(ByteStream),
}

/// A resolved cover, ready to be read.
pub struct Cover {
    served_from: ServedFrom,
    path: Option<PathBuf>,
    body: CoverBody,
}

impl Cover {
    fn file(served_from: ServedFrom, path: PathBuf, file: tokio::fs::File) -> Self {
        Self {
            served_from,
            path: Some(path),
            body: CoverBody::File(file),
        }
    }

    fn stream(body: ByteStream) -> Self {
        Self {
            served_from: ServedFrom::Network,
            path: None,
            body: CoverBody::Stream(body),
        }
    }

    pub fn served_from(&self) -> ServedFrom {
        self.served_from
    }

    /// The file the cover is read from, if it is not streamed from the origin.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn into_body(self) -> CoverBody {
        self.body
    }

    /// Turns the cover into a stream of chunks, regardless of where it is read from.
    pub fn into_stream(self) -> ByteStream {
        match self.body {
            CoverBody::File(file) => ReaderStream::new(file).map_err(CoverError::from).boxed(),
            CoverBody::Stream(body) => body,
        }
    }

    /// Reads the whole cover into memory.
    pub async fn into_bytes(self) -> CoverResult<Bytes> {
        match self.body {
            CoverBody::File(mut file) => {
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).await?;
                Ok(buf.into())
            }
            CoverBody::Stream(body) => {
                let buf = body
                    .try_fold(BytesMut::new(), |mut buf, chunk| async move {
                        buf.extend_from_slice(&chunk);
                        Ok(buf)
                    })
                    .await?;
                Ok(buf.freeze())
            }
        }
    }
}

impl fmt::Debug for Cover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cover")
            .field("served_from", &self.served_from)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Resolves entities to their cover, caching covers of kept entities on disk.
#[derive(Debug, Clone)]
pub struct CoverService {
    locations: Arc<dyn CoverLocations>,
    sources: Arc<dyn SourceResolver>,
    client: Arc<dyn OriginClient>,
    headers: HeaderCache,
    index: IndirectionIndex,
    locks: Arc<PathLocks>,
    writer: AtomicWriter,
    retention: RetentionPolicy,
}

impl CoverService {
    pub fn new(
        locations: Arc<dyn CoverLocations>,
        sources: Arc<dyn SourceResolver>,
        client: Arc<dyn OriginClient>,
        index_capacity: u64,
    ) -> Self {
        Self {
            locations,
            sources,
            client,
            headers: HeaderCache::new(),
            index: IndirectionIndex::new(index_capacity),
            locks: Arc::new(PathLocks::new()),
            writer: AtomicWriter,
            retention: RetentionPolicy,
        }
    }

    /// Creates a service which lays out covers and talks to origins as `config` says.
    pub fn from_config(config: &Config, sources: Arc<dyn SourceResolver>) -> anyhow::Result<Self> {
        let timeouts = DownloadTimeouts::from_config(config);
        let client =
            HttpOriginClient::from_timeouts(timeouts).context("failed to create HTTP client")?;
        let locations = DirCoverLocations::from_config(config);

        Ok(Self::new(
            Arc::new(locations),
            sources,
            Arc::new(client),
            config.index_capacity,
        ))
    }

    /// Computes the [`Signature`] of the cover that [`resolve`](Self::resolve) serves for
    /// `entity`.
    ///
    /// An existing custom cover is identified by the entity instead of its origin reference.
    pub fn cache_key(&self, entity: &Entity) -> Signature {
        let has_custom = self
            .locations
            .custom_location_for(entity)
            .is_some_and(|path| path.is_file());

        if has_custom {
            let reference = format!("custom:{}", entity.id);
            Signature::compute(&reference, entity.cover_last_modified)
        } else {
            Signature::compute(&entity.origin_reference, entity.cover_last_modified)
        }
    }

    /// Resolves the cover of `entity`.
    ///
    /// The cover is fetched from `origin_override` instead of the entity's own origin reference,
    /// if one is given.
    #[tracing::instrument(skip_all, fields(entity = %entity.id))]
    pub async fn resolve(
        &self,
        entity: &Entity,
        origin_override: Option<&str>,
    ) -> CoverResult<Cover> {
        metric!(counter("covers.access") += 1);

        let result = self.resolve_inner(entity, origin_override).await;
        match &result {
            Ok(cover) => {
                tracing::trace!("Serving cover from {}", cover.served_from());
            }
            Err(error) => {
                metric!(counter("covers.error") += 1, "reason" => error.metrics_tag());
                tracing::debug!(%error, "Failed to resolve cover");
            }
        }
        result
    }

    /// Resolves the cover of `entity` like [`resolve`](Self::resolve), giving up once `token`
    /// is cancelled.
    ///
    /// Partially written cache files are cleaned up before [`CoverError::Cancelled`] is returned.
    pub async fn resolve_until_cancelled(
        &self,
        entity: &Entity,
        origin_override: Option<&str>,
        token: &CancellationToken,
    ) -> CoverResult<Cover> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(CoverError::Cancelled),
            result = self.resolve(entity, origin_override) => result,
        }
    }

    async fn resolve_inner(
        &self,
        entity: &Entity,
        origin_override: Option<&str>,
    ) -> CoverResult<Cover> {
        if let Some(cover) = self.custom_cover(entity).await? {
            return Ok(cover);
        }

        let reference = origin_override.unwrap_or(&entity.origin_reference);
        let origin =
            Origin::for_reference(reference, entity.source_id, &*self.sources, &self.headers)
                .await?;

        let remote = match origin {
            Origin::Local(path) => return local_cover(path).await,
            Origin::Remote(remote) => remote,
        };

        match self.retention.decide(entity) {
            // Cached under the reference actually fetched, so an override never lands in the
            // entity's own cache file.
            Retention::Persist => {
                let key = RequestKey::new(reference, entity.id);
                let path = self
                    .index
                    .get_or_put(key, || self.locations.location_for_reference(reference));
                self.cached_cover(entity, &remote, path).await
            }
            Retention::Purge => {
                let key = RequestKey::new(&entity.origin_reference, entity.id);
                let path = self
                    .index
                    .get_or_put(key, || self.locations.location_for(entity));
                if let Err(error) = self.purge_path(&path).await {
                    tracing::warn!(%error, "Failed to purge cover of unkept entity");
                }
                self.streamed_cover(&remote).await
            }
        }
    }

    async fn custom_cover(&self, entity: &Entity) -> CoverResult<Option<Cover>> {
        let Some(path) = self.locations.custom_location_for(entity) else {
            return Ok(None);
        };
        let Some(file) = open_if_exists(&path).await? else {
            return Ok(None);
        };

        metric!(counter("covers.custom") += 1);
        Ok(Some(Cover::file(ServedFrom::Custom, path, file)))
    }

    async fn cached_cover(
        &self,
        entity: &Entity,
        remote: &RemoteOrigin,
        path: PathBuf,
    ) -> CoverResult<Cover> {
        if let Some(file) = open_fresh(entity, &path).await? {
            metric!(counter("covers.disk.hit") += 1);
            return Ok(Cover::file(ServedFrom::Disk, path, file));
        }

        let _guard = self.locks.lock(&path).await;

        // Another writer might have populated the file while we were waiting for the lock.
        if let Some(file) = open_fresh(entity, &path).await? {
            metric!(counter("covers.disk.hit") += 1);
            return Ok(Cover::file(ServedFrom::Disk, path, file));
        }

        let body = self.fetch(remote).await?;
        let size = self.writer.write(&path, body).await?;
        metric!(counter("covers.file.write") += 1);
        metric!(time_raw("covers.file.size") = size);

        let file = tokio::fs::File::open(&path).await?;
        Ok(Cover::file(ServedFrom::Network, path, file))
    }

    async fn streamed_cover(&self, remote: &RemoteOrigin) -> CoverResult<Cover> {
        let body = self.fetch(remote).await?;
        let body = non_empty(body).await?;
        Ok(Cover::stream(body))
    }

    async fn fetch(&self, remote: &RemoteOrigin) -> CoverResult<ByteStream> {
        metric!(counter("covers.network.fetch") += 1);
        let start = Instant::now();

        let result = self
            .client
            .fetch(&remote.url, remote.source.as_deref(), &remote.headers)
            .await;

        let status = match &result {
            Ok(_) => "ok",
            Err(error) => error.metrics_tag(),
        };
        metric!(timer("covers.network.duration") = start.elapsed(), "status" => status);

        result
    }

    /// Removes the cached cover of `entity`, returning whether there was one.
    pub async fn purge(&self, entity: &Entity) -> CoverResult<bool> {
        let path = self.locations.location_for(entity);
        let _guard = self.locks.lock(&path).await;
        self.purge_path(&path).await
    }

    async fn purge_path(&self, path: &Path) -> CoverResult<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                metric!(counter("covers.purge") += 1);
                tracing::debug!("Purged cached cover {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

async fn local_cover(path: PathBuf) -> CoverResult<Cover> {
    match open_if_exists(&path).await? {
        Some(file) => {
            metric!(counter("covers.local") += 1);
            Ok(Cover::file(ServedFrom::Local, path, file))
        }
        None => Err(CoverError::NotFound),
    }
}

/// Opens the cached cover at `path`, unless it is missing or older than the entity's cover.
async fn open_fresh(entity: &Entity, path: &Path) -> CoverResult<Option<tokio::fs::File>> {
    let Some(file) = open_if_exists(path).await? else {
        return Ok(None);
    };

    if entity.cover_last_modified > 0 {
        let modified = file.metadata().await?.modified()?;
        if unix_millis(modified) < entity.cover_last_modified {
            tracing::debug!("Cached cover {} is outdated", path.display());
            return Ok(None);
        }
    }

    Ok(Some(file))
}

fn unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis() as i64)
}
