use std::path::PathBuf;
use std::sync::Arc;

use coverfetch_sources::EntityId;
use moka::policy::EvictionPolicy;

/// Identifies a single cover request: the origin reference being asked for and the entity
/// asking for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    origin_reference: Arc<str>,
    entity: EntityId,
}

impl RequestKey {
    pub fn new(origin_reference: &str, entity: EntityId) -> Self {
        Self {
            origin_reference: origin_reference.into(),
            entity,
        }
    }
}

/// A bounded in-memory map from [`RequestKey`]s to the on-disk location of their cover.
///
/// Entries are evicted in least-recently-used order once the capacity is exceeded. The index
/// only memoizes path computations, it never checks that a file exists at the path.
#[derive(Debug, Clone)]
pub struct IndirectionIndex {
    paths: moka::sync::Cache<RequestKey, PathBuf>,
}

impl IndirectionIndex {
    pub fn new(capacity: u64) -> Self {
        let paths = moka::sync::Cache::builder()
            .name("cover-paths")
            .max_capacity(capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { paths }
    }

    /// Returns the path stored for `key`, computing and storing it with `resolve` on miss.
    pub fn get_or_put(&self, key: RequestKey, resolve: impl FnOnce() -> PathBuf) -> PathBuf {
        self.paths.get_with(key, resolve)
    }

    pub fn invalidate(&self, key: &RequestKey) {
        self.paths.invalidate(key);
    }

    /// The approximate number of entries, see [`moka::sync::Cache::entry_count`].
    pub fn entry_count(&self) -> u64 {
        self.paths.entry_count()
    }
}
