use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{OriginReference, SourceId};

/// Stable numeric identity of an [`Entity`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub(crate) i64);

impl EntityId {
    /// Creates a new [`EntityId`].
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The object on whose behalf a cover image is cached.
///
/// Only the attributes the cover pipeline cares about are modelled here. The `kept` flag is
/// owned by the library/collection layer and is read-only from the pipeline's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identity of the entity.
    pub id: EntityId,

    /// Whether the entity belongs to the user's persisted collection.
    #[serde(default)]
    pub kept: bool,

    /// Where the cover comes from, either a remote URL or a `file://` reference.
    pub origin_reference: String,

    /// The origin source that serves the cover, and whose headers apply.
    #[serde(default)]
    pub source_id: SourceId,

    /// Last known modification time of the cover artifact, in milliseconds.
    #[serde(default)]
    pub cover_last_modified: i64,
}

impl Entity {
    /// Creates a new, not kept entity.
    pub fn new(id: EntityId, source_id: SourceId, origin_reference: impl Into<String>) -> Self {
        Self {
            id,
            kept: false,
            origin_reference: origin_reference.into(),
            source_id,
            cover_last_modified: 0,
        }
    }

    /// Sets the kept flag.
    pub fn kept(mut self, kept: bool) -> Self {
        self.kept = kept;
        self
    }

    /// Sets the last known modification time of the cover.
    pub fn last_modified(mut self, millis: i64) -> Self {
        self.cover_last_modified = millis;
        self
    }

    /// Parses the entity's own origin reference.
    pub fn origin(&self) -> anyhow::Result<OriginReference> {
        self.origin_reference.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_from_json() {
        let json = r#"{
            "id": 42,
            "kept": true,
            "origin_reference": "https://example.com/cover.jpg",
            "source_id": 3,
            "cover_last_modified": 1700000000000
        }"#;
        let entity: Entity = serde_json::from_str(json).unwrap();

        assert_eq!(entity.id, EntityId::new(42));
        assert!(entity.kept);
        assert_eq!(entity.source_id, SourceId::new(3));
        assert_eq!(entity.cover_last_modified, 1_700_000_000_000);
    }

    #[test]
    fn test_entity_defaults() {
        let json = r#"{ "id": 1, "origin_reference": "file:///covers/1.png" }"#;
        let entity: Entity = serde_json::from_str(json).unwrap();

        assert!(!entity.kept);
        assert_eq!(entity.source_id, SourceId::default());
        assert!(matches!(entity.origin(), Ok(OriginReference::Local(_))));
    }
}
