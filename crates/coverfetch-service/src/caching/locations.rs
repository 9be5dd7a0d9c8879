use std::fmt;
use std::path::{Path, PathBuf};

use coverfetch_sources::Entity;
use sha2::{Digest, Sha256};

use crate::config::Config;

/// Hands out the on-disk locations of covers.
pub trait CoverLocations: Send + Sync + fmt::Debug {
    /// The path at which the cover fetched from `reference` is cached.
    fn location_for_reference(&self, reference: &str) -> PathBuf;

    /// The path at which the cached cover of `entity` lives.
    fn location_for(&self, entity: &Entity) -> PathBuf {
        self.location_for_reference(&entity.origin_reference)
    }

    /// The path at which a user supplied cover of `entity` would live, if custom covers are
    /// enabled at all.
    fn custom_location_for(&self, entity: &Entity) -> Option<PathBuf>;
}

/// Lays out covers flat inside a directory.
///
/// Cached covers are named after the hash of their origin reference, custom covers after the
/// hash of their entity id.
#[derive(Debug, Clone)]
pub struct DirCoverLocations {
    covers_dir: PathBuf,
    custom_covers_dir: Option<PathBuf>,
}

impl DirCoverLocations {
    pub fn new(covers_dir: impl Into<PathBuf>, custom_covers_dir: Option<PathBuf>) -> Self {
        Self {
            covers_dir: covers_dir.into(),
            custom_covers_dir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.covers_dir.clone(), config.custom_covers_dir.clone())
    }

    pub fn covers_dir(&self) -> &Path {
        &self.covers_dir
    }
}

fn hashed_name(input: &str) -> String {
    hex::encode(Sha256::digest(input))
}

impl CoverLocations for DirCoverLocations {
    fn location_for_reference(&self, reference: &str) -> PathBuf {
        self.covers_dir.join(hashed_name(reference))
    }

    fn custom_location_for(&self, entity: &Entity) -> Option<PathBuf> {
        let dir = self.custom_covers_dir.as_ref()?;
        Some(dir.join(hashed_name(&entity.id.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use coverfetch_sources::{EntityId, SourceId};

    use super::*;

    #[test]
    fn test_locations() {
        let entity = Entity::new(
            EntityId::new(42),
            SourceId::new(1),
            "https://example.com/cover.jpg",
        );

        let locations = DirCoverLocations::new("/covers", Some("/custom".into()));
        assert_eq!(
            locations.location_for(&entity),
            PathBuf::from(
                "/covers/f8ebf6e202ed59a990ae625477c0e2d9b29ae08b275dea388f16f0e562261a2f"
            )
        );
        assert_eq!(
            locations.custom_location_for(&entity),
            Some(PathBuf::from(
                "/custom/73475cb40a568e8da8a045ced110137e159f890ac4da883b6b17dc651b3a8049"
            ))
        );

        assert_eq!(
            locations.location_for_reference("https://example.com/cover.jpg"),
            locations.location_for(&entity)
        );
        assert_ne!(
            locations.location_for_reference("https://example.com/other.jpg"),
            locations.location_for(&entity)
        );

        let locations = DirCoverLocations::new("/covers", None);
        assert_eq!(locations.custom_location_for(&entity), None);
    }
}
