use coverfetch_sources::Entity;

/// What happens to the on-disk cover of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// The cover is cached on disk and served from there.
    Persist,
    /// Any cached cover is removed, and the cover is streamed from its origin.
    Purge,
}

/// Decides whether an entity's cover is cached on disk, based on whether the entity is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetentionPolicy;

impl RetentionPolicy {
    pub fn is_kept(&self, entity: &Entity) -> bool {
        entity.kept
    }

    pub fn decide(&self, entity: &Entity) -> Retention {
        if self.is_kept(entity) {
            Retention::Persist
        } else {
            Retention::Purge
        }
    }
}
