//! Types describing cover origins and the entities that own cover images.
//!
//! Includes the configuration of origin sources, the entity reference the cover pipeline
//! works on, and parsing of origin references into remote URLs or local files.

#![warn(missing_docs)]

mod entity;
mod reference;
mod sources;

pub use entity::*;
pub use reference::*;
pub use sources::*;
