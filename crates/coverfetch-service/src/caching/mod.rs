//! # Cover Caching infrastructure
//!
//! Covers are requested over and over again while a user scrolls through their library, so the
//! pipeline caches them in a few layers. This module includes the building blocks of those
//! layers, the central [`CoverError`] type, and an explanation of how they fit together.
//!
//! ## Cache Layers
//!
//! - An in-memory [`IndirectionIndex`] which remembers *where* the cover of a request lives on
//!   disk. It never checks whether the file actually exists.
//! - A file-system layer which holds exactly one artifact per kept entity, at the path handed
//!   out by the [`CoverLocations`] collaborator.
//! - The origin itself, reached through an [`OriginClient`](crate::download::OriginClient).
//!
//! A request goes through the following steps, see [`CoverService`](crate::covers::CoverService)
//! for the details:
//!
//! - A custom cover, if the user supplied one, wins over everything else.
//! - References to local files are read directly and never cached.
//! - For kept entities, the file-system layer is consulted. On miss, the cover is downloaded and
//!   written through the [`AtomicWriter`], and the fresh file is served.
//! - For entities which are not kept, any cached file is removed and the cover is streamed from
//!   the origin without touching the disk.
//!
//! ### Metrics
//!
//! - `covers.access`: All accesses.
//! - `covers.disk.hit`: Accesses served by the file-system layer.
//! - `covers.network.fetch`: Requests made to an origin.
//! - `covers.file.write`: Covers written to disk. `covers.file.size` has their size in bytes.
//! - `covers.purge`: Cached covers removed because their entity is no longer kept.
//!
//! ## Atomic writes
//!
//! A cover is first written into a temporary file next to its destination, named after the
//! destination with a `.tmp` suffix, and then renamed over the destination. Readers thus either
//! see the previous artifact, no artifact, or the complete new one. Writes to the same
//! destination are serialized through [`PathLocks`], and a writer re-checks the destination once
//! it holds the lock, as another writer might have populated it in the meantime.
//!
//! ## [`Signature`]
//!
//! The [`Signature`] identifies a specific version of a cover, derived from its origin reference
//! and its last modification time. It is handed to display layers so they can invalidate
//! anything they derived from the cover.
//!
//! **NOTE**: The metadata the signature is hashed from must stay stable, as changing it
//! invalidates every derived artifact out there.

use std::io;
use std::path::Path;

mod error;
mod index;
mod locations;
mod locks;
mod signature;
mod writer;

pub use error::{CoverError, CoverResult};
pub use index::{IndirectionIndex, RequestKey};
pub use locations::{CoverLocations, DirCoverLocations};
pub use locks::{PathGuard, PathLocks};
pub use signature::Signature;
pub use writer::{AtomicWriter, TEMP_SUFFIX};

/// Opens the file at `path` for reading, mapping a missing file to `None`.
pub(crate) async fn open_if_exists(path: &Path) -> io::Result<Option<tokio::fs::File>> {
    match tokio::fs::File::open(path).await {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
