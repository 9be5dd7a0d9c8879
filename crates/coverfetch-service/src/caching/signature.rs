use std::fmt;
use std::fmt::Write;
use std::sync::Arc;

use sha2::{Digest, Sha256};

/// Identifies a specific version of a cover.
///
/// Two signatures are equal exactly when they were computed from the same origin reference and
/// the same last modification time. The [`as_key`](Self::as_key) rendering is a stable hash of
/// both, prefixed by the signature format [`VERSION`](Self::VERSION).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    origin_reference: Arc<str>,
    last_modified: i64,
}

impl Signature {
    /// Version of the signature format.
    ///
    /// Bump this whenever [`Self::metadata`] changes in a way that should invalidate
    /// derived artifacts.
    pub const VERSION: u32 = 1;

    /// Computes the signature of the cover at `origin_reference`, last modified at
    /// `last_modified` milliseconds since the epoch.
    pub fn compute(origin_reference: &str, last_modified: i64) -> Self {
        Self {
            origin_reference: origin_reference.into(),
            last_modified,
        }
    }

    pub fn origin_reference(&self) -> &str {
        &self.origin_reference
    }

    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    /// A textual description of everything the signature is derived from.
    pub fn metadata(&self) -> String {
        let mut metadata = String::new();
        writeln!(&mut metadata, "origin_reference: {}", self.origin_reference).unwrap();
        writeln!(&mut metadata, "last_modified: {}", self.last_modified).unwrap();
        metadata
    }

    /// Renders the signature as an opaque, stable string key.
    pub fn as_key(&self) -> String {
        let hash = Sha256::digest(self.metadata());
        format!("v{}/{}", Self::VERSION, hex::encode(hash))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_key())
    }
}
