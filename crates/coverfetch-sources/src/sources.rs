//! Origin source types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An identifier for origin sources.
///
/// This is essentially a newtype for the numeric id the catalog assigns to each source.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SourceId(pub(crate) i64);

impl SourceId {
    /// Creates a new [`SourceId`].
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SourceId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Configuration for a remote origin that serves cover images.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Unique source identifier.
    pub id: SourceId,

    /// Human readable name, only used for diagnostics.
    #[serde(default)]
    pub name: String,

    /// Additional headers to be sent to the origin with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// If true, it should be possible to download from this source
    /// even if SSL certificates can't be verified.
    ///
    /// Don't use this lightly!
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl SourceConfig {
    /// Creates a [`SourceConfig`] without any declared headers.
    pub fn new(id: SourceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            headers: Default::default(),
            accept_invalid_certs: false,
        }
    }

    /// Adds a declared header, replacing a previous value of the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_yaml() {
        let yaml = r#"
            - id: 2499283573021220255
              name: mangadex
              headers:
                Referer: https://mangadex.org/
            - id: 7
              accept_invalid_certs: true
        "#;
        let sources: Vec<SourceConfig> = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].id, SourceId::new(2499283573021220255));
        assert_eq!(
            sources[0].headers.get("Referer").map(String::as_str),
            Some("https://mangadex.org/")
        );
        assert!(sources[1].name.is_empty());
        assert!(sources[1].accept_invalid_certs);
    }

    #[test]
    fn test_source_id_display() {
        assert_eq!(SourceId::new(-12).to_string(), "-12");
        assert_eq!(serde_json::to_string(&SourceId::new(5)).unwrap(), "5");
    }
}
