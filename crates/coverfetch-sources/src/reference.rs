use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use url::Url;

/// The scheme prefix that marks a reference to a file on the local device.
pub const LOCAL_FILE_PREFIX: &str = "file://";

/// Where a cover artifact originates from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginReference {
    /// A remote `http` or `https` URL.
    Remote(Url),
    /// A file on the local file system, with the `file://` prefix stripped.
    Local(PathBuf),
}

impl OriginReference {
    /// Whether this reference points to a local file.
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl FromStr for OriginReference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(path) = s.strip_prefix(LOCAL_FILE_PREFIX) {
            if path.is_empty() {
                bail!("empty local file reference");
            }
            return Ok(Self::Local(PathBuf::from(path)));
        }

        let url = Url::parse(s).with_context(|| format!("invalid origin reference `{s}`"))?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Remote(url)),
            scheme => bail!("unsupported origin scheme `{scheme}`"),
        }
    }
}

impl fmt::Display for OriginReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Local(path) => write!(f, "{LOCAL_FILE_PREFIX}{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_reference() {
        let reference: OriginReference = "https://cdn.example.com/c/1.jpg".parse().unwrap();
        assert_eq!(
            reference,
            OriginReference::Remote("https://cdn.example.com/c/1.jpg".parse().unwrap())
        );
        assert!(!reference.is_local());
    }

    #[test]
    fn test_local_reference_strips_scheme() {
        let reference: OriginReference = "file:///storage/covers/1.jpg".parse().unwrap();
        assert_eq!(
            reference,
            OriginReference::Local(PathBuf::from("/storage/covers/1.jpg"))
        );
        assert_eq!(reference.to_string(), "file:///storage/covers/1.jpg");
    }

    #[test]
    fn test_invalid_references() {
        assert!("file://".parse::<OriginReference>().is_err());
        assert!("ftp://example.com/a.jpg".parse::<OriginReference>().is_err());
        assert!("not a url".parse::<OriginReference>().is_err());
    }
}
