//! Audio resource locations.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Where a location points once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// An `http://` or `https://` URL.
    Remote(Url),
    /// A filesystem path, absolute or relative.
    Local(PathBuf),
}

/// Location of an audio resource, as given by the caller.
///
/// Parsing never fails and never touches the network or the filesystem:
/// anything that is not an `http(s)://` URL is treated as a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Location {
    raw: String,
    target: Target,
}

impl Location {
    /// Parse a location string.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let target = match Url::parse(&raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Target::Remote(url),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_or_else(|()| Target::Local(PathBuf::from(&raw)), Target::Local),
            _ => Target::Local(PathBuf::from(&raw)),
        };

        Self { raw, target }
    }

    /// The string this location was created from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed target.
    pub const fn target(&self) -> &Target {
        &self.target
    }

    /// Returns true if this location is an `http(s)://` URL.
    pub const fn is_remote(&self) -> bool {
        matches!(self.target, Target::Remote(_))
    }

    /// The remote URL, if any.
    pub const fn url(&self) -> Option<&Url> {
        match &self.target {
            Target::Remote(url) => Some(url),
            Target::Local(_) => None,
        }
    }

    /// The local path, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            Target::Remote(_) => None,
            Target::Local(path) => Some(path),
        }
    }

    /// Resolve a relative path against a base URL, the way a page-relative
    /// request would be resolved. Returns `None` for remote or absolute locations.
    pub fn resolve_against(&self, base: &Url) -> Option<Url> {
        let path = self.path()?;
        if path.is_absolute() || self.raw.starts_with("file:") {
            return None;
        }
        base.join(&self.raw).ok()
    }

    /// Lowercase file extension, used as a decoder hint.
    pub fn extension(&self) -> Option<String> {
        let name = match &self.target {
            Target::Remote(url) => url.path_segments()?.next_back()?.to_string(),
            Target::Local(path) => path.file_name()?.to_string_lossy().into_owned(),
        };

        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl From<String> for Location {
    fn from(raw: String) -> Self {
        Self::parse(raw)
    }
}

impl From<&str> for Location {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.raw
    }
}
