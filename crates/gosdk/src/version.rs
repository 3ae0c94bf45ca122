//! Go release names and their ordering.

use crate::error::SdkError;
use semver::{BuildMetadata, Prerelease, Version};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A Go release name such as `go1.22.5` or `go1.23rc1`.
///
/// Ordered by release: `go1.21rc1 < go1.21 == go1.21.0 < go1.21.5`. Names that
/// compare equal as versions are ordered by their spelling.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GoVersion {
    raw: String,
    version: Version,
}

impl GoVersion {
    /// Parses the first word of `text`, e.g. the output of `go env GOVERSION`.
    ///
    /// Returns `None` for anything that is not a `goX[.Y[.Z]][pre]` release.
    ///
    /// ```
    /// use gosdk::GoVersion;
    ///
    /// let v = GoVersion::parse("go1.22rc1 X:rangefunc").unwrap();
    /// assert_eq!(v.as_str(), "go1.22rc1");
    /// assert_eq!(v.semver().to_string(), "1.22.0-rc1");
    /// assert!(GoVersion::parse("devel go1.23-abcdef").is_none());
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        let raw = text.split_whitespace().next()?;
        let rest = raw.strip_prefix("go")?;

        let split = rest.find(|c: char| !c.is_ascii_digit() && c != '.').unwrap_or(rest.len());
        let (numbers, pre) = rest.split_at(split);

        let mut parts = [0u64; 3];
        let mut count = 0;
        for part in numbers.split('.') {
            if count == parts.len() || part.is_empty() {
                return None;
            }
            parts[count] = part.parse().ok()?;
            count += 1;
        }

        let pre = if pre.is_empty() {
            Prerelease::EMPTY
        } else if pre.chars().all(|c| c.is_ascii_alphanumeric()) {
            Prerelease::new(pre).ok()?
        } else {
            return None;
        };

        Some(Self {
            raw: raw.to_string(),
            version: Version {
                major: parts[0],
                minor: parts[1],
                patch: parts[2],
                pre,
                build: BuildMetadata::EMPTY,
            },
        })
    }

    /// The release name as written, e.g. `go1.22.5`.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The release as a semantic version.
    pub fn semver(&self) -> &Version {
        &self.version
    }

    /// Whether this release is `query` or a release within it.
    ///
    /// `query` may omit the `go` prefix. It matches at component boundaries
    /// only: `1.21` matches `go1.21`, `go1.21.5` and `go1.21rc1` but not
    /// `go1.210`.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.strip_prefix("go").unwrap_or(query);
        if query.is_empty() {
            return false;
        }
        self.raw
            .strip_prefix("go")
            .and_then(|v| v.strip_prefix(query))
            .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_digit()))
    }
}

impl FromStr for GoVersion {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| SdkError::InvalidVersion(s.to_string()))
    }
}

impl Ord for GoVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version.cmp(&other.version).then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for GoVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for GoVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}
