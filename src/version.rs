//! EKS-A semantic versions.
//!
//! Versions are accepted with or without a leading `v` (`v0.19.2`, `0.19.2`)
//! and always printed back with it, which is how cluster specs and release
//! manifests spell them.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Version stamped on development builds of the CLI and controller.
pub const DEV_BUILD_VERSION: &str = "v0.0.0-dev";

/// `(major, minor, patch)` of [`DEV_BUILD_VERSION`].
const DEV_BUILD_TRIPLE: (u64, u64, u64) = (0, 0, 0);

#[derive(Debug, Error)]
#[error("invalid semantic version {input:?}")]
pub struct ParseVersionError {
    pub input: String,
    #[source]
    source: semver::Error,
}

/// A parsed EKS-A version.
///
/// Ordering and equality follow semver precedence: major, minor, patch, then
/// prerelease (a release sorts above any of its prereleases). Build metadata
/// is kept for display only.
#[derive(Debug, Clone)]
pub struct Version(semver::Version);

impl Version {
    pub fn parse(input: &str) -> Result<Self, ParseVersionError> {
        let trimmed = input.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        semver::Version::parse(bare)
            .map(Self)
            .map_err(|source| ParseVersionError {
                input: input.to_string(),
                source,
            })
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// True when major, minor and patch match. Prerelease and build
    /// metadata are ignored.
    pub fn same_patch(&self, other: &Version) -> bool {
        self.triple() == other.triple()
    }

    pub fn greater_than(&self, other: &Version) -> bool {
        self > other
    }

    pub fn less_than_or_equal(&self, other: &Version) -> bool {
        self <= other
    }

    /// Matches any build of the development sentinel version.
    pub fn is_dev_build(&self) -> bool {
        self.triple() == DEV_BUILD_TRIPLE
    }

    /// Signed `(major, minor)` distance from `base` to `self`. Widened so
    /// that any pair of `u64` components fits.
    pub fn delta_from(&self, base: &Version) -> (i128, i128) {
        (
            i128::from(self.major()) - i128::from(base.major()),
            i128::from(self.minor()) - i128::from(base.minor()),
        )
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.0.major, self.0.minor, self.0.patch)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp_precedence(&other.0)
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.triple().hash(state);
        self.0.pre.hash(state);
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
