//! Snapshot version numbers.
//!
//! Versions are written `vMAJOR.MINOR.PATCH` and ordered numerically by
//! component, so `v1.10.0` sorts after `v1.9.3`.
//!
//! Two parsing paths exist:
//! - [`Version::from_str`] returns a [`VersionFormatError`] for untrusted input
//!   (CLI arguments, imported documents).
//! - [`parse_version`] and [`compare_versions`] panic, for call sites that are
//!   contractually handed an already-validated string.

use crate::errors::VersionFormatError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Ordered `(major, minor, patch)` triple.
///
/// Field order matters: the derived `Ord` compares major, then minor, then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// Which component [`bump_version`] increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpKind {
    Patch,
    Minor,
    Major,
}

impl FromStr for BumpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "patch" => Ok(BumpKind::Patch),
            "minor" => Ok(BumpKind::Minor),
            "major" => Ok(BumpKind::Major),
            other => Err(format!("unknown bump kind: {}", other)),
        }
    }
}

impl Version {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Return the next version for the given bump kind, or `None` if the
    /// bumped component would overflow.
    pub fn bump(self, kind: BumpKind) -> Option<Self> {
        Some(match kind {
            BumpKind::Patch => Self::new(self.major, self.minor, self.patch.checked_add(1)?),
            BumpKind::Minor => Self::new(self.major, self.minor.checked_add(1)?, 0),
            BumpKind::Major => Self::new(self.major.checked_add(1)?, 0, 0),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionFormatError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let body = input
            .strip_prefix('v')
            .ok_or_else(|| VersionFormatError::MissingPrefix {
                input: input.to_string(),
            })?;

        let parts: Vec<&str> = body.split('.').collect();
        if parts.len() != 3 {
            return Err(VersionFormatError::WrongComponentCount {
                input: input.to_string(),
            });
        }

        let mut nums = [0u64; 3];
        for (slot, part) in nums.iter_mut().zip(parts.iter()) {
            // `u64::from_str` accepts a leading '+', the version grammar does not
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionFormatError::NonNumericComponent {
                    input: input.to_string(),
                    component: part.to_string(),
                });
            }
            *slot = part
                .parse()
                .map_err(|_| VersionFormatError::NonNumericComponent {
                    input: input.to_string(),
                    component: part.to_string(),
                })?;
        }

        Ok(Self::new(nums[0], nums[1], nums[2]))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// True if `input` is a well-formed `vN.N.N` string.
pub fn is_valid_version(input: &str) -> bool {
    input.parse::<Version>().is_ok()
}

/// Parse a version string that the caller guarantees is well-formed.
///
/// # Panics
///
/// Panics if `input` does not match `vN.N.N`. Reaching this with a malformed
/// string is a programming error; use [`Version::from_str`] for untrusted input.
pub fn parse_version(input: &str) -> Version {
    match input.parse() {
        Ok(v) => v,
        Err(e) => panic!("invalid version string: {}", e),
    }
}

/// Numerically compare two version strings.
///
/// # Panics
///
/// Panics if either string is malformed (see [`parse_version`]).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    parse_version(a).cmp(&parse_version(b))
}

/// Bump a version by kind; `None` on component overflow.
pub fn bump_version(version: Version, kind: BumpKind) -> Option<Version> {
    version.bump(kind)
}

/// String form of [`bump_version`].
///
/// # Panics
///
/// Panics if `version` is malformed (see [`parse_version`]).
pub fn bump_version_str(version: &str, kind: BumpKind) -> Option<String> {
    parse_version(version).bump(kind).map(|v| v.to_string())
}

/// Sort versions newest first.
pub fn sort_newest_first(versions: &mut [Version]) {
    versions.sort_by(|a, b| b.cmp(a));
}
