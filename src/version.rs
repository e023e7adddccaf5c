//! Server version parsing and feature gating.
//!
//! The server reports its version as a `major.minor.patch` string, probed
//! once at connection time via `gds.version()` and cached for the life of
//! the client. Endpoint wrappers declare the version range they are valid
//! for; out-of-range calls fail before any network round-trip.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A `major.minor.patch` server version triple.
///
/// Ordering is lexicographic over the three components, which is what the
/// derived impls produce for this field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServerVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Gate an operation on a minimum (inclusive) server version.
    ///
    /// Returns `Error::VersionMismatch` without touching the network.
    pub fn require(&self, operation: &str, min_inclusive: ServerVersion) -> Result<()> {
        self.require_range(operation, min_inclusive, None)
    }

    /// Gate an operation on a `[min, max)` server version range.
    pub fn require_range(
        &self,
        operation: &str,
        min_inclusive: ServerVersion,
        max_exclusive: Option<ServerVersion>,
    ) -> Result<()> {
        if *self < min_inclusive {
            return Err(Error::VersionMismatch {
                operation: operation.to_string(),
                constraint: format!(">= {min_inclusive}"),
                actual: *self,
            });
        }
        if let Some(max) = max_exclusive {
            if *self >= max {
                return Err(Error::VersionMismatch {
                    operation: operation.to_string(),
                    constraint: format!("< {max}"),
                    actual: *self,
                });
            }
        }
        Ok(())
    }
}

impl FromStr for ServerVersion {
    type Err = Error;

    /// Parse `"2.5.0"`. Pre-release and build suffixes on the patch
    /// component (`"2.6.0-alpha01"`, `"2.5.3+build"`) are tolerated and
    /// ignored, matching what the server reports for preview builds.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::VersionParse(s.to_string());

        let mut parts = s.splitn(3, '.');
        let major = parts.next().ok_or_else(bad)?;
        let minor = parts.next().ok_or_else(bad)?;
        let patch = parts.next().ok_or_else(bad)?;

        // Strip anything after the numeric patch component.
        let patch = patch
            .split(|c: char| c == '-' || c == '+')
            .next()
            .ok_or_else(bad)?;

        Ok(Self {
            major: major.parse().map_err(|_| bad())?,
            minor: minor.parse().map_err(|_| bad())?,
            patch: patch.parse().map_err(|_| bad())?,
        })
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_triple() {
        let v: ServerVersion = "2.5.0".parse().unwrap();
        assert_eq!(v, ServerVersion::new(2, 5, 0));
    }

    #[test]
    fn parse_prerelease_suffix() {
        let v: ServerVersion = "2.6.0-alpha01".parse().unwrap();
        assert_eq!(v, ServerVersion::new(2, 6, 0));

        let v: ServerVersion = "2.5.3+43".parse().unwrap();
        assert_eq!(v, ServerVersion::new(2, 5, 3));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("2.5".parse::<ServerVersion>().is_err());
        assert!("two.five.zero".parse::<ServerVersion>().is_err());
        assert!("".parse::<ServerVersion>().is_err());
    }

    #[test]
    fn ordering_is_component_wise() {
        let v249 = ServerVersion::new(2, 4, 9);
        let v250 = ServerVersion::new(2, 5, 0);
        let v300 = ServerVersion::new(3, 0, 0);
        assert!(v249 < v250);
        assert!(v250 < v300);
        assert!(v249 < v300);
    }

    #[test]
    fn require_gates_below_minimum() {
        let server = ServerVersion::new(2, 4, 9);
        let err = server
            .require("model.publish", ServerVersion::new(2, 5, 0))
            .unwrap_err();
        match err {
            Error::VersionMismatch { operation, constraint, actual } => {
                assert_eq!(operation, "model.publish");
                assert_eq!(constraint, ">= 2.5.0");
                assert_eq!(actual, server);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn require_range_gates_above_maximum() {
        let server = ServerVersion::new(2, 7, 0);
        assert!(server
            .require_range(
                "graph.streamNodeProperty",
                ServerVersion::new(2, 1, 0),
                Some(ServerVersion::new(2, 6, 0)),
            )
            .is_err());
        assert!(server
            .require_range("graph.nodeProperty.stream", ServerVersion::new(2, 1, 0), None)
            .is_ok());
    }
}
