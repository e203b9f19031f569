//! Controller version parsing and feature cut-offs.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// First release that accepts every credential in a single `credentials`
/// array when launching.
pub const MERGED_CREDENTIALS_SINCE: ControllerVersion = ControllerVersion::new(3, 5, 0);

/// A dotted `major.minor.patch` version reported by `ping/`.
///
/// Missing components count as zero and any non-numeric suffix on a
/// component (as in `3.8.6-1`) is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ControllerVersion {
    major: u64,
    minor: u64,
    patch: u64,
}

impl ControllerVersion {
    /// Builds a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether launch requests should use the merged `credentials` array.
    #[must_use]
    pub fn accepts_merged_credentials(self) -> bool {
        self >= MERGED_CREDENTIALS_SINCE
    }
}

/// Returned when a version string does not start with a number.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised Controller version '{0}'")]
pub struct InvalidVersion(pub String);

fn leading_number(component: &str) -> Option<u64> {
    let digits: String = component
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

impl FromStr for ControllerVersion {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut components = s.trim().split('.').map(leading_number);
        let major = components
            .next()
            .flatten()
            .ok_or_else(|| InvalidVersion(s.to_owned()))?;
        let minor = components.next().flatten().unwrap_or(0);
        let patch = components.next().flatten().unwrap_or(0);
        Ok(Self::new(major, minor, patch))
    }
}

impl fmt::Display for ControllerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
