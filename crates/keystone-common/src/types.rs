//! Domain primitive types used across the Keystone workspace.

use std::fmt;

use serde::Serialize;

/// Identifier of an Android build target, e.g. `sdm845`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BuildTarget(String);

impl BuildTarget {
    /// Creates a build target from a string value.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BuildTarget {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Mount and unmount argument vectors of one live mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountInfo {
    /// Command that established the mount.
    pub mount_command: Vec<String>,
    /// Command that tears the mount down.
    pub unmount_command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_target_displays_inner_value() {
        let target = BuildTarget::from("sdm845_gms");
        assert_eq!(target.to_string(), "sdm845_gms");
        assert_eq!(target.as_str(), "sdm845_gms");
    }
}
