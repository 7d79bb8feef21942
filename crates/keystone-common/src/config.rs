//! Runtime configuration for the overlay manager.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KeystoneError, Result};

/// Root configuration for Keystone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoneConfig {
    /// Command prepended to every mount and unmount invocation.
    ///
    /// Empty when the caller already runs with the needed privilege.
    pub privilege_prefix: Vec<String>,
    /// Whether to hold an advisory lock on the source root while mounted.
    pub lock: bool,
}

impl Default for KeystoneConfig {
    fn default() -> Self {
        Self {
            privilege_prefix: crate::constants::DEFAULT_PRIVILEGE_PREFIX
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            lock: true,
        }
    }
}

impl KeystoneConfig {
    /// Reads a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| KeystoneError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file at `path` if one is given, otherwise returns defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the given file cannot be loaded.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Checks the configuration for values that can never work.
    ///
    /// # Errors
    ///
    /// Returns an error if a prefix entry is blank.
    pub fn validate(&self) -> Result<()> {
        if self.privilege_prefix.iter().any(|arg| arg.trim().is_empty()) {
            return Err(KeystoneError::Config {
                message: "privilege_prefix entries must not be blank".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_sudo_and_locking() {
        let config = KeystoneConfig::default();
        assert_eq!(config.privilege_prefix, vec!["sudo".to_owned()]);
        assert!(config.lock);
    }

    #[test]
    fn load_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("keystone.json");
        std::fs::write(&path, r#"{ "privilege_prefix": [] }"#).expect("write");

        let config = KeystoneConfig::load(&path).expect("load");
        assert!(config.privilege_prefix.is_empty());
        assert!(config.lock);
    }

    #[test]
    fn load_rejects_blank_prefix_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("keystone.json");
        std::fs::write(&path, r#"{ "privilege_prefix": ["sudo", " "] }"#).expect("write");

        let err = KeystoneConfig::load(&path).unwrap_err();
        assert!(matches!(err, KeystoneError::Config { .. }));
    }

    #[test]
    fn load_reports_missing_file_path() {
        let err = KeystoneConfig::load(Path::new("/nonexistent/keystone.json")).unwrap_err();
        assert!(matches!(err, KeystoneError::Io { .. }));
    }

    #[test]
    fn load_or_default_without_path_is_default() {
        let config = KeystoneConfig::load_or_default(None).expect("defaults");
        assert_eq!(config, KeystoneConfig::default());
    }
}
