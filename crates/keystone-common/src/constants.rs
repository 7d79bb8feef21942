//! Directory names and defaults shared across the workspace.

/// Directory under the source root holding one subdirectory per overlay layer.
pub const OVERLAYS_DIR: &str = "overlays";

/// Name of the empty marker file placed inside every layer directory.
///
/// Its presence keeps the build system from scanning layer directories as
/// ordinary source content.
pub const WHITEOUT_FILE: &str = "overlays";

/// Build-output directory under the source root.
pub const OUTPUT_DIR: &str = "out";

/// Directory under the build output holding per-target union-mount scratch space.
pub const OUTPUT_OVERLAYS_DIR: &str = "overlays";

/// Union-mount `workdir` name inside the per-target scratch directory.
pub const WORK_DIR: &str = "work";

/// Union-mount `upperdir` name inside the per-target scratch directory.
pub const ARTIFACTS_DIR: &str = "artifacts";

/// Advisory lock file, created inside the build-output directory.
pub const LOCK_FILE: &str = ".keystone-overlay.lock";

/// Prefix for the process-private passthrough directory.
pub const PASSTHROUGH_PREFIX: &str = "keystone-passthrough-";

/// Privilege-escalation command prepended to mount commands by default.
pub const DEFAULT_PRIVILEGE_PREFIX: &[&str] = &["sudo"];

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV: &str = "KEYSTONE_CONFIG";
