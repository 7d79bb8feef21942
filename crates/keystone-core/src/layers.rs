//! Static mapping from build targets to overlay layers.
//!
//! Layers are listed most-specific first. The source tree itself is always
//! the lowest layer and is never part of the table.

use keystone_common::error::{KeystoneError, Result};

const TARGET_LAYERS: &[(&str, &[&str])] = &[
    ("sdm845", &["qcom-LA.UM.7.3-incoming", "keystone"]),
    ("sdm845_gms", &["qcom-LA.UM.7.3-incoming", "gms", "keystone"]),
    ("sdm660_64", &["qcom-LA.UM.7.2-incoming", "keystone"]),
    ("sdm660_64_gms", &["qcom-LA.UM.7.2-incoming", "gms", "keystone"]),
];

/// Returns the ordered layer names for `target`.
///
/// # Errors
///
/// Returns [`KeystoneError::UnknownTarget`] if the target is not in the table.
pub fn layers_for(target: &str) -> Result<&'static [&'static str]> {
    TARGET_LAYERS
        .iter()
        .find(|(name, _)| *name == target)
        .map(|(_, layers)| *layers)
        .ok_or_else(|| KeystoneError::UnknownTarget {
            target: target.to_owned(),
        })
}

/// Iterates over every known target with its layers, in table order.
pub fn known_targets() -> impl Iterator<Item = (&'static str, &'static [&'static str])> {
    TARGET_LAYERS.iter().copied()
}
