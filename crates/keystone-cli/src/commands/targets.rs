//! `keystone targets` — List build targets and their layers.

use clap::Args;
use keystone_core::layers::known_targets;

use crate::output::{BOLD, DIM, RESET};

/// Arguments for the `targets` command.
#[derive(Args, Debug)]
pub struct TargetsArgs {}

/// Executes the `targets` command.
///
/// # Errors
///
/// This command does not fail; the signature matches the other handlers.
#[allow(clippy::unnecessary_wraps)]
pub fn execute(_args: &TargetsArgs) -> anyhow::Result<()> {
    for (target, layers) in known_targets() {
        eprintln!("  {BOLD}{target}{RESET}");
        for layer in layers {
            eprintln!("    {DIM}overlays/{RESET}{layer}");
        }
    }
    Ok(())
}
