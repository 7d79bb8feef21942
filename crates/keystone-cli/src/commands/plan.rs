//! `keystone plan` — Show the mounts a run would perform.

use std::path::{Path, PathBuf};

use clap::Args;
use keystone_common::config::KeystoneConfig;
use keystone_common::constants::PASSTHROUGH_PREFIX;
use keystone_common::types::{BuildTarget, MountInfo};
use keystone_core::overlay::plan::OverlayPlan;
use serde::Serialize;

use crate::output::{BOLD, CYAN, DIM, RESET, format_command};

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Build target whose layers are overlaid.
    #[arg(short, long)]
    pub target: String,

    /// Root of the Android source tree. Defaults to the current directory.
    #[arg(short, long)]
    pub source_root: Option<PathBuf>,

    /// Print the plan as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

/// Machine-readable form of an [`OverlayPlan`].
#[derive(Debug, Serialize)]
struct PlanReport<'a> {
    target: &'a BuildTarget,
    source_root: &'a Path,
    layers: &'a [String],
    mounts: Vec<MountInfo>,
}

impl<'a> From<&'a OverlayPlan> for PlanReport<'a> {
    fn from(plan: &'a OverlayPlan) -> Self {
        Self {
            target: plan.target(),
            source_root: plan.source_root(),
            layers: plan.layers(),
            mounts: plan.steps().iter().map(|step| step.info()).collect(),
        }
    }
}

/// Executes the `plan` command.
///
/// # Errors
///
/// Returns an error if the target is unknown or the source root cannot be
/// expressed as overlay options.
#[allow(clippy::print_stdout)]
pub fn execute(args: PlanArgs, config: &KeystoneConfig) -> anyhow::Result<()> {
    let source_root = std::path::absolute(super::source_root(args.source_root)?)?;
    let passthrough = std::env::temp_dir().join(format!("{PASSTHROUGH_PREFIX}XXXXXX"));
    let plan = OverlayPlan::new(
        &BuildTarget::new(args.target),
        &source_root,
        &passthrough,
        &config.privilege_prefix,
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&PlanReport::from(&plan))?);
        return Ok(());
    }

    eprintln!();
    eprintln!("  {BOLD}{}{RESET} {DIM}on{RESET} {}", plan.target(), plan.source_root().display());
    eprintln!("  {DIM}layers:{RESET} {}", plan.layers().join(", "));
    eprintln!();
    for (index, step) in plan.steps().iter().enumerate() {
        eprintln!("  {CYAN}{}. {}{RESET}", index + 1, step.kind);
        eprintln!("     mount:   {}", format_command(&step.mount_command));
        eprintln!("     unmount: {}", format_command(&step.unmount_command));
    }
    eprintln!();
    eprintln!("  {DIM}Teardown runs the unmount commands bottom to top.{RESET}");
    Ok(())
}
