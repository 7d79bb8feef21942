//! `keystone run` — Run a command on top of the target overlay.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Args;
use keystone_common::config::KeystoneConfig;
use keystone_common::types::BuildTarget;
use keystone_core::{OverlayManager, SystemRunner};

use crate::output::{BOLD, DIM, GREEN, RED, RESET, format_command};

/// Shell convention for a command ended by SIGINT.
const INTERRUPTED_EXIT: u8 = 130;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Build target whose layers are overlaid.
    #[arg(short, long)]
    pub target: String,

    /// Root of the Android source tree. Defaults to the current directory.
    #[arg(short, long)]
    pub source_root: Option<PathBuf>,

    /// Command to run inside the source root, usually a sandbox invocation.
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `run` command.
///
/// The overlay is always torn down before returning, whether the command
/// succeeded, failed, or was interrupted.
///
/// # Errors
///
/// Returns an error if the overlay cannot be mounted, the command cannot be
/// started, or teardown leaves mounts behind.
pub fn execute(args: RunArgs, config: &KeystoneConfig) -> anyhow::Result<ExitCode> {
    let source_root = super::source_root(args.source_root)?;
    let target = BuildTarget::new(args.target);

    let interrupted = install_interrupt_guard()?;

    let mut manager = OverlayManager::create(&target, &source_root, Arc::new(SystemRunner), config)
        .with_context(|| format!("failed to mount overlay for {target}"))?;
    eprintln!(
        "  {GREEN}Overlay mounted{RESET} {BOLD}{target}{RESET} {DIM}({}){RESET}",
        manager.layers().join(", ")
    );

    let status = run_unless_interrupted(&args.command, manager.source_root(), &interrupted);

    if interrupted.load(Ordering::SeqCst) {
        eprintln!("  {DIM}Interrupted, tearing down overlay...{RESET}");
    }
    manager.destroy().context("overlay teardown failed")?;
    eprintln!("  {GREEN}Overlay torn down.{RESET}");

    let Some(status) = status? else {
        return Ok(ExitCode::from(INTERRUPTED_EXIT));
    };
    if !status.success() {
        eprintln!("  {RED}Command failed:{RESET} {}", format_command(&args.command));
    }
    Ok(exit_code(status))
}

/// Keeps keystone alive on Ctrl+C so the overlay can still be torn down.
///
/// The foreground command receives the signal from the terminal directly.
fn install_interrupt_guard() -> anyhow::Result<Arc<AtomicBool>> {
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;
    Ok(interrupted)
}

/// Runs the command unless Ctrl+C already arrived while mounting.
fn run_unless_interrupted(
    command: &[String],
    source_root: &Path,
    interrupted: &AtomicBool,
) -> anyhow::Result<Option<ExitStatus>> {
    if interrupted.load(Ordering::SeqCst) {
        tracing::warn!("interrupted during setup, skipping command");
        return Ok(None);
    }
    run_command(command, source_root).map(Some)
}

fn run_command(command: &[String], source_root: &Path) -> anyhow::Result<ExitStatus> {
    let (program, rest) = command
        .split_first()
        .context("no command given")?;
    tracing::info!(
        command = %format_command(command),
        cwd = %source_root.display(),
        "running command"
    );
    Command::new(program)
        .args(rest)
        .current_dir(source_root)
        .status()
        .with_context(|| format!("failed to start {program}"))
}

fn exit_code(status: ExitStatus) -> ExitCode {
    status
        .code()
        .and_then(|code| u8::try_from(code).ok())
        .map_or(ExitCode::FAILURE, ExitCode::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_mirrors_command_status() {
        let ok = Command::new("true").status().expect("spawn");
        let failed = Command::new("false").status().expect("spawn");
        assert_eq!(exit_code(ok), ExitCode::SUCCESS);
        assert_eq!(exit_code(failed), ExitCode::from(1));
    }

    #[test]
    fn run_command_uses_source_root_as_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        let status = run_command(&["touch".to_owned(), "marker".to_owned()], dir.path())
            .expect("run");
        assert!(status.success());
        assert!(dir.path().join("marker").exists());
    }

    #[test]
    fn interrupt_during_setup_skips_command() {
        let dir = tempfile::tempdir().expect("tempdir");
        let interrupted = AtomicBool::new(true);
        let command = ["touch".to_owned(), "marker".to_owned()];

        let status = run_unless_interrupted(&command, dir.path(), &interrupted).expect("run");

        assert!(status.is_none());
        assert!(!dir.path().join("marker").exists());
    }

    #[test]
    fn command_runs_when_not_interrupted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let interrupted = AtomicBool::new(false);
        let command = ["true".to_owned()];

        let status = run_unless_interrupted(&command, dir.path(), &interrupted).expect("run");

        assert!(status.is_some_and(|s| s.success()));
    }

    #[test]
    fn missing_program_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(run_command(&["/nonexistent/keystone-build".to_owned()], dir.path()).is_err());
    }
}
