//! CLI command definitions and dispatch.

pub mod plan;
pub mod run;
pub mod targets;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use keystone_common::config::KeystoneConfig;

/// Keystone — run Android platform builds on a layered source overlay.
#[derive(Parser, Debug)]
#[command(name = "keystone", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file.
    #[arg(long, global = true, env = keystone_common::constants::CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Command prepended to mount and umount, e.g. "sudo -n".
    ///
    /// Pass an empty string when already running as root.
    #[arg(long, global = true, env = "KEYSTONE_PRIVILEGE_PREFIX")]
    pub privilege_prefix: Option<String>,

    /// Do not take the advisory lock on the source root.
    #[arg(long, global = true)]
    pub no_lock: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List known build targets and their overlay layers.
    Targets(targets::TargetsArgs),
    /// Print the mount commands a run would issue, without mounting.
    Plan(plan::PlanArgs),
    /// Mount the overlay, run a command on top of it, then tear it down.
    Run(run::RunArgs),
}

impl Cli {
    /// Loads the configuration file and applies command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded.
    pub fn resolve_config(&self) -> anyhow::Result<KeystoneConfig> {
        let mut config = KeystoneConfig::load_or_default(self.config.as_deref())
            .context("failed to load configuration")?;
        if let Some(prefix) = &self.privilege_prefix {
            config.privilege_prefix = prefix.split_whitespace().map(str::to_owned).collect();
        }
        if self.no_lock {
            config.lock = false;
        }
        Ok(config)
    }
}

/// Resolves the source root, defaulting to the current directory.
fn source_root(arg: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match arg {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("failed to read current directory"),
    }
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = cli.resolve_config()?;
    match cli.command {
        Command::Targets(args) => targets::execute(&args).map(|()| ExitCode::SUCCESS),
        Command::Plan(args) => plan::execute(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Run(args) => run::execute(args, &config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn privilege_prefix_override_splits_words() {
        let cli = Cli::parse_from(["keystone", "--privilege-prefix", "sudo -n", "targets"]);
        let config = cli.resolve_config().expect("config");
        assert_eq!(config.privilege_prefix, vec!["sudo", "-n"]);
    }

    #[test]
    fn empty_privilege_prefix_runs_unprefixed() {
        let cli = Cli::parse_from(["keystone", "--privilege-prefix", "", "--no-lock", "targets"]);
        let config = cli.resolve_config().expect("config");
        assert!(config.privilege_prefix.is_empty());
        assert!(!config.lock);
    }

    #[test]
    fn run_collects_trailing_command() {
        let cli = Cli::parse_from([
            "keystone", "run", "--target", "sdm845", "--", "make", "-j", "droid",
        ]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.target, "sdm845");
                assert_eq!(args.command, vec!["make", "-j", "droid"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
