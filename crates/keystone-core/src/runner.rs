//! Execution of mount and unmount command vectors.
//!
//! Mount handles never spawn processes themselves. They go through a
//! [`CommandRunner`], which lets callers substitute the execution strategy
//! (for tests or for environments with a different privilege model).

use std::io;
use std::process::Command;

/// Outcome of one finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// Exit code, or `None` if the process was terminated by a signal.
    pub code: Option<i32>,
}

impl CommandStatus {
    /// Status of a command that exited with `code`.
    #[must_use]
    pub const fn exited(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Returns `true` if the command exited with code zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Executes an argument vector and blocks until it exits.
pub trait CommandRunner: Send + Sync {
    /// Runs `command`, where `command[0]` is the program.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be started.
    fn run(&self, command: &[String]) -> io::Result<CommandStatus>;
}

/// Runs commands as child processes of the current process.
///
/// Standard streams are inherited so mount diagnostics reach the terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &[String]) -> io::Result<CommandStatus> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
        tracing::debug!(command = %command.join(" "), "executing");
        let status = Command::new(program).args(args).status()?;
        Ok(CommandStatus {
            code: status.code(),
        })
    }
}
