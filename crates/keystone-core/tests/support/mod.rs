//! Shared fixtures for overlay manager tests.

#![allow(dead_code, clippy::unwrap_used, clippy::new_ret_no_self)]

use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use keystone_common::config::KeystoneConfig;
use keystone_core::{CommandRunner, CommandStatus};

type FailPredicate = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

/// Records every command instead of running it.
///
/// Commands matching the failure predicate exit with code 32, the code
/// `mount(8)` uses for a mount failure.
pub struct RecordingRunner {
    calls: Mutex<Vec<Vec<String>>>,
    fail_when: FailPredicate,
}

impl RecordingRunner {
    pub fn new() -> Arc<Self> {
        Self::failing_when(|_| false)
    }

    pub fn failing_when(
        predicate: impl Fn(&[String]) -> bool + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_when: Box::new(predicate),
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded commands whose program (after the prefix) is `program`.
    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|c| c.first().map(String::as_str) == Some(program))
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &[String]) -> io::Result<CommandStatus> {
        self.calls.lock().unwrap().push(command.to_vec());
        let code = if (self.fail_when)(command) { 32 } else { 0 };
        Ok(CommandStatus::exited(code))
    }
}

/// Configuration that runs commands without a privilege prefix.
pub fn config() -> KeystoneConfig {
    KeystoneConfig {
        privilege_prefix: Vec::new(),
        lock: true,
    }
}

/// Creates `<root>/overlays/<layer>` for each layer.
pub fn make_layers(root: &Path, layers: &[&str]) {
    for layer in layers {
        std::fs::create_dir_all(root.join("overlays").join(layer)).unwrap();
    }
}

pub fn is_union_mount(command: &[String]) -> bool {
    command.iter().any(|arg| arg == "--types")
}

pub fn path_str(path: &Path) -> String {
    path.display().to_string()
}
