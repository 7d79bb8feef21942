//! A single mount paired with its teardown.
//!
//! A [`MountHandle`] only exists once its mount command has succeeded, so
//! holding one is proof there is something to unmount. Teardown runs at most
//! once, either through [`MountHandle::release`] or when the handle drops.

use std::fmt;
use std::sync::Arc;

use keystone_common::error::{KeystoneError, Result};
use keystone_common::types::MountInfo;

use crate::runner::CommandRunner;

/// Owns one live mount and the command that undoes it.
pub struct MountHandle {
    runner: Arc<dyn CommandRunner>,
    mount_command: Vec<String>,
    unmount_command: Vec<String>,
    is_mounted: bool,
}

impl MountHandle {
    /// Runs `mount_command` and, if it succeeds, returns a live handle.
    ///
    /// No handle is produced for a failed mount, so its unmount command is
    /// never executed.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::Mount`] if the command exits unsuccessfully
    /// or [`KeystoneError::Spawn`] if it cannot be started.
    pub fn acquire(
        runner: Arc<dyn CommandRunner>,
        mount_command: Vec<String>,
        unmount_command: Vec<String>,
    ) -> Result<Self> {
        let status = runner
            .run(&mount_command)
            .map_err(|e| KeystoneError::Spawn {
                command: mount_command.clone(),
                source: e,
            })?;
        if !status.success() {
            return Err(KeystoneError::Mount {
                command: mount_command,
                exit_code: status.code,
            });
        }
        tracing::info!(command = %mount_command.join(" "), "mounted");
        Ok(Self {
            runner,
            mount_command,
            unmount_command,
            is_mounted: true,
        })
    }

    /// Runs the unmount command if the handle is still mounted.
    ///
    /// The handle counts as released afterwards even if the command fails;
    /// the failure is logged and returned so the caller can keep tearing
    /// down other mounts. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::Teardown`] or [`KeystoneError::Spawn`] when
    /// the unmount command fails on the first call.
    pub fn release(&mut self) -> Result<()> {
        if !self.is_mounted {
            return Ok(());
        }
        self.is_mounted = false;

        let outcome = match self.runner.run(&self.unmount_command) {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(KeystoneError::Teardown {
                command: self.unmount_command.clone(),
                exit_code: status.code,
            }),
            Err(e) => Err(KeystoneError::Spawn {
                command: self.unmount_command.clone(),
                source: e,
            }),
        };
        match &outcome {
            Ok(()) => tracing::info!(command = %self.unmount_command.join(" "), "unmounted"),
            Err(e) => tracing::warn!(error = %e, "unmount failed"),
        }
        outcome
    }

    /// Returns `true` until the handle has been released.
    #[must_use]
    pub const fn is_mounted(&self) -> bool {
        self.is_mounted
    }

    /// Command that established this mount.
    #[must_use]
    pub fn mount_command(&self) -> &[String] {
        &self.mount_command
    }

    /// Command that tears this mount down.
    #[must_use]
    pub fn unmount_command(&self) -> &[String] {
        &self.unmount_command
    }

    /// Snapshot of both commands.
    #[must_use]
    pub fn info(&self) -> MountInfo {
        MountInfo {
            mount_command: self.mount_command.clone(),
            unmount_command: self.unmount_command.clone(),
        }
    }
}

impl fmt::Debug for MountHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountHandle")
            .field("mount_command", &self.mount_command)
            .field("unmount_command", &self.unmount_command)
            .field("is_mounted", &self.is_mounted)
            .finish_non_exhaustive()
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        // Failures are already logged by release.
        let _ = self.release();
    }
}
