//! Ownership of the overlay mount stack for one build.
//!
//! An [`OverlayManager`] is either fully mounted or does not exist: any
//! failure during [`OverlayManager::create`] unwinds the mounts made so far
//! before the error reaches the caller. Teardown pops the stack, so mounts
//! are always undone in reverse order of creation.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use keystone_common::config::KeystoneConfig;
use keystone_common::constants::{LOCK_FILE, OVERLAYS_DIR, PASSTHROUGH_PREFIX};
use keystone_common::error::{KeystoneError, Result};
use keystone_common::types::{BuildTarget, MountInfo};

use super::plan::{OverlayPlan, StepKind};
use crate::layers::layers_for;
use crate::lock::SourceRootLock;
use crate::mount::MountHandle;
use crate::runner::CommandRunner;

/// Live overlay of a source tree for one build target.
///
/// Call [`OverlayManager::destroy`] once the build is done to observe
/// teardown failures. Dropping the manager tears down as well, logging any
/// failures instead of returning them.
pub struct OverlayManager {
    plan: OverlayPlan,
    runner: Arc<dyn CommandRunner>,
    mount_stack: Vec<MountHandle>,
    passthrough_dir: Option<PathBuf>,
    // Dropped after the mounts are gone.
    lock: Option<SourceRootLock>,
}

impl OverlayManager {
    /// Mounts the overlay for `target` on top of `source_root`.
    ///
    /// The steps run in order: resolve layers, check that the source root
    /// and every layer directory exist, create the build-output directory,
    /// bind it aside into a private directory, write layer markers and
    /// scratch directories, mount the union, then bind the build output back
    /// on top of the union.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::UnknownTarget`], or [`KeystoneError::Io`] for
    /// a missing source root or layer directory, before touching the
    /// filesystem. Returns the failing step's error
    /// ([`KeystoneError::Mount`], [`KeystoneError::Spawn`],
    /// [`KeystoneError::Io`] or [`KeystoneError::Busy`]) after unwinding
    /// every mount made by this call.
    pub fn create(
        target: &BuildTarget,
        source_root: &Path,
        runner: Arc<dyn CommandRunner>,
        config: &KeystoneConfig,
    ) -> Result<Self> {
        // Resolved here only to reject inputs before any mutation; the plan
        // resolves the same table entry again.
        let layers = layers_for(target.as_str())?;

        let source_root = std::path::absolute(source_root).map_err(|e| KeystoneError::Io {
            path: source_root.to_path_buf(),
            source: e,
        })?;
        ensure_dir(&source_root, "source root missing")?;
        for layer in layers {
            ensure_dir(
                &source_root.join(OVERLAYS_DIR).join(layer),
                "overlay layer directory missing",
            )?;
        }

        let passthrough = tempfile::Builder::new()
            .prefix(PASSTHROUGH_PREFIX)
            .tempdir()
            .map_err(|e| KeystoneError::Io {
                path: std::env::temp_dir(),
                source: e,
            })?
            .keep();

        let prepared =
            OverlayPlan::new(target, &source_root, &passthrough, &config.privilege_prefix)
                .and_then(|plan| {
                    let lock = prepare_output(&plan.output_dir(), config.lock)?;
                    Ok((plan, lock))
                });
        let (plan, lock) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                let _ = fs::remove_dir(&passthrough);
                return Err(e);
            }
        };

        let mut manager = Self {
            plan,
            runner,
            mount_stack: Vec::with_capacity(3),
            passthrough_dir: Some(passthrough),
            lock,
        };

        if let Err(e) = manager.mount_all() {
            tracing::warn!(
                build_target = %target,
                mounted = manager.mount_stack.len(),
                error = %e,
                "overlay setup failed, unwinding"
            );
            if let Err(residual) = manager.destroy() {
                tracing::error!(error = %residual, "unwinding left mounts behind");
            }
            return Err(e);
        }

        tracing::info!(
            build_target = %target,
            source_root = %manager.plan.source_root().display(),
            layers = ?manager.plan.layers(),
            "overlay mounted"
        );
        Ok(manager)
    }

    fn mount_all(&mut self) -> Result<()> {
        for step in self.plan.steps().to_vec() {
            if step.kind == StepKind::UnionMount {
                self.prepare_layer_dirs()?;
            }
            tracing::debug!(step = %step.kind, "mounting");
            let handle = MountHandle::acquire(
                Arc::clone(&self.runner),
                step.mount_command,
                step.unmount_command,
            )?;
            self.mount_stack.push(handle);
        }
        Ok(())
    }

    fn prepare_layer_dirs(&self) -> Result<()> {
        for layer in self.plan.layers() {
            let whiteout = self.plan.whiteout_path(layer);
            let _ = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&whiteout)
                .map_err(|e| KeystoneError::Io {
                    path: whiteout.clone(),
                    source: e,
                })?;
            tracing::debug!(path = %whiteout.display(), "layer whiteout in place");
        }
        create_dir(&self.plan.work_dir())?;
        create_dir(&self.plan.upper_dir())
    }

    /// Unmounts everything in reverse order of creation.
    ///
    /// Every handle is released even if earlier ones fail. Once all mounts
    /// are released cleanly the empty passthrough directory is removed;
    /// otherwise it is left in place, since it may still be a mount point.
    /// Calling this again does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::TeardownIncomplete`] listing each unmount
    /// that failed.
    pub fn destroy(&mut self) -> Result<()> {
        let was_mounted = !self.mount_stack.is_empty();
        let mut failures = Vec::new();
        while let Some(mut handle) = self.mount_stack.pop() {
            if let Err(e) = handle.release() {
                failures.push(e);
            }
        }

        if let Some(dir) = self.passthrough_dir.take() {
            if failures.is_empty() {
                if let Err(e) = fs::remove_dir(&dir) {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "could not remove passthrough directory"
                    );
                }
            } else {
                tracing::warn!(path = %dir.display(), "passthrough directory left behind");
            }
        }
        self.lock = None;

        if !failures.is_empty() {
            return Err(KeystoneError::TeardownIncomplete { failures });
        }
        if was_mounted {
            tracing::info!(build_target = %self.plan.target(), "overlay torn down");
        }
        Ok(())
    }

    /// Commands of every live mount, in creation order.
    #[must_use]
    pub fn mount_info(&self) -> Vec<MountInfo> {
        self.mount_stack.iter().map(MountHandle::info).collect()
    }

    /// Returns `true` while any mount of this overlay is live.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        !self.mount_stack.is_empty()
    }

    /// Target the overlay was built for.
    #[must_use]
    pub const fn target(&self) -> &BuildTarget {
        self.plan.target()
    }

    /// Absolute root of the overlaid tree.
    #[must_use]
    pub fn source_root(&self) -> &Path {
        self.plan.source_root()
    }

    /// Layer names, most specific first.
    #[must_use]
    pub fn layers(&self) -> &[String] {
        self.plan.layers()
    }

    /// Layout and commands this overlay was mounted with.
    #[must_use]
    pub const fn plan(&self) -> &OverlayPlan {
        &self.plan
    }
}

impl fmt::Debug for OverlayManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayManager")
            .field("plan", &self.plan)
            .field("mount_stack", &self.mount_stack)
            .field("passthrough_dir", &self.passthrough_dir)
            .field("lock", &self.lock)
            .finish_non_exhaustive()
    }
}

impl Drop for OverlayManager {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            tracing::error!(error = %e, "overlay teardown on drop failed");
        }
    }
}

/// Creates the build-output directory and, if requested, locks it.
fn prepare_output(output: &Path, lock: bool) -> Result<Option<SourceRootLock>> {
    create_dir(output)?;
    if lock {
        SourceRootLock::acquire(&output.join(LOCK_FILE)).map(Some)
    } else {
        Ok(None)
    }
}

fn ensure_dir(path: &Path, reason: &'static str) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    Err(KeystoneError::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::NotFound, reason),
    })
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| KeystoneError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
