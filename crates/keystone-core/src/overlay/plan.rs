//! Pure computation of overlay paths and mount commands.

use std::fmt;
use std::path::{Path, PathBuf};

use keystone_common::constants::{
    ARTIFACTS_DIR, OUTPUT_DIR, OUTPUT_OVERLAYS_DIR, OVERLAYS_DIR, WHITEOUT_FILE, WORK_DIR,
};
use keystone_common::error::{KeystoneError, Result};
use keystone_common::types::{BuildTarget, MountInfo};

use crate::layers::layers_for;

/// Which part of the overlay a mount step establishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Bind the build-output directory aside before the union mount hides it.
    PassthroughPrepare,
    /// The `OverlayFS` mount over the source root.
    UnionMount,
    /// Bind the original build-output directory back on top of the union.
    PassthroughRestore,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassthroughPrepare => write!(f, "passthrough-prepare"),
            Self::UnionMount => write!(f, "union-mount"),
            Self::PassthroughRestore => write!(f, "passthrough-restore"),
        }
    }
}

/// One mount to perform, with the command that undoes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountStep {
    /// Role of this step.
    pub kind: StepKind,
    /// Command establishing the mount.
    pub mount_command: Vec<String>,
    /// Command tearing the mount down.
    pub unmount_command: Vec<String>,
}

impl MountStep {
    /// Both commands as a [`MountInfo`].
    #[must_use]
    pub fn info(&self) -> MountInfo {
        MountInfo {
            mount_command: self.mount_command.clone(),
            unmount_command: self.unmount_command.clone(),
        }
    }
}

/// Directory layout and ordered mount steps for one target.
#[derive(Debug, Clone)]
pub struct OverlayPlan {
    target: BuildTarget,
    source_root: PathBuf,
    layers: Vec<String>,
    passthrough_dir: PathBuf,
    steps: Vec<MountStep>,
}

impl OverlayPlan {
    /// Resolves the layers of `target` and builds the mount steps.
    ///
    /// `passthrough_dir` is where the build output is bound aside during
    /// the union mount. Nothing on disk is inspected or modified.
    ///
    /// # Errors
    ///
    /// Returns [`KeystoneError::UnknownTarget`] for targets missing from the
    /// layer table, or [`KeystoneError::Config`] if a path cannot be encoded
    /// into `OverlayFS` mount options.
    pub fn new(
        target: &BuildTarget,
        source_root: &Path,
        passthrough_dir: &Path,
        privilege_prefix: &[String],
    ) -> Result<Self> {
        let layers: Vec<String> = layers_for(target.as_str())?
            .iter()
            .map(|s| (*s).to_owned())
            .collect();

        let mut plan = Self {
            target: target.clone(),
            source_root: source_root.to_path_buf(),
            layers,
            passthrough_dir: passthrough_dir.to_path_buf(),
            steps: Vec::with_capacity(3),
        };

        let output = plan.output_dir();
        let source = path_arg(source_root);
        let passthrough = path_arg(passthrough_dir);
        let output_arg = path_arg(&output);

        plan.steps.push(MountStep {
            kind: StepKind::PassthroughPrepare,
            mount_command: with_prefix(
                privilege_prefix,
                &["mount", "--bind", &output_arg, &passthrough],
            ),
            unmount_command: with_prefix(privilege_prefix, &["umount", &passthrough]),
        });

        let options = plan.union_options()?;
        plan.steps.push(MountStep {
            kind: StepKind::UnionMount,
            mount_command: with_prefix(
                privilege_prefix,
                &["mount", "--types", "overlay", "--options", &options, "overlay", &source],
            ),
            unmount_command: with_prefix(privilege_prefix, &["umount", &source]),
        });

        plan.steps.push(MountStep {
            kind: StepKind::PassthroughRestore,
            mount_command: with_prefix(
                privilege_prefix,
                &["mount", "--bind", &passthrough, &output_arg],
            ),
            unmount_command: with_prefix(privilege_prefix, &["umount", &output_arg]),
        });

        Ok(plan)
    }

    /// Target this plan was built for.
    #[must_use]
    pub const fn target(&self) -> &BuildTarget {
        &self.target
    }

    /// Root of the tree being overlaid.
    #[must_use]
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Layer names, most specific first.
    #[must_use]
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Directory of one layer, `<source_root>/overlays/<layer>`.
    #[must_use]
    pub fn layer_dir(&self, layer: &str) -> PathBuf {
        self.source_root.join(OVERLAYS_DIR).join(layer)
    }

    /// Layer directories in precedence order.
    pub fn layer_dirs(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.layers.iter().map(|layer| self.layer_dir(layer))
    }

    /// Marker file inside a layer directory.
    #[must_use]
    pub fn whiteout_path(&self, layer: &str) -> PathBuf {
        self.layer_dir(layer).join(WHITEOUT_FILE)
    }

    /// Build-output directory that stays outside the overlay.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.source_root.join(OUTPUT_DIR)
    }

    /// Per-target scratch directory, `<out>/overlays/<target>`.
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.output_dir()
            .join(OUTPUT_OVERLAYS_DIR)
            .join(self.target.as_str())
    }

    /// `OverlayFS` upper directory capturing writes.
    #[must_use]
    pub fn upper_dir(&self) -> PathBuf {
        self.scratch_dir().join(ARTIFACTS_DIR)
    }

    /// `OverlayFS` work directory.
    #[must_use]
    pub fn work_dir(&self) -> PathBuf {
        self.scratch_dir().join(WORK_DIR)
    }

    /// Where the build output is bound aside during the union mount.
    #[must_use]
    pub fn passthrough_dir(&self) -> &Path {
        &self.passthrough_dir
    }

    /// Mount steps in execution order.
    #[must_use]
    pub fn steps(&self) -> &[MountStep] {
        &self.steps
    }

    fn union_options(&self) -> Result<String> {
        let mut lower = self.layer_dirs().collect::<Vec<_>>();
        lower.push(self.source_root.clone());
        let lower = lower
            .iter()
            .map(|p| option_path(p))
            .collect::<Result<Vec<_>>>()?
            .join(":");
        Ok(format!(
            "lowerdir={lower},upperdir={},workdir={}",
            option_path(&self.upper_dir())?,
            option_path(&self.work_dir())?
        ))
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Renders a path for use inside the comma and colon separated option string.
fn option_path(path: &Path) -> Result<String> {
    let rendered = path_arg(path);
    if rendered.contains([',', ':']) {
        return Err(KeystoneError::Config {
            message: format!("path cannot be used as an overlay option: {rendered}"),
        });
    }
    Ok(rendered)
}

fn with_prefix(prefix: &[String], args: &[&str]) -> Vec<String> {
    prefix
        .iter()
        .cloned()
        .chain(args.iter().map(|s| (*s).to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sudo() -> Vec<String> {
        vec!["sudo".to_owned()]
    }

    fn sdm845_plan() -> OverlayPlan {
        OverlayPlan::new(
            &BuildTarget::from("sdm845"),
            Path::new("/src"),
            Path::new("/tmp/pt"),
            &sudo(),
        )
        .expect("plan")
    }

    #[test]
    fn union_mount_renders_lowerdir_upperdir_and_workdir() {
        let plan = sdm845_plan();
        let union = &plan.steps()[1];
        assert_eq!(union.kind, StepKind::UnionMount);
        assert_eq!(
            union.mount_command,
            vec![
                "sudo",
                "mount",
                "--types",
                "overlay",
                "--options",
                "lowerdir=/src/overlays/qcom-LA.UM.7.3-incoming:/src/overlays/keystone:/src,\
                 upperdir=/src/out/overlays/sdm845/artifacts,\
                 workdir=/src/out/overlays/sdm845/work",
                "overlay",
                "/src",
            ]
        );
        assert_eq!(union.unmount_command, vec!["sudo", "umount", "/src"]);
    }

    #[test]
    fn steps_are_prepare_union_restore() {
        let kinds: Vec<_> = sdm845_plan().steps().iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            [
                StepKind::PassthroughPrepare,
                StepKind::UnionMount,
                StepKind::PassthroughRestore
            ]
        );
    }

    #[test]
    fn passthrough_binds_output_aside_and_back() {
        let plan = sdm845_plan();
        let prepare = &plan.steps()[0];
        let restore = &plan.steps()[2];
        assert_eq!(prepare.mount_command, vec!["sudo", "mount", "--bind", "/src/out", "/tmp/pt"]);
        assert_eq!(prepare.unmount_command, vec!["sudo", "umount", "/tmp/pt"]);
        assert_eq!(restore.mount_command, vec!["sudo", "mount", "--bind", "/tmp/pt", "/src/out"]);
        assert_eq!(restore.unmount_command, vec!["sudo", "umount", "/src/out"]);
    }

    #[test]
    fn empty_prefix_runs_mount_directly() {
        let plan = OverlayPlan::new(
            &BuildTarget::from("sdm845"),
            Path::new("/src"),
            Path::new("/tmp/pt"),
            &[],
        )
        .expect("plan");
        assert_eq!(plan.steps()[1].unmount_command, vec!["umount", "/src"]);
    }

    #[test]
    fn layout_is_scoped_by_target() {
        let plan = OverlayPlan::new(
            &BuildTarget::from("sdm845_gms"),
            Path::new("/src"),
            Path::new("/tmp/pt"),
            &sudo(),
        )
        .expect("plan");
        assert_eq!(plan.upper_dir(), Path::new("/src/out/overlays/sdm845_gms/artifacts"));
        assert_eq!(plan.work_dir(), Path::new("/src/out/overlays/sdm845_gms/work"));
        assert_eq!(plan.whiteout_path("gms"), Path::new("/src/overlays/gms/overlays"));
    }

    #[test]
    fn unknown_target_fails_before_planning() {
        let err = OverlayPlan::new(
            &BuildTarget::from("nonexistent-target"),
            Path::new("/src"),
            Path::new("/tmp/pt"),
            &sudo(),
        )
        .unwrap_err();
        assert!(matches!(err, KeystoneError::UnknownTarget { .. }));
    }

    #[test]
    fn source_root_with_colon_is_rejected() {
        let err = OverlayPlan::new(
            &BuildTarget::from("sdm845"),
            Path::new("/src:old"),
            Path::new("/tmp/pt"),
            &sudo(),
        )
        .unwrap_err();
        assert!(matches!(err, KeystoneError::Config { .. }));
    }
}
