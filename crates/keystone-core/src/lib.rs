//! # keystone-core
//!
//! Layered mount management for sandboxed Android platform builds.
//!
//! This crate composes an `OverlayFS` view of a source tree from an ordered
//! set of target-specific layers and guarantees the mounts are torn down in
//! reverse order, only for mounts that actually succeeded:
//! - **Runner**: the capability that executes mount command vectors.
//! - **Mount handles**: one mount paired with its unmount.
//! - **Layers**: the static target to layer table.
//! - **Overlay**: command planning and the mount stack manager.
//! - **Lock**: advisory exclusion per source root.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod layers;
pub mod lock;
pub mod mount;
pub mod overlay;
pub mod runner;

pub use mount::MountHandle;
pub use overlay::manager::OverlayManager;
pub use runner::{CommandRunner, CommandStatus, SystemRunner};
