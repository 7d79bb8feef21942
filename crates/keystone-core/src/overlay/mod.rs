//! `OverlayFS` composition of a source tree with target-specific layers.
//!
//! [`plan`] computes the directory layout and the ordered mount commands
//! without side effects. [`manager`] executes a plan and owns the resulting
//! mount stack until teardown.

pub mod manager;
pub mod plan;
