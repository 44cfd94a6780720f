//! Conflict handling for paused merges and rebases.
//!
//! - [`classify`] tells conflicts apart from other command failures.
//! - [`merge_tool`] opens a file in the operator's merge tool.
//! - [`controller`] runs the interactive resolution loop.

pub mod classify;
pub mod controller;
pub mod merge_tool;

pub use classify::{classify_failure, FailureClass};
pub use controller::{ConflictController, Resolution};
pub use merge_tool::MergeToolLauncher;
