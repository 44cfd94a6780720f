//! git-svn merge assistant core library.
//!
//! This crate provides the building blocks for merging a local branch into
//! the SVN-tracking trunk of a git-svn clone: command execution, repository
//! inspection, git and git-svn clients, interactive conflict resolution and
//! the four-phase merge orchestrator.

pub mod command;
pub mod config;
pub mod conflict;
pub mod errors;
pub mod git;
pub mod interaction;
pub mod models;
pub mod orchestrator;
pub mod svn;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

// Re-exports for convenience.
pub use command::{CommandRunner, InterruptFlag, SystemRunner};
pub use config::MergeConfig;
pub use conflict::{ConflictController, MergeToolLauncher, Resolution};
pub use errors::CoreError;
pub use git::{GitClient, RepositoryInspector};
pub use interaction::{Interaction, Level};
pub use orchestrator::{MergeOptions, MergeOrchestrator, RunReport};
pub use svn::GitSvnClient;
