//! Error types for the merge assistant core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Conflicts are not errors. A merge or rebase that stops on conflicts is a
//! normal outcome routed through the conflict controller; only infrastructure
//! problems (missing binaries, broken terminals, interrupts) and precondition
//! violations end up here.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CoreError {
    /// Whether this error was caused by the operator pressing Ctrl+C.
    pub fn is_interrupt(&self) -> bool {
        match self {
            CoreError::Command(e) => e.is_interrupt(),
            CoreError::Repo(RepoError::Command(e)) => e.is_interrupt(),
            CoreError::Prompt(e) => e.is_interrupt(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Errors from running external commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The executable was not found on `$PATH`.
    #[error("executable not found: {0}")]
    BinaryNotFound(String),

    /// A command exited with a non-zero status while the caller asked for
    /// failures to be surfaced.
    #[error("command `{command}` failed (exit {exit_code}): {stderr}")]
    Failed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// A keyboard interrupt arrived while the command was running.
    #[error("interrupted by user")]
    Interrupted,

    /// Generic I/O wrapper (spawn failures other than a missing binary).
    #[error("command I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, CommandError::Interrupted)
    }
}

// ---------------------------------------------------------------------------
// Repository precondition errors
// ---------------------------------------------------------------------------

/// Precondition failures detected before any mutating command runs.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The requested repository path does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(String),

    /// The requested repository path is not a directory.
    #[error("path is not a directory: {0}")]
    NotADirectory(String),

    /// The directory is not inside a Git working tree.
    #[error("not in a git repository: {0}")]
    NotARepository(String),

    /// The working tree has pending modifications.
    #[error("there are uncommitted changes; commit or stash them before continuing")]
    UncommittedChanges,

    /// `git branch` listed nothing.
    #[error("no local branches found")]
    NoBranches,

    /// A branch named by the operator does not exist locally.
    #[error("branch {0} does not exist")]
    UnknownBranch(String),

    /// The branch to merge and the trunk are the same branch.
    #[error("cannot merge {0} into itself")]
    SameBranch(String),

    /// Underlying command error while inspecting the repository.
    #[error("repository inspection failed: {0}")]
    Command(#[from] CommandError),
}

// ---------------------------------------------------------------------------
// Prompt errors
// ---------------------------------------------------------------------------

/// Errors from interactive prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The operator pressed Ctrl+C at a prompt.
    #[error("prompt interrupted by user")]
    Interrupted,

    /// The terminal could not be read from or written to.
    #[error("terminal error: {0}")]
    Io(String),
}

impl PromptError {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, PromptError::Interrupted)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = RepoError::UnknownBranch("trunk".into());
        assert_eq!(err.to_string(), "branch trunk does not exist");

        let err = CommandError::Failed {
            command: "git svn dcommit".into(),
            exit_code: 1,
            stdout: String::new(),
            stderr: "Authorization failed".into(),
        };
        assert_eq!(
            err.to_string(),
            "command `git svn dcommit` failed (exit 1): Authorization failed"
        );

        let err = ConfigError::InvalidValue {
            field: "merge.trunk_branch".into(),
            detail: "must not be empty".into(),
        };
        assert!(err.to_string().contains("merge.trunk_branch"));
    }

    #[test]
    fn test_interrupt_detection_through_wrappers() {
        let core: CoreError = CommandError::Interrupted.into();
        assert!(core.is_interrupt());

        let core: CoreError = RepoError::Command(CommandError::Interrupted).into();
        assert!(core.is_interrupt());

        let core: CoreError = PromptError::Interrupted.into();
        assert!(core.is_interrupt());

        let core: CoreError = RepoError::UncommittedChanges.into();
        assert!(!core.is_interrupt());
    }
}
