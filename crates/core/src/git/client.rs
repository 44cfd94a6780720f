//! Mutating git operations.
//!
//! These run with `check = false` and hand the raw [`CommandOutput`] back so
//! the orchestrator can tell conflicts from other failures and echo git's own
//! diagnostics to the operator.

use tracing::{info, instrument};

use crate::command::CommandRunner;
use crate::errors::CommandError;
use crate::models::{CommandOutput, Side};

/// Thin wrapper over the `git` executable.
pub struct GitClient<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GitClient<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    fn git(&self, args: &[&str]) -> Result<CommandOutput, CommandError> {
        self.runner.run("git", args, false)
    }

    #[instrument(skip(self))]
    pub fn checkout_branch(&self, branch: &str) -> Result<CommandOutput, CommandError> {
        self.git(&["checkout", branch])
    }

    /// Merge `branch` into the current branch with `message`.
    #[instrument(skip(self, message))]
    pub fn merge(&self, branch: &str, message: &str, no_ff: bool) -> Result<CommandOutput, CommandError> {
        let mut args = vec!["merge"];
        if no_ff {
            args.push("--no-ff");
        }
        args.extend([branch, "-m", message]);
        let out = self.git(&args)?;
        if out.success() {
            info!(branch, "merge succeeded");
        }
        Ok(out)
    }

    pub fn merge_abort(&self) -> Result<CommandOutput, CommandError> {
        self.git(&["merge", "--abort"])
    }

    pub fn rebase_abort(&self) -> Result<CommandOutput, CommandError> {
        self.git(&["rebase", "--abort"])
    }

    /// Continue a stopped rebase without opening an editor for the message.
    pub fn rebase_continue(&self) -> Result<CommandOutput, CommandError> {
        self.git(&["-c", "core.editor=true", "rebase", "--continue"])
    }

    /// Commit a resolved merge with git's prepared message.
    pub fn commit_no_edit(&self) -> Result<CommandOutput, CommandError> {
        self.git(&["commit", "--no-edit"])
    }

    pub fn commit_with_message(&self, message: &str) -> Result<CommandOutput, CommandError> {
        self.git(&["commit", "-m", message])
    }

    /// Replace a conflicted file with one side's version.
    pub fn checkout_side(&self, side: Side, path: &str) -> Result<CommandOutput, CommandError> {
        self.git(&["checkout", side.checkout_flag(), "--", path])
    }

    /// Stage `path`, marking it resolved.
    pub fn stage(&self, path: &str) -> Result<CommandOutput, CommandError> {
        self.git(&["add", "--", path])
    }

    /// Working-tree diff of one file, conflict markers included.
    pub fn diff_file(&self, path: &str) -> Result<String, CommandError> {
        Ok(self.git(&["diff", "--", path])?.stdout)
    }

    /// Stage the removal of `path`, for conflicts where one side deleted it.
    pub fn remove(&self, path: &str) -> Result<CommandOutput, CommandError> {
        self.git(&["rm", "--quiet", "--", path])
    }

    #[instrument(skip(self))]
    pub fn delete_branch(&self, branch: &str, force: bool) -> Result<CommandOutput, CommandError> {
        let flag = if force { "-D" } else { "-d" };
        self.git(&["branch", flag, branch])
    }
}
