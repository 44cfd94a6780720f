//! `git svn` client.
//!
//! Talks to the centralized SVN repository through the git-svn bridge of the
//! local clone. Both operations can take minutes on large repositories.
//! They run without a terminal, so SVN credentials must already be cached
//! (for example by an earlier `git svn fetch`).

use tracing::{info, instrument, warn};

use crate::command::CommandRunner;
use crate::errors::CommandError;
use crate::models::CommandOutput;

/// Wrapper over `git svn` subcommands.
pub struct GitSvnClient<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GitSvnClient<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Fetch new SVN revisions and replay local commits on top of them.
    #[instrument(skip(self))]
    pub fn rebase(&self) -> Result<CommandOutput, CommandError> {
        let out = self.runner.run("git", &["svn", "rebase"], false)?;
        if out.success() {
            info!("git svn rebase completed");
        } else {
            warn!(exit_code = out.exit_code, "git svn rebase failed");
        }
        Ok(out)
    }

    /// Commit each local commit back to SVN.
    #[instrument(skip(self))]
    pub fn dcommit(&self) -> Result<CommandOutput, CommandError> {
        let out = self.runner.run("git", &["svn", "dcommit"], false)?;
        if out.success() {
            info!("git svn dcommit completed");
        } else {
            warn!(exit_code = out.exit_code, stderr = %out.stderr, "git svn dcommit failed");
        }
        Ok(out)
    }
}
