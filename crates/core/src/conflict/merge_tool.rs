//! Launching a merge tool for one conflicted file.

use std::path::PathBuf;

use tracing::{debug, warn};

use crate::command::CommandRunner;
use crate::errors::CommandError;
use crate::models::ConflictedFile;

/// Opens conflicted files in the operator's merge tool.
///
/// The configured executable is used when it exists on disk. Otherwise
/// `git mergetool` runs whatever `merge.tool` git is configured with.
pub struct MergeToolLauncher<'a> {
    runner: &'a dyn CommandRunner,
    work_dir: PathBuf,
    preferred: PathBuf,
}

impl<'a> MergeToolLauncher<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        work_dir: impl Into<PathBuf>,
        preferred: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            work_dir: work_dir.into(),
            preferred: preferred.into(),
        }
    }

    /// Run the tool on `file` and wait for it to exit.
    ///
    /// Returns whether the tool reported success. A missing or failing tool
    /// is reported as `false`; only an interrupt is an error.
    pub fn launch(&self, file: &ConflictedFile) -> Result<bool, CommandError> {
        let result = if self.preferred.is_file() {
            let target = self.work_dir.join(file.as_str());
            let target = target.display();
            let args = [
                format!("-base:{target}"),
                format!("-mine:{target}"),
                format!("-theirs:{target}"),
            ];
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            debug!(tool = %self.preferred.display(), file = %file, "launching configured merge tool");
            self.runner
                .run_attached(&self.preferred.to_string_lossy(), &args)
        } else {
            debug!(file = %file, "launching git mergetool");
            self.runner
                .run_attached("git", &["mergetool", "--", file.as_str()])
        };

        match result {
            Ok(0) => Ok(true),
            Ok(code) => {
                warn!(file = %file, code, "merge tool exited with non-zero status");
                Ok(false)
            }
            Err(CommandError::Interrupted) => Err(CommandError::Interrupted),
            Err(e) => {
                warn!(file = %file, error = %e, "could not run merge tool");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRepo;

    #[test]
    fn test_falls_back_to_git_mergetool() {
        let repo = FakeRepo::new();
        let launcher = MergeToolLauncher::new(&repo, "/repo", "/nonexistent/TortoiseGitMerge.exe");
        assert!(launcher.launch(&ConflictedFile::new("src/a.txt")).unwrap());
        assert_eq!(repo.attached_commands(), vec!["git mergetool -- src/a.txt"]);
    }

    #[test]
    fn test_configured_tool_used_when_present() {
        let repo = FakeRepo::new();
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("mergetool");
        std::fs::write(&tool, "").unwrap();

        let launcher = MergeToolLauncher::new(&repo, "/repo", &tool);
        launcher.launch(&ConflictedFile::new("a.txt")).unwrap();

        let cmds = repo.attached_commands();
        assert_eq!(cmds.len(), 1);
        assert!(cmds[0].starts_with(&tool.display().to_string()));
        assert!(cmds[0].contains("-base:/repo/a.txt"));
        assert!(cmds[0].contains("-theirs:/repo/a.txt"));
    }

    #[test]
    fn test_tool_failure_is_not_fatal() {
        let repo = FakeRepo::new();
        repo.script_attached(2);
        let launcher = MergeToolLauncher::new(&repo, "/repo", "/nonexistent");
        assert!(!launcher.launch(&ConflictedFile::new("a.txt")).unwrap());
    }
}
