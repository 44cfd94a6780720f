//! Blocking external command runner.
//!
//! Every git and git-svn invocation goes through a [`CommandRunner`]. The
//! runner captures output as text and never terminates the process; whether
//! a non-zero exit is fatal is the caller's decision.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::CommandError;
use crate::models::CommandOutput;

/// Set by the signal handler when the operator presses Ctrl+C.
pub type InterruptFlag = Arc<AtomicBool>;

/// Executes external commands on behalf of the inspector, clients and merge
/// tool launcher.
pub trait CommandRunner {
    /// Run `program args...` and capture its output.
    ///
    /// With `check` set, a non-zero exit becomes [`CommandError::Failed`]
    /// carrying the captured streams. Without it the output is returned as-is
    /// whatever the exit code.
    fn run(&self, program: &str, args: &[&str], check: bool) -> Result<CommandOutput, CommandError>;

    /// Run `program args...` attached to the terminal and return its exit code.
    ///
    /// Used for merge tools and editors that need to interact with the user.
    fn run_attached(&self, program: &str, args: &[&str]) -> Result<i32, CommandError>;
}

/// [`CommandRunner`] backed by `std::process`, rooted at a repository path.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    working_dir: PathBuf,
    interrupt: Option<InterruptFlag>,
}

impl SystemRunner {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            interrupt: None,
        }
    }

    /// Report [`CommandError::Interrupted`] once `flag` has been raised.
    pub fn with_interrupt_flag(mut self, flag: InterruptFlag) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn spawn_error(program: &str, e: std::io::Error) -> CommandError {
        if e.kind() == std::io::ErrorKind::NotFound {
            CommandError::BinaryNotFound(program.to_string())
        } else {
            CommandError::Io(e)
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], check: bool) -> Result<CommandOutput, CommandError> {
        let command = display_command(program, args);
        debug!(cmd = %command, dir = %self.working_dir.display(), "running command");

        // Captured commands never read the terminal: a prompt (such as SVN
        // credentials) fails immediately and shows up in the echoed output.
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Self::spawn_error(program, e))?;

        if self.interrupted() {
            return Err(CommandError::Interrupted);
        }

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        if check && !result.success() {
            warn!(cmd = %command, exit_code = result.exit_code, stderr = %result.stderr, "command failed");
            return Err(CommandError::Failed {
                command,
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }

        debug!(cmd = %command, exit_code = result.exit_code, "command finished");
        Ok(result)
    }

    fn run_attached(&self, program: &str, args: &[&str]) -> Result<i32, CommandError> {
        let command = display_command(program, args);
        debug!(cmd = %command, "running attached command");

        let status = Command::new(program)
            .args(args)
            .current_dir(&self.working_dir)
            .status()
            .map_err(|e| Self::spawn_error(program, e))?;

        if self.interrupted() {
            return Err(CommandError::Interrupted);
        }
        Ok(status.code().unwrap_or(-1))
    }
}

/// Render a command line for logs and error messages.
pub fn display_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        assert_eq!(display_command("git", &["svn", "rebase"]), "git svn rebase");
        assert_eq!(display_command("git", &[]), "git");
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemRunner::new(dir.path());
        let err = runner
            .run("definitely-not-a-real-command-12345", &[], false)
            .unwrap_err();
        assert!(matches!(err, CommandError::BinaryNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_without_check_returns_output() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemRunner::new(dir.path());
        let out = runner
            .run("sh", &["-c", "echo out; echo err >&2; exit 3"], false)
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_with_check_carries_streams() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemRunner::new(dir.path());
        let err = runner
            .run("sh", &["-c", "echo partial; echo boom >&2; exit 2"], true)
            .unwrap_err();
        match err {
            CommandError::Failed {
                exit_code,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(exit_code, 2);
                assert_eq!(stdout.trim(), "partial");
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_raised_interrupt_flag_surfaces_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let flag: InterruptFlag = Arc::new(AtomicBool::new(true));
        let runner = SystemRunner::new(dir.path()).with_interrupt_flag(flag);
        let err = runner.run("sh", &["-c", "true"], false).unwrap_err();
        assert!(err.is_interrupt());
    }

    #[cfg(unix)]
    #[test]
    fn test_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let runner = SystemRunner::new(dir.path());
        let out = runner.run("sh", &["-c", "ls"], true).unwrap();
        assert!(out.stdout.contains("marker.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_captured_command_sees_closed_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let runner = SystemRunner::new(dir.path());
        let out = runner
            .run("sh", &["-c", "read answer || echo no-input"], false)
            .unwrap();
        assert_eq!(out.stdout.trim(), "no-input");
    }
}
