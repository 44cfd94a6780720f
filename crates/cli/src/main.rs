//! `merge-svn`: merge a local Git branch into the SVN trunk of a git-svn
//! clone.
//!
//! Walks the operator through rebasing trunk onto SVN, merging the branch,
//! resolving any conflicts, rebasing again and publishing with
//! `git svn dcommit`.

mod logging;
mod session;
mod signals;
mod style;
mod terminal;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::debug;

use gitsvnmerge_core::git::work_tree_root;
use gitsvnmerge_core::{InterruptFlag, MergeConfig, SystemRunner};

use session::{Session, SessionOutcome};
use terminal::TerminalUi;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// Interactive git-svn merge assistant.
#[derive(Parser, Debug)]
#[command(
    name = "merge-svn",
    version,
    about = "Merge a Git branch into SVN trunk through git-svn"
)]
struct Cli {
    /// Repository to work in. Defaults to the current directory.
    repository_path: Option<PathBuf>,

    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log more to stderr (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Append debug logs to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(outcome) if outcome.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<SessionOutcome> {
    let repo_path = session::validate_repo_path(cli.repository_path.as_deref())
        .context("invalid repository path")?;

    let mut config =
        MergeConfig::discover(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(path) = cli.log_file {
        config.logging.log_file = Some(path);
    }
    let _log_guard = logging::init_logging(&config.logging, cli.verbose)?;
    debug!(repo = %repo_path.display(), "starting session");

    let interrupt = signals::setup_signal_handlers();
    tokio::task::spawn_blocking(move || run_session(repo_path, config, interrupt))
        .await
        .context("session task failed")?
}

/// Run the blocking session; on Ctrl+C, run the interrupt cleanup.
fn run_session(
    repo_path: PathBuf,
    config: MergeConfig,
    interrupt: InterruptFlag,
) -> Result<SessionOutcome> {
    // Conflicted paths are relative to the top of the work tree, so every
    // command runs from there even when a subdirectory was given.
    let repo_path = work_tree_root(&SystemRunner::new(&repo_path), &repo_path)
        .context("failed to locate the top of the working tree")?;
    let runner = SystemRunner::new(&repo_path).with_interrupt_flag(interrupt.clone());
    let ui = TerminalUi::new();
    let session = Session::new(&repo_path, &config, &runner, &ui);

    match session.run() {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.is_interrupt() => {
            signals::clear(&interrupt);
            match session::cleanup_after_interrupt(&runner, &repo_path, &ui) {
                Ok(()) => {}
                Err(e) if e.is_interrupt() => debug!("cleanup interrupted"),
                Err(e) => return Err(e).context("cleanup after interrupt failed"),
            }
            Ok(SessionOutcome::Interrupted)
        }
        Err(e) => Err(e).context("merge session failed"),
    }
}
