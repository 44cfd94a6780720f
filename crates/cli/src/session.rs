//! The interactive merge session.
//!
//! Checks preconditions, asks which branch to merge into which trunk,
//! confirms the plan, runs the orchestrator and finally offers to delete
//! the merged branch.

use std::path::{Path, PathBuf};

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use tracing::{debug, info};

use gitsvnmerge_core::errors::{CoreError, RepoError};
use gitsvnmerge_core::models::{Phase, SessionPlan};
use gitsvnmerge_core::orchestrator::PhaseOutcome;
use gitsvnmerge_core::{
    CommandRunner, ConflictController, GitClient, GitSvnClient, Interaction, MergeConfig,
    MergeOptions, MergeOrchestrator, MergeToolLauncher, RepositoryInspector, RunReport,
};

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// All four phases completed.
    Completed,
    /// The operator declined the plan; nothing was changed.
    Declined,
    /// A git or git-svn step failed.
    Failed,
    /// Ctrl+C; cleanup has already run.
    Interrupted,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Completed | SessionOutcome::Declined)
    }
}

/// Resolve the repository argument, rejecting paths that do not exist or
/// are not directories.
pub fn validate_repo_path(path: Option<&Path>) -> Result<PathBuf, RepoError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir()
            .map_err(|e| RepoError::PathNotFound(format!(".: {e}")))?,
    };
    if !path.exists() {
        return Err(RepoError::PathNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(RepoError::NotADirectory(path.display().to_string()));
    }
    Ok(path)
}

/// One interactive run against one repository.
pub struct Session<'a> {
    repo_path: &'a Path,
    config: &'a MergeConfig,
    runner: &'a dyn CommandRunner,
    ui: &'a dyn Interaction,
}

impl<'a> Session<'a> {
    pub fn new(
        repo_path: &'a Path,
        config: &'a MergeConfig,
        runner: &'a dyn CommandRunner,
        ui: &'a dyn Interaction,
    ) -> Self {
        Self {
            repo_path,
            config,
            runner,
            ui,
        }
    }

    pub fn run(&self) -> Result<SessionOutcome, CoreError> {
        self.ui.heading("Git-SVN Merge Assistant");
        self.ui
            .info(&format!("Working in repository: {}", self.repo_path.display()));

        let inspector = RepositoryInspector::discover(self.runner, self.repo_path)?;
        let git = GitClient::new(self.runner);

        let (current, branches) = self.check_preconditions(&inspector)?;
        let plan = self.ask_plan(current.as_deref(), &branches)?;

        if current.as_deref() != Some(plan.trunk_branch.as_str()) {
            self.ui
                .step(&format!("Switching to branch {}...", plan.trunk_branch));
            let out = git.checkout_branch(&plan.trunk_branch)?;
            if !out.success() {
                self.ui
                    .error(&format!("Could not switch to {}", plan.trunk_branch));
                self.ui.print(out.combined().trim_end());
                return Ok(SessionOutcome::Failed);
            }
        }

        self.show_summary(&plan);
        if !self.ui.confirm("Do you want to proceed?")? {
            self.ui.info("Operation cancelled by user");
            return Ok(SessionOutcome::Declined);
        }

        let svn = GitSvnClient::new(self.runner);
        let tool = MergeToolLauncher::new(self.runner, self.repo_path, &self.config.merge_tool.path);
        let controller = ConflictController::new(&inspector, &git, &tool, self.ui)
            .with_max_rounds(self.config.merge.max_conflict_rounds);
        let orchestrator = MergeOrchestrator::new(
            &inspector,
            &git,
            &svn,
            &controller,
            self.ui,
            MergeOptions::from(self.config),
        );

        let report = orchestrator.run(&plan)?;
        self.ui.print(&render_report(&report));
        if let Some(phase) = report.failed {
            self.ui.error(&format!("Operation failed during the {phase} phase"));
            return Ok(SessionOutcome::Failed);
        }

        if self.config.merge.delete_branch_prompt {
            self.offer_branch_deletion(&git, &plan.branch_to_merge)?;
        }
        self.ui.success("Operation completed successfully!");
        Ok(SessionOutcome::Completed)
    }

    // -----------------------------------------------------------------------
    // Preconditions and prompts
    // -----------------------------------------------------------------------

    fn check_preconditions(
        &self,
        inspector: &RepositoryInspector<'_>,
    ) -> Result<(Option<String>, Vec<String>), CoreError> {
        if !inspector.is_inside_working_tree()? {
            return Err(RepoError::NotARepository(self.repo_path.display().to_string()).into());
        }
        if inspector.has_uncommitted_changes()? {
            return Err(RepoError::UncommittedChanges.into());
        }

        let ctx = inspector.context()?;
        match &ctx.current_branch {
            Some(branch) => self.ui.info(&format!("Current branch: {branch}")),
            None => self.ui.warning("HEAD is detached"),
        }
        if ctx.branches.is_empty() {
            return Err(RepoError::NoBranches.into());
        }
        debug!(count = ctx.branches.len(), "local branches listed");
        Ok((ctx.current_branch, ctx.branches))
    }

    fn ask_plan(&self, current: Option<&str>, branches: &[String]) -> Result<SessionPlan, CoreError> {
        self.ui.print("\nAvailable local branches:");
        for (i, branch) in branches.iter().enumerate() {
            let marker = if Some(branch.as_str()) == current {
                " (current)"
            } else {
                ""
            };
            self.ui.print(&format!("  {}. {}{}", i + 1, branch, marker));
        }

        let branch_to_merge = loop {
            let answer = self
                .ui
                .input("Select the branch to merge (number or name)", None)?;
            match pick_branch(&answer, branches) {
                Some(branch) => break branch,
                None => self.ui.error("Invalid selection, try again"),
            }
        };

        let trunk_branch = self.ui.input(
            "Name of the trunk branch",
            Some(&self.config.merge.trunk_branch),
        )?;
        if !branches.iter().any(|b| *b == trunk_branch) {
            return Err(RepoError::UnknownBranch(trunk_branch).into());
        }
        if trunk_branch == branch_to_merge {
            return Err(RepoError::SameBranch(trunk_branch).into());
        }

        info!(branch = %branch_to_merge, trunk = %trunk_branch, "plan chosen");
        Ok(SessionPlan {
            branch_to_merge,
            trunk_branch,
        })
    }

    fn show_summary(&self, plan: &SessionPlan) {
        self.ui.heading("OPERATION SUMMARY");
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Step", "Action"]);
        let actions = [
            format!("SVN rebase of {}", plan.trunk_branch),
            format!("Merge {} into {}", plan.branch_to_merge, plan.trunk_branch),
            "Final SVN rebase".to_string(),
            "SVN dcommit to publish the changes".to_string(),
        ];
        for (i, action) in actions.iter().enumerate() {
            table.add_row(vec![Cell::new(i + 1), Cell::new(action)]);
        }
        self.ui.print(&table.to_string());
    }

    fn offer_branch_deletion(&self, git: &GitClient<'_>, branch: &str) -> Result<(), CoreError> {
        if !self
            .ui
            .confirm(&format!("Do you want to delete branch {branch}?"))?
        {
            return Ok(());
        }

        let out = git.delete_branch(branch, false)?;
        if out.success() {
            self.ui.success(&format!("Branch {branch} deleted"));
            return Ok(());
        }

        self.ui.warning(&format!("Could not delete branch {branch}"));
        self.ui.print(out.combined().trim_end());
        if self.ui.confirm("Do you want to force the deletion?")? {
            let out = git.delete_branch(branch, true)?;
            if out.success() {
                self.ui.success(&format!("Branch {branch} deleted"));
            } else {
                self.ui.error(&format!("Could not delete branch {branch}"));
                self.ui.print(out.combined().trim_end());
            }
        }
        Ok(())
    }
}

/// Parse a 1-based number or an exact branch name.
fn pick_branch(answer: &str, branches: &[String]) -> Option<String> {
    let answer = answer.trim();
    if let Ok(n) = answer.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| branches.get(i)).cloned();
    }
    branches.iter().find(|b| b.as_str() == answer).cloned()
}

fn render_report(report: &RunReport) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Phase", "Status"]);
    for phase in Phase::ALL {
        let status = match report.outcome_of(phase) {
            Some(PhaseOutcome::Completed) => Cell::new("✓ done").fg(Color::Green),
            Some(PhaseOutcome::Failed) => Cell::new("✗ failed").fg(Color::Red),
            None => Cell::new("– skipped").fg(Color::DarkGrey),
        };
        table.add_row(vec![Cell::new(phase_title(phase)), status]);
    }
    table.to_string()
}

fn phase_title(phase: Phase) -> String {
    let mut title = phase.to_string();
    if let Some(first) = title.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    title
}

/// After Ctrl+C, offer to abort whatever git has paused.
///
/// The merge and the rebase are offered separately. A second Ctrl+C at one
/// of these prompts leaves the repository as it is.
pub fn cleanup_after_interrupt(
    runner: &dyn CommandRunner,
    repo_path: &Path,
    ui: &dyn Interaction,
) -> Result<(), CoreError> {
    ui.warning("Operation interrupted by user");

    let inspector = RepositoryInspector::discover(runner, repo_path)?;
    let git = GitClient::new(runner);

    if inspector.merge_in_progress()
        && ui.confirm("A merge is in progress. Do you want to abort it?")?
    {
        let out = git.merge_abort()?;
        if out.success() {
            ui.success("Merge aborted");
        } else {
            ui.error("Could not abort the merge");
            ui.print(out.combined().trim_end());
        }
    }

    if inspector.rebase_in_progress()
        && ui.confirm("A rebase is in progress. Do you want to abort it?")?
    {
        let out = git.rebase_abort()?;
        if out.success() {
            ui.success("Rebase aborted");
        } else {
            ui.error("Could not abort the rebase");
            ui.print(out.combined().trim_end());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsvnmerge_core::models::OperationInProgress;
    use gitsvnmerge_core::testing::{Answer, FakeRepo, Outcome, ScriptedUi};
    use gitsvnmerge_core::Level;

    fn run_session(repo: &FakeRepo, ui: &ScriptedUi) -> Result<SessionOutcome, CoreError> {
        let config = MergeConfig::default();
        let path = repo.git_dir().to_path_buf();
        Session::new(&path, &config, repo, ui).run()
    }

    fn input(s: &str) -> Answer {
        Answer::Input(s.into())
    }

    #[test]
    fn test_validate_repo_path() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(validate_repo_path(Some(dir.path())).unwrap(), dir.path());

        let missing = dir.path().join("missing");
        assert!(matches!(
            validate_repo_path(Some(&missing)),
            Err(RepoError::PathNotFound(_))
        ));

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            validate_repo_path(Some(&file)),
            Err(RepoError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_pick_branch_by_number_or_name() {
        let branches = vec!["feature-x".to_string(), "master".to_string()];
        assert_eq!(pick_branch("1", &branches).as_deref(), Some("feature-x"));
        assert_eq!(pick_branch(" master ", &branches).as_deref(), Some("master"));
        assert_eq!(pick_branch("0", &branches), None);
        assert_eq!(pick_branch("3", &branches), None);
        assert_eq!(pick_branch("feature", &branches), None);
    }

    #[test]
    fn test_dirty_tree_stops_before_any_prompt() {
        let repo = FakeRepo::new();
        repo.set_dirty(true);
        let ui = ScriptedUi::default();

        let err = run_session(&repo, &ui).unwrap_err();

        assert!(matches!(err, CoreError::Repo(RepoError::UncommittedChanges)));
        assert!(ui.prompts().is_empty());
        assert_eq!(repo.count("merge"), 0);
    }

    #[test]
    fn test_declining_changes_nothing() {
        let repo = FakeRepo::new();
        repo.set_branches("master", &["feature-x", "master"]);
        let ui = ScriptedUi::new([input("9"), input("1"), input(""), Answer::no()]);

        let outcome = run_session(&repo, &ui).unwrap();

        assert_eq!(outcome, SessionOutcome::Declined);
        assert!(ui.has_message(Level::Error, "Invalid selection"));
        assert_eq!(repo.count("svn"), 0);
        assert_eq!(repo.count("merge"), 0);
    }

    #[test]
    fn test_unknown_trunk_is_rejected() {
        let repo = FakeRepo::new();
        repo.set_branches("master", &["feature-x", "master"]);
        let ui = ScriptedUi::new([input("feature-x"), input("trunk")]);

        let err = run_session(&repo, &ui).unwrap_err();
        assert_eq!(err.to_string(), "branch trunk does not exist");
    }

    #[test]
    fn test_trunk_equal_to_branch_is_rejected() {
        let repo = FakeRepo::new();
        repo.set_branches("master", &["feature-x", "master"]);
        let ui = ScriptedUi::new([input("master"), input("")]);

        let err = run_session(&repo, &ui).unwrap_err();
        assert!(matches!(err, CoreError::Repo(RepoError::SameBranch(_))));
    }

    #[test]
    fn test_successful_run_switches_to_trunk_and_deletes_branch() {
        let repo = FakeRepo::new();
        repo.set_branches("feature-x", &["feature-x", "master"]);
        let ui = ScriptedUi::new([
            input("feature-x"),
            input(""),
            Answer::yes(), // proceed
            Answer::yes(), // delete branch
        ]);

        let outcome = run_session(&repo, &ui).unwrap();

        assert_eq!(outcome, SessionOutcome::Completed);
        assert_eq!(repo.current_branch().as_deref(), Some("master"));
        assert_eq!(repo.branches(), vec!["master"]);
        assert_eq!(repo.count("svn dcommit"), 1);
        assert!(ui.has_message(Level::Success, "Operation completed successfully!"));
        let cmds = repo.commands();
        let checkout = cmds.iter().position(|c| c == "git checkout master").unwrap();
        let merge = cmds.iter().position(|c| c.starts_with("git merge")).unwrap();
        assert!(checkout < merge);
    }

    #[test]
    fn test_failed_branch_delete_offers_force() {
        let repo = FakeRepo::new();
        repo.set_branches("master", &["feature-x", "master"]);
        repo.script(
            "branch -d feature-x",
            Outcome::fail("", "error: The branch 'feature-x' is not fully merged."),
        );
        let ui = ScriptedUi::new([
            input("feature-x"),
            input(""),
            Answer::yes(),
            Answer::yes(),
            Answer::yes(), // force
        ]);

        run_session(&repo, &ui).unwrap();
        assert_eq!(repo.count("branch -D feature-x"), 1);
        assert_eq!(repo.branches(), vec!["master"]);
    }

    #[test]
    fn test_failed_phase_reports_failure() {
        let repo = FakeRepo::new();
        repo.set_branches("master", &["feature-x", "master"]);
        repo.script("svn dcommit", Outcome::fail("", "Authorization failed"));
        let ui = ScriptedUi::new([input("feature-x"), input(""), Answer::yes()]);

        let outcome = run_session(&repo, &ui).unwrap();

        assert_eq!(outcome, SessionOutcome::Failed);
        assert!(ui.has_message(Level::Error, "SVN dcommit phase"));
        assert_eq!(repo.count("branch -d"), 0);
    }

    #[test]
    fn test_interrupt_cleanup_offers_each_abort() {
        let repo = FakeRepo::new();
        repo.enter(OperationInProgress::Merge);
        let ui = ScriptedUi::new([Answer::yes()]);

        cleanup_after_interrupt(&repo, repo.git_dir(), &ui).unwrap();

        assert_eq!(repo.count("merge --abort"), 1);
        assert_eq!(repo.count("rebase --abort"), 0);
        assert!(!repo.merge_marker());
    }

    #[test]
    fn test_interrupt_cleanup_can_leave_state() {
        let repo = FakeRepo::new();
        repo.enter(OperationInProgress::Rebase);
        let ui = ScriptedUi::new([Answer::no()]);

        cleanup_after_interrupt(&repo, repo.git_dir(), &ui).unwrap();

        assert_eq!(repo.count("rebase --abort"), 0);
        assert!(repo.rebase_marker());
    }

    #[test]
    fn test_report_table_lists_every_phase() {
        let report = RunReport {
            completed: vec![Phase::PreSync],
            failed: Some(Phase::BranchMerge),
            controller_invocations: 1,
        };
        let table = render_report(&report);
        assert!(table.contains("SVN rebase"));
        assert!(table.contains("failed"));
        assert!(table.contains("skipped"));
    }
}
