//! The four-phase merge run.
//!
//! 1. `git svn rebase` brings trunk up to date with SVN.
//! 2. The chosen branch is merged into trunk with a merge commit.
//! 3. `git svn rebase` runs again in case SVN moved meanwhile.
//! 4. `git svn dcommit` publishes the result.
//!
//! Phases run strictly in order and a failed phase stops the run. Conflicts
//! in phases 1 to 3 hand control to the [`ConflictController`]; once it
//! reports success the paused operation is completed before the phase
//! counts as done.

use std::cell::Cell;

use tracing::{debug, info, instrument, warn};

use crate::config::MergeConfig;
use crate::conflict::{classify_failure, ConflictController, FailureClass, Resolution};
use crate::errors::CoreError;
use crate::git::{GitClient, RepositoryInspector};
use crate::interaction::Interaction;
use crate::models::{CommandOutput, OperationInProgress, Phase, SessionPlan};
use crate::svn::GitSvnClient;

/// Knobs for a run, taken from [`MergeConfig`].
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub no_ff: bool,
    pub fallback_commit_message: String,
    /// Upper bound on `rebase --continue` attempts that stop on new
    /// conflicts.
    pub max_continue_attempts: u32,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::from(&MergeConfig::default())
    }
}

impl From<&MergeConfig> for MergeOptions {
    fn from(config: &MergeConfig) -> Self {
        Self {
            no_ff: config.merge.no_ff,
            fallback_commit_message: config.merge.fallback_commit_message.clone(),
            max_continue_attempts: config.merge.max_conflict_rounds,
        }
    }
}

/// Whether a phase finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    Failed,
}

impl PhaseOutcome {
    fn from_bool(ok: bool) -> Self {
        if ok {
            PhaseOutcome::Completed
        } else {
            PhaseOutcome::Failed
        }
    }
}

/// What happened during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Phases that completed, in order.
    pub completed: Vec<Phase>,
    /// The phase that stopped the run.
    pub failed: Option<Phase>,
    /// How many times the conflict controller was entered.
    pub controller_invocations: u32,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.failed.is_none() && self.completed.len() == Phase::ALL.len()
    }

    pub fn last_completed(&self) -> Option<Phase> {
        self.completed.last().copied()
    }

    /// Outcome of `phase`, or `None` when it never ran.
    pub fn outcome_of(&self, phase: Phase) -> Option<PhaseOutcome> {
        if self.completed.contains(&phase) {
            Some(PhaseOutcome::Completed)
        } else if self.failed == Some(phase) {
            Some(PhaseOutcome::Failed)
        } else {
            None
        }
    }
}

/// Sequences the phases of a merge run.
pub struct MergeOrchestrator<'a> {
    inspector: &'a RepositoryInspector<'a>,
    git: &'a GitClient<'a>,
    svn: &'a GitSvnClient<'a>,
    controller: &'a ConflictController<'a>,
    ui: &'a dyn Interaction,
    options: MergeOptions,
    controller_invocations: Cell<u32>,
}

impl<'a> MergeOrchestrator<'a> {
    pub fn new(
        inspector: &'a RepositoryInspector<'a>,
        git: &'a GitClient<'a>,
        svn: &'a GitSvnClient<'a>,
        controller: &'a ConflictController<'a>,
        ui: &'a dyn Interaction,
        options: MergeOptions,
    ) -> Self {
        Self {
            inspector,
            git,
            svn,
            controller,
            ui,
            options,
            controller_invocations: Cell::new(0),
        }
    }

    /// Run all four phases for `plan`.
    ///
    /// Errors are infrastructure failures and interrupts only; a phase that
    /// fails shows up in the returned report.
    #[instrument(skip(self), fields(branch = %plan.branch_to_merge, trunk = %plan.trunk_branch))]
    pub fn run(&self, plan: &SessionPlan) -> Result<RunReport, CoreError> {
        self.controller_invocations.set(0);
        let mut report = RunReport::default();

        for phase in Phase::ALL {
            info!(%phase, "starting phase");
            let outcome = match phase {
                Phase::PreSync | Phase::PostSync => self.sync_with_svn(phase)?,
                Phase::BranchMerge => self.merge_branch(plan)?,
                Phase::Publish => self.publish()?,
            };
            report.controller_invocations = self.controller_invocations.get();

            if outcome == PhaseOutcome::Failed {
                warn!(%phase, "phase failed, stopping run");
                report.failed = Some(phase);
                return Ok(report);
            }
            report.completed.push(phase);
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    fn sync_with_svn(&self, phase: Phase) -> Result<PhaseOutcome, CoreError> {
        if phase == Phase::PostSync {
            self.ui
                .step("Performing final SVN Rebase to ensure synchronization...");
        } else {
            self.ui
                .step("Performing SVN Rebase to sync with SVN repository...");
        }

        self.ui.begin_progress("git svn rebase");
        let out = self.svn.rebase();
        self.ui.end_progress();
        let out = out?;

        if out.success() {
            self.ui.success("SVN Rebase completed successfully");
            return Ok(PhaseOutcome::Completed);
        }

        if self.classify(&out)?.conflicts {
            self.ui.warning("SVN Rebase generated conflicts!");
            if self.resolve_conflicts()?.is_resolved() && self.complete_operation()? {
                return Ok(PhaseOutcome::Completed);
            }
            self.ui.error("Cannot complete rebase");
            self.report_resume_hint();
            return Ok(PhaseOutcome::Failed);
        }

        self.ui.error("SVN Rebase failed!");
        self.echo(&out);
        Ok(PhaseOutcome::Failed)
    }

    fn merge_branch(&self, plan: &SessionPlan) -> Result<PhaseOutcome, CoreError> {
        let branch = &plan.branch_to_merge;
        self.ui.step(&format!("Merging branch {branch}..."));

        let out = self
            .git
            .merge(branch, &plan.merge_message(), self.options.no_ff)?;
        if out.success() {
            self.ui.success(&format!("Merge of {branch} completed successfully"));
            return Ok(PhaseOutcome::Completed);
        }

        if self.classify(&out)?.other_fatal {
            self.ui.error(&format!("Merge of {branch} failed!"));
            self.echo(&out);
            self.abort_merge_if_paused()?;
            return Ok(PhaseOutcome::Failed);
        }

        self.ui.warning("Merge generated conflicts!");
        match self.resolve_conflicts()? {
            Resolution::Resolved => {
                let ok = self.complete_operation()?;
                if !ok {
                    self.ui.error("Cannot complete merge");
                    self.report_resume_hint();
                }
                Ok(PhaseOutcome::from_bool(ok))
            }
            Resolution::Cancelled | Resolution::GaveUp => {
                self.ui.error("Cannot complete merge");
                self.abort_merge_if_paused()?;
                Ok(PhaseOutcome::Failed)
            }
        }
    }

    fn publish(&self) -> Result<PhaseOutcome, CoreError> {
        self.ui
            .step("Sending changes to SVN repository (SVN DCommit)...");
        self.ui.warning("This operation may take several minutes...");

        self.ui.begin_progress("git svn dcommit");
        let out = self.svn.dcommit();
        self.ui.end_progress();
        let out = out?;

        if out.success() {
            self.ui.success("Changes successfully sent to SVN repository!");
            return Ok(PhaseOutcome::Completed);
        }

        self.ui.error("SVN DCommit failed!");
        self.echo(&out);
        self.ui.warning(
            "Some commits may already be in SVN. Check `git svn log` and `git log` before retrying.",
        );
        Ok(PhaseOutcome::Failed)
    }

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    /// Finish the merge or rebase git has paused, resolving any conflicts
    /// that appear along the way.
    ///
    /// Conflicts are re-checked before every attempt, so the phase is never
    /// declared complete while git still reports unmerged files.
    pub fn complete_operation(&self) -> Result<bool, CoreError> {
        let mut continue_attempts = 0u32;
        loop {
            if !self.inspector.conflicted_files()?.is_empty()
                && !self.resolve_conflicts()?.is_resolved()
            {
                return Ok(false);
            }

            match self.inspector.operation_in_progress() {
                Some(OperationInProgress::Merge) => return self.complete_merge(),
                Some(OperationInProgress::Rebase) => {
                    self.ui.step("Completing rebase...");
                    let out = self.git.rebase_continue()?;
                    if out.success() && !self.inspector.rebase_in_progress() {
                        self.ui.success("Rebase completed");
                        return Ok(true);
                    }

                    if out.success() {
                        debug!("rebase advanced but is still paused");
                    } else if self.classify(&out)?.other_fatal {
                        self.ui.error("Error completing rebase");
                        self.echo(&out);
                        return Ok(false);
                    }

                    continue_attempts += 1;
                    if continue_attempts > self.options.max_continue_attempts {
                        warn!(continue_attempts, "giving up on rebase continuation");
                        self.ui.error("The rebase keeps stopping on conflicts");
                        return Ok(false);
                    }
                    self.ui
                        .warning("There are more conflicts to resolve in the rebase");
                }
                None => {
                    debug!("no paused operation left to complete");
                    return Ok(true);
                }
            }
        }
    }

    fn complete_merge(&self) -> Result<bool, CoreError> {
        self.ui.step("Completing merge...");
        let mut out = self.git.commit_no_edit()?;
        if !out.success() {
            debug!(stderr = %out.stderr, "commit --no-edit failed, retrying with explicit message");
            out = self
                .git
                .commit_with_message(&self.options.fallback_commit_message)?;
        }
        if out.success() {
            self.ui.success("Merge completed");
            Ok(true)
        } else {
            self.ui.error("Error completing merge");
            self.echo(&out);
            Ok(false)
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn resolve_conflicts(&self) -> Result<Resolution, CoreError> {
        self.controller_invocations
            .set(self.controller_invocations.get() + 1);
        self.controller.resolve()
    }

    fn classify(&self, out: &CommandOutput) -> Result<FailureClass, CoreError> {
        let files_present = !self.inspector.conflicted_files()?.is_empty();
        let paused = self.inspector.operation_in_progress().is_some();
        let class = classify_failure(out, files_present, paused);
        debug!(?class, exit_code = out.exit_code, "classified failure");
        Ok(class)
    }

    fn abort_merge_if_paused(&self) -> Result<(), CoreError> {
        if self.inspector.merge_in_progress() {
            info!("aborting merge");
            let out = self.git.merge_abort()?;
            if !out.success() {
                self.ui.error("Could not abort the merge");
                self.echo(&out);
            }
        }
        Ok(())
    }

    fn report_resume_hint(&self) {
        match self.inspector.operation_in_progress() {
            Some(OperationInProgress::Rebase) => self.ui.info(
                "The rebase is still paused. Resolve the conflicts, run `git rebase --continue`, \
                 then `git svn dcommit` (or `git rebase --abort` to give up).",
            ),
            Some(OperationInProgress::Merge) => self.ui.info(
                "The merge is still paused. Resolve the conflicts, run `git commit`, \
                 then `git svn rebase` and `git svn dcommit` (or `git merge --abort` to give up).",
            ),
            None => {}
        }
    }

    fn echo(&self, out: &CommandOutput) {
        let text = out.combined();
        if !text.trim().is_empty() {
            self.ui.print(text.trim_end());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::MergeToolLauncher;
    use crate::interaction::Level;
    use crate::models::{ResolutionChoice, Strategy};
    use crate::testing::{Answer, FakeRepo, Outcome, ScriptedUi};

    fn plan() -> SessionPlan {
        SessionPlan {
            branch_to_merge: "feature-x".into(),
            trunk_branch: "master".into(),
        }
    }

    fn run_with(repo: &FakeRepo, ui: &ScriptedUi) -> RunReport {
        let inspector = RepositoryInspector::new(repo, repo.git_dir());
        let git = GitClient::new(repo);
        let svn = GitSvnClient::new(repo);
        let tool = MergeToolLauncher::new(repo, "/repo", "/nonexistent/tool");
        let controller = ConflictController::new(&inspector, &git, &tool, ui);
        let orchestrator =
            MergeOrchestrator::new(&inspector, &git, &svn, &controller, ui, MergeOptions::default());
        orchestrator.run(&plan()).unwrap()
    }

    #[test]
    fn test_clean_run_executes_four_phases_in_order() {
        let repo = FakeRepo::new();
        let ui = ScriptedUi::default();

        let report = run_with(&repo, &ui);

        assert!(report.succeeded());
        assert_eq!(report.completed, Phase::ALL.to_vec());
        assert_eq!(report.controller_invocations, 0);
        assert_eq!(
            repo.commands(),
            vec![
                "git svn rebase",
                "git merge --no-ff feature-x -m Merge branch 'feature-x' into trunk",
                "git svn rebase",
                "git svn dcommit",
            ]
        );
    }

    #[test]
    fn test_merge_conflicts_resolved_then_run_continues() {
        let repo = FakeRepo::new();
        repo.script("merge --no-ff feature-x", Outcome::merge_conflict(&["a.txt", "b.txt"]));
        let ui = ScriptedUi::new([
            Answer::strategy(Strategy::OneByOne),
            Answer::choice(ResolutionChoice::KeepIncoming),
            Answer::choice(ResolutionChoice::KeepIncoming),
        ]);

        let report = run_with(&repo, &ui);

        assert!(report.succeeded());
        assert_eq!(report.controller_invocations, 1);
        assert_eq!(repo.count("checkout --theirs"), 2);
        assert_eq!(repo.count("commit --no-edit"), 1);
        assert_eq!(repo.count("svn rebase"), 2);
        assert_eq!(repo.count("svn dcommit"), 1);
        assert!(!repo.merge_marker());
    }

    #[test]
    fn test_cancel_during_pre_sync_aborts_rebase_and_stops() {
        let repo = FakeRepo::new();
        repo.script("svn rebase", Outcome::rebase_conflict(&["a.txt"]));
        let ui = ScriptedUi::new([Answer::strategy(Strategy::Cancel)]);

        let report = run_with(&repo, &ui);

        assert_eq!(report.failed, Some(Phase::PreSync));
        assert!(report.completed.is_empty());
        assert_eq!(repo.count("rebase --abort"), 1);
        assert_eq!(repo.count("merge"), 0);
        assert_eq!(repo.count("svn dcommit"), 0);
        assert!(!repo.rebase_marker());
    }

    #[test]
    fn test_svn_failure_without_conflicts_stops_run() {
        let repo = FakeRepo::new();
        repo.script("svn rebase", Outcome::fail("", "Unable to determine upstream SVN information"));
        let ui = ScriptedUi::default();

        let report = run_with(&repo, &ui);

        assert_eq!(report.failed, Some(Phase::PreSync));
        assert_eq!(report.controller_invocations, 0);
        assert_eq!(repo.commands(), vec!["git svn rebase", "git diff --name-only --diff-filter=U -z"]);
        assert!(ui
            .printed()
            .iter()
            .any(|p| p.contains("Unable to determine upstream SVN information")));
    }

    #[test]
    fn test_merge_failure_without_conflicts_aborts_merge() {
        let repo = FakeRepo::new();
        repo.script(
            "merge --no-ff feature-x",
            Outcome::fail("", "error: Your local changes would be overwritten by merge.")
                .entering(OperationInProgress::Merge),
        );
        let ui = ScriptedUi::default();

        let report = run_with(&repo, &ui);

        assert_eq!(report.failed, Some(Phase::BranchMerge));
        assert_eq!(report.last_completed(), Some(Phase::PreSync));
        assert_eq!(repo.count("merge --abort"), 1);
        assert_eq!(repo.count("svn dcommit"), 0);
    }

    #[test]
    fn test_cancelled_merge_conflict_aborts_once() {
        let repo = FakeRepo::new();
        repo.script("merge --no-ff feature-x", Outcome::merge_conflict(&["a.txt"]));
        let ui = ScriptedUi::new([Answer::strategy(Strategy::Cancel)]);

        let report = run_with(&repo, &ui);

        assert_eq!(report.failed, Some(Phase::BranchMerge));
        assert_eq!(repo.count("merge --abort"), 1);
        assert_eq!(repo.count("svn rebase"), 1);
    }

    #[test]
    fn test_post_sync_failure_skips_publish() {
        let repo = FakeRepo::new();
        repo.script("svn rebase", Outcome::ok());
        repo.script("svn rebase", Outcome::fail("", "network unreachable"));
        let ui = ScriptedUi::default();

        let report = run_with(&repo, &ui);

        assert_eq!(report.failed, Some(Phase::PostSync));
        assert_eq!(report.outcome_of(Phase::BranchMerge), Some(PhaseOutcome::Completed));
        assert_eq!(report.outcome_of(Phase::Publish), None);
        assert_eq!(repo.count("svn dcommit"), 0);
    }

    #[test]
    fn test_dcommit_failure_is_echoed() {
        let repo = FakeRepo::new();
        repo.script("svn dcommit", Outcome::fail("", "Authorization failed"));
        let ui = ScriptedUi::default();

        let report = run_with(&repo, &ui);

        assert_eq!(report.failed, Some(Phase::Publish));
        assert!(ui.printed().iter().any(|p| p == "Authorization failed"));
        assert!(ui.has_message(Level::Error, "SVN DCommit failed!"));
    }

    #[test]
    fn test_merge_commit_falls_back_to_explicit_message() {
        let repo = FakeRepo::new();
        repo.script("merge --no-ff feature-x", Outcome::merge_conflict(&["a.txt"]));
        repo.script("commit --no-edit", Outcome::fail("", "error: Empty commit message."));
        let ui = ScriptedUi::new([
            Answer::strategy(Strategy::OneByOne),
            Answer::choice(ResolutionChoice::KeepCurrent),
        ]);

        let report = run_with(&repo, &ui);

        assert!(report.succeeded());
        assert!(repo
            .commands()
            .contains(&"git commit -m Merge completed after conflict resolution".to_string()));
    }

    #[test]
    fn test_rebase_continue_with_further_conflicts() {
        let repo = FakeRepo::new();
        repo.script("svn rebase", Outcome::rebase_conflict(&["a.txt"]));
        repo.script("rebase --continue", Outcome::rebase_conflict(&["b.txt"]));
        let ui = ScriptedUi::new([
            Answer::strategy(Strategy::OneByOne),
            Answer::choice(ResolutionChoice::KeepCurrent),
            Answer::strategy(Strategy::OneByOne),
            Answer::choice(ResolutionChoice::KeepIncoming),
        ]);

        let report = run_with(&repo, &ui);

        assert!(report.succeeded());
        assert_eq!(report.controller_invocations, 2);
        assert_eq!(repo.count("rebase --continue"), 2);
        assert!(!repo.rebase_marker());
    }

    #[test]
    fn test_gave_up_rebase_leaves_state_for_resume() {
        let repo = FakeRepo::new();
        repo.script("svn rebase", Outcome::rebase_conflict(&["a.txt"]));
        let ui = ScriptedUi::new([
            Answer::strategy(Strategy::ManualThenResume),
            Answer::Enter,
            Answer::no(),
        ]);

        let report = run_with(&repo, &ui);

        assert_eq!(report.failed, Some(Phase::PreSync));
        assert!(repo.rebase_marker());
        assert_eq!(repo.count("rebase --abort"), 0);
        assert!(ui.has_message(Level::Info, "git rebase --continue"));
    }

    #[test]
    fn test_interrupt_propagates_as_error() {
        let repo = FakeRepo::new();
        repo.script("svn rebase", Outcome::interrupted());
        let ui = ScriptedUi::default();

        let inspector = RepositoryInspector::new(&repo, repo.git_dir());
        let git = GitClient::new(&repo);
        let svn = GitSvnClient::new(&repo);
        let tool = MergeToolLauncher::new(&repo, "/repo", "/nonexistent/tool");
        let controller = ConflictController::new(&inspector, &git, &tool, &ui);
        let orchestrator =
            MergeOrchestrator::new(&inspector, &git, &svn, &controller, &ui, MergeOptions::default());

        let err = orchestrator.run(&plan()).unwrap_err();
        assert!(err.is_interrupt());
        assert_eq!(repo.count("merge"), 0);
    }
}
