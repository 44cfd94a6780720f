//! Interactive conflict resolution.
//!
//! [`ConflictController::resolve`] drives an explicit state machine until
//! git reports no unmerged files, the operator cancels, or the operator
//! gives up. The conflicted-file set is re-queried after every action, so
//! work the operator does in another terminal is picked up too.

use tracing::{debug, info, warn};

use super::merge_tool::MergeToolLauncher;
use crate::errors::CoreError;
use crate::git::{GitClient, RepositoryInspector};
use crate::interaction::Interaction;
use crate::models::{ConflictedFile, ResolutionChoice, Side, Strategy};

/// Terminal state of one controller run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Git reports no unmerged files.
    Resolved,
    /// The operator cancelled; any paused merge or rebase was aborted.
    Cancelled,
    /// The operator stopped with conflicts left. Git state is untouched so
    /// the work can be resumed by hand.
    GaveUp,
}

impl Resolution {
    pub fn is_resolved(self) -> bool {
        self == Resolution::Resolved
    }
}

enum State {
    ChooseStrategy(Vec<ConflictedFile>),
    ResolveOneByOne(Vec<ConflictedFile>),
    ResolveAllWithTool(Vec<ConflictedFile>),
    ManualResolution(Vec<ConflictedFile>),
    Done(Resolution),
}

/// Walks the operator through the files git reports as unmerged.
pub struct ConflictController<'a> {
    inspector: &'a RepositoryInspector<'a>,
    git: &'a GitClient<'a>,
    tool: &'a MergeToolLauncher<'a>,
    ui: &'a dyn Interaction,
    max_rounds: u32,
}

impl<'a> ConflictController<'a> {
    pub fn new(
        inspector: &'a RepositoryInspector<'a>,
        git: &'a GitClient<'a>,
        tool: &'a MergeToolLauncher<'a>,
        ui: &'a dyn Interaction,
    ) -> Self {
        Self {
            inspector,
            git,
            tool,
            ui,
            max_rounds: 50,
        }
    }

    /// Cap on state transitions before the controller gives up.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Resolve every conflicted file, or stop trying.
    ///
    /// Returns [`Resolution::Resolved`] only after a fresh query finds no
    /// unmerged files.
    pub fn resolve(&self) -> Result<Resolution, CoreError> {
        let files = self.inspector.conflicted_files()?;
        if files.is_empty() {
            debug!("no conflicted files, nothing to resolve");
            return Ok(Resolution::Resolved);
        }

        let mut state = State::ChooseStrategy(files);
        let mut rounds = 0u32;
        loop {
            if let State::Done(resolution) = state {
                info!(?resolution, rounds, "conflict resolution finished");
                return Ok(resolution);
            }
            rounds += 1;
            if rounds > self.max_rounds {
                warn!(rounds, "conflict resolution round limit reached");
                self.ui.error(&format!(
                    "Giving up after {} resolution rounds; conflicts remain",
                    self.max_rounds
                ));
                return Ok(Resolution::GaveUp);
            }
            state = self.step(state)?;
        }
    }

    fn step(&self, state: State) -> Result<State, CoreError> {
        let next = match state {
            State::ChooseStrategy(files) => {
                self.list_conflicts(&files);
                match self.choose_strategy()? {
                    Strategy::OneByOne => State::ResolveOneByOne(files),
                    Strategy::AllWithTool => State::ResolveAllWithTool(files),
                    Strategy::ManualThenResume => State::ManualResolution(files),
                    Strategy::Cancel => {
                        self.cancel()?;
                        State::Done(Resolution::Cancelled)
                    }
                }
            }

            State::ResolveOneByOne(files) => {
                self.resolve_one_by_one(&files)?;
                let remaining = self.inspector.conflicted_files()?;
                if remaining.is_empty() {
                    self.ui.success("All conflicts have been resolved!");
                    State::Done(Resolution::Resolved)
                } else {
                    self.ui.warning(&format!(
                        "There are still {} unresolved conflicts",
                        remaining.len()
                    ));
                    self.print_file_list(&remaining);
                    if self.ui.confirm("Do you want to continue resolving them?")? {
                        State::ResolveOneByOne(remaining)
                    } else {
                        State::ManualResolution(remaining)
                    }
                }
            }

            State::ResolveAllWithTool(files) => {
                self.resolve_all_with_tool(&files)?;
                let remaining = self.inspector.conflicted_files()?;
                if remaining.is_empty() {
                    self.ui.success("All conflicts have been resolved!");
                    State::Done(Resolution::Resolved)
                } else {
                    self.ui.warning(&format!(
                        "There are still {} unresolved conflicts",
                        remaining.len()
                    ));
                    State::ChooseStrategy(remaining)
                }
            }

            State::ManualResolution(files) => {
                self.show_manual_instructions(&files);
                self.ui
                    .pause("Press ENTER when you have resolved all conflicts...")?;
                let remaining = self.inspector.conflicted_files()?;
                if remaining.is_empty() {
                    self.ui.success("All conflicts have been resolved!");
                    State::Done(Resolution::Resolved)
                } else {
                    self.ui.error(&format!(
                        "There are still {} unresolved conflicts:",
                        remaining.len()
                    ));
                    self.print_file_list(&remaining);
                    if self.ui.confirm("Do you want to resolve them interactively?")? {
                        State::ChooseStrategy(remaining)
                    } else {
                        self.ui.error("Cannot continue with unresolved conflicts");
                        State::Done(Resolution::GaveUp)
                    }
                }
            }

            State::Done(resolution) => State::Done(resolution),
        };
        Ok(next)
    }

    // -----------------------------------------------------------------------
    // Menus
    // -----------------------------------------------------------------------

    fn choose_strategy(&self) -> Result<Strategy, CoreError> {
        let labels: Vec<&str> = Strategy::ALL.iter().map(|s| s.label()).collect();
        let idx = self
            .ui
            .select("How do you want to resolve the conflicts?", &labels)?;
        let strategy = Strategy::ALL[idx.min(Strategy::ALL.len() - 1)];
        debug!(?strategy, "strategy chosen");
        Ok(strategy)
    }

    fn choose_resolution(&self, file: &ConflictedFile) -> Result<ResolutionChoice, CoreError> {
        let labels: Vec<&str> = ResolutionChoice::ALL.iter().map(|c| c.label()).collect();
        let idx = self
            .ui
            .select(&format!("How do you want to resolve {file}?"), &labels)?;
        Ok(ResolutionChoice::ALL[idx.min(ResolutionChoice::ALL.len() - 1)])
    }

    // -----------------------------------------------------------------------
    // Strategies
    // -----------------------------------------------------------------------

    fn resolve_one_by_one(&self, files: &[ConflictedFile]) -> Result<(), CoreError> {
        let total = files.len();
        for (i, file) in files.iter().enumerate() {
            self.ui
                .heading(&format!("Conflict {}/{}: {}", i + 1, total, file));
            self.show_conflict_details(file)?;
            let choice = self.choose_resolution(file)?;
            self.apply_choice(file, choice)?;
        }
        Ok(())
    }

    fn resolve_all_with_tool(&self, files: &[ConflictedFile]) -> Result<(), CoreError> {
        self.ui.info("Opening merge tool for all conflicted files...");
        for file in files {
            self.ui.print(&format!("Opening {file}..."));
            self.open_tool(file)?;
            self.confirm_and_stage(file)?;
        }
        Ok(())
    }

    fn apply_choice(&self, file: &ConflictedFile, choice: ResolutionChoice) -> Result<(), CoreError> {
        debug!(file = %file, ?choice, "applying resolution choice");
        match choice {
            ResolutionChoice::UseMergeTool => {
                self.open_tool(file)?;
                self.confirm_and_stage(file)
            }
            ResolutionChoice::KeepCurrent => self.take_side(file, Side::Ours),
            ResolutionChoice::KeepIncoming => self.take_side(file, Side::Theirs),
            ResolutionChoice::ManualThenContinue => {
                self.ui.info(&format!("Resolve {file} manually in your editor"));
                self.ui.pause("Press ENTER when you have finished...")?;
                self.confirm_and_stage(file)
            }
            ResolutionChoice::SkipForNow => {
                self.ui.warning(&format!("File {file} skipped"));
                Ok(())
            }
        }
    }

    fn open_tool(&self, file: &ConflictedFile) -> Result<(), CoreError> {
        if !self.tool.launch(file)? {
            self.ui.warning(&format!(
                "The merge tool did not finish cleanly for {file}"
            ));
        }
        Ok(())
    }

    /// Replace `file` with one side's version and stage it.
    ///
    /// When that side deleted the file, keeping it means keeping the
    /// deletion, so the removal is staged instead.
    fn take_side(&self, file: &ConflictedFile, side: Side) -> Result<(), CoreError> {
        let out = self.git.checkout_side(side, file.as_str())?;
        let staged = if out.success() {
            self.git.stage(file.as_str())?
        } else if side_is_missing(&out.stderr) {
            debug!(file = %file, %side, "side deleted the file, staging removal");
            self.git.remove(file.as_str())?
        } else {
            self.ui
                .error(&format!("Could not check out the {side} version of {file}"));
            self.ui.print(out.combined().trim_end());
            return Ok(());
        };

        if staged.success() {
            self.ui
                .success(&format!("Used the {side} version of {file}"));
        } else {
            self.ui.error(&format!("Could not stage {file}"));
            self.ui.print(staged.combined().trim_end());
        }
        Ok(())
    }

    fn confirm_and_stage(&self, file: &ConflictedFile) -> Result<(), CoreError> {
        if !self
            .ui
            .confirm(&format!("Have you resolved the conflict in {file}?"))?
        {
            self.ui.warning(&format!("File {file} left in conflict"));
            return Ok(());
        }
        let out = self.git.stage(file.as_str())?;
        if out.success() {
            self.ui.success(&format!("File {file} marked as resolved"));
        } else {
            self.ui.error(&format!("Could not stage {file}"));
            self.ui.print(out.combined().trim_end());
        }
        Ok(())
    }

    /// Abort whatever git has paused. Only operations whose marker exists
    /// are aborted.
    fn cancel(&self) -> Result<(), CoreError> {
        self.ui.warning("Canceling operation...");
        if self.inspector.merge_in_progress() {
            info!("aborting merge");
            let out = self.git.merge_abort()?;
            if !out.success() {
                self.ui.error("Could not abort the merge");
                self.ui.print(out.combined().trim_end());
            }
        }
        if self.inspector.rebase_in_progress() {
            info!("aborting rebase");
            let out = self.git.rebase_abort()?;
            if !out.success() {
                self.ui.error("Could not abort the rebase");
                self.ui.print(out.combined().trim_end());
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Display
    // -----------------------------------------------------------------------

    fn list_conflicts(&self, files: &[ConflictedFile]) {
        self.ui
            .warning(&format!("Found {} conflicted files!", files.len()));
        self.print_file_list(files);
    }

    fn print_file_list(&self, files: &[ConflictedFile]) {
        for (i, file) in files.iter().enumerate() {
            self.ui.print(&format!("  {}. {}", i + 1, file));
        }
    }

    fn show_conflict_details(&self, file: &ConflictedFile) -> Result<(), CoreError> {
        let diff = self.git.diff_file(file.as_str())?;
        if !diff.trim().is_empty() {
            self.ui.print(diff.trim_end());
        }
        Ok(())
    }

    fn show_manual_instructions(&self, files: &[ConflictedFile]) {
        self.ui.heading("MANUAL CONFLICT RESOLUTION");
        self.ui.print("Conflicted files:");
        self.print_file_list(files);
        self.ui.print(
            "\nInstructions:\n\
             \x20 1. Open each file in your editor or merge tool\n\
             \x20 2. Look for the markers <<<<<<<, ======= and >>>>>>>\n\
             \x20 3. Edit the file to keep the correct content\n\
             \x20 4. Remove the conflict markers\n\
             \x20 5. Stage the file with: git add <file>\n\
             \nUseful commands:\n\
             \x20 git diff --name-only --diff-filter=U    list conflicted files\n\
             \x20 git checkout --ours <file>              keep the current version\n\
             \x20 git checkout --theirs <file>            keep the incoming version\n\
             \x20 git add <file>                          mark as resolved",
        );
    }
}

/// `git checkout --ours/--theirs` fails this way when that side has no
/// version of the path.
fn side_is_missing(stderr: &str) -> bool {
    stderr.contains("does not have our version") || stderr.contains("does not have their version")
}
