//! Test doubles: a simulated repository behind [`CommandRunner`] and a
//! scripted operator behind [`Interaction`].

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::Path;

use tempfile::TempDir;

use crate::command::{display_command, CommandRunner};
use crate::errors::{CommandError, PromptError};
use crate::git::inspector::{MERGE_MARKER, REBASE_APPLY_MARKER, REBASE_MERGE_MARKER};
use crate::interaction::{Interaction, Level};
use crate::models::{CommandOutput, OperationInProgress, ResolutionChoice, Strategy};

// ---------------------------------------------------------------------------
// Fake repository
// ---------------------------------------------------------------------------

/// Marker-file effect of a scripted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerChange {
    Keep,
    Enter(OperationInProgress),
    Clear,
}

/// Scripted result of one command.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub output: CommandOutput,
    pub conflicts: Option<Vec<String>>,
    pub marker: MarkerChange,
    pub interrupt: bool,
}

impl Outcome {
    pub fn ok() -> Self {
        Self {
            output: CommandOutput::default(),
            conflicts: None,
            marker: MarkerChange::Keep,
            interrupt: false,
        }
    }

    pub fn fail(stdout: &str, stderr: &str) -> Self {
        Self {
            output: CommandOutput {
                stdout: stdout.into(),
                stderr: stderr.into(),
                exit_code: 1,
            },
            ..Self::ok()
        }
    }

    pub fn interrupted() -> Self {
        Self {
            interrupt: true,
            ..Self::ok()
        }
    }

    /// After running, git reports exactly these unmerged files.
    pub fn with_conflicts(mut self, files: &[&str]) -> Self {
        self.conflicts = Some(files.iter().map(|f| f.to_string()).collect());
        self
    }

    /// After running, git has paused `op`.
    pub fn entering(mut self, op: OperationInProgress) -> Self {
        self.marker = MarkerChange::Enter(op);
        self
    }

    pub fn clearing_markers(mut self) -> Self {
        self.marker = MarkerChange::Clear;
        self
    }

    /// A `git merge` that stops on conflicts in `files`.
    pub fn merge_conflict(files: &[&str]) -> Self {
        let stdout: String = files
            .iter()
            .map(|f| format!("CONFLICT (content): Merge conflict in {f}\n"))
            .collect();
        Self::fail(
            &format!("{stdout}Automatic merge failed; fix conflicts and then commit the result."),
            "",
        )
        .with_conflicts(files)
        .entering(OperationInProgress::Merge)
    }

    /// A `git svn rebase` or `git rebase --continue` that stops on conflicts.
    pub fn rebase_conflict(files: &[&str]) -> Self {
        let stderr: String = files
            .iter()
            .map(|f| format!("CONFLICT (content): Merge conflict in {f}\n"))
            .collect();
        Self::fail("", &format!("{stderr}error: could not apply 1a2b3c4... change"))
            .with_conflicts(files)
            .entering(OperationInProgress::Rebase)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    conflicts: Vec<String>,
    current_branch: Option<String>,
    branches: Vec<String>,
    dirty: bool,
    scripts: HashMap<String, VecDeque<Outcome>>,
    commands: Vec<String>,
    normalized: Vec<String>,
    attached: Vec<String>,
    attached_codes: VecDeque<i32>,
}

/// In-memory stand-in for a git-svn clone.
///
/// Tracks the unmerged-file set and the current branch, and creates real
/// marker files in a temporary git directory so marker probes behave as
/// they do against git. Commands not scripted with [`FakeRepo::script`]
/// get realistic default behaviour (`git add` resolves a file, `git merge
/// --abort` clears the merge, and so on).
pub struct FakeRepo {
    dir: TempDir,
    state: RefCell<FakeState>,
}

impl FakeRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state = FakeState {
            current_branch: Some("master".into()),
            branches: vec!["master".into()],
            ..Default::default()
        };
        Self {
            dir,
            state: RefCell::new(state),
        }
    }

    pub fn git_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn set_conflicts(&self, files: &[&str]) {
        self.state.borrow_mut().conflicts = files.iter().map(|f| f.to_string()).collect();
    }

    pub fn conflicts(&self) -> Vec<String> {
        self.state.borrow().conflicts.clone()
    }

    pub fn set_branches(&self, current: &str, branches: &[&str]) {
        let mut state = self.state.borrow_mut();
        state.current_branch = Some(current.to_string());
        state.branches = branches.iter().map(|b| b.to_string()).collect();
    }

    pub fn current_branch(&self) -> Option<String> {
        self.state.borrow().current_branch.clone()
    }

    pub fn branches(&self) -> Vec<String> {
        self.state.borrow().branches.clone()
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.state.borrow_mut().dirty = dirty;
    }

    /// Put git into the paused state of `op`.
    pub fn enter(&self, op: OperationInProgress) {
        self.apply_marker(MarkerChange::Enter(op));
    }

    /// Queue `outcome` for the next command whose arguments start with `key`
    /// (`git` and `-c name=value` options excluded).
    pub fn script(&self, key: &str, outcome: Outcome) {
        self.state
            .borrow_mut()
            .scripts
            .entry(key.to_string())
            .or_default()
            .push_back(outcome);
    }

    /// Exit code for the next attached (merge tool) command.
    pub fn script_attached(&self, code: i32) {
        self.state.borrow_mut().attached_codes.push_back(code);
    }

    /// Every captured command run so far, rendered as a command line.
    pub fn commands(&self) -> Vec<String> {
        self.state.borrow().commands.clone()
    }

    pub fn attached_commands(&self) -> Vec<String> {
        self.state.borrow().attached.clone()
    }

    /// Number of captured commands whose subcommand starts with `prefix`
    /// (`git` and `-c name=value` options excluded).
    pub fn count(&self, prefix: &str) -> usize {
        let with_space = format!("{prefix} ");
        self.state
            .borrow()
            .normalized
            .iter()
            .filter(|c| *c == prefix || c.starts_with(&with_space))
            .count()
    }

    fn apply_marker(&self, change: MarkerChange) {
        let git_dir = self.dir.path();
        match change {
            MarkerChange::Keep => {}
            MarkerChange::Enter(OperationInProgress::Merge) => {
                std::fs::write(git_dir.join(MERGE_MARKER), "0000000\n").unwrap();
            }
            MarkerChange::Enter(OperationInProgress::Rebase) => {
                std::fs::create_dir_all(git_dir.join(REBASE_APPLY_MARKER)).unwrap();
            }
            MarkerChange::Clear => {
                let _ = std::fs::remove_file(git_dir.join(MERGE_MARKER));
                let _ = std::fs::remove_dir_all(git_dir.join(REBASE_APPLY_MARKER));
                let _ = std::fs::remove_dir_all(git_dir.join(REBASE_MERGE_MARKER));
            }
        }
    }

    fn has_marker(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    fn take_script(&self, args: &[String]) -> Option<Outcome> {
        let joined = args.join(" ");
        let mut state = self.state.borrow_mut();
        let key = state
            .scripts
            .iter()
            .filter(|(k, q)| !q.is_empty() && (joined == **k || joined.starts_with(&format!("{k} "))))
            .map(|(k, _)| k.clone())
            .max_by_key(|k| k.len())?;
        state.scripts.get_mut(&key).and_then(|q| q.pop_front())
    }

    fn default_outcome(&self, args: &[String]) -> Outcome {
        let a: Vec<&str> = args.iter().map(String::as_str).collect();
        let mut state = self.state.borrow_mut();
        let stdout = |s: String| Outcome {
            output: CommandOutput {
                stdout: s,
                ..Default::default()
            },
            ..Outcome::ok()
        };
        match a.as_slice() {
            ["rev-parse", "--absolute-git-dir"] => {
                stdout(format!("{}\n", self.dir.path().display()))
            }
            ["rev-parse", "--is-inside-work-tree"] => stdout("true\n".into()),
            ["rev-parse", "--show-toplevel"] => {
                stdout(format!("{}\n", self.dir.path().display()))
            }
            ["branch", "--show-current"] => {
                stdout(format!("{}\n", state.current_branch.clone().unwrap_or_default()))
            }
            ["status", "--porcelain"] => {
                stdout(if state.dirty { " M src/lib.rs\n".into() } else { String::new() })
            }
            ["branch"] => {
                let current = state.current_branch.clone();
                let listing = state
                    .branches
                    .iter()
                    .map(|b| {
                        if Some(b) == current.as_ref() {
                            format!("* {b}\n")
                        } else {
                            format!("  {b}\n")
                        }
                    })
                    .collect();
                stdout(listing)
            }
            ["diff", "--name-only", "--diff-filter=U", "-z"] => {
                stdout(state.conflicts.iter().map(|c| format!("{c}\0")).collect())
            }
            ["diff", "--", path] => stdout(format!("diff --cc {path}\n<<<<<<< ours\n=======\n>>>>>>> theirs\n")),
            ["add", "--", path] => {
                state.conflicts.retain(|c| c.as_str() != *path);
                Outcome::ok()
            }
            ["rm", "--quiet", "--", path] => {
                state.conflicts.retain(|c| c.as_str() != *path);
                Outcome::ok()
            }
            ["merge", "--abort"] | ["rebase", "--abort"] => {
                state.conflicts.clear();
                Outcome::ok().clearing_markers()
            }
            ["commit", ..] => {
                if state.conflicts.is_empty() {
                    Outcome::ok().clearing_markers()
                } else {
                    Outcome::fail(
                        "",
                        "error: Committing is not possible because you have unmerged files.",
                    )
                }
            }
            ["rebase", "--continue"] => {
                if state.conflicts.is_empty() {
                    Outcome::ok().clearing_markers()
                } else {
                    Outcome::fail("", "error: you must edit all merge conflicts")
                }
            }
            ["checkout", branch] => {
                if state.branches.iter().any(|b| b.as_str() == *branch) {
                    state.current_branch = Some(branch.to_string());
                    Outcome::ok()
                } else {
                    Outcome::fail(
                        "",
                        &format!("error: pathspec '{branch}' did not match any file(s) known to git"),
                    )
                }
            }
            ["branch", "-d" | "-D", branch] => {
                state.branches.retain(|b| b.as_str() != *branch);
                Outcome::ok()
            }
            _ => Outcome::ok(),
        }
    }
}

impl Default for FakeRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop leading `-c name=value` pairs so scripts key on the subcommand.
fn strip_config_options(args: &[&str]) -> Vec<String> {
    let mut rest = args;
    while let ["-c", _, tail @ ..] = rest {
        rest = tail;
    }
    rest.iter().map(|s| s.to_string()).collect()
}

impl CommandRunner for FakeRepo {
    fn run(&self, program: &str, args: &[&str], check: bool) -> Result<CommandOutput, CommandError> {
        let command = display_command(program, args);
        let key_args = strip_config_options(args);
        {
            let mut state = self.state.borrow_mut();
            state.commands.push(command.clone());
            state.normalized.push(key_args.join(" "));
        }
        let outcome = self
            .take_script(&key_args)
            .unwrap_or_else(|| self.default_outcome(&key_args));

        if outcome.interrupt {
            return Err(CommandError::Interrupted);
        }
        if let Some(conflicts) = outcome.conflicts {
            self.state.borrow_mut().conflicts = conflicts;
        }
        self.apply_marker(outcome.marker);

        let output = outcome.output;
        if check && !output.success() {
            return Err(CommandError::Failed {
                command,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    fn run_attached(&self, program: &str, args: &[&str]) -> Result<i32, CommandError> {
        let mut state = self.state.borrow_mut();
        state.attached.push(display_command(program, args));
        Ok(state.attached_codes.pop_front().unwrap_or(0))
    }
}

impl FakeRepo {
    /// Whether the fake is currently paused in a merge (marker present).
    pub fn merge_marker(&self) -> bool {
        self.has_marker(MERGE_MARKER)
    }

    /// Whether the fake is currently paused in a rebase (marker present).
    pub fn rebase_marker(&self) -> bool {
        self.has_marker(REBASE_APPLY_MARKER) || self.has_marker(REBASE_MERGE_MARKER)
    }
}

// ---------------------------------------------------------------------------
// Scripted operator
// ---------------------------------------------------------------------------

/// One scripted operator answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Select(usize),
    Confirm(bool),
    Input(String),
    Enter,
    CtrlC,
}

impl Answer {
    pub fn strategy(s: Strategy) -> Self {
        Answer::Select(Strategy::ALL.iter().position(|x| *x == s).unwrap())
    }

    pub fn choice(c: ResolutionChoice) -> Self {
        Answer::Select(ResolutionChoice::ALL.iter().position(|x| *x == c).unwrap())
    }

    pub fn yes() -> Self {
        Answer::Confirm(true)
    }

    pub fn no() -> Self {
        Answer::Confirm(false)
    }
}

/// [`Interaction`] that replays a fixed list of answers and records
/// everything shown to the operator.
#[derive(Default)]
pub struct ScriptedUi {
    answers: RefCell<VecDeque<Answer>>,
    prompts: RefCell<Vec<String>>,
    messages: RefCell<Vec<(Level, String)>>,
    printed: RefCell<Vec<String>>,
}

impl ScriptedUi {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn messages(&self) -> Vec<(Level, String)> {
        self.messages.borrow().clone()
    }

    pub fn printed(&self) -> Vec<String> {
        self.printed.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }

    pub fn has_message(&self, level: Level, needle: &str) -> bool {
        self.messages
            .borrow()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }

    fn next(&self, prompt: &str) -> Answer {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted answer left for prompt: {prompt}"))
    }
}

impl Interaction for ScriptedUi {
    fn message(&self, level: Level, text: &str) {
        self.messages.borrow_mut().push((level, text.to_string()));
    }

    fn print(&self, text: &str) {
        self.printed.borrow_mut().push(text.to_string());
    }

    fn heading(&self, title: &str) {
        self.printed.borrow_mut().push(title.to_string());
    }

    fn select(&self, prompt: &str, items: &[&str]) -> Result<usize, PromptError> {
        match self.next(prompt) {
            Answer::Select(i) => {
                assert!(i < items.len(), "select index {i} out of range for {prompt}");
                Ok(i)
            }
            Answer::CtrlC => Err(PromptError::Interrupted),
            other => panic!("expected select answer for {prompt}, got {other:?}"),
        }
    }

    fn confirm(&self, prompt: &str) -> Result<bool, PromptError> {
        match self.next(prompt) {
            Answer::Confirm(b) => Ok(b),
            Answer::CtrlC => Err(PromptError::Interrupted),
            other => panic!("expected confirm answer for {prompt}, got {other:?}"),
        }
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        match self.next(prompt) {
            Answer::Input(s) if s.is_empty() => Ok(default.unwrap_or_default().to_string()),
            Answer::Input(s) => Ok(s),
            Answer::CtrlC => Err(PromptError::Interrupted),
            other => panic!("expected input answer for {prompt}, got {other:?}"),
        }
    }

    fn pause(&self, prompt: &str) -> Result<(), PromptError> {
        match self.next(prompt) {
            Answer::Enter => Ok(()),
            Answer::CtrlC => Err(PromptError::Interrupted),
            other => panic!("expected enter for {prompt}, got {other:?}"),
        }
    }
}
