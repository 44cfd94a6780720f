//! Domain model types used throughout the merge assistant.
//!
//! Everything here lives for one process run. Nothing is persisted by this
//! tool; durable state stays inside the repository metadata that git and
//! git-svn manage themselves.

// ---------------------------------------------------------------------------
// Command output
// ---------------------------------------------------------------------------

/// Captured result of one external command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr, for scanning diagnostics.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (_, true) => self.stdout.clone(),
            _ => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

// ---------------------------------------------------------------------------
// Repository state
// ---------------------------------------------------------------------------

/// A file git reports as unmerged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictedFile {
    pub path: String,
}

impl ConflictedFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Display for ConflictedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// Snapshot of the repository, recomputed on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryContext {
    pub current_branch: Option<String>,
    pub branches: Vec<String>,
    pub merge_in_progress: bool,
    pub rebase_in_progress: bool,
}

impl RepositoryContext {
    /// The interrupted operation git is waiting on, if any.
    pub fn operation_in_progress(&self) -> Option<OperationInProgress> {
        OperationInProgress::from_markers(self.merge_in_progress, self.rebase_in_progress)
    }
}

/// A merge or rebase that git has paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationInProgress {
    Merge,
    Rebase,
}

impl OperationInProgress {
    /// A stopped rebase takes precedence over a pending merge.
    pub fn from_markers(merge: bool, rebase: bool) -> Option<Self> {
        if rebase {
            Some(Self::Rebase)
        } else if merge {
            Some(Self::Merge)
        } else {
            None
        }
    }
}

impl std::fmt::Display for OperationInProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Rebase => write!(f, "rebase"),
        }
    }
}

/// The two sides of a three-way conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The version on the branch being merged into.
    Ours,
    /// The version arriving from the other branch.
    Theirs,
}

impl Side {
    pub fn checkout_flag(self) -> &'static str {
        match self {
            Self::Ours => "--ours",
            Self::Theirs => "--theirs",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
        }
    }
}

// ---------------------------------------------------------------------------
// Operator choices
// ---------------------------------------------------------------------------

/// Top-level answer to "how do you want to resolve these conflicts?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    OneByOne,
    AllWithTool,
    ManualThenResume,
    Cancel,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::OneByOne,
        Strategy::AllWithTool,
        Strategy::ManualThenResume,
        Strategy::Cancel,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::OneByOne => "Resolve conflicts one by one (interactive)",
            Self::AllWithTool => "Open all conflicted files with merge tool",
            Self::ManualThenResume => "Resolve manually and resume later",
            Self::Cancel => "Cancel operation",
        }
    }
}

/// Per-file answer inside the one-by-one loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionChoice {
    UseMergeTool,
    KeepCurrent,
    KeepIncoming,
    ManualThenContinue,
    SkipForNow,
}

impl ResolutionChoice {
    pub const ALL: [ResolutionChoice; 5] = [
        ResolutionChoice::UseMergeTool,
        ResolutionChoice::KeepCurrent,
        ResolutionChoice::KeepIncoming,
        ResolutionChoice::ManualThenContinue,
        ResolutionChoice::SkipForNow,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::UseMergeTool => "Open with merge tool",
            Self::KeepCurrent => "Use current version (ours)",
            Self::KeepIncoming => "Use incoming version (theirs)",
            Self::ManualThenContinue => "Resolve manually and continue",
            Self::SkipForNow => "Skip this file (resolve later)",
        }
    }
}

// ---------------------------------------------------------------------------
// Session plan and phases
// ---------------------------------------------------------------------------

/// What the operator confirmed at the start of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub branch_to_merge: String,
    pub trunk_branch: String,
}

impl SessionPlan {
    pub fn merge_message(&self) -> String {
        format!("Merge branch '{}' into trunk", self.branch_to_merge)
    }
}

/// The four sequential phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    PreSync,
    BranchMerge,
    PostSync,
    Publish,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::PreSync,
        Phase::BranchMerge,
        Phase::PostSync,
        Phase::Publish,
    ];
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreSync => write!(f, "SVN rebase"),
            Self::BranchMerge => write!(f, "branch merge"),
            Self::PostSync => write!(f, "final SVN rebase"),
            Self::Publish => write!(f, "SVN dcommit"),
        }
    }
}
