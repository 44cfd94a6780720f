//! Classification of failed merge and rebase commands.
//!
//! The unmerged-file set reported by git is authoritative. The diagnostic
//! text is only consulted while git still has an operation paused, which
//! covers `rebase --continue` refusing because of conflicts it has not
//! listed yet.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::models::CommandOutput;

/// How a failed command should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailureClass {
    /// The failure was caused by conflicts the operator can resolve.
    pub conflicts: bool,
    /// The failure is something else and ends the phase.
    pub other_fatal: bool,
}

impl FailureClass {
    pub const SUCCESS: FailureClass = FailureClass {
        conflicts: false,
        other_fatal: false,
    };
}

fn conflict_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\bconflicts?\b|could not apply|needs merge|unmerged)")
            .unwrap_or_else(|e| panic!("invalid conflict pattern: {e}"))
    })
}

/// Whether git's diagnostics talk about conflicts.
pub fn mentions_conflict(text: &str) -> bool {
    conflict_pattern().is_match(text)
}

/// Classify the result of a merge, rebase or rebase continuation.
///
/// `conflicted_files_present` is the freshly queried unmerged-file set and
/// `operation_paused` whether a merge or rebase marker exists afterwards.
pub fn classify_failure(
    output: &CommandOutput,
    conflicted_files_present: bool,
    operation_paused: bool,
) -> FailureClass {
    if output.success() {
        return FailureClass::SUCCESS;
    }
    let conflicts = conflicted_files_present
        || (operation_paused && mentions_conflict(&output.combined()));
    FailureClass {
        conflicts,
        other_fatal: !conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code: 1,
        }
    }

    #[test]
    fn test_success_is_never_a_failure() {
        let out = CommandOutput {
            stdout: "CONFLICT (content): Merge conflict in a.txt".into(),
            ..Default::default()
        };
        assert_eq!(classify_failure(&out, true, true), FailureClass::SUCCESS);
    }

    #[test]
    fn test_conflicted_files_win_over_text() {
        let out = failed("", "fatal: something unrelated");
        let class = classify_failure(&out, true, false);
        assert!(class.conflicts);
        assert!(!class.other_fatal);
    }

    #[test]
    fn test_text_only_counts_while_paused() {
        let out = failed("", "error: could not apply 1a2b3c4... change");
        assert!(classify_failure(&out, false, true).conflicts);

        let class = classify_failure(&out, false, false);
        assert!(!class.conflicts);
        assert!(class.other_fatal);
    }

    #[test]
    fn test_unrelated_failure_is_fatal() {
        let out = failed("", "Authorization failed: svn: E170001");
        let class = classify_failure(&out, false, true);
        assert!(class.other_fatal);
    }

    #[test]
    fn test_mentions_conflict_patterns() {
        assert!(mentions_conflict("CONFLICT (content): Merge conflict in x"));
        assert!(mentions_conflict("src/a.rs: needs merge"));
        assert!(mentions_conflict("error: Committing is not possible because you have unmerged files."));
        assert!(!mentions_conflict("Current branch master is up to date."));
        assert!(!mentions_conflict("nonconflicting"));
    }
}
