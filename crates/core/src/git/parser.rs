//! Parsers for plain-text git output.

use tracing::debug;

use crate::models::ConflictedFile;

/// Parse `git branch` output into branch names, in listed order.
///
/// Strips the `*` (current) and `+` (checked out in another worktree)
/// markers and drops detached-HEAD pseudo entries.
pub fn parse_branch_list(output: &str) -> Vec<String> {
    let branches: Vec<String> = output
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches("* ")
                .trim_start_matches("+ ")
                .trim()
        })
        .filter(|name| !name.is_empty() && !name.starts_with('('))
        .map(str::to_string)
        .collect();
    debug!(count = branches.len(), "parsed branch list");
    branches
}

/// Parse NUL-separated path output (`git diff --name-only -z`).
///
/// Duplicates are dropped; the first occurrence keeps its position.
pub fn parse_conflicted_paths(output: &str) -> Vec<ConflictedFile> {
    let mut files: Vec<ConflictedFile> = Vec::new();
    for path in output.split('\0') {
        if path.is_empty() {
            continue;
        }
        let file = ConflictedFile::new(path);
        if !files.contains(&file) {
            files.push(file);
        }
    }
    files
}

/// Parse `git status --porcelain`: any entry means the tree is dirty.
pub fn porcelain_is_dirty(output: &str) -> bool {
    output.lines().any(|l| !l.trim().is_empty())
}
