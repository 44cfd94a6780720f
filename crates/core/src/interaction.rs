//! Operator interaction seam.
//!
//! The controller and orchestrator never touch the terminal directly. They
//! talk to an [`Interaction`], which the CLI implements with dialoguer and
//! tests implement with a script of answers.

use crate::errors::PromptError;

/// Semantic level of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Step,
    Success,
    Error,
    Warning,
    Info,
}

/// Prompts and status output for one operator.
///
/// Every prompt blocks until answered. There is no timeout.
pub trait Interaction {
    /// Print a status line at the given level.
    fn message(&self, level: Level, text: &str);

    /// Print text verbatim (diffs, raw tool output).
    fn print(&self, text: &str);

    /// Print a framed section title.
    fn heading(&self, title: &str);

    /// Pick one of `items`; returns its index.
    fn select(&self, prompt: &str, items: &[&str]) -> Result<usize, PromptError>;

    /// Yes/no question.
    fn confirm(&self, prompt: &str) -> Result<bool, PromptError>;

    /// Free-text answer, with `default` used for an empty reply.
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError>;

    /// Block until the operator presses Enter.
    fn pause(&self, prompt: &str) -> Result<(), PromptError>;

    /// Show that a long-running command is in flight. Terminals may draw a
    /// spinner; the default does nothing.
    fn begin_progress(&self, _text: &str) {}

    /// Clear whatever [`Interaction::begin_progress`] drew.
    fn end_progress(&self) {}

    fn step(&self, text: &str) {
        self.message(Level::Step, text);
    }

    fn success(&self, text: &str) {
        self.message(Level::Success, text);
    }

    fn error(&self, text: &str) {
        self.message(Level::Error, text);
    }

    fn warning(&self, text: &str) {
        self.message(Level::Warning, text);
    }

    fn info(&self, text: &str) {
        self.message(Level::Info, text);
    }
}
