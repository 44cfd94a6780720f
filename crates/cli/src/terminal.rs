//! dialoguer-backed operator interaction.

use std::cell::RefCell;
use std::io::ErrorKind;
use std::time::Duration;

use console::Term;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};

use gitsvnmerge_core::errors::PromptError;
use gitsvnmerge_core::{Interaction, Level};

use crate::style;

/// [`Interaction`] on the controlling terminal.
pub struct TerminalUi {
    term: Term,
    spinner: RefCell<Option<ProgressBar>>,
}

impl TerminalUi {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            spinner: RefCell::new(None),
        }
    }

    /// Map a dialoguer failure. Ctrl+C in raw mode surfaces as an
    /// `Interrupted` I/O error rather than a signal.
    fn prompt_error(&self, e: dialoguer::Error) -> PromptError {
        let dialoguer::Error::IO(io) = e;
        let _ = self.term.show_cursor();
        if io.kind() == ErrorKind::Interrupted {
            println!();
            PromptError::Interrupted
        } else {
            PromptError::Io(io.to_string())
        }
    }
}

impl Default for TerminalUi {
    fn default() -> Self {
        Self::new()
    }
}

impl Interaction for TerminalUi {
    fn message(&self, level: Level, text: &str) {
        if level == Level::Step {
            println!();
        }
        println!("{}", style::render(level, text));
    }

    fn print(&self, text: &str) {
        println!("{text}");
    }

    fn heading(&self, title: &str) {
        let rule = "═".repeat(60);
        println!();
        println!("{}", style::dim(&rule));
        println!("{}", style::header(title));
        println!("{}", style::dim(&rule));
    }

    fn select(&self, prompt: &str, items: &[&str]) -> Result<usize, PromptError> {
        Select::new()
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact_on(&self.term)
            .map_err(|e| self.prompt_error(e))
    }

    fn confirm(&self, prompt: &str) -> Result<bool, PromptError> {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact_on(&self.term)
            .map_err(|e| self.prompt_error(e))
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, PromptError> {
        let mut input = Input::<String>::new().with_prompt(prompt).allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        input
            .interact_text_on(&self.term)
            .map(|s| s.trim().to_string())
            .map_err(|e| self.prompt_error(e))
    }

    fn pause(&self, prompt: &str) -> Result<(), PromptError> {
        self.term
            .write_str(&format!("{prompt} "))
            .and_then(|_| self.term.read_line())
            .map(|_| ())
            .map_err(|e| self.prompt_error(dialoguer::Error::IO(e)))
    }

    fn begin_progress(&self, text: &str) {
        let spinner = ProgressBar::new_spinner();
        let template = ProgressStyle::with_template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(
            template.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.set_message(format!("Running {text}..."));
        spinner.enable_steady_tick(Duration::from_millis(100));
        if let Some(old) = self.spinner.replace(Some(spinner)) {
            old.finish_and_clear();
        }
    }

    fn end_progress(&self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}
