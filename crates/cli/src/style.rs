//! Shared styling utilities for terminal output.

use console::Style;

use gitsvnmerge_core::Level;

/// Create a step-styled string (blue arrow, bold text).
pub fn step(msg: &str) -> String {
    let arrow = Style::new().blue().bold();
    let text = Style::new().bold();
    format!("{} {}", arrow.apply_to("==>"), text.apply_to(msg))
}

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create an info-styled string (cyan).
pub fn info(msg: &str) -> String {
    let style = Style::new().cyan();
    format!("{} {}", style.apply_to("ℹ"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

pub fn render(level: Level, msg: &str) -> String {
    match level {
        Level::Step => step(msg),
        Level::Success => success(msg),
        Level::Error => error(msg),
        Level::Warning => warn(msg),
        Level::Info => info(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_keeps_message_text() {
        console::set_colors_enabled(false);
        assert_eq!(render(Level::Success, "done"), "✓ done");
        assert_eq!(render(Level::Error, "broken"), "✗ broken");
        assert_eq!(render(Level::Step, "Merging"), "==> Merging");
    }
}
