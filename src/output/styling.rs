//! Colours shared by the progress, outcome table and target prompt.

use std::fmt::Display;

use console::{style, StyledObject};

type Styled = StyledObject<String>;

/// A phase that is still running.
pub fn in_progress(text: impl Display) -> Styled {
    style(text.to_string()).bright().yellow()
}

pub fn succeeded(text: impl Display) -> Styled {
    style(text.to_string()).bright().green()
}

pub fn failed(text: impl Display) -> Styled {
    style(text.to_string()).bright().red()
}

/// Build target names as offered to the operator.
pub fn target(text: impl Display) -> Styled {
    style(text.to_string()).cyan()
}

pub fn muted(text: impl Display) -> Styled {
    style(text.to_string()).dim()
}

pub fn brand(text: impl Display) -> Styled {
    style(text.to_string()).magenta().bold()
}

/// `icon Title` line opening an output section on stderr.
pub fn section_header(icon: &str, title: &str) -> String {
    format!("{} {}", style(icon).bright(), style(title).bright().underlined())
}
