use console::Term;
use log::warn;

use crate::naming::TargetName;
use crate::reconcile::{Selection, TargetSelector};

use super::styling::{in_progress, target};

/// Asks on the terminal which target to analyze.
///
/// A closed or non-interactive stdin reads as an empty answer, which cancels.
pub struct TerminalSelector;

impl TargetSelector for TerminalSelector {
    fn select(&self, targets: &[TargetName]) -> Selection {
        let term = Term::stderr();
        let listing = targets
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{}) {}", i + 1, target(name)))
            .collect::<Vec<_>>()
            .join(" ");

        let asked = term
            .write_line(&format!("{} targets found:", in_progress(targets.len())))
            .and_then(|()| term.write_line(&listing))
            .and_then(|()| {
                term.write_str(&format!("Select a target to build(1-{}):", targets.len()))
            });
        if asked.is_err() {
            return Selection::Cancelled;
        }

        match term.read_line() {
            Ok(answer) => parse_selection(&answer, targets.len()),
            Err(_) => {
                let _ = term.write_line("");
                Selection::Cancelled
            }
        }
    }
}

/// Maps a 1-based answer to a zero-based index; anything else cancels.
pub fn parse_selection(answer: &str, count: usize) -> Selection {
    let answer = answer.trim();
    if answer.is_empty() {
        return Selection::Cancelled;
    }
    match answer.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Selection::Chosen(n - 1),
        _ => {
            warn!("Invalid selection {answer:?}, expected 1-{count}");
            Selection::Cancelled
        }
    }
}
