use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::build::{BuildOutcome, BuildStatus};

use super::styling::{muted, section_header};

fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

fn short_revision(revision: &str) -> &str {
    revision.get(..12).unwrap_or(revision)
}

/// Renders one row per revision: status, counts, targets and the failure cause.
pub fn render_outcomes(outcomes: &[BuildOutcome]) -> Table {
    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Revision", "Status", "Sources", "Targets", "Notes",
    ]));

    for outcome in outcomes {
        let revision = Cell::new(short_revision(outcome.revision()));
        let row = match &outcome.status {
            BuildStatus::Built(set) => {
                let targets = set
                    .targets()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("\n");
                let notes = outcome
                    .failed_targets
                    .iter()
                    .map(|f| format!("{}: {}", f.target, f.reason))
                    .collect::<Vec<_>>()
                    .join("\n");
                vec![
                    revision,
                    Cell::new("built").fg(TableColor::Green),
                    Cell::new(set.sources.len()),
                    Cell::new(targets),
                    Cell::new(notes).fg(TableColor::Yellow),
                ]
            }
            BuildStatus::Failed { reason } => vec![
                revision,
                Cell::new("failed").fg(TableColor::Red),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(reason).fg(TableColor::Red),
            ],
        };
        table.add_row(row);
    }

    table
}

/// Prints the build outcome table to stderr.
pub fn print_outcomes(outcomes: &[BuildOutcome]) {
    if outcomes.is_empty() {
        eprintln!("  {}\n", muted("No revisions were built"));
        return;
    }
    eprintln!("{}", section_header("📦", "Build outcomes"));
    eprintln!("{}\n", render_outcomes(outcomes));
}
