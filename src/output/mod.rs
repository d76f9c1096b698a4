mod progress;
mod prompt;
mod styling;
mod tables;

pub use progress::PhaseProgress;
pub use prompt::TerminalSelector;
use styling::{brand, muted};
pub use tables::print_outcomes;

/// Prints the Hydrogit banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        brand("💧 Hydrogit"),
        muted(env!("CARGO_PKG_VERSION")),
        muted("Multi-version LLVM IR builder")
    );
}
