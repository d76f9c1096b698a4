use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{failed, in_progress, section_header, succeeded};

/// Progress tracking for the fetch and build phases.
///
/// Hidden in verbose runs, where tool output streams to the same terminal.
pub struct PhaseProgress {
    pb: ProgressBar,
    visible: bool,
}

impl PhaseProgress {
    pub fn start_phase_1(revision_count: usize, visible: bool) -> Self {
        if visible {
            eprintln!("{}", section_header("⚙️", "Phases"));
        }
        let pb = create_spinner(
            in_progress(format!("Phase 1/2: Fetching {revision_count} revisions")).to_string(),
            visible,
        );
        Self { pb, visible }
    }

    pub fn finish_phase_1_start_phase_2(self, workspace_count: usize) -> Self {
        self.pb.finish_with_message(
            succeeded(format!("Phase 1/2: Prepared {workspace_count} workspaces ✓")).to_string(),
        );
        let pb = create_spinner(
            in_progress(format!("Phase 2/2: Building {workspace_count} revisions")).to_string(),
            self.visible,
        );
        Self {
            pb,
            visible: self.visible,
        }
    }

    pub fn finish_phase_2(self, built: usize, total: usize) {
        let message = format!("Phase 2/2: Built {built}/{total} revisions");
        if built > 0 {
            self.pb
                .finish_with_message(succeeded(format!("{message} ✓")).to_string());
        } else {
            self.pb
                .finish_with_message(failed(format!("{message} ✗")).to_string());
        }
        if self.visible {
            eprintln!();
        }
    }

    /// Stops the spinner without a final message, e.g. when a phase errors out.
    pub fn abandon(self) {
        self.pb.finish_and_clear();
    }
}

fn create_spinner(message: String, visible: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if visible {
        pb.set_draw_target(ProgressDrawTarget::stderr());
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap(),
    );
    pb.set_message(message);
    if visible {
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
    }
    pb
}
