use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::build::{successful, BuildOutcome, BuildStrategy};
use crate::language::Language;
use crate::naming::TargetName;

/// Machine-readable record of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub repository: String,
    pub language: Language,
    pub strategy: BuildStrategy,
    pub collected_at: DateTime<Utc>,
    pub requested_revisions: Vec<String>,
    pub outcomes: Vec<BuildOutcome>,
    pub selected_target: Option<TargetName>,
    /// Revisions passed to the analyzer
    pub analyzed_revisions: Vec<String>,
    pub analyzer_exit_code: Option<i32>,
}

impl RunReport {
    pub fn new(
        repository: String,
        language: Language,
        strategy: BuildStrategy,
        requested_revisions: Vec<String>,
    ) -> Self {
        Self {
            repository,
            language,
            strategy,
            collected_at: Utc::now(),
            requested_revisions,
            outcomes: Vec::new(),
            selected_target: None,
            analyzed_revisions: Vec::new(),
            analyzer_exit_code: None,
        }
    }

    pub fn built_count(&self) -> usize {
        successful(&self.outcomes).len()
    }

    /// Exit code for the process: the analyzer's, or 0 when it never ran.
    pub fn exit_code(&self) -> i32 {
        self.analyzer_exit_code.unwrap_or(0)
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}
