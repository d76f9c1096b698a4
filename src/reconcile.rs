use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::build::BuildOutcome;
use crate::error::Result;
use crate::naming::TargetName;
use crate::process::{CommandRunner, Invocation};

/// Token separating each workspace's source group in the analyzer's arguments.
pub const SOURCE_SEPARATOR: &str = "::";

/// Operator answer to the target prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Zero-based index into the offered targets.
    Chosen(usize),
    Cancelled,
}

/// Picks one of several comparable targets.
pub trait TargetSelector {
    /// `targets` is sorted and has at least two entries.
    fn select(&self, targets: &[TargetName]) -> Selection;
}

/// Result of matching targets across the built workspaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    NothingToBuild,
    Cancelled,
    Ready(AnalyzerInvocation),
}

/// Analyzer arguments for one selected target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerInvocation {
    pub target: TargetName,
    /// Revisions that had the target, in build order.
    pub revisions: Vec<String>,
    pub args: Vec<PathBuf>,
}

/// Distinct targets over every successful workspace, sorted.
pub fn candidate_targets(outcomes: &[BuildOutcome]) -> Vec<TargetName> {
    outcomes
        .iter()
        .filter_map(BuildOutcome::artifacts)
        .flat_map(|set| set.targets())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Arguments for `target`: the matching artifact of every workspace that has
/// one, then `::` and that workspace's sources, per workspace.
///
/// Workspaces without the target are left out.
pub fn assemble(outcomes: &[BuildOutcome], target: &TargetName) -> AnalyzerInvocation {
    let matched: Vec<(&BuildOutcome, &Path)> = outcomes
        .iter()
        .filter_map(|outcome| {
            let artifact = outcome.artifacts()?.artifact_for(target)?;
            Some((outcome, artifact))
        })
        .collect();

    let mut args: Vec<PathBuf> = matched.iter().map(|(_, a)| a.to_path_buf()).collect();
    for (outcome, _) in &matched {
        args.push(PathBuf::from(SOURCE_SEPARATOR));
        if let Some(set) = outcome.artifacts() {
            args.extend(set.sources.iter().cloned());
        }
    }

    AnalyzerInvocation {
        target: target.clone(),
        revisions: matched
            .iter()
            .map(|(outcome, _)| outcome.revision().to_string())
            .collect(),
        args,
    }
}

/// Chooses the target to analyze and assembles the analyzer arguments.
///
/// A single candidate is taken without asking; several go through `selector`.
pub fn reconcile(outcomes: &[BuildOutcome], selector: &dyn TargetSelector) -> Reconciliation {
    let targets = candidate_targets(outcomes);

    let target = match targets.len() {
        0 => {
            info!("Nothing to build");
            return Reconciliation::NothingToBuild;
        }
        1 => targets[0].clone(),
        n => match selector.select(&targets) {
            Selection::Chosen(index) if index < n => targets[index].clone(),
            Selection::Chosen(index) => {
                warn!("Target selection {} is out of range 1-{n}", index + 1);
                return Reconciliation::Cancelled;
            }
            Selection::Cancelled => {
                info!("Target selection cancelled");
                return Reconciliation::Cancelled;
            }
        },
    };

    let invocation = assemble(outcomes, &target);
    info!(
        "Target {target} found in {} revision(s): {}",
        invocation.revisions.len(),
        invocation.revisions.join(", ")
    );
    Reconciliation::Ready(invocation)
}

/// Like [`reconcile`], but with the target named up front instead of prompted.
pub fn reconcile_preset(outcomes: &[BuildOutcome], target: &TargetName) -> Reconciliation {
    let targets = candidate_targets(outcomes);
    if targets.is_empty() {
        info!("Nothing to build");
        return Reconciliation::NothingToBuild;
    }
    if !targets.contains(target) {
        warn!("Target {target} was not built in any revision");
        return Reconciliation::Cancelled;
    }
    Reconciliation::Ready(assemble(outcomes, target))
}

impl AnalyzerInvocation {
    pub fn to_invocation(&self, analyzer: &Path) -> Invocation {
        Invocation::new(analyzer)
            .args(&self.args)
            .show_output()
    }
}

/// Runs the analyzer and hands back its exit code untouched.
pub async fn invoke<R: CommandRunner>(
    runner: &R,
    analyzer: &Path,
    invocation: &AnalyzerInvocation,
) -> Result<i32> {
    let command = invocation.to_invocation(analyzer);
    info!("running command {}", command.command_line());
    runner.run(&command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildStatus;
    use crate::catalog::BuildArtifactSet;
    use crate::process::testing::ScriptedRunner;
    use crate::source::VersionWorkspace;

    struct Fixed(Selection);

    impl TargetSelector for Fixed {
        fn select(&self, _targets: &[TargetName]) -> Selection {
            self.0.clone()
        }
    }

    struct ByName(&'static str);

    impl TargetSelector for ByName {
        fn select(&self, targets: &[TargetName]) -> Selection {
            targets
                .iter()
                .position(|t| t.as_str() == self.0)
                .map_or(Selection::Cancelled, Selection::Chosen)
        }
    }

    fn built(revision: &str, targets: &[&str]) -> BuildOutcome {
        let root = PathBuf::from("/ws").join(revision);
        BuildOutcome {
            workspace: VersionWorkspace {
                revision: revision.to_string(),
                root: root.clone(),
            },
            status: BuildStatus::Built(BuildArtifactSet {
                sources: vec![root.join("main.c")],
                artifacts: targets
                    .iter()
                    .map(|t| root.join(format!("build/llvm-ir/{t}_hydrogit/{t}_hydrogit.bc")))
                    .collect(),
            }),
            failed_targets: Vec::new(),
        }
    }

    fn failed(revision: &str) -> BuildOutcome {
        BuildOutcome {
            workspace: VersionWorkspace {
                revision: revision.to_string(),
                root: PathBuf::from("/ws").join(revision),
            },
            status: BuildStatus::Failed {
                reason: "make returned error code 2".to_string(),
            },
            failed_targets: Vec::new(),
        }
    }

    fn revisions(result: &Reconciliation) -> Vec<String> {
        match result {
            Reconciliation::Ready(invocation) => invocation.revisions.clone(),
            other => panic!("expected an invocation, got {other:?}"),
        }
    }

    #[test]
    fn test_single_target_selected_without_prompt() {
        struct Panics;
        impl TargetSelector for Panics {
            fn select(&self, _: &[TargetName]) -> Selection {
                panic!("prompted for a single target")
            }
        }

        let result = reconcile(&[built("r1", &["foo"])], &Panics);

        let Reconciliation::Ready(invocation) = result else {
            panic!("expected an invocation");
        };
        assert_eq!(
            invocation.args,
            vec![
                PathBuf::from("/ws/r1/build/llvm-ir/foo_hydrogit/foo_hydrogit.bc"),
                PathBuf::from("::"),
                PathBuf::from("/ws/r1/main.c"),
            ]
        );
    }

    #[test]
    fn test_three_workspaces_selection_filters_revisions() {
        let outcomes = vec![
            built("r1", &["A", "B"]),
            built("r2", &["A"]),
            built("r3", &["A", "B"]),
        ];

        assert_eq!(
            candidate_targets(&outcomes),
            vec![TargetName::new("A"), TargetName::new("B")]
        );
        assert_eq!(
            revisions(&reconcile(&outcomes, &ByName("A"))),
            vec!["r1", "r2", "r3"]
        );
        assert_eq!(
            revisions(&reconcile(&outcomes, &ByName("B"))),
            vec!["r1", "r3"]
        );
    }

    #[test]
    fn test_argument_shape_pairs_sources_with_workspace() {
        let outcomes = vec![built("r1", &["foo", "bar"]), built("r2", &["foo"])];

        let invocation = assemble(&outcomes, &TargetName::new("bar"));
        let args: Vec<String> = invocation
            .args
            .iter()
            .map(|a| a.display().to_string())
            .collect();

        assert_eq!(
            args,
            vec![
                "/ws/r1/build/llvm-ir/bar_hydrogit/bar_hydrogit.bc",
                "::",
                "/ws/r1/main.c",
            ]
        );

        let invocation = assemble(&outcomes, &TargetName::new("foo"));
        let args: Vec<String> = invocation
            .args
            .iter()
            .map(|a| a.display().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "/ws/r1/build/llvm-ir/foo_hydrogit/foo_hydrogit.bc",
                "/ws/r2/build/llvm-ir/foo_hydrogit/foo_hydrogit.bc",
                "::",
                "/ws/r1/main.c",
                "::",
                "/ws/r2/main.c",
            ]
        );
    }

    #[test]
    fn test_failed_outcomes_are_ignored() {
        let outcomes = vec![failed("r1"), built("r2", &["foo"])];
        assert_eq!(revisions(&reconcile(&outcomes, &Fixed(Selection::Cancelled))), vec!["r2"]);
    }

    #[test]
    fn test_nothing_to_build() {
        let outcomes = vec![failed("r1"), failed("r2")];
        assert_eq!(
            reconcile(&outcomes, &Fixed(Selection::Chosen(0))),
            Reconciliation::NothingToBuild
        );
    }

    #[test]
    fn test_cancel_and_out_of_range_abort() {
        let outcomes = vec![built("r1", &["foo", "bar"])];
        assert_eq!(
            reconcile(&outcomes, &Fixed(Selection::Cancelled)),
            Reconciliation::Cancelled
        );
        assert_eq!(
            reconcile(&outcomes, &Fixed(Selection::Chosen(2))),
            Reconciliation::Cancelled
        );
    }

    #[test]
    fn test_preset_target() {
        let outcomes = vec![built("r1", &["foo", "bar"]), built("r2", &["foo"])];
        assert_eq!(
            revisions(&reconcile_preset(&outcomes, &TargetName::new("bar"))),
            vec!["r1"]
        );
        assert_eq!(
            reconcile_preset(&outcomes, &TargetName::new("baz")),
            Reconciliation::Cancelled
        );
    }

    #[tokio::test]
    async fn test_invoke_propagates_exit_code() {
        let runner = ScriptedRunner::with(|_| 7);
        let invocation = assemble(&[built("r1", &["foo"])], &TargetName::new("foo"));

        let code = invoke(&runner, Path::new("/opt/Hydrogen.out"), &invocation)
            .await
            .unwrap();

        assert_eq!(code, 7);
        let call = &runner.calls()[0];
        assert_eq!(call.program, "/opt/Hydrogen.out");
        assert!(call.always_show);
        assert_eq!(call.args[1], "::");
    }

    #[cfg(unix)]
    #[test]
    fn test_analyzer_receives_raw_path_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let source = PathBuf::from(OsStr::from_bytes(b"/ws/r1/caf\xe9.c"));
        let invocation = AnalyzerInvocation {
            target: TargetName::new("foo"),
            revisions: vec!["r1".to_string()],
            args: vec![PathBuf::from("::"), source.clone()],
        };

        let command = invocation.to_invocation(Path::new("/opt/Hydrogen.out"));

        assert_eq!(command.args[1].as_bytes(), source.as_os_str().as_bytes());
    }
}
