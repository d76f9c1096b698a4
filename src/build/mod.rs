mod cmake;
pub mod instrument;
mod script;

use std::path::PathBuf;

use log::{info, warn};
use serde::Serialize;

use crate::catalog::{self, BuildArtifactSet};
use crate::config::ToolsConfig;
use crate::error::Result;
use crate::language::Language;
use crate::process::CommandRunner;
use crate::source::VersionWorkspace;

pub use cmake::TargetFailure;
use cmake::CMakeBuild;
use instrument::CMakeDescription;

/// How each workspace is turned into IR. One strategy per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildStrategy {
    /// `configure` + `make <rule>`, then disassemble the LTO pre-codegen bitcode.
    Script { rule: String },
    /// Instrument `CMakeLists.txt` and build every derived `_hydrogit` target.
    CMake {
        build_dir: PathBuf,
        description_dir: PathBuf,
        helper_dir: PathBuf,
    },
}

impl BuildStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Script { .. } => "make",
            Self::CMake { .. } => "cmake",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildStatus {
    Built(BuildArtifactSet),
    Failed { reason: String },
}

/// Result of building one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    pub workspace: VersionWorkspace,
    pub status: BuildStatus,
    pub failed_targets: Vec<TargetFailure>,
}

impl BuildOutcome {
    pub fn revision(&self) -> &str {
        &self.workspace.revision
    }

    pub fn artifacts(&self) -> Option<&BuildArtifactSet> {
        match &self.status {
            BuildStatus::Built(set) => Some(set),
            BuildStatus::Failed { .. } => None,
        }
    }

    pub fn is_built(&self) -> bool {
        self.artifacts().is_some()
    }
}

/// Successful outcomes only, in build order.
pub fn successful(outcomes: &[BuildOutcome]) -> Vec<&BuildOutcome> {
    outcomes.iter().filter(|o| o.is_built()).collect()
}

pub struct BuildOrchestrator<'a, R> {
    runner: &'a R,
    tools: &'a ToolsConfig,
    language: Language,
    strategy: &'a BuildStrategy,
    verbose: bool,
}

impl<'a, R: CommandRunner> BuildOrchestrator<'a, R> {
    pub fn new(
        runner: &'a R,
        tools: &'a ToolsConfig,
        language: Language,
        strategy: &'a BuildStrategy,
        verbose: bool,
    ) -> Self {
        Self {
            runner,
            tools,
            language,
            strategy,
            verbose,
        }
    }

    /// Builds every workspace in order, one at a time.
    ///
    /// Never stops early: each workspace ends up as one outcome, built or
    /// failed, and the caller judges the aggregate.
    pub async fn build_all(&self, workspaces: &[VersionWorkspace]) -> Vec<BuildOutcome> {
        let mut outcomes = Vec::with_capacity(workspaces.len());

        for workspace in workspaces {
            info!("{}: building with {}", workspace.revision, self.strategy.label());
            let (status, failed_targets) = match self.build_one(workspace).await {
                Ok((set, failed_targets)) => {
                    info!("{}: Built successfully", workspace.revision);
                    (BuildStatus::Built(set), failed_targets)
                }
                Err(e) => {
                    warn!("{}: Error({e}) - skipping", workspace.revision);
                    (
                        BuildStatus::Failed {
                            reason: e.to_string(),
                        },
                        Vec::new(),
                    )
                }
            };
            outcomes.push(BuildOutcome {
                workspace: workspace.clone(),
                status,
                failed_targets,
            });
        }

        outcomes
    }

    async fn build_one(
        &self,
        workspace: &VersionWorkspace,
    ) -> Result<(BuildArtifactSet, Vec<TargetFailure>)> {
        let (output_root, failed_targets) = match self.strategy {
            BuildStrategy::Script { rule } => {
                script::build(self.runner, self.tools, workspace, rule).await?;
                (workspace.root.clone(), Vec::new())
            }
            BuildStrategy::CMake {
                build_dir,
                description_dir,
                helper_dir,
            } => {
                let cmake = CMakeBuild {
                    runner: self.runner,
                    tools: self.tools,
                    description: &CMakeDescription,
                    language: self.language,
                    build_dir,
                    description_dir,
                    helper_dir,
                    verbose: self.verbose,
                };
                let failures = cmake.build(workspace).await?;
                (cmake.build_path(workspace), failures)
            }
        };

        info!("{}: Gathering files...", workspace.revision);
        let set = catalog::discover(workspace, self.language, &output_root)?;
        Ok((set, failed_targets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::TargetName;
    use crate::process::testing::ScriptedRunner;
    use std::fs;
    use std::path::Path;

    fn cmake_strategy() -> BuildStrategy {
        BuildStrategy::CMake {
            build_dir: PathBuf::from("build"),
            description_dir: PathBuf::from("."),
            helper_dir: PathBuf::from("/opt/utils"),
        }
    }

    fn make_workspace(root: &Path, revision: &str, targets: &[&str]) -> VersionWorkspace {
        let ws_root = root.join(revision);
        fs::create_dir_all(&ws_root).unwrap();
        fs::write(ws_root.join("main.c"), "int main(void) { return 0; }\n").unwrap();
        let mut cmakelists = String::from("project(demo C)\n");
        for target in targets {
            cmakelists.push_str(&format!("add_executable({target} main.c)\n"));
        }
        fs::write(ws_root.join("CMakeLists.txt"), cmakelists).unwrap();
        VersionWorkspace {
            revision: revision.to_string(),
            root: ws_root,
        }
    }

    fn fake_cmake() -> ScriptedRunner {
        fake_cmake_failing(&[])
    }

    /// Fakes cmake: configure reads the `add_executable` lines, each target build
    /// writes its IR. Builds of the `failing` targets exit with 2 and write nothing.
    fn fake_cmake_failing(failing: &'static [&'static str]) -> ScriptedRunner {
        ScriptedRunner::with(move |inv| {
            let args: Vec<&str> = inv.args.iter().filter_map(|a| a.to_str()).collect();
            match args.as_slice() {
                ["-B", build, source] => {
                    let lists = fs::read_to_string(Path::new(source).join("CMakeLists.txt"))
                        .unwrap_or_default();
                    let ir = Path::new(build).join("llvm-ir");
                    fs::create_dir_all(&ir).unwrap();
                    for line in lists.lines() {
                        if let Some(rest) = line.strip_prefix("add_executable(") {
                            let name = rest.split_whitespace().next().unwrap();
                            fs::create_dir_all(ir.join(format!("{name}_hydrogit"))).unwrap();
                        }
                    }
                    0
                }
                ["--build", _, "--target", target, ..] if failing.contains(target) => 2,
                ["--build", build, "--target", target, ..] => {
                    let dir = Path::new(build).join("llvm-ir").join(target);
                    fs::write(dir.join(format!("{target}.bc")), "; ModuleID").unwrap();
                    0
                }
                _ => 0,
            }
        })
    }

    #[tokio::test]
    async fn test_build_all_collects_successes_and_failures() {
        let root = tempfile::tempdir().unwrap();
        let good = make_workspace(root.path(), "good", &["foo"]);
        let empty = make_workspace(root.path(), "empty", &[]);
        let runner = fake_cmake();
        let tools = ToolsConfig::default();
        let strategy = cmake_strategy();
        let orchestrator = BuildOrchestrator::new(&runner, &tools, Language::C, &strategy, false);

        let outcomes = orchestrator.build_all(&[good, empty]).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_built());
        assert_eq!(
            outcomes[0].artifacts().unwrap().targets(),
            vec![TargetName::new("foo")]
        );
        assert!(matches!(
            &outcomes[1].status,
            BuildStatus::Failed { reason } if reason.contains("No CMake output")
        ));
        assert_eq!(successful(&outcomes).len(), 1);
    }

    #[tokio::test]
    async fn test_build_success_requires_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let ws = make_workspace(root.path(), "v1", &["foo"]);
        // Every target build "succeeds" without writing IR.
        let runner = ScriptedRunner::with(|inv| {
            if inv.arg_str(0) == Some("-B") {
                fs::create_dir_all(Path::new(&inv.args[1]).join("llvm-ir/foo_hydrogit")).unwrap();
            }
            0
        });
        let tools = ToolsConfig::default();
        let strategy = cmake_strategy();
        let orchestrator = BuildOrchestrator::new(&runner, &tools, Language::C, &strategy, false);

        let outcomes = orchestrator.build_all(&[ws]).await;

        assert!(!outcomes[0].is_built());
        assert!(successful(&outcomes).is_empty());
    }

    #[tokio::test]
    async fn test_corrupting_one_workspace_leaves_the_other_intact() {
        let root = tempfile::tempdir().unwrap();
        let first = make_workspace(root.path(), "v1", &["foo", "bar"]);
        let second = make_workspace(root.path(), "v2", &["foo", "bar"]);
        let runner = fake_cmake();
        let tools = ToolsConfig::default();
        let strategy = cmake_strategy();
        let orchestrator = BuildOrchestrator::new(&runner, &tools, Language::C, &strategy, false);

        let before = orchestrator
            .build_all(&[first.clone(), second.clone()])
            .await;
        fs::remove_dir_all(first.root.join("build")).unwrap();
        let second_again = catalog::discover(&second, Language::C, &second.root.join("build"));

        assert_eq!(before[1].artifacts(), Some(&second_again.unwrap()));
        assert!(catalog::discover(&first, Language::C, &first.root.join("build")).is_err());
    }

    #[tokio::test]
    async fn test_one_failing_target_keeps_workspace_built() {
        let root = tempfile::tempdir().unwrap();
        let ws = make_workspace(root.path(), "v1", &["foo", "bar"]);
        let runner = fake_cmake_failing(&["bar_hydrogit"]);
        let tools = ToolsConfig::default();
        let strategy = cmake_strategy();
        let orchestrator = BuildOrchestrator::new(&runner, &tools, Language::C, &strategy, false);

        let outcomes = orchestrator.build_all(&[ws]).await;

        assert!(outcomes[0].is_built());
        assert_eq!(outcomes[0].failed_targets.len(), 1);
        assert_eq!(outcomes[0].failed_targets[0].target, "bar_hydrogit");
        assert_eq!(
            outcomes[0].artifacts().unwrap().targets(),
            vec![TargetName::new("foo")]
        );
    }

    #[tokio::test]
    async fn test_rebuild_failure_ignores_ir_from_earlier_run() {
        let root = tempfile::tempdir().unwrap();
        let ws = make_workspace(root.path(), "v1", &["foo"]);
        let tools = ToolsConfig::default();
        let strategy = cmake_strategy();

        let first_runner = fake_cmake();
        let first = BuildOrchestrator::new(&first_runner, &tools, Language::C, &strategy, false)
            .build_all(std::slice::from_ref(&ws))
            .await;
        assert!(first[0].is_built());

        let second_runner = fake_cmake_failing(&["foo_hydrogit"]);
        let second = BuildOrchestrator::new(&second_runner, &tools, Language::C, &strategy, false)
            .build_all(&[ws])
            .await;

        assert!(!second[0].is_built());
        assert!(matches!(
            &second[0].status,
            BuildStatus::Failed { reason } if reason.contains("Output bitcode not found")
        ));
    }
}
