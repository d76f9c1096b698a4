use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::ToolsConfig;
use crate::error::{HydrogitError, Result};
use crate::language::Language;
use crate::naming::is_tagged_artifact;
use crate::process::{ensure_success, CommandRunner, Invocation};
use crate::source::VersionWorkspace;

use super::instrument::{instrument, BuildDescription};

/// A derived target that failed while its siblings were still attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetFailure {
    pub target: String,
    pub reason: String,
}

pub(super) struct CMakeBuild<'a, R> {
    pub runner: &'a R,
    pub tools: &'a ToolsConfig,
    pub description: &'a dyn BuildDescription,
    pub language: Language,
    pub build_dir: &'a Path,
    pub description_dir: &'a Path,
    pub helper_dir: &'a Path,
    pub verbose: bool,
}

impl<R: CommandRunner> CMakeBuild<'_, R> {
    pub fn build_path(&self, workspace: &VersionWorkspace) -> PathBuf {
        workspace.root.join(self.build_dir)
    }

    /// Instruments, configures and builds every derived target of one workspace.
    ///
    /// Returns the targets that failed; the caller decides from the catalog
    /// whether enough survived.
    pub async fn build(&self, workspace: &VersionWorkspace) -> Result<Vec<TargetFailure>> {
        let build_path = self.build_path(workspace);
        fs::create_dir_all(&build_path)?;

        let source_dir = workspace.root.join(self.description_dir);
        let description = source_dir.join(self.description.file_name());
        instrument(self.description, &description, self.helper_dir, self.language)?;

        info!("{}: Running CMake...", workspace.revision);
        let targets = self.configure(&build_path, &source_dir).await?;

        info!("{}: Building...", workspace.revision);
        Ok(self.build_targets(workspace, &build_path, &targets).await)
    }

    async fn configure(&self, build_path: &Path, source_dir: &Path) -> Result<Vec<String>> {
        let compiler = match self.language {
            Language::C => &self.tools.c_compiler,
            Language::Cxx => &self.tools.cxx_compiler,
        };
        let configure = Invocation::new(&self.tools.cmake)
            .arg("-B")
            .path_arg(build_path)
            .path_arg(source_dir)
            .env(self.language.compiler_env_var(), compiler.as_str());
        ensure_success(self.runner, "CMake step", &configure).await?;

        let ir_dir = self.description.ir_output_dir(build_path);
        if !ir_dir.is_dir() {
            return Err(HydrogitError::Build(format!(
                "LLVM IR output directory {} does not exist",
                ir_dir.display()
            )));
        }

        let targets = self.description.meta_targets(build_path)?;
        if targets.is_empty() {
            return Err(HydrogitError::Build(format!(
                "No CMake output found in path {}",
                ir_dir.display()
            )));
        }
        Ok(targets)
    }

    async fn build_targets(
        &self,
        workspace: &VersionWorkspace,
        build_path: &Path,
        targets: &[String],
    ) -> Vec<TargetFailure> {
        let mut failures = Vec::new();

        for target in targets {
            info!("{}: Building target {target}...", workspace.revision);
            if let Err(e) = self.clear_stale_ir(build_path, target) {
                warn!("{}: {target}: Error({e}) - skipping", workspace.revision);
                failures.push(TargetFailure {
                    target: target.clone(),
                    reason: e.to_string(),
                });
                continue;
            }

            let mut invocation = Invocation::new(&self.tools.cmake)
                .arg("--build")
                .path_arg(build_path)
                .args(["--target", target.as_str()]);
            if self.verbose {
                invocation = invocation.arg("--verbose");
            }

            if let Err(e) = ensure_success(self.runner, "Build step", &invocation).await {
                warn!("{}: {target}: Error({e}) - skipping", workspace.revision);
                failures.push(TargetFailure {
                    target: target.clone(),
                    reason: e.to_string(),
                });
            }
        }

        failures
    }

    /// Removes IR a previous run left for `target`, so a failed build cannot
    /// surface it again.
    fn clear_stale_ir(&self, build_path: &Path, target: &str) -> Result<()> {
        let target_dir = self.description.ir_output_dir(build_path).join(target);
        if !target_dir.is_dir() {
            return Ok(());
        }
        for entry in WalkDir::new(&target_dir) {
            let entry = entry?;
            if entry.file_type().is_file() && is_tagged_artifact(entry.path()) {
                debug!("removing stale {}", entry.path().display());
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}
