use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::config::ToolsConfig;
use crate::error::{HydrogitError, Result};
use crate::naming::{is_tagged_artifact, TargetName, IR_EXTENSION, PRECODEGEN_SUFFIX};
use crate::process::{ensure_success, CommandRunner, Invocation};
use crate::source::VersionWorkspace;

const CPPFLAGS: &str = "CPPFLAGS=-O0 -Xclang -disable-O0-optnone -g -flto";
const LDFLAGS: &str = "LDFLAGS=-flto -fuse-ld=lld -Wl,-save-temps";

/// configure + make with clang and LTO, then disassembles the pre-codegen bitcode.
pub(super) async fn build<R: CommandRunner>(
    runner: &R,
    tools: &ToolsConfig,
    workspace: &VersionWorkspace,
    rule: &str,
) -> Result<PathBuf> {
    let root = &workspace.root;

    info!("{}: Hydrogit cleaning...", workspace.revision);
    clean(runner, tools, root).await?;

    info!("{}: Hydrogit configuring", workspace.revision);
    let configure = Invocation::new(&tools.bash).arg("configure").current_dir(root);
    ensure_success(runner, "configure", &configure).await?;

    info!("{}: Hydrogit configuring again", workspace.revision);
    clean(runner, tools, root).await?;

    info!("{}: Hydrogit running make", workspace.revision);
    let mut make = Invocation::new(&tools.make).current_dir(root);
    if !rule.is_empty() {
        make = make.arg(rule);
    }
    let make = make
        .arg(format!("CC={}", tools.c_compiler))
        .arg(format!("CXX={}", tools.cxx_compiler))
        .arg(CPPFLAGS)
        .arg(LDFLAGS);
    ensure_success(runner, "make", &make).await?;

    let intermediate = find_precodegen(root)?.ok_or_else(|| {
        HydrogitError::Build(format!("no intermediate found in {}", root.display()))
    })?;
    let output = tagged_output_path(&intermediate);

    let disassemble = Invocation::new(&tools.llvm_dis)
        .path_arg(&intermediate)
        .arg("-o")
        .path_arg(&output);
    ensure_success(runner, "llvm-dis", &disassemble).await?;

    debug!("{}: disassembled into {}", workspace.revision, output.display());
    Ok(output)
}

/// Removes IR and pre-codegen bitcode left by a previous run, then `make clean`.
/// The latter may fail on a tree that was never configured.
async fn clean<R: CommandRunner>(runner: &R, tools: &ToolsConfig, root: &Path) -> Result<()> {
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file()
            && (is_tagged_artifact(entry.path()) || is_precodegen(entry.file_name()))
        {
            fs::remove_file(entry.path())?;
        }
    }

    let code = runner
        .run(&Invocation::new(&tools.make).arg("clean").current_dir(root))
        .await?;
    if code != 0 {
        debug!("make clean returned {code} in {}", root.display());
    }
    Ok(())
}

fn find_precodegen(root: &Path) -> Result<Option<PathBuf>> {
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_precodegen(entry.file_name()) {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

fn is_precodegen(name: &OsStr) -> bool {
    name.to_str()
        .is_some_and(|name| name.ends_with(PRECODEGEN_SUFFIX))
}

/// `dir/foo.0.5.precodegen.bc` becomes `dir/foo_hydrogit.bc`.
fn tagged_output_path(intermediate: &Path) -> PathBuf {
    let name = intermediate
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let base = name.split('.').next().unwrap_or(name);
    let parent = intermediate.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{}.{IR_EXTENSION}", TargetName::new(base).tagged()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::ScriptedRunner;

    fn workspace(root: &Path) -> VersionWorkspace {
        VersionWorkspace {
            revision: "v1".to_string(),
            root: root.to_path_buf(),
        }
    }

    /// Pretends to be make/bash/llvm-dis: make leaves a pre-codegen file, llvm-dis writes its -o.
    fn toolchain(root: PathBuf) -> ScriptedRunner {
        ScriptedRunner::with(move |inv| {
            match inv.program.to_str().unwrap_or_default() {
                "make" if inv.args.iter().any(|a| a.to_str().is_some_and(|a| a.starts_with("CC="))) => {
                    fs::write(root.join("prog.0.5.precodegen.bc"), "bitcode").unwrap();
                }
                "llvm-dis" => {
                    fs::write(&inv.args[2], "; ModuleID").unwrap();
                }
                _ => {}
            }
            0
        })
    }

    #[test]
    fn test_tagged_output_path() {
        assert_eq!(
            tagged_output_path(Path::new("/w/src/prog.0.5.precodegen.bc")),
            PathBuf::from("/w/src/prog_hydrogit.bc")
        );
    }

    #[tokio::test]
    async fn test_script_build_runs_steps_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("stale_hydrogit.bc"), "").unwrap();
        let runner = toolchain(dir.path().to_path_buf());

        let output = build(&runner, &ToolsConfig::default(), &workspace(dir.path()), "all")
            .await
            .unwrap();

        assert_eq!(output, dir.path().join("prog_hydrogit.bc"));
        assert!(output.exists());
        assert!(!dir.path().join("stale_hydrogit.bc").exists());

        let steps = runner.programs();
        assert_eq!(steps[0], "make clean");
        assert_eq!(steps[1], "bash configure");
        assert_eq!(steps[2], "make clean");
        assert_eq!(
            steps[3],
            format!("make all CC=clang CXX=clang++ {CPPFLAGS} {LDFLAGS}")
        );
        assert!(steps[4].starts_with("llvm-dis "));
        assert_eq!(steps.len(), 5);
    }

    #[tokio::test]
    async fn test_configure_failure_stops_the_build() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::with(|inv| if inv.program == "bash" { 1 } else { 0 });

        let err = build(&runner, &ToolsConfig::default(), &workspace(dir.path()), "")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "configure returned error code 1");
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_intermediate_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::succeeding();

        let err = build(&runner, &ToolsConfig::default(), &workspace(dir.path()), "")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no intermediate found"));
    }

    #[tokio::test]
    async fn test_leftover_intermediate_is_not_disassembled() {
        let dir = tempfile::tempdir().unwrap();
        let leftover = dir.path().join("prog.0.5.precodegen.bc");
        fs::write(&leftover, "old bitcode").unwrap();
        // make succeeds but emits nothing this time.
        let runner = ScriptedRunner::succeeding();

        let err = build(&runner, &ToolsConfig::default(), &workspace(dir.path()), "")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no intermediate found"));
        assert!(!leftover.exists());
        assert!(!runner.programs().iter().any(|p| p.starts_with("llvm-dis")));
    }
}
