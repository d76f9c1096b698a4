use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::error::{HydrogitError, Result};
use crate::language::Language;
use crate::naming::{is_tagged_artifact, TargetName, CLONED_DIR};
use crate::source::VersionWorkspace;

/// Directories that never contain sources or artifacts worth handing on.
const SKIPPED_DIRS: &[&str] = &[".git", "CMakeFiles", CLONED_DIR];

struct SourceRoot {
    dir: &'static str,
    recursive: bool,
}

struct SourceConvention {
    extension: &'static str,
    roots: &'static [SourceRoot],
}

const C_SOURCES: SourceConvention = SourceConvention {
    extension: "c",
    roots: &[SourceRoot {
        dir: ".",
        recursive: true,
    }],
};

const CXX_SOURCES: SourceConvention = SourceConvention {
    extension: "cpp",
    roots: &[
        SourceRoot {
            dir: ".",
            recursive: false,
        },
        SourceRoot {
            dir: "src",
            recursive: true,
        },
    ],
};

fn convention(language: Language) -> &'static SourceConvention {
    match language {
        Language::C => &C_SOURCES,
        Language::Cxx => &CXX_SOURCES,
    }
}

/// Sources and tagged IR artifacts found in one workspace after a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildArtifactSet {
    pub sources: Vec<PathBuf>,
    pub artifacts: Vec<PathBuf>,
}

impl BuildArtifactSet {
    pub fn targets(&self) -> Vec<TargetName> {
        self.artifacts
            .iter()
            .filter_map(|path| TargetName::from_artifact(path))
            .collect()
    }

    /// First artifact whose derived target equals `target`.
    pub fn artifact_for(&self, target: &TargetName) -> Option<&Path> {
        self.artifacts
            .iter()
            .find(|path| TargetName::from_artifact(path).as_ref() == Some(target))
            .map(PathBuf::as_path)
    }
}

/// Collects sources under `workspace` and artifacts under `output_root`.
///
/// # Errors
///
/// Fails when either collection is empty; a workspace with nothing to compare
/// must not reach reconciliation.
pub fn discover(
    workspace: &VersionWorkspace,
    language: Language,
    output_root: &Path,
) -> Result<BuildArtifactSet> {
    let sources = discover_sources(&workspace.root, language)?;
    if sources.is_empty() {
        return Err(HydrogitError::NoSources {
            workspace: workspace.revision.clone(),
            language: language.to_string(),
        });
    }

    let artifacts = discover_artifacts(output_root)?;
    if artifacts.is_empty() {
        return Err(HydrogitError::NoArtifacts(output_root.display().to_string()));
    }

    debug!(
        "{}: {} sources, {} artifacts",
        workspace.revision,
        sources.len(),
        artifacts.len()
    );

    Ok(BuildArtifactSet { sources, artifacts })
}

fn discover_sources(root: &Path, language: Language) -> Result<Vec<PathBuf>> {
    let convention = convention(language);
    let mut sources = Vec::new();

    for source_root in convention.roots {
        let dir = root.join(source_root.dir);
        if !dir.is_dir() {
            continue;
        }
        let walker = WalkDir::new(&dir).min_depth(1);
        let walker = if source_root.recursive {
            walker
        } else {
            walker.max_depth(1)
        };

        for entry in walker.into_iter().filter_entry(|e| !is_skipped_dir(e)) {
            let entry = entry?;
            let matches = entry.file_type().is_file()
                && entry.path().extension().and_then(|ext| ext.to_str())
                    == Some(convention.extension);
            if matches {
                sources.push(normalize(root, entry.path()));
            }
        }
    }

    sources.sort();
    sources.dedup();
    Ok(sources)
}

fn discover_artifacts(output_root: &Path) -> Result<Vec<PathBuf>> {
    if !output_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();
    for entry in WalkDir::new(output_root)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
    {
        let entry = entry?;
        if entry.file_type().is_file() && is_tagged_artifact(entry.path()) {
            artifacts.push(entry.into_path());
        }
    }

    artifacts.sort();
    Ok(artifacts)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Drops the `./` the `.` source root would otherwise leave in every path.
fn normalize(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root.join("."))
        .map_or_else(|_| path.to_path_buf(), |rel| root.join(rel))
}
