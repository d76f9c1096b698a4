use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::{HydrogitError, Result};
use crate::naming::CLONED_DIR;
use crate::process::{ensure_success, CommandRunner, Invocation};

/// Where the repository comes from.
#[derive(Debug, Clone)]
pub struct RepositoryReference {
    pub location: String,
    pub revisions: Vec<String>,
}

impl RepositoryReference {
    /// Builds a reference from the first revision plus the subsequent ones.
    pub fn new(location: impl Into<String>, first: String, latter: Vec<String>) -> Self {
        let mut revisions = Vec::with_capacity(latter.len() + 1);
        revisions.push(first);
        revisions.extend(latter);
        Self {
            location: location.into(),
            revisions,
        }
    }

    /// Filesystem-safe name for the repository, used for the default workspace root.
    pub fn slug(&self) -> String {
        let slug: String = self
            .location
            .trim_end_matches('/')
            .trim_end_matches(".git")
            .rsplit(['/', '\\', ':'])
            .take(2)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("-")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        if slug.is_empty() {
            "repository".to_string()
        } else {
            slug
        }
    }
}

/// One revision's isolated checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionWorkspace {
    pub revision: String,
    pub root: PathBuf,
}

/// Directory name for a revision's workspace; path separators become `_`,
/// so `release/1.0` lives in `release_1.0`.
///
/// `None` for names that would leave the root or land on the base checkout.
pub fn workspace_dir_name(revision: &str) -> Option<String> {
    let name = revision.replace(['/', '\\'], "_");
    match name.as_str() {
        "" | "." | ".." | CLONED_DIR => None,
        _ => Some(name),
    }
}

/// Owns the workspace root: `cloned/` plus one sibling directory per revision.
pub struct VersionSource<'a, R> {
    runner: &'a R,
    git: String,
    root: PathBuf,
}

impl<'a, R: CommandRunner> VersionSource<'a, R> {
    pub fn new(runner: &'a R, git: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            git: git.into(),
            root: root.into(),
        }
    }

    pub fn cloned_dir(&self) -> PathBuf {
        self.root.join(CLONED_DIR)
    }

    /// Makes the base checkout available, reusing an existing one unless `force_refresh`.
    ///
    /// # Errors
    ///
    /// Fails when `use_local_source` is set and the location does not exist,
    /// or when the clone itself fails.
    pub async fn obtain(
        &self,
        reference: &RepositoryReference,
        force_refresh: bool,
        use_local_source: bool,
    ) -> Result<PathBuf> {
        let cloned = self.cloned_dir();

        if use_local_source && !Path::new(&reference.location).is_dir() {
            return Err(HydrogitError::Precondition(format!(
                "local source {} does not exist",
                reference.location
            )));
        }

        if cloned.exists() && !force_refresh {
            info!("{} exists, will not clone", cloned.display());
            return Ok(cloned);
        }

        if cloned.exists() {
            debug!("Removing stale checkout {}", cloned.display());
            fs::remove_dir_all(&cloned)?;
        }
        fs::create_dir_all(&self.root)?;

        if use_local_source {
            info!("Copying {} into {}", reference.location, cloned.display());
            copy_tree(Path::new(&reference.location), &cloned)?;
        } else {
            info!("Cloning {} into {}", reference.location, cloned.display());
            let clone = Invocation::new(&self.git)
                .arg("clone")
                .arg(&reference.location)
                .path_arg(&cloned);
            ensure_success(self.runner, "git clone", &clone).await?;
        }

        Ok(cloned)
    }

    /// Checks out each revision in the base checkout and snapshots it into
    /// `<root>/<workspace_dir_name(revision)>`.
    ///
    /// A revision that cannot be checked out or copied is reported and skipped;
    /// a half-written snapshot is removed. Existing snapshots are kept unless
    /// `force_overwrite`.
    pub async fn materialize_versions(
        &self,
        revisions: &[String],
        force_overwrite: bool,
    ) -> Result<Vec<VersionWorkspace>> {
        let cloned = self.cloned_dir();
        let mut workspaces = Vec::with_capacity(revisions.len());
        let mut used = HashSet::new();

        for revision in revisions {
            let Some(dir_name) = workspace_dir_name(revision) else {
                warn!("{revision}: not usable as a workspace name - skipping");
                continue;
            };
            if !used.insert(dir_name.clone()) {
                warn!("{revision}: workspace {dir_name} already taken - skipping");
                continue;
            }

            let target = self.root.join(&dir_name);
            let workspace = VersionWorkspace {
                revision: revision.clone(),
                root: target.clone(),
            };

            if target.exists() && !force_overwrite {
                info!("{} exists, will not copy", target.display());
                workspaces.push(workspace);
                continue;
            }

            let checkout = Invocation::new(&self.git)
                .args(["checkout", revision.as_str()])
                .current_dir(&cloned);
            if let Err(e) = ensure_success(self.runner, "git checkout", &checkout).await {
                warn!("{revision}: Error({e}) - skipping");
                continue;
            }

            if let Err(e) = snapshot(&cloned, &target) {
                warn!("{revision}: Error({e}) - skipping");
                if target.exists() {
                    if let Err(e) = fs::remove_dir_all(&target) {
                        warn!("{revision}: could not remove partial {}: {e}", target.display());
                    }
                }
                continue;
            }
            debug!("{revision}: snapshot at {}", target.display());
            workspaces.push(workspace);
        }

        Ok(workspaces)
    }
}

/// Replaces `target` with a fresh copy of `cloned`.
fn snapshot(cloned: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        fs::remove_dir_all(target)?;
    }
    copy_tree(cloned, target)
}

/// Recursively copies `src` into `dst`, preserving symlinks on unix.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| HydrogitError::Build(format!("unexpected path during copy: {e}")))?;
        let destination = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&destination)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let link = fs::read_link(src)?;
    std::os::unix::fs::symlink(link, dst)?;
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        copy_tree(src, dst)
    } else {
        fs::copy(src, dst)?;
        Ok(())
    }
}
