use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Suffix attached to every derived build target and IR artifact.
pub const TARGET_MARKER: &str = "_hydrogit";

/// Extension of the IR files handed to the analyzer.
pub const IR_EXTENSION: &str = "bc";

/// Suffix of the bitcode `lld -save-temps` leaves behind right before codegen.
pub const PRECODEGEN_SUFFIX: &str = ".precodegen.bc";

/// Name of the base checkout inside the workspace root.
pub const CLONED_DIR: &str = "cloned";

/// Logical build target shared across revisions.
///
/// Derived from an artifact's base name by stripping [`TARGET_MARKER`]; this
/// is the only place that transform happens, so the catalog and reconciler
/// always agree on the join key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetName(String);

impl TargetName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Derives the target from a tagged base name such as `foo_hydrogit`.
    ///
    /// Returns `None` when the marker is missing or nothing precedes it.
    pub fn from_tagged(stem: &str) -> Option<Self> {
        stem.strip_suffix(TARGET_MARKER)
            .filter(|name| !name.is_empty())
            .map(Self::new)
    }

    /// Derives the target from an artifact path like `llvm-ir/foo_hydrogit/foo_hydrogit.bc`.
    pub fn from_artifact(path: &Path) -> Option<Self> {
        if path.extension().and_then(|ext| ext.to_str()) != Some(IR_EXTENSION) {
            return None;
        }
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(Self::from_tagged)
    }

    /// Inverse of [`TargetName::from_tagged`].
    pub fn tagged(&self) -> String {
        format!("{}{TARGET_MARKER}", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True when a file name follows the `<base>_hydrogit.bc` convention.
pub fn is_tagged_artifact(path: &Path) -> bool {
    TargetName::from_artifact(path).is_some()
}
