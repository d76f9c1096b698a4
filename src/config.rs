use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::language::Language;

/// Configuration file structure for Hydrogit.
///
/// Lets users pin tool locations and build-system layout once instead of
/// passing them on every run. Command-line flags take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// External tool names or paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Workspace, analyzer and helper locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Build defaults
    #[serde(default)]
    pub build: BuildConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ToolsConfig {
    pub git: String,
    pub make: String,
    pub bash: String,
    pub cmake: String,
    pub llvm_dis: String,
    /// Compiler substituted for C builds
    pub c_compiler: String,
    /// Compiler substituted for C++ builds
    pub cxx_compiler: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PathsConfig {
    /// Root holding `cloned/` and one directory per revision
    pub workspace_root: Option<PathBuf>,

    /// Analyzer binary
    pub analyzer: Option<PathBuf>,

    /// Directory containing `LLVMIRUtil.cmake`
    pub cmake_utils_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildConfig {
    #[serde(default)]
    pub language: Language,

    /// Build directory, relative to each workspace
    #[serde(default = "default_build_dir")]
    pub build_dir: PathBuf,

    /// Directory holding the top-level `CMakeLists.txt`, relative to each workspace
    #[serde(default = "default_description_dir")]
    pub description_dir: PathBuf,

    /// Makefile rule for script-driven builds
    #[serde(default)]
    pub rule: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            make: "make".to_string(),
            bash: "bash".to_string(),
            cmake: "cmake".to_string(),
            llvm_dis: "llvm-dis".to_string(),
            c_compiler: "clang".to_string(),
            cxx_compiler: "clang++".to_string(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            build_dir: default_build_dir(),
            description_dir: default_description_dir(),
            rule: String::new(),
        }
    }
}

fn default_build_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_description_dir() -> PathBuf {
    PathBuf::from(".")
}

/// `<cache dir>/hydrogit/<slug>`, or `./tmp/<slug>` without a cache dir.
pub fn default_workspace_root(slug: &str) -> PathBuf {
    dirs::cache_dir()
        .map_or_else(|| PathBuf::from("tmp"), |dir| dir.join("hydrogit"))
        .join(slug)
}

/// `<data dir>/hydrogit/llvm-ir-cmake-utils/cmake`.
pub fn default_cmake_utils_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hydrogit")
        .join("llvm-ir-cmake-utils")
        .join("cmake")
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./hydrogit.toml
    /// 3. ./hydrogit.json
    /// 4. ./hydrogit.yaml
    /// 5. ./hydrogit.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["hydrogit.toml", "hydrogit.json", "hydrogit.yaml", "hydrogit.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}
