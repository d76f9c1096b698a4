use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use crate::build::BuildStrategy;
use crate::config::{default_cmake_utils_dir, default_workspace_root, Config};
use crate::language::Language;
use crate::naming::TargetName;
use crate::output::TerminalSelector;
use crate::pipeline::{self, PipelineConfig};
use crate::process::SystemRunner;
use crate::source::RepositoryReference;

const EXAMPLE_USAGE: &str = "example:
    hydrogit -vC https://github.com/gydrogen/progolone.git \\
        5e8651df381079d0347ddfa254f554972611d1a0 \\
        70d03532975252bd9982beba60a8720e11ec8f02 \\
        9cde7197d0a3fe0caf7ee0ec7fd291e19ccc18ed";

#[derive(Parser)]
#[command(name = "hydrogit")]
#[command(author, version, about = "Build several revisions of a repository to LLVM IR and compare them", long_about = None)]
#[command(after_help = EXAMPLE_USAGE)]
pub struct Cli {
    /// Repository URL, or a directory with --local
    url: String,

    first_version: String,

    #[arg(required = true)]
    latter_versions: Vec<String>,

    /// Clone from a local directory
    #[arg(short = 'L', long = "local")]
    local_dir: bool,

    /// Show build tool output
    #[arg(short, long)]
    verbose: bool,

    /// Compile with this language
    #[arg(short, long, value_enum)]
    language: Option<Language>,

    /// Build with CMake instead of configure + make
    #[arg(short = 'C', long = "cmake")]
    with_cmake: bool,

    /// Name of the Makefile rule to build
    #[arg(short = 'r', long = "rule")]
    rule_name: Option<String>,

    /// Re-clone the repository even if a checkout exists
    #[arg(long)]
    force_pull: bool,

    /// Re-copy revision workspaces even if they exist
    #[arg(long)]
    force_build: bool,

    /// CMake build directory, relative to each revision
    #[arg(long)]
    build_dir: Option<PathBuf>,

    /// Directory holding CMakeLists.txt, relative to each revision
    #[arg(long)]
    cmake_dir: Option<PathBuf>,

    /// Where revisions are checked out
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Analyzer binary
    #[arg(long, env = "HYDROGIT_ANALYZER")]
    analyzer: Option<PathBuf>,

    /// Config file (defaults to ./hydrogit.{toml,json,yaml,yml})
    #[arg(long)]
    config: Option<PathBuf>,

    /// Analyze this target instead of prompting
    #[arg(short, long)]
    target: Option<String>,

    /// Print the analyzer command instead of running it
    #[arg(long)]
    dry_run: bool,

    /// Write a JSON run report here
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    pretty: bool,
}

impl Cli {
    /// Merges flags over the config file into the pipeline's configuration.
    fn pipeline_config(&self, config: Config) -> Result<PipelineConfig> {
        let repository = RepositoryReference::new(
            self.url.clone(),
            self.first_version.clone(),
            self.latter_versions.clone(),
        );

        let strategy = if self.with_cmake {
            BuildStrategy::CMake {
                build_dir: self.build_dir.clone().unwrap_or(config.build.build_dir),
                description_dir: self
                    .cmake_dir
                    .clone()
                    .unwrap_or(config.build.description_dir),
                helper_dir: config
                    .paths
                    .cmake_utils_dir
                    .unwrap_or_else(default_cmake_utils_dir),
            }
        } else {
            BuildStrategy::Script {
                rule: self.rule_name.clone().unwrap_or(config.build.rule),
            }
        };

        let analyzer = self
            .analyzer
            .clone()
            .or(config.paths.analyzer)
            .context("No analyzer configured: pass --analyzer or set HYDROGIT_ANALYZER")?;

        let workspace_root = self
            .workspace
            .clone()
            .or(config.paths.workspace_root)
            .unwrap_or_else(|| default_workspace_root(&repository.slug()));

        Ok(PipelineConfig {
            repository,
            use_local_source: self.local_dir,
            language: self.language.unwrap_or(config.build.language),
            strategy,
            verbose: self.verbose,
            force_refresh: self.force_pull,
            force_rebuild: self.force_build,
            workspace_root,
            analyzer,
            tools: config.tools,
            target: self.target.clone().map(TargetName::new),
            dry_run: self.dry_run,
        })
    }

    /// Runs the pipeline and returns the exit code for the process.
    pub async fn execute(&self) -> Result<i32> {
        let config = Config::load(self.config.as_deref())?;
        let pipeline_config = self.pipeline_config(config)?;

        info!(
            "Analyzing {} revisions of {} in {}",
            pipeline_config.repository.revisions.len(),
            pipeline_config.repository.location,
            pipeline_config.workspace_root.display()
        );

        let runner = SystemRunner::new(self.verbose);
        let report = pipeline::run(&pipeline_config, &runner, TerminalSelector).await?;

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, report.to_json(self.pretty)?)
                .with_context(|| format!("Failed to write report: {}", output_path.display()))?;
            info!("Report written to: {}", output_path.display());
        }

        Ok(report.exit_code())
    }
}
