use std::path::PathBuf;

use log::{error, info, warn};

use crate::build::instrument::{BuildDescription, CMakeDescription};
use crate::build::{BuildOrchestrator, BuildOutcome, BuildStrategy};
use crate::config::ToolsConfig;
use crate::error::{HydrogitError, Result};
use crate::language::Language;
use crate::naming::TargetName;
use crate::output::{print_outcomes, PhaseProgress};
use crate::process::CommandRunner;
use crate::reconcile::{self, Reconciliation, TargetSelector};
use crate::report::RunReport;
use crate::source::{RepositoryReference, VersionSource, VersionWorkspace};

/// Everything one run needs, already resolved from flags and config.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub repository: RepositoryReference,
    pub use_local_source: bool,
    pub language: Language,
    pub strategy: BuildStrategy,
    pub verbose: bool,
    /// Re-clone the base checkout
    pub force_refresh: bool,
    /// Re-snapshot workspaces that already exist
    pub force_rebuild: bool,
    pub workspace_root: PathBuf,
    pub analyzer: PathBuf,
    pub tools: ToolsConfig,
    /// Analyze this target instead of prompting
    pub target: Option<TargetName>,
    /// Print the analyzer command instead of running it
    pub dry_run: bool,
}

/// Checks that can fail before any repository work is done.
pub fn check_preconditions(config: &PipelineConfig) -> Result<()> {
    if !config.dry_run && !config.analyzer.is_file() {
        return Err(HydrogitError::Precondition(format!(
            "analyzer binary {} does not exist",
            config.analyzer.display()
        )));
    }

    if let BuildStrategy::CMake { helper_dir, .. } = &config.strategy {
        if !helper_dir.join("LLVMIRUtil.cmake").is_file() {
            return Err(HydrogitError::Precondition(format!(
                "LLVMIRUtil.cmake not found in {}",
                helper_dir.display()
            )));
        }
    }

    if config.use_local_source && !PathBuf::from(&config.repository.location).is_dir() {
        return Err(HydrogitError::Precondition(format!(
            "local source {} does not exist",
            config.repository.location
        )));
    }

    Ok(())
}

/// Fetch, build, reconcile and analyze.
///
/// # Errors
///
/// Precondition failures abort before any workspace is touched, and a run in
/// which no revision builds fails with [`HydrogitError::NoVersionsBuilt`].
/// Individual workspace or target failures only show up in the report.
pub async fn run<R, S>(config: &PipelineConfig, runner: &R, selector: S) -> Result<RunReport>
where
    R: CommandRunner,
    S: TargetSelector + Send + 'static,
{
    check_preconditions(config)?;

    let mut report = RunReport::new(
        config.repository.location.clone(),
        config.language,
        config.strategy.clone(),
        config.repository.revisions.clone(),
    );

    let progress = PhaseProgress::start_phase_1(config.repository.revisions.len(), !config.verbose);
    let source = VersionSource::new(runner, &config.tools.git, &config.workspace_root);
    let workspaces = match prepare_workspaces(config, &source).await {
        Ok(workspaces) => workspaces,
        Err(e) => {
            progress.abandon();
            return Err(e);
        }
    };

    let progress = progress.finish_phase_1_start_phase_2(workspaces.len());
    let orchestrator = BuildOrchestrator::new(
        runner,
        &config.tools,
        config.language,
        &config.strategy,
        config.verbose,
    );
    report.outcomes = orchestrator.build_all(&workspaces).await;
    progress.finish_phase_2(report.built_count(), report.outcomes.len());

    print_outcomes(&report.outcomes);

    if report.built_count() == 0 {
        error!("None of {} revisions built", report.outcomes.len());
        return Err(HydrogitError::NoVersionsBuilt);
    }

    match select_target(&report.outcomes, config.target.clone(), selector).await {
        Reconciliation::Ready(invocation) => {
            report.selected_target = Some(invocation.target.clone());
            report.analyzed_revisions.clone_from(&invocation.revisions);

            if config.dry_run {
                println!("{}", invocation.to_invocation(&config.analyzer).command_line());
            } else {
                let code = reconcile::invoke(runner, &config.analyzer, &invocation).await?;
                if code != 0 {
                    warn!("Analyzer exited with code {code}");
                }
                report.analyzer_exit_code = Some(code);
            }
        }
        Reconciliation::Cancelled => info!("No target selected, analyzer not run"),
        Reconciliation::NothingToBuild => info!("Nothing to build"),
    }

    Ok(report)
}

async fn prepare_workspaces<R: CommandRunner>(
    config: &PipelineConfig,
    source: &VersionSource<'_, R>,
) -> Result<Vec<VersionWorkspace>> {
    let cloned = source
        .obtain(
            &config.repository,
            config.force_refresh,
            config.use_local_source,
        )
        .await?;

    if let BuildStrategy::CMake {
        description_dir, ..
    } = &config.strategy
    {
        let description = cloned
            .join(description_dir)
            .join(CMakeDescription.file_name());
        if !description.is_file() {
            return Err(HydrogitError::Precondition(format!(
                "{} not found in {}",
                CMakeDescription.file_name(),
                description.display()
            )));
        }
    }

    source
        .materialize_versions(&config.repository.revisions, config.force_rebuild)
        .await
}

/// The one point where the run waits on the operator. Ctrl-C cancels.
async fn select_target<S>(
    outcomes: &[BuildOutcome],
    preset: Option<TargetName>,
    selector: S,
) -> Reconciliation
where
    S: TargetSelector + Send + 'static,
{
    if let Some(target) = preset {
        return reconcile::reconcile_preset(outcomes, &target);
    }

    let outcomes = outcomes.to_vec();
    let prompt = tokio::task::spawn_blocking(move || reconcile::reconcile(&outcomes, &selector));

    tokio::select! {
        result = prompt => result.unwrap_or_else(|e| {
            warn!("Target selection failed: {e}");
            Reconciliation::Cancelled
        }),
        _ = tokio::signal::ctrl_c() => {
            eprintln!();
            info!("Target selection interrupted");
            Reconciliation::Cancelled
        }
    }
}
