mod cli;
mod command_executor;
mod plan;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use pbuild_builder::scheduler::{segment_labels, submission_order};
use pbuild_builder::{BuildOrchestrator, BuildSummary, ModuleExecutor, ModuleStatus, PriorityConfig};
use pbuild_core::config::{self, BuilderConfig};
use pbuild_core::{ReactorContext, Session};

use crate::cli::{CliArgs, Command, CommonArgs};
use crate::command_executor::CommandExecutor;
use crate::plan::BuildPlan;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    config::load_dotenv();
    let args = CliArgs::parse();

    match dispatch(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(args: CliArgs) -> Result<ExitCode> {
    match args.command {
        Command::Run {
            common,
            threads,
            fail_fast_halt,
            json,
        } => run(common, threads, fail_fast_halt, json),
        Command::Plan { common } => {
            show_plan(common)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Env config with CLI overrides applied.
fn resolve_config(common: &CommonArgs, threads: Option<i64>) -> BuilderConfig {
    let mut config = BuilderConfig::from_env();
    if let Some(threads) = threads {
        config.threads = threads;
    }
    if let Some(root) = &common.root {
        config.root_dir = root.clone();
    }
    if let Some(file) = &common.priority_file {
        config.priority_file = Some(file.clone());
    }
    config
}

fn run(
    common: CommonArgs,
    threads: Option<i64>,
    fail_fast_halt: bool,
    json: bool,
) -> Result<ExitCode> {
    let config = resolve_config(&common, threads);
    config.log_summary();

    let plan = BuildPlan::load(&common.plan)?;
    let priority = PriorityConfig::load(&config).context("failed to load priority config")?;

    let root = Session::root();
    let builds = plan.project_builds(&root);
    let segments = plan.task_segments();

    let dirs = plan.module_dirs(&config.root_dir);
    let executor: Arc<dyn ModuleExecutor> = Arc::new(
        CommandExecutor::new(&plan.command, dirs, config.root_dir.clone())?
            .with_fail_fast_halt(fail_fast_halt),
    );
    let reactor = Arc::new(ReactorContext::default());

    info!("Building {} modules in {} segments", plan.modules.len(), segments.len());
    let summary = BuildOrchestrator::new(executor, config)
        .build(&root, &reactor, &builds, &segments, &priority)
        .context("build aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.failure.is_some() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn show_plan(common: CommonArgs) -> Result<()> {
    let config = resolve_config(&common, None);
    let plan = BuildPlan::load(&common.plan)?;
    let priority = PriorityConfig::load(&config).context("failed to load priority config")?;

    let builds = plan.project_builds(&Session::root());
    for (index, segment) in plan.task_segments().iter().enumerate() {
        let labels = segment_labels(index, &builds);
        println!("[{}]", segment);
        let order = submission_order(index, &builds, &priority);
        for (idx, build) in order.iter().enumerate() {
            let key = build.module.key();
            let label = labels.get(&key).map(String::as_str).unwrap_or("");
            println!("  {:>3}. {:<40} {}", idx + 1, key, label);
        }
    }
    Ok(())
}

fn print_summary(summary: &BuildSummary) {
    println!();
    println!(
        "Build {:?} in {:.1}s on {} threads (run {})",
        summary.status,
        summary.elapsed.as_secs_f64(),
        summary.degree_of_concurrency,
        summary.run_id
    );
    for segment in &summary.segments {
        println!("[{}] {:?}", segment.segment, segment.outcome);
        for m in &segment.modules {
            let status = match &m.status {
                ModuleStatus::Succeeded => "SUCCESS",
                ModuleStatus::Failed { .. } => "FAILURE",
                ModuleStatus::Unharvested => "UNHARVESTED",
                ModuleStatus::NotAttempted => "SKIPPED",
            };
            let elapsed = m
                .elapsed
                .map(|d| format!("{:.2}s", d.as_secs_f64()))
                .unwrap_or_default();
            println!("  {:<40} {:<12} {}", m.module.to_string(), status, elapsed);
        }
    }
    if let Some(failure) = &summary.failure {
        println!();
        println!("{}", failure);
    }
}
