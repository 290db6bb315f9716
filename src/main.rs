//! depflow - policy-driven dependency updater CLI
//!
//! Scans a repository for manifests (package.json, requirements.txt,
//! Dockerfile), plans updates against the package registries under the
//! configured policies, and applies them.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use depflow::cli::{CliArgs, Command, TargetArgs};
use depflow::config::Config;
use depflow::datasource::{DatasourceRegistry, HttpClient};
use depflow::engine::{Engine, PlanResult, DEFAULT_CONCURRENCY};
use depflow::error::AppError;
use depflow::integration::{IntegrationDeps, IntegrationRegistry};
use depflow::output::{create_formatter, OutputConfig, OutputFormatter};
use depflow::progress::Progress;
use depflow::resolve::CliFlags;
use depflow::schedule::{ScheduleChecker, ScheduleStatus};
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Some units failed; the rest of the run completed
const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr; `RUST_LOG` overrides the default level
fn init_tracing(verbose: bool) {
    let default = if verbose { "depflow=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn load_config(args: &CliArgs, repo_root: &Path) -> Result<Config, AppError> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(repo_root)?,
    };
    config.validate()?;
    Ok(config)
}

fn schedule_status(config: &Config) -> Result<ScheduleStatus, AppError> {
    match &config.schedule {
        Some(schedule) => Ok(ScheduleChecker::new(schedule.clone())?.status(Utc::now())),
        None => Ok(ScheduleStatus::unscheduled()),
    }
}

/// Engine with the built-in integrations, minus the ones switched off in config
fn build_engine(
    config: &Config,
    refresh_lockfiles: bool,
    cli_flags: Option<CliFlags>,
) -> anyhow::Result<Engine> {
    let client = HttpClient::new().context("failed to create HTTP client")?;
    let datasources = Arc::new(DatasourceRegistry::with_defaults(client));
    let deps = IntegrationDeps::new(datasources).with_refresh_lockfiles(refresh_lockfiles);

    let disabled = config.disabled_integrations();
    let mut engine =
        Engine::new().with_concurrency(config.concurrency.unwrap_or(DEFAULT_CONCURRENCY));
    for integration in IntegrationRegistry::builtin().instantiate_all(&deps) {
        if disabled.iter().any(|name| name == integration.name()) {
            tracing::debug!(integration = integration.name(), "disabled in config");
            continue;
        }
        engine.register(integration);
    }

    engine.set_policies(config.policies());
    engine.set_match_configs(config.match_configs());
    engine.set_cli_flags(cli_flags);
    Ok(engine)
}

/// Cancel `ctx` on Ctrl-C; running units stop and report as cancelled
fn cancel_on_interrupt(ctx: &CancellationToken) {
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            ctx.cancel();
        }
    });
}

async fn scan_and_plan(
    engine: &Engine,
    ctx: &CancellationToken,
    target: &TargetArgs,
    progress: &mut Progress,
) -> PlanResult {
    progress.phase("Scanning manifests");
    let scanned = engine
        .scan(ctx, &target.path, &target.only, &target.exclude)
        .await;

    progress.phase("Planning updates");
    let mut planned = engine.plan(ctx, &scanned.manifests).await;
    let mut errors = scanned.errors;
    errors.append(&mut planned.errors);
    planned.errors = errors;
    progress.finish_and_clear();
    planned
}

fn exit_code(has_errors: bool) -> ExitCode {
    if has_errors {
        ExitCode::from(EXIT_PARTIAL)
    } else {
        ExitCode::SUCCESS
    }
}

/// Main application logic
async fn run(args: CliArgs) -> anyhow::Result<ExitCode> {
    let repo_root = args.path().clone();
    let config = load_config(&args, &repo_root)?;

    let output_config = OutputConfig::from_cli(args.json, args.verbose, args.quiet)
        .with_color(io::stdout().is_terminal());
    let formatter: Box<dyn OutputFormatter> = create_formatter(output_config);
    let mut progress = Progress::new(!args.quiet && !args.json);
    let ctx = CancellationToken::new();
    cancel_on_interrupt(&ctx);

    let mut stdout = io::stdout().lock();
    let exit = match &args.command {
        Command::Schedule(_) => {
            formatter.format_schedule(&schedule_status(&config)?, &mut stdout)?;
            ExitCode::SUCCESS
        }
        Command::Scan(target) => {
            let engine = build_engine(&config, false, None)?;
            progress.phase("Scanning manifests");
            let scanned = engine
                .scan(&ctx, &target.path, &target.only, &target.exclude)
                .await;
            progress.finish_and_clear();

            formatter.format_scan(&scanned, &mut stdout)?;
            exit_code(!scanned.errors.is_empty())
        }
        Command::Plan(plan) => {
            let engine = build_engine(&config, false, plan.cli_flags())?;
            let planned = scan_and_plan(&engine, &ctx, &plan.target, &mut progress).await;

            formatter.format_plan(&planned, &mut stdout)?;
            exit_code(!planned.errors.is_empty())
        }
        Command::Update(update) => {
            if update.respect_schedule {
                let status = schedule_status(&config)?;
                if !status.should_run {
                    tracing::info!("outside the configured schedule, skipping update");
                    formatter.format_schedule(&status, &mut stdout)?;
                    stdout.flush()?;
                    return Ok(ExitCode::SUCCESS);
                }
            }

            let engine = build_engine(&config, update.lockfile, update.plan.cli_flags())?;
            let planned =
                scan_and_plan(&engine, &ctx, &update.plan.target, &mut progress).await;

            if !update.dry_run {
                progress.phase("Applying updates");
            }
            let updated = engine.update(&ctx, &planned.plans, update.dry_run).await;
            progress.finish_and_clear();

            formatter.format_update(&planned, &updated, &mut stdout)?;
            let apply_failed = updated
                .results
                .iter()
                .flatten()
                .any(|r| r.has_errors());
            exit_code(!planned.errors.is_empty() || !updated.errors.is_empty() || apply_failed)
        }
    };
    stdout.flush()?;

    Ok(exit)
}
