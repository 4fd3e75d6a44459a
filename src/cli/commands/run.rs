//! # Run Command Module / 运行命令模块
//!
//! Implements `moltest run`: dependency check, discovery, selection, the
//! parallel run, cache persistence, reports and the exit code.
//!
//! 实现 `moltest run`：依赖检查、发现、选择、并行运行、缓存持久化、报告以及退出码。

use anyhow::{Context, Result};
use colored::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::MoltestExit;
use crate::core::aggregator::ResultAggregator;
use crate::core::cache::{CacheDocument, CacheStore};
use crate::core::config::{self, ConfigStore};
use crate::core::coordinator::{
    Coordinator, CoordinatorReport, RunLedger, StopReason, TerminationPolicy,
};
use crate::core::discovery;
use crate::core::execution::{CommandExecutor, OutputLine};
use crate::core::hooks::{HookRegistry, RunContext};
use crate::core::models::ExecutionResult;
use crate::core::planner::{self, ExecutionPlan, ScenarioSelection, SelectionOptions};
use crate::infra::deps;
use crate::reporting::{console, json, junit, markdown};

/// Everything `run` takes from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub root: PathBuf,
    pub rerun_failed: bool,
    pub json_report: Option<PathBuf>,
    pub md_report: Option<PathBuf>,
    pub junit_xml: Option<PathBuf>,
    pub no_color: bool,
    pub verbose: u8,
    pub scenario: String,
    pub id_expression: Option<String>,
    pub skip_tags: Vec<String>,
    pub xfail_tags: Vec<String>,
    /// `None` falls back to the configuration file, then 1.
    pub parallel: Option<usize>,
    pub fail_fast: bool,
    pub maxfail: usize,
    pub roles_path: Option<String>,
    pub skip_dependency_check: bool,
}

impl RunArgs {
    fn selection_options(&self) -> SelectionOptions {
        SelectionOptions {
            selection: ScenarioSelection::parse(&self.scenario),
            id_expression: self.id_expression.clone().filter(|e| !e.trim().is_empty()),
            skip_tags: self.skip_tags.iter().cloned().collect::<BTreeSet<_>>(),
            xfail_tags: self.xfail_tags.iter().cloned().collect::<BTreeSet<_>>(),
            rerun_failed: self.rerun_failed,
        }
    }

    fn policy(&self) -> TerminationPolicy {
        TerminationPolicy {
            fail_fast: self.fail_fast,
            maxfail: self.maxfail,
        }
    }
}

/// Executes `moltest run`, listening for Ctrl-C.
pub async fn execute(args: RunArgs, hooks: &HookRegistry) -> MoltestExit {
    let stop = setup_signal_handler();
    execute_with_stop(args, hooks, stop).await
}

/// Executes `moltest run` with an externally owned stop token.
///
/// 使用外部持有的停止令牌执行 `moltest run`。
pub async fn execute_with_stop(
    args: RunArgs,
    hooks: &HookRegistry,
    stop: CancellationToken,
) -> MoltestExit {
    console::configure_color(args.no_color);

    if !args.skip_dependency_check {
        let issues = deps::check_dependencies().await;
        if !issues.is_empty() {
            eprintln!("{}", "Dependency and version check failed:".red().bold());
            for issue in &issues {
                eprintln!("  - {issue}");
            }
            return MoltestExit::Dependency;
        }
    }

    let root = match args.root.canonicalize() {
        Ok(root) => root,
        Err(e) => {
            eprintln!(
                "{} project root '{}' is not accessible: {e}",
                "Error:".red().bold(),
                args.root.display()
            );
            return MoltestExit::Internal;
        }
    };

    hooks.before_run(&RunContext {
        root: root.clone(),
        selection: args.scenario.clone(),
        parallel: args.parallel.unwrap_or(1).max(1),
        fail_fast: args.fail_fast,
        maxfail: args.maxfail,
        rerun_failed: args.rerun_failed,
    });

    let mut config = ConfigStore::load();
    let roles_path = match config::resolve_roles_path(args.roles_path.as_deref(), &mut config, &root) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            return MoltestExit::Internal;
        }
    };
    println!("{} {}", "Roles path:".cyan(), roles_path.display());

    let store = CacheStore::new(&root);
    let mut cache = match store.load() {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red().bold());
            return MoltestExit::CacheUnreadable;
        }
    };

    let scenarios = match discovery::discover_scenarios(&root) {
        Ok(scenarios) => scenarios,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            return MoltestExit::Internal;
        }
    };
    if scenarios.is_empty() {
        eprintln!(
            "{}",
            format!("No Molecule scenarios found under {}.", root.display()).yellow()
        );
        return MoltestExit::Selection;
    }
    console::print_discovered(&scenarios);

    let plan = match planner::plan_execution(&scenarios, &args.selection_options(), &cache) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red().bold());
            return MoltestExit::Selection;
        }
    };
    console::print_rerun_outcome(&plan.rerun);

    if plan.is_empty() {
        println!("{}", "No scenarios to run.".green());
        save_cache(&store, &mut cache);
        hooks.after_run(&[]);
        return MoltestExit::Success;
    }

    let parallel = args.parallel.or(config.config.parallel).unwrap_or(1).max(1);
    let mut results = ResultAggregator::new();
    let started = Instant::now();

    let outcome = {
        let mut ledger = RunLedger {
            results: &mut results,
            cache: &mut cache,
            hooks,
        };
        run_plan(plan, &args, &config, roles_path, parallel, &mut ledger, &stop).await
    };

    // Saved exactly once, whatever happened above.
    save_cache(&store, &mut cache);

    let report = match outcome {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".red().bold());
            hooks.after_run(results.results());
            return MoltestExit::Internal;
        }
    };

    let overall = started.elapsed();
    console::print_summary(results.results(), overall);
    let failures: Vec<_> = results.failures().collect();
    console::print_failure_details(&failures);
    write_reports(&args, results.results(), overall);

    hooks.after_run(results.results());

    if report.stop_reason == Some(StopReason::Interrupted) {
        MoltestExit::Interrupted
    } else if results.has_failures() {
        MoltestExit::TestsFailed
    } else {
        MoltestExit::Success
    }
}

async fn run_plan(
    plan: ExecutionPlan,
    args: &RunArgs,
    config: &ConfigStore,
    roles_path: PathBuf,
    parallel: usize,
    ledger: &mut RunLedger<'_>,
    stop: &CancellationToken,
) -> Result<CoordinatorReport> {
    // Nothing is recorded until the command is known to be usable.
    let mut executor = CommandExecutor::from_template(config.config.command_template())
        .context("Invalid test command in configuration")?
        .with_base_env(config.config.env.clone())
        .with_roles_path(roles_path);

    console::print_tag_skips(&plan.tag_skipped);
    for skip in &plan.tag_skipped {
        ledger.skip(&skip.id);
    }

    let printer = if args.verbose > 0 {
        let (tx, rx) = mpsc::unbounded_channel();
        executor = executor.streaming(tx);
        Some(tokio::spawn(print_output(rx)))
    } else {
        None
    };

    let xfail = plan.xfail_count();
    println!(
        "{}",
        format!(
            "Running {} scenario(s) with parallelism {parallel}{}",
            plan.records.len(),
            if xfail > 0 {
                format!(", {xfail} expected to fail")
            } else {
                String::new()
            }
        )
        .bold()
    );
    info!(records = plan.records.len(), parallel, "Starting coordinator");

    let coordinator = Coordinator::new(Arc::new(executor), parallel, args.policy())
        .with_console(args.verbose);
    let report = coordinator.run(plan.records, ledger, stop).await;
    drop(coordinator);

    if let Some(printer) = printer {
        // Aborted workers release their senders shortly after the abort.
        if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
            warn!("Output printer did not finish in time");
        }
    }

    Ok(report)
}

async fn print_output(mut rx: mpsc::UnboundedReceiver<OutputLine>) {
    while let Some(line) = rx.recv().await {
        console::print_output_line(&line);
    }
}

fn save_cache(store: &CacheStore, cache: &mut CacheDocument) {
    if let Err(e) = store.save(cache) {
        warn!(error = %e, "Failed to save cache");
        eprintln!("{} {e}", "Warning:".yellow());
    }
}

fn write_reports(args: &RunArgs, results: &[ExecutionResult], overall: Duration) {
    let report_result = |kind: &str, path: &Path, outcome: Result<()>| match outcome {
        Ok(()) => println!("{} {}", format!("{kind} report written to").cyan(), path.display()),
        Err(e) => {
            warn!(kind, error = %e, "Report generation failed");
            eprintln!("{} {e:#}", "Warning:".yellow());
        }
    };

    if let Some(path) = &args.json_report {
        report_result("JSON", path, json::write_json_report(results, overall, path));
    }
    if let Some(path) = &args.md_report {
        report_result("Markdown", path, markdown::write_markdown_report(results, overall, path));
    }
    if let Some(path) = &args.junit_xml {
        report_result("JUnit XML", path, junit::write_junit_report(results, overall, path));
    }
}

/// Cancels the returned token on Ctrl-C.
fn setup_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                console::print_interrupted();
                token_clone.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    token
}
