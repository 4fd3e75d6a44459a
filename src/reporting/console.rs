//! # Console Reporting Module / 控制台报告模块
//!
//! Progress lines, the end-of-run summary table and failure details, printed
//! to stdout with color coding by status.
//!
//! 进度行、运行结束时的摘要表格以及失败详情，按状态着色输出到标准输出。

use colored::*;
use std::io::IsTerminal;
use std::time::Duration;

use crate::core::aggregator::StatusCounts;
use crate::core::execution::OutputLine;
use crate::core::models::{ExecutionResult, ScenarioDescriptor, ScenarioStatus};
use crate::core::planner::{RerunOutcome, TagSkip};

/// Decides whether colors are emitted. `--no-color`, `CI=true` and a
/// non-terminal stdout all turn them off.
///
/// 决定是否输出颜色。`--no-color`、`CI=true` 以及非终端的标准输出都会关闭颜色。
pub fn configure_color(no_color: bool) -> bool {
    let ci = std::env::var("CI").is_ok_and(|v| v.eq_ignore_ascii_case("true"));
    let enabled = !no_color && !ci && std::io::stdout().is_terminal();
    colored::control::set_override(enabled);
    enabled
}

fn colored_status(status: ScenarioStatus) -> ColoredString {
    let label = status.as_str().to_uppercase();
    match status {
        ScenarioStatus::Passed => label.green(),
        ScenarioStatus::Failed => label.red(),
        ScenarioStatus::Xfailed | ScenarioStatus::Xpassed => label.yellow(),
        ScenarioStatus::Skipped | ScenarioStatus::Unknown => label.dimmed(),
    }
}

fn format_duration(duration: Option<Duration>) -> String {
    duration
        .map(|d| format!("{:.2}s", d.as_secs_f64()))
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn print_scenario_start(id: &str) {
    println!("{} {}", "RUN ".cyan(), id);
}

/// One line per finished scenario. With `verbose >= 1` the error message of a
/// failed scenario is printed below it.
pub fn print_scenario_result(result: &ExecutionResult, verbose: u8) {
    println!(
        "{:<8} {} ({})",
        colored_status(result.status),
        result.id,
        format_duration(result.duration)
    );
    if verbose > 0 && result.is_failure() {
        if let Some(message) = &result.error_message {
            println!("         {}", message.red());
        }
    }
}

pub fn print_output_line(line: &OutputLine) {
    println!("{} {}", format!("[{}]", line.id).dimmed(), line.line);
}

pub fn print_early_termination(failures: usize) {
    println!(
        "\n{}",
        format!("Stopping after {failures} failure(s); remaining scenarios are skipped.")
            .yellow()
            .bold()
    );
}

pub fn print_interrupted() {
    println!("\n{}", "Interrupted, cancelling running scenarios...".yellow());
}

pub fn print_discovered(scenarios: &[ScenarioDescriptor]) {
    println!("{}", format!("Discovered {} scenario(s):", scenarios.len()).bold());
    for scenario in scenarios {
        if scenario.tags.is_empty() {
            println!("  - {}", scenario.id);
        } else {
            let tags: Vec<&str> = scenario.tags.iter().map(String::as_str).collect();
            println!("  - {} {}", scenario.id, format!("[{}]", tags.join(", ")).dimmed());
        }
    }
}

pub fn print_rerun_outcome(outcome: &RerunOutcome) {
    match outcome {
        RerunOutcome::NotRequested => {}
        RerunOutcome::NoFailuresCached => {
            println!("{}", "No failed scenarios in cache. Nothing to rerun.".green());
        }
        RerunOutcome::NoOverlap { cached_failures } => {
            println!(
                "{}",
                format!(
                    "{cached_failures} cached failure(s), none of them in the current selection."
                )
                .yellow()
            );
        }
        RerunOutcome::Selected {
            cached_failures,
            selected,
        } => {
            println!(
                "{}",
                format!(
                    "Rerunning {selected} of {cached_failures} cached failure(s)."
                )
                .cyan()
            );
        }
    }
}

pub fn print_tag_skips(skips: &[TagSkip]) {
    for skip in skips {
        println!(
            "{:<8} {} {}",
            colored_status(ScenarioStatus::Skipped),
            skip.id,
            format!("(tags: {})", skip.matched_tags.join(", ")).dimmed()
        );
    }
}

/// Prints the summary table followed by the totals line.
///
/// ```text
/// --- Test Summary ---
///   PASSED   | web:default                              |      12.30s | rc 0
///   FAILED   | db:cluster                               |       4.10s | rc 2
///
/// 2 scenarios: 1 passed, 1 failed, 0 other in 16.42s
/// ```
///
/// 打印摘要表格以及总计行。
pub fn print_summary(results: &[ExecutionResult], overall: Duration) {
    println!("\n{}", "--- Test Summary ---".bold());

    for result in results {
        println!(
            "  {:<8} | {:<40} | {:>10} | rc {}",
            colored_status(result.status),
            result.id,
            format_duration(result.duration),
            result.return_code
        );
    }

    let counts = StatusCounts::from_results(results);
    let totals = format!(
        "{} scenarios: {} passed, {} failed, {} other in {:.2}s",
        counts.total,
        counts.passed,
        counts.failed,
        counts.other,
        overall.as_secs_f64()
    );
    if counts.failed > 0 {
        println!("\n{}", totals.red().bold());
    } else {
        println!("\n{}", totals.green().bold());
    }
}

/// Shows the error message and captured output for every failed scenario.
pub fn print_failure_details(failures: &[&ExecutionResult]) {
    if failures.is_empty() {
        return;
    }

    println!("\n{}", "--- Failures ---".red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}' (rc {})",
            i + 1,
            failures.len(),
            "FAILED".red(),
            result.id.cyan(),
            result.return_code
        );
        if let Some(message) = &result.error_message {
            println!("{}", message.red());
        }
        if !result.output_lines.is_empty() {
            println!("\n--- {} ---\n", "Output".yellow());
            for line in &result.output_lines {
                println!("{line}");
            }
        }
        println!("\n{}", "-".repeat(80));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_render_with_two_decimals() {
        assert_eq!(format_duration(Some(Duration::from_millis(1234))), "1.23s");
        assert_eq!(format_duration(None), "N/A");
    }

    #[test]
    fn status_labels_are_uppercase() {
        colored::control::set_override(false);
        assert_eq!(colored_status(ScenarioStatus::Xfailed).to_string(), "XFAILED");
        assert_eq!(colored_status(ScenarioStatus::Passed).to_string(), "PASSED");
    }
}
