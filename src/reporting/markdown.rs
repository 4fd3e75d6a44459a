//! # Markdown Reporting Module / Markdown 报告模块
//!
//! Renders a human-readable run report with a summary section and a
//! per-scenario table.
//!
//! 生成包含摘要和逐场景表格的可读运行报告。

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;
use std::time::Duration;

use crate::core::aggregator::StatusCounts;
use crate::core::models::{ExecutionResult, ScenarioStatus};
use crate::infra::fs;

fn status_cell(status: ScenarioStatus) -> String {
    match status {
        ScenarioStatus::Passed => "✅ Passed".to_string(),
        ScenarioStatus::Failed => "❌ Failed".to_string(),
        other => {
            let label = other.as_str();
            let mut chars = label.chars();
            let capitalized = chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect::<String>())
                .unwrap_or_default();
            format!("⚠️ {capitalized}")
        }
    }
}

/// Table cells must not break the row.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

pub fn render_markdown(results: &[ExecutionResult], overall: Duration) -> String {
    let mut out = String::new();
    out.push_str("# Molecule Test Execution Report\n");
    out.push_str(&format!("**Generated:** {}\n\n", Utc::now().to_rfc3339()));

    if results.is_empty() {
        out.push_str("No scenario results to report.\n");
        return out;
    }

    let counts = StatusCounts::from_results(results);
    out.push_str("## Summary\n");
    out.push_str(&format!("- **Total Scenarios:** {}\n", counts.total));
    out.push_str(&format!("- **Passed:** {} ✅\n", counts.passed));
    out.push_str(&format!("- **Failed:** {} ❌\n", counts.failed));
    if counts.other > 0 {
        out.push_str(&format!("- **Other/Skipped:** {} ⚠️\n", counts.other));
    }
    out.push_str(&format!(
        "- **Total Execution Time:** {:.2}s\n\n",
        overall.as_secs_f64()
    ));

    out.push_str("## Scenario Details\n");
    out.push_str("| Scenario ID | Status | Duration (s) | Return Code |\n");
    out.push_str("|---|---|---|---|\n");
    for result in results {
        let duration = result
            .duration_secs()
            .map(|d| format!("{d:.2}"))
            .unwrap_or_else(|| "N/A".to_string());
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            escape_cell(&result.id),
            status_cell(result.status),
            duration,
            result.return_code
        ));
    }
    out
}

pub fn write_markdown_report(
    results: &[ExecutionResult],
    overall: Duration,
    path: &Path,
) -> Result<()> {
    let body = render_markdown(results, overall);
    fs::ensure_parent_dir(path)?;
    fs::atomic_write(path, body.as_bytes())
        .with_context(|| format!("Failed to write Markdown report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_every_result() {
        let results = vec![
            ExecutionResult {
                status: ScenarioStatus::Passed,
                duration: Some(Duration::from_millis(1500)),
                ..ExecutionResult::skipped("web:default")
            },
            ExecutionResult::skipped("db:cluster"),
        ];
        let md = render_markdown(&results, Duration::from_secs(2));
        assert!(md.contains("- **Total Scenarios:** 2"));
        assert!(md.contains("- **Other/Skipped:** 1"));
        assert!(md.contains("| web:default | ✅ Passed | 1.50 | 0 |"));
        assert!(md.contains("| db:cluster | ⚠️ Skipped | N/A | 0 |"));
    }

    #[test]
    fn empty_run_has_placeholder() {
        let md = render_markdown(&[], Duration::ZERO);
        assert!(md.contains("No scenario results to report."));
        assert!(!md.contains("## Summary"));
    }
}
