//! # JSON Reporting Module / JSON 报告模块
//!
//! Writes a machine-readable run report:
//!
//! ```json
//! {
//!   "total_scenarios": 2, "passed": 1, "failed": 1, "other": 0,
//!   "timestamp": "2024-05-01T10:00:00+00:00", "overall_duration": 12.5,
//!   "scenarios": [{"id": "web:default", "name": "default", "role": "web",
//!                  "status": "passed", "duration": 8.1, "return_code": 0}]
//! }
//! ```
//!
//! 写出机器可读的运行报告。

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::core::aggregator::StatusCounts;
use crate::core::models::{ExecutionResult, ScenarioStatus};
use crate::infra::fs;

#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub total_scenarios: usize,
    pub passed: usize,
    pub failed: usize,
    pub other: usize,
    pub timestamp: String,
    pub overall_duration: f64,
    pub scenarios: Vec<JsonScenario<'a>>,
}

#[derive(Debug, Serialize)]
pub struct JsonScenario<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub role: &'a str,
    pub status: ScenarioStatus,
    pub duration: Option<f64>,
    pub return_code: i32,
}

impl<'a> JsonReport<'a> {
    pub fn new(results: &'a [ExecutionResult], overall: Duration) -> Self {
        let counts = StatusCounts::from_results(results);
        Self {
            total_scenarios: counts.total,
            passed: counts.passed,
            failed: counts.failed,
            other: counts.other,
            timestamp: Utc::now().to_rfc3339(),
            overall_duration: overall.as_secs_f64(),
            scenarios: results
                .iter()
                .map(|result| {
                    let (role, name) = result.role_and_name();
                    JsonScenario {
                        id: &result.id,
                        name,
                        role,
                        status: result.status,
                        duration: result.duration_secs(),
                        return_code: result.return_code,
                    }
                })
                .collect(),
        }
    }
}

/// Serializes the report and writes it atomically to `path`.
///
/// 序列化报告并原子地写入 `path`。
pub fn write_json_report(results: &[ExecutionResult], overall: Duration, path: &Path) -> Result<()> {
    let report = JsonReport::new(results, overall);
    let body = serde_json::to_string_pretty(&report).context("Failed to serialize JSON report")?;
    fs::ensure_parent_dir(path)?;
    fs::atomic_write(path, body.as_bytes())
        .with_context(|| format!("Failed to write JSON report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_splits_role_and_counts_statuses() {
        let results = vec![
            ExecutionResult {
                status: ScenarioStatus::Passed,
                duration: Some(Duration::from_secs(2)),
                ..ExecutionResult::skipped("web:default")
            },
            ExecutionResult::errored("smoke", "boom"),
        ];
        let value = serde_json::to_value(JsonReport::new(&results, Duration::from_secs(3))).unwrap();

        assert_eq!(value["total_scenarios"], 2);
        assert_eq!(value["passed"], 1);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["other"], 0);
        assert_eq!(value["overall_duration"], 3.0);
        assert_eq!(value["scenarios"][0]["role"], "web");
        assert_eq!(value["scenarios"][0]["name"], "default");
        assert_eq!(value["scenarios"][0]["duration"], 2.0);
        assert_eq!(value["scenarios"][1]["role"], "unknown");
        assert_eq!(value["scenarios"][1]["status"], "failed");
        assert_eq!(value["scenarios"][1]["return_code"], -1);
        assert!(value["scenarios"][1]["duration"].is_null());
    }

    #[test]
    fn writes_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        write_json_report(&[], Duration::ZERO, &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["total_scenarios"], 0);
        assert_eq!(value["scenarios"].as_array().unwrap().len(), 0);
    }
}
