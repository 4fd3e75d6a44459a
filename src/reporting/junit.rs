//! # JUnit XML Reporting Module / JUnit XML 报告模块
//!
//! One `<testsuite name="moltest">` with a `<testcase>` per result. The role
//! becomes the `classname`; failures carry the error message and captured
//! output, skipped and xfailed cases are marked `<skipped/>`.
//!
//! 每个结果对应一个 `<testcase>`，角色名作为 `classname`。

use anyhow::{Context, Result};
use chrono::Utc;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use crate::core::aggregator::StatusCounts;
use crate::core::models::{ExecutionResult, ScenarioStatus};
use crate::infra::fs;

pub const SUITE_NAME: &str = "moltest";

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters other than tab/newline are not valid XML 1.0.
            c if c.is_control() && c != '\n' && c != '\t' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

pub fn render_junit(results: &[ExecutionResult], overall: Duration) -> String {
    let counts = StatusCounts::from_results(results);
    let skipped = counts.skipped + counts.xfailed;
    let failures = results.iter().filter(|r| r.is_failure()).count();

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    // Writing into a String cannot fail.
    let _ = writeln!(
        xml,
        "<testsuite name=\"{SUITE_NAME}\" tests=\"{}\" failures=\"{failures}\" errors=\"0\" skipped=\"{skipped}\" time=\"{:.3}\" timestamp=\"{}\">",
        counts.total,
        overall.as_secs_f64(),
        Utc::now().to_rfc3339()
    );

    for result in results {
        let (role, name) = result.role_and_name();
        let _ = write!(
            xml,
            "  <testcase classname=\"{}\" name=\"{}\" time=\"{:.3}\"",
            escape_xml(role),
            escape_xml(name),
            result.duration_secs().unwrap_or(0.0)
        );

        match result.status {
            ScenarioStatus::Skipped => xml.push_str(">\n    <skipped/>\n  </testcase>\n"),
            ScenarioStatus::Xfailed => {
                xml.push_str(">\n    <skipped message=\"xfail\"/>\n  </testcase>\n")
            }
            _ if result.is_failure() => {
                let message = result
                    .error_message
                    .clone()
                    .unwrap_or_else(|| format!("exit code {}", result.return_code));
                let _ = writeln!(
                    xml,
                    ">\n    <failure message=\"{}\">{}</failure>\n  </testcase>",
                    escape_xml(&message),
                    escape_xml(&result.output_lines.join("\n"))
                );
            }
            _ => xml.push_str("/>\n"),
        }
    }

    xml.push_str("</testsuite>\n");
    xml
}

pub fn write_junit_report(results: &[ExecutionResult], overall: Duration, path: &Path) -> Result<()> {
    let body = render_junit(results, overall);
    fs::ensure_parent_dir(path)?;
    fs::atomic_write(path, body.as_bytes())
        .with_context(|| format!("Failed to write JUnit XML report to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_junit_elements() {
        let results = vec![
            ExecutionResult {
                status: ScenarioStatus::Passed,
                ..ExecutionResult::skipped("web:default")
            },
            ExecutionResult {
                status: ScenarioStatus::Failed,
                return_code: 2,
                output_lines: vec!["TASK <fail>".into()],
                ..ExecutionResult::skipped("db:cluster")
            },
            ExecutionResult::skipped("smoke"),
            ExecutionResult {
                status: ScenarioStatus::Xfailed,
                ..ExecutionResult::skipped("web:flaky")
            },
        ];
        let xml = render_junit(&results, Duration::from_secs(1));

        assert!(xml.contains("tests=\"4\" failures=\"1\" errors=\"0\" skipped=\"2\""));
        assert!(xml.contains("<testcase classname=\"web\" name=\"default\" time=\"0.000\"/>"));
        assert!(xml.contains("<failure message=\"exit code 2\">TASK &lt;fail&gt;</failure>"));
        assert!(xml.contains("<testcase classname=\"unknown\" name=\"smoke\""));
        assert!(xml.contains("<skipped message=\"xfail\"/>"));
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_xml("a<b & \"c\"\u{1b}"), "a&lt;b &amp; &quot;c&quot;");
    }
}
