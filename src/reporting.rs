//! # Reporting Module / 报告模块
//!
//! Console output during and after a run, plus the optional JSON, Markdown
//! and JUnit XML report files.
//!
//! 运行期间和运行结束后的控制台输出，以及可选的 JSON、Markdown 和 JUnit XML 报告文件。

pub mod console;
pub mod json;
pub mod junit;
pub mod markdown;

pub use console::{print_failure_details, print_summary};
pub use json::write_json_report;
pub use junit::write_junit_report;
pub use markdown::write_markdown_report;
