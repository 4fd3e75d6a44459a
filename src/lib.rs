//! # Moltest Library / Moltest 库
//!
//! Parallel runner for Ansible Molecule scenarios: discovery, selection with
//! tag and expression filters, rerun of cached failures, bounded parallel
//! execution with early termination, and console/JSON/Markdown/JUnit reports.
//!
//! Ansible Molecule 场景的并行运行器：发现、基于标签和表达式的选择、重跑缓存中的失败场景、
//! 带提前终止的有界并行执行，以及控制台/JSON/Markdown/JUnit 报告。
//!
//! ## Modules / 模块
//!
//! - `core` - Scenario models, selection, cache and the execution engine
//! - `infra` - Process spawning, file system helpers, dependency check, logging
//! - `reporting` - Console output and report files
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 场景模型、选择、缓存和执行引擎
//! - `infra` - 进程派生、文件系统辅助、依赖检查、日志
//! - `reporting` - 控制台输出和报告文件
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use crate::core::cache;
pub use crate::core::models;
pub use crate::core::planner;
