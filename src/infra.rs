//! # Infrastructure Module / 基础设施模块
//!
//! Process spawning, file system helpers, the external tool check and
//! logging setup.
//!
//! 进程派生、文件系统辅助、外部工具检查以及日志初始化。

pub mod command;
pub mod deps;
pub mod fs;
pub mod logging;
