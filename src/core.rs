//! # Core Module / 核心模块
//!
//! Domain logic of moltest: scenario models, discovery, selection, the
//! result cache, execution and the concurrency coordinator.
//!
//! moltest 的领域逻辑：场景模型、发现、选择、结果缓存、执行以及并发协调器。

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod execution;
pub mod expression;
pub mod hooks;
pub mod models;
pub mod planner;

// Re-exports
pub use models::{ExecutionRecord, ExecutionResult, ScenarioDescriptor, ScenarioStatus};
