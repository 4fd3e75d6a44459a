//! # Lifecycle Hooks Module / 生命周期钩子模块
//!
//! Plugins observe a run through four hook points. The registry is owned by
//! the run invocation and passed in explicitly; hook errors and panics are
//! logged and never abort the run.
//!
//! 插件通过四个钩子点观察一次运行。注册表由本次运行持有并被显式传入；
//! 钩子失败只会被记录，绝不会中止运行。

use anyhow::Result;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::warn;

use crate::core::coordinator::panic_message;
use crate::core::models::ExecutionResult;

/// What a plugin is told before any scenario runs.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub root: PathBuf,
    pub selection: String,
    pub parallel: usize,
    pub fail_fast: bool,
    pub maxfail: usize,
    pub rerun_failed: bool,
}

/// A plugin. Every method has a no-op default so implementors only override
/// the points they care about.
pub trait LifecycleHook: Send + Sync {
    fn name(&self) -> &str;

    fn before_run(&self, _ctx: &RunContext) -> Result<()> {
        Ok(())
    }

    fn before_scenario(&self, _execution_id: &str) -> Result<()> {
        Ok(())
    }

    fn after_scenario(&self, _execution_id: &str, _status: &str) -> Result<()> {
        Ok(())
    }

    fn after_run(&self, _results: &[ExecutionResult]) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Box<dyn LifecycleHook>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: impl LifecycleHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    pub fn with(mut self, hook: impl LifecycleHook + 'static) -> Self {
        self.register(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn before_run(&self, ctx: &RunContext) {
        self.dispatch("before_run", |hook| hook.before_run(ctx));
    }

    pub fn before_scenario(&self, execution_id: &str) {
        self.dispatch("before_scenario", |hook| hook.before_scenario(execution_id));
    }

    pub fn after_scenario(&self, execution_id: &str, status: &str) {
        self.dispatch("after_scenario", |hook| hook.after_scenario(execution_id, status));
    }

    pub fn after_run(&self, results: &[ExecutionResult]) {
        self.dispatch("after_run", |hook| hook.after_run(results));
    }

    fn dispatch<F>(&self, point: &str, mut call: F)
    where
        F: FnMut(&dyn LifecycleHook) -> Result<()>,
    {
        for hook in &self.hooks {
            match panic::catch_unwind(AssertUnwindSafe(|| call(hook.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(hook = hook.name(), point, error = %e, "Plugin hook failed");
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(hook = hook.name(), point, error = %message, "Plugin hook panicked");
                }
            }
        }
    }
}
