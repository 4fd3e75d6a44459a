//! # Scenario Execution Module / 场景执行模块
//!
//! Runs a single execution record as an external subprocess and maps its
//! exit code, together with the record's xfail flag, to a result status.
//!
//! 将单个执行记录作为外部子进程运行，并根据其退出码和 xfail 标志映射出结果状态。

use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::models::{ExecutionRecord, ExecutionResult, ScenarioStatus};
use crate::infra::command;

/// Environment variable carrying the resolved roles directory.
pub const ROLES_PATH_ENV: &str = "ANSIBLE_ROLES_PATH";

/// The external test command, `{scenario}` is replaced by the scenario name
/// and `{id}` by the execution id.
pub const DEFAULT_COMMAND: &str = "molecule test -s {scenario}";

/// Anything that can turn an execution record into a result.
///
/// Implementations must not fail: every error is folded into the returned
/// [`ExecutionResult`] so that one bad record cannot abort the batch.
///
/// 任何可以将执行记录转换为结果的类型。实现不得失败：所有错误都会被折叠进返回的结果中。
pub trait ScenarioExecutor: Send + Sync + 'static {
    fn execute(&self, record: ExecutionRecord) -> BoxFuture<'static, ExecutionResult>;
}

/// How subprocess output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Output is collected silently and only kept on the result.
    #[default]
    Buffered,
    /// Every line is also forwarded to the output channel as it arrives.
    Streaming,
}

/// A single line of subprocess output, tagged with its execution id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub id: String,
    pub line: String,
}

/// Maps a raw exit code and the xfail flag to `(status, reported exit code)`.
///
/// | raw | xfail | status  | reported |
/// |-----|-------|---------|----------|
/// | 0   | no    | passed  | 0        |
/// | ≠0  | no    | failed  | raw      |
/// | ≠0  | yes   | xfailed | 0        |
/// | 0   | yes   | xpassed | 0        |
///
/// 将原始退出码和 xfail 标志映射为（状态，报告的退出码）。
pub fn map_exit_status(raw_exit_code: i32, is_xfail: bool) -> (ScenarioStatus, i32) {
    match (raw_exit_code == 0, is_xfail) {
        (true, false) => (ScenarioStatus::Passed, 0),
        (false, false) => (ScenarioStatus::Failed, raw_exit_code),
        (false, true) => (ScenarioStatus::Xfailed, 0),
        (true, true) => (ScenarioStatus::Xpassed, raw_exit_code),
    }
}

#[derive(Debug, Clone)]
struct ExecutorSettings {
    command: Vec<String>,
    base_env: BTreeMap<String, String>,
    roles_path: Option<PathBuf>,
    mode: CaptureMode,
    output_tx: Option<mpsc::UnboundedSender<OutputLine>>,
}

/// Runs records through an external command such as `molecule test -s <name>`.
/// 通过外部命令（如 `molecule test -s <name>`）运行执行记录。
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    settings: Arc<ExecutorSettings>,
}

impl CommandExecutor {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            settings: Arc::new(ExecutorSettings {
                command,
                base_env: BTreeMap::new(),
                roles_path: None,
                mode: CaptureMode::Buffered,
                output_tx: None,
            }),
        }
    }

    /// Builds an executor from a shell-like command template.
    pub fn from_template(template: &str) -> Result<Self> {
        let parts = shlex::split(template)
            .ok_or_else(|| anyhow!("Failed to parse command: {template}"))?;
        if parts.is_empty() {
            return Err(anyhow!("Empty command after parsing."));
        }
        Ok(Self::new(parts))
    }

    fn settings_mut(&mut self) -> &mut ExecutorSettings {
        Arc::make_mut(&mut self.settings)
    }

    /// Environment applied to every scenario, before the record's own variables.
    pub fn with_base_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.settings_mut().base_env = env;
        self
    }

    pub fn with_roles_path(mut self, path: PathBuf) -> Self {
        self.settings_mut().roles_path = Some(path);
        self
    }

    /// Switches to streaming capture; lines are sent to `tx` as they arrive.
    pub fn streaming(mut self, tx: mpsc::UnboundedSender<OutputLine>) -> Self {
        let settings = self.settings_mut();
        settings.mode = CaptureMode::Streaming;
        settings.output_tx = Some(tx);
        self
    }

    pub fn mode(&self) -> CaptureMode {
        self.settings.mode
    }

    pub fn program(&self) -> &str {
        self.settings
            .command
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl ScenarioExecutor for CommandExecutor {
    fn execute(&self, record: ExecutionRecord) -> BoxFuture<'static, ExecutionResult> {
        let settings = Arc::clone(&self.settings);
        Box::pin(run_record(settings, record))
    }
}

impl ExecutorSettings {
    fn render_command(&self, record: &ExecutionRecord) -> Vec<String> {
        self.command
            .iter()
            .map(|part| {
                part.replace("{scenario}", &record.scenario_name)
                    .replace("{id}", &record.id)
            })
            .collect()
    }
}

async fn run_record(settings: Arc<ExecutorSettings>, record: ExecutionRecord) -> ExecutionResult {
    let argv = settings.render_command(&record);
    let Some((program, args)) = argv.split_first() else {
        return ExecutionResult::errored(&record.id, "No test command configured.");
    };

    if !record.execution_path.is_dir() {
        return ExecutionResult::errored(
            &record.id,
            format!(
                "Execution directory '{}' does not exist.",
                record.execution_path.display()
            ),
        );
    }

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .current_dir(&record.execution_path)
        .envs(&settings.base_env)
        .kill_on_drop(true);
    if let Some(roles_path) = &settings.roles_path {
        cmd.env(ROLES_PATH_ENV, roles_path);
    }
    cmd.envs(&record.vars);

    debug!(id = %record.id, command = %argv.join(" "), dir = %record.execution_path.display(), "Spawning scenario");

    let forward = match (settings.mode, &settings.output_tx) {
        (CaptureMode::Streaming, Some(tx)) => Some(tx.clone()),
        _ => None,
    };
    let id_for_lines = record.id.clone();
    let on_line = move |line: &str| {
        if let Some(tx) = &forward {
            // The receiver only goes away at shutdown; dropped lines are fine then.
            let _ = tx.send(OutputLine {
                id: id_for_lines.clone(),
                line: line.to_string(),
            });
        }
    };

    let start_time = Instant::now();
    match command::spawn_and_capture(cmd, on_line).await {
        Ok(captured) => {
            let duration = start_time.elapsed();
            let raw_exit_code = captured.exit_code();
            let (status, return_code) = map_exit_status(raw_exit_code, record.is_xfail);
            debug!(id = %record.id, raw_exit_code, %status, "Scenario finished");
            ExecutionResult {
                id: record.id,
                status,
                duration: Some(duration),
                return_code,
                output_lines: captured.lines,
                error_message: None,
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(id = %record.id, program = %program, "Test command not found");
            ExecutionResult::errored(
                record.id,
                format!("{program} command not found. Is it installed and in PATH?"),
            )
        }
        Err(e) => {
            warn!(id = %record.id, error = %e, "Scenario could not be executed");
            ExecutionResult::errored(record.id, format!("Error during execution: {e}"))
        }
    }
}
