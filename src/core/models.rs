//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout moltest:
//! discovered scenarios, their parameter sets, the execution records derived
//! from them, and the results produced by running those records.
//!
//! 此模块定义了 moltest 中使用的核心数据结构：
//! 发现的场景、参数集、由其派生的执行记录以及运行这些记录产生的结果。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Identifier given to the implicit parameter set of a scenario that declares none.
pub const DEFAULT_PARAM_ID: &str = "default";

/// A named set of environment variables a scenario is run with.
/// 场景运行时使用的一组命名环境变量。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Unique within its scenario / 在其场景内唯一
    pub id: String,
    /// Environment variable overrides / 环境变量覆盖
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

impl ParameterSet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vars: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// The implicit parameter set used when a scenario declares none.
    pub fn implicit_default() -> Self {
        Self::new(DEFAULT_PARAM_ID)
    }
}

/// A scenario as produced by discovery.
/// 由发现阶段产生的场景描述。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    /// Globally unique id, `role:scenario` or just `scenario`.
    pub id: String,
    /// The scenario name handed to the external test command.
    pub scenario_name: String,
    /// The directory the external command is started in.
    pub execution_path: PathBuf,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Declared parameter sets. `None` means the scenario declared nothing.
    #[serde(default)]
    pub parameters: Option<Vec<ParameterSet>>,
}

impl ScenarioDescriptor {
    pub fn new(
        id: impl Into<String>,
        scenario_name: impl Into<String>,
        execution_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            scenario_name: scenario_name.into(),
            execution_path: execution_path.into(),
            tags: BTreeSet::new(),
            parameters: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<ParameterSet>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Tags of this scenario that also appear in `other`, in sorted order.
    pub fn matching_tags<'a>(&'a self, other: &'a BTreeSet<String>) -> Vec<&'a str> {
        self.tags.intersection(other).map(String::as_str).collect()
    }
}

/// One concrete (scenario, parameter set) pairing to be executed.
/// 一个待执行的具体（场景，参数集）组合。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    /// `scenario_id` or `scenario_id[param_id]`.
    pub id: String,
    pub scenario_name: String,
    pub execution_path: PathBuf,
    pub vars: BTreeMap<String, String>,
    /// `true` when the scenario is expected to fail.
    /// 当场景预期失败时为 `true`。
    pub is_xfail: bool,
}

/// Final status of a single execution record.
/// 单个执行记录的最终状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    /// Expected failure that did fail.
    Xfailed,
    /// Expected failure that passed anyway.
    Xpassed,
    Skipped,
    Unknown,
}

impl ScenarioStatus {
    pub const ALL: [ScenarioStatus; 6] = [
        ScenarioStatus::Passed,
        ScenarioStatus::Failed,
        ScenarioStatus::Xfailed,
        ScenarioStatus::Xpassed,
        ScenarioStatus::Skipped,
        ScenarioStatus::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioStatus::Passed => "passed",
            ScenarioStatus::Failed => "failed",
            ScenarioStatus::Xfailed => "xfailed",
            ScenarioStatus::Xpassed => "xpassed",
            ScenarioStatus::Skipped => "skipped",
            ScenarioStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        ScenarioStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == lowered)
            .ok_or_else(|| format!("unknown scenario status '{s}'"))
    }
}

/// The outcome of one execution record, whether it ran or was skipped.
/// 一个执行记录的结果，无论它是运行了还是被跳过。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub id: String,
    pub status: ScenarioStatus,
    /// Wall-clock time of the subprocess. `None` when it never ran.
    #[serde(serialize_with = "serialize_duration_secs")]
    pub duration: Option<Duration>,
    /// Reported exit code, after xfail normalisation.
    pub return_code: i32,
    pub output_lines: Vec<String>,
    pub error_message: Option<String>,
}

impl ExecutionResult {
    /// A result for a record that was never executed.
    pub fn skipped(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ScenarioStatus::Skipped,
            duration: None,
            return_code: 0,
            output_lines: Vec::new(),
            error_message: None,
        }
    }

    /// A failed result for a record whose execution could not complete normally.
    pub fn errored(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: ScenarioStatus::Failed,
            duration: None,
            return_code: -1,
            output_lines: Vec::new(),
            error_message: Some(message.into()),
        }
    }

    /// Whether this result counts toward the failure total.
    /// `xfailed` and `skipped` never do.
    ///
    /// 此结果是否计入失败总数。`xfailed` 和 `skipped` 永远不计入。
    pub fn is_failure(&self) -> bool {
        self.status == ScenarioStatus::Failed || self.return_code != 0
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration.map(|d| d.as_secs_f64())
    }

    /// Splits the id into `(role, scenario)`, using `unknown` for a missing role.
    pub fn role_and_name(&self) -> (&str, &str) {
        self.id.split_once(':').unwrap_or(("unknown", self.id.as_str()))
    }
}

fn serialize_duration_secs<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match duration {
        Some(d) => serializer.serialize_some(&d.as_secs_f64()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in ScenarioStatus::ALL {
            assert_eq!(status.as_str().parse::<ScenarioStatus>().unwrap(), status);
        }
        assert_eq!("PASSED".parse::<ScenarioStatus>().unwrap(), ScenarioStatus::Passed);
        assert!("flaky".parse::<ScenarioStatus>().is_err());
    }

    #[test]
    fn failure_counting_ignores_xfailed_and_skipped() {
        let mut result = ExecutionResult::skipped("a");
        assert!(!result.is_failure());
        result.status = ScenarioStatus::Xfailed;
        assert!(!result.is_failure());
        result.status = ScenarioStatus::Failed;
        assert!(result.is_failure());
        result.status = ScenarioStatus::Xpassed;
        result.return_code = 3;
        assert!(result.is_failure());
    }

    #[test]
    fn role_and_name_split_on_first_colon() {
        let result = ExecutionResult::skipped("web:default[set1]");
        assert_eq!(result.role_and_name(), ("web", "default[set1]"));
        let result = ExecutionResult::skipped("default");
        assert_eq!(result.role_and_name(), ("unknown", "default"));
    }

    #[test]
    fn result_serializes_duration_as_seconds() {
        let mut result = ExecutionResult::skipped("a");
        result.duration = Some(Duration::from_millis(1500));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration"], serde_json::json!(1.5));
        assert_eq!(json["status"], "skipped");
    }
}
