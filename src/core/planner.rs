//! # Execution Planner Module / 执行计划模块
//!
//! Turns the full list of discovered scenarios into the ordered work list for
//! a run. Filters are applied in a fixed order: explicit selection, `-k`
//! expression, rerun-failed, parameter expansion, then tag skip / xfail
//! marking.
//!
//! 将发现的所有场景转换为本次运行的有序工作列表。
//! 过滤器按固定顺序应用：显式选择、`-k` 表达式、重跑失败、参数展开，最后是标签跳过 / xfail 标记。

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::cache::CacheDocument;
use crate::core::expression::IdMatcher;
use crate::core::models::{ExecutionRecord, ParameterSet, ScenarioDescriptor};

/// Which scenarios the user asked for with `--scenario`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScenarioSelection {
    #[default]
    All,
    Ids(BTreeSet<String>),
}

impl ScenarioSelection {
    /// Parses `all` (any case) or a comma-separated id list.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("all") {
            return ScenarioSelection::All;
        }
        let ids: BTreeSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect();
        if ids.is_empty() {
            ScenarioSelection::All
        } else {
            ScenarioSelection::Ids(ids)
        }
    }
}

/// All knobs that influence selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionOptions {
    pub selection: ScenarioSelection,
    pub id_expression: Option<String>,
    pub skip_tags: BTreeSet<String>,
    pub xfail_tags: BTreeSet<String>,
    pub rerun_failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no scenarios were discovered")]
    NoScenarios,
    #[error(
        "none of the requested scenarios ({}) were found among the discovered scenarios ({})",
        .requested.iter().cloned().collect::<Vec<_>>().join(", "),
        .discovered.join(", ")
    )]
    NoMatch {
        requested: BTreeSet<String>,
        discovered: Vec<String>,
    },
}

/// How the rerun-failed filter affected the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerunOutcome {
    NotRequested,
    /// The cache holds no failures at all.
    NoFailuresCached,
    /// Failures exist, but none of them are in the current selection.
    NoOverlap { cached_failures: usize },
    Selected { cached_failures: usize, selected: usize },
}

/// An expansion that was excluded by a skip tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSkip {
    pub id: String,
    pub matched_tags: Vec<String>,
}

/// The outcome of planning.
/// 计划的结果。
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Scenarios left after selection, `-k` and rerun-failed (before expansion).
    pub targeted: Vec<String>,
    /// Records to execute, in dispatch order.
    pub records: Vec<ExecutionRecord>,
    /// Expansions excluded by a skip tag, in expansion order.
    pub tag_skipped: Vec<TagSkip>,
    pub rerun: RerunOutcome,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.tag_skipped.is_empty()
    }

    pub fn xfail_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_xfail).count()
    }
}

/// Builds the execution plan from the discovered scenarios.
///
/// `discovered` is expected to be sorted by id; its order is preserved.
///
/// # Errors
/// [`SelectionError::NoScenarios`] when nothing was discovered and
/// [`SelectionError::NoMatch`] when an explicit selection matched no
/// discovered id.
///
/// 根据发现的场景构建执行计划。`discovered` 应已按 ID 排序，其顺序会被保留。
pub fn plan_execution(
    discovered: &[ScenarioDescriptor],
    options: &SelectionOptions,
    cache: &CacheDocument,
) -> Result<ExecutionPlan, SelectionError> {
    if discovered.is_empty() {
        return Err(SelectionError::NoScenarios);
    }

    let mut targeted = select_base(discovered, &options.selection)?;

    if let Some(expr) = options.id_expression.as_deref() {
        let matcher = IdMatcher::compile(expr);
        targeted.retain(|s| matcher.matches(&s.id));
        debug!(expression = expr, remaining = targeted.len(), "Applied -k expression");
    }

    let rerun = if options.rerun_failed {
        let failed = cache.failed_ids();
        if failed.is_empty() {
            info!("No failed scenarios found in cache, nothing will be rerun");
            targeted.clear();
            RerunOutcome::NoFailuresCached
        } else {
            targeted.retain(|s| failed.contains(&s.id));
            if targeted.is_empty() {
                info!(
                    cached_failures = failed.len(),
                    "None of the targeted scenarios failed previously"
                );
                RerunOutcome::NoOverlap {
                    cached_failures: failed.len(),
                }
            } else {
                RerunOutcome::Selected {
                    cached_failures: failed.len(),
                    selected: targeted.len(),
                }
            }
        }
    } else {
        RerunOutcome::NotRequested
    };

    let mut records = Vec::new();
    let mut tag_skipped = Vec::new();

    for scenario in &targeted {
        let skip_matches = scenario.matching_tags(&options.skip_tags);
        let is_xfail = !scenario.matching_tags(&options.xfail_tags).is_empty();

        for (id, params) in expand_parameters(scenario) {
            if !skip_matches.is_empty() {
                tag_skipped.push(TagSkip {
                    id,
                    matched_tags: skip_matches.iter().map(|t| t.to_string()).collect(),
                });
                continue;
            }
            records.push(ExecutionRecord {
                id,
                scenario_name: scenario.scenario_name.clone(),
                execution_path: scenario.execution_path.clone(),
                vars: params.vars,
                is_xfail,
            });
        }
    }

    Ok(ExecutionPlan {
        targeted: targeted.iter().map(|s| s.id.clone()).collect(),
        records,
        tag_skipped,
        rerun,
    })
}

fn select_base<'a>(
    discovered: &'a [ScenarioDescriptor],
    selection: &ScenarioSelection,
) -> Result<Vec<&'a ScenarioDescriptor>, SelectionError> {
    match selection {
        ScenarioSelection::All => Ok(discovered.iter().collect()),
        ScenarioSelection::Ids(requested) => {
            let selected: Vec<_> = discovered
                .iter()
                .filter(|s| requested.contains(&s.id))
                .collect();
            if selected.is_empty() {
                return Err(SelectionError::NoMatch {
                    requested: requested.clone(),
                    discovered: discovered.iter().map(|s| s.id.clone()).collect(),
                });
            }
            Ok(selected)
        }
    }
}

/// Expands a scenario into `(execution id, parameter set)` pairs.
///
/// A scenario without declared parameters yields its bare id with the implicit
/// `default` set; declared sets always yield `scenario_id[param_id]`.
///
/// 将场景展开为（执行 ID，参数集）对。
pub fn expand_parameters(scenario: &ScenarioDescriptor) -> Vec<(String, ParameterSet)> {
    match scenario.parameters.as_deref() {
        None | Some([]) => vec![(scenario.id.clone(), ParameterSet::implicit_default())],
        Some(sets) => sets
            .iter()
            .enumerate()
            .map(|(idx, set)| {
                let param_id = if set.id.is_empty() {
                    idx.to_string()
                } else {
                    set.id.clone()
                };
                (format!("{}[{}]", scenario.id, param_id), set.clone())
            })
            .collect(),
    }
}
