//! # Result Aggregation Module / 结果汇总模块
//!
//! Keeps the running list of results for one invocation and mirrors every
//! recorded outcome into the cache document.
//!
//! 保存一次调用的结果列表，并将每个记录的结果同步到缓存文档中。

use serde::Serialize;

use crate::core::cache::CacheDocument;
use crate::core::models::{ExecutionResult, ScenarioStatus};

/// Totals by status, as shown in summaries and reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Everything that is neither `passed` nor `failed`.
    pub other: usize,
    pub skipped: usize,
    pub xfailed: usize,
    pub xpassed: usize,
}

impl StatusCounts {
    pub fn from_results(results: &[ExecutionResult]) -> Self {
        let mut counts = StatusCounts {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                ScenarioStatus::Passed => counts.passed += 1,
                ScenarioStatus::Failed => counts.failed += 1,
                ScenarioStatus::Skipped => counts.skipped += 1,
                ScenarioStatus::Xfailed => counts.xfailed += 1,
                ScenarioStatus::Xpassed => counts.xpassed += 1,
                ScenarioStatus::Unknown => {}
            }
        }
        counts.other = counts.total - counts.passed - counts.failed;
        counts
    }
}

/// Ordered results of a run; one entry per dispatched or skipped record.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    results: Vec<ExecutionResult>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `result` and upserts its status into `cache`.
    pub fn record(&mut self, result: ExecutionResult, cache: &mut CacheDocument) {
        cache.update(&result.id, result.status);
        self.results.push(result);
    }

    pub fn results(&self) -> &[ExecutionResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ExecutionResult> {
        self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::from_results(&self.results)
    }

    /// `true` when any result is `failed` or carries a nonzero exit code.
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(ExecutionResult::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| r.is_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, status: ScenarioStatus, code: i32) -> ExecutionResult {
        ExecutionResult {
            status,
            return_code: code,
            ..ExecutionResult::skipped(id)
        }
    }

    #[test]
    fn record_updates_cache_and_list() {
        let mut cache = CacheDocument::default();
        let mut agg = ResultAggregator::new();
        agg.record(result("a", ScenarioStatus::Failed, 2), &mut cache);
        agg.record(result("b", ScenarioStatus::Passed, 0), &mut cache);

        assert_eq!(agg.len(), 2);
        assert_eq!(cache.status_of("a"), Some("failed"));
        assert_eq!(cache.status_of("b"), Some("passed"));
        assert!(agg.has_failures());
        assert_eq!(agg.failures().count(), 1);
    }

    #[test]
    fn counts_split_other_statuses() {
        let results = vec![
            result("a", ScenarioStatus::Passed, 0),
            result("b", ScenarioStatus::Failed, 1),
            result("c", ScenarioStatus::Xfailed, 0),
            result("d", ScenarioStatus::Skipped, 0),
            result("e", ScenarioStatus::Xpassed, 0),
        ];
        let counts = StatusCounts::from_results(&results);
        assert_eq!(counts.total, 5);
        assert_eq!(counts.passed, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.other, 3);
        assert_eq!(counts.xfailed, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.xpassed, 1);
    }

    #[test]
    fn xfailed_and_skipped_do_not_fail_the_run() {
        let mut cache = CacheDocument::default();
        let mut agg = ResultAggregator::new();
        agg.record(result("a", ScenarioStatus::Xfailed, 0), &mut cache);
        agg.record(ExecutionResult::skipped("b"), &mut cache);
        assert!(!agg.has_failures());
    }
}
