//! # Concurrency Coordinator Module / 并发协调模块
//!
//! Drives execution records through a bounded pool of workers.
//!
//! Workers only run the executor and hand their result back over a channel;
//! every mutation of the result list and the cache document happens here, on
//! the coordinator's own task, so no locking is needed around them.
//!
//! When an early-termination policy fires (fail-fast, maxfail or an external
//! stop signal), in-flight workers are aborted without being awaited and every
//! record that has not completed is accounted for as `skipped`.
//!
//! 通过有界的工作池驱动执行记录。工作者只负责运行执行器并通过通道返回结果；
//! 结果列表和缓存文档的所有修改都在协调器自己的任务中完成。

use futures::FutureExt;
use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::aggregator::ResultAggregator;
use crate::core::cache::CacheDocument;
use crate::core::execution::ScenarioExecutor;
use crate::core::hooks::HookRegistry;
use crate::core::models::{ExecutionRecord, ExecutionResult};
use crate::reporting::console;

/// Early-termination settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminationPolicy {
    pub fail_fast: bool,
    /// `0` means unlimited.
    pub maxfail: usize,
}

/// Why a run stopped before draining its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    FailFast,
    MaxFail(usize),
    Interrupted,
}

impl TerminationPolicy {
    /// Decides whether the run must stop after `result` completed, given the
    /// cumulative failure count including `result`.
    pub fn check(&self, result: &ExecutionResult, failures: usize) -> Option<StopReason> {
        if self.fail_fast && result.is_failure() {
            return Some(StopReason::FailFast);
        }
        if self.maxfail > 0 && failures >= self.maxfail {
            return Some(StopReason::MaxFail(failures));
        }
        None
    }
}

/// Mutable state a run reports into. Owned by the invocation.
pub struct RunLedger<'a> {
    pub results: &'a mut ResultAggregator,
    pub cache: &'a mut CacheDocument,
    pub hooks: &'a HookRegistry,
}

impl RunLedger<'_> {
    /// Records a finished result: aggregator, cache, then the `after_scenario` hook.
    pub fn complete(&mut self, result: ExecutionResult) {
        let id = result.id.clone();
        let status = result.status;
        self.results.record(result, self.cache);
        self.hooks.after_scenario(&id, status.as_str());
    }

    /// Records a record that never ran.
    pub fn skip(&mut self, id: &str) {
        self.complete(ExecutionResult::skipped(id));
    }
}

/// Summary of one coordinator pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorReport {
    pub executed: usize,
    pub cancelled: usize,
    pub failures: usize,
    pub stop_reason: Option<StopReason>,
}

struct InFlight {
    id: String,
    handle: JoinHandle<()>,
}

/// Bounded worker pool scheduler.
/// 有界工作池调度器。
pub struct Coordinator {
    executor: Arc<dyn ScenarioExecutor>,
    parallel: usize,
    policy: TerminationPolicy,
    console: bool,
    verbose: u8,
}

impl Coordinator {
    pub fn new(executor: Arc<dyn ScenarioExecutor>, parallel: usize, policy: TerminationPolicy) -> Self {
        Self {
            executor,
            parallel: parallel.max(1),
            policy,
            console: false,
            verbose: 0,
        }
    }

    /// Prints start and result lines for every record.
    pub fn with_console(mut self, verbose: u8) -> Self {
        self.console = true;
        self.verbose = verbose;
        self
    }

    pub fn parallel(&self) -> usize {
        self.parallel
    }

    /// Runs `records` to completion or until early termination.
    ///
    /// Dispatch follows the order of `records`; completions are handled in the
    /// order they finish. Every record produces exactly one result in `ledger`.
    ///
    /// 运行 `records` 直到完成或提前终止。分派顺序与 `records` 一致；
    /// 完成事件按结束顺序处理。每条记录都会在 `ledger` 中产生且仅产生一个结果。
    pub async fn run(
        &self,
        records: Vec<ExecutionRecord>,
        ledger: &mut RunLedger<'_>,
        stop: &CancellationToken,
    ) -> CoordinatorReport {
        let (tx, mut rx) = mpsc::unbounded_channel::<(u64, ExecutionResult)>();
        let mut pending: VecDeque<ExecutionRecord> = records.into();
        // Keyed by dispatch sequence so cancellation walks in dispatch order.
        let mut in_flight: BTreeMap<u64, InFlight> = BTreeMap::new();
        let mut next_seq = 0u64;

        let mut executed = 0;
        let mut failures = 0;
        let mut stop_reason = None;

        self.fill_slots(&mut pending, &mut in_flight, &mut next_seq, &tx, ledger, stop);

        while !in_flight.is_empty() {
            let received = tokio::select! {
                biased;
                _ = stop.cancelled() => None,
                message = rx.recv() => message,
            };

            let Some((seq, result)) = received else {
                info!("Stop requested, cancelling remaining scenarios");
                stop_reason = Some(StopReason::Interrupted);
                break;
            };

            if in_flight.remove(&seq).is_none() {
                debug!(seq, "Result for unknown worker ignored");
                continue;
            }
            executed += 1;

            if self.console {
                console::print_scenario_result(&result, self.verbose);
            }
            if result.is_failure() {
                failures += 1;
            }
            let decision = self.policy.check(&result, failures);
            ledger.complete(result);

            if let Some(reason) = decision {
                warn!(failures, ?reason, "Early termination triggered");
                if self.console {
                    console::print_early_termination(failures);
                }
                stop_reason = Some(reason);
                break;
            }

            self.fill_slots(&mut pending, &mut in_flight, &mut next_seq, &tx, ledger, stop);
        }

        // A stop that lands between completions leaves records undispatched.
        if stop_reason.is_none() && stop.is_cancelled() && !pending.is_empty() {
            stop_reason = Some(StopReason::Interrupted);
        }

        let mut cancelled = 0;
        if stop_reason.is_some() {
            for (_, slot) in std::mem::take(&mut in_flight) {
                // Aborting drops the child process handle, which kills it.
                slot.handle.abort();
                self.skip(ledger, &slot.id);
                cancelled += 1;
            }
            for record in pending.drain(..) {
                self.skip(ledger, &record.id);
                cancelled += 1;
            }
        }

        CoordinatorReport {
            executed,
            cancelled,
            failures,
            stop_reason,
        }
    }

    fn skip(&self, ledger: &mut RunLedger<'_>, id: &str) {
        if self.console {
            console::print_scenario_result(&ExecutionResult::skipped(id), self.verbose);
        }
        ledger.skip(id);
    }

    fn fill_slots(
        &self,
        pending: &mut VecDeque<ExecutionRecord>,
        in_flight: &mut BTreeMap<u64, InFlight>,
        next_seq: &mut u64,
        tx: &mpsc::UnboundedSender<(u64, ExecutionResult)>,
        ledger: &mut RunLedger<'_>,
        stop: &CancellationToken,
    ) {
        while in_flight.len() < self.parallel && !stop.is_cancelled() {
            let Some(record) = pending.pop_front() else {
                break;
            };
            let seq = *next_seq;
            *next_seq += 1;

            ledger.hooks.before_scenario(&record.id);
            if self.console {
                console::print_scenario_start(&record.id);
            }

            let id = record.id.clone();
            let handle = self.spawn_worker(seq, record, tx.clone());
            in_flight.insert(seq, InFlight { id, handle });
        }
    }

    fn spawn_worker(
        &self,
        seq: u64,
        record: ExecutionRecord,
        tx: mpsc::UnboundedSender<(u64, ExecutionResult)>,
    ) -> JoinHandle<()> {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            let id = record.id.clone();
            let result = AssertUnwindSafe(executor.execute(record))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    ExecutionResult::errored(
                        id,
                        format!("Executor panicked: {}", panic_message(panic.as_ref())),
                    )
                });
            // The coordinator holds the receiver until every worker is accounted for.
            let _ = tx.send((seq, result));
        })
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ScenarioStatus;

    #[test]
    fn fail_fast_ignores_non_failures() {
        let policy = TerminationPolicy {
            fail_fast: true,
            maxfail: 0,
        };
        let mut result = ExecutionResult::skipped("a");
        assert_eq!(policy.check(&result, 0), None);
        result.status = ScenarioStatus::Xfailed;
        assert_eq!(policy.check(&result, 0), None);
        result.status = ScenarioStatus::Failed;
        assert_eq!(policy.check(&result, 1), Some(StopReason::FailFast));
    }

    #[test]
    fn maxfail_threshold() {
        let policy = TerminationPolicy {
            fail_fast: false,
            maxfail: 2,
        };
        let failed = ExecutionResult::errored("a", "x");
        assert_eq!(policy.check(&failed, 1), None);
        assert_eq!(policy.check(&failed, 2), Some(StopReason::MaxFail(2)));
        assert_eq!(TerminationPolicy::default().check(&failed, 100), None);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(5u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
