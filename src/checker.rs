//! src/checker.rs
//!
//! Work queue and orchestrator: the `WorkQueue` priority queue workers
//! pull from, and `HyperlinkAvailabilityChecker`, which owns the worker pool
//! and drives one full checking run from a list of hyperlinks to a stream of
//! `CheckResult`s.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use reqwest::Client;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::classifier::{self, Classification};
use crate::config::Config;
use crate::hyperlink::{CheckRequest, CheckResult, Hyperlink, QueueEntry, Status, CHECK_IMMEDIATELY};
use crate::rate_limit::RateLimitTable;
use crate::worker;

/// A priority queue of `CheckRequest`s ordered by `next_check`, with
/// `join()`/`task_done()` semantics (push increments a pending counter,
/// `task_done` decrements it, `join` waits for it to hit zero) — used by
/// the orchestrator to know when every
/// enqueued hyperlink (including ones re-enqueued after a rate-limit
/// back-off) has finally produced a result or been shut down.
#[derive(Clone)]
pub struct WorkQueue {
    heap: Arc<Mutex<BinaryHeap<Reverse<QueueEntry>>>>,
    not_empty: Arc<Notify>,
    pending: Arc<AtomicU64>,
    drained: Arc<Notify>,
    sequence: Arc<AtomicU64>,
}

impl WorkQueue {
    pub fn new() -> Self {
        WorkQueue {
            heap: Arc::new(Mutex::new(BinaryHeap::new())),
            not_empty: Arc::new(Notify::new()),
            pending: Arc::new(AtomicU64::new(0)),
            drained: Arc::new(Notify::new()),
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push a new request onto the queue, incrementing the pending count.
    pub fn push(&self, request: CheckRequest) {
        let sequence = self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
        let entry = QueueEntry::new(request, sequence);
        {
            let mut heap = self.heap.lock().expect("work queue poisoned");
            heap.push(Reverse(entry));
        }
        self.pending.fetch_add(1, AtomicOrdering::SeqCst);
        self.not_empty.notify_one();
    }

    /// Pop the lowest-`next_check` request, waiting if the queue is
    /// momentarily empty.
    pub async fn pop(&self) -> CheckRequest {
        loop {
            {
                let mut heap = self.heap.lock().expect("work queue poisoned");
                if let Some(Reverse(entry)) = heap.pop() {
                    return entry.request;
                }
            }
            self.not_empty.notified().await;
        }
    }

    /// Mark one previously-popped item as fully processed. Once the pending
    /// count reaches zero, any in-flight `join()` call wakes up.
    pub fn task_done(&self) {
        if self.pending.fetch_sub(1, AtomicOrdering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }

    /// Wait until every pushed item has had a matching `task_done()` call.
    pub async fn join(&self) {
        loop {
            if self.pending.load(AtomicOrdering::SeqCst) == 0 {
                return;
            }
            self.drained.notified().await;
        }
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        WorkQueue::new()
    }
}

/// Owns the worker pool and drives one checking run end to end: classifies
/// and enqueues every hyperlink, spawns `config.workers` worker tasks,
/// streams results back out, then shuts the pool down.
pub struct HyperlinkAvailabilityChecker {
    client: Client,
    config: Arc<Config>,
    rate_limits: RateLimitTable,
}

impl HyperlinkAvailabilityChecker {
    pub fn new(client: Client, config: Config) -> Self {
        HyperlinkAvailabilityChecker { client, config: Arc::new(config), rate_limits: RateLimitTable::new() }
    }

    /// Check every hyperlink in `hyperlinks`, returning every `CheckResult`
    /// once the whole run completes.
    ///
    /// `process_uri` is an optional rewrite hook applied to each URI before
    /// classification (e.g. to substitute an environment-specific base URL);
    /// returning `None` drops the hyperlink entirely.
    pub async fn check(
        &self,
        hyperlinks: Vec<Hyperlink>,
        process_uri: Option<&(dyn Fn(&str) -> Option<String> + Sync)>,
    ) -> Vec<CheckResult> {
        let work_queue = WorkQueue::new();
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<CheckResult>();

        let mut total = 0u64;
        let mut results = Vec::new();

        for mut hyperlink in hyperlinks {
            if let Some(rewrite) = process_uri {
                match rewrite(&hyperlink.uri) {
                    Some(rewritten) => hyperlink.uri = rewritten,
                    None => continue,
                }
            }

            // Pre-flight ignore check, before the per-URI classifier runs at
            // all: a `linkcheck_ignore` match never touches the network and
            // never reaches the work queue.
            if self.config.ignore.iter().any(|re| re.is_match(&hyperlink.uri)) {
                results.push(CheckResult {
                    uri: hyperlink.uri,
                    docname: hyperlink.docname,
                    lineno: hyperlink.lineno,
                    status: Status::Ignored,
                    message: String::new(),
                    code: 0,
                });
                continue;
            }

            match classifier::classify(&hyperlink, &self.config) {
                Classification::Terminal(status, message, code) => {
                    results.push(CheckResult {
                        uri: hyperlink.uri,
                        docname: hyperlink.docname,
                        lineno: hyperlink.lineno,
                        status,
                        message,
                        code,
                    });
                }
                Classification::Probe => {
                    total += 1;
                    work_queue.push(CheckRequest {
                        next_check: CHECK_IMMEDIATELY,
                        hyperlink: Some(hyperlink),
                    });
                }
            }
        }

        if total == 0 {
            return results;
        }

        let workers = self.spawn_workers(work_queue.clone(), result_tx);

        let mut received = 0u64;
        while received < total {
            match result_rx.recv().await {
                Some(result) => {
                    received += 1;
                    results.push(result);
                }
                None => break,
            }
        }

        self.shutdown(work_queue, workers).await;
        results
    }

    fn spawn_workers(
        &self,
        work_queue: WorkQueue,
        result_tx: mpsc::UnboundedSender<CheckResult>,
    ) -> Vec<JoinHandle<()>> {
        (0..self.config.workers.max(1))
            .map(|_| {
                tokio::spawn(worker::run_worker(
                    self.client.clone(),
                    Arc::clone(&self.config),
                    self.rate_limits.clone(),
                    work_queue.clone(),
                    result_tx.clone(),
                ))
            })
            .collect()
    }

    async fn shutdown(&self, work_queue: WorkQueue, workers: Vec<JoinHandle<()>>) {
        work_queue.join().await;
        for _ in &workers {
            work_queue.push(CheckRequest { next_check: CHECK_IMMEDIATELY, hyperlink: None });
        }
        for handle in workers {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use std::path::PathBuf;

    #[tokio::test]
    async fn queue_orders_by_next_check_then_fifo() {
        let q = WorkQueue::new();
        q.push(CheckRequest { next_check: 50, hyperlink: None });
        q.push(CheckRequest { next_check: 10, hyperlink: None });
        q.push(CheckRequest { next_check: 10, hyperlink: None });

        let first = q.pop().await;
        assert_eq!(first.next_check, 10);
        let second = q.pop().await;
        assert_eq!(second.next_check, 10);
        let third = q.pop().await;
        assert_eq!(third.next_check, 50);
    }

    #[tokio::test]
    async fn join_waits_for_task_done() {
        let q = WorkQueue::new();
        q.push(CheckRequest { next_check: 0, hyperlink: None });

        let q2 = q.clone();
        let joined = tokio::spawn(async move {
            q2.join().await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!joined.is_finished());

        let _ = q.pop().await;
        q.task_done();

        tokio::time::timeout(std::time::Duration::from_secs(1), joined)
            .await
            .expect("join() should complete promptly after task_done()")
            .unwrap();
    }

    #[tokio::test]
    async fn ignored_uri_is_reported_with_no_network_attempt() {
        let mut raw = RawConfig::default();
        raw.ignore = Some(vec!["^http://bad\\.invalid/".to_string()]);
        let config = raw.resolve().unwrap();

        let client = Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap();
        let checker = HyperlinkAvailabilityChecker::new(client, config);

        let hyperlink = Hyperlink {
            uri: "http://bad.invalid/x".to_string(),
            docname: "index".to_string(),
            docpath: PathBuf::from("/docs/index.rst"),
            lineno: 1,
        };

        // http://bad.invalid never resolves; if the ignore check were
        // skipped this would time out or come back Broken instead.
        let results =
            tokio::time::timeout(std::time::Duration::from_secs(5), checker.check(vec![hyperlink], None))
                .await
                .expect("ignored uri must short-circuit instantly, with no network I/O");

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, Status::Ignored);
        assert_eq!(results[0].code, 0);
    }
}
