//! src/worker.rs
//!
//! Worker: the per-task loop that drains the work queue, classifies
//! and probes one hyperlink at a time, and either emits a `CheckResult` or
//! re-enqueues the hyperlink to honor a rate-limit back-off.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::Client;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Duration;

use crate::checker::WorkQueue;
use crate::classifier::{self, Classification};
use crate::config::Config;
use crate::hyperlink::{CheckRequest, CheckResult, Status, CHECK_IMMEDIATELY};
use crate::prober::{self, ProbeResult};
use crate::rate_limit::RateLimitTable;

/// How long a worker sleeps before re-checking a request whose `next_check`
/// has not yet arrived, rather than busy-polling the queue.
const NOT_YET_DUE_SLEEP: Duration = Duration::from_secs(1);

fn now_epoch() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs() as i64
}

/// One worker's run loop. Keeps dequeuing until it pops the shutdown
/// sentinel (`hyperlink: None`), at which point it returns.
pub async fn run_worker(
    client: Client,
    config: Arc<Config>,
    rate_limits: RateLimitTable,
    work_queue: WorkQueue,
    results: UnboundedSender<CheckResult>,
) {
    loop {
        let request = work_queue.pop().await;

        let Some(hyperlink) = request.hyperlink else {
            work_queue.task_done();
            return;
        };

        let now = now_epoch();

        // The queued next_check may be stale if the host's rate-limit entry
        // changed since this request was last pushed (e.g. another worker's
        // probe against the same host just computed a later back-off).
        // Always prefer a fresher table entry, even if it's earlier than the
        // queued value — it reflects a more recent read of the host's state.
        let due_at = match prober_host(&hyperlink.uri) {
            Some(host) => rate_limits.next_check(&host).unwrap_or(request.next_check),
            None => request.next_check,
        };

        if due_at > now {
            tokio::time::sleep(NOT_YET_DUE_SLEEP).await;
            work_queue.push(CheckRequest { next_check: due_at, hyperlink: Some(hyperlink) });
            work_queue.task_done();
            continue;
        }

        match classifier::classify(&hyperlink, &config) {
            Classification::Terminal(status, message, code) => {
                let result = CheckResult {
                    uri: hyperlink.uri,
                    docname: hyperlink.docname,
                    lineno: hyperlink.lineno,
                    status,
                    message,
                    code,
                };
                log_result(&result);
                let _ = results.send(result);
                work_queue.task_done();
            }
            Classification::Probe => {
                match prober::probe_uri(&client, &hyperlink.uri, &config, &rate_limits, now).await {
                    ProbeResult::Done(status, message, code) => {
                        let result = CheckResult {
                            uri: hyperlink.uri,
                            docname: hyperlink.docname,
                            lineno: hyperlink.lineno,
                            status,
                            message,
                            code,
                        };
                        log_result(&result);
                        let _ = results.send(result);
                        work_queue.task_done();
                    }
                    ProbeResult::RateLimited { next_check } => {
                        tracing::info!(uri = %hyperlink.uri, next_check, "rate limited, sleeping");
                        work_queue.push(CheckRequest { next_check, hyperlink: Some(hyperlink) });
                        work_queue.task_done();
                    }
                }
            }
        }
    }
}

/// Log one terminal `CheckResult` at the severity spec.md §6 assigns it:
/// info for ok/ignored/redirected/unchecked, warning for broken/timeout.
fn log_result(result: &CheckResult) {
    match result.status {
        Status::Working => {
            tracing::info!(uri = %result.uri, docname = %result.docname, lineno = result.lineno, "ok");
        }
        Status::Ignored => {
            tracing::info!(uri = %result.uri, docname = %result.docname, lineno = result.lineno, message = %result.message, "ignored");
        }
        Status::Redirected => {
            tracing::info!(uri = %result.uri, docname = %result.docname, lineno = result.lineno, destination = %result.message, code = result.code, "redirected");
        }
        Status::Unchecked => {
            tracing::info!(uri = %result.uri, docname = %result.docname, lineno = result.lineno, "unchecked");
        }
        Status::Broken => {
            tracing::warn!(uri = %result.uri, docname = %result.docname, lineno = result.lineno, message = %result.message, "broken");
        }
        Status::Timeout => {
            tracing::warn!(uri = %result.uri, docname = %result.docname, lineno = result.lineno, message = %result.message, "timeout");
        }
        Status::RateLimited => {
            // Never a terminal CheckResult (see the RateLimited branch above,
            // which re-enqueues instead of emitting one); kept exhaustive.
        }
        Status::Unknown => {
            tracing::error!(uri = %result.uri, docname = %result.docname, lineno = result.lineno, "unknown status");
        }
    }
}

/// The `netloc` a queued hyperlink's URI would probe against, used only to
/// consult the rate-limit table for a possibly-fresher `next_check`.
fn prober_host(uri: &str) -> Option<String> {
    let parsed = url::Url::parse(uri).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
