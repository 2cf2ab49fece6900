//! src/hyperlink.rs
//!
//! Core data model shared by every component of the checking engine:
//!   - `Hyperlink`: one discovered URI occurrence (immutable once built).
//!   - `Status`: the exhaustive classification of a check outcome.
//!   - `CheckResult`: the terminal outcome for one hyperlink.
//!   - `CheckRequest` / `QueueEntry`: work-queue items, ordered by `next_check`.
//!   - `RateLimit`: per-host back-off state.
//!
//! Keeping these types in one module (rather than scattering them across
//! `checker`/`worker`/`prober`) means every component agrees on exactly one
//! definition of "what a check result looks like".

use std::cmp::Ordering;
use std::path::PathBuf;

/// A URI occurrence discovered in the source corpus.
///
/// Created by the upstream collector (here, `input::read_hyperlinks`) and
/// immutable thereafter; it moves by value from the orchestrator to a
/// worker and back out as part of a `CheckResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    /// The URI exactly as discovered; may carry a `#fragment`.
    pub uri: String,
    /// Identifier of the origin document (used for `exclude_documents`).
    pub docname: String,
    /// Filesystem path of the origin document (used to resolve local paths).
    pub docpath: PathBuf,
    /// Source line number, or `-1` if unknown.
    pub lineno: i64,
}

/// The exhaustive classification of a hyperlink's check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Broken,
    Ignored,
    RateLimited,
    Redirected,
    Timeout,
    Unchecked,
    Working,
    Unknown,
}

impl Status {
    /// The lowercase token used by `output.txt`/`output.json`.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Broken => "broken",
            Status::Ignored => "ignored",
            Status::RateLimited => "rate-limited",
            Status::Redirected => "redirected",
            Status::Timeout => "timeout",
            Status::Unchecked => "unchecked",
            Status::Working => "working",
            Status::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The terminal outcome of checking one hyperlink.
///
/// `RateLimited` is never placed on the result queue (the worker re-enqueues
/// instead) — see `worker::run_worker`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub uri: String,
    pub docname: String,
    pub lineno: i64,
    pub status: Status,
    pub message: String,
    /// Numeric HTTP status code where meaningful, else 0.
    pub code: u16,
}

/// Per-host throttling state, keyed by the host's `scheme://host` netloc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Current back-off window, in seconds.
    pub delay: f64,
    /// Earliest permissible probe time for this host, epoch seconds.
    pub next_check: i64,
}

/// A queued work item: "check `hyperlink` no earlier than `next_check`".
///
/// `hyperlink = None` is the shutdown sentinel: a worker that dequeues one
/// closes its HTTP resources and terminates.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub next_check: i64,
    pub hyperlink: Option<Hyperlink>,
}

/// A `CheckRequest` plus an insertion sequence number, so the work queue's
/// binary heap can break ties between equal `next_check` values in FIFO
/// order instead of an arbitrary one.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub request: CheckRequest,
    pub sequence: u64,
}

impl QueueEntry {
    pub fn new(request: CheckRequest, sequence: u64) -> Self {
        QueueEntry { request, sequence }
    }
}

/// Ordering is by `next_check` ascending, ties broken by `sequence`
/// ascending (earlier-inserted entries come first). `BinaryHeap` is a
/// max-heap, so the work queue wraps entries in `std::cmp::Reverse` to turn
/// this into a min-heap on `next_check`.
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.request
            .next_check
            .cmp(&other.request.next_check)
            .then_with(|| self.sequence.cmp(&other.sequence))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.request.next_check == other.request.next_check && self.sequence == other.sequence
    }
}

impl Eq for QueueEntry {}

/// Epoch seconds meaning "check immediately".
pub const CHECK_IMMEDIATELY: i64 = 0;
