//! linkcheck — a concurrent external-hyperlink availability checker.
//!
//! Given a stream of discovered hyperlinks, classifies and probes each one
//! concurrently, honoring per-host rate limits, and reports a `Status` for
//! every link.

pub mod anchor;
pub mod args;
pub mod checker;
pub mod classifier;
pub mod config;
pub mod error;
pub mod hyperlink;
pub mod input;
pub mod prober;
pub mod rate_limit;
pub mod report;
pub mod worker;

pub use checker::HyperlinkAvailabilityChecker;
pub use config::Config;
pub use error::LinkcheckError;
pub use hyperlink::{CheckResult, Hyperlink, Status};
