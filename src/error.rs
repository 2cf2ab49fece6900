//! src/error.rs
//!
//! Central error type for linkcheck.

use std::{error::Error, fmt};

/// Top-level error type for the application.
///
/// Each variant wraps a concrete error from another library (e.g., `std::io`, `reqwest`),
/// or represents an application-specific condition (e.g., a malformed config file).
#[derive(Debug)]
pub enum LinkcheckError {
    /// The input hyperlink file or config file could not be parsed into the
    /// shape we expect (missing fields, wrong column count, etc.).
    Config(String),

    /// Wrapper for file/stream I/O errors (opening the input file, config file,
    /// output files, etc.).
    Io(std::io::Error),

    /// Wrapper for HTTP client errors (DNS/TLS/connect/timeouts/protocol) from `reqwest`.
    Http(reqwest::Error),

    /// A regular expression in the config failed to compile. Only raised for
    /// the patterns that must be valid to proceed (ignore/exclude lists);
    /// invalid `allowed_redirects` entries are logged and dropped instead.
    Regex(regex::Error),

    /// The config file was not valid TOML.
    TomlParse(toml::de::Error),

    /// Failed to serialize a `CheckResult` as JSON for `output.json`.
    Json(serde_json::Error),

    /// An async task failed to join (panic/cancellation surfaced as `JoinError`).
    Join(tokio::task::JoinError),
}

impl fmt::Display for LinkcheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkcheckError::Config(msg) => write!(f, "config error: {msg}"),
            LinkcheckError::Io(e) => write!(f, "io error: {e}"),
            LinkcheckError::Http(e) => write!(f, "http error: {e}"),
            LinkcheckError::Regex(e) => write!(f, "regex error: {e}"),
            LinkcheckError::TomlParse(e) => write!(f, "toml parse error: {e}"),
            LinkcheckError::Json(e) => write!(f, "json error: {e}"),
            LinkcheckError::Join(e) => write!(f, "task join error: {e}"),
        }
    }
}

impl Error for LinkcheckError {}

impl From<std::io::Error> for LinkcheckError {
    fn from(e: std::io::Error) -> Self {
        LinkcheckError::Io(e)
    }
}

impl From<reqwest::Error> for LinkcheckError {
    fn from(e: reqwest::Error) -> Self {
        LinkcheckError::Http(e)
    }
}

impl From<regex::Error> for LinkcheckError {
    fn from(e: regex::Error) -> Self {
        LinkcheckError::Regex(e)
    }
}

impl From<toml::de::Error> for LinkcheckError {
    fn from(e: toml::de::Error) -> Self {
        LinkcheckError::TomlParse(e)
    }
}

impl From<serde_json::Error> for LinkcheckError {
    fn from(e: serde_json::Error) -> Self {
        LinkcheckError::Json(e)
    }
}

impl From<tokio::task::JoinError> for LinkcheckError {
    fn from(e: tokio::task::JoinError) -> Self {
        LinkcheckError::Join(e)
    }
}
