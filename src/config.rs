//! src/config.rs
//!
//! The checker's configuration. `RawConfig` is what we deserialize from an
//! optional TOML file (everything optional, so a bare `--input links.txt`
//! invocation works with no config file at all); `Config` is the resolved,
//! compiled form the engine actually runs with — regex lists are compiled
//! once here rather than on every classifier/prober call.

use std::collections::HashMap;
use std::path::PathBuf;

use regex::Regex;
use serde::Deserialize;

use crate::error::LinkcheckError;

/// `(pattern, credentials)` — the first pattern matching the URI wins.
#[derive(Debug, Clone)]
pub struct AuthEntry {
    pub pattern: Regex,
    pub username: String,
    pub password: String,
}

/// The fully resolved, ready-to-run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub timeout_secs: u64,
    pub retries: u32,
    pub workers: usize,
    pub rate_limit_timeout: f64,
    pub anchors: bool,
    pub anchors_ignore: Vec<Regex>,
    pub anchors_ignore_for_url: Vec<Regex>,
    pub auth: Vec<AuthEntry>,
    pub request_headers: HashMap<String, HashMap<String, String>>,
    pub ignore: Vec<Regex>,
    pub exclude_documents: Vec<Regex>,
    pub allowed_redirects: Vec<(Regex, Regex)>,
    pub report_timeouts_as_broken: bool,
    pub allow_unauthorized: bool,
    pub tls_verify: bool,
    pub user_agent: String,
    /// Extra CA certificate bundle (PEM), for internal/self-signed hosts.
    pub tls_cacerts: Option<PathBuf>,
}

/// The TOML-deserializable shape. Every field is optional so a partial or
/// absent config file is valid; `Config::resolve` fills in the same
/// defaults documented below.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub timeout_secs: Option<u64>,
    pub retries: Option<u32>,
    pub workers: Option<usize>,
    pub rate_limit_timeout: Option<f64>,
    pub anchors: Option<bool>,
    pub anchors_ignore: Option<Vec<String>>,
    pub anchors_ignore_for_url: Option<Vec<String>>,
    pub auth: Option<Vec<RawAuthEntry>>,
    pub request_headers: Option<HashMap<String, HashMap<String, String>>>,
    pub ignore: Option<Vec<String>>,
    pub exclude_documents: Option<Vec<String>>,
    pub allowed_redirects: Option<HashMap<String, String>>,
    pub report_timeouts_as_broken: Option<bool>,
    pub allow_unauthorized: Option<bool>,
    pub tls_verify: Option<bool>,
    pub user_agent: Option<String>,
    pub tls_cacerts: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct RawAuthEntry {
    pub pattern: String,
    pub username: String,
    pub password: String,
}

impl RawConfig {
    /// Load a `RawConfig` from a TOML file, or return the all-defaults
    /// config if `path` is `None`.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, LinkcheckError> {
        match path {
            None => Ok(RawConfig::default()),
            Some(p) => {
                let text = std::fs::read_to_string(p)?;
                let raw: RawConfig = toml::from_str(&text)?;
                Ok(raw)
            }
        }
    }

    /// Compile every pattern list and fill in defaults, producing the
    /// resolved `Config` the engine runs with.
    ///
    /// Invalid regexes in `allowed_redirects` are logged and dropped (never
    /// fatal). Invalid regexes in `ignore`/`exclude_documents`/
    /// `anchors_ignore*`/`auth` patterns abort startup, since a broken
    /// ignore pattern silently checking links it shouldn't is worse than
    /// failing fast.
    pub fn resolve(self) -> Result<Config, LinkcheckError> {
        let anchors_ignore = compile_all(self.anchors_ignore.unwrap_or_else(|| vec!["^!".into()]))?;
        let anchors_ignore_for_url = compile_all(self.anchors_ignore_for_url.unwrap_or_default())?;
        let ignore = compile_all(self.ignore.unwrap_or_default())?;
        let exclude_documents = compile_all(self.exclude_documents.unwrap_or_default())?;

        let mut auth = Vec::new();
        for entry in self.auth.unwrap_or_default() {
            auth.push(AuthEntry {
                pattern: Regex::new(&entry.pattern)?,
                username: entry.username,
                password: entry.password,
            });
        }

        let mut allowed_redirects = Vec::new();
        for (from, to) in self.allowed_redirects.unwrap_or_default() {
            match (Regex::new(&from), Regex::new(&to)) {
                (Ok(from_re), Ok(to_re)) => allowed_redirects.push((from_re, to_re)),
                _ => {
                    tracing::warn!(
                        from = %from,
                        to = %to,
                        "failed to compile regex in allowed_redirects; dropping entry"
                    );
                }
            }
        }

        Ok(Config {
            timeout_secs: self.timeout_secs.unwrap_or(30),
            retries: self.retries.unwrap_or(1),
            workers: self.workers.unwrap_or(5),
            rate_limit_timeout: self.rate_limit_timeout.unwrap_or(300.0),
            anchors: self.anchors.unwrap_or(true),
            anchors_ignore,
            anchors_ignore_for_url,
            auth,
            request_headers: self.request_headers.unwrap_or_default(),
            ignore,
            exclude_documents,
            allowed_redirects,
            report_timeouts_as_broken: self.report_timeouts_as_broken.unwrap_or(false),
            allow_unauthorized: self.allow_unauthorized.unwrap_or(false),
            tls_verify: self.tls_verify.unwrap_or(true),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| format!("linkcheck/{}", env!("CARGO_PKG_VERSION"))),
            tls_cacerts: self.tls_cacerts,
        })
    }
}

fn compile_all(patterns: Vec<String>) -> Result<Vec<Regex>, LinkcheckError> {
    patterns.iter().map(|p| Regex::new(p).map_err(LinkcheckError::from)).collect()
}

impl Config {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

/// Where the CLI writes `output.txt`/`output.json`, distinct from `Config`
/// since it's an ambient concern of the binary, not the checking engine.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub dir: PathBuf,
}

impl OutputPaths {
    pub fn text_path(&self) -> PathBuf {
        self.dir.join("output.txt")
    }

    pub fn json_path(&self) -> PathBuf {
        self.dir.join("output.json")
    }
}
