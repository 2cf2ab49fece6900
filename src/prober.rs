//! src/prober.rs
//!
//! HTTP prober: HEAD-then-GET retrieval with manual redirect
//! following, 429/401/503 handling, and anchor validation.
//!
//! The shared `reqwest::Client` is built with `redirect::Policy::none()` so
//! this module can inspect every hop (to classify the final status, detect
//! redirects to ignored destinations, and report the penultimate-hop status
//! code) instead of letting `reqwest` silently chase redirects for us.

use reqwest::{Client, Method, StatusCode};
use url::Url;

use crate::anchor::{self, ScanOutcome};
use crate::config::Config;
use crate::hyperlink::Status;
use crate::rate_limit::RateLimitTable;

const MAX_REDIRECTS: usize = 10;

/// The final outcome of an entire probe (HEAD-then-GET escalation, with
/// `retries` attempts of the whole sequence).
pub enum ProbeResult {
    /// A terminal classification, ready to become a `CheckResult`.
    Done(Status, String, u16),
    /// The host needs to back off; the caller (the worker) is responsible
    /// for re-enqueueing the hyperlink at `next_check` and must not emit a
    /// `CheckResult` for this attempt.
    RateLimited { next_check: i64 },
}

/// Probe one URI, with the outer retry loop: retried up to `config.retries`
/// times while the result is `Broken`; every other status (including
/// `RateLimited`) short-circuits immediately.
pub async fn probe_uri(
    client: &Client,
    uri: &str,
    config: &Config,
    rate_limits: &RateLimitTable,
    now: i64,
) -> ProbeResult {
    let mut last = (Status::Unknown, String::new(), 0u16);

    for _ in 0..config.retries.max(1) {
        match probe_once(client, uri, config, rate_limits, now).await {
            Attempt::Decided(status, message, code) => {
                last = (status, message, code);
                if last.0 != Status::Broken {
                    return ProbeResult::Done(last.0, last.1, last.2);
                }
            }
            Attempt::RateLimited { next_check } => {
                return ProbeResult::RateLimited { next_check };
            }
        }
    }

    ProbeResult::Done(last.0, last.1, last.2)
}

enum Attempt {
    Decided(Status, String, u16),
    RateLimited { next_check: i64 },
}

/// One full HEAD-then-GET escalation (one "probe" attempt).
async fn probe_once(
    client: &Client,
    uri: &str,
    config: &Config,
    rate_limits: &RateLimitTable,
    now: i64,
) -> Attempt {
    let (req_url, anchor) = split_anchor(uri, config);
    let req_url = normalize_uri(&req_url);

    let auth = config
        .auth
        .iter()
        .find(|entry| entry.pattern.is_match(uri))
        .map(|entry| (entry.username.clone(), entry.password.clone()));

    let headers = request_headers(uri, config);
    let check_anchors = config.anchors && !anchor.is_empty();

    let mut error_message = String::new();

    for method in retrieval_methods(check_anchors) {
        match send_one(
            client, &method, &req_url, &headers, auth.as_ref(), config, &anchor, check_anchors,
        )
        .await
        {
            AttemptOutcome::Decided(status, message, code) => {
                return Attempt::Decided(status, message, code);
            }
            AttemptOutcome::RateLimited { response_url, retry_after, message } => {
                let host = netloc(&response_url).unwrap_or_else(|| netloc(&req_url).unwrap_or_default());
                match rate_limits.limit_rate(&host, retry_after.as_deref(), now, config.rate_limit_timeout) {
                    Some(next_check) => return Attempt::RateLimited { next_check },
                    None => return Attempt::Decided(Status::Broken, message, 0),
                }
            }
            AttemptOutcome::TryNext(message) => {
                error_message = message;
            }
        }
    }

    Attempt::Decided(Status::Broken, error_message, 0)
}

fn retrieval_methods(check_anchors: bool) -> Vec<Method> {
    let mut methods = Vec::with_capacity(2);
    if !check_anchors {
        methods.push(Method::HEAD);
    }
    methods.push(Method::GET);
    methods
}

enum AttemptOutcome {
    Decided(Status, String, u16),
    RateLimited { response_url: String, retry_after: Option<String>, message: String },
    TryNext(String),
}

#[allow(clippy::too_many_arguments)]
async fn send_one(
    client: &Client,
    method: &Method,
    req_url: &str,
    headers: &[(String, String)],
    auth: Option<&(String, String)>,
    config: &Config,
    anchor: &str,
    check_anchors: bool,
) -> AttemptOutcome {
    let mut current_url = req_url.to_string();
    let mut current_method = method.clone();
    let mut redirect_status: Option<u16> = None;

    for _ in 0..=MAX_REDIRECTS {
        let mut builder = client.request(current_method.clone(), &current_url).timeout(config.timeout());
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some((user, pass)) = auth {
            builder = builder.basic_auth(user, Some(pass));
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(err) => {
                if err.is_timeout() {
                    let status = if config.report_timeouts_as_broken {
                        Status::Broken
                    } else {
                        Status::Timeout
                    };
                    return AttemptOutcome::Decided(status, err.to_string(), 0);
                }
                if is_tls_error(&err) {
                    return AttemptOutcome::Decided(Status::Broken, err.to_string(), 0);
                }
                // Connection errors (DNS, reset, refused): let the caller
                // try the next retrieval method.
                return AttemptOutcome::TryNext(err.to_string());
            }
        };

        let status_code = response.status();

        if status_code.is_redirection() {
            let Some(location) = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
            else {
                // A redirect with no usable Location header: treat as the
                // final response instead of looping forever.
                return classify_final(response, req_url, redirect_status, anchor, check_anchors, config)
                    .await;
            };
            let destination = match Url::parse(&current_url).and_then(|base| base.join(location)) {
                Ok(u) => u.to_string(),
                Err(_) => location.to_string(),
            };

            if config.ignore.iter().any(|re| re.is_match(&destination)) {
                return AttemptOutcome::Decided(
                    Status::Ignored,
                    format!("ignored redirect: {destination}"),
                    status_code.as_u16(),
                );
            }

            redirect_status = Some(status_code.as_u16());
            current_method = if status_code == StatusCode::SEE_OTHER {
                Method::GET
            } else {
                current_method
            };
            current_url = destination;
            continue;
        }

        return classify_final(response, req_url, redirect_status, anchor, check_anchors, config).await;
    }

    AttemptOutcome::TryNext("too many redirects".to_string())
}

async fn classify_final(
    response: reqwest::Response,
    req_url: &str,
    redirect_status: Option<u16>,
    anchor: &str,
    check_anchors: bool,
    config: &Config,
) -> AttemptOutcome {
    let status_code = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let response_url = response.url().to_string();

    if status_code.is_success() && check_anchors && !anchor.is_empty() {
        let stream = response.bytes_stream();
        match anchor::scan_stream(stream, anchor).await {
            Ok(ScanOutcome::Found) => {}
            Ok(ScanOutcome::NotFound) => {
                return AttemptOutcome::Decided(
                    Status::Broken,
                    format!("Anchor '{}' not found", urlencoding::encode(anchor)),
                    0,
                );
            }
            Ok(ScanOutcome::DecodeFailed) => {
                return AttemptOutcome::Decided(
                    Status::Ignored,
                    "unable to decode response content".to_string(),
                    0,
                );
            }
            Err(_) => {
                return AttemptOutcome::TryNext("error reading response body".to_string());
            }
        }
        return finish_success(&response_url, req_url, redirect_status);
    }

    match status_code {
        StatusCode::UNAUTHORIZED => {
            if config.allow_unauthorized {
                AttemptOutcome::Decided(Status::Working, "unauthorized".to_string(), 0)
            } else {
                AttemptOutcome::Decided(Status::Broken, "unauthorized".to_string(), 0)
            }
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let message = format!(
                "{} {}",
                status_code.as_u16(),
                status_code.canonical_reason().unwrap_or("")
            );
            AttemptOutcome::RateLimited { response_url, retry_after, message }
        }
        StatusCode::SERVICE_UNAVAILABLE => {
            AttemptOutcome::Decided(Status::Ignored, "service unavailable".to_string(), 0)
        }
        code if code.is_client_error() || code.is_server_error() => {
            AttemptOutcome::TryNext(format!("{} {}", code.as_u16(), code.canonical_reason().unwrap_or("")))
        }
        _ => finish_success(&response_url, req_url, redirect_status),
    }
}

fn finish_success(response_url: &str, req_url: &str, redirect_status: Option<u16>) -> AttemptOutcome {
    if response_url.trim_end_matches('/') == req_url.trim_end_matches('/') {
        AttemptOutcome::Decided(Status::Working, String::new(), 0)
    } else {
        AttemptOutcome::Decided(Status::Redirected, response_url.to_string(), redirect_status.unwrap_or(0))
    }
}

fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = err.source();
    while let Some(e) = source {
        let msg = e.to_string().to_ascii_lowercase();
        if msg.contains("certificate") || msg.contains("tls") || msg.contains("ssl") {
            return true;
        }
        source = e.source();
    }
    false
}

/// Split `uri` into `(req_url, anchor)` on the first `#`, honoring
/// `anchors_ignore`/`anchors_ignore_for_url`, and percent-decode the
/// surviving anchor.
fn split_anchor(uri: &str, config: &Config) -> (String, String) {
    let Some(hash_pos) = uri.find('#') else {
        return (uri.to_string(), String::new());
    };
    let req_url = uri[..hash_pos].to_string();
    let mut anchor = uri[hash_pos + 1..].to_string();

    if !anchor.is_empty() {
        let ignored_by_anchor = config.anchors_ignore.iter().any(|re| re.is_match(&anchor));
        let ignored_by_url = !ignored_by_anchor
            && config.anchors_ignore_for_url.iter().any(|re| re.is_match(&req_url));
        if ignored_by_anchor || ignored_by_url {
            anchor.clear();
        }
    }

    let anchor = urlencoding::decode(&anchor).map(|c| c.into_owned()).unwrap_or(anchor);
    (req_url, anchor)
}

/// Percent-encode a non-ASCII request URL. Parsing through `url::Url`
/// performs RFC 3986 path percent-encoding and IDNA host encoding for us;
/// if the URL fails to parse at all, fall back to the original string and
/// let the HTTP client report the failure.
fn normalize_uri(req_url: &str) -> String {
    if req_url.is_ascii() {
        return req_url.to_string();
    }
    match Url::parse(req_url) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => req_url.to_string(),
    }
}

const DEFAULT_ACCEPT: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8";

/// Build this request's header list: the default `Accept` header, with any
/// per-URL override merged in. Overrides are looked up by, in priority
/// order, `scheme://host[:port]`, `scheme://host[:port]/`, the exact URI,
/// then `*`; the first matching entry wins.
fn request_headers(uri: &str, config: &Config) -> Vec<(String, String)> {
    let mut headers = vec![("Accept".to_string(), DEFAULT_ACCEPT.to_string())];

    let Ok(parsed) = Url::parse(uri) else {
        return headers;
    };
    let scheme = parsed.scheme();
    let host = parsed.host_str().unwrap_or_default();
    let authority = match parsed.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    };

    let candidates = [authority.clone(), format!("{authority}/"), uri.to_string(), "*".to_string()];

    for candidate in candidates {
        if let Some(overrides) = config.request_headers.get(&candidate) {
            for (k, v) in overrides {
                if let Some(existing) = headers.iter_mut().find(|(name, _)| name.eq_ignore_ascii_case(k)) {
                    existing.1 = v.clone();
                } else {
                    headers.push((k.clone(), v.clone()));
                }
            }
            return headers;
        }
    }
    headers
}

/// `scheme://host[:port]`'s authority portion only (no scheme), used as the
/// rate-limit table key.
fn netloc(uri: &str) -> Option<String> {
    let parsed = Url::parse(uri).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
