//! End-to-end tests for the checking engine against a real HTTP server
//! (`wiremock`), covering scenarios a unit test can't reach on its own:
//! redirect classification, 429 back-off and clearance, and retry
//! exhaustion on a flaky endpoint.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use linkcheck::config::RawConfig;
use linkcheck::{Hyperlink, HyperlinkAvailabilityChecker, Status};
use reqwest::Client;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn link(uri: String) -> Hyperlink {
    Hyperlink { uri, docname: "index".to_string(), docpath: PathBuf::from("/docs/index.rst"), lineno: 1 }
}

fn client() -> Client {
    Client::builder().redirect(reqwest::redirect::Policy::none()).build().unwrap()
}

#[tokio::test]
async fn redirect_to_a_different_location_is_reported_redirected() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD")).and(path("/new")).respond_with(ResponseTemplate::new(200)).mount(&server).await;

    let config = RawConfig::default().resolve().unwrap();
    let checker = HyperlinkAvailabilityChecker::new(client(), config);

    let results = checker.check(vec![link(format!("{}/old", server.uri()))], None).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::Redirected);
    assert_eq!(results[0].code, 301);
    assert!(results[0].message.ends_with("/new"));
}

#[tokio::test]
async fn redirect_to_an_ignored_destination_is_ignored() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/blocked"))
        .mount(&server)
        .await;

    let mut raw = RawConfig::default();
    raw.ignore = Some(vec!["/blocked".to_string()]);
    let config = raw.resolve().unwrap();
    let checker = HyperlinkAvailabilityChecker::new(client(), config);

    let results = checker.check(vec![link(format!("{}/old", server.uri()))], None).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::Ignored);
}

#[tokio::test]
async fn rate_limited_host_is_retried_after_retry_after_then_succeeds() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_for_responder = Arc::clone(&attempts);

    Mock::given(method("HEAD"))
        .and(path("/limited"))
        .respond_with(move |_req: &Request| {
            let n = attempts_for_responder.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                ResponseTemplate::new(429).insert_header("Retry-After", "1")
            } else {
                ResponseTemplate::new(200)
            }
        })
        .mount(&server)
        .await;

    let config = RawConfig::default().resolve().unwrap();
    let checker = HyperlinkAvailabilityChecker::new(client(), config);

    let results = checker.check(vec![link(format!("{}/limited", server.uri()))], None).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::Working);
    assert!(attempts.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn exhausted_retries_against_a_connection_failure_report_broken() {
    // Nothing is listening on this port: every retrieval method fails to
    // connect, on every retry, so the link must come back BROKEN.
    let unreachable = "http://127.0.0.1:1";

    let mut raw = RawConfig::default();
    raw.retries = Some(2);
    raw.timeout_secs = Some(2);
    let config = raw.resolve().unwrap();
    let checker = HyperlinkAvailabilityChecker::new(client(), config);

    let results = checker.check(vec![link(unreachable.to_string())], None).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::Broken);
}

#[tokio::test]
async fn anchor_present_on_page_is_working() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<html><body><a id="section-1">hi</a></body></html>"#))
        .mount(&server)
        .await;

    let config = RawConfig::default().resolve().unwrap();
    let checker = HyperlinkAvailabilityChecker::new(client(), config);

    let uri = format!("{}/page#section-1", server.uri());
    let results = checker.check(vec![link(uri)], None).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::Working);
}

#[tokio::test]
async fn missing_anchor_on_an_otherwise_healthy_page_is_broken() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>no anchors here</body></html>"))
        .mount(&server)
        .await;

    let config = RawConfig::default().resolve().unwrap();
    let checker = HyperlinkAvailabilityChecker::new(client(), config);

    let uri = format!("{}/page#missing", server.uri());
    let results = checker.check(vec![link(uri)], None).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::Broken);
    assert!(results[0].message.contains("missing"));
}

#[tokio::test]
async fn service_unavailable_is_ignored_not_broken() {
    let server = MockServer::start().await;

    Mock::given(method("HEAD")).and(path("/down")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

    let config = RawConfig::default().resolve().unwrap();
    let checker = HyperlinkAvailabilityChecker::new(client(), config);

    let results = checker.check(vec![link(format!("{}/down", server.uri()))], None).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, Status::Ignored);
}
