//! src/classifier.rs
//!
//! URI classifier: a pure, network-free precheck.
//!
//! Given `(uri, docname, docpath, config)` this produces either a terminal
//! verdict (no network needed) or `None`, meaning "pass through to the
//! prober". It never performs I/O other than a single `Path::exists` check
//! for the local-path fallback, and never mutates anything, so it's trivial
//! to unit test: same inputs, same outputs, every time.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::Config;
use crate::hyperlink::{Hyperlink, Status};

/// Matches `foo://` or a protocol-relative `//`.
static SCHEME_RELATIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]+:)?//").expect("static regex is valid"));

/// The outcome of a classifier decision: either a terminal `(status,
/// message, code)` triple, or a signal to hand the URI to the prober.
pub enum Classification {
    Terminal(Status, String, u16),
    Probe,
}

/// Run the classifier's decision table against one hyperlink.
///
/// Split out as a standalone pure function so it can be tested without
/// spinning up any worker/queue machinery.
pub fn classify(hyperlink: &Hyperlink, config: &Config) -> Classification {
    for doc_matcher in &config.exclude_documents {
        if doc_matcher.is_match(&hyperlink.docname) {
            let info = format!(
                "{} matched {} from exclude_documents",
                hyperlink.docname,
                doc_matcher.as_str()
            );
            return Classification::Terminal(Status::Ignored, info, 0);
        }
    }

    let uri = hyperlink.uri.as_str();
    if uri.is_empty() || uri.starts_with('#') || uri.starts_with("mailto:") || uri.starts_with("tel:")
    {
        return Classification::Terminal(Status::Unchecked, String::new(), 0);
    }

    if !(uri.starts_with("http:") || uri.starts_with("https:")) {
        if SCHEME_RELATIVE_RE.is_match(uri) {
            // Some other scheme (ftp, data, ...) — not supported.
            return Classification::Terminal(Status::Unchecked, String::new(), 0);
        }

        let local_path = match hyperlink.docpath.parent() {
            Some(parent) => parent.join(uri),
            None => std::path::PathBuf::from(uri),
        };
        return if local_path.exists() {
            Classification::Terminal(Status::Working, String::new(), 0)
        } else {
            Classification::Terminal(Status::Broken, String::new(), 0)
        };
    }

    Classification::Probe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use std::path::PathBuf;

    fn cfg() -> Config {
        RawConfig::default().resolve().unwrap()
    }

    fn link(uri: &str, docname: &str, docpath: &str) -> Hyperlink {
        Hyperlink {
            uri: uri.to_string(),
            docname: docname.to_string(),
            docpath: PathBuf::from(docpath),
            lineno: 1,
        }
    }

    #[test]
    fn empty_and_fragment_only_are_unchecked() {
        for uri in ["", "#top", "mailto:a@b.com", "tel:+1234"] {
            let hl = link(uri, "index", "/docs/index.rst");
            match classify(&hl, &cfg()) {
                Classification::Terminal(Status::Unchecked, msg, code) => {
                    assert_eq!(msg, "");
                    assert_eq!(code, 0);
                }
                _ => panic!("expected Unchecked for {uri:?}"),
            }
        }
    }

    #[test]
    fn non_http_scheme_is_unchecked() {
        let hl = link("ftp://example.test/file", "index", "/docs/index.rst");
        match classify(&hl, &cfg()) {
            Classification::Terminal(Status::Unchecked, ..) => {}
            _ => panic!("expected Unchecked for ftp scheme"),
        }
    }

    #[test]
    fn protocol_relative_is_unchecked() {
        let hl = link("//example.test/file", "index", "/docs/index.rst");
        match classify(&hl, &cfg()) {
            Classification::Terminal(Status::Unchecked, ..) => {}
            _ => panic!("expected Unchecked for protocol-relative uri"),
        }
    }

    #[test]
    fn http_and_https_pass_through_to_prober() {
        for uri in ["http://example.test/a", "https://example.test/a"] {
            let hl = link(uri, "index", "/docs/index.rst");
            assert!(matches!(classify(&hl, &cfg()), Classification::Probe));
        }
    }

    #[test]
    fn local_path_existing_is_working() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("index.rst");
        std::fs::write(&doc, "").unwrap();
        std::fs::write(dir.path().join("sibling.png"), "").unwrap();

        let hl = link("sibling.png", "index", doc.to_str().unwrap());
        match classify(&hl, &cfg()) {
            Classification::Terminal(Status::Working, ..) => {}
            _ => panic!("expected Working for existing local path"),
        }
    }

    #[test]
    fn local_path_missing_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("index.rst");
        std::fs::write(&doc, "").unwrap();

        let hl = link("missing.png", "index", doc.to_str().unwrap());
        match classify(&hl, &cfg()) {
            Classification::Terminal(Status::Broken, ..) => {}
            _ => panic!("expected Broken for missing local path"),
        }
    }

    #[test]
    fn excluded_document_is_ignored() {
        let mut config = cfg();
        config.exclude_documents = vec![Regex::new("^generated/").unwrap()];
        let hl = link("http://example.test/a", "generated/api", "/docs/generated/api.rst");
        match classify(&hl, &config) {
            Classification::Terminal(Status::Ignored, msg, _) => {
                assert!(msg.contains("exclude_documents"));
            }
            _ => panic!("expected Ignored for excluded document"),
        }
    }
}
