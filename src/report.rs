//! src/report.rs
//!
//! Report writer: turns a stream of `CheckResult`s into `output.txt` and
//! `output.json`, and tracks whether the process should exit non-zero.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::config::OutputPaths;
use crate::error::LinkcheckError;
use crate::hyperlink::{CheckResult, Status};

/// One line of `output.json`.
#[derive(Serialize)]
struct JsonRecord<'a> {
    filename: &'a str,
    lineno: i64,
    status: &'a str,
    code: u16,
    uri: &'a str,
    info: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

/// The human-readable word for a redirect's HTTP status code, used both in
/// the `output.txt` status bracket and as `output.json`'s `text` field.
fn redirect_text(code: u16) -> &'static str {
    match code {
        301 => "permanently",
        302 => "with Found",
        303 => "with See Other",
        307 => "temporarily",
        308 => "permanently",
        _ => "with unknown code",
    }
}

/// Opens `output.txt`/`output.json` in `paths.dir`. Every terminal result
/// gets a line in `output.json`; `output.txt` only records `Broken`,
/// `Timeout`, and `Redirected` results (the ones worth a human's attention).
pub struct Writer {
    text: BufWriter<File>,
    json: BufWriter<File>,
    broken_or_timeout_count: u64,
}

impl Writer {
    pub fn create(paths: &OutputPaths) -> Result<Self, LinkcheckError> {
        std::fs::create_dir_all(&paths.dir)?;
        Ok(Writer {
            text: BufWriter::new(File::create(paths.text_path())?),
            json: BufWriter::new(File::create(paths.json_path())?),
            broken_or_timeout_count: 0,
        })
    }

    /// Write one result: always a JSON line, plus a text line for the
    /// statuses worth flagging (`Broken`/`Timeout`/`Redirected`).
    pub fn write_result(&mut self, result: &CheckResult) -> Result<(), LinkcheckError> {
        if matches!(result.status, Status::Broken | Status::Timeout) {
            self.broken_or_timeout_count += 1;
        }

        let redirect_word = (result.status == Status::Redirected).then(|| redirect_text(result.code));

        match result.status {
            Status::Broken | Status::Timeout => {
                writeln!(
                    self.text,
                    "{}:{}: [{}] {}: {}",
                    result.docname, result.lineno, result.status.as_str(), result.uri, result.message
                )?;
            }
            Status::Redirected => {
                let word = redirect_word.unwrap();
                writeln!(
                    self.text,
                    "{}:{}: [redirected {}] {} to {}",
                    result.docname, result.lineno, word, result.uri, result.message
                )?;
            }
            _ => {}
        }

        let record = JsonRecord {
            filename: &result.docname,
            lineno: result.lineno,
            status: result.status.as_str(),
            code: result.code,
            uri: &result.uri,
            info: &result.message,
            text: redirect_word,
        };
        let line = serde_json::to_string(&record)?;
        writeln!(self.json, "{line}")?;

        Ok(())
    }

    pub fn finish(mut self) -> Result<u64, LinkcheckError> {
        self.text.flush()?;
        self.json.flush()?;
        Ok(self.broken_or_timeout_count)
    }
}

/// Nonzero iff the run found anything broken or timed out.
pub fn exit_code_for(broken_or_timeout_count: u64) -> i32 {
    if broken_or_timeout_count > 0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn result(status: Status, message: &str, code: u16) -> CheckResult {
        CheckResult {
            uri: "http://example.test/a".to_string(),
            docname: "index.rst".to_string(),
            lineno: 12,
            status,
            message: message.to_string(),
            code,
        }
    }

    fn read(path: &Path) -> String {
        std::fs::read_to_string(path).unwrap()
    }

    #[test]
    fn working_and_ignored_are_not_in_text_but_are_in_json() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths { dir: dir.path().to_path_buf() };
        let mut writer = Writer::create(&paths).unwrap();
        writer.write_result(&result(Status::Working, "", 0)).unwrap();
        writer.write_result(&result(Status::Ignored, "skip", 0)).unwrap();
        let count = writer.finish().unwrap();

        assert_eq!(count, 0);
        assert_eq!(read(&paths.text_path()), "");
        let json = read(&paths.json_path());
        assert_eq!(json.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(json.lines().next().unwrap()).unwrap();
        assert_eq!(first["status"], "working");
    }

    #[test]
    fn broken_result_is_reported_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths { dir: dir.path().to_path_buf() };
        let mut writer = Writer::create(&paths).unwrap();
        writer.write_result(&result(Status::Broken, "404 Not Found", 404)).unwrap();
        let count = writer.finish().unwrap();

        assert_eq!(count, 1);
        assert_eq!(exit_code_for(count), 1);
        assert_eq!(read(&paths.text_path()), "index.rst:12: [broken] http://example.test/a: 404 Not Found\n");

        let json = read(&paths.json_path());
        let parsed: serde_json::Value = serde_json::from_str(json.trim()).unwrap();
        assert_eq!(parsed["status"], "broken");
        assert_eq!(parsed["code"], 404);
    }

    #[test]
    fn redirected_result_reports_the_code_word_and_destination() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths { dir: dir.path().to_path_buf() };
        let mut writer = Writer::create(&paths).unwrap();
        writer.write_result(&result(Status::Redirected, "http://example.test/b", 301)).unwrap();
        let count = writer.finish().unwrap();

        assert_eq!(count, 0);
        assert_eq!(
            read(&paths.text_path()),
            "index.rst:12: [redirected permanently] http://example.test/a to http://example.test/b\n"
        );
        let json = read(&paths.json_path());
        let parsed: serde_json::Value = serde_json::from_str(json.trim()).unwrap();
        assert_eq!(parsed["text"], "permanently");
        assert_eq!(parsed["status"], "redirected");
    }

    #[test]
    fn redirect_text_matches_known_status_codes() {
        assert_eq!(redirect_text(301), "permanently");
        assert_eq!(redirect_text(302), "with Found");
        assert_eq!(redirect_text(303), "with See Other");
        assert_eq!(redirect_text(307), "temporarily");
        assert_eq!(redirect_text(308), "permanently");
        assert_eq!(redirect_text(999), "with unknown code");
    }

    #[test]
    fn exit_code_is_zero_with_no_broken_or_timeout() {
        assert_eq!(exit_code_for(0), 0);
        assert_eq!(exit_code_for(3), 1);
    }
}
