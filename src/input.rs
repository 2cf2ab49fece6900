//! src/input.rs
//!
//! Input reader: loads the discovered-hyperlink records a prior collection
//! pass produced, from a simple line-oriented file.

use std::path::Path;

use crate::error::LinkcheckError;
use crate::hyperlink::Hyperlink;

/// Read `docname\tdocpath\tlineno\turi` records from `path`.
///
/// Blank lines and lines starting with `#` are skipped. A malformed line
/// (wrong column count, unparsable `lineno`) aborts with
/// `LinkcheckError::Config` naming the offending line number.
pub fn read_hyperlinks(path: &Path) -> Result<Vec<Hyperlink>, LinkcheckError> {
    let text = std::fs::read_to_string(path)?;
    let mut hyperlinks = Vec::new();

    for (line_number, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut fields = line.split('\t');
        let (Some(docname), Some(docpath), Some(lineno), Some(uri), None) =
            (fields.next(), fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(LinkcheckError::Config(format!(
                "{}:{}: expected 4 tab-separated columns (docname, docpath, lineno, uri)",
                path.display(),
                line_number + 1
            )));
        };

        let lineno = lineno.parse::<i64>().map_err(|_| {
            LinkcheckError::Config(format!(
                "{}:{}: lineno column {:?} is not an integer",
                path.display(),
                line_number + 1,
                lineno
            ))
        })?;

        hyperlinks.push(Hyperlink {
            uri: uri.to_string(),
            docname: docname.to_string(),
            docpath: docpath.into(),
            lineno,
        });
    }

    Ok(hyperlinks)
}
