//! src/anchor.rs
//!
//! Anchor scanner: stream-scan HTML chunks for an `id=`/`name=`
//! attribute matching a target anchor, reading no more of the response body
//! than necessary.
//!
//! This is deliberately not a full HTML parser: it's a small state machine
//! that walks byte chunks looking for `<tagname ... attr="value" ...>` start tags and
//! pulls out `id`/`name` attribute values for comparison. Malformed HTML
//! never raises; the scanner just keeps scanning or reaches end-of-stream
//! with `found = false`.

use futures::{Stream, StreamExt};

/// Parser states for the start-tag scanner. We only care about start tags,
/// so text content, comments, and closing tags just fall through `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Outside of any tag.
    Text,
    /// Just saw `<`; deciding whether this is a start tag, end tag, comment,
    /// or something else we don't care about (`<!--`, `<!DOCTYPE`, `<?xml`).
    TagOpen,
    /// Inside a start tag's name or attribute list, before `>`.
    InTag,
    /// Reading an attribute name.
    AttrName,
    /// Between attribute name and `=` (or the next attribute / `>`).
    AfterAttrName,
    /// Just saw `=`; about to read a (possibly quoted) value.
    BeforeAttrValue,
    /// Reading an attribute value, quoted with `quote`.
    AttrValueQuoted { quote: u8 },
    /// Reading an unquoted attribute value.
    AttrValueUnquoted,
    /// Inside `<!-- ... -->` or `<! ...>` or `<? ...>` — skip to `>`.
    SkipToGt,
}

/// Incremental scanner: feed it chunks of decoded text; it reports whether
/// the target anchor has been found as an `id`/`name` attribute value on
/// any start tag seen so far.
pub struct AnchorScanner {
    target: String,
    found: bool,
    state: State,
    current_attr_name: String,
    current_attr_value: String,
    /// true once we've decided the current tag is a start tag (not `</...>`).
    is_start_tag: bool,
}

impl AnchorScanner {
    pub fn new(target: impl Into<String>) -> Self {
        AnchorScanner {
            target: target.into(),
            found: false,
            state: State::Text,
            current_attr_name: String::new(),
            current_attr_value: String::new(),
            is_start_tag: true,
        }
    }

    pub fn found(&self) -> bool {
        self.found
    }

    /// Feed one chunk of decoded text into the scanner. Cheap and
    /// allocation-light: only attribute names/values accumulate into small
    /// owned strings.
    pub fn feed(&mut self, chunk: &str) {
        if self.found {
            return;
        }
        for ch in chunk.chars() {
            if self.found {
                return;
            }
            self.step(ch);
        }
    }

    fn step(&mut self, ch: char) {
        match self.state {
            State::Text => {
                if ch == '<' {
                    self.state = State::TagOpen;
                }
            }
            State::TagOpen => {
                if ch == '/' {
                    // End tag — not interesting, skip to '>'.
                    self.is_start_tag = false;
                    self.state = State::SkipToGt;
                } else if ch == '!' || ch == '?' {
                    self.state = State::SkipToGt;
                } else if ch.is_alphabetic() {
                    self.is_start_tag = true;
                    self.state = State::InTag;
                } else {
                    // Not a tag after all (stray '<'); go back to text.
                    self.state = State::Text;
                }
            }
            State::InTag => {
                if ch == '>' {
                    self.finish_tag();
                } else if ch.is_whitespace() {
                    // end of tag name / between attributes
                } else if ch == '/' {
                    // self-closing marker, ignore
                } else {
                    self.current_attr_name.clear();
                    self.current_attr_name.push(ch);
                    self.state = State::AttrName;
                }
            }
            State::AttrName => {
                if ch == '=' {
                    self.state = State::BeforeAttrValue;
                } else if ch.is_whitespace() {
                    self.state = State::AfterAttrName;
                } else if ch == '>' {
                    self.finish_tag();
                } else {
                    self.current_attr_name.push(ch);
                }
            }
            State::AfterAttrName => {
                if ch == '=' {
                    self.state = State::BeforeAttrValue;
                } else if ch == '>' {
                    self.finish_tag();
                } else if !ch.is_whitespace() {
                    // A new attribute started without a value for the
                    // previous one (e.g. boolean attribute `disabled`).
                    self.current_attr_name.clear();
                    self.current_attr_name.push(ch);
                    self.state = State::AttrName;
                }
            }
            State::BeforeAttrValue => {
                if ch == '"' || ch == '\'' {
                    self.current_attr_value.clear();
                    self.state = State::AttrValueQuoted { quote: ch as u8 };
                } else if ch.is_whitespace() {
                    // keep waiting
                } else if ch == '>' {
                    self.finish_tag();
                } else {
                    self.current_attr_value.clear();
                    self.current_attr_value.push(ch);
                    self.state = State::AttrValueUnquoted;
                }
            }
            State::AttrValueQuoted { quote } => {
                if ch as u32 == quote as u32 {
                    self.record_attr();
                    self.state = State::InTag;
                } else {
                    self.current_attr_value.push(ch);
                }
            }
            State::AttrValueUnquoted => {
                if ch.is_whitespace() {
                    self.record_attr();
                    self.state = State::InTag;
                } else if ch == '>' {
                    self.record_attr();
                    self.finish_tag();
                } else {
                    self.current_attr_value.push(ch);
                }
            }
            State::SkipToGt => {
                if ch == '>' {
                    self.state = State::Text;
                }
            }
        }
    }

    fn record_attr(&mut self) {
        if self.is_start_tag
            && (self.current_attr_name.eq_ignore_ascii_case("id")
                || self.current_attr_name.eq_ignore_ascii_case("name"))
            && self.current_attr_value == self.target
        {
            self.found = true;
        }
        self.current_attr_name.clear();
        self.current_attr_value.clear();
    }

    fn finish_tag(&mut self) {
        self.state = State::Text;
        self.is_start_tag = true;
    }
}

/// The result of streaming a response body through the anchor scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Found,
    NotFound,
    /// The body could not be decoded as UTF-8 at all (a genuinely invalid
    /// byte sequence, not just a chunk boundary splitting a multi-byte
    /// character). Maps to `Status::Ignored` at the prober layer.
    DecodeFailed,
}

/// Consume a byte stream in ≤4 KiB units, decoding as UTF-8 (a carry buffer
/// handles multi-byte characters split across chunk boundaries), and
/// report whether `target` (already percent-decoded by the caller) appears
/// as an `id`/`name` attribute value. Stops reading as soon as the anchor
/// is found.
///
/// A transport-level error reading the stream is passed through so the
/// caller can decide how to classify it.
pub async fn scan_stream<S, E>(mut stream: S, target: &str) -> Result<ScanOutcome, E>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
{
    const MAX_CHUNK: usize = 4096;
    let mut scanner = AnchorScanner::new(target);
    let mut carry: Vec<u8> = Vec::new();

    while let Some(next) = stream.next().await {
        let bytes = next?;
        for window in bytes.chunks(MAX_CHUNK) {
            carry.extend_from_slice(window);
            match std::str::from_utf8(&carry) {
                Ok(text) => {
                    scanner.feed(text);
                    carry.clear();
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if e.error_len().is_some() {
                        // A real invalid byte, not just a truncated
                        // multi-byte sequence at the chunk boundary.
                        return Ok(ScanOutcome::DecodeFailed);
                    }
                    let text = std::str::from_utf8(&carry[..valid_up_to])
                        .expect("valid_up_to prefix is valid utf8");
                    scanner.feed(text);
                    carry.drain(..valid_up_to);
                }
            }
            if scanner.found() {
                return Ok(ScanOutcome::Found);
            }
        }
    }

    if !carry.is_empty() {
        return Ok(ScanOutcome::DecodeFailed);
    }

    Ok(if scanner.found() {
        ScanOutcome::Found
    } else {
        ScanOutcome::NotFound
    })
}
