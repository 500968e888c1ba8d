//! Parsing of `journalctl --show-cursor` output.
//!
//! The output is a list of records followed by a trailer made of a blank line
//! and a `-- cursor: <token>` line. Depending on how the journal terminates the
//! stream the blank line shows up either before the cursor line or as the
//! empty remainder after its final newline; both shapes are accepted.

use thiserror::Error;

/// Prefix of the trailer line carrying the next resumption token
pub const CURSOR_MARKER: &str = "-- cursor: ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("at least 2 lines expected, got {0}")]
    TooFewLines(usize),

    #[error("cursor trailer missing, last line was {0:?}")]
    MissingCursor(String),
}

#[derive(Debug)]
pub struct JournalOutput<'a> {
    /// Record lines, without their terminating newline
    pub lines: Vec<&'a [u8]>,
    /// Token to resume after the last record
    pub cursor: String,
}

pub fn parse_output(raw: &[u8]) -> Result<JournalOutput<'_>, ProtocolError> {
    let mut lines: Vec<&[u8]> = raw.split(|b| *b == b'\n').collect();
    if lines.len() < 2 {
        return Err(ProtocolError::TooFewLines(lines.len()));
    }

    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    let cursor_line = lines.pop().unwrap_or_default();
    let cursor_line = String::from_utf8_lossy(cursor_line);
    let cursor = match cursor_line.strip_prefix(CURSOR_MARKER) {
        Some(cursor) if !cursor.trim().is_empty() => cursor.trim_end_matches('\r').to_string(),
        _ => return Err(ProtocolError::MissingCursor(cursor_line.into_owned())),
    };

    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    Ok(JournalOutput { lines, cursor })
}
