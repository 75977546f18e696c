//! Header line reader.
//!
//! Streams the leading run of one-record-per-line JSON text from a byte
//! stream, one classified line at a time. The header ends at the first line
//! that is blank (whitespace only) or that is not a JSON object with exactly
//! one key - including syntactically valid objects carrying two or more keys.
//! The terminating line is classified but never interpreted; its starting
//! offset is captured before any parse attempt so the binary resume point is
//! correct even when the line is the start of payload data.

use crate::util::{Error, Result};
use serde_json::Value;
use std::io::BufRead;
use tracing::trace;

/// Why the header ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// A whitespace-only line; `consumed` is its length including the
    /// terminator, so the payload starts right after it.
    BlankLine { consumed: u64 },
    /// A line that is not a single-key JSON object. The line itself may be
    /// the first bytes of an inline payload.
    Unparseable,
    /// The stream ended. Valid only when the required core fields have
    /// already been seen (detached-payload headers need no separator line).
    Eof,
}

/// Where and why the header ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderEnd {
    /// Stream offset of the first byte of the terminating line.
    pub offset: u64,
    /// Terminator classification.
    pub reason: EndReason,
}

impl HeaderEnd {
    /// Offset at which an inline payload begins: after the blank separator
    /// line, or at the terminating line itself when that line is data.
    #[inline]
    pub fn data_offset(&self) -> u64 {
        match self.reason {
            EndReason::BlankLine { consumed } => self.offset + consumed,
            EndReason::Unparseable | EndReason::Eof => self.offset,
        }
    }
}

/// Lazy reader producing one `(key, value)` record per header line.
///
/// Lines are LF or CRLF terminated UTF-8. I/O failures and invalid UTF-8 are
/// fatal; every other anomaly merely ends the header, so the payload offset
/// can be recovered even from headers this implementation cannot interpret.
pub struct RecordReader<R> {
    inner: R,
    offset: u64,
    end: Option<HeaderEnd>,
    line: Vec<u8>,
}

impl<R: BufRead> RecordReader<R> {
    /// Wrap a buffered stream positioned at the start of the header.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            end: None,
            line: Vec::new(),
        }
    }

    /// Stream offset of the next unread byte.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Termination report, available once `next_record` has returned `None`.
    #[inline]
    pub fn end(&self) -> Option<&HeaderEnd> {
        self.end.as_ref()
    }

    /// Consume the reader, returning the termination report.
    pub fn into_end(self) -> Option<HeaderEnd> {
        self.end
    }

    /// Read and classify the next line.
    ///
    /// Returns `Ok(Some((key, value)))` for a record, `Ok(None)` once the
    /// header has ended (see [`end`](Self::end) for where and why), and an
    /// error only for I/O failures or malformed UTF-8.
    pub fn next_record(&mut self) -> Result<Option<(String, Value)>> {
        if self.end.is_some() {
            return Ok(None);
        }

        let line_start = self.offset;
        self.line.clear();
        let consumed = self.inner.read_until(b'\n', &mut self.line)?;
        if consumed == 0 {
            self.end = Some(HeaderEnd {
                offset: line_start,
                reason: EndReason::Eof,
            });
            return Ok(None);
        }
        self.offset += consumed as u64;

        let text = std::str::from_utf8(&self.line)?;
        let text = text.strip_suffix('\n').unwrap_or(text);
        let text = text.strip_suffix('\r').unwrap_or(text);

        if text.trim().is_empty() {
            trace!(offset = line_start, "header ends at blank line");
            self.end = Some(HeaderEnd {
                offset: line_start,
                reason: EndReason::BlankLine {
                    consumed: consumed as u64,
                },
            });
            return Ok(None);
        }

        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) if map.len() == 1 => {
                let (key, value) = map
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::other("single-key object had no entry"))?;
                Ok(Some((key, value)))
            }
            _ => {
                // zero or multiple keys, a non-object value, or a parse
                // failure: the header is over and this line is not ours
                trace!(offset = line_start, "header ends at unparseable line");
                self.end = Some(HeaderEnd {
                    offset: line_start,
                    reason: EndReason::Unparseable,
                });
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn drain(input: &[u8]) -> (Vec<(String, Value)>, HeaderEnd) {
        let mut reader = RecordReader::new(Cursor::new(input.to_vec()));
        let mut records = Vec::new();
        while let Some(record) = reader.next_record().unwrap() {
            records.push(record);
        }
        let end = reader.into_end().expect("reader must report an end");
        (records, end)
    }

    #[test]
    fn test_records_until_blank_line() {
        let input = b"{\"jnrrd\": \"0004\"}\n{\"dimension\": 3}\n\nBINARY";
        let (records, end) = drain(input);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, "jnrrd");
        assert_eq!(records[1].1, json!(3));
        // offset of the blank line itself
        assert_eq!(end.offset, 35);
        assert_eq!(end.reason, EndReason::BlankLine { consumed: 1 });
        // payload begins right after it
        assert_eq!(end.data_offset(), 36);
        assert_eq!(&input[end.data_offset() as usize..], b"BINARY");
    }

    #[test]
    fn test_unparseable_line_ends_header() {
        let input = b"{\"type\": \"uint8\"}\nnot json at all\n";
        let (records, end) = drain(input);
        assert_eq!(records.len(), 1);
        assert_eq!(end.offset, 18);
        assert_eq!(end.reason, EndReason::Unparseable);
        // the line is data: resume exactly at its first byte
        assert_eq!(end.data_offset(), 18);
    }

    #[test]
    fn test_two_key_object_ends_header() {
        let input = b"{\"type\": \"uint8\"}\n{\"a\": 1, \"b\": 2}\n";
        let (records, end) = drain(input);
        assert_eq!(records.len(), 1);
        assert_eq!(end.offset, 18);
        assert_eq!(end.reason, EndReason::Unparseable);
    }

    #[test]
    fn test_non_object_json_ends_header() {
        let input = b"{\"type\": \"uint8\"}\n42\n";
        let (records, end) = drain(input);
        assert_eq!(records.len(), 1);
        assert_eq!(end.reason, EndReason::Unparseable);
    }

    #[test]
    fn test_crlf_lines() {
        let input = b"{\"dimension\": 2}\r\n{\"type\": \"int16\"}\r\n\r\nXY";
        let (records, end) = drain(input);
        assert_eq!(records.len(), 2);
        assert_eq!(end.reason, EndReason::BlankLine { consumed: 2 });
        assert_eq!(&input[end.data_offset() as usize..], b"XY");
    }

    #[test]
    fn test_whitespace_only_line_is_blank() {
        let input = b"{\"dimension\": 2}\n   \t\nrest";
        let (records, end) = drain(input);
        assert_eq!(records.len(), 1);
        assert!(matches!(end.reason, EndReason::BlankLine { .. }));
        assert_eq!(&input[end.data_offset() as usize..], b"rest");
    }

    #[test]
    fn test_eof_reported() {
        let input = b"{\"dimension\": 2}\n";
        let (records, end) = drain(input);
        assert_eq!(records.len(), 1);
        assert_eq!(end.reason, EndReason::Eof);
        assert_eq!(end.offset, input.len() as u64);
    }

    #[test]
    fn test_invalid_utf8_is_fatal() {
        let input = b"{\"dimension\": 2}\n\xff\xfe junk\n";
        let mut reader = RecordReader::new(Cursor::new(input.to_vec()));
        assert!(reader.next_record().unwrap().is_some());
        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, Error::MalformedStream(_)));
    }

    #[test]
    fn test_offset_captured_before_parse() {
        // nested containers in a record must not disturb offsets
        let input =
            b"{\"extensions\": {\"ome\": \"https://example.org/ome\"}}\n{bad\n";
        let (records, end) = drain(input);
        assert_eq!(records.len(), 1);
        assert_eq!(end.offset, 51);
    }
}
