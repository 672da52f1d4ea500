use bytes::{Bytes, BytesMut};

use crate::error::{Result, TokenError};

const INITIAL_BUFFER_CAPACITY: usize = 16 * 1024;

/// Cuts `(begin, end)` delimited tokens out of an append-only byte buffer.
///
/// The scanner remembers how far the end-delimiter search got, so appending
/// more data only scans the new bytes (plus a delimiter-sized overlap).
///
/// A token spans from just after the last `begin` delimiter preceding the
/// end delimiter up to the end delimiter itself; neither delimiter is part
/// of the returned token. When no `begin` delimiter precedes the end (or
/// `begin` is empty) the token starts at the front of the buffer. Bytes in
/// front of the token are discarded together with it.
///
/// An end delimiter that opens with `\n`, such as `"\n---\n"`, marks a
/// whole line. With an empty `begin` it also matches without its leading
/// newline at the start of input and right after a previous delimiter.
#[derive(Debug, Clone)]
pub struct TokenScanner {
    buf: BytesMut,
    begin: Vec<u8>,
    end: Vec<u8>,
    scan_from: usize,
    line_start: bool,
}

impl TokenScanner {
    /// Create a scanner for the given delimiters. `end` must not be empty.
    pub fn new(begin: impl AsRef<[u8]>, end: impl AsRef<[u8]>) -> Result<Self> {
        let end = end.as_ref().to_vec();
        if end.is_empty() {
            return Err(TokenError::EmptyDelimiter);
        }
        let begin = begin.as_ref().to_vec();
        let line_start = opens_line(&begin, &end);
        Ok(Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            begin,
            end,
            scan_from: 0,
            line_start,
        })
    }

    /// Append newly read bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Extract the next complete token, if any.
    pub fn next_token(&mut self) -> Option<Bytes> {
        if self.line_start {
            let bare = &self.end[1..];
            if self.buf.len() < bare.len() && bare.starts_with(&self.buf) {
                return None;
            }
            if self.buf.starts_with(bare) {
                let _ = self.buf.split_to(bare.len());
                self.scan_from = 0;
                self.line_start = self.end.ends_with(b"\n");
                return Some(Bytes::new());
            }
            self.line_start = false;
        }

        let end_at = match find(&self.buf[self.scan_from..], &self.end) {
            Some(offset) => self.scan_from + offset,
            None => {
                // Keep a delimiter-sized overlap so a split delimiter is found next time.
                self.scan_from = self.buf.len().saturating_sub(self.end.len() - 1);
                return None;
            }
        };

        let start = if self.begin.is_empty() {
            0
        } else {
            rfind(&self.buf[..end_at], &self.begin)
                .map(|at| at + self.begin.len())
                .unwrap_or(0)
        };

        let mut consumed = self.buf.split_to(end_at + self.end.len());
        consumed.truncate(end_at);
        let token = consumed.split_off(start).freeze();
        self.scan_from = 0;
        self.line_start = opens_line(&self.begin, &self.end) && self.end.ends_with(b"\n");
        Some(token)
    }

    /// Number of bytes buffered but not yet part of an extracted token.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Remove and return everything still buffered.
    pub fn take_remainder(&mut self) -> Bytes {
        self.scan_from = 0;
        self.line_start = opens_line(&self.begin, &self.end);
        self.buf.split().freeze()
    }

    /// Remove and return the buffered bytes as the final token of the input.
    ///
    /// A line delimiter cut short by the end of input (`"...\n---"` with no
    /// newline after it) is dropped instead of becoming part of the token.
    pub fn finish(&mut self) -> Bytes {
        let line_start = self.line_start;
        let mut rest = self.take_remainder();
        let Some(open) = self.end.strip_suffix(b"\n") else {
            return rest;
        };
        if !opens_line(&self.begin, &self.end) {
            return rest;
        }
        if rest.ends_with(open) {
            rest.truncate(rest.len() - open.len());
        } else if line_start && rest.as_ref() == &open[1..] {
            rest.clear();
        }
        rest
    }
}

fn opens_line(begin: &[u8], end: &[u8]) -> bool {
    begin.is_empty() && end.len() > 1 && end[0] == b'\n'
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|window| window == needle)
}
