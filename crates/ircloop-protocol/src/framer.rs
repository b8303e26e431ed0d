//! Byte-stream framing: turns socket reads into complete protocol lines.
//!
//! The socket hands us chunks of arbitrary size: half a line, or three and a
//! half lines, or a single byte. [`LineFramer`] buffers those chunks and hands
//! back whole lines, with the terminator stripped, as soon as they are
//! complete. Only the undelivered tail is kept between calls.
//!
//! ```text
//! read #1: b"PING :a\r\nPRIV"      → ["PING :a"]
//! read #2: b"MSG #c :hi\r\n"       → ["PRIVMSG #c :hi"]
//! ```

use tracing::{trace, warn};

use crate::ProtocolError;

/// Maximum line length in bytes, terminator included (RFC 2812 §2.3).
pub const DEFAULT_MAX_LINE_LEN: usize = 512;

/// Length of the canonical `\r\n` terminator.
const TERMINATOR_LEN: usize = 2;

/// Incremental line splitter with an overlong-line guard.
///
/// Lines are terminated by `\r\n`; a bare `\n` is accepted too, since some
/// servers are sloppy about it. Empty lines are skipped silently.
///
/// A line longer than the limit is not truncated. The framer yields exactly
/// one [`ProtocolError::LineTooLong`] for it and throws bytes away until the
/// next terminator, so the caller sees the abuse without ever receiving a
/// partial line.
#[derive(Debug)]
pub struct LineFramer {
    buf: Vec<u8>,
    /// Where the next search for `\n` starts; everything before it has
    /// already been scanned.
    scan_from: usize,
    max_len: usize,
    /// Set while dropping the remainder of an overlong line.
    discarding: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Creates a framer with the standard 512-byte limit.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Creates a framer with a custom limit (terminator included).
    ///
    /// Limits smaller than the terminator itself are raised to fit one
    /// content byte.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            scan_from: 0,
            max_len: max_len.max(TERMINATOR_LEN + 1),
            discarding: false,
        }
    }

    /// The configured limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Appends a chunk read from the socket.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes that have not been delivered yet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drops all buffered data. Used when a connection is replaced.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.scan_from = 0;
        self.discarding = false;
    }

    /// Returns an iterator over the lines that are complete right now.
    ///
    /// The iterator is lazy and ends as soon as the buffer holds no further
    /// terminator; call [`push`](Self::push) and `lines()` again after the
    /// next read.
    pub fn lines(&mut self) -> Lines<'_> {
        Lines { framer: self }
    }

    fn max_content_len(&self) -> usize {
        self.max_len - TERMINATOR_LEN
    }

    fn next_line(&mut self) -> Option<Result<String, ProtocolError>> {
        loop {
            let Some(offset) = self.buf[self.scan_from..].iter().position(|b| *b == b'\n') else {
                return self.check_partial();
            };

            let newline = self.scan_from + offset;
            let raw: Vec<u8> = self.buf.drain(..=newline).collect();
            self.scan_from = 0;

            if self.discarding {
                trace!("dropped tail of overlong line");
                self.discarding = false;
                continue;
            }

            let content = strip_terminator(&raw);
            if content.len() > self.max_content_len() {
                return Some(Err(ProtocolError::LineTooLong {
                    limit: self.max_len,
                }));
            }
            if content.is_empty() {
                continue;
            }
            return Some(Ok(decode(content)));
        }
    }

    /// No terminator in the buffer: either wait for more data, or start
    /// discarding if the partial line is already too long.
    fn check_partial(&mut self) -> Option<Result<String, ProtocolError>> {
        if self.discarding {
            self.buf.clear();
            self.scan_from = 0;
            return None;
        }

        // A trailing '\r' may be the first half of the terminator.
        let content_len = match self.buf.last() {
            Some(b'\r') => self.buf.len() - 1,
            _ => self.buf.len(),
        };
        if content_len > self.max_content_len() {
            self.buf.clear();
            self.scan_from = 0;
            self.discarding = true;
            return Some(Err(ProtocolError::LineTooLong {
                limit: self.max_len,
            }));
        }

        self.scan_from = self.buf.len();
        None
    }
}

/// Iterator returned by [`LineFramer::lines`].
pub struct Lines<'a> {
    framer: &'a mut LineFramer,
}

impl Iterator for Lines<'_> {
    type Item = Result<String, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_line()
    }
}

fn strip_terminator(raw: &[u8]) -> &[u8] {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn decode(content: &[u8]) -> String {
    match std::str::from_utf8(content) {
        Ok(s) => s.to_owned(),
        Err(e) => {
            warn!(
                valid_up_to = e.valid_up_to(),
                "invalid UTF-8 in incoming line, replacing malformed bytes"
            );
            String::from_utf8_lossy(content).into_owned()
        }
    }
}
