use std::io::{ErrorKind, Read};
use std::time::Duration;

use bytes::Bytes;
use framelink_loop::LoopHandle;
use tracing::{debug, trace, warn};

use crate::error::{CallbackAbort, Result, TokenError};
use crate::scanner::TokenScanner;
use crate::source::SourceKind;

/// End-of-transmission marker on pipe sources (ASCII 4, EOT).
pub const END_OF_TRANSMISSION: u8 = 0x04;

/// Default number of bytes requested from the source per poll.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Default pause between two polls of an idle pipe.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Configuration for a [`TokenReader`].
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Delimiter opening a token. May be empty.
    pub begin: String,
    /// Delimiter closing a token. Default: `---`.
    pub end: String,
    /// Whether "no data" means end of input (file) or idle (pipe).
    pub kind: SourceKind,
    /// Bytes requested per poll. Default: 16 KiB.
    pub chunk_size: usize,
    /// Pause between polls of an idle pipe. Default: 100 µs.
    pub poll_interval: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            begin: String::new(),
            end: "---".to_string(),
            kind: SourceKind::File,
            chunk_size: DEFAULT_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Why a [`TokenReader`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// A file source ran out of data.
    EndOfFile,
    /// A pipe source delivered the end-of-transmission marker.
    EndOfTransmission,
    /// The token callback asked to abort.
    Aborted,
    /// The controlling loop was stopped.
    Stopped,
}

/// Polls a byte source and delivers delimiter-bounded tokens to a callback.
///
/// Handles partial reads internally; a token is delivered exactly once, in
/// the order its end delimiter was observed.
pub struct TokenReader<T> {
    inner: T,
    scanner: TokenScanner,
    config: ReaderConfig,
    stop: Option<LoopHandle>,
    delivered: u64,
    exit: Option<ReaderExit>,
}

impl<T: Read> TokenReader<T> {
    /// Create a reader with default configuration.
    pub fn new(inner: T) -> Result<Self> {
        Self::with_config(inner, ReaderConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(inner: T, config: ReaderConfig) -> Result<Self> {
        let scanner = TokenScanner::new(&config.begin, &config.end)?;
        Ok(Self {
            inner,
            scanner,
            config,
            stop: None,
            delivered: 0,
            exit: None,
        })
    }

    /// Stop reading once `handle` reports the loop finished.
    pub fn with_stop_handle(mut self, handle: LoopHandle) -> Self {
        self.stop = Some(handle);
        self
    }

    /// Read until the source ends, the callback aborts, or the loop stops.
    ///
    /// The callback receives each token and the number of bytes still
    /// buffered after that token was removed.
    pub fn run<F>(&mut self, mut callback: F) -> Result<ReaderExit>
    where
        F: FnMut(Bytes, usize) -> std::result::Result<(), CallbackAbort>,
    {
        let mut chunk = vec![0u8; self.config.chunk_size.max(1)];

        let exit = loop {
            if self.stop.as_ref().is_some_and(LoopHandle::is_finished) {
                break ReaderExit::Stopped;
            }

            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => 0,
                Err(err) => return Err(TokenError::Io(err)),
            };

            if read == 0 {
                match self.config.kind {
                    SourceKind::File => break ReaderExit::EndOfFile,
                    SourceKind::Pipe => {
                        std::thread::sleep(self.config.poll_interval);
                        continue;
                    }
                }
            }

            let data = &chunk[..read];
            let eot_at = match self.config.kind {
                SourceKind::Pipe => data.iter().position(|&b| b == END_OF_TRANSMISSION),
                SourceKind::File => None,
            };
            let usable = match eot_at {
                Some(at) => &data[..at],
                None => data,
            };
            trace!(bytes = usable.len(), "token source chunk");
            self.scanner.push(usable);

            if let Err(abort) = self.drain(&mut callback) {
                warn!(reason = %abort.reason, "token reader aborted by callback");
                break ReaderExit::Aborted;
            }

            if eot_at.is_some() {
                break ReaderExit::EndOfTransmission;
            }
        };

        debug!(?exit, tokens = self.delivered, "token reader finished");
        self.exit = Some(exit);
        Ok(exit)
    }

    fn drain<F>(&mut self, callback: &mut F) -> std::result::Result<(), CallbackAbort>
    where
        F: FnMut(Bytes, usize) -> std::result::Result<(), CallbackAbort>,
    {
        while let Some(token) = self.scanner.next_token() {
            self.delivered = self.delivered.saturating_add(1);
            callback(token, self.scanner.pending())?;
        }
        Ok(())
    }

    /// Why the last call to [`run`](Self::run) returned, if it has.
    pub fn exit(&self) -> Option<ReaderExit> {
        self.exit
    }

    /// Number of tokens delivered so far.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Bytes read but not yet part of a complete token.
    pub fn pending(&self) -> usize {
        self.scanner.pending()
    }

    /// Remove and return the incomplete trailing token.
    ///
    /// See [`TokenScanner::finish`] for how a dangling line delimiter is handled.
    pub fn take_remainder(&mut self) -> Bytes {
        self.scanner.finish()
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }
}
