use std::io::Read;

use bytes::{Bytes, BytesMut};
use framelink_token::DEFAULT_POLL_INTERVAL;
use framelink_transport::{SendingMode, UnitSender};
use tracing::{debug, info, trace};

use crate::config::ChunkerConfig;
use crate::error::Result;
use crate::frame::{Frame, FramePoll, FrameSource};
use crate::raw::{read_chunk, RawBuffer, ReadOutcome};
use crate::stats::{EncoderCounters, EncoderStats};

/// Cuts a byte stream into blobs of the sender's maximum payload size.
pub struct BinaryChunker<R, S> {
    input: R,
    sender: S,
    config: ChunkerConfig,
    raw: RawBuffer,
    read_buf: Vec<u8>,
    exhausted: bool,
    drained: bool,
    counters: EncoderCounters,
}

impl<R: Read, S: UnitSender> BinaryChunker<R, S> {
    /// Create a chunker with default configuration.
    pub fn new(input: R, sender: S) -> Self {
        Self::with_config(input, sender, ChunkerConfig::default())
    }

    /// Create a chunker with explicit configuration.
    pub fn with_config(input: R, sender: S, config: ChunkerConfig) -> Self {
        let read_buf = vec![0u8; config.read_chunk_size.max(1)];
        Self {
            input,
            sender,
            config,
            raw: RawBuffer::new(),
            read_buf,
            exhausted: false,
            drained: false,
            counters: EncoderCounters::default(),
        }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn sender_mut(&mut self) -> &mut S {
        &mut self.sender
    }

    /// Input bytes read but not yet handed to the sender.
    pub fn raw_buffer(&self) -> &RawBuffer {
        &self.raw
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Whether the input source has reported end of input.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn into_parts(self) -> (R, S) {
        (self.input, self.sender)
    }

    fn emit(&mut self, payload: Bytes) -> FramePoll {
        let seq = self.counters.frame_emitted();
        trace!(seq, len = payload.len(), "frame ready");
        FramePoll::Ready(Frame { seq, payload })
    }

    fn unit_size(&self) -> usize {
        self.sender.max_blob_payload().max(1)
    }

    fn submit_unit(&mut self, unit_size: usize) -> Result<()> {
        let chunk = self.raw.truncate_prefix(unit_size);
        if self.config.pad && chunk.len() < unit_size {
            let mut padded = BytesMut::from(chunk.as_ref());
            padded.resize(unit_size, 0);
            self.sender.add_blob(&padded)?;
        } else {
            self.sender.add_blob(&chunk)?;
        }
        Ok(())
    }

    /// Read one chunk into the raw buffer. Returns false if the source is idle.
    fn fill(&mut self) -> Result<bool> {
        match read_chunk(&mut self.input, &mut self.read_buf)? {
            ReadOutcome::Data(n) => {
                self.raw.append(&self.read_buf[..n]);
                Ok(true)
            }
            ReadOutcome::Idle => Ok(false),
            ReadOutcome::Eof => {
                debug!(buffered = self.raw.len(), "binary input exhausted");
                self.exhausted = true;
                Ok(true)
            }
        }
    }

    fn poll_stream(&mut self) -> Result<FramePoll> {
        loop {
            if let Some(unit) = self.sender.poll_unit() {
                return Ok(self.emit(unit));
            }

            let unit_size = self.unit_size();
            if self.raw.len() >= unit_size || (self.exhausted && !self.raw.is_empty()) {
                self.submit_unit(unit_size)?;
                continue;
            }
            if self.exhausted {
                return Ok(FramePoll::Finished);
            }
            if !self.fill()? {
                return Ok(FramePoll::Idle);
            }
        }
    }

    fn poll_lake(&mut self) -> Result<FramePoll> {
        if let Some(unit) = self.sender.poll_unit() {
            return Ok(self.emit(unit));
        }
        if self.drained {
            return Ok(FramePoll::Finished);
        }

        while !self.exhausted {
            if !self.fill()? {
                std::thread::sleep(DEFAULT_POLL_INTERVAL);
            }
        }
        let unit_size = self.unit_size();
        let total_bytes = self.raw.len();
        let mut units = 0usize;
        while !self.raw.is_empty() {
            self.submit_unit(unit_size)?;
            units += 1;
        }
        self.drained = true;
        info!(units, bytes = total_bytes, "lake populated");

        match self.sender.poll_unit() {
            Some(unit) => Ok(self.emit(unit)),
            None => Ok(FramePoll::Finished),
        }
    }
}

impl<R: Read, S: UnitSender> FrameSource for BinaryChunker<R, S> {
    fn poll_frame(&mut self) -> Result<FramePoll> {
        match self.sender.sending_mode() {
            SendingMode::Stream => self.poll_stream(),
            SendingMode::Lake => self.poll_lake(),
        }
    }

    fn stats(&self) -> EncoderStats {
        self.counters.snapshot(
            self.sender.sending_mode(),
            self.config.effective_frame_rate(),
            self.raw.len(),
            self.sender.stats(),
        )
    }
}
