use std::collections::VecDeque;
use std::io::Read;

use bytes::Bytes;
use framelink_token::{TokenScanner, DEFAULT_POLL_INTERVAL};
use framelink_transport::{SendingMode, UnitSender};
use tracing::{debug, info, trace, warn};

use crate::config::ChunkerConfig;
use crate::error::{RecordError, Result};
use crate::frame::{Frame, FramePoll, FrameSource};
use crate::raw::{read_chunk, ReadOutcome};
use crate::stats::{EncoderCounters, EncoderStats};

/// Split a `<schema-id> <payload>` record.
///
/// Surrounding whitespace is ignored; the id is the first
/// whitespace-delimited token and the payload is the trimmed remainder.
pub fn parse_record(record: &str) -> std::result::Result<(u16, &str), RecordError> {
    let record = record.trim();
    if record.is_empty() {
        return Err(RecordError::MissingSchemaId);
    }
    let (id, payload) = match record.split_once(char::is_whitespace) {
        Some((id, payload)) => (id, payload.trim()),
        None => (record, ""),
    };
    let schema_id = id
        .parse::<u16>()
        .map_err(|_| RecordError::InvalidSchemaId(id.to_string()))?;
    if payload.is_empty() {
        return Err(RecordError::MissingPayload(schema_id));
    }
    Ok((schema_id, payload))
}

/// Forwards delimited text records to the sender as schema-tagged messages.
///
/// Records come either from an input source scanned with the configured
/// delimiters, or are pushed directly with [`push_record`](Self::push_record)
/// by a detached chunker whose records arrive from elsewhere (typically a
/// token reader thread). Malformed records and records the sender rejects
/// are logged, counted and skipped.
pub struct MessageChunker<S, R = std::io::Empty> {
    input: Option<R>,
    sender: S,
    config: ChunkerConfig,
    scanner: TokenScanner,
    pushed: VecDeque<String>,
    read_buf: Vec<u8>,
    exhausted: bool,
    drained: bool,
    counters: EncoderCounters,
}

impl<S: UnitSender> MessageChunker<S> {
    /// Create a chunker fed only through [`push_record`](Self::push_record).
    ///
    /// It reports `Idle` when out of records until [`close`](Self::close)
    /// is called.
    pub fn detached(sender: S, config: ChunkerConfig) -> Result<Self> {
        Self::build(None, sender, config)
    }
}

impl<S: UnitSender, R: Read> MessageChunker<S, R> {
    /// Create a chunker reading records from `input` with default configuration.
    pub fn new(input: R, sender: S) -> Result<Self> {
        Self::with_config(input, sender, ChunkerConfig::default())
    }

    /// Create a chunker reading records from `input`.
    pub fn with_config(input: R, sender: S, config: ChunkerConfig) -> Result<Self> {
        Self::build(Some(input), sender, config)
    }

    fn build(input: Option<R>, sender: S, config: ChunkerConfig) -> Result<Self> {
        let scanner = TokenScanner::new(&config.record_begin, &config.record_end)?;
        let read_buf = vec![0u8; config.read_chunk_size.max(1)];
        Ok(Self {
            input,
            sender,
            config,
            scanner,
            pushed: VecDeque::new(),
            read_buf,
            exhausted: false,
            drained: false,
            counters: EncoderCounters::default(),
        })
    }

    /// Queue one record for sending.
    pub fn push_record(&mut self, record: impl Into<String>) {
        self.pushed.push_back(record.into());
    }

    /// Mark the end of input. Queued records are still sent.
    pub fn close(&mut self) {
        self.exhausted = true;
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn sender_mut(&mut self) -> &mut S {
        &mut self.sender
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Records dropped because they were malformed or rejected.
    pub fn discarded_records(&self) -> u64 {
        self.counters.discarded()
    }

    fn emit(&mut self, payload: Bytes) -> FramePoll {
        let seq = self.counters.frame_emitted();
        trace!(seq, len = payload.len(), "frame ready");
        FramePoll::Ready(Frame { seq, payload })
    }

    fn submit(&mut self, record: &str) {
        if record.trim().is_empty() {
            return;
        }
        match parse_record(record) {
            Ok((schema_id, payload)) => {
                if let Err(err) = self.sender.add_message(schema_id, payload) {
                    warn!(schema_id, error = %err, "message rejected by sender");
                    self.counters.record_discarded();
                }
            }
            Err(err) => {
                warn!(error = %err, "discarding malformed record");
                self.counters.record_discarded();
            }
        }
    }

    /// Next complete record, or `None` if none is available right now.
    fn next_record(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(record) = self.pushed.pop_front() {
                return Ok(Some(record));
            }
            if let Some(token) = self.scanner.next_token() {
                return Ok(Some(String::from_utf8_lossy(&token).into_owned()));
            }
            if self.exhausted {
                let rest = self.scanner.finish();
                if rest.is_empty() {
                    return Ok(None);
                }
                // Input ended without a closing delimiter.
                return Ok(Some(String::from_utf8_lossy(&rest).into_owned()));
            }
            let Some(input) = self.input.as_mut() else {
                return Ok(None);
            };
            match read_chunk(input, &mut self.read_buf)? {
                ReadOutcome::Data(n) => self.scanner.push(&self.read_buf[..n]),
                ReadOutcome::Idle => return Ok(None),
                ReadOutcome::Eof => {
                    debug!(pending = self.scanner.pending(), "message input exhausted");
                    self.exhausted = true;
                }
            }
        }
    }

    fn poll_stream(&mut self) -> Result<FramePoll> {
        loop {
            if let Some(unit) = self.sender.poll_unit() {
                return Ok(self.emit(unit));
            }
            match self.next_record()? {
                Some(record) => self.submit(&record),
                None if self.exhausted => return Ok(FramePoll::Finished),
                None => return Ok(FramePoll::Idle),
            }
        }
    }

    fn poll_lake(&mut self) -> Result<FramePoll> {
        if self.input.is_none() && !self.exhausted {
            // A detached lake is only complete once closed.
            while let Some(record) = self.pushed.pop_front() {
                self.submit(&record);
            }
            return Ok(FramePoll::Idle);
        }
        if let Some(unit) = self.sender.poll_unit() {
            return Ok(self.emit(unit));
        }
        if self.drained {
            return Ok(FramePoll::Finished);
        }

        let mut records = 0usize;
        loop {
            match self.next_record()? {
                Some(record) => {
                    self.submit(&record);
                    records += 1;
                }
                None if self.exhausted => break,
                None => std::thread::sleep(DEFAULT_POLL_INTERVAL),
            }
        }
        self.drained = true;
        info!(records, discarded = self.counters.discarded(), "lake populated");

        match self.sender.poll_unit() {
            Some(unit) => Ok(self.emit(unit)),
            None => Ok(FramePoll::Finished),
        }
    }
}

impl<S: UnitSender, R: Read> FrameSource for MessageChunker<S, R> {
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
            self.scanner.pending(),
            self.sender.stats(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use framelink_transport::{
        ReceivedMessage, SegmentReceiver, SegmentSender, SenderConfig, UnitReceiver,
    };

    use super::*;

    const TRACE: &str = "0 {\"a\":1}\n---\n1 {\"b\":2}\n---\n2   spaced payload  \n---\n";

    fn lake_sender(lake_loop: bool) -> SegmentSender {
        SegmentSender::with_config(SenderConfig {
            mode: SendingMode::Lake,
            lake_loop,
            ..SenderConfig::default()
        })
    }

    fn deliver_all<S: UnitSender, R: Read>(
        chunker: &mut MessageChunker<S, R>,
        max_frames: usize,
    ) -> Vec<ReceivedMessage> {
        let mut receiver = SegmentReceiver::new();
        let mut frames = 0;
        while frames < max_frames {
            match chunker.poll_frame().unwrap() {
                FramePoll::Ready(frame) => {
                    receiver.put_unit(&frame.payload).unwrap();
                    frames += 1;
                }
                FramePoll::Idle => continue,
                FramePoll::Finished => break,
            }
        }
        std::iter::from_fn(|| receiver.poll_message()).collect()
    }

    #[test]
    fn parse_record_cases() {
        assert_eq!(parse_record("  12 {\"x\":1}  \n"), Ok((12, "{\"x\":1}")));
        assert_eq!(parse_record("3\tpayload"), Ok((3, "payload")));
        assert_eq!(parse_record("  \n"), Err(RecordError::MissingSchemaId));
        assert_eq!(
            parse_record("abc payload"),
            Err(RecordError::InvalidSchemaId("abc".to_string()))
        );
        assert_eq!(parse_record("-1 payload").unwrap_err(), RecordError::InvalidSchemaId("-1".into()));
        assert_eq!(parse_record("7"), Err(RecordError::MissingPayload(7)));
    }

    #[test]
    fn stream_sends_each_record_once() {
        let mut chunker =
            MessageChunker::new(Cursor::new(TRACE.as_bytes().to_vec()), SegmentSender::new()).unwrap();

        let messages = deliver_all(&mut chunker, 100);
        let got: Vec<(u16, &str)> = messages
            .iter()
            .map(|m| (m.schema_id, m.text.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![(0, "{\"a\":1}"), (1, "{\"b\":2}"), (2, "spaced payload")]
        );
        assert!(chunker.poll_frame().unwrap().is_finished());
    }

    #[test]
    fn malformed_records_are_skipped_and_counted() {
        let input = "x bad id\n---\n5\n---\n4 good\n---\n";
        let mut chunker =
            MessageChunker::new(Cursor::new(input.as_bytes().to_vec()), SegmentSender::new()).unwrap();

        let messages = deliver_all(&mut chunker, 100);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "good");
        assert_eq!(chunker.discarded_records(), 2);
        assert_eq!(chunker.stats().discarded_records, 2);
    }

    #[test]
    fn trailing_record_without_delimiter_is_sent() {
        let input = "1 first\n---\n2 last without end";
        let mut chunker =
            MessageChunker::new(Cursor::new(input.as_bytes().to_vec()), SegmentSender::new()).unwrap();

        let messages = deliver_all(&mut chunker, 100);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text, "last without end");
    }

    #[test]
    fn dashes_inside_a_record_do_not_split_it() {
        let input = "---\n1 a---b\n---\n2 c --- d\n---";
        let mut chunker =
            MessageChunker::new(Cursor::new(input.as_bytes().to_vec()), SegmentSender::new()).unwrap();

        let messages = deliver_all(&mut chunker, 100);
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["a---b", "c --- d"]);
        assert_eq!(chunker.discarded_records(), 0);
    }

    #[test]
    fn stopped_loop_leaves_frames_and_pending_records_intact() {
        use framelink_loop::{LoopState, SuspendableLoop};

        let input = "1 a\n---\n2 b\n---\n3 c\n---\n4 partial";
        let mut chunker =
            MessageChunker::new(Cursor::new(input.as_bytes().to_vec()), SegmentSender::new()).unwrap();
        let runner = SuspendableLoop::new();
        let handle = runner.handle();
        let mut frames = Vec::new();

        runner.run(|| {
            if let FramePoll::Ready(frame) = chunker.poll_frame().unwrap() {
                frames.push(frame);
            }
            if frames.len() == 2 {
                handle.stop();
            }
            LoopState::Active
        });

        assert_eq!(frames.len(), 2);
        let stats = chunker.stats();
        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.raw_buffered_bytes, "3 c\n---\n4 partial".len());

        let mut receiver = SegmentReceiver::new();
        for frame in &frames {
            receiver.put_unit(&frame.payload).unwrap();
        }
        let rest = deliver_all(&mut chunker, 100);
        let texts: Vec<&str> = rest.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "partial"]);
        assert_eq!(receiver.poll_message().unwrap().text, "a");
        assert_eq!(receiver.poll_message().unwrap().text, "b");
    }

    #[test]
    fn lake_sends_every_record_and_replays() {
        let mut chunker =
            MessageChunker::new(Cursor::new(TRACE.as_bytes().to_vec()), lake_sender(true)).unwrap();

        let mut seen = Vec::new();
        for _ in 0..6 {
            let frame = chunker.poll_frame().unwrap().into_frame().unwrap();
            seen.push(framelink_transport::decode_segment(&frame.payload).unwrap().seq);
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn lake_without_loop_delivers_all_messages_once() {
        let mut chunker =
            MessageChunker::new(Cursor::new(TRACE.as_bytes().to_vec()), lake_sender(false)).unwrap();

        let messages = deliver_all(&mut chunker, 100);
        assert_eq!(messages.len(), 3);
        assert!(chunker.poll_frame().unwrap().is_finished());
    }

    #[test]
    fn detached_chunker_idles_until_closed() {
        let mut chunker =
            MessageChunker::detached(SegmentSender::new(), ChunkerConfig::default()).unwrap();
        assert_eq!(chunker.poll_frame().unwrap(), FramePoll::Idle);

        chunker.push_record("9 pushed");
        assert!(chunker.poll_frame().unwrap().into_frame().is_some());
        assert_eq!(chunker.poll_frame().unwrap(), FramePoll::Idle);

        chunker.close();
        assert!(chunker.poll_frame().unwrap().is_finished());
    }

    #[test]
    fn detached_lake_waits_for_close() {
        let mut chunker = MessageChunker::detached(lake_sender(false), ChunkerConfig::default()).unwrap();
        chunker.push_record("1 a");
        chunker.push_record("1 b");
        assert_eq!(chunker.poll_frame().unwrap(), FramePoll::Idle);

        chunker.push_record("1 c");
        chunker.close();
        let messages = deliver_all(&mut chunker, 100);
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn custom_delimiters() {
        let config = ChunkerConfig {
            record_begin: "<m>".to_string(),
            record_end: "</m>".to_string(),
            read_chunk_size: 3,
            ..ChunkerConfig::default()
        };
        let input = "<log><m>1 alpha</m>\n<m>2 beta</m></log>";
        let mut chunker = MessageChunker::with_config(
            Cursor::new(input.as_bytes().to_vec()),
            SegmentSender::new(),
            config,
        )
        .unwrap();

        let messages = deliver_all(&mut chunker, 100);
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta"]);
    }
}
