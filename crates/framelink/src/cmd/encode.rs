use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use base64::Engine as _;
use framelink_chunk::{
    BinaryChunker, ChunkerConfig, EncoderStats, FramePoll, FrameSource, MessageChunker,
};
use framelink_decode::{CodeWriter, LineCodec};
use framelink_loop::{LoopConfig, LoopHandle, LoopState, RefreshThrottle, SuspendableLoop};
use framelink_schema::{RegistryConfig, SchemaRegistry};
use framelink_token::{CallbackAbort, ReaderConfig, ReaderExit, SourceKind, TokenError, TokenReader};
use framelink_transport::{SegmentSender, SenderConfig, SendingMode};
use tracing::{debug, info, warn};

use crate::cmd::{open_input, EncodeArgs};
use crate::exit::{
    chunk_error, io_error, schema_error, token_error, CliError, CliResult, INTERNAL, SUCCESS,
};
use crate::output::{print_encoder_stats, OutputFormat};

type RecordThread = JoinHandle<Result<ReaderExit, TokenError>>;

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mode = if args.lake {
        SendingMode::Lake
    } else {
        SendingMode::Stream
    };
    let sender = build_sender(&args, mode)?;
    let config = ChunkerConfig {
        pad: args.pad,
        frame_rate: args.framerate,
        ..ChunkerConfig::default()
    };
    let fps = config.effective_frame_rate();
    let runner = SuspendableLoop::with_config(LoopConfig {
        interval: config.frame_interval(),
        ..LoopConfig::default()
    });
    install_ctrlc_handler(runner.handle())?;

    let _stdin_mode = if args.pipe {
        Some(prepare_pipe()?)
    } else {
        None
    };

    let mut record_thread = None;
    let mut source: Box<dyn FrameSource> = if args.binary {
        let input = open_input(args.input.as_deref())?;
        Box::new(BinaryChunker::with_config(input, sender, config))
    } else if args.pipe {
        let (tx, rx) = mpsc::channel();
        record_thread = Some(spawn_record_reader(tx, &config, runner.handle())?);
        let chunker = MessageChunker::detached(sender, config)
            .map_err(|err| chunk_error("invalid record delimiters", err))?;
        Box::new(PipedRecords::new(chunker, rx))
    } else {
        let input = open_input(args.input.as_deref())?;
        let chunker = MessageChunker::with_config(input, sender, config)
            .map_err(|err| chunk_error("invalid record delimiters", err))?;
        Box::new(chunker)
    };

    info!(%mode, fps, binary = args.binary, pipe = args.pipe, "encoding");

    let codec = LineCodec;
    let mut out = io::stdout().lock();
    let mut throttle = RefreshThrottle::default();
    let mut failure: Option<CliError> = None;

    let iterations = runner.run(|| match source.poll_frame() {
        Ok(FramePoll::Ready(frame)) => {
            let text = base64::engine::general_purpose::STANDARD.encode(&frame.payload);
            let Some(line) = codec.encode(&text) else {
                warn!(seq = frame.seq, "frame could not be rendered");
                return LoopState::Active;
            };
            if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
                if err.kind() == io::ErrorKind::BrokenPipe {
                    debug!("frame output closed");
                } else {
                    failure = Some(io_error("frame output failed", err));
                }
                return LoopState::Finished;
            }
            if args.stats && throttle.ready() {
                print_encoder_stats(&source.stats(), format);
            }
            LoopState::Active
        }
        Ok(FramePoll::Idle) => LoopState::Active,
        Ok(FramePoll::Finished) => LoopState::Finished,
        Err(err) => {
            failure = Some(chunk_error("chunking failed", err));
            LoopState::Finished
        }
    });

    let stats = source.stats();
    info!(
        iterations,
        frames = stats.frames_sent,
        discarded = stats.discarded_records,
        "encoding finished"
    );
    if args.stats {
        print_encoder_stats(&stats, format);
    }

    if let Some(handle) = record_thread {
        if let Err(err) = join_record_reader(handle) {
            failure.get_or_insert(err);
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(SUCCESS),
    }
}

fn build_sender(args: &EncodeArgs, mode: SendingMode) -> CliResult<SegmentSender> {
    let sender = SegmentSender::with_config(SenderConfig {
        frame_max_length: args.frame_size,
        mode,
        lake_loop: !args.no_loop,
        ..SenderConfig::default()
    });
    if sender.config().frame_max_length != args.frame_size {
        warn!(
            requested = args.frame_size,
            used = sender.config().frame_max_length,
            "frame size clamped"
        );
    }

    let Some(dir) = &args.schemas else {
        return Ok(sender);
    };
    let registry = SchemaRegistry::from_directory_with_config(dir, RegistryConfig::closed())
        .map_err(|err| schema_error("schema load failed", err))?;
    info!(schemas = ?registry.schema_ids(), dir = %dir.display(), "schema registry loaded");
    Ok(sender.with_registry(registry))
}

/// Make stdin non-blocking so an idle pipe never stalls the frame loop.
/// Its original mode is restored when the guard drops.
#[cfg(unix)]
fn prepare_pipe() -> CliResult<framelink_token::NonBlockingGuard> {
    framelink_token::set_nonblocking(&io::stdin())
        .map_err(|err| io_error("cannot configure stdin", err))
}

#[cfg(not(unix))]
fn prepare_pipe() -> CliResult<()> {
    Ok(())
}

/// Feeds records read from a live pipe into a detached chunker.
struct PipedRecords {
    chunker: MessageChunker<SegmentSender>,
    records: Receiver<String>,
    closed: bool,
}

impl PipedRecords {
    fn new(chunker: MessageChunker<SegmentSender>, records: Receiver<String>) -> Self {
        Self {
            chunker,
            records,
            closed: false,
        }
    }
}

impl FrameSource for PipedRecords {
    fn poll_frame(&mut self) -> framelink_chunk::Result<FramePoll> {
        while !self.closed {
            match self.records.try_recv() {
                Ok(record) => self.chunker.push_record(record),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.chunker.close();
                    self.closed = true;
                }
            }
        }
        self.chunker.poll_frame()
    }

    fn stats(&self) -> EncoderStats {
        self.chunker.stats()
    }
}

fn spawn_record_reader(
    records: Sender<String>,
    chunker: &ChunkerConfig,
    stop: LoopHandle,
) -> CliResult<RecordThread> {
    let config = ReaderConfig {
        begin: chunker.record_begin.clone(),
        end: chunker.record_end.clone(),
        kind: SourceKind::Pipe,
        ..ReaderConfig::default()
    };
    thread::Builder::new()
        .name("framelink-records".to_string())
        .spawn(move || {
            let mut reader = TokenReader::with_config(io::stdin(), config)?.with_stop_handle(stop);
            let exit = reader.run(|token, pending| {
                debug!(len = token.len(), pending, "record received");
                records
                    .send(String::from_utf8_lossy(&token).into_owned())
                    .map_err(|_| CallbackAbort::new("frame loop has exited"))
            })?;

            let rest = reader.take_remainder();
            if exit == ReaderExit::EndOfTransmission && !rest.is_empty() {
                let _ = records.send(String::from_utf8_lossy(&rest).into_owned());
            }
            Ok(exit)
        })
        .map_err(|err| io_error("cannot start record reader", err))
}

fn join_record_reader(handle: RecordThread) -> CliResult<()> {
    // Without a non-blocking stdin the reader may still sit in read().
    if !handle.is_finished() {
        debug!("record reader still blocked, detaching");
        return Ok(());
    }
    match handle.join() {
        Ok(Ok(exit)) => {
            debug!(?exit, "record reader finished");
            Ok(())
        }
        Ok(Err(err)) => Err(token_error("record reader failed", err)),
        Err(_) => Err(CliError::new(INTERNAL, "record reader panicked")),
    }
}

fn install_ctrlc_handler(handle: LoopHandle) -> CliResult<()> {
    ctrlc::set_handler(move || {
        handle.stop();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
