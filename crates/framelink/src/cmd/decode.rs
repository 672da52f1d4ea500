use std::io::{self, Write};

use framelink_decode::{
    AdaptiveDecoder, BinarizationMode, FrameTracker, LineCodec, ThresholdRange, TrackerConfig,
    DEFAULT_DECODE_FRAME_RATE, DEFAULT_THRESHOLD,
};
use framelink_loop::{frame_interval, LoopConfig, LoopState, SuspendableLoop};
use framelink_transport::{SegmentReceiver, UnitReceiver};
use tracing::{debug, info, trace};

use crate::cmd::{open_lines, DecodeArgs};
use crate::exit::{io_error, threshold_error, tracker_error, CliError, CliResult, SUCCESS};
use crate::output::{print_decoder_stats, write_message, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let mode = binarization_mode(&args)?;
    let config = TrackerConfig {
        window_width: args.width,
        frame_rate: args.framerate,
        expected_frames: args.expected_frames,
        ..TrackerConfig::default()
    };
    let mut tracker = FrameTracker::with_config(SegmentReceiver::new(), config)
        .map_err(|err| tracker_error("invalid decoder settings", err))?;
    let mut decoder = AdaptiveDecoder::with_mode(LineCodec, mode);
    let mut input = open_lines(args.input.as_deref())?;
    debug!(?mode, "decoding");

    let mut out = io::stdout().lock();
    let mut line = String::new();
    let mut failure: Option<CliError> = None;

    let runner = frame_loop(&args);
    runner.run(|| {
        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => return LoopState::Finished,
            Ok(_) => {}
            Err(err) => {
                failure = Some(io_error("frame input failed", err));
                return LoopState::Finished;
            }
        }

        let decoded = decoder.decode(&line);
        tracker.new_frame(decoded.as_deref());

        if let Err(err) = drain_output(&mut tracker, &mut out, &args) {
            if err.kind() == io::ErrorKind::BrokenPipe {
                debug!("decoded output closed");
            } else {
                failure = Some(io_error("decoded output failed", err));
            }
            return LoopState::Finished;
        }
        if args.stats {
            if let Some(snapshot) = tracker.maybe_snapshot() {
                print_decoder_stats(&snapshot, format);
            }
        }
        if tracker.is_lake_transfer_complete() {
            return LoopState::Finished;
        }
        LoopState::Active
    });

    let snapshot = tracker.snapshot();
    info!(
        frames = snapshot.frames_seen,
        lost = snapshot.frames_lost,
        messages = snapshot.messages_received,
        lake_complete = snapshot.lake_complete,
        threshold = ?decoder.threshold(),
        searches = decoder.searches(),
        adoptions = decoder.adoptions(),
        "decoding finished"
    );
    if args.stats {
        print_decoder_stats(&snapshot, format);
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(SUCCESS),
    }
}

/// Unpaced unless `--realtime` asks for the nominal capture rate.
fn frame_loop(args: &DecodeArgs) -> SuspendableLoop {
    if !args.realtime {
        return SuspendableLoop::new();
    }
    SuspendableLoop::with_config(LoopConfig {
        interval: frame_interval(args.framerate, DEFAULT_DECODE_FRAME_RATE),
        ..LoopConfig::default()
    })
}

fn binarization_mode(args: &DecodeArgs) -> CliResult<BinarizationMode> {
    if !args.guess {
        return Ok(match args.threshold {
            Some(threshold) => BinarizationMode::Fixed { threshold },
            None => BinarizationMode::Histogram,
        });
    }
    let range = ThresholdRange::new(
        i32::from(args.guess_min),
        i32::from(args.guess_max),
        i32::from(args.guess_step),
    )
    .map_err(|err| threshold_error("invalid threshold search", err))?;
    Ok(BinarizationMode::Guess {
        threshold: args.threshold.unwrap_or(DEFAULT_THRESHOLD),
        range,
    })
}

/// Write what the receiver has reassembled. Only the kind selected by
/// `--binary` is written; the other is drained and dropped.
fn drain_output<R: UnitReceiver>(
    tracker: &mut FrameTracker<R>,
    out: &mut impl Write,
    args: &DecodeArgs,
) -> io::Result<()> {
    while let Some(message) = tracker.poll_message() {
        if args.binary {
            trace!(schema_id = message.schema_id, "message dropped in binary mode");
            continue;
        }
        write_message(out, &message, args.json)?;
    }

    let bytes = tracker.poll_binary(usize::MAX);
    if !bytes.is_empty() {
        if args.binary {
            out.write_all(&bytes)?;
            out.flush()?;
        } else {
            trace!(len = bytes.len(), "binary data dropped in message mode");
        }
    }
    Ok(())
}
