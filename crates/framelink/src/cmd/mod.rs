use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use framelink_decode::{to_threshold, THRESHOLD_MAX, THRESHOLD_MIN, THRESHOLD_STEP};
use framelink_transport::DEFAULT_FRAME_MAX_LENGTH;

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Chunk input into frames and write one base64 frame per line.
    Encode(EncodeArgs),
    /// Read captured frames, one per line, and reassemble the stream.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Input file. Reads stdin when omitted or `-`.
    pub input: Option<PathBuf>,
    /// Treat input as raw bytes instead of `<schema-id> <payload>` records.
    #[arg(long)]
    pub binary: bool,
    /// Read the whole input up front and replay the unit set.
    #[arg(long)]
    pub lake: bool,
    /// With --lake, send the unit set once instead of replaying it.
    #[arg(long, requires = "lake")]
    pub no_loop: bool,
    /// Stdin is a live pipe: keep polling until end-of-transmission (ASCII 4).
    #[arg(long, conflicts_with = "input")]
    pub pipe: bool,
    /// Maximum frame length in bytes, segment header included.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_FRAME_MAX_LENGTH)]
    pub frame_size: usize,
    /// Frames per second; 0 or less selects the default.
    #[arg(long, value_name = "FPS", default_value_t = 0, allow_negative_numbers = true)]
    pub framerate: i32,
    /// Zero-pad the final binary unit to full size.
    #[arg(long, requires = "binary")]
    pub pad: bool,
    /// Directory of `schema_<id>.schema.json` files; other schema ids are rejected.
    #[arg(long, value_name = "DIR")]
    pub schemas: Option<PathBuf>,
    /// Print encoder statistics to stderr.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Captured frames, one per line (empty line = undecodable). Reads stdin
    /// when omitted or `-`.
    pub input: Option<PathBuf>,
    /// Write reassembled bytes instead of messages.
    #[arg(long)]
    pub binary: bool,
    /// Write messages as JSON lines.
    #[arg(long, conflicts_with = "binary")]
    pub json: bool,
    /// Nominal capture rate; 0 or less selects the default.
    #[arg(long, value_name = "FPS", default_value_t = 0, allow_negative_numbers = true)]
    pub framerate: i32,
    /// Link quality window, in frames.
    #[arg(long, value_name = "FRAMES", default_value_t = framelink_decode::DEFAULT_WINDOW_WIDTH)]
    pub width: usize,
    /// Number of frames the capture is expected to contain.
    #[arg(long, value_name = "FRAMES")]
    pub expected_frames: Option<u64>,
    /// Fixed binarization threshold (0-255).
    #[arg(long, value_parser = parse_threshold)]
    pub threshold: Option<u8>,
    /// Search for a better threshold whenever a frame fails to decode.
    #[arg(long)]
    pub guess: bool,
    /// Lower bound of the threshold search.
    #[arg(long, value_parser = parse_threshold, default_value_t = THRESHOLD_MIN, requires = "guess")]
    pub guess_min: u8,
    /// Upper bound of the threshold search.
    #[arg(long, value_parser = parse_threshold, default_value_t = THRESHOLD_MAX, requires = "guess")]
    pub guess_max: u8,
    /// Distance between two search candidates.
    #[arg(long, value_parser = parse_threshold, default_value_t = THRESHOLD_STEP, requires = "guess")]
    pub guess_step: u8,
    /// Process at most one frame per frame interval, as a live camera would.
    #[arg(long)]
    pub realtime: bool,
    /// Print link statistics to stderr.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_threshold(value: &str) -> Result<u8, String> {
    let value: i32 = value.trim().parse().map_err(|err| format!("{err}"))?;
    to_threshold(value).map_err(|err| err.to_string())
}

/// Open `path`, or stdin when it is absent or `-`.
pub(crate) fn open_input(path: Option<&Path>) -> CliResult<Box<dyn Read>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("cannot open {}", path.display()), err))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(io::stdin())),
    }
}

pub(crate) fn open_lines(path: Option<&Path>) -> CliResult<Box<dyn BufRead>> {
    Ok(Box::new(BufReader::new(open_input(path)?)))
}
