use std::io::{self, IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framelink_chunk::EncoderStats;
use framelink_decode::StatsSnapshot;
use framelink_transport::{CategoryStats, ReceivedMessage};
use serde::Serialize;

/// Rendering of the statistics written to stderr.
#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stderr() -> Self {
        if std::io::stderr().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    schema_id: u16,
    text: &'a str,
}

/// Write a decoded message as a `<schema-id> <payload>` record, or as a
/// JSON line.
pub fn write_message(out: &mut impl Write, message: &ReceivedMessage, json: bool) -> io::Result<()> {
    if json {
        let line = serde_json::to_string(&MessageOutput {
            schema_id: message.schema_id,
            text: &message.text,
        })
        .map_err(io::Error::other)?;
        writeln!(out, "{line}")?;
    } else {
        writeln!(out, "{} {}", message.schema_id, message.text)?;
        writeln!(out, "---")?;
    }
    out.flush()
}

pub fn print_encoder_stats(stats: &EncoderStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table => {
            let rows = vec![
                ("mode", stats.mode.to_string()),
                ("frames sent", stats.frames_sent.to_string()),
                (
                    "fps (nominal / actual)",
                    format!("{} / {:.1}", stats.nominal_fps, stats.actual_fps),
                ),
                (
                    "bandwidth (nominal / actual)",
                    format!("{} / {}", bps(stats.nominal_bps), bps(stats.actual_bps)),
                ),
                ("message segments", category(&stats.sender.messages)),
                ("blob segments", category(&stats.sender.blobs)),
                (
                    "buffered",
                    format!(
                        "{} segments, {} bits",
                        stats.sender.buffered_segments, stats.sender.buffered_bits
                    ),
                ),
                ("raw input buffered", format!("{} bytes", stats.raw_buffered_bytes)),
                ("discarded records", stats.discarded_records.to_string()),
            ];
            eprintln!("{}", stats_table(rows));
        }
        OutputFormat::Pretty => {
            eprintln!(
                "mode={} frames={} fps={}/{:.1} bps={} buffered={} discarded={}",
                stats.mode,
                stats.frames_sent,
                stats.nominal_fps,
                stats.actual_fps,
                bps(stats.actual_bps),
                stats.sender.buffered_segments,
                stats.discarded_records
            );
        }
    }
}

pub fn print_decoder_stats(stats: &StatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table => {
            let mode = stats
                .mode
                .map(|mode| mode.to_string())
                .unwrap_or_else(|| "-".to_string());
            let frames = match stats.expected_frames {
                Some(expected) => format!("{} of {expected}", stats.frames_seen),
                None => stats.frames_seen.to_string(),
            };
            let mut rows = vec![
                ("mode", mode),
                ("frames", frames),
                ("lost frames", stats.frames_lost.to_string()),
                (
                    "link quality",
                    format!(
                        "{} {}% ({}/{})",
                        stats.link_meter,
                        stats.window_quality_percent,
                        stats.window_good,
                        stats.window_width
                    ),
                ),
                ("session quality", format!("{}%", stats.cumulative_quality_percent)),
                (
                    "messages (received / lost)",
                    format!("{} / {}", stats.messages_received, stats.messages_lost),
                ),
                ("message segments", category(&stats.message_segments)),
                ("blob segments", category(&stats.blob_segments)),
                (
                    "bandwidth (raw / distinct / payload)",
                    format!(
                        "{} / {} / {}",
                        bps(stats.raw_bps),
                        bps(stats.distinct_bps),
                        bps(stats.effective_bps)
                    ),
                ),
                (
                    "processing",
                    format!(
                        "{:.2} ms/frame, {:.1} fps (nominal {})",
                        stats.processing_ms_per_frame, stats.processing_fps, stats.nominal_fps
                    ),
                ),
            ];
            if let Some(meter) = &stats.buffer_meter {
                rows.push(("lake", meter.clone()));
            }
            eprintln!("{}", stats_table(rows));
        }
        OutputFormat::Pretty => {
            eprintln!(
                "frames={} lost={} quality={}%/{}% messages={} bps={}{}",
                stats.frames_seen,
                stats.frames_lost,
                stats.window_quality_percent,
                stats.cumulative_quality_percent,
                stats.messages_received,
                bps(stats.effective_bps),
                stats
                    .buffer_meter
                    .as_deref()
                    .map(|meter| format!(" lake={meter}"))
                    .unwrap_or_default()
            );
        }
    }
}

fn print_json(value: &impl Serialize) {
    eprintln!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn stats_table(rows: Vec<(&str, String)>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["STAT", "VALUE"]);
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value]);
    }
    table
}

fn category(stats: &CategoryStats) -> String {
    format!("{} ({} bits)", stats.segments, stats.bits)
}

fn bps(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.2} Mbit/s", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.2} kbit/s", value / 1_000.0)
    } else {
        format!("{value:.0} bit/s")
    }
}
