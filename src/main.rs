//! trackscan - MIDI track inspector
//!
//! Parses a Standard MIDI File and reports the notes, metadata and
//! irregularities found in each track

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use trackscan::pipeline::{sequence_trace, TraceError, TraceWriter};
use trackscan::{ConfigError, ParserConfig, SequenceError, SequenceInfo, TrackInfo};

#[derive(Parser)]
#[command(name = "trackscan")]
#[command(about = "Extract per-track notes and metadata from a MIDI file")]
#[command(version)]
struct Cli {
    /// Input MIDI file
    file: PathBuf,

    /// Parser configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Append a JSONL trace of the scan to this file
    #[arg(short, long)]
    trace: Option<PathBuf>,

    /// Print all tracks as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error("Failed to write trace: {0}")]
    Trace(#[from] TraceError),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => ParserConfig::from_json_file(path)?,
        None => ParserConfig::default(),
    };

    let sequence = SequenceInfo::from_file(&cli.file, &config)?;

    if let Some(trace_path) = &cli.trace {
        write_trace(trace_path, &cli.file, &sequence)?;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&sequence)?);
        return Ok(());
    }

    for track in &sequence.tracks {
        println!("{}", summary_line(track));
    }

    let anomalies = sequence.anomalies();
    if anomalies.total() > 0 {
        log::warn!(
            "{} note(s) not turned off properly across {} track(s)",
            anomalies.total(),
            sequence.tracks.len()
        );
    }
    Ok(())
}

fn write_trace(trace_path: &Path, source: &Path, sequence: &SequenceInfo) -> Result<(), CliError> {
    let writer = TraceWriter::new(trace_path);
    writer.append_all(&sequence_trace(source, sequence)?)?;
    log::info!("Trace written to {}", writer.path().display());
    Ok(())
}

fn summary_line(track: &TrackInfo) -> String {
    let mut line = format!(
        "{:>3}  {:<24} {:<28} {:>10}",
        track.track_number(),
        track.name(),
        track.instrument_names(),
        track.event_count_string()
    );

    if let Some(key) = track.key_signature() {
        line.push_str(&format!("  {}", key));
    }
    if let Some(meter) = track.time_signature() {
        line.push_str(&format!("  {}", meter));
    }

    let anomalies = track.anomalies();
    if anomalies.total() > 0 {
        line.push_str(&format!("  ({} unterminated)", anomalies.total()));
    }
    line
}
