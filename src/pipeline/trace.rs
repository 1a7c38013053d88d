// Scan Trace - JSONL record of a MIDI scan
// One line per stage, appended as each step of the scan finishes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::sequence::SequenceInfo;
use crate::track::TrackInfo;

pub const STAGE_LOAD: &str = "load";
pub const STAGE_TEMPO_MAP: &str = "tempo_map";
pub const STAGE_TRACK_PARSE: &str = "track_parse";

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One line of the trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,

    /// "load", "tempo_map" or "track_parse"
    pub stage: String,

    /// Fraction of the scan completed [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    /// Track the entry belongs to, for per-track stages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    pub fn new(stage: impl Into<String>, progress: f32, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now(),
            stage: stage.into(),
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            track: None,
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_track(mut self, track: usize) -> Self {
        self.track = Some(track);
        self
    }

    /// Track-parse entry carrying the track's anomaly counts
    pub fn for_track(info: &TrackInfo, progress: f32) -> Result<Self, TraceError> {
        let data = serde_json::to_value(info.anomalies())?;
        let message = format!("{}: {}", info.name(), info.event_count_string());
        Ok(TraceEntry::new(STAGE_TRACK_PARSE, progress, message)
            .with_track(info.track_number())
            .with_data(data))
    }

    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

/// Shorthand for entries of a single stage
pub struct TraceBuilder {
    stage: &'static str,
}

impl TraceBuilder {
    pub fn stage(stage: &'static str) -> Self {
        TraceBuilder { stage }
    }

    pub fn start(self, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.stage, 0.0, message)
    }

    pub fn progress(self, progress: f32, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.stage, progress, message)
    }

    pub fn complete(self, message: impl Into<String>) -> TraceEntry {
        TraceEntry::new(self.stage, 1.0, message)
    }
}

/// Entries describing a finished scan, in stage order
pub fn sequence_trace(
    source: &Path,
    sequence: &SequenceInfo,
) -> Result<Vec<TraceEntry>, TraceError> {
    let mut entries = vec![
        TraceBuilder::stage(STAGE_LOAD).start(format!("Loaded {}", source.display())),
        TraceBuilder::stage(STAGE_TEMPO_MAP)
            .progress(0.0, "Built tempo map")
            .with_data(serde_json::json!({ "ppq": sequence.ppq })),
    ];

    let total = sequence.tracks.len().max(1) as f32;
    for (index, track) in sequence.tracks.iter().enumerate() {
        entries.push(TraceEntry::for_track(track, (index + 1) as f32 / total)?);
    }

    let anomalies = serde_json::to_value(sequence.anomalies())?;
    entries.push(
        TraceBuilder::stage(STAGE_TRACK_PARSE)
            .complete(format!("Parsed {} track(s)", sequence.tracks.len()))
            .with_data(anomalies),
    );
    Ok(entries)
}

/// Append-only writer for a JSONL trace file
pub struct TraceWriter {
    path: PathBuf,
}

impl TraceWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TraceWriter { path: path.into() }
    }

    pub fn append(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        self.append_all(std::slice::from_ref(entry))
    }

    pub fn append_all(&self, entries: &[TraceEntry]) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        for entry in entries {
            file.write_all(entry.to_json_line()?.as_bytes())?;
        }
        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every entry of a trace file, skipping blank lines
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(TraceError::from))
        .collect()
}
