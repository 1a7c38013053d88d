// Track Info - Parsed track with display helpers
// What the downstream notation/export stages read per track

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::anomaly::AnomalyReport;
use super::instruments::instrument_name;
use super::metadata::{KeySignature, TimeSignature};
use super::note::NoteEvent;
use super::parser::{ParsedTrack, TrackMetadata};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    track_number: usize,
    parsed: ParsedTrack,
}

impl TrackInfo {
    pub fn new(track_number: usize, parsed: ParsedTrack) -> Self {
        TrackInfo {
            track_number,
            parsed,
        }
    }

    /// Build a melodic track from an already-finished note list
    pub fn from_notes(
        track_number: usize,
        name: Option<String>,
        program: u8,
        time_signature: Option<TimeSignature>,
        key_signature: Option<KeySignature>,
        notes: Vec<NoteEvent>,
    ) -> Self {
        let metadata = TrackMetadata {
            name,
            key_signature,
            time_signature,
            instruments: BTreeSet::from([program]),
            notes_in_use: BTreeSet::new(),
            is_percussion: false,
        };
        Self::new(
            track_number,
            ParsedTrack::from_parts(notes, metadata, AnomalyReport::default()),
        )
    }

    pub fn track_number(&self) -> usize {
        self.track_number
    }

    pub fn parsed(&self) -> &ParsedTrack {
        &self.parsed
    }

    pub fn has_name(&self) -> bool {
        self.parsed.metadata().name.is_some()
    }

    /// Track name, or "Track N" when the file has none
    pub fn name(&self) -> String {
        match &self.parsed.metadata().name {
            Some(name) => name.clone(),
            None => format!("Track {}", self.track_number),
        }
    }

    pub fn key_signature(&self) -> Option<KeySignature> {
        self.parsed.metadata().key_signature
    }

    pub fn time_signature(&self) -> Option<TimeSignature> {
        self.parsed.metadata().time_signature
    }

    pub fn is_drum_track(&self) -> bool {
        self.parsed.metadata().is_percussion
    }

    pub fn events(&self) -> &[NoteEvent] {
        self.parsed.notes()
    }

    pub fn has_events(&self) -> bool {
        !self.parsed.notes().is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.parsed.notes().len()
    }

    pub fn event_count_string(&self) -> String {
        match self.event_count() {
            1 => "1 note".to_string(),
            count => format!("{} notes", count),
        }
    }

    pub fn notes_in_use(&self) -> &BTreeSet<u8> {
        &self.parsed.metadata().notes_in_use
    }

    pub fn instruments(&self) -> &BTreeSet<u8> {
        &self.parsed.metadata().instruments
    }

    pub fn instrument_count(&self) -> usize {
        self.instruments().len()
    }

    /// Comma-separated General MIDI names of the track's programs
    pub fn instrument_names(&self) -> String {
        if self.is_drum_track() {
            return "Drums".to_string();
        }

        if self.instruments().is_empty() {
            return if self.has_events() {
                instrument_name(0).to_string()
            } else {
                "<None>".to_string()
            };
        }

        self.instruments()
            .iter()
            .map(|&program| instrument_name(program))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn anomalies(&self) -> &AnomalyReport {
        self.parsed.anomalies()
    }
}

impl fmt::Display for TrackInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
