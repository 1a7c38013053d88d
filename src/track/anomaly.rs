// Anomalies - Recoverable input irregularities
// Typed per-event outcomes and the per-track counters they feed

use serde::{Deserialize, Serialize};

/// Why a note-on produced no voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Key plus bend offset fell outside 0-127
    PitchOutOfRange { pitch: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOnOutcome {
    Opened { pitch: u8 },

    /// An open voice at the same pitch was closed first
    Replaced { pitch: u8 },

    Dropped(DropReason),
}

impl NoteOnOutcome {
    pub fn pitch(&self) -> Option<u8> {
        match *self {
            NoteOnOutcome::Opened { pitch } | NoteOnOutcome::Replaced { pitch } => Some(pitch),
            NoteOnOutcome::Dropped(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteOffOutcome {
    Closed { pitch: u8 },

    /// No open voice for the key
    Unmatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BendOutcome {
    /// Percussion channel
    Ignored,

    /// Bend rounds to the offset already in effect
    Unchanged,

    Respliced {
        /// Fragments emitted as notes
        closed: usize,
        /// Fragments too short to emit
        absorbed: usize,
        /// Voices bent out of range with no replacement
        dropped: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaOutcome {
    Captured,

    /// A value of this kind was already captured
    AlreadySet,

    /// Empty or placeholder track name
    Rejected,

    Malformed,
}

/// Counts of recoverable irregularities in one track
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyReport {
    /// Note-ons that closed a still-open note of the same pitch
    pub overwritten_notes: usize,

    /// Notes still open when the track ended (discarded)
    pub still_open_notes: usize,

    pub out_of_range_notes: usize,
    pub unmatched_note_offs: usize,

    /// Note events on a channel of the other type than the track's
    pub mixed_channel_events: usize,

    pub dropped_bent_voices: usize,
    pub absorbed_fragments: usize,
    pub malformed_meta: usize,
}

impl AnomalyReport {
    /// Notes that were not turned off properly
    pub fn total(&self) -> usize {
        self.overwritten_notes + self.still_open_notes
    }

    pub fn is_clean(&self) -> bool {
        *self == AnomalyReport::default()
    }

    pub fn record_note_on(&mut self, outcome: &NoteOnOutcome) {
        match outcome {
            NoteOnOutcome::Opened { .. } => {}
            NoteOnOutcome::Replaced { .. } => self.overwritten_notes += 1,
            NoteOnOutcome::Dropped(DropReason::PitchOutOfRange { .. }) => {
                self.out_of_range_notes += 1
            }
        }
    }

    pub fn record_note_off(&mut self, outcome: &NoteOffOutcome) {
        if *outcome == NoteOffOutcome::Unmatched {
            self.unmatched_note_offs += 1;
        }
    }

    pub fn record_bend(&mut self, outcome: &BendOutcome) {
        if let BendOutcome::Respliced { absorbed, dropped, .. } = *outcome {
            self.absorbed_fragments += absorbed;
            self.dropped_bent_voices += dropped;
        }
    }

    pub fn record_meta(&mut self, outcome: &MetaOutcome) {
        if *outcome == MetaOutcome::Malformed {
            self.malformed_meta += 1;
        }
    }

    /// Accumulate another track's counts
    pub fn merge(&mut self, other: &AnomalyReport) {
        self.overwritten_notes += other.overwritten_notes;
        self.still_open_notes += other.still_open_notes;
        self.out_of_range_notes += other.out_of_range_notes;
        self.unmatched_note_offs += other.unmatched_note_offs;
        self.mixed_channel_events += other.mixed_channel_events;
        self.dropped_bent_voices += other.dropped_bent_voices;
        self.absorbed_fragments += other.absorbed_fragments;
        self.malformed_meta += other.malformed_meta;
    }
}
