// Channel state - Per-channel working state for one parse
// Open notes and the current pitch-bend offset

use serde::{Deserialize, Serialize};

use super::note::NoteEvent;

/// Whether a track plays fixed drum sounds or bendable pitches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Melodic,
    Percussion,
}

impl TrackKind {
    pub fn for_channel(channel: u8, drum_channel: u8) -> Self {
        if channel == drum_channel {
            TrackKind::Percussion
        } else {
            TrackKind::Melodic
        }
    }

    pub fn is_percussion(self) -> bool {
        self == TrackKind::Percussion
    }
}

/// A note that has started but not yet ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveNoteSlot {
    /// Key of the note-on that opened the voice; note-offs match on this
    pub key: u8,

    /// Sounding pitch after pitch-bend shifts
    pub pitch: u8,

    pub velocity: u8,
    pub start_micros: u64,
}

impl ActiveNoteSlot {
    pub fn close(&self, end_micros: u64) -> NoteEvent {
        NoteEvent::new(self.pitch, self.velocity, self.start_micros, end_micros)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelState {
    /// Open voices in the order they were opened
    pub(crate) active: Vec<ActiveNoteSlot>,

    /// Current pitch-bend offset in semitones
    pub(crate) bend_offset: i32,
}

impl ChannelState {
    pub fn bend_offset(&self) -> i32 {
        self.bend_offset
    }

    pub fn active(&self) -> &[ActiveNoteSlot] {
        &self.active
    }

    /// Remove and return the first open voice sounding `pitch`
    pub(crate) fn take_pitch(&mut self, pitch: u8) -> Option<ActiveNoteSlot> {
        let index = self.active.iter().position(|slot| slot.pitch == pitch)?;
        Some(self.active.remove(index))
    }

    /// Remove and return the first open voice started by `key`
    pub(crate) fn take_key(&mut self, key: u8) -> Option<ActiveNoteSlot> {
        let index = self.active.iter().position(|slot| slot.key == key)?;
        Some(self.active.remove(index))
    }
}
