// Note events - Parser output
// Closed, immutable note intervals with pitch and loudness

use serde::{Deserialize, Serialize};

/// Highest representable pitch id
pub const MAX_PITCH: u8 = 127;

/// Highest representable loudness
pub const MAX_VELOCITY: u8 = 127;

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A sounded note with its time span in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteEvent {
    /// MIDI note number (0-127, 60 = middle C)
    pub pitch: u8,

    /// Loudness after channel volume scaling (0-127)
    pub velocity: u8,

    pub start_micros: u64,

    /// Always at or after `start_micros`
    pub end_micros: u64,
}

impl NoteEvent {
    pub fn new(pitch: u8, velocity: u8, start_micros: u64, end_micros: u64) -> Self {
        NoteEvent {
            pitch,
            velocity,
            start_micros,
            end_micros: end_micros.max(start_micros),
        }
    }

    pub fn duration_micros(&self) -> u64 {
        self.end_micros - self.start_micros
    }

    /// Scientific pitch name, e.g. "C4" for 60
    pub fn pitch_name(&self) -> String {
        pitch_name(self.pitch)
    }
}

/// Pitch id if `id` is in the representable range
pub fn pitch_from_id(id: i32) -> Option<u8> {
    if (0..=MAX_PITCH as i32).contains(&id) {
        Some(id as u8)
    } else {
        None
    }
}

/// Scale a raw velocity by channel volume relative to a reference volume,
/// clamped to the representable ceiling.
pub fn scale_velocity(velocity: u8, volume: u8, reference_volume: u8) -> u8 {
    if reference_volume == 0 {
        return velocity.min(MAX_VELOCITY);
    }
    let scaled = velocity as u32 * volume as u32 / reference_volume as u32;
    scaled.min(MAX_VELOCITY as u32) as u8
}

pub fn pitch_name(pitch: u8) -> String {
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", PITCH_CLASS_NAMES[pitch as usize % 12], octave)
}
