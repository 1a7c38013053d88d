// Note Lifecycle Tracker - Note-on/note-off pairing
// Opens voices per channel and emits closed notes in closing order

use crate::timing::CHANNEL_COUNT;

use super::anomaly::{DropReason, NoteOffOutcome, NoteOnOutcome};
use super::channel::{ActiveNoteSlot, ChannelState};
use super::note::{pitch_from_id, NoteEvent};

/// Notes emitted by a finished tracker
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerOutput {
    /// Closed notes in the order they were closed
    pub notes: Vec<NoteEvent>,

    /// Voices still open at end of stream (discarded)
    pub still_open: usize,
}

/// Working note state for one track parse.
///
/// Channels are indexed 0-15; callers validate channel numbers before
/// dispatching events here.
#[derive(Debug, Clone)]
pub struct NoteTracker {
    pub(crate) channels: [ChannelState; CHANNEL_COUNT],
    pub(crate) emitted: Vec<NoteEvent>,
}

impl Default for NoteTracker {
    fn default() -> Self {
        NoteTracker {
            channels: std::array::from_fn(|_| ChannelState::default()),
            emitted: Vec::new(),
        }
    }
}

impl NoteTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel(&self, channel: u8) -> &ChannelState {
        &self.channels[channel as usize]
    }

    /// Notes closed so far
    pub fn emitted(&self) -> &[NoteEvent] {
        &self.emitted
    }

    /// Open a voice for `key` with an already-scaled velocity.
    ///
    /// With `bendable` set the channel's current bend offset shifts the
    /// pitch; percussion keys are used as-is.
    pub fn note_on(
        &mut self,
        channel: u8,
        key: u8,
        velocity: u8,
        micros: u64,
        bendable: bool,
    ) -> NoteOnOutcome {
        let state = &mut self.channels[channel as usize];
        let shift = if bendable { state.bend_offset } else { 0 };
        let resolved = key as i32 + shift;

        let Some(pitch) = pitch_from_id(resolved) else {
            log::debug!(
                "Dropping note-on key {} on channel {}: bent to {} (out of range)",
                key,
                channel,
                resolved
            );
            return NoteOnOutcome::Dropped(DropReason::PitchOutOfRange { pitch: resolved });
        };

        let replaced = match state.take_pitch(pitch) {
            Some(previous) => {
                self.emitted.push(previous.close(micros));
                true
            }
            None => false,
        };

        state.active.push(ActiveNoteSlot {
            key,
            pitch,
            velocity,
            start_micros: micros,
        });

        if replaced {
            NoteOnOutcome::Replaced { pitch }
        } else {
            NoteOnOutcome::Opened { pitch }
        }
    }

    /// Close the first open voice started by `key`
    pub fn note_off(&mut self, channel: u8, key: u8, micros: u64) -> NoteOffOutcome {
        match self.channels[channel as usize].take_key(key) {
            Some(slot) => {
                self.emitted.push(slot.close(micros));
                NoteOffOutcome::Closed { pitch: slot.pitch }
            }
            None => {
                log::debug!("Ignoring note-off key {} on channel {}: not sounding", key, channel);
                NoteOffOutcome::Unmatched
            }
        }
    }

    /// Number of voices currently open across all channels
    pub fn open_count(&self) -> usize {
        self.channels.iter().map(|state| state.active.len()).sum()
    }

    /// End of stream: discard every open voice
    pub fn finish(self) -> TrackerOutput {
        let still_open = self.open_count();
        TrackerOutput {
            notes: self.emitted,
            still_open,
        }
    }
}
