// Pitch-Bend Re-splicer - Discrete re-pitching of sounding notes
// A change in bend offset ends every open voice on the channel and
// reopens it at the shifted pitch

use super::anomaly::BendOutcome;
use super::channel::ActiveNoteSlot;
use super::message::normalized_bend;
use super::note::pitch_from_id;
use super::tracker::NoteTracker;

/// Semitone offset for a raw 14-bit bend value at a given bend range.
///
/// Half-semitone ties round toward positive infinity.
pub fn bend_offset(value: u16, range_semitones: f64) -> i32 {
    (normalized_bend(value) * range_semitones + 0.5).floor() as i32
}

impl NoteTracker {
    /// Apply a new bend offset to a melodic channel.
    ///
    /// Each open voice is closed at `micros`. A fragment shorter than
    /// `min_fragment_micros` is not emitted and its replacement keeps the
    /// fragment's start time. Replacements that land outside 0-127 are
    /// dropped and do not come back on a later bend.
    pub fn pitch_bend(
        &mut self,
        channel: u8,
        offset: i32,
        micros: u64,
        min_fragment_micros: Option<u64>,
    ) -> BendOutcome {
        let state = &mut self.channels[channel as usize];
        if offset == state.bend_offset {
            return BendOutcome::Unchanged;
        }

        let shift = offset - state.bend_offset;
        let mut closed = 0;
        let mut absorbed = 0;
        let mut dropped = 0;
        let mut replacements = Vec::with_capacity(state.active.len());

        for slot in std::mem::take(&mut state.active) {
            let fragment = slot.close(micros);
            let too_short =
                min_fragment_micros.is_some_and(|min| fragment.duration_micros() < min);

            let start_micros = if too_short {
                absorbed += 1;
                slot.start_micros
            } else {
                self.emitted.push(fragment);
                closed += 1;
                micros
            };

            let target = slot.pitch as i32 + shift;
            match pitch_from_id(target) {
                Some(pitch) => replacements.push(ActiveNoteSlot {
                    pitch,
                    start_micros,
                    ..slot
                }),
                None => {
                    log::debug!(
                        "Voice key {} on channel {} bent out of range to {}",
                        slot.key,
                        channel,
                        target
                    );
                    dropped += 1;
                }
            }
        }

        state.active = replacements;
        state.bend_offset = offset;

        BendOutcome::Respliced {
            closed,
            absorbed,
            dropped,
        }
    }
}
