// Track messages - Parser input
// Tick-stamped channel and meta messages for one track, in stream order

use midly::{MetaMessage, MidiMessage, Track, TrackEventKind};
use serde::{Deserialize, Serialize};

/// Raw pitch-bend value at rest (no bend)
pub const PITCH_BEND_CENTER: u16 = 8192;

/// A message the track parser understands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackMessage {
    /// Note-on; a velocity of zero is a note-off
    NoteOn { channel: u8, key: u8, velocity: u8 },

    NoteOff { channel: u8, key: u8 },

    /// 14-bit pitch-bend value, 0..=16383 with 8192 at rest
    PitchBend { channel: u8, value: u16 },

    /// Track name text as stored in the file
    TrackName(Vec<u8>),

    /// Key signature payload: sharps/flats (signed) then mode
    KeySignature(Vec<u8>),

    /// Time signature payload: numerator, denominator power, clocks, 32nds
    TimeSignature(Vec<u8>),
}

impl TrackMessage {
    /// Channel of a channel message, None for meta messages
    pub fn channel(&self) -> Option<u8> {
        match self {
            TrackMessage::NoteOn { channel, .. }
            | TrackMessage::NoteOff { channel, .. }
            | TrackMessage::PitchBend { channel, .. } => Some(*channel),
            _ => None,
        }
    }
}

/// A message at an absolute tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedMessage {
    pub tick: u64,
    pub message: TrackMessage,
}

impl TimedMessage {
    pub fn new(tick: u64, message: TrackMessage) -> Self {
        TimedMessage { tick, message }
    }

    pub fn note_on(tick: u64, channel: u8, key: u8, velocity: u8) -> Self {
        Self::new(tick, TrackMessage::NoteOn { channel, key, velocity })
    }

    pub fn note_off(tick: u64, channel: u8, key: u8) -> Self {
        Self::new(tick, TrackMessage::NoteOff { channel, key })
    }

    pub fn pitch_bend(tick: u64, channel: u8, value: u16) -> Self {
        Self::new(tick, TrackMessage::PitchBend { channel, value })
    }

    pub fn track_name(tick: u64, name: &str) -> Self {
        Self::new(tick, TrackMessage::TrackName(name.as_bytes().to_vec()))
    }
}

/// Map a 14-bit pitch-bend value onto [-1.0, 1.0)
pub fn normalized_bend(value: u16) -> f64 {
    2.0 * (value as f64 / 16384.0 - 0.5)
}

/// Convert a decoded track into absolute-tick parser messages.
///
/// Messages the parser has no use for (controllers, tempo, sysex, ...) are
/// skipped; they feed the sequence-wide lookup services instead.
pub fn track_messages(track: &Track) -> Vec<TimedMessage> {
    let mut messages = Vec::new();
    let mut tick = 0u64;

    for event in track {
        tick += event.delta.as_int() as u64;

        let message = match event.kind {
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } => Some(TrackMessage::NoteOn {
                        channel,
                        key: key.as_int(),
                        velocity: vel.as_int(),
                    }),
                    MidiMessage::NoteOff { key, .. } => Some(TrackMessage::NoteOff {
                        channel,
                        key: key.as_int(),
                    }),
                    MidiMessage::PitchBend { bend } => Some(TrackMessage::PitchBend {
                        channel,
                        value: bend.0.as_int(),
                    }),
                    _ => None,
                }
            }
            TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                Some(TrackMessage::TrackName(name.to_vec()))
            }
            TrackEventKind::Meta(MetaMessage::KeySignature(sharps, minor)) => {
                Some(TrackMessage::KeySignature(vec![sharps as u8, minor as u8]))
            }
            TrackEventKind::Meta(MetaMessage::TimeSignature(
                numerator,
                power,
                clocks,
                thirty_seconds,
            )) => Some(TrackMessage::TimeSignature(vec![
                numerator,
                power,
                clocks,
                thirty_seconds,
            ])),
            _ => None,
        };

        if let Some(message) = message {
            messages.push(TimedMessage::new(tick, message));
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{PitchBend, TrackEvent};

    #[test]
    fn test_normalized_bend_range() {
        assert_eq!(normalized_bend(0), -1.0);
        assert_eq!(normalized_bend(PITCH_BEND_CENTER), 0.0);
        assert!(normalized_bend(16383) < 1.0);
        assert!((normalized_bend(12288) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_channel_of_messages() {
        assert_eq!(TimedMessage::note_on(0, 3, 60, 1).message.channel(), Some(3));
        assert_eq!(TimedMessage::pitch_bend(0, 7, 0).message.channel(), Some(7));
        assert_eq!(TimedMessage::track_name(0, "Lead").message.channel(), None);
    }

    #[test]
    fn test_track_messages_absolute_ticks() {
        let mut track = Track::new();
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Piano")),
        });
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOn { key: 60.into(), vel: 90.into() },
            },
        });
        // Controller messages are skipped but still advance time
        track.push(TrackEvent {
            delta: 120.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::Controller { controller: 7.into(), value: 100.into() },
            },
        });
        track.push(TrackEvent {
            delta: 120.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::PitchBend { bend: PitchBend(10000.into()) },
            },
        });
        track.push(TrackEvent {
            delta: 240.into(),
            kind: TrackEventKind::Midi {
                channel: 0.into(),
                message: MidiMessage::NoteOff { key: 60.into(), vel: 0.into() },
            },
        });
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::KeySignature(-3, true)),
        });
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(6, 3, 36, 8)),
        });

        let messages = track_messages(&track);
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0], TimedMessage::track_name(0, "Piano"));
        assert_eq!(messages[1], TimedMessage::note_on(0, 0, 60, 90));
        assert_eq!(messages[2], TimedMessage::pitch_bend(240, 0, 10000));
        assert_eq!(messages[3], TimedMessage::note_off(480, 0, 60));
        assert_eq!(
            messages[4].message,
            TrackMessage::KeySignature(vec![(-3i8) as u8, 1])
        );
        assert_eq!(
            messages[5],
            TimedMessage::new(480, TrackMessage::TimeSignature(vec![6, 3, 36, 8]))
        );
    }
}
