// Trackscan - Per-track MIDI note extraction
// Module declarations

pub mod config;
pub mod pipeline;
pub mod sequence;
pub mod timing;
pub mod track;

pub use config::{ConfigError, ParserConfig};
pub use sequence::{SequenceError, SequenceInfo, SequenceResult};
pub use timing::{ChannelControllers, ControllerCache, Division, TempoError, TempoMap, TickClock};
pub use track::{
    parse_track, track_messages, AnomalyReport, KeySignature, NoteEvent, ParsedTrack,
    TimeSignature, TimedMessage, TrackError, TrackInfo, TrackMessage, TrackParser,
};
