// Track - Per-track note extraction
// Turns one track's note, bend and meta messages into closed notes and metadata

pub mod anomaly;
pub mod bend;
pub mod channel;
pub mod info;
pub mod instruments;
pub mod message;
pub mod metadata;
pub mod note;
pub mod parser;
pub mod tracker;

pub use anomaly::{
    AnomalyReport, BendOutcome, DropReason, MetaOutcome, NoteOffOutcome, NoteOnOutcome,
};
pub use bend::bend_offset;
pub use channel::{ActiveNoteSlot, ChannelState, TrackKind};
pub use info::TrackInfo;
pub use instruments::instrument_name;
pub use message::{normalized_bend, track_messages, TimedMessage, TrackMessage, PITCH_BEND_CENTER};
pub use metadata::{KeySignature, MetadataExtractor, TimeSignature};
pub use note::{pitch_name, NoteEvent, MAX_PITCH, MAX_VELOCITY};
pub use parser::{parse_track, ParsedTrack, TrackError, TrackMetadata, TrackParser, TrackResult};
pub use tracker::{NoteTracker, TrackerOutput};
