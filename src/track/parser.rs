// Track Parser - Single forward pass over one track's messages
// Dispatches note, bend and meta messages and reconciles open notes at the end

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::config::{ConfigError, ParserConfig};
use crate::timing::{ChannelControllers, TickClock, CHANNEL_COUNT};

use super::anomaly::{AnomalyReport, BendOutcome, MetaOutcome, NoteOnOutcome};
use super::bend::bend_offset;
use super::channel::TrackKind;
use super::message::{TimedMessage, TrackMessage};
use super::metadata::{KeySignature, MetadataExtractor, TimeSignature};
use super::note::{scale_velocity, NoteEvent};
use super::tracker::NoteTracker;

/// Precondition violations that abort a parse
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("No tempo map supplied")]
    MissingTempoMap,

    #[error("No controller values supplied")]
    MissingControllers,

    #[error("Event {index} at tick {tick} comes before tick {previous_tick}")]
    UnorderedEvents {
        index: usize,
        tick: u64,
        previous_tick: u64,
    },

    #[error("Event {index} uses channel {channel} (expected 0-15)")]
    InvalidChannel { index: usize, channel: u8 },

    #[error("Invalid parser config: {0}")]
    Config(#[from] ConfigError),
}

pub type TrackResult<T> = Result<T, TrackError>;

/// Metadata derived from one track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// First non-placeholder track name
    pub name: Option<String>,

    pub key_signature: Option<KeySignature>,
    pub time_signature: Option<TimeSignature>,

    /// Programs sounding at note-on (melodic tracks only)
    pub instruments: BTreeSet<u8>,

    /// Distinct pitches across emitted notes
    pub notes_in_use: BTreeSet<u8>,

    /// Set by the channel of the first note event
    pub is_percussion: bool,
}

/// Finished result of a track parse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTrack {
    notes: Vec<NoteEvent>,
    metadata: TrackMetadata,
    anomalies: AnomalyReport,
}

impl ParsedTrack {
    /// Assemble a result from finished parts; `notes_in_use` is derived
    /// from `notes`.
    pub fn from_parts(
        notes: Vec<NoteEvent>,
        mut metadata: TrackMetadata,
        anomalies: AnomalyReport,
    ) -> Self {
        metadata.notes_in_use = notes.iter().map(|note| note.pitch).collect();
        ParsedTrack {
            notes,
            metadata,
            anomalies,
        }
    }

    /// Closed notes in emission order
    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }

    pub fn anomalies(&self) -> &AnomalyReport {
        &self.anomalies
    }

    /// Latest note end, or 0 for an empty track
    pub fn end_micros(&self) -> u64 {
        self.notes.iter().map(|note| note.end_micros).max().unwrap_or(0)
    }
}

/// Parses tracks against a tempo map and controller values.
///
/// Both services must be attached before `parse` is called.
pub struct TrackParser<'a> {
    config: &'a ParserConfig,
    tempo_map: Option<&'a dyn TickClock>,
    controllers: Option<&'a dyn ChannelControllers>,
}

impl<'a> TrackParser<'a> {
    pub fn new(config: &'a ParserConfig) -> Self {
        TrackParser {
            config,
            tempo_map: None,
            controllers: None,
        }
    }

    pub fn with_tempo_map(mut self, tempo_map: &'a dyn TickClock) -> Self {
        self.tempo_map = Some(tempo_map);
        self
    }

    pub fn with_controllers(mut self, controllers: &'a dyn ChannelControllers) -> Self {
        self.controllers = Some(controllers);
        self
    }

    /// Parse one track's messages into notes and metadata.
    ///
    /// Malformed musical content is counted in the returned anomaly report;
    /// only missing services, a bad config, out-of-order ticks or invalid
    /// channels fail the parse.
    pub fn parse(&self, messages: &[TimedMessage]) -> TrackResult<ParsedTrack> {
        self.config.validate()?;
        let tempo_map = self.tempo_map.ok_or(TrackError::MissingTempoMap)?;
        let controllers = self.controllers.ok_or(TrackError::MissingControllers)?;
        validate_messages(messages)?;

        let mut pass = TrackPass::new(self.config, tempo_map, controllers);
        for timed in messages {
            pass.dispatch(timed);
        }
        Ok(pass.finish())
    }
}

/// Parse a track with all collaborators supplied directly
pub fn parse_track(
    messages: &[TimedMessage],
    tempo_map: &dyn TickClock,
    controllers: &dyn ChannelControllers,
    config: &ParserConfig,
) -> TrackResult<ParsedTrack> {
    TrackParser::new(config)
        .with_tempo_map(tempo_map)
        .with_controllers(controllers)
        .parse(messages)
}

fn validate_messages(messages: &[TimedMessage]) -> TrackResult<()> {
    let mut previous_tick = 0;
    for (index, timed) in messages.iter().enumerate() {
        if timed.tick < previous_tick {
            return Err(TrackError::UnorderedEvents {
                index,
                tick: timed.tick,
                previous_tick,
            });
        }
        previous_tick = timed.tick;

        if let Some(channel) = timed.message.channel() {
            if channel as usize >= CHANNEL_COUNT {
                return Err(TrackError::InvalidChannel { index, channel });
            }
        }
    }
    Ok(())
}

/// Working state for one parse invocation
struct TrackPass<'a> {
    config: &'a ParserConfig,
    tempo_map: &'a dyn TickClock,
    controllers: &'a dyn ChannelControllers,
    tracker: NoteTracker,
    metadata: MetadataExtractor,
    anomalies: AnomalyReport,
    kind: Option<TrackKind>,
    instruments: BTreeSet<u8>,
}

impl<'a> TrackPass<'a> {
    fn new(
        config: &'a ParserConfig,
        tempo_map: &'a dyn TickClock,
        controllers: &'a dyn ChannelControllers,
    ) -> Self {
        TrackPass {
            config,
            tempo_map,
            controllers,
            tracker: NoteTracker::new(),
            metadata: MetadataExtractor::new(),
            anomalies: AnomalyReport::default(),
            kind: None,
            instruments: BTreeSet::new(),
        }
    }

    fn dispatch(&mut self, timed: &TimedMessage) {
        let tick = timed.tick;
        match &timed.message {
            TrackMessage::NoteOn { channel, key, velocity } if *velocity > 0 => {
                self.note_on(tick, *channel, *key, *velocity)
            }
            TrackMessage::NoteOn { channel, key, .. } | TrackMessage::NoteOff { channel, key } => {
                self.note_off(tick, *channel, *key)
            }
            TrackMessage::PitchBend { channel, value } => self.pitch_bend(tick, *channel, *value),
            TrackMessage::TrackName(raw) => {
                let outcome = self.metadata.track_name(raw, self.config);
                self.record_meta("track name", outcome);
            }
            TrackMessage::KeySignature(raw) => {
                let outcome = self.metadata.key_signature(raw);
                self.record_meta("key signature", outcome);
            }
            TrackMessage::TimeSignature(raw) => {
                let outcome = self.metadata.time_signature(raw);
                self.record_meta("time signature", outcome);
            }
        }
    }

    /// Track type, fixed by the first note event
    fn classify(&mut self, channel: u8) -> TrackKind {
        let channel_kind = TrackKind::for_channel(channel, self.config.drum_channel);
        match self.kind {
            None => {
                self.kind = Some(channel_kind);
                channel_kind
            }
            Some(kind) => {
                if kind != channel_kind {
                    if self.anomalies.mixed_channel_events == 0 {
                        log::warn!("Track contains both notes and drums");
                    }
                    self.anomalies.mixed_channel_events += 1;
                }
                kind
            }
        }
    }

    fn note_on(&mut self, tick: u64, channel: u8, key: u8, velocity: u8) {
        let kind = self.classify(channel);
        let micros = self.tempo_map.tick_to_micros(tick);
        let volume = self.controllers.volume(channel, tick);
        let velocity = scale_velocity(velocity, volume, self.config.reference_volume);

        let outcome = self
            .tracker
            .note_on(channel, key, velocity, micros, !kind.is_percussion());
        self.anomalies.record_note_on(&outcome);

        if !matches!(outcome, NoteOnOutcome::Dropped(_)) && !kind.is_percussion() {
            self.instruments.insert(self.controllers.program(channel, tick));
        }
    }

    fn note_off(&mut self, tick: u64, channel: u8, key: u8) {
        self.classify(channel);
        let micros = self.tempo_map.tick_to_micros(tick);
        let outcome = self.tracker.note_off(channel, key, micros);
        self.anomalies.record_note_off(&outcome);
    }

    fn pitch_bend(&mut self, tick: u64, channel: u8, value: u16) {
        let percussion = match self.kind {
            Some(kind) => kind.is_percussion(),
            None => channel == self.config.drum_channel,
        };
        let outcome = if percussion {
            BendOutcome::Ignored
        } else {
            let range = self.controllers.pitch_bend_range(channel, tick);
            let offset = bend_offset(value, range);
            let micros = self.tempo_map.tick_to_micros(tick);
            let min_fragment = self
                .config
                .absorb_short_fragments
                .then_some(self.config.min_note_micros);
            self.tracker.pitch_bend(channel, offset, micros, min_fragment)
        };
        self.anomalies.record_bend(&outcome);
    }

    fn record_meta(&mut self, kind: &str, outcome: MetaOutcome) {
        if outcome == MetaOutcome::Malformed {
            log::warn!("Ignoring malformed {} message", kind);
        }
        self.anomalies.record_meta(&outcome);
    }

    fn finish(mut self) -> ParsedTrack {
        let output = self.tracker.finish();
        self.anomalies.still_open_notes = output.still_open;

        if output.still_open > 0 {
            log::warn!(
                "{} note(s) not turned off at the end of the track",
                self.anomalies.total()
            );
        }

        let (name, key_signature, time_signature) = self.metadata.finish();
        let metadata = TrackMetadata {
            name,
            key_signature,
            time_signature,
            instruments: self.instruments,
            notes_in_use: BTreeSet::new(),
            is_percussion: self.kind.is_some_and(TrackKind::is_percussion),
        };

        ParsedTrack::from_parts(output.notes, metadata, self.anomalies)
    }
}
