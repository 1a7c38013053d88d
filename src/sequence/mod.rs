// Sequence - Whole-file entry point
// Builds the shared lookup services once, then parses every track on its own

use midly::Smf;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::config::{ConfigError, ParserConfig};
use crate::timing::{ControllerCache, Division, TempoError, TempoMap};
use crate::track::{parse_track, track_messages, AnomalyReport, TrackError, TrackInfo};

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("Failed to read MIDI file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse MIDI: {0}")]
    Midi(#[from] midly::Error),

    #[error("Invalid tempo map: {0}")]
    Tempo(#[from] TempoError),

    #[error("Invalid parser config: {0}")]
    Config(#[from] ConfigError),

    #[error("Track {track}: {source}")]
    Track {
        track: usize,
        #[source]
        source: TrackError,
    },
}

pub type SequenceResult<T> = Result<T, SequenceError>;

/// Every track of a MIDI file, parsed
#[derive(Debug, Clone, Serialize)]
pub struct SequenceInfo {
    /// Ticks per quarter note, None for SMPTE timing
    pub ppq: Option<u16>,
    pub tracks: Vec<TrackInfo>,
}

impl SequenceInfo {
    pub fn from_file(path: &Path, config: &ParserConfig) -> SequenceResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data, config)
    }

    pub fn from_bytes(data: &[u8], config: &ParserConfig) -> SequenceResult<Self> {
        let smf = Smf::parse(data)?;
        Self::from_smf(&smf, config)
    }

    pub fn from_smf(smf: &Smf, config: &ParserConfig) -> SequenceResult<Self> {
        config.validate()?;

        let tempo_map = TempoMap::from_smf(smf)?;
        let controllers = ControllerCache::from_smf(smf);

        let mut tracks = Vec::with_capacity(smf.tracks.len());
        for (track_number, track) in smf.tracks.iter().enumerate() {
            let messages = track_messages(track);
            let parsed = parse_track(&messages, &tempo_map, &controllers, config).map_err(
                |source| SequenceError::Track {
                    track: track_number,
                    source,
                },
            )?;

            let info = TrackInfo::new(track_number, parsed);
            log::info!(
                "Track {} \"{}\": {}, {}",
                track_number,
                info.name(),
                info.event_count_string(),
                info.instrument_names()
            );
            tracks.push(info);
        }

        let ppq = match tempo_map.division() {
            Division::Metrical { ppq } => Some(ppq),
            Division::Timecode { .. } => None,
        };

        let info = SequenceInfo { ppq, tracks };
        log::info!(
            "Parsed {} track(s), {} note(s), {:.1}s",
            info.tracks.len(),
            info.tracks.iter().map(TrackInfo::event_count).sum::<usize>(),
            info.duration_micros() as f64 / 1_000_000.0
        );
        Ok(info)
    }

    /// End of the last note in any track
    pub fn duration_micros(&self) -> u64 {
        self.tracks
            .iter()
            .map(|track| track.parsed().end_micros())
            .max()
            .unwrap_or(0)
    }

    /// Tracks that produced at least one note
    pub fn tracks_with_events(&self) -> impl Iterator<Item = &TrackInfo> {
        self.tracks.iter().filter(|track| track.has_events())
    }

    /// Anomaly counts summed over all tracks
    pub fn anomalies(&self) -> AnomalyReport {
        let mut total = AnomalyReport::default();
        for track in &self.tracks {
            total.merge(track.anomalies());
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{
        Format, Header, MetaMessage, MidiMessage, Timing, Track, TrackEvent, TrackEventKind,
    };
    use tempfile::TempDir;

    fn midi(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: channel.into(),
                message,
            },
        }
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Meta(message),
        }
    }

    fn note_on(delta: u32, channel: u8, key: u8, vel: u8) -> TrackEvent<'static> {
        midi(delta, channel, MidiMessage::NoteOn { key: key.into(), vel: vel.into() })
    }

    fn note_off(delta: u32, channel: u8, key: u8) -> TrackEvent<'static> {
        midi(delta, channel, MidiMessage::NoteOff { key: key.into(), vel: 0.into() })
    }

    /// Conductor track at 60 BPM after one beat, a piano track and a drum track
    fn sample_file() -> Vec<u8> {
        let conductor: Track = vec![
            meta(0, MetaMessage::TimeSignature(3, 2, 24, 8)),
            meta(480, MetaMessage::Tempo(1_000_000.into())),
            meta(0, MetaMessage::EndOfTrack),
        ];

        let piano: Track = vec![
            meta(0, MetaMessage::TrackName(b"Piano")),
            meta(0, MetaMessage::KeySignature(-1, false)),
            midi(0, 0, MidiMessage::ProgramChange { program: 0.into() }),
            midi(0, 0, MidiMessage::Controller { controller: 7.into(), value: 50.into() }),
            note_on(0, 0, 60, 100),
            note_off(480, 0, 60),
            note_on(0, 0, 64, 100),
            note_off(480, 0, 64),
            // Left hanging
            note_on(0, 0, 67, 100),
            meta(480, MetaMessage::EndOfTrack),
        ];

        let drums: Track = vec![
            meta(0, MetaMessage::TrackName(b"Untitled")),
            note_on(0, 9, 36, 127),
            note_off(240, 9, 36),
            meta(0, MetaMessage::EndOfTrack),
        ];

        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(480.into())));
        smf.tracks = vec![conductor, piano, drums];

        let mut bytes = Vec::new();
        smf.write(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_from_bytes_parses_every_track() {
        let info = SequenceInfo::from_bytes(&sample_file(), &ParserConfig::default()).unwrap();

        assert_eq!(info.ppq, Some(480));
        assert_eq!(info.tracks.len(), 3);
        assert_eq!(info.tracks_with_events().count(), 2);

        let conductor = &info.tracks[0];
        assert_eq!(conductor.name(), "Track 0");
        assert_eq!(conductor.time_signature().unwrap().to_string(), "3/4");
        assert_eq!(conductor.instrument_names(), "<None>");

        let piano = &info.tracks[1];
        assert_eq!(piano.name(), "Piano");
        assert_eq!(piano.key_signature().unwrap().to_string(), "F major");
        assert_eq!(piano.event_count_string(), "2 notes");
        assert_eq!(piano.instrument_names(), "Acoustic Grand Piano");
        assert_eq!(piano.anomalies().still_open_notes, 1);

        // Second note falls after the tempo change to 60 BPM
        let second = piano.events()[1];
        assert_eq!(second.start_micros, 500_000);
        assert_eq!(second.end_micros, 1_500_000);
        // Volume 50 against reference 100
        assert_eq!(second.velocity, 50);

        let drums = &info.tracks[2];
        assert!(drums.is_drum_track());
        assert_eq!(drums.name(), "Track 2");
        assert_eq!(drums.instrument_names(), "Drums");
    }

    #[test]
    fn test_sequence_totals() {
        let info = SequenceInfo::from_bytes(&sample_file(), &ParserConfig::default()).unwrap();
        assert_eq!(info.duration_micros(), 1_500_000);
        assert_eq!(info.anomalies().still_open_notes, 1);
        assert_eq!(info.anomalies().total(), 1);
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("song.mid");
        std::fs::write(&path, sample_file()).unwrap();

        let info = SequenceInfo::from_file(&path, &ParserConfig::default()).unwrap();
        assert_eq!(info.tracks.len(), 3);
    }

    #[test]
    fn test_invalid_bytes_are_midi_error() {
        let result = SequenceInfo::from_bytes(b"not a midi file", &ParserConfig::default());
        assert!(matches!(result, Err(SequenceError::Midi(_))));
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let config = ParserConfig {
            drum_channel: 20,
            ..Default::default()
        };
        let result = SequenceInfo::from_bytes(&sample_file(), &config);
        assert!(matches!(result, Err(SequenceError::Config(_))));
    }
}
