// Tempo Map - Tick to wall-clock conversion
// Piecewise-linear mapping over tempo regions, built before any track is parsed

use midly::{MetaMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;

/// Tempo in effect before the first tempo change (120 BPM)
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

/// Converts event-stream ticks to microseconds.
///
/// Implementations must be monotonic: a later tick never maps to an
/// earlier time.
pub trait TickClock {
    fn tick_to_micros(&self, tick: u64) -> u64;
}

#[derive(Debug, Error, PartialEq)]
pub enum TempoError {
    #[error("Timing resolution of zero ticks per quarter note")]
    ZeroResolution,

    #[error("Tempo change at tick {tick} has zero microseconds per quarter note")]
    ZeroTempo { tick: u64 },

    #[error("Invalid timecode division: {fps} fps, {subframes} subframes")]
    InvalidTimecode { fps: f32, subframes: u8 },
}

/// Time division of the event stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Division {
    /// Ticks per quarter note; wall-clock time depends on tempo
    Metrical { ppq: u16 },

    /// SMPTE frames per second and ticks per frame; tempo changes are ignored
    Timecode { fps: f32, subframes: u8 },
}

impl From<Timing> for Division {
    fn from(timing: Timing) -> Self {
        match timing {
            Timing::Metrical(ppq) => Division::Metrical { ppq: ppq.as_int() },
            Timing::Timecode(fps, subframes) => Division::Timecode {
                fps: fps.as_f32(),
                subframes,
            },
        }
    }
}

/// One constant-tempo region
#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoSegment {
    /// First tick of the region
    tick: u64,

    /// Wall-clock time at `tick`
    micros: u64,

    /// Tempo for the region
    micros_per_quarter: u32,
}

/// Tempo map for one sequence
#[derive(Debug, Clone, PartialEq)]
pub struct TempoMap {
    division: Division,
    segments: Vec<TempoSegment>,
}

impl TempoMap {
    /// Build a tempo map from a division and (tick, µs per quarter) changes.
    ///
    /// Changes may arrive in any order; when several share a tick the last
    /// one supplied wins.
    pub fn new(
        division: Division,
        changes: impl IntoIterator<Item = (u64, u32)>,
    ) -> Result<Self, TempoError> {
        match division {
            Division::Metrical { ppq: 0 } => return Err(TempoError::ZeroResolution),
            Division::Timecode { fps, subframes } if fps <= 0.0 || subframes == 0 => {
                return Err(TempoError::InvalidTimecode { fps, subframes });
            }
            _ => {}
        }

        let mut changes: Vec<(u64, u32)> = changes.into_iter().collect();
        // Stable sort keeps supply order within a tick
        changes.sort_by_key(|(tick, _)| *tick);

        let mut map = TempoMap {
            division,
            segments: vec![TempoSegment {
                tick: 0,
                micros: 0,
                micros_per_quarter: DEFAULT_MICROS_PER_QUARTER,
            }],
        };

        for (tick, micros_per_quarter) in changes {
            if micros_per_quarter == 0 {
                return Err(TempoError::ZeroTempo { tick });
            }

            let last_index = map.segments.len() - 1;
            let last = map.segments[last_index];

            if tick == last.tick {
                map.segments[last_index].micros_per_quarter = micros_per_quarter;
                continue;
            }

            let micros = map.micros_within(&last, tick);
            map.segments.push(TempoSegment {
                tick,
                micros,
                micros_per_quarter,
            });
        }

        Ok(map)
    }

    /// Constant 120 BPM map at the given resolution
    pub fn metrical(ppq: u16) -> Result<Self, TempoError> {
        Self::new(Division::Metrical { ppq }, std::iter::empty())
    }

    /// Constant-tempo map at the given resolution and BPM
    pub fn with_bpm(ppq: u16, bpm: f64) -> Result<Self, TempoError> {
        let micros_per_quarter = if bpm > 0.0 {
            (60_000_000.0 / bpm).round() as u32
        } else {
            0
        };
        Self::new(Division::Metrical { ppq }, [(0, micros_per_quarter)])
    }

    /// Build the tempo map of a whole file from tempo meta events on every track
    pub fn from_smf(smf: &Smf) -> Result<Self, TempoError> {
        let mut changes = Vec::new();

        for track in &smf.tracks {
            let mut tick = 0u64;
            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                    changes.push((tick, tempo.as_int()));
                }
            }
        }

        Self::new(smf.header.timing.into(), changes)
    }

    pub fn division(&self) -> Division {
        self.division
    }

    /// Number of tempo regions (at least one)
    pub fn region_count(&self) -> usize {
        self.segments.len()
    }

    /// Tempo in BPM at a tick, or None for timecode divisions
    pub fn bpm_at(&self, tick: u64) -> Option<f64> {
        match self.division {
            Division::Metrical { .. } => {
                let segment = self.segment_at_tick(tick);
                Some(60_000_000.0 / segment.micros_per_quarter as f64)
            }
            Division::Timecode { .. } => None,
        }
    }

    /// Inverse lookup: the last tick that starts at or before `micros`
    pub fn micros_to_tick(&self, micros: u64) -> u64 {
        match self.division {
            Division::Metrical { ppq } => {
                let index = self
                    .segments
                    .partition_point(|segment| segment.micros <= micros)
                    .saturating_sub(1);
                let segment = &self.segments[index];
                let elapsed = (micros - segment.micros) as u128;
                segment.tick
                    + (elapsed * ppq as u128 / segment.micros_per_quarter as u128) as u64
            }
            Division::Timecode { fps, subframes } => {
                let ticks_per_second = fps as f64 * subframes as f64;
                (micros as f64 * ticks_per_second / 1_000_000.0) as u64
            }
        }
    }

    fn segment_at_tick(&self, tick: u64) -> &TempoSegment {
        // segments[0] starts at tick 0
        let index = self
            .segments
            .partition_point(|segment| segment.tick <= tick)
            .saturating_sub(1);
        &self.segments[index]
    }

    fn micros_within(&self, segment: &TempoSegment, tick: u64) -> u64 {
        match self.division {
            Division::Metrical { ppq } => {
                let elapsed = (tick - segment.tick) as u128;
                segment.micros
                    + (elapsed * segment.micros_per_quarter as u128 / ppq as u128) as u64
            }
            Division::Timecode { fps, subframes } => {
                let ticks_per_second = fps as f64 * subframes as f64;
                (tick as f64 * 1_000_000.0 / ticks_per_second) as u64
            }
        }
    }
}

impl TickClock for TempoMap {
    fn tick_to_micros(&self, tick: u64) -> u64 {
        let segment = self.segment_at_tick(tick);
        self.micros_within(segment, tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{Format, Header, Track, TrackEvent};

    #[test]
    fn test_default_tempo_quarter_note() {
        let map = TempoMap::metrical(480).unwrap();

        // At 120 BPM, quarter note = 500ms
        assert_eq!(map.tick_to_micros(0), 0);
        assert_eq!(map.tick_to_micros(480), 500_000);
        assert_eq!(map.tick_to_micros(960), 1_000_000);
    }

    #[test]
    fn test_with_bpm() {
        let map = TempoMap::with_bpm(96, 60.0).unwrap();
        assert_eq!(map.tick_to_micros(96), 1_000_000);
        assert!((map.bpm_at(0).unwrap() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_tempo_change_mid_stream() {
        // 120 BPM for one beat, then 60 BPM
        let map = TempoMap::new(Division::Metrical { ppq: 480 }, [(480, 1_000_000)]).unwrap();

        assert_eq!(map.region_count(), 2);
        assert_eq!(map.tick_to_micros(480), 500_000);
        assert_eq!(map.tick_to_micros(960), 1_500_000);
        assert_eq!(map.tick_to_micros(720), 1_000_000);
    }

    #[test]
    fn test_same_tick_last_change_wins() {
        let map = TempoMap::new(
            Division::Metrical { ppq: 480 },
            [(0, 250_000), (0, 1_000_000)],
        )
        .unwrap();

        assert_eq!(map.region_count(), 1);
        assert_eq!(map.tick_to_micros(480), 1_000_000);
    }

    #[test]
    fn test_unsorted_changes_are_ordered() {
        let sorted = TempoMap::new(
            Division::Metrical { ppq: 480 },
            [(480, 1_000_000), (960, 250_000)],
        )
        .unwrap();
        let shuffled = TempoMap::new(
            Division::Metrical { ppq: 480 },
            [(960, 250_000), (480, 1_000_000)],
        )
        .unwrap();

        assert_eq!(sorted, shuffled);
    }

    #[test]
    fn test_monotonic_across_regions() {
        let map = TempoMap::new(
            Division::Metrical { ppq: 96 },
            [(100, 300_000), (250, 900_000), (251, 100_000)],
        )
        .unwrap();

        let mut previous = 0;
        for tick in 0..1000 {
            let micros = map.tick_to_micros(tick);
            assert!(micros >= previous);
            previous = micros;
        }
    }

    #[test]
    fn test_micros_to_tick_inverse() {
        let map = TempoMap::new(Division::Metrical { ppq: 480 }, [(480, 1_000_000)]).unwrap();
        assert_eq!(map.micros_to_tick(500_000), 480);
        assert_eq!(map.micros_to_tick(1_500_000), 960);
    }

    #[test]
    fn test_timecode_ignores_tempo() {
        let map = TempoMap::new(
            Division::Timecode { fps: 25.0, subframes: 40 },
            [(0, 1_000_000)],
        )
        .unwrap();

        // 25 fps * 40 = 1000 ticks per second
        assert_eq!(map.tick_to_micros(1000), 1_000_000);
        assert!(map.bpm_at(0).is_none());
    }

    #[test]
    fn test_rejects_invalid_divisions() {
        assert_eq!(TempoMap::metrical(0), Err(TempoError::ZeroResolution));
        assert!(matches!(
            TempoMap::new(Division::Timecode { fps: 30.0, subframes: 0 }, []),
            Err(TempoError::InvalidTimecode { .. })
        ));
        assert_eq!(
            TempoMap::new(Division::Metrical { ppq: 480 }, [(960, 0)]),
            Err(TempoError::ZeroTempo { tick: 960 })
        );
    }

    #[test]
    fn test_from_smf_collects_all_tracks() {
        let mut conductor = Track::new();
        conductor.push(TrackEvent {
            delta: 480.into(),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(1_000_000.into())),
        });
        conductor.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(480.into())));
        smf.tracks.push(conductor);
        smf.tracks.push(Track::new());

        let map = TempoMap::from_smf(&smf).unwrap();
        assert_eq!(map.division(), Division::Metrical { ppq: 480 });
        assert_eq!(map.tick_to_micros(960), 1_500_000);
    }
}
