// Controller Values - Time-varying channel state
// Channel volume, program and pitch-bend range as step functions of tick

use midly::{MidiMessage, Smf, TrackEventKind};

/// Number of MIDI channels
pub const CHANNEL_COUNT: usize = 16;

/// Channel volume before any CC 7 message
pub const DEFAULT_CHANNEL_VOLUME: u8 = 100;

/// Program before any program change (Acoustic Grand Piano)
pub const DEFAULT_PROGRAM: u8 = 0;

/// Pitch-bend range in semitones before any RPN 0 data entry
pub const DEFAULT_PITCH_BEND_RANGE: f64 = 2.0;

const CC_DATA_ENTRY_MSB: u8 = 6;
const CC_VOLUME: u8 = 7;
const CC_DATA_ENTRY_LSB: u8 = 38;
const CC_NRPN_LSB: u8 = 98;
const CC_NRPN_MSB: u8 = 99;
const CC_RPN_LSB: u8 = 100;
const CC_RPN_MSB: u8 = 101;
const RPN_NULL: u8 = 127;

/// Read-only lookup of controller state at a point in the sequence
pub trait ChannelControllers {
    /// Channel volume (0-127)
    fn volume(&self, channel: u8, tick: u64) -> u8;

    /// Program number (0-127)
    fn program(&self, channel: u8, tick: u64) -> u8;

    /// Pitch-bend range in semitones (may be fractional)
    fn pitch_bend_range(&self, channel: u8, tick: u64) -> f64;
}

/// Values of one controller, sorted by tick
#[derive(Debug, Clone, Default)]
struct Timeline<T> {
    changes: Vec<(u64, T)>,
}

impl<T: Copy> Timeline<T> {
    /// Insert keeping tick order; a later insert at the same tick wins
    fn insert(&mut self, tick: u64, value: T) {
        let index = self.changes.partition_point(|(t, _)| *t <= tick);
        self.changes.insert(index, (tick, value));
    }

    fn value_at(&self, tick: u64) -> Option<T> {
        let index = self.changes.partition_point(|(t, _)| *t <= tick);
        index.checked_sub(1).map(|i| self.changes[i].1)
    }

    fn len(&self) -> usize {
        self.changes.len()
    }
}

#[derive(Debug, Clone, Default)]
struct ChannelTimelines {
    volume: Timeline<u8>,
    program: Timeline<u8>,
    bend_range: Timeline<f64>,
}

/// Registered-parameter selection while scanning one track
#[derive(Debug, Clone, Copy, Default)]
struct RpnScan {
    selected: Option<(u8, u8)>,
    semitones: Option<u8>,
    cents: u8,
}

impl RpnScan {
    fn selects_bend_range(&self) -> bool {
        self.selected == Some((0, 0))
    }

    fn range(&self, fallback: f64) -> f64 {
        match self.semitones {
            Some(semitones) => semitones as f64 + self.cents as f64 / 100.0,
            None => fallback.trunc() + self.cents as f64 / 100.0,
        }
    }
}

/// Controller state for every channel of a sequence
#[derive(Debug, Clone)]
pub struct ControllerCache {
    channels: [ChannelTimelines; CHANNEL_COUNT],
}

impl Default for ControllerCache {
    fn default() -> Self {
        ControllerCache {
            channels: std::array::from_fn(|_| ChannelTimelines::default()),
        }
    }
}

impl ControllerCache {
    /// Empty cache: every lookup returns the General MIDI default
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the cache from controller messages on every track of a file
    pub fn from_smf(smf: &Smf) -> Self {
        let mut cache = Self::new();
        for track in &smf.tracks {
            let mut rpn = [RpnScan::default(); CHANNEL_COUNT];
            let mut tick = 0u64;

            for event in track {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Midi { channel, message } = event.kind {
                    let channel = channel.as_int();
                    cache.apply(channel, tick, &message, &mut rpn[channel as usize]);
                }
            }
        }

        log::debug!(
            "Controller cache built: {} volume, {} program, {} bend-range changes",
            cache.channels.iter().map(|c| c.volume.len()).sum::<usize>(),
            cache.channels.iter().map(|c| c.program.len()).sum::<usize>(),
            cache.channels.iter().map(|c| c.bend_range.len()).sum::<usize>(),
        );
        cache
    }

    pub fn set_volume(&mut self, channel: u8, tick: u64, volume: u8) {
        if let Some(timelines) = self.channels.get_mut(channel as usize) {
            timelines.volume.insert(tick, volume.min(127));
        }
    }

    pub fn set_program(&mut self, channel: u8, tick: u64, program: u8) {
        if let Some(timelines) = self.channels.get_mut(channel as usize) {
            timelines.program.insert(tick, program.min(127));
        }
    }

    pub fn set_pitch_bend_range(&mut self, channel: u8, tick: u64, semitones: f64) {
        if let Some(timelines) = self.channels.get_mut(channel as usize) {
            timelines.bend_range.insert(tick, semitones.max(0.0));
        }
    }

    fn apply(&mut self, channel: u8, tick: u64, message: &MidiMessage, rpn: &mut RpnScan) {
        match *message {
            MidiMessage::ProgramChange { program } => {
                self.set_program(channel, tick, program.as_int());
            }
            MidiMessage::Controller { controller, value } => {
                let value = value.as_int();
                match controller.as_int() {
                    CC_VOLUME => self.set_volume(channel, tick, value),
                    CC_RPN_MSB => {
                        let lsb = rpn.selected.map_or(0, |(_, lsb)| lsb);
                        rpn.selected = Some((value, lsb));
                    }
                    CC_RPN_LSB => {
                        let msb = rpn.selected.map_or(0, |(msb, _)| msb);
                        rpn.selected = Some((msb, value));
                    }
                    CC_NRPN_MSB | CC_NRPN_LSB => rpn.selected = None,
                    CC_DATA_ENTRY_MSB if rpn.selects_bend_range() => {
                        rpn.semitones = Some(value);
                        let range = rpn.range(DEFAULT_PITCH_BEND_RANGE);
                        self.set_pitch_bend_range(channel, tick, range);
                    }
                    CC_DATA_ENTRY_LSB if rpn.selects_bend_range() => {
                        rpn.cents = value.min(99);
                        let current = self.pitch_bend_range(channel, tick);
                        self.set_pitch_bend_range(channel, tick, rpn.range(current));
                    }
                    _ => {}
                }
                if rpn.selected == Some((RPN_NULL, RPN_NULL)) {
                    rpn.selected = None;
                }
            }
            _ => {}
        }
    }
}

impl ChannelControllers for ControllerCache {
    fn volume(&self, channel: u8, tick: u64) -> u8 {
        self.channels
            .get(channel as usize)
            .and_then(|c| c.volume.value_at(tick))
            .unwrap_or(DEFAULT_CHANNEL_VOLUME)
    }

    fn program(&self, channel: u8, tick: u64) -> u8 {
        self.channels
            .get(channel as usize)
            .and_then(|c| c.program.value_at(tick))
            .unwrap_or(DEFAULT_PROGRAM)
    }

    fn pitch_bend_range(&self, channel: u8, tick: u64) -> f64 {
        self.channels
            .get(channel as usize)
            .and_then(|c| c.bend_range.value_at(tick))
            .unwrap_or(DEFAULT_PITCH_BEND_RANGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::{Format, Header, Timing, Track, TrackEvent};

    fn controller(delta: u32, channel: u8, controller: u8, value: u8) -> TrackEvent<'static> {
        TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: channel.into(),
                message: MidiMessage::Controller {
                    controller: controller.into(),
                    value: value.into(),
                },
            },
        }
    }

    #[test]
    fn test_defaults_without_changes() {
        let cache = ControllerCache::new();
        assert_eq!(cache.volume(0, 1000), DEFAULT_CHANNEL_VOLUME);
        assert_eq!(cache.program(3, 0), DEFAULT_PROGRAM);
        assert_eq!(cache.pitch_bend_range(15, 99), DEFAULT_PITCH_BEND_RANGE);
    }

    #[test]
    fn test_step_lookup() {
        let mut cache = ControllerCache::new();
        cache.set_volume(2, 480, 64);
        cache.set_volume(2, 960, 127);

        assert_eq!(cache.volume(2, 479), DEFAULT_CHANNEL_VOLUME);
        assert_eq!(cache.volume(2, 480), 64);
        assert_eq!(cache.volume(2, 959), 64);
        assert_eq!(cache.volume(2, 5000), 127);

        // Other channels are independent
        assert_eq!(cache.volume(3, 5000), DEFAULT_CHANNEL_VOLUME);
    }

    #[test]
    fn test_out_of_order_inserts() {
        let mut cache = ControllerCache::new();
        cache.set_program(0, 960, 40);
        cache.set_program(0, 0, 24);
        cache.set_program(0, 960, 41);

        assert_eq!(cache.program(0, 100), 24);
        // Same tick: last insert wins
        assert_eq!(cache.program(0, 960), 41);
    }

    #[test]
    fn test_out_of_range_channel_returns_defaults() {
        let mut cache = ControllerCache::new();
        cache.set_volume(16, 0, 10);
        assert_eq!(cache.volume(16, 0), DEFAULT_CHANNEL_VOLUME);
    }

    #[test]
    fn test_from_smf_reads_volume_program_and_rpn() {
        let mut track = Track::new();
        track.push(controller(0, 1, CC_VOLUME, 50));
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Midi {
                channel: 1.into(),
                message: MidiMessage::ProgramChange { program: 73.into() },
            },
        });
        // RPN 0 = 12 semitones, 50 cents
        track.push(controller(240, 1, CC_RPN_MSB, 0));
        track.push(controller(0, 1, CC_RPN_LSB, 0));
        track.push(controller(0, 1, CC_DATA_ENTRY_MSB, 12));
        track.push(controller(0, 1, CC_DATA_ENTRY_LSB, 50));
        track.push(controller(0, 1, CC_RPN_MSB, RPN_NULL));
        track.push(controller(0, 1, CC_RPN_LSB, RPN_NULL));
        // Data entry after RPN null is ignored
        track.push(controller(240, 1, CC_DATA_ENTRY_MSB, 24));

        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(480.into())));
        smf.tracks.push(track);

        let cache = ControllerCache::from_smf(&smf);
        assert_eq!(cache.volume(1, 0), 50);
        assert_eq!(cache.program(1, 0), 73);
        assert_eq!(cache.pitch_bend_range(1, 0), DEFAULT_PITCH_BEND_RANGE);
        assert!((cache.pitch_bend_range(1, 240) - 12.5).abs() < 1e-9);
        assert!((cache.pitch_bend_range(1, 480) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_nrpn_data_entry_does_not_change_bend_range() {
        let mut track = Track::new();
        track.push(controller(0, 0, CC_NRPN_MSB, 0));
        track.push(controller(0, 0, CC_NRPN_LSB, 0));
        track.push(controller(0, 0, CC_DATA_ENTRY_MSB, 7));

        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(96.into())));
        smf.tracks.push(track);

        let cache = ControllerCache::from_smf(&smf);
        assert_eq!(cache.pitch_bend_range(0, 0), DEFAULT_PITCH_BEND_RANGE);
    }
}
