// Metadata Extractor - Track name, key and time signature
// First valid occurrence of each kind wins

use serde::{Deserialize, Serialize};
use std::fmt;

use super::anomaly::MetaOutcome;
use crate::config::ParserConfig;

const MAJOR_KEYS: [&str; 15] = [
    "Cb", "Gb", "Db", "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#",
];

const MINOR_KEYS: [&str; 15] = [
    "Ab", "Eb", "Bb", "F", "C", "G", "D", "A", "E", "B", "F#", "C#", "G#", "D#", "A#",
];

/// Key signature as sharps (positive) or flats (negative) plus mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    /// -7 (7 flats) to 7 (7 sharps)
    pub sharps: i8,
    pub minor: bool,
}

impl KeySignature {
    /// Parse a key signature meta payload: [sharps as i8, mode]
    pub fn from_raw(raw: &[u8]) -> Option<Self> {
        let [sharps, mode] = raw else {
            return None;
        };
        let sharps = *sharps as i8;
        if !(-7..=7).contains(&sharps) || *mode > 1 {
            return None;
        }
        Some(KeySignature {
            sharps,
            minor: *mode == 1,
        })
    }

    pub fn to_raw(&self) -> [u8; 2] {
        [self.sharps as u8, self.minor as u8]
    }

    /// Tonic name, e.g. "Eb" or "F#", or None outside -7..=7
    pub fn tonic(&self) -> Option<&'static str> {
        let index = usize::try_from(self.sharps as i16 + 7).ok()?;
        let names = if self.minor { &MINOR_KEYS } else { &MAJOR_KEYS };
        names.get(index).copied()
    }
}

impl fmt::Display for KeySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.minor { "minor" } else { "major" };
        match self.tonic() {
            Some(tonic) => write!(f, "{} {}", tonic, mode),
            None => write!(f, "{} accidentals {}", self.sharps, mode),
        }
    }
}

/// Meter of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,

    /// Note value of one beat (4 = quarter note)
    pub denominator: u16,

    /// MIDI clocks per metronome click
    pub clocks_per_click: u8,

    /// Notated 32nd notes per MIDI quarter note
    pub thirty_seconds_per_quarter: u8,
}

impl TimeSignature {
    /// Parse a time signature meta payload: [numerator, log2 denominator,
    /// clocks per click, 32nds per quarter]
    pub fn from_raw(raw: &[u8]) -> Option<Self> {
        let [numerator, power, clocks_per_click, thirty_seconds_per_quarter] = raw else {
            return None;
        };
        if *numerator == 0 || *power > 7 {
            return None;
        }
        Some(TimeSignature {
            numerator: *numerator,
            denominator: 1 << *power,
            clocks_per_click: *clocks_per_click,
            thirty_seconds_per_quarter: *thirty_seconds_per_quarter,
        })
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.numerator as u32
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
            clocks_per_click: 24,
            thirty_seconds_per_quarter: 8,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Collects first-wins metadata while a track is parsed
#[derive(Debug, Clone, Default)]
pub struct MetadataExtractor {
    name: Option<String>,
    key_signature: Option<KeySignature>,
    time_signature: Option<TimeSignature>,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_name(&mut self, raw: &[u8], config: &ParserConfig) -> MetaOutcome {
        if self.name.is_some() {
            return MetaOutcome::AlreadySet;
        }

        let text = String::from_utf8_lossy(raw);
        let text = text.trim();
        if text.is_empty() || config.is_placeholder_name(text) {
            return MetaOutcome::Rejected;
        }

        self.name = Some(text.to_string());
        MetaOutcome::Captured
    }

    pub fn key_signature(&mut self, raw: &[u8]) -> MetaOutcome {
        if self.key_signature.is_some() {
            return MetaOutcome::AlreadySet;
        }
        match KeySignature::from_raw(raw) {
            Some(key) => {
                self.key_signature = Some(key);
                MetaOutcome::Captured
            }
            None => MetaOutcome::Malformed,
        }
    }

    pub fn time_signature(&mut self, raw: &[u8]) -> MetaOutcome {
        if self.time_signature.is_some() {
            return MetaOutcome::AlreadySet;
        }
        match TimeSignature::from_raw(raw) {
            Some(meter) => {
                self.time_signature = Some(meter);
                MetaOutcome::Captured
            }
            None => MetaOutcome::Malformed,
        }
    }

    pub fn finish(self) -> (Option<String>, Option<KeySignature>, Option<TimeSignature>) {
        (self.name, self.key_signature, self.time_signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_signature_names() {
        assert_eq!(KeySignature::from_raw(&[0, 0]).unwrap().to_string(), "C major");
        assert_eq!(KeySignature::from_raw(&[3, 1]).unwrap().to_string(), "F# minor");
        assert_eq!(
            KeySignature::from_raw(&[(-3i8) as u8, 0]).unwrap().to_string(),
            "Eb major"
        );
        assert_eq!(
            KeySignature::from_raw(&[(-7i8) as u8, 1]).unwrap().to_string(),
            "Ab minor"
        );
    }

    #[test]
    fn test_key_signature_rejects_malformed() {
        assert!(KeySignature::from_raw(&[8, 0]).is_none());
        assert!(KeySignature::from_raw(&[0, 2]).is_none());
        assert!(KeySignature::from_raw(&[0]).is_none());
        assert!(KeySignature::from_raw(&[0, 0, 0]).is_none());
    }

    #[test]
    fn test_out_of_range_key_signature_displays() {
        let key: KeySignature = serde_json::from_str(r#"{"sharps": 20, "minor": false}"#).unwrap();
        assert_eq!(key.tonic(), None);
        assert_eq!(key.to_string(), "20 accidentals major");

        let key = KeySignature { sharps: i8::MIN, minor: true };
        assert_eq!(key.tonic(), None);
        assert_eq!(key.to_string(), "-128 accidentals minor");
    }

    #[test]
    fn test_key_signature_raw_round_trip() {
        let key = KeySignature { sharps: -2, minor: true };
        assert_eq!(KeySignature::from_raw(&key.to_raw()), Some(key));
    }

    #[test]
    fn test_time_signature_parsing() {
        let meter = TimeSignature::from_raw(&[6, 3, 36, 8]).unwrap();
        assert_eq!(meter.to_string(), "6/8");
        assert_eq!(meter.beats_per_bar(), 6);

        assert!(TimeSignature::from_raw(&[0, 2, 24, 8]).is_none());
        assert!(TimeSignature::from_raw(&[4, 2]).is_none());
        assert_eq!(TimeSignature::default().to_string(), "4/4");
    }

    #[test]
    fn test_first_name_wins() {
        let config = ParserConfig::default();
        let mut extractor = MetadataExtractor::new();

        assert_eq!(extractor.track_name(b"  Strings  ", &config), MetaOutcome::Captured);
        assert_eq!(extractor.track_name(b"Brass", &config), MetaOutcome::AlreadySet);

        let (name, _, _) = extractor.finish();
        assert_eq!(name.as_deref(), Some("Strings"));
    }

    #[test]
    fn test_placeholder_names_do_not_claim_slot() {
        let config = ParserConfig::default();
        let mut extractor = MetadataExtractor::new();

        assert_eq!(extractor.track_name(b"   ", &config), MetaOutcome::Rejected);
        assert_eq!(extractor.track_name(b"Untitled", &config), MetaOutcome::Rejected);
        assert_eq!(extractor.track_name(b"WINJAMMER DEMO", &config), MetaOutcome::Rejected);
        assert_eq!(extractor.track_name(b"Bass", &config), MetaOutcome::Captured);
    }

    #[test]
    fn test_malformed_signature_does_not_claim_slot() {
        let mut extractor = MetadataExtractor::new();

        assert_eq!(extractor.key_signature(&[9, 0]), MetaOutcome::Malformed);
        assert_eq!(extractor.key_signature(&[2, 0]), MetaOutcome::Captured);
        assert_eq!(extractor.key_signature(&[4, 0]), MetaOutcome::AlreadySet);

        assert_eq!(extractor.time_signature(&[3, 2, 24, 8]), MetaOutcome::Captured);
        assert_eq!(extractor.time_signature(&[4, 2, 24, 8]), MetaOutcome::AlreadySet);

        let (_, key, meter) = extractor.finish();
        assert_eq!(key.unwrap().to_string(), "D major");
        assert_eq!(meter.unwrap().to_string(), "3/4");
    }
}
