// Parser configuration
// Tunable thresholds for note extraction, loadable from JSON

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Shortest fragment (in microseconds) kept when a pitch bend splits a note
pub const SHORTEST_NOTE_MICROS: u64 = 60_000;

/// Channel volume that leaves note velocities unscaled
pub const DEFAULT_REFERENCE_VOLUME: u8 = 100;

/// General MIDI percussion channel (channel 10, 0-indexed)
pub const DRUM_CHANNEL: u8 = 9;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Reference volume must be greater than zero")]
    ZeroReferenceVolume,

    #[error("Drum channel {0} is outside 0-15")]
    InvalidDrumChannel(u8),
}

/// Configuration for a track parse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Minimum duration of a note fragment produced by a pitch bend.
    /// Shorter fragments are absorbed into the re-pitched replacement.
    pub min_note_micros: u64,

    /// Channel volume at which note velocity passes through unchanged
    pub reference_volume: u8,

    /// Channel whose notes are fixed drum sounds (never bent)
    pub drum_channel: u8,

    /// Track names treated as absent (compared case-insensitively)
    pub placeholder_names: Vec<String>,

    /// Absorb too-short bend fragments into the following note.
    /// When disabled, every fragment is emitted regardless of length.
    pub absorb_short_fragments: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            min_note_micros: SHORTEST_NOTE_MICROS,
            reference_volume: DEFAULT_REFERENCE_VOLUME,
            drum_channel: DRUM_CHANNEL,
            placeholder_names: vec!["untitled".to_string(), "WinJammer Demo".to_string()],
            absorb_short_fragments: true,
        }
    }
}

impl ParserConfig {
    /// Parse a config from a JSON string; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ParserConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reference_volume == 0 {
            return Err(ConfigError::ZeroReferenceVolume);
        }
        if self.drum_channel > 15 {
            return Err(ConfigError::InvalidDrumChannel(self.drum_channel));
        }
        Ok(())
    }

    /// True if `name` is one of the placeholder track names
    pub fn is_placeholder_name(&self, name: &str) -> bool {
        self.placeholder_names
            .iter()
            .any(|placeholder| placeholder.eq_ignore_ascii_case(name))
    }
}
