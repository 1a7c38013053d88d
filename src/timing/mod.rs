// Timing - Sequence-wide lookup services
// Tempo map and controller state queried by the track parser

pub mod controllers;
pub mod tempo;

pub use controllers::{
    ChannelControllers, ControllerCache, CHANNEL_COUNT, DEFAULT_CHANNEL_VOLUME,
    DEFAULT_PITCH_BEND_RANGE, DEFAULT_PROGRAM,
};
pub use tempo::{Division, TempoError, TempoMap, TickClock, DEFAULT_MICROS_PER_QUARTER};
