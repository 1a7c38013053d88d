// Pipeline monitoring module
// Records the stages of a scan for later inspection

pub mod trace;

pub use trace::{
    read_trace_file, sequence_trace, TraceBuilder, TraceEntry, TraceError, TraceWriter,
    STAGE_LOAD, STAGE_TEMPO_MAP, STAGE_TRACK_PARSE,
};
