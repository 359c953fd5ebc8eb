//! Engine module housing the lookahead scheduler.
//!
//! This module exposes the trait-based output graphs (`backend`), the beat
//! cursor (`cursor`) and the `MetronomeEngine` orchestration layer (`core`).

pub mod backend;
pub mod core;
pub mod cursor;

pub use backend::{
    AudioBackend, BackendFactory, CpalBackend, GraphState, OfflineBackend, StubTimeSource,
    TimeSource, TokioTimeSource,
};
pub use self::core::{BeatCallback, MetronomeEngine, PlaybackState};
pub use cursor::{seconds_per_beat, BeatCursor};
