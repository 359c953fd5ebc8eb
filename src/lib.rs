// Click Engine - metronome timing and sound-scheduling core
// Lookahead scheduler committing synthesized clicks to a sample-accurate audio clock

// Module declarations
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod synth;
pub mod telemetry;

// Re-exports for convenience
pub use config::{
    clamp_beats_per_bar, clamp_bpm, EngineConfig, TimeSignature, MAX_BPM, MIN_BPM,
};
pub use engine::{
    AudioBackend, BackendFactory, CpalBackend, GraphState, MetronomeEngine, OfflineBackend,
    PlaybackState,
};
pub use error::{AudioError, ErrorCode};
pub use synth::{NoteEvent, Timbre};
pub use telemetry::{MetricEvent, TelemetrySnapshot};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        let config = EngineConfig::default();
        assert_eq!(config.defaults.timbre, Timbre::Digital);
        assert!(MIN_BPM < MAX_BPM);
    }
}
