//! Core telemetry event types describing scheduler activity exposed to the
//! CLI and any front end subscribed to the engine.

use serde::{Deserialize, Serialize};

use crate::synth::Timbre;

/// Metric events covering the engine lifecycle, scheduled notes and
/// configuration changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    EngineStarted {
        bpm: u32,
        beats_per_bar: u32,
        timbre: Timbre,
        /// Audio-clock time of the first note
        first_note_secs: f64,
    },
    EngineStopped {
        session: u64,
    },
    NoteScheduled {
        beat_index: u32,
        time_secs: f64,
        timbre: Timbre,
        accent: bool,
    },
    BeatNotified {
        beat_index: u32,
        time_secs: f64,
    },
    /// Rolling stats over how far ahead of the clock notes were committed
    ScheduleLead {
        avg_ms: f32,
        min_ms: f32,
        sample_count: usize,
    },
    TempoChanged {
        bpm: u32,
    },
    BeatsPerBarChanged {
        beats_per_bar: u32,
    },
    TimbreChanged {
        timbre: Timbre,
    },
    Error {
        code: i32,
        context: String,
    },
}

impl MetricEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MetricEvent::EngineStarted { .. } => "engine_started",
            MetricEvent::EngineStopped { .. } => "engine_stopped",
            MetricEvent::NoteScheduled { .. } => "note_scheduled",
            MetricEvent::BeatNotified { .. } => "beat_notified",
            MetricEvent::ScheduleLead { .. } => "schedule_lead",
            MetricEvent::TempoChanged { .. } => "tempo_changed",
            MetricEvent::BeatsPerBarChanged { .. } => "beats_per_bar_changed",
            MetricEvent::TimbreChanged { .. } => "timbre_changed",
            MetricEvent::Error { .. } => "error",
        }
    }
}
