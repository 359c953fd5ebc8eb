//! Scheduler telemetry collector and helpers.
//!
//! Each engine owns a [`TelemetryHub`]. The hub's collector multiplexes
//! lifecycle, note and configuration events into a bounded history plus an
//! async broadcast stream. Publishing never blocks, so the hub is safe to
//! call from inside the scheduler tick.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::error::{AudioError, ErrorCode};
use crate::synth::{NoteEvent, Timbre};

pub mod events;

pub use events::MetricEvent;

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<MetricEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub notes_scheduled: u64,
    pub beats_notified: u64,
}

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Broadcast-based collector retaining a bounded history of metrics.
pub struct TelemetryCollector {
    tx: broadcast::Sender<MetricEvent>,
    history: Mutex<VecDeque<MetricEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: MetricEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if self.history_capacity > 0 {
            let mut history = lock_or_recover(&self.history);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        let _ = self.tx.send(event);
    }

    /// Subscribe as a `Stream`; lagging consumers see `Err(Lagged)` items.
    pub fn subscribe_stream(&self) -> BroadcastStream<MetricEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    pub fn snapshot(&self) -> (Vec<MetricEvent>, u64, u64) {
        let history = lock_or_recover(&self.history);
        (
            history.iter().cloned().collect(),
            self.total_events.load(Ordering::Relaxed),
            self.dropped_history.load(Ordering::Relaxed),
        )
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Lead tracker maintains a rolling window of scheduling lead times
/// (note time minus clock time at scheduling) to compute avg/min lead.
struct LeadTracker {
    samples: VecDeque<f32>,
    max_samples: usize,
}

impl LeadTracker {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
        }
    }

    fn observe(&mut self, lead_ms: f32) -> (f32, f32, usize) {
        if self.samples.len() == self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(lead_ms);

        let count = self.samples.len();
        let sum: f32 = self.samples.iter().copied().sum();
        let min = self.samples.iter().copied().fold(f32::INFINITY, f32::min);
        let avg = if count == 0 { 0.0 } else { sum / count as f32 };
        (avg, min, count)
    }
}

/// Per-engine hub wrapping collector state plus derived gauges.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    lead: Mutex<LeadTracker>,
    /// Emit a `ScheduleLead` summary every N scheduled notes
    lead_report_every: u64,
    notes_scheduled: AtomicU64,
    beats_notified: AtomicU64,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize, lead_window: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            lead: Mutex::new(LeadTracker::new(lead_window)),
            lead_report_every: lead_window.max(1) as u64,
            notes_scheduled: AtomicU64::new(0),
            beats_notified: AtomicU64::new(0),
        }
    }

    pub fn subscribe_stream(&self) -> BroadcastStream<MetricEvent> {
        self.collector.subscribe_stream()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let (recent, total_events, dropped_events) = self.collector.snapshot();
        TelemetrySnapshot {
            recent,
            total_events,
            dropped_events,
            notes_scheduled: self.notes_scheduled.load(Ordering::Relaxed),
            beats_notified: self.beats_notified.load(Ordering::Relaxed),
        }
    }

    pub fn record_started(&self, bpm: u32, beats_per_bar: u32, timbre: Timbre, first_note: f64) {
        self.collector.publish(MetricEvent::EngineStarted {
            bpm,
            beats_per_bar,
            timbre,
            first_note_secs: first_note,
        });
    }

    pub fn record_stopped(&self, session: u64) {
        self.collector
            .publish(MetricEvent::EngineStopped { session });
    }

    /// Record a note handed to the synthesizer `lead_secs` ahead of the clock.
    pub fn record_note(&self, note: &NoteEvent, lead_secs: f64) {
        self.collector.publish(MetricEvent::NoteScheduled {
            beat_index: note.beat_index,
            time_secs: note.time,
            timbre: note.timbre,
            accent: note.accent,
        });

        let scheduled = self.notes_scheduled.fetch_add(1, Ordering::Relaxed) + 1;
        let (avg, min, count) = lock_or_recover(&self.lead).observe((lead_secs * 1000.0) as f32);

        if scheduled % self.lead_report_every == 0 {
            self.collector.publish(MetricEvent::ScheduleLead {
                avg_ms: avg,
                min_ms: min,
                sample_count: count,
            });
        }
    }

    pub fn record_beat(&self, beat_index: u32, time_secs: f64) {
        self.beats_notified.fetch_add(1, Ordering::Relaxed);
        self.collector.publish(MetricEvent::BeatNotified {
            beat_index,
            time_secs,
        });
    }

    pub fn record_tempo(&self, bpm: u32) {
        self.collector.publish(MetricEvent::TempoChanged { bpm });
    }

    pub fn record_beats_per_bar(&self, beats_per_bar: u32) {
        self.collector
            .publish(MetricEvent::BeatsPerBarChanged { beats_per_bar });
    }

    pub fn record_timbre(&self, timbre: Timbre) {
        self.collector.publish(MetricEvent::TimbreChanged { timbre });
    }

    pub fn record_error(&self, err: &AudioError, context: impl Into<String>) {
        self.collector.publish(MetricEvent::Error {
            code: err.code(),
            context: context.into(),
        });
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64, 16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(MetricEvent::TempoChanged { bpm: 90 });
        collector.publish(MetricEvent::TempoChanged { bpm: 100 });
        collector.publish(MetricEvent::TimbreChanged {
            timbre: Timbre::Drum,
        });

        let (recent, total, _) = collector.snapshot();
        assert_eq!(recent.len(), 3);
        assert_eq!(total, 3);
        assert_eq!(recent[0], MetricEvent::TempoChanged { bpm: 90 });
        assert!(matches!(recent[2], MetricEvent::TimbreChanged { .. }));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for bpm in [60, 70, 80] {
            collector.publish(MetricEvent::TempoChanged { bpm });
        }

        let (recent, _, dropped) = collector.snapshot();
        assert_eq!(recent.len(), 2);
        assert_eq!(dropped, 1);
        assert_eq!(recent[0], MetricEvent::TempoChanged { bpm: 70 });
    }

    #[test]
    fn hub_reports_schedule_lead_every_window() {
        let hub = TelemetryHub::new(16, 16, 2);
        let note = NoteEvent::new(0, 1.0, Timbre::Digital);
        hub.record_note(&note, 0.080);
        hub.record_note(&note, 0.020);

        let snapshot = hub.snapshot();
        assert_eq!(snapshot.notes_scheduled, 2);
        let lead = snapshot
            .recent
            .iter()
            .find_map(|event| match event {
                MetricEvent::ScheduleLead {
                    avg_ms,
                    min_ms,
                    sample_count,
                } => Some((*avg_ms, *min_ms, *sample_count)),
                _ => None,
            })
            .expect("lead summary");
        assert!((lead.0 - 50.0).abs() < 0.01);
        assert!((lead.1 - 20.0).abs() < 0.01);
        assert_eq!(lead.2, 2);
    }

    #[test]
    fn hub_records_error_codes() {
        let hub = TelemetryHub::default();
        hub.record_error(&AudioError::NoiseBufferMissing, "render_note");
        let snapshot = hub.snapshot();
        assert_eq!(
            snapshot.recent[0],
            MetricEvent::Error {
                code: 1007,
                context: "render_note".to_string()
            }
        );
    }

    #[tokio::test]
    async fn stream_delivers_published_events() {
        let hub = TelemetryHub::default();
        let mut stream = hub.subscribe_stream();
        hub.record_beat(3, 1.5);
        hub.record_tempo(140);

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(
            first,
            MetricEvent::BeatNotified {
                beat_index: 3,
                time_secs: 1.5
            }
        );
        assert_eq!(second, MetricEvent::TempoChanged { bpm: 140 });
        assert_eq!(hub.snapshot().beats_notified, 1);
    }
}
