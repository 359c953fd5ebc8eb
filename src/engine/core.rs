//! MetronomeEngine: lookahead scheduler driving the tone synthesizer.
//!
//! A tokio task wakes every `lookahead_ms` and commits every note whose onset
//! falls inside the schedule-ahead window to the output graph. Audio timing
//! therefore comes from the graph clock, while the coarse tick only has to
//! run often enough to keep the window filled. Beat notifications are
//! one-shot tasks delayed to the note's onset; each checks that its session
//! is still playing before invoking the callback.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::audio::NoiseBuffer;
use crate::config::{AudioConfig, EngineConfig, TimingConfig};
use crate::engine::backend::{AudioBackend, BackendFactory, CpalBackend, GraphState};
use crate::engine::cursor::BeatCursor;
use crate::error::{log_audio_error, AudioError};
use crate::synth::{self, NoteEvent, Timbre};
use crate::telemetry::TelemetryHub;

/// Callback receiving the beat index at each audible onset.
pub type BeatCallback = Arc<dyn Fn(u32) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

struct SchedulerState {
    playback: PlaybackState,
    /// Bumped on every successful start; deferred work from older sessions is stale
    session: u64,
    bpm: u32,
    beats_per_bar: u32,
    timbre: Timbre,
    cursor: BeatCursor,
    graph: Option<Arc<dyn AudioBackend>>,
    noise: Option<Arc<NoiseBuffer>>,
    tick_task: Option<JoinHandle<()>>,
}

struct Shared {
    state: Mutex<SchedulerState>,
    on_beat: BeatCallback,
    timing: TimingConfig,
    audio: AudioConfig,
    factory: BackendFactory,
    telemetry: TelemetryHub,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("[MetronomeEngine] Scheduler state lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn is_live(&self, session: u64) -> bool {
        let state = self.lock_state();
        state.playback == PlaybackState::Playing && state.session == session
    }
}

/// Metronome timing engine.
///
/// Owns playback state, tempo, bar length, timbre and the beat cursor. The
/// output graph and the drum noise buffer are created on the first
/// [`start`](Self::start) and reused until the engine is dropped.
///
/// `start()` must be called from within a tokio runtime; the tick and the
/// beat notifications are spawned on it.
pub struct MetronomeEngine {
    shared: Arc<Shared>,
}

impl MetronomeEngine {
    /// Create an engine with default configuration on the default output device.
    pub fn new<F>(on_beat: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        Self::with_config(EngineConfig::default(), CpalBackend::factory(), on_beat)
    }

    /// Create an engine with explicit configuration and graph factory.
    ///
    /// # Arguments
    /// * `config` - Timing surface, startup defaults and output parameters
    /// * `factory` - Builds the output graph on first `start()`
    /// * `on_beat` - Invoked with the beat index at each onset
    pub fn with_config<F>(config: EngineConfig, factory: BackendFactory, on_beat: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        let EngineConfig {
            timing,
            defaults,
            audio,
        } = config;

        let state = SchedulerState {
            playback: PlaybackState::Stopped,
            session: 0,
            bpm: defaults.bpm,
            beats_per_bar: defaults.beats_per_bar,
            timbre: defaults.timbre,
            cursor: BeatCursor::default(),
            graph: None,
            noise: None,
            tick_task: None,
        };

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                on_beat: Arc::new(on_beat),
                timing,
                audio,
                factory,
                telemetry: TelemetryHub::default(),
            }),
        }
    }

    // ========================================================================
    // TRANSPORT
    // ========================================================================

    /// Start playback. No-op when already playing.
    ///
    /// Creates the output graph and noise buffer on first use and resumes a
    /// suspended graph. The first note sounds `start_offset_secs` after the
    /// current graph time, on beat zero.
    ///
    /// # Errors
    /// * `RuntimeUnavailable` - not called from within a tokio runtime
    /// * `GraphUnavailable` - the output graph could not be created
    /// * `ResumeFailed` - the graph is suspended and refused to resume
    ///
    /// On error the engine stays stopped and a later call may retry.
    pub fn start(&self) -> Result<(), AudioError> {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        if state.playback == PlaybackState::Playing {
            return Ok(());
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => return Err(Self::fail(shared, AudioError::RuntimeUnavailable)),
        };

        let graph = match Self::ensure_graph(shared, &mut state) {
            Ok(graph) => graph,
            Err(err) => return Err(Self::fail(shared, err)),
        };

        if state.noise.is_none() {
            state.noise = Some(Arc::new(NoiseBuffer::generate(
                graph.sample_rate(),
                shared.audio.noise_buffer_secs,
            )));
        }

        if graph.state() == GraphState::Suspended {
            if let Err(err) = graph.resume() {
                return Err(Self::fail(shared, err));
            }
            log::info!("[MetronomeEngine] Resumed suspended output graph");
        }

        state.session += 1;
        state.playback = PlaybackState::Playing;
        let first_note = graph.current_time() + shared.timing.start_offset_secs;
        state.cursor.reset(first_note);

        let session = state.session;
        shared
            .telemetry
            .record_started(state.bpm, state.beats_per_bar, state.timbre, first_note);
        tracing::info!(
            bpm = state.bpm,
            beats_per_bar = state.beats_per_bar,
            timbre = %state.timbre,
            session,
            first_note,
            "metronome started"
        );

        Self::schedule_due_notes(shared, &mut state, &runtime, session);
        state.tick_task = Some(runtime.spawn(run_tick_loop(
            Arc::downgrade(shared),
            session,
            shared.timing.lookahead(),
        )));

        Ok(())
    }

    /// Stop playback. No-op when already stopped.
    ///
    /// Notes already committed to the graph play out; beat notifications
    /// that come due after this call are dropped.
    pub fn stop(&self) {
        let mut state = self.shared.lock_state();
        if state.playback == PlaybackState::Stopped {
            return;
        }

        state.playback = PlaybackState::Stopped;
        if let Some(task) = state.tick_task.take() {
            task.abort();
        }

        self.shared.telemetry.record_stopped(state.session);
        tracing::info!(session = state.session, "metronome stopped");
    }

    // ========================================================================
    // LIVE PARAMETERS
    // ========================================================================

    /// Set the tempo. Takes effect from the next beat interval; notes
    /// already scheduled keep their times. The value is not validated, see
    /// [`crate::config::clamp_bpm`].
    pub fn set_tempo(&self, bpm: u32) {
        self.shared.lock_state().bpm = bpm;
        self.shared.telemetry.record_tempo(bpm);
        log::debug!("[MetronomeEngine] Tempo set to {} BPM", bpm);
    }

    /// Set the bar length. The wrap check runs on the next cursor advance.
    pub fn set_beats_per_bar(&self, beats_per_bar: u32) {
        self.shared.lock_state().beats_per_bar = beats_per_bar;
        self.shared.telemetry.record_beats_per_bar(beats_per_bar);
        log::debug!("[MetronomeEngine] Beats per bar set to {}", beats_per_bar);
    }

    /// Set the click sound for notes scheduled from now on.
    pub fn set_timbre(&self, timbre: Timbre) {
        self.shared.lock_state().timbre = timbre;
        self.shared.telemetry.record_timbre(timbre);
        log::debug!("[MetronomeEngine] Timbre set to {}", timbre);
    }

    // ========================================================================
    // STATE QUERIES
    // ========================================================================

    pub fn playback_state(&self) -> PlaybackState {
        self.shared.lock_state().playback
    }

    pub fn is_playing(&self) -> bool {
        self.playback_state() == PlaybackState::Playing
    }

    pub fn bpm(&self) -> u32 {
        self.shared.lock_state().bpm
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.shared.lock_state().beats_per_bar
    }

    pub fn timbre(&self) -> Timbre {
        self.shared.lock_state().timbre
    }

    /// Index of the next beat to be scheduled.
    pub fn current_beat(&self) -> u32 {
        self.shared.lock_state().cursor.beat_index()
    }

    /// Graph time of the next note to be scheduled.
    pub fn next_note_time(&self) -> f64 {
        self.shared.lock_state().cursor.next_note_time()
    }

    /// The output graph, once the first `start()` has created it.
    pub fn graph(&self) -> Option<Arc<dyn AudioBackend>> {
        self.shared.lock_state().graph.clone()
    }

    pub fn noise_buffer(&self) -> Option<Arc<NoiseBuffer>> {
        self.shared.lock_state().noise.clone()
    }

    pub fn telemetry(&self) -> &TelemetryHub {
        &self.shared.telemetry
    }

    // ========================================================================
    // SCHEDULING
    // ========================================================================

    fn ensure_graph(
        shared: &Shared,
        state: &mut SchedulerState,
    ) -> Result<Arc<dyn AudioBackend>, AudioError> {
        if let Some(graph) = &state.graph {
            return Ok(Arc::clone(graph));
        }

        let graph = (shared.factory)(&shared.audio)?;
        log::info!(
            "[MetronomeEngine] Output graph created at {} Hz",
            graph.sample_rate()
        );
        state.graph = Some(Arc::clone(&graph));
        Ok(graph)
    }

    fn fail(shared: &Shared, err: AudioError) -> AudioError {
        log_audio_error(&err, "MetronomeEngine::start");
        shared.telemetry.record_error(&err, "start");
        err
    }

    /// Commit every note due inside the schedule-ahead window.
    fn schedule_due_notes(
        shared: &Arc<Shared>,
        state: &mut SchedulerState,
        runtime: &Handle,
        session: u64,
    ) {
        let Some(graph) = state.graph.clone() else {
            return;
        };

        let now = graph.current_time();
        let horizon = now + shared.timing.schedule_ahead_secs;

        while state.cursor.is_due(horizon) {
            let note = NoteEvent::new(
                state.cursor.beat_index(),
                state.cursor.next_note_time(),
                state.timbre,
            );

            if let Err(err) = synth::render_note(graph.as_ref(), &note, state.noise.as_ref()) {
                log_audio_error(&err, "schedule_due_notes");
                shared.telemetry.record_error(&err, "render_note");
            }
            shared.telemetry.record_note(&note, note.time - now);
            tracing::trace!(
                beat_index = note.beat_index,
                time = note.time,
                accent = note.accent,
                "note scheduled"
            );

            Self::spawn_beat_notification(shared, runtime, session, &note, now);
            state.cursor.advance(state.bpm, state.beats_per_bar);
        }
    }

    /// Fire `on_beat` at the note's onset. The delay is fixed here, from the
    /// clock reading taken when the note was scheduled.
    fn spawn_beat_notification(
        shared: &Arc<Shared>,
        runtime: &Handle,
        session: u64,
        note: &NoteEvent,
        now: f64,
    ) {
        let delay_ms = ((note.time - now) * 1000.0).max(0.0);
        let delay = Duration::from_secs_f64(delay_ms / 1000.0);
        let weak = Arc::downgrade(shared);
        let beat_index = note.beat_index;
        let time_secs = note.time;

        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if !shared.is_live(session) {
                tracing::trace!(beat_index, session, "dropping stale beat notification");
                return;
            }
            shared.telemetry.record_beat(beat_index, time_secs);
            (shared.on_beat)(beat_index);
        });
    }
}

/// Re-arm every `period` while `session` is playing. Returns when the engine
/// is stopped, restarted or dropped.
async fn run_tick_loop(shared: Weak<Shared>, session: u64, period: Duration) {
    loop {
        tokio::time::sleep(period).await;

        let Some(shared) = shared.upgrade() else {
            return;
        };
        let mut state = shared.lock_state();
        if state.playback != PlaybackState::Playing || state.session != session {
            return;
        }

        let runtime = Handle::current();
        MetronomeEngine::schedule_due_notes(&shared, &mut state, &runtime, session);
    }
}

impl Drop for MetronomeEngine {
    fn drop(&mut self) {
        let mut state = self.shared.lock_state();
        if let Some(task) = state.tick_task.take() {
            task.abort();
        }
        state.playback = PlaybackState::Stopped;
    }
}

// ========================================================================
// TESTS
// ========================================================================
