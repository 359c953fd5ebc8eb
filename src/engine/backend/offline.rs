use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::audio::{Voice, VoiceMixer};
use crate::error::AudioError;

use super::{AudioBackend, BackendFactory, GraphState, TimeSource, TokioTimeSource};

const BOUNCE_BLOCK_FRAMES: usize = 1024;

/// Offline output graph used for deterministic testing and CLI rendering.
///
/// No device is opened. The audio clock is derived from a [`TimeSource`],
/// every scheduled voice is recorded, and the recording can be bounced into
/// a mono sample buffer.
pub struct OfflineBackend {
    sample_rate: u32,
    time_source: Arc<dyn TimeSource>,
    origin: Instant,
    suspended: AtomicBool,
    fail_resume: AtomicBool,
    resume_calls: AtomicU64,
    voices: Mutex<Vec<Voice>>,
}

impl OfflineBackend {
    pub fn new(sample_rate: u32, time_source: Arc<dyn TimeSource>) -> Self {
        let origin = time_source.now();
        Self {
            sample_rate,
            time_source,
            origin,
            suspended: AtomicBool::new(false),
            fail_resume: AtomicBool::new(false),
            resume_calls: AtomicU64::new(0),
            voices: Mutex::new(Vec::new()),
        }
    }

    /// Offline graph whose clock follows tokio time.
    pub fn with_tokio_clock(sample_rate: u32) -> Self {
        Self::new(sample_rate, Arc::new(TokioTimeSource::default()))
    }

    /// Start suspended, like an output graph created without user activation.
    pub fn suspended(self) -> Self {
        self.suspended.store(true, Ordering::SeqCst);
        self
    }

    /// Make subsequent `resume()` calls fail.
    pub fn set_resume_failure(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::SeqCst);
    }

    /// Suspend the graph, as a host does when the app loses audio focus.
    pub fn suspend(&self) {
        self.suspended.store(true, Ordering::SeqCst);
    }

    /// Number of `resume()` calls that reached a suspended graph.
    pub fn resume_calls(&self) -> u64 {
        self.resume_calls.load(Ordering::SeqCst)
    }

    /// Factory handing out this backend, so callers keep a typed handle.
    pub fn shared_factory(backend: &Arc<OfflineBackend>) -> BackendFactory {
        let backend = Arc::clone(backend);
        Box::new(move |_config| Ok(Arc::clone(&backend) as Arc<dyn AudioBackend>))
    }

    /// Factory building a fresh tokio-clocked backend at the configured rate.
    pub fn factory() -> BackendFactory {
        Box::new(|config| {
            Ok(Arc::new(OfflineBackend::with_tokio_clock(config.sample_rate))
                as Arc<dyn AudioBackend>)
        })
    }

    /// Voices scheduled so far, in scheduling order.
    pub fn scheduled_voices(&self) -> Vec<Voice> {
        match self.voices.lock() {
            Ok(voices) => voices.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn voice_count(&self) -> usize {
        match self.voices.lock() {
            Ok(voices) => voices.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Mix every recorded voice into `duration_secs` of mono audio starting
    /// at clock zero.
    pub fn bounce(&self, duration_secs: f64) -> Vec<f32> {
        let total_frames = (duration_secs.max(0.0) * self.sample_rate as f64).round() as usize;
        let mut mixer = VoiceMixer::new(self.sample_rate, Arc::new(AtomicU64::new(0)));
        for voice in self.scheduled_voices() {
            mixer.add_voice(voice);
        }

        let mut output = vec![0.0_f32; total_frames];
        for block in output.chunks_mut(BOUNCE_BLOCK_FRAMES) {
            mixer.render(block, 1);
        }
        output
    }
}

impl AudioBackend for OfflineBackend {
    fn current_time(&self) -> f64 {
        self.time_source
            .now()
            .saturating_duration_since(self.origin)
            .as_secs_f64()
    }

    fn state(&self) -> GraphState {
        if self.suspended.load(Ordering::SeqCst) {
            GraphState::Suspended
        } else {
            GraphState::Running
        }
    }

    fn resume(&self) -> Result<(), AudioError> {
        if !self.suspended.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.resume_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(AudioError::ResumeFailed {
                reason: "offline graph configured to reject resume".to_string(),
            });
        }

        self.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn schedule(&self, voice: Voice) -> Result<(), AudioError> {
        let mut voices = self.voices.lock().map_err(|_| AudioError::LockPoisoned {
            component: "offline_voices".to_string(),
        })?;
        voices.push(voice);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Deterministic time source for tests that run without a tokio clock.
///
/// Each call to `now()` advances by a fixed 10ms to guarantee monotonic
/// timestamps.
pub struct StubTimeSource {
    start: Instant,
    offset_ms: AtomicU64,
}

impl StubTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let ms = self.offset_ms.fetch_add(10, Ordering::SeqCst);
        self.start + Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::timbres;

    #[test]
    fn test_stub_clock_is_monotonic() {
        let backend = OfflineBackend::new(48000, Arc::new(StubTimeSource::new()));
        let first = backend.current_time();
        let second = backend.current_time();
        assert!(second > first);
        assert!((second - first - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_resume_from_suspended() {
        let backend = OfflineBackend::with_tokio_clock(48000).suspended();
        assert_eq!(backend.state(), GraphState::Suspended);
        backend.resume().unwrap();
        assert_eq!(backend.state(), GraphState::Running);
        assert_eq!(backend.resume_calls(), 1);

        // Running graphs ignore resume
        backend.resume().unwrap();
        assert_eq!(backend.resume_calls(), 1);
    }

    #[test]
    fn test_resume_failure_keeps_suspended() {
        let backend = OfflineBackend::with_tokio_clock(48000).suspended();
        backend.set_resume_failure(true);
        assert!(matches!(
            backend.resume(),
            Err(AudioError::ResumeFailed { .. })
        ));
        assert_eq!(backend.state(), GraphState::Suspended);
    }

    #[test]
    fn test_bounce_places_voices_on_clock() {
        let backend = OfflineBackend::with_tokio_clock(8000);
        backend.schedule(timbres::woodblock(true, 0.5)).unwrap();
        assert_eq!(backend.voice_count(), 1);

        let samples = backend.bounce(1.0);
        assert_eq!(samples.len(), 8000);
        assert!(samples[..4000].iter().all(|&s| s == 0.0));
        assert!(samples[4000..4800].iter().any(|&s| s.abs() > 0.1));
        assert!(samples[4810..].iter().all(|&s| s == 0.0));
    }
}
