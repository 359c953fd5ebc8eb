//! Backend abstractions for the output graph.
//!
//! The scheduler only ever talks to an [`AudioBackend`]: it reads the audio
//! clock, resumes a suspended graph and hands over one-shot voices. The
//! backend owns everything below that line (device streams, mixing, voice
//! disposal).

use std::sync::Arc;
use std::time::Instant;

use crate::audio::Voice;
use crate::config::AudioConfig;
use crate::error::AudioError;

/// Run state of an output graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Running,
    Suspended,
}

/// Trait implemented by output graphs.
///
/// Implementations must be cheap to call from the scheduler tick: none of
/// these methods may block on the audio thread.
pub trait AudioBackend: Send + Sync {
    /// Monotonic audio clock in seconds.
    fn current_time(&self) -> f64;

    fn state(&self) -> GraphState;

    /// Resume a suspended graph. No-op when already running.
    fn resume(&self) -> Result<(), AudioError>;

    /// Queue a one-shot voice. The graph disposes of it after its stop time.
    fn schedule(&self, voice: Voice) -> Result<(), AudioError>;

    fn sample_rate(&self) -> u32;
}

/// Creates the output graph on first `start()`.
pub type BackendFactory =
    Box<dyn Fn(&AudioConfig) -> Result<Arc<dyn AudioBackend>, AudioError> + Send + Sync>;

/// Trait representing a monotonic time source for clock-driven backends.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Time source following the tokio clock.
///
/// Under a paused runtime this advances together with `tokio::time::sleep`,
/// so scheduler and audio clock stay in lockstep on virtual time.
#[derive(Default)]
pub struct TokioTimeSource {
    _unit: (),
}

impl TimeSource for TokioTimeSource {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

mod cpal;
pub use self::cpal::CpalBackend;

mod offline;
pub use offline::{OfflineBackend, StubTimeSource};
