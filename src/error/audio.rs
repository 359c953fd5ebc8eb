// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes carried by [`AudioError`].
///
/// Error code range: 1001-1008
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// The output graph could not be created
    pub const GRAPH_UNAVAILABLE: i32 = 1001;

    /// A suspended output graph could not be resumed
    pub const RESUME_FAILED: i32 = 1002;

    /// No async runtime is available to drive the scheduler
    pub const RUNTIME_UNAVAILABLE: i32 = 1003;

    /// The voice queue feeding the audio thread is full
    pub const VOICE_QUEUE_FULL: i32 = 1004;

    /// Audio stream failed or its control channel closed
    pub const STREAM_FAILURE: i32 = 1005;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1006;

    /// Drum noise hit rendered before the noise buffer existed
    pub const NOISE_BUFFER_MISSING: i32 = 1007;

    /// Configuration value is unusable
    pub const INVALID_CONFIG: i32 = 1008;
}

/// Log an audio error with structured context
///
/// This function logs audio errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=ClickEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover output graph creation, stream management and the
/// scheduler's hand-off to the audio thread.
///
/// Error code ranges: 1001-1008
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// The output graph could not be created
    GraphUnavailable { reason: String },

    /// A suspended output graph could not be resumed
    ResumeFailed { reason: String },

    /// No tokio runtime is available on the calling thread
    RuntimeUnavailable,

    /// The voice queue feeding the audio thread is full
    VoiceQueueFull,

    /// Stream failed or its control channel closed unexpectedly
    StreamFailure { reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Drum noise hit rendered before the noise buffer existed
    NoiseBufferMissing,

    /// Configuration value is unusable
    InvalidConfig { reason: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::GraphUnavailable { .. } => AudioErrorCodes::GRAPH_UNAVAILABLE,
            AudioError::ResumeFailed { .. } => AudioErrorCodes::RESUME_FAILED,
            AudioError::RuntimeUnavailable => AudioErrorCodes::RUNTIME_UNAVAILABLE,
            AudioError::VoiceQueueFull => AudioErrorCodes::VOICE_QUEUE_FULL,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::NoiseBufferMissing => AudioErrorCodes::NOISE_BUFFER_MISSING,
            AudioError::InvalidConfig { .. } => AudioErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::GraphUnavailable { reason } => {
                format!("Audio output unavailable: {}", reason)
            }
            AudioError::ResumeFailed { reason } => {
                format!("Failed to resume audio output: {}", reason)
            }
            AudioError::RuntimeUnavailable => {
                "No tokio runtime available. Call start() from within a runtime.".to_string()
            }
            AudioError::VoiceQueueFull => {
                "Voice queue full; the audio thread is not draining scheduled notes".to_string()
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::NoiseBufferMissing => {
                "Noise buffer missing; it must be created before the first drum hit".to_string()
            }
            AudioError::InvalidConfig { reason } => {
                format!("Invalid configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::StreamFailure {
            reason: err.to_string(),
        }
    }
}
