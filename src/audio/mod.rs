// Audio module - voice rendering primitives shared by every output backend

pub mod filter;
pub mod mixer;
pub mod noise;
pub mod param;
pub mod voice;

// Re-export commonly used types for convenience
pub use filter::{Biquad, HighpassSpec};
pub use mixer::{frames_to_seconds, voice_queue, VoiceMixer};
pub use noise::NoiseBuffer;
pub use param::{ParamEvent, ParamTimeline};
pub use voice::{ActiveVoice, Voice, VoiceSource, Waveform};
