//! Configuration management for the click engine
//!
//! This module provides runtime configuration loading from JSON files, so
//! timing constants, startup defaults and output parameters can be adjusted
//! without recompilation. Missing or malformed files fall back to defaults.
//!
//! Tempo and beat-count validation is a caller concern: the engine stores
//! whatever it is given, and the `clamp_*` helpers below implement the
//! clamping policy front ends are expected to apply.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::AudioError;
use crate::synth::Timbre;

/// Slowest tempo a front end should offer
pub const MIN_BPM: u32 = 30;
/// Fastest tempo a front end should offer
pub const MAX_BPM: u32 = 300;
pub const DEFAULT_BPM: u32 = 120;

pub const MIN_BEATS_PER_BAR: u32 = 1;
pub const MAX_BEATS_PER_BAR: u32 = 6;
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// Clamp a requested tempo into `[MIN_BPM, MAX_BPM]`.
pub fn clamp_bpm(bpm: u32) -> u32 {
    bpm.clamp(MIN_BPM, MAX_BPM)
}

/// Clamp a requested beat count into `[MIN_BEATS_PER_BAR, MAX_BEATS_PER_BAR]`.
pub fn clamp_beats_per_bar(beats: u32) -> u32 {
    beats.clamp(MIN_BEATS_PER_BAR, MAX_BEATS_PER_BAR)
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timing: TimingConfig,
    pub defaults: PlaybackDefaults,
    pub audio: AudioConfig,
}

/// Lookahead scheduler timing surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wake-up period of the scheduler tick
    pub lookahead_ms: u64,
    /// How far past "now" notes are committed to the graph
    pub schedule_ahead_secs: f64,
    /// Gap between `start()` and the first note
    pub start_offset_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            lookahead_ms: 25,
            schedule_ahead_secs: 0.1,
            start_offset_secs: 0.1,
        }
    }
}

impl TimingConfig {
    pub fn lookahead(&self) -> Duration {
        Duration::from_millis(self.lookahead_ms)
    }
}

/// Values a freshly constructed engine starts with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackDefaults {
    pub bpm: u32,
    pub beats_per_bar: u32,
    pub timbre: Timbre,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            timbre: Timbre::default(),
        }
    }
}

/// Output graph configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Preferred output sample rate; backends may override with the device rate
    pub sample_rate: u32,
    /// Capacity of the SPSC queue carrying voices to the audio thread
    pub voice_queue_capacity: usize,
    /// Length of the shared drum noise buffer
    pub noise_buffer_secs: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            voice_queue_capacity: 256,
            noise_buffer_secs: 1.0,
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing,
    /// unparseable or fails validation.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                return Self::default();
            }
        };

        let config: EngineConfig = match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                log::warn!(
                    "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                return Self::default();
            }
        };

        match config.validate() {
            Ok(()) => {
                log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                log::warn!(
                    "[Config] Rejected configuration from {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), AudioError> {
        let invalid = |reason: &str| {
            Err(AudioError::InvalidConfig {
                reason: reason.to_string(),
            })
        };

        if self.timing.lookahead_ms == 0 {
            return invalid("timing.lookahead_ms must be positive");
        }
        if !(self.timing.schedule_ahead_secs > 0.0) {
            return invalid("timing.schedule_ahead_secs must be positive");
        }
        if !(self.timing.start_offset_secs >= 0.0) {
            return invalid("timing.start_offset_secs must not be negative");
        }
        if self.defaults.bpm == 0 {
            return invalid("defaults.bpm must be positive");
        }
        if self.defaults.beats_per_bar == 0 {
            return invalid("defaults.beats_per_bar must be positive");
        }
        if self.audio.sample_rate == 0 {
            return invalid("audio.sample_rate must be positive");
        }
        if self.audio.voice_queue_capacity == 0 {
            return invalid("audio.voice_queue_capacity must be positive");
        }
        if !(self.audio.noise_buffer_secs > 0.0) {
            return invalid("audio.noise_buffer_secs must be positive");
        }
        Ok(())
    }
}

/// Time signatures offered to the user. Only the beat count reaches the
/// engine; the denominator is display-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSignature {
    #[serde(rename = "1/4")]
    OneFour,
    #[serde(rename = "2/4")]
    TwoFour,
    #[serde(rename = "3/4")]
    ThreeFour,
    #[serde(rename = "4/4")]
    FourFour,
    #[serde(rename = "5/4")]
    FiveFour,
    #[serde(rename = "6/8")]
    SixEight,
}

impl TimeSignature {
    pub const ALL: [TimeSignature; 6] = [
        TimeSignature::OneFour,
        TimeSignature::TwoFour,
        TimeSignature::ThreeFour,
        TimeSignature::FourFour,
        TimeSignature::FiveFour,
        TimeSignature::SixEight,
    ];

    pub fn beats_per_bar(self) -> u32 {
        match self {
            TimeSignature::OneFour => 1,
            TimeSignature::TwoFour => 2,
            TimeSignature::ThreeFour => 3,
            TimeSignature::FourFour => 4,
            TimeSignature::FiveFour => 5,
            TimeSignature::SixEight => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeSignature::OneFour => "1/4",
            TimeSignature::TwoFour => "2/4",
            TimeSignature::ThreeFour => "3/4",
            TimeSignature::FourFour => "4/4",
            TimeSignature::FiveFour => "5/4",
            TimeSignature::SixEight => "6/8",
        }
    }

    /// Signature whose beat count is `beats`, if one is offered.
    pub fn from_beats(beats: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|sig| sig.beats_per_bar() == beats)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.timing.lookahead_ms, 25);
        assert_eq!(config.timing.schedule_ahead_secs, 0.1);
        assert_eq!(config.timing.start_offset_secs, 0.1);
        assert_eq!(config.defaults.bpm, 120);
        assert_eq!(config.defaults.beats_per_bar, 4);
        assert_eq!(config.defaults.timbre, Timbre::Digital);
        assert_eq!(config.audio.voice_queue_capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let parsed: EngineConfig =
            serde_json::from_str(r#"{"defaults": {"bpm": 90, "timbre": "woodblock"}}"#).unwrap();
        assert_eq!(parsed.defaults.bpm, 90);
        assert_eq!(parsed.defaults.beats_per_bar, 4);
        assert_eq!(parsed.defaults.timbre, Timbre::Woodblock);
        assert_eq!(parsed.timing, TimingConfig::default());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = EngineConfig::load_from_file("/nonexistent/click_engine.json");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let path = std::env::temp_dir().join(format!(
            "click_engine_config_{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{"timing": {"lookahead_ms": 0}}"#).unwrap();
        let config = EngineConfig::load_from_file(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_validate_reports_reason() {
        let mut config = EngineConfig::default();
        config.audio.sample_rate = 0;
        match config.validate() {
            Err(AudioError::InvalidConfig { reason }) => assert!(reason.contains("sample_rate")),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_clamp_helpers() {
        assert_eq!(clamp_bpm(10), MIN_BPM);
        assert_eq!(clamp_bpm(500), MAX_BPM);
        assert_eq!(clamp_bpm(96), 96);
        assert_eq!(clamp_beats_per_bar(0), 1);
        assert_eq!(clamp_beats_per_bar(9), 6);
    }

    #[test]
    fn test_time_signatures() {
        let labels: Vec<&str> = TimeSignature::ALL.iter().map(|s| s.label()).collect();
        assert_eq!(labels, ["1/4", "2/4", "3/4", "4/4", "5/4", "6/8"]);
        assert_eq!(TimeSignature::from_beats(6), Some(TimeSignature::SixEight));
        assert_eq!(TimeSignature::from_beats(7), None);
        assert_eq!(
            serde_json::to_string(&TimeSignature::ThreeFour).unwrap(),
            "\"3/4\""
        );
    }
}
