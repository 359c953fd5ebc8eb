//! Tone synthesizer - renders one metronome click onto the output graph
//!
//! Synthesis is a pure function of (timbre, accent, time) plus the shared
//! noise buffer. Each call allocates its own voice, hands it to the backend
//! and returns; the backend disposes of the voice once it has finished.
//!
//! | Timbre    | Accent                         | Other beats                     |
//! |-----------|--------------------------------|---------------------------------|
//! | Digital   | 1000 Hz sine, 50 ms decay      | 800 Hz sine                     |
//! | Analog    | triangle 880→440 Hz sweep      | triangle 440→220 Hz sweep       |
//! | Drum      | kick, 150 Hz→~0 over 500 ms    | 8 kHz highpassed noise, 50 ms   |
//! | Woodblock | 1200 Hz sine, 100 ms decay     | 800 Hz sine                     |

pub mod envelope;
pub mod timbres;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio::{NoiseBuffer, Voice};
use crate::engine::backend::AudioBackend;
use crate::error::AudioError;

/// Selectable click sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timbre {
    #[default]
    Digital,
    Analog,
    Drum,
    Woodblock,
}

impl Timbre {
    pub const ALL: [Timbre; 4] = [
        Timbre::Digital,
        Timbre::Analog,
        Timbre::Drum,
        Timbre::Woodblock,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Timbre::Digital => "digital",
            Timbre::Analog => "analog",
            Timbre::Drum => "drum",
            Timbre::Woodblock => "woodblock",
        }
    }
}

impl fmt::Display for Timbre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timbre {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timbre::ALL
            .into_iter()
            .find(|timbre| timbre.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AudioError::InvalidConfig {
                reason: format!("unknown timbre '{}'", s),
            })
    }
}

/// One note handed from the scheduler to the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub beat_index: u32,
    /// Absolute audio-clock time of the onset, in seconds
    pub time: f64,
    pub timbre: Timbre,
    pub accent: bool,
}

impl NoteEvent {
    /// Note for `beat_index`; beat zero of the bar is the accent.
    pub fn new(beat_index: u32, time: f64, timbre: Timbre) -> Self {
        Self {
            beat_index,
            time,
            timbre,
            accent: beat_index == 0,
        }
    }
}

/// Build the voice for `timbre` without scheduling it.
///
/// # Errors
/// `NoiseBufferMissing` for a drum non-accent hit without a noise buffer.
pub fn build_voice(
    timbre: Timbre,
    accent: bool,
    time: f64,
    noise: Option<&Arc<NoiseBuffer>>,
) -> Result<Voice, AudioError> {
    let voice = match timbre {
        Timbre::Digital => timbres::digital(accent, time),
        Timbre::Analog => timbres::analog(accent, time),
        Timbre::Drum if accent => timbres::kick(time),
        Timbre::Drum => {
            let noise = noise.ok_or(AudioError::NoiseBufferMissing)?;
            timbres::hat(time, noise)
        }
        Timbre::Woodblock => timbres::woodblock(accent, time),
    };
    Ok(voice)
}

/// Render `note` onto `graph` at its exact onset time.
pub fn render_note(
    graph: &dyn AudioBackend,
    note: &NoteEvent,
    noise: Option<&Arc<NoiseBuffer>>,
) -> Result<(), AudioError> {
    let voice = build_voice(note.timbre, note.accent, note.time, noise)?;
    graph.schedule(voice)
}
