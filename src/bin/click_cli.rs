use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use click_engine::config::{clamp_beats_per_bar, clamp_bpm, EngineConfig, TimeSignature};
use click_engine::engine::{BeatCursor, CpalBackend, MetronomeEngine, OfflineBackend};
use click_engine::synth::{NoteEvent, Timbre};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Longest click voice (the kick), rendered past the end of a bounce
const RENDER_TAIL_SECS: f64 = 0.5;

#[derive(Parser, Debug)]
#[command(
    name = "click_cli",
    about = "Metronome click engine: live playback, offline rendering and timelines"
)]
struct Cli {
    /// JSON engine configuration (defaults are used when missing or invalid)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct PatternArgs {
    /// Tempo in beats per minute, clamped to 30..=300
    #[arg(long)]
    bpm: Option<u32>,
    /// Beats per bar, clamped to 1..=6
    #[arg(long)]
    beats: Option<u32>,
    /// digital, analog, drum or woodblock
    #[arg(long)]
    timbre: Option<Timbre>,
    /// How long to run, in seconds
    #[arg(long, default_value_t = 8.0)]
    seconds: f64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play clicks on the default output device and print each beat
    Play {
        #[command(flatten)]
        pattern: PatternArgs,
    },
    /// Render clicks offline into a WAV file
    Render {
        #[command(flatten)]
        pattern: PatternArgs,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print the note timeline as JSON lines without producing audio
    Schedule {
        #[command(flatten)]
        pattern: PatternArgs,
    },
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let base = cli
        .config
        .as_deref()
        .map(EngineConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Play { pattern } => run_play(apply_pattern(base, &pattern), pattern.seconds),
        Commands::Render { pattern, output } => {
            run_render(apply_pattern(base, &pattern), pattern.seconds, &output)
        }
        Commands::Schedule { pattern } => {
            run_schedule(&apply_pattern(base, &pattern), pattern.seconds)
        }
    }
}

/// Overlay command-line pattern options on the loaded configuration,
/// applying the tempo and bar-length clamps.
fn apply_pattern(mut config: EngineConfig, pattern: &PatternArgs) -> EngineConfig {
    if let Some(bpm) = pattern.bpm {
        config.defaults.bpm = bpm;
    }
    if let Some(beats) = pattern.beats {
        config.defaults.beats_per_bar = beats;
    }
    if let Some(timbre) = pattern.timbre {
        config.defaults.timbre = timbre;
    }

    let bpm = clamp_bpm(config.defaults.bpm);
    if bpm != config.defaults.bpm {
        tracing::warn!(requested = config.defaults.bpm, bpm, "tempo clamped");
        config.defaults.bpm = bpm;
    }
    let beats = clamp_beats_per_bar(config.defaults.beats_per_bar);
    if beats != config.defaults.beats_per_bar {
        tracing::warn!(
            requested = config.defaults.beats_per_bar,
            beats,
            "beats per bar clamped"
        );
        config.defaults.beats_per_bar = beats;
    }
    config
}

fn describe(config: &EngineConfig) -> String {
    let signature = TimeSignature::from_beats(config.defaults.beats_per_bar)
        .map(|sig| sig.label().to_string())
        .unwrap_or_else(|| format!("{} beats", config.defaults.beats_per_bar));
    format!(
        "{} BPM, {}, {}",
        config.defaults.bpm, signature, config.defaults.timbre
    )
}

fn run_play(config: EngineConfig, seconds: f64) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let ring_out = Duration::from_secs_f64(config.timing.schedule_ahead_secs + RENDER_TAIL_SECS);

    println!("Playing {} for {:.1}s", describe(&config), seconds);
    runtime.block_on(async move {
        let engine = MetronomeEngine::with_config(config, CpalBackend::factory(), |beat| {
            if beat == 0 {
                println!("beat {beat} *");
            } else {
                println!("beat {beat}");
            }
        });
        engine.start().context("starting metronome")?;
        tokio::time::sleep(Duration::from_secs_f64(seconds.max(0.0))).await;
        engine.stop();

        // Committed notes still have to sound
        tokio::time::sleep(ring_out).await;
        let snapshot = engine.telemetry().snapshot();
        tracing::info!(
            notes = snapshot.notes_scheduled,
            beats = snapshot.beats_notified,
            "playback finished"
        );
        Ok::<_, anyhow::Error>(ExitCode::from(0))
    })
}

#[derive(Serialize)]
struct RenderReport<'a> {
    output: &'a Path,
    sample_rate: u32,
    seconds: f64,
    frames: usize,
    notes_scheduled: u64,
    peak: f32,
}

fn run_render(config: EngineConfig, seconds: f64, output: &Path) -> Result<ExitCode> {
    let seconds = seconds.max(0.0);
    // Paused clock: the tick and the offline graph run on virtual time
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .context("building paused tokio runtime")?;

    let sample_rate = config.audio.sample_rate;
    let (backend, notes_scheduled) = runtime.block_on(async move {
        let backend = Arc::new(OfflineBackend::with_tokio_clock(sample_rate));
        let engine = MetronomeEngine::with_config(
            config,
            OfflineBackend::shared_factory(&backend),
            |_| {},
        );
        engine.start().context("starting metronome")?;
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
        engine.stop();
        let notes = engine.telemetry().snapshot().notes_scheduled;
        Ok::<_, anyhow::Error>((backend, notes))
    })?;

    let samples = backend.bounce(seconds + RENDER_TAIL_SECS);
    write_wav(output, sample_rate, &samples)?;

    let report = RenderReport {
        output,
        sample_rate,
        seconds,
        frames: samples.len(),
        notes_scheduled,
        peak: samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs())),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn write_wav(path: &Path, sample_rate: u32, samples: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("creating {}", path.display()))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;
    Ok(())
}

#[derive(Serialize)]
struct TimelineEntry {
    #[serde(flatten)]
    note: NoteEvent,
    bar: u64,
}

fn run_schedule(config: &EngineConfig, seconds: f64) -> Result<ExitCode> {
    let bpm = config.defaults.bpm;
    let beats_per_bar = config.defaults.beats_per_bar;
    let mut cursor = BeatCursor::new(config.timing.start_offset_secs);
    let end = config.timing.start_offset_secs + seconds.max(0.0);
    let mut bar = 0_u64;

    while cursor.next_note_time() < end {
        let time = (cursor.next_note_time() * 1e6).round() / 1e6;
        let note = NoteEvent::new(cursor.beat_index(), time, config.defaults.timbre);
        println!("{}", serde_json::to_string(&TimelineEntry { note, bar })?);

        cursor.advance(bpm, beats_per_bar);
        if cursor.beat_index() == 0 {
            bar += 1;
        }
    }
    Ok(ExitCode::from(0))
}
