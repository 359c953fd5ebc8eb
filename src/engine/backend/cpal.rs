//! CPAL-based output graph for desktop platforms (Linux, macOS, Windows)
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated output
//! thread for its whole lifetime. The backend talks to that thread through a
//! command channel and through an `rtrb` ring for voices; the audio callback
//! drains the ring into a [`VoiceMixer`] and renders.
//!
//! Commands are fire-and-forget. A play request that the device rejects is
//! reported by flipping the graph back to [`GraphState::Suspended`], so the
//! next `start()` retries the resume.
//!
//! The audio clock is the mixer's frame counter, so it only advances while
//! the stream is playing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ::cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, Producer};

use crate::audio::{frames_to_seconds, voice_queue, Voice, VoiceMixer};
use crate::config::AudioConfig;
use crate::error::{log_audio_error, AudioError};

use super::{AudioBackend, BackendFactory, GraphState};

/// Upper bound on waiting for the output thread to open the device
const OPEN_TIMEOUT: Duration = Duration::from_secs(2);

enum StreamCommand {
    Play,
    Shutdown,
}

/// Output graph on the default cpal output device.
pub struct CpalBackend {
    sample_rate: u32,
    frame_counter: Arc<AtomicU64>,
    suspended: Arc<AtomicBool>,
    voices: Mutex<Producer<Voice>>,
    commands: Mutex<mpsc::Sender<StreamCommand>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpalBackend {
    /// Open the default output device. The stream starts suspended.
    ///
    /// This is the only call that waits on the output thread, and the wait
    /// is bounded by [`OPEN_TIMEOUT`]. It runs once, on the first `start()`.
    ///
    /// # Errors
    /// `GraphUnavailable` when there is no output device, the stream cannot
    /// be built, or the device does not open in time.
    pub fn open(config: &AudioConfig) -> Result<Self, AudioError> {
        let (producer, consumer) = voice_queue(config.voice_queue_capacity);
        let frame_counter = Arc::new(AtomicU64::new(0));
        let suspended = Arc::new(AtomicBool::new(true));
        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let counter = Arc::clone(&frame_counter);
        let thread_suspended = Arc::clone(&suspended);
        let thread = thread::Builder::new()
            .name("click-output".to_string())
            .spawn(move || {
                run_output_thread(consumer, counter, thread_suspended, command_rx, ready_tx)
            })?;

        let sample_rate = match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(opened) => opened?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // The thread exits on its own once it sees the dropped channels
                return Err(AudioError::GraphUnavailable {
                    reason: format!("output device did not open within {:?}", OPEN_TIMEOUT),
                });
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(AudioError::GraphUnavailable {
                    reason: "output thread exited before opening the stream".to_string(),
                });
            }
        };

        log::info!(
            "[CpalBackend] Output stream open at {} Hz (suspended)",
            sample_rate
        );

        Ok(Self {
            sample_rate,
            frame_counter,
            suspended,
            voices: Mutex::new(producer),
            commands: Mutex::new(command_tx),
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn factory() -> BackendFactory {
        Box::new(|config| Ok(Arc::new(CpalBackend::open(config)?) as Arc<dyn AudioBackend>))
    }

    fn send(&self, command: StreamCommand) -> Result<(), AudioError> {
        let commands = self.commands.lock().map_err(|_| AudioError::LockPoisoned {
            component: "cpal_commands".to_string(),
        })?;
        commands
            .send(command)
            .map_err(|_| AudioError::StreamFailure {
                reason: "output thread is gone".to_string(),
            })
    }
}

impl AudioBackend for CpalBackend {
    fn current_time(&self) -> f64 {
        frames_to_seconds(self.frame_counter.load(Ordering::Relaxed), self.sample_rate)
    }

    fn state(&self) -> GraphState {
        if self.suspended.load(Ordering::SeqCst) {
            GraphState::Suspended
        } else {
            GraphState::Running
        }
    }

    fn resume(&self) -> Result<(), AudioError> {
        if !self.suspended.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(err) = self.send(StreamCommand::Play) {
            self.suspended.store(true, Ordering::SeqCst);
            return Err(AudioError::ResumeFailed {
                reason: err.to_string(),
            });
        }
        Ok(())
    }

    fn schedule(&self, voice: Voice) -> Result<(), AudioError> {
        let mut producer = self.voices.lock().map_err(|_| AudioError::LockPoisoned {
            component: "cpal_voice_queue".to_string(),
        })?;
        producer.push(voice).map_err(|_| AudioError::VoiceQueueFull)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        if let Ok(commands) = self.commands.lock() {
            let _ = commands.send(StreamCommand::Shutdown);
        }
        if let Ok(mut thread) = self.thread.lock() {
            if let Some(handle) = thread.take() {
                let _ = handle.join();
            }
        }
    }
}

fn run_output_thread(
    consumer: Consumer<Voice>,
    frame_counter: Arc<AtomicU64>,
    suspended: Arc<AtomicBool>,
    commands: mpsc::Receiver<StreamCommand>,
    ready: mpsc::Sender<Result<u32, AudioError>>,
) {
    let (stream, sample_rate) = match build_output_stream(consumer, frame_counter) {
        Ok(opened) => opened,
        Err(err) => {
            log_audio_error(&err, "run_output_thread");
            let _ = ready.send(Err(err));
            return;
        }
    };

    // Some hosts start streams on creation; the graph opens suspended
    if let Err(err) = stream.pause() {
        log::warn!("[CpalBackend] Could not pause new stream: {}", err);
    }

    if ready.send(Ok(sample_rate)).is_err() {
        return;
    }

    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Play => settle_play(stream.play(), &suspended),
            StreamCommand::Shutdown => break,
        }
    }

    log::debug!("[CpalBackend] Output thread shutting down");
}

/// Record the outcome of a play request on the graph state.
fn settle_play(result: Result<(), ::cpal::PlayStreamError>, suspended: &AtomicBool) {
    if let Err(e) = result {
        let err = AudioError::StreamFailure {
            reason: format!("Output start failed: {}", e),
        };
        log_audio_error(&err, "settle_play");
        suspended.store(true, Ordering::SeqCst);
    }
}

fn build_output_stream(
    mut consumer: Consumer<Voice>,
    frame_counter: Arc<AtomicU64>,
) -> Result<(::cpal::Stream, u32), AudioError> {
    let host = ::cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::GraphUnavailable {
            reason: "No default output device found".to_string(),
        })?;

    let config = device
        .default_output_config()
        .map_err(|e| AudioError::GraphUnavailable {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    let stream_config: ::cpal::StreamConfig = config.clone().into();
    let channels = stream_config.channels as usize;
    let sample_rate = stream_config.sample_rate.0;
    let mut mixer = VoiceMixer::new(sample_rate, frame_counter);

    let err_fn = |err| log::error!("[CpalBackend] Output stream error: {}", err);

    let stream = match config.sample_format() {
        ::cpal::SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &::cpal::OutputCallbackInfo| {
                mixer.drain(&mut consumer);
                mixer.render(data, channels);
            },
            err_fn,
            None,
        ),
        _ => {
            return Err(AudioError::GraphUnavailable {
                reason: "Only F32 sample format is currently supported for output".to_string(),
            })
        }
    }
    .map_err(|e| AudioError::GraphUnavailable {
        reason: format!("{:?}", e),
    })?;

    Ok((stream, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_play_returns_graph_to_suspended() {
        let suspended = AtomicBool::new(false);
        settle_play(Err(::cpal::PlayStreamError::DeviceNotAvailable), &suspended);
        assert!(suspended.load(Ordering::SeqCst));
    }

    #[test]
    fn test_accepted_play_keeps_graph_running() {
        let suspended = AtomicBool::new(false);
        settle_play(Ok(()), &suspended);
        assert!(!suspended.load(Ordering::SeqCst));
    }
}
