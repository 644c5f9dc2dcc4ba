//! Microphone capture for the record-then-upload fallback path

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Exclusive microphone access for one recording session
///
/// The device is acquired on `start` and must be released on `stop` or
/// error; the recognition dispatcher guarantees a superseded session's
/// device is released before a new session acquires it.
pub trait CaptureDevice: Send + Sync {
    /// Acquire the input device and begin accumulating samples
    ///
    /// # Errors
    ///
    /// Returns error if the device is unavailable or permission is denied
    fn start(&self) -> Result<()>;

    /// Release the input device
    fn stop(&self);

    /// Take the samples accumulated since `start`, clearing the buffer
    fn take_samples(&self) -> Vec<f32>;

    /// Capture sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Whether a recording session is active
    fn is_capturing(&self) -> bool;
}

/// Default capture over the platform's input device
///
/// The cpal stream is not `Send`, so a dedicated worker thread owns it for
/// the duration of the session; samples flow out through a shared buffer.
pub struct CpalCapture {
    buffer: Arc<Mutex<Vec<f32>>>,
    active: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CpalCapture {
    /// Create a capture instance; the device is acquired per session
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for CpalCapture {
    fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return Ok(());
        }

        self.buffer.lock().unwrap().clear();
        self.active.store(true, Ordering::SeqCst);

        let buffer = Arc::clone(&self.buffer);
        let active = Arc::clone(&self.active);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let handle = std::thread::spawn(move || {
            let stream = match build_input_stream(&buffer) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            while active.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(25));
            }
            drop(stream);
            tracing::debug!("audio capture stopped");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                *worker = Some(handle);
                tracing::debug!("audio capture started");
                Ok(())
            }
            Ok(Err(e)) => {
                self.active.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                self.active.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(Error::Audio(
                    "capture worker exited before starting".to_string(),
                ))
            }
        }
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    fn take_samples(&self) -> Vec<f32> {
        std::mem::take(&mut *self.buffer.lock().unwrap())
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn is_capturing(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Open the default input device and start streaming into `buffer`
fn build_input_stream(buffer: &Arc<Mutex<Vec<f32>>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let supported_config = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

    let config = supported_config
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        channels = config.channels,
        "audio capture initialized"
    );

    let buffer = Arc::clone(buffer);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = buffer.lock() {
                    buf.extend_from_slice(data);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;
    Ok(stream)
}

/// Convert f32 samples to WAV bytes for the transcription endpoint
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
