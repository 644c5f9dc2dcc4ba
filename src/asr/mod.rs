//! Recognition dispatcher (speech-to-text)
//!
//! Chooses between the injected native continuous engine and the
//! record-then-upload fallback, surfaces interim/final transcripts on an
//! event channel, and applies bounded automatic reconnection when the
//! native engine hits network-class errors. At most one session is active
//! per dispatcher; starting a new one cleanly supersedes the prior session
//! and releases its microphone.

mod capture;
mod engine;

pub use capture::{samples_to_wav, CaptureDevice, CpalCapture, SAMPLE_RATE};
pub use engine::{EngineResult, NativeRecognitionEngine, Transcriber};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::ReconnectConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::lang;
use crate::queue::{OperationKind, OperationQueue};
use crate::{Error, Result};

/// Which recognition path a session runs on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionMode {
    /// On-device continuous recognition
    Native,
    /// Record locally, upload for remote transcription
    FallbackRemote,
}

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session active
    Idle,
    /// Native engine streaming
    Listening,
    /// Fallback path accumulating audio
    Recording,
    /// Fallback path uploading assembled audio
    Uploading,
    /// Session ended with a terminal failure; a manual reconnect is
    /// required to resume the native path
    Error,
}

/// Classifies a reported recognition failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Microphone or audio device failure; not retried automatically
    Device,
    /// Network-class failure
    Network,
    /// Native engine failure
    Engine,
    /// Input rejected before any device or network access
    Validation,
}

/// Events surfaced to the UI layer during a session
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// Interim transcript from the native engine
    Partial {
        /// Transcript so far
        text: String,
    },
    /// Final transcript for the session
    Final {
        /// Recognized text
        text: String,
        /// Recognizer confidence, 0.0-1.0
        confidence: f32,
    },
    /// The recording was enqueued for transcription once connectivity
    /// returns — a status, not an error
    QueuedOffline {
        /// Queue operation id carrying the audio
        operation_id: String,
    },
    /// Automatic reconnection attempts are exhausted; call
    /// [`RecognitionDispatcher::reconnect`] to resume
    ReconnectExhausted,
    /// Terminal failure for the session
    Error {
        /// Failure classification
        kind: RecognitionErrorKind,
        /// Human-readable message
        message: String,
    },
}

/// One listen-and-transcribe attempt
#[derive(Debug, Clone)]
pub struct RecognitionSession {
    /// Session id
    pub id: String,
    /// Language under recognition
    pub language: String,
    /// Path the session runs on
    pub mode: RecognitionMode,
    /// Lifecycle state
    pub state: SessionState,
    /// Transcript accumulated so far
    pub transcript: String,
    /// Confidence of the final transcript, 0.0-1.0
    pub confidence: f32,
    /// Automatic reconnection attempts made
    pub reconnect_attempts: u32,
    generation: u64,
}

impl RecognitionSession {
    fn new(language: &str, mode: RecognitionMode, generation: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            language: language.to_string(),
            mode,
            state: match mode {
                RecognitionMode::Native => SessionState::Listening,
                RecognitionMode::FallbackRemote => SessionState::Recording,
            },
            transcript: String::new(),
            confidence: 0.0,
            reconnect_attempts: 0,
            generation,
        }
    }
}

/// Dual-path speech recognition with bounded reconnection
pub struct RecognitionDispatcher {
    engine: Option<Arc<dyn NativeRecognitionEngine>>,
    capture: Arc<dyn CaptureDevice>,
    transcriber: Arc<dyn Transcriber>,
    queue: OperationQueue,
    monitor: ConnectivityMonitor,
    config: ReconnectConfig,
    events: mpsc::UnboundedSender<RecognitionEvent>,
    session: Arc<Mutex<Option<RecognitionSession>>>,
    generation: Arc<AtomicU64>,
    last_language: Mutex<Option<String>>,
}

impl RecognitionDispatcher {
    /// Create a dispatcher.
    ///
    /// `engine` is the optional on-device continuous recognizer; without it
    /// every session runs the record-then-upload fallback. Returns the
    /// dispatcher and the receiving end of its event channel.
    #[must_use]
    pub fn new(
        engine: Option<Arc<dyn NativeRecognitionEngine>>,
        capture: Arc<dyn CaptureDevice>,
        transcriber: Arc<dyn Transcriber>,
        queue: OperationQueue,
        monitor: ConnectivityMonitor,
        config: ReconnectConfig,
    ) -> (Self, mpsc::UnboundedReceiver<RecognitionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                engine,
                capture,
                transcriber,
                queue,
                monitor,
                config,
                events,
                session: Arc::new(Mutex::new(None)),
                generation: Arc::new(AtomicU64::new(0)),
                last_language: Mutex::new(None),
            },
            receiver,
        )
    }

    /// Current session state, `Idle` when no session is active
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session
            .lock()
            .unwrap()
            .as_ref()
            .map_or(SessionState::Idle, |s| s.state)
    }

    /// Snapshot of the active session, if any
    #[must_use]
    pub fn session(&self) -> Option<RecognitionSession> {
        self.session.lock().unwrap().clone()
    }

    /// Start a listen-and-transcribe session.
    ///
    /// An already-active session is first cleanly stopped, releasing its
    /// microphone, before the new one starts. Returns the new session id.
    ///
    /// # Errors
    ///
    /// Returns validation errors for unsupported languages and device
    /// errors when the fallback path cannot acquire the microphone
    pub async fn start(&self, language: &str) -> Result<String> {
        if !lang::is_supported(language) {
            return Err(Error::Validation(format!(
                "unsupported language: {language}"
            )));
        }

        // Supersede any active session before acquiring devices
        self.stop().await?;
        *self.last_language.lock().unwrap() = Some(language.to_string());

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let use_native = match &self.engine {
            Some(engine) => engine.available().await,
            None => false,
        };

        if use_native {
            let session =
                RecognitionSession::new(language, RecognitionMode::Native, generation);
            let id = session.id.clone();
            *self.session.lock().unwrap() = Some(session);

            tracing::info!(id = %id, language, "native recognition session started");
            self.spawn_native_supervisor(language.to_string(), generation);
            Ok(id)
        } else {
            if let Err(e) = self.capture.start() {
                let _ = self.events.send(RecognitionEvent::Error {
                    kind: RecognitionErrorKind::Device,
                    message: e.to_string(),
                });
                return Err(e);
            }

            let session =
                RecognitionSession::new(language, RecognitionMode::FallbackRemote, generation);
            let id = session.id.clone();
            *self.session.lock().unwrap() = Some(session);

            tracing::info!(id = %id, language, "fallback recognition session started");
            Ok(id)
        }
    }

    /// Stop the active session.
    ///
    /// A no-op when no session is active. On the fallback path this
    /// assembles the recording and either uploads it (online) or enqueues
    /// it for later transcription (offline), surfacing a queued-for-later
    /// status rather than an error.
    ///
    /// # Errors
    ///
    /// Returns error if the native engine fails to shut down or the
    /// recording cannot be encoded
    pub async fn stop(&self) -> Result<()> {
        let (mode, language) = {
            let mut guard = self.session.lock().unwrap();
            let Some(session) = guard.as_mut() else {
                return Ok(());
            };
            let mode = session.mode;
            let language = session.language.clone();
            if mode == RecognitionMode::FallbackRemote {
                session.state = SessionState::Uploading;
            }
            (mode, language)
        };

        // Invalidate any pending reconnect timers for the old session
        self.generation.fetch_add(1, Ordering::SeqCst);

        let result = match mode {
            RecognitionMode::Native => {
                if let Some(engine) = &self.engine {
                    engine.stop().await
                } else {
                    Ok(())
                }
            }
            RecognitionMode::FallbackRemote => self.finish_fallback(&language).await,
        };

        *self.session.lock().unwrap() = None;
        tracing::debug!("recognition session stopped");
        result
    }

    /// Manual reconnect after automatic attempts are exhausted.
    ///
    /// Resets the reconnection budget and starts a fresh session on the
    /// last-used language.
    ///
    /// # Errors
    ///
    /// Returns error if no prior session exists to resume or the new
    /// session cannot start
    pub async fn reconnect(&self) -> Result<String> {
        let language = self
            .last_language
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Validation("no prior session to reconnect".to_string()))?;

        tracing::info!(language = %language, "manual reconnect requested");
        self.start(&language).await
    }

    /// Release the microphone and stop any recording without transcribing.
    ///
    /// Used at teardown: unlike [`stop`](Self::stop) this discards
    /// accumulated audio.
    pub async fn abort(&self) {
        let had_session = self.session.lock().unwrap().take().is_some();
        self.generation.fetch_add(1, Ordering::SeqCst);

        if had_session {
            if let Some(engine) = &self.engine {
                let _ = engine.stop().await;
            }
        }
        self.capture.stop();
        let _ = self.capture.take_samples();
    }

    /// Assemble the fallback recording and route it by connectivity
    async fn finish_fallback(&self, language: &str) -> Result<()> {
        self.capture.stop();
        let samples = self.capture.take_samples();

        if samples.is_empty() {
            let _ = self.events.send(RecognitionEvent::Error {
                kind: RecognitionErrorKind::Device,
                message: "no audio captured".to_string(),
            });
            return Ok(());
        }

        let wav = samples_to_wav(&samples, self.capture.sample_rate())?;
        tracing::debug!(bytes = wav.len(), language, "recording assembled");

        if self.monitor.is_online() {
            match self.transcriber.transcribe(&wav, language).await {
                Ok(transcription) => {
                    let _ = self.events.send(RecognitionEvent::Final {
                        text: transcription.text,
                        confidence: transcription.confidence,
                    });
                    Ok(())
                }
                Err(e) if e.is_transient() => {
                    // Connectivity dropped mid-upload: defer instead of fail
                    self.enqueue_recording(wav, language)
                }
                Err(e) => {
                    let _ = self.events.send(RecognitionEvent::Error {
                        kind: RecognitionErrorKind::Network,
                        message: e.to_string(),
                    });
                    Err(e)
                }
            }
        } else {
            self.enqueue_recording(wav, language)
        }
    }

    fn enqueue_recording(&self, wav: Vec<u8>, language: &str) -> Result<()> {
        let operation_id = self.queue.enqueue(
            OperationKind::Transcription,
            wav,
            serde_json::json!({ "language": language }),
            false,
        )?;

        tracing::info!(operation_id = %operation_id, "recording queued for transcription");
        let _ = self
            .events
            .send(RecognitionEvent::QueuedOffline { operation_id });
        Ok(())
    }

    /// Drive the native engine, restarting on transient errors with
    /// linearly growing delays up to the configured ceiling.
    fn spawn_native_supervisor(&self, language: String, generation: u64) {
        let Some(engine) = self.engine.clone() else {
            return;
        };
        let events = self.events.clone();
        let session = Arc::clone(&self.session);
        let generations = Arc::clone(&self.generation);
        let config = self.config.clone();

        drop(tokio::spawn(async move {
            let mut attempts: u32 = 0;

            loop {
                let (tx, mut rx) = mpsc::unbounded_channel();

                let failure = match engine.start(&language, tx).await {
                    Ok(()) => {
                        consume_engine_results(&mut rx, &events, &session, &generations, generation)
                            .await
                    }
                    Err(e) if e.is_transient() => Some(e.to_string()),
                    Err(e) => {
                        let _ = events.send(RecognitionEvent::Error {
                            kind: RecognitionErrorKind::Engine,
                            message: e.to_string(),
                        });
                        mark_error(&session, generation);
                        return;
                    }
                };

                let Some(message) = failure else {
                    // Clean finish or superseded session
                    return;
                };

                if generations.load(Ordering::SeqCst) != generation {
                    return;
                }

                if attempts >= config.max_attempts {
                    tracing::warn!(
                        attempts,
                        "reconnection ceiling reached, manual reconnect required"
                    );
                    let _ = events.send(RecognitionEvent::ReconnectExhausted);
                    mark_error(&session, generation);
                    return;
                }

                attempts += 1;
                {
                    let mut guard = session.lock().unwrap();
                    if let Some(s) = guard.as_mut() {
                        if s.generation == generation {
                            s.reconnect_attempts = attempts;
                        }
                    }
                }

                let delay = config.delay_for_attempt(attempts);
                tracing::warn!(
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %message,
                    "native engine failed, reconnecting"
                );
                tokio::time::sleep(delay).await;

                // The session may have been superseded while we slept
                if generations.load(Ordering::SeqCst) != generation {
                    return;
                }
            }
        }));
    }
}

/// Forward engine results to the event channel until the session ends.
///
/// Returns `Some(message)` when the engine reported a transient failure
/// that should trigger reconnection, `None` on a clean finish.
async fn consume_engine_results(
    rx: &mut mpsc::UnboundedReceiver<EngineResult>,
    events: &mpsc::UnboundedSender<RecognitionEvent>,
    session: &Arc<Mutex<Option<RecognitionSession>>>,
    generations: &Arc<AtomicU64>,
    generation: u64,
) -> Option<String> {
    while let Some(result) = rx.recv().await {
        if generations.load(Ordering::SeqCst) != generation {
            return None;
        }

        match result {
            EngineResult::Partial(text) => {
                {
                    let mut guard = session.lock().unwrap();
                    if let Some(s) = guard.as_mut() {
                        if s.generation == generation {
                            s.transcript = text.clone();
                        }
                    }
                }
                let _ = events.send(RecognitionEvent::Partial { text });
            }
            EngineResult::Final { text, confidence } => {
                {
                    let mut guard = session.lock().unwrap();
                    if guard.as_ref().is_some_and(|s| s.generation == generation) {
                        *guard = None;
                    }
                }
                let _ = events.send(RecognitionEvent::Final { text, confidence });
                return None;
            }
            EngineResult::Error { transient, message } => {
                if transient {
                    return Some(message);
                }
                let _ = events.send(RecognitionEvent::Error {
                    kind: RecognitionErrorKind::Engine,
                    message,
                });
                mark_error(session, generation);
                return None;
            }
        }
    }

    // Sender dropped without a final result: engine was stopped
    None
}

fn mark_error(session: &Arc<Mutex<Option<RecognitionSession>>>, generation: u64) {
    let mut guard = session.lock().unwrap();
    if let Some(s) = guard.as_mut() {
        if s.generation == generation {
            s.state = SessionState::Error;
        }
    }
}
