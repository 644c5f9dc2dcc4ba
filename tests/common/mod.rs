//! Shared test doubles and helpers
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use kasa_speech::asr::{CaptureDevice, EngineResult, NativeRecognitionEngine, Transcriber};
use kasa_speech::config::{QueueConfig, ReconnectConfig};
use kasa_speech::db;
use kasa_speech::queue::{OperationExecutor, QueuedOperation};
use kasa_speech::remote::Transcription;
use kasa_speech::tts::{AudioSink, SynthesisProvider, SynthesisRequest};
use kasa_speech::{DbPool, Error, Result};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Queue retry config with millisecond backoff so tests run fast
#[must_use]
pub fn fast_queue_config(max_attempts: u32) -> QueueConfig {
    QueueConfig {
        max_attempts,
        base_delay_ms: 1,
        max_delay_ms: 5,
    }
}

/// Reconnect config with millisecond delays so tests run fast
#[must_use]
pub fn fast_reconnect_config(max_attempts: u32) -> ReconnectConfig {
    ReconnectConfig {
        max_attempts,
        base_delay_ms: 1,
    }
}

// -- queue doubles ------------------------------------------------------------

/// Outcome the mock executor should produce for one execution
#[derive(Clone, Copy, Debug)]
pub enum ExecOutcome {
    /// Confirmed success
    Ok,
    /// Transient network failure (retried)
    Transient,
    /// Validation failure (dropped immediately)
    Fatal,
}

/// Records executions and replays scripted outcomes
pub struct MockExecutor {
    /// Payloads in execution order
    pub executed: Mutex<Vec<Vec<u8>>>,
    outcomes: Mutex<VecDeque<ExecOutcome>>,
    default: ExecOutcome,
}

impl MockExecutor {
    #[must_use]
    pub fn succeeding() -> Self {
        Self::with_default(ExecOutcome::Ok)
    }

    #[must_use]
    pub fn with_default(default: ExecOutcome) -> Self {
        Self {
            executed: Mutex::new(Vec::new()),
            outcomes: Mutex::new(VecDeque::new()),
            default,
        }
    }

    /// Queue outcomes consumed before falling back to the default
    pub fn script(&self, outcomes: &[ExecOutcome]) {
        self.outcomes.lock().unwrap().extend(outcomes.iter().copied());
    }

    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }
}

#[async_trait]
impl OperationExecutor for MockExecutor {
    async fn execute(&self, op: &QueuedOperation) -> Result<serde_json::Value> {
        self.executed.lock().unwrap().push(op.payload.clone());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default);

        match outcome {
            ExecOutcome::Ok => Ok(serde_json::Value::Null),
            ExecOutcome::Transient => Err(Error::RemoteStatus {
                status: 503,
                body: "service unavailable".to_string(),
            }),
            ExecOutcome::Fatal => Err(Error::Validation("malformed payload".to_string())),
        }
    }
}

// -- audio doubles ------------------------------------------------------------

/// Records played payloads instead of touching audio hardware
#[derive(Default)]
pub struct MockSink {
    /// Payloads in play order
    pub played: Mutex<Vec<Vec<u8>>>,
    /// Stop invocations
    pub stops: AtomicUsize,
}

impl MockSink {
    #[must_use]
    pub fn play_count(&self) -> usize {
        self.played.lock().unwrap().len()
    }

    #[must_use]
    pub fn last_played(&self) -> Option<Vec<u8>> {
        self.played.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl AudioSink for MockSink {
    async fn play(&self, audio: Vec<u8>, _volume: f32) -> Result<()> {
        self.played.lock().unwrap().push(audio);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// In-memory microphone preloaded with samples
#[derive(Default)]
pub struct MockCapture {
    samples: Mutex<Vec<f32>>,
    active: AtomicBool,
    /// Start invocations
    pub starts: AtomicUsize,
    /// Stop invocations
    pub stops: AtomicUsize,
    /// Simulate a denied/unavailable microphone
    pub fail_start: bool,
}

impl MockCapture {
    #[must_use]
    pub fn with_samples(samples: Vec<f32>) -> Self {
        Self {
            samples: Mutex::new(samples),
            ..Self::default()
        }
    }

    pub fn preload(&self, samples: Vec<f32>) {
        *self.samples.lock().unwrap() = samples;
    }

    /// Capture whose start always fails, as a denied microphone would
    #[must_use]
    pub fn denied() -> Self {
        Self {
            fail_start: true,
            ..Self::default()
        }
    }
}

impl CaptureDevice for MockCapture {
    fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(Error::Audio("microphone denied".to_string()));
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }

    fn take_samples(&self) -> Vec<f32> {
        std::mem::take(&mut *self.samples.lock().unwrap())
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn is_capturing(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

// -- recognition doubles ------------------------------------------------------

/// Scripted transcription endpoint
pub struct MockTranscriber {
    /// (payload length, language) per call
    pub calls: Mutex<Vec<(usize, String)>>,
    text: String,
    confidence: f32,
}

impl MockTranscriber {
    #[must_use]
    pub fn returning(text: &str, confidence: f32) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            text: text.to_string(),
            confidence,
        }
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<Transcription> {
        self.calls
            .lock()
            .unwrap()
            .push((audio.len(), language.to_string()));
        Ok(Transcription {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }
}

/// Native engine double: either always fails transiently at start, or
/// replays one scripted result batch per start call
pub struct ScriptedEngine {
    /// Start invocations
    pub starts: AtomicUsize,
    /// Stop invocations
    pub stops: AtomicUsize,
    script: Mutex<VecDeque<Vec<EngineResult>>>,
    fail_transient: bool,
}

impl ScriptedEngine {
    /// Engine whose every start fails with a network-class error
    #[must_use]
    pub fn always_failing() -> Self {
        Self {
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            fail_transient: true,
        }
    }

    /// Engine that emits the given results on its next starts
    #[must_use]
    pub fn with_script(batches: Vec<Vec<EngineResult>>) -> Self {
        Self {
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            script: Mutex::new(batches.into()),
            fail_transient: false,
        }
    }

    #[must_use]
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NativeRecognitionEngine for ScriptedEngine {
    async fn available(&self) -> bool {
        true
    }

    async fn start(
        &self,
        _language: &str,
        results: mpsc::UnboundedSender<EngineResult>,
    ) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_transient {
            return Err(Error::RemoteStatus {
                status: 503,
                body: "engine unreachable".to_string(),
            });
        }

        let batch = self.script.lock().unwrap().pop_front().unwrap_or_default();
        for result in batch {
            let _ = results.send(result);
        }
        // Sender drops here, ending the session stream
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// -- synthesis doubles --------------------------------------------------------

/// Synthesis provider returning fixed bytes, with call accounting
pub struct StaticProvider {
    name: &'static str,
    network: bool,
    available: bool,
    bytes: Vec<u8>,
    fail: bool,
    /// Synthesize invocations
    pub calls: AtomicUsize,
}

impl StaticProvider {
    #[must_use]
    pub fn remote(bytes: Vec<u8>) -> Self {
        Self {
            name: "mock-remote",
            network: true,
            available: true,
            bytes,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn local(bytes: Vec<u8>) -> Self {
        Self {
            name: "mock-local",
            network: false,
            available: true,
            bytes,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn failing(name: &'static str, network: bool) -> Self {
        Self {
            name,
            network,
            available: true,
            bytes: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn unavailable(name: &'static str, network: bool) -> Self {
        Self {
            name,
            network,
            available: false,
            bytes: Vec::new(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisProvider for StaticProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn requires_network(&self) -> bool {
        self.network
    }

    async fn available(&self) -> bool {
        self.available
    }

    async fn synthesize(&self, _request: &SynthesisRequest) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::RemoteStatus {
                status: 500,
                body: "synthesis backend down".to_string(),
            });
        }
        Ok(self.bytes.clone())
    }
}

/// Local wrapper so a shared `StaticProvider` can be boxed as a provider
/// without an orphan impl on `Arc<StaticProvider>`
pub struct SharedProvider(pub std::sync::Arc<StaticProvider>);

#[async_trait]
impl SynthesisProvider for SharedProvider {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn requires_network(&self) -> bool {
        self.0.requires_network()
    }

    async fn available(&self) -> bool {
        self.0.available().await
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        self.0.synthesize(request).await
    }
}

/// Receive the next event or fail the test after two seconds
pub async fn recv_event<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}
