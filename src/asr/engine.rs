//! Recognition capability seams
//!
//! The dispatcher probes the injected native engine at start time and falls
//! back to record-then-upload when it is absent or unavailable. Both seams
//! are async traits so test doubles and platform engines plug in uniformly.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::remote::{RemoteSpeechClient, Transcription};
use crate::Result;

/// A result streamed out of the native recognition engine
#[derive(Debug, Clone)]
pub enum EngineResult {
    /// Interim transcript; more text may follow
    Partial(String),
    /// Final transcript for the session
    Final {
        /// Recognized text
        text: String,
        /// Recognizer confidence, 0.0-1.0
        confidence: f32,
    },
    /// Engine failure
    Error {
        /// Network-class failures trigger bounded reconnection;
        /// everything else is terminal for the session
        transient: bool,
        /// Human-readable message
        message: String,
    },
}

/// On-device continuous recognition capability
///
/// Implemented by the platform layer when the device has a streaming
/// recognizer; absent or unavailable engines route sessions to the
/// record-then-upload fallback.
#[async_trait]
pub trait NativeRecognitionEngine: Send + Sync {
    /// Runtime capability probe
    async fn available(&self) -> bool;

    /// Begin continuous recognition, streaming results into `results`.
    ///
    /// The engine signals the end of a session by dropping the sender.
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot start
    async fn start(
        &self,
        language: &str,
        results: mpsc::UnboundedSender<EngineResult>,
    ) -> Result<()>;

    /// Stop the current recognition session
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails to shut down cleanly
    async fn stop(&self) -> Result<()>;
}

/// Uploads assembled audio for transcription
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe WAV audio
    ///
    /// # Errors
    ///
    /// Returns error if the upload or transcription fails
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<Transcription>;
}

#[async_trait]
impl Transcriber for RemoteSpeechClient {
    async fn transcribe(&self, audio: &[u8], language: &str) -> Result<Transcription> {
        Self::transcribe(self, audio, language).await
    }
}
