//! Synthesis capability providers
//!
//! The dispatcher tries providers in ranked order: remote synthesis first,
//! then whatever local/on-device engine the platform layer injects. Each
//! provider answers a uniform availability probe so the chain stays explicit
//! instead of ad hoc capability conditionals.

use async_trait::async_trait;
use std::sync::Arc;

use crate::remote::RemoteSpeechClient;
use crate::Result;

/// One text-to-speech invocation, after normalization and prosody defaults
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Phonetically normalized text sent to the engine
    pub normalized_text: String,
    /// Language tag
    pub language: String,
    /// Speaking rate multiplier
    pub rate: f32,
    /// Pitch multiplier
    pub pitch: f32,
    /// Output volume, 0.0-1.0
    pub volume: f32,
}

/// A ranked synthesis capability
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Whether this provider needs network connectivity
    fn requires_network(&self) -> bool;

    /// Runtime capability probe
    async fn available(&self) -> bool;

    /// Synthesize the request to raw audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}

/// Remote synthesis over the speech service
pub struct RemoteSynthesisProvider {
    client: Arc<RemoteSpeechClient>,
}

impl RemoteSynthesisProvider {
    /// Create a provider over the shared remote client
    #[must_use]
    pub fn new(client: Arc<RemoteSpeechClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SynthesisProvider for RemoteSynthesisProvider {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn requires_network(&self) -> bool {
        true
    }

    async fn available(&self) -> bool {
        true
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        self.client
            .synthesize(
                &request.normalized_text,
                &request.language,
                request.rate,
                request.pitch,
                request.volume,
            )
            .await
    }
}
