//! Synthesis dispatcher (text-to-speech)
//!
//! Turns application text into played audio: phonetic normalization, audio
//! cache consultation, ranked synthesis providers (remote first, then the
//! injected local engine), playback. At most one stream plays at a time.

mod playback;
mod provider;

pub use playback::{AudioSink, CpalSink};
pub use provider::{RemoteSynthesisProvider, SynthesisProvider, SynthesisRequest};

use std::sync::{Arc, Mutex};

use crate::cache::AudioCache;
use crate::connectivity::ConnectivityMonitor;
use crate::lang;
use crate::{Error, Result};

/// Where the dispatcher is in the speak pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisState {
    /// Nothing in flight
    Idle,
    /// Validating and normalizing the request
    Preparing,
    /// Waiting on a synthesis provider
    Fetching,
    /// Streaming audio to the output device
    Playing,
    /// The last request failed
    Error,
}

/// Per-request voice parameters; unset fields fall back to the
/// language profile defaults
#[derive(Debug, Clone, Default)]
pub struct SpeakOptions {
    /// Language tag
    pub language: String,
    /// Speaking rate multiplier
    pub rate: Option<f32>,
    /// Pitch multiplier
    pub pitch: Option<f32>,
    /// Output volume, 0.0-1.0
    pub volume: Option<f32>,
}

/// Turns text into played audio with caching and provider fallback
pub struct SynthesisDispatcher {
    cache: AudioCache,
    monitor: ConnectivityMonitor,
    providers: Vec<Box<dyn SynthesisProvider>>,
    sink: Arc<dyn AudioSink>,
    state: Mutex<SynthesisState>,
}

impl SynthesisDispatcher {
    /// Create a dispatcher with an explicit provider ranking.
    ///
    /// Providers are tried in the order given; put the remote provider
    /// first and any local/on-device engine after it.
    #[must_use]
    pub fn new(
        cache: AudioCache,
        monitor: ConnectivityMonitor,
        providers: Vec<Box<dyn SynthesisProvider>>,
        sink: Arc<dyn AudioSink>,
    ) -> Self {
        Self {
            cache,
            monitor,
            providers,
            sink,
            state: Mutex::new(SynthesisState::Idle),
        }
    }

    /// Current pipeline state
    #[must_use]
    pub fn state(&self) -> SynthesisState {
        *self.state.lock().unwrap()
    }

    /// Synthesize and play a phrase, suspending until playback completes.
    ///
    /// The cache key is the original (pre-normalization) text plus language,
    /// so repeated phrases hit regardless of rule changes. On a miss the
    /// ranked provider chain runs; audio fetched from the network is stored
    /// back into the cache best-effort. A request issued while another
    /// phrase is playing stops the prior stream first.
    ///
    /// # Errors
    ///
    /// Returns validation errors before any device or network access,
    /// synthesis errors when every usable provider fails, and audio errors
    /// when playback itself fails
    pub async fn speak(&self, text: &str, options: &SpeakOptions) -> Result<()> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("nothing to speak: empty text".to_string()));
        }
        let Some(profile) = lang::profile(&options.language) else {
            return Err(Error::Validation(format!(
                "unsupported language: {}",
                options.language
            )));
        };

        // Exclusive output: cut short whatever was playing
        self.sink.stop();
        self.set_state(SynthesisState::Preparing);

        let request = SynthesisRequest {
            normalized_text: lang::normalize(trimmed, &options.language),
            language: options.language.clone(),
            rate: options.rate.unwrap_or(profile.default_rate),
            pitch: options.pitch.unwrap_or(profile.default_pitch),
            volume: options.volume.unwrap_or(1.0),
        };

        // Cache reads are best-effort: a storage failure degrades to a miss
        let cached = match self.cache.get(trimmed, &options.language) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed, fetching fresh");
                None
            }
        };

        if let Some(audio) = cached {
            return self.play(audio, request.volume).await;
        }

        self.set_state(SynthesisState::Fetching);
        let online = self.monitor.is_online();

        for provider in &self.providers {
            if provider.requires_network() && !online {
                tracing::debug!(provider = provider.name(), "skipped while offline");
                continue;
            }
            if !provider.available().await {
                tracing::debug!(provider = provider.name(), "not available");
                continue;
            }

            match provider.synthesize(&request).await {
                Ok(audio) => {
                    if provider.requires_network() {
                        // Best-effort: a failed write degrades to fetch-fresh
                        if let Err(e) = self.cache.put(trimmed, &options.language, &audio) {
                            tracing::warn!(error = %e, "cache write failed");
                        }
                    }
                    return self.play(audio, request.volume).await;
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "synthesis provider failed, trying next"
                    );
                }
            }
        }

        self.set_state(SynthesisState::Error);
        Err(Error::Synthesis(if online {
            "all synthesis providers failed".to_string()
        } else {
            "offline and no local synthesis engine available".to_string()
        }))
    }

    /// Stop the current stream. Idempotent; a no-op when nothing is playing.
    pub fn stop(&self) {
        self.sink.stop();
        self.set_state(SynthesisState::Idle);
    }

    async fn play(&self, audio: Vec<u8>, volume: f32) -> Result<()> {
        self.set_state(SynthesisState::Playing);
        match self.sink.play(audio, volume).await {
            Ok(()) => {
                self.set_state(SynthesisState::Idle);
                Ok(())
            }
            Err(e) => {
                self.set_state(SynthesisState::Error);
                Err(e)
            }
        }
    }

    fn set_state(&self, state: SynthesisState) {
        *self.state.lock().unwrap() = state;
    }
}
