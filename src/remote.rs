//! Remote speech service client
//!
//! Thin HTTP boundary over the transcription, synthesis, and feedback
//! endpoints. Non-success statuses surface as [`Error::RemoteStatus`] so the
//! operation queue can classify them as transient (408/429/5xx) or terminal.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::RemoteConfig;
use crate::queue::{OperationExecutor, OperationKind, QueuedOperation};
use crate::{Error, Result};

/// Result of a remote transcription call
#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    /// Recognized text
    pub text: String,
    /// Recognizer confidence, 0.0-1.0
    #[serde(default)]
    pub confidence: f32,
}

/// Client for the remote speech endpoints
pub struct RemoteSpeechClient {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl RemoteSpeechClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed or the base
    /// URL is empty
    pub fn new(config: RemoteConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(Error::Config(
                "remote speech base URL required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Upload recorded audio for transcription
    ///
    /// # Arguments
    ///
    /// * `audio` - WAV audio bytes
    /// * `language` - language tag for the recognizer
    ///
    /// # Errors
    ///
    /// Returns error if the upload or response parsing fails
    pub async fn transcribe(&self, audio: &[u8], language: &str) -> Result<Transcription> {
        tracing::debug!(audio_bytes = audio.len(), language, "uploading for transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Recognition(e.to_string()))?,
            )
            .text("language", language.to_string());

        let mut request = self
            .client
            .post(format!("{}/v1/speech/transcriptions", self.config.base_url))
            .multipart(form);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "transcription request failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription endpoint error");
            return Err(Error::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }

        let result: Transcription = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            e
        })?;

        tracing::info!(
            transcript = %result.text,
            confidence = result.confidence,
            "transcription complete"
        );
        Ok(result)
    }

    /// Synthesize text to audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the endpoint rejects it
    pub async fn synthesize(
        &self,
        text: &str,
        language: &str,
        rate: f32,
        pitch: f32,
        volume: f32,
    ) -> Result<Vec<u8>> {
        #[derive(Serialize)]
        struct SynthesisBody<'a> {
            text: &'a str,
            language: &'a str,
            rate: f32,
            pitch: f32,
            volume: f32,
        }

        tracing::debug!(language, chars = text.len(), "requesting remote synthesis");

        let mut request = self
            .client
            .post(format!("{}/v1/speech/synthesis", self.config.base_url))
            .json(&SynthesisBody {
                text,
                language,
                rate,
                pitch,
                volume,
            });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "synthesis endpoint error");
            return Err(Error::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }

    /// Deliver a feedback/telemetry payload
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the endpoint rejects it
    pub async fn send_feedback(&self, payload: &serde_json::Value) -> Result<()> {
        let mut request = self
            .client
            .post(format!("{}/v1/feedback", self.config.base_url))
            .json(payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("feedback delivered");
        Ok(())
    }
}

#[async_trait]
impl OperationExecutor for RemoteSpeechClient {
    async fn execute(&self, op: &QueuedOperation) -> Result<serde_json::Value> {
        match op.kind {
            OperationKind::Transcription => {
                let language = op
                    .metadata
                    .get("language")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| {
                        Error::Validation("queued transcription missing language".to_string())
                    })?;

                let transcription = self.transcribe(&op.payload, language).await?;
                Ok(serde_json::json!({
                    "text": transcription.text,
                    "confidence": transcription.confidence,
                }))
            }
            OperationKind::Feedback => {
                let payload: serde_json::Value = serde_json::from_slice(&op.payload)?;
                self.send_feedback(&payload).await?;
                Ok(serde_json::Value::Null)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_base_url() {
        let config = RemoteConfig {
            base_url: String::new(),
            ..RemoteConfig::default()
        };
        assert!(RemoteSpeechClient::new(config).is_err());
    }

    #[test]
    fn transcription_parses_without_confidence() {
        let t: Transcription = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(t.text, "hello");
        assert!(t.confidence.abs() < f32::EPSILON);
    }
}
