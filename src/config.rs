//! Configuration for the speech I/O subsystem

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Top-level subsystem configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Directory for durable state (cache and queue database).
    /// Defaults to the platform data directory when unset.
    pub data_dir: Option<PathBuf>,

    /// Audio cache limits
    pub cache: CacheConfig,

    /// Operation queue retry behavior
    pub queue: QueueConfig,

    /// Native recognition engine reconnection behavior
    pub reconnect: ReconnectConfig,

    /// Remote speech endpoints
    pub remote: RemoteConfig,
}

/// Audio cache limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Total payload bytes the cache may hold
    pub max_total_bytes: u64,

    /// Per-entry payload ceiling; larger phrases are synthesized fresh
    pub max_entry_bytes: u64,

    /// Entry time-to-live in seconds; older entries are never served
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_total_bytes: 16 * 1024 * 1024,
            max_entry_bytes: 512 * 1024,
            ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

/// Operation queue retry behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Attempts before an operation is dropped as a permanent failure
    pub max_attempts: u32,

    /// Base delay between retry attempts (doubles each attempt)
    pub base_delay_ms: u64,

    /// Cap on the retry delay
    pub max_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

/// Bounded reconnection for the native recognition engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Automatic reconnection attempts before requiring a manual reconnect
    pub max_attempts: u32,

    /// Delay before the first attempt; grows linearly with each attempt
    pub base_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnection attempt `attempt` (1-based, linear growth)
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Remote speech service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the speech service
    pub base_url: String,

    /// Bearer token for the speech service, if required
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://speech.kasa.app".to_string(),
            api_key: None,
            request_timeout_secs: 30,
        }
    }
}

impl SpeechConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Resolve the directory for durable state
    ///
    /// # Errors
    ///
    /// Returns error if no data directory is configured and the platform
    /// data directory cannot be determined
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }

        ProjectDirs::from("app", "kasa", "kasa-speech")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| Error::Config("no data directory available".to_string()))
    }
}
