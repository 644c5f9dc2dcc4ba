//! Kasa speech - resilient speech I/O for assistive communication
//!
//! This library turns user speech into text and application text into
//! speech under unreliable connectivity:
//! - Dual-path recognition (native continuous engine with a
//!   record-then-upload fallback)
//! - Synthesis with phonetic pre-processing and a bounded, persistent
//!   binary audio cache
//! - A durable operation queue that survives restarts and replays when
//!   connectivity returns
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      UI layer                        │
//! │   start/stop recognition │ speak │ connectivity     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  SpeechSystem                        │
//! │   ASR dispatcher │ TTS dispatcher │ audio cache     │
//! │   operation queue │ connectivity monitor            │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Remote speech service                   │
//! │   transcription │ synthesis │ feedback              │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod asr;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod lang;
pub mod queue;
pub mod remote;
pub mod system;
pub mod tts;

pub use asr::{
    RecognitionDispatcher, RecognitionErrorKind, RecognitionEvent, RecognitionMode,
    RecognitionSession, SessionState,
};
pub use cache::AudioCache;
pub use config::SpeechConfig;
pub use connectivity::{ConnectivityMonitor, Subscription};
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use queue::{OperationExecutor, OperationKind, OperationQueue, QueueEvent, QueuedOperation};
pub use remote::{RemoteSpeechClient, Transcription};
pub use system::{Delivery, PlatformCapabilities, SpeechEvents, SpeechSystem};
pub use tts::{SpeakOptions, SynthesisDispatcher, SynthesisState};

/// Initialize logging for hosts that do not configure their own subscriber.
///
/// `filter` follows the `tracing_subscriber::EnvFilter` syntax, e.g.
/// `"info,kasa_speech=debug"`. Safe to call more than once; only the first
/// call installs a subscriber.
pub fn init_tracing(filter: &str) {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .try_init();
}
