//! Subsystem wiring
//!
//! No ambient singletons: every service is constructed explicitly and
//! injected. [`SpeechSystem`] is the single composition point the UI layer
//! owns, with an explicit init/teardown lifecycle.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::asr::{
    CaptureDevice, CpalCapture, NativeRecognitionEngine, RecognitionDispatcher, RecognitionEvent,
};
use crate::cache::AudioCache;
use crate::config::SpeechConfig;
use crate::connectivity::{ConnectivityMonitor, Subscription};
use crate::queue::{OperationExecutor, OperationQueue, QueueEvent};
use crate::remote::RemoteSpeechClient;
use crate::tts::{AudioSink, CpalSink, RemoteSynthesisProvider, SynthesisDispatcher, SynthesisProvider};
use crate::Result;

/// Database file name inside the data directory
const STORE_FILE: &str = "speech.db";

/// Whether a feedback submission went out immediately or was deferred
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Delivered to the endpoint
    Sent,
    /// Persisted to the operation queue; the id identifies the
    /// pending operation
    Queued(String),
}

/// Event receivers handed to the UI layer at init
pub struct SpeechEvents {
    /// Operation queue lifecycle notifications
    pub queue: mpsc::UnboundedReceiver<QueueEvent>,
    /// Recognition session events
    pub recognition: mpsc::UnboundedReceiver<RecognitionEvent>,
}

/// Platform capabilities injected at init
///
/// All fields default to the capabilities of the host audio stack; the
/// native recognition engine and local synthesis engine are absent unless
/// the platform provides them.
#[derive(Default)]
pub struct PlatformCapabilities {
    /// On-device continuous recognizer, if the platform has one
    pub native_engine: Option<Arc<dyn NativeRecognitionEngine>>,
    /// On-device synthesis engine, tried when remote synthesis is
    /// unavailable or the device is offline
    pub local_synthesis: Option<Box<dyn SynthesisProvider>>,
    /// Microphone override (defaults to the cpal input device)
    pub capture: Option<Arc<dyn CaptureDevice>>,
    /// Speaker override (defaults to the cpal output device)
    pub sink: Option<Arc<dyn AudioSink>>,
}

/// Owns every service of the speech subsystem
pub struct SpeechSystem {
    /// Connectivity signal; feed platform transitions into it
    pub monitor: ConnectivityMonitor,
    /// Bounded persistent audio cache
    pub cache: AudioCache,
    /// Durable operation queue
    pub queue: OperationQueue,
    /// Synthesis dispatcher
    pub tts: Arc<SynthesisDispatcher>,
    /// Recognition dispatcher
    pub asr: Arc<RecognitionDispatcher>,
    remote: Arc<RemoteSpeechClient>,
    _drain_on_reconnect: Subscription,
}

impl SpeechSystem {
    /// Construct and wire the subsystem.
    ///
    /// Opens (or creates) the durable store under the configured data
    /// directory, reloading any persisted queue operations and cached
    /// audio from previous runs, and subscribes the queue to connectivity
    /// transitions so it drains on every reconnect.
    ///
    /// # Errors
    ///
    /// Returns error if the data directory or store cannot be opened or
    /// the remote client cannot be constructed
    pub fn init(
        config: &SpeechConfig,
        capabilities: PlatformCapabilities,
        initially_online: bool,
    ) -> Result<(Self, SpeechEvents)> {
        let data_dir = config.resolve_data_dir()?;
        std::fs::create_dir_all(&data_dir)?;
        let pool = crate::db::init(data_dir.join(STORE_FILE))?;

        let monitor = ConnectivityMonitor::new(initially_online);
        let cache = AudioCache::new(pool.clone(), config.cache.clone());
        let (queue, queue_events) = OperationQueue::new(pool, &config.queue);
        let remote = Arc::new(RemoteSpeechClient::new(config.remote.clone())?);

        let mut providers: Vec<Box<dyn SynthesisProvider>> =
            vec![Box::new(RemoteSynthesisProvider::new(Arc::clone(&remote)))];
        let mut capabilities = capabilities;
        if let Some(local) = capabilities.local_synthesis.take() {
            providers.push(local);
        }

        let sink = capabilities
            .sink
            .unwrap_or_else(|| Arc::new(CpalSink::new()));
        let tts = Arc::new(SynthesisDispatcher::new(
            cache.clone(),
            monitor.clone(),
            providers,
            sink,
        ));

        let capture = capabilities
            .capture
            .unwrap_or_else(|| Arc::new(CpalCapture::new()));
        let (asr, recognition_events) = RecognitionDispatcher::new(
            capabilities.native_engine,
            capture,
            Arc::clone(&remote) as Arc<dyn crate::asr::Transcriber>,
            queue.clone(),
            monitor.clone(),
            config.reconnect.clone(),
        );
        let asr = Arc::new(asr);

        // Replay pending work on every offline -> online transition
        let drain_queue = queue.clone();
        let drain_executor: Arc<dyn OperationExecutor> = Arc::clone(&remote) as _;
        let drain_on_reconnect = monitor.subscribe(move |online| {
            if !online {
                return;
            }
            let queue = drain_queue.clone();
            let executor = Arc::clone(&drain_executor);
            drop(tokio::spawn(async move {
                if let Err(e) = queue.drain(executor.as_ref()).await {
                    tracing::error!(error = %e, "queue drain failed after reconnect");
                }
            }));
        });

        let pending = queue.len().unwrap_or(0);
        tracing::info!(
            data_dir = %data_dir.display(),
            pending_operations = pending,
            "speech subsystem initialized"
        );

        Ok((
            Self {
                monitor,
                cache,
                queue,
                tts,
                asr,
                remote,
                _drain_on_reconnect: drain_on_reconnect,
            },
            SpeechEvents {
                queue: queue_events,
                recognition: recognition_events,
            },
        ))
    }

    /// Submit a feedback payload, deferring it when offline.
    ///
    /// Feedback is an important operation: issued while offline it is
    /// persisted to the queue instead of being dropped, and a transient
    /// delivery failure downgrades to the same deferral.
    ///
    /// # Errors
    ///
    /// Returns error for terminal delivery failures or when the queue
    /// cannot persist the payload
    pub async fn submit_feedback(&self, payload: serde_json::Value) -> Result<Delivery> {
        use crate::queue::OperationKind;

        if self.monitor.is_online() {
            match self.remote.send_feedback(&payload).await {
                Ok(()) => return Ok(Delivery::Sent),
                Err(e) if e.is_transient() => {
                    tracing::debug!(error = %e, "feedback delivery failed, deferring");
                }
                Err(e) => return Err(e),
            }
        }

        let id = self.queue.enqueue(
            OperationKind::Feedback,
            serde_json::to_vec(&payload)?,
            serde_json::Value::Null,
            true,
        )?;
        Ok(Delivery::Queued(id))
    }

    /// Manually retry pending operations, bypassing the connectivity signal
    ///
    /// # Errors
    ///
    /// Returns error if queue persistence fails mid-pass
    pub async fn reconnect(&self) -> Result<usize> {
        self.queue.reconnect(self.remote.as_ref()).await
    }

    /// Stop both dispatchers and release audio devices.
    ///
    /// The durable store needs no explicit teardown; pending queue
    /// operations and cached audio are already persisted.
    pub async fn shutdown(&self) {
        self.tts.stop();
        self.asr.abort().await;
        tracing::info!("speech subsystem shut down");
    }
}
