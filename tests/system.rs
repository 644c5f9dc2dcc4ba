//! End-to-end wiring tests over a temporary data directory

use kasa_speech::config::{RemoteConfig, SpeechConfig};
use kasa_speech::system::{Delivery, PlatformCapabilities, SpeechSystem};
use kasa_speech::queue::OperationKind;
use kasa_speech::Error;

fn test_config(dir: &std::path::Path) -> SpeechConfig {
    SpeechConfig {
        data_dir: Some(dir.to_path_buf()),
        remote: RemoteConfig {
            // A closed local port, so an accidental network call fails fast
            base_url: "http://127.0.0.1:9".to_string(),
            ..RemoteConfig::default()
        },
        ..SpeechConfig::default()
    }
}

#[tokio::test]
async fn offline_feedback_is_deferred_not_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let (system, _events) = SpeechSystem::init(
        &test_config(dir.path()),
        PlatformCapabilities::default(),
        false,
    )
    .unwrap();

    let delivery = system
        .submit_feedback(serde_json::json!({ "rating": 5, "phrase": "medaase" }))
        .await
        .unwrap();

    let Delivery::Queued(id) = delivery else {
        panic!("expected deferred delivery, got {delivery:?}");
    };

    let pending = system.queue.pending().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
    assert_eq!(pending[0].kind, OperationKind::Feedback);
    assert!(pending[0].important);

    system.shutdown().await;
}

#[tokio::test]
async fn deferred_work_survives_reinitialization() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    {
        let (system, _events) =
            SpeechSystem::init(&config, PlatformCapabilities::default(), false).unwrap();
        system
            .submit_feedback(serde_json::json!({ "rating": 4 }))
            .await
            .unwrap();
        system.shutdown().await;
    }

    // Same data directory, fresh process
    let (system, _events) =
        SpeechSystem::init(&config, PlatformCapabilities::default(), false).unwrap();
    assert_eq!(system.queue.len().unwrap(), 1);
    system.shutdown().await;
}

#[tokio::test]
async fn offline_speak_without_local_engine_errors_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let (system, _events) = SpeechSystem::init(
        &test_config(dir.path()),
        PlatformCapabilities::default(),
        false,
    )
    .unwrap();

    let err = system
        .tts
        .speak(
            "hello",
            &kasa_speech::tts::SpeakOptions {
                language: "en".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Synthesis(_)));
    system.shutdown().await;
}
