//! Ctrl+C handling in the network stages.
//!
//! These tests raise the process-wide interrupt flag, so they live in their
//! own test binary and every test here expects the flag to be set.

use std::time::Duration;

use reelgen::config::{Config, VoiceConfig};
use reelgen::interrupt::{ctrlc_received, request_interrupt};
use reelgen::retry::RetryPolicy;
use reelgen::script::parse_manual_script;
use reelgen::service::ServiceError;
use reelgen::speech::{Narrator, SpeechError, TtsClient};
use reelgen::visuals::VisualClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUBMIT_PATH: &str = "/fal-ai/fast-svd-lcm";

fn visual_client(server: &MockServer) -> VisualClient {
    VisualClient::new(Some("test-api-key".to_string()))
        .unwrap()
        .with_base_url(server.uri())
        .with_retry(RetryPolicy::none())
        .with_poll_interval(Duration::from_millis(10))
        .with_generation_timeout(Duration::from_secs(180))
}

#[tokio::test]
async fn test_generate_stops_polling_on_ctrlc() {
    request_interrupt();
    assert!(ctrlc_received());

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(SUBMIT_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"request_id": "busy"})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/requests/busy/status", SUBMIT_PATH)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "IN_PROGRESS"})),
        )
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = visual_client(&mock_server);
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.generate("city at night", dir.path()),
    )
    .await
    .expect("generate kept polling after Ctrl+C");
    assert!(matches!(result, Err(ServiceError::Interrupted)));
}

#[tokio::test]
async fn test_generate_clips_submits_nothing_after_ctrlc() {
    request_interrupt();

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let result = visual_client(&mock_server)
        .generate_clips("city at night", 20, dir.path())
        .await;
    assert!(matches!(result, Err(ServiceError::Interrupted)));
}

#[tokio::test]
async fn test_narrator_voices_nothing_after_ctrlc() {
    request_interrupt();

    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let voice = VoiceConfig {
        api_key: Some("xi-test".to_string()),
        base_url: mock_server.uri(),
        ..VoiceConfig::default()
    };
    let tts = TtsClient::from_config(&voice)
        .unwrap()
        .with_retry(RetryPolicy::none());
    let narrator = Narrator::new(tts, Config::default().speakers, 200);
    let script = parse_manual_script("Host: Ready?\nGuest: Always.").unwrap();

    let dir = tempfile::tempdir().unwrap();
    let result = narrator.narrate(&script, dir.path()).await;
    assert!(matches!(
        result,
        Err(SpeechError::Service(ServiceError::Interrupted))
    ));
}
