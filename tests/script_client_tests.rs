//! Mock HTTP tests for ScriptClient (chat completions with structured output).

use reelgen::config::{Config, SpeakerConfig};
use reelgen::retry::RetryPolicy;
use reelgen::script::ScriptClient;
use reelgen::service::ServiceError;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn speakers() -> Vec<SpeakerConfig> {
    Config::default().speakers
}

fn client(server: &MockServer) -> ScriptClient {
    ScriptClient::new(Some("sk-test".to_string()))
        .unwrap()
        .with_base_url(format!("{}/v1", server.uri()))
        .with_model("gpt-test".to_string())
        .with_retry(RetryPolicy::none())
}

fn chat_reply(content: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"message": {"content": content.to_string()}}]
    }))
}

#[tokio::test]
async fn test_generate_returns_validated_script() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-test",
            "response_format": {"type": "json_schema", "json_schema": {"name": "script"}}
        })))
        .and(body_string_contains("Topic: volcanoes"))
        .respond_with(chat_reply(serde_json::json!({
            "title": "Why Volcanoes Blow",
            "dialogue": [
                {"speaker": "host", "text": "So why do volcanoes erupt?"},
                {"speaker": "Guest", "text": "Pressure. Lots of it."}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let script = client(&mock_server)
        .generate("Topic: volcanoes", &speakers(), None)
        .await
        .unwrap();

    assert_eq!(script.title, "Why Volcanoes Blow");
    assert_eq!(script.dialogue.len(), 2);
    // speaker names are normalized to the configured spelling
    assert_eq!(script.dialogue[0].speaker, "Host");
    assert_eq!(script.word_count(), 9);
}

#[tokio::test]
async fn test_generate_rejects_wrong_opener() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply(serde_json::json!({
            "title": "T",
            "dialogue": [
                {"speaker": "Guest", "text": "I go first."},
                {"speaker": "Host", "text": "Rude."}
            ]
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server)
        .generate("Topic: manners", &speakers(), None)
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_refusal_is_content_policy_violation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": null, "refusal": "I can't help with that."}}]
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server)
        .generate("Topic: something", &speakers(), None)
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::ContentPolicyViolation { message }) if message.contains("can't help")
    ));
}

#[tokio::test]
async fn test_malformed_content_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"content": "not json at all"}}]
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server)
        .generate("Topic: x", &speakers(), None)
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_empty_topic_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = client(&mock_server).generate("  ", &speakers(), None).await;
    assert!(matches!(result, Err(ServiceError::EmptyPrompt)));
}

#[tokio::test]
async fn test_style_reaches_system_prompt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Tone: deadpan."))
        .respond_with(chat_reply(serde_json::json!({
            "title": "T",
            "dialogue": [{"speaker": "Host", "text": "Hi."}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    client(&mock_server)
        .generate("Topic: x", &speakers(), Some("deadpan"))
        .await
        .unwrap();
}

#[test]
fn test_missing_key_names_openai_env() {
    let err = ScriptClient::new(None).err().unwrap();
    assert!(err.to_string().contains("OPENAI_API_KEY"));
}
