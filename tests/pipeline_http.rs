//! Retry-and-render pipeline against a relay over real HTTP.

use chat_relay::llm::chat::new_client;
use chat_relay::llm::LlmConfig;
use chat_relay::models::chat::{ RenderedMessage, Sender };
use chat_relay::pipeline::{
    ChatPipeline,
    ChatSurface,
    HttpRelayClient,
    RetryPolicy,
    TurnOutcome,
    FALLBACK_ERROR_MESSAGE,
};
use chat_relay::relay::Relay;
use chat_relay::server::api::{ router, ApiOptions };
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use std::sync::{ Arc, Mutex };
use std::time::Duration;
use url::Url;
use wiremock::matchers::{ body_json, method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

#[derive(Default)]
struct StatusLog {
    texts: Mutex<Vec<String>>,
}

impl StatusLog {
    fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

impl ChatSurface for StatusLog {
    fn append_message(&self, _sender: Sender, _text: &str) {}

    fn update_bot_text(&self, text: &str) {
        self.texts.lock().unwrap().push(text.to_string());
    }

    fn update_bot_html(&self, message: &RenderedMessage) {
        self.texts.lock().unwrap().push(message.html.clone());
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(10))
}

fn pipeline_for(relay_url: &str, surface: Arc<StatusLog>) -> ChatPipeline<HttpRelayClient, Arc<StatusLog>> {
    let transport = HttpRelayClient::new(&Url::parse(relay_url).unwrap()).unwrap();
    ChatPipeline::new(transport, surface, fast_retry())
}

#[tokio::test]
async fn test_retries_overload_then_renders() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_json(json!({ "messages": [{ "role": "user", "content": "hello" }] })))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "error": "model overloaded" })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&relay).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": "# Title\n\nBody text" }))
        )
        .expect(1)
        .mount(&relay).await;

    let surface = Arc::new(StatusLog::default());
    let pipeline = pipeline_for(&relay.uri(), surface.clone());

    let outcome = pipeline.submit("hello").await.unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Displayed(RenderedMessage {
            sender: Sender::Bot,
            html: "<h1>Title</h1><p>Body text</p>".to_string(),
        })
    );
    assert_eq!(surface.texts(), vec![
        "Model is overloaded. Retrying (1/2)...".to_string(),
        "Model is overloaded. Retrying (2/2)...".to_string(),
        "<h1>Title</h1><p>Body text</p>".to_string()
    ]);
}

#[tokio::test]
async fn test_gives_up_after_three_overloads() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "error": "model overloaded" })))
        .expect(3)
        .mount(&relay).await;

    let pipeline = pipeline_for(&relay.uri(), Arc::new(StatusLog::default()));

    let outcome = pipeline.submit("hello").await.unwrap();

    assert_eq!(outcome, TurnOutcome::Failed { message: "model overloaded".to_string() });
}

#[tokio::test]
async fn test_server_error_without_body_shows_fallback() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&relay).await;

    let pipeline = pipeline_for(&relay.uri(), Arc::new(StatusLog::default()));

    let outcome = pipeline.submit("hello").await.unwrap();

    assert_eq!(outcome, TurnOutcome::Failed { message: FALLBACK_ERROR_MESSAGE.to_string() });
}

#[tokio::test]
async fn test_unreachable_relay_is_not_retried() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let surface = Arc::new(StatusLog::default());
    let pipeline = pipeline_for(&format!("http://{}", addr), surface.clone());

    let outcome = pipeline.submit("hello").await.unwrap();

    assert_eq!(outcome, TurnOutcome::Failed { message: FALLBACK_ERROR_MESSAGE.to_string() });
    assert_eq!(surface.texts(), vec![FALLBACK_ERROR_MESSAGE.to_string()]);
}

/// Widget -> relay -> mocked Gemini, with the relay served on a real socket.
#[tokio::test]
async fn test_end_to_end_through_relay() {
    let gemini = MockServer::start().await;
    let overloaded =
        json!({
        "error": { "code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE" }
    });
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(503).set_body_json(overloaded))
        .up_to_n_times(1)
        .mount(&gemini).await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.5-flash:generateContent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(
                json!({
                "candidates": [{ "content": { "parts": [{ "text": "* one\n* two" }] } }]
            })
            )
        )
        .mount(&gemini).await;

    let config = LlmConfig {
        api_key: Some(SecretString::new("test-key".to_string())),
        completion_model: None,
        base_url: Some(gemini.uri()),
    };
    let app = router(Relay::new(new_client(&config).unwrap()), &ApiOptions::default()).unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let surface = Arc::new(StatusLog::default());
    let pipeline = pipeline_for(&format!("http://{}", addr), surface.clone());

    let outcome = pipeline.submit("list two things").await.unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Displayed(RenderedMessage {
            sender: Sender::Bot,
            html: "<ul><li>one</li><li>two</li></ul>".to_string(),
        })
    );
    assert_eq!(surface.texts()[0], "Model is overloaded. Retrying (1/2)...");
}
