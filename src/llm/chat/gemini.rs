use async_trait::async_trait;
use log::{ debug, info, warn };
use reqwest::StatusCode;
use secrecy::{ ExposeSecret, SecretString };
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::ChatClient;
use crate::error::LlmError;
use crate::llm::{ LlmConfig, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL };
use crate::models::chat::{ ChatTurn, Role };

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'static str,
    parts: [GeminiPart<'a>; 1],
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    status: String,
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

fn build_request(turns: &[ChatTurn]) -> GeminiRequest<'_> {
    GeminiRequest {
        contents: turns
            .iter()
            .map(|turn| GeminiContent {
                role: wire_role(turn.role),
                parts: [GeminiPart { text: &turn.content }],
            })
            .collect(),
    }
}

fn first_text(response: GoogleResponse) -> Option<String> {
    response.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
}

/// Classifies a non-success reply. The body text is kept verbatim as the
/// message so downstream callers can pick the nested human-readable part.
fn classify_failure(status: StatusCode, body: String) -> LlmError {
    let upstream_status = serde_json
        ::from_str::<GoogleErrorBody>(&body)
        .map(|b| b.error.status)
        .unwrap_or_default();

    let overloaded =
        status == StatusCode::SERVICE_UNAVAILABLE ||
        status == StatusCode::TOO_MANY_REQUESTS ||
        upstream_status == "UNAVAILABLE" ||
        upstream_status == "RESOURCE_EXHAUSTED";

    let message = if body.trim().is_empty() {
        format!("Model API returned status {}", status.as_u16())
    } else {
        body
    };

    if overloaded {
        LlmError::Overloaded { status: status.as_u16(), message }
    } else {
        LlmError::Api { status: status.as_u16(), message }
    }
}

pub struct GeminiChatClient {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(
        api_key: SecretString,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, LlmError> {
        let model = model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let base_url = base_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

        let http = reqwest::Client
            ::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or_else(|| LlmError::Configuration("Gemini API key is required".to_string()))?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn generate(&self, turns: &[ChatTurn]) -> Result<String, LlmError> {
        let payload = build_request(turns);
        info!(
            "GeminiChatClient::generate() → model={} turns={}",
            self.model,
            payload.contents.len()
        );

        let resp = self.http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&payload)
            .send().await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| LlmError::Transport(e.to_string()))?;

        if !status.is_success() {
            warn!("Gemini returned {} for model {}", status, self.model);
            return Err(classify_failure(status, body));
        }

        debug!("Gemini response body: {} bytes", body.len());
        let parsed: GoogleResponse = serde_json
            ::from_str(&body)
            .map_err(|e| LlmError::Api {
                status: status.as_u16(),
                message: format!("Malformed model response: {}", e),
            })?;

        first_text(parsed).ok_or(LlmError::MissingText)
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}
