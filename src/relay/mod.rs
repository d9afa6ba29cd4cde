use log::{ error, info, warn };
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ LlmError, RelayError };
use crate::llm::chat::ChatClient;
use crate::models::chat::RelayRequest;

/// Stateless forwarder between the chat widget and the model API.
#[derive(Clone)]
pub struct Relay {
    chat_client: Arc<dyn ChatClient>,
}

impl Relay {
    pub fn new(chat_client: Arc<dyn ChatClient>) -> Self {
        Self { chat_client }
    }

    /// Validates `body`, replays its turns to the model and returns the reply
    /// text. A reply without text degrades to an empty result.
    pub async fn forward(&self, body: &Value) -> Result<String, RelayError> {
        let request_id = Uuid::new_v4();

        let request = match RelayRequest::from_value(body) {
            Ok(r) => r,
            Err(e) => {
                warn!("[{}] Rejected chat request: {}", request_id, e);
                return Err(e);
            }
        };

        info!(
            "[{}] Forwarding {} turn(s) to model {}",
            request_id,
            request.messages.len(),
            self.chat_client.get_model()
        );

        match self.chat_client.generate(&request.messages).await {
            Ok(text) => {
                info!("[{}] Model replied with {} chars", request_id, text.len());
                Ok(text)
            }
            Err(LlmError::MissingText) => {
                warn!("[{}] Model reply had no text part", request_id);
                Ok(String::new())
            }
            Err(e @ LlmError::Overloaded { .. }) => {
                warn!("[{}] Model overloaded: {}", request_id, e);
                Err(e.into())
            }
            Err(e) => {
                error!("[{}] Model call failed: {}", request_id, e);
                Err(e.into())
            }
        }
    }
}
