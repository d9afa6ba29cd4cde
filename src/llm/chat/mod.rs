pub mod gemini;

use async_trait::async_trait;
use std::sync::Arc;
use super::LlmConfig;
use self::gemini::GeminiChatClient;
use crate::error::LlmError;
use crate::models::chat::ChatTurn;

/// The model API: generate a completion from ordered role/content turns.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn generate(&self, turns: &[ChatTurn]) -> Result<String, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = Arc::new(GeminiChatClient::from_config(config)?);
    Ok(client)
}
