use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::TransportError;
use crate::models::chat::{ ChatTurn, RelayRequest };

const CHAT_ROUTE: &str = "api/chat";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// One call to the relay. `Ok(None)` means the relay answered successfully
/// but without any text.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send(&self, turns: &[ChatTurn]) -> Result<Option<String>, TransportError>;
}

#[async_trait]
impl<T: RelayTransport + ?Sized> RelayTransport for Arc<T> {
    async fn send(&self, turns: &[ChatTurn]) -> Result<Option<String>, TransportError> {
        (**self).send(turns).await
    }
}

#[derive(Deserialize, Default)]
struct RelayBody {
    result: Option<String>,
    error: Option<String>,
}

pub struct HttpRelayClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpRelayClient {
    pub fn new(relay_url: &Url) -> Result<Self, TransportError> {
        let endpoint = relay_url
            .join(CHAT_ROUTE)
            .map_err(|e| TransportError::Connection(format!("Invalid relay URL: {}", e)))?;
        let http = reqwest::Client
            ::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl RelayTransport for HttpRelayClient {
    async fn send(&self, turns: &[ChatTurn]) -> Result<Option<String>, TransportError> {
        let request = RelayRequest { messages: turns.to_vec() };
        let resp = self.http
            .post(self.endpoint.clone())
            .json(&request)
            .send().await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = resp.status();
        debug!("Relay answered {} from {}", status, self.endpoint);

        if !status.is_success() {
            let body: RelayBody = resp.json().await.unwrap_or_default();
            let message = body.error
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
            return Err(TransportError::Status { status: status.as_u16(), message });
        }

        let body: RelayBody = resp.json().await.map_err(|e| TransportError::Decode(e.to_string()))?;
        Ok(body.result.filter(|text| !text.is_empty()))
    }
}
