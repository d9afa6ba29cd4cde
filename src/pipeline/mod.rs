//! Client side of a chat turn: send the user's message to the relay with
//! bounded retry on overload, then render the reply for display.

pub mod retry;
pub mod surface;
pub mod transport;

use log::{ debug, error };
use serde_json::Value;
use tokio::sync::{ watch, Mutex };

use crate::error::{ PipelineError, TransportError };
use crate::models::chat::{ ChatTurn, RenderedMessage, Sender };
use crate::render::render_markdown;

pub use self::retry::RetryPolicy;
pub use self::surface::{ ChatSurface, TerminalSurface };
pub use self::transport::{ HttpRelayClient, RelayTransport };

pub const THINKING_MESSAGE: &str = "Thinking...";
pub const NO_RESPONSE_MESSAGE: &str = "Sorry, no response received.";
pub const FALLBACK_ERROR_MESSAGE: &str = "Failed to get response from server.";

const TRANSPORT_STATUS_PREFIX: &str = "HTTP error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending {
        attempt: u32,
    },
    RetryWait {
        retries: u32,
    },
    Succeeded,
    Displayed,
    Failed,
}

impl TurnState {
    pub fn is_pending(&self) -> bool {
        matches!(self, TurnState::Sending { .. } | TurnState::RetryWait { .. })
    }
}

/// How a submitted turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank input; nothing was sent.
    Ignored,
    Displayed(RenderedMessage),
    /// The relay succeeded without any text.
    NoResponse,
    Failed {
        message: String,
    },
}

pub fn overload_status_message(retries: u32, max_retries: u32) -> String {
    format!("Model is overloaded. Retrying ({}/{})...", retries, max_retries)
}

/// Picks the text shown to the user for a relay error message.
///
/// Structured JSON payloads yield their `message` (top level or under
/// `error`). Plain text is shown as is unless it is a bare transport status.
pub fn display_error_message(raw: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<Value>(raw) {
        return payload
            .get("message")
            .or_else(|| payload.pointer("/error/message"))
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(FALLBACK_ERROR_MESSAGE)
            .to_string();
    }

    if raw.trim().is_empty() || raw.starts_with(TRANSPORT_STATUS_PREFIX) {
        FALLBACK_ERROR_MESSAGE.to_string()
    } else {
        raw.to_string()
    }
}

fn failure_message(err: &TransportError) -> String {
    match err {
        TransportError::Status { message, .. } => display_error_message(message),
        TransportError::Connection(_) | TransportError::Decode(_) => FALLBACK_ERROR_MESSAGE.to_string(),
    }
}

/// Drives one user turn at a time through the relay and onto a surface.
///
/// Only one turn may be in flight; a second submit while one is pending is
/// rejected with [`PipelineError::Busy`].
pub struct ChatPipeline<T, S> {
    transport: T,
    surface: S,
    policy: RetryPolicy,
    in_flight: Mutex<()>,
    state: watch::Sender<TurnState>,
}

impl<T: RelayTransport, S: ChatSurface> ChatPipeline<T, S> {
    pub fn new(transport: T, surface: S, policy: RetryPolicy) -> Self {
        let (state, _) = watch::channel(TurnState::Idle);
        Self {
            transport,
            surface,
            policy,
            in_flight: Mutex::new(()),
            state,
        }
    }

    pub fn state(&self) -> TurnState {
        *self.state.borrow()
    }

    /// Observes state changes, e.g. to disable input while a turn is pending.
    pub fn subscribe(&self) -> watch::Receiver<TurnState> {
        self.state.subscribe()
    }

    fn transition(&self, next: TurnState) {
        let previous = self.state.send_replace(next);
        debug!("Turn state {:?} -> {:?}", previous, next);
    }

    pub async fn submit(&self, input: &str) -> Result<TurnOutcome, PipelineError> {
        let message = input.trim();
        if message.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        let _guard = self.in_flight.try_lock().map_err(|_| PipelineError::Busy)?;
        self.transition(TurnState::Idle);

        self.surface.append_message(Sender::User, message);
        self.surface.append_message(Sender::Bot, THINKING_MESSAGE);

        let turns = [ChatTurn::user(message)];
        let turns: &[ChatTurn] = &turns;
        let max_retries = self.policy.max_retries;

        let result = self.policy.execute(
            move |attempt| {
                self.transition(TurnState::Sending { attempt });
                self.transport.send(turns)
            },
            TransportError::is_retryable,
            move |retries, _| {
                self.transition(TurnState::RetryWait { retries });
                self.surface.update_bot_text(&overload_status_message(retries, max_retries));
            }
        ).await;

        let outcome = match result {
            Ok(Some(text)) => {
                self.transition(TurnState::Succeeded);
                let rendered = RenderedMessage {
                    sender: Sender::Bot,
                    html: render_markdown(&text),
                };
                self.surface.update_bot_html(&rendered);
                self.transition(TurnState::Displayed);
                TurnOutcome::Displayed(rendered)
            }
            Ok(None) => {
                self.transition(TurnState::Succeeded);
                self.surface.update_bot_text(NO_RESPONSE_MESSAGE);
                self.transition(TurnState::Displayed);
                TurnOutcome::NoResponse
            }
            Err(e) => {
                error!("Chatbot error: {}", e);
                let message = failure_message(&e);
                self.surface.update_bot_text(&message);
                self.transition(TurnState::Failed);
                TurnOutcome::Failed { message }
            }
        };

        Ok(outcome)
    }
}
