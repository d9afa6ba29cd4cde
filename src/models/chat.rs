use serde::{ Deserialize, Serialize };
use serde_json::Value;

use crate::error::RelayError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "model")]
    Assistant,
}

/// One role-tagged message unit of a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Body of `POST /api/chat`. The whole conversation is replayed on every call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub messages: Vec<ChatTurn>,
}

impl RelayRequest {
    /// Validates a raw JSON body. `messages` must be an ordered list of
    /// `{ role, content }` objects; anything else is a validation failure.
    pub fn from_value(body: &Value) -> Result<Self, RelayError> {
        let messages = match body.get("messages") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(RelayError::Validation("Messages should be an array!".to_string()));
            }
        };

        let turns = messages
            .iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json
                    ::from_value::<ChatTurn>(item.clone())
                    .map_err(|e| RelayError::Validation(format!("Invalid message at index {}: {}", index, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { messages: turns })
    }
}

/// Envelope returned by the relay. Exactly one field is present on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelayResponse {
    Success {
        result: String,
    },
    Failure {
        error: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// A bot reply after markdown rendering, owned by the display layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMessage {
    pub sender: Sender,
    pub html: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_array_messages() {
        for body in [
            json!({ "messages": "hello" }),
            json!({ "messages": { "role": "user", "content": "hi" } }),
            json!({ "messages": 42 }),
            json!({ "messages": null }),
            json!({}),
        ] {
            match RelayRequest::from_value(&body) {
                Err(RelayError::Validation(msg)) => assert_eq!(msg, "Messages should be an array!"),
                other => panic!("expected validation error for {}, got {:?}", body, other),
            }
        }
    }

    #[test]
    fn rejects_malformed_turn() {
        let body = json!({ "messages": [{ "role": "user", "content": "ok" }, { "role": "system" }] });
        match RelayRequest::from_value(&body) {
            Err(RelayError::Validation(msg)) => assert!(msg.starts_with("Invalid message at index 1")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn accepts_empty_conversation() {
        let request = RelayRequest::from_value(&json!({ "messages": [] })).unwrap();
        assert!(request.messages.is_empty());
    }

    #[test]
    fn keeps_turn_order() {
        let body = json!({
            "messages": [
                { "role": "user", "content": "one" },
                { "role": "model", "content": "two" },
                { "role": "assistant", "content": "three" }
            ]
        });
        let request = RelayRequest::from_value(&body).unwrap();
        assert_eq!(request.messages, vec![
            ChatTurn::user("one"),
            ChatTurn::assistant("two"),
            ChatTurn::assistant("three")
        ]);
    }

    #[test]
    fn envelopes_serialize_to_single_field() {
        let ok = serde_json::to_value(RelayResponse::Success { result: "hi".into() }).unwrap();
        assert_eq!(ok, json!({ "result": "hi" }));
        let err = serde_json::to_value(RelayResponse::Failure { error: "boom".into() }).unwrap();
        assert_eq!(err, json!({ "error": "boom" }));
    }
}
