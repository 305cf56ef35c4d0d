use thiserror::Error;

use crate::home_assistant::entities::switch;
use crate::home_assistant::topics::Topics;
use crate::smartgen_api::models::action::GensetAction;

/// A decoded switch command, consumed as soon as it is received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub action: GensetAction,
    pub topic: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandDecodeError {
    #[error("no switch is bound to topic {0}")]
    UnknownTopic(String),
    #[error("unsupported payload {payload:?} on {topic}")]
    InvalidPayload { topic: String, payload: String },
    /// Well-formed, but the switch has nothing to do for this payload.
    #[error("switch {key} ignores {payload}")]
    NoAction { key: String, payload: String },
}

pub fn parse_switch_payload(payload: &str) -> Option<bool> {
    match payload.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

impl CommandRequest {
    pub fn decode(topics: &Topics, topic: &str, payload: &[u8]) -> Result<Self, CommandDecodeError> {
        let key = topics
            .command_key(topic)
            .ok_or_else(|| CommandDecodeError::UnknownTopic(topic.to_string()))?;
        let entity = switch(key).ok_or_else(|| CommandDecodeError::UnknownTopic(topic.to_string()))?;

        let payload = String::from_utf8_lossy(payload);
        let on = parse_switch_payload(&payload).ok_or_else(|| CommandDecodeError::InvalidPayload {
            topic: topic.to_string(),
            payload: payload.to_string(),
        })?;

        let action = entity.action_for(on).ok_or_else(|| CommandDecodeError::NoAction {
            key: key.to_string(),
            payload: payload.trim().to_string(),
        })?;

        Ok(Self {
            action,
            topic: topic.to_string(),
        })
    }
}
