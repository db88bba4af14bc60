use serde::{Deserialize, Serialize};

use crate::broker::Message;
use crate::utils::error::BrokerError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "send")]
    Send { messages: Vec<Message> },
    #[serde(rename = "receive")]
    Receive { topics: Vec<String> },
    #[serde(rename = "cancel")]
    Cancel,
    #[serde(rename = "health")]
    Health {
        #[serde(default)]
        service: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "ack")]
    Ack {},
    #[serde(rename = "message")]
    Message { topic: String, content: String },
    #[serde(rename = "status")]
    Status {
        code: StatusCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename = "health_status")]
    HealthStatus { status: ServingStatus },
    #[serde(rename = "error")]
    Error { message: String },
}

impl From<&Message> for ServerMessage {
    fn from(message: &Message) -> Self {
        ServerMessage::Message {
            topic: message.topic.clone(),
            content: message.content.clone(),
        }
    }
}

/// Terminal status of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    InvalidArgument,
    // Kept for parity with sibling services; the broker never returns it.
    ResourceExhausted,
    Unavailable,
    Internal,
}

impl From<&BrokerError> for StatusCode {
    fn from(err: &BrokerError) -> Self {
        if err.is_transient() {
            StatusCode::Unavailable
        } else {
            StatusCode::Internal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingStatus {
    Serving,
    NotServing,
    ServiceUnknown,
}
