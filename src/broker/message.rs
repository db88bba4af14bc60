//! Message definitions for the broker
//!
//! `Message` is both the publish input and the unit handed to subscriber
//! workers on fan-out. It carries no id and no timestamp: once delivered, or
//! dropped because nobody was subscribed, it is gone.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub topic: String,
    pub content: String,
}

impl Message {
    pub fn new(topic: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            content: content.into(),
        }
    }
}
