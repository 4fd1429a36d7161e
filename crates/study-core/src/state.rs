//! UI-agnostic chat state types
//!
//! These types are shared between the terminal UI and anything else that
//! drives a conversation with the model. Nothing here is ever written to disk.

use serde::{Deserialize, Serialize};

use crate::ordering::RequestId;

/// A chat message in the study conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// The sender of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl ChatRole {
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "You",
            ChatRole::Assistant => "Assistant",
            ChatRole::System => "System",
        }
    }
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }
}

/// One prompt on its way to the model. Exactly one exists per submitted question.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub id: RequestId,
    pub prompt: String,
}

/// The result of a single model call, already reduced to display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResponse {
    pub id: RequestId,
    pub outcome: Result<String, String>,
}

impl ModelResponse {
    /// Convert the outcome into the chat entry that should be shown for it.
    pub fn into_message(self) -> ChatMessage {
        match self.outcome {
            Ok(text) => ChatMessage::assistant(text),
            Err(error) => ChatMessage::system(format!("Error: {}", error)),
        }
    }
}
