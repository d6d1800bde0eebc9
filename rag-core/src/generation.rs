//! Generation provider trait for producing the final chat reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions that frame the conversation.
    System,
    /// The end user's turn.
    User,
    /// A previous model turn.
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,
    /// The message text.
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Optional per-request generation settings.
///
/// Unset fields fall back to the provider's own defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Override the provider's model name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A chat-completion backend.
///
/// Implementations should report failures as
/// [`RagError::GenerationProvider`](crate::RagError::GenerationProvider) with
/// a [`ProviderFailureKind`](crate::ProviderFailureKind) so callers can tell
/// quota, authentication, rate-limit and transient failures apart.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Produce a reply for the given conversation.
    async fn complete(&self, messages: &[Message], params: &GenerationParams) -> Result<String>;

    /// A short name used in logs and errors.
    fn name(&self) -> &str {
        "generation"
    }
}
