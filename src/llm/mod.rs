//! Language model client abstraction.
//!
//! The orchestrator talks to the model through [`LlmClient`]: an ordered
//! message history plus the registry's tool descriptors go in, a
//! [`ModelReply`] comes out. A reply is either direct text or a batch of
//! requested tool invocations; the client marks each reply [`ReplyKind::Final`]
//! or [`ReplyKind::NeedsSynthesis`] so the orchestrator never has to guess
//! from string contents whether the model produced a usable answer.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Role of a conversation turn.
///
/// Tool results are carried as assistant-authored synthetic turns, so there
/// is no dedicated tool role on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn in a conversation. Append-only: never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Schema descriptor advertised to the model for one registered operation.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema for the operation's arguments.
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model: operation name plus the
/// structured arguments exactly as the model produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Whether a reply's text can be shown to the user as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// The model produced user-facing text.
    Final,
    /// The model produced no usable text (tool traffic only); the caller
    /// must synthesize a message if this ends the turn.
    NeedsSynthesis,
}

/// One model response: free text, requested invocations, or both.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub content: String,
    pub invocations: Vec<ToolInvocation>,
    pub kind: ReplyKind,
}

impl ModelReply {
    /// Build a reply, classifying it from its parts. Empty or whitespace-only
    /// content is `NeedsSynthesis`; anything else is `Final`.
    pub fn from_parts(content: impl Into<String>, invocations: Vec<ToolInvocation>) -> Self {
        let content = content.into();
        let kind = if content.trim().is_empty() {
            ReplyKind::NeedsSynthesis
        } else {
            ReplyKind::Final
        };
        Self {
            content,
            invocations,
            kind,
        }
    }

    /// A plain-text final reply with no invocations.
    pub fn text(content: impl Into<String>) -> Self {
        Self::from_parts(content, Vec::new())
    }

    pub fn has_invocations(&self) -> bool {
        !self.invocations.is_empty()
    }
}

/// Stateless request/response interface to a language model backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider label for logs and error messages.
    fn provider_name(&self) -> &str;

    /// Send the full ordered message history plus available tool descriptors;
    /// returns the model's reply or a transport/provider error.
    async fn send(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelReply, LlmError>;
}
