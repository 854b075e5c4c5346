//! Per-session conversation state.
//!
//! A [`Conversation`] owns the ordered message history and the single
//! optional [`PendingTransaction`] slot. Messages are append-only; the only
//! wholesale replacements are history compaction and an explicit clear.

use serde::Serialize;

use crate::llm::{ChatMessage, ToolInvocation};
use crate::tools::ToolCategory;

/// A fund-moving invocation frozen until the user confirms or cancels it.
///
/// `queued` holds the unexecuted remainder of the round that was halted
/// behind this transaction, in model order. Confirming drains the queue
/// through the same confirmation gate; cancelling discards it.
#[derive(Debug, Clone, Serialize)]
pub struct PendingTransaction {
    pub operation: String,
    pub arguments: serde_json::Value,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub queued: Vec<ToolInvocation>,
}

/// Audit entry for one processed invocation: what ran (or was refused) and
/// the display-formatted outcome.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    /// Absent for invocation names the registry does not recognize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ToolCategory>,
    pub result: String,
}

impl ToolCallRecord {
    pub fn new(name: impl Into<String>, category: Option<ToolCategory>, result: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category,
            result: result.into(),
        }
    }

    /// True when the recorded result is a failure rather than an outcome.
    pub fn is_failure(&self) -> bool {
        self.result.starts_with("Error:")
    }
}

/// Ordered message history plus the pending-transaction slot for one session.
pub struct Conversation {
    system_prompt: String,
    messages: Vec<ChatMessage>,
    pending: Option<PendingTransaction>,
}

impl Conversation {
    /// Start a conversation holding only the system instruction.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        let messages = vec![ChatMessage::system(&system_prompt)];
        Self {
            system_prompt,
            messages,
            pending: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Replace the whole history, used by compaction. The caller is
    /// responsible for keeping the system instruction at index 0.
    pub fn replace_messages(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    /// Reset to the single initial system message and drop any pending
    /// transaction; a frozen invocation whose conversational context is gone
    /// must not stay confirmable.
    pub fn clear(&mut self) {
        self.messages = vec![ChatMessage::system(&self.system_prompt)];
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&PendingTransaction> {
        self.pending.as_ref()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn set_pending(&mut self, pending: PendingTransaction) {
        debug_assert!(self.pending.is_none(), "pending slot already occupied");
        self.pending = Some(pending);
    }

    pub fn take_pending(&mut self) -> Option<PendingTransaction> {
        self.pending.take()
    }
}
