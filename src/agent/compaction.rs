//! Conversation history compaction.
//!
//! Once a session's history grows past the trigger length, the middle of the
//! conversation is condensed into one synthetic system message so context
//! stays bounded. The original system instruction always survives at index 0
//! and the most recent messages survive verbatim. A failed summarization
//! degrades to plain truncation; compaction never fails a chat turn.

use std::sync::Arc;

use crate::error::LlmError;
use crate::llm::{ChatMessage, ChatRole, LlmClient};

/// Smallest middle section worth summarizing.
const MIN_MIDDLE_LEN: usize = 4;
/// Hard cap on summary length, in lines.
const SUMMARY_LINE_CAP: usize = 8;

const SUMMARY_INSTRUCTION: &str = "You condense wallet-assistant conversations. \
Write a short plain-prose summary, no bullet points, at most 8 lines. Capture \
the user's goals, actions already completed, any transaction awaiting \
confirmation, stated preferences, and whatever context is needed to continue \
the conversation.";

pub struct HistoryCompactor {
    llm: Arc<dyn LlmClient>,
    trigger: usize,
    keep: usize,
}

impl HistoryCompactor {
    pub fn new(llm: Arc<dyn LlmClient>, trigger: usize, keep: usize) -> Self {
        Self { llm, trigger, keep }
    }

    pub fn needs_compaction(&self, messages: &[ChatMessage]) -> bool {
        messages.len() > self.trigger
    }

    /// Produce the replacement history, or `None` when the history is short
    /// enough or the middle section is too small to be worth condensing.
    ///
    /// On success the result is `[system, summary, ...tail]`; when the model
    /// call fails it is `[system, ...tail]`.
    pub async fn compact(&self, messages: &[ChatMessage]) -> Option<Vec<ChatMessage>> {
        if !self.needs_compaction(messages) || messages.len() <= self.keep + 1 {
            return None;
        }
        let split = messages.len() - self.keep;
        let head = messages[0].clone();
        let middle = &messages[1..split];
        let tail = &messages[split..];
        if middle.len() < MIN_MIDDLE_LEN {
            return None;
        }

        match self.summarize(middle).await {
            Ok(summary) => {
                tracing::info!(condensed = middle.len(), kept = tail.len(), "history summarized");
                let mut rebuilt = Vec::with_capacity(tail.len() + 2);
                rebuilt.push(head);
                rebuilt.push(ChatMessage::system(format!(
                    "Summary of the conversation so far: {}",
                    summary
                )));
                rebuilt.extend_from_slice(tail);
                Some(rebuilt)
            }
            Err(e) => {
                tracing::warn!("summarization failed, truncating history instead: {}", e);
                let mut rebuilt = Vec::with_capacity(tail.len() + 1);
                rebuilt.push(head);
                rebuilt.extend_from_slice(tail);
                Some(rebuilt)
            }
        }
    }

    async fn summarize(&self, middle: &[ChatMessage]) -> Result<String, LlmError> {
        let transcript = middle
            .iter()
            .map(|m| format!("{}: {}", role_label(m.role), m.content))
            .collect::<Vec<_>>()
            .join("\n");
        let request = vec![
            ChatMessage::system(SUMMARY_INSTRUCTION),
            ChatMessage::user(format!("Conversation to summarize:\n\n{}", transcript)),
        ];
        let reply = self.llm.send(&request, &[]).await?;
        let summary = reply.content.trim();
        if summary.is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.llm.provider_name().to_string(),
                reason: "empty summary".to_string(),
            });
        }
        Ok(cap_lines(summary, SUMMARY_LINE_CAP))
    }
}

fn role_label(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

fn cap_lines(text: &str, cap: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= cap {
        text.to_string()
    } else {
        lines[..cap].join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelReply;
    use crate::llm::testing::ScriptedClient;

    fn history(turns: usize) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system("wallet assistant instructions")];
        for i in 0..turns {
            messages.push(ChatMessage::user(format!("question {i}")));
            messages.push(ChatMessage::assistant(format!("answer {i}")));
        }
        messages
    }

    fn compactor_with(replies: Vec<ModelReply>, trigger: usize, keep: usize) -> HistoryCompactor {
        HistoryCompactor::new(Arc::new(ScriptedClient::new(replies)), trigger, keep)
    }

    #[tokio::test]
    async fn short_histories_are_left_alone() {
        let compactor = compactor_with(vec![], 40, 12);
        assert!(compactor.compact(&history(19)).await.is_none());
        assert_eq!(history(19).len(), 39);
    }

    #[tokio::test]
    async fn summarized_history_is_system_plus_summary_plus_tail() {
        let compactor = compactor_with(vec![ModelReply::text("They checked balances twice.")], 40, 12);
        let original = history(20);
        assert_eq!(original.len(), 41);

        let rebuilt = compactor.compact(&original).await.unwrap();
        assert_eq!(rebuilt.len(), 2 + 12);
        assert_eq!(rebuilt[0].content, "wallet assistant instructions");
        assert_eq!(rebuilt[0].role, ChatRole::System);
        assert_eq!(rebuilt[1].role, ChatRole::System);
        assert!(rebuilt[1].content.contains("They checked balances twice."));
        assert_eq!(rebuilt[2..], original[original.len() - 12..]);
    }

    #[tokio::test]
    async fn model_failure_degrades_to_truncation() {
        let compactor = HistoryCompactor::new(
            Arc::new(ScriptedClient::with_outcomes(vec![Err(
                LlmError::RequestFailed {
                    provider: "scripted".to_string(),
                    reason: "offline".to_string(),
                },
            )])),
            40,
            12,
        );
        let original = history(20);
        let rebuilt = compactor.compact(&original).await.unwrap();
        assert_eq!(rebuilt.len(), 1 + 12);
        assert_eq!(rebuilt[0].content, "wallet assistant instructions");
        assert_eq!(rebuilt[1..], original[original.len() - 12..]);
    }

    #[tokio::test]
    async fn empty_summary_also_degrades_to_truncation() {
        let compactor = compactor_with(vec![ModelReply::from_parts("   ", vec![])], 40, 12);
        let rebuilt = compactor.compact(&history(20)).await.unwrap();
        assert_eq!(rebuilt.len(), 1 + 12);
    }

    #[tokio::test]
    async fn tiny_middle_sections_are_skipped() {
        // Trigger 10, keep 8: an 11-message history leaves a 2-message middle.
        let compactor = compactor_with(vec![], 10, 8);
        assert!(compactor.compact(&history(5)).await.is_none());
    }

    #[tokio::test]
    async fn long_summaries_are_capped() {
        let rambling = (0..20).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let compactor = compactor_with(vec![ModelReply::text(rambling)], 40, 12);
        let rebuilt = compactor.compact(&history(20)).await.unwrap();
        assert!(rebuilt[1].content.lines().count() <= SUMMARY_LINE_CAP + 1);
    }
}
