//! Agent orchestration.
//!
//! One [`Agent`] drives one conversation over one wallet: user text goes to
//! the model with the registry's tool descriptors, requested invocations are
//! classified by category, fund-moving invocations freeze as the session's
//! single pending transaction until the user confirms or cancels, and
//! everything else executes immediately with results looped back to the model
//! under a fixed round bound.

pub mod compaction;
pub mod conversation;
mod describe;
pub mod formatter;
pub mod sessions;

use std::sync::Arc;

use serde::Serialize;

use crate::config::AgentConfig;
use crate::error::{LlmError, Result};
use crate::llm::{ChatMessage, LlmClient, ReplyKind, ToolInvocation};
use crate::tools::ToolRegistry;
use crate::wallet::{WalletBackend, WalletInfo};

use compaction::HistoryCompactor;
use conversation::Conversation;
pub use conversation::{PendingTransaction, ToolCallRecord};
use describe::describe_transaction;
use formatter::{format_result, synthesize_fallback};

/// Fixed last-resort reply when the model cannot be reached at all.
const APOLOGY: &str = "I'm sorry, I'm having trouble reaching the language model right now. \
Please try again in a moment.";

const CONFIRM_HINT: &str = "Reply \"confirm\" to execute or \"cancel\" to discard.";

/// What one chat entry point returns to the adapter layer.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingTransaction>,
}

impl ChatReply {
    fn plain(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            tool_calls: Vec::new(),
            pending: None,
        }
    }

    fn frozen(tool_calls: Vec<ToolCallRecord>, pending: PendingTransaction) -> Self {
        let message = format!("{}\n\n{}", pending.description, CONFIRM_HINT);
        Self {
            message,
            tool_calls,
            pending: Some(pending),
        }
    }
}

enum LoopOutcome {
    Message(String),
    Frozen(PendingTransaction),
}

enum RoundFlow {
    Completed,
    Frozen(PendingTransaction),
}

/// One conversational session over one wallet.
pub struct Agent {
    conversation: Conversation,
    registry: Arc<ToolRegistry>,
    llm: Arc<dyn LlmClient>,
    wallet: Arc<dyn WalletBackend>,
    compactor: HistoryCompactor,
    max_rounds: usize,
    info: WalletInfo,
}

impl Agent {
    /// Create a session: fetches the wallet identity and seeds the
    /// conversation with the system instruction.
    pub async fn initialize(
        llm: Arc<dyn LlmClient>,
        wallet: Arc<dyn WalletBackend>,
        registry: Arc<ToolRegistry>,
        config: &AgentConfig,
    ) -> Result<Self> {
        let info = wallet.wallet_info().await?;
        tracing::info!(
            address = %info.address,
            network = %info.network,
            "agent session initialized"
        );
        let conversation = Conversation::new(system_prompt(&info));
        let compactor = HistoryCompactor::new(
            Arc::clone(&llm),
            config.summarize_trigger,
            config.summarize_keep,
        );
        Ok(Self {
            conversation,
            registry,
            llm,
            wallet,
            compactor,
            max_rounds: config.max_rounds,
            info,
        })
    }

    pub fn wallet_info(&self) -> &WalletInfo {
        &self.info
    }

    /// Re-fetch address, network, and balance from the backend.
    pub async fn refresh_wallet_info(&mut self) -> Result<WalletInfo> {
        let info = self.wallet.wallet_info().await?;
        self.info = info.clone();
        Ok(info)
    }

    pub fn has_pending_transaction(&self) -> bool {
        self.conversation.has_pending()
    }

    pub fn pending_transaction(&self) -> Option<&PendingTransaction> {
        self.conversation.pending()
    }

    pub fn history(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    /// Reset the conversation to its initial system message. Also discards
    /// any pending transaction: a frozen invocation must not outlive the
    /// conversation that produced it.
    pub fn clear_history(&mut self) {
        tracing::debug!("conversation history cleared");
        self.conversation.clear();
    }

    /// Process one user turn. Tool failures, model failures, and unknown
    /// operation names are all absorbed into the reply; this never errors.
    pub async fn submit_user_message(&mut self, text: &str) -> ChatReply {
        if let Some(compacted) = self.compactor.compact(self.conversation.messages()).await {
            self.conversation.replace_messages(compacted);
        }
        self.conversation.push_user(text);

        let mut records = Vec::new();
        match self.run_rounds(&mut records).await {
            Ok(LoopOutcome::Message(message)) => ChatReply {
                message,
                tool_calls: records,
                pending: None,
            },
            Ok(LoopOutcome::Frozen(pending)) => ChatReply::frozen(records, pending),
            Err(e) => {
                tracing::warn!("model call failed mid-turn: {}", e);
                let message = self.explain_failure(&e).await;
                self.conversation.push_assistant(&message);
                ChatReply {
                    message,
                    tool_calls: records,
                    pending: None,
                }
            }
        }
    }

    /// Execute the frozen invocation, then drain its queued remainder through
    /// the same confirmation gate, then let the model react to the outcome.
    pub async fn confirm_pending_transaction(&mut self) -> ChatReply {
        let Some(pending) = self.conversation.take_pending() else {
            return ChatReply::plain("There's no transaction waiting for confirmation.");
        };
        let Some(tool) = self.registry.get(&pending.operation).cloned() else {
            let message = format!(
                "The pending operation '{}' is no longer available, so nothing was executed.",
                pending.operation
            );
            self.conversation.push_assistant(&message);
            return ChatReply::plain(message);
        };

        tracing::info!(operation = %pending.operation, "executing confirmed transaction");
        let category = tool.category();
        let mut records = Vec::new();
        match tool.execute(&pending.arguments).await {
            Err(e) => {
                tracing::warn!("confirmed transaction failed: {}", e);
                let message = format!("The {} could not be completed: {}", category.label(), e);
                records.push(ToolCallRecord::new(
                    &pending.operation,
                    Some(category),
                    format!("Error: {}", e),
                ));
                self.conversation.push_assistant(&message);
                return ChatReply {
                    message,
                    tool_calls: records,
                    pending: None,
                };
            }
            Ok(raw) => {
                let result = format_result(category, &raw);
                self.conversation
                    .push_assistant(format!("Tool results:\n{}: {}", pending.operation, result));
                records.push(ToolCallRecord::new(&pending.operation, Some(category), result));
            }
        }

        if let RoundFlow::Frozen(next) = self.process_round(pending.queued, &mut records).await {
            return ChatReply::frozen(records, next);
        }

        match self.run_rounds(&mut records).await {
            Ok(LoopOutcome::Message(message)) => ChatReply {
                message,
                tool_calls: records,
                pending: None,
            },
            Ok(LoopOutcome::Frozen(next)) => ChatReply::frozen(records, next),
            Err(e) => {
                // The transaction already executed; report it without the model.
                tracing::warn!("model unavailable after confirmation: {}", e);
                let message = synthesize_fallback(&records);
                self.conversation.push_assistant(&message);
                ChatReply {
                    message,
                    tool_calls: records,
                    pending: None,
                }
            }
        }
    }

    /// Discard the pending transaction (and its queued remainder) without
    /// executing anything.
    pub fn cancel_pending_transaction(&mut self) -> ChatReply {
        match self.conversation.take_pending() {
            Some(pending) => {
                tracing::info!(operation = %pending.operation, "pending transaction cancelled");
                self.conversation.push_assistant(format!(
                    "(The pending {} was cancelled before execution; nothing was submitted.)",
                    pending.operation
                ));
                ChatReply::plain("Okay, I've cancelled that transaction. Nothing was executed.")
            }
            None => ChatReply::plain("There's no pending transaction to cancel."),
        }
    }

    /// The bounded model/tool loop. Appends the final assistant message on
    /// every non-frozen exit; errors only on model transport failure.
    async fn run_rounds(
        &mut self,
        records: &mut Vec<ToolCallRecord>,
    ) -> std::result::Result<LoopOutcome, LlmError> {
        let descriptors = self.registry.descriptors();
        for round in 0..self.max_rounds {
            let reply = self
                .llm
                .send(self.conversation.messages(), &descriptors)
                .await?;
            if !reply.has_invocations() {
                let message = match reply.kind {
                    ReplyKind::Final => reply.content.trim().to_string(),
                    ReplyKind::NeedsSynthesis => synthesize_fallback(records),
                };
                self.conversation.push_assistant(&message);
                return Ok(LoopOutcome::Message(message));
            }
            // Text alongside invocations is dropped; the model writes its
            // prose after the results come back.
            tracing::debug!(round, count = reply.invocations.len(), "processing tool round");
            if let RoundFlow::Frozen(pending) = self.process_round(reply.invocations, records).await
            {
                return Ok(LoopOutcome::Frozen(pending));
            }
        }

        tracing::debug!("round bound reached, synthesizing reply from records");
        let message = synthesize_fallback(records);
        self.conversation.push_assistant(&message);
        Ok(LoopOutcome::Message(message))
    }

    /// Process one round of invocations strictly in model order. The first
    /// fund-moving invocation freezes with the unprocessed remainder queued
    /// behind it; results collected so far still reach the conversation.
    async fn process_round(
        &mut self,
        invocations: Vec<ToolInvocation>,
        records: &mut Vec<ToolCallRecord>,
    ) -> RoundFlow {
        let mut round_records: Vec<ToolCallRecord> = Vec::new();
        let mut iter = invocations.into_iter();
        while let Some(invocation) = iter.next() {
            let Some(tool) = self.registry.get(&invocation.name).cloned() else {
                tracing::warn!("model requested unknown operation '{}'", invocation.name);
                round_records.push(ToolCallRecord::new(
                    &invocation.name,
                    None,
                    format!("unknown operation '{}'", invocation.name),
                ));
                continue;
            };

            let category = tool.category();
            if category.moves_funds() {
                if self.conversation.has_pending() {
                    round_records.push(ToolCallRecord::new(
                        &invocation.name,
                        Some(category),
                        "Error: another transaction is already awaiting confirmation; \
                         confirm or cancel it first",
                    ));
                    continue;
                }
                let description = describe_transaction(
                    tool.as_ref(),
                    &invocation.arguments,
                    self.wallet.as_ref(),
                )
                .await;
                let pending = PendingTransaction {
                    operation: invocation.name,
                    arguments: invocation.arguments,
                    description,
                    queued: iter.collect(),
                };
                self.flush_round(&round_records);
                records.append(&mut round_records);
                self.conversation.set_pending(pending.clone());
                return RoundFlow::Frozen(pending);
            }

            let result = match tool.execute(&invocation.arguments).await {
                Ok(raw) => format_result(category, &raw),
                Err(e) => {
                    tracing::warn!("tool '{}' failed: {}", invocation.name, e);
                    format!("Error: {}", e)
                }
            };
            round_records.push(ToolCallRecord::new(&invocation.name, Some(category), result));
        }

        self.flush_round(&round_records);
        records.append(&mut round_records);
        RoundFlow::Completed
    }

    /// Append one synthetic assistant turn carrying this round's results.
    fn flush_round(&mut self, round_records: &[ToolCallRecord]) {
        if round_records.is_empty() {
            return;
        }
        let lines: Vec<String> = round_records
            .iter()
            .map(|r| format!("{}: {}", r.name, r.result))
            .collect();
        self.conversation
            .push_assistant(format!("Tool results:\n{}", lines.join("\n")));
    }

    /// One extra model call asking for a friendly explanation of a failure;
    /// falls back to a fixed apology when that call fails too.
    async fn explain_failure(&self, error: &LlmError) -> String {
        let request = vec![
            ChatMessage::system(
                "You are a friendly assistant for a crypto wallet. Apologize briefly and \
                 explain the problem in plain words, without technical jargon.",
            ),
            ChatMessage::user(format!(
                "The attempt to answer the user's last message failed with this error: {}. \
                 Write one or two sentences telling them what happened and that they can retry.",
                error
            )),
        ];
        match self.llm.send(&request, &[]).await {
            Ok(reply) if !reply.content.trim().is_empty() => reply.content.trim().to_string(),
            _ => APOLOGY.to_string(),
        }
    }
}

fn system_prompt(info: &WalletInfo) -> String {
    format!(
        "You are WalletPilot, a conversational assistant for a single onchain wallet.\n\n\
         Wallet address: {}\n\
         Network: {}\n\
         Balance at session start: {}\n\n\
         Use the available tools to answer questions and carry out requests. Every \
         operation that moves funds is held for explicit user confirmation before it \
         executes; tell the user what you are about to do and wait for their decision. \
         Keep replies short and concrete, and quote amounts with their asset symbol.",
        info.address,
        info.network,
        info.display_balance()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelReply;
    use crate::llm::testing::ScriptedClient;
    use crate::tools::default_registry;
    use crate::wallet::simulated::SimulatedWallet;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const RECIPIENT: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

    fn invoke(name: &str, args: serde_json::Value) -> ModelReply {
        ModelReply::from_parts("", vec![ToolInvocation::new(name, args)])
    }

    fn invoke_many(invocations: Vec<ToolInvocation>) -> ModelReply {
        ModelReply::from_parts("", invocations)
    }

    async fn agent_with_outcomes(
        outcomes: Vec<std::result::Result<ModelReply, LlmError>>,
    ) -> (Agent, Arc<SimulatedWallet>) {
        let wallet = Arc::new(SimulatedWallet::new("agent-tests", "base-sepolia"));
        let backend: Arc<dyn WalletBackend> = wallet.clone();
        let registry = Arc::new(default_registry(Arc::clone(&backend)));
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedClient::with_outcomes(outcomes));
        let agent = Agent::initialize(llm, backend, registry, &AgentConfig::default())
            .await
            .unwrap();
        (agent, wallet)
    }

    async fn agent_with(replies: Vec<ModelReply>) -> (Agent, Arc<SimulatedWallet>) {
        agent_with_outcomes(replies.into_iter().map(Ok).collect()).await
    }

    fn request_failed() -> LlmError {
        LlmError::RequestFailed {
            provider: "scripted".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    #[tokio::test]
    async fn plain_chat_returns_model_text() {
        let (mut agent, _) = agent_with(vec![ModelReply::text("Hello! How can I help?")]).await;
        let reply = agent.submit_user_message("hi").await;
        assert_eq!(reply.message, "Hello! How can I help?");
        assert!(reply.tool_calls.is_empty());
        assert!(reply.pending.is_none());
    }

    #[tokio::test]
    async fn balance_query_round_trips_through_the_tool() {
        let (mut agent, _) = agent_with(vec![
            invoke("get_balance", json!({})),
            ModelReply::text("Your balance is 10.0000 ETH."),
        ])
        .await;
        let reply = agent.submit_user_message("what's my balance?").await;
        assert_eq!(reply.message, "Your balance is 10.0000 ETH.");
        assert_eq!(reply.tool_calls.len(), 1);
        assert!(reply.tool_calls[0].result.contains("10.0000 ETH"));
        assert!(reply.pending.is_none());
    }

    #[tokio::test]
    async fn transfer_request_freezes_without_executing() {
        let (mut agent, wallet) = agent_with(vec![invoke(
            "native_transfer",
            json!({"to": RECIPIENT, "amount": "0.01"}),
        )])
        .await;
        let reply = agent.submit_user_message("send 0.01 ETH").await;

        let pending = reply.pending.unwrap();
        assert_eq!(pending.operation, "native_transfer");
        assert!(reply.message.contains("0.01"));
        assert!(reply.message.contains(RECIPIENT));
        assert!(reply.tool_calls.is_empty());
        assert!(agent.has_pending_transaction());
        assert_eq!(wallet.native_balance().await.unwrap(), dec!(10));
    }

    #[tokio::test]
    async fn confirm_executes_and_lets_the_model_react() {
        let (mut agent, wallet) = agent_with(vec![
            invoke("native_transfer", json!({"to": RECIPIENT, "amount": "0.01"})),
            ModelReply::text("Sent 0.01 ETH. Anything else?"),
        ])
        .await;
        agent.submit_user_message("send 0.01 ETH").await;

        let reply = agent.confirm_pending_transaction().await;
        assert_eq!(reply.message, "Sent 0.01 ETH. Anything else?");
        assert_eq!(reply.tool_calls.len(), 1);
        assert!(reply.tool_calls[0].result.contains("tx_hash: 0x"));
        assert!(!agent.has_pending_transaction());
        assert_eq!(wallet.native_balance().await.unwrap(), dec!(9.99));
    }

    #[tokio::test]
    async fn confirm_reply_carries_the_hash_even_when_the_model_goes_silent() {
        let (mut agent, _) = agent_with_outcomes(vec![
            Ok(invoke("native_transfer", json!({"to": RECIPIENT, "amount": "0.01"}))),
            Err(request_failed()),
        ])
        .await;
        agent.submit_user_message("send 0.01 ETH").await;

        let reply = agent.confirm_pending_transaction().await;
        assert!(reply.message.contains("0x"));
        assert!(reply.pending.is_none());
    }

    #[tokio::test]
    async fn confirm_without_pending_is_a_plain_message() {
        let (mut agent, _) = agent_with(vec![]).await;
        let reply = agent.confirm_pending_transaction().await;
        assert!(reply.message.contains("no transaction waiting"));
    }

    #[tokio::test]
    async fn cancel_discards_without_executing() {
        let (mut agent, wallet) = agent_with(vec![invoke(
            "native_transfer",
            json!({"to": RECIPIENT, "amount": "3"}),
        )])
        .await;
        agent.submit_user_message("send 3 ETH").await;
        assert!(agent.has_pending_transaction());

        let reply = agent.cancel_pending_transaction();
        assert!(reply.message.contains("cancelled"));
        assert!(!agent.has_pending_transaction());
        assert_eq!(wallet.native_balance().await.unwrap(), dec!(10));

        let again = agent.cancel_pending_transaction();
        assert!(again.message.contains("no pending transaction"));
    }

    #[tokio::test]
    async fn later_round_invocations_queue_behind_the_freeze() {
        let (mut agent, wallet) = agent_with(vec![invoke_many(vec![
            ToolInvocation::new("get_balance", json!({})),
            ToolInvocation::new("native_transfer", json!({"to": RECIPIENT, "amount": "1"})),
            ToolInvocation::new(
                "token_transfer",
                json!({"token": "USDC", "to": RECIPIENT, "amount": "50"}),
            ),
        ])])
        .await;
        let reply = agent.submit_user_message("balance, then pay rent").await;

        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].name, "get_balance");
        let pending = reply.pending.unwrap();
        assert_eq!(pending.operation, "native_transfer");
        assert_eq!(pending.queued.len(), 1);
        assert_eq!(pending.queued[0].name, "token_transfer");
        assert_eq!(wallet.native_balance().await.unwrap(), dec!(10));
        assert_eq!(
            wallet.token_balance("USDC").await.unwrap().balance,
            dec!(2500)
        );
    }

    #[tokio::test]
    async fn confirm_drains_the_queue_and_refreezes_on_the_next_fund_mover() {
        let (mut agent, wallet) = agent_with(vec![
            invoke_many(vec![
                ToolInvocation::new("native_transfer", json!({"to": RECIPIENT, "amount": "1"})),
                ToolInvocation::new(
                    "token_transfer",
                    json!({"token": "USDC", "to": RECIPIENT, "amount": "50"}),
                ),
            ]),
            ModelReply::text("Both transfers are done."),
        ])
        .await;
        agent.submit_user_message("pay both bills").await;

        let first = agent.confirm_pending_transaction().await;
        assert_eq!(wallet.native_balance().await.unwrap(), dec!(9));
        assert_eq!(
            wallet.token_balance("USDC").await.unwrap().balance,
            dec!(2500)
        );
        let pending = first.pending.unwrap();
        assert_eq!(pending.operation, "token_transfer");
        assert!(pending.queued.is_empty());

        let second = agent.confirm_pending_transaction().await;
        assert_eq!(second.message, "Both transfers are done.");
        assert_eq!(
            wallet.token_balance("USDC").await.unwrap().balance,
            dec!(2450)
        );
        assert!(!agent.has_pending_transaction());
    }

    #[tokio::test]
    async fn unknown_operations_are_surfaced_not_dropped() {
        let (mut agent, _) = agent_with(vec![
            invoke("mint_money", json!({})),
            ModelReply::text("I can't do that one."),
        ])
        .await;
        let reply = agent.submit_user_message("print me cash").await;
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].result, "unknown operation 'mint_money'");
        assert!(reply.tool_calls[0].category.is_none());
        assert_eq!(reply.message, "I can't do that one.");
    }

    #[tokio::test]
    async fn round_bound_ends_with_a_synthesized_reply() {
        let replies = (0..5).map(|_| invoke("get_balance", json!({}))).collect();
        let (mut agent, _) = agent_with(replies).await;
        let reply = agent.submit_user_message("loop forever").await;
        assert_eq!(reply.tool_calls.len(), 5);
        assert!(reply.message.contains("10.0000 ETH"));
        assert!(reply.pending.is_none());
    }

    #[tokio::test]
    async fn tool_failures_become_result_text_and_the_loop_continues() {
        let (mut agent, _) = agent_with(vec![
            invoke("get_token_balance", json!({"token": "PUMP"})),
            ModelReply::text("I don't know that token."),
        ])
        .await;
        let reply = agent.submit_user_message("how much PUMP do I have?").await;
        assert!(reply.tool_calls[0].result.starts_with("Error:"));
        assert_eq!(reply.message, "I don't know that token.");
    }

    #[tokio::test]
    async fn model_failure_gets_a_friendly_explanation() {
        let (mut agent, _) = agent_with_outcomes(vec![
            Err(request_failed()),
            Ok(ModelReply::text("Something hiccuped on my side; mind trying again?")),
        ])
        .await;
        let reply = agent.submit_user_message("hello?").await;
        assert_eq!(reply.message, "Something hiccuped on my side; mind trying again?");
    }

    #[tokio::test]
    async fn model_failure_twice_falls_back_to_the_apology() {
        let (mut agent, _) =
            agent_with_outcomes(vec![Err(request_failed()), Err(request_failed())]).await;
        let reply = agent.submit_user_message("hello?").await;
        assert_eq!(reply.message, APOLOGY);
    }

    #[tokio::test]
    async fn fund_movers_are_refused_while_one_is_already_pending() {
        let (mut agent, wallet) = agent_with(vec![
            invoke("native_transfer", json!({"to": RECIPIENT, "amount": "1"})),
            invoke("wrap_eth", json!({"amount": "2"})),
            ModelReply::text("A transfer is still waiting on you."),
        ])
        .await;
        agent.submit_user_message("send 1 ETH").await;

        let reply = agent.submit_user_message("also wrap 2 ETH").await;
        assert!(reply.tool_calls[0]
            .result
            .contains("already awaiting confirmation"));
        assert_eq!(
            agent.pending_transaction().unwrap().operation,
            "native_transfer"
        );
        assert_eq!(wallet.native_balance().await.unwrap(), dec!(10));
    }

    #[tokio::test]
    async fn clear_history_resets_messages_and_pending() {
        let (mut agent, _) = agent_with(vec![invoke(
            "native_transfer",
            json!({"to": RECIPIENT, "amount": "1"}),
        )])
        .await;
        agent.submit_user_message("send 1 ETH").await;
        assert!(agent.has_pending_transaction());

        agent.clear_history();
        assert!(!agent.has_pending_transaction());
        assert_eq!(agent.history().len(), 1);
        assert!(agent.history()[0].content.contains("WalletPilot"));
    }

    #[tokio::test]
    async fn history_compacts_before_the_model_sees_the_turn() {
        let wallet: Arc<dyn WalletBackend> =
            Arc::new(SimulatedWallet::new("compaction", "base-sepolia"));
        let registry = Arc::new(default_registry(Arc::clone(&wallet)));
        let replies = vec![
            ModelReply::text("a1"),
            ModelReply::text("a2"),
            ModelReply::text("a3"),
            ModelReply::text("They talked about balances."),
            ModelReply::text("a4"),
        ];
        let llm: Arc<dyn LlmClient> = Arc::new(ScriptedClient::new(replies));
        let config = AgentConfig {
            max_rounds: 5,
            summarize_trigger: 6,
            summarize_keep: 2,
        };
        let mut agent = Agent::initialize(llm, wallet, registry, &config).await.unwrap();

        for text in ["q1", "q2", "q3"] {
            agent.submit_user_message(text).await;
        }
        assert_eq!(agent.history().len(), 7);

        agent.submit_user_message("q4").await;
        let history = agent.history();
        assert_eq!(history.len(), 6);
        assert!(history[0].content.contains("WalletPilot"));
        assert!(history[1].content.contains("They talked about balances."));
        assert_eq!(history[5].content, "a4");
    }

    #[tokio::test]
    async fn refresh_wallet_info_tracks_the_backend() {
        let (mut agent, wallet) = agent_with(vec![]).await;
        wallet
            .transfer_native(RECIPIENT, dec!(4))
            .await
            .unwrap();
        let info = agent.refresh_wallet_info().await.unwrap();
        assert_eq!(info.display_balance(), "6.0000 ETH");
        assert_eq!(agent.wallet_info().balance, dec!(6));
    }
}
