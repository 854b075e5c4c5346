//! Request and response DTOs for the web gateway API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::ChatReply;

// --- Chat ---

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Omit to start a new session.
    pub session_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub reply: ChatReply,
}

/// Body for confirm / cancel / clear-history calls.
#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: Uuid,
    pub has_pending_transaction: bool,
    pub history_len: usize,
}

// --- Wallet ---

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub session_id: Uuid,
    pub address: String,
    pub network: String,
    /// Rendered as `"X.XXXX ETH"`.
    pub balance: String,
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: i64,
    pub sessions: usize,
}

// --- Errors ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
