//! End-to-end integration tests for the HTTP gateway.
//!
//! These tests start a real Axum server on a random port and drive it with a
//! plain reqwest client, verifying the full request flow:
//! - public health endpoint
//! - bearer-token auth on `/api/*`
//! - chat session creation and the confirm/cancel transaction flow
//! - session status, wallet lookup, and deletion
//! - chat rate limiting

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::{Value, json};
use uuid::Uuid;

use walletpilot::config::AgentConfig;
use walletpilot::error::LlmError;
use walletpilot::llm::{ChatMessage, LlmClient, ModelReply, ToolDescriptor, ToolInvocation};
use walletpilot::tools::default_registry;
use walletpilot::wallet::WalletBackend;
use walletpilot::wallet::simulated::SimulatedWallet;
use walletpilot::channels::web::server::{GatewayState, start_server};

const AUTH_TOKEN: &str = "test-token-1234567890";
const RECIPIENT: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

struct ScriptedLlm {
    replies: Mutex<VecDeque<ModelReply>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn send(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDescriptor],
    ) -> Result<ModelReply, LlmError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason: "script exhausted".to_string(),
            })
    }
}

fn is_bind_permission_error<E: std::fmt::Display>(err: &E) -> bool {
    err.to_string().contains("Operation not permitted")
        || err.to_string().contains("failed to bind")
}

/// Start a gateway on a random port. Returns `None` when the sandbox denies
/// socket binds so the test can skip instead of fail.
async fn start_test_server(
    replies: Vec<ModelReply>,
    chat_rate_limit: u64,
) -> Option<(SocketAddr, Arc<GatewayState>)> {
    let wallet: Arc<dyn WalletBackend> =
        Arc::new(SimulatedWallet::new("gateway-tests", "base-sepolia"));
    let registry = Arc::new(default_registry(Arc::clone(&wallet)));
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(replies));
    let state = Arc::new(GatewayState::new(
        llm,
        wallet,
        registry,
        AgentConfig::default(),
        chat_rate_limit,
        60,
    ));

    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    match start_server(addr, Arc::clone(&state), SecretString::from(AUTH_TOKEN.to_string())).await {
        Ok(bound) => Some((bound, state)),
        Err(e) if is_bind_permission_error(&e) => None,
        Err(e) => panic!("failed to start gateway: {e}"),
    }
}

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn post_chat(addr: SocketAddr, body: Value) -> reqwest::Response {
    client()
        .post(format!("http://{addr}/api/chat"))
        .bearer_auth(AUTH_TOKEN)
        .json(&body)
        .send()
        .await
        .expect("chat request")
}

#[tokio::test]
async fn health_is_public() {
    let Some((addr, state)) = start_test_server(vec![], 30).await else {
        eprintln!("skipping: cannot bind sockets in this environment");
        return;
    };

    let resp = client()
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .expect("health request");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("health body");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sessions"], 0);

    state.shutdown().await;
}

#[tokio::test]
async fn api_routes_require_a_valid_bearer_token() {
    let Some((addr, state)) = start_test_server(vec![], 30).await else {
        eprintln!("skipping: cannot bind sockets in this environment");
        return;
    };

    let no_token = client()
        .post(format!("http://{addr}/api/chat"))
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .expect("request without token");
    assert_eq!(no_token.status(), StatusCode::UNAUTHORIZED);

    let wrong_token = client()
        .post(format!("http://{addr}/api/chat"))
        .bearer_auth("not-the-token")
        .json(&json!({"message": "hi"}))
        .send()
        .await
        .expect("request with wrong token");
    assert_eq!(wrong_token.status(), StatusCode::UNAUTHORIZED);

    state.shutdown().await;
}

#[tokio::test]
async fn chat_opens_a_session_and_replies() {
    let Some((addr, state)) = start_test_server(
        vec![ModelReply::text("Hello! How can I help with your wallet?")],
        30,
    )
    .await
    else {
        eprintln!("skipping: cannot bind sockets in this environment");
        return;
    };

    let resp = post_chat(addr, json!({"message": "hi"})).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.expect("chat body");
    let session_id = body["session_id"].as_str().expect("session id");
    Uuid::parse_str(session_id).expect("session id is a uuid");
    assert_eq!(body["message"], "Hello! How can I help with your wallet?");
    assert!(body.get("pending").is_none());

    // system + user + assistant.
    let status = client()
        .get(format!("http://{addr}/api/session/{session_id}"))
        .bearer_auth(AUTH_TOKEN)
        .send()
        .await
        .expect("status request");
    assert_eq!(status.status(), StatusCode::OK);
    let status: Value = status.json().await.expect("status body");
    assert_eq!(status["has_pending_transaction"], false);
    assert_eq!(status["history_len"], 3);

    state.shutdown().await;
}

#[tokio::test]
async fn transfer_flow_freezes_then_confirms_over_http() {
    let Some((addr, state)) = start_test_server(
        vec![
            ModelReply::from_parts(
                "",
                vec![ToolInvocation::new(
                    "native_transfer",
                    json!({"to": RECIPIENT, "amount": "0.5"}),
                )],
            ),
            ModelReply::text("Sent 0.5 ETH."),
        ],
        30,
    )
    .await
    else {
        eprintln!("skipping: cannot bind sockets in this environment");
        return;
    };

    let resp = post_chat(addr, json!({"message": format!("send 0.5 ETH to {RECIPIENT}")})).await;
    let body: Value = resp.json().await.expect("chat body");
    let session_id = body["session_id"].as_str().expect("session id").to_string();
    assert_eq!(body["pending"]["operation"], "native_transfer");
    assert!(body["message"].as_str().unwrap().contains("0.5"));

    let confirm = client()
        .post(format!("http://{addr}/api/confirm"))
        .bearer_auth(AUTH_TOKEN)
        .json(&json!({"session_id": session_id}))
        .send()
        .await
        .expect("confirm request");
    assert_eq!(confirm.status(), StatusCode::OK);
    let confirm: Value = confirm.json().await.expect("confirm body");
    assert_eq!(confirm["message"], "Sent 0.5 ETH.");
    assert!(
        confirm["tool_calls"][0]["result"]
            .as_str()
            .unwrap()
            .contains("tx_hash: 0x")
    );
    assert!(confirm.get("pending").is_none());

    let wallet = client()
        .get(format!("http://{addr}/api/wallet/{session_id}"))
        .bearer_auth(AUTH_TOKEN)
        .send()
        .await
        .expect("wallet request");
    let wallet: Value = wallet.json().await.expect("wallet body");
    assert_eq!(wallet["balance"], "9.5000 ETH");
    assert_eq!(wallet["network"], "base-sepolia");

    state.shutdown().await;
}

#[tokio::test]
async fn cancel_discards_the_pending_transaction() {
    let Some((addr, state)) = start_test_server(
        vec![ModelReply::from_parts(
            "",
            vec![ToolInvocation::new(
                "native_transfer",
                json!({"to": RECIPIENT, "amount": "1"}),
            )],
        )],
        30,
    )
    .await
    else {
        eprintln!("skipping: cannot bind sockets in this environment");
        return;
    };

    let body: Value = post_chat(addr, json!({"message": "send 1 ETH"}))
        .await
        .json()
        .await
        .expect("chat body");
    let session_id = body["session_id"].as_str().unwrap().to_string();

    let cancel: Value = client()
        .post(format!("http://{addr}/api/cancel"))
        .bearer_auth(AUTH_TOKEN)
        .json(&json!({"session_id": session_id}))
        .send()
        .await
        .expect("cancel request")
        .json()
        .await
        .expect("cancel body");
    assert!(cancel["message"].as_str().unwrap().contains("cancelled"));

    let wallet: Value = client()
        .get(format!("http://{addr}/api/wallet/{session_id}"))
        .bearer_auth(AUTH_TOKEN)
        .send()
        .await
        .expect("wallet request")
        .json()
        .await
        .expect("wallet body");
    assert_eq!(wallet["balance"], "10.0000 ETH");

    state.shutdown().await;
}

#[tokio::test]
async fn unknown_sessions_return_not_found() {
    let Some((addr, state)) = start_test_server(vec![], 30).await else {
        eprintln!("skipping: cannot bind sockets in this environment");
        return;
    };

    let id = Uuid::new_v4();
    let resp = client()
        .post(format!("http://{addr}/api/confirm"))
        .bearer_auth(AUTH_TOKEN)
        .json(&json!({"session_id": id}))
        .send()
        .await
        .expect("confirm request");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = post_chat(addr, json!({"session_id": id, "message": "hi"})).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    state.shutdown().await;
}

#[tokio::test]
async fn empty_messages_are_rejected() {
    let Some((addr, state)) = start_test_server(vec![], 30).await else {
        eprintln!("skipping: cannot bind sockets in this environment");
        return;
    };

    let resp = post_chat(addr, json!({"message": "   "})).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    state.shutdown().await;
}

#[tokio::test]
async fn chat_is_rate_limited() {
    let Some((addr, state)) = start_test_server(vec![ModelReply::text("ok")], 1).await else {
        eprintln!("skipping: cannot bind sockets in this environment");
        return;
    };

    let first = post_chat(addr, json!({"message": "hi"})).await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = post_chat(addr, json!({"message": "hi again"})).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    state.shutdown().await;
}

#[tokio::test]
async fn deleting_a_session_frees_it() {
    let Some((addr, state)) = start_test_server(vec![ModelReply::text("hello")], 30).await else {
        eprintln!("skipping: cannot bind sockets in this environment");
        return;
    };

    let body: Value = post_chat(addr, json!({"message": "hi"}))
        .await
        .json()
        .await
        .expect("chat body");
    let session_id = body["session_id"].as_str().unwrap().to_string();
    assert_eq!(state.sessions.len().await, 1);

    let resp = client()
        .delete(format!("http://{addr}/api/session/{session_id}"))
        .bearer_auth(AUTH_TOKEN)
        .send()
        .await
        .expect("delete request");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(state.sessions.len().await, 0);

    let resp = client()
        .get(format!("http://{addr}/api/session/{session_id}"))
        .bearer_auth(AUTH_TOKEN)
        .send()
        .await
        .expect("status request");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    state.shutdown().await;
}
