//! HTTP gateway server.
//!
//! A small axum surface over the session registry: `/health` is public,
//! everything under `/api/` requires the gateway bearer token, and the chat
//! endpoint sits behind a sliding-window rate limiter. Each request locks its
//! session's agent for the whole call, so a session can never interleave a
//! chat turn with a confirmation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::{DefaultBodyLimit, Path, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tokio::sync::{RwLock, oneshot};
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::agent::sessions::{SessionHandle, SessionManager};
use crate::agent::Agent;
use crate::channels::web::types::*;
use crate::config::AgentConfig;
use crate::error::ChannelError;
use crate::llm::LlmClient;
use crate::tools::ToolRegistry;
use crate::wallet::WalletBackend;

/// Simple sliding-window rate limiter.
///
/// Tracks the number of requests in the current window and resets when the
/// window expires. Not per-IP, since the gateway is a single-user service
/// with auth, but prevents flooding.
pub struct RateLimiter {
    remaining: AtomicU64,
    window_start: AtomicU64,
    max_requests: u64,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window_secs: u64) -> Self {
        Self {
            remaining: AtomicU64::new(max_requests),
            window_start: AtomicU64::new(epoch_secs()),
            max_requests,
            window_secs,
        }
    }

    /// Try to consume one request. Returns `true` if allowed.
    pub fn check(&self) -> bool {
        let now = epoch_secs();
        let window = self.window_start.load(Ordering::Relaxed);
        if now.saturating_sub(window) >= self.window_secs {
            self.window_start.store(now, Ordering::Relaxed);
            self.remaining
                .store(self.max_requests - 1, Ordering::Relaxed);
            return true;
        }

        loop {
            let current = self.remaining.load(Ordering::Relaxed);
            if current == 0 {
                return false;
            }
            if self
                .remaining
                .compare_exchange_weak(current, current - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Generate a random bearer token for gateways started without one.
pub fn generate_auth_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Shared state for all gateway handlers.
pub struct GatewayState {
    pub llm: Arc<dyn LlmClient>,
    pub wallet: Arc<dyn WalletBackend>,
    pub registry: Arc<ToolRegistry>,
    pub agent_config: AgentConfig,
    pub sessions: SessionManager,
    pub started_at: DateTime<Utc>,
    /// Rate limiter for the chat endpoint.
    pub chat_rate_limiter: RateLimiter,
    /// Shutdown signal sender.
    pub shutdown_tx: RwLock<Option<oneshot::Sender<()>>>,
}

impl GatewayState {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        wallet: Arc<dyn WalletBackend>,
        registry: Arc<ToolRegistry>,
        agent_config: AgentConfig,
        chat_rate_limit: u64,
        chat_rate_window_secs: u64,
    ) -> Self {
        Self {
            llm,
            wallet,
            registry,
            agent_config,
            sessions: SessionManager::new(),
            started_at: Utc::now(),
            chat_rate_limiter: RateLimiter::new(chat_rate_limit, chat_rate_window_secs),
            shutdown_tx: RwLock::new(None),
        }
    }

    /// Ask the running server to stop.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Clone)]
struct AuthState {
    token: Arc<SecretString>,
}

/// Bearer-token check for `/api/*`. Constant-time comparison so the token
/// cannot be probed byte by byte.
async fn auth_middleware(
    State(auth): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let authorized = match presented {
        Some(presented) => {
            let expected = auth.token.expose_secret().as_bytes();
            presented.as_bytes().ct_eq(expected).into()
        }
        None => false,
    };

    if authorized {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("missing or invalid bearer token")),
        )
            .into_response()
    }
}

/// Start the gateway HTTP server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<GatewayState>,
    auth_token: SecretString,
) -> Result<SocketAddr, ChannelError> {
    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "gateway".to_string(),
                reason: format!("failed to bind to {}: {}", addr, e),
            })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| ChannelError::StartupFailed {
            name: "gateway".to_string(),
            reason: format!("failed to get local addr: {}", e),
        })?;

    let auth_state = AuthState {
        token: Arc::new(auth_token),
    };

    let public = Router::new().route("/health", get(health_handler));

    let protected = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/confirm", post(confirm_handler))
        .route("/api/cancel", post(cancel_handler))
        .route("/api/history/clear", post(clear_history_handler))
        .route("/api/session/{session_id}", get(session_status_handler))
        .route("/api/session/{session_id}", delete(delete_session_handler))
        .route("/api/wallet/{session_id}", get(wallet_handler))
        .route_layer(middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ));

    // Local-first service: only same-host browser origins get CORS.
    let cors = CorsLayer::new()
        .allow_origin([
            format!("http://{}:{}", bound_addr.ip(), bound_addr.port())
                .parse()
                .expect("valid origin"),
            format!("http://localhost:{}", bound_addr.port())
                .parse()
                .expect("valid origin"),
        ])
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
        ]));

    let app = Router::new()
        .merge(public)
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(64 * 1024)),
        )
        .with_state(state.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("gateway shutting down");
            })
            .await
        {
            tracing::error!("gateway server error: {}", e);
        }
    });

    tracing::info!(addr = %bound_addr, "gateway listening");
    Ok(bound_addr)
}

// --- Handlers ---

async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        sessions: state.sessions.len().await,
    })
}

async fn chat_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if !state.chat_rate_limiter.check() {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse::new("too many chat messages; slow down")),
        )
            .into_response();
    }
    if request.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("message must not be empty")),
        )
            .into_response();
    }

    let (session_id, handle) = match request.session_id {
        Some(id) => match state.sessions.get(&id).await {
            Some(handle) => (id, handle),
            None => return session_not_found(id),
        },
        None => match new_session(&state).await {
            Ok(pair) => pair,
            Err(response) => return response,
        },
    };

    let reply = handle.lock().await.submit_user_message(&request.message).await;
    Json(ChatResponse { session_id, reply }).into_response()
}

async fn confirm_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<SessionRequest>,
) -> Response {
    let Some(handle) = state.sessions.get(&request.session_id).await else {
        return session_not_found(request.session_id);
    };
    let reply = handle.lock().await.confirm_pending_transaction().await;
    Json(ChatResponse {
        session_id: request.session_id,
        reply,
    })
    .into_response()
}

async fn cancel_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<SessionRequest>,
) -> Response {
    let Some(handle) = state.sessions.get(&request.session_id).await else {
        return session_not_found(request.session_id);
    };
    let reply = handle.lock().await.cancel_pending_transaction();
    Json(ChatResponse {
        session_id: request.session_id,
        reply,
    })
    .into_response()
}

async fn clear_history_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<SessionRequest>,
) -> Response {
    let Some(handle) = state.sessions.get(&request.session_id).await else {
        return session_not_found(request.session_id);
    };
    let mut agent = handle.lock().await;
    agent.clear_history();
    Json(SessionStatusResponse {
        session_id: request.session_id,
        has_pending_transaction: agent.has_pending_transaction(),
        history_len: agent.history().len(),
    })
    .into_response()
}

async fn session_status_handler(
    State(state): State<Arc<GatewayState>>,
    Path(session_id): Path<Uuid>,
) -> Response {
    let Some(handle) = state.sessions.get(&session_id).await else {
        return session_not_found(session_id);
    };
    let agent = handle.lock().await;
    Json(SessionStatusResponse {
        session_id,
        has_pending_transaction: agent.has_pending_transaction(),
        history_len: agent.history().len(),
    })
    .into_response()
}

async fn delete_session_handler(
    State(state): State<Arc<GatewayState>>,
    Path(session_id): Path<Uuid>,
) -> Response {
    if state.sessions.remove(&session_id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        session_not_found(session_id)
    }
}

async fn wallet_handler(
    State(state): State<Arc<GatewayState>>,
    Path(session_id): Path<Uuid>,
) -> Response {
    let Some(handle) = state.sessions.get(&session_id).await else {
        return session_not_found(session_id);
    };
    let mut agent = handle.lock().await;
    match agent.refresh_wallet_info().await {
        Ok(info) => Json(WalletResponse {
            session_id,
            address: info.address,
            network: info.network,
            balance: crate::wallet::format_native(info.balance),
        })
        .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::new(format!("wallet lookup failed: {e}"))),
        )
            .into_response(),
    }
}

async fn new_session(state: &Arc<GatewayState>) -> Result<(Uuid, SessionHandle), Response> {
    let agent = Agent::initialize(
        Arc::clone(&state.llm),
        Arc::clone(&state.wallet),
        Arc::clone(&state.registry),
        &state.agent_config,
    )
    .await
    .map_err(|e| {
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse::new(format!(
                "failed to initialize session: {e}"
            ))),
        )
            .into_response()
    })?;
    let id = state.sessions.insert(agent).await;
    let handle = state.sessions.get(&id).await.ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("session vanished during creation")),
        )
            .into_response()
    })?;
    Ok((id, handle))
}

fn session_not_found(id: Uuid) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(format!("unknown session {id}"))),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_exhausts_and_resets() {
        let limiter = RateLimiter::new(3, 60);
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(limiter.check());
        assert!(!limiter.check());

        // Force the window into the past; the next check resets it.
        limiter.window_start.store(epoch_secs() - 61, Ordering::Relaxed);
        assert!(limiter.check());
    }

    #[test]
    fn generated_tokens_are_long_and_distinct() {
        let a = generate_auth_token();
        let b = generate_auth_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
