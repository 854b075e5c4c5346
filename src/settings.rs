//! User settings persistence.
//!
//! Stores user preferences in `~/.walletpilot/config.toml`. Settings are the
//! file layer of configuration; `crate::config` resolves them with env var >
//! config file > default priority.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Supported wallet backends for settings/config wiring.
pub const SUPPORTED_WALLET_BACKENDS: [&str; 2] = ["simulated", "remote"];

/// Normalize backend aliases to canonical values used across config/runtime.
pub fn normalize_wallet_backend(value: &str) -> Option<String> {
    let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    match normalized.as_str() {
        "simulated" | "sim" | "local" => Some("simulated".to_string()),
        "remote" | "service" | "wallet_service" => Some("remote".to_string()),
        _ => None,
    }
}

/// User settings persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Language model settings.
    #[serde(default)]
    pub llm: LlmSettings,

    /// Wallet backend settings.
    #[serde(default)]
    pub wallet: WalletSettings,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewaySettings,

    /// Orchestration loop settings.
    #[serde(default)]
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmSettings {
    /// Base URL of an OpenAI-compatible chat-completions endpoint.
    #[serde(default, alias = "llm_base_url")]
    pub base_url: Option<String>,

    /// Model identifier sent with every request.
    #[serde(default, alias = "selected_model")]
    pub model: Option<String>,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WalletSettings {
    /// Wallet backend: "simulated" or "remote".
    #[serde(default)]
    pub backend: Option<String>,

    /// Network label for the simulated backend.
    #[serde(default)]
    pub network: Option<String>,

    /// Deterministic seed for the simulated backend.
    #[serde(default)]
    pub seed: Option<String>,

    /// Base URL of the remote wallet service (when backend = "remote").
    #[serde(default, alias = "wallet_service_url")]
    pub service_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewaySettings {
    /// Bind host.
    #[serde(default)]
    pub host: Option<String>,

    /// Bind port.
    #[serde(default)]
    pub port: Option<u16>,

    /// Chat messages allowed per rate-limit window.
    #[serde(default)]
    pub chat_rate_limit: Option<u64>,

    /// Rate-limit window in seconds.
    #[serde(default)]
    pub chat_rate_window_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentSettings {
    /// Upper bound on model/tool rounds per chat turn.
    #[serde(default)]
    pub max_rounds: Option<usize>,

    /// History length that triggers summarization.
    #[serde(default)]
    pub summarize_trigger: Option<usize>,

    /// Most recent messages kept verbatim through summarization.
    #[serde(default)]
    pub summarize_keep: Option<usize>,
}

impl Settings {
    /// Default settings file path: `~/.walletpilot/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".walletpilot")
            .join("config.toml")
    }

    /// Load settings from the default path; a missing or unreadable file
    /// yields defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path()).unwrap_or_else(|e| {
            tracing::warn!("failed to load settings, using defaults: {}", e);
            Self::default()
        })
    }

    /// Load settings from an explicit path. `Ok(default)` when the file does
    /// not exist; `Err` only on read or parse failures.
    pub fn load_from(path: &std::path::Path) -> Result<Self, String> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {}", path.display(), e)),
        };
        let mut settings: Self =
            toml::from_str(&data).map_err(|e| format!("invalid TOML in {}: {}", path.display(), e))?;
        settings.sanitize_wallet_backend();
        Ok(settings)
    }

    /// Write settings to disk, creating the parent directory if needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }
        let data = toml::to_string_pretty(self).map_err(|e| format!("serialize failed: {}", e))?;
        std::fs::write(path, data).map_err(|e| format!("failed to write {}: {}", path.display(), e))
    }

    /// Overlay `other` onto `self`: any value set in `other` wins.
    pub fn merge_from(&mut self, other: &Self) {
        merge_opt(&mut self.llm.base_url, &other.llm.base_url);
        merge_opt(&mut self.llm.model, &other.llm.model);
        merge_opt(&mut self.llm.temperature, &other.llm.temperature);
        merge_opt(&mut self.wallet.backend, &other.wallet.backend);
        merge_opt(&mut self.wallet.network, &other.wallet.network);
        merge_opt(&mut self.wallet.seed, &other.wallet.seed);
        merge_opt(&mut self.wallet.service_url, &other.wallet.service_url);
        merge_opt(&mut self.gateway.host, &other.gateway.host);
        merge_opt(&mut self.gateway.port, &other.gateway.port);
        merge_opt(&mut self.gateway.chat_rate_limit, &other.gateway.chat_rate_limit);
        merge_opt(
            &mut self.gateway.chat_rate_window_secs,
            &other.gateway.chat_rate_window_secs,
        );
        merge_opt(&mut self.agent.max_rounds, &other.agent.max_rounds);
        merge_opt(&mut self.agent.summarize_trigger, &other.agent.summarize_trigger);
        merge_opt(&mut self.agent.summarize_keep, &other.agent.summarize_keep);
    }

    /// Drop an unrecognized wallet backend rather than carry it into config
    /// resolution, where it would fail with a less local error.
    fn sanitize_wallet_backend(&mut self) {
        if let Some(raw) = &self.wallet.backend {
            match normalize_wallet_backend(raw) {
                Some(canonical) => self.wallet.backend = Some(canonical),
                None => {
                    tracing::warn!(
                        "ignoring unknown wallet backend '{}' in settings (expected one of {:?})",
                        raw,
                        SUPPORTED_WALLET_BACKENDS
                    );
                    self.wallet.backend = None;
                }
            }
        }
    }
}

fn merge_opt<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if src.is_some() {
        *dst = src.clone();
    }
}
