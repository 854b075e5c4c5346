//! Configuration for WalletPilot.
//!
//! Settings are loaded with priority: env var > config file > default.
//! Provider-selection vars live in `~/.walletpilot/.env` (loaded via dotenvy
//! early in startup); everything else comes from env vars or
//! `~/.walletpilot/config.toml`.

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::settings::Settings;

/// Main configuration for the agent.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub wallet: WalletConfig,
    pub gateway: GatewayConfig,
    pub agent: AgentConfig,
}

/// Which wallet backend a session runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletBackendKind {
    Simulated,
    Remote,
}

impl WalletBackendKind {
    fn parse(value: &str, key: &str) -> Result<Self, ConfigError> {
        match crate::settings::normalize_wallet_backend(value).as_deref() {
            Some("simulated") => Ok(Self::Simulated),
            Some("remote") => Ok(Self::Remote),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected 'simulated' or 'remote', got '{value}'"),
            }),
        }
    }
}

/// Resolved language model client configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub temperature: f32,
}

impl LlmConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let base_url = optional_env("LLM_BASE_URL")?
            .or_else(|| settings.llm.base_url.clone())
            .unwrap_or_else(|| "http://localhost:11434/v1".to_string());
        validate_http_url("LLM_BASE_URL", &base_url)?;

        let model = optional_env("LLM_MODEL")?
            .or_else(|| settings.llm.model.clone())
            .unwrap_or_else(|| "qwen2.5:14b".to_string());

        let temperature = optional_env("LLM_TEMPERATURE")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "LLM_TEMPERATURE".to_string(),
                message: format!("must be a number: {e}"),
            })?
            .or(settings.llm.temperature)
            .unwrap_or(0.2);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "LLM_TEMPERATURE".to_string(),
                message: format!("must be in [0, 2], got {temperature}"),
            });
        }

        Ok(Self {
            base_url,
            api_key: optional_env("LLM_API_KEY")?.map(SecretString::from),
            model,
            temperature,
        })
    }
}

/// Resolved wallet backend configuration.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub backend: WalletBackendKind,
    /// Network label for the simulated backend.
    pub network: String,
    /// Deterministic seed for the simulated backend.
    pub seed: String,
    /// Remote wallet service endpoint (required when backend = remote).
    pub service_url: Option<String>,
    pub service_token: Option<SecretString>,
}

impl WalletConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let backend = WalletBackendKind::parse(
            &optional_env("WALLET_BACKEND")?
                .or_else(|| settings.wallet.backend.clone())
                .unwrap_or_else(|| "simulated".to_string()),
            "WALLET_BACKEND",
        )?;

        let service_url = optional_env("WALLET_SERVICE_URL")?
            .or_else(|| settings.wallet.service_url.clone());
        if let Some(url) = &service_url {
            validate_http_url("WALLET_SERVICE_URL", url)?;
        }
        if backend == WalletBackendKind::Remote && service_url.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "WALLET_SERVICE_URL".to_string(),
                hint: "the 'remote' wallet backend needs the wallet service endpoint".to_string(),
            });
        }

        Ok(Self {
            backend,
            network: optional_env("WALLET_NETWORK")?
                .or_else(|| settings.wallet.network.clone())
                .unwrap_or_else(|| "base-sepolia".to_string()),
            seed: optional_env("WALLET_SEED")?
                .or_else(|| settings.wallet.seed.clone())
                .unwrap_or_else(|| "walletpilot-dev".to_string()),
            service_url,
            service_token: optional_env("WALLET_SERVICE_TOKEN")?.map(SecretString::from),
        })
    }
}

/// Resolved HTTP gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Bearer token required on `/api/*`; generated at startup when unset.
    pub auth_token: Option<SecretString>,
    pub chat_rate_limit: u64,
    pub chat_rate_window_secs: u64,
}

impl GatewayConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let host = optional_env("GATEWAY_HOST")?
            .or_else(|| settings.gateway.host.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let host: IpAddr = host.parse().map_err(|e| ConfigError::InvalidValue {
            key: "GATEWAY_HOST".to_string(),
            message: format!("must be an IP address: {e}"),
        })?;

        let port = optional_env("GATEWAY_PORT")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "GATEWAY_PORT".to_string(),
                message: format!("must be a port number: {e}"),
            })?
            .or(settings.gateway.port)
            .unwrap_or(8787);

        let chat_rate_limit = optional_env("GATEWAY_CHAT_RATE_LIMIT")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "GATEWAY_CHAT_RATE_LIMIT".to_string(),
                message: format!("must be a positive integer: {e}"),
            })?
            .or(settings.gateway.chat_rate_limit)
            .unwrap_or(30);
        if chat_rate_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "GATEWAY_CHAT_RATE_LIMIT".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        let chat_rate_window_secs = optional_env("GATEWAY_CHAT_RATE_WINDOW_SECS")?
            .map(|s| s.parse())
            .transpose()
            .map_err(|e| ConfigError::InvalidValue {
                key: "GATEWAY_CHAT_RATE_WINDOW_SECS".to_string(),
                message: format!("must be a positive integer: {e}"),
            })?
            .or(settings.gateway.chat_rate_window_secs)
            .unwrap_or(60);
        if chat_rate_window_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "GATEWAY_CHAT_RATE_WINDOW_SECS".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        Ok(Self {
            host,
            port,
            auth_token: optional_env("GATEWAY_AUTH_TOKEN")?.map(SecretString::from),
            chat_rate_limit,
            chat_rate_window_secs,
        })
    }
}

/// Resolved orchestration loop limits.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Upper bound on model/tool rounds per chat turn.
    pub max_rounds: usize,
    /// History length that triggers summarization.
    pub summarize_trigger: usize,
    /// Most recent messages kept verbatim through summarization.
    pub summarize_keep: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            summarize_trigger: 40,
            summarize_keep: 12,
        }
    }
}

impl AgentConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_rounds = parse_env_usize("AGENT_MAX_ROUNDS")?
            .or(settings.agent.max_rounds)
            .unwrap_or(defaults.max_rounds);
        if max_rounds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "AGENT_MAX_ROUNDS".to_string(),
                message: "must be > 0".to_string(),
            });
        }

        let summarize_trigger = parse_env_usize("AGENT_SUMMARIZE_TRIGGER")?
            .or(settings.agent.summarize_trigger)
            .unwrap_or(defaults.summarize_trigger);
        let summarize_keep = parse_env_usize("AGENT_SUMMARIZE_KEEP")?
            .or(settings.agent.summarize_keep)
            .unwrap_or(defaults.summarize_keep);
        if summarize_keep == 0 || summarize_keep >= summarize_trigger {
            return Err(ConfigError::InvalidValue {
                key: "AGENT_SUMMARIZE_KEEP".to_string(),
                message: format!(
                    "must be > 0 and smaller than the trigger ({summarize_trigger}), got {summarize_keep}"
                ),
            });
        }

        Ok(Self {
            max_rounds,
            summarize_trigger,
            summarize_keep,
        })
    }
}

impl Config {
    /// Load configuration from env vars and the default settings file.
    ///
    /// Loads both `./.env` (standard, higher priority) and
    /// `~/.walletpilot/.env` (lower priority) via dotenvy, which never
    /// overwrites existing vars.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        crate::bootstrap::load_walletpilot_env();
        Self::from_settings(&Settings::load())
    }

    /// Load with an explicit settings file; a missing file is fatal here,
    /// unlike the default path.
    pub fn load_with_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        crate::bootstrap::load_walletpilot_env();
        if !path.exists() {
            return Err(ConfigError::ParseError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let settings = Settings::load_from(path).map_err(ConfigError::ParseError)?;
        Self::from_settings(&settings)
    }

    /// Build config from already-loaded settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            llm: LlmConfig::resolve(settings)?,
            wallet: WalletConfig::resolve(settings)?,
            gateway: GatewayConfig::resolve(settings)?,
            agent: AgentConfig::resolve(settings)?,
        })
    }
}

/// Read an env var, treating unset and blank as absent.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid unicode".to_string(),
        }),
    }
}

fn parse_env_usize(key: &str) -> Result<Option<usize>, ConfigError> {
    optional_env(key)?
        .map(|s| s.parse())
        .transpose()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be a non-negative integer: {e}"),
        })
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("must be a URL: {e}"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must use http or https, got '{}'", parsed.scheme()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_config_env() {
        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            for key in [
                "LLM_BASE_URL",
                "LLM_MODEL",
                "LLM_TEMPERATURE",
                "LLM_API_KEY",
                "WALLET_BACKEND",
                "WALLET_NETWORK",
                "WALLET_SEED",
                "WALLET_SERVICE_URL",
                "WALLET_SERVICE_TOKEN",
                "GATEWAY_HOST",
                "GATEWAY_PORT",
                "GATEWAY_AUTH_TOKEN",
                "GATEWAY_CHAT_RATE_LIMIT",
                "GATEWAY_CHAT_RATE_WINDOW_SECS",
                "AGENT_MAX_ROUNDS",
                "AGENT_SUMMARIZE_TRIGGER",
                "AGENT_SUMMARIZE_KEEP",
            ] {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn resolvers_use_safe_defaults() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_config_env();

        let config = Config::from_settings(&Settings::default()).expect("resolve");
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.wallet.backend, WalletBackendKind::Simulated);
        assert_eq!(config.wallet.network, "base-sepolia");
        assert_eq!(config.gateway.bind_addr().to_string(), "127.0.0.1:8787");
        assert_eq!(config.agent.max_rounds, 5);
        assert_eq!(config.agent.summarize_trigger, 40);
        assert_eq!(config.agent.summarize_keep, 12);
    }

    #[test]
    fn env_overrides_settings() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_config_env();

        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::set_var("LLM_MODEL", "env-model");
            std::env::set_var("AGENT_MAX_ROUNDS", "3");
        }

        let mut settings = Settings::default();
        settings.llm.model = Some("file-model".to_string());
        settings.agent.max_rounds = Some(9);
        settings.gateway.port = Some(9090);

        let config = Config::from_settings(&settings).expect("resolve");
        assert_eq!(config.llm.model, "env-model");
        assert_eq!(config.agent.max_rounds, 3);
        assert_eq!(config.gateway.port, 9090);

        clear_config_env();
    }

    #[test]
    fn remote_backend_requires_service_url() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_config_env();

        let mut settings = Settings::default();
        settings.wallet.backend = Some("remote".to_string());
        let err = WalletConfig::resolve(&settings).unwrap_err();
        match err {
            ConfigError::MissingRequired { key, .. } => assert_eq!(key, "WALLET_SERVICE_URL"),
            other => panic!("unexpected error: {other}"),
        }

        settings.wallet.service_url = Some("https://wallet.example".to_string());
        let config = WalletConfig::resolve(&settings).expect("resolve");
        assert_eq!(config.backend, WalletBackendKind::Remote);
    }

    #[test]
    fn rejects_non_http_urls() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_config_env();

        let mut settings = Settings::default();
        settings.llm.base_url = Some("ftp://models.example".to_string());
        let err = LlmConfig::resolve(&settings).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "LLM_BASE_URL"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_keep_not_smaller_than_trigger() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_config_env();

        let mut settings = Settings::default();
        settings.agent.summarize_trigger = Some(10);
        settings.agent.summarize_keep = Some(10);
        let err = AgentConfig::resolve(&settings).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "AGENT_SUMMARIZE_KEEP"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_invalid_temperature() {
        let _guard = ENV_MUTEX.lock().expect("env mutex poisoned");
        clear_config_env();

        // SAFETY: Guarded by ENV_MUTEX in tests.
        unsafe {
            std::env::set_var("LLM_TEMPERATURE", "3.5");
        }
        let err = LlmConfig::resolve(&Settings::default()).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "LLM_TEMPERATURE"),
            other => panic!("unexpected error: {other}"),
        }
        clear_config_env();
    }
}
