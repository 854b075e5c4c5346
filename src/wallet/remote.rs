//! HTTP wallet-service backend.
//!
//! Delegates every operation to an external wallet service that holds the
//! signing key. The service exposes a small JSON API; this client never sees
//! key material, only the resulting receipts.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{SwapReceipt, TokenBalance, TxReceipt, WalletBackend, ensure_positive, validate_address};
use crate::error::WalletError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RemoteWallet {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<SecretString>,
    address: String,
    network: String,
}

impl RemoteWallet {
    /// Connect to the wallet service and fetch the wallet identity.
    pub async fn connect(
        base_url: impl Into<String>,
        auth_token: Option<SecretString>,
    ) -> Result<Self, WalletError> {
        let base_url = base_url.into();
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        let mut wallet = Self {
            http,
            base_url,
            auth_token,
            address: String::new(),
            network: String::new(),
        };
        let identity: IdentityResponse = wallet.get("wallet").await?;
        wallet.address = identity.address;
        wallet.network = identity.network;
        Ok(wallet)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, WalletError> {
        let mut req = self.http.get(self.url(path));
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token.expose_secret());
        }
        let resp = req.send().await?;
        Self::decode(resp).await
    }

    async fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, WalletError> {
        let mut req = self.http.post(self.url(path)).json(body);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token.expose_secret());
        }
        let resp = req.send().await?;
        Self::decode(resp).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, WalletError> {
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(WalletError::ProviderFailed {
                reason: format!("HTTP {}: {}", status, detail.chars().take(300).collect::<String>()),
            });
        }
        resp.json::<T>().await.map_err(|e| WalletError::ProviderFailed {
            reason: format!("invalid response body: {}", e),
        })
    }
}

#[async_trait]
impl WalletBackend for RemoteWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn network(&self) -> &str {
        &self.network
    }

    async fn native_balance(&self) -> Result<Decimal, WalletError> {
        let resp: BalanceResponse = self.get("balance").await?;
        Ok(resp.balance)
    }

    async fn token_balance(&self, symbol: &str) -> Result<TokenBalance, WalletError> {
        let resp: BalanceResponse = self.get(&format!("balance?token={symbol}")).await?;
        Ok(TokenBalance {
            symbol: symbol.to_string(),
            balance: resp.balance,
        })
    }

    async fn transfer_native(&self, to: &str, amount: Decimal) -> Result<TxReceipt, WalletError> {
        validate_address(to)?;
        ensure_positive(amount)?;
        self.post(
            "transfer",
            &TransferRequest {
                to,
                amount,
                token: None,
            },
        )
        .await
    }

    async fn transfer_token(
        &self,
        symbol: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<TxReceipt, WalletError> {
        validate_address(to)?;
        ensure_positive(amount)?;
        self.post(
            "transfer",
            &TransferRequest {
                to,
                amount,
                token: Some(symbol),
            },
        )
        .await
    }

    async fn swap(
        &self,
        from_token: &str,
        to_token: &str,
        amount: Decimal,
        slippage_bps: u32,
    ) -> Result<SwapReceipt, WalletError> {
        ensure_positive(amount)?;
        self.post(
            "swap",
            &SwapRequest {
                from_token,
                to_token,
                amount,
                slippage_bps,
            },
        )
        .await
    }

    async fn wrap(&self, amount: Decimal) -> Result<TxReceipt, WalletError> {
        ensure_positive(amount)?;
        self.post("wrap", &AmountRequest { amount }).await
    }

    async fn unwrap(&self, amount: Decimal) -> Result<TxReceipt, WalletError> {
        ensure_positive(amount)?;
        self.post("unwrap", &AmountRequest { amount }).await
    }
}

// --- Wire types ---

#[derive(Deserialize)]
struct IdentityResponse {
    address: String,
    network: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::str")]
    balance: Decimal,
}

#[derive(Serialize)]
struct TransferRequest<'a> {
    to: &'a str,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

#[derive(Serialize)]
struct SwapRequest<'a> {
    from_token: &'a str,
    to_token: &'a str,
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
    slippage_bps: u32,
}

#[derive(Serialize)]
struct AmountRequest {
    #[serde(with = "rust_decimal::serde::str")]
    amount: Decimal,
}
