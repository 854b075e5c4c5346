//! Wallet backend abstraction.
//!
//! Every onchain capability the agent can exercise goes through
//! [`WalletBackend`]. The trait stays narrow: balances, native and
//! token transfers, swap, wrap/unwrap. Key custody and transaction signing
//! live behind the backend: the [`simulated`] backend keeps a deterministic
//! in-process ledger, the [`remote`] backend delegates to a wallet service
//! that holds the key.

pub mod remote;
pub mod simulated;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Symbol of the chain-native asset.
pub const NATIVE_SYMBOL: &str = "ETH";
/// Symbol of the wrapped native asset.
pub const WRAPPED_NATIVE_SYMBOL: &str = "WETH";

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static address pattern"));

/// Identity and funding snapshot for a connected wallet.
#[derive(Debug, Clone, Serialize)]
pub struct WalletInfo {
    pub address: String,
    pub network: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
}

impl WalletInfo {
    pub fn display_balance(&self) -> String {
        format_native(self.balance)
    }
}

/// Broadcast receipt for an executed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
}

/// Receipt for an executed swap, including both legs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapReceipt {
    pub tx_hash: String,
    pub from_token: String,
    pub to_token: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_in: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_out: Decimal,
}

/// Balance of a single token held by the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub balance: Decimal,
}

/// Onchain capability provider for one wallet.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    fn address(&self) -> &str;

    fn network(&self) -> &str;

    async fn native_balance(&self) -> Result<Decimal, WalletError>;

    async fn token_balance(&self, symbol: &str) -> Result<TokenBalance, WalletError>;

    async fn transfer_native(&self, to: &str, amount: Decimal) -> Result<TxReceipt, WalletError>;

    async fn transfer_token(
        &self,
        symbol: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<TxReceipt, WalletError>;

    async fn swap(
        &self,
        from_token: &str,
        to_token: &str,
        amount: Decimal,
        slippage_bps: u32,
    ) -> Result<SwapReceipt, WalletError>;

    async fn wrap(&self, amount: Decimal) -> Result<TxReceipt, WalletError>;

    async fn unwrap(&self, amount: Decimal) -> Result<TxReceipt, WalletError>;

    /// Identity plus current native balance in one call.
    async fn wallet_info(&self) -> Result<WalletInfo, WalletError> {
        Ok(WalletInfo {
            address: self.address().to_string(),
            network: self.network().to_string(),
            balance: self.native_balance().await?,
        })
    }
}

/// Render a native-asset amount as `"X.XXXX ETH"` (four decimal places).
pub fn format_native(amount: Decimal) -> String {
    format!("{:.4} {}", amount, NATIVE_SYMBOL)
}

/// Render a token amount with its symbol, four decimal places.
pub fn format_token(amount: Decimal, symbol: &str) -> String {
    format!("{:.4} {}", amount, symbol)
}

/// Validate a 20-byte hex address with `0x` prefix.
pub fn validate_address(address: &str) -> Result<(), WalletError> {
    if ADDRESS_RE.is_match(address) {
        Ok(())
    } else {
        Err(WalletError::InvalidAddress {
            address: address.to_string(),
        })
    }
}

/// Reject zero and negative amounts before they reach a backend.
pub fn ensure_positive(amount: Decimal) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount {
            reason: format!("amount must be positive, got {}", amount),
        });
    }
    Ok(())
}
