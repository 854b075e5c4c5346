//! Fund-moving wallet operations.
//!
//! Everything in this module is gated behind human confirmation by its
//! category; the orchestrator freezes these invocations as a pending
//! transaction instead of executing them directly.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::{ToolCategory, WalletTool, map_wallet_err, parse_params};
use crate::error::ToolError;
use crate::wallet::{WalletBackend, format_native, format_token};

/// Upper bound on accepted slippage: 50%.
const MAX_SLIPPAGE_BPS: u32 = 5_000;

fn default_slippage_bps() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
struct NativeTransferParams {
    to: String,
    amount: Decimal,
}

pub struct NativeTransferTool {
    wallet: Arc<dyn WalletBackend>,
}

impl NativeTransferTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletTool for NativeTransferTool {
    fn name(&self) -> &str {
        "native_transfer"
    }

    fn description(&self) -> &str {
        "Send native ETH from the wallet to another address."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Transfer
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "string",
                    "description": "Recipient address (0x-prefixed hex)"
                },
                "amount": {
                    "type": "string",
                    "description": "Amount of ETH to send, as a decimal string (e.g. \"0.01\")"
                }
            },
            "required": ["to", "amount"]
        })
    }

    fn consumes_native(&self, _args: &serde_json::Value) -> bool {
        true
    }

    async fn execute(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let params: NativeTransferParams = parse_params(self.name(), args)?;
        let receipt = self
            .wallet
            .transfer_native(&params.to, params.amount)
            .await
            .map_err(|e| map_wallet_err(self.name(), e))?;
        Ok(json!({
            "status": "submitted",
            "tx_hash": receipt.tx_hash,
            "to": params.to,
            "amount": format_native(params.amount),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct TokenTransferParams {
    token: String,
    to: String,
    amount: Decimal,
}

pub struct TokenTransferTool {
    wallet: Arc<dyn WalletBackend>,
}

impl TokenTransferTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletTool for TokenTransferTool {
    fn name(&self) -> &str {
        "token_transfer"
    }

    fn description(&self) -> &str {
        "Send an ERC-20 token from the wallet to another address."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Transfer
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "token": {
                    "type": "string",
                    "description": "Token symbol, e.g. USDC or WETH"
                },
                "to": {
                    "type": "string",
                    "description": "Recipient address (0x-prefixed hex)"
                },
                "amount": {
                    "type": "string",
                    "description": "Amount to send, as a decimal string"
                }
            },
            "required": ["token", "to", "amount"]
        })
    }

    async fn execute(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let params: TokenTransferParams = parse_params(self.name(), args)?;
        let symbol = params.token.trim().to_uppercase();
        let receipt = self
            .wallet
            .transfer_token(&symbol, &params.to, params.amount)
            .await
            .map_err(|e| map_wallet_err(self.name(), e))?;
        Ok(json!({
            "status": "submitted",
            "tx_hash": receipt.tx_hash,
            "token": symbol,
            "to": params.to,
            "amount": format_token(params.amount, &symbol),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct SwapParams {
    from_token: String,
    to_token: String,
    amount: Decimal,
    #[serde(default = "default_slippage_bps")]
    slippage_bps: u32,
}

pub struct SwapTool {
    wallet: Arc<dyn WalletBackend>,
}

impl SwapTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletTool for SwapTool {
    fn name(&self) -> &str {
        "swap_tokens"
    }

    fn description(&self) -> &str {
        "Swap one token for another at the current market rate."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Swap
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "from_token": {
                    "type": "string",
                    "description": "Token to sell, e.g. ETH or USDC"
                },
                "to_token": {
                    "type": "string",
                    "description": "Token to buy"
                },
                "amount": {
                    "type": "string",
                    "description": "Amount of from_token to sell, as a decimal string"
                },
                "slippage_bps": {
                    "type": "integer",
                    "description": "Maximum slippage in basis points (default 100 = 1%)"
                }
            },
            "required": ["from_token", "to_token", "amount"]
        })
    }

    fn consumes_native(&self, args: &serde_json::Value) -> bool {
        args.get("from_token")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(crate::wallet::NATIVE_SYMBOL))
    }

    async fn execute(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let params: SwapParams = parse_params(self.name(), args)?;
        if params.slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(ToolError::InvalidParameters {
                name: self.name().to_string(),
                reason: format!(
                    "slippage_bps {} exceeds maximum {}",
                    params.slippage_bps, MAX_SLIPPAGE_BPS
                ),
            });
        }
        let from = params.from_token.trim().to_uppercase();
        let to = params.to_token.trim().to_uppercase();
        if from == to {
            return Err(ToolError::InvalidParameters {
                name: self.name().to_string(),
                reason: "from_token and to_token are the same".to_string(),
            });
        }
        let receipt = self
            .wallet
            .swap(&from, &to, params.amount, params.slippage_bps)
            .await
            .map_err(|e| map_wallet_err(self.name(), e))?;
        Ok(json!({
            "status": "submitted",
            "tx_hash": receipt.tx_hash,
            "sold": format_token(receipt.amount_in, &receipt.from_token),
            "bought": format_token(receipt.amount_out, &receipt.to_token),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct AmountParams {
    amount: Decimal,
}

fn amount_schema(description: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "amount": {
                "type": "string",
                "description": description
            }
        },
        "required": ["amount"]
    })
}

pub struct WrapTool {
    wallet: Arc<dyn WalletBackend>,
}

impl WrapTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletTool for WrapTool {
    fn name(&self) -> &str {
        "wrap_eth"
    }

    fn description(&self) -> &str {
        "Wrap native ETH into WETH."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::WrapUnwrap
    }

    fn parameters_schema(&self) -> serde_json::Value {
        amount_schema("Amount of ETH to wrap, as a decimal string")
    }

    fn consumes_native(&self, _args: &serde_json::Value) -> bool {
        true
    }

    async fn execute(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let params: AmountParams = parse_params(self.name(), args)?;
        let receipt = self
            .wallet
            .wrap(params.amount)
            .await
            .map_err(|e| map_wallet_err(self.name(), e))?;
        Ok(json!({
            "status": "submitted",
            "tx_hash": receipt.tx_hash,
            "wrapped": format_native(params.amount),
        }))
    }
}

pub struct UnwrapTool {
    wallet: Arc<dyn WalletBackend>,
}

impl UnwrapTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletTool for UnwrapTool {
    fn name(&self) -> &str {
        "unwrap_eth"
    }

    fn description(&self) -> &str {
        "Unwrap WETH back into native ETH."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::WrapUnwrap
    }

    fn parameters_schema(&self) -> serde_json::Value {
        amount_schema("Amount of WETH to unwrap, as a decimal string")
    }

    async fn execute(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let params: AmountParams = parse_params(self.name(), args)?;
        let receipt = self
            .wallet
            .unwrap(params.amount)
            .await
            .map_err(|e| map_wallet_err(self.name(), e))?;
        Ok(json!({
            "status": "submitted",
            "tx_hash": receipt.tx_hash,
            "unwrapped": format!("{:.4} WETH", params.amount),
        }))
    }
}
