//! Read-only wallet operations.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{ToolCategory, WalletTool, map_wallet_err, parse_params};
use crate::error::ToolError;
use crate::wallet::{WalletBackend, format_native, format_token};

fn empty_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

pub struct GetAddressTool {
    wallet: Arc<dyn WalletBackend>,
}

impl GetAddressTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletTool for GetAddressTool {
    fn name(&self) -> &str {
        "get_address"
    }

    fn description(&self) -> &str {
        "Get the wallet's onchain address and network."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Query
    }

    fn parameters_schema(&self) -> serde_json::Value {
        empty_schema()
    }

    async fn execute(&self, _args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        Ok(json!({
            "address": self.wallet.address(),
            "network": self.wallet.network(),
        }))
    }
}

pub struct GetBalanceTool {
    wallet: Arc<dyn WalletBackend>,
}

impl GetBalanceTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletTool for GetBalanceTool {
    fn name(&self) -> &str {
        "get_balance"
    }

    fn description(&self) -> &str {
        "Get the wallet's native ETH balance."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Query
    }

    fn parameters_schema(&self) -> serde_json::Value {
        empty_schema()
    }

    async fn execute(&self, _args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let balance = self
            .wallet
            .native_balance()
            .await
            .map_err(|e| map_wallet_err(self.name(), e))?;
        Ok(json!({
            "address": self.wallet.address(),
            "balance": format_native(balance),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct TokenBalanceParams {
    token: String,
}

pub struct GetTokenBalanceTool {
    wallet: Arc<dyn WalletBackend>,
}

impl GetTokenBalanceTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletTool for GetTokenBalanceTool {
    fn name(&self) -> &str {
        "get_token_balance"
    }

    fn description(&self) -> &str {
        "Get the wallet's balance of a specific token (e.g. USDC, WETH)."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Query
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "token": {
                    "type": "string",
                    "description": "Token symbol, e.g. USDC or WETH"
                }
            },
            "required": ["token"]
        })
    }

    async fn execute(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let params: TokenBalanceParams = parse_params(self.name(), args)?;
        let symbol = params.token.trim().to_uppercase();
        let balance = self
            .wallet
            .token_balance(&symbol)
            .await
            .map_err(|e| map_wallet_err(self.name(), e))?;
        Ok(json!({
            "token": balance.symbol,
            "balance": format_token(balance.balance, &balance.symbol),
        }))
    }
}

pub struct GetWalletInfoTool {
    wallet: Arc<dyn WalletBackend>,
}

impl GetWalletInfoTool {
    pub fn new(wallet: Arc<dyn WalletBackend>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl WalletTool for GetWalletInfoTool {
    fn name(&self) -> &str {
        "get_wallet_info"
    }

    fn description(&self) -> &str {
        "Get the wallet's address, network, and native balance in one call."
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Query
    }

    fn parameters_schema(&self) -> serde_json::Value {
        empty_schema()
    }

    async fn execute(&self, _args: &serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let info = self
            .wallet
            .wallet_info()
            .await
            .map_err(|e| map_wallet_err(self.name(), e))?;
        Ok(json!({
            "address": info.address,
            "network": info.network,
            "balance": format_native(info.balance),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::simulated::SimulatedWallet;
    use serde_json::json;

    fn wallet() -> Arc<dyn WalletBackend> {
        Arc::new(SimulatedWallet::new("queries", "base-sepolia"))
    }

    #[tokio::test]
    async fn get_balance_formats_four_places() {
        let tool = GetBalanceTool::new(wallet());
        let result = tool.execute(&json!({})).await.unwrap();
        assert_eq!(result["balance"], "10.0000 ETH");
    }

    #[tokio::test]
    async fn get_token_balance_normalizes_symbol() {
        let tool = GetTokenBalanceTool::new(wallet());
        let result = tool.execute(&json!({"token": "usdc"})).await.unwrap();
        assert_eq!(result["token"], "USDC");
        assert_eq!(result["balance"], "2500.0000 USDC");
    }

    #[tokio::test]
    async fn get_token_balance_requires_token_param() {
        let tool = GetTokenBalanceTool::new(wallet());
        let err = tool.execute(&json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));
    }

    #[tokio::test]
    async fn get_wallet_info_includes_identity() {
        let tool = GetWalletInfoTool::new(wallet());
        let result = tool.execute(&json!({})).await.unwrap();
        assert_eq!(result["network"], "base-sepolia");
        assert!(result["address"].as_str().unwrap().starts_with("0x"));
    }
}
