//! Wallet operation registry.
//!
//! Each operation the model can request is a [`WalletTool`]: a name, a JSON
//! parameter schema advertised to the model, and an async executor over the
//! wallet backend. Every tool declares a [`ToolCategory`] at registration;
//! whether an operation moves funds (and therefore needs human confirmation)
//! is read off that tag, never inferred from the operation's name.

pub mod queries;
pub mod transfers;

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ToolError, WalletError};
use crate::llm::ToolDescriptor;
use crate::wallet::WalletBackend;

/// Category assigned to every operation at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Query,
    Transfer,
    Swap,
    WrapUnwrap,
}

impl ToolCategory {
    /// Operations in every category except `Query` move funds and require
    /// confirmation before execution.
    pub fn moves_funds(&self) -> bool {
        !matches!(self, Self::Query)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Transfer => "transfer",
            Self::Swap => "swap",
            Self::WrapUnwrap => "wrap/unwrap",
        }
    }
}

/// One registered wallet operation.
#[async_trait]
pub trait WalletTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn category(&self) -> ToolCategory;

    /// JSON Schema for the operation's arguments.
    fn parameters_schema(&self) -> serde_json::Value;

    /// True when executing with these arguments would spend the native asset,
    /// so confirmation prompts show a live balance check.
    fn consumes_native(&self, _args: &serde_json::Value) -> bool {
        false
    }

    async fn execute(&self, args: &serde_json::Value) -> Result<serde_json::Value, ToolError>;
}

/// The fixed set of operations available to one session.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn WalletTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. A duplicate name replaces the earlier registration.
    pub fn register(&mut self, tool: Arc<dyn WalletTool>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            tracing::warn!("replacing registered tool '{}'", tool.name());
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn WalletTool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn category_of(&self, name: &str) -> Option<ToolCategory> {
        self.get(name).map(|t| t.category())
    }

    /// Descriptors advertised to the model, in registration order.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    pub async fn execute(
        &self,
        name: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;
        tool.execute(args).await
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the standard registry over one wallet backend.
pub fn default_registry(wallet: Arc<dyn WalletBackend>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(queries::GetAddressTool::new(Arc::clone(&wallet))));
    registry.register(Arc::new(queries::GetBalanceTool::new(Arc::clone(&wallet))));
    registry.register(Arc::new(queries::GetTokenBalanceTool::new(Arc::clone(
        &wallet,
    ))));
    registry.register(Arc::new(queries::GetWalletInfoTool::new(Arc::clone(
        &wallet,
    ))));
    registry.register(Arc::new(transfers::NativeTransferTool::new(Arc::clone(
        &wallet,
    ))));
    registry.register(Arc::new(transfers::TokenTransferTool::new(Arc::clone(
        &wallet,
    ))));
    registry.register(Arc::new(transfers::SwapTool::new(Arc::clone(&wallet))));
    registry.register(Arc::new(transfers::WrapTool::new(Arc::clone(&wallet))));
    registry.register(Arc::new(transfers::UnwrapTool::new(wallet)));
    registry
}

/// Deserialize tool arguments, mapping failures to `InvalidParameters`.
pub(crate) fn parse_params<T: DeserializeOwned>(
    name: &str,
    args: &serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::InvalidParameters {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// Map a wallet failure to the tool error surface: bad inputs are parameter
/// errors, everything else is an execution failure.
pub(crate) fn map_wallet_err(name: &str, err: WalletError) -> ToolError {
    match err {
        WalletError::InvalidAddress { .. }
        | WalletError::InvalidAmount { .. }
        | WalletError::UnknownToken { .. } => ToolError::InvalidParameters {
            name: name.to_string(),
            reason: err.to_string(),
        },
        other => ToolError::ExecutionFailed {
            name: name.to_string(),
            reason: other.to_string(),
        },
    }
}
