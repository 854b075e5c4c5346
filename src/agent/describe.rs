//! Human-readable descriptions for pending transactions.
//!
//! The rendered block is advisory: it names the operation, the argument
//! fields that matter for its class, and for native-spending operations a
//! live balance line with an insufficiency warning. It never blocks
//! confirmation and never fails; unreadable arguments just drop their line.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::tools::{ToolCategory, WalletTool};
use crate::wallet::{NATIVE_SYMBOL, WRAPPED_NATIVE_SYMBOL, WalletBackend, format_native};

/// Render the confirmation block for one frozen invocation.
pub(crate) async fn describe_transaction(
    tool: &dyn WalletTool,
    args: &Value,
    wallet: &dyn WalletBackend,
) -> String {
    let mut lines = vec![
        format!("Please confirm this {}:", tool.category().label()),
        format!("  Operation: {}", tool.name()),
    ];

    match tool.category() {
        ToolCategory::Transfer => {
            let symbol = string_arg(args, "token")
                .map(|t| t.to_uppercase())
                .unwrap_or_else(|| NATIVE_SYMBOL.to_string());
            if string_arg(args, "token").is_some() {
                lines.push(format!("  Token: {}", symbol));
            }
            if let Some(amount) = raw_arg(args, "amount") {
                lines.push(format!("  Amount: {} {}", amount, symbol));
            }
            if let Some(to) = string_arg(args, "to") {
                lines.push(format!("  Recipient: {}", to));
            }
        }
        ToolCategory::Swap => {
            let from = string_arg(args, "from_token").map(|t| t.to_uppercase());
            if let Some(ref from) = from {
                lines.push(format!("  From: {}", from));
            }
            if let Some(to) = string_arg(args, "to_token") {
                lines.push(format!("  To: {}", to.to_uppercase()));
            }
            if let Some(amount) = raw_arg(args, "amount") {
                match from {
                    Some(from) => lines.push(format!("  Amount: {} {}", amount, from)),
                    None => lines.push(format!("  Amount: {}", amount)),
                }
            }
            if let Some(bps) = args.get("slippage_bps").and_then(Value::as_u64) {
                let pct = Decimal::from(bps) / dec!(100);
                lines.push(format!("  Max slippage: {:.2}%", pct));
            }
        }
        ToolCategory::WrapUnwrap => {
            let symbol = if tool.consumes_native(args) {
                NATIVE_SYMBOL
            } else {
                WRAPPED_NATIVE_SYMBOL
            };
            if let Some(amount) = raw_arg(args, "amount") {
                lines.push(format!("  Amount: {} {}", amount, symbol));
            }
        }
        ToolCategory::Query => {
            if let Some(map) = args.as_object() {
                for (key, value) in map {
                    lines.push(format!("  {}: {}", key, display_value(value)));
                }
            }
        }
    }

    if tool.consumes_native(args) {
        match wallet.native_balance().await {
            Ok(balance) => {
                lines.push(format!("  Current balance: {}", format_native(balance)));
                if let Some(amount) = decimal_arg(args, "amount")
                    && amount > balance
                {
                    lines.push(format!(
                        "  Warning: the requested amount ({} {}) exceeds your current balance.",
                        amount, NATIVE_SYMBOL
                    ));
                }
            }
            Err(e) => {
                tracing::debug!("skipping balance line in confirmation prompt: {}", e);
            }
        }
    }

    lines.join("\n")
}

fn string_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The argument as the model wrote it, for display.
fn raw_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).map(display_value)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decimal_arg(args: &Value, key: &str) -> Option<Decimal> {
    match args.get(key)? {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => n.as_f64().and_then(|f| Decimal::try_from(f).ok()),
        _ => None,
    }
}
