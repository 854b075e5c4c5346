//! Display formatting for tool results.
//!
//! Two heuristic safety nets around the model's own prose. `format_result`
//! compacts a raw invocation result into the fields worth showing, and
//! `synthesize_fallback` builds a deterministic user-facing message from the
//! audit records when the model fails to produce one. Neither function may
//! fail: malformed input always degrades to a plain string.

use serde_json::Value;

use crate::agent::conversation::ToolCallRecord;
use crate::tools::ToolCategory;

/// Longest raw-JSON fragment shown when no known field matches.
const RAW_CLIP: usize = 200;

/// Fields worth surfacing per operation class, in display order.
fn relevant_keys(category: ToolCategory) -> &'static [&'static str] {
    match category {
        ToolCategory::Query => &["token", "balance", "address", "network"],
        ToolCategory::Transfer => &["amount", "token", "to", "tx_hash"],
        ToolCategory::Swap => &["sold", "bought", "tx_hash"],
        ToolCategory::WrapUnwrap => &["wrapped", "unwrapped", "tx_hash"],
    }
}

/// Reduce a raw invocation result to a compact display string.
///
/// Strings pass through untouched. Objects keep only the fields relevant to
/// the operation class; anything else falls back to clipped compact JSON.
pub fn format_result(category: ToolCategory, raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let mut parts = Vec::new();
            for key in relevant_keys(category) {
                if let Some(value) = map.get(*key) {
                    parts.push(format!("{}: {}", key, display_value(value)));
                }
            }
            if parts.is_empty() {
                clip(&raw.to_string())
            } else {
                parts.join(", ")
            }
        }
        other => clip(&other.to_string()),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn clip(text: &str) -> String {
    if text.chars().count() <= RAW_CLIP {
        return text.to_string();
    }
    let clipped: String = text.chars().take(RAW_CLIP).collect();
    format!("{clipped}...")
}

/// Build a user-facing message from the audit records when the model did not
/// produce one. One templated sentence per record, joined by newlines.
pub fn synthesize_fallback(records: &[ToolCallRecord]) -> String {
    if records.is_empty() {
        return "I wasn't able to put together an answer for that. Could you rephrase?".to_string();
    }
    records
        .iter()
        .map(sentence_for)
        .collect::<Vec<_>>()
        .join("\n")
}

fn sentence_for(record: &ToolCallRecord) -> String {
    if record.is_failure() {
        let detail = record.result.trim_start_matches("Error:").trim();
        return format!(
            "The {} operation ran into a problem: {}",
            record.name.replace('_', " "),
            detail
        );
    }
    match record.category {
        Some(ToolCategory::Query) => format!("Here's what I found: {}", record.result),
        Some(ToolCategory::Transfer) => format!("Your transfer is done: {}", record.result),
        Some(ToolCategory::Swap) => format!("Your swap is done: {}", record.result),
        Some(ToolCategory::WrapUnwrap) => format!("Conversion finished: {}", record.result),
        None => record.result.clone(),
    }
}
