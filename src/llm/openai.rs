//! OpenAI-compatible chat-completions client.
//!
//! Works against any endpoint speaking the `/chat/completions` wire format
//! (hosted OpenAI-style gateways, Ollama's `/v1` surface, vLLM, etc.). Tool
//! use goes through the standard `tools` / `tool_calls` fields; the model's
//! JSON-string arguments are parsed into structured values here so the rest
//! of the crate never touches the wire encoding.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatRole, LlmClient, ModelReply, ToolDescriptor, ToolInvocation};
use crate::error::LlmError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    provider: String,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<SecretString>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            provider: provider.into(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            temperature,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Probe the endpoint by listing models. Used by `doctor`.
    pub async fn probe(&self) -> Result<(), LlmError> {
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        let mut req = self.http.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }
        let resp = req.send().await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::RequestFailed {
                provider: self.provider.clone(),
                reason: format!("probe returned HTTP {}", resp.status()),
            })
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatibleClient {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<ModelReply, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: tools.iter().map(WireTool::from).collect(),
            temperature: self.temperature,
        };

        let mut req = self.http.post(self.completions_url()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key.expose_secret());
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailed {
                provider: self.provider.clone(),
            });
        }
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: self.provider.clone(),
                reason: format!("HTTP {}: {}", status, truncate(&detail, 300)),
            });
        }

        let parsed: ChatCompletionResponse = resp.json().await?;
        reply_from_response(&self.provider, parsed)
    }
}

fn reply_from_response(
    provider: &str,
    response: ChatCompletionResponse,
) -> Result<ModelReply, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: "response contained no choices".to_string(),
        })?;

    let content = choice.message.content.unwrap_or_default();
    let invocations = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            let arguments = match serde_json::from_str(&call.function.arguments) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(
                        tool = %call.function.name,
                        "unparseable tool arguments from {}: {}",
                        provider,
                        e
                    );
                    serde_json::json!({})
                }
            };
            ToolInvocation::new(call.function.name, arguments)
        })
        .collect();

    Ok(ModelReply::from_parts(content, invocations))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// --- Wire types ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        let role = match msg.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        Self {
            role,
            content: &msg.content,
        }
    }
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction<'a>,
}

impl<'a> From<&'a ToolDescriptor> for WireTool<'a> {
    fn from(tool: &'a ToolDescriptor) -> Self {
        Self {
            kind: "function",
            function: WireFunction {
                name: &tool.name,
                description: &tool.description,
                parameters: &tool.parameters,
            },
        }
    }
}

#[derive(Serialize)]
struct WireFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Default)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    function: WireCallFunction,
}

#[derive(Deserialize)]
struct WireCallFunction {
    name: String,
    arguments: String,
}
