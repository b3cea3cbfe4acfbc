//! Ollama-backed reasoner over the `/api/chat` endpoint.

use crate::agent::reasoning::{
    ChatMessage, Reasoner, ReasoningRequest, ReasoningStep, Role, ToolCallIntent,
};
use crate::tools::ToolDescriptor;
use crate::types::{AgentConfig, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OllamaReasoner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaReasoner {
    pub fn new(model: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let base = base_url.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::validation(
                "Ollama base URL must start with http:// or https://",
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", base),
            model: model.into(),
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(&config.model, &config.ollama_url, config.reasoning_timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &ReasoningRequest<'_>) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        if !request.preamble.is_empty() {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: request.preamble.to_string(),
                tool_calls: Vec::new(),
            });
        }
        messages.extend(request.history.iter().map(map_message));

        ChatRequest {
            model: self.model.clone(),
            stream: false,
            messages,
            tools: request.tools.iter().map(map_tool).collect(),
        }
    }
}

#[async_trait]
impl Reasoner for OllamaReasoner {
    async fn next_step(&self, request: ReasoningRequest<'_>) -> Result<ReasoningStep> {
        let payload = self.build_request(&request);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::reasoning(format!("Ollama request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(Error::reasoning(format!(
                "Ollama returned {}: {}",
                status, reason
            )));
        }

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::reasoning(format!("failed to decode Ollama response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(Error::reasoning(error));
        }

        let message = response
            .message
            .ok_or_else(|| Error::reasoning("Ollama response has no message"))?;

        Ok(step_from_message(message))
    }
}

/// Calls are dispatched one at a time: the first tool call wins and any
/// others in the same reply are dropped.
fn step_from_message(message: WireMessage) -> ReasoningStep {
    let extra = message.tool_calls.len().saturating_sub(1);
    match message.tool_calls.into_iter().next() {
        Some(call) => {
            if extra > 0 {
                tracing::warn!(
                    tool = %call.function.name,
                    dropped = extra,
                    "Model returned several tool calls, dispatching only the first"
                );
            }
            ReasoningStep::ToolCall(ToolCallIntent {
                name: call.function.name,
                arguments: normalize_arguments(call.function.arguments),
            })
        }
        None => ReasoningStep::Final(message.content),
    }
}

/// Some models return arguments as a JSON-encoded string.
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        other => other,
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    stream: bool,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    error: Option<String>,
}

fn map_message(message: &ChatMessage) -> WireMessage {
    let role = match message.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let tool_calls = message
        .tool_call
        .iter()
        .map(|intent| WireToolCall {
            function: WireFunctionCall {
                name: intent.name.clone(),
                arguments: intent.arguments.clone(),
            },
        })
        .collect();
    WireMessage {
        role: role.to_string(),
        content: message.content.clone(),
        tool_calls,
    }
}

fn map_tool(descriptor: &ToolDescriptor) -> WireTool {
    WireTool {
        kind: "function",
        function: WireFunction {
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            parameters: descriptor.to_json_schema(),
        },
    }
}
