//! Reasoning capability: given instructions, conversation history and the
//! available tools, decide the next step.

use crate::tools::ToolDescriptor;
use crate::types::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A request to run a named tool with JSON arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallIntent {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One entry of a session's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Set on assistant entries that requested a tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallIntent>,
    /// Set on tool entries: which tool produced `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call: None,
            tool_name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call: None,
            tool_name: None,
        }
    }

    pub fn assistant_tool_call(intent: ToolCallIntent) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_call: Some(intent),
            tool_name: None,
        }
    }

    pub fn tool_result(tool: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call: None,
            tool_name: Some(tool.into()),
        }
    }
}

/// Everything the reasoner sees for one step.
#[derive(Debug, Clone, Copy)]
pub struct ReasoningRequest<'a> {
    pub preamble: &'a str,
    pub history: &'a [ChatMessage],
    pub tools: &'a [ToolDescriptor],
}

/// What the reasoner decided.
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningStep {
    ToolCall(ToolCallIntent),
    Final(String),
}

#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn next_step(&self, request: ReasoningRequest<'_>) -> Result<ReasoningStep>;
}
