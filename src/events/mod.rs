//! Agent events: tool calls and their results, in dispatch order.
//!
//! A session emits `ToolCall` before dispatching and `ToolResult` once the
//! call resolves, so for any one call id the result always follows the call.

pub mod render;

pub use render::render_event;

use crate::types::CallId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    ToolCall {
        call_id: CallId,
        tool: String,
        arguments: Value,
        at: DateTime<Utc>,
    },
    ToolResult {
        call_id: CallId,
        tool: String,
        output: Value,
        is_error: bool,
        at: DateTime<Utc>,
    },
}

impl AgentEvent {
    pub fn tool_call(call_id: CallId, tool: impl Into<String>, arguments: Value) -> Self {
        AgentEvent::ToolCall {
            call_id,
            tool: tool.into(),
            arguments,
            at: Utc::now(),
        }
    }

    pub fn tool_result(
        call_id: CallId,
        tool: impl Into<String>,
        output: Value,
        is_error: bool,
    ) -> Self {
        AgentEvent::ToolResult {
            call_id,
            tool: tool.into(),
            output,
            is_error,
            at: Utc::now(),
        }
    }

    pub fn call_id(&self) -> &CallId {
        match self {
            AgentEvent::ToolCall { call_id, .. } | AgentEvent::ToolResult { call_id, .. } => call_id,
        }
    }

    pub fn tool(&self) -> &str {
        match self {
            AgentEvent::ToolCall { tool, .. } | AgentEvent::ToolResult { tool, .. } => tool,
        }
    }
}
