//! Console rendering of agent events.

use crate::events::AgentEvent;
use serde_json::Value;

/// One human-readable line per event.
///
///   ToolCall   → `Calling tool {tool} with kwargs {arguments}`
///   ToolResult → `Tool {tool} returned {output}` (or `failed with` on error)
pub fn render_event(event: &AgentEvent) -> String {
    match event {
        AgentEvent::ToolCall {
            tool, arguments, ..
        } => format!("Calling tool {} with kwargs {}", tool, render_value(arguments)),
        AgentEvent::ToolResult {
            tool,
            output,
            is_error: false,
            ..
        } => format!("Tool {} returned {}", tool, render_value(output)),
        AgentEvent::ToolResult { tool, output, .. } => {
            format!("Tool {} failed with {}", tool, render_value(output))
        }
    }
}

/// Strings print bare; everything else prints as compact JSON.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}
