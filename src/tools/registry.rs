//! Tool registry: ordered name → (descriptor, handler) mapping.
//!
//! Built once before an endpoint starts serving and shared read-only behind an
//! `Arc` afterwards. Arguments are validated against the published schema
//! before any handler runs.

use crate::tools::schema::ToolDescriptor;
use crate::types::{Error, Result, ToolName};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Capability interface implemented by every tool, local or remote.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Published contract of this tool.
    fn describe(&self) -> ToolDescriptor;

    /// Run the tool. Arguments have already been validated when called
    /// through a [`ToolRegistry`].
    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value>;
}

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handler: Arc<dyn Tool>,
}

/// Ordered tool registry. Insertion order is listing order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.descriptor.name.as_str()).collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under the name from its descriptor.
    ///
    /// The descriptor is captured here; later changes to what the tool would
    /// describe are not observed.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        self.register_arc(Arc::new(tool))
    }

    /// Register an already shared handler.
    pub fn register_arc(&mut self, handler: Arc<dyn Tool>) -> Result<()> {
        let descriptor = handler.describe();
        let name = ToolName::parse(descriptor.name.clone()).map_err(Error::validation)?;
        if self.index.contains_key(name.as_str()) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        tracing::debug!(tool = %name, params = descriptor.input_schema.len(), "Registered tool");
        self.index.insert(name.to_string(), self.tools.len());
        self.tools.push(RegisteredTool { descriptor, handler });
        Ok(())
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    /// Get a descriptor by name.
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i].descriptor)
    }

    /// Validate arguments, fill defaults, then forward to the handler.
    ///
    /// `null` arguments are treated as an empty object. The handler's own
    /// result or error is returned unchanged.
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<Value> {
        let entry = self
            .index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| Error::unknown_tool(format!("Unknown tool: {}", name)))?;

        let mut arguments = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(Error::invalid_arguments(format!(
                    "Arguments for {} must be a JSON object, got {}",
                    name, other
                )))
            }
        };

        let errors = entry.descriptor.validate_arguments(&arguments);
        if !errors.is_empty() {
            return Err(Error::invalid_arguments(format!(
                "{}: {}",
                name,
                errors.join("; ")
            )));
        }
        entry.descriptor.fill_defaults(&mut arguments);

        entry.handler.invoke(arguments).await
    }

    /// Generate formatted prompt section for LLM consumption.
    pub fn generate_prompt(&self) -> String {
        if self.tools.is_empty() {
            return String::new();
        }

        let mut lines = Vec::with_capacity(self.tools.len() + 1);
        lines.push("Available tools:".to_string());
        for tool in &self.tools {
            lines.push(tool.descriptor.to_prompt_line());
        }
        lines.join("\n")
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
