//! Method router: dispatches decoded requests against the shared registry.

use crate::ipc::protocol::{
    parse_params, CallToolParams, CallToolResult, InitializeParams, InitializeResult,
    ListToolsResult, METHOD_CALL_TOOL, METHOD_INITIALIZE, METHOD_LIST_TOOLS, PROTOCOL_VERSION,
};
use crate::tools::ToolRegistry;
use crate::types::{Error, Result, ServerConfig, TransportKind};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Read-only state shared by every connection of one endpoint.
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub registry: Arc<ToolRegistry>,
    pub name: String,
    /// Path a client must present in `initialize`. `None` accepts any path.
    pub path: Option<String>,
    pub request_timeout: Duration,
}

impl ServerContext {
    pub fn new(registry: Arc<ToolRegistry>, config: &ServerConfig) -> Self {
        let path = match config.transport {
            TransportKind::Stream => Some(config.path.clone()),
            TransportKind::Stdio => None,
        };
        Self {
            registry,
            name: config.name.clone(),
            path,
            request_timeout: config.request_timeout,
        }
    }
}

/// Per-connection handshake state.
#[derive(Debug, Default)]
pub struct ConnectionState {
    initialized: bool,
}

impl ConnectionState {
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// Route one request to its method handler.
pub async fn route_request(
    ctx: &ServerContext,
    state: &mut ConnectionState,
    method: &str,
    params: Value,
) -> Result<Value> {
    if method == METHOD_INITIALIZE {
        return handle_initialize(ctx, state, params);
    }
    if !state.initialized {
        return Err(Error::failed_precondition(format!(
            "{} called before initialize",
            method
        )));
    }

    match method {
        METHOD_LIST_TOOLS => {
            let result = ListToolsResult {
                tools: ctx.registry.list(),
            };
            Ok(serde_json::to_value(result)?)
        }
        METHOD_CALL_TOOL => handle_call(ctx, params).await,
        _ => Err(Error::not_found(format!("Unknown method: {}", method))),
    }
}

fn handle_initialize(
    ctx: &ServerContext,
    state: &mut ConnectionState,
    params: Value,
) -> Result<Value> {
    let params: InitializeParams = parse_params(METHOD_INITIALIZE, params)?;

    if let Some(expected) = &ctx.path {
        let requested = params.path.as_deref().unwrap_or(expected.as_str());
        if requested != expected {
            return Err(Error::not_found(format!("No endpoint at path {}", requested)));
        }
    }

    state.initialized = true;
    tracing::debug!(client = ?params.client, "Client initialized");

    let result = InitializeResult {
        server: ctx.name.clone(),
        version: PROTOCOL_VERSION.to_string(),
        tool_count: ctx.registry.len(),
    };
    Ok(serde_json::to_value(result)?)
}

async fn handle_call(ctx: &ServerContext, params: Value) -> Result<Value> {
    let CallToolParams { name, arguments } = parse_params(METHOD_CALL_TOOL, params)?;

    let started = std::time::Instant::now();
    let outcome = tokio::time::timeout(ctx.request_timeout, ctx.registry.invoke(&name, arguments))
        .await
        .map_err(|_| {
            Error::timeout(format!(
                "Tool {} exceeded {}s",
                name,
                ctx.request_timeout.as_secs_f64()
            ))
        })
        .and_then(|r| r);

    match &outcome {
        Ok(_) => tracing::debug!(tool = %name, elapsed_ms = started.elapsed().as_millis() as u64, "Tool call completed"),
        Err(e) => tracing::info!(tool = %name, code = e.to_ipc_error_code(), "Tool call failed: {}", e),
    }

    let result = CallToolResult { result: outcome? };
    Ok(serde_json::to_value(result)?)
}
