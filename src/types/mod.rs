//! Core types for toolbridge.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (RequestId, SessionId, CallId, ToolName)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for servers, clients, and agents

mod config;
mod errors;
mod ids;

pub use config::{
    AgentConfig, ClientConfig, Config, IpcConfig, ObservabilityConfig, ServerConfig,
    TransportKind,
};
pub use errors::{Error, Result};
pub use ids::{CallId, RequestId, SessionId, ToolName};
