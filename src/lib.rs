//! # toolbridge - tool discovery and dispatch
//!
//! Exposes named tools with structured argument schemas over a small framed
//! protocol, finds which tool server is running, and drives an agent session
//! that calls those tools while producing an answer:
//! - Tool registry with schema validation and default filling
//! - Endpoint transport over TCP (host/port + path) or a stdin/stdout pipe
//! - Server discovery across ordered candidate endpoints
//! - Tool client exposing remote tools through the same `Tool` trait
//! - Agent session loop streaming tool-call events to an observer
//! - Generic query tools over a SQLite people store
//!
//! ## Architecture
//!
//! ```text
//!   discover ──► ToolClient ──► AgentSession ──► Reasoner (Ollama)
//!                    │               │
//!                    │          AgentEvent ──► observer
//!                    ▼
//!   ═══════ framed JSON over TCP / pipe ═══════
//!                    │
//!                    ▼
//!   IpcServer ──► router ──► ToolRegistry ──► query / news tools
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod agent;
pub mod client;
pub mod events;
pub mod ipc;
pub mod tools;
pub mod types;

// Internal utilities
pub mod observability;

pub use types::{Config, Error, Result};
