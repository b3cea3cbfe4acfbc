//! Agent side: reasoning capability, sessions, server profiles and the
//! interactive loop.

pub mod ollama;
pub mod profiles;
pub mod reasoning;
pub mod repl;
pub mod session;

pub use ollama::OllamaReasoner;
pub use profiles::{default_profiles, ServerProfile, ToolSetKind};
pub use reasoning::{
    ChatMessage, Reasoner, ReasoningRequest, ReasoningStep, Role, ToolCallIntent,
};
pub use repl::run_repl;
pub use session::{AgentContext, AgentSession, SessionState};
