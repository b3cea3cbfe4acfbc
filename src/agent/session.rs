//! Agent session: a reasoner bound to a tool set and a preamble.
//!
//! State machine per submit:
//! ```text
//! Idle → AwaitingReasoning → (DispatchingTool → AwaitingReasoning)* → Idle
//! ```
//! Tool calls are dispatched one at a time. Failures the tool itself reports
//! (timeouts, bad arguments, store faults) go back to the reasoner as data;
//! anything else aborts the submit.

use crate::agent::reasoning::{ChatMessage, Reasoner, ReasoningRequest, ReasoningStep, ToolCallIntent};
use crate::events::AgentEvent;
use crate::tools::{Tool, ToolDescriptor};
use crate::types::{AgentConfig, CallId, Error, Result, SessionId};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Collaborators a session is built from.
#[derive(Clone)]
pub struct AgentContext {
    pub reasoner: Arc<dyn Reasoner>,
    pub config: AgentConfig,
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingReasoning,
    DispatchingTool,
}

pub struct AgentSession {
    id: SessionId,
    ctx: AgentContext,
    preamble: String,
    tools: Vec<Arc<dyn Tool>>,
    descriptors: Vec<ToolDescriptor>,
    history: Vec<ChatMessage>,
    state: SessionState,
    observer: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tools: Vec<&str> = self.descriptors.iter().map(|d| d.name.as_str()).collect();
        f.debug_struct("AgentSession")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("tools", &tools)
            .field("history_len", &self.history.len())
            .finish()
    }
}

impl AgentSession {
    pub fn new(ctx: AgentContext, preamble: impl Into<String>, tools: Vec<Arc<dyn Tool>>) -> Self {
        let descriptors = tools.iter().map(|t| t.describe()).collect();
        Self {
            id: SessionId::new(),
            ctx,
            preamble: preamble.into(),
            tools,
            descriptors,
            history: Vec::new(),
            state: SessionState::Idle,
            observer: None,
        }
    }

    /// Send tool events to `observer` as they happen.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Run one user turn to a final answer.
    ///
    /// History persists across submits. On error the session returns to
    /// `Idle` with the user message kept in history.
    pub async fn submit(&mut self, message: &str) -> Result<String> {
        let span = tracing::info_span!("session", id = %self.id);
        let result = self.run_turn(message).instrument(span).await;
        self.state = SessionState::Idle;
        result
    }

    async fn run_turn(&mut self, message: &str) -> Result<String> {
        self.history.push(ChatMessage::user(message));
        let mut tool_calls = 0u32;

        loop {
            self.state = SessionState::AwaitingReasoning;
            let step = self
                .ctx
                .reasoner
                .next_step(ReasoningRequest {
                    preamble: &self.preamble,
                    history: &self.history,
                    tools: &self.descriptors,
                })
                .await?;

            let intent = match step {
                ReasoningStep::Final(answer) => {
                    self.history.push(ChatMessage::assistant(answer.clone()));
                    tracing::debug!(tool_calls, "Turn complete");
                    return Ok(answer);
                }
                ReasoningStep::ToolCall(intent) => intent,
            };

            if tool_calls >= self.ctx.config.max_tool_calls {
                return Err(Error::quota_exceeded(format!(
                    "more than {} tool calls in one turn",
                    self.ctx.config.max_tool_calls
                )));
            }
            tool_calls += 1;

            self.state = SessionState::DispatchingTool;
            let output = self.dispatch(&intent).await?;
            let tool = intent.name.clone();
            self.history.push(ChatMessage::assistant_tool_call(intent));
            self.history.push(ChatMessage::tool_result(tool, output_text(&output)));
        }
    }

    /// Invoke one tool, emitting its call and result events.
    ///
    /// Returns the output to feed back, or the error that aborts the turn.
    async fn dispatch(&self, intent: &ToolCallIntent) -> Result<Value> {
        let call_id = CallId::new();
        self.emit(AgentEvent::tool_call(
            call_id.clone(),
            &intent.name,
            intent.arguments.clone(),
        ));

        let outcome = self.invoke(intent).await;
        match outcome {
            Ok(output) => {
                self.emit(AgentEvent::tool_result(call_id, &intent.name, output.clone(), false));
                Ok(output)
            }
            Err(e) if e.is_tool_failure() => {
                tracing::info!(tool = %intent.name, "Tool failed: {}", e);
                let output = Value::String(e.to_string());
                self.emit(AgentEvent::tool_result(call_id, &intent.name, output.clone(), true));
                Ok(output)
            }
            Err(e) => {
                tracing::warn!(tool = %intent.name, "Aborting turn: {}", e);
                self.emit(AgentEvent::tool_result(
                    call_id,
                    &intent.name,
                    Value::String(e.to_string()),
                    true,
                ));
                Err(e)
            }
        }
    }

    async fn invoke(&self, intent: &ToolCallIntent) -> Result<Value> {
        let index = self
            .descriptors
            .iter()
            .position(|d| d.name == intent.name)
            .ok_or_else(|| Error::unknown_tool(format!("Unknown tool: {}", intent.name)))?;
        let descriptor = &self.descriptors[index];

        let mut arguments = match &intent.arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(Error::invalid_arguments(format!(
                    "Arguments for {} must be a JSON object, got {}",
                    intent.name, other
                )))
            }
        };
        let errors = descriptor.validate_arguments(&arguments);
        if !errors.is_empty() {
            return Err(Error::invalid_arguments(format!(
                "{}: {}",
                intent.name,
                errors.join("; ")
            )));
        }
        descriptor.fill_defaults(&mut arguments);

        let timeout = self.ctx.config.tool_timeout;
        tokio::time::timeout(timeout, self.tools[index].invoke(arguments))
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "{} exceeded {}s",
                    intent.name,
                    timeout.as_secs_f64()
                ))
            })?
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(observer) = &self.observer {
            // A dropped observer only loses the console trace.
            let _ = observer.send(event);
        }
    }
}

/// Text form of a tool output as stored in history.
fn output_text(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParamDef, ParamType};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays a script of steps and records what it was shown.
    struct Scripted {
        steps: Mutex<VecDeque<ReasoningStep>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(steps: Vec<ReasoningStep>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Reasoner for Scripted {
        async fn next_step(&self, request: ReasoningRequest<'_>) -> Result<ReasoningStep> {
            self.seen.lock().unwrap().push(request.history.to_vec());
            self.steps
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| Error::reasoning("script exhausted"))
        }
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn describe(&self) -> ToolDescriptor {
            ToolDescriptor::new("echo", "Echo text")
                .param(ParamDef::required("text", ParamType::String, "Text"))
        }

        async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value> {
            Ok(arguments.get("text").cloned().unwrap_or(Value::Null))
        }
    }

    fn call(name: &str, arguments: Value) -> ReasoningStep {
        ReasoningStep::ToolCall(ToolCallIntent {
            name: name.to_string(),
            arguments,
        })
    }

    fn session(reasoner: Arc<Scripted>, config: AgentConfig) -> AgentSession {
        let ctx = AgentContext { reasoner, config };
        AgentSession::new(ctx, "test preamble", vec![Arc::new(Echo) as Arc<dyn Tool>])
    }

    #[tokio::test]
    async fn test_tool_output_reaches_history() {
        let reasoner = Scripted::new(vec![
            call("echo", json!({"text": "hello"})),
            ReasoningStep::Final("said hello".to_string()),
        ]);
        let mut session = session(reasoner.clone(), AgentConfig::default());

        let answer = session.submit("say hello").await.unwrap();
        assert_eq!(answer, "said hello");
        assert_eq!(session.state(), SessionState::Idle);

        let seen = reasoner.seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.last().unwrap(), &ChatMessage::tool_result("echo", "hello"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_fed_back() {
        let reasoner = Scripted::new(vec![
            call("echo", json!({"words": "hello"})),
            ReasoningStep::Final("gave up".to_string()),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = session(reasoner, AgentConfig::default()).with_observer(tx);

        assert_eq!(session.submit("hi").await.unwrap(), "gave up");
        rx.recv().await.unwrap();
        match rx.recv().await.unwrap() {
            AgentEvent::ToolResult { is_error, .. } => assert!(is_error),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_tool_budget() {
        let reasoner = Scripted::new(vec![
            call("echo", json!({"text": "1"})),
            call("echo", json!({"text": "2"})),
            call("echo", json!({"text": "3"})),
        ]);
        let config = AgentConfig {
            max_tool_calls: 2,
            ..AgentConfig::default()
        };
        let mut session = session(reasoner, config);
        let err = session.submit("loop").await.unwrap_err();
        assert!(matches!(err, Error::QuotaExceeded(_)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_slow_tool_times_out_as_data() {
        struct Slow;

        #[async_trait]
        impl Tool for Slow {
            fn describe(&self) -> ToolDescriptor {
                ToolDescriptor::new("slow", "Never finishes in time")
            }

            async fn invoke(&self, _arguments: Map<String, Value>) -> Result<Value> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Value::Null)
            }
        }

        let reasoner = Scripted::new(vec![
            call("slow", Value::Null),
            ReasoningStep::Final("too slow".to_string()),
        ]);
        let config = AgentConfig {
            tool_timeout: Duration::from_millis(20),
            ..AgentConfig::default()
        };
        let ctx = AgentContext {
            reasoner: reasoner.clone(),
            config,
        };
        let mut session = AgentSession::new(ctx, "", vec![Arc::new(Slow) as Arc<dyn Tool>]);

        assert_eq!(session.submit("go").await.unwrap(), "too slow");
        let history = session.history();
        let fed_back = &history[history.len() - 2];
        assert!(fed_back.content.starts_with("timeout:"));
    }
}
