//! Agent session tests: event ordering, history across turns, failure
//! classification, and the interactive loop, with stub reasoners.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use toolbridge::agent::{
    run_repl, AgentContext, AgentSession, ChatMessage, Reasoner, ReasoningRequest,
    ReasoningStep, Role, SessionState, ToolCallIntent,
};
use toolbridge::client::{Endpoint, ToolClient};
use toolbridge::events::AgentEvent;
use toolbridge::ipc::{IpcServer, ServerContext};
use toolbridge::tools::{self, ParamDef, ParamType, Tool, ToolDescriptor};
use toolbridge::types::{AgentConfig, ClientConfig, IpcConfig};
use toolbridge::Error;

/// Replays a fixed script of steps.
struct Scripted {
    steps: Mutex<VecDeque<ReasoningStep>>,
}

impl Scripted {
    fn new(steps: Vec<ReasoningStep>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
        })
    }
}

#[async_trait]
impl Reasoner for Scripted {
    async fn next_step(&self, _request: ReasoningRequest<'_>) -> toolbridge::Result<ReasoningStep> {
        self.steps
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::reasoning("script exhausted"))
    }
}

/// Answers with every user message it has been shown so far.
struct EchoHistory;

#[async_trait]
impl Reasoner for EchoHistory {
    async fn next_step(&self, request: ReasoningRequest<'_>) -> toolbridge::Result<ReasoningStep> {
        let said: Vec<&str> = request
            .history
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect();
        Ok(ReasoningStep::Final(format!("heard: {}", said.join(" | "))))
    }
}

struct Upper;

#[async_trait]
impl Tool for Upper {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new("upper", "Uppercase text")
            .param(ParamDef::required("text", ParamType::String, "Text"))
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> toolbridge::Result<Value> {
        let text = arguments.get("text").and_then(Value::as_str).unwrap_or("");
        Ok(Value::String(text.to_uppercase()))
    }
}

struct Broken;

#[async_trait]
impl Tool for Broken {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new("broken", "Always fails")
    }

    async fn invoke(&self, _arguments: Map<String, Value>) -> toolbridge::Result<Value> {
        Err(Error::store("disk I/O error"))
    }
}

fn call(name: &str, arguments: Value) -> ReasoningStep {
    ReasoningStep::ToolCall(ToolCallIntent {
        name: name.to_string(),
        arguments,
    })
}

fn local_session(reasoner: Arc<dyn Reasoner>) -> AgentSession {
    let ctx = AgentContext {
        reasoner,
        config: AgentConfig::default(),
    };
    let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(Upper), Arc::new(Broken)];
    AgentSession::new(ctx, "Use the tools.", tools)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_two_calls_emit_events_in_order() {
    let reasoner = Scripted::new(vec![
        call("upper", json!({"text": "one"})),
        call("upper", json!({"text": "two"})),
        ReasoningStep::Final("ONE TWO".to_string()),
    ]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = local_session(reasoner).with_observer(tx);

    assert_eq!(session.submit("shout").await.unwrap(), "ONE TWO");

    let events = drain(&mut rx);
    assert_eq!(events.len(), 4);
    let kinds: Vec<(&str, &str)> = events
        .iter()
        .map(|e| match e {
            AgentEvent::ToolCall { .. } => ("call", e.tool()),
            AgentEvent::ToolResult { .. } => ("result", e.tool()),
        })
        .collect();
    assert_eq!(
        kinds,
        [("call", "upper"), ("result", "upper"), ("call", "upper"), ("result", "upper")]
    );
    assert_eq!(events[0].call_id(), events[1].call_id());
    assert_eq!(events[2].call_id(), events[3].call_id());
    assert_ne!(events[0].call_id(), events[2].call_id());

    match &events[3] {
        AgentEvent::ToolResult {
            output, is_error, ..
        } => {
            assert_eq!(output, &json!("TWO"));
            assert!(!is_error);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_history_carries_across_submits() {
    let mut session = local_session(Arc::new(EchoHistory));

    assert_eq!(session.submit("first").await.unwrap(), "heard: first");
    assert_eq!(
        session.submit("second").await.unwrap(),
        "heard: first | second"
    );

    let roles: Vec<Role> = session.history().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
}

#[tokio::test]
async fn test_store_fault_is_fed_back() {
    let reasoner = Scripted::new(vec![
        call("broken", Value::Null),
        ReasoningStep::Final("could not read".to_string()),
    ]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = local_session(reasoner).with_observer(tx);

    assert_eq!(session.submit("read").await.unwrap(), "could not read");

    let events = drain(&mut rx);
    match &events[1] {
        AgentEvent::ToolResult {
            output, is_error, ..
        } => {
            assert!(is_error);
            assert_eq!(output, &json!("store fault: disk I/O error"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(
        session.history()[2],
        ChatMessage::tool_result("broken", "store fault: disk I/O error")
    );
}

#[tokio::test]
async fn test_unknown_tool_aborts_turn() {
    let reasoner = Scripted::new(vec![call("format_disk", json!({}))]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = local_session(reasoner).with_observer(tx);

    let err = session.submit("do it").await.unwrap_err();
    assert!(matches!(err, Error::UnknownTool(_)));
    assert_eq!(session.state(), SessionState::Idle);

    // The call is still closed by a result event.
    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[1], AgentEvent::ToolResult { is_error: true, .. }));
}

#[tokio::test]
async fn test_reasoner_failure_aborts_turn() {
    let reasoner = Scripted::new(vec![]);
    let mut session = local_session(reasoner);
    let err = session.submit("anything").await.unwrap_err();
    assert!(matches!(err, Error::Reasoning(_)));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_session_over_remote_store_tools() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("people.db");
    let registry = tools::store_registry(db.to_str().unwrap(), false).unwrap();
    let ctx = ServerContext {
        registry: Arc::new(registry),
        name: "people-store".to_string(),
        path: Some("/sse".to_string()),
        request_timeout: Duration::from_secs(5),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = Arc::new(IpcServer::new(ctx, format!("127.0.0.1:{}", port), IpcConfig::default()));
    let serving = server.clone();
    tokio::spawn(async move {
        let _ = serving.serve_listener(listener).await;
    });

    let client = ToolClient::connect(
        Endpoint::stream("127.0.0.1", port, "/sse"),
        ClientConfig::default(),
    )
    .await
    .unwrap();
    let remote: Vec<Arc<dyn Tool>> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| Arc::new(t) as Arc<dyn Tool>)
        .collect();

    let reasoner = Scripted::new(vec![
        call(
            "add_data",
            json!({"query": "INSERT INTO people (name, age, profession) VALUES ('Lin', 30, 'Chemist')"}),
        ),
        call("read_data", json!({})),
        ReasoningStep::Final("Lin is a chemist.".to_string()),
    ]);
    let agent_ctx = AgentContext {
        reasoner,
        config: AgentConfig::default(),
    };
    let mut session = AgentSession::new(agent_ctx, "people", remote);

    assert_eq!(
        session.submit("add Lin and list everyone").await.unwrap(),
        "Lin is a chemist."
    );
    let read_result = &session.history()[4];
    assert_eq!(read_result.role, Role::Tool);
    assert_eq!(
        read_result.content,
        json!({"status": "success", "rows": [[1, "Lin", 30, "Chemist"]]}).to_string()
    );

    server.shutdown();
}

#[tokio::test]
async fn test_repl_prints_turns_and_stops_at_exit() {
    let reasoner = Scripted::new(vec![
        call("upper", json!({"text": "hi"})),
        ReasoningStep::Final("HI".to_string()),
    ]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = local_session(reasoner).with_observer(tx);

    let input: &[u8] = b"say hi\n\nExit\nnever submitted\n";
    let mut output = Vec::new();
    run_repl(&mut session, input, &mut output, Some(&mut rx))
        .await
        .unwrap();

    let text = String::from_utf8(output).unwrap();
    let prompt = "Enter your message (type 'exit' to quit): ";
    let expected = format!(
        "{p}User: say hi\n\
         Calling tool upper with kwargs {{\"text\":\"hi\"}}\n\
         Tool upper returned HI\n\
         Agent: HI\n\
         {p}{p}",
        p = prompt
    );
    assert_eq!(text, expected);
    assert!(!text.contains("never submitted"));
}

#[tokio::test]
async fn test_repl_reports_errors_and_continues() {
    let reasoner = Scripted::new(vec![
        call("missing_tool", json!({})),
        ReasoningStep::Final("recovered".to_string()),
    ]);
    let mut session = local_session(reasoner);

    let input: &[u8] = b"first\nsecond\n";
    let mut output = Vec::new();
    run_repl(&mut session, input, &mut output, None).await.unwrap();

    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("Error: unknown tool: Unknown tool: missing_tool\n"));
    assert!(text.contains("Agent: recovered\n"));
}
