//! Client integration tests: discovery, listing and invocation against live
//! endpoints over loopback TCP and in-memory pipes.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use toolbridge::agent::{ServerProfile, ToolSetKind};
use toolbridge::client::{discover, Connection, Endpoint, ToolClient};
use toolbridge::ipc::{serve_pipe, IpcServer, ServerContext};
use toolbridge::tools::{self, ParamDef, ParamType, Tool, ToolDescriptor, ToolRegistry};
use toolbridge::types::{ClientConfig, IpcConfig};
use toolbridge::Error;

struct Sleepy;

#[async_trait]
impl Tool for Sleepy {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor::new("sleepy", "Sleeps for the given milliseconds").param(
            ParamDef::required("ms", ParamType::Int, "Milliseconds to sleep"),
        )
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> toolbridge::Result<Value> {
        let ms = arguments.get("ms").and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(json!({"slept_ms": ms}))
    }
}

fn context(name: &str, registry: ToolRegistry, request_timeout: Duration) -> ServerContext {
    ServerContext {
        registry: Arc::new(registry),
        name: name.to_string(),
        path: Some("/sse".to_string()),
        request_timeout,
    }
}

/// Helper: serve `ctx` on a random loopback port.
async fn start_server(ctx: ServerContext) -> (u16, Arc<IpcServer>) {
    start_server_with(ctx, IpcConfig::default()).await
}

async fn start_server_with(ctx: ServerContext, ipc: IpcConfig) -> (u16, Arc<IpcServer>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = Arc::new(IpcServer::new(ctx, format!("127.0.0.1:{}", port), ipc));
    let serving = server.clone();
    tokio::spawn(async move {
        let _ = serving.serve_listener(listener).await;
    });
    (port, server)
}

async fn start_store_server() -> (u16, Arc<IpcServer>, tempfile::TempDir) {
    start_store_server_with(IpcConfig::default()).await
}

async fn start_store_server_with(ipc: IpcConfig) -> (u16, Arc<IpcServer>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("people.db");
    let registry = tools::store_registry(db.to_str().unwrap(), false).unwrap();
    let ctx = context("people-store", registry, Duration::from_secs(5));
    let (port, server) = start_server_with(ctx, ipc).await;
    (port, server, dir)
}

/// A port nothing listens on.
fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn fast_config() -> ClientConfig {
    ClientConfig {
        probe_timeout: Duration::from_millis(500),
        connect_timeout: Duration::from_millis(500),
        call_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn test_list_and_call_remote_tools() {
    let (port, _server, _dir) = start_store_server().await;
    let client = ToolClient::connect(Endpoint::stream("127.0.0.1", port, "/sse"), fast_config())
        .await
        .unwrap();
    assert_eq!(client.server_info().server, "people-store");

    let tools = client.list_tools().await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
    assert_eq!(names, ["add_data", "read_data", "update_people", "delete_person"]);

    let mut args = Map::new();
    args.insert(
        "query".to_string(),
        json!("INSERT INTO people (name, age, profession) VALUES ('Grace', 45, 'Admiral')"),
    );
    let added = tools[0].invoke(args).await.unwrap();
    assert_eq!(added, json!({"status": "success", "committed": true}));

    let rows = tools[1].invoke(Map::new()).await.unwrap();
    assert_eq!(rows["rows"], json!([[1, "Grace", 45, "Admiral"]]));

    // Missing records are not an error.
    let mut args = Map::new();
    args.insert("query".to_string(), json!("DELETE FROM people WHERE name = 'Nobody'"));
    let deleted = tools[3].invoke(args).await.unwrap();
    assert_eq!(
        deleted,
        json!({"status": "success", "confirmation": "Delete successful (0 rows affected)."})
    );
}

#[tokio::test]
async fn test_client_reconnects_after_idle_disconnect() {
    let ipc = IpcConfig {
        read_timeout_secs: 1,
        ..IpcConfig::default()
    };
    let (port, _server, _dir) = start_store_server_with(ipc).await;
    let client = ToolClient::connect(Endpoint::stream("127.0.0.1", port, "/sse"), fast_config())
        .await
        .unwrap();
    let tools = client.list_tools().await.unwrap();
    let read_data = &tools[1];
    assert_eq!(read_data.name(), "read_data");
    client
        .call_tool(
            "add_data",
            json!({"query": "INSERT INTO people (name, age, profession) VALUES ('Ada', 36, 'Analyst')"}),
        )
        .await
        .unwrap();

    // Outlive the server's idle limit so it drops the connection.
    tokio::time::sleep(Duration::from_millis(1500)).await;

    for _ in 0..3 {
        let rows = read_data.invoke(Map::new()).await.unwrap();
        assert_eq!(rows["rows"], json!([[1, "Ada", 36, "Analyst"]]));
    }
    assert_eq!(client.list_tools().await.unwrap().len(), 4);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    let rows = client.call_tool("read_data", json!({})).await.unwrap();
    assert_eq!(rows["status"], json!("success"));
}

#[tokio::test]
async fn test_remote_errors_keep_their_kind() {
    let (port, _server, _dir) = start_store_server().await;
    let client = ToolClient::connect(Endpoint::stream("127.0.0.1", port, "/sse"), fast_config())
        .await
        .unwrap();

    let err = client.call_tool("nope", json!({})).await.unwrap_err();
    assert!(matches!(err, Error::UnknownTool(ref m) if m == "Unknown tool: nope"));

    let err = client
        .call_tool("add_data", json!({"query": 42}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArguments(_)));
}

#[tokio::test]
async fn test_wrong_path_is_not_found() {
    let (port, _server, _dir) = start_store_server().await;
    let err = ToolClient::connect(Endpoint::stream("127.0.0.1", port, "/other"), fast_config())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_client_call_timeout() {
    let mut registry = ToolRegistry::new();
    registry.register(Sleepy).unwrap();
    let (port, _server) = start_server(context("sleepy", registry, Duration::from_secs(30))).await;

    let config = ClientConfig {
        call_timeout: Duration::from_millis(100),
        ..fast_config()
    };
    let client = ToolClient::connect(Endpoint::stream("127.0.0.1", port, "/sse"), config)
        .await
        .unwrap();
    let tools = client.list_tools().await.unwrap();

    let mut args = Map::new();
    args.insert("ms".to_string(), json!(300));
    let err = tools[0].invoke(args).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));

    // Calls on one connection are served in order; once the abandoned call
    // finishes its late answer is dropped and the connection is still usable.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let mut args = Map::new();
    args.insert("ms".to_string(), json!(0));
    assert_eq!(tools[0].invoke(args).await.unwrap(), json!({"slept_ms": 0}));
}

#[tokio::test]
async fn test_server_request_timeout() {
    let mut registry = ToolRegistry::new();
    registry.register(Sleepy).unwrap();
    let (port, _server) = start_server(context("sleepy", registry, Duration::from_millis(50))).await;

    let client = ToolClient::connect(Endpoint::stream("127.0.0.1", port, "/sse"), fast_config())
        .await
        .unwrap();
    let err = client
        .call_tool("sleepy", json!({"ms": 1_000}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
}

#[tokio::test]
async fn test_discovery_takes_first_live_candidate() {
    let (port_b, _server_b, _dir) = start_store_server().await;

    // C is a bare listener: any probe would show up as an accepted connection.
    let listener_c = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port_c = listener_c.local_addr().unwrap().port();

    let candidates = vec![
        ServerProfile::news("127.0.0.1", dead_port()),
        ServerProfile::store("127.0.0.1", port_b),
        ServerProfile::news("127.0.0.1", port_c),
    ];
    let found = discover(&candidates, &fast_config()).await.unwrap();
    assert_eq!(found.kind, ToolSetKind::Store);
    assert_eq!(found.endpoint, Endpoint::stream("127.0.0.1", port_b, "/sse"));

    let contacted = tokio::time::timeout(Duration::from_millis(200), listener_c.accept()).await;
    assert!(contacted.is_err(), "candidate after the winner was contacted");
}

#[tokio::test]
async fn test_discovery_with_no_live_candidates() {
    let candidates = vec![
        ServerProfile::store("127.0.0.1", dead_port()),
        ServerProfile::news("127.0.0.1", dead_port()),
    ];
    let err = discover(&candidates, &fast_config()).await.unwrap_err();
    assert!(matches!(err, Error::NoServerFound(_)));
}

#[tokio::test]
async fn test_discovery_skips_silent_endpoint() {
    // Accepts connections but never answers the handshake.
    let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent_port = silent.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = silent.accept().await {
            held.push(stream);
        }
    });
    let (port_b, _server_b, _dir) = start_store_server().await;

    let config = ClientConfig {
        probe_timeout: Duration::from_millis(150),
        ..fast_config()
    };
    let candidates = vec![
        ServerProfile::news("127.0.0.1", silent_port),
        ServerProfile::store("127.0.0.1", port_b),
    ];
    let found = discover(&candidates, &config).await.unwrap();
    assert_eq!(found.kind, ToolSetKind::Store);
}

#[tokio::test]
async fn test_pipe_transport_over_duplex() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("people.db");
    let registry = tools::store_registry(db.to_str().unwrap(), true).unwrap();
    let ctx = ServerContext {
        registry: Arc::new(registry),
        name: "people-store".to_string(),
        path: None,
        request_timeout: Duration::from_secs(5),
    };

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let cancel = CancellationToken::new();
    let server = tokio::spawn(serve_pipe(
        server_read,
        server_write,
        ctx,
        IpcConfig::default(),
        cancel.clone(),
    ));

    let (client_read, client_write) = tokio::io::split(client_io);
    let connection = Connection::from_streams(client_read, client_write, 1 << 20);
    let client = ToolClient::with_connection(Endpoint::pipe("in-memory", vec![]), connection, fast_config())
        .await
        .unwrap();

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 4);

    // Strict store: a read tool refuses to run a write.
    let rejected = client
        .call_tool("read_data", json!({"query": "DELETE FROM people"}))
        .await
        .unwrap();
    assert_eq!(rejected, json!({"status": "success", "rows": []}));

    let updated = client
        .call_tool("update_people", json!({"query": "INSERT INTO people (name, age, profession) VALUES ('x', 1, 'y')"}))
        .await
        .unwrap();
    assert_eq!(updated["status"], "failure");

    cancel.cancel();
    server.await.unwrap().unwrap();
}
