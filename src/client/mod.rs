//! Tool client: connects to an endpoint and turns its published tools into
//! invokable capabilities.

pub mod connection;
pub mod discovery;

pub use connection::Connection;
pub use discovery::discover;

use crate::ipc::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, ListToolsResult,
    METHOD_CALL_TOOL, METHOD_INITIALIZE, METHOD_LIST_TOOLS,
};
use crate::tools::{Tool, ToolDescriptor};
use crate::types::{ClientConfig, Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Where a tool server can be reached. Carries no liveness state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP host/port plus the path presented during `initialize`.
    Stream {
        host: String,
        port: u16,
        path: String,
    },
    /// A command whose stdin/stdout speak the protocol.
    Pipe { command: String, args: Vec<String> },
}

impl Endpoint {
    pub fn stream(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Endpoint::Stream {
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    pub fn pipe(command: impl Into<String>, args: Vec<String>) -> Self {
        Endpoint::Pipe {
            command: command.into(),
            args,
        }
    }

    fn path(&self) -> Option<String> {
        match self {
            Endpoint::Stream { path, .. } => Some(path.clone()),
            Endpoint::Pipe { .. } => None,
        }
    }

    /// Open a raw connection without performing the handshake.
    pub async fn open(&self, config: &ClientConfig) -> Result<Connection> {
        match self {
            Endpoint::Stream { host, port, .. } => Connection::connect_tcp(host, *port, config).await,
            Endpoint::Pipe { command, args } => Connection::spawn_pipe(command, args, config),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Stream { host, port, path } => write!(f, "{}:{}{}", host, port, path),
            Endpoint::Pipe { command, args } if args.is_empty() => write!(f, "pipe:{}", command),
            Endpoint::Pipe { command, args } => write!(f, "pipe:{} {}", command, args.join(" ")),
        }
    }
}

/// Run the `initialize` handshake on an open connection.
pub(crate) async fn handshake(
    connection: &Connection,
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<InitializeResult> {
    let params = InitializeParams {
        path: endpoint.path(),
        client: Some(format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))),
    };
    let body = connection
        .request(METHOD_INITIALIZE, serde_json::to_value(params)?, timeout)
        .await?;
    serde_json::from_value(body)
        .map_err(|e| Error::protocol(format!("Malformed initialize result: {}", e)))
}

/// Connection to one endpoint, reopened after the server drops it (for
/// example on its idle timeout).
#[derive(Debug)]
struct Link {
    endpoint: Endpoint,
    config: ClientConfig,
    current: Mutex<Arc<Connection>>,
}

impl Link {
    fn new(endpoint: Endpoint, connection: Connection, config: ClientConfig) -> Self {
        Self {
            endpoint,
            config,
            current: Mutex::new(Arc::new(connection)),
        }
    }

    /// The current connection, reopened first if the endpoint closed it.
    async fn connection(&self) -> Result<Arc<Connection>> {
        let mut current = self.current.lock().await;
        if current.is_closed() {
            *current = Arc::new(self.reopen().await?);
        }
        Ok(Arc::clone(&*current))
    }

    /// Replace `stale` unless another caller already did.
    async fn replace(&self, stale: &Arc<Connection>) -> Result<Arc<Connection>> {
        let mut current = self.current.lock().await;
        if Arc::ptr_eq(&*current, stale) {
            *current = Arc::new(self.reopen().await?);
        }
        Ok(Arc::clone(&*current))
    }

    async fn reopen(&self) -> Result<Connection> {
        tracing::info!("Reconnecting to {}", self.endpoint);
        let connection = self.endpoint.open(&self.config).await?;
        handshake(&connection, &self.endpoint, self.config.connect_timeout).await?;
        Ok(connection)
    }

    /// One round trip. If the connection turns out to be closed it is
    /// reopened and the request is sent once more.
    async fn request(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        let connection = self.connection().await?;
        match connection.request(method, params.clone(), timeout).await {
            Err(Error::Connection(reason)) if connection.is_closed() => {
                tracing::debug!("{} failed on a closed connection: {}", method, reason);
                let connection = self.replace(&connection).await?;
                connection.request(method, params, timeout).await
            }
            other => other,
        }
    }
}

/// A connected, initialized tool client.
#[derive(Debug)]
pub struct ToolClient {
    link: Arc<Link>,
    server: InitializeResult,
}

impl ToolClient {
    /// Connect to `endpoint` and complete the handshake.
    pub async fn connect(endpoint: Endpoint, config: ClientConfig) -> Result<Self> {
        let connection = endpoint.open(&config).await?;
        Self::with_connection(endpoint, connection, config).await
    }

    /// Complete the handshake over an already open connection.
    pub async fn with_connection(
        endpoint: Endpoint,
        connection: Connection,
        config: ClientConfig,
    ) -> Result<Self> {
        let server = handshake(&connection, &endpoint, config.connect_timeout).await?;
        tracing::info!(
            "Connected to {} at {} ({} tools)",
            server.server,
            endpoint,
            server.tool_count
        );
        Ok(Self {
            link: Arc::new(Link::new(endpoint, connection, config)),
            server,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.link.endpoint
    }

    /// What the server reported during the handshake.
    pub fn server_info(&self) -> &InitializeResult {
        &self.server
    }

    /// Fetch the tool listing and wrap each descriptor as a [`RemoteTool`].
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>> {
        let body = self
            .link
            .request(METHOD_LIST_TOOLS, Value::Null, self.link.config.call_timeout)
            .await?;
        let listing: ListToolsResult = serde_json::from_value(body)
            .map_err(|e| Error::protocol(format!("Malformed tool listing: {}", e)))?;

        Ok(listing
            .tools
            .into_iter()
            .map(|descriptor| RemoteTool {
                descriptor,
                link: Arc::clone(&self.link),
            })
            .collect())
    }

    /// Invoke a tool by name without going through a listing.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        call_remote(&self.link, name, arguments).await
    }
}

async fn call_remote(link: &Link, name: &str, arguments: Value) -> Result<Value> {
    let params = CallToolParams {
        name: name.to_string(),
        arguments,
    };
    let body = link
        .request(METHOD_CALL_TOOL, serde_json::to_value(params)?, link.config.call_timeout)
        .await?;
    let result: CallToolResult = serde_json::from_value(body)
        .map_err(|e| Error::protocol(format!("Malformed call result: {}", e)))?;
    Ok(result.result)
}

/// A tool published by a remote endpoint. Each invocation is an independent
/// round trip; nothing is cached.
#[derive(Debug, Clone)]
pub struct RemoteTool {
    descriptor: ToolDescriptor,
    link: Arc<Link>,
}

impl RemoteTool {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn describe(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value> {
        call_remote(&self.link, &self.descriptor.name, Value::Object(arguments)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        assert_eq!(
            Endpoint::stream("127.0.0.1", 8000, "/sse").to_string(),
            "127.0.0.1:8000/sse"
        );
        assert_eq!(
            Endpoint::pipe("toolbridge", vec!["serve-store".into()]).to_string(),
            "pipe:toolbridge serve-store"
        );
        assert_eq!(Endpoint::pipe("srv", vec![]).to_string(), "pipe:srv");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = ToolClient::connect(Endpoint::stream("127.0.0.1", port, "/sse"), ClientConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[tokio::test]
    async fn test_missing_command_is_connection_error() {
        let endpoint = Endpoint::pipe("/nonexistent/toolbridge-server", vec![]);
        let err = ToolClient::connect(endpoint, ClientConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
