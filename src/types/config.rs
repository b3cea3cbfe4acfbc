//! Configuration structures.
//!
//! Configuration starts from defaults, is overlaid with `TOOLBRIDGE_*`
//! environment variables, and finally with command-line flags in the binary.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Tool server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// IPC transport configuration.
    #[serde(default)]
    pub ipc: IpcConfig,

    /// Discovery and tool client configuration.
    #[serde(default)]
    pub client: ClientConfig,

    /// Agent session configuration.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Defaults overlaid with `TOOLBRIDGE_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning rather than aborting.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("TOOLBRIDGE_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("TOOLBRIDGE_PORT") {
            config.server.port = port;
        }
        if let Ok(path) = std::env::var("TOOLBRIDGE_PATH") {
            config.server.path = path;
        }
        if let Ok(db_path) = std::env::var("TOOLBRIDGE_DB_PATH") {
            config.server.db_path = db_path;
        }
        if let Some(timeout) = env_duration("TOOLBRIDGE_REQUEST_TIMEOUT") {
            config.server.request_timeout = timeout;
        }
        if let Some(timeout) = env_duration("TOOLBRIDGE_PROBE_TIMEOUT") {
            config.client.probe_timeout = timeout;
        }
        if let Some(timeout) = env_duration("TOOLBRIDGE_CALL_TIMEOUT") {
            config.client.call_timeout = timeout;
        }
        if let Ok(model) = std::env::var("TOOLBRIDGE_MODEL") {
            config.agent.model = model;
        }
        if let Ok(url) = std::env::var("TOOLBRIDGE_OLLAMA_URL") {
            config.agent.ollama_url = url;
        }
        if let Ok(level) = std::env::var("TOOLBRIDGE_LOG_LEVEL") {
            config.observability.log_level = level;
        }
        if let Ok(format) = std::env::var("TOOLBRIDGE_LOG_FORMAT") {
            config.observability.json_logs = format.eq_ignore_ascii_case("json");
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={}", key, raw);
            None
        }
    }
}

fn env_duration(key: &str) -> Option<Duration> {
    let raw = std::env::var(key).ok()?;
    match humantime_serde::re::humantime::parse_duration(&raw) {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!("Ignoring unparseable {}={}: {}", key, raw, e);
            None
        }
    }
}

/// Which transport a tool server exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Persistent TCP connection bound to host/port.
    #[default]
    Stream,
    /// The process's own stdin/stdout.
    Stdio,
}

/// Tool server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Human-readable server name reported by `initialize`.
    pub name: String,

    /// Bind host for the streamed transport.
    pub host: String,

    /// Bind port for the streamed transport.
    pub port: u16,

    /// Path clients must present in `initialize` (streamed transport only).
    pub path: String,

    /// Transport to serve on.
    pub transport: TransportKind,

    /// Upper bound on a single tool invocation.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// SQLite file used by the query tools.
    pub db_path: String,
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "toolbridge".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
            path: "/sse".to_string(),
            transport: TransportKind::Stream,
            request_timeout: Duration::from_secs(30),
            db_path: "demo.db".to_string(),
        }
    }
}

/// IPC transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcConfig {
    /// Maximum frame payload size in bytes.
    pub max_frame_bytes: u32,

    /// Maximum concurrent TCP connections. Connections beyond this limit
    /// are rejected immediately.
    pub max_connections: usize,

    /// Read timeout in seconds per frame. Connections idle beyond this
    /// duration are dropped.
    pub read_timeout_secs: u64,

    /// Write timeout in seconds per frame. Slow consumers that cannot
    /// accept a response within this window are dropped.
    pub write_timeout_secs: u64,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 5 * 1024 * 1024,
            max_connections: 1000,
            read_timeout_secs: 300,
            write_timeout_secs: 10,
        }
    }
}

/// Discovery and tool client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Budget for one discovery probe (connect + initialize).
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,

    /// Budget for establishing a connection.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Budget for one tool listing or invocation round trip.
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,

    /// Maximum frame payload size in bytes accepted from the server.
    pub max_frame_bytes: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(60),
            max_frame_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Agent session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model name passed to the reasoning backend.
    pub model: String,

    /// Base URL of the Ollama daemon.
    pub ollama_url: String,

    /// HTTP timeout for one reasoning request.
    #[serde(with = "humantime_serde")]
    pub reasoning_timeout: Duration,

    /// Budget for one tool invocation made by the session.
    #[serde(with = "humantime_serde")]
    pub tool_timeout: Duration,

    /// Maximum tool calls within one `submit`.
    pub max_tool_calls: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            ollama_url: "http://127.0.0.1:11434".to_string(),
            reasoning_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(60),
            max_tool_calls: 20,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
