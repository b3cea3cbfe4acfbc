//! Multiplexed client connection.
//!
//! One writer task drains an outgoing queue onto the transport and one reader
//! task routes every response frame to the caller waiting on its request id.
//! Responses whose id nobody is waiting for (abandoned after a timeout) are
//! dropped.

use crate::ipc::codec::{read_frame, write_frame, MSG_REQUEST};
use crate::ipc::protocol::{self, WireRequest, WireResponse};
use crate::types::{ClientConfig, Error, RequestId, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<WireResponse>>>>;

/// A live connection to one tool endpoint.
#[derive(Debug)]
pub struct Connection {
    writer_tx: mpsc::Sender<Vec<u8>>,
    pending: Pending,
    closed: Arc<AtomicBool>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
    /// Spawned pipe server, killed when the connection is dropped.
    _child: Option<Child>,
}

impl Connection {
    /// Open a TCP connection within `config.connect_timeout`.
    pub async fn connect_tcp(host: &str, port: u16, config: &ClientConfig) -> Result<Self> {
        let addr = format!("{}:{}", host, port);
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::connection(format!("Connect to {} timed out", addr)))?
            .map_err(|e| Error::connection(format!("Connect to {} failed: {}", addr, e)))?;
        stream.set_nodelay(true)?;

        tracing::debug!("Connected to {}", addr);
        let (reader, writer) = stream.into_split();
        Ok(Self::from_streams(reader, writer, config.max_frame_bytes))
    }

    /// Spawn a pipe server and talk to it over its stdin/stdout.
    pub fn spawn_pipe(command: &str, args: &[String], config: &ClientConfig) -> Result<Self> {
        tracing::info!("Spawning: {} {}", command, args.join(" "));

        let mut child = Command::new(command)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::connection(format!("Failed to spawn `{}`: {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::connection("Failed to open child stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::connection("Failed to open child stdout"))?;

        let mut connection = Self::from_streams(stdout, stdin, config.max_frame_bytes);
        connection._child = Some(child);
        Ok(connection)
    }

    /// Build a connection over any reader/writer pair.
    pub fn from_streams<R, W>(reader: R, writer: W, max_frame_bytes: u32) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let (writer_tx, mut writer_rx) = mpsc::channel::<Vec<u8>>(64);
        let writer_handle = {
            let mut writer = writer;
            tokio::spawn(async move {
                while let Some(payload) = writer_rx.recv().await {
                    if let Err(e) = write_frame(&mut writer, MSG_REQUEST, &payload).await {
                        tracing::warn!("Write error: {}", e);
                        break;
                    }
                }
                tracing::debug!("Writer task exiting");
            })
        };

        let reader_handle = {
            let pending = Arc::clone(&pending);
            let closed = Arc::clone(&closed);
            let mut reader = reader;
            tokio::spawn(async move {
                loop {
                    match read_frame(&mut reader, max_frame_bytes).await {
                        Ok(Some((_msg_type, payload))) => {
                            let response: WireResponse = match protocol::decode(&payload) {
                                Ok(r) => r,
                                Err(e) => {
                                    tracing::warn!("Dropping undecodable response: {}", e);
                                    continue;
                                }
                            };
                            let waiter = pending.lock().await.remove(&response.id);
                            match waiter {
                                Some(tx) => {
                                    let _ = tx.send(response);
                                }
                                None => tracing::debug!(
                                    "Response for unknown id={:?}, ignoring",
                                    response.id
                                ),
                            }
                        }
                        Ok(None) => {
                            tracing::debug!("Endpoint closed the connection");
                            break;
                        }
                        Err(e) => {
                            tracing::warn!("Read error: {}", e);
                            break;
                        }
                    }
                }
                closed.store(true, Ordering::SeqCst);
                // Wake every waiter; their receivers see the sender dropped.
                pending.lock().await.clear();
            })
        };

        Self {
            writer_tx,
            pending,
            closed,
            reader_handle,
            writer_handle,
            _child: None,
        }
    }

    /// Send one request and wait up to `timeout` for its response.
    pub async fn request(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        let id = RequestId::new().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().await.remove(&id);
            return Err(Error::connection("Connection closed"));
        }

        let request = WireRequest {
            id: id.clone(),
            method: method.to_string(),
            params,
        };
        let payload = protocol::encode(&request)?;
        if self.writer_tx.send(payload).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(Error::connection("Connection writer closed"));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(Error::connection("Connection closed before response")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::timeout(format!(
                    "{} got no response within {}s",
                    method,
                    timeout.as_secs_f64()
                )))
            }
        }
    }

    /// Whether the endpoint has closed its side.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}
