//! Endpoint server: TCP accept loop, pipe serving, and the per-connection
//! frame loop both share.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::ipc::codec::{read_frame, write_frame, MSG_ERROR, MSG_REQUEST, MSG_RESPONSE};
use crate::ipc::protocol::{self, WireRequest, WireResponse};
use crate::ipc::router::{route_request, ConnectionState, ServerContext};
use crate::types::{Error, IpcConfig};

/// Frame-level limits applied to one connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub max_frame_bytes: u32,
    /// Idle connections are dropped after this long. `None` waits forever.
    pub read_timeout: Option<Duration>,
    pub write_timeout: Duration,
}

impl ConnectionLimits {
    /// Limits for accepted TCP connections.
    pub fn streamed(ipc_config: &IpcConfig) -> Self {
        Self {
            max_frame_bytes: ipc_config.max_frame_bytes,
            read_timeout: Some(Duration::from_secs(ipc_config.read_timeout_secs)),
            write_timeout: Duration::from_secs(ipc_config.write_timeout_secs),
        }
    }

    /// Limits for a pipe. The pipe lives as long as its parent keeps it open.
    pub fn pipe(ipc_config: &IpcConfig) -> Self {
        Self {
            read_timeout: None,
            ..Self::streamed(ipc_config)
        }
    }
}

/// Streamed tool endpoint over TCP.
#[derive(Debug)]
pub struct IpcServer {
    ctx: ServerContext,
    addr: String,
    cancel: CancellationToken,
    ipc_config: IpcConfig,
}

impl IpcServer {
    pub fn new(ctx: ServerContext, addr: impl Into<String>, ipc_config: IpcConfig) -> Self {
        Self {
            ctx,
            addr: addr.into(),
            cancel: CancellationToken::new(),
            ipc_config,
        }
    }

    /// Bind the configured address and serve until cancelled.
    pub async fn serve(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.addr).await?;
        self.serve_listener(listener).await
    }

    /// Serve on an already bound listener until cancelled or a fatal error occurs.
    pub async fn serve_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let conn_semaphore = Arc::new(Semaphore::new(self.ipc_config.max_connections));
        tracing::info!(
            "{} listening on {} (path={}, tools={}, max_connections={})",
            self.ctx.name,
            listener.local_addr()?,
            self.ctx.path.as_deref().unwrap_or("*"),
            self.ctx.registry.len(),
            self.ipc_config.max_connections,
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("{} shutting down", self.ctx.name);
                    break;
                }
                accept = listener.accept() => {
                    let (stream, peer) = accept?;

                    // Acquire connection permit (backpressure when at capacity).
                    let permit = match conn_semaphore.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            tracing::warn!(
                                "Connection from {} rejected: at max_connections ({})",
                                peer,
                                self.ipc_config.max_connections,
                            );
                            drop(stream);
                            continue;
                        }
                    };

                    tracing::debug!("Connection from {} (active={})",
                        peer,
                        self.ipc_config.max_connections - conn_semaphore.available_permits(),
                    );
                    let ctx = self.ctx.clone();
                    let cancel = self.cancel.clone();
                    let limits = ConnectionLimits::streamed(&self.ipc_config);
                    let span = tracing::info_span!("connection", %peer);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = serve_permitted(reader, writer, ctx, cancel, limits, permit).await {
                            tracing::warn!("Connection error: {}", e);
                        }
                    }.instrument(span));
                }
            }
        }
        Ok(())
    }

    /// Request graceful shutdown. Open connections finish their current request.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Token observed by the accept loop and every connection.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

async fn serve_permitted<R, W>(
    reader: R,
    writer: W,
    ctx: ServerContext,
    cancel: CancellationToken,
    limits: ConnectionLimits,
    _permit: OwnedSemaphorePermit, // held for connection lifetime
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    handle_connection(reader, writer, ctx, cancel, limits).await
}

/// Serve one pipe (any reader/writer pair) until EOF or cancellation.
pub async fn serve_pipe<R, W>(
    reader: R,
    writer: W,
    ctx: ServerContext,
    ipc_config: IpcConfig,
    cancel: CancellationToken,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!(
        "{} serving on pipe (tools={})",
        ctx.name,
        ctx.registry.len()
    );
    let limits = ConnectionLimits::pipe(&ipc_config);
    handle_connection(reader, writer, ctx, cancel, limits).await
}

/// Serve on this process's stdin/stdout. Logging must go to stderr.
pub async fn serve_stdio(
    ctx: ServerContext,
    ipc_config: IpcConfig,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    serve_pipe(tokio::io::stdin(), tokio::io::stdout(), ctx, ipc_config, cancel).await
}

/// Read frames → route → write responses, one request at a time.
pub async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: ServerContext,
    cancel: CancellationToken,
    limits: ConnectionLimits,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut state = ConnectionState::default();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = next_frame(&mut reader, &limits) => {
                let (msg_type, payload) = match frame? {
                    Some(f) => f,
                    None => break,
                };

                let response = handle_frame(&ctx, &mut state, msg_type, &payload).await;
                let msg_type = if response.ok { MSG_RESPONSE } else { MSG_ERROR };
                let encoded = protocol::encode(&response).map_err(|e| {
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
                })?;
                timed_write(&mut writer, msg_type, &encoded, limits.write_timeout).await?;
            }
        }
    }

    Ok(())
}

/// Next frame, or `None` on EOF or idle timeout.
async fn next_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    limits: &ConnectionLimits,
) -> std::io::Result<Option<(u8, Vec<u8>)>> {
    let read = read_frame(reader, limits.max_frame_bytes);
    match limits.read_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, read).await {
            Ok(result) => result,
            Err(_elapsed) => {
                tracing::debug!("Read timeout ({}s), dropping connection", timeout.as_secs());
                Ok(None)
            }
        },
        None => read.await,
    }
}

async fn handle_frame(
    ctx: &ServerContext,
    state: &mut ConnectionState,
    msg_type: u8,
    payload: &[u8],
) -> WireResponse {
    if msg_type != MSG_REQUEST {
        let err = Error::protocol(format!("Unexpected message type: 0x{:02X}", msg_type));
        return WireResponse::failure("", &err);
    }

    let request: WireRequest = match protocol::decode(payload) {
        Ok(request) => request,
        Err(e) => return WireResponse::failure("", &e),
    };

    match route_request(ctx, state, &request.method, request.params).await {
        Ok(body) => WireResponse::success(request.id, body),
        Err(e) => WireResponse::failure(request.id, &e),
    }
}

/// Write a frame with a timeout. Returns an error if the write takes too long
/// (prevents slow consumers from holding connections indefinitely).
async fn timed_write<W: AsyncWrite + Unpin>(
    writer: &mut W,
    msg_type: u8,
    payload: &[u8],
    timeout: Duration,
) -> std::io::Result<()> {
    tokio::time::timeout(timeout, write_frame(writer, msg_type, payload))
        .await
        .map_err(|_| {
            tracing::warn!("Write timeout ({}s), dropping connection", timeout.as_secs());
            std::io::Error::new(std::io::ErrorKind::TimedOut, "write timeout")
        })?
}
