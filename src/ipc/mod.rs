//! Tool endpoint transport.
//!
//! Length-prefixed JSON framing served over TCP (host/port + path) or over a
//! pipe (process stdin/stdout). Both variants share the codec, the protocol
//! messages and the method router.

pub mod codec;
pub mod protocol;
pub mod router;
pub mod server;

pub use router::{ConnectionState, ServerContext};
pub use server::{handle_connection, serve_pipe, serve_stdio, ConnectionLimits, IpcServer};
