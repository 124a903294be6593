//! Client-side Language Server Protocol library.
//!
//! Spawn language-server subprocesses, speak JSON-RPC 2.0 over their
//! stdio, track per-server lifecycle, and pull document symbols, hover,
//! semantic tokens, and diagnostics through a caller-polled API. No
//! background threads: every I/O operation is non-blocking and confined to
//! [`Context::process_responses`] and the feature-call methods.

mod alloc;
mod buffer;
mod capabilities;
mod context;
mod error;
mod framing;
mod json;
mod notification;
mod process;
mod rpc;
mod session;

pub use alloc::{Allocator, SystemAllocator};
pub use capabilities::{Capabilities, ClientInfo, ConnectParams, DebugFlags, ServerInfo, Trace};
pub use context::{Context, ServerID, INVALID_SERVER_ID};
pub use error::{Error, Result};
pub use json::Value;
pub use notification::{
    symbol_kind_to_string, Diagnostic, DocumentSymbol, Notification, Position, Range, SemanticToken,
};
pub use session::ConnectionStatus;
