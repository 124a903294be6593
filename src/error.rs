use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy. Propagation policy (which of these are returned
/// synchronously vs. fail a session vs. fail a single request) lives with
/// the call sites that raise them, not with the type itself.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid caller-supplied configuration: null context, unknown trace
    /// string, malformed connect parameters.
    #[error("configuration error: {0}")]
    Config(String),

    /// The child process could not be launched at all.
    #[error("failed to spawn language server: {0}")]
    Spawn(#[from] std::io::Error),

    /// Pipe write/read failure, or a framing violation (bad header,
    /// non-integer Content-Length, EOF mid-frame).
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON decode failure, missing required fields, unexpected message
    /// shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with a JSON-RPC `error` object.
    #[error("server error {code}: {message}")]
    Server { code: i64, message: String },

    /// The operation doesn't make sense for the session's current
    /// `ConnectionStatus` (e.g. a feature call while still CONNECTING).
    #[error("invalid operation for session state: {0}")]
    Lifecycle(String),
}
