//! Multi-server registry and public API.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::alloc::{Allocator, SystemAllocator};
use crate::capabilities::{ClientInfo, ConnectParams, DebugFlags, Trace};
use crate::error::{Error, Result};
use crate::notification::{symbol_kind_to_string, Notification};
use crate::session::{ConnectionStatus, ServerSession};

/// Opaque, non-negative session handle; never reused within a `Context`'s
/// lifetime.
pub type ServerID = i64;

/// Sentinel returned by `connect` on failure.
pub const INVALID_SERVER_ID: ServerID = -1;

/// Process-wide state: allocator, client identity, active sessions.
pub struct Context {
    allocator: Arc<dyn Allocator>,
    client_info: ClientInfo,
    locale: String,
    debug_flags: DebugFlags,
    sessions: HashMap<ServerID, ServerSession>,
    next_id: ServerID,
}

impl Context {
    /// Creates a context with the default system allocator.
    pub fn init() -> Self {
        Self::init_with_allocator(Arc::new(SystemAllocator))
    }

    /// Creates a context with a caller-supplied allocator.
    pub fn init_with_allocator(allocator: Arc<dyn Allocator>) -> Self {
        Self {
            allocator,
            client_info: ClientInfo::default(),
            locale: "en".to_string(),
            debug_flags: DebugFlags::NONE,
            sessions: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn allocator(&self) -> Arc<dyn Allocator> {
        self.allocator.clone()
    }

    /// This crate's own semver.
    pub fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    pub fn set_client_info(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.client_info = ClientInfo {
            name: name.into(),
            version: version.into(),
        };
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    pub fn set_debug_flags(&mut self, mask: DebugFlags) {
        self.debug_flags = mask;
    }

    /// Spawns a server and begins the handshake, returning
    /// [`INVALID_SERVER_ID`] on spawn failure. The failure is logged
    /// rather than propagated, since `connect` has no `Result` to return
    /// it through.
    pub fn connect(&mut self, command: &str, params: &ConnectParams) -> ServerID {
        match ServerSession::connect(
            command,
            params,
            &self.client_info,
            &self.locale,
            self.debug_flags,
            self.allocator.clone(),
        ) {
            Ok(session) => {
                let id = self.next_id;
                self.next_id += 1;
                self.sessions.insert(id, session);
                id
            }
            Err(e) => {
                log::error!("failed to connect to '{command}': {e}");
                INVALID_SERVER_ID
            }
        }
    }

    pub fn get_connection_status(&self, id: ServerID) -> Option<ConnectionStatus> {
        self.sessions.get(&id).map(ServerSession::status)
    }

    /// Runs the bounded `shutdown`→`exit` handshake and removes the
    /// session.
    pub fn close(&mut self, id: ServerID) -> bool {
        match self.sessions.remove(&id) {
            Some(mut session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    /// Closes every session, then drops the context's own state.
    pub fn shutdown(mut self) {
        let ids: Vec<ServerID> = self.sessions.keys().copied().collect();
        for id in ids {
            self.close(id);
        }
    }

    pub fn set_trace_from_string(&mut self, id: ServerID, trace: &str) -> Result<()> {
        let trace = Trace::parse(trace)
            .ok_or_else(|| Error::Config(format!("unknown trace level: {trace:?}")))?;
        let session = self.require_connected(id)?;
        session.set_trace(trace)
    }

    pub fn text_document_did_open(&mut self, id: ServerID, path: &Path) -> Result<()> {
        self.require_connected(id)?.did_open(path)
    }

    pub fn text_document_did_close(&mut self, id: ServerID, path: &Path) -> Result<()> {
        self.require_connected(id)?.did_close(path)
    }

    pub fn text_document_symbol(&mut self, id: ServerID, path: &Path) -> Result<()> {
        self.require_connected(id)?.document_symbol(path)?;
        Ok(())
    }

    pub fn text_document_hover(&mut self, id: ServerID, path: &Path, line: u32, character: u32) -> Result<()> {
        self.require_connected(id)?.hover(path, line, character)?;
        Ok(())
    }

    pub fn text_document_semantic_tokens(&mut self, id: ServerID, path: &Path) -> Result<()> {
        self.require_connected(id)?.semantic_tokens(path)?;
        Ok(())
    }

    fn require_connected(&mut self, id: ServerID) -> Result<&mut ServerSession> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| Error::Lifecycle(format!("no session with id {id}")))?;
        if session.status() != ConnectionStatus::Connected {
            return Err(Error::Lifecycle(format!(
                "session {id} is not connected (status: {:?})",
                session.status()
            )));
        }
        Ok(session)
    }

    /// Drains every session's supervisor, advancing each state machine and
    /// enqueueing notifications. Destroys sessions whose transport has
    /// failed.
    pub fn process_responses(&mut self) {
        let mut failed = Vec::new();
        for (&id, session) in self.sessions.iter_mut() {
            session.pump();
            if session.has_failed() {
                failed.push(id);
            }
        }
        for id in failed {
            if let Some(mut session) = self.sessions.remove(&id) {
                session.close();
            }
        }
    }

    /// Dequeues one notification for `id`, if any.
    pub fn poll_notification(&mut self, id: ServerID) -> Option<Notification> {
        self.sessions.get_mut(&id)?.poll_notification()
    }

    /// Pure mapping, no session state involved.
    pub fn symbol_kind_to_string(&self, kind: i64) -> &'static str {
        symbol_kind_to_string(kind)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_to_nonexistent_binary_returns_invalid_id() {
        let mut ctx = Context::init();
        let params = ConnectParams::new();
        let id = ctx.connect("definitely-not-a-real-lsp-binary-xyz", &params);
        assert_eq!(id, INVALID_SERVER_ID);
    }

    #[test]
    fn unknown_session_id_reports_no_status() {
        let ctx = Context::init();
        assert_eq!(ctx.get_connection_status(42), None);
    }

    #[test]
    fn feature_call_on_unknown_session_is_a_lifecycle_error() {
        let mut ctx = Context::init();
        let err = ctx
            .text_document_hover(42, Path::new("foo.rs"), 0, 0)
            .unwrap_err();
        assert!(matches!(err, Error::Lifecycle(_)));
    }

    #[test]
    fn close_on_unknown_session_returns_false() {
        let mut ctx = Context::init();
        assert!(!ctx.close(42));
    }

    #[test]
    fn process_responses_with_no_sessions_returns_immediately() {
        let mut ctx = Context::init();
        ctx.process_responses();
    }

    #[test]
    fn symbol_kind_mapping_is_exposed() {
        let ctx = Context::init();
        assert_eq!(ctx.symbol_kind_to_string(12), "Function");
    }
}
