//! Per-server connection state machine: owns a [`Supervisor`], speaks the
//! `initialize`/`initialized`/`shutdown`/`exit` handshake, and turns
//! decoded JSON-RPC bodies into caller notifications.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::alloc::Allocator;
use crate::capabilities::{Capabilities, ClientInfo, ConnectParams, ServerInfo, Trace};
use crate::error::{Error, Result};
use crate::framing::{encode_frame, FrameDecoder};
use crate::json::{self, Value};
use crate::notification::{Diagnostic, DocumentSymbol, Notification, Position, Range, SemanticToken};
use crate::process::{ReadStatus, SpawnParams, Supervisor};
use crate::rpc::{self, Inbound, PendingContext, PendingRequest, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    NotConnected,
    Connecting,
    Connected,
}

/// Token types/modifiers advertised by the server at handshake completion,
/// used to decode `semanticTokens/full` integer streams.
#[derive(Debug, Clone, Default)]
pub struct Legend {
    pub token_types: Vec<String>,
    pub token_modifiers: Vec<String>,
}

pub struct ServerSession {
    supervisor: Supervisor,
    status: ConnectionStatus,
    trace: Trace,
    pending: HashMap<RequestId, PendingRequest>,
    notifications: VecDeque<Notification>,
    decoder: FrameDecoder,
    next_id: RequestId,
    legend: Legend,
    server_info: Option<ServerInfo>,
    server_capabilities: Value,
    debug_flags: crate::capabilities::DebugFlags,
    read_scratch: Vec<u8>,
    shutdown_timeout: Duration,
}

impl ServerSession {
    /// Spawns the server and sends `initialize`, moving the session to
    /// `Connecting`.
    pub fn connect(
        command: &str,
        params: &ConnectParams,
        client_info: &ClientInfo,
        locale: &str,
        debug_flags: crate::capabilities::DebugFlags,
        allocator: Arc<dyn Allocator>,
    ) -> Result<Self> {
        let spawn_params = SpawnParams {
            args: &params.args,
            current_dir: None,
            seek_path_env: params.seek_path_env,
        };
        let supervisor = Supervisor::spawn(command, &spawn_params)?;

        let mut session = Self {
            supervisor,
            status: ConnectionStatus::NotConnected,
            trace: params.trace,
            pending: HashMap::new(),
            notifications: VecDeque::new(),
            decoder: FrameDecoder::with_allocator(allocator),
            next_id: 1,
            legend: Legend::default(),
            server_info: None,
            server_capabilities: Value::Null,
            debug_flags,
            read_scratch: Vec::new(),
            shutdown_timeout: Duration::from_secs(params.shutdown_timeout_secs.max(1)),
        };

        let init_params = build_initialize_params(&session.supervisor, client_info, locale, params);
        session.send_request("initialize", Some(init_params), PendingContext::None)?;
        session.status = ConnectionStatus::Connecting;
        Ok(session)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub fn has_failed(&self) -> bool {
        self.supervisor.has_failed()
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn send_request(
        &mut self,
        method: &'static str,
        params: Option<Value>,
        context: PendingContext,
    ) -> Result<RequestId> {
        let id = self.next_request_id();
        let message = rpc::build_request(id, method, params);
        self.write(&message)?;
        self.pending.insert(id, PendingRequest { id, method, context });
        Ok(id)
    }

    fn send_notification(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        let message = rpc::build_notification(method, params);
        self.write(&message)
    }

    fn write(&mut self, message: &Value) -> Result<()> {
        let body = json::encode(message);
        if self
            .debug_flags
            .contains(crate::capabilities::DebugFlags::PRINT_REQUESTS)
        {
            log::debug!("--> {}", json::encode_string(message));
        }
        let frame = encode_frame(&body);
        self.supervisor.write_all(&frame)
    }

    /// Reads whatever is available from the child, decodes complete
    /// frames, and routes each to either a pending request or the
    /// notification queue. Never blocks.
    pub fn pump(&mut self) {
        if self.supervisor.has_failed() {
            self.fail_all_pending();
            return;
        }
        self.read_scratch.clear();
        let status = self.supervisor.read_available(&mut self.read_scratch);
        // A short final read can land bytes in `read_scratch` and still
        // report Eof on the same call (the kernel handed back the last
        // chunk and then an immediate zero-byte read) — feed whatever
        // arrived before acting on the status.
        if !self.read_scratch.is_empty() {
            let bytes = std::mem::take(&mut self.read_scratch);
            self.decoder.feed(&bytes);
        }
        match status {
            Ok(ReadStatus::Data(_)) | Ok(ReadStatus::WouldBlock) => {}
            Ok(ReadStatus::Eof) => {
                self.drain_decoded_frames();
                self.fail_all_pending();
                return;
            }
            Err(e) => {
                log::warn!("session read failed: {e}");
                self.fail_all_pending();
                return;
            }
        }

        self.drain_decoded_frames();
    }

    fn drain_decoded_frames(&mut self) {
        loop {
            match self.decoder.poll() {
                Ok(Some(body)) => self.handle_body(&body),
                Ok(None) => break,
                Err(e) => {
                    log::warn!("framing error: {e}");
                    self.fail_all_pending();
                    break;
                }
            }
        }
    }

    fn handle_body(&mut self, body: &[u8]) {
        let Some(value) = json::decode(body) else {
            log::warn!("discarding message that failed to decode as JSON");
            return;
        };
        if self
            .debug_flags
            .contains(crate::capabilities::DebugFlags::PRINT_RESPONSES)
        {
            log::debug!("<-- {}", json::encode_string(&value));
        }
        match rpc::classify(&value) {
            Inbound::Response { id, outcome } => self.handle_response(id, outcome),
            Inbound::Notification { method, params } => self.handle_server_notification(&method, params),
            Inbound::Invalid => log::warn!("discarding message with neither id nor method"),
        }
    }

    fn handle_response(&mut self, id: RequestId, outcome: std::result::Result<Value, rpc::RpcError>) {
        let Some(pending) = self.pending.remove(&id) else {
            log::warn!("unmatched response for id {id}");
            return;
        };
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                let error = Error::Server {
                    code: err.code,
                    message: err.message,
                };
                log::warn!("request {} failed: {error}", pending.method);
                return;
            }
        };
        match pending.method {
            "initialize" => self.handle_initialize_result(&result),
            "shutdown" => {
                self.status = ConnectionStatus::NotConnected;
            }
            "textDocument/documentSymbol" => self.handle_document_symbol_result(pending.context, &result),
            "textDocument/hover" => self.handle_hover_result(pending.context, &result),
            "textDocument/semanticTokens/full" => self.handle_semantic_tokens_result(pending.context, &result),
            _ => {}
        }
    }

    fn handle_initialize_result(&mut self, result: &Value) {
        self.server_capabilities = result.get("capabilities").clone();
        let info = result.get("serverInfo");
        self.server_info = Some(ServerInfo {
            name: info.get("name").as_str().unwrap_or_default().to_string(),
            version: info.get("version").as_str().unwrap_or_default().to_string(),
        });

        let legend = self
            .server_capabilities
            .get("semanticTokensProvider")
            .get("legend");
        self.legend = Legend {
            token_types: string_array(legend.get("tokenTypes")),
            token_modifiers: string_array(legend.get("tokenModifiers")),
        };

        self.status = ConnectionStatus::Connected;
        let _ = self.send_notification("initialized", Some(Value::object()));
    }

    fn handle_server_notification(&mut self, method: &str, params: Value) {
        match method {
            "textDocument/publishDiagnostics" => {
                let uri = params.get("uri").as_str().unwrap_or_default().to_string();
                let diagnostics = params
                    .get("diagnostics")
                    .as_array()
                    .unwrap_or(&[])
                    .iter()
                    .map(decode_diagnostic)
                    .collect();
                self.notifications
                    .push_back(Notification::PublishDiagnostics { uri, diagnostics });
            }
            "window/logMessage" | "$/progress" => {
                log::info!("{method}: {}", json::encode_string(&params));
            }
            other => log::debug!("ignoring unhandled server notification {other}"),
        }
    }

    fn handle_document_symbol_result(&mut self, context: PendingContext, result: &Value) {
        let PendingContext::DocumentUri(uri) = context else {
            return;
        };
        let mut symbols = Vec::new();
        flatten_symbols(result, &mut symbols);
        self.notifications
            .push_back(Notification::TextDocumentSymbols { uri, symbols });
    }

    fn handle_hover_result(&mut self, context: PendingContext, result: &Value) {
        let PendingContext::DocumentUri(uri) = context else {
            return;
        };
        let contents = flatten_hover_contents(result.get("contents"));
        self.notifications
            .push_back(Notification::Hover { uri, contents });
    }

    fn handle_semantic_tokens_result(&mut self, context: PendingContext, result: &Value) {
        let PendingContext::DocumentUri(uri) = context else {
            return;
        };
        let result_id = result.get("resultId").as_str().map(str::to_string);
        let data = result.get("data").as_array().unwrap_or(&[]);
        let tokens = decode_semantic_tokens(data, &self.legend);
        self.notifications.push_back(Notification::SemanticTokens {
            uri,
            result_id,
            tokens,
        });
    }

    fn fail_all_pending(&mut self) {
        if self.pending.is_empty() && self.status == ConnectionStatus::NotConnected {
            return;
        }
        self.pending.clear();
        self.notifications.clear();
        self.status = ConnectionStatus::NotConnected;
    }

    /// Dequeues the oldest enqueued notification, if any.
    pub fn poll_notification(&mut self) -> Option<Notification> {
        self.notifications.pop_front()
    }

    pub fn set_trace(&mut self, trace: Trace) -> Result<()> {
        self.trace = trace;
        let mut params = Value::object();
        params.object_set("value", Value::string(trace.as_str()));
        self.send_notification("$/setTrace", Some(params))
    }

    pub fn did_open(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Protocol(format!("failed to read {}: {e}", path.display())))?;
        let uri = file_uri(path);
        let language_id = infer_language_id(path);
        let mut text_document = Value::object();
        text_document.object_set("uri", Value::string(uri));
        text_document.object_set("languageId", Value::string(language_id));
        text_document.object_set("version", Value::from(1i64));
        text_document.object_set("text", Value::string(text));
        let mut params = Value::object();
        params.object_set("textDocument", text_document);
        self.send_notification("textDocument/didOpen", Some(params))
    }

    pub fn did_close(&mut self, path: &Path) -> Result<()> {
        let uri = file_uri(path);
        let mut text_document = Value::object();
        text_document.object_set("uri", Value::string(uri));
        let mut params = Value::object();
        params.object_set("textDocument", text_document);
        self.send_notification("textDocument/didClose", Some(params))
    }

    pub fn document_symbol(&mut self, path: &Path) -> Result<RequestId> {
        let uri = file_uri(path);
        let params = text_document_params(&uri);
        self.send_request(
            "textDocument/documentSymbol",
            Some(params),
            PendingContext::DocumentUri(uri),
        )
    }

    pub fn hover(&mut self, path: &Path, line: u32, character: u32) -> Result<RequestId> {
        let uri = file_uri(path);
        let mut params = text_document_params(&uri);
        let mut position = Value::object();
        position.object_set("line", Value::from(line));
        position.object_set("character", Value::from(character));
        params.object_set("position", position);
        self.send_request(
            "textDocument/hover",
            Some(params),
            PendingContext::DocumentUri(uri),
        )
    }

    pub fn semantic_tokens(&mut self, path: &Path) -> Result<RequestId> {
        let uri = file_uri(path);
        let params = text_document_params(&uri);
        self.send_request(
            "textDocument/semanticTokens/full",
            Some(params),
            PendingContext::DocumentUri(uri),
        )
    }

    /// Runs the bounded `shutdown` → `exit` handshake (a 1 second default
    /// timeout before forcible termination), then kills the child
    /// unconditionally.
    pub fn close(&mut self) {
        if self.send_request("shutdown", None, PendingContext::Shutdown).is_ok() {
            let deadline = Instant::now() + self.shutdown_timeout;
            while Instant::now() < deadline {
                self.pump();
                if self.status == ConnectionStatus::NotConnected {
                    break;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            let _ = self.send_notification("exit", None);
        }
        self.supervisor.terminate();
        self.pending.clear();
        self.notifications.clear();
        self.status = ConnectionStatus::NotConnected;
    }
}

fn text_document_params(uri: &str) -> Value {
    let mut text_document = Value::object();
    text_document.object_set("uri", Value::string(uri.to_string()));
    let mut params = Value::object();
    params.object_set("textDocument", text_document);
    params
}

fn build_initialize_params(
    supervisor: &Supervisor,
    client_info: &ClientInfo,
    locale: &str,
    params: &ConnectParams,
) -> Value {
    let mut init = Value::object();
    init.object_set("processId", Value::from(supervisor.pid() as i64));

    let mut info = Value::object();
    info.object_set("name", Value::string(client_info.name.clone()));
    info.object_set("version", Value::string(client_info.version.clone()));
    init.object_set("clientInfo", info);

    init.object_set("locale", Value::string(locale.to_string()));
    init.object_set(
        "rootUri",
        match &params.root_uri {
            Some(uri) => Value::string(uri.clone()),
            None => Value::Null,
        },
    );
    init.object_set("trace", Value::string(params.trace.as_str()));
    init.object_set("capabilities", build_capabilities(&params.capabilities));
    init
}

/// Only capability bits the caller actually turned on are emitted.
fn build_capabilities(caps: &Capabilities) -> Value {
    let mut text_document = Value::object();
    if caps.hover {
        text_document.object_set("hover", Value::object());
    }
    if caps.document_symbol {
        text_document.object_set("documentSymbol", Value::object());
    }
    if caps.semantic_tokens {
        text_document.object_set("semanticTokens", Value::object());
    }
    if caps.publish_diagnostics {
        text_document.object_set("publishDiagnostics", Value::object());
    }

    let mut root = Value::object();
    if !matches!(&text_document, Value::Object(o) if o.is_empty()) {
        root.object_set("textDocument", text_document);
    }
    if caps.workspace_configuration {
        let mut workspace = Value::object();
        workspace.object_set("configuration", Value::Bool(true));
        root.object_set("workspace", workspace);
    }
    root
}

fn string_array(value: &Value) -> Vec<String> {
    value
        .as_array()
        .unwrap_or(&[])
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn decode_diagnostic(value: &Value) -> Diagnostic {
    Diagnostic {
        range: decode_range(value.get("range")),
        severity: value.get("severity").as_i64(),
        message: value.get("message").as_str().unwrap_or_default().to_string(),
    }
}

fn decode_range(value: &Value) -> Range {
    Range {
        start: decode_position(value.get("start")),
        end: decode_position(value.get("end")),
    }
}

fn decode_position(value: &Value) -> Position {
    Position {
        line: value.get("line").as_i64().unwrap_or(0) as u32,
        character: value.get("character").as_i64().unwrap_or(0) as u32,
    }
}

/// Flattens either the flat `SymbolInformation[]` shape (has `location`) or
/// the nested `DocumentSymbol[]` shape (has `children`) into a single
/// depth-first sequence.
fn flatten_symbols(result: &Value, out: &mut Vec<DocumentSymbol>) {
    let Some(entries) = result.as_array() else {
        return;
    };
    for entry in entries {
        flatten_symbol_entry(entry, out);
    }
}

fn flatten_symbol_entry(entry: &Value, out: &mut Vec<DocumentSymbol>) {
    let name = entry.get("name").as_str().unwrap_or_default().to_string();
    let kind = entry.get("kind").as_i64().unwrap_or(0);
    let range_source = if entry.get("location").is_null() {
        entry.get("range")
    } else {
        entry.get("location").get("range")
    };
    out.push(DocumentSymbol {
        name,
        kind,
        range: decode_range(range_source),
    });
    if let Some(children) = entry.get("children").as_array() {
        for child in children {
            flatten_symbol_entry(child, out);
        }
    }
}

/// Flattens `contents`, which may be a bare string, a `MarkupContent`
/// object, or a `MarkedString[]` array, into one string. Array entries are
/// joined with a blank line.
fn flatten_hover_contents(contents: &Value) -> String {
    match contents {
        Value::Str(s) => s.as_str().to_string(),
        Value::Object(_) => {
            if let Some(value) = contents.get("value").as_str() {
                value.to_string()
            } else {
                contents
                    .get("language")
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_default()
            }
        }
        Value::Array(items) => items
            .iter()
            .map(marked_string_to_str)
            .collect::<Vec<_>>()
            .join("\n\n"),
        _ => String::new(),
    }
}

fn marked_string_to_str(value: &Value) -> String {
    match value {
        Value::Str(s) => s.as_str().to_string(),
        Value::Object(_) => value.get("value").as_str().unwrap_or_default().to_string(),
        _ => String::new(),
    }
}

/// Decodes the raw semantic-token 5-tuples (`deltaLine, deltaStart, length,
/// tokenType, tokenModifiers`) into absolute tokens, with modifiers
/// decoded as a bitmask indexed into the legend, per the LSP specification.
fn decode_semantic_tokens(data: &[Value], legend: &Legend) -> Vec<SemanticToken> {
    let mut tokens = Vec::new();
    let mut line = 0u32;
    let mut character = 0u32;
    for chunk in data.chunks_exact(5) {
        let delta_line = chunk[0].as_i64().unwrap_or(0) as u32;
        let delta_start = chunk[1].as_i64().unwrap_or(0) as u32;
        let length = chunk[2].as_i64().unwrap_or(0) as u32;
        let token_type = chunk[3].as_i64().unwrap_or(0) as usize;
        let modifiers_mask = chunk[4].as_i64().unwrap_or(0) as u32;

        if delta_line > 0 {
            character = delta_start;
        } else {
            character += delta_start;
        }
        line += delta_line;

        let token_type = legend
            .token_types
            .get(token_type)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        let token_modifiers = (0..legend.token_modifiers.len())
            .filter(|i| modifiers_mask & (1 << i) != 0)
            .map(|i| legend.token_modifiers[i].clone())
            .collect();

        tokens.push(SemanticToken {
            line,
            character,
            length,
            token_type,
            token_modifiers,
        });
    }
    tokens
}

fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn infer_language_id(path: &Path) -> String {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("rs") => "rust",
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("go") => "go",
        Some("c") => "c",
        Some("cpp") | Some("cc") | Some("cxx") => "cpp",
        Some("json") => "json",
        Some("toml") => "toml",
        _ => "plaintext",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_document_symbols_depth_first() {
        let mut outer = Value::object();
        outer.object_set("name", Value::string("Outer".to_string()));
        outer.object_set("kind", Value::from(2i64));
        outer.object_set("range", Value::object());
        let mut inner = Value::object();
        inner.object_set("name", Value::string("inner".to_string()));
        inner.object_set("kind", Value::from(6i64));
        inner.object_set("range", Value::object());
        outer.object_set("children", Value::Array(vec![inner]));

        let mut results = Value::array();
        results.array_push(outer);
        let mut out = Vec::new();
        flatten_symbols(&results, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "Outer");
        assert_eq!(out[1].name, "inner");
    }

    #[test]
    fn flattens_symbol_information_location_shape() {
        let mut range = Value::object();
        range.object_set("start", Value::object());
        range.object_set("end", Value::object());
        let mut location = Value::object();
        location.object_set("uri", Value::string("file:///a".to_string()));
        location.object_set("range", range);
        let mut sym = Value::object();
        sym.object_set("name", Value::string("foo".to_string()));
        sym.object_set("kind", Value::from(12i64));
        sym.object_set("location", location);

        let mut results = Value::array();
        results.array_push(sym);
        let mut out = Vec::new();
        flatten_symbols(&results, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "foo");
    }

    #[test]
    fn flattens_markup_content_hover() {
        let mut markup = Value::object();
        markup.object_set("kind", Value::string("markdown".to_string()));
        markup.object_set("value", Value::string("**x**: int".to_string()));
        assert_eq!(flatten_hover_contents(&markup), "**x**: int");
    }

    #[test]
    fn flattens_marked_string_array_hover_with_blank_line_join() {
        let mut arr = Value::array();
        arr.array_push(Value::string("a".to_string()));
        arr.array_push(Value::string("b".to_string()));
        assert_eq!(flatten_hover_contents(&arr), "a\n\nb");
    }

    #[test]
    fn empty_hover_contents_is_empty_string() {
        assert_eq!(flatten_hover_contents(&Value::Null), "");
    }

    #[test]
    fn decodes_semantic_token_deltas_against_legend() {
        let legend = Legend {
            token_types: vec!["variable".to_string(), "function".to_string()],
            token_modifiers: vec!["readonly".to_string()],
        };
        let data: Vec<Value> = [0, 1, 3, 0, 1, 1, 2, 4, 1, 0]
            .iter()
            .map(|&n| Value::from(n as i64))
            .collect();
        let tokens = decode_semantic_tokens(&data, &legend);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].line, 0);
        assert_eq!(tokens[0].character, 1);
        assert_eq!(tokens[0].length, 3);
        assert_eq!(tokens[0].token_type, "variable");
        assert_eq!(tokens[0].token_modifiers, vec!["readonly".to_string()]);
        assert_eq!(tokens[1].line, 1);
        assert_eq!(tokens[1].character, 2);
        assert_eq!(tokens[1].token_type, "function");
        assert!(tokens[1].token_modifiers.is_empty());
    }

    #[test]
    fn infers_language_id_from_extension() {
        assert_eq!(infer_language_id(Path::new("main.rs")), "rust");
        assert_eq!(infer_language_id(Path::new("README")), "plaintext");
    }
}
