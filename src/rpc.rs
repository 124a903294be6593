//! JSON-RPC 2.0 message shapes, built over this crate's own
//! [`Value`](crate::json::Value) rather than `serde_json` — the JSON model
//! is hand-rolled, so the wire types are too. Request/response/notification
//! shapes (`Id`, `MethodCall`/`Notification`, `Success`/`Failure`/`Output`)
//! follow the conventional JSON-RPC 2.0 shape, simplified to integer-only
//! ids.

use crate::json::Value;

/// A monotonic, per-session request id.
pub type RequestId = u64;

/// Builds a JSON-RPC request object: `{jsonrpc, id, method, params?}`.
pub fn build_request(id: RequestId, method: &str, params: Option<Value>) -> Value {
    let mut msg = Value::object();
    msg.object_set("jsonrpc", Value::from("2.0"));
    msg.object_set("id", Value::Int(id as i64));
    msg.object_set("method", Value::string(method.to_string()));
    if let Some(params) = params {
        msg.object_set("params", params);
    }
    msg
}

/// Builds a JSON-RPC notification object: `{jsonrpc, method, params?}`,
/// no `id`.
pub fn build_notification(method: &str, params: Option<Value>) -> Value {
    let mut msg = Value::object();
    msg.object_set("jsonrpc", Value::from("2.0"));
    msg.object_set("method", Value::string(method.to_string()));
    if let Some(params) = params {
        msg.object_set("params", params);
    }
    msg
}

/// What an inbound message turned out to be once shape is known.
pub enum Inbound {
    /// Has `id` and either `result` or `error`.
    Response {
        id: RequestId,
        outcome: std::result::Result<Value, RpcError>,
    },
    /// Has `method` but no `id`: a server-to-client notification.
    Notification { method: String, params: Value },
    /// Couldn't be classified as either (missing both `id`+result/error and
    /// `method`).
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Classifies a decoded JSON-RPC body: has `id` and (`result` or `error`)
/// means a response; no `id` but a `method` means a server-to-client
/// notification.
pub fn classify(value: &Value) -> Inbound {
    let id = value.get("id").as_i64();
    match id {
        Some(id) => {
            let id = id as RequestId;
            if !value.get("error").is_null() {
                let err = value.get("error");
                let code = err.get("code").as_i64().unwrap_or(-32603);
                let message = err
                    .get("message")
                    .as_str()
                    .unwrap_or("unknown server error")
                    .to_string();
                Inbound::Response {
                    id,
                    outcome: Err(RpcError { code, message }),
                }
            } else {
                Inbound::Response {
                    id,
                    outcome: Ok(value.get("result").clone()),
                }
            }
        }
        None => match value.get("method").as_str() {
            Some(method) => Inbound::Notification {
                method: method.to_string(),
                params: value.get("params").clone(),
            },
            None => Inbound::Invalid,
        },
    }
}

/// A request the session is waiting on a response for.
pub struct PendingRequest {
    pub id: RequestId,
    pub method: &'static str,
    pub context: PendingContext,
}

/// Caller-visible correlation stashed alongside a pending request so the
/// response handler knows what to build once the result arrives.
#[derive(Debug, Clone)]
pub enum PendingContext {
    None,
    DocumentUri(String),
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_success_response() {
        let mut v = Value::object();
        v.object_set("jsonrpc", Value::from("2.0"));
        v.object_set("id", Value::Int(3));
        v.object_set("result", Value::Bool(true));
        match classify(&v) {
            Inbound::Response { id, outcome } => {
                assert_eq!(id, 3);
                assert_eq!(outcome.unwrap(), Value::Bool(true));
            }
            _ => panic!("expected a response"),
        }
    }

    #[test]
    fn classifies_error_response() {
        let mut v = Value::object();
        v.object_set("id", Value::Int(1));
        let mut err = Value::object();
        err.object_set("code", Value::Int(-32601));
        err.object_set("message", Value::string("method not found".to_string()));
        v.object_set("error", err);
        match classify(&v) {
            Inbound::Response { outcome, .. } => {
                let e = outcome.unwrap_err();
                assert_eq!(e.code, -32601);
                assert_eq!(e.message, "method not found");
            }
            _ => panic!("expected an error response"),
        }
    }

    #[test]
    fn classifies_notification() {
        let mut v = Value::object();
        v.object_set("method", Value::string("window/logMessage".to_string()));
        match classify(&v) {
            Inbound::Notification { method, .. } => assert_eq!(method, "window/logMessage"),
            _ => panic!("expected a notification"),
        }
    }

    #[test]
    fn request_and_notification_have_expected_shape() {
        let req = build_request(1, "initialize", None);
        assert_eq!(req.get("jsonrpc").as_str(), Some("2.0"));
        assert_eq!(req.get("id"), &Value::Int(1));
        assert!(req.get("params").is_null());

        let note = build_notification("initialized", Some(Value::object()));
        assert!(note.get("id").is_null());
        assert_eq!(note.get("method").as_str(), Some("initialized"));
    }
}
