//! Depth-first JSON encoder. No pretty-printing; object key order follows
//! the `Value::Object`'s insertion order.

use super::value::{JsonStr, Value};

/// Serializes `value` to a UTF-8 byte sequence.
pub fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_value(value, &mut out);
    out
}

/// Convenience wrapper for call sites that want a `String` (the body is
/// always valid UTF-8, constructed from our own escaping).
pub fn encode_string(value: &Value) -> String {
    // SAFETY-free: write_value only ever pushes ASCII or UTF-8-safe bytes
    // copied from an existing &str, so this can't produce invalid UTF-8.
    String::from_utf8(encode(value)).expect("JSON encoder only emits valid UTF-8")
}

fn write_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Int(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Value::Float(f) => out.extend_from_slice(format_float(*f).as_bytes()),
        Value::Str(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out);
            }
            out.push(b']');
        }
        Value::Object(map) => {
            out.push(b'{');
            for (i, (key, val)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_raw_str(key, out);
                out.push(b':');
                write_value(val, out);
            }
            out.push(b'}');
        }
    }
}

/// Locale-independent decimal representation with enough precision to
/// round-trip; Rust's `f64::to_string` already satisfies both (it is not
/// locale-sensitive and uses the shortest round-tripping representation).
fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
        // JSON has no distinct float/int lexical form; keep a trailing
        // ".0" so a round trip through the decoder still classifies this
        // token as a float (the decoder dispatches on seeing '.').
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn write_string(s: &JsonStr, out: &mut Vec<u8>) {
    write_raw_str(s.as_str(), out)
}

fn write_raw_str(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\u{0008}' => out.extend_from_slice(b"\\b"),
            '\u{000C}' => out.extend_from_slice(b"\\f"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}
