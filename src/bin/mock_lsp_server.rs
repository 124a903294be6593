//! Minimal scripted LSP server used only by the integration tests under
//! `tests/`. Speaks just enough JSON-RPC framing to answer the handful of
//! methods the test scenarios exercise; not part of the published library.

use std::io::{self, Read, Write};

fn main() {
    let die_after: Option<u32> = std::env::args()
        .find_map(|arg| arg.strip_prefix("--die-after=").map(str::to_string))
        .and_then(|v| v.parse().ok());
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();
    let mut request_count = 0u32;

    loop {
        let Some(body) = read_frame(&mut stdin) else {
            break;
        };
        request_count += 1;
        if let Some(limit) = die_after {
            if request_count > limit {
                std::process::exit(1);
            }
        }

        let method = extract_string_field(&body, "method");
        let id = extract_id(&body);

        let Some(method) = method else { continue };
        let Some(id) = id else { continue }; // notifications get no response

        let result = match method.as_str() {
            "initialize" => Some(
                r#"{"capabilities":{"semanticTokensProvider":{"legend":{"tokenTypes":["variable","function"],"tokenModifiers":["readonly"]}}},"serverInfo":{"name":"mock","version":"0.1"}}"#
                    .to_string(),
            ),
            "shutdown" => Some("null".to_string()),
            "textDocument/documentSymbol" => Some(
                r#"[{"name":"foo","kind":12,"range":{"start":{"line":0,"character":0},"end":{"line":0,"character":1}}},{"name":"bar","kind":6,"range":{"start":{"line":1,"character":0},"end":{"line":1,"character":1}}}]"#
                    .to_string(),
            ),
            "textDocument/hover" => Some(
                r#"{"contents":{"kind":"markdown","value":"**x**: int"}}"#.to_string(),
            ),
            "textDocument/semanticTokens/full" => {
                Some(r#"{"resultId":null,"data":[0,1,3,0,1,1,2,4,1,0]}"#.to_string())
            }
            _ => None,
        };

        if let Some(result) = result {
            let response = format!(r#"{{"jsonrpc":"2.0","id":{id},"result":{result}}}"#);
            write_frame(&mut stdout, response.as_bytes());
        }
    }
}

fn read_frame(stdin: &mut impl Read) -> Option<Vec<u8>> {
    let mut header = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if stdin.read(&mut byte).ok()? == 0 {
            return None;
        }
        header.push(byte[0]);
        if header.ends_with(b"\r\n\r\n") {
            break;
        }
    }
    let header_str = String::from_utf8_lossy(&header);
    let content_length: usize = header_str
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())
                .flatten()
        })?;
    let mut body = vec![0u8; content_length];
    stdin.read_exact(&mut body).ok()?;
    Some(body)
}

fn write_frame(stdout: &mut impl Write, body: &[u8]) {
    let _ = write!(stdout, "Content-Length: {}\r\n\r\n", body.len());
    let _ = stdout.write_all(body);
    let _ = stdout.flush();
}

fn extract_string_field(body: &[u8], field: &str) -> Option<String> {
    let text = std::str::from_utf8(body).ok()?;
    let needle = format!("\"{field}\":\"");
    let start = text.find(&needle)? + needle.len();
    let end = text[start..].find('"')? + start;
    Some(text[start..end].to_string())
}

fn extract_id(body: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(body).ok()?;
    let needle = "\"id\":";
    let start = text.find(needle)? + needle.len();
    let end = text[start..]
        .find(|c: char| c == ',' || c == '}')
        .map(|i| i + start)?;
    text[start..end].trim().parse().ok()
}
