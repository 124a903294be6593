//! End-to-end scenarios against the scripted mock server in
//! `src/bin/mock_lsp_server.rs`.

use std::path::Path;
use std::time::{Duration, Instant};

use lsp_client::{ConnectParams, ConnectionStatus, Context, Notification};

fn mock_server_path() -> &'static str {
    let _ = env_logger::builder().is_test(true).try_init();
    env!("CARGO_BIN_EXE_mock_lsp_server")
}

fn connect_params() -> ConnectParams {
    let mut params = ConnectParams::new();
    params.capabilities.hover = true;
    params.capabilities.document_symbol = true;
    params.capabilities.semantic_tokens = true;
    params
}

/// Polls `process_responses` until `condition` holds or 200ms elapse.
fn poll_until(ctx: &mut Context, mut condition: impl FnMut(&mut Context) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(200);
    loop {
        ctx.process_responses();
        if condition(ctx) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn initialize_handshake_reaches_connected() {
    let mut ctx = Context::init();
    let id = ctx.connect(mock_server_path(), &connect_params());
    assert_ne!(id, lsp_client::INVALID_SERVER_ID);

    let reached = poll_until(&mut ctx, |ctx| {
        ctx.get_connection_status(id) == Some(ConnectionStatus::Connected)
    });
    assert!(reached, "session never reached Connected");

    ctx.close(id);
}

#[test]
fn document_symbol_flattens_in_order() {
    let mut ctx = Context::init();
    let id = ctx.connect(mock_server_path(), &connect_params());
    poll_until(&mut ctx, |ctx| {
        ctx.get_connection_status(id) == Some(ConnectionStatus::Connected)
    });

    ctx.text_document_symbol(id, Path::new("foo.rs")).unwrap();
    let mut notification = None;
    poll_until(&mut ctx, |ctx| {
        notification = ctx.poll_notification(id);
        notification.is_some()
    });
    match notification.expect("expected a TextDocumentSymbols notification") {
        Notification::TextDocumentSymbols { symbols, .. } => {
            assert_eq!(symbols.len(), 2);
            assert_eq!(symbols[0].name, "foo");
            assert_eq!(symbols[1].name, "bar");
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    ctx.close(id);
}

#[test]
fn hover_contents_are_flattened_from_markup_content() {
    let mut ctx = Context::init();
    let id = ctx.connect(mock_server_path(), &connect_params());
    poll_until(&mut ctx, |ctx| {
        ctx.get_connection_status(id) == Some(ConnectionStatus::Connected)
    });

    ctx.text_document_hover(id, Path::new("foo.rs"), 0, 0).unwrap();
    let mut notification = None;
    poll_until(&mut ctx, |ctx| {
        notification = ctx.poll_notification(id);
        notification.is_some()
    });
    match notification.expect("expected a Hover notification") {
        Notification::Hover { contents, .. } => assert_eq!(contents, "**x**: int"),
        other => panic!("unexpected notification: {other:?}"),
    }

    ctx.close(id);
}

#[test]
fn semantic_tokens_decode_against_legend() {
    let mut ctx = Context::init();
    let id = ctx.connect(mock_server_path(), &connect_params());
    poll_until(&mut ctx, |ctx| {
        ctx.get_connection_status(id) == Some(ConnectionStatus::Connected)
    });

    ctx.text_document_semantic_tokens(id, Path::new("foo.rs")).unwrap();
    let mut notification = None;
    poll_until(&mut ctx, |ctx| {
        notification = ctx.poll_notification(id);
        notification.is_some()
    });
    match notification.expect("expected a SemanticTokens notification") {
        Notification::SemanticTokens { tokens, .. } => {
            assert_eq!(tokens.len(), 2);
            assert_eq!(tokens[0].line, 0);
            assert_eq!(tokens[0].character, 1);
            assert_eq!(tokens[0].token_type, "variable");
            assert_eq!(tokens[0].token_modifiers, vec!["readonly".to_string()]);
            assert_eq!(tokens[1].line, 1);
            assert_eq!(tokens[1].character, 2);
            assert_eq!(tokens[1].token_type, "function");
            assert!(tokens[1].token_modifiers.is_empty());
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    ctx.close(id);
}

#[test]
fn killing_the_server_mid_session_fails_the_session() {
    let mut ctx = Context::init();
    let mut params = connect_params();
    params.args.push("--die-after=1".to_string());
    let id = ctx.connect(mock_server_path(), &params);
    poll_until(&mut ctx, |ctx| {
        ctx.get_connection_status(id) != Some(ConnectionStatus::NotConnected) || ctx.get_connection_status(id).is_none()
    });

    // `--die-after=1` makes the child exit right after answering
    // `initialize`, once it receives the `initialized` notification that
    // follows — before this request gets a response.
    let _ = ctx.text_document_symbol(id, Path::new("foo.rs"));
    poll_until(&mut ctx, |ctx| ctx.get_connection_status(id).is_none());
    assert_eq!(ctx.get_connection_status(id), None, "failed session should be destroyed");

    assert!(ctx
        .text_document_hover(id, Path::new("foo.rs"), 0, 0)
        .is_err());
}

#[test]
fn two_concurrent_sessions_do_not_cross_deliver_notifications() {
    let mut ctx = Context::init();
    let a = ctx.connect(mock_server_path(), &connect_params());
    let b = ctx.connect(mock_server_path(), &connect_params());
    poll_until(&mut ctx, |ctx| {
        ctx.get_connection_status(a) == Some(ConnectionStatus::Connected)
            && ctx.get_connection_status(b) == Some(ConnectionStatus::Connected)
    });

    ctx.text_document_hover(a, Path::new("a.rs"), 0, 0).unwrap();
    let mut notification = None;
    poll_until(&mut ctx, |ctx| {
        notification = ctx.poll_notification(a);
        notification.is_some()
    });
    assert!(notification.is_some());
    assert!(ctx.poll_notification(b).is_none());

    ctx.close(a);
    ctx.close(b);
}

#[test]
fn did_open_reads_real_file_contents_onto_disk() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("snippet.rs");
    std::fs::write(&file_path, "fn main() {}\n").unwrap();

    let mut ctx = Context::init();
    let id = ctx.connect(mock_server_path(), &connect_params());
    poll_until(&mut ctx, |ctx| {
        ctx.get_connection_status(id) == Some(ConnectionStatus::Connected)
    });

    ctx.text_document_did_open(id, &file_path).unwrap();
    ctx.text_document_did_close(id, &file_path).unwrap();

    // Both are notifications; the mock server never answers them, so
    // nothing should show up on the notification queue for this call.
    ctx.process_responses();
    assert!(ctx.poll_notification(id).is_none());

    ctx.close(id);
}

#[test]
fn did_open_on_missing_file_is_a_protocol_error() {
    let mut ctx = Context::init();
    let id = ctx.connect(mock_server_path(), &connect_params());
    poll_until(&mut ctx, |ctx| {
        ctx.get_connection_status(id) == Some(ConnectionStatus::Connected)
    });

    let err = ctx
        .text_document_did_open(id, Path::new("/no/such/file.rs"))
        .unwrap_err();
    assert!(matches!(err, lsp_client::Error::Protocol(_)));

    ctx.close(id);
}
