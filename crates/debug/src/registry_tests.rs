// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::PathBuf;
use yare::parameterized;

#[parameterized(
    js = { "main.js", "node" },
    mjs = { "main.mjs", "node" },
    py = { "app.py", "python" },
    go = { "main.go", "go" },
    rs = { "main.rs", "rust" },
)]
fn extension_maps_to_runtime(file: &str, runtime: &str) {
    let registry = Registry::with_builtins();
    let found = registry.get_by_file(&PathBuf::from(file)).unwrap();
    assert_eq!(found.name, runtime);
}

#[test]
fn unknown_extension_is_none() {
    let registry = Registry::with_builtins();
    assert!(registry.get_by_file(&PathBuf::from("main.zig")).is_none());
    assert!(registry.get_by_file(&PathBuf::from("no_extension")).is_none());
}

#[test]
fn node_args_pause_on_entry_with_inspect_brk() {
    let registry = Registry::with_builtins();
    let node = registry.get("node").unwrap();
    let args = node.build_args(9230, &PathBuf::from("app.js"), &["--flag".into()]);
    assert_eq!(args, ["--inspect-brk=9230", "app.js", "--flag"]);
}

#[test]
fn python_args_wait_for_client() {
    let registry = Registry::with_builtins();
    let python = registry.get("python").unwrap();
    let args = python.build_args(5679, &PathBuf::from("app.py"), &[]);
    assert_eq!(
        args,
        ["-m", "debugpy", "--listen", "127.0.0.1:5679", "--wait-for-client", "app.py"]
    );
    let env = python.build_env(5679);
    assert!(env.contains(&("PYTHONUNBUFFERED".to_string(), "1".to_string())));
}

#[test]
fn node_banner_yields_ws_url() {
    let registry = Registry::with_builtins();
    let node = registry.get("node").unwrap();
    let ready = node
        .parse_debug_ready(
            "Debugger listening on ws://127.0.0.1:9229/abc-def-123",
            9229,
        )
        .unwrap();
    assert_eq!(ready.ws_url.as_deref(), Some("ws://127.0.0.1:9229/abc-def-123"));
    assert!(node.parse_debug_ready("Listening on port 3000", 9229).is_none());
}

#[test]
fn python_banner_matches_listening_or_waiting() {
    let registry = Registry::with_builtins();
    let python = registry.get("python").unwrap();
    assert!(python.parse_debug_ready("Debugpy listening on 127.0.0.1:5678", 5678).is_some());
    assert!(python.parse_debug_ready("waiting for client", 5678).is_some());
    assert!(python.parse_debug_ready("Hello", 5678).is_none());
}

#[test]
fn go_banner_requires_port_match() {
    let registry = Registry::with_builtins();
    let go = registry.get("go").unwrap();
    assert!(go
        .parse_debug_ready("DAP server listening at: 127.0.0.1:38697", 38697)
        .is_some());
    assert!(go.parse_debug_ready("DAP server listening at: 127.0.0.1:9999", 38697).is_none());
}

#[test]
fn register_replaces_same_name() {
    let registry = Registry::with_builtins();
    let count = registry.list().len();
    let mut custom = registry.get("node").unwrap();
    custom.default_port = 9999;
    registry.register(custom);
    assert_eq!(registry.list().len(), count);
    assert_eq!(registry.get("node").unwrap().default_port, 9999);
}

#[test]
fn unregister_reports_removal() {
    let registry = Registry::with_builtins();
    assert!(registry.unregister("dotnet"));
    assert!(!registry.unregister("dotnet"));
    assert!(registry.get("dotnet").is_none());
}

#[test]
fn create_adapter_matches_protocol() {
    let registry = Registry::with_builtins();
    let node = registry.get("node").unwrap();
    let adapter = node.create_adapter();
    assert!(!adapter.is_connected());
    let python = registry.get("python").unwrap();
    assert_eq!(python.protocol, DebugProtocol::Dap);
}
