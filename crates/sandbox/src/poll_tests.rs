// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn line(kind: &str, data: Value) -> String {
    serde_json::json!({ "type": kind, "data": data, "ts": 1_706_200_000_000u64 }).to_string() + "\n"
}

#[test]
fn drains_whole_lines_and_advances_offset() {
    let content = [line("ready", serde_json::json!({"pid": 1})), line("log", serde_json::json!({}))]
        .concat()
        .into_bytes();
    let (messages, offset) = drain_lines(&content, 0);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].kind, "ready");
    assert_eq!(offset, content.len() as u64);

    // Nothing new: nothing consumed.
    let (again, offset2) = drain_lines(&content, offset);
    assert!(again.is_empty());
    assert_eq!(offset2, offset);
}

#[test]
fn partial_trailing_line_is_not_consumed() {
    let full = line("log", serde_json::json!({"level": "info", "message": "x"}));
    let mut content = full.clone().into_bytes();
    content.extend_from_slice(b"{\"type\":\"state\",\"da");
    let (messages, offset) = drain_lines(&content, 0);
    assert_eq!(messages.len(), 1);
    assert_eq!(offset, full.len() as u64, "offset stops at the last newline");

    // Completing the line makes it visible on the next poll.
    let mut completed = content.clone();
    completed.extend_from_slice(b"ta\":{\"key\":\"k\",\"value\":1},\"ts\":0}\n");
    let (rest, end) = drain_lines(&completed, offset);
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].kind, "state");
    assert_eq!(end, completed.len() as u64);
}

#[test]
fn malformed_lines_are_skipped() {
    let content =
        [line("ready", Value::Null), "not json at all\n".to_string(), line("log", Value::Null)]
            .concat()
            .into_bytes();
    let (messages, _) = drain_lines(&content, 0);
    let kinds: Vec<&str> = messages.iter().map(|m| m.kind.as_str()).collect();
    assert_eq!(kinds, ["ready", "log"]);
}

#[test]
fn truncated_file_resets_offset() {
    let content = line("ready", Value::Null).into_bytes();
    let (messages, offset) = drain_lines(&content, 9_999);
    assert_eq!(messages.len(), 1, "restart truncation re-reads from byte 0");
    assert_eq!(offset, content.len() as u64);
}

#[test]
fn empty_content_yields_nothing() {
    let (messages, offset) = drain_lines(b"", 0);
    assert!(messages.is_empty());
    assert_eq!(offset, 0);
}
