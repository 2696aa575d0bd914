// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::log::LogType;

#[test]
fn names_follow_wire_convention() {
    let entry = LogEntry::new(LogType::Stdout, "x");
    assert_eq!(Event::Log { entry }.name(), "log");
    assert_eq!(
        Event::StateChange { key: "k".into(), value: 1.into(), old_value: None }.name(),
        "stateChange"
    );
    assert_eq!(Event::Custom { name: "tick".into(), payload: Value::Null }.name(), "event");
}

#[test]
fn state_change_serializes_tagged() {
    let ev = Event::StateChange {
        key: "counter".into(),
        value: 2.into(),
        old_value: Some(1.into()),
    };
    let json = serde_json::to_value(&ev).unwrap();
    assert_eq!(json["type"], "stateChange");
    assert_eq!(json["oldValue"], 1);
}

#[test]
fn process_exited_round_trips() {
    let ev = Event::ProcessExited { exit_code: Some(137) };
    let s = serde_json::to_string(&ev).unwrap();
    let back: Event = serde_json::from_str(&s).unwrap();
    assert_eq!(back, ev);
}
