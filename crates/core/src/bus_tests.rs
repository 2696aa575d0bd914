// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::log::{LogEntry, LogType};

fn log_event(msg: &str) -> Event {
    Event::Log { entry: LogEntry::new(LogType::Info, msg) }
}

#[test]
fn subscriber_receives_emitted_events() {
    let bus = EventBus::new();
    let (_id, mut rx) = bus.on(None);
    bus.emit(&log_event("hello"));
    let ev = rx.try_recv().unwrap();
    assert_eq!(ev.name(), "log");
}

#[test]
fn filter_limits_delivery_to_matching_names() {
    let bus = EventBus::new();
    let (_id, mut rx) = bus.on(Some("stateChange"));
    bus.emit(&log_event("noise"));
    bus.emit(&Event::StateChange { key: "k".into(), value: 1.into(), old_value: None });
    let ev = rx.try_recv().unwrap();
    assert_eq!(ev.name(), "stateChange");
    assert!(rx.try_recv().is_err(), "log event must not be delivered");
}

#[test]
fn off_removes_subscriber() {
    let bus = EventBus::new();
    let (id, mut rx) = bus.on(None);
    bus.off(id);
    bus.emit(&log_event("late"));
    assert!(rx.try_recv().is_err());
}

#[test]
fn dropped_receiver_does_not_block_others() {
    let bus = EventBus::new();
    let (_a, rx_a) = bus.on(None);
    let (_b, mut rx_b) = bus.on(None);
    drop(rx_a);
    bus.emit(&log_event("still delivered"));
    assert!(rx_b.try_recv().is_ok());
    assert_eq!(bus.subscriber_count(), 1, "closed subscriber is pruned");
}
