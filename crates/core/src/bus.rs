// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus: per-subscriber channels with optional name filtering.
//!
//! Each subscriber owns an unbounded receiver, so a slow or dropped
//! subscriber never blocks emission and a failing consumer cannot affect
//! the others. Emission is synchronous and lock-scoped; closed channels
//! are pruned on the next emit.

use crate::event::Event;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Token returned by [`EventBus::on`], used to unsubscribe.
pub type SubscriberId = u64;

struct Subscriber {
    id: SubscriberId,
    /// When set, only events whose [`Event::name`] matches are delivered.
    filter: Option<String>,
    tx: mpsc::UnboundedSender<Event>,
}

/// Cloneable handle to a shared subscriber registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

#[derive(Default)]
struct BusInner {
    next_id: SubscriberId,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events whose name equals `filter`, or to all events
    /// when `filter` is `None`.
    pub fn on(&self, filter: Option<&str>) -> (SubscriberId, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.subscribers.push(Subscriber { id, filter: filter.map(String::from), tx });
        (id, rx)
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn off(&self, id: SubscriberId) {
        self.inner.lock().subscribers.retain(|s| s.id != id);
    }

    /// Deliver an event to every matching subscriber.
    ///
    /// Send failures mean the receiver was dropped; those subscribers are
    /// removed rather than surfaced to the caller.
    pub fn emit(&self, event: &Event) {
        let name = event.name().to_string();
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|s| {
            if s.filter.as_deref().is_some_and(|f| f != name) {
                return true;
            }
            s.tx.send(event.clone()).is_ok()
        });
    }

    /// Number of live subscribers (diagnostics).
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
