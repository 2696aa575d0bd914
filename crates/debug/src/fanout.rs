// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event fan-out shared by both adapters.

use crate::adapter::DebugEvent;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Every subscriber gets its own unbounded channel; closed receivers are
/// pruned on the next emit so a dropped consumer never blocks the reader
/// task.
#[derive(Default)]
pub(crate) struct EventFanout {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<DebugEvent>>>,
}

impl EventFanout {
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<DebugEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: DebugEvent) {
        self.subscribers.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }
}
