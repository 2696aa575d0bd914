// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch registry: substring patterns over target output.

use parking_lot::Mutex;
use reflexive_core::Watch;
use std::sync::atomic::{AtomicU64, Ordering};

/// Registry of watches for one target. Matching runs once per log entry;
/// hits never cascade into further watches.
#[derive(Default)]
pub struct WatchRegistry {
    watches: Mutex<Vec<Watch>>,
    next_id: AtomicU64,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, pattern: impl Into<String>, prompt: Option<String>) -> Watch {
        let id = format!("watch_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut watch = Watch::new(id, pattern);
        watch.prompt = prompt;
        self.watches.lock().push(watch.clone());
        watch
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut watches = self.watches.lock();
        let before = watches.len();
        watches.retain(|w| w.id != id);
        watches.len() < before
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let mut watches = self.watches.lock();
        match watches.iter_mut().find(|w| w.id == id) {
            Some(watch) => {
                watch.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<Watch> {
        self.watches.lock().clone()
    }

    /// Increment hit counts for every enabled watch matching `message` and
    /// return the post-increment copies.
    pub fn match_message(&self, message: &str) -> Vec<Watch> {
        let mut watches = self.watches.lock();
        watches
            .iter_mut()
            .filter(|w| w.matches(message))
            .map(|w| {
                w.hit_count += 1;
                w.clone()
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
