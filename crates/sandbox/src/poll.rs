// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental JSONL parsing for the shim's log stream.
//!
//! Each poll consumes a contiguous suffix of the file starting at the
//! last-consumed byte offset, and only up to the final newline: a poll
//! either takes whole lines or nothing. Malformed lines are skipped; a
//! shrunken file (truncation on restart) resets the offset.

use serde::Deserialize;
use serde_json::Value;

/// One decoded `{type, data, ts}` line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShimMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub ts: u64,
}

/// Parse the unconsumed region of the log file.
///
/// Returns the decoded messages and the new byte offset. `offset` beyond
/// the file length means the file was truncated; parsing restarts at 0.
pub fn drain_lines(content: &[u8], offset: u64) -> (Vec<ShimMessage>, u64) {
    let start = if (offset as usize) > content.len() { 0 } else { offset as usize };
    let region = &content[start..];

    // Only consume up to the last complete line.
    let Some(last_newline) = region.iter().rposition(|&b| b == b'\n') else {
        return (Vec::new(), start as u64);
    };
    let consumed = &region[..=last_newline];

    let mut messages = Vec::new();
    for line in consumed.split(|&b| b == b'\n') {
        if line.is_empty() {
            continue;
        }
        match serde_json::from_slice::<ShimMessage>(line) {
            Ok(msg) => messages.push(msg),
            Err(_) => {
                tracing::debug!("shim log: skipping malformed line");
            }
        }
    }
    (messages, (start + last_newline + 1) as u64)
}

#[cfg(test)]
#[path = "poll_tests.rs"]
mod tests;
