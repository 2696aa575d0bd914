// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inject shim for sandboxed targets.
//!
//! Unlike the local shim (which dials a Unix socket back to the
//! supervisor), the sandbox variant appends JSONL lines of
//! `{type, data, ts}` to a well-known log file that the manager polls from
//! outside. At startup it ingests `/tmp/reflexive-state.json` when a
//! resumed snapshot seeded one.

/// Node preload source uploaded to [`crate::SHIM_FILE`].
pub const SANDBOX_SHIM: &str = r#"// reflexive sandbox shim (preloaded via --require)
'use strict';
const fs = require('fs');
const LOG_FILE = '/tmp/reflexive-logs.jsonl';
const STATE_SEED = '/tmp/reflexive-state.json';
const state = Object.create(null);

try {
  const seeded = JSON.parse(fs.readFileSync(STATE_SEED, 'utf8'));
  for (const [key, value] of Object.entries(seeded)) state[key] = value;
} catch {}

function emit(type, data) {
  const line = JSON.stringify({ type, data, ts: Date.now() }) + '\n';
  try { fs.appendFileSync(LOG_FILE, line); } catch {}
}

global.reflexive = {
  setState(key, value) {
    state[key] = value;
    emit('state', { key, value });
  },
  getState(key) { return key === undefined ? { ...state } : state[key]; },
  log(level, message, meta) {
    emit('log', { level, message: String(message), meta });
  },
  emit(event, payload) {
    emit('event', { event, payload });
  },
};

process.on('uncaughtException', (err) => {
  emit('error', { name: err.name, message: err.message, stack: err.stack });
});
process.on('unhandledRejection', (reason) => {
  const err = reason instanceof Error ? reason : new Error(String(reason));
  emit('error', { name: 'UnhandledRejection', message: err.message, stack: err.stack });
});

emit('ready', { pid: process.pid, nodeVersion: process.version, platform: process.platform });
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shim_targets_well_known_paths() {
        assert!(SANDBOX_SHIM.contains(crate::LOG_FILE));
        assert!(SANDBOX_SHIM.contains(crate::STATE_SEED_FILE));
        assert!(SANDBOX_SHIM.contains("'ready'") || SANDBOX_SHIM.contains("emit('ready'"));
    }
}
