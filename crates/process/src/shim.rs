// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded Node shim preloaded into the target with `--require`.
//!
//! The shim dials the Unix socket named by `REFLEXIVE_IPC` and speaks
//! newline-delimited JSON: `ready/log/state/event/error` upward,
//! `evaluate/query_state` downward (answered with `eval_response` /
//! `state_response`). Evaluation is only honored when the supervisor
//! enabled it at spawn time via `REFLEXIVE_EVAL=1`.

use std::path::{Path, PathBuf};

/// Node preload source. Written to disk at spawn time; the target runs it
/// via `NODE_OPTIONS=--require <path>`.
pub const NODE_SHIM: &str = r#"// reflexive inject shim (preloaded via --require)
'use strict';
const net = require('net');
const sockPath = process.env.REFLEXIVE_IPC;
if (!sockPath) return;
const evalEnabled = process.env.REFLEXIVE_EVAL === '1';
const state = Object.create(null);
let sock = null;
let buffered = [];

function send(msg) {
  const line = JSON.stringify(msg) + '\n';
  if (sock && !sock.destroyed) sock.write(line);
  else buffered.push(line);
}

sock = net.connect(sockPath, () => {
  for (const line of buffered) sock.write(line);
  buffered = [];
  send({ type: 'ready', data: { pid: process.pid, nodeVersion: process.version, platform: process.platform }, ts: Date.now() });
});
sock.unref();
sock.on('error', () => {});

let inbuf = '';
sock.on('data', (chunk) => {
  inbuf += chunk.toString('utf8');
  let nl;
  while ((nl = inbuf.indexOf('\n')) >= 0) {
    const line = inbuf.slice(0, nl);
    inbuf = inbuf.slice(nl + 1);
    if (!line.trim()) continue;
    let msg;
    try { msg = JSON.parse(line); } catch { continue; }
    handle(msg);
  }
});

function handle(msg) {
  if (msg.type === 'query_state') {
    send({ type: 'state_response', id: msg.id, state: state, ts: Date.now() });
  } else if (msg.type === 'evaluate') {
    if (!evalEnabled) {
      send({ type: 'eval_response', id: msg.id, error: 'evaluation is disabled', ts: Date.now() });
      return;
    }
    try {
      // eslint-disable-next-line no-eval
      const result = (0, eval)(msg.code);
      Promise.resolve(result).then(
        (value) => send({ type: 'eval_response', id: msg.id, result: safe(value), ts: Date.now() }),
        (err) => send({ type: 'eval_response', id: msg.id, error: String(err), ts: Date.now() })
      );
    } catch (err) {
      send({ type: 'eval_response', id: msg.id, error: String(err), ts: Date.now() });
    }
  }
}

function safe(value) {
  try { JSON.stringify(value); return value === undefined ? null : value; }
  catch { return String(value); }
}

global.reflexive = {
  setState(key, value) {
    state[key] = value;
    send({ type: 'state', data: { key, value }, ts: Date.now() });
  },
  getState(key) { return key === undefined ? { ...state } : state[key]; },
  log(level, message, meta) {
    send({ type: 'log', data: { level, message: String(message), meta }, ts: Date.now() });
  },
  emit(event, payload) {
    send({ type: 'event', data: { event, payload }, ts: Date.now() });
  },
};

process.on('uncaughtException', (err) => {
  send({ type: 'error', data: { name: err.name, message: err.message, stack: err.stack }, ts: Date.now() });
});
process.on('unhandledRejection', (reason) => {
  const err = reason instanceof Error ? reason : new Error(String(reason));
  send({ type: 'error', data: { name: 'UnhandledRejection', message: err.message, stack: err.stack }, ts: Date.now() });
});
"#;

/// Write the shim next to the supervisor's other scratch files and return
/// its path.
pub fn write_shim(dir: &Path) -> std::io::Result<PathBuf> {
    let path = dir.join("reflexive-inject.cjs");
    std::fs::write(&path, NODE_SHIM)?;
    Ok(path)
}
