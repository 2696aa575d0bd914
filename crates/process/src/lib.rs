// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! reflexive-process: Lifecycle and observation of one supervised target.
//!
//! The [`ProcessManager`] spawns the target with runtime-selected argv,
//! captures its standard streams into [`AppState`](reflexive_core::AppState),
//! forwards stdin, matches watch patterns, orchestrates the remote debugger,
//! and speaks JSONL to an injected shim over a Unix socket.

pub mod inject;
pub mod manager;
pub mod shim;
pub mod watch;

pub use inject::{InjectChannel, InjectError};
pub use manager::{ProcessError, ProcessManager, ProcessOptions};
pub use watch::WatchRegistry;
