// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! reflexive-sandbox: Remote sandbox lifecycle and multiplexing.
//!
//! A [`SandboxManager`] drives one sandbox through an external
//! [`SandboxProvider`]; the [`MultiSandboxManager`] keys a pool of them by
//! id and layers snapshot/resume over a
//! [`SnapshotStore`](reflexive_storage::SnapshotStore). The injected shim
//! inside a sandbox writes JSONL to a well-known log file that the manager
//! polls with a persistent byte offset.

pub mod local;
pub mod manager;
pub mod multi;
pub mod poll;
pub mod provider;
pub mod shim;
pub mod snapshot;

pub use local::LocalProvider;
pub use manager::{SandboxError, SandboxManager};
pub use multi::MultiSandboxManager;
pub use provider::{ExecOutput, ProviderError, SandboxProvider};
#[cfg(any(test, feature = "test-support"))]
pub use provider::FakeProvider;

/// Well-known path for the shim's JSONL log stream inside a sandbox.
pub const LOG_FILE: &str = "/tmp/reflexive-logs.jsonl";
/// Where the inject shim is uploaded before start.
pub const SHIM_FILE: &str = "/tmp/reflexive-inject.cjs";
/// Seed state written before a resumed sandbox starts.
pub const STATE_SEED_FILE: &str = "/tmp/reflexive-state.json";
