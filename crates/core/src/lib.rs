// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! reflexive-core: Shared data model and rolling state for the Reflexive supervisor.

pub mod ansi;
pub mod app_state;
pub mod bus;
pub mod capabilities;
pub mod clock;
pub mod config;
pub mod debugger;
pub mod event;
pub mod id;
pub mod log;
pub mod process;
pub mod sandbox;
pub mod snapshot;
pub mod watch;

pub use ansi::ansi_to_html;
pub use app_state::{AppState, AppStatus, DEFAULT_MAX_LOGS};
pub use bus::{EventBus, SubscriberId};
pub use capabilities::Capabilities;
pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use config::{Config, ConfigError, Mode, SandboxProviderKind};
pub use debugger::{BreakpointInfo, Scope, Source, StackFrame, Variable};
pub use event::Event;
pub use id::{rand6, short, snapshot_id, ts36};
pub use log::{LogEntry, LogType};
pub use process::ProcessState;
pub use sandbox::{SandboxConfig, SandboxInstance, SandboxStatus};
pub use snapshot::{validate_snapshot, Snapshot, SnapshotFile, SnapshotFileEncoding};
pub use watch::Watch;
