// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! reflexive-debug: Language-neutral debug client plumbing.
//!
//! Two concrete transports implement the [`DebugAdapter`] contract: a
//! WebSocket client for the V8 Inspector protocol and a framed TCP client
//! for the Debug Adapter Protocol. Per-language [`RuntimeDescriptor`]s know
//! how to spawn a debuggee and recognize its ready banner; the
//! [`RemoteDebugger`] facade owns one adapter plus the logical breakpoint
//! registry.

pub mod adapter;
pub mod dap;
mod fanout;
pub mod port;
pub mod registry;
pub mod remote;
pub mod v8;

pub use adapter::{ConnectOptions, DebugAdapter, DebugError, DebugEvent, SetBreakpointResult};
pub use dap::DapAdapter;
pub use port::find_available_port;
pub use registry::{
    global_registry, DebugProtocol, DebugReady, Registry, RuntimeDescriptor,
};
pub use remote::{DebuggerState, RemoteDebugger};
pub use v8::V8InspectorAdapter;
