// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! reflexive-chat: The bridge between a dashboard client and the agent.
//!
//! [`ChatStream`] wraps an opaque [`LlmClient`] query, enriches it with
//! target context, and translates the client's native event stream into
//! SSE-framed [`ChatStreamEvent`]s. The [`tools`] module builds the
//! capability-gated tool planes the agent drives the target with.

pub mod context;
pub mod stream;
pub mod tools;

#[cfg(any(test, feature = "test-support"))]
pub use stream::FakeLlm;
pub use stream::{
    sse_frame, ChatOptions, ChatStream, ChatStreamEvent, LlmClient, LlmError, LlmEvent,
    LlmRequest, ToolDescriptor,
};
pub use tools::{Tool, ToolPlane, ToolResult};
