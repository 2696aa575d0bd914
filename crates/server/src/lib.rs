// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! reflexive-server: The HTTP edge.
//!
//! A small hand-rolled HTTP/1.1 server over Tokio sockets: method+path
//! routing (string or `:param` templates), an SSE pipe for chat, CORS,
//! bearer/key auth with public-path bypass, and a per-identity leaky
//! bucket. The HTTP layer is the only place errors map to status codes.

pub mod api;
pub mod auth;
pub mod http;
pub mod local;
pub mod rate_limit;
pub mod router;

pub use auth::{env_auth_config, is_public_path, AuthConfig};
pub use http::{Request, Response};
pub use rate_limit::{RateDecision, RateLimiter};
pub use router::{Outcome, Router};
