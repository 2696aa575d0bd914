// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-credential auth with public-path bypass.
//!
//! Presented keys are compared by SHA-256 digest so the comparison cost
//! does not depend on where the strings diverge. The presented key never
//! reaches the logs.

use crate::http::Request;
use sha2::{Digest, Sha256};

/// Auth configuration: a primary key, rotation keys, and paths that skip
/// auth entirely.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub additional_keys: Vec<String>,
    /// Exact paths, or `<prefix>/*` wildcards.
    pub public_paths: Vec<String>,
}

impl AuthConfig {
    pub fn enabled(&self) -> bool {
        self.api_key.is_some() || !self.additional_keys.is_empty()
    }

    /// All acceptable keys: primary first, then rotations.
    fn keys(&self) -> impl Iterator<Item = &String> {
        self.api_key.iter().chain(self.additional_keys.iter())
    }
}

/// Result of authenticating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    /// Auth disabled or path public; identity falls back to the caller's
    /// network address.
    Anonymous,
    /// A configured key matched; the index names it without echoing it.
    Key(usize),
    Denied,
}

fn digest(value: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hasher.finalize().into()
}

/// Digest equality; both sides are fixed-width so timing does not leak
/// key content.
fn keys_match(a: &str, b: &str) -> bool {
    digest(a) == digest(b)
}

/// Pull the presented credential out of `X-API-Key` or
/// `Authorization: Bearer <token>`.
pub fn presented_key(request: &Request) -> Option<String> {
    if let Some(key) = request.header("x-api-key") {
        return Some(key.to_string());
    }
    request
        .header("authorization")
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// True iff `path` matches an exact public entry or a `<prefix>/*`
/// wildcard.
pub fn is_public_path(path: &str, config: &AuthConfig) -> bool {
    config.public_paths.iter().any(|entry| match entry.strip_suffix("/*") {
        Some(prefix) => path == prefix || path.starts_with(&format!("{prefix}/")),
        None => path == entry,
    })
}

/// Authenticate one request against the config.
pub fn authenticate(request: &Request, config: &AuthConfig) -> AuthResult {
    if !config.enabled() || is_public_path(&request.path, config) {
        return AuthResult::Anonymous;
    }
    let Some(presented) = presented_key(request) else {
        return AuthResult::Denied;
    };
    match config.keys().position(|key| keys_match(key, &presented)) {
        Some(index) => AuthResult::Key(index),
        None => AuthResult::Denied,
    }
}

/// Rate-limit identity: the authenticated key id when present, else the
/// first hop of `X-Forwarded-For`, else the socket peer.
pub fn identity(request: &Request, auth: &AuthResult) -> String {
    if let AuthResult::Key(index) = auth {
        return format!("key:{index}");
    }
    if let Some(forwarded) = request.header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return format!("ip:{first}");
            }
        }
    }
    match request.peer_addr {
        Some(addr) => format!("ip:{}", addr.ip()),
        None => "ip:unknown".to_string(),
    }
}

/// Read auth settings from the environment (`REFLEXIVE_API_KEY`/`API_KEY`,
/// `REFLEXIVE_ADDITIONAL_KEYS`, `REFLEXIVE_PUBLIC_PATHS`).
pub fn env_auth_config() -> AuthConfig {
    let api_key = std::env::var("REFLEXIVE_API_KEY")
        .or_else(|_| std::env::var("API_KEY"))
        .ok()
        .filter(|k| !k.is_empty());
    let additional_keys = std::env::var("REFLEXIVE_ADDITIONAL_KEYS")
        .map(|keys| {
            keys.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();
    let public_paths = std::env::var("REFLEXIVE_PUBLIC_PATHS")
        .map(|paths| {
            paths
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_else(|_| vec!["/api/health".to_string()]);
    AuthConfig { api_key, additional_keys, public_paths }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
