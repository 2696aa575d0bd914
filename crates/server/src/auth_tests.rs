// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn request_with_header(name: &str, value: &str) -> Request {
    let mut request = Request { path: "/api/sandboxes".into(), ..Default::default() };
    request.headers.insert(name.to_string(), value.to_string());
    request
}

fn config() -> AuthConfig {
    AuthConfig {
        api_key: Some("primary-key".into()),
        additional_keys: vec!["rotation-key".into()],
        public_paths: vec!["/api/health".into(), "/assets/*".into()],
    }
}

#[test]
fn x_api_key_header_authenticates() {
    let request = request_with_header("x-api-key", "primary-key");
    assert_eq!(authenticate(&request, &config()), AuthResult::Key(0));
}

#[test]
fn bearer_token_authenticates_rotation_keys() {
    let request = request_with_header("authorization", "Bearer rotation-key");
    assert_eq!(authenticate(&request, &config()), AuthResult::Key(1));
}

#[test]
fn wrong_key_is_denied() {
    let request = request_with_header("x-api-key", "wrong");
    assert_eq!(authenticate(&request, &config()), AuthResult::Denied);
}

#[test]
fn missing_key_is_denied() {
    let request = Request { path: "/api/sandboxes".into(), ..Default::default() };
    assert_eq!(authenticate(&request, &config()), AuthResult::Denied);
}

#[test]
fn disabled_auth_is_anonymous() {
    let request = Request { path: "/api/sandboxes".into(), ..Default::default() };
    assert_eq!(authenticate(&request, &AuthConfig::default()), AuthResult::Anonymous);
}

#[parameterized(
    exact = { "/api/health", true },
    wildcard_root = { "/assets", true },
    wildcard_child = { "/assets/app.js", true },
    wildcard_deep = { "/assets/css/site.css", true },
    miss = { "/api/sandboxes", false },
    prefix_but_not_segment = { "/assets-extra", false },
)]
fn public_path_matching(path: &str, expected: bool) {
    assert_eq!(is_public_path(path, &config()), expected);
}

#[test]
fn public_paths_bypass_auth() {
    let request = Request { path: "/api/health".into(), ..Default::default() };
    assert_eq!(authenticate(&request, &config()), AuthResult::Anonymous);
}

#[test]
fn identity_prefers_key_then_forwarded_then_peer() {
    let request = request_with_header("x-forwarded-for", "10.1.2.3, 192.168.0.1");
    assert_eq!(identity(&request, &AuthResult::Key(0)), "key:0");
    assert_eq!(identity(&request, &AuthResult::Anonymous), "ip:10.1.2.3");

    let mut plain = Request::default();
    plain.peer_addr = Some("127.0.0.1:5000".parse().unwrap());
    assert_eq!(identity(&plain, &AuthResult::Anonymous), "ip:127.0.0.1");
    assert_eq!(identity(&Request::default(), &AuthResult::Anonymous), "ip:unknown");
}
