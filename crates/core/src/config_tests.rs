// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn defaults_match_documented_values() {
    let config = Config::default();
    assert_eq!(config.port, 3099);
    assert_eq!(config.host, "localhost");
    assert_eq!(config.api_base, "/api");
    assert_eq!(config.mode, Mode::Local);
    assert!(config.validate().is_empty());
}

#[test]
fn discover_prefers_config_json_over_rc() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".reflexiverc"), "{}").unwrap();
    std::fs::write(dir.path().join("reflexive.config.json"), "{}").unwrap();
    let found = Config::discover(dir.path()).unwrap();
    assert!(found.ends_with("reflexive.config.json"));
}

#[test]
fn discover_falls_back_to_rc() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".reflexiverc"), "{}").unwrap();
    let found = Config::discover(dir.path()).unwrap();
    assert!(found.ends_with(".reflexiverc"));
}

#[test]
fn discover_returns_none_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::discover(dir.path()).is_none());
}

#[test]
fn merge_file_overrides_only_named_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reflexive.config.json");
    std::fs::write(&path, r#"{"port": 4000, "mode": "hosted", "hosted": {"maxSandboxes": 3}}"#)
        .unwrap();
    let file = Config::load_file(&path).unwrap();
    let config = Config::default().merge_file(file);
    assert_eq!(config.port, 4000);
    assert_eq!(config.mode, Mode::Hosted);
    assert_eq!(config.host, "localhost", "unnamed fields keep defaults");
    assert_eq!(config.hosted.unwrap().max_sandboxes, 3);
}

#[test]
fn malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".reflexiverc");
    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(Config::load_file(&path), Err(ConfigError::Parse { .. })));
}

#[test]
fn sandbox_mode_requires_sandbox_section() {
    let config = Config { mode: Mode::Sandbox, ..Default::default() };
    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("sandbox mode")));
}

#[test]
fn hosted_mode_requires_hosted_section() {
    let config = Config { mode: Mode::Hosted, ..Default::default() };
    assert!(config.validate().iter().any(|e| e.contains("hosted mode")));
}

#[test]
fn zero_port_is_invalid() {
    let config = Config { port: 0, ..Default::default() };
    assert!(config.validate().iter().any(|e| e.contains("port")));
}

#[test]
fn provider_kind_parses_recognized_set() {
    let section: SandboxSection =
        serde_json::from_str(r#"{"provider": "e2b"}"#).unwrap();
    assert_eq!(section.provider, SandboxProviderKind::E2b);
    assert!(serde_json::from_str::<SandboxSection>(r#"{"provider": "warp"}"#).is_err());
}
