// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn eval_implies_inject() {
    let caps = Capabilities { eval: true, ..Default::default() }.normalized();
    assert!(caps.inject);
}

#[test]
fn parse_list_accepts_both_naming_styles() {
    let (caps, unknown) = Capabilities::parse_list("readFiles, write_files,shell");
    assert!(caps.read_files);
    assert!(caps.write_files);
    assert!(caps.shell_access);
    assert!(unknown.is_empty());
}

#[test]
fn parse_list_reports_unknown_names() {
    let (caps, unknown) = Capabilities::parse_list("debug,teleport");
    assert!(caps.debug);
    assert_eq!(unknown, vec!["teleport".to_string()]);
}

#[test]
fn parse_list_normalizes_eval() {
    let (caps, _) = Capabilities::parse_list("eval");
    assert!(caps.inject, "eval capability must pull in inject");
}

#[test]
fn serde_uses_camel_case() {
    let json = serde_json::to_value(Capabilities::all()).unwrap();
    assert_eq!(json["readFiles"], true);
    assert_eq!(json["shellAccess"], true);
}
