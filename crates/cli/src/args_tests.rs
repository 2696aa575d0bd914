// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

fn parse(args: &[&str]) -> Cli {
    Cli::parse_from(std::iter::once(&"reflexive").chain(args))
}

#[test]
fn entry_and_passthrough_args() {
    let cli = parse(&["app.js", "--", "--target-flag", "value"]);
    assert_eq!(cli.entry.as_deref(), Some(std::path::Path::new("app.js")));
    assert_eq!(cli.target_args, ["--target-flag", "value"]);
}

#[test]
fn defaults_leave_config_untouched() {
    let (config, warnings) = parse(&["app.js"]).apply(Config::default());
    assert_eq!(config.port, 3099);
    assert_eq!(config.host, "localhost");
    assert_eq!(config.mode, Mode::Local);
    assert!(warnings.is_empty());
}

#[test]
fn flags_override_config() {
    let cli = parse(&["app.js", "-p", "4000", "--host", "0.0.0.0", "-i", "-w"]);
    let (config, _) = cli.apply(Config::default());
    assert_eq!(config.port, 4000);
    assert_eq!(config.host, "0.0.0.0");
    assert!(config.interactive);
    assert!(config.watch);
}

#[test]
fn eval_flag_implies_inject() {
    let (config, _) = parse(&["app.js", "--eval"]).apply(Config::default());
    assert!(config.capabilities.eval);
    assert!(config.capabilities.inject);
}

#[test]
fn dangerously_skip_permissions_enables_everything() {
    let (config, _) =
        parse(&["app.js", "--dangerously-skip-permissions"]).apply(Config::default());
    assert_eq!(config.capabilities, Capabilities::all());
}

#[test]
fn capability_list_replaces_then_flags_add() {
    let cli = parse(&["app.js", "--capabilities", "writeFiles,teleport", "--debug"]);
    let (config, warnings) = cli.apply(Config::default());
    assert!(config.capabilities.write_files);
    assert!(config.capabilities.debug);
    assert!(!config.capabilities.read_files, "list replaces the defaults");
    assert_eq!(warnings, ["unknown capability: teleport"]);
}

#[test]
fn sandbox_flag_switches_mode() {
    let (config, _) = parse(&["app.js", "-s"]).apply(Config::default());
    assert_eq!(config.mode, Mode::Sandbox);
}

#[test]
fn node_args_split_on_whitespace() {
    let cli = parse(&["app.js", "--node-args", "--max-old-space-size=256 --trace-warnings"]);
    let (config, _) = cli.apply(Config::default());
    assert_eq!(config.node_args, ["--max-old-space-size=256", "--trace-warnings"]);
}
