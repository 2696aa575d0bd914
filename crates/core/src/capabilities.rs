// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Capability toggles gating tool availability

use serde::{Deserialize, Serialize};

/// Booleans gating which tools are registered and which operations the
/// managers will perform. `eval` implies `inject` (the evaluate channel
/// rides on the injected shim), normalized by [`Capabilities::normalized`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    pub read_files: bool,
    pub write_files: bool,
    pub shell_access: bool,
    pub restart: bool,
    pub inject: bool,
    pub eval: bool,
    pub debug: bool,
}

impl Capabilities {
    /// Read-only defaults: status and log observation, nothing else.
    pub fn read_only() -> Self {
        Self { read_files: true, restart: true, ..Self::default() }
    }

    /// Everything on. Used by `--dangerously-skip-permissions`.
    pub fn all() -> Self {
        Self {
            read_files: true,
            write_files: true,
            shell_access: true,
            restart: true,
            inject: true,
            eval: true,
            debug: true,
        }
    }

    /// Apply implication rules (`eval` requires `inject`).
    pub fn normalized(mut self) -> Self {
        if self.eval {
            self.inject = true;
        }
        self
    }

    /// Parse a comma-separated capability list (`"readFiles,eval,debug"`).
    ///
    /// Unknown names are reported back so the CLI can warn without failing.
    pub fn parse_list(list: &str) -> (Self, Vec<String>) {
        let mut caps = Self::default();
        let mut unknown = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match name {
                "readFiles" | "read_files" => caps.read_files = true,
                "writeFiles" | "write_files" => caps.write_files = true,
                "shellAccess" | "shell_access" | "shell" => caps.shell_access = true,
                "restart" => caps.restart = true,
                "inject" => caps.inject = true,
                "eval" => caps.eval = true,
                "debug" => caps.debug = true,
                other => unknown.push(other.to_string()),
            }
        }
        (caps.normalized(), unknown)
    }
}

#[cfg(test)]
#[path = "capabilities_tests.rs"]
mod tests;
