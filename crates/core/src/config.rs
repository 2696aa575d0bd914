// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration: defaults ← config file ← CLI flags.
//!
//! Discovery looks in the working directory for `reflexive.config.json`,
//! then `.reflexiverc`; first match wins.

use crate::capabilities::Capabilities;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3099;
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_API_BASE: &str = "/api";

const CONFIG_FILES: [&str; 2] = ["reflexive.config.json", ".reflexiverc"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Operating mode for the supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Local,
    Sandbox,
    Hosted,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Sandbox => "sandbox",
            Mode::Hosted => "hosted",
        }
    }
}

/// Recognized compute-sandbox providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SandboxProviderKind {
    E2b,
    Modal,
    Local,
}

/// Sandbox-mode section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxSection {
    pub provider: SandboxProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Hosted-mode section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostedSection {
    pub max_sandboxes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_prefix: Option<String>,
}

impl Default for HostedSection {
    fn default() -> Self {
        Self { max_sandboxes: 10, snapshot_dir: None, snapshot_prefix: None }
    }
}

/// Fully-merged supervisor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub mode: Mode,
    pub port: u16,
    pub host: String,
    pub api_base: String,
    pub max_logs: usize,
    pub capabilities: Capabilities,
    pub interactive: bool,
    pub watch: bool,
    pub open: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub node_args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosted: Option<HostedSection>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Local,
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            max_logs: crate::app_state::DEFAULT_MAX_LOGS,
            capabilities: Capabilities::read_only(),
            interactive: false,
            watch: false,
            open: false,
            node_args: Vec::new(),
            sandbox: None,
            hosted: None,
            env: HashMap::new(),
        }
    }
}

/// Partial config as found in a file; every field optional so the file
/// only overrides what it names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConfig {
    pub mode: Option<Mode>,
    pub port: Option<u16>,
    pub host: Option<String>,
    pub api_base: Option<String>,
    pub max_logs: Option<usize>,
    pub capabilities: Option<Capabilities>,
    pub interactive: Option<bool>,
    pub watch: Option<bool>,
    pub node_args: Option<Vec<String>>,
    pub sandbox: Option<SandboxSection>,
    pub hosted: Option<HostedSection>,
    pub env: Option<HashMap<String, String>>,
}

impl Config {
    /// Find the first config file in `dir`, if any.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILES.iter().map(|f| dir.join(f)).find(|p| p.is_file())
    }

    /// Load a partial config from a JSON file.
    pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Overlay a file config onto self (file wins where it names a field).
    pub fn merge_file(mut self, file: FileConfig) -> Self {
        if let Some(mode) = file.mode {
            self.mode = mode;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(api_base) = file.api_base {
            self.api_base = api_base;
        }
        if let Some(max_logs) = file.max_logs {
            self.max_logs = max_logs;
        }
        if let Some(caps) = file.capabilities {
            self.capabilities = caps.normalized();
        }
        if let Some(interactive) = file.interactive {
            self.interactive = interactive;
        }
        if let Some(watch) = file.watch {
            self.watch = watch;
        }
        if let Some(node_args) = file.node_args {
            self.node_args = node_args;
        }
        if let Some(sandbox) = file.sandbox {
            self.sandbox = Some(sandbox);
        }
        if let Some(hosted) = file.hosted {
            self.hosted = Some(hosted);
        }
        if let Some(env) = file.env {
            self.env.extend(env);
        }
        self
    }

    /// Validate the merged config. Returns human-readable errors; empty
    /// means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.port == 0 {
            errors.push("port must be between 1 and 65535".to_string());
        }
        if self.max_logs == 0 {
            errors.push("maxLogs must be at least 1".to_string());
        }
        match self.mode {
            Mode::Sandbox => {
                if self.sandbox.is_none() {
                    errors.push("sandbox mode requires a sandbox config section".to_string());
                }
            }
            Mode::Hosted => {
                if self.hosted.is_none() {
                    errors.push("hosted mode requires a hosted config section".to_string());
                }
            }
            Mode::Local => {}
        }
        if let Some(hosted) = &self.hosted {
            if hosted.max_sandboxes == 0 {
                errors.push("hosted.maxSandboxes must be at least 1".to_string());
            }
        }
        errors
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
