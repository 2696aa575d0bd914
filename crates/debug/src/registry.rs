// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-language runtime descriptors and the process-wide registry.
//!
//! A descriptor knows how to spawn its debuggee (argv + env), how to
//! recognize the "debugger ready" banner on the child's output, and which
//! adapter protocol to speak. The registry is initialized once with the
//! built-ins and is append-only afterwards.

use crate::adapter::DebugAdapter;
use crate::dap::DapAdapter;
use crate::v8::V8InspectorAdapter;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// Which wire protocol a runtime's debug server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugProtocol {
    V8Inspector,
    Dap,
}

/// Connection descriptor produced by a ready banner.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugReady {
    pub host: String,
    pub port: u16,
    /// Full WebSocket URL when the banner carried one (node).
    pub ws_url: Option<String>,
}

pub type BuildArgs = fn(u16, &Path, &[String]) -> Vec<String>;
pub type BuildEnv = fn(u16) -> Vec<(String, String)>;
pub type ParseReady = fn(&str, u16) -> Option<DebugReady>;
pub type Validate = fn() -> Result<(), String>;

/// Everything the process manager needs to debug one language.
#[derive(Clone)]
pub struct RuntimeDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub extensions: &'static [&'static str],
    pub command: &'static str,
    pub default_port: u16,
    pub protocol: DebugProtocol,
    build_args: BuildArgs,
    build_env: BuildEnv,
    parse_ready: ParseReady,
    validate: Option<Validate>,
}

impl RuntimeDescriptor {
    /// Descriptor for a runtime the built-ins don't cover.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &'static str,
        display_name: &'static str,
        extensions: &'static [&'static str],
        command: &'static str,
        default_port: u16,
        protocol: DebugProtocol,
        build_args: BuildArgs,
        build_env: BuildEnv,
        parse_ready: ParseReady,
    ) -> Self {
        Self {
            name,
            display_name,
            extensions,
            command,
            default_port,
            protocol,
            build_args,
            build_env,
            parse_ready,
            validate: None,
        }
    }

    pub fn with_validate(mut self, validate: Validate) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Process argv (after `command`) to spawn the debuggee.
    pub fn build_args(&self, port: u16, entry: &Path, args: &[String]) -> Vec<String> {
        (self.build_args)(port, entry, args)
    }

    /// Supplementary environment for the debuggee.
    pub fn build_env(&self, port: u16) -> Vec<(String, String)> {
        (self.build_env)(port)
    }

    /// Inspect one line of target output; `Some` when the debug server is
    /// accepting connections.
    pub fn parse_debug_ready(&self, line: &str, port: u16) -> Option<DebugReady> {
        (self.parse_ready)(line, port)
    }

    /// Fresh adapter of the right protocol.
    pub fn create_adapter(&self) -> Arc<dyn DebugAdapter> {
        match self.protocol {
            DebugProtocol::V8Inspector => Arc::new(V8InspectorAdapter::new()),
            DebugProtocol::Dap => Arc::new(DapAdapter::new()),
        }
    }

    /// Optional precheck (tool on PATH, version). Failures are non-fatal.
    pub fn validate_setup(&self) -> Result<(), String> {
        match self.validate {
            Some(f) => f(),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RuntimeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeDescriptor")
            .field("name", &self.name)
            .field("extensions", &self.extensions)
            .field("protocol", &format_args!("{:?}", self.protocol))
            .finish()
    }
}

/// Extension-keyed runtime lookup.
pub struct Registry {
    runtimes: RwLock<Vec<RuntimeDescriptor>>,
}

impl Registry {
    pub fn with_builtins() -> Self {
        Self {
            runtimes: RwLock::new(vec![
                builtins::node(),
                builtins::python(),
                builtins::go(),
                builtins::dotnet(),
                builtins::rust(),
            ]),
        }
    }

    pub fn get(&self, name: &str) -> Option<RuntimeDescriptor> {
        self.runtimes.read().iter().find(|r| r.name == name).cloned()
    }

    pub fn get_by_extension(&self, ext: &str) -> Option<RuntimeDescriptor> {
        let ext = ext.trim_start_matches('.');
        self.runtimes.read().iter().find(|r| r.extensions.contains(&ext)).cloned()
    }

    pub fn get_by_file(&self, path: &Path) -> Option<RuntimeDescriptor> {
        let ext = path.extension()?.to_str()?;
        self.get_by_extension(ext)
    }

    pub fn list(&self) -> Vec<RuntimeDescriptor> {
        self.runtimes.read().clone()
    }

    /// Register a runtime; replaces an existing one with the same name.
    pub fn register(&self, runtime: RuntimeDescriptor) {
        let mut runtimes = self.runtimes.write();
        runtimes.retain(|r| r.name != runtime.name);
        runtimes.push(runtime);
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut runtimes = self.runtimes.write();
        let before = runtimes.len();
        runtimes.retain(|r| r.name != name);
        runtimes.len() < before
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::with_builtins);

/// The one process-wide registry, seeded with the built-in runtimes.
pub fn global_registry() -> &'static Registry {
    &REGISTRY
}

mod builtins {
    use super::*;

    fn path_str(entry: &Path) -> String {
        entry.display().to_string()
    }

    pub(super) fn node() -> RuntimeDescriptor {
        RuntimeDescriptor {
            name: "node",
            display_name: "Node.js",
            extensions: &["js", "mjs", "cjs"],
            command: "node",
            default_port: 9229,
            protocol: DebugProtocol::V8Inspector,
            build_args: |port, entry, args| {
                let mut argv = vec![format!("--inspect-brk={port}"), path_str(entry)];
                argv.extend(args.iter().cloned());
                argv
            },
            build_env: |_| vec![("FORCE_COLOR".into(), "1".into())],
            parse_ready: |line, port| {
                // "Debugger listening on ws://127.0.0.1:9229/<uuid>"
                let ws_start = line.find("ws://")?;
                let url: String = line[ws_start..]
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .to_string();
                Some(DebugReady { host: "127.0.0.1".into(), port, ws_url: Some(url) })
            },
            validate: None,
        }
    }

    pub(super) fn python() -> RuntimeDescriptor {
        RuntimeDescriptor {
            name: "python",
            display_name: "Python (debugpy)",
            extensions: &["py"],
            command: "python3",
            default_port: 5678,
            protocol: DebugProtocol::Dap,
            build_args: |port, entry, args| {
                let mut argv = vec![
                    "-m".into(),
                    "debugpy".into(),
                    "--listen".into(),
                    format!("127.0.0.1:{port}"),
                    "--wait-for-client".into(),
                    path_str(entry),
                ];
                argv.extend(args.iter().cloned());
                argv
            },
            build_env: |_| vec![("PYTHONUNBUFFERED".into(), "1".into())],
            parse_ready: |line, port| {
                let lower = line.to_lowercase();
                (lower.contains("listening on") || lower.contains("waiting for client"))
                    .then(|| DebugReady { host: "127.0.0.1".into(), port, ws_url: None })
            },
            validate: None,
        }
    }

    pub(super) fn go() -> RuntimeDescriptor {
        RuntimeDescriptor {
            name: "go",
            display_name: "Go (delve)",
            extensions: &["go"],
            command: "dlv",
            default_port: 38697,
            protocol: DebugProtocol::Dap,
            build_args: |port, _entry, _args| {
                vec![
                    "dap".into(),
                    "--listen".into(),
                    format!("127.0.0.1:{port}"),
                    "--log".into(),
                ]
            },
            build_env: |_| Vec::new(),
            parse_ready: dap_listening_banner,
            validate: None,
        }
    }

    pub(super) fn dotnet() -> RuntimeDescriptor {
        RuntimeDescriptor {
            name: "dotnet",
            display_name: ".NET (netcoredbg)",
            extensions: &["cs", "csproj"],
            command: "netcoredbg",
            default_port: 4711,
            protocol: DebugProtocol::Dap,
            build_args: |port, _entry, _args| {
                vec!["--interpreter=vscode".into(), format!("--server={port}")]
            },
            build_env: |_| Vec::new(),
            parse_ready: dap_listening_banner,
            validate: None,
        }
    }

    pub(super) fn rust() -> RuntimeDescriptor {
        RuntimeDescriptor {
            name: "rust",
            display_name: "Rust (codelldb)",
            extensions: &["rs"],
            command: "codelldb",
            default_port: 13000,
            protocol: DebugProtocol::Dap,
            build_args: |port, _entry, _args| vec!["--port".into(), port.to_string()],
            build_env: |_| vec![("RUST_BACKTRACE".into(), "1".into())],
            parse_ready: dap_listening_banner,
            validate: None,
        }
    }

    fn dap_listening_banner(line: &str, port: u16) -> Option<DebugReady> {
        let lower = line.to_lowercase();
        (lower.contains("listening") && lower.contains(&port.to_string()))
            .then(|| DebugReady { host: "127.0.0.1".into(), port, ws_url: None })
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
