// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line surface and its projection onto the merged config.

use clap::Parser;
use reflexive_core::{Capabilities, Config, Mode};
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "reflexive",
    version,
    about = "Wrap a running app in a supervisor an agent can observe and drive"
)]
pub struct Cli {
    /// Target entry file (e.g. app.js, main.py)
    pub entry: Option<PathBuf>,

    /// Arguments after `--` are passed through to the target
    #[arg(last = true, value_name = "TARGET_ARGS")]
    pub target_args: Vec<String>,

    /// Dashboard/API port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Bind host
    #[arg(long)]
    pub host: Option<String>,

    /// Open the dashboard in a browser after start
    #[arg(short, long)]
    pub open: bool,

    /// Restart the target when its entry file changes
    #[arg(short, long)]
    pub watch: bool,

    /// Keep stdin open and forward dashboard input to the target
    #[arg(short, long)]
    pub interactive: bool,

    /// Preload the state/log shim into the target
    #[arg(long)]
    pub inject: bool,

    /// Allow code evaluation inside the target (implies --inject)
    #[arg(long)]
    pub eval: bool,

    /// Attach a debugger to the target
    #[arg(short, long)]
    pub debug: bool,

    /// Run the target in a sandbox instead of a local child process
    #[arg(short, long)]
    pub sandbox: bool,

    /// Allow the agent to write files
    #[arg(long)]
    pub write: bool,

    /// Allow the agent to run shell commands
    #[arg(long)]
    pub shell: bool,

    /// Enable every capability, including inject/eval/debug
    #[arg(long)]
    pub dangerously_skip_permissions: bool,

    /// Extra args placed before the entry file, space-separated
    #[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
    pub node_args: Option<String>,

    /// Comma-separated capability list (readFiles,writeFiles,shell,restart,inject,eval,debug)
    #[arg(long, value_name = "CAPS")]
    pub capabilities: Option<String>,

    /// Config file path (skips discovery)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Overlay flags onto the merged config (flags win). Returns warnings
    /// for unknown capability names.
    pub fn apply(&self, mut config: Config) -> (Config, Vec<String>) {
        let mut warnings = Vec::new();

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if self.open {
            config.open = true;
        }
        if self.watch {
            config.watch = true;
        }
        if self.interactive {
            config.interactive = true;
        }
        if self.sandbox {
            config.mode = Mode::Sandbox;
        }
        if let Some(node_args) = &self.node_args {
            config.node_args = node_args.split_whitespace().map(String::from).collect();
        }

        if let Some(list) = &self.capabilities {
            let (caps, unknown) = Capabilities::parse_list(list);
            config.capabilities = caps;
            warnings.extend(unknown.into_iter().map(|c| format!("unknown capability: {c}")));
        }
        if self.inject {
            config.capabilities.inject = true;
        }
        if self.eval {
            config.capabilities.eval = true;
        }
        if self.debug {
            config.capabilities.debug = true;
        }
        if self.write {
            config.capabilities.write_files = true;
        }
        if self.shell {
            config.capabilities.shell_access = true;
        }
        if self.dangerously_skip_permissions {
            config.capabilities = Capabilities::all();
        }
        config.capabilities = config.capabilities.normalized();

        (config, warnings)
    }
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod tests;
