// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The external compute-sandbox collaborator, as a capability-typed trait.

use async_trait::async_trait;
use reflexive_core::SandboxConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("sandbox not found: {0}")]
    NotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider IO error: {0}")]
    Io(String),
}

/// Output of a short-lived command inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// What Reflexive needs from a sandbox provider. File contents are bytes;
/// the snapshot layer decides between UTF-8 and base64 encodings.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    async fn create(&self, id: &str, config: &SandboxConfig) -> Result<(), ProviderError>;

    /// Start the long-running target process. A second call replaces the
    /// previous target.
    async fn start_process(
        &self,
        id: &str,
        command: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<(), ProviderError>;

    async fn stop_process(&self, id: &str) -> Result<(), ProviderError>;

    /// Run a short command to completion.
    async fn exec(
        &self,
        id: &str,
        command: &str,
        args: &[String],
    ) -> Result<ExecOutput, ProviderError>;

    async fn read_file(&self, id: &str, path: &str) -> Result<Vec<u8>, ProviderError>;
    async fn write_file(&self, id: &str, path: &str, content: &[u8]) -> Result<(), ProviderError>;
    async fn list_files(&self, id: &str, dir: &str) -> Result<Vec<String>, ProviderError>;

    /// Destroying an unknown sandbox is a provider-level error; managers
    /// make destroy idempotent above this.
    async fn destroy(&self, id: &str) -> Result<(), ProviderError>;
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeProvider;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeSandbox {
        files: HashMap<String, Vec<u8>>,
        process_running: bool,
        last_process: Option<(String, Vec<String>)>,
    }

    /// In-memory provider for tests: per-sandbox file system plus a flag
    /// for the long-running process.
    #[derive(Default)]
    pub struct FakeProvider {
        sandboxes: Mutex<HashMap<String, FakeSandbox>>,
        /// Scripted `exec` responses keyed by command name.
        exec_results: Mutex<HashMap<String, ExecOutput>>,
    }

    impl FakeProvider {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script_exec(&self, command: &str, output: ExecOutput) {
            self.exec_results.lock().insert(command.to_string(), output);
        }

        /// Append a line to a sandbox file, simulating the shim's JSONL
        /// stream.
        pub fn append_file(&self, id: &str, path: &str, line: &str) {
            let mut sandboxes = self.sandboxes.lock();
            if let Some(sandbox) = sandboxes.get_mut(id) {
                let file = sandbox.files.entry(path.to_string()).or_default();
                file.extend_from_slice(line.as_bytes());
            }
        }

        pub fn process_running(&self, id: &str) -> bool {
            self.sandboxes.lock().get(id).is_some_and(|s| s.process_running)
        }

        pub fn last_process(&self, id: &str) -> Option<(String, Vec<String>)> {
            self.sandboxes.lock().get(id).and_then(|s| s.last_process.clone())
        }

        pub fn sandbox_count(&self) -> usize {
            self.sandboxes.lock().len()
        }
    }

    #[async_trait]
    impl SandboxProvider for FakeProvider {
        async fn create(&self, id: &str, _config: &SandboxConfig) -> Result<(), ProviderError> {
            self.sandboxes.lock().insert(id.to_string(), FakeSandbox::default());
            Ok(())
        }

        async fn start_process(
            &self,
            id: &str,
            command: &str,
            args: &[String],
            _env: &[(String, String)],
        ) -> Result<(), ProviderError> {
            let mut sandboxes = self.sandboxes.lock();
            let sandbox =
                sandboxes.get_mut(id).ok_or_else(|| ProviderError::NotFound(id.into()))?;
            sandbox.process_running = true;
            sandbox.last_process = Some((command.to_string(), args.to_vec()));
            Ok(())
        }

        async fn stop_process(&self, id: &str) -> Result<(), ProviderError> {
            let mut sandboxes = self.sandboxes.lock();
            let sandbox =
                sandboxes.get_mut(id).ok_or_else(|| ProviderError::NotFound(id.into()))?;
            sandbox.process_running = false;
            Ok(())
        }

        async fn exec(
            &self,
            id: &str,
            command: &str,
            _args: &[String],
        ) -> Result<ExecOutput, ProviderError> {
            if !self.sandboxes.lock().contains_key(id) {
                return Err(ProviderError::NotFound(id.into()));
            }
            Ok(self.exec_results.lock().get(command).cloned().unwrap_or(ExecOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            }))
        }

        async fn read_file(&self, id: &str, path: &str) -> Result<Vec<u8>, ProviderError> {
            let sandboxes = self.sandboxes.lock();
            let sandbox =
                sandboxes.get(id).ok_or_else(|| ProviderError::NotFound(id.into()))?;
            sandbox
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| ProviderError::FileNotFound(path.into()))
        }

        async fn write_file(
            &self,
            id: &str,
            path: &str,
            content: &[u8],
        ) -> Result<(), ProviderError> {
            let mut sandboxes = self.sandboxes.lock();
            let sandbox =
                sandboxes.get_mut(id).ok_or_else(|| ProviderError::NotFound(id.into()))?;
            sandbox.files.insert(path.to_string(), content.to_vec());
            Ok(())
        }

        async fn list_files(&self, id: &str, dir: &str) -> Result<Vec<String>, ProviderError> {
            let sandboxes = self.sandboxes.lock();
            let sandbox =
                sandboxes.get(id).ok_or_else(|| ProviderError::NotFound(id.into()))?;
            let prefix = if dir.ends_with('/') { dir.to_string() } else { format!("{dir}/") };
            let mut files: Vec<String> = sandbox
                .files
                .keys()
                .filter(|p| p.starts_with(&prefix) || dir == "/" || dir.is_empty())
                .cloned()
                .collect();
            files.sort();
            Ok(files)
        }

        async fn destroy(&self, id: &str) -> Result<(), ProviderError> {
            self.sandboxes
                .lock()
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| ProviderError::NotFound(id.into()))
        }
    }
}
