// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local sandbox provider: each sandbox is a scratch directory on this
//! machine and the target is a child process rooted there.
//!
//! Sandbox-absolute paths (`/app/main.js`, `/tmp/reflexive-logs.jsonl`)
//! map into the scratch directory by stripping the leading slash.

use crate::provider::{ExecOutput, ProviderError, SandboxProvider};
use async_trait::async_trait;
use parking_lot::Mutex;
use reflexive_core::SandboxConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::{Child, Command};

/// Timeout for short `exec` commands.
const EXEC_TIMEOUT: Duration = Duration::from_secs(60);

struct LocalSandbox {
    root: PathBuf,
    child: Option<Child>,
}

/// Directory-backed provider used by the CLI's sandbox/hosted modes.
pub struct LocalProvider {
    base: PathBuf,
    sandboxes: Mutex<HashMap<String, LocalSandbox>>,
}

impl LocalProvider {
    /// Sandboxes live under `<base>/<id>/`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into(), sandboxes: Mutex::new(HashMap::new()) }
    }

    fn root(&self, id: &str) -> Result<PathBuf, ProviderError> {
        let sandboxes = self.sandboxes.lock();
        sandboxes
            .get(id)
            .map(|s| s.root.clone())
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }

    fn resolve(root: &Path, path: &str) -> PathBuf {
        root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl SandboxProvider for LocalProvider {
    async fn create(&self, id: &str, _config: &SandboxConfig) -> Result<(), ProviderError> {
        let root = self.base.join(id);
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| ProviderError::Io(e.to_string()))?;
        self.sandboxes.lock().insert(id.to_string(), LocalSandbox { root, child: None });
        Ok(())
    }

    async fn start_process(
        &self,
        id: &str,
        command: &str,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<(), ProviderError> {
        let root = self.root(id)?;
        // Map sandbox-absolute argv entries (the entry file) into the root.
        let args: Vec<String> = args
            .iter()
            .map(|a| {
                if a.starts_with('/') {
                    Self::resolve(&root, a).display().to_string()
                } else {
                    a.clone()
                }
            })
            .collect();
        let mut cmd = Command::new(command);
        cmd.args(&args).current_dir(&root).kill_on_drop(true);
        for (key, value) in env {
            // Shim paths in env vars live inside the sandbox too.
            let value = value.replace("/tmp/", &format!("{}/tmp/", root.display()));
            cmd.env(key, value);
        }
        let child = cmd.spawn().map_err(|e| ProviderError::Io(e.to_string()))?;

        let mut sandboxes = self.sandboxes.lock();
        let sandbox =
            sandboxes.get_mut(id).ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
        if let Some(mut previous) = sandbox.child.take() {
            let _ = previous.start_kill();
        }
        sandbox.child = Some(child);
        Ok(())
    }

    async fn stop_process(&self, id: &str) -> Result<(), ProviderError> {
        let mut sandboxes = self.sandboxes.lock();
        let sandbox =
            sandboxes.get_mut(id).ok_or_else(|| ProviderError::NotFound(id.to_string()))?;
        if let Some(mut child) = sandbox.child.take() {
            let _ = child.start_kill();
        }
        Ok(())
    }

    async fn exec(
        &self,
        id: &str,
        command: &str,
        args: &[String],
    ) -> Result<ExecOutput, ProviderError> {
        let root = self.root(id)?;
        let mut cmd = Command::new(command);
        cmd.args(args).current_dir(&root);
        let output = tokio::time::timeout(EXEC_TIMEOUT, cmd.output())
            .await
            .map_err(|_| {
                ProviderError::Io(format!(
                    "{command} timed out after {}s",
                    EXEC_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| ProviderError::Io(e.to_string()))?;
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn read_file(&self, id: &str, path: &str) -> Result<Vec<u8>, ProviderError> {
        let root = self.root(id)?;
        match tokio::fs::read(Self::resolve(&root, path)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ProviderError::FileNotFound(path.to_string()))
            }
            Err(e) => Err(ProviderError::Io(e.to_string())),
        }
    }

    async fn write_file(&self, id: &str, path: &str, content: &[u8]) -> Result<(), ProviderError> {
        let root = self.root(id)?;
        let full = Self::resolve(&root, path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ProviderError::Io(e.to_string()))?;
        }
        tokio::fs::write(&full, content).await.map_err(|e| ProviderError::Io(e.to_string()))
    }

    async fn list_files(&self, id: &str, dir: &str) -> Result<Vec<String>, ProviderError> {
        let root = self.root(id)?;
        let base = Self::resolve(&root, dir);
        let mut entries = match tokio::fs::read_dir(&base).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ProviderError::Io(e.to_string())),
        };
        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            let prefix = dir.trim_end_matches('/');
            files.push(format!("{prefix}/{name}"));
        }
        files.sort();
        Ok(files)
    }

    async fn destroy(&self, id: &str) -> Result<(), ProviderError> {
        let Some(mut sandbox) = self.sandboxes.lock().remove(id) else {
            return Err(ProviderError::NotFound(id.to_string()));
        };
        if let Some(mut child) = sandbox.child.take() {
            let _ = child.start_kill();
        }
        let _ = tokio::fs::remove_dir_all(&sandbox.root).await;
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
