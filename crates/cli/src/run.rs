// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mode wiring: build the managers and serve the matching route set.

use crate::args::Cli;
use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use reflexive_core::{AppState, Config, Mode, SandboxProviderKind};
use reflexive_process::{ProcessManager, ProcessOptions};
use reflexive_sandbox::{LocalProvider, MultiSandboxManager, SandboxProvider};
use reflexive_server::api::{api_router, ApiCtx};
use reflexive_server::local::{local_router, LocalCtx};
use reflexive_server::{env_auth_config, Router};
use reflexive_storage::{ObjectStore, SnapshotStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Rate-limit settings from the environment, if configured.
fn env_rate_limit() -> Option<(u32, u64)> {
    let max: u32 = std::env::var("REFLEXIVE_RATE_LIMIT").ok()?.parse().ok()?;
    let window_ms: u64 = std::env::var("REFLEXIVE_RATE_WINDOW_MS")
        .ok()
        .and_then(|w| w.parse().ok())
        .unwrap_or(60_000);
    Some((max, window_ms))
}

/// Parent-CLI rendezvous: a library child honors the port the parent
/// picked.
fn rendezvous_port(config: &Config) -> u16 {
    if std::env::var("REFLEXIVE_CLI_MODE").is_ok_and(|m| m == "child" || m == "1") {
        if let Some(port) = std::env::var("REFLEXIVE_CLI_PORT").ok().and_then(|p| p.parse().ok())
        {
            return port;
        }
    }
    config.port
}

fn edge_policy(router: Router) -> Router {
    let router = router.with_auth(env_auth_config());
    match env_rate_limit() {
        Some((max, window_ms)) => router.with_rate_limit(max, window_ms),
        None => router,
    }
}

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match config.mode {
        Mode::Local => run_local(cli, config).await,
        Mode::Sandbox | Mode::Hosted => run_sandboxed(cli, config).await,
    }
}

async fn run_local(cli: Cli, config: Config) -> Result<()> {
    let entry = cli.entry.clone().context("an entry file is required in local mode")?;
    let app = AppState::new(config.max_logs);

    let work_dir = std::env::temp_dir().join("reflexive");
    std::fs::create_dir_all(&work_dir).ok();
    let mut opts = ProcessOptions::new(entry);
    opts.args = cli.target_args.clone();
    opts.capabilities = config.capabilities;
    opts.interactive = config.interactive;
    opts.runtime_args = config.node_args.clone();
    opts.work_dir = work_dir;
    let manager = ProcessManager::new(app, opts);

    manager.start().await.context("failed to start target")?;

    let shutdown = CancellationToken::new();
    let ctx = Arc::new(LocalCtx {
        manager: Arc::clone(&manager),
        // The LLM is not bundled; embedders wire a client through the
        // library API and get /chat for free.
        chat: None,
        session_id: Mutex::new(None),
        shutdown: shutdown.clone(),
    });

    let router = edge_policy(local_router(ctx));
    let port = rendezvous_port(&config);
    let (bound, _task) = Arc::new(router)
        .serve(&config.host, port)
        .await
        .context("failed to bind dashboard port")?;
    println!("reflexive: supervising on http://{}:{}", config.host, bound);

    if config.open {
        open_browser(&format!("http://{}:{}", config.host, bound));
    }
    if config.watch {
        spawn_entry_watcher(Arc::clone(&manager), shutdown.clone());
    }

    wait_for_exit(&shutdown).await;
    manager.destroy().await;
    Ok(())
}

fn open_browser(url: &str) {
    let opener = if cfg!(target_os = "macos") { "open" } else { "xdg-open" };
    if let Err(e) = std::process::Command::new(opener).arg(url).spawn() {
        tracing::warn!(error = %e, "could not open browser");
    }
}

/// Poll the entry file's mtime and restart the target when it changes.
fn spawn_entry_watcher(manager: Arc<ProcessManager>, shutdown: CancellationToken) {
    let entry = manager.state().entry;
    tokio::spawn(async move {
        let mut last = std::fs::metadata(&entry).and_then(|m| m.modified()).ok();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(2)) => {}
                _ = shutdown.cancelled() => break,
            }
            let current = std::fs::metadata(&entry).and_then(|m| m.modified()).ok();
            if current.is_some() && current != last {
                last = current;
                tracing::info!(entry = %entry.display(), "entry changed, restarting target");
                if let Err(e) = manager.restart().await {
                    tracing::warn!(error = %e, "watch restart failed");
                }
            }
        }
    });
}

async fn run_sandboxed(cli: Cli, config: Config) -> Result<()> {
    let provider: Arc<dyn SandboxProvider> = match &config.sandbox {
        Some(section) => match section.provider {
            SandboxProviderKind::Local => {
                let base = std::env::temp_dir().join("reflexive-sandboxes");
                Arc::new(LocalProvider::new(base))
            }
            other => bail!(
                "sandbox provider {:?} requires an external binding; only `local` ships with the CLI",
                other
            ),
        },
        None if config.mode == Mode::Hosted => {
            let base = std::env::temp_dir().join("reflexive-sandboxes");
            Arc::new(LocalProvider::new(base))
        }
        None => bail!("sandbox mode requires a sandbox config section"),
    };

    let hosted = config.hosted.clone().unwrap_or_default();
    let snapshot_dir = hosted
        .snapshot_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(".reflexive"));
    let prefix = hosted.snapshot_prefix.as_deref().unwrap_or("snapshots");
    let store: Arc<dyn SnapshotStore> = Arc::new(ObjectStore::new(snapshot_dir, prefix));

    let pool = MultiSandboxManager::new(provider, store, hosted.max_sandboxes);

    // Sandbox mode: provision and start the target immediately.
    if config.mode == Mode::Sandbox {
        let entry = cli.entry.clone().context("an entry file is required in sandbox mode")?;
        let content = tokio::fs::read(&entry)
            .await
            .with_context(|| format!("cannot read entry file {}", entry.display()))?;
        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main.js".to_string());
        let remote_path = format!("/app/{name}");

        pool.create("target", Default::default()).await?;
        pool.write_file("target", &remote_path, &content).await?;
        pool.start("target", &remote_path, &cli.target_args).await?;
        println!("reflexive: target running in sandbox `target`");
    }

    let ctx = Arc::new(ApiCtx { pool, chat: None, capabilities: config.capabilities });
    let router = edge_policy(api_router(ctx, &config.api_base));
    let port = rendezvous_port(&config);
    let (bound, _task) = Arc::new(router)
        .serve(&config.host, port)
        .await
        .context("failed to bind API port")?;
    println!(
        "reflexive: {} API on http://{}:{}{}",
        config.mode.as_str(),
        config.host,
        bound,
        config.api_base
    );

    let shutdown = CancellationToken::new();
    wait_for_exit(&shutdown).await;
    Ok(())
}

async fn wait_for_exit(shutdown: &CancellationToken) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
        }
    }
}
