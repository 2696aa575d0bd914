// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! reflexive - supervise a running app for an LLM agent

mod args;
mod run;

use anyhow::Result;
use args::Cli;
use clap::Parser;
use reflexive_core::Config;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reflexive=info,warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let file = match &cli.config {
        Some(path) => Some(Config::load_file(path)?),
        None => {
            let cwd = std::env::current_dir()?;
            match Config::discover(&cwd) {
                Some(path) => Some(Config::load_file(&path)?),
                None => None,
            }
        }
    };
    let config = match file {
        Some(file) => Config::default().merge_file(file),
        None => Config::default(),
    };
    Ok(config)
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("reflexive: {e:#}");
            std::process::exit(1);
        }
    };
    let (config, warnings) = cli.apply(config);
    for warning in &warnings {
        eprintln!("reflexive: warning: {warning}");
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("reflexive: config error: {error}");
        }
        std::process::exit(1);
    }

    if let Err(e) = run::run(cli, config).await {
        eprintln!("reflexive: {e:#}");
        std::process::exit(1);
    }
}
