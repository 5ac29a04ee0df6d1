// MIT License
// Copyright 2026--present ipidrv developers

//! `ipidrv`: serve an i-PI orchestrator from the command line.
//!
//! ```text
//! ipidrv --port 31415 harmonic -k 100
//! ipidrv --config driver.toml --reconnect
//! RUST_LOG=debug ipidrv gaussian -t water.gjf -a O,H,H
//! ```

use std::process::ExitCode;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ipidrv_core::config::DriverConfig;
use ipidrv_core::supervise;

mod cli;

fn run() -> anyhow::Result<()> {
    let cli = cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => DriverConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => DriverConfig::default(),
    };
    cli.apply(&mut cfg);

    let opts = cfg.connect_options().context("invalid connection settings")?;
    info!(
        host = %opts.host,
        port = opts.port,
        policy = ?opts.policy,
        reconnect = cfg.reconnect,
        "starting driver"
    );

    let served = supervise(&opts, cfg.reconnect, || cfg.build_evaluator())
        .with_context(|| format!("serving {}:{}", opts.host, opts.port))?;
    info!(served, "driver finished");
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
