// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result};
use clap::Parser;
use resp_store_rs::{
    cfg::{cli::Flags, logger::init_logger},
    server::Server,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let flags = Flags::parse();

    let logger_config = flags
        .logger_config
        .clone()
        .unwrap_or_else(|| "config/logger.yaml".to_string());
    let _logger_guard = init_logger(&logger_config)?;

    // Flags form the base configuration; a --config file overrides them.
    let cfg = flags.into_config().context("invalid configuration")?;

    let server = Server::new(cfg).await?;

    // ctrl-c drains every per-connection and per-channel task.
    let shutdown = server.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    server.run().await
}
