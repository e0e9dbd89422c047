// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use crate::cfg::{
    config::Config,
    enums::EvictionPolicy,
};

/// Command-line surface of the server binary. Flags form the base
/// configuration; a `--config` file, when given, overrides them field by
/// field.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "resp-store-rs", about = "Redis-compatible in-memory data store", version)]
pub struct Flags {
    /// Interface to bind.
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// TCP port (0 = ephemeral).
    #[arg(long)]
    pub port: Option<u16>,

    /// Expect TLS termination; requires --key-path and --cert-path.
    #[arg(long)]
    pub tls: bool,

    /// PEM private key path.
    #[arg(long)]
    pub key_path: Option<String>,

    /// PEM certificate path.
    #[arg(long)]
    pub cert_path: Option<String>,

    /// Refuse unauthenticated commands.
    #[arg(long)]
    pub require_pass: bool,

    /// Password for the default user.
    #[arg(long)]
    pub password: Option<String>,

    /// ACL user file (.json / .yaml / .yml).
    #[arg(long)]
    pub acl_config_path: Option<String>,

    /// Directory handed to the snapshot/AOF hooks.
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Eviction policy name (noeviction, allkeys-lru, ...).
    #[arg(long)]
    pub eviction_policy: Option<EvictionPolicy>,

    /// JSON or YAML configuration file; its values override the flags above.
    #[arg(long)]
    pub config: Option<String>,

    /// Logger configuration YAML.
    #[arg(long)]
    pub logger_config: Option<String>,
}

impl Flags {
    /// Resolves flags (plus the optional config file) into a validated
    /// `Config`.
    pub fn into_config(self) -> Result<Config> {
        let mut cfg = Config::default();

        if let Some(v) = self.bind_addr {
            cfg.server.bind_addr = v;
        }
        if let Some(v) = self.port {
            cfg.server.port = v;
        }
        if self.tls {
            cfg.server.tls = true;
        }
        if let Some(v) = self.key_path {
            cfg.server.key_path = v;
        }
        if let Some(v) = self.cert_path {
            cfg.server.cert_path = v;
        }
        if self.require_pass {
            cfg.security.require_pass = true;
        }
        if let Some(v) = self.password {
            cfg.security.password = v;
        }
        if let Some(v) = self.acl_config_path {
            cfg.security.acl_config_path = v;
        }
        if let Some(v) = self.data_dir {
            cfg.storage.data_dir = v;
        }
        if let Some(v) = self.eviction_policy {
            cfg.storage.eviction_policy = v;
        }

        if let Some(path) = self.config {
            let resolved = resolve_config_path(&path)?;
            cfg.apply_file(resolved)?;
        }

        cfg.validate_and_normalize()?;
        Ok(cfg)
    }
}

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}
