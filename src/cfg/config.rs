// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::{EvictionPolicy, FileFormat};

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    /// Listener address, TLS material and port.
    #[serde(default)]
    pub server: ServerConfig,
    /// Authentication requirements and the ACL file location.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Data directory and eviction knobs.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Where and how the server listens.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind. Defaults to loopback.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// TCP port. Port 0 asks the OS for an ephemeral port (useful in tests).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether TLS termination is expected for this listener. The handshake
    /// itself is performed by the fronting deployment; when set, the key and
    /// certificate paths below must exist and be readable at startup.
    #[serde(default)]
    pub tls: bool,

    /// PEM private key path, required when `tls` is set.
    #[serde(default)]
    pub key_path: String,

    /// PEM certificate path, required when `tls` is set.
    #[serde(default)]
    pub cert_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            tls: false,
            key_path: String::new(),
            cert_path: String::new(),
        }
    }
}

/// Authentication and ACL persistence settings.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SecurityConfig {
    /// When false every connection is implicitly authorized.
    #[serde(default)]
    pub require_pass: bool,

    /// Password installed on the `default` user at startup.
    #[serde(default)]
    pub password: String,

    /// ACL user file (JSON or YAML by extension); loaded at startup and the
    /// target of `ACL SAVE` / `ACL LOAD`.
    #[serde(default)]
    pub acl_config_path: String,
}

/// Storage layout settings.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct StorageConfig {
    /// Directory handed to the snapshot/AOF hooks.
    #[serde(default)]
    pub data_dir: String,

    /// Eviction policy; only `noeviction` changes behaviour here.
    #[serde(default)]
    pub eviction_policy: EvictionPolicy,
}

/// Partial configuration as read from a file: every field optional so a file
/// only overrides what it mentions.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ConfigOverlay {
    #[serde(default)]
    pub server: ServerOverlay,
    #[serde(default)]
    pub security: SecurityOverlay,
    #[serde(default)]
    pub storage: StorageOverlay,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ServerOverlay {
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<bool>,
    pub key_path: Option<String>,
    pub cert_path: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SecurityOverlay {
    pub require_pass: Option<bool>,
    pub password: Option<String>,
    pub acl_config_path: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct StorageOverlay {
    pub data_dir: Option<String>,
    pub eviction_policy: Option<EvictionPolicy>,
}

impl Config {
    /// Loads the configuration from a JSON or YAML file (picked by
    /// extension), validates it, and returns the ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut cfg = Config::default();
        cfg.apply_file(&path)?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Overlays the values present in `path` onto `self`. Fields the file
    /// does not mention are left untouched.
    pub fn apply_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;

        let overlay: ConfigOverlay = match FileFormat::from_path(path) {
            Some(FileFormat::Json) => serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse config JSON {path:?}"))?,
            Some(FileFormat::Yaml) => serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse config YAML {path:?}"))?,
            None => bail!(
                "config file {path:?} must end in .json, .yaml or .yml"
            ),
        };

        self.apply_overlay(overlay);
        Ok(())
    }

    pub fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let ConfigOverlay {
            server,
            security,
            storage,
        } = overlay;

        if let Some(v) = server.bind_addr {
            self.server.bind_addr = v;
        }
        if let Some(v) = server.port {
            self.server.port = v;
        }
        if let Some(v) = server.tls {
            self.server.tls = v;
        }
        if let Some(v) = server.key_path {
            self.server.key_path = v;
        }
        if let Some(v) = server.cert_path {
            self.server.cert_path = v;
        }
        if let Some(v) = security.require_pass {
            self.security.require_pass = v;
        }
        if let Some(v) = security.password {
            self.security.password = v;
        }
        if let Some(v) = security.acl_config_path {
            self.security.acl_config_path = v;
        }
        if let Some(v) = storage.data_dir {
            self.storage.data_dir = v;
        }
        if let Some(v) = storage.eviction_policy {
            self.storage.eviction_policy = v;
        }
    }

    /// Validates invariants and normalizes derived fields. Failures here are
    /// startup failures (non-zero exit).
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            !self.server.bind_addr.is_empty(),
            "bind_addr must not be empty"
        );

        if self.server.tls {
            ensure!(
                !self.server.key_path.is_empty() && !self.server.cert_path.is_empty(),
                "tls requires both key_path and cert_path"
            );
            for path in [&self.server.key_path, &self.server.cert_path] {
                ensure!(
                    Path::new(path).is_file(),
                    "tls material {path:?} is missing or unreadable"
                );
            }
        }

        if self.security.require_pass {
            ensure!(
                !self.security.password.is_empty()
                    || !self.security.acl_config_path.is_empty(),
                "require_pass needs a password or an ACL file to authenticate against"
            );
        }

        if !self.security.acl_config_path.is_empty() {
            ensure!(
                FileFormat::from_path(&self.security.acl_config_path).is_some(),
                "acl_config_path must end in .json, .yaml or .yml"
            );
        }

        if !self.storage.data_dir.is_empty() {
            fs::create_dir_all(&self.storage.data_dir).with_context(|| {
                format!("failed to create data_dir {:?}", self.storage.data_dir)
            })?;
        }

        Ok(())
    }

    /// `host:port` string for the TCP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_addr, self.server.port)
    }

    /// ACL file path, if one is configured.
    pub fn acl_file(&self) -> Option<PathBuf> {
        if self.security.acl_config_path.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.security.acl_config_path))
        }
    }
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7878
}
