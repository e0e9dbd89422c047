// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;
use std::{
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Memory eviction policy advertised through configuration.
///
/// Only `noeviction` has observable behaviour in this server: TTL expiry is
/// the sole reclamation path. The remaining values are accepted so config
/// files written for the wider deployment keep parsing.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    #[default]
    #[serde(rename = "noeviction", alias = "NoEviction", alias = "NOEVICTION")]
    NoEviction,
    #[serde(rename = "allkeys-lru", alias = "AllKeysLru")]
    AllKeysLru,
    #[serde(rename = "allkeys-random", alias = "AllKeysRandom")]
    AllKeysRandom,
    #[serde(rename = "volatile-lru", alias = "VolatileLru")]
    VolatileLru,
    #[serde(rename = "volatile-random", alias = "VolatileRandom")]
    VolatileRandom,
    #[serde(rename = "volatile-ttl", alias = "VolatileTtl")]
    VolatileTtl,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EvictionPolicy::NoEviction => "noeviction",
            EvictionPolicy::AllKeysLru => "allkeys-lru",
            EvictionPolicy::AllKeysRandom => "allkeys-random",
            EvictionPolicy::VolatileLru => "volatile-lru",
            EvictionPolicy::VolatileRandom => "volatile-random",
            EvictionPolicy::VolatileTtl => "volatile-ttl",
        })
    }
}

impl FromStr for EvictionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "noeviction" => Ok(EvictionPolicy::NoEviction),
            "allkeys-lru" => Ok(EvictionPolicy::AllKeysLru),
            "allkeys-random" => Ok(EvictionPolicy::AllKeysRandom),
            "volatile-lru" => Ok(EvictionPolicy::VolatileLru),
            "volatile-random" => Ok(EvictionPolicy::VolatileRandom),
            "volatile-ttl" => Ok(EvictionPolicy::VolatileTtl),
            other => Err(format!("unknown eviction policy {other:?}")),
        }
    }
}

/// On-disk serialization format, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    /// `.json` selects JSON, `.yaml`/`.yml` select YAML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        match path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Some(FileFormat::Json),
            Some("yaml") | Some("yml") => Some(FileFormat::Yaml),
            _ => None,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileFormat::Json => "json",
            FileFormat::Yaml => "yaml",
        })
    }
}
