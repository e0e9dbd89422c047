// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::{HashMap, HashSet, VecDeque},
    time::SystemTime,
};

use crate::store::error::CommandError;

/// One field of a hash value. Field-level expiry is independent of the
/// key-level one.
#[derive(Debug, Clone, PartialEq)]
pub struct HashField {
    pub value: String,
    pub expires_at: Option<SystemTime>,
}

impl HashField {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn expired(&self, now: SystemTime) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Tagged variant stored under every key.
///
/// Handlers switch on the tag and fail with the wire type error when the
/// variant does not match the command's module.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Hash(HashMap<String, HashField>),
    Set(HashSet<String>),
    SortedSet(HashMap<String, f64>),
    List(VecDeque<String>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
            Value::SortedSet(_) => "sorted set",
            Value::List(_) => "list",
        }
    }

    /// Stores a client-provided scalar in its narrowest numeric variant.
    pub fn adapt(raw: &str) -> Value {
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Value::Float(f);
        }
        Value::Str(raw.to_string())
    }

    /// Renders a scalar variant for a bulk reply; `None` for aggregates.
    pub fn render(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(format_float(*f)),
            _ => None,
        }
    }

    pub fn into_hash(
        self,
        key: &str,
    ) -> Result<HashMap<String, HashField>, CommandError> {
        match self {
            Value::Hash(h) => Ok(h),
            _ => Err(CommandError::wrong_type(key, "hash")),
        }
    }

    pub fn into_set(self, key: &str) -> Result<HashSet<String>, CommandError> {
        match self {
            Value::Set(s) => Ok(s),
            _ => Err(CommandError::wrong_type(key, "set")),
        }
    }

    pub fn into_sorted_set(
        self,
        key: &str,
    ) -> Result<HashMap<String, f64>, CommandError> {
        match self {
            Value::SortedSet(z) => Ok(z),
            _ => Err(CommandError::wrong_type(key, "sorted set")),
        }
    }

    pub fn into_list(self, key: &str) -> Result<VecDeque<String>, CommandError> {
        match self {
            Value::List(l) => Ok(l),
            _ => Err(CommandError::wrong_type(key, "list")),
        }
    }

    /// String-module accessor: scalar variants render, aggregates are a type
    /// error.
    pub fn into_scalar(self, key: &str) -> Result<String, CommandError> {
        self.render()
            .ok_or_else(|| CommandError::wrong_type(key, "string"))
    }
}

/// Canonical score/float rendering: integral values print without a decimal
/// point, infinities as `inf` / `-inf`.
pub fn format_float(f: f64) -> String {
    if f == f64::INFINITY {
        "inf".to_string()
    } else if f == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e17 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}

/// Parses a score accepting `+inf`/`-inf`/`inf` spellings.
pub fn parse_score(raw: &str) -> Option<f64> {
    match raw.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        _ => raw.parse::<f64>().ok(),
    }
}
