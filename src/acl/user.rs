// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::store::error::CommandError;

pub const WILDCARD: &str = "*";
pub const DEFAULT_USERNAME: &str = "default";

/// A stored credential: either the plaintext itself or its SHA-256 digest in
/// lowercase hex.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Password {
    Plaintext(String),
    Sha256(String),
}

/// One ACL user. Category, command, channel and key lists hold literals or
/// `"*"`; channel and key entries are glob patterns.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct User {
    pub username: String,
    pub enabled: bool,
    pub no_password: bool,
    pub no_keys: bool,
    pub passwords: Vec<Password>,
    pub included_categories: Vec<String>,
    pub excluded_categories: Vec<String>,
    pub included_commands: Vec<String>,
    pub excluded_commands: Vec<String>,
    pub included_read_keys: Vec<String>,
    pub included_write_keys: Vec<String>,
    pub included_pubsub_channels: Vec<String>,
    pub excluded_pubsub_channels: Vec<String>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            username: String::new(),
            enabled: true,
            no_password: false,
            no_keys: false,
            passwords: Vec::new(),
            included_categories: Vec::new(),
            excluded_categories: Vec::new(),
            included_commands: Vec::new(),
            excluded_commands: Vec::new(),
            included_read_keys: Vec::new(),
            included_write_keys: Vec::new(),
            included_pubsub_channels: Vec::new(),
            excluded_pubsub_channels: Vec::new(),
        }
    }
}

impl User {
    /// Fresh user with no grants; rules are added through SETUSER tokens.
    pub fn new<S: Into<String>>(username: S) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// The all-access shape given to the `default` user at startup.
    pub fn with_full_access<S: Into<String>>(username: S) -> Self {
        Self {
            username: username.into(),
            no_password: true,
            included_categories: vec![WILDCARD.to_string()],
            included_commands: vec![WILDCARD.to_string()],
            included_read_keys: vec![WILDCARD.to_string()],
            included_write_keys: vec![WILDCARD.to_string()],
            included_pubsub_channels: vec![WILDCARD.to_string()],
            ..Self::default()
        }
    }

    /// Checks a login attempt: `no_password` users accept anything, otherwise
    /// the attempt must match a plaintext entry or the SHA-256 of a digest
    /// entry.
    pub fn check_password(&self, attempt: &str) -> bool {
        if self.no_password {
            return true;
        }
        let digest = hash_password(attempt);
        self.passwords.iter().any(|p| match p {
            Password::Plaintext(plain) => plain == attempt,
            Password::Sha256(stored) => stored.eq_ignore_ascii_case(&digest),
        })
    }

    /// Collapses wildcard lists and removes duplicates.
    pub fn normalize(&mut self) {
        for list in [
            &mut self.included_categories,
            &mut self.excluded_categories,
            &mut self.included_commands,
            &mut self.excluded_commands,
            &mut self.included_read_keys,
            &mut self.included_write_keys,
            &mut self.included_pubsub_channels,
            &mut self.excluded_pubsub_channels,
        ] {
            if list.iter().any(|e| e == WILDCARD) {
                *list = vec![WILDCARD.to_string()];
            } else {
                list.sort_unstable();
                list.dedup();
            }
        }
        self.passwords.dedup();
    }

    /// Union-merge used by `ACL LOAD MERGE`: rule lists and passwords are
    /// combined, `enabled` follows the loaded user, key access survives if
    /// either side grants it.
    pub fn merge(&mut self, other: User) {
        self.enabled = other.enabled;
        self.no_password |= other.no_password;
        self.no_keys &= other.no_keys;
        for pw in other.passwords {
            if !self.passwords.contains(&pw) {
                self.passwords.push(pw);
            }
        }
        self.included_categories.extend(other.included_categories);
        self.excluded_categories.extend(other.excluded_categories);
        self.included_commands.extend(other.included_commands);
        self.excluded_commands.extend(other.excluded_commands);
        self.included_read_keys.extend(other.included_read_keys);
        self.included_write_keys.extend(other.included_write_keys);
        self.included_pubsub_channels
            .extend(other.included_pubsub_channels);
        self.excluded_pubsub_channels
            .extend(other.excluded_pubsub_channels);
        self.normalize();
    }

    /// Applies the SETUSER rule grammar (everything after the username).
    pub fn apply_rules(&mut self, rules: &[String]) -> Result<(), CommandError> {
        // `nopass` wins over any password rule in the same command.
        let nopass = rules.iter().any(|r| r == "nopass");
        if nopass {
            self.no_password = true;
            self.passwords.clear();
        }

        for rule in rules {
            match rule.as_str() {
                "on" => self.enabled = true,
                "off" => self.enabled = false,
                "nopass" => {},
                "nokeys" => {
                    self.no_keys = true;
                    self.included_read_keys.clear();
                    self.included_write_keys.clear();
                },
                "resetpass" => {
                    self.no_password = false;
                    self.passwords.clear();
                },
                "resetkeys" => {
                    self.no_keys = false;
                    self.included_read_keys.clear();
                    self.included_write_keys.clear();
                },
                "resetchannels" => {
                    self.included_pubsub_channels.clear();
                    self.excluded_pubsub_channels.clear();
                },
                "nocommands" => {
                    self.included_commands.clear();
                    self.excluded_commands = vec![WILDCARD.to_string()];
                },
                "allcommands" => {
                    self.included_commands = vec![WILDCARD.to_string()];
                    self.excluded_commands.clear();
                },
                "allcategories" => {
                    self.included_categories = vec![WILDCARD.to_string()];
                    self.excluded_categories.clear();
                },
                "allchannels" => {
                    self.included_pubsub_channels = vec![WILDCARD.to_string()];
                    self.excluded_pubsub_channels.clear();
                },
                rule => self.apply_prefixed_rule(rule, nopass)?,
            }
        }

        self.normalize();
        Ok(())
    }

    fn apply_prefixed_rule(
        &mut self,
        rule: &str,
        nopass: bool,
    ) -> Result<(), CommandError> {
        if let Some(plain) = rule.strip_prefix('>') {
            if !nopass {
                self.no_password = false;
                push_unique(
                    &mut self.passwords,
                    Password::Plaintext(plain.to_string()),
                );
            }
            return Ok(());
        }
        if let Some(digest) = rule.strip_prefix('#') {
            if !nopass {
                ensure_sha256_hex(digest)?;
                self.no_password = false;
                push_unique(
                    &mut self.passwords,
                    Password::Sha256(digest.to_ascii_lowercase()),
                );
            }
            return Ok(());
        }
        if let Some(plain) = rule.strip_prefix('<') {
            self.passwords
                .retain(|p| !matches!(p, Password::Plaintext(s) if s == plain));
            return Ok(());
        }
        if let Some(digest) = rule.strip_prefix('!') {
            ensure_sha256_hex(digest)?;
            self.passwords.retain(
                |p| !matches!(p, Password::Sha256(s) if s.eq_ignore_ascii_case(digest)),
            );
            return Ok(());
        }

        if let Some(pattern) = rule.strip_prefix("%RW~") {
            self.no_keys = false;
            push_unique(&mut self.included_read_keys, pattern.to_string());
            push_unique(&mut self.included_write_keys, pattern.to_string());
            return Ok(());
        }
        if let Some(pattern) = rule.strip_prefix("%R~") {
            self.no_keys = false;
            push_unique(&mut self.included_read_keys, pattern.to_string());
            return Ok(());
        }
        if let Some(pattern) = rule.strip_prefix("%W~") {
            self.no_keys = false;
            push_unique(&mut self.included_write_keys, pattern.to_string());
            return Ok(());
        }

        if let Some(rest) = rule.strip_prefix("+&") {
            push_unique(&mut self.included_pubsub_channels, rest.to_string());
            return Ok(());
        }
        if let Some(rest) = rule.strip_prefix("-&") {
            push_unique(&mut self.excluded_pubsub_channels, rest.to_string());
            return Ok(());
        }

        if let Some(rest) = rule.strip_prefix("+@") {
            let cat = normalize_category(rest);
            push_unique(&mut self.included_categories, cat);
            return Ok(());
        }
        if let Some(rest) = rule.strip_prefix("-@") {
            let cat = normalize_category(rest);
            push_unique(&mut self.excluded_categories, cat);
            return Ok(());
        }

        if let Some(rest) = rule.strip_prefix('+') {
            push_unique(
                &mut self.included_commands,
                rest.to_ascii_lowercase(),
            );
            return Ok(());
        }
        if let Some(rest) = rule.strip_prefix('-') {
            push_unique(
                &mut self.excluded_commands,
                rest.to_ascii_lowercase(),
            );
            return Ok(());
        }

        Err(CommandError::custom(format!("unknown ACL rule {rule:?}")))
    }

    /// One-line rendering used by `ACL LIST`. Key patterns granted for both
    /// read and write collapse to `%RW~`; the read-only and write-only
    /// leftovers are emitted as `%R~` / `%W~`.
    pub fn describe(&self) -> String {
        let mut parts = vec![
            format!("user {}", self.username),
            if self.enabled { "on" } else { "off" }.to_string(),
        ];
        if self.no_password {
            parts.push("nopass".to_string());
        }
        if self.no_keys {
            parts.push("nokeys".to_string());
        }
        for pw in &self.passwords {
            match pw {
                Password::Plaintext(plain) => {
                    parts.push(format!("#{}", hash_password(plain)));
                },
                Password::Sha256(digest) => parts.push(format!("#{digest}")),
            }
        }
        for cat in &self.included_categories {
            parts.push(format!("+{}", category_token(cat)));
        }
        for cat in &self.excluded_categories {
            parts.push(format!("-{}", category_token(cat)));
        }
        for cmd in &self.included_commands {
            parts.push(format!("+{cmd}"));
        }
        for cmd in &self.excluded_commands {
            parts.push(format!("-{cmd}"));
        }

        for pattern in &self.included_read_keys {
            if self.included_write_keys.contains(pattern) {
                parts.push(format!("%RW~{pattern}"));
            } else {
                parts.push(format!("%R~{pattern}"));
            }
        }
        for pattern in &self.included_write_keys {
            if !self.included_read_keys.contains(pattern) {
                parts.push(format!("%W~{pattern}"));
            }
        }

        for ch in &self.included_pubsub_channels {
            parts.push(format!("+&{ch}"));
        }
        for ch in &self.excluded_pubsub_channels {
            parts.push(format!("-&{ch}"));
        }
        parts.join(" ")
    }
}

/// Lowercase hex SHA-256 of a plaintext password.
pub fn hash_password(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn normalize_category(raw: &str) -> String {
    if raw == WILDCARD || raw.eq_ignore_ascii_case("all") {
        WILDCARD.to_string()
    } else {
        format!("@{}", raw.to_ascii_lowercase())
    }
}

/// Categories are stored with their `@` prefix except the wildcard; LIST
/// echoes `+@cat` / `+*`.
fn category_token(stored: &str) -> String {
    if stored == WILDCARD {
        format!("@{WILDCARD}")
    } else {
        stored.to_string()
    }
}

fn ensure_sha256_hex(digest: &str) -> Result<(), CommandError> {
    let valid =
        digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(CommandError::custom(
            "password hash must be a valid SHA-256 hex digest",
        ))
    }
}
