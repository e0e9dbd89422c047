// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::BTreeSet,
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use dashmap::DashMap;
use glob::Pattern;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
    acl::user::{DEFAULT_USERNAME, Password, User, WILDCARD},
    cfg::{config::Config, enums::FileFormat},
    commands::KeySet,
    server::connection::ConnHandle,
    store::error::CommandError,
};

/// The access-control engine.
///
/// Authorization paths take the user list in shared mode; `SETUSER`,
/// `DELUSER` and `LOAD` take it exclusively. Every glob pattern referenced by
/// any user has a compiled form in `patterns` before the first authorization
/// call that needs it.
pub struct Acl {
    users: RwLock<Vec<User>>,
    patterns: DashMap<String, Pattern>,
    require_pass: bool,
    file_path: Option<PathBuf>,
}

impl Acl {
    /// Builds the engine from configuration: the immortal `default` user
    /// (carrying the configured password, if any) plus users merged in from
    /// the ACL file when it exists.
    pub async fn new(cfg: &Config) -> Result<Arc<Self>> {
        let mut default_user = User::with_full_access(DEFAULT_USERNAME);
        if !cfg.security.password.is_empty() {
            default_user.no_password = false;
            default_user.passwords =
                vec![Password::Plaintext(cfg.security.password.clone())];
        }

        let acl = Arc::new(Self {
            users: RwLock::new(vec![default_user]),
            patterns: DashMap::new(),
            require_pass: cfg.security.require_pass,
            file_path: cfg.acl_file(),
        });

        if let Some(path) = &acl.file_path {
            if path.is_file() {
                acl.load(true)
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))
                    .with_context(|| format!("failed to load ACL file {path:?}"))?;
            }
        }

        acl.rebuild_patterns().await;
        Ok(acl)
    }

    pub fn require_pass(&self) -> bool {
        self.require_pass
    }

    /// `AUTH <password>` (against `default`) or `AUTH <username> <password>`.
    /// Returns the authenticated username.
    pub async fn authenticate(
        &self,
        tokens: &[String],
    ) -> Result<String, CommandError> {
        let (username, password) = match tokens {
            [_, password] => (DEFAULT_USERNAME, password.as_str()),
            [_, username, password] => (username.as_str(), password.as_str()),
            _ => return Err(CommandError::WrongArgs),
        };

        let users = self.users.read().await;
        let Some(user) = users.iter().find(|u| u.username == username) else {
            return Err(CommandError::custom("could not authenticate user"));
        };
        if !user.enabled {
            return Err(CommandError::custom(format!(
                "user {username} is disabled"
            )));
        }
        if !user.check_password(password) {
            return Err(CommandError::custom("could not authenticate user"));
        }
        debug!(user = username, "authenticated");
        Ok(user.username.clone())
    }

    /// The ordered authorization pipeline. `command_name` is the lowercase
    /// command token, with a declared sub-command joined by `|`.
    pub async fn authorize(
        &self,
        conn: &ConnHandle,
        categories: &[&'static str],
        command_name: &str,
        keys: &KeySet,
    ) -> Result<(), CommandError> {
        if !self.require_pass {
            return Ok(());
        }
        if !conn.is_authenticated() {
            return Err(CommandError::custom("user must be authenticated"));
        }

        let username = conn.username();
        let users = self.users.read().await;
        let Some(user) = users.iter().find(|u| u.username == username) else {
            return Err(CommandError::custom("user must be authenticated"));
        };

        self.check_categories(user, categories)?;
        self.check_command(user, command_name)?;
        if categories.contains(&crate::commands::category::PUBSUB) {
            self.check_channels(user, &keys.channels)?;
        }
        self.check_keys(user, keys)
    }

    fn check_categories(
        &self,
        user: &User,
        categories: &[&'static str],
    ) -> Result<(), CommandError> {
        if user.included_categories.first().map(String::as_str)
            != Some(WILDCARD)
        {
            let missing: BTreeSet<&str> = categories
                .iter()
                .copied()
                .filter(|c| {
                    !user.included_categories.iter().any(|inc| inc == c)
                })
                .collect();
            if !missing.is_empty() {
                return Err(unauthorized_categories(&missing));
            }
        }

        let exclude_all = user.excluded_categories.iter().any(|e| e == WILDCARD);
        let denied: BTreeSet<&str> = categories
            .iter()
            .copied()
            .filter(|c| {
                exclude_all
                    || user.excluded_categories.iter().any(|exc| exc == c)
            })
            .collect();
        if !denied.is_empty() {
            return Err(unauthorized_categories(&denied));
        }
        Ok(())
    }

    fn check_command(
        &self,
        user: &User,
        command_name: &str,
    ) -> Result<(), CommandError> {
        let allowed = user
            .included_commands
            .iter()
            .any(|c| c == WILDCARD || c == command_name);
        let denied = user
            .excluded_commands
            .iter()
            .any(|c| c == WILDCARD || c == command_name);
        if !allowed || denied {
            return Err(CommandError::custom(format!(
                "not authorised to run {} command",
                command_name.to_ascii_uppercase()
            )));
        }
        Ok(())
    }

    fn check_channels(
        &self,
        user: &User,
        channels: &[String],
    ) -> Result<(), CommandError> {
        for channel in channels {
            let included = user
                .included_pubsub_channels
                .iter()
                .any(|p| self.glob_match(p, channel));
            let excluded = user
                .excluded_pubsub_channels
                .iter()
                .any(|p| self.glob_match(p, channel));
            if !included || excluded {
                return Err(CommandError::custom(format!(
                    "not authorised to access channel &{channel}"
                )));
            }
        }
        Ok(())
    }

    fn check_keys(&self, user: &User, keys: &KeySet) -> Result<(), CommandError> {
        let touches_keys =
            !keys.read_keys.is_empty() || !keys.write_keys.is_empty();
        if user.no_keys && touches_keys {
            let mut rejected: Vec<String> = keys
                .read_keys
                .iter()
                .map(|k| format!("%R~{k}"))
                .chain(keys.write_keys.iter().map(|k| format!("%W~{k}")))
                .collect();
            rejected.sort_unstable();
            return Err(unauthorized_keys(&rejected));
        }

        let mut rejected = Vec::new();
        for key in &keys.read_keys {
            let ok = user
                .included_read_keys
                .iter()
                .any(|p| self.glob_match(p, key));
            if !ok {
                rejected.push(format!("%R~{key}"));
            }
        }
        for key in &keys.write_keys {
            let ok = user
                .included_write_keys
                .iter()
                .any(|p| self.glob_match(p, key));
            if !ok {
                rejected.push(format!("%W~{key}"));
            }
        }
        if rejected.is_empty() {
            Ok(())
        } else {
            rejected.sort_unstable();
            Err(unauthorized_keys(&rejected))
        }
    }

    /// `ACL SETUSER <name> [rule ...]`: creates or mutates a user and
    /// refreshes the compiled-pattern cache.
    pub async fn set_user(&self, tokens: &[String]) -> Result<(), CommandError> {
        let Some((username, rules)) = tokens.split_first() else {
            return Err(CommandError::WrongArgs);
        };

        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.username == *username) {
            Some(user) => user.apply_rules(rules)?,
            None => {
                let mut user = User::new(username.clone());
                user.apply_rules(rules)?;
                users.push(user);
            },
        }
        drop(users);

        self.rebuild_patterns().await;
        Ok(())
    }

    pub async fn get_user(&self, username: &str) -> Option<User> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned()
    }

    pub async fn users_snapshot(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    pub async fn usernames(&self) -> Vec<String> {
        self.users
            .read()
            .await
            .iter()
            .map(|u| u.username.clone())
            .collect()
    }

    /// Removes the named users, silently skipping `default`. Returns the
    /// usernames actually deleted so the caller can terminate their
    /// connections.
    pub async fn delete_users(&self, names: &[String]) -> Vec<String> {
        let mut users = self.users.write().await;
        let mut deleted = Vec::new();
        for name in names {
            if name == DEFAULT_USERNAME {
                continue;
            }
            if let Some(pos) = users.iter().position(|u| &u.username == name) {
                users.remove(pos);
                deleted.push(name.clone());
            }
        }
        drop(users);

        if !deleted.is_empty() {
            self.rebuild_patterns().await;
        }
        deleted
    }

    /// `ACL SAVE`: serializes the effective user list to the configured file
    /// (JSON or YAML by extension).
    pub async fn save(&self) -> Result<PathBuf, CommandError> {
        let Some(path) = &self.file_path else {
            return Err(CommandError::custom("no ACL config file is configured"));
        };
        let users = self.users.read().await.clone();

        let serialized = match FileFormat::from_path(path) {
            Some(FileFormat::Json) => serde_json::to_string_pretty(&users)
                .map_err(|e| CommandError::custom(e.to_string()))?,
            Some(FileFormat::Yaml) => serde_yaml::to_string(&users)
                .map_err(|e| CommandError::custom(e.to_string()))?,
            None => {
                return Err(CommandError::custom(
                    "ACL config file must end in .json, .yaml or .yml",
                ));
            },
        };

        tokio::fs::write(path, serialized).await.map_err(|e| {
            CommandError::custom(format!("failed to write ACL file: {e}"))
        })?;
        Ok(path.clone())
    }

    /// `ACL LOAD MERGE|REPLACE`: reads the configured file and merges or
    /// replaces matching in-memory users. Users present only in memory are
    /// kept; users present only in the file are appended.
    pub async fn load(&self, merge: bool) -> Result<(), CommandError> {
        let Some(path) = &self.file_path else {
            return Err(CommandError::custom("no ACL config file is configured"));
        };
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            CommandError::custom(format!("failed to read ACL file: {e}"))
        })?;

        let loaded: Vec<User> = match FileFormat::from_path(path) {
            Some(FileFormat::Json) => serde_json::from_str(&raw)
                .map_err(|e| CommandError::custom(format!("bad ACL JSON: {e}")))?,
            Some(FileFormat::Yaml) => serde_yaml::from_str(&raw)
                .map_err(|e| CommandError::custom(format!("bad ACL YAML: {e}")))?,
            None => {
                return Err(CommandError::custom(
                    "ACL config file must end in .json, .yaml or .yml",
                ));
            },
        };

        let mut users = self.users.write().await;
        for mut incoming in loaded {
            if incoming.username.is_empty() {
                continue;
            }
            incoming.normalize();
            match users
                .iter_mut()
                .find(|u| u.username == incoming.username)
            {
                Some(existing) if merge => existing.merge(incoming),
                Some(existing) => *existing = incoming,
                None => users.push(incoming),
            }
        }
        drop(users);

        self.rebuild_patterns().await;
        Ok(())
    }

    /// Compiles every glob referenced by any user's key/channel lists so
    /// authorization never compiles at decision time.
    async fn rebuild_patterns(&self) {
        let users = self.users.read().await;
        self.patterns.clear();
        for user in users.iter() {
            for pattern in user
                .included_read_keys
                .iter()
                .chain(&user.included_write_keys)
                .chain(&user.included_pubsub_channels)
                .chain(&user.excluded_pubsub_channels)
            {
                if pattern == WILDCARD {
                    continue;
                }
                match Pattern::new(pattern) {
                    Ok(compiled) => {
                        self.patterns.insert(pattern.clone(), compiled);
                    },
                    Err(e) => {
                        warn!(pattern, error = %e, "skipping invalid ACL glob");
                    },
                }
            }
        }
    }

    fn glob_match(&self, pattern: &str, target: &str) -> bool {
        if pattern == WILDCARD {
            return true;
        }
        if let Some(compiled) = self.patterns.get(pattern) {
            return compiled.matches(target);
        }
        // Cache miss: an unknown pattern never grants or denies anything it
        // would not with a fresh compile.
        Pattern::new(pattern)
            .map(|p| p.matches(target))
            .unwrap_or(false)
    }
}

fn unauthorized_categories(cats: &BTreeSet<&str>) -> CommandError {
    let joined = cats.iter().copied().collect::<Vec<_>>().join(" ");
    CommandError::custom(format!(
        "unauthorized access to the following categories: [{joined}]"
    ))
}

fn unauthorized_keys(rejected: &[String]) -> CommandError {
    CommandError::custom(format!(
        "not authorised to access the following keys: [{}]",
        rejected.join(" ")
    ))
}
