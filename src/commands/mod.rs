// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Command metadata and the registry the dispatcher resolves against.
//!
//! Every command is declared as a [`CommandSpec`]: its categories drive ACL
//! decisions, its key-extraction function is the single source of truth for
//! arity validation and for the keys/channels the ACL gate checks *before*
//! the handler runs.

use std::{future::Future, pin::Pin, sync::Arc};

use bitflags::bitflags;

use crate::store::error::CommandError;

/// ACL sub-commands of the `ACL` command.
pub mod acl;
/// AUTH / PING / ACK.
pub mod connection;
/// DEL / EXISTS / EXPIRE / TTL / PERSIST.
pub mod generic;
/// The capability bundle handed to every handler.
pub mod handler;
/// Hash module with per-field TTLs.
pub mod hash;
/// List module.
pub mod list;
/// SUBSCRIBE / PUBLISH / PUBSUB and friends.
pub mod pubsub;
/// Set module.
pub mod set;
/// Sorted-set module.
pub mod sorted_set;
/// String module.
pub mod string;

pub use handler::{HandlerParams, PersistenceHooks};

/// Category tags referenced by command declarations and ACL rules.
pub mod category {
    pub const ADMIN: &str = "@admin";
    pub const CONNECTION: &str = "@connection";
    pub const DANGEROUS: &str = "@dangerous";
    pub const FAST: &str = "@fast";
    pub const HASH: &str = "@hash";
    pub const KEYSPACE: &str = "@keyspace";
    pub const LIST: &str = "@list";
    pub const PUBSUB: &str = "@pubsub";
    pub const READ: &str = "@read";
    pub const SET: &str = "@set";
    pub const SLOW: &str = "@slow";
    pub const SORTEDSET: &str = "@sortedset";
    pub const STRING: &str = "@string";
    pub const WRITE: &str = "@write";
}

bitflags! {
    /// Behavioural command flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CommandFlags: u8 {
        /// Mutates replicated state (forwarded to the replication layer).
        const SYNC = 1 << 0;
        /// Dispatched without running the authorization body (PING/ACK/AUTH).
        const SKIP_AUTH = 1 << 1;
    }
}

/// The keys and channels a command invocation touches, as reported by its
/// key-extraction function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    pub channels: Vec<String>,
    pub read_keys: Vec<String>,
    pub write_keys: Vec<String>,
}

impl KeySet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn read(keys: Vec<String>) -> Self {
        Self {
            read_keys: keys,
            ..Self::default()
        }
    }

    pub fn write(keys: Vec<String>) -> Self {
        Self {
            write_keys: keys,
            ..Self::default()
        }
    }

    pub fn channels(channels: Vec<String>) -> Self {
        Self {
            channels,
            ..Self::default()
        }
    }
}

pub type HandlerFuture =
    Pin<Box<dyn Future<Output = Result<Vec<u8>, CommandError>> + Send>>;
pub type HandlerFn = fn(HandlerParams) -> HandlerFuture;
pub type KeyExtractionFn = fn(&[String]) -> Result<KeySet, CommandError>;

/// A declared sub-command; identified as `cmd|sub` in ACL rules.
pub struct SubCommandSpec {
    pub name: &'static str,
    pub module: &'static str,
    pub categories: &'static [&'static str],
    pub flags: CommandFlags,
    pub description: &'static str,
    pub key_fn: KeyExtractionFn,
    pub handler: HandlerFn,
}

/// A top-level command declaration.
pub struct CommandSpec {
    pub name: &'static str,
    pub module: &'static str,
    pub categories: &'static [&'static str],
    pub flags: CommandFlags,
    pub description: &'static str,
    pub sub_commands: Vec<SubCommandSpec>,
    pub key_fn: KeyExtractionFn,
    pub handler: HandlerFn,
}

/// A command resolved from inbound tokens, narrowed to a sub-command when the
/// second token names one.
pub struct Resolved<'a> {
    pub command: &'a CommandSpec,
    pub sub: Option<&'a SubCommandSpec>,
}

impl Resolved<'_> {
    /// Lowercase `cmd` or `cmd|sub` used in ACL rule matching and echoes.
    pub fn full_name(&self) -> String {
        match self.sub {
            Some(sub) => format!("{}|{}", self.command.name, sub.name),
            None => self.command.name.to_string(),
        }
    }

    pub fn categories(&self) -> &'static [&'static str] {
        self.sub
            .map(|s| s.categories)
            .unwrap_or(self.command.categories)
    }

    pub fn flags(&self) -> CommandFlags {
        self.sub.map(|s| s.flags).unwrap_or(self.command.flags)
    }

    pub fn key_fn(&self) -> KeyExtractionFn {
        self.sub.map(|s| s.key_fn).unwrap_or(self.command.key_fn)
    }

    pub fn handler(&self) -> HandlerFn {
        self.sub.map(|s| s.handler).unwrap_or(self.command.handler)
    }
}

/// The command registry.
pub struct Registry {
    commands: Vec<CommandSpec>,
}

impl Registry {
    /// Every module this server ships.
    pub fn standard() -> Arc<Self> {
        let mut commands = Vec::new();
        commands.extend(connection::commands());
        commands.extend(acl::commands());
        commands.extend(generic::commands());
        commands.extend(string::commands());
        commands.extend(hash::commands());
        commands.extend(set::commands());
        commands.extend(sorted_set::commands());
        commands.extend(list::commands());
        commands.extend(pubsub::commands());
        Arc::new(Self { commands })
    }

    /// Case-insensitive lookup; narrows to a declared sub-command when the
    /// second token matches one.
    pub fn resolve(&self, tokens: &[String]) -> Option<Resolved<'_>> {
        let first = tokens.first()?;
        let command = self
            .commands
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(first))?;

        let sub = tokens.get(1).and_then(|second| {
            command
                .sub_commands
                .iter()
                .find(|s| s.name.eq_ignore_ascii_case(second))
        });

        Some(Resolved { command, sub })
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    /// Distinct category names across the registry, sorted.
    pub fn categories(&self) -> Vec<&'static str> {
        let mut cats: Vec<&'static str> = self
            .commands
            .iter()
            .flat_map(|c| {
                c.categories.iter().copied().chain(
                    c.sub_commands
                        .iter()
                        .flat_map(|s| s.categories.iter().copied()),
                )
            })
            .collect();
        cats.sort_unstable();
        cats.dedup();
        cats
    }

    /// Command names (with `cmd|sub` for sub-commands) carrying `cat`.
    pub fn commands_in_category(&self, cat: &str) -> Vec<String> {
        let mut names = Vec::new();
        for command in &self.commands {
            if command.categories.contains(&cat) {
                names.push(command.name.to_string());
            }
            for sub in &command.sub_commands {
                if sub.categories.contains(&cat) {
                    names.push(format!("{}|{}", command.name, sub.name));
                }
            }
        }
        names.sort_unstable();
        names
    }
}

/// Single-key read through the batch contract.
pub(crate) async fn value_of(
    params: &HandlerParams,
    key: &str,
) -> Option<crate::store::Value> {
    let owned = key.to_string();
    params
        .keyspace
        .get_values(std::slice::from_ref(&owned))
        .await
        .remove(&owned)
        .flatten()
}

/// Single-key write through the batch contract.
pub(crate) async fn store_one(
    params: &HandlerParams,
    key: &str,
    value: crate::store::Value,
) {
    params
        .keyspace
        .set_values(std::collections::HashMap::from([(
            key.to_string(),
            value,
        )]))
        .await;
}

/// Integer argument parsing with a command-specific wire message.
pub(crate) fn parse_i64(
    token: &str,
    message: &'static str,
) -> Result<i64, CommandError> {
    token
        .parse::<i64>()
        .map_err(|_| CommandError::custom(message))
}
