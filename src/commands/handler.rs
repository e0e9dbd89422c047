// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fmt, sync::Arc};

use anyhow::Result;

use crate::{
    acl::Acl,
    clock::Clock,
    commands::Registry,
    pubsub::PubSub,
    server::connection::{ConnHandle, Connections},
    store::Keyspace,
};

type Hook = Box<dyn Fn() -> Result<()> + Send + Sync>;

/// Function-valued persistence hooks. The core invokes them, the outer
/// process decides what snapshotting and AOF rewriting mean.
pub struct PersistenceHooks {
    pub take_snapshot: Hook,
    pub rewrite_aof: Hook,
}

impl Default for PersistenceHooks {
    fn default() -> Self {
        Self {
            take_snapshot: Box::new(|| Ok(())),
            rewrite_aof: Box::new(|| Ok(())),
        }
    }
}

impl fmt::Debug for PersistenceHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceHooks").finish_non_exhaustive()
    }
}

/// The capability bundle passed to every command handler.
///
/// Everything a handler may touch flows through here: its command tokens and
/// connection identity, the keyspace operations, the clock, the ACL and
/// pub/sub accessors, registry introspection and the persistence hooks. No
/// handler reaches for global state.
#[derive(Clone)]
pub struct HandlerParams {
    pub tokens: Vec<String>,
    pub conn: Arc<ConnHandle>,
    pub keyspace: Arc<Keyspace>,
    pub clock: Arc<dyn Clock>,
    pub acl: Arc<Acl>,
    pub pubsub: Arc<PubSub>,
    pub registry: Arc<Registry>,
    pub connections: Arc<Connections>,
    pub hooks: Arc<PersistenceHooks>,
}

impl HandlerParams {
    /// The n-th command token, if present.
    pub fn arg(&self, n: usize) -> Option<&str> {
        self.tokens.get(n).map(String::as_str)
    }
}
