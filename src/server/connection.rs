// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::BTreeSet,
    net::SocketAddr,
    sync::{
        Arc, Mutex as StdMutex, PoisonError, RwLock as StdRwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tokio::{net::tcp::OwnedWriteHalf, sync::Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::acl::user::DEFAULT_USERNAME;

/// Per-connection state shared between the dispatcher, the ACL and the
/// pub/sub engine.
///
/// The kill token is the termination path for `ACL DELUSER`: cancelling it
/// makes the connection's blocked read return, which tears the session down.
#[derive(Debug)]
pub struct ConnHandle {
    pub id: u64,
    pub addr: Option<SocketAddr>,
    authenticated: AtomicBool,
    username: StdRwLock<String>,
    kill: CancellationToken,
    writer: OnceCell<Arc<Mutex<OwnedWriteHalf>>>,
    named_subs: StdMutex<BTreeSet<String>>,
    pattern_subs: StdMutex<BTreeSet<String>>,
}

impl ConnHandle {
    pub fn new(id: u64, addr: Option<SocketAddr>) -> Arc<Self> {
        Arc::new(Self {
            id,
            addr,
            authenticated: AtomicBool::new(false),
            username: StdRwLock::new(DEFAULT_USERNAME.to_string()),
            kill: CancellationToken::new(),
            writer: OnceCell::new(),
            named_subs: StdMutex::new(BTreeSet::new()),
            pattern_subs: StdMutex::new(BTreeSet::new()),
        })
    }

    /// Must be called once, right after the TCP stream is split.
    pub fn attach_writer(&self, writer: Arc<Mutex<OwnedWriteHalf>>) {
        let _ = self.writer.set(writer);
    }

    /// Absent on embedded/test bundles that never attached a socket.
    pub fn writer(&self) -> Option<Arc<Mutex<OwnedWriteHalf>>> {
        self.writer.get().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn set_authenticated(&self, username: &str) {
        if let Ok(mut guard) = self.username.write() {
            *guard = username.to_string();
        }
        self.authenticated.store(true, Ordering::SeqCst);
    }

    /// Effective username; `default` until an AUTH succeeds.
    pub fn username(&self) -> String {
        self.username
            .read()
            .map(|g| g.clone())
            .unwrap_or_else(|_| DEFAULT_USERNAME.to_string())
    }

    pub fn kill(&self) {
        self.kill.cancel();
    }

    pub fn kill_token(&self) -> CancellationToken {
        self.kill.clone()
    }

    pub fn add_named_sub(&self, channel: &str) {
        self.named_subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.to_string());
    }

    pub fn remove_named_sub(&self, channel: &str) -> bool {
        self.named_subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(channel)
    }

    pub fn named_subs(&self) -> Vec<String> {
        self.named_subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn add_pattern_sub(&self, pattern: &str) {
        self.pattern_subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string());
    }

    pub fn remove_pattern_sub(&self, pattern: &str) -> bool {
        self.pattern_subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(pattern)
    }

    pub fn pattern_subs(&self) -> Vec<String> {
        self.pattern_subs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Registry of live TCP connections, keyed by connection id.
#[derive(Debug, Default)]
pub struct Connections {
    conns: DashMap<u64, Arc<ConnHandle>>,
    next_id: AtomicU64,
}

impl Connections {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, addr: Option<SocketAddr>) -> Arc<ConnHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let conn = ConnHandle::new(id, addr);
        self.conns.insert(id, Arc::clone(&conn));
        conn
    }

    pub fn remove(&self, id: u64) {
        self.conns.remove(&id);
    }

    pub fn get(&self, id: u64) -> Option<Arc<ConnHandle>> {
        self.conns.get(&id).map(|e| Arc::clone(e.value()))
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Cancels every connection currently authenticated as `username`.
    /// Returns how many were terminated.
    pub fn kill_user_sessions(&self, username: &str) -> usize {
        let mut killed = 0;
        for entry in self.conns.iter() {
            let conn = entry.value();
            if conn.is_authenticated() && conn.username() == username {
                debug!(conn = conn.id, user = username, "terminating session");
                conn.kill();
                killed += 1;
            }
        }
        killed
    }
}
