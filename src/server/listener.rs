// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    acl::Acl,
    cfg::config::Config,
    clock::{Clock, SystemClock},
    commands::{PersistenceHooks, Registry},
    pubsub::PubSub,
    server::{connection::Connections, dispatcher},
    store::Keyspace,
};

const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// The assembled server: every engine plus the listener lifecycle.
pub struct Server {
    pub cfg: Config,
    pub keyspace: Arc<Keyspace>,
    pub acl: Arc<Acl>,
    pub pubsub: Arc<PubSub>,
    pub registry: Arc<Registry>,
    pub connections: Arc<Connections>,
    pub clock: Arc<dyn Clock>,
    pub hooks: Arc<PersistenceHooks>,
    pub cancel: CancellationToken,
}

impl Server {
    pub async fn new(cfg: Config) -> Result<Arc<Self>> {
        Self::with_clock(cfg, Arc::new(SystemClock)).await
    }

    /// Builds every engine against an injected clock (tests drive TTLs with
    /// a manual one).
    pub async fn with_clock(
        cfg: Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>> {
        let cancel = CancellationToken::new();

        let keyspace = Keyspace::new(Arc::clone(&clock));
        let _sweeper = keyspace.spawn_sweeper(cancel.child_token(), SWEEP_INTERVAL);

        let acl = Acl::new(&cfg).await?;
        let pubsub = PubSub::new(cancel.child_token());
        let registry = Registry::standard();
        let connections = Connections::new();

        Ok(Arc::new(Self {
            cfg,
            keyspace,
            acl,
            pubsub,
            registry,
            connections,
            clock,
            hooks: Arc::new(PersistenceHooks::default()),
            cancel,
        }))
    }

    /// Binds the configured listen address (port 0 asks for an ephemeral
    /// port).
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.cfg.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        Ok(listener)
    }

    /// Accept loop: one task per connection, drained on shutdown.
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        let listener = self.bind().await?;
        self.run_with(listener).await
    }

    pub async fn run_with(self: &Arc<Self>, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        info!(addr = %local, "listening");
        if self.cfg.server.tls {
            info!("tls requested: termination is delegated to the fronting deployment");
        }

        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let conn = self.connections.register(Some(peer));
                    let server = Arc::clone(self);
                    tokio::spawn(async move {
                        dispatcher::serve_connection(server, stream, conn).await;
                    });
                },
                Err(e) => {
                    warn!(error = %e, "accept failed");
                },
            }
        }

        info!("listener stopped");
        Ok(())
    }

    /// Signals every per-connection and per-channel task to drain and exit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
