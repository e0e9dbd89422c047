// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use tokio::{io::AsyncWriteExt, net::TcpStream, sync::Mutex};
use tracing::debug;

use crate::{
    commands::{CommandFlags, HandlerParams},
    resp::{Frame, FrameReader},
    server::{connection::ConnHandle, listener::Server},
};

/// Runs one connection's read → dispatch → reply loop until the peer goes
/// away, the server shuts down, or the connection is killed (`ACL DELUSER`).
pub async fn serve_connection(
    server: Arc<Server>,
    stream: TcpStream,
    conn: Arc<ConnHandle>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(conn = conn.id, error = %e, "set_nodelay failed");
    }
    let (read_half, write_half) = stream.into_split();
    let writer = Arc::new(Mutex::new(write_half));
    conn.attach_writer(Arc::clone(&writer));

    let mut reader = FrameReader::new(read_half);
    let kill = conn.kill_token();
    let shutdown = server.cancel.clone();

    loop {
        let tokens = tokio::select! {
            _ = kill.cancelled() => break,
            _ = shutdown.cancelled() => break,
            read = reader.read_command() => match read {
                Ok(Some(tokens)) => tokens,
                Ok(None) => break,
                Err(e) => {
                    // Malformed frame: close without a reply.
                    debug!(conn = conn.id, error = %e, "RESP decode failed");
                    break;
                },
            },
        };

        let reply = dispatch_command(&server, &conn, tokens).await;
        let mut w = writer.lock().await;
        if w.write_all(&reply).await.is_err() {
            break;
        }
    }

    server.pubsub.drop_subscriber(conn.id);
    server.connections.remove(conn.id);
    debug!(conn = conn.id, "connection closed");
}

/// The §dispatch pipeline for one parsed command: resolve → extract keys →
/// authorize → invoke → encode. Always produces reply bytes; failures become
/// `-ERR …` frames.
pub async fn dispatch_command(
    server: &Arc<Server>,
    conn: &Arc<ConnHandle>,
    tokens: Vec<String>,
) -> Vec<u8> {
    let Some(resolved) = server.registry.resolve(&tokens) else {
        let name = tokens
            .first()
            .map(|t| t.to_ascii_uppercase())
            .unwrap_or_default();
        return Frame::error(format!("ERR unknown command {name}")).encode();
    };

    let keys = match (resolved.key_fn())(&tokens) {
        Ok(keys) => keys,
        Err(e) => return Frame::error(format!("ERR {e}")).encode(),
    };

    if !resolved.flags().contains(CommandFlags::SKIP_AUTH) {
        let full_name = resolved.full_name();
        if let Err(e) = server
            .acl
            .authorize(conn, resolved.categories(), &full_name, &keys)
            .await
        {
            return Frame::error(format!("ERR {e}")).encode();
        }
    }

    let params = HandlerParams {
        tokens,
        conn: Arc::clone(conn),
        keyspace: Arc::clone(&server.keyspace),
        clock: Arc::clone(&server.clock),
        acl: Arc::clone(&server.acl),
        pubsub: Arc::clone(&server.pubsub),
        registry: Arc::clone(&server.registry),
        connections: Arc::clone(&server.connections),
        hooks: Arc::clone(&server.hooks),
    };

    match (resolved.handler())(params).await {
        Ok(bytes) => bytes,
        Err(e) => Frame::error(format!("ERR {e}")).encode(),
    }
}
