// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Result, anyhow};
use bytes::Bytes;
use serde_json::json;
use tokio::{
    io::AsyncWriteExt,
    net::tcp::OwnedWriteHalf,
    sync::{Mutex, mpsc},
};

use crate::resp::Frame;

/// One delivery target of a channel. The two shapes differ only in framing:
/// a TCP subscriber gets the RESP array `["message", channel, payload]`, an
/// embedded subscriber gets the same triple as one newline-terminated JSON
/// line on an in-process pipe.
#[derive(Debug, Clone)]
pub enum SubscriberSink {
    Tcp {
        conn_id: u64,
        writer: Arc<Mutex<OwnedWriteHalf>>,
    },
    Embedded {
        id: u64,
        tx: mpsc::UnboundedSender<Bytes>,
    },
}

impl SubscriberSink {
    pub fn id(&self) -> u64 {
        match self {
            SubscriberSink::Tcp { conn_id, .. } => *conn_id,
            SubscriberSink::Embedded { id, .. } => *id,
        }
    }

    pub async fn write_frame(&self, channel: &str, payload: &str) -> Result<()> {
        match self {
            SubscriberSink::Tcp { writer, .. } => {
                let encoded = Frame::message(channel, payload).encode();
                let mut w = writer.lock().await;
                w.write_all(&encoded).await?;
                Ok(())
            },
            SubscriberSink::Embedded { tx, .. } => {
                let mut line = serde_json::to_vec(&json!([
                    "message", channel, payload
                ]))?;
                line.push(b'\n');
                tx.send(Bytes::from(line))
                    .map_err(|_| anyhow!("embedded subscriber dropped"))
            },
        }
    }
}
