// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use bytes::BytesMut;
use resp_store_rs::{cfg::config::Config, server::Server};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

/// Boots a server on an ephemeral loopback port and runs its accept loop in
/// the background.
pub async fn start_server(
    mutate: impl FnOnce(&mut Config),
) -> Result<(Arc<Server>, SocketAddr)> {
    let mut cfg = Config::default();
    cfg.server.port = 0;
    mutate(&mut cfg);

    let server = Server::new(cfg).await?;
    let listener = server.bind().await?;
    let addr = listener.local_addr()?;

    let runner = Arc::clone(&server);
    tokio::spawn(async move {
        let _ = runner.run_with(listener).await;
    });

    Ok((server, addr))
}

/// Minimal RESP client for driving the server over real TCP.
pub struct TestClient {
    stream: TcpStream,
    buf: BytesMut,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            buf: BytesMut::with_capacity(4 * 1024),
        })
    }

    /// Sends one command as an array of bulk strings.
    pub async fn send(&mut self, tokens: &[&str]) -> Result<()> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(format!("*{}\r\n", tokens.len()).as_bytes());
        for token in tokens {
            out.extend_from_slice(format!("${}\r\n", token.len()).as_bytes());
            out.extend_from_slice(token.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        self.stream.write_all(&out).await?;
        Ok(())
    }

    /// Reads one complete reply frame and returns its raw bytes as a string.
    pub async fn read_reply(&mut self) -> Result<String> {
        loop {
            if let Some(len) = frame_len(&self.buf)? {
                let frame = self.buf.split_to(len);
                return Ok(String::from_utf8_lossy(&frame).into_owned());
            }
            let read = timeout(
                Duration::from_secs(5),
                self.stream.read_buf(&mut self.buf),
            )
            .await
            .context("timed out waiting for a reply")??;
            if read == 0 {
                bail!("connection closed");
            }
        }
    }

    /// Round trip: send then read one reply.
    pub async fn request(&mut self, tokens: &[&str]) -> Result<String> {
        self.send(tokens).await?;
        self.read_reply().await
    }

    /// Asserts the peer closes the stream (used by the DELUSER scenario).
    pub async fn expect_closed(&mut self) -> Result<()> {
        let read = timeout(
            Duration::from_secs(5),
            self.stream.read_buf(&mut self.buf),
        )
        .await
        .context("timed out waiting for the server to close")??;
        if read != 0 {
            bail!("expected end of stream, got {read} bytes");
        }
        Ok(())
    }
}

/// Length of one complete RESP frame at the start of `buf`, or `None` when
/// more bytes are needed.
fn frame_len(buf: &[u8]) -> Result<Option<usize>> {
    fn line_end(buf: &[u8], from: usize) -> Option<usize> {
        buf[from..]
            .windows(2)
            .position(|w| w == b"\r\n")
            .map(|p| from + p + 2)
    }

    fn one(buf: &[u8], at: usize) -> Result<Option<usize>> {
        let Some(&kind) = buf.get(at) else {
            return Ok(None);
        };
        let Some(after_header) = line_end(buf, at) else {
            return Ok(None);
        };
        let header = std::str::from_utf8(&buf[at + 1..after_header - 2])
            .context("reply header is not UTF-8")?;

        match kind {
            b'+' | b'-' | b':' => Ok(Some(after_header)),
            b'$' => {
                let len: i64 = header.parse().context("bad bulk length")?;
                if len < 0 {
                    return Ok(Some(after_header));
                }
                let end = after_header + len as usize + 2;
                if buf.len() < end {
                    Ok(None)
                } else {
                    Ok(Some(end))
                }
            },
            b'*' => {
                let count: i64 = header.parse().context("bad array length")?;
                let mut cursor = after_header;
                for _ in 0..count.max(0) {
                    match one(buf, cursor)? {
                        Some(end) => cursor = end,
                        None => return Ok(None),
                    }
                }
                Ok(Some(cursor))
            },
            other => bail!("unexpected reply type byte {other:#x}"),
        }
    }

    one(buf, 0)
}
