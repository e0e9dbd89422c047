// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Result, bail};
use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Incremental RESP command decoder over a TCP read half.
///
/// Understands length-prefixed arrays of bulk strings (the normal client
/// encoding) and whitespace-separated inline commands. A malformed frame is
/// a hard error; the dispatcher closes the connection without replying.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Reads the next command as a token list. `Ok(None)` means the peer
    /// closed the stream at a frame boundary. Empty frames (`*0`, `*-1`,
    /// blank inline lines) are skipped.
    pub async fn read_command(&mut self) -> Result<Option<Vec<String>>> {
        loop {
            if let Some((tokens, consumed)) = parse_command(&self.buf)? {
                self.buf.advance(consumed);
                if tokens.is_empty() {
                    continue;
                }
                return Ok(Some(tokens));
            }

            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                bail!("connection closed mid-frame");
            }
        }
    }
}

/// Attempts to parse one command from `buf`. Returns `None` when more bytes
/// are needed, otherwise the tokens and the number of bytes consumed.
fn parse_command(buf: &[u8]) -> Result<Option<(Vec<String>, usize)>> {
    if buf.is_empty() {
        return Ok(None);
    }

    if buf[0] == b'*' {
        parse_array(buf)
    } else {
        parse_inline(buf)
    }
}

fn parse_array(buf: &[u8]) -> Result<Option<(Vec<String>, usize)>> {
    let Some((line, mut pos)) = read_line(buf, 0) else {
        return Ok(None);
    };

    let count: i64 = match line[1..].parse() {
        Ok(n) => n,
        Err(_) => bail!("invalid array length {:?}", &line[1..]),
    };
    if count < 0 {
        // Null array: nothing to dispatch.
        return Ok(Some((Vec::new(), pos)));
    }

    let mut tokens = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let Some((token, next)) = parse_bulk(buf, pos)? else {
            return Ok(None);
        };
        tokens.push(token);
        pos = next;
    }

    Ok(Some((tokens, pos)))
}

fn parse_bulk(buf: &[u8], pos: usize) -> Result<Option<(String, usize)>> {
    let Some((line, payload_start)) = read_line(buf, pos) else {
        return Ok(None);
    };
    if !line.starts_with('$') {
        bail!("expected bulk string, got {line:?}");
    }

    let len: usize = match line[1..].parse() {
        Ok(n) => n,
        Err(_) => bail!("invalid bulk length {:?}", &line[1..]),
    };

    let payload_end = payload_start + len;
    if buf.len() < payload_end + 2 {
        return Ok(None);
    }
    if &buf[payload_end..payload_end + 2] != b"\r\n" {
        bail!("bulk string missing CRLF terminator");
    }

    let token = match std::str::from_utf8(&buf[payload_start..payload_end]) {
        Ok(s) => s.to_string(),
        Err(_) => bail!("bulk string is not valid UTF-8"),
    };

    Ok(Some((token, payload_end + 2)))
}

fn parse_inline(buf: &[u8]) -> Result<Option<(Vec<String>, usize)>> {
    let Some((line, next)) = read_line(buf, 0) else {
        return Ok(None);
    };

    let tokens = line
        .split_whitespace()
        .map(|t| t.to_string())
        .collect::<Vec<_>>();

    Ok(Some((tokens, next)))
}

/// Returns the UTF-8 line starting at `pos` (without CRLF) and the offset
/// just past its terminator.
fn read_line(buf: &[u8], pos: usize) -> Option<(&str, usize)> {
    let rest = &buf[pos..];
    let end = rest.windows(2).position(|w| w == b"\r\n")?;
    let line = std::str::from_utf8(&rest[..end]).ok()?;
    Some((line, pos + end + 2))
}
