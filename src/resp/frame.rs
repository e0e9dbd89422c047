// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed RESP reply values.
//!
//! Handlers build a `Frame` and hand its encoding to the dispatcher; the
//! encoding is byte-for-byte the wire contract, so tests assert on
//! `Frame::encode` output directly.

/// A single RESP value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `+<text>\r\n`
    Simple(String),
    /// `-<message>\r\n`
    Error(String),
    /// `:<n>\r\n`
    Integer(i64),
    /// `$<len>\r\n<payload>\r\n`
    Bulk(String),
    /// `$-1\r\n`
    NullBulk,
    /// `*<n>\r\n` followed by the elements
    Array(Vec<Frame>),
    /// `*-1\r\n`
    NullArray,
}

impl Frame {
    pub fn ok() -> Self {
        Frame::Simple("OK".to_string())
    }

    pub fn bulk<S: Into<String>>(s: S) -> Self {
        Frame::Bulk(s.into())
    }

    pub fn error<S: Into<String>>(s: S) -> Self {
        Frame::Error(s.into())
    }

    /// `["message", channel, payload]`: the TCP pub/sub delivery frame.
    pub fn message(channel: &str, payload: &str) -> Self {
        Frame::Array(vec![
            Frame::bulk("message"),
            Frame::bulk(channel),
            Frame::bulk(payload),
        ])
    }

    /// `[action, channel, index]`: one (un)subscription confirmation.
    pub fn subscription(action: &str, channel: &str, index: i64) -> Self {
        Frame::Array(vec![
            Frame::bulk(action),
            Frame::bulk(channel),
            Frame::Integer(index),
        ])
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        self.encode_into(&mut out);
        out
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                out.push(b'+');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            },
            Frame::Error(s) => {
                out.push(b'-');
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            },
            Frame::Integer(n) => {
                out.push(b':');
                out.extend_from_slice(n.to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
            },
            Frame::Bulk(s) => {
                out.push(b'$');
                out.extend_from_slice(s.len().to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
                out.extend_from_slice(s.as_bytes());
                out.extend_from_slice(b"\r\n");
            },
            Frame::NullBulk => out.extend_from_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                out.push(b'*');
                out.extend_from_slice(items.len().to_string().as_bytes());
                out.extend_from_slice(b"\r\n");
                for item in items {
                    item.encode_into(out);
                }
            },
            Frame::NullArray => out.extend_from_slice(b"*-1\r\n"),
        }
    }
}
