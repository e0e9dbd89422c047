// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;
use dashmap::DashMap;
use glob::Pattern;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    pubsub::{
        EMBEDDED_ID_BASE,
        channel::Channel,
        subscriber::SubscriberSink,
    },
    store::error::CommandError,
};

/// The pub/sub fan-out engine.
///
/// Channels are created lazily on first subscription and survive until the
/// engine shuts down; their subscriber sets grow on (P)SUBSCRIBE and shrink
/// on unsubscribe or disconnect.
pub struct PubSub {
    channels: DashMap<String, Arc<Channel>>,
    cancel: CancellationToken,
    embedded_ids: AtomicU64,
}

impl PubSub {
    pub fn new(cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            channels: DashMap::new(),
            cancel,
            embedded_ids: AtomicU64::new(EMBEDDED_ID_BASE),
        })
    }

    /// Subscribes `sink` to a named channel, creating it on first use.
    pub fn subscribe(&self, name: &str, sink: SubscriberSink) {
        self.named_channel(name).subscribe(sink);
    }

    /// Subscribes `sink` to a pattern channel (PSUBSCRIBE).
    pub fn psubscribe(
        &self,
        pattern: &str,
        sink: SubscriberSink,
    ) -> Result<(), CommandError> {
        self.pattern_channel(pattern)?.subscribe(sink);
        Ok(())
    }

    /// Detaches a subscriber from one channel. Returns whether it was
    /// actually subscribed.
    pub fn unsubscribe(&self, name: &str, sub_id: u64) -> bool {
        self.channels
            .get(name)
            .map(|ch| ch.unsubscribe(sub_id))
            .unwrap_or(false)
    }

    /// Detaches a subscriber from every channel (connection teardown).
    pub fn drop_subscriber(&self, sub_id: u64) {
        for entry in self.channels.iter() {
            entry.value().unsubscribe(sub_id);
        }
    }

    /// Fans a message out to every matching channel queue. Returns the total
    /// number of subscribers the message was enqueued for.
    pub fn publish(&self, target: &str, payload: &str) -> i64 {
        let mut receivers = 0i64;
        for entry in self.channels.iter() {
            let channel = entry.value();
            if channel.matches(target) {
                channel.enqueue(payload);
                receivers += channel.subscriber_count() as i64;
            }
        }
        receivers
    }

    /// `PUBSUB CHANNELS [pattern]`: names of channels with at least one
    /// subscriber, optionally filtered by a glob.
    pub fn active_channels(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<String>, CommandError> {
        let filter = match filter {
            Some(raw) => Some(compile_pattern(raw)?),
            None => None,
        };
        let mut names: Vec<String> = self
            .channels
            .iter()
            .filter(|e| e.value().subscriber_count() > 0)
            .filter(|e| {
                filter
                    .as_ref()
                    .map(|p| p.matches(e.value().name()))
                    .unwrap_or(true)
            })
            .map(|e| e.value().name().to_string())
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    /// `PUBSUB NUMPAT`: count of pattern channels with subscribers.
    pub fn numpat(&self) -> i64 {
        self.channels
            .iter()
            .filter(|e| e.value().is_pattern() && e.value().subscriber_count() > 0)
            .count() as i64
    }

    /// `PUBSUB NUMSUB chan...`: subscriber count per named argument, zero for
    /// unknown channels.
    pub fn numsub(&self, names: &[String]) -> Vec<(String, i64)> {
        names
            .iter()
            .map(|name| {
                let count = self
                    .channels
                    .get(name)
                    .map(|ch| ch.subscriber_count() as i64)
                    .unwrap_or(0);
                (name.clone(), count)
            })
            .collect()
    }

    pub fn is_subscribed(&self, name: &str, sub_id: u64) -> bool {
        self.channels
            .get(name)
            .map(|ch| ch.is_subscribed(sub_id))
            .unwrap_or(false)
    }

    /// In-process subscription to named channels: returns the subscriber id
    /// and the receiving end of the pipe carrying newline-terminated JSON
    /// `["message", channel, payload]` lines.
    pub fn subscribe_embedded(
        &self,
        channels: &[String],
    ) -> (u64, mpsc::UnboundedReceiver<Bytes>) {
        let (id, tx, rx) = self.embedded_pipe();
        for name in channels {
            self.subscribe(name, SubscriberSink::Embedded {
                id,
                tx: tx.clone(),
            });
        }
        (id, rx)
    }

    /// In-process subscription to pattern channels.
    pub fn psubscribe_embedded(
        &self,
        patterns: &[String],
    ) -> Result<(u64, mpsc::UnboundedReceiver<Bytes>), CommandError> {
        let (id, tx, rx) = self.embedded_pipe();
        for pattern in patterns {
            self.psubscribe(pattern, SubscriberSink::Embedded {
                id,
                tx: tx.clone(),
            })?;
        }
        Ok((id, rx))
    }

    fn embedded_pipe(
        &self,
    ) -> (u64, mpsc::UnboundedSender<Bytes>, mpsc::UnboundedReceiver<Bytes>) {
        let id = self.embedded_ids.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        (id, tx, rx)
    }

    fn named_channel(&self, name: &str) -> Arc<Channel> {
        Arc::clone(
            self.channels
                .entry(name.to_string())
                .or_insert_with(|| {
                    Channel::spawn(
                        name.to_string(),
                        None,
                        self.cancel.child_token(),
                    )
                })
                .value(),
        )
    }

    fn pattern_channel(
        &self,
        pattern: &str,
    ) -> Result<Arc<Channel>, CommandError> {
        if let Some(existing) = self.channels.get(pattern) {
            return Ok(Arc::clone(existing.value()));
        }
        let compiled = compile_pattern(pattern)?;
        Ok(Arc::clone(
            self.channels
                .entry(pattern.to_string())
                .or_insert_with(|| {
                    Channel::spawn(
                        pattern.to_string(),
                        Some(compiled),
                        self.cancel.child_token(),
                    )
                })
                .value(),
        ))
    }
}

pub fn compile_pattern(raw: &str) -> Result<Pattern, CommandError> {
    Pattern::new(raw)
        .map_err(|e| CommandError::custom(format!("invalid pattern {raw:?}: {e}")))
}
