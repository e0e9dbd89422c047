// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use dashmap::DashMap;
use glob::Pattern;
use tokio::{
    sync::mpsc,
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::pubsub::subscriber::SubscriberSink;

/// One pub/sub destination. Named channels match the published name by
/// equality; pattern channels carry the compiled glob from PSUBSCRIBE.
///
/// Each channel owns a single delivery task draining its queue, so delivery
/// order per channel is publish order and a slow subscriber never blocks a
/// publisher.
#[derive(Debug)]
pub struct Channel {
    name: String,
    pattern: Option<Pattern>,
    queue: mpsc::UnboundedSender<String>,
    subscribers: Arc<DashMap<u64, SubscriberSink>>,
}

impl Channel {
    /// Creates the channel and spawns its delivery task, which runs until
    /// `cancel` fires.
    pub fn spawn(
        name: String,
        pattern: Option<Pattern>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let subscribers: Arc<DashMap<u64, SubscriberSink>> =
            Arc::new(DashMap::new());

        let task_subs = Arc::clone(&subscribers);
        let task_name = name.clone();
        tokio::spawn(async move {
            loop {
                let payload = tokio::select! {
                    _ = cancel.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Some(p) => p,
                        None => break,
                    },
                };

                let sinks: Vec<SubscriberSink> =
                    task_subs.iter().map(|e| e.value().clone()).collect();
                let mut deliveries = JoinSet::new();
                for sink in sinks {
                    let channel = task_name.clone();
                    let payload = payload.clone();
                    deliveries.spawn(async move {
                        (sink.id(), sink.write_frame(&channel, &payload).await)
                    });
                }
                while let Some(done) = deliveries.join_next().await {
                    match done {
                        Ok((sub, Err(e))) => {
                            warn!(channel = %task_name, sub, error = %e,
                                "subscriber delivery failed");
                        },
                        Err(e) => {
                            warn!(channel = %task_name, error = %e,
                                "delivery task panicked");
                        },
                        Ok((_, Ok(()))) => {},
                    }
                }
            }
            debug!(channel = %task_name, "delivery task stopped");
        });

        Arc::new(Self {
            name,
            pattern,
            queue: tx,
            subscribers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_pattern(&self) -> bool {
        self.pattern.is_some()
    }

    /// Whether a PUBLISH to `target` lands on this channel.
    pub fn matches(&self, target: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.matches(target),
            None => self.name == target,
        }
    }

    pub fn subscribe(&self, sink: SubscriberSink) {
        self.subscribers.insert(sink.id(), sink);
    }

    pub fn unsubscribe(&self, sub_id: u64) -> bool {
        self.subscribers.remove(&sub_id).is_some()
    }

    pub fn is_subscribed(&self, sub_id: u64) -> bool {
        self.subscribers.contains_key(&sub_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Enqueues a payload for the delivery task.
    pub fn enqueue(&self, payload: &str) {
        if self.queue.send(payload.to_string()).is_err() {
            warn!(channel = %self.name, "delivery task is gone, message dropped");
        }
    }
}
