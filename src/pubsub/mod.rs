// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Channel records and the per-channel delivery task.
pub mod channel;
/// The fan-out engine and subscription bookkeeping.
pub mod engine;
/// Subscriber sinks: TCP RESP frames and embedded JSON lines.
pub mod subscriber;

pub use engine::PubSub;
pub use subscriber::SubscriberSink;

/// Embedded subscriber ids live above this offset so they can never collide
/// with TCP connection ids.
pub(crate) const EMBEDDED_ID_BASE: u64 = 1 << 48;
