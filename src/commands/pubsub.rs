// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use glob::Pattern;

use crate::{
    commands::{
        CommandFlags, CommandSpec, HandlerFuture, HandlerParams, KeySet,
        SubCommandSpec, category,
    },
    pubsub::SubscriberSink,
    resp::Frame,
    store::error::CommandError,
};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "subscribe",
            module: "pubsub",
            categories: &[category::PUBSUB, category::CONNECTION],
            flags: CommandFlags::empty(),
            description: "SUBSCRIBE channel [channel ...]: join named channels",
            sub_commands: vec![],
            key_fn: ke_channels_required,
            handler: subscribe,
        },
        CommandSpec {
            name: "unsubscribe",
            module: "pubsub",
            categories: &[category::PUBSUB, category::CONNECTION],
            flags: CommandFlags::empty(),
            description: "UNSUBSCRIBE [channel ...]: leave named channels (all when empty)",
            sub_commands: vec![],
            key_fn: ke_channels_optional,
            handler: unsubscribe,
        },
        CommandSpec {
            name: "psubscribe",
            module: "pubsub",
            categories: &[category::PUBSUB, category::CONNECTION],
            flags: CommandFlags::empty(),
            description: "PSUBSCRIBE pattern [pattern ...]: join pattern channels",
            sub_commands: vec![],
            key_fn: ke_channels_required,
            handler: psubscribe,
        },
        CommandSpec {
            name: "punsubscribe",
            module: "pubsub",
            categories: &[category::PUBSUB, category::CONNECTION],
            flags: CommandFlags::empty(),
            description: "PUNSUBSCRIBE [pattern ...]: leave pattern channels (all when empty)",
            sub_commands: vec![],
            key_fn: ke_channels_optional,
            handler: punsubscribe,
        },
        CommandSpec {
            name: "publish",
            module: "pubsub",
            categories: &[category::PUBSUB, category::FAST],
            flags: CommandFlags::SYNC,
            description: "PUBLISH channel message: fan a message out",
            sub_commands: vec![],
            key_fn: ke_publish,
            handler: publish,
        },
        CommandSpec {
            name: "pubsub",
            module: "pubsub",
            categories: &[category::PUBSUB, category::SLOW],
            flags: CommandFlags::empty(),
            description: "PUBSUB CHANNELS|NUMPAT|NUMSUB: introspection",
            sub_commands: vec![
                SubCommandSpec {
                    name: "channels",
                    module: "pubsub",
                    categories: &[category::PUBSUB, category::SLOW],
                    flags: CommandFlags::empty(),
                    description: "PUBSUB CHANNELS [pattern]: active channels",
                    key_fn: ke_pubsub_channels,
                    handler: pubsub_channels,
                },
                SubCommandSpec {
                    name: "numpat",
                    module: "pubsub",
                    categories: &[category::PUBSUB, category::SLOW],
                    flags: CommandFlags::empty(),
                    description: "PUBSUB NUMPAT: active pattern channel count",
                    key_fn: ke_pubsub_numpat,
                    handler: pubsub_numpat,
                },
                SubCommandSpec {
                    name: "numsub",
                    module: "pubsub",
                    categories: &[category::PUBSUB, category::SLOW],
                    flags: CommandFlags::empty(),
                    description: "PUBSUB NUMSUB [channel ...]: subscriber counts",
                    key_fn: ke_pubsub_numsub,
                    handler: pubsub_numsub,
                },
            ],
            key_fn: ke_pubsub_parent,
            handler: pubsub_parent,
        },
    ]
}

fn ke_channels_required(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::channels(tokens[1..].to_vec()))
}

fn ke_channels_optional(tokens: &[String]) -> Result<KeySet, CommandError> {
    Ok(KeySet::channels(tokens[1..].to_vec()))
}

fn ke_publish(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::channels(vec![tokens[1].clone()]))
}

fn ke_pubsub_parent(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn ke_pubsub_channels(tokens: &[String]) -> Result<KeySet, CommandError> {
    if !(2..=3).contains(&tokens.len()) {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn ke_pubsub_numpat(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn ke_pubsub_numsub(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

/// The TCP sink for this connection, shared with the reply writer.
fn tcp_sink(params: &HandlerParams) -> Result<SubscriberSink, CommandError> {
    let writer = params.conn.writer().ok_or_else(|| {
        CommandError::custom("subscriptions require a client connection")
    })?;
    Ok(SubscriberSink::Tcp {
        conn_id: params.conn.id,
        writer,
    })
}

fn subscribe(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let sink = tcp_sink(&params)?;
        let mut out = Vec::new();
        for (i, channel) in params.tokens[1..].iter().enumerate() {
            params.pubsub.subscribe(channel, sink.clone());
            params.conn.add_named_sub(channel);
            Frame::subscription("subscribe", channel, (i + 1) as i64)
                .encode_into(&mut out);
        }
        Ok(out)
    })
}

fn psubscribe(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let sink = tcp_sink(&params)?;
        let mut out = Vec::new();
        for (i, pattern) in params.tokens[1..].iter().enumerate() {
            params.pubsub.psubscribe(pattern, sink.clone())?;
            params.conn.add_pattern_sub(pattern);
            Frame::subscription("psubscribe", pattern, (i + 1) as i64)
                .encode_into(&mut out);
        }
        Ok(out)
    })
}

fn unsubscribe(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let targets = if params.tokens.len() > 1 {
            params.tokens[1..].to_vec()
        } else {
            params.conn.named_subs()
        };

        let mut frames = Vec::new();
        for channel in &targets {
            if params.pubsub.unsubscribe(channel, params.conn.id) {
                params.conn.remove_named_sub(channel);
                frames.push(Frame::subscription(
                    "unsubscribe",
                    channel,
                    frames.len() as i64 + 1,
                ));
            }
        }
        Ok(Frame::Array(frames).encode())
    })
}

fn punsubscribe(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let targets = if params.tokens.len() > 1 {
            params.tokens[1..].to_vec()
        } else {
            params.conn.pattern_subs()
        };

        let mut frames = Vec::new();
        for pattern in &targets {
            if params.pubsub.unsubscribe(pattern, params.conn.id) {
                params.conn.remove_pattern_sub(pattern);
                frames.push(Frame::subscription(
                    "punsubscribe",
                    pattern,
                    frames.len() as i64 + 1,
                ));
            }

            // A pattern argument also detaches matching named channels.
            if let Ok(compiled) = Pattern::new(pattern) {
                for channel in params.conn.named_subs() {
                    if compiled.matches(&channel)
                        && params.pubsub.unsubscribe(&channel, params.conn.id)
                    {
                        params.conn.remove_named_sub(&channel);
                        frames.push(Frame::subscription(
                            "punsubscribe",
                            &channel,
                            frames.len() as i64 + 1,
                        ));
                    }
                }
            }
        }
        Ok(Frame::Array(frames).encode())
    })
}

fn publish(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let receivers = params
            .pubsub
            .publish(&params.tokens[1], &params.tokens[2]);
        Ok(Frame::Integer(receivers).encode())
    })
}

fn pubsub_parent(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let sub = params.arg(1).unwrap_or_default().to_ascii_uppercase();
        Err(CommandError::custom(format!(
            "unknown PUBSUB subcommand {sub}"
        )))
    })
}

fn pubsub_channels(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let names = params.pubsub.active_channels(params.arg(2))?;
        let items = names.into_iter().map(Frame::Bulk).collect();
        Ok(Frame::Array(items).encode())
    })
}

fn pubsub_numpat(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { Ok(Frame::Integer(params.pubsub.numpat()).encode()) })
}

fn pubsub_numsub(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let counts = params.pubsub.numsub(&params.tokens[2..]);
        let mut items = Vec::with_capacity(counts.len() * 2);
        for (name, count) in counts {
            items.push(Frame::Bulk(name));
            items.push(Frame::Integer(count));
        }
        Ok(Frame::Array(items).encode())
    })
}
