// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    commands::{
        CommandFlags, CommandSpec, HandlerFuture, HandlerParams, KeySet,
        category,
    },
    resp::Frame,
    store::error::CommandError,
};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "ping",
            module: "connection",
            categories: &[category::FAST, category::CONNECTION],
            flags: CommandFlags::SKIP_AUTH,
            description: "PING [message]: liveness probe, echoes the message",
            sub_commands: vec![],
            key_fn: ke_ping,
            handler: ping,
        },
        CommandSpec {
            name: "auth",
            module: "connection",
            categories: &[category::FAST, category::CONNECTION],
            flags: CommandFlags::SKIP_AUTH,
            description: "AUTH [username] password: authenticate the connection",
            sub_commands: vec![],
            key_fn: ke_auth,
            handler: auth,
        },
        CommandSpec {
            name: "ack",
            module: "connection",
            categories: &[category::FAST, category::CONNECTION],
            flags: CommandFlags::SKIP_AUTH,
            description: "ACK: silent no-op returning the null bulk string",
            sub_commands: vec![],
            key_fn: ke_ack,
            handler: ack,
        },
    ]
}

fn ke_ping(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() > 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn ping(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let reply = match params.arg(1) {
            Some(message) => Frame::bulk(message),
            None => Frame::Simple("PONG".to_string()),
        };
        Ok(reply.encode())
    })
}

fn ke_auth(tokens: &[String]) -> Result<KeySet, CommandError> {
    if !(2..=3).contains(&tokens.len()) {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn auth(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let username = params.acl.authenticate(&params.tokens).await?;
        params.conn.set_authenticated(&username);
        Ok(Frame::ok().encode())
    })
}

fn ke_ack(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 1 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn ack(_params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { Ok(Frame::NullBulk.encode()) })
}
