// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::{Duration, SystemTime};

use crate::{
    clock::{unix_millis, unix_secs},
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
            name: "del",
            module: "generic",
            categories: &[category::KEYSPACE, category::WRITE, category::SLOW],
            flags: CommandFlags::SYNC,
            description: "DEL key [key ...]: remove keys, returns how many existed",
            sub_commands: vec![],
            key_fn: ke_multi_write,
            handler: del,
        },
        CommandSpec {
            name: "exists",
            module: "generic",
            categories: &[category::KEYSPACE, category::READ, category::FAST],
            flags: CommandFlags::empty(),
            description: "EXISTS key [key ...]: count the keys that exist",
            sub_commands: vec![],
            key_fn: ke_multi_read,
            handler: exists,
        },
        CommandSpec {
            name: "expire",
            module: "generic",
            categories: &[category::KEYSPACE, category::WRITE, category::FAST],
            flags: CommandFlags::SYNC,
            description: "EXPIRE key seconds [NX|XX|GT|LT]: set a key-level TTL",
            sub_commands: vec![],
            key_fn: ke_expire,
            handler: expire,
        },
        CommandSpec {
            name: "pexpire",
            module: "generic",
            categories: &[category::KEYSPACE, category::WRITE, category::FAST],
            flags: CommandFlags::SYNC,
            description: "PEXPIRE key milliseconds [NX|XX|GT|LT]: TTL in milliseconds",
            sub_commands: vec![],
            key_fn: ke_expire,
            handler: pexpire,
        },
        CommandSpec {
            name: "ttl",
            module: "generic",
            categories: &[category::KEYSPACE, category::READ, category::FAST],
            flags: CommandFlags::empty(),
            description: "TTL key: remaining seconds, -1 without expiry, -2 missing",
            sub_commands: vec![],
            key_fn: ke_single_read,
            handler: ttl,
        },
        CommandSpec {
            name: "pttl",
            module: "generic",
            categories: &[category::KEYSPACE, category::READ, category::FAST],
            flags: CommandFlags::empty(),
            description: "PTTL key: remaining milliseconds",
            sub_commands: vec![],
            key_fn: ke_single_read,
            handler: pttl,
        },
        CommandSpec {
            name: "persist",
            module: "generic",
            categories: &[category::KEYSPACE, category::WRITE, category::FAST],
            flags: CommandFlags::SYNC,
            description: "PERSIST key: drop the key-level TTL",
            sub_commands: vec![],
            key_fn: ke_single_write,
            handler: persist,
        },
    ]
}

fn ke_multi_write(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(tokens[1..].to_vec()))
}

fn ke_multi_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(tokens[1..].to_vec()))
}

fn ke_single_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_single_write(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_expire(tokens: &[String]) -> Result<KeySet, CommandError> {
    if !(3..=4).contains(&tokens.len()) {
        return Err(CommandError::WrongArgs);
    }
    if let Some(policy) = tokens.get(3) {
        ExpirePolicy::parse(policy)?;
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn del(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let mut deleted = 0i64;
        for key in &params.tokens[1..] {
            if params.keyspace.delete_key(key).await {
                deleted += 1;
            }
        }
        Ok(Frame::Integer(deleted).encode())
    })
}

fn exists(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let keys = params.tokens[1..].to_vec();
        let present = params.keyspace.keys_exist(&keys).await;
        let count = keys
            .iter()
            .filter(|k| present.get(*k).copied().unwrap_or(false))
            .count() as i64;
        Ok(Frame::Integer(count).encode())
    })
}

/// NX/XX/GT/LT gates shared by EXPIRE, PEXPIRE and the hash field-expiry
/// commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpirePolicy {
    Nx,
    Xx,
    Gt,
    Lt,
}

impl ExpirePolicy {
    pub(crate) fn parse(token: &str) -> Result<Self, CommandError> {
        match token.to_ascii_lowercase().as_str() {
            "nx" => Ok(ExpirePolicy::Nx),
            "xx" => Ok(ExpirePolicy::Xx),
            "gt" => Ok(ExpirePolicy::Gt),
            "lt" => Ok(ExpirePolicy::Lt),
            _ => Err(CommandError::custom(format!(
                "unknown expire option {}",
                token.to_ascii_uppercase()
            ))),
        }
    }

    /// Whether replacing `current` with `proposed` passes this gate. A
    /// missing current expiry counts as infinitely far away, so LT passes
    /// and GT fails.
    pub(crate) fn allows(
        &self,
        current: Option<SystemTime>,
        proposed: SystemTime,
    ) -> bool {
        match self {
            ExpirePolicy::Nx => current.is_none(),
            ExpirePolicy::Xx => current.is_some(),
            ExpirePolicy::Gt => current.map(|c| proposed > c).unwrap_or(false),
            ExpirePolicy::Lt => current.map(|c| proposed < c).unwrap_or(true),
        }
    }
}

pub(crate) fn parse_expire_amount(token: &str) -> Result<i64, CommandError> {
    token.parse::<i64>().map_err(|_| {
        CommandError::custom(format!(
            "expire time must be integer, was provided \"{token}\""
        ))
    })
}

fn expire(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { apply_expire(params, Duration::from_secs).await })
}

fn pexpire(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { apply_expire(params, Duration::from_millis).await })
}

async fn apply_expire(
    params: HandlerParams,
    unit: fn(u64) -> Duration,
) -> Result<Vec<u8>, CommandError> {
    let key = params.tokens[1].clone();
    let amount = parse_expire_amount(&params.tokens[2])?;
    let policy = params
        .tokens
        .get(3)
        .map(|t| ExpirePolicy::parse(t))
        .transpose()?;

    if !params.keyspace.keys_exist(std::slice::from_ref(&key)).await[&key] {
        return Ok(Frame::Integer(0).encode());
    }

    // A non-positive TTL removes the key immediately, bypassing the gates.
    if amount <= 0 {
        params.keyspace.delete_key(&key).await;
        return Ok(Frame::Integer(1).encode());
    }

    let proposed = params.clock.now() + unit(amount as u64);
    if let Some(policy) = policy {
        let current = params.keyspace.get_expiry(&key).await;
        if !policy.allows(current, proposed) {
            return Ok(Frame::Integer(0).encode());
        }
    }

    let applied = params.keyspace.set_expiry(&key, Some(proposed), true).await;
    Ok(Frame::Integer(i64::from(applied)).encode())
}

fn ttl(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { remaining(params, false).await })
}

fn pttl(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { remaining(params, true).await })
}

async fn remaining(
    params: HandlerParams,
    millis: bool,
) -> Result<Vec<u8>, CommandError> {
    let key = params.tokens[1].clone();
    if !params.keyspace.keys_exist(std::slice::from_ref(&key)).await[&key] {
        return Ok(Frame::Integer(-2).encode());
    }
    let reply = match params.keyspace.get_expiry(&key).await {
        None => -1,
        Some(at) => {
            let now = params.clock.now();
            if millis {
                unix_millis(at) - unix_millis(now)
            } else {
                unix_secs(at) - unix_secs(now)
            }
        },
    };
    Ok(Frame::Integer(reply).encode())
}

fn persist(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let had_expiry = params.keyspace.get_expiry(&key).await.is_some();
        if !had_expiry {
            return Ok(Frame::Integer(0).encode());
        }
        let removed = params.keyspace.remove_expiry(&key).await;
        Ok(Frame::Integer(i64::from(removed)).encode())
    })
}
