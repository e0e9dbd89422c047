// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::{
    commands::{
        CommandFlags, CommandSpec, HandlerFuture, HandlerParams, KeySet,
        category, parse_i64, store_one, value_of,
    },
    resp::Frame,
    store::{Value, error::CommandError},
};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec {
            name: "set",
            module: "string",
            categories: &[category::STRING, category::WRITE, category::FAST],
            flags: CommandFlags::SYNC,
            description: "SET key value: store a scalar, clearing any TTL",
            sub_commands: vec![],
            key_fn: ke_set,
            handler: set,
        },
        CommandSpec {
            name: "setnx",
            module: "string",
            categories: &[category::STRING, category::WRITE, category::FAST],
            flags: CommandFlags::SYNC,
            description: "SETNX key value: store only when the key is absent",
            sub_commands: vec![],
            key_fn: ke_set,
            handler: setnx,
        },
        CommandSpec {
            name: "mset",
            module: "string",
            categories: &[category::STRING, category::WRITE, category::SLOW],
            flags: CommandFlags::SYNC,
            description: "MSET key value [key value ...]: multi-key store",
            sub_commands: vec![],
            key_fn: ke_mset,
            handler: mset,
        },
        CommandSpec {
            name: "msetnx",
            module: "string",
            categories: &[category::STRING, category::WRITE, category::SLOW],
            flags: CommandFlags::SYNC,
            description: "MSETNX key value [key value ...]: all-or-nothing store",
            sub_commands: vec![],
            key_fn: ke_mset,
            handler: msetnx,
        },
        CommandSpec {
            name: "get",
            module: "string",
            categories: &[category::STRING, category::READ, category::FAST],
            flags: CommandFlags::empty(),
            description: "GET key: fetch a scalar value",
            sub_commands: vec![],
            key_fn: ke_get,
            handler: get,
        },
        CommandSpec {
            name: "strlen",
            module: "string",
            categories: &[category::STRING, category::READ, category::FAST],
            flags: CommandFlags::empty(),
            description: "STRLEN key: length of the stored string",
            sub_commands: vec![],
            key_fn: ke_get,
            handler: strlen,
        },
        CommandSpec {
            name: "setrange",
            module: "string",
            categories: &[category::STRING, category::WRITE, category::SLOW],
            flags: CommandFlags::SYNC,
            description: "SETRANGE key offset value: overwrite part of a string",
            sub_commands: vec![],
            key_fn: ke_setrange,
            handler: setrange,
        },
        CommandSpec {
            name: "getrange",
            module: "string",
            categories: &[category::STRING, category::READ, category::SLOW],
            flags: CommandFlags::empty(),
            description: "GETRANGE key start end: substring by inclusive indexes",
            sub_commands: vec![],
            key_fn: ke_getrange,
            handler: getrange,
        },
        CommandSpec {
            name: "substr",
            module: "string",
            categories: &[category::STRING, category::READ, category::SLOW],
            flags: CommandFlags::empty(),
            description: "SUBSTR key start end: legacy alias of GETRANGE",
            sub_commands: vec![],
            key_fn: ke_getrange,
            handler: getrange,
        },
        CommandSpec {
            name: "append",
            module: "string",
            categories: &[category::STRING, category::WRITE, category::FAST],
            flags: CommandFlags::SYNC,
            description: "APPEND key value: append to a string, returns new length",
            sub_commands: vec![],
            key_fn: ke_set,
            handler: append,
        },
    ]
}

fn ke_set(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_mset(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 3 || (tokens.len() - 1) % 2 != 0 {
        return Err(CommandError::WrongArgs);
    }
    let keys = tokens[1..].iter().step_by(2).cloned().collect();
    Ok(KeySet::write(keys))
}

fn ke_get(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_setrange(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 4 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_getrange(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 4 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn set(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        store_one(&params, &key, Value::adapt(&params.tokens[2])).await;
        params.keyspace.remove_expiry(&key).await;
        Ok(Frame::ok().encode())
    })
}

fn setnx(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        if params.keyspace.keys_exist(std::slice::from_ref(&key)).await[&key] {
            return Ok(Frame::Integer(0).encode());
        }
        store_one(&params, &key, Value::adapt(&params.tokens[2])).await;
        Ok(Frame::Integer(1).encode())
    })
}

fn mset(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let entries: HashMap<String, Value> = params.tokens[1..]
            .chunks(2)
            .map(|pair| (pair[0].clone(), Value::adapt(&pair[1])))
            .collect();
        params.keyspace.set_values(entries).await;
        Ok(Frame::ok().encode())
    })
}

fn msetnx(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let keys: Vec<String> =
            params.tokens[1..].iter().step_by(2).cloned().collect();
        let present = params.keyspace.keys_exist(&keys).await;
        if present.values().any(|exists| *exists) {
            return Ok(Frame::Integer(0).encode());
        }
        let entries: HashMap<String, Value> = params.tokens[1..]
            .chunks(2)
            .map(|pair| (pair[0].clone(), Value::adapt(&pair[1])))
            .collect();
        params.keyspace.set_values(entries).await;
        Ok(Frame::Integer(1).encode())
    })
}

fn get(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let reply = match value_of(&params, &key).await {
            Some(value) => Frame::Bulk(value.into_scalar(&key)?),
            None => Frame::NullBulk,
        };
        Ok(reply.encode())
    })
}

fn strlen(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let len = match value_of(&params, &key).await {
            Some(value) => value.into_scalar(&key)?.len() as i64,
            None => 0,
        };
        Ok(Frame::Integer(len).encode())
    })
}

fn setrange(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let offset = parse_i64(&params.tokens[2], "offset must be an integer")?;
        if offset < 0 {
            return Err(CommandError::custom("offset must be >= 0"));
        }
        let offset = offset as usize;
        let patch = params.tokens[3].clone();

        let mut current = match value_of(&params, &key).await {
            Some(value) => value.into_scalar(&key)?.into_bytes(),
            None => Vec::new(),
        };
        if current.len() < offset + patch.len() {
            current.resize(offset + patch.len(), 0);
        }
        current[offset..offset + patch.len()].copy_from_slice(patch.as_bytes());

        let updated = String::from_utf8_lossy(&current).into_owned();
        let len = updated.len() as i64;
        store_one(&params, &key, Value::Str(updated)).await;
        Ok(Frame::Integer(len).encode())
    })
}

fn getrange(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let start = parse_i64(&params.tokens[2], "start must be an integer")?;
        let end = parse_i64(&params.tokens[3], "end must be an integer")?;

        let Some(value) = value_of(&params, &key).await else {
            return Ok(Frame::bulk("").encode());
        };
        let s = value.into_scalar(&key)?;
        let len = s.len() as i64;
        if len == 0 {
            return Ok(Frame::bulk("").encode());
        }

        let from = clamp_index(start, len);
        let to = clamp_index(end, len);
        if from > to {
            return Ok(Frame::bulk("").encode());
        }

        let slice: String = s
            .chars()
            .skip(from as usize)
            .take((to - from + 1) as usize)
            .collect();
        Ok(Frame::Bulk(slice).encode())
    })
}

fn append(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let mut current = match value_of(&params, &key).await {
            Some(value) => value.into_scalar(&key)?,
            None => String::new(),
        };
        current.push_str(&params.tokens[2]);
        let len = current.len() as i64;
        store_one(&params, &key, Value::Str(current)).await;
        Ok(Frame::Integer(len).encode())
    })
}

/// Inclusive GETRANGE index: negatives count from the end, out-of-range
/// values clamp to the string bounds.
fn clamp_index(index: i64, len: i64) -> i64 {
    let resolved = if index < 0 { len + index } else { index };
    resolved.clamp(0, len - 1)
}
