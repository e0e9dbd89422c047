// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::VecDeque;

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
        spec("lpush", write_cats(), CommandFlags::SYNC,
            "LPUSH key element [element ...]: push at the head",
            ke_push, lpush),
        spec("rpush", write_cats(), CommandFlags::SYNC,
            "RPUSH key element [element ...]: push at the tail",
            ke_push, rpush),
        spec("lpop", write_cats(), CommandFlags::SYNC,
            "LPOP key [count]: pop from the head", ke_pop, lpop),
        spec("rpop", write_cats(), CommandFlags::SYNC,
            "RPOP key [count]: pop from the tail", ke_pop, rpop),
        spec("llen", read_cats(), CommandFlags::empty(),
            "LLEN key: list length", ke_single_read, llen),
        spec("lrange", read_cats(), CommandFlags::empty(),
            "LRANGE key start stop: elements by inclusive rank", ke_lrange, lrange),
        spec("lindex", read_cats(), CommandFlags::empty(),
            "LINDEX key index: one element by rank", ke_lindex, lindex),
        spec("lset", write_cats(), CommandFlags::SYNC,
            "LSET key index element: overwrite one element", ke_lset, lset),
    ]
}

fn spec(
    name: &'static str,
    categories: &'static [&'static str],
    flags: CommandFlags,
    description: &'static str,
    key_fn: fn(&[String]) -> Result<KeySet, CommandError>,
    handler: fn(HandlerParams) -> HandlerFuture,
) -> CommandSpec {
    CommandSpec {
        name,
        module: "list",
        categories,
        flags,
        description,
        sub_commands: vec![],
        key_fn,
        handler,
    }
}

fn read_cats() -> &'static [&'static str] {
    &[category::LIST, category::READ, category::SLOW]
}

fn write_cats() -> &'static [&'static str] {
    &[category::LIST, category::WRITE, category::SLOW]
}

fn ke_push(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_pop(tokens: &[String]) -> Result<KeySet, CommandError> {
    if !(2..=3).contains(&tokens.len()) {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_single_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_lrange(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 4 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_lindex(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_lset(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 4 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

async fn load_list(
    params: &HandlerParams,
    key: &str,
) -> Result<Option<VecDeque<String>>, CommandError> {
    match value_of(params, key).await {
        Some(value) => Ok(Some(value.into_list(key)?)),
        None => Ok(None),
    }
}

fn lpush(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { push(params, true).await })
}

fn rpush(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { push(params, false).await })
}

async fn push(
    params: HandlerParams,
    head: bool,
) -> Result<Vec<u8>, CommandError> {
    let key = params.tokens[1].clone();
    let mut list = load_list(&params, &key).await?.unwrap_or_default();
    for element in &params.tokens[2..] {
        if head {
            list.push_front(element.clone());
        } else {
            list.push_back(element.clone());
        }
    }
    let len = list.len() as i64;
    store_one(&params, &key, Value::List(list)).await;
    Ok(Frame::Integer(len).encode())
}

fn lpop(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { pop(params, true).await })
}

fn rpop(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { pop(params, false).await })
}

async fn pop(
    params: HandlerParams,
    head: bool,
) -> Result<Vec<u8>, CommandError> {
    let key = params.tokens[1].clone();
    let count = params
        .tokens
        .get(2)
        .map(|t| parse_i64(t, "count must be an integer"))
        .transpose()?;

    let Some(mut list) = load_list(&params, &key).await? else {
        let reply = if count.is_some() {
            Frame::Array(vec![])
        } else {
            Frame::NullBulk
        };
        return Ok(reply.encode());
    };

    let take = count.unwrap_or(1).max(0) as usize;
    let mut popped = Vec::with_capacity(take.min(list.len()));
    for _ in 0..take {
        let next = if head {
            list.pop_front()
        } else {
            list.pop_back()
        };
        match next {
            Some(element) => popped.push(element),
            None => break,
        }
    }
    store_one(&params, &key, Value::List(list)).await;

    let reply = match count {
        None => match popped.into_iter().next() {
            Some(element) => Frame::Bulk(element),
            None => Frame::NullBulk,
        },
        Some(_) => Frame::Array(popped.into_iter().map(Frame::Bulk).collect()),
    };
    Ok(reply.encode())
}

fn llen(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let len = load_list(&params, &key).await?.map(|l| l.len()).unwrap_or(0);
        Ok(Frame::Integer(len as i64).encode())
    })
}

fn lrange(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let start = parse_i64(&params.tokens[2], "start must be an integer")?;
        let stop = parse_i64(&params.tokens[3], "stop must be an integer")?;

        let list = load_list(&params, &key).await?.unwrap_or_default();
        let len = list.len() as i64;
        if len == 0 {
            return Ok(Frame::Array(vec![]).encode());
        }

        let from = clamp_rank(start, len);
        let to = clamp_rank(stop, len);
        if from > to {
            return Ok(Frame::Array(vec![]).encode());
        }

        let items = list
            .iter()
            .skip(from as usize)
            .take((to - from + 1) as usize)
            .map(|e| Frame::bulk(e.clone()))
            .collect();
        Ok(Frame::Array(items).encode())
    })
}

fn lindex(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let index = parse_i64(&params.tokens[2], "index must be an integer")?;

        let list = load_list(&params, &key).await?.unwrap_or_default();
        let len = list.len() as i64;
        let resolved = if index < 0 { len + index } else { index };
        let reply = if (0..len).contains(&resolved) {
            list.get(resolved as usize)
                .map(|e| Frame::bulk(e.clone()))
                .unwrap_or(Frame::NullBulk)
        } else {
            Frame::NullBulk
        };
        Ok(reply.encode())
    })
}

fn lset(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let index = parse_i64(&params.tokens[2], "index must be an integer")?;

        let Some(mut list) = load_list(&params, &key).await? else {
            return Err(CommandError::NoSuchKey(key));
        };
        let len = list.len() as i64;
        let resolved = if index < 0 { len + index } else { index };
        if !(0..len).contains(&resolved) {
            return Err(CommandError::custom("index out of range"));
        }

        list[resolved as usize] = params.tokens[3].clone();
        store_one(&params, &key, Value::List(list)).await;
        Ok(Frame::ok().encode())
    })
}

fn clamp_rank(index: i64, len: i64) -> i64 {
    let resolved = if index < 0 { len + index } else { index };
    resolved.clamp(0, (len - 1).max(0))
}
