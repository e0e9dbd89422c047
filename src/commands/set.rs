// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::{HashMap, HashSet};

use rand::seq::{IndexedRandom, IteratorRandom};

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
        spec("sadd", write_cats(), CommandFlags::SYNC,
            "SADD key member [member ...]: add members, returns how many were new",
            ke_key_members_write, sadd),
        spec("scard", read_cats(), CommandFlags::empty(),
            "SCARD key: set cardinality", ke_single_read, scard),
        spec("sdiff", read_cats(), CommandFlags::empty(),
            "SDIFF key [key ...]: members of the first set minus the rest",
            ke_multi_read, sdiff),
        spec("sdiffstore", write_cats(), CommandFlags::SYNC,
            "SDIFFSTORE destination key [key ...]: SDIFF stored at destination",
            ke_store, sdiffstore),
        spec("sinter", read_cats(), CommandFlags::empty(),
            "SINTER key [key ...]: intersection of the given sets",
            ke_multi_read, sinter),
        spec("sintercard", read_cats(), CommandFlags::empty(),
            "SINTERCARD numkeys key [key ...] [LIMIT limit]: intersection size",
            ke_sintercard, sintercard),
        spec("sinterstore", write_cats(), CommandFlags::SYNC,
            "SINTERSTORE destination key [key ...]: SINTER stored at destination",
            ke_store, sinterstore),
        spec("sismember", read_cats(), CommandFlags::empty(),
            "SISMEMBER key member: membership test", ke_key_member_read, sismember),
        spec("smembers", read_cats(), CommandFlags::empty(),
            "SMEMBERS key: every member", ke_single_read, smembers),
        spec("smismember", read_cats(), CommandFlags::empty(),
            "SMISMEMBER key member [member ...]: membership test per member",
            ke_key_members_read, smismember),
        spec("smove", write_cats(), CommandFlags::SYNC,
            "SMOVE source destination member: move one member between sets",
            ke_smove, smove),
        spec("spop", write_cats(), CommandFlags::SYNC,
            "SPOP key [count]: remove and return random members",
            ke_key_opt_count_write, spop),
        spec("srandmember", read_cats(), CommandFlags::empty(),
            "SRANDMEMBER key [count]: random members without removal",
            ke_key_opt_count_read, srandmember),
        spec("srem", write_cats(), CommandFlags::SYNC,
            "SREM key member [member ...]: remove members",
            ke_key_members_write, srem),
        spec("sunion", read_cats(), CommandFlags::empty(),
            "SUNION key [key ...]: union of the given sets", ke_multi_read, sunion),
        spec("sunionstore", write_cats(), CommandFlags::SYNC,
            "SUNIONSTORE destination key [key ...]: SUNION stored at destination",
            ke_store, sunionstore),
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
        module: "set",
        categories,
        flags,
        description,
        sub_commands: vec![],
        key_fn,
        handler,
    }
}

fn read_cats() -> &'static [&'static str] {
    &[category::SET, category::READ, category::SLOW]
}

fn write_cats() -> &'static [&'static str] {
    &[category::SET, category::WRITE, category::SLOW]
}

// ─────────────────────────────────────────────────────────────────────────────
// Key extraction

fn ke_single_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_multi_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(tokens[1..].to_vec()))
}

fn ke_key_member_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_key_members_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_key_members_write(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_key_opt_count_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if !(2..=3).contains(&tokens.len()) {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_key_opt_count_write(tokens: &[String]) -> Result<KeySet, CommandError> {
    if !(2..=3).contains(&tokens.len()) {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_store(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet {
        channels: vec![],
        read_keys: tokens[2..].to_vec(),
        write_keys: vec![tokens[1].clone()],
    })
}

fn ke_smove(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 4 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone(), tokens[2].clone()]))
}

fn ke_sintercard(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(tokens[2..].to_vec()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers

async fn load_set(
    params: &HandlerParams,
    key: &str,
) -> Result<Option<HashSet<String>>, CommandError> {
    match value_of(params, key).await {
        Some(value) => Ok(Some(value.into_set(key)?)),
        None => Ok(None),
    }
}

/// Batch-reads set values for the listed keys; a missing key yields `None`.
async fn load_sets(
    params: &HandlerParams,
    keys: &[String],
) -> Result<Vec<(String, Option<HashSet<String>>)>, CommandError> {
    let mut values = params.keyspace.get_values(keys).await;
    let mut out = Vec::with_capacity(keys.len());
    for key in keys {
        let set = match values.remove(key).flatten() {
            Some(value) => Some(value.into_set(key)?),
            None => None,
        };
        out.push((key.clone(), set));
    }
    Ok(out)
}

fn sorted_members(set: HashSet<String>) -> Vec<Frame> {
    let mut members: Vec<String> = set.into_iter().collect();
    members.sort_unstable();
    members.into_iter().map(Frame::Bulk).collect()
}

/// SDIFF core: first set minus every later set. The base key must exist.
fn diff_of(
    sets: Vec<(String, Option<HashSet<String>>)>,
) -> Result<HashSet<String>, CommandError> {
    let mut iter = sets.into_iter();
    let (base_key, base) = iter.next().ok_or(CommandError::WrongArgs)?;
    let mut result = base.ok_or(CommandError::NoSuchKey(base_key))?;
    for (_, other) in iter {
        if let Some(other) = other {
            result.retain(|m| !other.contains(m));
        }
    }
    Ok(result)
}

/// SINTER core: any missing key makes the intersection empty.
fn intersection_of(
    sets: Vec<(String, Option<HashSet<String>>)>,
) -> HashSet<String> {
    let mut iter = sets.into_iter();
    let Some((_, Some(mut result))) = iter.next() else {
        return HashSet::new();
    };
    for (_, other) in iter {
        match other {
            Some(other) => result.retain(|m| other.contains(m)),
            None => return HashSet::new(),
        }
    }
    result
}

fn union_of(sets: Vec<(String, Option<HashSet<String>>)>) -> HashSet<String> {
    let mut result = HashSet::new();
    for (_, set) in sets {
        if let Some(set) = set {
            result.extend(set);
        }
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers

fn sadd(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let mut set = load_set(&params, &key).await?.unwrap_or_default();
        let mut added = 0i64;
        for member in &params.tokens[2..] {
            if set.insert(member.clone()) {
                added += 1;
            }
        }
        store_one(&params, &key, Value::Set(set)).await;
        Ok(Frame::Integer(added).encode())
    })
}

fn scard(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let card = load_set(&params, &key).await?.map(|s| s.len()).unwrap_or(0);
        Ok(Frame::Integer(card as i64).encode())
    })
}

fn sdiff(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let sets = load_sets(&params, &params.tokens[1..]).await?;
        let result = diff_of(sets)?;
        Ok(Frame::Array(sorted_members(result)).encode())
    })
}

fn sdiffstore(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let destination = params.tokens[1].clone();
        let sets = load_sets(&params, &params.tokens[2..]).await?;
        let result = diff_of(sets)?;
        let card = result.len() as i64;
        store_one(&params, &destination, Value::Set(result)).await;
        Ok(Frame::Integer(card).encode())
    })
}

fn sinter(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let sets = load_sets(&params, &params.tokens[1..]).await?;
        let result = intersection_of(sets);
        Ok(Frame::Array(sorted_members(result)).encode())
    })
}

fn sintercard(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let numkeys = parse_i64(&params.tokens[1], "numkeys must be an integer")?;
        if numkeys <= 0 {
            return Err(CommandError::custom("numkeys must be greater than 0"));
        }

        let rest = &params.tokens[2..];
        let (keys, tail) = if rest.len() >= numkeys as usize {
            rest.split_at(numkeys as usize)
        } else {
            return Err(CommandError::custom(
                "not enough sets in the keys provided",
            ));
        };

        let limit = match tail {
            [] => None,
            [word, value] if word.eq_ignore_ascii_case("limit") => {
                Some(parse_i64(value, "limit must be an integer")?)
            },
            _ => return Err(CommandError::WrongArgs),
        };

        let sets = load_sets(&params, keys).await?;
        let mut card = intersection_of(sets).len() as i64;
        if let Some(limit) = limit {
            if limit > 0 {
                card = card.min(limit);
            }
        }
        Ok(Frame::Integer(card).encode())
    })
}

fn sinterstore(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let destination = params.tokens[1].clone();
        let sets = load_sets(&params, &params.tokens[2..]).await?;
        let result = intersection_of(sets);
        let card = result.len() as i64;
        store_one(&params, &destination, Value::Set(result)).await;
        Ok(Frame::Integer(card).encode())
    })
}

fn sismember(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let present = load_set(&params, &key)
            .await?
            .map(|s| s.contains(&params.tokens[2]))
            .unwrap_or(false);
        Ok(Frame::Integer(i64::from(present)).encode())
    })
}

fn smembers(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let set = load_set(&params, &key).await?.unwrap_or_default();
        Ok(Frame::Array(sorted_members(set)).encode())
    })
}

fn smismember(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let set = load_set(&params, &key).await?.unwrap_or_default();
        let items = params.tokens[2..]
            .iter()
            .map(|m| Frame::Integer(i64::from(set.contains(m))))
            .collect();
        Ok(Frame::Array(items).encode())
    })
}

fn smove(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let source = params.tokens[1].clone();
        let destination = params.tokens[2].clone();
        let member = params.tokens[3].clone();

        let keys = vec![source.clone(), destination.clone()];
        let mut values = params.keyspace.get_values(&keys).await;

        let mut src = match values.remove(&source).flatten() {
            Some(value) => value.into_set(&source)?,
            None => return Ok(Frame::Integer(0).encode()),
        };
        if !src.remove(&member) {
            return Ok(Frame::Integer(0).encode());
        }
        let mut dst = match values.remove(&destination).flatten() {
            Some(value) => value.into_set(&destination)?,
            None => HashSet::new(),
        };
        dst.insert(member);

        params
            .keyspace
            .set_values(HashMap::from([
                (source.clone(), Value::Set(src)),
                (destination, Value::Set(dst)),
            ]))
            .await;
        Ok(Frame::Integer(1).encode())
    })
}

fn spop(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let count = params
            .tokens
            .get(2)
            .map(|t| parse_i64(t, "count must be an integer"))
            .transpose()?;

        let Some(mut set) = load_set(&params, &key).await? else {
            let reply = if count.is_some() {
                Frame::Array(vec![])
            } else {
                Frame::NullBulk
            };
            return Ok(reply.encode());
        };

        let take = count.unwrap_or(1).max(0) as usize;
        let picked: Vec<String> = {
            let mut rng = rand::rng();
            set.iter()
                .cloned()
                .choose_multiple(&mut rng, take.min(set.len()))
        };
        for member in &picked {
            set.remove(member);
        }
        store_one(&params, &key, Value::Set(set)).await;

        let reply = match count {
            None => match picked.into_iter().next() {
                Some(member) => Frame::Bulk(member),
                None => Frame::NullBulk,
            },
            Some(_) => {
                Frame::Array(picked.into_iter().map(Frame::Bulk).collect())
            },
        };
        Ok(reply.encode())
    })
}

fn srandmember(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let count = params
            .tokens
            .get(2)
            .map(|t| parse_i64(t, "count must be an integer"))
            .transpose()?;

        let set = load_set(&params, &key).await?.unwrap_or_default();
        let members: Vec<&String> = set.iter().collect();

        let Some(count) = count else {
            let mut rng = rand::rng();
            let reply = match members.choose(&mut rng) {
                Some(member) => Frame::bulk((*member).clone()),
                None => Frame::NullBulk,
            };
            return Ok(reply.encode());
        };

        let picked: Vec<String> = {
            let mut rng = rand::rng();
            if count >= 0 {
                members
                    .iter()
                    .map(|m| (*m).clone())
                    .choose_multiple(&mut rng, count as usize)
            } else if members.is_empty() {
                Vec::new()
            } else {
                (0..count.unsigned_abs())
                    .filter_map(|_| members.choose(&mut rng).map(|m| (*m).clone()))
                    .collect()
            }
        };
        Ok(Frame::Array(picked.into_iter().map(Frame::Bulk).collect()).encode())
    })
}

fn srem(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let Some(mut set) = load_set(&params, &key).await? else {
            return Ok(Frame::Integer(0).encode());
        };
        let mut removed = 0i64;
        for member in &params.tokens[2..] {
            if set.remove(member) {
                removed += 1;
            }
        }
        store_one(&params, &key, Value::Set(set)).await;
        Ok(Frame::Integer(removed).encode())
    })
}

fn sunion(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let sets = load_sets(&params, &params.tokens[1..]).await?;
        Ok(Frame::Array(sorted_members(union_of(sets))).encode())
    })
}

fn sunionstore(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let destination = params.tokens[1].clone();
        let sets = load_sets(&params, &params.tokens[2..]).await?;
        let result = union_of(sets);
        let card = result.len() as i64;
        store_one(&params, &destination, Value::Set(result)).await;
        Ok(Frame::Integer(card).encode())
    })
}
