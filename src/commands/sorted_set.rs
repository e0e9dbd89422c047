// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::{
    commands::{
        CommandFlags, CommandSpec, HandlerFuture, HandlerParams, KeySet,
        category, parse_i64, store_one, value_of,
    },
    resp::Frame,
    store::{
        Value,
        error::CommandError,
        value::{format_float, parse_score},
    },
};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        spec("zadd", write_cats(), CommandFlags::SYNC,
            "ZADD key [NX|XX] [GT|LT] [CH] [INCR] score member [score member ...]",
            ke_zadd, zadd),
        spec("zcard", read_cats(), CommandFlags::empty(),
            "ZCARD key: sorted-set cardinality", ke_single_read, zcard),
        spec("zscore", read_cats(), CommandFlags::empty(),
            "ZSCORE key member: score of one member", ke_key_member_read, zscore),
        spec("zrem", write_cats(), CommandFlags::SYNC,
            "ZREM key member [member ...]: remove members",
            ke_key_members_write, zrem),
        spec("zincrby", write_cats(), CommandFlags::SYNC,
            "ZINCRBY key increment member: add to a member's score",
            ke_zincrby, zincrby),
        spec("zrange", read_cats(), CommandFlags::empty(),
            "ZRANGE key start stop [WITHSCORES]: members by rank",
            ke_zrange, zrange),
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
        module: "sorted_set",
        categories,
        flags,
        description,
        sub_commands: vec![],
        key_fn,
        handler,
    }
}

fn read_cats() -> &'static [&'static str] {
    &[category::SORTEDSET, category::READ, category::SLOW]
}

fn write_cats() -> &'static [&'static str] {
    &[category::SORTEDSET, category::WRITE, category::SLOW]
}

fn ke_zadd(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 4 {
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

fn ke_key_member_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 3 {
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

fn ke_zincrby(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 4 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_zrange(tokens: &[String]) -> Result<KeySet, CommandError> {
    if !(4..=5).contains(&tokens.len()) {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

async fn load_zset(
    params: &HandlerParams,
    key: &str,
) -> Result<Option<HashMap<String, f64>>, CommandError> {
    match value_of(params, key).await {
        Some(value) => Ok(Some(value.into_sorted_set(key)?)),
        None => Ok(None),
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ZaddOptions {
    nx: bool,
    xx: bool,
    gt: bool,
    lt: bool,
    ch: bool,
    incr: bool,
}

impl ZaddOptions {
    /// Whether replacing `current` with `proposed` is allowed for an existing
    /// member.
    fn allows_update(&self, current: f64, proposed: f64) -> bool {
        if self.nx {
            return false;
        }
        if self.gt {
            return proposed > current;
        }
        if self.lt {
            return proposed < current;
        }
        true
    }
}

fn parse_zadd_options(
    tokens: &[String],
) -> Result<(ZaddOptions, usize), CommandError> {
    let mut opts = ZaddOptions::default();
    let mut idx = 2;
    while let Some(token) = tokens.get(idx) {
        match token.to_ascii_lowercase().as_str() {
            "nx" => opts.nx = true,
            "xx" => opts.xx = true,
            "gt" => opts.gt = true,
            "lt" => opts.lt = true,
            "ch" => opts.ch = true,
            "incr" => opts.incr = true,
            _ => break,
        }
        idx += 1;
    }

    if opts.nx && opts.xx {
        return Err(CommandError::custom(
            "XX and NX options at the same time are not compatible",
        ));
    }
    if (opts.gt || opts.lt) && opts.nx {
        return Err(CommandError::custom(
            "GT, LT, and/or NX options at the same time are not compatible",
        ));
    }
    if opts.gt && opts.lt {
        return Err(CommandError::custom(
            "GT and LT options at the same time are not compatible",
        ));
    }
    Ok((opts, idx))
}

fn zadd(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let (opts, first_pair) = parse_zadd_options(&params.tokens)?;

        let pairs = &params.tokens[first_pair..];
        if pairs.is_empty() || pairs.len() % 2 != 0 {
            return Err(CommandError::WrongArgs);
        }
        if opts.incr && pairs.len() != 2 {
            return Err(CommandError::custom(
                "INCR option supports a single score-member pair",
            ));
        }

        let mut zset = load_zset(&params, &key).await?.unwrap_or_default();
        let mut added = 0i64;
        let mut changed = 0i64;
        let mut incr_result: Option<Option<f64>> = None;

        for pair in pairs.chunks(2) {
            let score = parse_score(&pair[0])
                .ok_or_else(|| CommandError::custom("score must be a double"))?;
            let member = pair[1].clone();

            match zset.get(&member).copied() {
                Some(current) => {
                    let proposed = if opts.incr { current + score } else { score };
                    if opts.allows_update(current, proposed) {
                        zset.insert(member, proposed);
                        if proposed != current {
                            changed += 1;
                        }
                        incr_result = Some(Some(proposed));
                    } else {
                        incr_result = Some(None);
                    }
                },
                None => {
                    if opts.xx {
                        incr_result = Some(None);
                        continue;
                    }
                    zset.insert(member, score);
                    added += 1;
                    incr_result = Some(Some(score));
                },
            }
        }

        store_one(&params, &key, Value::SortedSet(zset)).await;

        if opts.incr {
            let reply = match incr_result.flatten() {
                Some(score) => Frame::Bulk(format_float(score)),
                None => Frame::NullBulk,
            };
            return Ok(reply.encode());
        }

        let reported = if opts.ch { added + changed } else { added };
        Ok(Frame::Integer(reported).encode())
    })
}

fn zcard(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let card = load_zset(&params, &key).await?.map(|z| z.len()).unwrap_or(0);
        Ok(Frame::Integer(card as i64).encode())
    })
}

fn zscore(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let reply = load_zset(&params, &key)
            .await?
            .and_then(|z| z.get(&params.tokens[2]).copied())
            .map(|score| Frame::Bulk(format_float(score)))
            .unwrap_or(Frame::NullBulk);
        Ok(reply.encode())
    })
}

fn zrem(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let Some(mut zset) = load_zset(&params, &key).await? else {
            return Ok(Frame::Integer(0).encode());
        };
        let mut removed = 0i64;
        for member in &params.tokens[2..] {
            if zset.remove(member).is_some() {
                removed += 1;
            }
        }
        store_one(&params, &key, Value::SortedSet(zset)).await;
        Ok(Frame::Integer(removed).encode())
    })
}

fn zincrby(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let delta = parse_score(&params.tokens[2])
            .ok_or_else(|| CommandError::custom("increment must be a float"))?;
        let member = params.tokens[3].clone();

        let mut zset = load_zset(&params, &key).await?.unwrap_or_default();
        let updated = zset.get(&member).copied().unwrap_or(0.0) + delta;
        zset.insert(member, updated);
        store_one(&params, &key, Value::SortedSet(zset)).await;
        Ok(Frame::Bulk(format_float(updated)).encode())
    })
}

fn zrange(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let start = parse_i64(&params.tokens[2], "start must be an integer")?;
        let stop = parse_i64(&params.tokens[3], "stop must be an integer")?;
        let with_scores = match params.tokens.get(4) {
            None => false,
            Some(modifier) if modifier.eq_ignore_ascii_case("withscores") => true,
            Some(_) => {
                return Err(CommandError::custom(
                    "result modifier must be withscores",
                ));
            },
        };

        let zset = load_zset(&params, &key).await?.unwrap_or_default();

        // Rank order: by score, ties broken lexicographically by member.
        let mut ranked: Vec<(String, f64)> = zset.into_iter().collect();
        ranked.sort_unstable_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let len = ranked.len() as i64;
        let from = clamp_rank(start, len);
        let to = clamp_rank(stop, len);
        if len == 0 || from > to {
            return Ok(Frame::Array(vec![]).encode());
        }

        let mut items = Vec::new();
        for (member, score) in &ranked[from as usize..=to as usize] {
            items.push(Frame::bulk(member.clone()));
            if with_scores {
                items.push(Frame::Bulk(format_float(*score)));
            }
        }
        Ok(Frame::Array(items).encode())
    })
}

fn clamp_rank(index: i64, len: i64) -> i64 {
    let resolved = if index < 0 { len + index } else { index };
    resolved.clamp(0, (len - 1).max(0))
}
