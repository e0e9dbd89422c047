// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashMap,
    time::{Duration, SystemTime},
};

use rand::seq::{IndexedRandom, IteratorRandom};

use crate::{
    clock::{unix_millis, unix_secs},
    commands::{
        CommandFlags, CommandSpec, HandlerFuture, HandlerParams, KeySet,
        category,
        generic::{ExpirePolicy, parse_expire_amount},
        parse_i64, store_one, value_of,
    },
    resp::Frame,
    store::{HashField, Value, error::CommandError},
};

pub fn commands() -> Vec<CommandSpec> {
    vec![
        spec("hset", write_cats(), CommandFlags::SYNC,
            "HSET key field value [field value ...]: upsert, returns new fields",
            ke_hset, hset),
        spec("hsetnx", write_cats(), CommandFlags::SYNC,
            "HSETNX key field value [field value ...]: insert only missing fields",
            ke_hset, hsetnx),
        spec("hget", read_cats(), CommandFlags::empty(),
            "HGET key field: fetch one field", ke_hget, hget),
        spec("hmget", read_cats(), CommandFlags::empty(),
            "HMGET key field [field ...]: fetch many fields", ke_hmget, hmget),
        spec("hgetall", read_cats(), CommandFlags::empty(),
            "HGETALL key: all field/value pairs", ke_key_only_read, hgetall),
        spec("hkeys", read_cats(), CommandFlags::empty(),
            "HKEYS key: field names", ke_key_only_read, hkeys),
        spec("hvals", read_cats(), CommandFlags::empty(),
            "HVALS key: field values", ke_key_only_read, hvals),
        spec("hlen", read_cats(), CommandFlags::empty(),
            "HLEN key: field count", ke_key_only_read, hlen),
        spec("hstrlen", read_cats(), CommandFlags::empty(),
            "HSTRLEN key field: length of one field's value", ke_hget, hstrlen),
        spec("hexists", read_cats(), CommandFlags::empty(),
            "HEXISTS key field: field presence", ke_hget, hexists),
        spec("hdel", write_cats(), CommandFlags::SYNC,
            "HDEL key field [field ...]: remove fields", ke_hmget_write, hdel),
        spec("hincrby", write_cats(), CommandFlags::SYNC,
            "HINCRBY key field increment: integer field increment",
            ke_hincr, hincrby),
        spec("hincrbyfloat", write_cats(), CommandFlags::SYNC,
            "HINCRBYFLOAT key field increment: float field increment",
            ke_hincr, hincrbyfloat),
        spec("hrandfield", read_cats(), CommandFlags::empty(),
            "HRANDFIELD key [count [WITHVALUES]]: random fields",
            ke_hrandfield, hrandfield),
        spec("hexpire", write_cats(), CommandFlags::SYNC,
            "HEXPIRE key seconds [NX|XX|GT|LT] FIELDS n field [field ...]",
            ke_hexpire, hexpire),
        spec("httl", read_cats(), CommandFlags::empty(),
            "HTTL key FIELDS n field [field ...]: remaining seconds",
            ke_field_block_read, httl),
        spec("hpttl", read_cats(), CommandFlags::empty(),
            "HPTTL key FIELDS n field [field ...]: remaining milliseconds",
            ke_field_block_read, hpttl),
        spec("hexpiretime", read_cats(), CommandFlags::empty(),
            "HEXPIRETIME key FIELDS n field [field ...]: absolute Unix seconds",
            ke_field_block_read, hexpiretime),
        spec("hpexpiretime", read_cats(), CommandFlags::empty(),
            "HPEXPIRETIME key FIELDS n field [field ...]: absolute Unix millis",
            ke_field_block_read, hpexpiretime),
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
        module: "hash",
        categories,
        flags,
        description,
        sub_commands: vec![],
        key_fn,
        handler,
    }
}

fn read_cats() -> &'static [&'static str] {
    &[category::HASH, category::READ]
}

fn write_cats() -> &'static [&'static str] {
    &[category::HASH, category::WRITE]
}

// ─────────────────────────────────────────────────────────────────────────────
// Key extraction

fn ke_hset(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 4 {
        return Err(CommandError::WrongArgs);
    }
    if (tokens.len() - 2) % 2 != 0 {
        return Err(CommandError::custom(
            "each field must have a corresponding value",
        ));
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_hget(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_hmget(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_hmget_write(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_key_only_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

fn ke_hincr(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 4 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_hrandfield(tokens: &[String]) -> Result<KeySet, CommandError> {
    if !(2..=4).contains(&tokens.len()) {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

/// Locates the literal `FIELDS <n>` block and validates the trailing field
/// count against `n`. Returns the index of the first field token.
fn parse_fields_block(
    tokens: &[String],
    block_at: usize,
) -> Result<usize, CommandError> {
    let marker = tokens.get(block_at).ok_or(CommandError::WrongArgs)?;
    if !marker.eq_ignore_ascii_case("fields") {
        return Err(CommandError::WrongArgs);
    }
    let count_token = tokens.get(block_at + 1).ok_or(CommandError::WrongArgs)?;
    let count = parse_expire_amount(count_token)?;
    let first_field = block_at + 2;
    let supplied = tokens.len().saturating_sub(first_field);
    if count <= 0 || supplied as i64 != count {
        return Err(CommandError::WrongArgs);
    }
    Ok(first_field)
}

fn ke_hexpire(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 6 {
        return Err(CommandError::WrongArgs);
    }
    // `FIELDS` sits at index 3, or 4 when a policy token is present.
    let block_at = if tokens[3].eq_ignore_ascii_case("fields") {
        3
    } else {
        4
    };
    parse_fields_block(tokens, block_at)?;
    Ok(KeySet::write(vec![tokens[1].clone()]))
}

fn ke_field_block_read(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 5 {
        return Err(CommandError::WrongArgs);
    }
    parse_fields_block(tokens, 2)?;
    Ok(KeySet::read(vec![tokens[1].clone()]))
}

// ─────────────────────────────────────────────────────────────────────────────
// Write handlers

async fn load_hash(
    params: &HandlerParams,
    key: &str,
) -> Result<Option<HashMap<String, HashField>>, CommandError> {
    match value_of(params, key).await {
        Some(value) => Ok(Some(value.into_hash(key)?)),
        None => Ok(None),
    }
}

fn hset(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        // An existing non-hash value is overwritten wholesale.
        let mut hash = match value_of(&params, &key).await {
            Some(Value::Hash(h)) => h,
            _ => HashMap::new(),
        };

        let mut added = 0i64;
        for pair in params.tokens[2..].chunks(2) {
            if hash
                .insert(pair[0].clone(), HashField::new(pair[1].clone()))
                .is_none()
            {
                added += 1;
            }
        }

        store_one(&params, &key, Value::Hash(hash)).await;
        Ok(Frame::Integer(added).encode())
    })
}

fn hsetnx(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let mut hash = match value_of(&params, &key).await {
            Some(Value::Hash(h)) => h,
            _ => HashMap::new(),
        };

        let mut added = 0i64;
        for pair in params.tokens[2..].chunks(2) {
            if !hash.contains_key(&pair[0]) {
                hash.insert(pair[0].clone(), HashField::new(pair[1].clone()));
                added += 1;
            }
        }

        store_one(&params, &key, Value::Hash(hash)).await;
        Ok(Frame::Integer(added).encode())
    })
}

fn hdel(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let Some(mut hash) = load_hash(&params, &key).await? else {
            return Ok(Frame::Integer(0).encode());
        };

        let mut removed = 0i64;
        for field in &params.tokens[2..] {
            if hash.remove(field).is_some() {
                removed += 1;
            }
        }

        store_one(&params, &key, Value::Hash(hash)).await;
        Ok(Frame::Integer(removed).encode())
    })
}

fn hincrby(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let field = params.tokens[2].clone();
        let delta = parse_i64(&params.tokens[3], "increment must be an integer")?;

        let mut hash = load_hash(&params, &key).await?.unwrap_or_default();
        let current = match hash.get(&field) {
            Some(entry) => entry.value.parse::<i64>().map_err(|_| {
                CommandError::FieldNotNumber {
                    field: field.clone(),
                }
            })?,
            None => 0,
        };
        let updated = current.checked_add(delta).ok_or_else(|| {
            CommandError::custom("increment or decrement would overflow")
        })?;

        upsert_value(&mut hash, &field, updated.to_string());
        store_one(&params, &key, Value::Hash(hash)).await;
        Ok(Frame::Integer(updated).encode())
    })
}

fn hincrbyfloat(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let field = params.tokens[2].clone();
        let delta = params.tokens[3].parse::<f64>().map_err(|_| {
            CommandError::custom("increment must be a float")
        })?;

        let mut hash = load_hash(&params, &key).await?.unwrap_or_default();
        let current = match hash.get(&field) {
            Some(entry) => entry.value.parse::<f64>().map_err(|_| {
                CommandError::FieldNotNumber {
                    field: field.clone(),
                }
            })?,
            None => 0.0,
        };
        let updated = current + delta;

        let rendered = crate::store::value::format_float(updated);
        upsert_value(&mut hash, &field, rendered.clone());
        store_one(&params, &key, Value::Hash(hash)).await;
        Ok(Frame::Bulk(rendered).encode())
    })
}

/// Replaces a field's value while keeping its expiry.
fn upsert_value(hash: &mut HashMap<String, HashField>, field: &str, value: String) {
    match hash.get_mut(field) {
        Some(entry) => entry.value = value,
        None => {
            hash.insert(field.to_string(), HashField::new(value));
        },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Read handlers

fn hget(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let field = &params.tokens[2];
        let reply = match load_hash(&params, &key).await? {
            Some(hash) => match hash.get(field) {
                Some(entry) => Frame::bulk(entry.value.clone()),
                None => Frame::NullBulk,
            },
            None => Frame::NullBulk,
        };
        Ok(reply.encode())
    })
}

fn hmget(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let hash = load_hash(&params, &key).await?.unwrap_or_default();
        let items = params.tokens[2..]
            .iter()
            .map(|field| match hash.get(field) {
                Some(entry) => Frame::bulk(entry.value.clone()),
                None => Frame::NullBulk,
            })
            .collect();
        Ok(Frame::Array(items).encode())
    })
}

fn hgetall(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let hash = load_hash(&params, &key).await?.unwrap_or_default();
        let mut items = Vec::with_capacity(hash.len() * 2);
        for (field, entry) in &hash {
            items.push(Frame::bulk(field.clone()));
            items.push(Frame::bulk(entry.value.clone()));
        }
        Ok(Frame::Array(items).encode())
    })
}

fn hkeys(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let hash = load_hash(&params, &key).await?.unwrap_or_default();
        let items = hash.keys().map(|f| Frame::bulk(f.clone())).collect();
        Ok(Frame::Array(items).encode())
    })
}

fn hvals(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let hash = load_hash(&params, &key).await?.unwrap_or_default();
        let items = hash
            .values()
            .map(|entry| Frame::bulk(entry.value.clone()))
            .collect();
        Ok(Frame::Array(items).encode())
    })
}

fn hlen(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let hash = load_hash(&params, &key).await?.unwrap_or_default();
        Ok(Frame::Integer(hash.len() as i64).encode())
    })
}

fn hstrlen(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let hash = load_hash(&params, &key).await?.unwrap_or_default();
        let len = hash
            .get(&params.tokens[2])
            .map(|entry| entry.value.len() as i64)
            .unwrap_or(0);
        Ok(Frame::Integer(len).encode())
    })
}

fn hexists(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let hash = load_hash(&params, &key).await?.unwrap_or_default();
        let exists = hash.contains_key(&params.tokens[2]);
        Ok(Frame::Integer(i64::from(exists)).encode())
    })
}

fn hrandfield(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let count = params
            .tokens
            .get(2)
            .map(|t| parse_i64(t, "count must be an integer"))
            .transpose()?;
        let with_values = match params.tokens.get(3) {
            None => false,
            Some(modifier) if modifier.eq_ignore_ascii_case("withvalues") => true,
            Some(_) => {
                return Err(CommandError::custom(
                    "result modifier must be withvalues",
                ));
            },
        };

        let hash = load_hash(&params, &key).await?.unwrap_or_default();
        let fields: Vec<(&String, &HashField)> = hash.iter().collect();

        let Some(count) = count else {
            // Bare HRANDFIELD: one field or the null bulk.
            let mut rng = rand::rng();
            let reply = match fields.choose(&mut rng) {
                Some((field, _)) => Frame::bulk((*field).clone()),
                None => Frame::NullBulk,
            };
            return Ok(reply.encode());
        };

        let picks: Vec<(&String, &HashField)> = {
            let mut rng = rand::rng();
            if count >= 0 {
                // Distinct fields, capped at cardinality.
                fields
                    .iter()
                    .copied()
                    .choose_multiple(&mut rng, count as usize)
            } else if fields.is_empty() {
                Vec::new()
            } else {
                // Negative count allows repetition.
                (0..count.unsigned_abs())
                    .filter_map(|_| fields.choose(&mut rng).copied())
                    .collect()
            }
        };

        let mut items = Vec::with_capacity(picks.len() * 2);
        for (field, entry) in picks {
            items.push(Frame::bulk(field.clone()));
            if with_values {
                items.push(Frame::bulk(entry.value.clone()));
            }
        }
        Ok(Frame::Array(items).encode())
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Field expiry

/// Per-field HEXPIRE result codes.
const MISSING: i64 = -2;
const GATED: i64 = 0;
const APPLIED: i64 = 1;
const DELETED: i64 = 2;

fn hexpire(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let key = params.tokens[1].clone();
        let seconds = parse_expire_amount(&params.tokens[2])?;
        let (policy, first_field) =
            if params.tokens[3].eq_ignore_ascii_case("fields") {
                (None, 5)
            } else {
                (Some(ExpirePolicy::parse(&params.tokens[3])?), 6)
            };
        let fields = &params.tokens[first_field..];

        let Some(mut hash) = load_hash(&params, &key).await? else {
            let codes = fields.iter().map(|_| Frame::Integer(MISSING)).collect();
            return Ok(Frame::Array(codes).encode());
        };

        let now = params.clock.now();
        let mut codes = Vec::with_capacity(fields.len());
        for field in fields {
            let Some(entry) = hash.get_mut(field) else {
                codes.push(Frame::Integer(MISSING));
                continue;
            };

            // A non-positive TTL deletes the field regardless of gates.
            if seconds <= 0 {
                hash.remove(field);
                codes.push(Frame::Integer(DELETED));
                continue;
            }

            let proposed = now + Duration::from_secs(seconds as u64);
            let passes = policy
                .map(|p| p.allows(entry.expires_at, proposed))
                .unwrap_or(true);
            if passes {
                entry.expires_at = Some(proposed);
                codes.push(Frame::Integer(APPLIED));
            } else {
                codes.push(Frame::Integer(GATED));
            }
        }

        store_one(&params, &key, Value::Hash(hash)).await;
        Ok(Frame::Array(codes).encode())
    })
}

fn httl(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { field_expiry_report(params, ExpiryReport::Ttl).await })
}

fn hpttl(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { field_expiry_report(params, ExpiryReport::Pttl).await })
}

fn hexpiretime(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        field_expiry_report(params, ExpiryReport::ExpireTime).await
    })
}

fn hpexpiretime(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        field_expiry_report(params, ExpiryReport::PexpireTime).await
    })
}

#[derive(Debug, Clone, Copy)]
enum ExpiryReport {
    Ttl,
    Pttl,
    ExpireTime,
    PexpireTime,
}

impl ExpiryReport {
    fn render(&self, at: Option<SystemTime>, now: SystemTime) -> i64 {
        let Some(at) = at else {
            return -1;
        };
        match self {
            ExpiryReport::Ttl => unix_secs(at) - unix_secs(now),
            ExpiryReport::Pttl => unix_millis(at) - unix_millis(now),
            ExpiryReport::ExpireTime => unix_secs(at),
            ExpiryReport::PexpireTime => unix_millis(at),
        }
    }
}

async fn field_expiry_report(
    params: HandlerParams,
    report: ExpiryReport,
) -> Result<Vec<u8>, CommandError> {
    let key = params.tokens[1].clone();
    let fields = &params.tokens[4..];

    let Some(hash) = load_hash(&params, &key).await? else {
        let codes = fields.iter().map(|_| Frame::Integer(MISSING)).collect();
        return Ok(Frame::Array(codes).encode());
    };

    let now = params.clock.now();
    let codes = fields
        .iter()
        .map(|field| match hash.get(field) {
            None => Frame::Integer(MISSING),
            Some(entry) => Frame::Integer(report.render(entry.expires_at, now)),
        })
        .collect();
    Ok(Frame::Array(codes).encode())
}
