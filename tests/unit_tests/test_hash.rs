// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use resp_store_rs::clock::Clock;

use crate::unit_tests::common::{exec_s, test_server};

#[tokio::test]
async fn hset_then_hgetall_returns_intact_pairs() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "HSET k f1 v1 f2 v2").await, ":2\r\n");

    let reply = exec_s(&ts, "HGETALL k").await;
    assert!(reply.starts_with("*4\r\n"), "got {reply:?}");
    // Pair adjacency holds regardless of iteration order.
    assert!(reply.contains("$2\r\nf1\r\n$2\r\nv1\r\n"));
    assert!(reply.contains("$2\r\nf2\r\n$2\r\nv2\r\n"));
    Ok(())
}

#[tokio::test]
async fn hset_counts_only_new_fields() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "HSET k f1 v1").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "HSET k f1 v2 f2 v2").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "HGET k f1").await, "$2\r\nv2\r\n");
    Ok(())
}

#[tokio::test]
async fn hset_odd_pairs_is_a_domain_error() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(
        exec_s(&ts, "HSET k f1 v1 f2").await,
        "-ERR each field must have a corresponding value\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn hsetnx_keeps_existing_fields() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "HSETNX k f1 v1").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "HSETNX k f1 other f2 v2").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "HGET k f1").await, "$2\r\nv1\r\n");
    Ok(())
}

#[tokio::test]
async fn hget_on_wrong_type_reports_type_error() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "SET s 1").await, "+OK\r\n");
    assert_eq!(
        exec_s(&ts, "HGET s f").await,
        "-ERR value at key s is not a hash\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn hmget_mixes_hits_and_nulls() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f1 v1").await;
    assert_eq!(
        exec_s(&ts, "HMGET k f1 missing").await,
        "*2\r\n$2\r\nv1\r\n$-1\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn hdel_removing_last_field_deletes_the_key() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f1 v1").await;
    assert_eq!(exec_s(&ts, "HDEL k f1 ghost").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "EXISTS k").await, ":0\r\n");
    Ok(())
}

#[tokio::test]
async fn hlen_hstrlen_hexists_cover_missing_cases() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k field value").await;
    assert_eq!(exec_s(&ts, "HLEN k").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "HLEN missing").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "HSTRLEN k field").await, ":5\r\n");
    assert_eq!(exec_s(&ts, "HSTRLEN k nope").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "HEXISTS k field").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "HEXISTS k nope").await, ":0\r\n");
    Ok(())
}

#[tokio::test]
async fn hincrby_starts_at_zero_and_validates() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "HINCRBY k f 5").await, ":5\r\n");
    assert_eq!(exec_s(&ts, "HINCRBY k f -2").await, ":3\r\n");
    assert_eq!(
        exec_s(&ts, "HINCRBY k f nope").await,
        "-ERR increment must be an integer\r\n"
    );

    exec_s(&ts, "HSET k text hello").await;
    assert_eq!(
        exec_s(&ts, "HINCRBY k text 1").await,
        "-ERR value at field text is not a number\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn hincrbyfloat_renders_canonical_floats() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "HINCRBYFLOAT k f 1.5").await, "$3\r\n1.5\r\n");
    assert_eq!(exec_s(&ts, "HINCRBYFLOAT k f 2.5").await, "$1\r\n4\r\n");
    assert_eq!(
        exec_s(&ts, "HINCRBYFLOAT k f nope").await,
        "-ERR increment must be a float\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn hrandfield_respects_count_signs() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f1 v1 f2 v2 f3 v3").await;

    let one = exec_s(&ts, "HRANDFIELD k").await;
    assert!(one.starts_with("$2\r\nf"), "got {one:?}");

    // Positive count: distinct fields, capped at cardinality.
    let capped = exec_s(&ts, "HRANDFIELD k 10").await;
    assert!(capped.starts_with("*3\r\n"), "got {capped:?}");

    // Negative count allows repetition.
    let repeated = exec_s(&ts, "HRANDFIELD k -5").await;
    assert!(repeated.starts_with("*5\r\n"), "got {repeated:?}");

    let with_values = exec_s(&ts, "HRANDFIELD k 2 WITHVALUES").await;
    assert!(with_values.starts_with("*4\r\n"), "got {with_values:?}");

    assert_eq!(
        exec_s(&ts, "HRANDFIELD k 2 wrongmod").await,
        "-ERR result modifier must be withvalues\r\n"
    );
    assert_eq!(
        exec_s(&ts, "HRANDFIELD k nope").await,
        "-ERR count must be an integer\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn hrandfield_missing_key_is_null() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "HRANDFIELD nope").await, "$-1\r\n");
    assert_eq!(exec_s(&ts, "HRANDFIELD nope 3").await, "*0\r\n");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Field expiry

#[tokio::test]
async fn hexpire_nx_gates_second_attempt() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f v").await;

    assert_eq!(exec_s(&ts, "HEXPIRE k 100 NX FIELDS 1 f").await, "*1\r\n:1\r\n");
    assert_eq!(exec_s(&ts, "HEXPIRE k 50 NX FIELDS 1 f").await, "*1\r\n:0\r\n");
    assert_eq!(exec_s(&ts, "HTTL k FIELDS 1 f").await, "*1\r\n:100\r\n");
    Ok(())
}

#[tokio::test]
async fn hexpire_xx_gt_lt_follow_current_expiry() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f v").await;

    // XX needs an existing expiry.
    assert_eq!(exec_s(&ts, "HEXPIRE k 50 XX FIELDS 1 f").await, "*1\r\n:0\r\n");
    exec_s(&ts, "HEXPIRE k 100 FIELDS 1 f").await;
    assert_eq!(exec_s(&ts, "HEXPIRE k 50 XX FIELDS 1 f").await, "*1\r\n:1\r\n");

    // GT only extends, LT only shortens.
    assert_eq!(exec_s(&ts, "HEXPIRE k 40 GT FIELDS 1 f").await, "*1\r\n:0\r\n");
    assert_eq!(exec_s(&ts, "HEXPIRE k 90 GT FIELDS 1 f").await, "*1\r\n:1\r\n");
    assert_eq!(exec_s(&ts, "HEXPIRE k 95 LT FIELDS 1 f").await, "*1\r\n:0\r\n");
    assert_eq!(exec_s(&ts, "HEXPIRE k 10 LT FIELDS 1 f").await, "*1\r\n:1\r\n");
    Ok(())
}

#[tokio::test]
async fn hexpire_zero_seconds_deletes_the_field() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f v").await;
    assert_eq!(exec_s(&ts, "HEXPIRE k 0 FIELDS 1 f").await, "*1\r\n:2\r\n");
    assert_eq!(exec_s(&ts, "HGET k f").await, "$-1\r\n");
    Ok(())
}

#[tokio::test]
async fn hexpire_reports_missing_key_and_fields() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(
        exec_s(&ts, "HEXPIRE ghost 10 FIELDS 2 a b").await,
        "*2\r\n:-2\r\n:-2\r\n"
    );
    exec_s(&ts, "HSET k f v").await;
    assert_eq!(
        exec_s(&ts, "HEXPIRE k 10 FIELDS 2 f ghost").await,
        "*2\r\n:1\r\n:-2\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn expired_field_reads_as_gone() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f v other o").await;
    exec_s(&ts, "HEXPIRE k 100 FIELDS 1 f").await;

    ts.clock.advance(Duration::from_secs(101));
    assert_eq!(exec_s(&ts, "HGET k f").await, "$-1\r\n");
    assert_eq!(exec_s(&ts, "HTTL k FIELDS 1 f").await, "*1\r\n:-2\r\n");
    assert_eq!(exec_s(&ts, "HLEN k").await, ":1\r\n");
    Ok(())
}

#[tokio::test]
async fn expiring_last_field_expires_the_hash() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f v").await;
    exec_s(&ts, "HEXPIRE k 5 FIELDS 1 f").await;

    ts.clock.advance(Duration::from_secs(6));
    assert_eq!(exec_s(&ts, "EXISTS k").await, ":0\r\n");
    assert_eq!(
        exec_s(&ts, "HTTL k FIELDS 1 f").await,
        "*1\r\n:-2\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn httl_without_expiry_is_minus_one() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f v").await;
    assert_eq!(exec_s(&ts, "HTTL k FIELDS 1 f").await, "*1\r\n:-1\r\n");
    assert_eq!(exec_s(&ts, "HPTTL k FIELDS 1 f").await, "*1\r\n:-1\r\n");
    Ok(())
}

#[tokio::test]
async fn httl_requires_the_fields_block() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f v").await;
    assert_eq!(
        exec_s(&ts, "HTTL k BOGUS 1 f").await,
        "-ERR wrong number of arguments\r\n"
    );
    assert_eq!(
        exec_s(&ts, "HTTL k FIELDS x f").await,
        "-ERR expire time must be integer, was provided \"x\"\r\n"
    );
    assert_eq!(
        exec_s(&ts, "HTTL k FIELDS 2 f").await,
        "-ERR wrong number of arguments\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn hexpiretime_reports_absolute_instants() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f v").await;
    exec_s(&ts, "HEXPIRE k 100 FIELDS 1 f").await;

    let now_secs = resp_store_rs::clock::unix_secs(ts.clock.now());
    let expected = now_secs + 100;
    assert_eq!(
        exec_s(&ts, "HEXPIRETIME k FIELDS 1 f").await,
        format!("*1\r\n:{expected}\r\n")
    );
    assert_eq!(
        exec_s(&ts, "HPEXPIRETIME k FIELDS 1 f").await,
        format!("*1\r\n:{}\r\n", expected * 1000)
    );
    Ok(())
}

#[tokio::test]
async fn hpttl_reports_milliseconds() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "HSET k f v").await;
    exec_s(&ts, "HEXPIRE k 2 FIELDS 1 f").await;
    assert_eq!(exec_s(&ts, "HPTTL k FIELDS 1 f").await, "*1\r\n:2000\r\n");
    Ok(())
}
