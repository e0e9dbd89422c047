// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;

use crate::unit_tests::common::{exec_s, test_server};

#[tokio::test]
async fn zadd_returns_added_count() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "ZADD z 1 a 2 b").await, ":2\r\n");
    assert_eq!(exec_s(&ts, "ZADD z 5 a 3 c").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "ZCARD z").await, ":3\r\n");
    assert_eq!(exec_s(&ts, "ZSCORE z a").await, "$1\r\n5\r\n");
    Ok(())
}

#[tokio::test]
async fn zadd_nx_and_xx_gate_membership() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "ZADD z 1 a").await;

    assert_eq!(exec_s(&ts, "ZADD z NX 9 a").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "ZSCORE z a").await, "$1\r\n1\r\n");

    assert_eq!(exec_s(&ts, "ZADD z XX 9 ghost").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "ZSCORE z ghost").await, "$-1\r\n");

    assert_eq!(
        exec_s(&ts, "ZADD z NX XX 1 m").await,
        "-ERR XX and NX options at the same time are not compatible\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn zadd_gt_lt_gate_score_updates() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "ZADD z 5 m").await;

    assert_eq!(exec_s(&ts, "ZADD z GT 3 m").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "ZSCORE z m").await, "$1\r\n5\r\n");
    assert_eq!(exec_s(&ts, "ZADD z CH GT 8 m").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "ZADD z CH LT 6 m").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "ZSCORE z m").await, "$1\r\n6\r\n");
    Ok(())
}

#[tokio::test]
async fn zadd_incr_returns_the_new_score() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "ZADD z 2 m").await;
    assert_eq!(exec_s(&ts, "ZADD z INCR 3 m").await, "$1\r\n5\r\n");
    // Gated INCR yields the null bulk.
    assert_eq!(exec_s(&ts, "ZADD z NX INCR 1 m").await, "$-1\r\n");
    Ok(())
}

#[tokio::test]
async fn zadd_validates_scores() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(
        exec_s(&ts, "ZADD z nope m").await,
        "-ERR score must be a double\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn scores_distinguish_infinities() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "ZADD z +inf up -inf down").await;
    assert_eq!(exec_s(&ts, "ZSCORE z up").await, "$3\r\ninf\r\n");
    assert_eq!(exec_s(&ts, "ZSCORE z down").await, "$4\r\n-inf\r\n");
    Ok(())
}

#[tokio::test]
async fn zincrby_starts_from_zero() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "ZINCRBY z 2.5 m").await, "$3\r\n2.5\r\n");
    assert_eq!(exec_s(&ts, "ZINCRBY z 2.5 m").await, "$1\r\n5\r\n");
    assert_eq!(
        exec_s(&ts, "ZINCRBY z nope m").await,
        "-ERR increment must be a float\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn zrem_counts_removed_members() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "ZADD z 1 a 2 b").await;
    assert_eq!(exec_s(&ts, "ZREM z a ghost").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "ZCARD z").await, ":1\r\n");
    Ok(())
}

#[tokio::test]
async fn zrange_orders_by_score_then_member() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "ZADD z 2 b 1 a 2 c").await;
    assert_eq!(
        exec_s(&ts, "ZRANGE z 0 -1").await,
        "*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n"
    );
    assert_eq!(
        exec_s(&ts, "ZRANGE z 1 2 WITHSCORES").await,
        "*4\r\n$1\r\nb\r\n$1\r\n2\r\n$1\r\nc\r\n$1\r\n2\r\n"
    );
    assert_eq!(exec_s(&ts, "ZRANGE ghost 0 -1").await, "*0\r\n");
    Ok(())
}

#[tokio::test]
async fn zset_commands_reject_wrong_types() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SET plain v").await;
    assert_eq!(
        exec_s(&ts, "ZADD plain 1 m").await,
        "-ERR value at key plain is not a sorted set\r\n"
    );
    Ok(())
}
