// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;

use crate::unit_tests::common::{exec_s, test_server};

#[tokio::test]
async fn sadd_counts_new_members_only() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "SADD s a b c").await, ":3\r\n");
    assert_eq!(exec_s(&ts, "SADD s b d").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "SCARD s").await, ":4\r\n");
    Ok(())
}

#[tokio::test]
async fn smembers_returns_every_member() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD s b a").await;
    assert_eq!(
        exec_s(&ts, "SMEMBERS s").await,
        "*2\r\n$1\r\na\r\n$1\r\nb\r\n"
    );
    assert_eq!(exec_s(&ts, "SMEMBERS ghost").await, "*0\r\n");
    Ok(())
}

#[tokio::test]
async fn sismember_and_smismember() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD s a").await;
    assert_eq!(exec_s(&ts, "SISMEMBER s a").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "SISMEMBER s z").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "SMISMEMBER s a z").await, "*2\r\n:1\r\n:0\r\n");
    Ok(())
}

#[tokio::test]
async fn sdiff_requires_the_base_key() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD a x y z").await;
    exec_s(&ts, "SADD b y").await;
    assert_eq!(
        exec_s(&ts, "SDIFF a b ghost").await,
        "*2\r\n$1\r\nx\r\n$1\r\nz\r\n"
    );
    assert_eq!(
        exec_s(&ts, "SDIFF ghost a").await,
        "-ERR key ghost does not exist\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn sinter_with_missing_key_is_empty() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD a x y").await;
    exec_s(&ts, "SADD b y z").await;
    assert_eq!(exec_s(&ts, "SINTER a b").await, "*1\r\n$1\r\ny\r\n");
    assert_eq!(exec_s(&ts, "SINTER a ghost").await, "*0\r\n");
    Ok(())
}

#[tokio::test]
async fn sintercard_validates_numkeys_and_limit() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD a x y z").await;
    exec_s(&ts, "SADD b x y").await;
    assert_eq!(exec_s(&ts, "SINTERCARD 2 a b").await, ":2\r\n");
    assert_eq!(exec_s(&ts, "SINTERCARD 2 a b LIMIT 1").await, ":1\r\n");
    assert_eq!(
        exec_s(&ts, "SINTERCARD 3 a b").await,
        "-ERR not enough sets in the keys provided\r\n"
    );
    assert_eq!(
        exec_s(&ts, "SINTERCARD x a").await,
        "-ERR numkeys must be an integer\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn store_variants_write_the_destination() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD a x y z").await;
    exec_s(&ts, "SADD b y").await;

    assert_eq!(exec_s(&ts, "SDIFFSTORE dest a b").await, ":2\r\n");
    assert_eq!(exec_s(&ts, "SCARD dest").await, ":2\r\n");

    assert_eq!(exec_s(&ts, "SINTERSTORE dest2 a b").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "SMEMBERS dest2").await, "*1\r\n$1\r\ny\r\n");

    assert_eq!(exec_s(&ts, "SUNIONSTORE dest3 a b").await, ":3\r\n");
    assert_eq!(exec_s(&ts, "SCARD dest3").await, ":3\r\n");
    Ok(())
}

#[tokio::test]
async fn smove_transfers_a_single_member() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD src m other").await;
    assert_eq!(exec_s(&ts, "SMOVE src dst m").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "SISMEMBER dst m").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "SISMEMBER src m").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "SMOVE src dst ghost").await, ":0\r\n");
    Ok(())
}

#[tokio::test]
async fn spop_removes_random_members() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD s a b c").await;
    let popped = exec_s(&ts, "SPOP s").await;
    assert!(popped.starts_with("$1\r\n"), "got {popped:?}");
    assert_eq!(exec_s(&ts, "SCARD s").await, ":2\r\n");

    let rest = exec_s(&ts, "SPOP s 10").await;
    assert!(rest.starts_with("*2\r\n"), "got {rest:?}");
    assert_eq!(exec_s(&ts, "EXISTS s").await, ":0\r\n");

    assert_eq!(exec_s(&ts, "SPOP ghost").await, "$-1\r\n");
    Ok(())
}

#[tokio::test]
async fn srandmember_does_not_mutate() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD s a b c").await;
    let picks = exec_s(&ts, "SRANDMEMBER s -6").await;
    assert!(picks.starts_with("*6\r\n"), "got {picks:?}");
    assert_eq!(exec_s(&ts, "SCARD s").await, ":3\r\n");
    Ok(())
}

#[tokio::test]
async fn srem_counts_removed_members() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD s a b").await;
    assert_eq!(exec_s(&ts, "SREM s a ghost").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "SREM missing a").await, ":0\r\n");
    Ok(())
}

#[tokio::test]
async fn sunion_merges_distinct_members() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SADD a x y").await;
    exec_s(&ts, "SADD b y z").await;
    assert_eq!(
        exec_s(&ts, "SUNION a b ghost").await,
        "*3\r\n$1\r\nx\r\n$1\r\ny\r\n$1\r\nz\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn set_commands_reject_wrong_types() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SET plain v").await;
    assert_eq!(
        exec_s(&ts, "SADD plain m").await,
        "-ERR value at key plain is not a set\r\n"
    );
    Ok(())
}
