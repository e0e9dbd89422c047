// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;

use crate::unit_tests::common::{exec_s, test_server};

#[tokio::test]
async fn push_and_length() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "RPUSH l a b").await, ":2\r\n");
    assert_eq!(exec_s(&ts, "LPUSH l front").await, ":3\r\n");
    assert_eq!(exec_s(&ts, "LLEN l").await, ":3\r\n");
    assert_eq!(exec_s(&ts, "LLEN ghost").await, ":0\r\n");
    Ok(())
}

#[tokio::test]
async fn pops_take_from_each_end() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "RPUSH l a b c d").await;
    assert_eq!(exec_s(&ts, "LPOP l").await, "$1\r\na\r\n");
    assert_eq!(exec_s(&ts, "RPOP l").await, "$1\r\nd\r\n");
    assert_eq!(exec_s(&ts, "LPOP l 5").await, "*2\r\n$1\r\nb\r\n$1\r\nc\r\n");
    assert_eq!(exec_s(&ts, "EXISTS l").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "LPOP ghost").await, "$-1\r\n");
    assert_eq!(exec_s(&ts, "RPOP ghost 2").await, "*0\r\n");
    Ok(())
}

#[tokio::test]
async fn lrange_uses_inclusive_ranks() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "RPUSH l a b c d").await;
    assert_eq!(
        exec_s(&ts, "LRANGE l 1 2").await,
        "*2\r\n$1\r\nb\r\n$1\r\nc\r\n"
    );
    assert_eq!(
        exec_s(&ts, "LRANGE l -2 -1").await,
        "*2\r\n$1\r\nc\r\n$1\r\nd\r\n"
    );
    assert_eq!(exec_s(&ts, "LRANGE l 3 1").await, "*0\r\n");
    Ok(())
}

#[tokio::test]
async fn lindex_resolves_negative_positions() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "RPUSH l a b c").await;
    assert_eq!(exec_s(&ts, "LINDEX l 0").await, "$1\r\na\r\n");
    assert_eq!(exec_s(&ts, "LINDEX l -1").await, "$1\r\nc\r\n");
    assert_eq!(exec_s(&ts, "LINDEX l 9").await, "$-1\r\n");
    Ok(())
}

#[tokio::test]
async fn lset_overwrites_in_place() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "RPUSH l a b c").await;
    assert_eq!(exec_s(&ts, "LSET l 1 mid").await, "+OK\r\n");
    assert_eq!(exec_s(&ts, "LINDEX l 1").await, "$3\r\nmid\r\n");

    assert_eq!(
        exec_s(&ts, "LSET l 9 v").await,
        "-ERR index out of range\r\n"
    );
    assert_eq!(
        exec_s(&ts, "LSET ghost 0 v").await,
        "-ERR key ghost does not exist\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn list_commands_reject_wrong_types() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SET plain v").await;
    assert_eq!(
        exec_s(&ts, "RPUSH plain x").await,
        "-ERR value at key plain is not a list\r\n"
    );
    Ok(())
}
