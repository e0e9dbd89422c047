// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;

use crate::unit_tests::common::{exec_s, test_server};

#[tokio::test]
async fn del_and_exists_count_keys() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "MSET a 1 b 2").await;
    assert_eq!(exec_s(&ts, "EXISTS a b ghost").await, ":2\r\n");
    assert_eq!(exec_s(&ts, "DEL a b ghost").await, ":2\r\n");
    assert_eq!(exec_s(&ts, "EXISTS a b").await, ":0\r\n");
    Ok(())
}

#[tokio::test]
async fn ttl_distinguishes_missing_and_persistent() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "TTL ghost").await, ":-2\r\n");
    exec_s(&ts, "SET k v").await;
    assert_eq!(exec_s(&ts, "TTL k").await, ":-1\r\n");
    exec_s(&ts, "EXPIRE k 100").await;
    assert_eq!(exec_s(&ts, "TTL k").await, ":100\r\n");
    assert_eq!(exec_s(&ts, "PTTL k").await, ":100000\r\n");
    Ok(())
}

#[tokio::test]
async fn expired_key_vanishes_for_readers() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SET k v").await;
    exec_s(&ts, "EXPIRE k 10").await;
    ts.clock.advance(Duration::from_secs(11));
    assert_eq!(exec_s(&ts, "GET k").await, "$-1\r\n");
    assert_eq!(exec_s(&ts, "TTL k").await, ":-2\r\n");
    Ok(())
}

#[tokio::test]
async fn expire_gates_follow_nx_xx_gt_lt() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SET k v").await;

    assert_eq!(exec_s(&ts, "EXPIRE k 100 XX").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "EXPIRE k 100 NX").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "EXPIRE k 50 NX").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "EXPIRE k 50 GT").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "EXPIRE k 200 GT").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "EXPIRE k 300 LT").await, ":0\r\n");
    assert_eq!(exec_s(&ts, "EXPIRE k 100 LT").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "TTL k").await, ":100\r\n");
    Ok(())
}

#[tokio::test]
async fn nonpositive_expire_deletes_immediately() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SET k v").await;
    assert_eq!(exec_s(&ts, "EXPIRE k 0").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "EXISTS k").await, ":0\r\n");
    Ok(())
}

#[tokio::test]
async fn expire_on_missing_key_is_zero() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "EXPIRE ghost 10").await, ":0\r\n");
    Ok(())
}

#[tokio::test]
async fn expire_validates_the_amount() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SET k v").await;
    assert_eq!(
        exec_s(&ts, "EXPIRE k soon").await,
        "-ERR expire time must be integer, was provided \"soon\"\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn persist_drops_only_existing_ttls() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SET k v").await;
    assert_eq!(exec_s(&ts, "PERSIST k").await, ":0\r\n");
    exec_s(&ts, "EXPIRE k 100").await;
    assert_eq!(exec_s(&ts, "PERSIST k").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "TTL k").await, ":-1\r\n");
    Ok(())
}

#[tokio::test]
async fn pexpire_uses_milliseconds() -> Result<()> {
    let ts = test_server().await?;
    exec_s(&ts, "SET k v").await;
    assert_eq!(exec_s(&ts, "PEXPIRE k 1500").await, ":1\r\n");
    assert_eq!(exec_s(&ts, "PTTL k").await, ":1500\r\n");
    ts.clock.advance(Duration::from_millis(1501));
    assert_eq!(exec_s(&ts, "EXISTS k").await, ":0\r\n");
    Ok(())
}
