// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;

use crate::unit_tests::common::{exec_s, test_server};

#[tokio::test]
async fn ping_without_message_pongs() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "PING").await, "+PONG\r\n");
    Ok(())
}

#[tokio::test]
async fn ping_echoes_message_as_bulk() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "ping hello").await, "$5\r\nhello\r\n");
    Ok(())
}

#[tokio::test]
async fn ack_returns_null_bulk() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "ACK").await, "$-1\r\n");
    Ok(())
}

#[tokio::test]
async fn unknown_command_is_an_error() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(
        exec_s(&ts, "frobnicate now").await,
        "-ERR unknown command FROBNICATE\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn wrong_arity_reports_wrong_number_of_arguments() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(
        exec_s(&ts, "GET").await,
        "-ERR wrong number of arguments\r\n"
    );
    assert_eq!(
        exec_s(&ts, "PING one two").await,
        "-ERR wrong number of arguments\r\n"
    );
    Ok(())
}

#[tokio::test]
async fn command_lookup_is_case_insensitive() -> Result<()> {
    let ts = test_server().await?;
    assert_eq!(exec_s(&ts, "SeT k v").await, "+OK\r\n");
    assert_eq!(exec_s(&ts, "get k").await, "$1\r\nv\r\n");
    Ok(())
}
