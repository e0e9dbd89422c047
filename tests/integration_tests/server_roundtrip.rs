// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use serial_test::serial;

use crate::integration_tests::common::{TestClient, start_server};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn ping_and_strings_over_tcp() -> Result<()> {
    let (server, addr) = start_server(|_| {}).await?;
    let mut client = TestClient::connect(addr).await?;

    assert_eq!(client.request(&["PING"]).await?, "+PONG\r\n");
    assert_eq!(client.request(&["SET", "greeting", "hello"]).await?, "+OK\r\n");
    assert_eq!(
        client.request(&["GET", "greeting"]).await?,
        "$5\r\nhello\r\n"
    );
    assert_eq!(client.request(&["DEL", "greeting"]).await?, ":1\r\n");
    assert_eq!(client.request(&["GET", "greeting"]).await?, "$-1\r\n");
    assert_eq!(
        client.request(&["NOPE"]).await?,
        "-ERR unknown command NOPE\r\n"
    );

    server.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn hash_field_expiry_contract_over_tcp() -> Result<()> {
    let (server, addr) = start_server(|_| {}).await?;
    let mut client = TestClient::connect(addr).await?;

    assert_eq!(
        client.request(&["HSET", "k", "f1", "v1", "f2", "v2"]).await?,
        ":2\r\n"
    );
    let all = client.request(&["HGETALL", "k"]).await?;
    assert!(all.starts_with("*4\r\n"), "got {all:?}");
    assert!(all.contains("$2\r\nf1\r\n$2\r\nv1\r\n"));
    assert!(all.contains("$2\r\nf2\r\n$2\r\nv2\r\n"));

    assert_eq!(
        client
            .request(&["HEXPIRE", "k", "100", "NX", "FIELDS", "1", "f1"])
            .await?,
        "*1\r\n:1\r\n"
    );
    assert_eq!(
        client
            .request(&["HEXPIRE", "k", "50", "NX", "FIELDS", "1", "f1"])
            .await?,
        "*1\r\n:0\r\n"
    );

    // Wall clock: the remaining TTL is within one second of the original.
    let ttl = client.request(&["HTTL", "k", "FIELDS", "1", "f1"]).await?;
    assert!(
        ttl == "*1\r\n:100\r\n" || ttl == "*1\r\n:99\r\n",
        "got {ttl:?}"
    );

    assert_eq!(
        client
            .request(&["HEXPIRE", "k", "0", "FIELDS", "1", "f2"])
            .await?,
        "*1\r\n:2\r\n"
    );
    assert_eq!(client.request(&["HGET", "k", "f2"]).await?, "$-1\r\n");

    server.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn pipelined_commands_reply_in_order() -> Result<()> {
    let (server, addr) = start_server(|_| {}).await?;
    let mut client = TestClient::connect(addr).await?;

    // Three commands written back to back before any reply is read.
    client.send(&["SET", "a", "1"]).await?;
    client.send(&["SET", "b", "2"]).await?;
    client.send(&["GET", "a"]).await?;

    assert_eq!(client.read_reply().await?, "+OK\r\n");
    assert_eq!(client.read_reply().await?, "+OK\r\n");
    assert_eq!(client.read_reply().await?, "$1\r\n1\r\n");

    server.shutdown();
    Ok(())
}
