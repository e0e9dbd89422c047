// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use serial_test::serial;

use crate::integration_tests::common::{TestClient, start_server};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn publish_fans_out_to_named_and_pattern_subscribers() -> Result<()> {
    let (server, addr) = start_server(|_| {}).await?;

    let mut sub_named = TestClient::connect(addr).await?;
    assert_eq!(
        sub_named.request(&["SUBSCRIBE", "ch1"]).await?,
        "*3\r\n$9\r\nsubscribe\r\n$3\r\nch1\r\n:1\r\n"
    );

    let mut sub_pattern = TestClient::connect(addr).await?;
    assert_eq!(
        sub_pattern.request(&["PSUBSCRIBE", "ch*"]).await?,
        "*3\r\n$10\r\npsubscribe\r\n$3\r\nch*\r\n:1\r\n"
    );

    let mut publisher = TestClient::connect(addr).await?;
    assert_eq!(
        publisher.request(&["PUBLISH", "ch1", "hello"]).await?,
        ":2\r\n"
    );

    // The named subscriber sees the channel, the pattern subscriber sees the
    // pattern name echoed back.
    assert_eq!(
        sub_named.read_reply().await?,
        "*3\r\n$7\r\nmessage\r\n$3\r\nch1\r\n$5\r\nhello\r\n"
    );
    assert_eq!(
        sub_pattern.read_reply().await?,
        "*3\r\n$7\r\nmessage\r\n$3\r\nch*\r\n$5\r\nhello\r\n"
    );

    server.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn deliveries_preserve_publish_order_per_channel() -> Result<()> {
    let (server, addr) = start_server(|_| {}).await?;

    let mut subscriber = TestClient::connect(addr).await?;
    subscriber.request(&["SUBSCRIBE", "stream"]).await?;

    let mut publisher = TestClient::connect(addr).await?;
    for i in 0..10 {
        publisher
            .request(&["PUBLISH", "stream", &format!("m{i}")])
            .await?;
    }

    for i in 0..10 {
        let body = format!("m{i}");
        let expected = format!(
            "*3\r\n$7\r\nmessage\r\n$6\r\nstream\r\n${}\r\n{body}\r\n",
            body.len()
        );
        assert_eq!(subscriber.read_reply().await?, expected);
    }

    server.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn subscription_frames_number_channels_per_command() -> Result<()> {
    let (server, addr) = start_server(|_| {}).await?;

    let mut client = TestClient::connect(addr).await?;
    client.send(&["SUBSCRIBE", "a", "b"]).await?;
    assert_eq!(
        client.read_reply().await?,
        "*3\r\n$9\r\nsubscribe\r\n$1\r\na\r\n:1\r\n"
    );
    assert_eq!(
        client.read_reply().await?,
        "*3\r\n$9\r\nsubscribe\r\n$1\r\nb\r\n:2\r\n"
    );

    // Bare UNSUBSCRIBE detaches from everything, one frame per channel.
    let reply = client.request(&["UNSUBSCRIBE"]).await?;
    assert!(reply.starts_with("*2\r\n"), "got {reply:?}");
    assert!(reply.contains("unsubscribe"));

    assert_eq!(client.request(&["PUBSUB", "NUMSUB", "a"]).await?,
        "*2\r\n$1\r\na\r\n:0\r\n");

    server.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn punsubscribe_detaches_matching_named_channels() -> Result<()> {
    let (server, addr) = start_server(|_| {}).await?;

    let mut client = TestClient::connect(addr).await?;
    client.request(&["SUBSCRIBE", "news.tech"]).await?;
    client.request(&["PSUBSCRIBE", "news.*"]).await?;

    // The pattern argument removes both the pattern channel and the matching
    // named subscription.
    let reply = client.request(&["PUNSUBSCRIBE", "news.*"]).await?;
    assert!(reply.starts_with("*2\r\n"), "got {reply:?}");
    assert!(reply.contains("news.*"));
    assert!(reply.contains("news.tech"));

    let mut publisher = TestClient::connect(addr).await?;
    assert_eq!(
        publisher.request(&["PUBLISH", "news.tech", "x"]).await?,
        ":0\r\n"
    );

    server.shutdown();
    Ok(())
}
