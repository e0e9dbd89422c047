// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use serial_test::serial;

use crate::integration_tests::common::{TestClient, start_server};

fn secured(cfg: &mut resp_store_rs::cfg::config::Config) {
    cfg.security.require_pass = true;
    cfg.security.password = "adminpw".to_string();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn deluser_terminates_the_users_sessions() -> Result<()> {
    let (server, addr) = start_server(secured).await?;

    let mut admin = TestClient::connect(addr).await?;
    assert_eq!(admin.request(&["AUTH", "adminpw"]).await?, "+OK\r\n");
    assert_eq!(
        admin
            .request(&[
                "ACL", "SETUSER", "bob", "on", ">bobpw", "allcategories",
                "allcommands", "allchannels", "%RW~*",
            ])
            .await?,
        "+OK\r\n"
    );

    let mut bob = TestClient::connect(addr).await?;
    assert_eq!(bob.request(&["AUTH", "bob", "bobpw"]).await?, "+OK\r\n");
    assert_eq!(bob.request(&["GET", "anything"]).await?, "$-1\r\n");

    // Deleting bob force-closes the authenticated session; default is
    // silently skipped.
    assert_eq!(
        admin.request(&["ACL", "DELUSER", "bob", "default"]).await?,
        ":1\r\n"
    );
    bob.expect_closed().await?;

    let users = admin.request(&["ACL", "USERS"]).await?;
    assert!(users.contains("default"));
    assert!(!users.contains("bob"));

    server.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn category_denial_reports_the_offending_category() -> Result<()> {
    let (server, addr) = start_server(secured).await?;

    let mut admin = TestClient::connect(addr).await?;
    admin.request(&["AUTH", "adminpw"]).await?;
    assert_eq!(
        admin
            .request(&[
                "ACL", "SETUSER", "carol", "on", ">cpw", "+@read", "+@write",
                "-@hash", "allcommands", "allchannels", "%RW~*",
            ])
            .await?,
        "+OK\r\n"
    );

    let mut carol = TestClient::connect(addr).await?;
    assert_eq!(carol.request(&["AUTH", "carol", "cpw"]).await?, "+OK\r\n");
    assert_eq!(
        carol.request(&["HSET", "k", "f", "v"]).await?,
        "-ERR unauthorized access to the following categories: [@hash]\r\n"
    );

    server.shutdown();
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn auth_is_tracked_per_connection() -> Result<()> {
    let (server, addr) = start_server(secured).await?;

    let mut authed = TestClient::connect(addr).await?;
    assert_eq!(authed.request(&["AUTH", "adminpw"]).await?, "+OK\r\n");
    assert_eq!(authed.request(&["SET", "k", "v"]).await?, "+OK\r\n");

    // A second connection starts unauthenticated regardless.
    let mut fresh = TestClient::connect(addr).await?;
    assert_eq!(
        fresh.request(&["GET", "k"]).await?,
        "-ERR user must be authenticated\r\n"
    );

    server.shutdown();
    Ok(())
}
