// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use tracing::info;

use crate::{
    acl::user::{Password, User, hash_password},
    commands::{
        CommandFlags, CommandSpec, HandlerFuture, HandlerParams, KeySet,
        SubCommandSpec, category,
    },
    resp::Frame,
    store::error::CommandError,
};

const ACL_CATS: &[&str] = &[category::ADMIN, category::SLOW, category::DANGEROUS];

pub fn commands() -> Vec<CommandSpec> {
    vec![CommandSpec {
        name: "acl",
        module: "acl",
        categories: ACL_CATS,
        flags: CommandFlags::empty(),
        description: "ACL CAT|USERS|SETUSER|GETUSER|DELUSER|WHOAMI|LIST|LOAD|SAVE",
        sub_commands: vec![
            sub("cat", CommandFlags::empty(),
                "ACL CAT [category]: categories, or the commands in one",
                ke_cat, cat),
            sub("users", CommandFlags::empty(),
                "ACL USERS: known usernames", ke_bare, users),
            sub("setuser", CommandFlags::SYNC,
                "ACL SETUSER username [rule ...]: create or modify a user",
                ke_setuser, setuser),
            sub("getuser", CommandFlags::empty(),
                "ACL GETUSER username: describe one user", ke_one_arg, getuser),
            sub("deluser", CommandFlags::SYNC,
                "ACL DELUSER username [username ...]: delete users and end their sessions",
                ke_deluser, deluser),
            sub("whoami", CommandFlags::empty(),
                "ACL WHOAMI: the connection's effective user", ke_bare, whoami),
            sub("list", CommandFlags::empty(),
                "ACL LIST: one rule line per user", ke_bare, list),
            sub("load", CommandFlags::SYNC,
                "ACL LOAD MERGE|REPLACE: re-read the ACL file", ke_one_arg, load),
            sub("save", CommandFlags::empty(),
                "ACL SAVE: write the effective users to the ACL file",
                ke_bare, save),
        ],
        key_fn: ke_parent,
        handler: parent,
    }]
}

fn sub(
    name: &'static str,
    flags: CommandFlags,
    description: &'static str,
    key_fn: fn(&[String]) -> Result<KeySet, CommandError>,
    handler: fn(HandlerParams) -> HandlerFuture,
) -> SubCommandSpec {
    SubCommandSpec {
        name,
        module: "acl",
        categories: ACL_CATS,
        flags,
        description,
        key_fn,
        handler,
    }
}

fn ke_parent(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn ke_bare(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 2 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn ke_one_arg(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() != 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn ke_cat(tokens: &[String]) -> Result<KeySet, CommandError> {
    if !(2..=3).contains(&tokens.len()) {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn ke_setuser(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn ke_deluser(tokens: &[String]) -> Result<KeySet, CommandError> {
    if tokens.len() < 3 {
        return Err(CommandError::WrongArgs);
    }
    Ok(KeySet::none())
}

fn parent(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let sub = params.arg(1).unwrap_or_default().to_ascii_uppercase();
        Err(CommandError::custom(format!("unknown ACL subcommand {sub}")))
    })
}

fn cat(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let reply = match params.arg(2) {
            None => {
                let cats = params.registry.categories();
                Frame::Array(cats.into_iter().map(Frame::bulk).collect())
            },
            Some(wanted) => {
                let wanted = if wanted.starts_with('@') {
                    wanted.to_string()
                } else {
                    format!("@{wanted}")
                };
                if !params.registry.categories().contains(&wanted.as_str()) {
                    return Err(CommandError::custom(format!(
                        "unknown category {wanted}"
                    )));
                }
                let names = params.registry.commands_in_category(&wanted);
                Frame::Array(names.into_iter().map(Frame::Bulk).collect())
            },
        };
        Ok(reply.encode())
    })
}

fn users(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let names = params.acl.usernames().await;
        Ok(Frame::Array(names.into_iter().map(Frame::Bulk).collect()).encode())
    })
}

fn setuser(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        params.acl.set_user(&params.tokens[2..]).await?;
        Ok(Frame::ok().encode())
    })
}

fn getuser(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let username = &params.tokens[2];
        let Some(user) = params.acl.get_user(username).await else {
            return Err(CommandError::custom(format!(
                "user {username} does not exist"
            )));
        };
        Ok(render_user(&user).encode())
    })
}

fn deluser(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let deleted = params.acl.delete_users(&params.tokens[2..]).await;
        for username in &deleted {
            let killed = params.connections.kill_user_sessions(username);
            info!(user = %username, sessions = killed, "deleted ACL user");
        }
        Ok(Frame::Integer(deleted.len() as i64).encode())
    })
}

fn whoami(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move { Ok(Frame::Bulk(params.conn.username()).encode()) })
}

fn list(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let users = params.acl.users_snapshot().await;
        let lines = users.iter().map(|u| Frame::Bulk(u.describe())).collect();
        Ok(Frame::Array(lines).encode())
    })
}

fn load(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let merge = match params.tokens[2].to_ascii_uppercase().as_str() {
            "MERGE" => true,
            "REPLACE" => false,
            _ => {
                return Err(CommandError::custom(
                    "ACL LOAD requires MERGE or REPLACE",
                ));
            },
        };
        params.acl.load(merge).await?;
        Ok(Frame::ok().encode())
    })
}

fn save(params: HandlerParams) -> HandlerFuture {
    Box::pin(async move {
        let path = params.acl.save().await?;
        info!(path = %path.display(), "saved ACL users");
        Ok(Frame::ok().encode())
    })
}

/// GETUSER reply: labelled sections, each an array of rule-style tokens.
fn render_user(user: &User) -> Frame {
    let mut flags = vec![if user.enabled { "on" } else { "off" }.to_string()];
    if user.no_password {
        flags.push("nopass".to_string());
    }
    if user.no_keys {
        flags.push("nokeys".to_string());
    }

    let passwords: Vec<String> = user
        .passwords
        .iter()
        .map(|p| match p {
            Password::Plaintext(plain) => format!("#{}", hash_password(plain)),
            Password::Sha256(digest) => format!("#{digest}"),
        })
        .collect();

    let categories: Vec<String> = user
        .included_categories
        .iter()
        .map(|c| format!("+{c}"))
        .chain(user.excluded_categories.iter().map(|c| format!("-{c}")))
        .collect();

    let commands: Vec<String> = user
        .included_commands
        .iter()
        .map(|c| format!("+{c}"))
        .chain(user.excluded_commands.iter().map(|c| format!("-{c}")))
        .collect();

    let keys: Vec<String> = user
        .included_read_keys
        .iter()
        .map(|k| format!("%R~{k}"))
        .chain(user.included_write_keys.iter().map(|k| format!("%W~{k}")))
        .collect();

    let channels: Vec<String> = user
        .included_pubsub_channels
        .iter()
        .map(|c| format!("+&{c}"))
        .chain(
            user.excluded_pubsub_channels
                .iter()
                .map(|c| format!("-&{c}")),
        )
        .collect();

    Frame::Array(vec![
        Frame::bulk("username"),
        Frame::bulk(user.username.clone()),
        Frame::bulk("flags"),
        string_array(flags),
        Frame::bulk("passwords"),
        string_array(passwords),
        Frame::bulk("categories"),
        string_array(categories),
        Frame::bulk("commands"),
        string_array(commands),
        Frame::bulk("keys"),
        string_array(keys),
        Frame::bulk("channels"),
        string_array(channels),
    ])
}

fn string_array(items: Vec<String>) -> Frame {
    Frame::Array(items.into_iter().map(Frame::Bulk).collect())
}
