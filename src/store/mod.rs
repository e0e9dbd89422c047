// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Wire-visible command error taxonomy.
pub mod error;
/// The keyspace engine: per-key locking, TTLs, batch reads/writes.
pub mod keyspace;
/// Tagged value variants stored under each key.
pub mod value;

pub use error::CommandError;
pub use keyspace::{Keyspace, Record};
pub use value::{HashField, Value};
