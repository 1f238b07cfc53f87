// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{bail, Result};
use rusqlite::Connection;

use super::arg;
use crate::utils::{get_setting, set_setting, CURRENCY_KEY, DEFAULT_CURRENCY};

/// Settings the CLI reads, with their defaults.
pub const KNOWN_KEYS: &[(&str, &str)] = &[(CURRENCY_KEY, DEFAULT_CURRENCY)];

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => {
            let key = arg(sub, "key")?;
            let value = arg(sub, "value")?.trim();
            set_value(conn, key, value)?;
            println!("{} = {}", key, value);
        }
        Some(("get", sub)) => {
            let key = arg(sub, "key")?;
            match get_value(conn, key)? {
                Some(v) => println!("{}", v),
                None => println!("(unset)"),
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn set_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
    if !KNOWN_KEYS.iter().any(|(k, _)| *k == key) {
        bail!("Unknown setting '{}'", key);
    }
    if value.is_empty() {
        bail!("Value for '{}' cannot be empty", key);
    }
    set_setting(conn, key, value)
}

/// Stored value, or the default for a known key.
pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>> {
    if let Some(v) = get_setting(conn, key)? {
        return Ok(Some(v));
    }
    Ok(KNOWN_KEYS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, d)| d.to_string()))
}
