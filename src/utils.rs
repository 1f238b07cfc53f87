// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::Once;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing_subscriber::{fmt, EnvFilter};

pub const CURRENCY_KEY: &str = "currency_label";
pub const DEFAULT_CURRENCY: &str = "ARS";

static TRACING: Once = Once::new();

/// Installs the stderr subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nido=warn"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid amount '{}'", s))
}

/// Amounts typed by the user must be strictly positive.
pub fn parse_amount(s: &str) -> Result<Decimal> {
    let d = parse_decimal(s)?;
    if d <= Decimal::ZERO {
        anyhow::bail!("Amount must be greater than zero (got '{}')", s);
    }
    Ok(d)
}

/// Whole currency units; the household ledger never shows cents.
pub fn fmt_money(d: &Decimal, ccy: &str) -> String {
    let whole = d.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    format!("{} {}", ccy, whole.normalize())
}

/// Trims and collapses inner whitespace.
pub fn normalize_name(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn currency_label(conn: &Connection) -> Result<String> {
    Ok(get_setting(conn, CURRENCY_KEY)?.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()))
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // Arrays stream one element per line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn money_is_whole_units() {
        assert_eq!(fmt_money(&dec!(1500), "ARS"), "ARS 1500");
        assert_eq!(fmt_money(&dec!(-300.5), "ARS"), "ARS -301");
        assert_eq!(fmt_money(&dec!(12.49), "$"), "$ 12");
    }

    #[test]
    fn amounts_must_be_positive() {
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("abc").is_err());
        assert_eq!(parse_amount(" 250 ").unwrap(), dec!(250));
    }

    #[test]
    fn names_are_normalised() {
        assert_eq!(normalize_name("  Banco   Nación "), "Banco Nación");
    }
}
