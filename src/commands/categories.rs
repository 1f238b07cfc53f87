// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::{params, Connection};
use tracing::info;

use super::{arg, json_flags};
use crate::errors::{self, NidoError};
use crate::models::CategoryKind;
use crate::store::{LedgerStore, SqliteLedger};
use crate::utils::{maybe_print_json, normalize_name, pretty_table};

pub const DEFAULT_CATEGORIES: &[(&str, CategoryKind)] = &[
    ("Sueldo", CategoryKind::Income),
    ("Ingresos extra", CategoryKind::Income),
    ("Alimentos", CategoryKind::Expense),
    ("Servicios", CategoryKind::Expense),
    ("Transporte", CategoryKind::Expense),
    ("Salud", CategoryKind::Expense),
    ("Ocio", CategoryKind::Expense),
];

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let kind: CategoryKind = arg(sub, "kind")?.parse()?;
            let id = add_category(conn, arg(sub, "name")?, kind)?;
            println!("Added {} category #{}", kind.as_str(), id);
        }
        Some(("list", sub)) => {
            let cats = SqliteLedger::new(conn).categories()?;
            let (json, jsonl) = json_flags(sub);
            if maybe_print_json(json, jsonl, &cats)? {
                return Ok(());
            }
            let rows = cats
                .iter()
                .map(|c| vec![c.id.to_string(), c.name.clone(), c.kind.as_str().to_string()])
                .collect();
            println!("{}", pretty_table(&["ID", "Name", "Kind"], rows));
        }
        Some(("seed", _)) => {
            let n = seed_defaults(conn)?;
            if n == 0 {
                println!("Categories already present, nothing seeded");
            } else {
                println!("Seeded {} categories", n);
            }
        }
        _ => {}
    }
    Ok(())
}

pub fn add_category(conn: &Connection, name: &str, kind: CategoryKind) -> errors::Result<i64> {
    let name = normalize_name(name);
    if name.is_empty() {
        return Err(NidoError::constraint("Name cannot be empty"));
    }
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE LOWER(name)=LOWER(?1) AND kind=?2",
        params![name, kind.as_str()],
        |r| r.get(0),
    )?;
    if exists > 0 {
        return Err(NidoError::constraint(format!(
            "A {} category named '{}' already exists",
            kind.as_str(),
            name
        )));
    }
    conn.execute(
        "INSERT INTO categories(name, kind) VALUES (?1, ?2)",
        params![name, kind.as_str()],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, %name, kind = kind.as_str(), "category added");
    Ok(id)
}

/// Inserts the default set only into an empty table.
pub fn seed_defaults(conn: &Connection) -> errors::Result<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?;
    if existing > 0 {
        return Ok(0);
    }
    let tx = conn.unchecked_transaction()?;
    for (name, kind) in DEFAULT_CATEGORIES {
        tx.execute(
            "INSERT OR IGNORE INTO categories(name, kind) VALUES (?1, ?2)",
            params![name, kind.as_str()],
        )?;
    }
    tx.commit()?;
    Ok(DEFAULT_CATEGORIES.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    #[test]
    fn seeding_only_fills_an_empty_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();
        assert_eq!(seed_defaults(&conn).unwrap(), DEFAULT_CATEGORIES.len());
        assert_eq!(seed_defaults(&conn).unwrap(), 0);
        let cats = SqliteLedger::new(&conn).categories().unwrap();
        assert_eq!(cats.len(), DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn duplicates_are_checked_per_kind() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();
        add_category(&conn, "Regalos", CategoryKind::Expense).unwrap();
        assert!(add_category(&conn, "regalos", CategoryKind::Expense).is_err());
        add_category(&conn, "Regalos", CategoryKind::Income).unwrap();
        assert!(add_category(&conn, "   ", CategoryKind::Income).is_err());
    }
}
