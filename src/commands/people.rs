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
use crate::models::Dimension;
use crate::store::{LedgerStore, SqliteLedger};
use crate::utils::{maybe_print_json, normalize_name, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let id = add_person(conn, arg(sub, "name")?)?;
            println!("Added person #{}", id);
        }
        Some(("list", sub)) => list(conn, sub)?,
        Some(("deactivate", sub)) => {
            let store = SqliteLedger::new(conn);
            let id = store.resolve_ref(Dimension::Person, arg(sub, "person")?)?;
            deactivate_person(conn, id)?;
            println!("Deactivated person #{}", id);
        }
        _ => {}
    }
    Ok(())
}

pub fn add_person(conn: &Connection, name: &str) -> errors::Result<i64> {
    let name = normalize_name(name);
    if name.is_empty() {
        return Err(NidoError::constraint("Name cannot be empty"));
    }
    conn.execute("INSERT INTO people(name) VALUES (?1)", params![name])?;
    let id = conn.last_insert_rowid();
    info!(id, %name, "person added");
    Ok(id)
}

/// People with live transactions stay active so history keeps its owner.
pub fn deactivate_person(conn: &Connection, id: i64) -> errors::Result<()> {
    let store = SqliteLedger::new(conn);
    if store.person(id)?.is_none() {
        return Err(NidoError::not_found(Dimension::Person, id));
    }
    let refs = store.count_person_transactions(id)?;
    if refs > 0 {
        return Err(NidoError::constraint(format!(
            "Person #{} has {} transaction(s); remove or reassign them first",
            id, refs
        )));
    }
    conn.execute("UPDATE people SET active=0 WHERE id=?1", params![id])?;
    info!(id, "person deactivated");
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let store = SqliteLedger::new(conn);
    let people = store.people(!sub.get_flag("all"))?;
    let (json, jsonl) = json_flags(sub);
    if maybe_print_json(json, jsonl, &people)? {
        return Ok(());
    }
    let rows = people
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.name.clone(),
                if p.active { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    println!("{}", pretty_table(&["ID", "Name", "Active"], rows));
    Ok(())
}
