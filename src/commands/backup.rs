// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::arg;
use crate::errors::{self, NidoError};
use crate::periods::{Clock, SystemClock};

pub const BACKUP_APP: &str = "nido";
pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    pub id: Option<i64>,
    pub name: String,
    #[serde(default = "yes")]
    pub active: bool,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecord {
    pub id: Option<i64>,
    pub name: String,
    pub kind: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: Option<i64>,
    pub name: String,
    pub kind: String,
    #[serde(default = "yes")]
    pub active: bool,
    pub owner_id: Option<i64>,
    pub statement_day: Option<i64>,
    pub due_day: Option<i64>,
    pub created_at: Option<String>,
}

/// A category budget when `category_id` is set, a person budget when `person_id` is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRecord {
    pub id: Option<i64>,
    pub month: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<i64>,
    pub amount: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Stored text is carried as-is so legacy rows survive a round trip untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: String,
    pub date: String,
    #[serde(default)]
    pub note: String,
    pub person_id: Option<i64>,
    pub category_id: Option<i64>,
    pub account_id: Option<i64>,
    pub transfer_group_id: Option<String>,
    pub transfer_side: Option<String>,
    pub deleted_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

fn yes() -> bool {
    true
}

/// `accounts` and `personBudgets` are absent from older files. An absent
/// collection leaves its table untouched, even in replace mode.
#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    #[serde(default)]
    pub people: Vec<PersonRecord>,
    #[serde(default)]
    pub categories: Vec<CategoryRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<AccountRecord>>,
    #[serde(default)]
    pub budgets: Vec<BudgetRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_budgets: Option<Vec<BudgetRecord>>,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupCounts {
    pub people: usize,
    pub categories: usize,
    pub accounts: usize,
    pub budgets: usize,
    pub person_budgets: usize,
    pub transactions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub app: String,
    pub version: u32,
    pub exported_at: String,
    #[serde(default)]
    pub counts: BackupCounts,
    pub data: BackupData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    Merge,
    Replace,
}

impl RestoreMode {
    pub fn parse(s: &str) -> errors::Result<Self> {
        match s {
            "merge" => Ok(RestoreMode::Merge),
            "replace" => Ok(RestoreMode::Replace),
            other => Err(NidoError::constraint(format!(
                "Invalid restore mode '{}' (merge|replace)",
                other
            ))),
        }
    }
}

/// Rows carrying an id are upserted, rows without one are appended.
/// `skipped` rows collided with a different stored row and changed nothing.
#[derive(Debug, Default, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RestoreCount {
    pub inserted: usize,
    pub upserted: usize,
    pub skipped: usize,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct RestoreReport {
    pub people: RestoreCount,
    pub categories: RestoreCount,
    pub accounts: RestoreCount,
    pub budgets: RestoreCount,
    pub transactions: RestoreCount,
}

impl RestoreCount {
    fn record(&mut self, had_id: bool, changed: usize) {
        if changed == 0 {
            self.skipped += 1;
        } else if had_id {
            self.upserted += 1;
        } else {
            self.inserted += 1;
        }
    }
}

pub fn handle_backup(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let out = arg(m, "out")?;
    let backup = write_backup(conn, &SystemClock, Path::new(out))?;
    println!(
        "Backup written to {} ({} people, {} categories, {} accounts, {} budgets, {} person budgets, {} transactions)",
        out,
        backup.counts.people,
        backup.counts.categories,
        backup.counts.accounts,
        backup.counts.budgets,
        backup.counts.person_budgets,
        backup.counts.transactions
    );
    Ok(())
}

pub fn handle_restore(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    let file = arg(m, "file")?;
    let mode = RestoreMode::parse(arg(m, "mode")?)?;
    let raw = std::fs::read_to_string(file).with_context(|| format!("Read backup {}", file))?;
    let backup: Backup =
        serde_json::from_str(&raw).with_context(|| format!("Parse backup {}", file))?;
    let r = restore(conn, &backup, mode)?;
    let line = |label: &str, c: RestoreCount| {
        println!(
            "{:<13} {} upserted, {} inserted, {} skipped",
            label, c.upserted, c.inserted, c.skipped
        )
    };
    println!("Restored {} ({:?})", file, mode);
    line("people", r.people);
    line("categories", r.categories);
    line("accounts", r.accounts);
    line("budgets", r.budgets);
    line("transactions", r.transactions);
    Ok(())
}

fn collect<T, F>(conn: &Connection, sql: &str, map: F) -> errors::Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], map)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Older rows may hold numeric amounts; they are carried as their text rendering.
fn as_text(r: &Row<'_>, idx: usize) -> rusqlite::Result<String> {
    Ok(match r.get::<_, Value>(idx)? {
        Value::Text(s) => s,
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Null => String::new(),
        Value::Blob(b) => String::from_utf8_lossy(&b).into_owned(),
    })
}

/// Snapshot of every table, soft-deleted transactions and inactive rows included.
pub fn snapshot(conn: &Connection, clock: &dyn Clock) -> errors::Result<Backup> {
    let people = collect(
        conn,
        "SELECT id, name, active, created_at FROM people ORDER BY id",
        |r: &Row<'_>| {
            Ok(PersonRecord {
                id: r.get(0)?,
                name: r.get(1)?,
                active: r.get::<_, i64>(2)? != 0,
                created_at: r.get(3)?,
            })
        },
    )?;
    let categories = collect(
        conn,
        "SELECT id, name, kind, created_at FROM categories ORDER BY id",
        |r: &Row<'_>| {
            Ok(CategoryRecord {
                id: r.get(0)?,
                name: r.get(1)?,
                kind: r.get(2)?,
                created_at: r.get(3)?,
            })
        },
    )?;
    let accounts = collect(
        conn,
        "SELECT id, name, kind, active, owner_id, statement_day, due_day, created_at
         FROM accounts ORDER BY id",
        |r: &Row<'_>| {
            Ok(AccountRecord {
                id: r.get(0)?,
                name: r.get(1)?,
                kind: r.get(2)?,
                active: r.get::<_, i64>(3)? != 0,
                owner_id: r.get(4)?,
                statement_day: r.get(5)?,
                due_day: r.get(6)?,
                created_at: r.get(7)?,
            })
        },
    )?;
    let budgets = collect(
        conn,
        "SELECT id, month, category_id, amount, created_at, updated_at FROM budgets ORDER BY id",
        |r: &Row<'_>| {
            Ok(BudgetRecord {
                id: r.get(0)?,
                month: r.get(1)?,
                category_id: r.get(2)?,
                person_id: None,
                amount: as_text(r, 3)?,
                created_at: r.get(4)?,
                updated_at: r.get(5)?,
            })
        },
    )?;
    // Person budgets live in their own id space, so their ids are not carried.
    let person_budgets = collect(
        conn,
        "SELECT month, person_id, amount, created_at, updated_at FROM person_budgets ORDER BY id",
        |r: &Row<'_>| {
            Ok(BudgetRecord {
                id: None,
                month: r.get(0)?,
                category_id: None,
                person_id: r.get(1)?,
                amount: as_text(r, 2)?,
                created_at: r.get(3)?,
                updated_at: r.get(4)?,
            })
        },
    )?;
    let transactions = collect(
        conn,
        "SELECT id, kind, amount, date, note, person_id, category_id, account_id,
                transfer_group_id, transfer_side, deleted_at, created_at, updated_at
         FROM transactions ORDER BY id",
        |r: &Row<'_>| {
            Ok(TransactionRecord {
                id: r.get(0)?,
                kind: r.get(1)?,
                amount: as_text(r, 2)?,
                date: as_text(r, 3)?,
                note: r.get(4)?,
                person_id: r.get(5)?,
                category_id: r.get(6)?,
                account_id: r.get(7)?,
                transfer_group_id: r.get(8)?,
                transfer_side: r.get(9)?,
                deleted_at: r.get(10)?,
                created_at: r.get(11)?,
                updated_at: r.get(12)?,
            })
        },
    )?;

    let data = BackupData {
        people,
        categories,
        accounts: Some(accounts),
        budgets,
        person_budgets: Some(person_budgets),
        transactions,
    };
    Ok(Backup {
        app: BACKUP_APP.to_string(),
        version: BACKUP_VERSION,
        exported_at: clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
        counts: BackupCounts {
            people: data.people.len(),
            categories: data.categories.len(),
            accounts: data.accounts.as_ref().map_or(0, Vec::len),
            budgets: data.budgets.len(),
            person_budgets: data.person_budgets.as_ref().map_or(0, Vec::len),
            transactions: data.transactions.len(),
        },
        data,
    })
}

pub fn write_backup(conn: &Connection, clock: &dyn Clock, out: &Path) -> errors::Result<Backup> {
    let backup = snapshot(conn, clock)?;
    std::fs::write(out, serde_json::to_string_pretty(&backup)?)?;
    info!(path = %out.display(), transactions = backup.counts.transactions, "backup written");
    Ok(backup)
}

/// Loads a backup inside one SQLite transaction; any failing row rolls back the whole restore.
pub fn restore(conn: &mut Connection, backup: &Backup, mode: RestoreMode) -> errors::Result<RestoreReport> {
    if backup.app != BACKUP_APP {
        return Err(NidoError::constraint(format!(
            "Backup belongs to '{}', not {}",
            backup.app, BACKUP_APP
        )));
    }
    let data = &backup.data;
    let tx = conn.transaction()?;
    if mode == RestoreMode::Replace {
        tx.execute_batch(
            "DELETE FROM transactions;
             DELETE FROM budgets;
             DELETE FROM categories;
             DELETE FROM people;",
        )?;
        if data.person_budgets.is_some() {
            tx.execute("DELETE FROM person_budgets", [])?;
        }
        if data.accounts.is_some() {
            tx.execute("DELETE FROM accounts", [])?;
        }
    }

    let mut report = RestoreReport::default();

    for p in &data.people {
        let n = tx.execute(
            "INSERT INTO people(id, name, active, created_at)
             VALUES (?1, ?2, ?3, COALESCE(?4, datetime('now')))
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, active=excluded.active, created_at=excluded.created_at",
            params![p.id, p.name, p.active as i64, p.created_at],
        )?;
        report.people.record(p.id.is_some(), n);
    }

    // A stored category already holding the incoming (name, kind) wins; the
    // colliding row is left as it is and counted as skipped.
    for c in &data.categories {
        let n = tx.execute(
            "INSERT INTO categories(id, name, kind, created_at)
             VALUES (?1, ?2, ?3, COALESCE(?4, datetime('now')))
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, kind=excluded.kind, created_at=excluded.created_at
                WHERE NOT EXISTS (
                    SELECT 1 FROM categories other
                    WHERE other.name = ?2 AND other.kind = ?3 AND other.id <> ?1
                )
             ON CONFLICT(name, kind) DO NOTHING",
            params![c.id, c.name, c.kind, c.created_at],
        )?;
        report.categories.record(c.id.is_some(), n);
    }

    for a in data.accounts.iter().flatten() {
        let n = tx.execute(
            "INSERT INTO accounts(id, name, kind, active, owner_id, statement_day, due_day, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, COALESCE(?8, datetime('now')))
             ON CONFLICT(id) DO UPDATE SET
                name=excluded.name, kind=excluded.kind, active=excluded.active,
                owner_id=excluded.owner_id, statement_day=excluded.statement_day,
                due_day=excluded.due_day, created_at=excluded.created_at",
            params![
                a.id,
                a.name,
                a.kind,
                a.active as i64,
                a.owner_id,
                a.statement_day,
                a.due_day,
                a.created_at
            ],
        )?;
        report.accounts.record(a.id.is_some(), n);
    }

    for b in data.budgets.iter().chain(data.person_budgets.iter().flatten()) {
        let n = match (b.category_id, b.person_id) {
            (Some(category_id), _) => {
                tx.execute(
                    "INSERT INTO budgets(id, month, category_id, amount, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, COALESCE(?5, datetime('now')), COALESCE(?6, datetime('now')))
                     ON CONFLICT(id) DO UPDATE SET
                        month=excluded.month, category_id=excluded.category_id,
                        amount=excluded.amount, updated_at=excluded.updated_at
                     ON CONFLICT(month, category_id) DO UPDATE SET
                        amount=excluded.amount, updated_at=excluded.updated_at",
                    params![b.id, b.month, category_id, b.amount, b.created_at, b.updated_at],
                )?
            }
            (None, Some(person_id)) => {
                tx.execute(
                    "INSERT INTO person_budgets(month, person_id, amount, created_at, updated_at)
                     VALUES (?1, ?2, ?3, COALESCE(?4, datetime('now')), COALESCE(?5, datetime('now')))
                     ON CONFLICT(month, person_id) DO UPDATE SET
                        amount=excluded.amount, updated_at=excluded.updated_at",
                    params![b.month, person_id, b.amount, b.created_at, b.updated_at],
                )?
            }
            (None, None) => {
                return Err(NidoError::constraint(format!(
                    "Budget for {} has neither a category nor a person",
                    b.month
                )));
            }
        };
        report.budgets.record(b.id.is_some(), n);
    }

    for t in &data.transactions {
        let n = tx.execute(
            "INSERT INTO transactions(id, kind, amount, date, note, person_id, category_id,
                account_id, transfer_group_id, transfer_side, deleted_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                COALESCE(?12, datetime('now')), COALESCE(?13, datetime('now')))
             ON CONFLICT(id) DO UPDATE SET
                kind=excluded.kind, amount=excluded.amount, date=excluded.date,
                note=excluded.note, person_id=excluded.person_id,
                category_id=excluded.category_id, account_id=excluded.account_id,
                transfer_group_id=excluded.transfer_group_id,
                transfer_side=excluded.transfer_side, deleted_at=excluded.deleted_at,
                created_at=excluded.created_at, updated_at=excluded.updated_at",
            params![
                t.id,
                t.kind,
                t.amount,
                t.date,
                t.note,
                t.person_id,
                t.category_id,
                t.account_id,
                t.transfer_group_id,
                t.transfer_side,
                t.deleted_at,
                t.created_at,
                t.updated_at
            ],
        )?;
        report.transactions.record(t.id.is_some(), n);
    }

    tx.commit()?;
    info!(?mode, transactions = data.transactions.len(), "backup restored");
    Ok(report)
}
