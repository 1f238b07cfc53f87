// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The ledger store contract and its SQLite implementation.
//!
//! Rows are decoded here, once. Anything that cannot be trusted (unknown
//! kinds, broken dates, legacy signed or REAL amounts) is either normalised
//! or dropped with a warning, so the aggregation code only ever sees
//! well-formed [`Transaction`] values.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::budgets::BudgetScope;
use crate::errors::{NidoError, Result};
use crate::models::{
    Account, AccountKind, Category, CategoryKind, CreditTerms, Dimension, NewTransaction, Person,
    Transaction, TransferPatch, TransferSide, TxKind, TxPatch,
};
use crate::periods::DateRange;

/// Which rows a query should return. Fields are AND-combined; soft-deleted
/// rows are always excluded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxFilter {
    pub range: Option<DateRange>,
    pub kinds: Vec<TxKind>,
    pub person_id: Option<i64>,
    pub category_id: Option<i64>,
    pub account_id: Option<i64>,
    pub transfer_group_id: Option<String>,
    pub note_contains: Option<String>,
}

impl TxFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn kinds(mut self, kinds: &[TxKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn flows(self) -> Self {
        self.kinds(&[TxKind::Income, TxKind::Expense])
    }

    pub fn person(mut self, person_id: Option<i64>) -> Self {
        self.person_id = person_id;
        self
    }

    pub fn category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }

    pub fn account(mut self, account_id: Option<i64>) -> Self {
        self.account_id = account_id;
        self
    }

    pub fn group(mut self, group_id: &str) -> Self {
        self.transfer_group_id = Some(group_id.to_string());
        self
    }

    pub fn note_contains(mut self, text: Option<&str>) -> Self {
        self.note_contains = text
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        self
    }

    /// Same predicate the store applies, usable on already-loaded rows.
    pub fn matches(&self, tx: &Transaction) -> bool {
        if tx.deleted_at.is_some() {
            return false;
        }
        if let Some(range) = &self.range {
            if !range.contains(tx.date) {
                return false;
            }
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&tx.kind) {
            return false;
        }
        if self.person_id.is_some() && tx.person_id != self.person_id {
            return false;
        }
        if self.category_id.is_some() && tx.category_id != self.category_id {
            return false;
        }
        if self.account_id.is_some() && tx.account_id != self.account_id {
            return false;
        }
        if self.transfer_group_id.is_some() && tx.transfer_group_id != self.transfer_group_id {
            return false;
        }
        if let Some(needle) = &self.note_contains {
            if !tx.note.to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Read side of the ledger.
pub trait LedgerStore {
    /// Matching rows ordered by date then insertion order.
    fn transactions(&self, filter: &TxFilter) -> Result<Vec<Transaction>>;
    fn transaction(&self, id: i64) -> Result<Option<Transaction>>;
    fn people(&self, active_only: bool) -> Result<Vec<Person>>;
    fn person(&self, id: i64) -> Result<Option<Person>>;
    fn categories(&self) -> Result<Vec<Category>>;
    fn category(&self, id: i64) -> Result<Option<Category>>;
    fn accounts(&self, active_only: bool) -> Result<Vec<Account>>;
    fn account(&self, id: i64) -> Result<Option<Account>>;
    fn budget_amounts(&self, scope: BudgetScope, month: &str) -> Result<HashMap<i64, Decimal>>;
}

/// Write side of the ledger.
pub trait LedgerWriter {
    fn insert_transaction(&self, tx: &NewTransaction) -> Result<i64>;
    fn update_transaction(&self, id: i64, patch: &TxPatch) -> Result<usize>;
    fn soft_delete_transaction(&self, id: i64) -> Result<usize>;
    fn update_transfer_group(&self, group_id: &str, patch: &TransferPatch) -> Result<usize>;
    fn soft_delete_transfer_group(&self, group_id: &str) -> Result<usize>;
    fn upsert_budget(
        &self,
        scope: BudgetScope,
        month: &str,
        dimension_id: i64,
        amount: Decimal,
    ) -> Result<()>;
    fn delete_budget(&self, scope: BudgetScope, month: &str, dimension_id: i64) -> Result<usize>;

    /// Writes both legs of a transfer. Stores without multi-row atomicity get
    /// this sequential version: if the second insert fails the first leg is
    /// retracted, and if that also fails the caller receives
    /// [`NidoError::PartialMultiWriteFailure`].
    fn insert_transfer_legs(
        &self,
        out_leg: &NewTransaction,
        in_leg: &NewTransaction,
    ) -> Result<(i64, i64)> {
        let out_id = self.insert_transaction(out_leg)?;
        match self.insert_transaction(in_leg) {
            Ok(in_id) => Ok((out_id, in_id)),
            Err(err) => {
                let group_id = out_leg.transfer_group_id.clone().unwrap_or_default();
                warn!(%group_id, out_id, error = %err, "in-leg insert failed, retracting out-leg");
                match self.soft_delete_transaction(out_id) {
                    Ok(1) => Err(err),
                    _ => Err(NidoError::PartialMultiWriteFailure {
                        group_id,
                        written: 1,
                        source: Box::new(err),
                    }),
                }
            }
        }
    }
}

pub struct SqliteLedger<'c> {
    conn: &'c Connection,
}

const TX_COLUMNS: &str = "id, kind, amount, date, note, person_id, category_id, account_id, \
                          transfer_group_id, transfer_side, deleted_at";

impl<'c> SqliteLedger<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn conn(&self) -> &Connection {
        self.conn
    }

    /// Accepts either a numeric id or an exact (case-insensitive) name.
    pub fn resolve_ref(&self, dimension: Dimension, raw: &str) -> Result<i64> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
            return dimension.parse_id(trimmed);
        }
        let sql = format!(
            "SELECT id FROM {} WHERE LOWER(name)=LOWER(?1) ORDER BY id LIMIT 1",
            dimension.table()
        );
        self.conn
            .query_row(&sql, params![trimmed], |r| r.get::<_, i64>(0))
            .optional()?
            .ok_or_else(|| NidoError::not_found(dimension, trimmed))
    }

    pub fn resolve_opt_ref(&self, dimension: Dimension, raw: Option<&str>) -> Result<Option<i64>> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => self.resolve_ref(dimension, s).map(Some),
            None => Ok(None),
        }
    }

    /// Every row, soft-deleted ones included. Used by backups.
    pub fn all_transactions(&self) -> Result<Vec<Transaction>> {
        let sql = format!("SELECT {} FROM transactions ORDER BY id", TX_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            if let Some(tx) = decode_transaction(r)? {
                out.push(tx);
            }
        }
        Ok(out)
    }

    pub fn count_person_transactions(&self, person_id: i64) -> Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE person_id=?1 AND deleted_at IS NULL",
            params![person_id],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }
}

fn now_stamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn value_to_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::Text(s) => s.trim().parse::<Decimal>().ok(),
        Value::Integer(i) => Some(Decimal::from(*i)),
        Value::Real(f) => Decimal::try_from(*f).ok(),
        _ => None,
    }
}

fn value_to_text(v: Value) -> Option<String> {
    match v {
        Value::Text(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

fn value_to_id(v: Value) -> Option<i64> {
    match v {
        Value::Integer(i) => Some(i),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Stored dates are `YYYY-MM-DD`; older rows may carry a full timestamp.
fn decode_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// One transaction row, or `None` if the row is too damaged to aggregate.
pub fn decode_transaction(r: &Row<'_>) -> Result<Option<Transaction>> {
    let id: i64 = r.get(0)?;
    let kind_raw = value_to_text(r.get(1)?).unwrap_or_default();
    let Ok(kind) = kind_raw.parse::<TxKind>() else {
        warn!(id, kind = %kind_raw, "skipping transaction with unknown kind");
        return Ok(None);
    };
    let amount_raw: Value = r.get(2)?;
    let amount = match value_to_decimal(&amount_raw) {
        Some(a) => a.abs(),
        None => {
            warn!(id, amount = ?amount_raw, "unreadable amount, counting as zero");
            Decimal::ZERO
        }
    };
    let date_raw = value_to_text(r.get(3)?).unwrap_or_default();
    let Some(date) = decode_date(&date_raw) else {
        warn!(id, date = %date_raw, "skipping transaction with unreadable date");
        return Ok(None);
    };
    let transfer_side = value_to_text(r.get(9)?).and_then(|s| TransferSide::parse(&s));
    if kind == TxKind::Transfer && transfer_side.is_none() {
        warn!(id, "skipping transfer leg without a side");
        return Ok(None);
    }
    Ok(Some(Transaction {
        id,
        kind,
        amount,
        date,
        note: value_to_text(r.get(4)?).unwrap_or_default(),
        person_id: value_to_id(r.get(5)?),
        category_id: value_to_id(r.get(6)?),
        account_id: value_to_id(r.get(7)?),
        transfer_group_id: value_to_text(r.get(8)?).filter(|s| !s.is_empty()),
        transfer_side,
        deleted_at: value_to_text(r.get(10)?),
    }))
}

fn decode_person(r: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: r.get(0)?,
        name: r.get::<_, Option<String>>(1)?.unwrap_or_else(|| "—".into()),
        active: r.get::<_, Option<i64>>(2)?.unwrap_or(1) != 0,
    })
}

fn decode_category(r: &Row<'_>) -> rusqlite::Result<Option<Category>> {
    let id: i64 = r.get(0)?;
    let kind_raw: String = r.get::<_, Option<String>>(2)?.unwrap_or_default();
    let Ok(kind) = kind_raw.parse::<CategoryKind>() else {
        warn!(id, kind = %kind_raw, "skipping category with unknown kind");
        return Ok(None);
    };
    Ok(Some(Category {
        id,
        name: r.get::<_, Option<String>>(1)?.unwrap_or_else(|| "—".into()),
        kind,
    }))
}

fn decode_account(r: &Row<'_>) -> rusqlite::Result<Account> {
    let kind = r
        .get::<_, Option<String>>(2)?
        .and_then(|s| s.parse::<AccountKind>().ok())
        .unwrap_or(AccountKind::Cash);
    let statement_day: Option<u32> = r.get(5)?;
    let due_day: Option<u32> = r.get(6)?;
    let credit_terms = match (kind, statement_day, due_day) {
        (AccountKind::Credit, Some(statement_day), Some(due_day)) => Some(CreditTerms {
            statement_day,
            due_day,
        }),
        _ => None,
    };
    Ok(Account {
        id: r.get(0)?,
        name: r.get::<_, Option<String>>(1)?.unwrap_or_else(|| "—".into()),
        kind,
        active: r.get::<_, Option<i64>>(3)?.unwrap_or(1) != 0,
        owner_id: r.get(4)?,
        credit_terms,
    })
}

fn insert_row(conn: &Connection, tx: &NewTransaction) -> Result<i64> {
    conn.execute(
        "INSERT INTO transactions(kind, amount, date, note, person_id, category_id, account_id,
                                  transfer_group_id, transfer_side)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            tx.kind.as_str(),
            tx.amount.to_string(),
            tx.date.to_string(),
            tx.note,
            tx.person_id,
            tx.category_id,
            tx.account_id,
            tx.transfer_group_id,
            tx.transfer_side.map(|s| s.as_str()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl LedgerStore for SqliteLedger<'_> {
    fn transactions(&self, filter: &TxFilter) -> Result<Vec<Transaction>> {
        let mut sql = format!(
            "SELECT {} FROM transactions WHERE deleted_at IS NULL",
            TX_COLUMNS
        );
        let mut args: Vec<Value> = Vec::new();

        if let Some(range) = &filter.range {
            sql.push_str(" AND substr(date,1,10) >= ? AND substr(date,1,10) <= ?");
            args.push(Value::Text(range.start.to_string()));
            args.push(Value::Text(range.last_day().to_string()));
        }
        if !filter.kinds.is_empty() {
            let marks = vec!["?"; filter.kinds.len()].join(",");
            sql.push_str(&format!(" AND kind IN ({})", marks));
            args.extend(filter.kinds.iter().map(|k| Value::Text(k.as_str().into())));
        }
        if let Some(id) = filter.person_id {
            sql.push_str(" AND person_id = ?");
            args.push(Value::Integer(id));
        }
        if let Some(id) = filter.category_id {
            sql.push_str(" AND category_id = ?");
            args.push(Value::Integer(id));
        }
        if let Some(id) = filter.account_id {
            sql.push_str(" AND account_id = ?");
            args.push(Value::Integer(id));
        }
        if let Some(group) = &filter.transfer_group_id {
            sql.push_str(" AND transfer_group_id = ?");
            args.push(Value::Text(group.clone()));
        }
        sql.push_str(" ORDER BY substr(date,1,10), id");
        debug!(%sql, args = args.len(), "transactions query");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(args))?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            if let Some(tx) = decode_transaction(r)? {
                // Note search is applied here so it is case-insensitive beyond ASCII.
                if filter.matches(&tx) {
                    out.push(tx);
                }
            }
        }
        Ok(out)
    }

    fn transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE id=?1 AND deleted_at IS NULL",
            TX_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(r) => decode_transaction(r),
            None => Ok(None),
        }
    }

    fn people(&self, active_only: bool) -> Result<Vec<Person>> {
        let sql = if active_only {
            "SELECT id, name, active FROM people WHERE active=1 ORDER BY id"
        } else {
            "SELECT id, name, active FROM people ORDER BY id"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], decode_person)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn person(&self, id: i64) -> Result<Option<Person>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, active FROM people WHERE id=?1",
                params![id],
                decode_person,
            )
            .optional()?)
    }

    fn categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, kind FROM categories ORDER BY kind, name, id")?;
        let rows = stmt.query_map([], decode_category)?;
        let mut out = Vec::new();
        for row in rows {
            if let Some(c) = row? {
                out.push(c);
            }
        }
        Ok(out)
    }

    fn category(&self, id: i64) -> Result<Option<Category>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, kind FROM categories WHERE id=?1",
                params![id],
                decode_category,
            )
            .optional()?
            .flatten())
    }

    fn accounts(&self, active_only: bool) -> Result<Vec<Account>> {
        let sql = if active_only {
            "SELECT id, name, kind, active, owner_id, statement_day, due_day
             FROM accounts WHERE active=1 ORDER BY id"
        } else {
            "SELECT id, name, kind, active, owner_id, statement_day, due_day
             FROM accounts ORDER BY id"
        };
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], decode_account)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn account(&self, id: i64) -> Result<Option<Account>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, kind, active, owner_id, statement_day, due_day
                 FROM accounts WHERE id=?1",
                params![id],
                decode_account,
            )
            .optional()?)
    }

    fn budget_amounts(&self, scope: BudgetScope, month: &str) -> Result<HashMap<i64, Decimal>> {
        let sql = format!(
            "SELECT {}, amount FROM {} WHERE month=?1",
            scope.column(),
            scope.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![month])?;
        let mut out = HashMap::new();
        while let Some(r) = rows.next()? {
            let id: i64 = r.get(0)?;
            let raw: Value = r.get(1)?;
            match value_to_decimal(&raw) {
                Some(amount) => {
                    out.insert(id, amount);
                }
                None => warn!(id, month, "unreadable budget amount, ignoring"),
            }
        }
        Ok(out)
    }
}

impl LedgerWriter for SqliteLedger<'_> {
    fn insert_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        let id = insert_row(self.conn, tx)?;
        info!(id, kind = %tx.kind, amount = %tx.amount, "transaction recorded");
        Ok(id)
    }

    fn update_transaction(&self, id: i64, patch: &TxPatch) -> Result<usize> {
        let mut sets = vec!["updated_at = ?".to_string()];
        let mut args: Vec<Value> = vec![Value::Text(now_stamp())];
        if let Some(kind) = patch.kind {
            sets.push("kind = ?".into());
            args.push(Value::Text(kind.as_str().into()));
        }
        if let Some(amount) = patch.amount {
            sets.push("amount = ?".into());
            args.push(Value::Text(amount.to_string()));
        }
        if let Some(person_id) = patch.person_id {
            sets.push("person_id = ?".into());
            args.push(Value::Integer(person_id));
        }
        if let Some(category_id) = patch.category_id {
            sets.push("category_id = ?".into());
            args.push(Value::Integer(category_id));
        }
        if let Some(date) = patch.date {
            sets.push("date = ?".into());
            args.push(Value::Text(date.to_string()));
        }
        if let Some(note) = &patch.note {
            sets.push("note = ?".into());
            args.push(Value::Text(note.clone()));
        }
        args.push(Value::Integer(id));
        let sql = format!(
            "UPDATE transactions SET {} WHERE id = ? AND deleted_at IS NULL",
            sets.join(", ")
        );
        Ok(self.conn.execute(&sql, params_from_iter(args))?)
    }

    fn soft_delete_transaction(&self, id: i64) -> Result<usize> {
        let stamp = now_stamp();
        let n = self.conn.execute(
            "UPDATE transactions SET deleted_at=?1, updated_at=?1 WHERE id=?2 AND deleted_at IS NULL",
            params![stamp, id],
        )?;
        info!(id, modified = n, "transaction soft-deleted");
        Ok(n)
    }

    fn update_transfer_group(&self, group_id: &str, patch: &TransferPatch) -> Result<usize> {
        let mut sets = vec!["updated_at = ?".to_string()];
        let mut args: Vec<Value> = vec![Value::Text(now_stamp())];
        if let Some(amount) = patch.amount {
            sets.push("amount = ?".into());
            args.push(Value::Text(amount.to_string()));
        }
        if let Some(date) = patch.date {
            sets.push("date = ?".into());
            args.push(Value::Text(date.to_string()));
        }
        if let Some(note) = &patch.note {
            sets.push("note = ?".into());
            args.push(Value::Text(note.clone()));
        }
        args.push(Value::Text(group_id.to_string()));
        let sql = format!(
            "UPDATE transactions SET {} WHERE transfer_group_id = ? AND deleted_at IS NULL",
            sets.join(", ")
        );
        let n = self.conn.execute(&sql, params_from_iter(args))?;
        info!(group_id, modified = n, "transfer legs updated");
        Ok(n)
    }

    fn soft_delete_transfer_group(&self, group_id: &str) -> Result<usize> {
        let stamp = now_stamp();
        let n = self.conn.execute(
            "UPDATE transactions SET deleted_at=?1, updated_at=?1
             WHERE transfer_group_id=?2 AND deleted_at IS NULL",
            params![stamp, group_id],
        )?;
        info!(group_id, modified = n, "transfer legs soft-deleted");
        Ok(n)
    }

    fn upsert_budget(
        &self,
        scope: BudgetScope,
        month: &str,
        dimension_id: i64,
        amount: Decimal,
    ) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table}(month, {col}, amount) VALUES (?1, ?2, ?3)
             ON CONFLICT(month, {col}) DO UPDATE SET amount=excluded.amount,
                                                     updated_at=datetime('now')",
            table = scope.table(),
            col = scope.column()
        );
        self.conn
            .execute(&sql, params![month, dimension_id, amount.to_string()])?;
        info!(?scope, month, dimension_id, %amount, "budget saved");
        Ok(())
    }

    fn delete_budget(&self, scope: BudgetScope, month: &str, dimension_id: i64) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE month=?1 AND {}=?2",
            scope.table(),
            scope.column()
        );
        let n = self.conn.execute(&sql, params![month, dimension_id])?;
        info!(?scope, month, dimension_id, removed = n, "budget cleared");
        Ok(n)
    }

    /// Both legs commit together or not at all.
    fn insert_transfer_legs(
        &self,
        out_leg: &NewTransaction,
        in_leg: &NewTransaction,
    ) -> Result<(i64, i64)> {
        let tx = self.conn.unchecked_transaction()?;
        let out_id = insert_row(&tx, out_leg)?;
        let in_id = match insert_row(&tx, in_leg) {
            Ok(id) => id,
            Err(err) => {
                warn!(
                    group_id = ?out_leg.transfer_group_id,
                    error = %err,
                    "in-leg insert failed, rolling back transfer"
                );
                return Err(err);
            }
        };
        tx.commit()?;
        info!(group_id = ?out_leg.transfer_group_id, out_id, in_id, "transfer recorded");
        Ok((out_id, in_id))
    }
}
