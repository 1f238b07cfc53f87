// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use super::arg;
use crate::aggregate::{monthly_series, NameBook};
use crate::errors;
use crate::periods::{parse_month, parse_year, resolve_month, resolve_year, year_months};
use crate::store::{LedgerStore, SqliteLedger, TxFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => anyhow::bail!("Unknown format: {} (use csv|json)", other),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MonthExportRow {
    pub id: i64,
    pub month: String,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: String,
    pub amount: Decimal,
    pub person: String,
    pub category: String,
    pub note: String,
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("month", sub)) => {
            let month = arg(sub, "month")?;
            let out = arg(sub, "out")?;
            let fmt = ExportFormat::parse(arg(sub, "format")?)?;
            let n = export_month(conn, month, fmt, Path::new(out))?;
            println!("Exported {} transactions for {} to {}", n, month, out);
        }
        Some(("year", sub)) => {
            let year = arg(sub, "year")?;
            let out = arg(sub, "out")?;
            let fmt = ExportFormat::parse(arg(sub, "format")?)?;
            export_year(conn, year, fmt, Path::new(out))?;
            println!("Exported {} monthly balance to {}", year, out);
        }
        _ => {}
    }
    Ok(())
}

/// Every live row in the month, ordered by date, type, then amount descending.
pub fn month_rows(conn: &Connection, month: &str) -> errors::Result<Vec<MonthExportRow>> {
    let month = parse_month(month)?;
    let store = SqliteLedger::new(conn);
    let mut txs = store.transactions(&TxFilter::new().in_range(resolve_month(&month)?))?;
    txs.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then(a.kind.as_str().cmp(b.kind.as_str()))
            .then(b.amount.cmp(&a.amount))
            .then(a.id.cmp(&b.id))
    });
    let names = NameBook::new(&store.people(false)?, &store.categories()?, &[]);
    Ok(txs
        .into_iter()
        .map(|t| MonthExportRow {
            id: t.id,
            month: month.clone(),
            date: t.date,
            kind: t.kind.as_str().to_string(),
            amount: t.amount,
            person: t.person_id.map(|_| names.person(t.person_id)).unwrap_or_default(),
            category: t
                .category_id
                .map(|_| names.category(t.category_id))
                .unwrap_or_default(),
            note: t.note,
        })
        .collect())
}

pub fn export_month(conn: &Connection, month: &str, fmt: ExportFormat, out: &Path) -> errors::Result<usize> {
    let rows = month_rows(conn, month)?;
    match fmt {
        ExportFormat::Csv => {
            let mut wtr = csv::Writer::from_path(out)?;
            for row in &rows {
                wtr.serialize(row)?;
            }
            if rows.is_empty() {
                wtr.write_record([
                    "id", "month", "date", "type", "amount", "person", "category", "note",
                ])?;
            }
            wtr.flush()?;
        }
        ExportFormat::Json => std::fs::write(out, serde_json::to_string_pretty(&rows)?)?,
    }
    info!(month, rows = rows.len(), path = %out.display(), "month exported");
    Ok(rows.len())
}

/// Twelve rows of `month,income,expense,balance`.
pub fn export_year(conn: &Connection, year: &str, fmt: ExportFormat, out: &Path) -> errors::Result<()> {
    let y = parse_year(year)?;
    let store = SqliteLedger::new(conn);
    let txs = store.transactions(&TxFilter::new().in_range(resolve_year(year)?).flows())?;
    let series = monthly_series(&txs, &year_months(y));
    match fmt {
        ExportFormat::Csv => {
            let mut wtr = csv::Writer::from_path(out)?;
            for row in &series {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        ExportFormat::Json => std::fs::write(out, serde_json::to_string_pretty(&series)?)?,
    }
    info!(year = y, path = %out.display(), "year exported");
    Ok(())
}
