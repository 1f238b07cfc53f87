// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{arg, json_flags, opt_arg};
use crate::aggregate::NameBook;
use crate::errors::{self, NidoError};
use crate::models::{Dimension, NewTransaction, TransferSide, TxKind, TxPatch};
use crate::periods::{month_or_current, resolve_month, Clock, SystemClock};
use crate::store::{LedgerStore, LedgerWriter, SqliteLedger, TxFilter};
use crate::utils::{currency_label, fmt_money, maybe_print_json, parse_amount, parse_date, pretty_table};

pub const LIST_LIMIT: usize = 200;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let store = SqliteLedger::new(conn);
    match m.subcommand() {
        Some(("add", sub)) => {
            let req = NewTransaction {
                kind: arg(sub, "kind")?.parse()?,
                amount: parse_amount(arg(sub, "amount")?)?,
                date: match opt_arg(sub, "date") {
                    Some(d) => parse_date(d)?,
                    None => SystemClock.today(),
                },
                note: opt_arg(sub, "note").unwrap_or_default().to_string(),
                person_id: Some(store.resolve_ref(Dimension::Person, arg(sub, "person")?)?),
                category_id: Some(store.resolve_ref(Dimension::Category, arg(sub, "category")?)?),
                account_id: store.resolve_opt_ref(Dimension::Account, opt_arg(sub, "account"))?,
                transfer_group_id: None,
                transfer_side: None,
            };
            let id = add_transaction(&store, &req)?;
            println!("Recorded {} #{} on {}", req.kind, id, req.date);
        }
        Some(("list", sub)) => list(&store, sub)?,
        Some(("edit", sub)) => {
            let id = Dimension::Transaction.parse_id(arg(sub, "id")?)?;
            let patch = TxPatch {
                kind: opt_arg(sub, "kind").map(str::parse::<TxKind>).transpose()?,
                amount: opt_arg(sub, "amount").map(parse_amount).transpose()?,
                person_id: store.resolve_opt_ref(Dimension::Person, opt_arg(sub, "person"))?,
                category_id: store.resolve_opt_ref(Dimension::Category, opt_arg(sub, "category"))?,
                date: opt_arg(sub, "date").map(parse_date).transpose()?,
                note: opt_arg(sub, "note").map(str::to_string),
            };
            edit_transaction(&store, id, &patch)?;
            println!("Updated transaction #{}", id);
        }
        Some(("rm", sub)) => {
            let id = Dimension::Transaction.parse_id(arg(sub, "id")?)?;
            remove_transaction(&store, id)?;
            println!("Deleted transaction #{}", id);
        }
        _ => {}
    }
    Ok(())
}

fn check_person<S: LedgerStore + ?Sized>(store: &S, id: i64) -> errors::Result<()> {
    match store.person(id)? {
        Some(p) if p.active => Ok(()),
        Some(p) => Err(NidoError::constraint(format!("Person '{}' is not active", p.name))),
        None => Err(NidoError::not_found(Dimension::Person, id)),
    }
}

fn check_category<S: LedgerStore + ?Sized>(store: &S, id: i64, kind: TxKind) -> errors::Result<()> {
    let category = store
        .category(id)?
        .ok_or_else(|| NidoError::not_found(Dimension::Category, id))?;
    if category.kind.tx_kind() != kind {
        return Err(NidoError::constraint(format!(
            "Category '{}' is {}, not {}",
            category.name,
            category.kind.as_str(),
            kind
        )));
    }
    Ok(())
}

fn check_account<S: LedgerStore + ?Sized>(store: &S, id: i64) -> errors::Result<()> {
    match store.account(id)? {
        Some(a) if a.active => Ok(()),
        Some(a) => Err(NidoError::constraint(format!("Account '{}' is not active", a.name))),
        None => Err(NidoError::not_found(Dimension::Account, id)),
    }
}

/// Records one income or expense row after reference checks.
pub fn add_transaction<S>(store: &S, req: &NewTransaction) -> errors::Result<i64>
where
    S: LedgerStore + LedgerWriter + ?Sized,
{
    if req.kind == TxKind::Transfer {
        return Err(NidoError::constraint("Use the transfer command to move money between accounts"));
    }
    if req.amount <= Decimal::ZERO {
        return Err(NidoError::constraint("Amount must be greater than zero"));
    }
    let person_id = req
        .person_id
        .ok_or_else(|| NidoError::constraint("A person is required"))?;
    let category_id = req
        .category_id
        .ok_or_else(|| NidoError::constraint("A category is required"))?;
    check_person(store, person_id)?;
    check_category(store, category_id, req.kind)?;
    if let Some(account_id) = req.account_id {
        check_account(store, account_id)?;
    }
    let row = NewTransaction {
        note: req.note.trim().to_string(),
        transfer_group_id: None,
        transfer_side: None,
        ..req.clone()
    };
    store.insert_transaction(&row)
}

pub fn edit_transaction<S>(store: &S, id: i64, patch: &TxPatch) -> errors::Result<usize>
where
    S: LedgerStore + LedgerWriter + ?Sized,
{
    let current = store
        .transaction(id)?
        .ok_or_else(|| NidoError::not_found(Dimension::Transaction, id))?;
    if current.kind == TxKind::Transfer {
        return Err(NidoError::constraint(
            "Transfer legs are edited as a pair with the transfer command",
        ));
    }
    if patch.kind == Some(TxKind::Transfer) {
        return Err(NidoError::constraint("A transaction cannot become a transfer"));
    }
    if let Some(amount) = patch.amount {
        if amount <= Decimal::ZERO {
            return Err(NidoError::constraint("Amount must be greater than zero"));
        }
    }
    if let Some(person_id) = patch.person_id {
        check_person(store, person_id)?;
    }
    let kind = patch.kind.unwrap_or(current.kind);
    if let Some(category_id) = patch.category_id.or(current.category_id) {
        check_category(store, category_id, kind)?;
    }
    let patch = TxPatch {
        note: patch.note.as_ref().map(|n| n.trim().to_string()),
        ..patch.clone()
    };
    store.update_transaction(id, &patch)
}

pub fn remove_transaction<S>(store: &S, id: i64) -> errors::Result<()>
where
    S: LedgerStore + LedgerWriter + ?Sized,
{
    let current = store
        .transaction(id)?
        .ok_or_else(|| NidoError::not_found(Dimension::Transaction, id))?;
    if current.kind == TxKind::Transfer {
        return Err(NidoError::constraint(
            "Transfer legs are deleted as a pair with the transfer command",
        ));
    }
    store.soft_delete_transaction(id)?;
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TxListRow {
    pub id: i64,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub amount: Decimal,
    pub person: String,
    pub category: String,
    pub account: String,
    pub note: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_side: Option<TransferSide>,
}

/// Newest first within the month.
pub fn list_rows(
    store: &SqliteLedger<'_>,
    month: &str,
    filter: TxFilter,
    limit: usize,
) -> errors::Result<Vec<TxListRow>> {
    let filter = filter.in_range(resolve_month(month)?);
    let mut txs = store.transactions(&filter)?;
    txs.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    txs.truncate(limit);
    let names = NameBook::new(
        &store.people(false)?,
        &store.categories()?,
        &store.accounts(false)?,
    );
    Ok(txs
        .into_iter()
        .map(|t| TxListRow {
            person: if t.person_id.is_some() { names.person(t.person_id) } else { String::new() },
            category: if t.category_id.is_some() { names.category(t.category_id) } else { String::new() },
            account: names.account_opt(t.account_id).unwrap_or_default(),
            id: t.id,
            date: t.date,
            kind: t.kind,
            amount: t.amount,
            note: t.note,
            transfer_group_id: t.transfer_group_id,
            transfer_side: t.transfer_side,
        })
        .collect())
}

fn list(store: &SqliteLedger<'_>, sub: &clap::ArgMatches) -> Result<()> {
    let month = month_or_current(opt_arg(sub, "month"), &SystemClock)?;
    let filter = TxFilter::new()
        .person(store.resolve_opt_ref(Dimension::Person, opt_arg(sub, "person"))?)
        .category(store.resolve_opt_ref(Dimension::Category, opt_arg(sub, "category"))?)
        .account(store.resolve_opt_ref(Dimension::Account, opt_arg(sub, "account"))?)
        .note_contains(opt_arg(sub, "search"));
    let limit = sub
        .get_one::<usize>("limit")
        .copied()
        .unwrap_or(LIST_LIMIT)
        .min(LIST_LIMIT);
    let rows = list_rows(store, &month, filter, limit)?;
    let (json, jsonl) = json_flags(sub);
    if maybe_print_json(json, jsonl, &rows)? {
        return Ok(());
    }
    let ccy = currency_label(store.conn())?;
    let data = rows
        .iter()
        .map(|r| {
            let side = r.transfer_side.map(|s| format!(" ({})", s.as_str())).unwrap_or_default();
            vec![
                r.id.to_string(),
                r.date.to_string(),
                format!("{}{}", r.kind, side),
                fmt_money(&r.amount, &ccy),
                r.person.clone(),
                r.category.clone(),
                r.account.clone(),
                r.note.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Date", "Type", "Amount", "Person", "Category", "Account", "Note"],
            data
        )
    );
    Ok(())
}
