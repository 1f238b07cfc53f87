// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;

use super::{arg, json_flags, opt_arg};
use crate::budgets::{set_budget, BudgetChange, BudgetScope, BudgetSheet};
use crate::periods::SystemClock;
use crate::reports::Reports;
use crate::store::SqliteLedger;
use crate::utils::{currency_label, fmt_money, maybe_print_json, parse_decimal, pretty_table};

/// Shared by `budget` (per category) and `person-budget`.
pub fn handle(conn: &Connection, m: &clap::ArgMatches, scope: BudgetScope) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set(conn, sub, scope)?,
        Some(("report", sub)) => report(conn, sub, scope)?,
        _ => {}
    }
    Ok(())
}

fn set(conn: &Connection, sub: &clap::ArgMatches, scope: BudgetScope) -> Result<()> {
    let store = SqliteLedger::new(conn);
    let month = arg(sub, "month")?;
    let target_arg = match scope {
        BudgetScope::Category => "category",
        BudgetScope::Person => "person",
    };
    let target = arg(sub, target_arg)?;
    let id = store.resolve_ref(scope.dimension(), target)?;
    let amount = parse_decimal(arg(sub, "amount")?)?;
    match set_budget(&store, scope, month, id, amount)? {
        BudgetChange::Saved => {
            let ccy = currency_label(conn)?;
            println!(
                "Budget set for {} / {} = {}",
                month,
                target,
                fmt_money(&amount, &ccy)
            );
        }
        BudgetChange::Cleared => println!("Budget cleared for {} / {}", month, target),
    }
    Ok(())
}

fn report(conn: &Connection, sub: &clap::ArgMatches, scope: BudgetScope) -> Result<()> {
    let store = SqliteLedger::new(conn);
    let reports = Reports::new(&store, &SystemClock);
    let month = opt_arg(sub, "month");
    let sheet = match scope {
        BudgetScope::Category => reports.category_budgets(month)?,
        BudgetScope::Person => reports.person_budgets(month)?,
    };
    let (json, jsonl) = json_flags(sub);
    if maybe_print_json(json, jsonl, &sheet)? {
        return Ok(());
    }
    print_sheet(&sheet, &currency_label(conn)?);
    Ok(())
}

pub fn print_sheet(sheet: &BudgetSheet, ccy: &str) {
    let label = match sheet.scope {
        BudgetScope::Category => "Category",
        BudgetScope::Person => "Person",
    };
    let mut rows: Vec<Vec<String>> = sheet
        .rows
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                fmt_money(&r.budget, ccy),
                fmt_money(&r.spent, ccy),
                fmt_money(&r.remaining, ccy),
                format!("{}%", r.percent),
                r.status.as_str().to_string(),
            ]
        })
        .collect();
    rows.push(vec![
        "TOTAL".into(),
        fmt_money(&sheet.totals.budget, ccy),
        fmt_money(&sheet.totals.spent, ccy),
        fmt_money(&sheet.totals.remaining, ccy),
        format!("{}%", sheet.totals.percent),
        String::new(),
    ]);
    println!("Budgets for {}", sheet.month);
    println!(
        "{}",
        pretty_table(&[label, "Budget", "Spent", "Remaining", "Used", "Status"], rows)
    );
}
