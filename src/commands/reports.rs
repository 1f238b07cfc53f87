// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;

use super::{arg, json_flags, opt_arg};
use crate::aggregate::{CategorySpend, ExpenseQuery, PersonTotals, Totals};
use crate::models::Dimension;
use crate::periods::SystemClock;
use crate::reports::Reports;
use crate::store::SqliteLedger;
use crate::utils::{currency_label, fmt_money, maybe_print_json, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let store = SqliteLedger::new(conn);
    let reports = Reports::new(&store, &SystemClock);
    let ccy = currency_label(conn)?;
    let person = |sub: &clap::ArgMatches| store.resolve_opt_ref(Dimension::Person, opt_arg(sub, "person"));

    match m.subcommand() {
        Some(("summary", sub)) => {
            let r = reports.monthly_summary(opt_arg(sub, "month"))?;
            if !emit_json(sub, &r)? {
                println!("Summary for {}", r.month);
                print_totals(&r.summary.totals, &ccy);
                print_people(&r.summary.by_person, &ccy);
            }
        }
        Some(("monthly", sub)) => {
            let r = reports.monthly_report(opt_arg(sub, "month"), person(sub)?)?;
            if !emit_json(sub, &r)? {
                println!("Report for {}", r.month);
                print_totals(&r.totals, &ccy);
                print_categories(&r.top_categories, &ccy);
            }
        }
        Some(("daily", sub)) => {
            let r = reports.monthly_report(opt_arg(sub, "month"), person(sub)?)?;
            if !emit_json(sub, &r.daily)? {
                let rows = r
                    .daily
                    .iter()
                    .map(|d| {
                        vec![
                            d.day.to_string(),
                            fmt_money(&d.income, &ccy),
                            fmt_money(&d.expense, &ccy),
                            fmt_money(&d.balance, &ccy),
                        ]
                    })
                    .collect();
                println!("{}", pretty_table(&["Day", "Income", "Expense", "Balance"], rows));
            }
        }
        Some(("accounts", sub)) => {
            let r = reports.accounts_summary(opt_arg(sub, "month"))?;
            if !emit_json(sub, &r)? {
                let rows = r
                    .accounts
                    .iter()
                    .map(|a| {
                        let recent = a
                            .recent_tx
                            .iter()
                            .map(|t| format!("{} {} {}", t.date, t.kind, fmt_money(&t.amount, &ccy)))
                            .collect::<Vec<_>>()
                            .join("\n");
                        vec![
                            a.name.clone(),
                            fmt_money(&a.income, &ccy),
                            fmt_money(&a.expense, &ccy),
                            fmt_money(&a.net, &ccy),
                            a.count.to_string(),
                            recent,
                        ]
                    })
                    .collect();
                println!("Accounts for {}", r.month);
                println!(
                    "{}",
                    pretty_table(&["Account", "Income", "Expense", "Net", "Rows", "Recent"], rows)
                );
            }
        }
        Some(("year", sub)) => {
            let r = reports.yearly_balance(opt_arg(sub, "year"), person(sub)?)?;
            if !emit_json(sub, &r)? {
                let rows = r
                    .by_month
                    .iter()
                    .map(|m| {
                        vec![
                            m.month.clone(),
                            fmt_money(&m.income, &ccy),
                            fmt_money(&m.expense, &ccy),
                            fmt_money(&m.balance, &ccy),
                        ]
                    })
                    .collect();
                println!("Year {}", r.year);
                println!("{}", pretty_table(&["Month", "Income", "Expense", "Balance"], rows));
                print_totals(&r.totals, &ccy);
                print_people(&r.by_person, &ccy);
            }
        }
        Some(("trend", sub)) => {
            let category = store.resolve_ref(Dimension::Category, arg(sub, "category")?)?;
            let months = sub.get_one::<u32>("months").copied();
            let r = reports.category_trend(category, opt_arg(sub, "start"), months, person(sub)?)?;
            if !emit_json(sub, &r)? {
                let rows = r
                    .series
                    .iter()
                    .map(|p| vec![p.month.clone(), fmt_money(&p.spent, &ccy)])
                    .collect();
                println!("{} from {} ({} months)", r.category_name, r.start_month, r.months);
                println!("{}", pretty_table(&["Month", "Spent"], rows));
            }
        }
        Some(("compare", sub)) => {
            let r = reports.month_comparison(arg(sub, "a")?, arg(sub, "b")?, person(sub)?)?;
            if !emit_json(sub, &r)? {
                for block in [&r.a, &r.b] {
                    println!("{}", block.month);
                    print_totals(&block.totals, &ccy);
                    print_categories(&block.top_categories, &ccy);
                }
            }
        }
        Some(("profile", sub)) => {
            let id = store.resolve_ref(Dimension::Person, arg(sub, "person")?)?;
            let r = reports.person_profile(id, opt_arg(sub, "month"))?;
            if !emit_json(sub, &r)? {
                let c = &r.change_vs_prev_month;
                let rows = vec![
                    vec![
                        "Income".to_string(),
                        fmt_money(&r.totals_month.income, &ccy),
                        fmt_money(&r.totals_prev_month.income, &ccy),
                        c.income_pct.to_string(),
                    ],
                    vec![
                        "Expense".to_string(),
                        fmt_money(&r.totals_month.expense, &ccy),
                        fmt_money(&r.totals_prev_month.expense, &ccy),
                        c.expense_pct.to_string(),
                    ],
                    vec![
                        "Balance".to_string(),
                        fmt_money(&r.totals_month.balance, &ccy),
                        fmt_money(&r.totals_prev_month.balance, &ccy),
                        c.balance_pct.to_string(),
                    ],
                ];
                println!("{} - {} vs {}", r.person_name, r.month, r.prev_month);
                println!("{}", pretty_table(&["", "Month", "Previous", "Change"], rows));
                println!("All time:");
                print_totals(&r.totals_all_time, &ccy);
                if let Some(d) = r.last_tx_date {
                    println!("Last transaction: {}", d);
                }
                let top = r
                    .top_categories_month
                    .iter()
                    .map(|t| {
                        vec![t.category_name.clone(), t.kind.to_string(), fmt_money(&t.amount, &ccy)]
                    })
                    .collect();
                println!("{}", pretty_table(&["Category", "Type", "Amount"], top));
            }
        }
        Some(("top-expenses", sub)) => {
            let query = ExpenseQuery {
                text: opt_arg(sub, "search").map(str::to_string),
                person_id: person(sub)?,
                category_id: store.resolve_opt_ref(Dimension::Category, opt_arg(sub, "category"))?,
                limit: sub.get_one::<usize>("limit").copied(),
            };
            let rows = reports.top_expenses(opt_arg(sub, "month"), &query)?;
            if !emit_json(sub, &rows)? {
                let data = rows
                    .iter()
                    .map(|e| {
                        vec![
                            e.date.to_string(),
                            fmt_money(&e.amount, &ccy),
                            e.person_name.clone(),
                            e.category_name.clone(),
                            e.note.clone(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Date", "Amount", "Person", "Category", "Note"], data)
                );
            }
        }
        Some(("dashboard", sub)) => {
            let r = reports.dashboard(opt_arg(sub, "month"))?;
            if !emit_json(sub, &r)? {
                println!("Dashboard for {}", r.month);
                print_totals(&r.summary.totals, &ccy);
                print_people(&r.summary.by_person, &ccy);
                let alerts = r
                    .category_alerts
                    .over
                    .iter()
                    .chain(&r.category_alerts.warn)
                    .chain(&r.person_alerts.over)
                    .chain(&r.person_alerts.warn)
                    .map(|row| {
                        vec![
                            row.name.clone(),
                            row.status.as_str().to_string(),
                            format!("{}%", row.percent),
                            fmt_money(&row.remaining, &ccy),
                        ]
                    })
                    .collect::<Vec<_>>();
                if alerts.is_empty() {
                    println!("No budget alerts");
                } else {
                    println!(
                        "{}",
                        pretty_table(&["Budget", "Status", "Used", "Remaining"], alerts)
                    );
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn emit_json<T: serde::Serialize>(sub: &clap::ArgMatches, v: &T) -> Result<bool> {
    let (json, jsonl) = json_flags(sub);
    maybe_print_json(json, jsonl, v)
}

fn print_totals(t: &Totals, ccy: &str) {
    println!(
        "{}",
        pretty_table(
            &["Income", "Expense", "Balance"],
            vec![vec![
                fmt_money(&t.income, ccy),
                fmt_money(&t.expense, ccy),
                fmt_money(&t.balance, ccy),
            ]],
        )
    );
}

fn print_people(rows: &[PersonTotals], ccy: &str) {
    if rows.is_empty() {
        return;
    }
    let data = rows
        .iter()
        .map(|p| {
            vec![
                p.person_name.clone(),
                fmt_money(&p.income, ccy),
                fmt_money(&p.expense, ccy),
                fmt_money(&p.balance, ccy),
            ]
        })
        .collect();
    println!("{}", pretty_table(&["Person", "Income", "Expense", "Balance"], data));
}

fn print_categories(rows: &[CategorySpend], ccy: &str) {
    if rows.is_empty() {
        return;
    }
    let data = rows
        .iter()
        .map(|c| vec![c.name.clone(), fmt_money(&c.spent, ccy)])
        .collect();
    println!("{}", pretty_table(&["Category", "Spent"], data));
}
