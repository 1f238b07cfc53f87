// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::{arg, json_flags, opt_arg};
use crate::errors::NidoError;
use crate::models::{parse_group_id, Dimension, TransferPatch};
use crate::periods::{Clock, SystemClock};
use crate::reports::Reports;
use crate::store::SqliteLedger;
use crate::transfers::{create_transfer_pair, delete_transfer_pair, edit_transfer_pair, NewTransfer};
use crate::utils::{currency_label, fmt_money, maybe_print_json, parse_amount, parse_date, pretty_table};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let store = SqliteLedger::new(conn);
    let clock = SystemClock;
    let reports = Reports::new(&store, &clock);
    match m.subcommand() {
        Some(("add", sub)) => {
            let req = NewTransfer {
                from_account_id: store.resolve_ref(Dimension::Account, arg(sub, "from")?)?,
                to_account_id: store.resolve_ref(Dimension::Account, arg(sub, "to")?)?,
                amount: parse_amount(arg(sub, "amount")?)?,
                date: match opt_arg(sub, "date") {
                    Some(d) => parse_date(d)?,
                    None => clock.today(),
                },
                note: opt_arg(sub, "note").unwrap_or_default().to_string(),
            };
            let created = create_transfer_pair(&store, &req).context("Transfer not recorded")?;
            println!(
                "Transfer {} recorded (out #{}, in #{})",
                created.group_id, created.out_id, created.in_id
            );
        }
        Some(("list", sub)) => {
            let list = reports.transfers(opt_arg(sub, "month"))?;
            let (json, jsonl) = json_flags(sub);
            if maybe_print_json(json, jsonl, &list.items)? {
                return Ok(());
            }
            let ccy = currency_label(conn)?;
            let rows = list
                .items
                .iter()
                .map(|t| {
                    vec![
                        t.date.to_string(),
                        t.from_account.clone(),
                        t.to_account.clone(),
                        fmt_money(&t.amount, &ccy),
                        t.note.clone(),
                        t.group_id.clone(),
                    ]
                })
                .collect();
            println!("Transfers for {}", list.month);
            println!(
                "{}",
                pretty_table(&["Date", "From", "To", "Amount", "Note", "Group"], rows)
            );
        }
        Some(("show", sub)) => {
            let group = parse_group_id(arg(sub, "group")?)?;
            let view = reports.transfer_details(&group)?;
            let (json, jsonl) = json_flags(sub);
            if maybe_print_json(json, jsonl, &view)? {
                return Ok(());
            }
            let ccy = currency_label(conn)?;
            let leg = |id: Option<i64>| id.map(|i| format!("#{}", i)).unwrap_or_else(|| "missing".into());
            let rows = vec![
                vec!["Group".to_string(), view.group_id.clone()],
                vec!["Date".to_string(), view.date.to_string()],
                vec!["Amount".to_string(), fmt_money(&view.amount, &ccy)],
                vec!["From".to_string(), format!("{} ({})", view.from_account, leg(view.out_id))],
                vec!["To".to_string(), format!("{} ({})", view.to_account, leg(view.in_id))],
                vec!["Note".to_string(), view.note.clone()],
            ];
            println!("{}", pretty_table(&["Field", "Value"], rows));
        }
        Some(("edit", sub)) => {
            let group = parse_group_id(arg(sub, "group")?)?;
            let patch = TransferPatch {
                amount: opt_arg(sub, "amount").map(parse_amount).transpose()?,
                date: opt_arg(sub, "date").map(parse_date).transpose()?,
                note: opt_arg(sub, "note").map(str::to_string),
            };
            let n = edit_transfer_pair(&store, &group, &patch)?;
            if n == 0 {
                return Err(NidoError::not_found(Dimension::TransferGroup, group).into());
            }
            println!("Updated {} leg(s) of transfer {}", n, group);
        }
        Some(("rm", sub)) => {
            let group = parse_group_id(arg(sub, "group")?)?;
            let n = delete_transfer_pair(&store, &group)?;
            if n == 0 {
                return Err(NidoError::not_found(Dimension::TransferGroup, group).into());
            }
            println!("Deleted {} leg(s) of transfer {}", n, group);
        }
        _ => {}
    }
    Ok(())
}
