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
use crate::models::{AccountKind, CreditTerms, Dimension};
use crate::store::{LedgerStore, SqliteLedger};
use crate::utils::{maybe_print_json, normalize_name, pretty_table};

pub const CREDIT_DAY_RANGE: std::ops::RangeInclusive<u32> = 1..=28;

pub struct NewAccount<'a> {
    pub name: &'a str,
    pub kind: AccountKind,
    pub owner_id: i64,
    pub statement_day: Option<u32>,
    pub due_day: Option<u32>,
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    let store = SqliteLedger::new(conn);
    match m.subcommand() {
        Some(("add", sub)) => {
            let owner_id = store.resolve_ref(Dimension::Person, arg(sub, "owner")?)?;
            let req = NewAccount {
                name: arg(sub, "name")?,
                kind: arg(sub, "kind")?.parse()?,
                owner_id,
                statement_day: sub.get_one::<u32>("statement-day").copied(),
                due_day: sub.get_one::<u32>("due-day").copied(),
            };
            let id = add_account(conn, &req)?;
            println!("Added {} account #{}", req.kind.as_str(), id);
        }
        Some(("list", sub)) => {
            let accounts = store.accounts(!sub.get_flag("all"))?;
            let (json, jsonl) = json_flags(sub);
            if maybe_print_json(json, jsonl, &accounts)? {
                return Ok(());
            }
            let people = store.people(false)?;
            let rows = accounts
                .iter()
                .map(|a| {
                    let owner = a
                        .owner_id
                        .and_then(|id| people.iter().find(|p| p.id == id))
                        .map(|p| p.name.clone())
                        .unwrap_or_default();
                    let terms = a
                        .credit_terms
                        .map(|t| format!("closes {} / due {}", t.statement_day, t.due_day))
                        .unwrap_or_default();
                    vec![
                        a.id.to_string(),
                        a.name.clone(),
                        a.kind.as_str().to_string(),
                        owner,
                        terms,
                        if a.active { "yes" } else { "no" }.to_string(),
                    ]
                })
                .collect();
            println!(
                "{}",
                pretty_table(&["ID", "Name", "Kind", "Owner", "Credit", "Active"], rows)
            );
        }
        Some(("deactivate", sub)) => {
            let id = store.resolve_ref(Dimension::Account, arg(sub, "account")?)?;
            let n = conn.execute("UPDATE accounts SET active=0 WHERE id=?1", params![id])?;
            if n == 0 {
                return Err(NidoError::not_found(Dimension::Account, id).into());
            }
            info!(id, "account deactivated");
            println!("Deactivated account #{}", id);
        }
        _ => {}
    }
    Ok(())
}

fn credit_terms(req: &NewAccount<'_>) -> errors::Result<Option<CreditTerms>> {
    if req.kind != AccountKind::Credit {
        return Ok(None);
    }
    match (req.statement_day, req.due_day) {
        (Some(statement_day), Some(due_day))
            if CREDIT_DAY_RANGE.contains(&statement_day) && CREDIT_DAY_RANGE.contains(&due_day) =>
        {
            Ok(Some(CreditTerms {
                statement_day,
                due_day,
            }))
        }
        _ => Err(NidoError::constraint(
            "Credit accounts need --statement-day and --due-day between 1 and 28",
        )),
    }
}

pub fn add_account(conn: &Connection, req: &NewAccount<'_>) -> errors::Result<i64> {
    let name = normalize_name(req.name);
    if name.is_empty() {
        return Err(NidoError::constraint("Name cannot be empty"));
    }
    let store = SqliteLedger::new(conn);
    match store.person(req.owner_id)? {
        Some(p) if p.active => {}
        Some(p) => {
            return Err(NidoError::constraint(format!(
                "Owner '{}' is not active",
                p.name
            )));
        }
        None => return Err(NidoError::not_found(Dimension::Person, req.owner_id)),
    }
    let terms = credit_terms(req)?;
    let dupes: i64 = conn.query_row(
        "SELECT COUNT(*) FROM accounts WHERE active=1 AND kind=?1 AND LOWER(name)=LOWER(?2)",
        params![req.kind.as_str(), name],
        |r| r.get(0),
    )?;
    if dupes > 0 {
        return Err(NidoError::constraint(format!(
            "An active {} account named '{}' already exists",
            req.kind.as_str(),
            name
        )));
    }
    conn.execute(
        "INSERT INTO accounts(name, kind, owner_id, statement_day, due_day) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            name,
            req.kind.as_str(),
            req.owner_id,
            terms.map(|t| t.statement_day),
            terms.map(|t| t.due_day),
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, %name, kind = req.kind.as_str(), "account added");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::people::{add_person, deactivate_person};
    use crate::db::init_schema;

    fn conn_with_owner() -> (Connection, i64) {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&mut conn).unwrap();
        let owner = add_person(&conn, "Ana").unwrap();
        (conn, owner)
    }

    fn card(owner_id: i64, statement_day: Option<u32>, due_day: Option<u32>) -> NewAccount<'static> {
        NewAccount {
            name: "Visa",
            kind: AccountKind::Credit,
            owner_id,
            statement_day,
            due_day,
        }
    }

    #[test]
    fn credit_accounts_need_valid_days() {
        let (conn, owner) = conn_with_owner();
        assert!(add_account(&conn, &card(owner, None, Some(10))).is_err());
        assert!(add_account(&conn, &card(owner, Some(29), Some(10))).is_err());
        let id = add_account(&conn, &card(owner, Some(25), Some(10))).unwrap();
        let acct = SqliteLedger::new(&conn).account(id).unwrap().unwrap();
        assert_eq!(acct.credit_terms.map(|t| t.due_day), Some(10));
    }

    #[test]
    fn active_names_are_unique_per_kind() {
        let (conn, owner) = conn_with_owner();
        let cash = |name| NewAccount {
            name,
            kind: AccountKind::Cash,
            owner_id: owner,
            statement_day: None,
            due_day: None,
        };
        add_account(&conn, &cash("Billetera  Ana")).unwrap();
        let err = add_account(&conn, &cash(" billetera ana ")).unwrap_err();
        assert!(matches!(err, NidoError::ConstraintViolation(_)));
    }

    #[test]
    fn inactive_owner_is_rejected() {
        let (conn, owner) = conn_with_owner();
        deactivate_person(&conn, owner).unwrap();
        assert!(matches!(
            add_account(&conn, &card(owner, Some(1), Some(5))),
            Err(NidoError::ConstraintViolation(_))
        ));
    }
}
