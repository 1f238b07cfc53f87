// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use nido::aggregate::{pct_change, AccountKey, ExpenseQuery, PctChange};
use nido::commands::accounts::{add_account, NewAccount};
use nido::commands::categories::add_category;
use nido::commands::people::add_person;
use nido::commands::transactions::{add_transaction, edit_transaction, list_rows, remove_transaction};
use nido::db::init_schema;
use nido::errors::NidoError;
use nido::models::{AccountKind, CategoryKind, NewTransaction, TransferPatch, TxKind, TxPatch};
use nido::periods::FixedClock;
use nido::reports::Reports;
use nido::store::{LedgerStore, SqliteLedger, TxFilter};
use nido::transfers::{create_transfer_pair, delete_transfer_pair, edit_transfer_pair, NewTransfer};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct Fixture {
    conn: Connection,
    ana: i64,
    sueldo: i64,
    ocio: i64,
    banco: i64,
    efectivo: i64,
}

fn setup() -> Fixture {
    let mut conn = Connection::open_in_memory().unwrap();
    init_schema(&mut conn).unwrap();
    let ana = add_person(&conn, "Ana").unwrap();
    let sueldo = add_category(&conn, "Sueldo", CategoryKind::Income).unwrap();
    let ocio = add_category(&conn, "Ocio", CategoryKind::Expense).unwrap();
    let account = |name, kind| {
        add_account(
            &conn,
            &NewAccount {
                name,
                kind,
                owner_id: ana,
                statement_day: None,
                due_day: None,
            },
        )
        .unwrap()
    };
    let banco = account("Banco", AccountKind::Bank);
    let efectivo = account("Efectivo", AccountKind::Cash);
    Fixture {
        conn,
        ana,
        sueldo,
        ocio,
        banco,
        efectivo,
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn flow(f: &Fixture, kind: TxKind, amount: Decimal, on: NaiveDate, account: Option<i64>) -> i64 {
    let category = match kind {
        TxKind::Income => f.sueldo,
        _ => f.ocio,
    };
    add_transaction(
        &SqliteLedger::new(&f.conn),
        &NewTransaction {
            kind,
            amount,
            date: on,
            note: "  cine  ".into(),
            person_id: Some(f.ana),
            category_id: Some(category),
            account_id: account,
            transfer_group_id: None,
            transfer_side: None,
        },
    )
    .unwrap()
}

#[test]
fn transfers_never_move_totals_and_vanish_when_deleted() {
    let f = setup();
    flow(&f, TxKind::Income, dec!(5000), date(2025, 1, 1), Some(f.banco));
    let store = SqliteLedger::new(&f.conn);
    let created = create_transfer_pair(
        &store,
        &NewTransfer {
            from_account_id: f.banco,
            to_account_id: f.efectivo,
            amount: dec!(1000),
            date: date(2025, 1, 5),
            note: "retiro".into(),
        },
    )
    .unwrap();

    let clock = FixedClock::on(date(2025, 1, 31));
    let reports = Reports::new(&store, &clock);
    let totals = reports.monthly_summary(None).unwrap().summary.totals;
    assert_eq!(totals.income, dec!(5000));
    assert_eq!(totals.expense, Decimal::ZERO);

    let accounts = reports.accounts_summary(None).unwrap().accounts;
    assert_eq!(accounts[0].account_id, AccountKey::Unassigned);
    let banco = accounts
        .iter()
        .find(|a| a.account_id == AccountKey::Account(f.banco))
        .unwrap();
    assert_eq!(banco.count, 2);
    assert_eq!(banco.income, dec!(5000));
    assert_eq!(banco.recent_tx[0].kind, TxKind::Transfer);
    let efectivo = accounts
        .iter()
        .find(|a| a.account_id == AccountKey::Account(f.efectivo))
        .unwrap();
    assert_eq!(efectivo.count, 1);
    assert_eq!(efectivo.net, Decimal::ZERO);

    let view = reports.transfer_details(&created.group_id).unwrap();
    assert_eq!(view.from_account, "Banco");
    assert_eq!(view.to_account, "Efectivo");
    assert_eq!(view.out_id, Some(created.out_id));
    assert_eq!(reports.transfers(None).unwrap().items.len(), 1);

    assert_eq!(delete_transfer_pair(&store, &created.group_id).unwrap(), 2);
    let accounts = reports.accounts_summary(None).unwrap().accounts;
    let efectivo = accounts
        .iter()
        .find(|a| a.account_id == AccountKey::Account(f.efectivo))
        .unwrap();
    assert_eq!(efectivo.count, 0);
    assert!(reports.transfers(None).unwrap().items.is_empty());
    assert!(matches!(
        reports.transfer_details(&created.group_id),
        Err(NidoError::DimensionNotFound { .. })
    ));
}

#[test]
fn transfers_need_two_distinct_active_accounts() {
    let f = setup();
    let store = SqliteLedger::new(&f.conn);
    let same = NewTransfer {
        from_account_id: f.banco,
        to_account_id: f.banco,
        amount: dec!(10),
        date: date(2025, 1, 5),
        note: String::new(),
    };
    assert!(matches!(
        create_transfer_pair(&store, &same),
        Err(NidoError::ConstraintViolation(_))
    ));
    let zero = NewTransfer {
        to_account_id: f.efectivo,
        amount: Decimal::ZERO,
        ..same
    };
    assert!(matches!(
        create_transfer_pair(&store, &zero),
        Err(NidoError::ConstraintViolation(_))
    ));
    let n: i64 = f
        .conn
        .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(n, 0);
}

#[test]
fn category_must_match_transaction_kind() {
    let f = setup();
    let store = SqliteLedger::new(&f.conn);
    let err = add_transaction(
        &store,
        &NewTransaction {
            kind: TxKind::Income,
            amount: dec!(10),
            date: date(2025, 1, 1),
            note: String::new(),
            person_id: Some(f.ana),
            category_id: Some(f.ocio),
            account_id: None,
            transfer_group_id: None,
            transfer_side: None,
        },
    )
    .unwrap_err();
    assert!(matches!(err, NidoError::ConstraintViolation(_)));

    let id = flow(&f, TxKind::Expense, dec!(30), date(2025, 1, 2), None);
    let patch = TxPatch {
        kind: Some(TxKind::Income),
        ..TxPatch::default()
    };
    assert!(edit_transaction(&store, id, &patch).is_err());
    let patch = TxPatch {
        kind: Some(TxKind::Income),
        category_id: Some(f.sueldo),
        ..TxPatch::default()
    };
    assert_eq!(edit_transaction(&store, id, &patch).unwrap(), 1);
}

#[test]
fn listing_is_newest_first_with_trimmed_notes() {
    let f = setup();
    let older = flow(&f, TxKind::Expense, dec!(10), date(2025, 2, 1), None);
    let newer = flow(&f, TxKind::Expense, dec!(20), date(2025, 2, 9), Some(f.banco));
    flow(&f, TxKind::Expense, dec!(99), date(2025, 3, 1), None);
    let store = SqliteLedger::new(&f.conn);
    let rows = list_rows(&store, "2025-02", TxFilter::new(), 200).unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![newer, older]);
    assert_eq!(rows[0].note, "cine");
    assert_eq!(rows[0].account, "Banco");
    assert_eq!(rows[1].account, "");
    assert_eq!(rows[0].person, "Ana");

    let filtered = list_rows(&store, "2025-02", TxFilter::new().note_contains(Some("CINE")), 1).unwrap();
    assert_eq!(filtered.len(), 1);
}

#[test]
fn profile_compares_against_the_previous_month() {
    let f = setup();
    flow(&f, TxKind::Income, dec!(1000), date(2025, 1, 10), None);
    flow(&f, TxKind::Income, dec!(1500), date(2025, 2, 10), None);
    flow(&f, TxKind::Expense, dec!(200), date(2025, 2, 11), None);
    let store = SqliteLedger::new(&f.conn);
    let clock = FixedClock::on(date(2025, 2, 20));
    let profile = Reports::new(&store, &clock).person_profile(f.ana, None).unwrap();
    assert_eq!(profile.prev_month, "2025-01");
    assert_eq!(profile.change_vs_prev_month.income_pct, PctChange::Ratio(dec!(0.5)));
    assert_eq!(profile.change_vs_prev_month.expense_pct, PctChange::New);
    assert_eq!(profile.totals_all_time.balance, dec!(2300));
    assert_eq!(profile.last_tx_date, Some(date(2025, 2, 11)));

    assert_eq!(pct_change(dec!(0), dec!(0)), PctChange::Ratio(Decimal::ZERO));
    assert_eq!(pct_change(dec!(50), dec!(100)), PctChange::Ratio(dec!(-0.5)));
}

#[test]
fn year_and_trend_are_zero_filled() {
    let f = setup();
    flow(&f, TxKind::Expense, dec!(300), date(2024, 12, 3), None);
    flow(&f, TxKind::Expense, dec!(120), date(2025, 3, 3), None);
    let store = SqliteLedger::new(&f.conn);
    let clock = FixedClock::on(date(2025, 3, 15));
    let reports = Reports::new(&store, &clock);

    let year = reports.yearly_balance(Some("2025"), None).unwrap();
    assert_eq!(year.by_month.len(), 12);
    assert_eq!(year.by_month[0].month, "2025-01");
    assert_eq!(year.by_month[2].expense, dec!(120));
    assert_eq!(year.by_month[11].expense, Decimal::ZERO);
    assert_eq!(year.totals.expense, dec!(120));

    let trend = reports.category_trend(f.ocio, None, Some(4), None).unwrap();
    assert_eq!(trend.start_month, "2024-12");
    let spent: Vec<Decimal> = trend.series.iter().map(|p| p.spent).collect();
    assert_eq!(spent, vec![dec!(300), dec!(0), dec!(0), dec!(120)]);

    assert!(matches!(
        reports.category_trend(f.ocio, None, Some(37), None),
        Err(NidoError::ConstraintViolation(_))
    ));
    assert!(matches!(
        reports.yearly_balance(Some("25"), None),
        Err(NidoError::InvalidRangeToken(_))
    ));
}

fn spend(f: &Fixture, person: i64, category: i64, amount: Decimal, on: NaiveDate, note: &str) -> i64 {
    add_transaction(
        &SqliteLedger::new(&f.conn),
        &NewTransaction {
            kind: TxKind::Expense,
            amount,
            date: on,
            note: note.into(),
            person_id: Some(person),
            category_id: Some(category),
            account_id: None,
            transfer_group_id: None,
            transfer_side: None,
        },
    )
    .unwrap()
}

fn stored_leg(f: &Fixture, id: i64) -> (String, String, String) {
    f.conn
        .query_row(
            "SELECT amount, date, note FROM transactions WHERE id=?1",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap()
}

#[test]
fn editing_a_transfer_moves_both_legs_together() {
    let f = setup();
    let store = SqliteLedger::new(&f.conn);
    let created = create_transfer_pair(
        &store,
        &NewTransfer {
            from_account_id: f.banco,
            to_account_id: f.efectivo,
            amount: dec!(300),
            date: date(2025, 5, 1),
            note: "x".into(),
        },
    )
    .unwrap();

    let patch = TransferPatch {
        amount: Some(dec!(450)),
        date: Some(date(2025, 5, 2)),
        note: Some("  y ".into()),
    };
    assert_eq!(edit_transfer_pair(&store, &created.group_id, &patch).unwrap(), 2);
    let expected = ("450".to_string(), "2025-05-02".to_string(), "y".to_string());
    assert_eq!(stored_leg(&f, created.out_id), expected);
    assert_eq!(stored_leg(&f, created.in_id), expected);

    let clock = FixedClock::on(date(2025, 5, 31));
    let view = Reports::new(&store, &clock)
        .transfer_details(&created.group_id)
        .unwrap();
    assert_eq!(view.amount, dec!(450));
    assert_eq!(view.date, date(2025, 5, 2));

    let zero = TransferPatch {
        amount: Some(Decimal::ZERO),
        ..TransferPatch::default()
    };
    assert!(matches!(
        edit_transfer_pair(&store, &created.group_id, &zero),
        Err(NidoError::ConstraintViolation(_))
    ));
    assert_eq!(
        edit_transfer_pair(&store, "00000000-0000-4000-8000-000000000000", &patch).unwrap(),
        0
    );
}

#[test]
fn editing_a_half_transfer_updates_the_remaining_leg() {
    let f = setup();
    let store = SqliteLedger::new(&f.conn);
    let created = create_transfer_pair(
        &store,
        &NewTransfer {
            from_account_id: f.banco,
            to_account_id: f.efectivo,
            amount: dec!(300),
            date: date(2025, 5, 1),
            note: String::new(),
        },
    )
    .unwrap();
    f.conn
        .execute(
            "UPDATE transactions SET deleted_at='2025-05-03T00:00:00Z' WHERE id=?1",
            [created.in_id],
        )
        .unwrap();

    let patch = TransferPatch {
        amount: Some(dec!(500)),
        ..TransferPatch::default()
    };
    assert_eq!(edit_transfer_pair(&store, &created.group_id, &patch).unwrap(), 1);
    assert_eq!(store.transaction(created.out_id).unwrap().unwrap().amount, dec!(500));
    assert_eq!(stored_leg(&f, created.in_id).0, "300");

    let clock = FixedClock::on(date(2025, 5, 31));
    let view = Reports::new(&store, &clock)
        .transfer_details(&created.group_id)
        .unwrap();
    assert_eq!(view.out_id, Some(created.out_id));
    assert_eq!(view.in_id, None);
}

#[test]
fn comparison_builds_two_independent_blocks() {
    let f = setup();
    let luis = add_person(&f.conn, "Luis").unwrap();
    let salud = add_category(&f.conn, "Salud", CategoryKind::Expense).unwrap();
    spend(&f, f.ana, f.ocio, dec!(100), date(2025, 1, 3), "");
    spend(&f, f.ana, salud, dec!(300), date(2025, 1, 4), "");
    spend(&f, luis, f.ocio, dec!(1000), date(2025, 1, 5), "");
    spend(&f, f.ana, f.ocio, dec!(50), date(2025, 2, 3), "");
    flow(&f, TxKind::Income, dec!(2000), date(2025, 2, 1), None);

    let store = SqliteLedger::new(&f.conn);
    let clock = FixedClock::on(date(2025, 2, 15));
    let reports = Reports::new(&store, &clock);

    let ana = reports.month_comparison("2025-01", "2025-02", Some(f.ana)).unwrap();
    assert_eq!(ana.person_id, Some(f.ana));
    assert_eq!(ana.a.month, "2025-01");
    assert_eq!(ana.a.totals.expense, dec!(400));
    let names: Vec<&str> = ana.a.top_categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Salud", "Ocio"]);
    assert_eq!(ana.b.month, "2025-02");
    assert_eq!(ana.b.totals.income, dec!(2000));
    assert_eq!(ana.b.totals.balance, dec!(1950));
    assert_eq!(ana.b.top_categories.len(), 1);

    let everyone = reports.month_comparison("2025-01", "2025-02", None).unwrap();
    assert_eq!(everyone.a.totals.expense, dec!(1400));
    assert_eq!(everyone.a.top_categories[0].name, "Ocio");
    assert_eq!(everyone.a.top_categories[0].spent, dec!(1100));

    assert!(matches!(
        reports.month_comparison("2025-01", "2025-02", Some(999)),
        Err(NidoError::DimensionNotFound { .. })
    ));
    assert!(matches!(
        reports.month_comparison("2025-1", "2025-02", None),
        Err(NidoError::InvalidRangeToken(_))
    ));
}

#[test]
fn comparison_keeps_the_ten_biggest_categories() {
    let f = setup();
    for i in 1..=11u32 {
        let cat = add_category(&f.conn, &format!("Gasto {:02}", i), CategoryKind::Expense).unwrap();
        spend(&f, f.ana, cat, Decimal::from(i * 10), date(2025, 3, i), "");
    }
    let store = SqliteLedger::new(&f.conn);
    let clock = FixedClock::on(date(2025, 3, 31));
    let cmp = Reports::new(&store, &clock)
        .month_comparison("2025-03", "2025-04", None)
        .unwrap();
    assert_eq!(cmp.a.top_categories.len(), 10);
    assert_eq!(cmp.a.top_categories[0].name, "Gasto 11");
    assert!(cmp.a.top_categories.iter().all(|c| c.name != "Gasto 01"));
    assert!(cmp.b.top_categories.is_empty());
    assert_eq!(cmp.b.totals.expense, Decimal::ZERO);
}

#[test]
fn top_expenses_honour_person_category_and_text() {
    let f = setup();
    let luis = add_person(&f.conn, "Luis").unwrap();
    let salud = add_category(&f.conn, "Salud", CategoryKind::Expense).unwrap();
    let early = spend(&f, f.ana, f.ocio, dec!(100), date(2025, 1, 3), "cine");
    let farmacia = spend(&f, f.ana, salud, dec!(300), date(2025, 1, 4), "farmacia");
    let recital = spend(&f, luis, f.ocio, dec!(1000), date(2025, 1, 5), "recital");
    let late = spend(&f, f.ana, f.ocio, dec!(100), date(2025, 1, 9), "Cine otra vez");
    flow(&f, TxKind::Income, dec!(5000), date(2025, 1, 1), None);
    spend(&f, f.ana, f.ocio, dec!(9999), date(2025, 2, 1), "febrero");

    let store = SqliteLedger::new(&f.conn);
    let clock = FixedClock::on(date(2025, 1, 31));
    let reports = Reports::new(&store, &clock);
    let ids = |q: &ExpenseQuery| -> Vec<i64> {
        reports
            .top_expenses(Some("2025-01"), q)
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect()
    };

    assert_eq!(ids(&ExpenseQuery::default()), vec![recital, farmacia, late, early]);
    let mine = ExpenseQuery {
        person_id: Some(f.ana),
        ..ExpenseQuery::default()
    };
    assert_eq!(ids(&mine), vec![farmacia, late, early]);
    let my_fun = ExpenseQuery {
        category_id: Some(f.ocio),
        ..mine.clone()
    };
    assert_eq!(ids(&my_fun), vec![late, early]);
    let text = ExpenseQuery {
        text: Some("CINE".into()),
        ..ExpenseQuery::default()
    };
    assert_eq!(ids(&text), vec![late, early]);
    let one = ExpenseQuery {
        limit: Some(1),
        ..ExpenseQuery::default()
    };
    assert_eq!(ids(&one), vec![recital]);

    let rows = reports.top_expenses(None, &ExpenseQuery::default()).unwrap();
    assert_eq!(rows[0].person_name, "Luis");
    assert_eq!(rows[0].category_name, "Ocio");
}

#[test]
fn monthly_report_lists_only_active_days() {
    let f = setup();
    let luis = add_person(&f.conn, "Luis").unwrap();
    flow(&f, TxKind::Income, dec!(5000), date(2025, 1, 1), None);
    spend(&f, f.ana, f.ocio, dec!(100), date(2025, 1, 5), "");
    spend(&f, f.ana, f.ocio, dec!(300), date(2025, 1, 5), "");
    spend(&f, luis, f.ocio, dec!(1000), date(2025, 1, 20), "");
    let gone = spend(&f, f.ana, f.ocio, dec!(70), date(2025, 1, 10), "");
    let store = SqliteLedger::new(&f.conn);
    remove_transaction(&store, gone).unwrap();
    create_transfer_pair(
        &store,
        &NewTransfer {
            from_account_id: f.banco,
            to_account_id: f.efectivo,
            amount: dec!(250),
            date: date(2025, 1, 12),
            note: String::new(),
        },
    )
    .unwrap();

    let clock = FixedClock::on(date(2025, 1, 31));
    let reports = Reports::new(&store, &clock);
    let report = reports.monthly_report(None, None).unwrap();
    assert_eq!(report.month, "2025-01");
    let days: Vec<NaiveDate> = report.daily.iter().map(|d| d.day).collect();
    assert_eq!(days, vec![date(2025, 1, 1), date(2025, 1, 5), date(2025, 1, 20)]);
    assert_eq!(report.daily[1].expense, dec!(400));
    assert_eq!(report.daily[1].balance, dec!(-400));
    assert_eq!(report.totals.balance, dec!(3600));
    assert_eq!(report.top_categories.len(), 1);

    let luis_only = reports.monthly_report(Some("2025-01"), Some(luis)).unwrap();
    let days: Vec<NaiveDate> = luis_only.daily.iter().map(|d| d.day).collect();
    assert_eq!(days, vec![date(2025, 1, 20)]);
    assert_eq!(luis_only.totals.expense, dec!(1000));
}

#[test]
fn trend_may_end_in_the_last_four_digit_month() {
    let f = setup();
    spend(&f, f.ana, f.ocio, dec!(40), date(9999, 12, 2), "");
    let store = SqliteLedger::new(&f.conn);
    let clock = FixedClock::on(date(2025, 1, 31));
    let reports = Reports::new(&store, &clock);

    let trend = reports.category_trend(f.ocio, Some("9999-11"), Some(2), None).unwrap();
    let spent: Vec<Decimal> = trend.series.iter().map(|p| p.spent).collect();
    assert_eq!(spent, vec![Decimal::ZERO, dec!(40)]);

    assert!(matches!(
        reports.category_trend(f.ocio, Some("9999-12"), Some(2), None),
        Err(NidoError::ConstraintViolation(_))
    ));
}
