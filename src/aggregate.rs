// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Grouped sums over an already-filtered set of ledger rows.
//!
//! Everything in here is pure: callers load rows through the store and pass
//! them in. Amounts are summed as `Decimal`, income and expense separately,
//! and netted only at the end. Transfer legs never touch a flow total.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::models::{Account, Category, Person, Transaction, TxKind};
use crate::periods::month_token;

pub const NO_ACCOUNT_KEY: &str = "__none__";
pub const MISSING_NAME: &str = "—";
pub const RECENT_PER_ACCOUNT: usize = 3;
pub const TOP_EXPENSES_DEFAULT: usize = 10;
pub const TOP_EXPENSES_MAX: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

impl Totals {
    /// Adds one row; transfers are ignored.
    pub fn add(&mut self, tx: &Transaction) {
        match tx.kind {
            TxKind::Income => self.income += tx.amount,
            TxKind::Expense => self.expense += tx.amount,
            TxKind::Transfer => return,
        }
        self.balance = self.income - self.expense;
    }

    pub fn of<'a>(txs: impl IntoIterator<Item = &'a Transaction>) -> Self {
        let mut t = Totals::default();
        for tx in txs {
            t.add(tx);
        }
        t
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    None,
    Person,
    Category,
    Account,
    Day,
    Month,
    CategoryAndType,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    All,
    Person(Option<i64>),
    Category(Option<i64>),
    Account(Option<i64>),
    Day(NaiveDate),
    Month(String),
    CategoryAndType(Option<i64>, TxKind),
}

impl GroupBy {
    fn key(&self, tx: &Transaction) -> GroupKey {
        match self {
            GroupBy::None => GroupKey::All,
            GroupBy::Person => GroupKey::Person(tx.person_id),
            GroupBy::Category => GroupKey::Category(tx.category_id),
            GroupBy::Account => GroupKey::Account(tx.account_id),
            GroupBy::Day => GroupKey::Day(tx.date),
            GroupBy::Month => GroupKey::Month(month_token(tx.date)),
            GroupBy::CategoryAndType => GroupKey::CategoryAndType(tx.category_id, tx.kind),
        }
    }
}

/// The one primitive every report is built from. Only income and expense
/// rows produce groups.
pub fn grouped_sum<'a>(
    txs: impl IntoIterator<Item = &'a Transaction>,
    by: GroupBy,
) -> BTreeMap<GroupKey, Totals> {
    let mut out: BTreeMap<GroupKey, Totals> = BTreeMap::new();
    for tx in txs.into_iter().filter(|t| t.is_flow()) {
        out.entry(by.key(tx)).or_default().add(tx);
    }
    out
}

/// Display names for reference rows. Unknown ids resolve to a placeholder.
#[derive(Debug, Clone, Default)]
pub struct NameBook {
    people: HashMap<i64, String>,
    categories: HashMap<i64, String>,
    accounts: HashMap<i64, String>,
}

impl NameBook {
    pub fn new(people: &[Person], categories: &[Category], accounts: &[Account]) -> Self {
        Self {
            people: people.iter().map(|p| (p.id, p.name.clone())).collect(),
            categories: categories.iter().map(|c| (c.id, c.name.clone())).collect(),
            accounts: accounts.iter().map(|a| (a.id, a.name.clone())).collect(),
        }
    }

    fn lookup(map: &HashMap<i64, String>, id: Option<i64>) -> String {
        id.and_then(|i| map.get(&i).cloned())
            .unwrap_or_else(|| MISSING_NAME.to_string())
    }

    pub fn person(&self, id: Option<i64>) -> String {
        Self::lookup(&self.people, id)
    }

    pub fn category(&self, id: Option<i64>) -> String {
        Self::lookup(&self.categories, id)
    }

    pub fn account(&self, id: Option<i64>) -> String {
        Self::lookup(&self.accounts, id)
    }

    pub fn account_opt(&self, id: Option<i64>) -> Option<String> {
        id.and_then(|i| self.accounts.get(&i).cloned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonTotals {
    pub person_id: Option<i64>,
    pub person_name: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonOrder {
    /// Monthly views.
    NameAsc,
    /// Yearly views.
    BalanceDesc,
}

pub fn person_totals(txs: &[Transaction], names: &NameBook, order: PersonOrder) -> Vec<PersonTotals> {
    let mut rows: Vec<PersonTotals> = grouped_sum(txs, GroupBy::Person)
        .into_iter()
        .filter_map(|(key, t)| match key {
            GroupKey::Person(id) => Some(PersonTotals {
                person_id: id,
                person_name: names.person(id),
                income: t.income,
                expense: t.expense,
                balance: t.balance,
            }),
            _ => None,
        })
        .collect();
    match order {
        PersonOrder::NameAsc => rows.sort_by(|a, b| {
            a.person_name
                .to_lowercase()
                .cmp(&b.person_name.to_lowercase())
                .then(a.person_id.cmp(&b.person_id))
        }),
        PersonOrder::BalanceDesc => rows.sort_by(|a, b| {
            b.balance
                .cmp(&a.balance)
                .then_with(|| a.person_name.cmp(&b.person_name))
                .then(a.person_id.cmp(&b.person_id))
        }),
    }
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub totals: Totals,
    pub by_person: Vec<PersonTotals>,
}

pub fn monthly_summary(txs: &[Transaction], names: &NameBook) -> MonthlySummary {
    MonthlySummary {
        totals: Totals::of(txs),
        by_person: person_totals(txs, names, PersonOrder::NameAsc),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayRow {
    pub day: NaiveDate,
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

/// Only days with activity appear.
pub fn daily_series(txs: &[Transaction]) -> Vec<DayRow> {
    grouped_sum(txs, GroupBy::Day)
        .into_iter()
        .filter_map(|(key, t)| match key {
            GroupKey::Day(day) => Some(DayRow {
                day,
                income: t.income,
                expense: t.expense,
                balance: t.balance,
            }),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthRow {
    pub month: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

/// One row per month in `months`, zero-filled.
pub fn monthly_series(txs: &[Transaction], months: &[String]) -> Vec<MonthRow> {
    let mut seeded: BTreeMap<String, Totals> =
        months.iter().map(|m| (m.clone(), Totals::default())).collect();
    for (key, t) in grouped_sum(txs, GroupBy::Month) {
        if let GroupKey::Month(m) = key {
            if let Some(slot) = seeded.get_mut(&m) {
                *slot = t;
            }
        }
    }
    months
        .iter()
        .map(|m| {
            let t = seeded.get(m).copied().unwrap_or_default();
            MonthRow {
                month: m.clone(),
                income: t.income,
                expense: t.expense,
                balance: t.balance,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpend {
    pub category_id: Option<i64>,
    pub name: String,
    pub spent: Decimal,
}

/// Expense-only ranking. Ties fall back to category id so the order is stable.
pub fn top_categories(txs: &[Transaction], names: &NameBook, n: usize) -> Vec<CategorySpend> {
    let mut rows: Vec<CategorySpend> = grouped_sum(
        txs.iter().filter(|t| t.kind == TxKind::Expense),
        GroupBy::Category,
    )
    .into_iter()
    .filter_map(|(key, t)| match key {
        GroupKey::Category(id) => Some(CategorySpend {
            category_id: id,
            name: names.category(id),
            spent: t.expense,
        }),
        _ => None,
    })
    .collect();
    rows.sort_by(|a, b| b.spent.cmp(&a.spent).then(a.category_id.cmp(&b.category_id)));
    rows.truncate(n);
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTypeAmount {
    pub category_id: Option<i64>,
    pub category_name: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub amount: Decimal,
}

/// Ranking over (category, kind) pairs, income and expense mixed.
pub fn top_category_amounts(
    txs: &[Transaction],
    names: &NameBook,
    n: usize,
) -> Vec<CategoryTypeAmount> {
    let mut rows: Vec<CategoryTypeAmount> = grouped_sum(txs, GroupBy::CategoryAndType)
        .into_iter()
        .filter_map(|(key, t)| match key {
            GroupKey::CategoryAndType(id, kind) => Some(CategoryTypeAmount {
                category_id: id,
                category_name: names.category(id),
                kind,
                amount: if kind == TxKind::Income {
                    t.income
                } else {
                    t.expense
                },
            }),
            _ => None,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then(a.category_id.cmp(&b.category_id))
            .then(a.kind.cmp(&b.kind))
    });
    rows.truncate(n);
    rows
}

/// Optional narrowing for the biggest-expenses list.
#[derive(Debug, Clone, Default)]
pub struct ExpenseQuery {
    pub text: Option<String>,
    pub person_id: Option<i64>,
    pub category_id: Option<i64>,
    pub limit: Option<usize>,
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(TOP_EXPENSES_DEFAULT)
        .clamp(1, TOP_EXPENSES_MAX)
}

pub fn top_expenses(txs: &[Transaction], query: &ExpenseQuery) -> Vec<Transaction> {
    let needle = query
        .text
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    let mut rows: Vec<Transaction> = txs
        .iter()
        .filter(|t| t.kind == TxKind::Expense)
        .filter(|t| query.person_id.is_none() || t.person_id == query.person_id)
        .filter(|t| query.category_id.is_none() || t.category_id == query.category_id)
        .filter(|t| match &needle {
            Some(n) => t.note.to_lowercase().contains(n),
            None => true,
        })
        .cloned()
        .collect();
    rows.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then(b.date.cmp(&a.date))
            .then(b.id.cmp(&a.id))
    });
    rows.truncate(clamp_limit(query.limit));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub month: String,
    pub spent: Decimal,
}

/// Expense in one category per month of `months`, zero-filled.
pub fn category_trend(txs: &[Transaction], category_id: i64, months: &[String]) -> Vec<TrendPoint> {
    let in_category: Vec<&Transaction> = txs
        .iter()
        .filter(|t| t.kind == TxKind::Expense && t.category_id == Some(category_id))
        .collect();
    let sums = grouped_sum(in_category, GroupBy::Month);
    months
        .iter()
        .map(|m| TrendPoint {
            month: m.clone(),
            spent: sums
                .get(&GroupKey::Month(m.clone()))
                .map(|t| t.expense)
                .unwrap_or(Decimal::ZERO),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccountKey {
    Unassigned,
    Account(i64),
}

impl AccountKey {
    pub fn of(account_id: Option<i64>) -> Self {
        account_id.map_or(AccountKey::Unassigned, AccountKey::Account)
    }
}

impl Serialize for AccountKey {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            AccountKey::Unassigned => s.serialize_str(NO_ACCOUNT_KEY),
            AccountKey::Account(id) => s.serialize_i64(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBucket {
    pub account_id: AccountKey,
    pub name: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
    pub count: usize,
    pub recent_tx: Vec<Transaction>,
}

/// Per-account flow for a period. `txs` may include transfer legs: they are
/// counted and previewed but never summed. The unassigned bucket comes first,
/// then every active account, then inactive accounts that still saw activity.
pub fn account_summary(txs: &[Transaction], accounts: &[Account]) -> Vec<AccountBucket> {
    let mut order: Vec<(AccountKey, String)> = vec![(AccountKey::Unassigned, "Sin cuenta".into())];
    order.extend(
        accounts
            .iter()
            .filter(|a| a.active)
            .map(|a| (AccountKey::Account(a.id), a.name.clone())),
    );
    let by_id: HashMap<i64, &Account> = accounts.iter().map(|a| (a.id, a)).collect();
    let mut seen_inactive: Vec<i64> = txs
        .iter()
        .filter_map(|t| t.account_id)
        .filter(|id| by_id.get(id).is_none_or(|a| !a.active))
        .collect();
    seen_inactive.sort_unstable();
    seen_inactive.dedup();
    order.extend(seen_inactive.into_iter().map(|id| {
        let name = by_id
            .get(&id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| MISSING_NAME.to_string());
        (AccountKey::Account(id), name)
    }));

    let mut grouped: HashMap<AccountKey, Vec<&Transaction>> = HashMap::new();
    for tx in txs.iter().filter(|t| t.deleted_at.is_none()) {
        grouped.entry(AccountKey::of(tx.account_id)).or_default().push(tx);
    }

    order
        .into_iter()
        .map(|(key, name)| {
            let mut rows = grouped.remove(&key).unwrap_or_default();
            let totals = Totals::of(rows.iter().copied());
            rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
            AccountBucket {
                account_id: key,
                name,
                income: totals.income,
                expense: totals.expense,
                net: totals.balance,
                count: rows.len(),
                recent_tx: rows
                    .into_iter()
                    .take(RECENT_PER_ACCOUNT)
                    .cloned()
                    .collect(),
            }
        })
        .collect()
}

/// Month-over-month ratio. `New` marks growth from nothing and must not be
/// rendered as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PctChange {
    Ratio(Decimal),
    New,
}

impl std::fmt::Display for PctChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PctChange::Ratio(r) => write!(f, "{}%", (*r * Decimal::ONE_HUNDRED).round_dp(1)),
            PctChange::New => f.write_str("New"),
        }
    }
}

pub fn pct_change(current: Decimal, previous: Decimal) -> PctChange {
    if previous.is_zero() {
        return if current.is_zero() {
            PctChange::Ratio(Decimal::ZERO)
        } else {
            PctChange::New
        };
    }
    (current - previous)
        .checked_div(previous.abs())
        .map_or(PctChange::New, PctChange::Ratio)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthDelta {
    pub income_delta: Decimal,
    pub income_pct: PctChange,
    pub expense_delta: Decimal,
    pub expense_pct: PctChange,
    pub balance_delta: Decimal,
    pub balance_pct: PctChange,
}

impl MonthDelta {
    pub fn between(current: &Totals, previous: &Totals) -> Self {
        Self {
            income_delta: current.income - previous.income,
            income_pct: pct_change(current.income, previous.income),
            expense_delta: current.expense - previous.expense,
            expense_pct: pct_change(current.expense, previous.expense),
            balance_delta: current.balance - previous.balance,
            balance_pct: pct_change(current.balance, previous.balance),
        }
    }
}

/// Latest income/expense date, ignoring transfers.
pub fn last_flow_date(txs: &[Transaction]) -> Option<NaiveDate> {
    txs.iter().filter(|t| t.is_flow()).map(|t| t.date).max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountKind, CategoryKind, TransferSide};
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn tx(id: i64, kind: TxKind, amount: Decimal, day: u32) -> Transaction {
        Transaction {
            id,
            kind,
            amount,
            date: d(day),
            note: String::new(),
            person_id: None,
            category_id: None,
            account_id: None,
            transfer_group_id: None,
            transfer_side: None,
            deleted_at: None,
        }
    }

    fn names() -> NameBook {
        NameBook::new(
            &[
                Person { id: 1, name: "Zoe".into(), active: true },
                Person { id: 2, name: "alice".into(), active: true },
            ],
            &[
                Category { id: 10, name: "Food".into(), kind: CategoryKind::Expense },
                Category { id: 11, name: "Rent".into(), kind: CategoryKind::Expense },
            ],
            &[],
        )
    }

    #[test]
    fn transfers_never_reach_flow_totals() {
        let mut leg = tx(3, TxKind::Transfer, dec!(300), 4);
        leg.transfer_side = Some(TransferSide::Out);
        let rows = vec![
            tx(1, TxKind::Income, dec!(5000), 1),
            tx(2, TxKind::Expense, dec!(1500), 2),
            leg,
        ];
        let t = Totals::of(&rows);
        assert_eq!(t.income, dec!(5000));
        assert_eq!(t.expense, dec!(1500));
        assert_eq!(t.balance, dec!(3500));
        assert_eq!(daily_series(&rows).len(), 2);
    }

    #[test]
    fn decimal_sums_do_not_drift() {
        let rows: Vec<Transaction> = (0..1000)
            .map(|i| tx(i, TxKind::Expense, dec!(0.1), 1))
            .collect();
        assert_eq!(Totals::of(&rows).expense, dec!(100.0));
    }

    #[test]
    fn monthly_people_by_name_yearly_by_balance() {
        let mut a = tx(1, TxKind::Income, dec!(100), 1);
        a.person_id = Some(1);
        let mut b = tx(2, TxKind::Income, dec!(900), 1);
        b.person_id = Some(2);
        let mut c = tx(3, TxKind::Expense, dec!(50), 1);
        c.person_id = None;
        let rows = vec![a, b, c];

        let monthly = person_totals(&rows, &names(), PersonOrder::NameAsc);
        let names_in_order: Vec<_> = monthly.iter().map(|p| p.person_name.as_str()).collect();
        assert_eq!(names_in_order, vec!["alice", "Zoe", "—"]);

        let yearly = person_totals(&rows, &names(), PersonOrder::BalanceDesc);
        assert_eq!(yearly[0].person_id, Some(2));
        assert_eq!(yearly[2].balance, dec!(-50));
    }

    #[test]
    fn monthly_series_zero_fills_every_month() {
        let rows = vec![tx(1, TxKind::Expense, dec!(10), 5)];
        let months = crate::periods::year_months(2025);
        let series = monthly_series(&rows, &months);
        assert_eq!(series.len(), 12);
        assert_eq!(series[2].expense, dec!(10));
        assert!(series.iter().filter(|r| r.month != "2025-03").all(|r| r.balance.is_zero()));
    }

    #[test]
    fn top_categories_break_ties_by_id() {
        let mut rows = Vec::new();
        for (id, cat, amount) in [(1, 11, dec!(200)), (2, 10, dec!(200)), (3, 12, dec!(50))] {
            let mut t = tx(id, TxKind::Expense, amount, 2);
            t.category_id = Some(cat);
            rows.push(t);
        }
        let top = top_categories(&rows, &names(), 8);
        let ids: Vec<_> = top.iter().map(|c| c.category_id).collect();
        assert_eq!(ids, vec![Some(10), Some(11), Some(12)]);
        assert_eq!(top[2].name, "—");
        assert_eq!(top_categories(&rows, &names(), 1).len(), 1);
    }

    #[test]
    fn top_expenses_order_filter_and_clamp() {
        let mut rows = vec![
            tx(1, TxKind::Expense, dec!(100), 1),
            tx(2, TxKind::Expense, dec!(100), 9),
            tx(3, TxKind::Expense, dec!(300), 3),
            tx(4, TxKind::Income, dec!(999), 3),
        ];
        rows[0].note = "Farmacia".into();
        let all = top_expenses(&rows, &ExpenseQuery::default());
        let ids: Vec<_> = all.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let q = ExpenseQuery { text: Some("FARM".into()), ..Default::default() };
        assert_eq!(top_expenses(&rows, &q).len(), 1);

        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(500)), 50);
        assert_eq!(clamp_limit(None), 10);
    }

    #[test]
    fn trend_has_one_point_per_month() {
        let mut t = tx(1, TxKind::Expense, dec!(70), 15);
        t.category_id = Some(10);
        let months = crate::periods::month_span("2025-01", 6).unwrap();
        let trend = category_trend(&[t], 10, &months);
        assert_eq!(trend.len(), 6);
        assert_eq!(trend[2].spent, dec!(70));
        assert_eq!(trend[5].spent, Decimal::ZERO);
    }

    #[test]
    fn account_summary_lists_unassigned_first() {
        let accounts = vec![
            Account {
                id: 5,
                name: "Banco".into(),
                kind: AccountKind::Bank,
                active: true,
                credit_terms: None,
                owner_id: None,
            },
            Account {
                id: 6,
                name: "Viejo".into(),
                kind: AccountKind::Cash,
                active: false,
                credit_terms: None,
                owner_id: None,
            },
        ];
        let mut rows = Vec::new();
        for i in 0..5 {
            let mut t = tx(i, TxKind::Expense, dec!(10), 1 + i as u32);
            t.account_id = Some(5);
            rows.push(t);
        }
        rows.push(tx(9, TxKind::Income, dec!(40), 2));
        let buckets = account_summary(&rows, &accounts);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].account_id, AccountKey::Unassigned);
        assert_eq!(buckets[0].net, dec!(40));
        assert_eq!(buckets[1].count, 5);
        assert_eq!(buckets[1].expense, dec!(50));
        let recent: Vec<_> = buckets[1].recent_tx.iter().map(|t| t.id).collect();
        assert_eq!(recent, vec![4, 3, 2]);
        assert_eq!(
            serde_json::to_value(buckets[0].account_id).unwrap(),
            serde_json::json!("__none__")
        );
    }

    #[test]
    fn pct_change_flags_growth_from_nothing() {
        assert_eq!(pct_change(dec!(500), dec!(0)), PctChange::New);
        assert_eq!(pct_change(dec!(0), dec!(0)), PctChange::Ratio(dec!(0)));
        assert_eq!(pct_change(dec!(150), dec!(100)), PctChange::Ratio(dec!(0.5)));
        assert_eq!(pct_change(dec!(-50), dec!(-100)), PctChange::Ratio(dec!(0.5)));
        assert_eq!(PctChange::New.to_string(), "New");
    }
}
