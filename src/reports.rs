// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Report composers. Each one loads what it needs through the store, then
//! runs the pure aggregation and budget functions over it.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::aggregate::{
    self, AccountBucket, CategorySpend, CategoryTypeAmount, DayRow, ExpenseQuery, MonthDelta,
    MonthRow, MonthlySummary, NameBook, PersonOrder, PersonTotals, Totals, TrendPoint,
};
use crate::budgets::{self, BudgetAlerts, BudgetScope, BudgetSheet, ALERTS_PER_SCOPE};
use crate::errors::{NidoError, Result};
use crate::models::{CategoryKind, Dimension, Transaction, TxKind};
use crate::periods::{
    self, month_or_current, resolve_month, resolve_year, shift_month, year_or_current, Clock,
};
use crate::store::{LedgerStore, TxFilter};
use crate::transfers::{pair_legs, TransferView};

pub const MONTHLY_TOP_CATEGORIES: usize = 8;
pub const COMPARE_TOP_CATEGORIES: usize = 10;
pub const PROFILE_TOP_CATEGORIES: usize = 5;
pub const TREND_DEFAULT_MONTHS: u32 = 12;
pub const TREND_MAX_MONTHS: u32 = 36;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub month: String,
    #[serde(flatten)]
    pub summary: MonthlySummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyReport {
    pub month: String,
    pub person_id: Option<i64>,
    pub totals: Totals,
    pub daily: Vec<DayRow>,
    pub top_categories: Vec<CategorySpend>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountsReport {
    pub month: String,
    pub accounts: Vec<AccountBucket>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub month: String,
    pub summary: MonthlySummary,
    pub category_alerts: BudgetAlerts,
    pub person_alerts: BudgetAlerts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonProfile {
    pub person_id: i64,
    pub person_name: String,
    pub active: bool,
    pub month: String,
    pub prev_month: String,
    pub totals_all_time: Totals,
    pub totals_month: Totals,
    pub totals_prev_month: Totals,
    pub change_vs_prev_month: MonthDelta,
    pub last_tx_date: Option<NaiveDate>,
    pub top_categories_month: Vec<CategoryTypeAmount>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyReport {
    pub year: i32,
    pub person_id: Option<i64>,
    pub totals: Totals,
    pub by_month: Vec<MonthRow>,
    pub by_person: Vec<PersonTotals>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTrend {
    pub category_id: i64,
    pub category_name: String,
    pub start_month: String,
    pub months: u32,
    pub person_id: Option<i64>,
    pub series: Vec<TrendPoint>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBlock {
    pub month: String,
    pub totals: Totals,
    pub top_categories: Vec<CategorySpend>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthComparison {
    pub person_id: Option<i64>,
    pub a: MonthBlock,
    pub b: MonthBlock,
}

/// One row of the biggest-expenses list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseRow {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: rust_decimal::Decimal,
    pub note: String,
    pub person_id: Option<i64>,
    pub person_name: String,
    pub category_id: Option<i64>,
    pub category_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferList {
    pub month: String,
    pub items: Vec<TransferView>,
}

/// Report entry point. Reads go through `store`; "now" comes from `clock`.
pub struct Reports<'a> {
    store: &'a dyn LedgerStore,
    clock: &'a dyn Clock,
}

impl<'a> Reports<'a> {
    pub fn new(store: &'a dyn LedgerStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn month(&self, token: Option<&str>) -> Result<String> {
        month_or_current(token, self.clock)
    }

    fn names(&self) -> Result<NameBook> {
        Ok(NameBook::new(
            &self.store.people(false)?,
            &self.store.categories()?,
            &self.store.accounts(false)?,
        ))
    }

    fn flows_in_month(&self, month: &str, person_id: Option<i64>) -> Result<Vec<Transaction>> {
        let range = resolve_month(month)?;
        self.store
            .transactions(&TxFilter::new().in_range(range).flows().person(person_id))
    }

    fn require_person(&self, id: i64) -> Result<()> {
        self.store
            .person(id)?
            .map(|_| ())
            .ok_or_else(|| NidoError::not_found(Dimension::Person, id))
    }

    fn check_person_filter(&self, person_id: Option<i64>) -> Result<()> {
        match person_id {
            Some(id) => self.require_person(id),
            None => Ok(()),
        }
    }

    pub fn monthly_summary(&self, month: Option<&str>) -> Result<SummaryReport> {
        let month = self.month(month)?;
        let txs = self.flows_in_month(&month, None)?;
        debug!(%month, rows = txs.len(), "monthly summary");
        Ok(SummaryReport {
            summary: aggregate::monthly_summary(&txs, &self.names()?),
            month,
        })
    }

    pub fn monthly_report(&self, month: Option<&str>, person_id: Option<i64>) -> Result<MonthlyReport> {
        let month = self.month(month)?;
        self.check_person_filter(person_id)?;
        let txs = self.flows_in_month(&month, person_id)?;
        Ok(MonthlyReport {
            totals: Totals::of(&txs),
            daily: aggregate::daily_series(&txs),
            top_categories: aggregate::top_categories(&txs, &self.names()?, MONTHLY_TOP_CATEGORIES),
            person_id,
            month,
        })
    }

    /// Includes transfer legs so moves between accounts show up in counts
    /// and previews.
    pub fn accounts_summary(&self, month: Option<&str>) -> Result<AccountsReport> {
        let month = self.month(month)?;
        let range = resolve_month(&month)?;
        let txs = self.store.transactions(&TxFilter::new().in_range(range))?;
        Ok(AccountsReport {
            accounts: aggregate::account_summary(&txs, &self.store.accounts(false)?),
            month,
        })
    }

    pub fn category_budgets(&self, month: Option<&str>) -> Result<BudgetSheet> {
        let month = self.month(month)?;
        let mut categories: Vec<_> = self
            .store
            .categories()?
            .into_iter()
            .filter(|c| c.kind == CategoryKind::Expense)
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        let dims: Vec<(i64, String)> = categories.into_iter().map(|c| (c.id, c.name)).collect();
        self.budget_sheet(&month, BudgetScope::Category, &dims)
    }

    pub fn person_budgets(&self, month: Option<&str>) -> Result<BudgetSheet> {
        let month = self.month(month)?;
        let dims: Vec<(i64, String)> = self
            .store
            .people(true)?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();
        self.budget_sheet(&month, BudgetScope::Person, &dims)
    }

    fn budget_sheet(&self, month: &str, scope: BudgetScope, dims: &[(i64, String)]) -> Result<BudgetSheet> {
        let txs = self.flows_in_month(month, None)?;
        let targets = self.store.budget_amounts(scope, month)?;
        let spent = budgets::spent_by(&txs, scope);
        Ok(budgets::build_sheet(month, scope, dims, &targets, &spent))
    }

    pub fn dashboard(&self, month: Option<&str>) -> Result<Dashboard> {
        let month = self.month(month)?;
        let txs = self.flows_in_month(&month, None)?;
        let categories = self.category_budgets(Some(&month))?;
        let people = self.person_budgets(Some(&month))?;
        Ok(Dashboard {
            summary: aggregate::monthly_summary(&txs, &self.names()?),
            category_alerts: budgets::alerts(&categories, ALERTS_PER_SCOPE),
            person_alerts: budgets::alerts(&people, ALERTS_PER_SCOPE),
            month,
        })
    }

    pub fn person_profile(&self, person_id: i64, month: Option<&str>) -> Result<PersonProfile> {
        let month = self.month(month)?;
        let person = self
            .store
            .person(person_id)?
            .ok_or_else(|| NidoError::not_found(Dimension::Person, person_id))?;
        let prev_month = shift_month(&month, -1)?;

        let all_time = self
            .store
            .transactions(&TxFilter::new().flows().person(Some(person_id)))?;
        let this_month = self.flows_in_month(&month, Some(person_id))?;
        let last_month = self.flows_in_month(&prev_month, Some(person_id))?;

        let totals_month = Totals::of(&this_month);
        let totals_prev_month = Totals::of(&last_month);
        Ok(PersonProfile {
            person_id,
            person_name: person.name,
            active: person.active,
            totals_all_time: Totals::of(&all_time),
            change_vs_prev_month: MonthDelta::between(&totals_month, &totals_prev_month),
            last_tx_date: aggregate::last_flow_date(&all_time),
            top_categories_month: aggregate::top_category_amounts(
                &this_month,
                &self.names()?,
                PROFILE_TOP_CATEGORIES,
            ),
            totals_month,
            totals_prev_month,
            month,
            prev_month,
        })
    }

    pub fn yearly_balance(&self, year: Option<&str>, person_id: Option<i64>) -> Result<YearlyReport> {
        let year = year_or_current(year, self.clock)?;
        self.check_person_filter(person_id)?;
        let range = resolve_year(&format!("{:04}", year))?;
        let txs = self
            .store
            .transactions(&TxFilter::new().in_range(range).flows().person(person_id))?;
        Ok(YearlyReport {
            year,
            person_id,
            totals: Totals::of(&txs),
            by_month: aggregate::monthly_series(&txs, &periods::year_months(year)),
            by_person: aggregate::person_totals(&txs, &self.names()?, PersonOrder::BalanceDesc),
        })
    }

    /// Without a start month the span ends at the current month.
    pub fn category_trend(
        &self,
        category_id: i64,
        start: Option<&str>,
        months: Option<u32>,
        person_id: Option<i64>,
    ) -> Result<CategoryTrend> {
        let months = months.unwrap_or(TREND_DEFAULT_MONTHS);
        if !(1..=TREND_MAX_MONTHS).contains(&months) {
            return Err(NidoError::constraint(format!(
                "months must be between 1 and {}",
                TREND_MAX_MONTHS
            )));
        }
        let start_month = match start {
            Some(token) => periods::parse_month(token.trim())?,
            None => shift_month(&self.month(None)?, 1 - months as i32)?,
        };
        let category = self
            .store
            .category(category_id)?
            .ok_or_else(|| NidoError::not_found(Dimension::Category, category_id))?;
        self.check_person_filter(person_id)?;

        let span = periods::month_span(&start_month, months)?;
        let last = span.last().map_or(start_month.as_str(), String::as_str);
        let range = periods::DateRange {
            start: resolve_month(&start_month)?.start,
            end: resolve_month(last)?.end,
        };
        let txs = self.store.transactions(
            &TxFilter::new()
                .in_range(range)
                .kinds(&[TxKind::Expense])
                .category(Some(category_id))
                .person(person_id),
        )?;
        Ok(CategoryTrend {
            category_id,
            category_name: category.name,
            series: aggregate::category_trend(&txs, category_id, &span),
            start_month,
            months,
            person_id,
        })
    }

    /// Two independent month blocks; no diff is computed here.
    pub fn month_comparison(&self, month_a: &str, month_b: &str, person_id: Option<i64>) -> Result<MonthComparison> {
        let month_a = periods::parse_month(month_a.trim())?;
        let month_b = periods::parse_month(month_b.trim())?;
        self.check_person_filter(person_id)?;
        let names = self.names()?;
        let block = |month: String| -> Result<MonthBlock> {
            let txs = self.flows_in_month(&month, person_id)?;
            Ok(MonthBlock {
                totals: Totals::of(&txs),
                top_categories: aggregate::top_categories(&txs, &names, COMPARE_TOP_CATEGORIES),
                month,
            })
        };
        Ok(MonthComparison {
            person_id,
            a: block(month_a)?,
            b: block(month_b)?,
        })
    }

    pub fn top_expenses(&self, month: Option<&str>, query: &ExpenseQuery) -> Result<Vec<ExpenseRow>> {
        let month = self.month(month)?;
        let range = resolve_month(&month)?;
        let txs = self.store.transactions(
            &TxFilter::new()
                .in_range(range)
                .kinds(&[TxKind::Expense])
                .person(query.person_id)
                .category(query.category_id),
        )?;
        let names = self.names()?;
        Ok(aggregate::top_expenses(&txs, query)
            .into_iter()
            .map(|t| ExpenseRow {
                person_name: names.person(t.person_id),
                category_name: names.category(t.category_id),
                id: t.id,
                date: t.date,
                amount: t.amount,
                note: t.note,
                person_id: t.person_id,
                category_id: t.category_id,
            })
            .collect())
    }

    /// Transfer pairs dated in the month, newest first.
    pub fn transfers(&self, month: Option<&str>) -> Result<TransferList> {
        let month = self.month(month)?;
        let range = resolve_month(&month)?;
        let legs = self
            .store
            .transactions(&TxFilter::new().in_range(range).kinds(&[TxKind::Transfer]))?;
        let names = self.names()?;
        let mut pairs = pair_legs(&legs);
        pairs.sort_by(|a, b| {
            b.date.cmp(&a.date).then_with(|| {
                let id = |p: &crate::transfers::TransferPair| {
                    p.out_leg.as_ref().or(p.in_leg.as_ref()).map(|l| l.id)
                };
                id(b).cmp(&id(a))
            })
        });
        Ok(TransferList {
            items: pairs.iter().map(|p| TransferView::new(p, &names)).collect(),
            month,
        })
    }

    pub fn transfer_details(&self, group_id: &str) -> Result<TransferView> {
        let legs = self
            .store
            .transactions(&TxFilter::new().kinds(&[TxKind::Transfer]).group(group_id))?;
        let pair = pair_legs(&legs)
            .into_iter()
            .next()
            .ok_or_else(|| NidoError::not_found(Dimension::TransferGroup, group_id))?;
        Ok(TransferView::new(&pair, &self.names()?))
    }
}
