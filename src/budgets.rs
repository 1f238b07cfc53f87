// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::errors::{NidoError, Result};
use crate::models::{CategoryKind, Dimension, Transaction, TxKind};
use crate::periods::parse_month;
use crate::store::{LedgerStore, LedgerWriter};

/// Share of the budget at which a row starts warning.
const WARN_RATIO: Decimal = Decimal::from_parts(8, 0, 0, false, 1);
pub const ALERTS_PER_SCOPE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    None,
    Ok,
    Warn,
    Over,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::None => "none",
            BudgetStatus::Ok => "ok",
            BudgetStatus::Warn => "warn",
            BudgetStatus::Over => "over",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetAlert {
    pub status: BudgetStatus,
    pub percent: i64,
}

/// `spent / budget * 100` rounded half away from zero.
pub fn percent_used(spent: Decimal, budget: Decimal) -> i64 {
    if budget <= Decimal::ZERO {
        return 0;
    }
    spent
        .checked_div(budget)
        .and_then(|r| r.checked_mul(Decimal::ONE_HUNDRED))
        .map(|p| p.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|p| p.to_i64())
        .unwrap_or(i64::MAX)
}

/// Equal to the budget is still `ok`; 80% is already `warn`.
pub fn classify(spent: Decimal, budget: Decimal) -> BudgetAlert {
    if budget <= Decimal::ZERO {
        return BudgetAlert {
            status: BudgetStatus::None,
            percent: 0,
        };
    }
    let percent = percent_used(spent, budget);
    let status = if spent > budget {
        BudgetStatus::Over
    } else if spent >= budget * WARN_RATIO {
        BudgetStatus::Warn
    } else {
        BudgetStatus::Ok
    };
    BudgetAlert { status, percent }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetScope {
    Category,
    Person,
}

impl BudgetScope {
    pub fn table(&self) -> &'static str {
        match self {
            BudgetScope::Category => "budgets",
            BudgetScope::Person => "person_budgets",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            BudgetScope::Category => "category_id",
            BudgetScope::Person => "person_id",
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            BudgetScope::Category => Dimension::Category,
            BudgetScope::Person => Dimension::Person,
        }
    }
}

/// Serialises as `categoryId` or `personId` next to the other row fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BudgetKey {
    CategoryId(i64),
    PersonId(i64),
}

impl BudgetKey {
    pub fn new(scope: BudgetScope, id: i64) -> Self {
        match scope {
            BudgetScope::Category => BudgetKey::CategoryId(id),
            BudgetScope::Person => BudgetKey::PersonId(id),
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            BudgetKey::CategoryId(id) | BudgetKey::PersonId(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetRow {
    #[serde(flatten)]
    pub key: BudgetKey,
    pub name: String,
    pub budget: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub percent: i64,
    pub status: BudgetStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BudgetTotals {
    pub budget: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub percent: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSheet {
    pub month: String,
    pub scope: BudgetScope,
    pub rows: Vec<BudgetRow>,
    pub totals: BudgetTotals,
}

/// Expense spent per dimension id. Rows without that dimension are skipped.
pub fn spent_by(txs: &[Transaction], scope: BudgetScope) -> HashMap<i64, Decimal> {
    let mut out: HashMap<i64, Decimal> = HashMap::new();
    for tx in txs.iter().filter(|t| t.kind == TxKind::Expense) {
        let id = match scope {
            BudgetScope::Category => tx.category_id,
            BudgetScope::Person => tx.person_id,
        };
        if let Some(id) = id {
            *out.entry(id).or_default() += tx.amount;
        }
    }
    out
}

/// One row per `(id, name)` in `dimensions`, in the given order.
pub fn build_sheet(
    month: &str,
    scope: BudgetScope,
    dimensions: &[(i64, String)],
    budgets: &HashMap<i64, Decimal>,
    spent: &HashMap<i64, Decimal>,
) -> BudgetSheet {
    let rows: Vec<BudgetRow> = dimensions
        .iter()
        .map(|(id, name)| {
            let budget = budgets.get(id).copied().unwrap_or_default();
            let spent = spent.get(id).copied().unwrap_or_default();
            let alert = classify(spent, budget);
            BudgetRow {
                key: BudgetKey::new(scope, *id),
                name: name.clone(),
                budget,
                spent,
                remaining: budget - spent,
                percent: alert.percent,
                status: alert.status,
            }
        })
        .collect();

    let budget: Decimal = rows
        .iter()
        .map(|r| r.budget)
        .filter(|b| *b > Decimal::ZERO)
        .sum();
    let spent: Decimal = rows.iter().map(|r| r.spent).sum();
    BudgetSheet {
        month: month.to_string(),
        scope,
        totals: BudgetTotals {
            budget,
            spent,
            remaining: budget - spent,
            percent: percent_used(spent, budget),
        },
        rows,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BudgetAlerts {
    pub over: Vec<BudgetRow>,
    pub warn: Vec<BudgetRow>,
}

/// Rows in `warn` or `over`, most consumed first, at most `cap` of each.
pub fn alerts(sheet: &BudgetSheet, cap: usize) -> BudgetAlerts {
    let pick = |status: BudgetStatus| {
        let mut rows: Vec<BudgetRow> = sheet
            .rows
            .iter()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.percent.cmp(&a.percent).then(a.key.id().cmp(&b.key.id())));
        rows.truncate(cap);
        rows
    };
    BudgetAlerts {
        over: pick(BudgetStatus::Over),
        warn: pick(BudgetStatus::Warn),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetChange {
    Saved,
    /// An amount of zero removes the target.
    Cleared,
}

/// Upserts one monthly target after checking the dimension it points at.
pub fn set_budget<S>(
    store: &S,
    scope: BudgetScope,
    month: &str,
    dimension_id: i64,
    amount: Decimal,
) -> Result<BudgetChange>
where
    S: LedgerStore + LedgerWriter + ?Sized,
{
    let month = parse_month(month)?;
    if amount < Decimal::ZERO {
        return Err(NidoError::constraint("Budget amount must be zero or positive"));
    }
    match scope {
        BudgetScope::Category => {
            let category = store
                .category(dimension_id)?
                .ok_or_else(|| NidoError::not_found(Dimension::Category, dimension_id))?;
            if category.kind != CategoryKind::Expense {
                return Err(NidoError::constraint(format!(
                    "Only expense categories can have a budget ('{}' is {})",
                    category.name,
                    category.kind.as_str()
                )));
            }
        }
        BudgetScope::Person => {
            let person = store
                .person(dimension_id)?
                .ok_or_else(|| NidoError::not_found(Dimension::Person, dimension_id))?;
            if !person.active {
                return Err(NidoError::constraint(format!(
                    "Person '{}' is not active",
                    person.name
                )));
            }
        }
    }
    if amount.is_zero() {
        store.delete_budget(scope, &month, dimension_id)?;
        return Ok(BudgetChange::Cleared);
    }
    store.upsert_budget(scope, &month, dimension_id, amount)?;
    Ok(BudgetChange::Saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify(dec!(80), dec!(100)).status, BudgetStatus::Warn);
        assert_eq!(classify(dec!(79), dec!(100)).status, BudgetStatus::Ok);
        assert_eq!(classify(dec!(100), dec!(100)).status, BudgetStatus::Ok);
        assert_eq!(classify(dec!(101), dec!(100)).status, BudgetStatus::Over);
        assert_eq!(classify(dec!(500), dec!(0)).status, BudgetStatus::None);
        assert_eq!(classify(dec!(0), dec!(-10)).percent, 0);
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(classify(dec!(1500), dec!(1200)).percent, 125);
        assert_eq!(percent_used(dec!(1), dec!(8)), 13);
        assert_eq!(percent_used(dec!(1), dec!(3)), 33);
        assert_eq!(percent_used(dec!(2), dec!(3)), 67);
    }

    #[test]
    fn overspent_row_keeps_negative_remaining() {
        let budgets = HashMap::from([(1, dec!(1200))]);
        let spent = HashMap::from([(1, dec!(1500)), (2, dec!(30))]);
        let dims = vec![(1, "Food".to_string()), (2, "Ocio".to_string())];
        let sheet = build_sheet("2025-03", BudgetScope::Category, &dims, &budgets, &spent);

        let food = &sheet.rows[0];
        assert_eq!(food.status, BudgetStatus::Over);
        assert_eq!(food.percent, 125);
        assert_eq!(food.remaining, dec!(-300));
        assert_eq!(sheet.rows[1].status, BudgetStatus::None);

        assert_eq!(sheet.totals.budget, dec!(1200));
        assert_eq!(sheet.totals.spent, dec!(1530));
        assert_eq!(sheet.totals.remaining, dec!(-330));
        assert_eq!(sheet.totals.percent, 128);

        let json = serde_json::to_value(food).unwrap();
        assert_eq!(json["categoryId"], 1);
        assert_eq!(json["status"], "over");
    }

    #[test]
    fn alerts_are_capped_and_split() {
        let dims: Vec<(i64, String)> = (1..=9).map(|i| (i, format!("c{i}"))).collect();
        let budgets: HashMap<i64, Decimal> = (1..=9).map(|i| (i, dec!(100))).collect();
        let mut spent: HashMap<i64, Decimal> = (1..=8).map(|i| (i, dec!(150))).collect();
        spent.insert(9, dec!(90));
        let sheet = build_sheet("2025-03", BudgetScope::Person, &dims, &budgets, &spent);
        let a = alerts(&sheet, ALERTS_PER_SCOPE);
        assert_eq!(a.over.len(), 6);
        assert_eq!(a.warn.len(), 1);
        assert_eq!(a.warn[0].key, BudgetKey::PersonId(9));
    }
}
