// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Transfers are two ledger rows sharing a group id: an `out` leg on the
//! source account and an `in` leg on the destination. Reads pair them back
//! into one entity; writes always address the group.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate::NameBook;
use crate::errors::{NidoError, Result};
use crate::models::{Dimension, NewTransaction, Transaction, TransferPatch, TransferSide, TxKind};
use crate::store::{LedgerStore, LedgerWriter};

pub const NO_ACCOUNT_LABEL: &str = "(Sin cuenta)";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLeg {
    pub id: i64,
    pub account_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPair {
    pub group_id: String,
    pub out_leg: Option<TransferLeg>,
    pub in_leg: Option<TransferLeg>,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub note: String,
}

impl TransferPair {
    pub fn from_account(&self) -> Option<i64> {
        self.out_leg.as_ref().and_then(|l| l.account_id)
    }

    pub fn to_account(&self) -> Option<i64> {
        self.in_leg.as_ref().and_then(|l| l.account_id)
    }

    fn leg_mut(&mut self, side: TransferSide) -> &mut Option<TransferLeg> {
        match side {
            TransferSide::Out => &mut self.out_leg,
            TransferSide::In => &mut self.in_leg,
        }
    }
}

/// Groups transfer legs by group id, in first-seen order. The first leg seen
/// for each side wins; later duplicates are ignored.
pub fn pair_legs(txs: &[Transaction]) -> Vec<TransferPair> {
    let mut pairs: Vec<TransferPair> = Vec::new();
    for tx in txs.iter().filter(|t| t.kind == TxKind::Transfer) {
        let (Some(group_id), Some(side)) = (tx.transfer_group_id.as_ref(), tx.transfer_side)
        else {
            continue;
        };
        let leg = TransferLeg {
            id: tx.id,
            account_id: tx.account_id,
        };
        match pairs.iter_mut().find(|p| &p.group_id == group_id) {
            Some(pair) => {
                let slot = pair.leg_mut(side);
                if slot.is_none() {
                    *slot = Some(leg);
                } else {
                    warn!(%group_id, leg = tx.id, ?side, "duplicate transfer leg ignored");
                }
            }
            None => {
                let mut pair = TransferPair {
                    group_id: group_id.clone(),
                    out_leg: None,
                    in_leg: None,
                    amount: tx.amount,
                    date: tx.date,
                    note: tx.note.clone(),
                };
                *pair.leg_mut(side) = Some(leg);
                pairs.push(pair);
            }
        }
    }
    pairs
}

/// A pair with its account names resolved for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferView {
    pub group_id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub note: String,
    pub from_account_id: Option<i64>,
    pub from_account: String,
    pub to_account_id: Option<i64>,
    pub to_account: String,
    pub out_id: Option<i64>,
    pub in_id: Option<i64>,
}

impl TransferView {
    pub fn new(pair: &TransferPair, names: &NameBook) -> Self {
        let label =
            |id: Option<i64>| names.account_opt(id).unwrap_or_else(|| NO_ACCOUNT_LABEL.to_string());
        Self {
            group_id: pair.group_id.clone(),
            date: pair.date,
            amount: pair.amount,
            note: pair.note.clone(),
            from_account_id: pair.from_account(),
            from_account: label(pair.from_account()),
            to_account_id: pair.to_account(),
            to_account: label(pair.to_account()),
            out_id: pair.out_leg.as_ref().map(|l| l.id),
            in_id: pair.in_leg.as_ref().map(|l| l.id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferCreated {
    pub group_id: String,
    pub out_id: i64,
    pub in_id: i64,
}

fn require_active_account<S: LedgerStore + ?Sized>(store: &S, id: i64, role: &str) -> Result<()> {
    match store.account(id)? {
        Some(a) if a.active => Ok(()),
        Some(a) => Err(NidoError::constraint(format!(
            "The {} account '{}' is not active",
            role, a.name
        ))),
        None => Err(NidoError::not_found(Dimension::Account, id)),
    }
}

/// Validates, then writes both legs under a fresh group id.
pub fn create_transfer_pair<S>(store: &S, req: &NewTransfer) -> Result<TransferCreated>
where
    S: LedgerStore + LedgerWriter + ?Sized,
{
    if req.from_account_id == req.to_account_id {
        return Err(NidoError::constraint(
            "Source and destination accounts must be different",
        ));
    }
    if req.amount <= Decimal::ZERO {
        return Err(NidoError::constraint("Transfer amount must be greater than zero"));
    }
    require_active_account(store, req.from_account_id, "source")?;
    require_active_account(store, req.to_account_id, "destination")?;

    let group_id = Uuid::new_v4().to_string();
    let leg = |account_id: i64, side: TransferSide| NewTransaction {
        kind: TxKind::Transfer,
        amount: req.amount,
        date: req.date,
        note: req.note.trim().to_string(),
        person_id: None,
        category_id: None,
        account_id: Some(account_id),
        transfer_group_id: Some(group_id.clone()),
        transfer_side: Some(side),
    };
    let (out_id, in_id) = store.insert_transfer_legs(
        &leg(req.from_account_id, TransferSide::Out),
        &leg(req.to_account_id, TransferSide::In),
    )?;
    info!(%group_id, out_id, in_id, amount = %req.amount, "transfer created");
    Ok(TransferCreated {
        group_id,
        out_id,
        in_id,
    })
}

/// Applies the same changes to every live leg of the group.
pub fn edit_transfer_pair<S>(store: &S, group_id: &str, patch: &TransferPatch) -> Result<usize>
where
    S: LedgerWriter + ?Sized,
{
    if let Some(amount) = patch.amount {
        if amount <= Decimal::ZERO {
            return Err(NidoError::constraint("Transfer amount must be greater than zero"));
        }
    }
    let patch = TransferPatch {
        note: patch.note.as_ref().map(|n| n.trim().to_string()),
        ..patch.clone()
    };
    store.update_transfer_group(group_id, &patch)
}

pub fn delete_transfer_pair<S>(store: &S, group_id: &str) -> Result<usize>
where
    S: LedgerWriter + ?Sized,
{
    store.soft_delete_transfer_group(group_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn leg(id: i64, group: &str, side: TransferSide, account: Option<i64>) -> Transaction {
        Transaction {
            id,
            kind: TxKind::Transfer,
            amount: dec!(300),
            date: NaiveDate::from_ymd_opt(2025, 4, 10).unwrap(),
            note: "ahorro".into(),
            person_id: None,
            category_id: None,
            account_id: account,
            transfer_group_id: Some(group.into()),
            transfer_side: Some(side),
            deleted_at: None,
        }
    }

    #[test]
    fn legs_pair_into_one_transfer() {
        let rows = vec![
            leg(1, "g1", TransferSide::Out, Some(10)),
            leg(2, "g1", TransferSide::In, Some(20)),
        ];
        let pairs = pair_legs(&rows);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].from_account(), Some(10));
        assert_eq!(pairs[0].to_account(), Some(20));
        assert_eq!(pairs[0].amount, dec!(300));
        assert_eq!(pair_legs(&rows), pairs);
    }

    #[test]
    fn duplicate_legs_keep_the_first() {
        let rows = vec![
            leg(1, "g1", TransferSide::Out, Some(10)),
            leg(2, "g1", TransferSide::Out, Some(99)),
            leg(3, "g1", TransferSide::In, Some(20)),
        ];
        let pairs = pair_legs(&rows);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].out_leg.as_ref().map(|l| l.id), Some(1));
    }

    #[test]
    fn missing_leg_shows_no_account() {
        let rows = vec![leg(2, "g2", TransferSide::In, Some(20))];
        let pairs = pair_legs(&rows);
        assert!(pairs[0].out_leg.is_none());
        let view = TransferView::new(&pairs[0], &NameBook::default());
        assert_eq!(view.from_account, NO_ACCOUNT_LABEL);
        assert_eq!(view.from_account_id, None);
    }
}
