// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{NidoError, Result};

/// Direction of a ledger row. Amounts are always stored positive; the sign
/// is derived from the kind (and the transfer side) when reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Income,
    Expense,
    Transfer,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Income => "income",
            TxKind::Expense => "expense",
            TxKind::Transfer => "transfer",
        }
    }
}

impl FromStr for TxKind {
    type Err = NidoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "income" => Ok(TxKind::Income),
            "expense" => Ok(TxKind::Expense),
            "transfer" => Ok(TxKind::Transfer),
            other => Err(NidoError::constraint(format!(
                "Unknown transaction kind '{}' (use income|expense)",
                other
            ))),
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        }
    }

    /// Transaction kind a category of this kind may be attached to.
    pub fn tx_kind(&self) -> TxKind {
        match self {
            CategoryKind::Income => TxKind::Income,
            CategoryKind::Expense => TxKind::Expense,
        }
    }
}

impl FromStr for CategoryKind {
    type Err = NidoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            other => Err(NidoError::constraint(format!(
                "Unknown category kind '{}' (use income|expense)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Cash,
    Bank,
    Wallet,
    Credit,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Cash => "cash",
            AccountKind::Bank => "bank",
            AccountKind::Wallet => "wallet",
            AccountKind::Credit => "credit",
        }
    }
}

impl FromStr for AccountKind {
    type Err = NidoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "cash" => Ok(AccountKind::Cash),
            "bank" => Ok(AccountKind::Bank),
            "wallet" => Ok(AccountKind::Wallet),
            "credit" => Ok(AccountKind::Credit),
            other => Err(NidoError::constraint(format!(
                "Unknown account kind '{}' (use cash|bank|wallet|credit)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferSide {
    In,
    Out,
}

impl TransferSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferSide::In => "in",
            TransferSide::Out => "out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(TransferSide::In),
            "out" => Some(TransferSide::Out),
            _ => None,
        }
    }
}

/// The reference dimensions a report can be filtered or budgeted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Person,
    Category,
    Account,
    Transaction,
    TransferGroup,
}

impl Dimension {
    pub fn table(&self) -> &'static str {
        match self {
            Dimension::Person => "people",
            Dimension::Category => "categories",
            Dimension::Account => "accounts",
            Dimension::Transaction => "transactions",
            Dimension::TransferGroup => "transactions",
        }
    }

    /// Parses a store identifier. Ids are positive integers.
    pub fn parse_id(&self, raw: &str) -> Result<i64> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NidoError::invalid_filter(*self, raw));
        }
        match trimmed.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(NidoError::invalid_filter(*self, raw)),
        }
    }

    pub fn parse_opt_id(&self, raw: Option<&str>) -> Result<Option<i64>> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => self.parse_id(s).map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dimension::Person => "person",
            Dimension::Category => "category",
            Dimension::Account => "account",
            Dimension::Transaction => "transaction",
            Dimension::TransferGroup => "transfer group",
        })
    }
}

/// Transfer group ids are UUIDs; anything else cannot match a stored group.
pub fn parse_group_id(raw: &str) -> Result<String> {
    uuid::Uuid::parse_str(raw.trim())
        .map(|u| u.to_string())
        .map_err(|_| NidoError::invalid_filter(Dimension::TransferGroup, raw))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub kind: CategoryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditTerms {
    pub statement_day: u32,
    pub due_day: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub kind: AccountKind,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_terms: Option<CreditTerms>,
    #[serde(default)]
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub kind: TxKind,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub person_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub account_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_side: Option<TransferSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

impl Transaction {
    pub fn is_flow(&self) -> bool {
        matches!(self.kind, TxKind::Income | TxKind::Expense)
    }
}

/// A row to be written. The store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub kind: TxKind,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub note: String,
    pub person_id: Option<i64>,
    pub category_id: Option<i64>,
    pub account_id: Option<i64>,
    pub transfer_group_id: Option<String>,
    pub transfer_side: Option<TransferSide>,
}

/// Field changes for a single income/expense row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxPatch {
    pub kind: Option<TxKind>,
    pub amount: Option<Decimal>,
    pub person_id: Option<i64>,
    pub category_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub note: Option<String>,
}

/// Field changes applied to both legs of a transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferPatch {
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
    pub note: Option<String>,
}
