// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

use crate::models::Dimension;

pub type Result<T> = std::result::Result<T, NidoError>;

/// Failures surfaced by the ledger core. The CLI maps them to messages.
#[derive(Debug, Error)]
pub enum NidoError {
    #[error("Invalid period '{0}', expected YYYY-MM (month 01..12) or YYYY (1970..2100)")]
    InvalidRangeToken(String),

    #[error("Invalid {dimension} id '{value}'")]
    InvalidDimensionFilter { dimension: Dimension, value: String },

    #[error("{dimension} '{id}' not found")]
    DimensionNotFound { dimension: Dimension, id: String },

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("Transfer {group_id} was left half-written ({written} of 2 legs stored): {source}")]
    PartialMultiWriteFailure {
        group_id: String,
        written: usize,
        source: Box<NidoError>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NidoError {
    pub fn constraint(msg: impl Into<String>) -> Self {
        NidoError::ConstraintViolation(msg.into())
    }

    pub fn not_found(dimension: Dimension, id: impl ToString) -> Self {
        NidoError::DimensionNotFound {
            dimension,
            id: id.to_string(),
        }
    }

    pub fn invalid_filter(dimension: Dimension, value: impl Into<String>) -> Self {
        NidoError::InvalidDimensionFilter {
            dimension,
            value: value.into(),
        }
    }
}
