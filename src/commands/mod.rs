// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod backup;
pub mod budgets;
pub mod categories;
pub mod config;
pub mod exporter;
pub mod people;
pub mod reports;
pub mod transactions;
pub mod transfers;

use anyhow::{anyhow, Result};
use clap::ArgMatches;

/// Value of a required option.
pub(crate) fn arg<'a>(m: &'a ArgMatches, id: &str) -> Result<&'a str> {
    m.get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("--{} is required", id))
}

pub(crate) fn opt_arg<'a>(m: &'a ArgMatches, id: &str) -> Option<&'a str> {
    m.try_get_one::<String>(id)
        .ok()
        .flatten()
        .map(String::as_str)
}

pub(crate) fn json_flags(m: &ArgMatches) -> (bool, bool) {
    (m.get_flag("json"), m.get_flag("jsonl"))
}
