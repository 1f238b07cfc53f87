// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod aggregate;
pub mod budgets;
pub mod cli;
pub mod db;
pub mod errors;
pub mod models;
pub mod periods;
pub mod reports;
pub mod store;
pub mod transfers;
pub mod utils;
pub mod commands;
