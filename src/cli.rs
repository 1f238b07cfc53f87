// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{value_parser, Arg, ArgAction, Command};

fn json_args() -> [Arg; 2] {
    [
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print pretty JSON"),
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print JSON lines"),
    ]
}

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).num_args(1).help(help)
}

fn req(name: &'static str, help: &'static str) -> Arg {
    opt(name, help).required(true)
}

fn month_arg() -> Arg {
    opt("month", "Month YYYY-MM (defaults to the current month)")
}

fn person_filter() -> Arg {
    opt("person", "Restrict to one person (id or name)")
}

fn people_cmd() -> Command {
    Command::new("person")
        .about("Household members")
        .subcommand_required(true)
        .subcommand(Command::new("add").arg(req("name", "Display name")))
        .subcommand(
            Command::new("list")
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Include inactive people"),
                )
                .args(json_args()),
        )
        .subcommand(
            Command::new("deactivate")
                .about("Deactivate a person with no recorded transactions")
                .arg(req("person", "Person id or name")),
        )
}

fn category_cmd() -> Command {
    Command::new("category")
        .about("Income and expense categories")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(req("name", "Category name"))
                .arg(
                    req("kind", "income or expense")
                        .value_parser(["income", "expense"]),
                ),
        )
        .subcommand(Command::new("list").args(json_args()))
        .subcommand(Command::new("seed").about("Create the default categories if none exist"))
}

fn account_cmd() -> Command {
    Command::new("account")
        .about("Cash, bank, wallet and credit accounts")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(req("name", "Account name"))
                .arg(
                    req("kind", "cash, bank, wallet or credit")
                        .value_parser(["cash", "bank", "wallet", "credit"]),
                )
                .arg(req("owner", "Owner person (id or name)"))
                .arg(
                    opt("statement-day", "Credit card statement day (1..28)")
                        .value_parser(value_parser!(u32)),
                )
                .arg(opt("due-day", "Credit card due day (1..28)").value_parser(value_parser!(u32))),
        )
        .subcommand(
            Command::new("list")
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Include inactive accounts"),
                )
                .args(json_args()),
        )
        .subcommand(Command::new("deactivate").arg(req("account", "Account id or name")))
}

fn tx_cmd() -> Command {
    Command::new("tx")
        .about("Income and expense transactions")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(req("kind", "income or expense").value_parser(["income", "expense"]))
                .arg(req("amount", "Positive amount"))
                .arg(req("person", "Person id or name"))
                .arg(req("category", "Category id or name"))
                .arg(opt("account", "Account id or name"))
                .arg(opt("date", "YYYY-MM-DD (defaults to today, UTC)"))
                .arg(opt("note", "Free text")),
        )
        .subcommand(
            Command::new("list")
                .arg(month_arg())
                .arg(person_filter())
                .arg(opt("category", "Category id or name"))
                .arg(opt("account", "Account id or name"))
                .arg(opt("search", "Case-insensitive text in the note"))
                .arg(
                    opt("limit", "Maximum rows")
                        .value_parser(value_parser!(usize))
                        .default_value("200"),
                )
                .args(json_args()),
        )
        .subcommand(
            Command::new("edit")
                .arg(req("id", "Transaction id"))
                .arg(opt("kind", "income or expense").value_parser(["income", "expense"]))
                .arg(opt("amount", "Positive amount"))
                .arg(opt("person", "Person id or name"))
                .arg(opt("category", "Category id or name"))
                .arg(opt("date", "YYYY-MM-DD"))
                .arg(opt("note", "Free text")),
        )
        .subcommand(Command::new("rm").arg(req("id", "Transaction id")))
}

fn transfer_cmd() -> Command {
    Command::new("transfer")
        .about("Money moved between two accounts")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .arg(req("from", "Source account id or name"))
                .arg(req("to", "Destination account id or name"))
                .arg(req("amount", "Positive amount"))
                .arg(opt("date", "YYYY-MM-DD (defaults to today, UTC)"))
                .arg(opt("note", "Free text")),
        )
        .subcommand(Command::new("list").arg(month_arg()).args(json_args()))
        .subcommand(
            Command::new("show")
                .arg(req("group", "Transfer group id"))
                .args(json_args()),
        )
        .subcommand(
            Command::new("edit")
                .arg(req("group", "Transfer group id"))
                .arg(opt("amount", "Positive amount"))
                .arg(opt("date", "YYYY-MM-DD"))
                .arg(opt("note", "Free text")),
        )
        .subcommand(Command::new("rm").arg(req("group", "Transfer group id")))
}

fn budget_cmd(name: &'static str, dimension: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .subcommand_required(true)
        .subcommand(
            Command::new("set")
                .arg(req("month", "Month YYYY-MM"))
                .arg(req(dimension, "Id or name"))
                .arg(req("amount", "Monthly target; 0 removes it")),
        )
        .subcommand(Command::new("report").arg(month_arg()).args(json_args()))
}

fn report_cmd() -> Command {
    Command::new("report")
        .about("Aggregated views")
        .subcommand_required(true)
        .subcommand(
            Command::new("summary")
                .about("Monthly totals and per-person breakdown")
                .arg(month_arg())
                .args(json_args()),
        )
        .subcommand(
            Command::new("monthly")
                .about("Totals, daily series and top categories")
                .arg(month_arg())
                .arg(person_filter())
                .args(json_args()),
        )
        .subcommand(
            Command::new("daily")
                .about("Days with activity in a month")
                .arg(month_arg())
                .arg(person_filter())
                .args(json_args()),
        )
        .subcommand(
            Command::new("accounts")
                .about("Per-account flow with recent transactions")
                .arg(month_arg())
                .args(json_args()),
        )
        .subcommand(
            Command::new("year")
                .about("Twelve month balance")
                .arg(opt("year", "Year YYYY (defaults to the current year)"))
                .arg(person_filter())
                .args(json_args()),
        )
        .subcommand(
            Command::new("trend")
                .about("Monthly spend in one category")
                .arg(req("category", "Category id or name"))
                .arg(opt("start", "First month YYYY-MM"))
                .arg(opt("months", "Number of months (1..36)").value_parser(value_parser!(u32)))
                .arg(person_filter())
                .args(json_args()),
        )
        .subcommand(
            Command::new("compare")
                .about("Two months side by side")
                .arg(req("a", "First month YYYY-MM"))
                .arg(req("b", "Second month YYYY-MM"))
                .arg(person_filter())
                .args(json_args()),
        )
        .subcommand(
            Command::new("profile")
                .about("One person's totals and change vs the previous month")
                .arg(req("person", "Person id or name"))
                .arg(month_arg())
                .args(json_args()),
        )
        .subcommand(
            Command::new("top-expenses")
                .about("Largest expenses in a month")
                .arg(month_arg())
                .arg(opt("search", "Case-insensitive text in the note"))
                .arg(person_filter())
                .arg(opt("category", "Category id or name"))
                .arg(opt("limit", "1..50, default 10").value_parser(value_parser!(usize)))
                .args(json_args()),
        )
        .subcommand(
            Command::new("dashboard")
                .about("Monthly summary with budget alerts")
                .arg(month_arg())
                .args(json_args()),
        )
}

fn export_cmd() -> Command {
    let format = || {
        opt("format", "csv or json")
            .value_parser(["csv", "json"])
            .default_value("csv")
    };
    Command::new("export")
        .about("Write transactions to a file")
        .subcommand_required(true)
        .subcommand(
            Command::new("month")
                .arg(req("month", "Month YYYY-MM"))
                .arg(format())
                .arg(req("out", "Output path")),
        )
        .subcommand(
            Command::new("year")
                .arg(req("year", "Year YYYY"))
                .arg(format())
                .arg(req("out", "Output path")),
        )
}

pub fn build_cli() -> Command {
    Command::new("nido")
        .about("Household income, expenses, budgets and transfers")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("config")
                .about("Settings")
                .subcommand_required(true)
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                )
                .subcommand(Command::new("get").arg(Arg::new("key").required(true))),
        )
        .subcommand(people_cmd())
        .subcommand(category_cmd())
        .subcommand(account_cmd())
        .subcommand(tx_cmd())
        .subcommand(transfer_cmd())
        .subcommand(budget_cmd("budget", "category", "Category budgets"))
        .subcommand(budget_cmd("person-budget", "person", "Person budgets"))
        .subcommand(report_cmd())
        .subcommand(export_cmd())
        .subcommand(
            Command::new("backup")
                .about("Dump people, categories, budgets and transactions to JSON")
                .arg(req("out", "Output path")),
        )
        .subcommand(
            Command::new("restore")
                .about("Load a backup file")
                .arg(req("file", "Backup path"))
                .arg(
                    opt("mode", "merge keeps existing rows, replace clears them first")
                        .value_parser(["merge", "replace"])
                        .default_value("merge"),
                ),
        )
}
