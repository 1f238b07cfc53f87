// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use nido::commands::{backup, exporter};
use nido::{cli, db::init_schema};
use rusqlite::Connection;
use serde_json::Value;
use tempfile::tempdir;

fn base_conn() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    init_schema(&mut conn).unwrap();
    conn.execute_batch(
        r#"
        INSERT INTO people(id, name) VALUES (1, 'Ana');
        INSERT INTO categories(id, name, kind) VALUES (1, 'Sueldo', 'income'), (2, 'Ocio', 'expense');
        INSERT INTO accounts(id, name, kind, owner_id) VALUES (1, 'Banco', 'bank', 1), (2, 'Efectivo', 'cash', 1);
        INSERT INTO transactions(id, kind, amount, date, note, person_id, category_id) VALUES
            (1, 'expense', '200', '2025-01-05', 'cine', 1, 2),
            (2, 'income', '5000', '2025-01-01', '', 1, 1),
            (3, 'expense', '900', '2025-01-05', 'recital', 1, 2),
            (4, 'expense', '50', '2025-02-01', 'fuera de mes', 1, 2);
        INSERT INTO transactions(id, kind, amount, date, account_id, transfer_group_id, transfer_side) VALUES
            (5, 'transfer', '300', '2025-01-05', 1, 'a1b2c3d4-0000-4000-8000-000000000001', 'out'),
            (6, 'transfer', '300', '2025-01-05', 2, 'a1b2c3d4-0000-4000-8000-000000000001', 'in');
        INSERT INTO transactions(id, kind, amount, date, person_id, category_id, deleted_at) VALUES
            (7, 'expense', '1', '2025-01-06', 1, 2, '2025-01-07T00:00:00Z');
        "#,
    )
    .unwrap();
    conn
}

#[test]
fn month_csv_is_sorted_and_keeps_transfer_legs() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("enero.csv");
    let out_str = out_path.to_string_lossy().to_string();

    let matches = cli::build_cli().get_matches_from([
        "nido", "export", "month", "--month", "2025-01", "--out", &out_str,
    ]);
    let (_, sub) = matches.subcommand().unwrap();
    exporter::handle(&conn, sub).unwrap();

    let written = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "id,month,date,type,amount,person,category,note");
    assert_eq!(lines[1], "2,2025-01,2025-01-01,income,5000,Ana,Sueldo,");
    assert_eq!(lines[2], "3,2025-01,2025-01-05,expense,900,Ana,Ocio,recital");
    assert_eq!(lines[3], "1,2025-01,2025-01-05,expense,200,Ana,Ocio,cine");
    assert_eq!(lines[4], "5,2025-01,2025-01-05,transfer,300,,,");
    assert_eq!(lines[5], "6,2025-01,2025-01-05,transfer,300,,,");
    assert_eq!(lines.len(), 6);
}

#[test]
fn empty_month_still_gets_a_header() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out = dir.path().join("vacio.csv");
    let n = exporter::export_month(&conn, "2024-06", exporter::ExportFormat::Csv, &out).unwrap();
    assert_eq!(n, 0);
    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written.trim_end(), "id,month,date,type,amount,person,category,note");
}

#[test]
fn year_json_has_twelve_months() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("2025.json");
    let out_str = out_path.to_string_lossy().to_string();

    let matches = cli::build_cli().get_matches_from([
        "nido", "export", "year", "--year", "2025", "--format", "json", "--out", &out_str,
    ]);
    let (_, sub) = matches.subcommand().unwrap();
    exporter::handle(&conn, sub).unwrap();

    let v: Value = serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    let months = v.as_array().unwrap();
    assert_eq!(months.len(), 12);
    assert_eq!(months[0]["month"], "2025-01");
    assert_eq!(months[0]["income"], "5000");
    assert_eq!(months[0]["expense"], "1100");
    assert_eq!(months[0]["balance"], "3900");
    assert_eq!(months[1]["expense"], "50");
    assert_eq!(months[11]["expense"], "0");
}

#[test]
fn bad_month_token_is_rejected() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out = dir.path().join("x.csv");
    assert!(exporter::export_month(&conn, "2025-1", exporter::ExportFormat::Csv, &out).is_err());
    assert!(!out.exists());
}

#[test]
fn backup_file_restores_into_a_fresh_database() {
    let conn = base_conn();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("nido-backup.json");
    let out_str = out_path.to_string_lossy().to_string();

    let matches = cli::build_cli().get_matches_from(["nido", "backup", "--out", &out_str]);
    let (_, sub) = matches.subcommand().unwrap();
    backup::handle_backup(&conn, sub).unwrap();

    let v: Value = serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(v["app"], "nido");
    assert_eq!(v["version"], 1);
    assert_eq!(v["counts"]["transactions"], 7);
    assert_eq!(v["data"]["transactions"][0]["type"], "expense");

    let mut fresh = Connection::open_in_memory().unwrap();
    init_schema(&mut fresh).unwrap();
    let matches = cli::build_cli().get_matches_from([
        "nido", "restore", "--file", &out_str, "--mode", "replace",
    ]);
    let (_, sub) = matches.subcommand().unwrap();
    backup::handle_restore(&mut fresh, sub).unwrap();

    let out2 = dir.path().join("again.csv");
    let out1 = dir.path().join("orig.csv");
    exporter::export_month(&conn, "2025-01", exporter::ExportFormat::Csv, &out1).unwrap();
    exporter::export_month(&fresh, "2025-01", exporter::ExportFormat::Csv, &out2).unwrap();
    assert_eq!(
        std::fs::read_to_string(out1).unwrap(),
        std::fs::read_to_string(out2).unwrap()
    );
}
