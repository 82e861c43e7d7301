// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - command line parsing and event stream handling

use super::*;
use chrono::{TimeZone, Utc};
use ddnsync::ledger::StatusKey;
use std::io::Write;

#[test]
fn test_cli_parses_run() {
    let cli = Cli::try_parse_from(["ddnsync", "run", "--config", "/etc/ddnsync.yaml"]).unwrap();
    match cli.command {
        Commands::Run { config } => assert_eq!(config, PathBuf::from("/etc/ddnsync.yaml")),
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn test_cli_parses_recreate() {
    let cli = Cli::try_parse_from([
        "ddnsync",
        "recreate",
        "-c",
        "config.yaml",
        "--binding",
        r#"{"id":1,"address":"10.0.0.1"}"#,
    ])
    .unwrap();
    assert!(matches!(cli.command, Commands::Recreate { .. }));
}

#[test]
fn test_cli_requires_config() {
    assert!(Cli::try_parse_from(["ddnsync", "status"]).is_err());
}

#[test]
fn test_parse_event_skips_blank_lines() {
    assert!(parse_event("   ").unwrap().is_none());
}

#[test]
fn test_parse_event_binding_deleted() {
    let line = r#"{"event":"binding_deleted","binding":{"id":3,"address":"10.0.0.3","dnsName":"gone.example.com"}}"#;
    let event = parse_event(line).unwrap().unwrap();
    assert_eq!(event.kind(), "binding_deleted");
}

#[test]
fn test_parse_event_rejects_garbage() {
    assert!(parse_event("{not json").is_err());
}

#[test]
fn test_format_row() {
    let mut row = DnsStatus::new(StatusKey::IpAddress(12));
    row.set_action(Direction::Forward, ddnsync::model::Action::Create);
    row.set_rcode(Direction::Forward, ResultCode::NO_ERROR);
    row.set_action(Direction::Reverse, ddnsync::model::Action::Delete);
    row.set_rcode(Direction::Reverse, ResultCode::NO_ZONE);
    row.last_update = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

    assert_eq!(
        format_row(&row),
        "ip-address/12 updated 2025-03-01T12:00:00+00:00, forward create: Success, reverse delete: No zone configured"
    );
}

#[test]
fn test_format_row_pending() {
    let mut row = DnsStatus::new(StatusKey::ExtraName(5));
    row.set_action(Direction::Forward, ddnsync::model::Action::Delete);

    assert!(format_row(&row).ends_with("forward delete: pending"));
}

#[tokio::test]
async fn test_open_store_reads_existing_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("status.json");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        r#"[{{"ip_address":7,"last_update":"2025-03-01T12:00:00Z","forward_action":"create","forward_rcode":0}}]"#
    )
    .unwrap();

    let mut config = Config::default();
    config.ledger.path = Some(path);

    let store = open_store(&config).await.unwrap();
    let rows = store.list().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, StatusKey::IpAddress(7));
}
