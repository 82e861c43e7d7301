// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `ledger.rs`

use super::*;
use tempfile::TempDir;

#[test]
fn test_set_action_clears_previous_rcode() {
    let mut status = DnsStatus::new(StatusKey::IpAddress(1));
    status.set_action(Direction::Forward, Action::Create);
    status.set_rcode(Direction::Forward, ResultCode::NO_ERROR);

    status.set_action(Direction::Forward, Action::Delete);

    assert_eq!(status.action(Direction::Forward), Some(Action::Delete));
    assert_eq!(status.rcode(Direction::Forward), None);
    assert_eq!(status.action(Direction::Reverse), None);
}

#[test]
fn test_row_uses_stable_field_names() {
    let mut status = DnsStatus::new(StatusKey::IpAddress(12));
    status.set_action(Direction::Forward, Action::Create);
    status.set_rcode(Direction::Forward, ResultCode::NO_ERROR);
    status.set_action(Direction::Reverse, Action::Delete);
    status.set_rcode(Direction::Reverse, ResultCode::NO_ZONE);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["ip_address"], 12);
    assert_eq!(json["forward_action"], "create");
    assert_eq!(json["forward_rcode"], 0);
    assert_eq!(json["reverse_action"], "delete");
    assert_eq!(json["reverse_rcode"], 4095);
    assert!(json["last_update"].is_string());

    let parsed: DnsStatus = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, status);
}

#[test]
fn test_extra_name_row_has_no_reverse_fields() {
    let mut status = DnsStatus::new(StatusKey::ExtraName(7));
    status.set_action(Direction::Forward, Action::Create);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["extra_name"], 7);
    assert!(json.get("reverse_action").is_none());
    assert!(json.get("ip_address").is_none());
}

#[test]
fn test_apply_touches_one_direction() {
    let mut status = DnsStatus::new(StatusKey::IpAddress(1));
    status.apply(StatusChange::Attempt(Direction::Reverse, Action::Delete));
    status.apply(StatusChange::Outcome(Direction::Reverse, ResultCode::REFUSED));

    assert_eq!(status.action(Direction::Reverse), Some(Action::Delete));
    assert_eq!(status.rcode(Direction::Reverse), Some(ResultCode::REFUSED));
    assert_eq!(status.action(Direction::Forward), None);
    assert_eq!(status.rcode(Direction::Forward), None);
}

#[tokio::test]
async fn test_memory_store_insert_and_update_semantics() {
    let store = MemoryStatusStore::new();
    let key = StatusKey::IpAddress(1);
    let change = StatusChange::Attempt(Direction::Forward, Action::Create);

    assert!(matches!(
        store.update(key, change).await,
        Err(LedgerError::NotFound { .. })
    ));
    store.insert(&DnsStatus::new(key)).await.unwrap();
    assert!(matches!(
        store.insert(&DnsStatus::new(key)).await,
        Err(LedgerError::AlreadyExists { .. })
    ));
    store.update(key, change).await.unwrap();

    let row = store.get(key).await.unwrap().unwrap();
    assert_eq!(row.forward_action, Some(Action::Create));
    assert_eq!(store.get(StatusKey::ExtraName(1)).await.unwrap(), None);
}

/// Reports the row missing on the first update, then creates it itself, the
/// way a concurrent writer would between our update and insert.
struct LateCreator {
    inner: MemoryStatusStore,
    raced: Mutex<bool>,
}

#[async_trait]
impl StatusStore for LateCreator {
    async fn get(&self, key: StatusKey) -> Result<Option<DnsStatus>, LedgerError> {
        self.inner.get(key).await
    }

    async fn insert(&self, status: &DnsStatus) -> Result<(), LedgerError> {
        self.inner.insert(status).await
    }

    async fn update(&self, key: StatusKey, change: StatusChange) -> Result<(), LedgerError> {
        let mut raced = self.raced.lock().await;
        if !*raced {
            *raced = true;
            let mut other = DnsStatus::new(key);
            other.apply(StatusChange::Attempt(Direction::Reverse, Action::Create));
            self.inner.insert(&other).await?;
            return Err(LedgerError::NotFound {
                key: key.to_string(),
            });
        }
        self.inner.update(key, change).await
    }

    async fn list(&self) -> Result<Vec<DnsStatus>, LedgerError> {
        self.inner.list().await
    }
}

#[tokio::test]
async fn test_lost_insert_race_falls_back_to_update() {
    let store = Arc::new(LateCreator {
        inner: MemoryStatusStore::new(),
        raced: Mutex::new(false),
    });
    let ledger = StatusLedger::new(store.clone());
    let key = StatusKey::IpAddress(42);

    ledger
        .record(key, StatusChange::Attempt(Direction::Forward, Action::Delete))
        .await
        .unwrap();

    let rows = store.list().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].forward_action, Some(Action::Delete));
    assert_eq!(rows[0].reverse_action, Some(Action::Create));
}

#[tokio::test]
async fn test_concurrent_records_from_tasks() {
    let store = Arc::new(MemoryStatusStore::new());
    let ledger = StatusLedger::new(store.clone());
    let key = StatusKey::ExtraName(3);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .record(key, StatusChange::Attempt(Direction::Forward, Action::Create))
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_interleaved_directions_keep_both_results() {
    let store = Arc::new(MemoryStatusStore::new());
    let ledger = StatusLedger::new(store.clone());
    let key = StatusKey::IpAddress(5);

    // A forward job and a reverse job for the same binding, interleaved
    ledger
        .record(key, StatusChange::Attempt(Direction::Forward, Action::Create))
        .await
        .unwrap();
    ledger
        .record(key, StatusChange::Attempt(Direction::Reverse, Action::Create))
        .await
        .unwrap();
    ledger
        .record(key, StatusChange::Outcome(Direction::Reverse, ResultCode::NO_ERROR))
        .await
        .unwrap();
    ledger
        .record(key, StatusChange::Outcome(Direction::Forward, ResultCode::REFUSED))
        .await
        .unwrap();

    let row = store.get(key).await.unwrap().unwrap();
    assert_eq!(row.forward_action, Some(Action::Create));
    assert_eq!(row.forward_rcode, Some(ResultCode::REFUSED));
    assert_eq!(row.reverse_action, Some(Action::Create));
    assert_eq!(row.reverse_rcode, Some(ResultCode::NO_ERROR));
}

/// Every operation fails with a storage error.
struct BrokenStore;

#[async_trait]
impl StatusStore for BrokenStore {
    async fn get(&self, _key: StatusKey) -> Result<Option<DnsStatus>, LedgerError> {
        Err(LedgerError::Storage("disk full".to_string()))
    }

    async fn insert(&self, _status: &DnsStatus) -> Result<(), LedgerError> {
        Err(LedgerError::Storage("disk full".to_string()))
    }

    async fn update(&self, _key: StatusKey, _change: StatusChange) -> Result<(), LedgerError> {
        Err(LedgerError::Storage("disk full".to_string()))
    }

    async fn list(&self) -> Result<Vec<DnsStatus>, LedgerError> {
        Err(LedgerError::Storage("disk full".to_string()))
    }
}

#[tokio::test]
async fn test_failed_write_is_counted_not_raised() {
    let ledger = StatusLedger::new(Arc::new(BrokenStore));
    let change = StatusChange::Outcome(Direction::Forward, ResultCode::NO_ERROR);

    assert!(matches!(
        ledger.record(StatusKey::IpAddress(1), change).await,
        Err(LedgerError::Storage(_))
    ));
    ledger.record_logged(StatusKey::IpAddress(1), change).await;

    assert!(
        metrics::ERRORS_TOTAL
            .with_label_values(&["LedgerStorageError"])
            .get()
            > 0.0
    );
}

#[tokio::test]
async fn test_file_store_update_is_persisted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("status.json");
    let key = StatusKey::IpAddress(11);

    {
        let ledger = StatusLedger::new(Arc::new(FileStatusStore::open(&path).await.unwrap()));
        ledger
            .record(key, StatusChange::Attempt(Direction::Forward, Action::Create))
            .await
            .unwrap();
        ledger
            .record(key, StatusChange::Outcome(Direction::Forward, ResultCode::NO_ERROR))
            .await
            .unwrap();
    }

    let reopened = FileStatusStore::open(&path).await.unwrap();
    let row = reopened.get(key).await.unwrap().unwrap();
    assert_eq!(row.forward_rcode, Some(ResultCode::NO_ERROR));
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("status.json");

    {
        let store = FileStatusStore::open(&path).await.unwrap();
        let mut status = DnsStatus::new(StatusKey::IpAddress(9));
        status.set_action(Direction::Forward, Action::Create);
        status.set_rcode(Direction::Forward, ResultCode::NOT_AUTH);
        store.insert(&status).await.unwrap();
        store.insert(&DnsStatus::new(StatusKey::ExtraName(2))).await.unwrap();
    }

    let reopened = FileStatusStore::open(&path).await.unwrap();
    let rows = reopened.list().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key, StatusKey::IpAddress(9));
    assert_eq!(rows[0].forward_rcode, Some(ResultCode::NOT_AUTH));
    assert!(!path.with_extension("tmp").exists());
}

#[tokio::test]
async fn test_file_store_rejected_insert_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("status.json");
    let store = FileStatusStore::open(&path).await.unwrap();

    let status = DnsStatus::new(StatusKey::IpAddress(1));
    store.insert(&status).await.unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    assert!(store.insert(&status).await.is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[tokio::test]
async fn test_file_store_rejects_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("status.json");
    std::fs::write(&path, "not json").unwrap();

    let err = FileStatusStore::open(&path).await.err().unwrap();
    assert!(matches!(err, LedgerError::Storage(_)));
}
