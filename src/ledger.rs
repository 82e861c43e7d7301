// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status ledger.
//!
//! One row per binding (keyed by the inventory address record) and one row per
//! auxiliary name. A row holds the last action attempted in each direction and
//! the code it ended with. Rows are created lazily on the first attempt and
//! updated in place afterwards. This crate never deletes them.
//!
//! # Write ordering
//!
//! Jobs persist the action *before* contacting the server, with the code
//! cleared, and persist the code afterwards. A row showing an action without a
//! code is an attempt that never finished.
//!
//! # Persisted schema
//!
//! Rows are read by external reporting, so the field names below are stable:
//!
//! ```json
//! {
//!   "ip_address": 12,
//!   "last_update": "2025-01-01T00:00:00Z",
//!   "forward_action": "create",
//!   "forward_rcode": 0,
//!   "reverse_action": "delete",
//!   "reverse_rcode": 4095
//! }
//! ```
//!
//! Auxiliary name rows carry `extra_name` instead of `ip_address` and never
//! hold reverse fields.

use crate::dns_errors::{DnsError, LedgerError};
use crate::metrics;
use crate::model::{Action, Direction, ResultCode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Identifies the inventory record a status row belongs to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StatusKey {
    /// Primary address record of a binding
    IpAddress(u64),
    /// Auxiliary name record
    ExtraName(u64),
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IpAddress(id) => write!(f, "ip-address/{id}"),
            Self::ExtraName(id) => write!(f, "extra-name/{id}"),
        }
    }
}

/// A status ledger row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsStatus {
    #[serde(flatten)]
    pub key: StatusKey,
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub forward_action: Option<Action>,
    #[serde(default)]
    pub forward_rcode: Option<ResultCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_action: Option<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_rcode: Option<ResultCode>,
}

impl DnsStatus {
    #[must_use]
    pub fn new(key: StatusKey) -> Self {
        Self {
            key,
            last_update: Utc::now(),
            forward_action: None,
            forward_rcode: None,
            reverse_action: None,
            reverse_rcode: None,
        }
    }

    #[must_use]
    pub fn action(&self, direction: Direction) -> Option<Action> {
        match direction {
            Direction::Forward => self.forward_action,
            Direction::Reverse => self.reverse_action,
        }
    }

    #[must_use]
    pub fn rcode(&self, direction: Direction) -> Option<ResultCode> {
        match direction {
            Direction::Forward => self.forward_rcode,
            Direction::Reverse => self.reverse_rcode,
        }
    }

    /// Record that `action` is about to be attempted. Clears the code.
    pub fn set_action(&mut self, direction: Direction, action: Action) {
        match direction {
            Direction::Forward => {
                self.forward_action = Some(action);
                self.forward_rcode = None;
            }
            Direction::Reverse => {
                self.reverse_action = Some(action);
                self.reverse_rcode = None;
            }
        }
        self.last_update = Utc::now();
    }

    pub fn set_rcode(&mut self, direction: Direction, rcode: ResultCode) {
        match direction {
            Direction::Forward => self.forward_rcode = Some(rcode),
            Direction::Reverse => self.reverse_rcode = Some(rcode),
        }
        self.last_update = Utc::now();
    }

    /// Apply a single-direction change.
    pub fn apply(&mut self, change: StatusChange) {
        match change {
            StatusChange::Attempt(direction, action) => self.set_action(direction, action),
            StatusChange::Outcome(direction, rcode) => self.set_rcode(direction, rcode),
        }
    }
}

/// A write to one direction of a status row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusChange {
    /// `Action` is about to be attempted, the previous code is cleared
    Attempt(Direction, Action),
    /// The attempt ended with this code
    Outcome(Direction, ResultCode),
}

/// Backing storage for status rows.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    async fn get(&self, key: StatusKey) -> Result<Option<DnsStatus>, LedgerError>;

    /// Create a row.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::AlreadyExists`] if a row with the same key exists.
    async fn insert(&self, status: &DnsStatus) -> Result<(), LedgerError>;

    /// Apply `change` to an existing row. The other direction keeps whatever
    /// is stored at the time of the write.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if no row with this key exists.
    async fn update(&self, key: StatusKey, change: StatusChange) -> Result<(), LedgerError>;

    /// All rows, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    async fn list(&self) -> Result<Vec<DnsStatus>, LedgerError>;
}

fn insert_row(
    rows: &mut BTreeMap<StatusKey, DnsStatus>,
    status: &DnsStatus,
) -> Result<(), LedgerError> {
    if rows.contains_key(&status.key) {
        return Err(LedgerError::AlreadyExists {
            key: status.key.to_string(),
        });
    }
    rows.insert(status.key, status.clone());
    Ok(())
}

fn update_row(
    rows: &mut BTreeMap<StatusKey, DnsStatus>,
    key: StatusKey,
    change: StatusChange,
) -> Result<(), LedgerError> {
    match rows.get_mut(&key) {
        Some(row) => {
            row.apply(change);
            Ok(())
        }
        None => Err(LedgerError::NotFound {
            key: key.to_string(),
        }),
    }
}

/// In-memory [`StatusStore`]. Contents are lost on exit.
#[derive(Default)]
pub struct MemoryStatusStore {
    rows: Mutex<BTreeMap<StatusKey, DnsStatus>>,
}

impl MemoryStatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get(&self, key: StatusKey) -> Result<Option<DnsStatus>, LedgerError> {
        Ok(self.rows.lock().await.get(&key).cloned())
    }

    async fn insert(&self, status: &DnsStatus) -> Result<(), LedgerError> {
        insert_row(&mut *self.rows.lock().await, status)
    }

    async fn update(&self, key: StatusKey, change: StatusChange) -> Result<(), LedgerError> {
        update_row(&mut *self.rows.lock().await, key, change)
    }

    async fn list(&self) -> Result<Vec<DnsStatus>, LedgerError> {
        Ok(self.rows.lock().await.values().cloned().collect())
    }
}

/// [`StatusStore`] persisted as a JSON array in a single file.
///
/// The whole file is rewritten on every change through a temporary file and a
/// rename, so readers never see a partial write.
pub struct FileStatusStore {
    path: PathBuf,
    rows: Mutex<BTreeMap<StatusKey, DnsStatus>>,
}

impl FileStatusStore {
    /// Open the ledger at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let rows = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let rows: Vec<DnsStatus> = serde_json::from_slice(&bytes).map_err(|e| {
                    LedgerError::Storage(format!("Failed to parse {}: {e}", path.display()))
                })?;
                rows.into_iter().map(|row| (row.key, row)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(LedgerError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )))
            }
        };

        debug!(path = %path.display(), rows = rows.len(), "Opened status ledger");
        Ok(Self {
            path,
            rows: Mutex::new(rows),
        })
    }

    async fn persist(&self, rows: &BTreeMap<StatusKey, DnsStatus>) -> Result<(), LedgerError> {
        let rows: Vec<&DnsStatus> = rows.values().collect();
        let json = serde_json::to_vec_pretty(&rows)
            .map_err(|e| LedgerError::Storage(format!("Failed to serialize ledger: {e}")))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            LedgerError::Storage(format!("Failed to write {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            LedgerError::Storage(format!("Failed to replace {}: {e}", self.path.display()))
        })
    }

    /// Apply `change` and write the result. The file is left untouched when
    /// the change is rejected.
    async fn modify(
        &self,
        change: impl FnOnce(&mut BTreeMap<StatusKey, DnsStatus>) -> Result<(), LedgerError>,
    ) -> Result<(), LedgerError> {
        let mut rows = self.rows.lock().await;
        let mut next = rows.clone();
        change(&mut next)?;
        self.persist(&next).await?;
        *rows = next;
        Ok(())
    }
}

#[async_trait]
impl StatusStore for FileStatusStore {
    async fn get(&self, key: StatusKey) -> Result<Option<DnsStatus>, LedgerError> {
        Ok(self.rows.lock().await.get(&key).cloned())
    }

    async fn insert(&self, status: &DnsStatus) -> Result<(), LedgerError> {
        self.modify(|rows| insert_row(rows, status)).await
    }

    async fn update(&self, key: StatusKey, change: StatusChange) -> Result<(), LedgerError> {
        self.modify(|rows| update_row(rows, key, change)).await
    }

    async fn list(&self) -> Result<Vec<DnsStatus>, LedgerError> {
        Ok(self.rows.lock().await.values().cloned().collect())
    }
}

/// Status ledger front end used by jobs.
///
/// Every write touches a single direction of a row, read and modified under
/// the store's lock, so jobs for the same binding running side by side never
/// overwrite each other's results.
#[derive(Clone)]
pub struct StatusLedger {
    store: Arc<dyn StatusStore>,
}

impl StatusLedger {
    #[must_use]
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// Apply `change` to the row for `key`, creating the row on first use.
    ///
    /// When another writer creates the row between the failed update and the
    /// insert, the insert is retried as an update.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage rejects the write.
    pub async fn record(&self, key: StatusKey, change: StatusChange) -> Result<(), LedgerError> {
        match self.store.update(key, change).await {
            Err(LedgerError::NotFound { .. }) => {}
            other => return other,
        }

        let mut status = DnsStatus::new(key);
        status.apply(change);
        match self.store.insert(&status).await {
            Err(LedgerError::AlreadyExists { .. }) => {
                debug!(key = %key, "Status row created concurrently, updating instead");
                self.store.update(key, change).await
            }
            other => other,
        }
    }

    /// Like [`Self::record`], logging instead of failing. Ledger problems
    /// never stop a job from talking to DNS.
    pub async fn record_logged(&self, key: StatusKey, change: StatusChange) {
        if let Err(e) = self.record(key, change).await {
            let e = DnsError::from(e);
            metrics::record_error(&e);
            error!(key = %key, error = %e, reason = e.status_reason(), "Failed to write status row");
        }
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod ledger_tests;
