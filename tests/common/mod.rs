// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests
//!
//! In-process doubles for the network seams: a scripted SOA source and an
//! update transport that records every message instead of sending it.

#![allow(dead_code)]

use async_trait::async_trait;
use ddnsync::authority::{AuthorityResolver, SoaAnswer, SoaLookup};
use ddnsync::catalog::ZoneCatalog;
use ddnsync::config::Config;
use ddnsync::dispatch::{UpdateDispatcher, UpdateRecord, UpdateTransport};
use ddnsync::dns_errors::{AuthorityError, DispatchError};
use ddnsync::jobs::TokioJobRunner;
use ddnsync::ledger::{MemoryStatusStore, StatusLedger};
use ddnsync::model::{Action, ResultCode, Server};
use ddnsync::reconciler::{DnsJobWorker, Reconciler, SharedCatalog};
use ddnsync::retry::ExponentialBackoff;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// Configuration shared by the integration tests.
pub const TEST_CONFIG: &str = r"
servers:
  - name: primary
    host: ns1.example.com
    tsigKeyName: ddns-key
    tsigAlgorithm: hmac-sha256
    tsigKey: c2VjcmV0LWtleS1tYXRlcmlhbA==
zones:
  - name: example.com
    ttl: 300
    server: primary
reverseZones:
  - prefix: 10.0.0.0/24
    ttl: 600
    server: primary
";

/// Answers SOA queries from a fixed list of live zone apexes.
pub struct ApexLookup {
    apexes: Vec<String>,
}

impl ApexLookup {
    pub fn new(apexes: &[&str]) -> Self {
        Self {
            apexes: apexes.iter().map(ToString::to_string).collect(),
        }
    }
}

#[async_trait]
impl SoaLookup for ApexLookup {
    async fn query_soa(&self, name: &str) -> Result<SoaAnswer, AuthorityError> {
        if self.apexes.iter().any(|apex| apex == name) {
            Ok(SoaAnswer::Found {
                owner: name.to_string(),
            })
        } else {
            Ok(SoaAnswer::NoData)
        }
    }
}

/// One update as the server would have seen it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentUpdate {
    pub zone: String,
    pub action: Action,
    pub owner: String,
    pub data: String,
}

/// Records every update and answers with a scripted code per (action, owner).
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentUpdate>>,
    answers: HashMap<(Action, String), ResultCode>,
    delays: HashMap<String, Duration>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `action` on `owner` with `rcode` instead of NOERROR.
    pub fn answering(mut self, action: Action, owner: &str, rcode: ResultCode) -> Self {
        self.answers.insert((action, owner.to_string()), rcode);
        self
    }

    /// Hold every update to `zone` for `delay` before answering.
    pub fn delaying(mut self, zone: &str, delay: Duration) -> Self {
        self.delays.insert(zone.to_string(), delay);
        self
    }

    pub fn sent(&self) -> Vec<SentUpdate> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateTransport for RecordingTransport {
    async fn send(
        &self,
        _server: &Server,
        zone_name: &str,
        action: Action,
        record: &UpdateRecord,
    ) -> Result<ResultCode, DispatchError> {
        if let Some(delay) = self.delays.get(zone_name) {
            tokio::time::sleep(*delay).await;
        }
        self.sent.lock().unwrap().push(SentUpdate {
            zone: zone_name.to_string(),
            action,
            owner: record.owner.clone(),
            data: record.data.to_string(),
        });
        Ok(self
            .answers
            .get(&(action, record.owner.clone()))
            .copied()
            .unwrap_or(ResultCode::NO_ERROR))
    }
}

fn no_delay() -> ExponentialBackoff {
    ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, 1, 2.0, 0.0)
}

/// A fully wired pipeline with in-process doubles at the network edges.
pub struct Harness {
    pub catalog: SharedCatalog,
    pub reconciler: Reconciler,
    pub runner: Arc<TokioJobRunner>,
    pub store: Arc<MemoryStatusStore>,
    pub transport: Arc<RecordingTransport>,
}

impl Harness {
    /// Build from a YAML configuration, live apexes and a transport.
    pub fn new(config: &str, apexes: &[&str], transport: RecordingTransport) -> Self {
        let config = Config::from_yaml(config).unwrap();
        let catalog: SharedCatalog =
            Arc::new(RwLock::new(ZoneCatalog::from_config(&config).unwrap()));

        let transport = Arc::new(transport);
        let authority =
            AuthorityResolver::new(Arc::new(ApexLookup::new(apexes))).with_backoff(no_delay);
        let dispatcher = UpdateDispatcher::new(authority, transport.clone());

        let store = Arc::new(MemoryStatusStore::new());
        let worker = DnsJobWorker::new(
            Arc::clone(&catalog),
            dispatcher,
            StatusLedger::new(store.clone()),
        );
        let runner = Arc::new(TokioJobRunner::new(Arc::new(worker)));
        let reconciler = Reconciler::new(Arc::clone(&catalog), runner.clone());

        Self {
            catalog,
            reconciler,
            runner,
            store,
            transport,
        }
    }
}
