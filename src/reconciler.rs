// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of inventory changes into DNS jobs.
//!
//! Two halves:
//!
//! - [`Reconciler`] receives [`BindingEvent`]s, works out which records must
//!   go and which must appear, and submits [`Job`]s. It never touches DNS.
//! - [`DnsJobWorker`] executes those jobs: zone lookup, authority check,
//!   signed update, status ledger.
//!
//! # Replacement ordering
//!
//! When a (name, address) pair changes, the old records are deleted and the
//! new ones created. The create depends on the delete but runs whatever the
//! delete's outcome: a stale record that could not be removed must not block
//! the replacement.
//!
//! # Auxiliary names
//!
//! Auxiliary names only ever get forward records. Each one has its own status
//! row.

use crate::catalog::ZoneCatalog;
use crate::dispatch::{RecordData, UpdateDispatcher};
use crate::jobs::{Job, JobExecutor, JobHandle, JobRunner};
use crate::ledger::{StatusChange, StatusKey, StatusLedger};
use crate::metrics;
use crate::model::{Binding, Direction, ExtraNameRecord, ResultCode, UpdateZone};
use crate::normalize::normalize_fqdn;
use async_trait::async_trait;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Zone catalog shared between the orchestrator and job workers. Replaced
/// wholesale on reload.
pub type SharedCatalog = Arc<RwLock<ZoneCatalog>>;

/// A change reported by the inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BindingEvent {
    /// An address record was created (`before` absent) or changed
    BindingSaved {
        #[serde(default)]
        before: Option<Binding>,
        after: Binding,
    },
    /// An address record was deleted
    BindingDeleted { binding: Binding },
    /// An auxiliary name was created (`before` absent) or changed
    ExtraNameSaved {
        #[serde(default)]
        before: Option<ExtraNameRecord>,
        after: ExtraNameRecord,
    },
    /// An auxiliary name was deleted
    ExtraNameDeleted { extra_name: ExtraNameRecord },
}

impl BindingEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BindingSaved { .. } => "binding_saved",
            Self::BindingDeleted { .. } => "binding_deleted",
            Self::ExtraNameSaved { .. } => "extra_name_saved",
            Self::ExtraNameDeleted { .. } => "extra_name_deleted",
        }
    }
}

/// Turns inventory changes into DNS jobs.
#[derive(Clone)]
pub struct Reconciler {
    catalog: SharedCatalog,
    runner: Arc<dyn JobRunner>,
}

impl Reconciler {
    #[must_use]
    pub fn new(catalog: SharedCatalog, runner: Arc<dyn JobRunner>) -> Self {
        Self { catalog, runner }
    }

    /// Dispatch an event to its handler.
    pub fn handle(&self, event: &BindingEvent) -> Vec<JobHandle> {
        metrics::record_event(event.kind());
        match event {
            BindingEvent::BindingSaved { before, after } => {
                self.on_binding_saved(before.as_ref(), after)
            }
            BindingEvent::BindingDeleted { binding } => self.on_binding_deleted(binding),
            BindingEvent::ExtraNameSaved { before, after } => {
                self.on_extra_name_saved(before.as_ref(), after)
            }
            BindingEvent::ExtraNameDeleted { extra_name } => self.on_extra_name_deleted(extra_name),
        }
    }

    /// A binding was created or changed.
    ///
    /// Nothing happens when the normalized (name, address) pair is unchanged.
    /// Otherwise the old pair is deleted and the new pair created after it.
    /// The old forward record is kept when one of the binding's auxiliary
    /// names still uses the old name.
    ///
    /// When the address moved, every auxiliary name is also deleted at the old
    /// address and created at the new one.
    pub fn on_binding_saved(&self, before: Option<&Binding>, after: &Binding) -> Vec<JobHandle> {
        let new_name = normalize_fqdn(&after.dns_name);
        let status = StatusKey::IpAddress(after.id);
        let extra_names = normalized_extra_names(after);
        let mut handles = Vec::new();

        let old = before.map(|b| (normalize_fqdn(&b.dns_name), b.address));
        let primary_changed = old
            .as_ref()
            .map_or(true, |(name, address)| (name, *address) != (&new_name, after.address));

        if primary_changed {
            let mut delete = None;
            if let Some((old_name, old_address)) = old.as_ref().filter(|(name, _)| !name.is_empty())
            {
                let superseded = extra_names.iter().any(|(_, name)| name == old_name);
                if superseded {
                    debug!(name = %old_name, "Old name still used by an auxiliary name, keeping forward record");
                }
                let job = Job::delete(old_name, *old_address)
                    .with_forward(!superseded)
                    .with_status(status);
                let handle = self.runner.submit(job, None);
                handles.push(handle.clone());
                delete = Some(handle);
            }

            if !new_name.is_empty() {
                let job = Job::create(&new_name, after.address).with_status(status);
                handles.push(self.runner.submit(job, delete.as_ref()));
            }
        }

        if let Some(before) = before.filter(|b| b.address != after.address) {
            for (id, name) in &extra_names {
                let status = StatusKey::ExtraName(*id);
                let delete = self.runner.submit(
                    Job::delete(name, before.address)
                        .forward_only()
                        .with_status(status),
                    None,
                );
                let create = self.runner.submit(
                    Job::create(name, after.address)
                        .forward_only()
                        .with_status(status),
                    Some(&delete),
                );
                handles.push(delete);
                handles.push(create);
            }
        }

        handles
    }

    /// A binding was deleted.
    ///
    /// Its forward and reverse records are deleted, together with the forward
    /// records of its auxiliary names. No status is recorded: the rows go away
    /// with the binding.
    pub fn on_binding_deleted(&self, removed: &Binding) -> Vec<JobHandle> {
        let name = normalize_fqdn(&removed.dns_name);
        let mut handles = Vec::new();

        if !name.is_empty() {
            handles.push(
                self.runner
                    .submit(Job::delete(&name, removed.address), None),
            );
        }

        for (_, extra) in normalized_extra_names(removed) {
            if extra != name {
                handles.push(
                    self.runner
                        .submit(Job::delete(&extra, removed.address).forward_only(), None),
                );
            }
        }

        handles
    }

    /// An auxiliary name was created or changed.
    ///
    /// The old name's forward record is deleted unless the binding's primary
    /// name is the same, then the new name's forward record is created.
    pub fn on_extra_name_saved(
        &self,
        before: Option<&ExtraNameRecord>,
        after: &ExtraNameRecord,
    ) -> Vec<JobHandle> {
        let new_name = normalize_fqdn(&after.name);
        let status = StatusKey::ExtraName(after.id);
        let mut handles = Vec::new();

        if let Some(before) = before {
            let old_name = normalize_fqdn(&before.name);
            if old_name == new_name && before.address == after.address {
                return handles;
            }
        }

        let delete = before.and_then(|before| {
            let old_name = normalize_fqdn(&before.name);
            if old_name.is_empty() || old_name == normalize_fqdn(&before.primary_name) {
                return None;
            }
            Some(self.runner.submit(
                Job::delete(&old_name, before.address)
                    .forward_only()
                    .with_status(status),
                None,
            ))
        });
        if let Some(delete) = &delete {
            handles.push(delete.clone());
        }

        if !new_name.is_empty() {
            handles.push(self.runner.submit(
                Job::create(&new_name, after.address)
                    .forward_only()
                    .with_status(status),
                delete.as_ref(),
            ));
        }

        handles
    }

    /// An auxiliary name was deleted. Its forward record is removed unless the
    /// binding's primary name is the same.
    pub fn on_extra_name_deleted(&self, removed: &ExtraNameRecord) -> Vec<JobHandle> {
        let name = normalize_fqdn(&removed.name);
        if name.is_empty() || name == normalize_fqdn(&removed.primary_name) {
            return Vec::new();
        }
        vec![self
            .runner
            .submit(Job::delete(&name, removed.address).forward_only(), None)]
    }

    /// Create all records of a binding again, regardless of their state.
    ///
    /// Returns the names scheduled.
    pub fn recreate_binding(&self, binding: &Binding) -> Vec<String> {
        let mut names = Vec::new();

        let name = normalize_fqdn(&binding.dns_name);
        if !name.is_empty() {
            self.runner.submit(
                Job::create(&name, binding.address).with_status(StatusKey::IpAddress(binding.id)),
                None,
            );
            names.push(name);
        }

        for (id, extra) in normalized_extra_names(binding) {
            self.runner.submit(
                Job::create(&extra, binding.address)
                    .forward_only()
                    .with_status(StatusKey::ExtraName(id)),
                None,
            );
            names.push(extra);
        }

        if !names.is_empty() {
            info!(binding = binding.id, "Updating DNS for {}", names.join(", "));
        }
        names
    }

    /// Create the forward record of every binding served by `zone_name`,
    /// skipping bindings that belong to a more specific zone.
    ///
    /// Returns the number of jobs submitted.
    pub async fn resync_forward_zone(&self, zone_name: &str, bindings: &[Binding]) -> usize {
        let zone_name = normalize_fqdn(zone_name);
        let catalog = self.catalog.read().await;
        let mut count = 0;

        for binding in catalog.bindings_in_forward_zone(&zone_name, bindings) {
            let name = normalize_fqdn(&binding.dns_name);
            self.runner.submit(
                Job::create(&name, binding.address)
                    .forward_only()
                    .with_status(StatusKey::IpAddress(binding.id)),
                None,
            );
            count += 1;
        }

        info!(zone = %zone_name, count, "Updating {} forward records in {}", count, zone_name);
        count
    }

    /// Create the reverse record of every binding with an address inside
    /// `prefix`, skipping addresses covered by a more specific reverse zone.
    ///
    /// Returns the number of jobs submitted.
    pub async fn resync_reverse_zone(&self, prefix: &IpNet, bindings: &[Binding]) -> usize {
        let catalog = self.catalog.read().await;
        let mut count = 0;

        for binding in catalog.bindings_in_reverse_zone(prefix, bindings) {
            let name = normalize_fqdn(&binding.dns_name);
            self.runner.submit(
                Job::create(&name, binding.address)
                    .reverse_only()
                    .with_status(StatusKey::IpAddress(binding.id)),
                None,
            );
            count += 1;
        }

        info!(prefix = %prefix, count, "Updating {} reverse records in {}", count, prefix);
        count
    }
}

fn normalized_extra_names(binding: &Binding) -> Vec<(u64, String)> {
    binding
        .extra_names
        .iter()
        .map(|extra| (extra.id, normalize_fqdn(&extra.name)))
        .filter(|(_, name)| !name.is_empty())
        .collect()
}

/// Executes DNS jobs.
///
/// For each direction the job touches: record the action, find the zone,
/// dispatch, record the code. A missing zone is recorded as
/// [`ResultCode::NO_ZONE`] without contacting anything.
pub struct DnsJobWorker {
    catalog: SharedCatalog,
    dispatcher: UpdateDispatcher,
    ledger: StatusLedger,
}

impl DnsJobWorker {
    #[must_use]
    pub fn new(catalog: SharedCatalog, dispatcher: UpdateDispatcher, ledger: StatusLedger) -> Self {
        Self {
            catalog,
            dispatcher,
            ledger,
        }
    }

    async fn forward(&self, job: &Job, output: &mut Vec<String>) {
        self.record(job, StatusChange::Attempt(Direction::Forward, job.action))
            .await;

        let zone = self.catalog.read().await.find_forward_zone(&job.dns_name).cloned();
        let rcode = match zone {
            Some(zone) => {
                debug!(zone = %zone.name, name = %job.dns_name, "Found zone {} for {}", zone.name, job.dns_name);
                let outcome = self
                    .dispatcher
                    .apply(
                        UpdateZone::Forward(&zone),
                        job.action,
                        &job.dns_name,
                        RecordData::Address(job.address),
                    )
                    .await;
                output.extend(outcome.message);
                outcome.rcode
            }
            None => {
                debug!(name = %job.dns_name, "No zone found for {}", job.dns_name);
                ResultCode::NO_ZONE
            }
        };

        self.record(job, StatusChange::Outcome(Direction::Forward, rcode))
            .await;
    }

    async fn reverse(&self, job: &Job, output: &mut Vec<String>) {
        self.record(job, StatusChange::Attempt(Direction::Reverse, job.action))
            .await;

        let zone = self.catalog.read().await.find_reverse_zone(job.address).cloned();
        let rcode = match zone {
            Some(zone) => {
                let record_name = zone.record_name(job.address);
                debug!(zone = %zone.name, name = %record_name, "Found zone {} for {}", zone.name, record_name);
                let outcome = self
                    .dispatcher
                    .apply(
                        UpdateZone::Reverse(&zone),
                        job.action,
                        &record_name,
                        RecordData::Pointer(job.dns_name.clone()),
                    )
                    .await;
                output.extend(outcome.message);
                outcome.rcode
            }
            None => {
                debug!(address = %job.address, "No zone found for {}", job.address);
                ResultCode::NO_ZONE
            }
        };

        self.record(job, StatusChange::Outcome(Direction::Reverse, rcode))
            .await;
    }

    async fn record(&self, job: &Job, change: StatusChange) {
        if let Some(key) = job.status {
            self.ledger.record_logged(key, change).await;
        }
    }
}

#[async_trait]
impl JobExecutor for DnsJobWorker {
    async fn execute(&self, job: &Job) -> String {
        let mut output = Vec::new();

        if job.forward {
            self.forward(job, &mut output).await;
        }
        if job.reverse {
            self.reverse(job, &mut output).await;
        }

        output.join(", ")
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
