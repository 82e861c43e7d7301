// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Asynchronous job submission.
//!
//! The orchestrator never talks to DNS directly. It turns each binding change
//! into [`Job`]s and submits them to a [`JobRunner`], linking a create to the
//! delete it replaces with `depends_on`. A dependent job waits until its
//! dependency has finished, whether it succeeded, failed or died.
//!
//! [`TokioJobRunner`] is the in-process runner: one Tokio task per job, no
//! ordering between unrelated jobs.

use crate::ledger::StatusKey;
use crate::metrics;
use crate::model::Action;
use async_trait::async_trait;
use futures::future::join_all;
use std::fmt;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// A unit of DNS work for one name/address pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job {
    /// Create or delete
    pub action: Action,
    /// Normalized owner name of the forward record, PTR target of the reverse one
    pub dns_name: String,
    /// Address of the forward record, owner of the reverse one
    pub address: IpAddr,
    /// Touch the A/AAAA record
    pub forward: bool,
    /// Touch the PTR record
    pub reverse: bool,
    /// Status row to record the outcome in, if any
    pub status: Option<StatusKey>,
}

impl Job {
    #[must_use]
    pub fn create(dns_name: &str, address: IpAddr) -> Self {
        Self {
            action: Action::Create,
            dns_name: dns_name.to_string(),
            address,
            forward: true,
            reverse: true,
            status: None,
        }
    }

    #[must_use]
    pub fn delete(dns_name: &str, address: IpAddr) -> Self {
        Self {
            action: Action::Delete,
            ..Self::create(dns_name, address)
        }
    }

    #[must_use]
    pub fn forward_only(mut self) -> Self {
        self.forward = true;
        self.reverse = false;
        self
    }

    #[must_use]
    pub fn reverse_only(mut self) -> Self {
        self.forward = false;
        self.reverse = true;
        self
    }

    #[must_use]
    pub fn with_forward(mut self, forward: bool) -> Self {
        self.forward = forward;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusKey) -> Self {
        self.status = Some(status);
        self
    }

    /// Job kind used in logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self.action {
            Action::Create => "dns_create",
            Action::Delete => "dns_delete",
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} {}", self.kind(), self.dns_name, self.address)?;
        if self.forward {
            f.write_str(" forward")?;
        }
        if self.reverse {
            f.write_str(" reverse")?;
        }
        f.write_str(")")
    }
}

/// Handle to a submitted job.
#[derive(Clone, Debug)]
pub struct JobHandle {
    id: u64,
    done: watch::Receiver<Option<String>>,
}

impl JobHandle {
    /// A handle for a job that already ran, for runners that execute inline.
    #[must_use]
    pub fn completed(id: u64, output: String) -> Self {
        let (_tx, done) = watch::channel(Some(output));
        Self { id, done }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the job to finish and return its output.
    ///
    /// Returns `None` if the job ended without producing output, for example
    /// because its task panicked.
    pub async fn finished(&self) -> Option<String> {
        let mut done = self.done.clone();
        let output = match done.wait_for(Option::is_some).await {
            Ok(output) => output.clone(),
            Err(_) => None,
        };
        output
    }
}

/// Runs a job to completion and returns its output.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Execute `job`. Never fails: problems are recorded, not returned.
    async fn execute(&self, job: &Job) -> String;
}

/// Accepts jobs for asynchronous execution.
pub trait JobRunner: Send + Sync {
    /// Queue `job`. When `depends_on` is given, the job starts only after that
    /// job has finished, regardless of its outcome.
    fn submit(&self, job: Job, depends_on: Option<&JobHandle>) -> JobHandle;
}

/// [`JobRunner`] spawning one Tokio task per job.
///
/// Must be used from within a Tokio runtime.
pub struct TokioJobRunner {
    executor: Arc<dyn JobExecutor>,
    next_id: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioJobRunner {
    #[must_use]
    pub fn new(executor: Arc<dyn JobExecutor>) -> Self {
        Self {
            executor,
            next_id: AtomicU64::new(1),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Wait until every job submitted so far, and every job those submit in
    /// turn, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let tasks = std::mem::take(
                &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if tasks.is_empty() {
                return;
            }
            for result in join_all(tasks).await {
                if let Err(e) = result {
                    error!(error = %e, "Job task failed");
                }
            }
        }
    }
}

impl JobRunner for TokioJobRunner {
    fn submit(&self, job: Job, depends_on: Option<&JobHandle>) -> JobHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, done) = watch::channel(None);
        let executor = Arc::clone(&self.executor);
        let dependency = depends_on.cloned();

        debug!(job_id = id, job = %job, depends_on = ?dependency.as_ref().map(JobHandle::id), "Job submitted");

        let task = tokio::spawn(async move {
            if let Some(dependency) = dependency {
                // Outcome is irrelevant, only completion matters
                let _ = dependency.finished().await;
            }

            let start = Instant::now();
            let output = executor.execute(&job).await;
            let duration = start.elapsed();
            metrics::record_job(job.kind(), duration);

            info!(job_id = id, job = %job, duration_ms = duration.as_millis(), output = %output, "Job finished");
            tx.send_replace(Some(output));
        });

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);

        JobHandle { id, done }
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod jobs_tests;
