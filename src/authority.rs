// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Live authority discovery.
//!
//! Before writing into a configured zone, ddnsync asks the wider DNS which zone
//! actually owns the name. If the zone has delegated the name to a child zone
//! that the local catalog does not know about, the owner differs from the
//! configured zone and the write is refused.
//!
//! # Discovery
//!
//! Starting at the full name, an SOA query is made for every suffix, dropping
//! one leftmost label at a time:
//!
//! - a positive SOA answer ends the walk with that record's owner
//! - NOERROR without an SOA (the name exists but is not a zone apex) moves on
//!   to the next suffix
//! - NXDOMAIN ends the walk with the owner of the SOA in the authority section,
//!   when the server supplied one, which is the usual case for names below the
//!   zone cut
//!
//! Failing to reach any conclusion is an error, never an implicit "authorized".

use crate::config::ResolverConfig;
use crate::dns_errors::AuthorityError;
use crate::normalize::{normalize_fqdn, suffixes};
use crate::retry::{retry_with_backoff, soa_backoff, ExponentialBackoff};
use async_trait::async_trait;
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::{Name, TokioAsyncResolver};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a single SOA query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SoaAnswer {
    /// The answer section carried an SOA owned by this name
    Found {
        /// Owner of the SOA record
        owner: String,
    },
    /// The name exists but has no SOA
    NoData,
    /// The name does not exist
    NxDomain {
        /// Owner of the SOA from the authority section, if present
        authority_soa: Option<String>,
    },
}

/// A source of SOA answers.
#[async_trait]
pub trait SoaLookup: Send + Sync {
    /// Query the SOA record set of exactly `name`.
    ///
    /// # Errors
    ///
    /// Returns an error for anything that is not a definite answer: network
    /// failures, timeouts, SERVFAIL or REFUSED responses.
    async fn query_soa(&self, name: &str) -> Result<SoaAnswer, AuthorityError>;
}

/// Discovers the zone that is authoritative for a name.
#[derive(Clone)]
pub struct AuthorityResolver {
    lookup: Arc<dyn SoaLookup>,
    backoff: fn() -> ExponentialBackoff,
}

impl AuthorityResolver {
    #[must_use]
    pub fn new(lookup: Arc<dyn SoaLookup>) -> Self {
        Self {
            lookup,
            backoff: soa_backoff,
        }
    }

    /// Replace the retry schedule used around each discovery walk.
    #[must_use]
    pub fn with_backoff(mut self, backoff: fn() -> ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Find the owner of the zone `name` lives in, as seen by the live DNS.
    ///
    /// The whole walk is retried on transient lookup failures within a small
    /// budget. The returned owner is in canonical form.
    ///
    /// # Errors
    ///
    /// Returns an error if no SOA could be found or the lookups kept failing.
    pub async fn discover_soa_owner(&self, name: &str) -> Result<String, AuthorityError> {
        let name = normalize_fqdn(name);
        retry_with_backoff(
            (self.backoff)(),
            "discover SOA owner",
            |e: &AuthorityError| {
                matches!(
                    e,
                    AuthorityError::LookupFailed { .. } | AuthorityError::Timeout { .. }
                )
            },
            || self.walk(&name),
        )
        .await
    }

    async fn walk(&self, name: &str) -> Result<String, AuthorityError> {
        for candidate in suffixes(name) {
            match self.lookup.query_soa(&candidate).await? {
                SoaAnswer::Found { owner } => {
                    let owner = normalize_fqdn(&owner);
                    debug!(name = %name, owner = %owner, "SOA found");
                    return Ok(owner);
                }
                SoaAnswer::NxDomain {
                    authority_soa: Some(owner),
                } => {
                    let owner = normalize_fqdn(&owner);
                    debug!(name = %name, queried = %candidate, owner = %owner, "SOA taken from NXDOMAIN authority section");
                    return Ok(owner);
                }
                SoaAnswer::NoData | SoaAnswer::NxDomain { authority_soa: None } => {
                    debug!(name = %name, queried = %candidate, "No SOA at this level, trying parent");
                }
            }
        }

        Err(AuthorityError::NoSoaFound {
            name: name.to_string(),
        })
    }
}

/// [`SoaLookup`] backed by the system resolver configuration.
///
/// Caching is disabled so every job sees current authority.
pub struct SystemSoaLookup {
    resolver: TokioAsyncResolver,
    deadline: Duration,
}

impl SystemSoaLookup {
    /// Build a lookup from `/etc/resolv.conf` (or the platform equivalent).
    ///
    /// # Errors
    ///
    /// Returns an error if the system resolver configuration cannot be read.
    pub fn from_system_conf(config: &ResolverConfig) -> Result<Self, AuthorityError> {
        let (resolver_config, mut opts) = hickory_resolver::system_conf::read_system_conf()
            .map_err(|e| AuthorityError::LookupFailed {
                name: ".".to_string(),
                reason: format!("Failed to read system resolver configuration: {e}"),
            })?;

        opts.timeout = config.timeout();
        opts.attempts = config.attempts.max(1);
        opts.cache_size = 0;

        let attempts = u32::try_from(opts.attempts).unwrap_or(u32::MAX).saturating_add(1);
        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
            deadline: config.timeout().saturating_mul(attempts),
        })
    }
}

#[async_trait]
impl SoaLookup for SystemSoaLookup {
    async fn query_soa(&self, name: &str) -> Result<SoaAnswer, AuthorityError> {
        let fqdn = Name::from_str(name).map_err(|e| AuthorityError::InvalidName {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let lookup = tokio::time::timeout(self.deadline, self.resolver.lookup(fqdn, RecordType::SOA))
            .await
            .map_err(|_| AuthorityError::Timeout {
                name: name.to_string(),
                timeout_ms: u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX),
            })?;

        match lookup {
            Ok(lookup) => {
                let owner = lookup
                    .record_iter()
                    .find(|record| record.record_type() == RecordType::SOA)
                    .map(|record| record.name().to_string());
                Ok(owner.map_or(SoaAnswer::NoData, |owner| SoaAnswer::Found { owner }))
            }
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound {
                    response_code, soa, ..
                } => match *response_code {
                    ResponseCode::NXDomain => Ok(SoaAnswer::NxDomain {
                        authority_soa: soa.as_ref().map(|soa| soa.name().to_string()),
                    }),
                    ResponseCode::NoError => Ok(SoaAnswer::NoData),
                    code => {
                        warn!(name = %name, code = ?code, "SOA lookup returned an error response");
                        Err(AuthorityError::LookupFailed {
                            name: name.to_string(),
                            reason: format!("response code {code:?}"),
                        })
                    }
                },
                _ => Err(AuthorityError::LookupFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
#[path = "authority_tests.rs"]
mod authority_tests;
