// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Signed dynamic updates (RFC 2136).
//!
//! [`UpdateDispatcher::apply`] is the single entry point used by jobs. It
//!
//! 1. confirms that the live DNS agrees the target zone owns the record
//!    (see [`crate::authority`]),
//! 2. hands one add or delete directive to an [`UpdateTransport`],
//! 3. reports the response code together with a one-line summary.
//!
//! The dispatcher never returns an error. Every failure is folded into a
//! [`ResultCode`] so that the caller can record it and carry on with the next
//! operation.

use crate::authority::AuthorityResolver;
use crate::constants::TSIG_FUDGE_TIME_SECS;
use crate::dns_errors::{DispatchError, DnsError, TsigError};
use crate::metrics;
use crate::model::{Action, Direction, ResultCode, Server, TsigAlgorithm, UpdateZone};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hickory_client::client::{Client, SyncClient};
use hickory_client::rr::rdata::tsig::TsigAlgorithm as HickoryTsigAlgorithm;
use hickory_client::rr::rdata::PTR;
use hickory_client::rr::{DNSClass, Name, RData, Record};
use hickory_client::udp::UdpClientConnection;
use hickory_proto::rr::dnssec::tsig::TSigner;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Record data carried by an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordData {
    /// A or AAAA, picked from the address family
    Address(IpAddr),
    /// PTR target name
    Pointer(String),
}

impl RecordData {
    /// DNS record type mnemonic.
    #[must_use]
    pub fn record_type(&self) -> &'static str {
        match self {
            Self::Address(IpAddr::V4(_)) => "A",
            Self::Address(IpAddr::V6(_)) => "AAAA",
            Self::Pointer(_) => "PTR",
        }
    }
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{address}"),
            Self::Pointer(target) => f.write_str(target),
        }
    }
}

/// One record to add or delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateRecord {
    /// Fully qualified owner name
    pub owner: String,
    /// TTL used when adding; ignored for deletes
    pub ttl: u32,
    /// Record data
    pub data: RecordData,
}

/// Sends a single signed update to a server.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    /// Send one add or delete directive for `record`, scoped to `zone_name`.
    ///
    /// # Errors
    ///
    /// Returns an error when no response code could be obtained: the server
    /// did not resolve, the exchange failed or timed out, or TSIG failed.
    async fn send(
        &self,
        server: &Server,
        zone_name: &str,
        action: Action,
        record: &UpdateRecord,
    ) -> Result<ResultCode, DispatchError>;
}

/// Build a TSIG signer from a server's key material.
///
/// # Errors
///
/// Returns an error if the key is not valid base64, the key name is not a
/// valid DNS name or the signer rejects the key.
pub fn create_tsig_signer(server: &Server) -> Result<TSigner, TsigError> {
    let algorithm = match server.tsig_algorithm {
        TsigAlgorithm::HmacMd5 => HickoryTsigAlgorithm::HmacMd5,
        TsigAlgorithm::HmacSha1 => HickoryTsigAlgorithm::HmacSha1,
        TsigAlgorithm::HmacSha224 => HickoryTsigAlgorithm::HmacSha224,
        TsigAlgorithm::HmacSha256 => HickoryTsigAlgorithm::HmacSha256,
        TsigAlgorithm::HmacSha384 => HickoryTsigAlgorithm::HmacSha384,
        TsigAlgorithm::HmacSha512 => HickoryTsigAlgorithm::HmacSha512,
    };

    let invalid = |reason: String| TsigError::InvalidTsigKeyData {
        key_name: server.tsig_key_name.clone(),
        reason,
    };

    let key_bytes = BASE64
        .decode(&server.tsig_key)
        .map_err(|e| invalid(format!("Failed to decode TSIG key: {e}")))?;

    let key_name = Name::from_str(&server.tsig_key_name)
        .map_err(|e| invalid(format!("Invalid TSIG key name: {e}")))?;

    TSigner::new(
        key_bytes,
        algorithm,
        key_name,
        u16::try_from(TSIG_FUDGE_TIME_SECS).unwrap_or(300),
    )
    .map_err(|e| invalid(format!("Failed to create TSIG signer: {e}")))
}

/// Convert an [`UpdateRecord`] into a hickory record of class IN.
///
/// # Errors
///
/// Returns an error if the owner or PTR target is not a valid DNS name.
pub fn build_record(record: &UpdateRecord) -> Result<Record, DispatchError> {
    let parse_name = |name: &str| {
        Name::from_str(name).map_err(|e| DispatchError::InvalidRecord {
            name: name.to_string(),
            reason: e.to_string(),
        })
    };

    let owner = parse_name(&record.owner)?;
    let rdata = match &record.data {
        RecordData::Address(IpAddr::V4(address)) => RData::A((*address).into()),
        RecordData::Address(IpAddr::V6(address)) => RData::AAAA((*address).into()),
        RecordData::Pointer(target) => RData::PTR(PTR(parse_name(target)?)),
    };

    let mut built = Record::from_rdata(owner, record.ttl, rdata);
    built.set_dns_class(DNSClass::IN);
    Ok(built)
}

/// [`UpdateTransport`] speaking RFC 2136 over UDP with hickory-client.
///
/// The server host is resolved on every call. The first address returned is
/// used, whatever its family.
#[derive(Clone, Debug)]
pub struct HickoryUpdateTransport {
    timeout: Duration,
}

impl HickoryUpdateTransport {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }

    async fn resolve_server(&self, server: &Server) -> Result<SocketAddr, DispatchError> {
        let resolution = |reason: String| DispatchError::ServerResolution {
            host: server.host.clone(),
            reason,
        };

        let mut addresses = tokio::time::timeout(
            self.timeout,
            tokio::net::lookup_host((server.host.as_str(), server.port)),
        )
        .await
        .map_err(|_| resolution(format!("timed out after {}ms", self.timeout_ms())))?
        .map_err(|e| resolution(e.to_string()))?;

        addresses
            .next()
            .ok_or_else(|| resolution("no addresses returned".to_string()))
    }
}

#[async_trait]
impl UpdateTransport for HickoryUpdateTransport {
    async fn send(
        &self,
        server: &Server,
        zone_name: &str,
        action: Action,
        record: &UpdateRecord,
    ) -> Result<ResultCode, DispatchError> {
        let server_addr = self.resolve_server(server).await?;
        debug!(server = %server, address = %server_addr, "Resolved update server");

        let signer = create_tsig_signer(server)?;
        let zone = Name::from_str(zone_name).map_err(|e| DispatchError::InvalidRecord {
            name: zone_name.to_string(),
            reason: e.to_string(),
        })?;
        let record = build_record(record)?;
        let key_name = server.tsig_key_name.clone();
        let timeout = self.timeout;

        // hickory's SyncClient blocks, keep it off the async workers
        let exchange = tokio::task::spawn_blocking(move || {
            let transport = |reason: String| DispatchError::Transport {
                server: server_addr.to_string(),
                reason,
            };

            let conn = UdpClientConnection::with_timeout(server_addr, timeout)
                .map_err(|e| transport(format!("Failed to create UDP connection: {e}")))?;
            let client = SyncClient::with_tsigner(conn, signer);

            let response = match action {
                Action::Create => client.append(record, zone, false),
                Action::Delete => client.delete_by_rdata(record, zone),
            };

            match response {
                Ok(response) => Ok(ResultCode::from(response.response_code())),
                Err(e) => {
                    let reason = e.to_string();
                    let lowered = reason.to_lowercase();
                    if lowered.contains("tsig") || lowered.contains("signature") {
                        Err(TsigError::TsigVerificationFailed {
                            server: server_addr.to_string(),
                            key_name,
                            reason,
                        }
                        .into())
                    } else if lowered.contains("timed out") || lowered.contains("timeout") {
                        Err(DispatchError::Timeout {
                            server: server_addr.to_string(),
                            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        })
                    } else {
                        Err(transport(reason))
                    }
                }
            }
        });

        // Outer bound in case the blocking client ignores its own timeout
        match tokio::time::timeout(self.timeout.saturating_mul(2), exchange).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(DispatchError::Transport {
                server: server_addr.to_string(),
                reason: format!("DNS update task failed: {join_error}"),
            }),
            Err(_) => Err(DispatchError::Timeout {
                server: server_addr.to_string(),
                timeout_ms: self.timeout_ms(),
            }),
        }
    }
}

/// Result of a single dispatched update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Code to record in the status ledger
    pub rcode: ResultCode,
    /// Summary line, present when an UPDATE message got a response
    pub message: Option<String>,
}

impl UpdateOutcome {
    fn without_message(rcode: ResultCode) -> Self {
        Self {
            rcode,
            message: None,
        }
    }
}

/// Verifies authority and dispatches updates.
#[derive(Clone)]
pub struct UpdateDispatcher {
    authority: AuthorityResolver,
    transport: Arc<dyn UpdateTransport>,
}

impl UpdateDispatcher {
    #[must_use]
    pub fn new(authority: AuthorityResolver, transport: Arc<dyn UpdateTransport>) -> Self {
        Self {
            authority,
            transport,
        }
    }

    /// Add or delete one record in `zone`.
    ///
    /// The write is refused with NOTAUTH when the live SOA owner of `owner`
    /// differs from the zone name, and with SERVFAIL when the owner cannot be
    /// determined. Local failures after that point are also recorded as
    /// SERVFAIL. A code returned by the server is passed through verbatim.
    pub async fn apply(
        &self,
        zone: UpdateZone<'_>,
        action: Action,
        owner: &str,
        data: RecordData,
    ) -> UpdateOutcome {
        let direction = match zone {
            UpdateZone::Forward(_) => Direction::Forward,
            UpdateZone::Reverse(_) => Direction::Reverse,
        };

        let outcome = self.apply_inner(&zone, action, owner, data).await;
        metrics::record_update(direction, action, outcome.rcode);
        outcome
    }

    async fn apply_inner(
        &self,
        zone: &UpdateZone<'_>,
        action: Action,
        owner: &str,
        data: RecordData,
    ) -> UpdateOutcome {
        match self.authority.discover_soa_owner(owner).await {
            Ok(soa_owner) if soa_owner == zone.name() => {
                metrics::record_authority_check("authorized");
            }
            Ok(soa_owner) => {
                metrics::record_authority_check("delegated");
                warn!(
                    zone = %zone.name(),
                    name = %owner,
                    authority = %soa_owner,
                    "Can't update zone {} for {}, it has delegated authority for {}",
                    zone.name(),
                    owner,
                    soa_owner
                );
                return UpdateOutcome::without_message(ResultCode::NOT_AUTH);
            }
            Err(e) => {
                metrics::record_authority_check("unknown");
                let e = DnsError::from(e);
                metrics::record_error(&e);
                error!(
                    zone = %zone.name(),
                    name = %owner,
                    error = %e,
                    reason = e.status_reason(),
                    transient = e.is_transient(),
                    "Authority for {} could not be determined, refusing update",
                    owner
                );
                return UpdateOutcome::without_message(ResultCode::SERV_FAIL);
            }
        }

        let record = UpdateRecord {
            owner: owner.to_string(),
            ttl: zone.ttl(),
            data,
        };
        let operation = format!(
            "{} {} {} {}",
            match action {
                Action::Create => "Adding",
                Action::Delete => "Deleting",
            },
            record.owner,
            record.data.record_type(),
            record.data
        );

        match self
            .transport
            .send(zone.server(), zone.name(), action, &record)
            .await
        {
            Ok(rcode) if rcode.is_success() => {
                let message = format!("{operation} successful");
                info!(zone = %zone.name(), server = %zone.server(), "{}", message);
                UpdateOutcome {
                    rcode,
                    message: Some(message),
                }
            }
            Ok(rcode) => {
                let message = format!("{operation} failed: {}", rcode.mnemonic());
                error!(zone = %zone.name(), server = %zone.server(), rcode = rcode.0, "{}", message);
                UpdateOutcome {
                    rcode,
                    message: Some(message),
                }
            }
            Err(e) => {
                // A signature problem is an authentication failure, not a
                // server failure
                let rcode = match e {
                    DispatchError::Tsig(_) => ResultCode::NOT_AUTH,
                    _ => ResultCode::SERV_FAIL,
                };
                let e = DnsError::from(e);
                metrics::record_error(&e);
                error!(
                    zone = %zone.name(),
                    server = %zone.server(),
                    error = %e,
                    reason = e.status_reason(),
                    transient = e.is_transient(),
                    rcode = rcode.0,
                    "{} failed before a response was received",
                    operation
                );
                UpdateOutcome::without_message(rcode)
            }
        }
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod dispatch_tests;
