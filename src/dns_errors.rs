// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for ddnsync.
//!
//! This module provides specialized error types for:
//! - Zone catalog configuration and validation
//! - Live SOA discovery (authority verification)
//! - TSIG key handling and signature failures
//! - Dynamic update dispatch (server resolution, UDP transport)
//! - Status ledger persistence
//!
//! Only configuration errors are surfaced to operators as hard failures. Everything
//! that happens while reconciling a binding is caught by the stage that owns it and
//! degraded to a response code in the status ledger.

use thiserror::Error;

/// Errors raised while building or validating the zone catalog.
///
/// These are configuration-time failures: a catalog that produces one of these
/// is rejected as a whole and never used for dispatch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A field failed validation.
    ///
    /// `field` names the offending configuration field (e.g. `name`, `prefix`,
    /// `tsigKey`) so that callers can attach the message to the right input.
    #[error("Invalid {field} for {object}: {reason}")]
    InvalidField {
        /// The configuration object being validated (e.g. "reverse zone 10.0.0.0/20")
        object: String,
        /// The field that failed validation
        field: &'static str,
        /// Explanation of what is invalid
        reason: String,
    },

    /// Two forward zones normalize to the same name
    #[error("Duplicate zone '{zone}'")]
    DuplicateZone {
        /// The normalized zone name
        zone: String,
    },

    /// Two reverse zones share the same prefix
    #[error("Duplicate reverse zone prefix {prefix}")]
    DuplicatePrefix {
        /// The prefix, in CIDR notation
        prefix: String,
    },

    /// Two servers share the same (host, TSIG key name) pair
    #[error("Duplicate server '{host}' with TSIG key '{key_name}'")]
    DuplicateServer {
        /// The normalized server host
        host: String,
        /// The normalized TSIG key name
        key_name: String,
    },

    /// A zone references a server handle that is not configured
    #[error("Zone '{zone}' references unknown server '{server}'")]
    UnknownServer {
        /// The zone (or reverse-zone prefix) holding the reference
        zone: String,
        /// The unresolved server handle
        server: String,
    },
}

impl CatalogError {
    /// Returns the configuration field this error is attached to, if any.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidField { field, .. } => Some(field),
            Self::DuplicateZone { .. } => Some("name"),
            Self::DuplicatePrefix { .. } => Some("prefix"),
            Self::DuplicateServer { .. } => Some("tsigKeyName"),
            Self::UnknownServer { .. } => Some("server"),
        }
    }
}

/// Errors that can occur while discovering the live owner of a name.
///
/// None of these may ever be read as "authorized": the dispatcher refuses to
/// write whenever discovery ends in one of them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorityError {
    /// Every suffix of the name was tried and none produced an SOA
    #[error("No SOA record found for '{name}' or any of its parents")]
    NoSoaFound {
        /// The name discovery started from
        name: String,
    },

    /// The resolver failed (network error, SERVFAIL, REFUSED, ...)
    #[error("SOA lookup for '{name}' failed: {reason}")]
    LookupFailed {
        /// The name being queried when the failure happened
        name: String,
        /// Resolver error text
        reason: String,
    },

    /// A lookup did not complete within the configured bound
    #[error("SOA lookup for '{name}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The name being queried
        name: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// The name could not be parsed as a DNS name
    #[error("Invalid DNS name '{name}': {reason}")]
    InvalidName {
        /// The offending name
        name: String,
        /// Parser error text
        reason: String,
    },
}

/// Errors related to TSIG (Transaction Signature) authentication for dynamic updates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TsigError {
    /// The key material cannot be used to build a signer.
    ///
    /// Covers malformed base64, an unparseable key name and algorithms the
    /// signer rejects.
    #[error("Invalid TSIG key data for key '{key_name}': {reason}")]
    InvalidTsigKeyData {
        /// The TSIG key name
        key_name: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// The server's response failed TSIG verification, or the server
    /// rejected our signature at the transport level.
    #[error("TSIG verification failed on server {server} for key '{key_name}': {reason}")]
    TsigVerificationFailed {
        /// The DNS server (IP:port)
        server: String,
        /// The TSIG key name that was used
        key_name: String,
        /// Client error text
        reason: String,
    },
}

/// Errors that prevent an UPDATE message from producing a response code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The server host did not resolve to any usable address
    #[error("Failed to resolve server '{host}': {reason}")]
    ServerResolution {
        /// The configured server host
        host: String,
        /// Resolution error text
        reason: String,
    },

    /// Sending the message or receiving the reply failed
    #[error("DNS UPDATE to {server} failed: {reason}")]
    Transport {
        /// The DNS server (IP:port)
        server: String,
        /// Client error text
        reason: String,
    },

    /// The exchange did not complete within the configured bound
    #[error("DNS UPDATE to {server} timed out after {timeout_ms}ms")]
    Timeout {
        /// The DNS server (host or IP:port)
        server: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// The record or zone could not be expressed as a DNS message
    #[error("Invalid update for '{name}': {reason}")]
    InvalidRecord {
        /// The owner or zone name
        name: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// TSIG signing or verification failure
    #[error(transparent)]
    Tsig(#[from] TsigError),
}

/// Errors raised by the status ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A row for this key already exists.
    ///
    /// Returned by `insert` when another writer created the row first. Callers
    /// recover by retrying the write as an update.
    #[error("Status row for {key} already exists")]
    AlreadyExists {
        /// Display form of the status key
        key: String,
    },

    /// An update targeted a row that does not exist
    #[error("Status row for {key} does not exist")]
    NotFound {
        /// Display form of the status key
        key: String,
    },

    /// Reading or writing the backing storage failed
    #[error("Status ledger storage error: {0}")]
    Storage(String),
}

/// Composite error type that encompasses all errors produced by ddnsync.
///
/// Failures caught while reconciling are converted into this type to be
/// counted by reason in metrics and tagged in logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// Catalog configuration or validation error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Authority discovery error
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// Update dispatch error
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Status ledger error
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl DnsError {
    /// Returns true if this error is transient and a later job might succeed.
    ///
    /// Transient errors include network failures and timeouts. Configuration
    /// problems and TSIG key errors will keep failing until someone fixes them.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Authority(
                AuthorityError::LookupFailed { .. }
                | AuthorityError::Timeout { .. }
                | AuthorityError::NoSoaFound { .. },
            )
            | Self::Dispatch(
                DispatchError::ServerResolution { .. }
                | DispatchError::Transport { .. }
                | DispatchError::Timeout { .. },
            )
            | Self::Ledger(LedgerError::Storage(_) | LedgerError::AlreadyExists { .. }) => true,

            Self::Catalog(_)
            | Self::Authority(AuthorityError::InvalidName { .. })
            | Self::Dispatch(DispatchError::InvalidRecord { .. } | DispatchError::Tsig(_))
            | Self::Ledger(LedgerError::NotFound { .. }) => false,
        }
    }

    /// Returns a stable reason code for logs and metrics labels.
    #[must_use]
    pub fn status_reason(&self) -> &'static str {
        match self {
            Self::Catalog(CatalogError::InvalidField { .. }) => "InvalidConfiguration",
            Self::Catalog(CatalogError::DuplicateZone { .. }) => "DuplicateZone",
            Self::Catalog(CatalogError::DuplicatePrefix { .. }) => "DuplicatePrefix",
            Self::Catalog(CatalogError::DuplicateServer { .. }) => "DuplicateServer",
            Self::Catalog(CatalogError::UnknownServer { .. }) => "UnknownServer",

            Self::Authority(AuthorityError::NoSoaFound { .. }) => "NoSoaFound",
            Self::Authority(AuthorityError::LookupFailed { .. }) => "SoaLookupFailed",
            Self::Authority(AuthorityError::Timeout { .. }) => "SoaLookupTimeout",
            Self::Authority(AuthorityError::InvalidName { .. }) => "InvalidName",

            Self::Dispatch(DispatchError::ServerResolution { .. }) => "ServerResolutionFailed",
            Self::Dispatch(DispatchError::Transport { .. }) => "UpdateTransportFailed",
            Self::Dispatch(DispatchError::Timeout { .. }) => "UpdateTimeout",
            Self::Dispatch(DispatchError::InvalidRecord { .. }) => "InvalidRecordData",
            Self::Dispatch(DispatchError::Tsig(TsigError::InvalidTsigKeyData { .. })) => {
                "InvalidTsigKeyData"
            }
            Self::Dispatch(DispatchError::Tsig(TsigError::TsigVerificationFailed { .. })) => {
                "TsigVerificationFailed"
            }

            Self::Ledger(LedgerError::AlreadyExists { .. }) => "StatusRowExists",
            Self::Ledger(LedgerError::NotFound { .. }) => "StatusRowMissing",
            Self::Ledger(LedgerError::Storage(_)) => "LedgerStorageError",
        }
    }
}

#[cfg(test)]
#[path = "dns_errors_tests.rs"]
mod dns_errors_tests;
