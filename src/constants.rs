// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for ddnsync.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS port for queries and dynamic updates
pub const DNS_PORT: u16 = 53;

/// Lowest port a dynamic update server may be configured on
pub const MIN_SERVER_PORT: u16 = 53;

/// TSIG fudge time in seconds (allows for clock skew)
pub const TSIG_FUDGE_TIME_SECS: u64 = 300;

/// Reverse lookup suffix for IPv4 addresses
pub const IPV4_REVERSE_SUFFIX: &str = "in-addr.arpa";

/// Reverse lookup suffix for IPv6 addresses
pub const IPV6_REVERSE_SUFFIX: &str = "ip6.arpa";

// ============================================================================
// Status Ledger Constants
// ============================================================================

/// Private response code recorded when no zone is configured for a name or address.
///
/// Lives outside the 12-bit extended RCODE space used by servers, and is read by
/// reporting tooling, so the value must never change.
pub const RCODE_NO_ZONE: u16 = 4095;

// ============================================================================
// Timeout and Retry Constants
// ============================================================================

/// Default per-query timeout for SOA discovery lookups
pub const DEFAULT_RESOLVER_TIMEOUT_SECS: u64 = 5;

/// Default number of attempts the resolver makes per query
pub const DEFAULT_RESOLVER_ATTEMPTS: usize = 3;

/// Default timeout for resolving a server host and exchanging one UPDATE message
pub const DEFAULT_UPDATE_TIMEOUT_SECS: u64 = 5;

/// Maximum number of complete SOA discovery walks before giving up
pub const SOA_DISCOVERY_MAX_ATTEMPTS: u32 = 3;

/// Initial delay between SOA discovery walks
pub const SOA_DISCOVERY_INITIAL_BACKOFF_MILLIS: u64 = 200;

/// Upper bound on the delay between SOA discovery walks
pub const SOA_DISCOVERY_MAX_BACKOFF_SECS: u64 = 2;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";
