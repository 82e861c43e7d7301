// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration file types.
//!
//! ddnsync is configured with a single YAML document describing the update
//! servers, the forward and reverse zones they own, and runtime settings.
//! These types are the raw, unvalidated form; [`crate::catalog::ZoneCatalog::from_config`]
//! normalizes and validates them.
//!
//! # Example
//!
//! ```yaml
//! servers:
//!   - name: primary
//!     host: ns1.example.com
//!     tsigKeyName: ddns-key
//!     tsigAlgorithm: hmac-sha256
//!     tsigKey: c2VjcmV0LWtleS1tYXRlcmlhbA==
//! zones:
//!   - name: example.com
//!     ttl: 300
//!     server: primary
//! reverseZones:
//!   - prefix: 192.0.2.0/24
//!     ttl: 300
//!     server: primary
//!   - prefix: 198.51.100.64/26
//!     name: 64/26.100.51.198.in-addr.arpa
//!     ttl: 300
//!     server: primary
//! ledger:
//!   path: /var/lib/ddnsync/status.json
//! ```

use crate::constants::{
    DEFAULT_RESOLVER_ATTEMPTS, DEFAULT_RESOLVER_TIMEOUT_SECS, DEFAULT_UPDATE_TIMEOUT_SECS,
    DNS_PORT,
};
use crate::model::TsigAlgorithm;
use anyhow::{Context, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration document.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Servers accepting dynamic updates.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,

    /// Forward zones.
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,

    /// Reverse zones.
    #[serde(default)]
    pub reverse_zones: Vec<ReverseZoneConfig>,

    /// SOA discovery settings.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Dynamic update transport settings.
    #[serde(default)]
    pub update: UpdateConfig,

    /// Status ledger persistence.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Prometheus metrics endpoint.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for
    /// this schema. Semantic validation happens when building the catalog.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not match the schema.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid configuration document")
    }
}

/// A server accepting TSIG-signed dynamic updates.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ServerConfig {
    /// Local handle referenced by zones.
    pub name: String,

    /// Host name or IP address of the server.
    pub host: String,

    /// UDP port. Defaults to 53.
    #[serde(default = "default_port")]
    #[schemars(range(min = 53, max = 65535))]
    pub port: u16,

    /// TSIG key name.
    pub tsig_key_name: String,

    /// TSIG algorithm.
    pub tsig_algorithm: TsigAlgorithm,

    /// TSIG secret in base64 notation.
    pub tsig_key: String,
}

/// A forward zone.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ZoneConfig {
    /// Zone name, e.g. `example.com`.
    pub name: String,

    /// TTL for records created in this zone.
    pub ttl: u32,

    /// Handle of the server accepting updates.
    pub server: String,
}

/// A reverse zone.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReverseZoneConfig {
    /// Covered prefix in CIDR notation.
    pub prefix: String,

    /// RFC 2317 style reverse zone name, required when the prefix doesn't map
    /// to a reverse zone (IPv4 not /0, /8, /16 or /24; IPv6 not on a nibble).
    #[serde(default)]
    pub name: Option<String>,

    /// TTL for PTR records created in this zone.
    pub ttl: u32,

    /// Handle of the server accepting updates.
    pub server: String,
}

/// SOA discovery settings.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResolverConfig {
    /// Timeout for a single query, in seconds.
    #[serde(default = "default_resolver_timeout")]
    pub timeout_secs: u64,

    /// Attempts the resolver makes per query.
    #[serde(default = "default_resolver_attempts")]
    pub attempts: usize,
}

impl ResolverConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_RESOLVER_TIMEOUT_SECS,
            attempts: DEFAULT_RESOLVER_ATTEMPTS,
        }
    }
}

/// Dynamic update transport settings.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateConfig {
    /// Timeout for server resolution and for the UPDATE exchange, in seconds.
    #[serde(default = "default_update_timeout")]
    pub timeout_secs: u64,
}

impl UpdateConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_UPDATE_TIMEOUT_SECS,
        }
    }
}

/// Status ledger persistence.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LedgerConfig {
    /// JSON file holding status rows. In-memory only when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Prometheus metrics endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MetricsConfig {
    /// Address to serve `/metrics` on, e.g. `0.0.0.0:9153`. Disabled when absent.
    #[serde(default)]
    pub bind_address: Option<String>,
}

fn default_port() -> u16 {
    DNS_PORT
}

fn default_resolver_timeout() -> u64 {
    DEFAULT_RESOLVER_TIMEOUT_SECS
}

fn default_resolver_attempts() -> usize {
    DEFAULT_RESOLVER_ATTEMPTS
}

fn default_update_timeout() -> u64 {
    DEFAULT_UPDATE_TIMEOUT_SECS
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
