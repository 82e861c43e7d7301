// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Core data model.
//!
//! - [`Server`], [`Zone`] and [`ReverseZone`] make up the zone catalog. They are
//!   built from configuration by [`crate::catalog::ZoneCatalog::from_config`] and
//!   are always validated and normalized.
//! - [`Binding`] and [`ExtraNameRecord`] are snapshots of the inventory's address
//!   records. They are owned by the inventory; ddnsync only observes them.
//! - [`Action`], [`Direction`] and [`ResultCode`] are the vocabulary of the
//!   status ledger.

use crate::constants::RCODE_NO_ZONE;
use crate::normalize;
use ipnet::IpNet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;

/// HMAC algorithm used to sign dynamic updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum TsigAlgorithm {
    #[serde(rename = "hmac-md5")]
    HmacMd5,
    #[serde(rename = "hmac-sha1")]
    HmacSha1,
    #[serde(rename = "hmac-sha224")]
    HmacSha224,
    #[serde(rename = "hmac-sha256")]
    HmacSha256,
    #[serde(rename = "hmac-sha384")]
    HmacSha384,
    #[serde(rename = "hmac-sha512")]
    HmacSha512,
}

impl TsigAlgorithm {
    /// BIND-style algorithm name (e.g. `hmac-sha256`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HmacMd5 => "hmac-md5",
            Self::HmacSha1 => "hmac-sha1",
            Self::HmacSha224 => "hmac-sha224",
            Self::HmacSha256 => "hmac-sha256",
            Self::HmacSha384 => "hmac-sha384",
            Self::HmacSha512 => "hmac-sha512",
        }
    }
}

impl FromStr for TsigAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // hmac-md5 is still written with its historic suffix in some key files
        match s.trim().trim_end_matches('.').to_lowercase().as_str() {
            "hmac-md5" | "hmac-md5.sig-alg.reg.int" => Ok(Self::HmacMd5),
            "hmac-sha1" => Ok(Self::HmacSha1),
            "hmac-sha224" => Ok(Self::HmacSha224),
            "hmac-sha256" => Ok(Self::HmacSha256),
            "hmac-sha384" => Ok(Self::HmacSha384),
            "hmac-sha512" => Ok(Self::HmacSha512),
            other => Err(format!(
                "Unsupported TSIG algorithm '{other}'. Supported algorithms: hmac-md5, hmac-sha1, hmac-sha224, hmac-sha256, hmac-sha384, hmac-sha512"
            )),
        }
    }
}

impl fmt::Display for TsigAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS server that accepts TSIG-authenticated dynamic updates.
///
/// `host` may be a name or an address. It is resolved every time an update is
/// dispatched and never cached.
#[derive(Clone, PartialEq, Eq)]
pub struct Server {
    /// Host name or address, lowercased, without trailing dot
    pub host: String,
    /// UDP port for updates
    pub port: u16,
    /// TSIG key name, fully qualified
    pub tsig_key_name: String,
    /// TSIG signing algorithm
    pub tsig_algorithm: TsigAlgorithm,
    /// Base64-encoded TSIG secret
    pub tsig_key: String,
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.host, self.tsig_key_name)
    }
}

// Keep the secret out of logs
impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tsig_key_name", &self.tsig_key_name)
            .field("tsig_algorithm", &self.tsig_algorithm)
            .finish_non_exhaustive()
    }
}

/// A forward zone bound to the server that accepts its updates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Zone {
    /// Fully qualified zone name with trailing dot
    pub name: String,
    /// TTL for records created in this zone
    pub ttl: u32,
    /// Server accepting updates for this zone
    pub server: Arc<Server>,
}

/// A reverse zone covering an IP prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReverseZone {
    /// Covered network, host bits cleared
    pub prefix: IpNet,
    /// Fully qualified reverse zone name (explicit or derived from the prefix)
    pub name: String,
    /// TTL for PTR records created in this zone
    pub ttl: u32,
    /// Server accepting updates for this zone
    pub server: Arc<Server>,
}

impl ReverseZone {
    /// PTR owner name for `address` within this zone.
    #[must_use]
    pub fn record_name(&self, address: IpAddr) -> String {
        normalize::reverse_record_name(&self.name, self.prefix.prefix_len(), address)
    }
}

/// The zone an update is scoped to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateZone<'a> {
    Forward(&'a Zone),
    Reverse(&'a ReverseZone),
}

impl UpdateZone<'_> {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Forward(zone) => &zone.name,
            Self::Reverse(zone) => &zone.name,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> u32 {
        match self {
            Self::Forward(zone) => zone.ttl,
            Self::Reverse(zone) => zone.ttl,
        }
    }

    #[must_use]
    pub fn server(&self) -> &Server {
        match self {
            Self::Forward(zone) => &zone.server,
            Self::Reverse(zone) => &zone.server,
        }
    }
}

/// An auxiliary DNS name attached to a binding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraName {
    /// Inventory identifier of the auxiliary name record
    pub id: u64,
    /// The DNS name (normalized by the reconciler before use)
    pub name: String,
}

/// Snapshot of an inventory address record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// Inventory identifier of the address record
    pub id: u64,
    /// The bound IP address
    pub address: IpAddr,
    /// Primary DNS name, possibly empty
    #[serde(default)]
    pub dns_name: String,
    /// Auxiliary names pointing at the same address
    #[serde(default)]
    pub extra_names: Vec<ExtraName>,
}

/// Snapshot of an auxiliary name record together with its parent binding's
/// address and primary name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraNameRecord {
    /// Inventory identifier of the auxiliary name record
    pub id: u64,
    /// Inventory identifier of the owning binding
    pub binding_id: u64,
    /// The owning binding's address
    pub address: IpAddr,
    /// The owning binding's primary DNS name
    #[serde(default)]
    pub primary_name: String,
    /// The auxiliary DNS name
    pub name: String,
}

/// Which record family an operation touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// A / AAAA records
    Forward,
    /// PTR records
    Reverse,
}

/// What was last attempted for a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Delete,
}

impl Action {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an update as recorded in the status ledger.
///
/// Holds either a DNS response code exactly as the server returned it, or the
/// private [`ResultCode::NO_ZONE`] sentinel. Serialized as a bare integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub u16);

impl ResultCode {
    pub const NO_ERROR: Self = Self(0);
    pub const FORM_ERR: Self = Self(1);
    pub const SERV_FAIL: Self = Self(2);
    pub const NX_DOMAIN: Self = Self(3);
    pub const NOT_IMP: Self = Self(4);
    pub const REFUSED: Self = Self(5);
    pub const NOT_AUTH: Self = Self(9);
    /// No matching zone or reverse zone is configured
    pub const NO_ZONE: Self = Self(RCODE_NO_ZONE);

    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::NO_ERROR
    }

    #[must_use]
    pub fn is_no_zone(self) -> bool {
        self == Self::NO_ZONE
    }

    /// Mnemonic form (e.g. `NOERROR`, `NOTAUTH`).
    #[must_use]
    pub fn mnemonic(self) -> String {
        let text = match self.0 {
            0 => "NOERROR",
            1 => "FORMERR",
            2 => "SERVFAIL",
            3 => "NXDOMAIN",
            4 => "NOTIMP",
            5 => "REFUSED",
            6 => "YXDOMAIN",
            7 => "YXRRSET",
            8 => "NXRRSET",
            9 => "NOTAUTH",
            10 => "NOTZONE",
            16 => "BADSIG",
            17 => "BADKEY",
            18 => "BADTIME",
            RCODE_NO_ZONE => "NOZONE",
            other => return other.to_string(),
        };
        text.to_string()
    }

    /// Human readable description for reporting.
    #[must_use]
    pub fn description(self) -> String {
        match self {
            Self::NO_ERROR => "Success".to_string(),
            Self::SERV_FAIL => "Server failure".to_string(),
            Self::NX_DOMAIN => "Name does not exist".to_string(),
            Self::NOT_IMP => "Not implemented".to_string(),
            Self::REFUSED => "Refused".to_string(),
            Self::NOT_AUTH => "Server not authoritative".to_string(),
            Self::NO_ZONE => "No zone configured".to_string(),
            Self(other) => format!("Unknown response: {other}"),
        }
    }
}

impl From<hickory_client::op::ResponseCode> for ResultCode {
    fn from(code: hickory_client::op::ResponseCode) -> Self {
        Self(u16::from(code))
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mnemonic())
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod model_tests;
