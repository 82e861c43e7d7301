// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Name and address normalization.
//!
//! All names handled by ddnsync are compared in canonical form: lowercase with
//! exactly one trailing dot. Reverse owner names are built label by label from
//! the address bits not already covered by the reverse zone's prefix, which
//! keeps RFC 2317 classless delegations working: the zone supplies everything
//! above the delegation point and only the remaining octets (or nibbles) are
//! prepended.

use crate::constants::{IPV4_REVERSE_SUFFIX, IPV6_REVERSE_SUFFIX};
use crate::dns_errors::CatalogError;
use ipnet::IpNet;
use std::net::IpAddr;

/// Canonicalize a DNS name.
///
/// Empty (or blank) input maps to the empty string, which callers treat as
/// "no record". Anything else is lowercased and given exactly one trailing dot.
///
/// # Example
///
/// ```rust
/// use ddnsync::normalize::normalize_fqdn;
///
/// assert_eq!(normalize_fqdn("Example.COM"), "example.com.");
/// assert_eq!(normalize_fqdn("example.com."), "example.com.");
/// assert_eq!(normalize_fqdn(""), "");
/// ```
#[must_use]
pub fn normalize_fqdn(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return String::new();
    }

    format!("{}.", name.to_lowercase().trim_end_matches('.'))
}

/// Build the PTR owner name for `address` inside a reverse zone.
///
/// Every octet (IPv4) or nibble (IPv6) that lies entirely inside the zone's
/// prefix is already represented by `zone_name`; the remaining ones are
/// prepended most significant first, so the least significant one ends up
/// leftmost.
///
/// # Example
///
/// ```rust
/// use ddnsync::normalize::reverse_record_name;
///
/// let name = reverse_record_name("2.0.192.in-addr.arpa.", 24, "192.0.2.10".parse().unwrap());
/// assert_eq!(name, "10.2.0.192.in-addr.arpa.");
///
/// // RFC 2317: a /26 delegated as "0-63.2.0.192.in-addr.arpa."
/// let name = reverse_record_name("0-63.2.0.192.in-addr.arpa.", 26, "192.0.2.10".parse().unwrap());
/// assert_eq!(name, "10.0-63.2.0.192.in-addr.arpa.");
/// ```
#[must_use]
pub fn reverse_record_name(zone_name: &str, prefix_len: u8, address: IpAddr) -> String {
    let prefix_len = usize::from(prefix_len);
    let mut record_name = zone_name.to_string();

    match address {
        IpAddr::V4(v4) => {
            for (pos, octet) in v4.octets().iter().enumerate() {
                if (pos + 1) * 8 <= prefix_len {
                    continue;
                }
                record_name = format!("{octet}.{record_name}");
            }
        }
        IpAddr::V6(v6) => {
            for (pos, nibble) in nibbles(v6.into()).iter().enumerate() {
                if (pos + 1) * 4 <= prefix_len {
                    continue;
                }
                record_name = format!("{nibble:x}.{record_name}");
            }
        }
    }

    record_name
}

/// Synthesize the canonical reverse zone name for an aligned prefix.
///
/// IPv4 prefixes must be /0, /8, /16 or /24 and IPv6 prefixes a multiple of 4.
/// Anything else needs an RFC 2317 style name supplied by the operator, which
/// is reported as a validation error on the `name` field.
///
/// # Errors
///
/// Returns [`CatalogError::InvalidField`] when the prefix is not aligned.
pub fn derive_reverse_zone_name(prefix: &IpNet) -> Result<String, CatalogError> {
    let prefix_len = usize::from(prefix.prefix_len());

    match prefix {
        IpNet::V4(net) => {
            if ![0, 8, 16, 24].contains(&prefix_len) {
                return Err(CatalogError::InvalidField {
                    object: format!("reverse zone {prefix}"),
                    field: "name",
                    reason: "Required when prefix length is not 0, 8, 16 or 24".to_string(),
                });
            }

            let mut name = IPV4_REVERSE_SUFFIX.to_string();
            for (pos, octet) in net.network().octets().iter().enumerate() {
                if pos * 8 >= prefix_len {
                    break;
                }
                name = format!("{octet}.{name}");
            }
            Ok(normalize_fqdn(&name))
        }
        IpNet::V6(net) => {
            if prefix_len % 4 != 0 {
                return Err(CatalogError::InvalidField {
                    object: format!("reverse zone {prefix}"),
                    field: "name",
                    reason: "Required when prefix length is not a nibble boundary".to_string(),
                });
            }

            let mut name = IPV6_REVERSE_SUFFIX.to_string();
            for (pos, nibble) in nibbles(net.network().into()).iter().enumerate() {
                if pos * 4 >= prefix_len {
                    break;
                }
                name = format!("{nibble:x}.{name}");
            }
            Ok(normalize_fqdn(&name))
        }
    }
}

/// Resolve the name of a reverse zone: the explicit name when given, otherwise
/// the one derived from the prefix.
///
/// # Errors
///
/// Returns an error when no explicit name is given and the prefix is not aligned.
pub fn reverse_zone_name(prefix: &IpNet, explicit: Option<&str>) -> Result<String, CatalogError> {
    match explicit.map(normalize_fqdn) {
        Some(name) if !name.is_empty() => Ok(name),
        _ => derive_reverse_zone_name(prefix),
    }
}

/// All labels of a name, leftmost first, without the root label.
#[must_use]
pub fn labels(name: &str) -> Vec<&str> {
    name.trim_end_matches('.')
        .split('.')
        .filter(|label| !label.is_empty())
        .collect()
}

/// Every suffix of `name` from the full name down to the top-level label,
/// each in canonical form.
///
/// `a.b.c.` yields `a.b.c.`, `b.c.`, `c.`.
#[must_use]
pub fn suffixes(name: &str) -> Vec<String> {
    let normalized = normalize_fqdn(name);
    let labels = labels(&normalized);
    (0..labels.len())
        .map(|start| format!("{}.", labels[start..].join(".")))
        .collect()
}

/// True when `name` equals `zone` or lies below it. Both must be canonical.
#[must_use]
pub fn is_subdomain_of(name: &str, zone: &str) -> bool {
    if zone == "." {
        return true;
    }
    name == zone || name.ends_with(&format!(".{zone}"))
}

fn nibbles(value: u128) -> [u8; 32] {
    let mut out = [0u8; 32];
    for (pos, slot) in out.iter_mut().enumerate() {
        let shift = (31 - pos) * 4;
        // Masked to four bits, cannot truncate
        #[allow(clippy::cast_possible_truncation)]
        {
            *slot = ((value >> shift) & 0xf) as u8;
        }
    }
    out
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod normalize_tests;
