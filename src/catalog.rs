// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone catalog.
//!
//! The catalog is the locally configured view of which server owns which
//! forward and reverse zones. Lookups always return the most specific match:
//! the longest zone name for forward names and the longest prefix for
//! addresses. Zone counts are expected in the tens to low thousands, so both
//! lookups are linear scans.
//!
//! The catalog says nothing about live authority. A zone configured here may
//! have been delegated away since; [`crate::authority`] guards against that.

use crate::config::{Config, ReverseZoneConfig, ServerConfig, ZoneConfig};
use crate::constants::MIN_SERVER_PORT;
use crate::dns_errors::CatalogError;
use crate::model::{Binding, ReverseZone, Server, TsigAlgorithm, Zone};
use crate::normalize::{is_subdomain_of, normalize_fqdn, reverse_zone_name, suffixes};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ipnet::IpNet;
use std::collections::{BTreeMap, HashSet};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Configured forward and reverse zones with their servers.
#[derive(Clone, Debug, Default)]
pub struct ZoneCatalog {
    servers: BTreeMap<String, Arc<Server>>,
    zones: Vec<Zone>,
    reverse_zones: Vec<ReverseZone>,
}

impl ZoneCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and validate a catalog from configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found. A catalog is never partially
    /// built.
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        validate_timeouts(config)?;
        let mut catalog = Self::new();

        for server in &config.servers {
            catalog.add_server_config(server)?;
        }
        for zone in &config.zones {
            catalog.add_zone_config(zone)?;
        }
        for zone in &config.reverse_zones {
            catalog.add_reverse_zone_config(zone)?;
        }

        debug!(
            servers = catalog.servers.len(),
            zones = catalog.zones.len(),
            reverse_zones = catalog.reverse_zones.len(),
            "Zone catalog built"
        );
        Ok(catalog)
    }

    /// Register a server under a local handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is taken, the (host, key name) pair is
    /// already registered, or any field fails validation.
    pub fn add_server(&mut self, handle: &str, server: Server) -> Result<Arc<Server>, CatalogError> {
        if self.servers.contains_key(handle) {
            return Err(CatalogError::InvalidField {
                object: format!("server {handle}"),
                field: "name",
                reason: "Server name is already in use".to_string(),
            });
        }
        if self
            .servers
            .values()
            .any(|s| s.host == server.host && s.tsig_key_name == server.tsig_key_name)
        {
            return Err(CatalogError::DuplicateServer {
                host: server.host,
                key_name: server.tsig_key_name,
            });
        }

        let server = Arc::new(server);
        self.servers.insert(handle.to_string(), server.clone());
        Ok(server)
    }

    /// Add a forward zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, the TTL is zero, or a zone with
    /// the same normalized name exists.
    pub fn add_zone(&mut self, name: &str, ttl: u32, server: Arc<Server>) -> Result<(), CatalogError> {
        let name = normalize_fqdn(name);
        if name.is_empty() {
            return Err(CatalogError::InvalidField {
                object: "zone".to_string(),
                field: "name",
                reason: "Zone name must not be empty".to_string(),
            });
        }
        validate_ttl(&format!("zone {name}"), ttl)?;
        if self.zones.iter().any(|zone| zone.name == name) {
            return Err(CatalogError::DuplicateZone { zone: name });
        }

        self.zones.push(Zone { name, ttl, server });
        Ok(())
    }

    /// Add a reverse zone. Host bits in `prefix` are cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix is already configured, the TTL is zero,
    /// or no name is given for a prefix that is not octet/nibble aligned.
    pub fn add_reverse_zone(
        &mut self,
        prefix: IpNet,
        name: Option<&str>,
        ttl: u32,
        server: Arc<Server>,
    ) -> Result<(), CatalogError> {
        let prefix = prefix.trunc();
        let name = reverse_zone_name(&prefix, name)?;
        validate_ttl(&format!("reverse zone {prefix}"), ttl)?;
        if self.reverse_zones.iter().any(|zone| zone.prefix == prefix) {
            return Err(CatalogError::DuplicatePrefix {
                prefix: prefix.to_string(),
            });
        }

        self.reverse_zones.push(ReverseZone {
            prefix,
            name,
            ttl,
            server,
        });
        Ok(())
    }

    /// Look up a server by its local handle.
    #[must_use]
    pub fn server(&self, handle: &str) -> Option<Arc<Server>> {
        self.servers.get(handle).cloned()
    }

    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    #[must_use]
    pub fn reverse_zones(&self) -> &[ReverseZone] {
        &self.reverse_zones
    }

    /// Find the most specific forward zone containing `name`.
    ///
    /// Every suffix of the name is a candidate zone; the longest configured
    /// candidate wins.
    #[must_use]
    pub fn find_forward_zone(&self, name: &str) -> Option<&Zone> {
        let candidates: HashSet<String> = suffixes(name).into_iter().collect();
        if candidates.is_empty() {
            return None;
        }

        self.zones
            .iter()
            .filter(|zone| candidates.contains(&zone.name))
            .max_by_key(|zone| zone.name.len())
    }

    /// Find the reverse zone with the longest prefix containing `address`.
    #[must_use]
    pub fn find_reverse_zone(&self, address: IpAddr) -> Option<&ReverseZone> {
        self.reverse_zones
            .iter()
            .filter(|zone| zone.prefix.contains(&address))
            .max_by_key(|zone| zone.prefix.prefix_len())
    }

    /// Bindings whose primary name is served by the forward zone `zone_name`.
    ///
    /// Names that fall under a more specific configured zone are excluded;
    /// they belong to that zone's re-sync.
    #[must_use]
    pub fn bindings_in_forward_zone<'a>(
        &self,
        zone_name: &str,
        bindings: &'a [Binding],
    ) -> Vec<&'a Binding> {
        let zone_name = normalize_fqdn(zone_name);
        let more_specifics: Vec<&str> = self
            .zones
            .iter()
            .filter(|zone| zone.name != zone_name && is_subdomain_of(&zone.name, &zone_name))
            .map(|zone| zone.name.as_str())
            .collect();

        bindings
            .iter()
            .filter(|binding| {
                let name = normalize_fqdn(&binding.dns_name);
                !name.is_empty()
                    && is_subdomain_of(&name, &zone_name)
                    && !more_specifics
                        .iter()
                        .any(|specific| is_subdomain_of(&name, specific))
            })
            .collect()
    }

    /// Bindings whose address is served by the reverse zone for `prefix`.
    ///
    /// Addresses inside a more specific configured reverse zone are excluded.
    /// Bindings without a name are skipped since they have no PTR target.
    #[must_use]
    pub fn bindings_in_reverse_zone<'a>(
        &self,
        prefix: &IpNet,
        bindings: &'a [Binding],
    ) -> Vec<&'a Binding> {
        let prefix = prefix.trunc();
        let more_specifics: Vec<&IpNet> = self
            .reverse_zones
            .iter()
            .filter(|zone| zone.prefix != prefix && prefix.contains(&zone.prefix))
            .map(|zone| &zone.prefix)
            .collect();

        bindings
            .iter()
            .filter(|binding| {
                !normalize_fqdn(&binding.dns_name).is_empty()
                    && prefix.contains(&binding.address)
                    && !more_specifics
                        .iter()
                        .any(|specific| specific.contains(&binding.address))
            })
            .collect()
    }

    fn add_server_config(&mut self, config: &ServerConfig) -> Result<(), CatalogError> {
        let server = build_server(
            &config.name,
            &config.host,
            config.port,
            &config.tsig_key_name,
            config.tsig_algorithm,
            &config.tsig_key,
        )?;
        self.add_server(&config.name, server)?;
        Ok(())
    }

    fn add_zone_config(&mut self, config: &ZoneConfig) -> Result<(), CatalogError> {
        let server = self
            .server(&config.server)
            .ok_or_else(|| CatalogError::UnknownServer {
                zone: config.name.clone(),
                server: config.server.clone(),
            })?;
        self.add_zone(&config.name, config.ttl, server)
    }

    fn add_reverse_zone_config(&mut self, config: &ReverseZoneConfig) -> Result<(), CatalogError> {
        let prefix = IpNet::from_str(config.prefix.trim()).map_err(|e| CatalogError::InvalidField {
            object: format!("reverse zone {}", config.prefix),
            field: "prefix",
            reason: e.to_string(),
        })?;
        let server = self
            .server(&config.server)
            .ok_or_else(|| CatalogError::UnknownServer {
                zone: config.prefix.clone(),
                server: config.server.clone(),
            })?;
        self.add_reverse_zone(prefix, config.name.as_deref(), config.ttl, server)
    }
}

fn validate_timeouts(config: &Config) -> Result<(), CatalogError> {
    let checks = [
        ("resolver", "timeoutSecs", config.resolver.timeout_secs == 0),
        ("resolver", "attempts", config.resolver.attempts == 0),
        ("update", "timeoutSecs", config.update.timeout_secs == 0),
    ];
    for (object, field, is_zero) in checks {
        if is_zero {
            return Err(CatalogError::InvalidField {
                object: object.to_string(),
                field,
                reason: "Must be greater than zero".to_string(),
            });
        }
    }
    Ok(())
}

/// Validate and normalize server settings.
///
/// The host is lowercased with trailing dots removed, and the key name is
/// turned into a fully qualified name.
///
/// # Errors
///
/// Returns an error naming the offending field when the host or key name is
/// empty, the port is below 53, or the key is not valid base64.
pub fn build_server(
    handle: &str,
    host: &str,
    port: u16,
    tsig_key_name: &str,
    tsig_algorithm: TsigAlgorithm,
    tsig_key: &str,
) -> Result<Server, CatalogError> {
    let object = format!("server {handle}");

    let host = host.trim().to_lowercase().trim_end_matches('.').to_string();
    if host.is_empty() {
        return Err(CatalogError::InvalidField {
            object,
            field: "host",
            reason: "Enter a valid hostname or IP address".to_string(),
        });
    }

    if port < MIN_SERVER_PORT {
        return Err(CatalogError::InvalidField {
            object,
            field: "port",
            reason: format!("Port must be between {MIN_SERVER_PORT} and 65535"),
        });
    }

    let tsig_key_name = normalize_fqdn(tsig_key_name);
    if tsig_key_name.is_empty() {
        return Err(CatalogError::InvalidField {
            object,
            field: "tsigKeyName",
            reason: "Enter a valid hostname".to_string(),
        });
    }

    let tsig_key = tsig_key.trim().to_string();
    if tsig_key.is_empty() || BASE64.decode(&tsig_key).is_err() {
        return Err(CatalogError::InvalidField {
            object,
            field: "tsigKey",
            reason: "Invalid base64 string".to_string(),
        });
    }

    Ok(Server {
        host,
        port,
        tsig_key_name,
        tsig_algorithm,
        tsig_key,
    })
}

fn validate_ttl(object: &str, ttl: u32) -> Result<(), CatalogError> {
    if ttl == 0 {
        return Err(CatalogError::InvalidField {
            object: object.to_string(),
            field: "ttl",
            reason: "TTL must be positive".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod catalog_tests;
