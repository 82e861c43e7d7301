// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for error types.

#[cfg(test)]
mod tests {
    use crate::dns_errors::*;

    #[test]
    fn test_invalid_field_error_names_field() {
        let error = CatalogError::InvalidField {
            object: "reverse zone 10.0.0.0/20".to_string(),
            field: "name",
            reason: "Required when prefix length is not 0, 8, 16 or 24".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Invalid name for reverse zone 10.0.0.0/20: Required when prefix length is not 0, 8, 16 or 24"
        );
        assert_eq!(error.field(), Some("name"));
    }

    #[test]
    fn test_duplicate_errors_map_to_fields() {
        let zone = CatalogError::DuplicateZone {
            zone: "example.com.".to_string(),
        };
        let prefix = CatalogError::DuplicatePrefix {
            prefix: "10.0.0.0/24".to_string(),
        };
        let server = CatalogError::DuplicateServer {
            host: "ns1.example.com".to_string(),
            key_name: "ddns-key.".to_string(),
        };

        assert_eq!(zone.field(), Some("name"));
        assert_eq!(prefix.field(), Some("prefix"));
        assert_eq!(server.field(), Some("tsigKeyName"));
        assert_eq!(zone.to_string(), "Duplicate zone 'example.com.'");
    }

    #[test]
    fn test_authority_errors_display() {
        let error = AuthorityError::NoSoaFound {
            name: "host.example.com.".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "No SOA record found for 'host.example.com.' or any of its parents"
        );

        let error = AuthorityError::Timeout {
            name: "example.com.".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(
            error.to_string(),
            "SOA lookup for 'example.com.' timed out after 5000ms"
        );
    }

    #[test]
    fn test_tsig_error_is_transparent_in_dispatch_error() {
        let error: DispatchError = TsigError::InvalidTsigKeyData {
            key_name: "ddns-key.".to_string(),
            reason: "Invalid base64".to_string(),
        }
        .into();

        assert_eq!(
            error.to_string(),
            "Invalid TSIG key data for key 'ddns-key.': Invalid base64"
        );
    }

    #[test]
    fn test_transient_classification() {
        let transient: Vec<DnsError> = vec![
            AuthorityError::LookupFailed {
                name: "a.".to_string(),
                reason: "io".to_string(),
            }
            .into(),
            DispatchError::Timeout {
                server: "10.0.0.1:53".to_string(),
                timeout_ms: 5000,
            }
            .into(),
            DispatchError::ServerResolution {
                host: "ns1".to_string(),
                reason: "no addresses".to_string(),
            }
            .into(),
            LedgerError::Storage("disk full".to_string()).into(),
        ];
        for error in &transient {
            assert!(error.is_transient(), "{error} should be transient");
        }

        let permanent: Vec<DnsError> = vec![
            CatalogError::DuplicateZone {
                zone: "example.com.".to_string(),
            }
            .into(),
            DispatchError::Tsig(TsigError::InvalidTsigKeyData {
                key_name: "k.".to_string(),
                reason: "bad".to_string(),
            })
            .into(),
            AuthorityError::InvalidName {
                name: "..".to_string(),
                reason: "empty label".to_string(),
            }
            .into(),
        ];
        for error in &permanent {
            assert!(!error.is_transient(), "{error} should not be transient");
        }
    }

    #[test]
    fn test_status_reasons() {
        let error: DnsError = DispatchError::Tsig(TsigError::TsigVerificationFailed {
            server: "10.0.0.1:53".to_string(),
            key_name: "k.".to_string(),
            reason: "BADSIG".to_string(),
        })
        .into();
        assert_eq!(error.status_reason(), "TsigVerificationFailed");

        let error: DnsError = AuthorityError::NoSoaFound {
            name: "x.".to_string(),
        }
        .into();
        assert_eq!(error.status_reason(), "NoSoaFound");

        let error: DnsError = LedgerError::Storage("disk full".to_string()).into();
        assert_eq!(error.status_reason(), "LedgerStorageError");
        assert_eq!(error.to_string(), "Status ledger storage error: disk full");
    }
}
