// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `authority.rs`

use super::*;
use std::collections::HashMap;
use std::sync::Mutex;

/// Scripted SOA lookup. Unlisted names answer NODATA.
#[derive(Default)]
struct ScriptedLookup {
    answers: HashMap<String, Result<SoaAnswer, AuthorityError>>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedLookup {
    fn answer(mut self, name: &str, answer: Result<SoaAnswer, AuthorityError>) -> Self {
        self.answers.insert(name.to_string(), answer);
        self
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SoaLookup for ScriptedLookup {
    async fn query_soa(&self, name: &str) -> Result<SoaAnswer, AuthorityError> {
        self.queries.lock().unwrap().push(name.to_string());
        self.answers
            .get(name)
            .cloned()
            .unwrap_or(Ok(SoaAnswer::NoData))
    }
}

fn no_delay() -> ExponentialBackoff {
    ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, 3, 2.0, 0.0)
}

fn found(owner: &str) -> Result<SoaAnswer, AuthorityError> {
    Ok(SoaAnswer::Found {
        owner: owner.to_string(),
    })
}

#[tokio::test]
async fn test_walks_up_until_positive_soa() {
    let lookup = Arc::new(ScriptedLookup::default().answer("example.com.", found("example.com.")));
    let resolver = AuthorityResolver::new(lookup.clone()).with_backoff(no_delay);

    let owner = resolver.discover_soa_owner("Host.Example.com").await.unwrap();

    assert_eq!(owner, "example.com.");
    assert_eq!(lookup.queries(), vec!["host.example.com.", "example.com."]);
}

#[tokio::test]
async fn test_nxdomain_authority_section_short_circuits() {
    let lookup = Arc::new(
        ScriptedLookup::default()
            .answer(
                "gone.child.example.com.",
                Ok(SoaAnswer::NxDomain {
                    authority_soa: Some("Child.Example.com".to_string()),
                }),
            )
            .answer("example.com.", found("example.com.")),
    );
    let resolver = AuthorityResolver::new(lookup.clone()).with_backoff(no_delay);

    let owner = resolver
        .discover_soa_owner("gone.child.example.com.")
        .await
        .unwrap();

    assert_eq!(owner, "child.example.com.");
    assert_eq!(lookup.queries(), vec!["gone.child.example.com."]);
}

#[tokio::test]
async fn test_nxdomain_without_soa_continues() {
    let lookup = Arc::new(
        ScriptedLookup::default()
            .answer(
                "a.example.com.",
                Ok(SoaAnswer::NxDomain {
                    authority_soa: None,
                }),
            )
            .answer("example.com.", found("example.com.")),
    );
    let resolver = AuthorityResolver::new(lookup).with_backoff(no_delay);

    let owner = resolver.discover_soa_owner("a.example.com.").await.unwrap();
    assert_eq!(owner, "example.com.");
}

#[tokio::test]
async fn test_delegated_child_zone_is_reported() {
    // Local catalog may still think example.com. owns this name
    let lookup = Arc::new(
        ScriptedLookup::default()
            .answer("child.example.com.", found("child.example.com."))
            .answer("example.com.", found("example.com.")),
    );
    let resolver = AuthorityResolver::new(lookup).with_backoff(no_delay);

    let owner = resolver
        .discover_soa_owner("host.child.example.com.")
        .await
        .unwrap();
    assert_eq!(owner, "child.example.com.");
}

#[tokio::test]
async fn test_no_soa_anywhere_is_an_error() {
    let lookup = Arc::new(ScriptedLookup::default());
    let resolver = AuthorityResolver::new(lookup.clone()).with_backoff(no_delay);

    let err = resolver.discover_soa_owner("a.b.c.").await.unwrap_err();

    assert_eq!(
        err,
        AuthorityError::NoSoaFound {
            name: "a.b.c.".to_string()
        }
    );
    // Not retried: the walk reached a definite conclusion
    assert_eq!(lookup.queries(), vec!["a.b.c.", "b.c.", "c."]);
}

#[tokio::test]
async fn test_lookup_failures_retried_then_reported() {
    let lookup = Arc::new(ScriptedLookup::default().answer(
        "host.example.com.",
        Err(AuthorityError::LookupFailed {
            name: "host.example.com.".to_string(),
            reason: "connection refused".to_string(),
        }),
    ));
    let resolver = AuthorityResolver::new(lookup.clone()).with_backoff(no_delay);

    let err = resolver
        .discover_soa_owner("host.example.com.")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthorityError::LookupFailed { .. }));
    assert_eq!(lookup.queries().len(), 3);
}

#[tokio::test]
async fn test_invalid_name_not_retried() {
    let lookup = Arc::new(ScriptedLookup::default().answer(
        "bad.",
        Err(AuthorityError::InvalidName {
            name: "bad.".to_string(),
            reason: "label too long".to_string(),
        }),
    ));
    let resolver = AuthorityResolver::new(lookup.clone()).with_backoff(no_delay);

    assert!(resolver.discover_soa_owner("bad.").await.is_err());
    assert_eq!(lookup.queries().len(), 1);
}

#[tokio::test]
async fn test_empty_name_has_no_authority() {
    let lookup = Arc::new(ScriptedLookup::default());
    let resolver = AuthorityResolver::new(lookup.clone()).with_backoff(no_delay);

    assert!(resolver.discover_soa_owner("").await.is_err());
    assert!(lookup.queries().is_empty());
}
