//! Architectural Contract Test: Conflicts Change Nothing
//!
//! This test verifies that a hostname already routed elsewhere is refused
//! before any mutation.
//!
//! Constraints verified:
//! - Expose(s, p2) after Expose(s, p1) fails with `Conflict`
//! - The routing file is byte-identical afterwards
//! - No DNS, access, or restart call is made for the refused request
//! - The error tells the caller to unexpose first

mod common;

use common::*;
use orb_core::{Error, ExposeRequest};
use tempfile::TempDir;

#[tokio::test]
async fn different_port_for_exposed_subdomain_is_a_conflict() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes::default();
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    coordinator
        .expose(&ExposeRequest::new("api", "8080"))
        .await
        .unwrap();

    let before = store.bytes().await;
    let saves = store.save_count();

    let err = coordinator
        .expose(&ExposeRequest::new("api", "9090"))
        .await
        .unwrap_err();

    match &err {
        Error::Conflict {
            hostname, existing, ..
        } => {
            assert_eq!(hostname, "api.example.com");
            assert_eq!(existing, "http://localhost:8080");
        }
        other => panic!("expected Conflict, got {other:?}"),
    }
    assert!(err.to_string().contains("orb tunnel unexpose api"));

    assert_eq!(store.bytes().await, before, "routing file must be byte-identical");
    assert_eq!(store.save_count(), saves);
    assert_eq!(fakes.dns.create_calls(), 1);
    assert_eq!(fakes.service.restarts(), 1);
}

#[tokio::test]
async fn different_service_type_is_a_conflict() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes::default();
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    coordinator
        .expose(&ExposeRequest::new("db", "5432").service_type("tcp"))
        .await
        .unwrap();

    let result = coordinator
        .expose(&ExposeRequest::new("db", "5432").service_type("http"))
        .await;
    assert!(matches!(result, Err(Error::Conflict { .. })));
}

#[tokio::test]
async fn foreign_dns_record_rolls_back_the_route() {
    // The DNS zone already has a record for the hostname that points at a
    // different tunnel. The gateway refuses, and the routing file is restored.
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes::default();
    fakes.dns.insert_record("api.example.com", "some-other-tunnel");
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    let before = store.bytes().await;
    let err = coordinator
        .expose(&ExposeRequest::new("api", "8080"))
        .await
        .unwrap_err();

    match &err {
        Error::StepFailure { source, .. } => {
            assert!(matches!(**source, Error::AlreadyExists(_)));
        }
        other => panic!("expected StepFailure, got {other:?}"),
    }
    assert_eq!(store.bytes().await, before);
    assert_eq!(
        fakes.dns.records().get("api.example.com").map(String::as_str),
        Some("some-other-tunnel"),
        "the foreign record is left alone"
    );
}
