//! Architectural Contract Test: Expose/Unexpose Round Trip
//!
//! This test verifies that unexpose is the structural mirror of expose.
//!
//! Constraints verified:
//! - Expose(s, p) then Unexpose(s) leaves the routing file byte-identical
//! - The DNS record and the access container are gone afterwards
//! - Unexpose of an unknown subdomain is a precondition failure with no writes
//! - A failed unexpose puts every system back

mod common;

use common::*;
use orb_core::{Change, Error, ExposeRequest, IngressRule, RouteSet, Step};
use tempfile::TempDir;

fn populated() -> RouteSet {
    let mut routes = RouteSet::new(TUNNEL, CATCH_ALL);
    routes
        .insert_before_catch_all(IngressRule::new("web.example.com", "http://localhost:3000"))
        .unwrap();
    routes
}

#[tokio::test]
async fn expose_then_unexpose_restores_exact_bytes() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::with_routes(&populated());
    let fakes = Fakes::default();
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    let before = store.bytes().await;

    coordinator
        .expose(&ExposeRequest::new("api", "8080").access("private"))
        .await
        .unwrap();
    assert_ne!(store.bytes().await, before);

    let outcome = coordinator.unexpose("api").await.unwrap();
    assert_eq!(outcome.change, Change::Configured);
    assert_eq!(outcome.target, "http://localhost:8080");

    assert_eq!(store.bytes().await, before);
    assert!(!fakes.dns.has_record("api.example.com"));
    assert!(fakes.access.rules("api.example.com").is_none());
    assert_eq!(fakes.service.restarts(), 2);
}

#[tokio::test]
async fn unexpose_of_unknown_subdomain_changes_nothing() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::with_routes(&populated());
    let fakes = Fakes::default();
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    let result = coordinator.unexpose("missing").await;

    assert!(matches!(result, Err(Error::Precondition(_))));
    assert_eq!(store.save_count(), 0);
    assert_eq!(fakes.dns.remove_calls(), 0);
    assert_eq!(fakes.service.restarts(), 0);
}

#[tokio::test]
async fn failed_unexpose_recreates_what_it_removed() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes::default();
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    coordinator
        .expose(&ExposeRequest::new("admin", "9000").access("private"))
        .await
        .unwrap();
    let exposed = store.bytes().await;

    fakes.service.fail_restart(true);
    let err = coordinator.unexpose("admin").await.unwrap_err();

    assert!(matches!(err, Error::StepFailure { step: Step::Restart, .. }));
    assert_eq!(store.bytes().await, exposed, "rule re-inserted");
    assert!(fakes.dns.has_record("admin.example.com"), "record re-created");
    let rules = fakes.access.rules("admin.example.com").expect("container re-created");
    assert_eq!(rules.len(), 1, "owner rule only");
}

#[tokio::test]
async fn unexpose_tolerates_missing_dns_record() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::with_routes(&populated());
    let fakes = Fakes::default();
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    // web.example.com is routed but its DNS record was deleted by hand
    let outcome = coordinator.unexpose("web").await.unwrap();

    assert_eq!(outcome.change, Change::Configured);
    assert_eq!(fakes.dns.remove_calls(), 1);
    assert_eq!(store.routes().await.ingress.len(), 1);
}
