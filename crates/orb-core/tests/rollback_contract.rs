//! Architectural Contract Test: Rollback Completeness
//!
//! This test verifies that a failed step unwinds every earlier step, in
//! reverse order, and that an incomplete unwind is reported as dirty.
//!
//! Constraints verified:
//! - DNS create failure leaves the routing file byte-identical
//! - A transport failure on DNS create still withdraws the (maybe) written record
//! - Access and restart failures undo DNS and the routing file
//! - A save failure aborts before any remote call
//! - A failing compensation yields `CompensationFailure` naming the systems
//!   left inconsistent, and the remaining compensations still run
//! - No step is retried
//!
//! If this test fails, someone has:
//! - Added retries to a saga step
//! - Stopped unwinding after the first failed compensation
//! - Reordered the compensation log

mod common;

use common::*;
use orb_core::{Error, ExposeRequest, SagaEvent, SagaState, Step};
use tempfile::TempDir;

#[tokio::test]
async fn dns_failure_restores_routing_file() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes::default();
    fakes.dns.fail_create(Some(Failure::Definite));
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    let before = store.bytes().await;
    let err = coordinator
        .expose(&ExposeRequest::new("api", "8080"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StepFailure { step: Step::Dns, .. }));
    assert!(!err.is_dirty());
    assert_eq!(store.bytes().await, before);
    assert_eq!(fakes.dns.create_calls(), 1, "no retry");
    assert_eq!(fakes.dns.remove_calls(), 0, "definite failure needs no DNS undo");
    assert_eq!(fakes.service.restarts(), 0);
}

#[tokio::test]
async fn lost_dns_response_still_withdraws_record() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes::default();
    fakes.dns.fail_create(Some(Failure::AppliedThenLost));
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    let before = store.bytes().await;
    let err = coordinator
        .expose(&ExposeRequest::new("api", "8080"))
        .await
        .unwrap_err();

    assert!(err.is_indeterminate());
    assert_eq!(fakes.dns.remove_calls(), 1);
    assert!(!fakes.dns.has_record("api.example.com"));
    assert_eq!(store.bytes().await, before);
}

#[tokio::test]
async fn lost_dns_request_is_compensated_without_error() {
    // The record was never written; the withdraw must tolerate its absence.
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes::default();
    fakes.dns.fail_create(Some(Failure::Lost));
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    let err = coordinator
        .expose(&ExposeRequest::new("api", "8080"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StepFailure { step: Step::Dns, .. }));
    assert_eq!(fakes.dns.remove_calls(), 1);
}

#[tokio::test]
async fn restart_failure_unwinds_access_dns_and_routes() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes {
        access: FakeAccess::default().with_group("friends"),
        ..Default::default()
    };
    fakes.service.fail_restart(true);
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    let before = store.bytes().await;
    let err = coordinator
        .expose(&ExposeRequest::new("share", "3000").access("friends"))
        .await
        .unwrap_err();

    match &err {
        Error::StepFailure { step, source } => {
            assert_eq!(*step, Step::Restart);
            assert!(matches!(**source, Error::ProcessNotFound(_)));
        }
        other => panic!("expected StepFailure, got {other:?}"),
    }
    assert_eq!(store.bytes().await, before);
    assert!(!fakes.dns.has_record("share.example.com"));
    assert_eq!(fakes.access.container_count(), 0);
}

#[tokio::test]
async fn access_failure_unwinds_dns_and_routes() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes::default();
    fakes.access.fail_grant(Some(Failure::Definite));
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    let before = store.bytes().await;
    let err = coordinator
        .expose(&ExposeRequest::new("admin", "9000").access("private"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StepFailure { step: Step::Access, .. }));
    assert_eq!(store.bytes().await, before);
    assert!(fakes.dns.records().is_empty());
    assert_eq!(fakes.service.restarts(), 0);
}

#[tokio::test]
async fn save_failure_aborts_before_remote_calls() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    store.fail_saves(true);
    let fakes = Fakes::default();
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    let err = coordinator
        .expose(&ExposeRequest::new("api", "8080"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::StepFailure { step: Step::Routes, .. }));
    assert_eq!(fakes.dns.create_calls(), 0);
    assert_eq!(fakes.access.grant_calls(), 0);
    assert_eq!(fakes.service.restarts(), 0);
}

#[tokio::test]
async fn failed_compensation_is_reported_dirty() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes::default();
    fakes.service.fail_restart(true);
    fakes.dns.fail_remove(Some(Failure::Lost));
    let mut coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));
    let mut events = coordinator.subscribe(64);

    let before = store.bytes().await;
    let err = coordinator
        .expose(&ExposeRequest::new("api", "8080"))
        .await
        .unwrap_err();

    assert!(err.is_dirty());
    match &err {
        Error::CompensationFailure {
            failed_step,
            unreverted,
            ..
        } => {
            assert_eq!(*failed_step, Step::Restart);
            let steps: Vec<Step> = unreverted.iter().map(|(step, _)| *step).collect();
            assert_eq!(steps, [Step::Dns]);
        }
        other => panic!("expected CompensationFailure, got {other:?}"),
    }
    assert!(err.to_string().contains("DNS record"));

    // The routing file compensation ran after the DNS one failed
    assert_eq!(store.bytes().await, before);
    assert!(fakes.dns.has_record("api.example.com"));
    assert_eq!(fakes.dns.remove_calls(), 1, "compensations are not retried");

    let mut states = Vec::new();
    let mut compensated = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            SagaEvent::StateChanged { state, .. } => states.push(state),
            SagaEvent::Compensated { step, succeeded } => compensated.push((step, succeeded)),
        }
    }
    assert_eq!(
        states,
        [
            SagaState::LockHeld,
            SagaState::RouteApplied,
            SagaState::DnsApplied,
            SagaState::RollingBack,
            SagaState::FailedDirty,
        ]
    );
    assert_eq!(compensated, [(Step::Dns, false), (Step::Routes, true)]);
}
