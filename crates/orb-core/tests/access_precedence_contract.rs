//! Architectural Contract Test: Access Rule Precedence
//!
//! This test verifies the two-rule layout of protected hostnames.
//!
//! Constraints verified:
//! - Group access yields exactly two rules: owner at precedence 1, group at 2
//! - Revoking removes only the group rule; the owner rule survives
//! - Revoking twice is a no-op the second time
//! - An unknown group fails fast with `GroupNotFound`, with no fallback to
//!   private, and the earlier steps are rolled back
//! - A timed grant reports its expiry instant to the caller
//! - Public access never creates an authorization object

mod common;

use chrono::Utc;
use common::*;
use orb_core::access::{GROUP_PRECEDENCE, OWNER_PRECEDENCE};
use orb_core::{AccessLevel, Change, Error, ExposeRequest, IncludeRule};
use tempfile::TempDir;

#[tokio::test]
async fn group_grant_has_owner_then_group_rule() {
    let lock_dir = TempDir::new().unwrap();
    let fakes = Fakes {
        access: FakeAccess::default().with_group("friends"),
        ..Default::default()
    };
    let coordinator = coordinator(CountingRouteStore::catch_all_only(), &fakes, settings(lock_dir.path()));

    coordinator
        .expose(&ExposeRequest::new("share", "3000").access("friends"))
        .await
        .unwrap();

    let rules = fakes.access.rules("share.example.com").unwrap();
    assert_eq!(
        rules,
        vec![
            (
                OWNER_PRECEDENCE,
                IncludeRule::Email {
                    email: OWNER.to_string()
                }
            ),
            (
                GROUP_PRECEDENCE,
                IncludeRule::Group {
                    id: "grp-friends".to_string()
                }
            ),
        ]
    );
}

#[tokio::test]
async fn revoke_keeps_owner_rule() {
    let lock_dir = TempDir::new().unwrap();
    let fakes = Fakes {
        access: FakeAccess::default().with_group("friends"),
        ..Default::default()
    };
    let coordinator = coordinator(CountingRouteStore::catch_all_only(), &fakes, settings(lock_dir.path()));

    coordinator
        .expose(&ExposeRequest::new("share", "3000").access("friends"))
        .await
        .unwrap();

    let revoked = coordinator.revoke_access("share").await.unwrap();
    assert_eq!(revoked.change, Change::Configured);

    let rules = fakes.access.rules("share.example.com").unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].0, OWNER_PRECEDENCE);

    let again = coordinator.revoke_access("share").await.unwrap();
    assert_eq!(again.change, Change::AlreadyConfigured);
    assert_eq!(fakes.access.rules("share.example.com").unwrap().len(), 1);

    let listed = coordinator.list().await.unwrap();
    assert_eq!(listed[0].access, AccessLevel::Private);
}

#[tokio::test]
async fn unknown_group_fails_fast_and_rolls_back() {
    let lock_dir = TempDir::new().unwrap();
    let store = CountingRouteStore::catch_all_only();
    let fakes = Fakes::default();
    let coordinator = coordinator(store.clone(), &fakes, settings(lock_dir.path()));

    let before = store.bytes().await;
    let err = coordinator
        .expose(&ExposeRequest::new("share", "3000").access("strangers"))
        .await
        .unwrap_err();

    match &err {
        Error::StepFailure { source, .. } => match &**source {
            Error::GroupNotFound(name) => assert_eq!(name, "strangers"),
            other => panic!("expected GroupNotFound, got {other:?}"),
        },
        other => panic!("expected StepFailure, got {other:?}"),
    }
    assert!(err.to_string().contains("orb access create strangers"));

    assert_eq!(fakes.access.container_count(), 0, "no fallback to private");
    assert_eq!(store.bytes().await, before);
    assert!(fakes.dns.records().is_empty());
}

#[tokio::test]
async fn timed_grant_reports_expiry() {
    let lock_dir = TempDir::new().unwrap();
    let fakes = Fakes {
        access: FakeAccess::default().with_group("friends"),
        ..Default::default()
    };
    let coordinator = coordinator(CountingRouteStore::catch_all_only(), &fakes, settings(lock_dir.path()));

    let started = Utc::now();
    let outcome = coordinator
        .expose(
            &ExposeRequest::new("share", "3000")
                .access("friends")
                .expires_in("24h"),
        )
        .await
        .unwrap();

    let grant = outcome.grant.unwrap();
    assert_eq!(grant.level, AccessLevel::Group("friends".to_string()));
    let expires_at = grant.expires_at.unwrap();
    assert!(expires_at >= started + chrono::Duration::hours(24));
    assert!(expires_at <= Utc::now() + chrono::Duration::hours(24));
}

#[tokio::test]
async fn protected_access_without_identity_is_rejected() {
    let lock_dir = TempDir::new().unwrap();
    let fakes = Fakes::default();
    let mut settings = settings(lock_dir.path());
    settings.owner_email = None;
    let coordinator = coordinator(CountingRouteStore::catch_all_only(), &fakes, settings);

    let result = coordinator
        .expose(&ExposeRequest::new("admin", "9000").access("private"))
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));

    // Public exposure needs no identity
    assert!(coordinator.expose(&ExposeRequest::new("www", "80")).await.is_ok());
    assert_eq!(fakes.access.grant_calls(), 0);
}
