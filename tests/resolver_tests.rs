//! # Resolver Tests
//!
//! Reference resolution against an in-memory store.

mod common;

use common::MemoryStore;
use std::collections::BTreeSet;
use templated_secret_controller::controller::reconciler::{resolve_references, ResolveError};

fn tokens(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|t| (*t).to_string()).collect()
}

#[tokio::test]
async fn test_resolves_values_keyed_by_token() {
    let store = MemoryStore::new();
    store.put_secret("team-a", "db", &[("user", "admin")]);
    store.put_secret("infra", "db", &[("host", "db.infra")]);

    let resolved = resolve_references(
        &store,
        &tokens(&["$(db > user)", "$(infra > db > host)", "$(infra>db>host)"]),
        "team-a",
    )
    .await
    .unwrap();

    assert_eq!(resolved["$(db > user)"], b"admin");
    assert_eq!(resolved["$(infra > db > host)"], b"db.infra");
    assert_eq!(resolved["$(infra>db>host)"], b"db.infra");
    assert_eq!(store.secret_reads("infra", "db"), 1);
}

#[tokio::test]
async fn test_no_tokens_needs_no_reads() {
    let store = MemoryStore::new();
    store.fail_reads();

    let resolved = resolve_references(&store, &BTreeSet::new(), "default")
        .await
        .unwrap();

    assert!(resolved.is_empty());
}

#[tokio::test]
async fn test_missing_secret_reports_location() {
    let store = MemoryStore::new();

    let err = resolve_references(&store, &tokens(&["$(vault > db > pw)"]), "default")
        .await
        .unwrap_err();

    match err {
        ResolveError::MissingSecret {
            token,
            namespace,
            secret_name,
        } => {
            assert_eq!(token, "$(vault > db > pw)");
            assert_eq!(namespace, "vault");
            assert_eq!(secret_name, "db");
        }
        other => panic!("Expected MissingSecret, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_key_reports_key() {
    let store = MemoryStore::new();
    store.put_secret("default", "db", &[("user", "admin")]);

    let err = resolve_references(&store, &tokens(&["$(db > pw)"]), "default")
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::MissingKey { ref key, .. } if key == "pw"));
}

#[tokio::test]
async fn test_invalid_syntax_fails_before_any_read() {
    let store = MemoryStore::new();
    store.put_secret("default", "db", &[("user", "admin")]);

    let err = resolve_references(
        &store,
        &tokens(&["$(db > user)", "$(a > b > c > d)"]),
        "default",
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ResolveError::InvalidReference(_)));
    assert_eq!(store.secret_reads("default", "db"), 0);
}

#[tokio::test]
async fn test_store_failure_is_not_a_resolution_failure() {
    let store = MemoryStore::new();
    store.fail_reads();

    let err = resolve_references(&store, &tokens(&["$(db > user)"]), "default")
        .await
        .unwrap_err();

    assert!(matches!(err, ResolveError::Store(_)));
}
