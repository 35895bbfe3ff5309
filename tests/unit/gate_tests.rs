use chrono::Utc;
use identity_backend_lib::auth::{AuthError, AuthGate, TokenCodec, TokenKind};
use identity_backend_lib::storage::{IdentityStore, MemoryIdentityStore};
use identity_common::IdentityId;
use std::sync::Arc;
use std::time::Duration;

use crate::test_utils::{setup_test_env, ACCESS_SECRET, REFRESH_SECRET};

#[tokio::test]
async fn test_gate_resolves_seeded_identity() {
    let env = setup_test_env().await;
    let alice = crate::test_utils::seed_identity(&env, "alice", "correct").await;

    let token = env.codec.issue(TokenKind::Access, alice.id).unwrap();
    let user = env.state.gate.authenticate(Some(&token)).await.unwrap();
    assert_eq!(user.id, alice.id);
    assert_eq!(user.username, "alice");
}

#[tokio::test]
async fn test_gate_rejects_foreign_signature() {
    let env = setup_test_env().await;
    let alice = crate::test_utils::seed_identity(&env, "alice", "correct").await;

    let foreign = TokenCodec::new(
        "someone-else",
        Duration::from_secs(60),
        REFRESH_SECRET,
        Duration::from_secs(600),
    )
    .unwrap();
    let forged = foreign.issue(TokenKind::Access, alice.id).unwrap();
    assert_eq!(
        env.state.gate.authenticate(Some(&forged)).await,
        Err(AuthError::InvalidAccessToken)
    );
}

#[tokio::test]
async fn test_gate_rejects_expired_and_refresh_tokens() {
    let env = setup_test_env().await;
    let alice = crate::test_utils::seed_identity(&env, "alice", "correct").await;

    let expired = env
        .codec
        .issue_at(TokenKind::Access, alice.id, Utc::now().timestamp() - 7200)
        .unwrap();
    let refresh = env.codec.issue(TokenKind::Refresh, alice.id).unwrap();

    for token in [expired, refresh] {
        assert_eq!(
            env.state.gate.authenticate(Some(&token)).await,
            Err(AuthError::InvalidAccessToken)
        );
    }
    assert_eq!(
        env.state.gate.authenticate(None).await,
        Err(AuthError::Unauthenticated)
    );
}

#[tokio::test]
async fn test_gate_never_writes() {
    let store = Arc::new(MemoryIdentityStore::new());
    let codec = Arc::new(
        TokenCodec::new(
            ACCESS_SECRET,
            Duration::from_secs(60),
            REFRESH_SECRET,
            Duration::from_secs(600),
        )
        .unwrap(),
    );
    let gate = AuthGate::new(store.clone(), codec.clone());

    let id = IdentityId::new();
    assert_eq!(
        gate.authenticate(Some(&codec.issue(TokenKind::Access, id).unwrap()))
            .await,
        Err(AuthError::InvalidAccessToken)
    );
    assert!(store.find_by_id(id).await.unwrap().is_none());
    assert!(store.is_empty());
}
