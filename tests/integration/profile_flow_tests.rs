use identity_backend_lib::error::AppError;
use identity_backend_lib::storage::IdentityStore;
use std::sync::atomic::Ordering;

use crate::test_utils::{file_count, new_identity, setup_flaky_env, stage_file};

#[tokio::test]
async fn test_failed_profile_write_keeps_previous_avatar() {
    let env = setup_flaky_env();
    let alice = new_identity(env.passwords.as_ref(), "alice", "correct");
    env.state.store.insert(alice.clone()).await.unwrap();
    let profiles = &env.state.profiles;

    let first = profiles
        .update_avatar(alice.id, stage_file(&env.staging, "first.png"))
        .await
        .unwrap();
    let before = env.state.store.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(before.avatar.url, first.avatar);
    assert_eq!(file_count(&env.media), 1);

    env.state.store.fail_profile_update.store(true, Ordering::SeqCst);
    let result = profiles
        .update_avatar(alice.id, stage_file(&env.staging, "second.png"))
        .await;
    assert!(matches!(result, Err(AppError::Store(_))));

    // The record still points at the first upload, which is still on disk
    let after = env.state.store.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(after.avatar, before.avatar);
    assert!(env.media.join(&after.avatar.public_id).exists());
    // and the rejected upload was not left behind
    assert_eq!(file_count(&env.media), 1);
}

#[tokio::test]
async fn test_cover_image_replaced_after_persisting() {
    let env = setup_flaky_env();
    let alice = new_identity(env.passwords.as_ref(), "alice", "correct");
    env.state.store.insert(alice.clone()).await.unwrap();
    let profiles = &env.state.profiles;

    profiles
        .update_cover_image(alice.id, stage_file(&env.staging, "one.jpg"))
        .await
        .unwrap();
    let updated = profiles
        .update_cover_image(alice.id, stage_file(&env.staging, "two.jpg"))
        .await
        .unwrap();

    let stored = env.state.store.find_by_id(alice.id).await.unwrap().unwrap();
    let cover = stored.cover_image.unwrap();
    assert_eq!(cover.url, updated.cover_image);
    assert!(env.media.join(&cover.public_id).exists());
    assert_eq!(file_count(&env.media), 1);
}
