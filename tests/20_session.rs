mod common;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use edudash_client::cli::{run_with, Cli};
use edudash_client::storage::{TOKEN_KEY, USER_KEY};
use edudash_client::{ClientError, FileStorage, MemoryStorage, Storage};

#[tokio::test]
async fn login_survives_a_restart() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let dir = common::temp_dir();

    let first = common::context(backend.config(), Arc::new(FileStorage::new(&dir)))?;
    assert!(first.session.is_ready());
    assert!(!first.session.is_authenticated());

    let user = first.client.authenticate(common::EMAIL, common::PASSWORD).await?;
    assert_eq!(user.role, "district_officer");
    assert_eq!(user.district_code(), Some("2701"));

    let second = common::context(backend.config(), Arc::new(FileStorage::new(&dir)))?;
    let restored = second.session.user().expect("session should be restored");
    assert_eq!(restored, user);

    let me = second.client.whoami().await?;
    assert_eq!(me["email"], common::EMAIL);

    second.session.logout();
    let third = common::context(backend.config(), Arc::new(FileStorage::new(&dir)))?;
    assert!(third.session.user().is_none());
    assert!(third.session.is_ready());

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[tokio::test]
async fn corrupt_persisted_user_is_wiped() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::with_items([
        (TOKEN_KEY, common::TOKEN),
        (USER_KEY, "{\"email\": truncated"),
    ]));

    let ctx = common::context(backend.config(), storage.clone())?;
    assert!(ctx.session.is_ready());
    assert!(ctx.session.user().is_none());
    assert_eq!(storage.get_item(TOKEN_KEY)?, None);
    assert_eq!(storage.get_item(USER_KEY)?, None);

    Ok(())
}

#[tokio::test]
async fn rejected_login_leaves_session_anonymous() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let ctx = common::context(backend.config(), storage.clone())?;

    let err = ctx
        .client
        .authenticate(common::EMAIL, "wrong")
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "Unauthorized: Incorrect email or password");
    assert!(!ctx.session.is_authenticated());
    assert_eq!(storage.get_item(TOKEN_KEY)?, None);

    Ok(())
}

#[tokio::test]
async fn unauthorized_is_surfaced_without_retry() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let ctx = common::context(backend.config(), storage.clone())?;
    ctx.client.authenticate(common::EMAIL, common::PASSWORD).await?;

    let err = ctx.client.get_json("/api/expired", &[]).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(ref detail) if detail == "Token has expired"));
    assert_eq!(err.status_code(), Some(401));
    assert_eq!(backend.expired_hits(), 1);

    // The library itself does not end the session
    assert!(ctx.session.is_authenticated());
    assert_eq!(storage.get_item(TOKEN_KEY)?.as_deref(), Some(common::TOKEN));

    Ok(())
}

#[tokio::test]
async fn cli_expires_session_on_unauthorized() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::with_items([
        (TOKEN_KEY, "revoked-token"),
        (USER_KEY, r#"{"email":"officer@example.com","role":"district_officer"}"#),
    ]));
    let ctx = common::context(backend.config(), storage.clone())?;
    assert!(ctx.session.is_authenticated());

    let cli = Cli::try_parse_from(["edudash", "auth", "whoami"])?;
    let err = run_with(&ctx, cli).await.unwrap_err();

    let cause = err.downcast_ref::<ClientError>().expect("client error kept in chain");
    assert!(cause.is_unauthorized());
    assert!(err.to_string().contains("edudash auth login"));
    assert!(!ctx.session.is_authenticated());
    assert_eq!(storage.get_item(TOKEN_KEY)?, None);
    assert_eq!(storage.get_item(USER_KEY)?, None);

    Ok(())
}

#[tokio::test]
async fn failed_login_keeps_the_existing_session() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::with_items([
        (TOKEN_KEY, common::TOKEN),
        (USER_KEY, r#"{"email":"officer@example.com","role":"district_officer"}"#),
    ]));
    let ctx = common::context(backend.config(), storage.clone())?;

    let cli = Cli::try_parse_from([
        "edudash",
        "auth",
        "login",
        "other@example.com",
        "--password",
        "typo",
    ])?;
    let err = run_with(&ctx, cli).await.unwrap_err();

    let cause = err.downcast_ref::<ClientError>().expect("client error kept in chain");
    assert!(cause.is_unauthorized());
    assert!(!err.to_string().contains("Session expired"));
    assert!(ctx.session.is_authenticated());
    assert_eq!(storage.get_item(TOKEN_KEY)?.as_deref(), Some(common::TOKEN));
    assert!(storage.get_item(USER_KEY)?.is_some());

    ctx.client.whoami().await?;
    Ok(())
}

#[tokio::test]
async fn slow_backend_times_out() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let mut config = backend.config();
    config.api.timeout_secs = 1;
    let ctx = common::context(config, Arc::new(MemoryStorage::new()))?;

    let err = ctx.client.get_json("/api/slow", &[]).await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)), "expected timeout, got {:?}", err);
    assert_eq!(err.error_code(), "TIMEOUT");

    Ok(())
}
