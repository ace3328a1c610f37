mod common;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use edudash_client::cli::{run_with, AppContext, Cli};
use edudash_client::storage::TOKEN_KEY;
use edudash_client::{Decision, MemoryStorage, RouteTable, Storage};

async fn run(ctx: &AppContext, args: &[&str]) -> Result<()> {
    let cli = Cli::try_parse_from(std::iter::once("edudash").chain(args.iter().copied()))?;
    run_with(ctx, cli).await
}

#[tokio::test]
async fn gate_follows_the_session() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let ctx = common::context(backend.config(), Arc::new(MemoryStorage::new()))?;

    let enrolment = ctx.routes.find("/enrolment")?;
    let login = ctx.routes.find("/login")?;
    let users = ctx.routes.find("/admin/users/")?;

    let anonymous = ctx.session.snapshot();
    assert_eq!(ctx.gate.evaluate(&anonymous, enrolment), Decision::Redirect("/login".into()));
    assert_eq!(ctx.gate.evaluate(&anonymous, login), Decision::Render);

    ctx.client.authenticate(common::EMAIL, common::PASSWORD).await?;
    let officer = ctx.session.snapshot();
    assert_eq!(ctx.gate.evaluate(&officer, enrolment), Decision::Render);
    assert_eq!(ctx.gate.evaluate(&officer, login), Decision::Redirect("/".into()));
    assert_eq!(ctx.gate.evaluate(&officer, users), Decision::Redirect("/".into()));

    Ok(())
}

#[tokio::test]
async fn page_data_loads_concurrently_with_scope() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let ctx = common::context(backend.config(), Arc::new(MemoryStorage::new()))?;
    ctx.client.authenticate(common::EMAIL, common::PASSWORD).await?;
    ctx.scope.select_district("2701", Some("Pune"))?;

    let route = ctx.routes.find("/aadhaar")?;
    let results = ctx.client.get_many(&route.endpoints).await;
    assert_eq!(results.len(), 3);
    for (endpoint, result) in &results {
        let echoed = result.as_ref().map_err(|e| anyhow::anyhow!("{}: {}", endpoint, e))?;
        assert_eq!(echoed["path"], endpoint.as_str());
        assert_eq!(echoed["query"]["district_code"], "2701");
    }

    run(&ctx, &["page", "open", "/aadhaar"]).await?;
    run(&ctx, &["--json", "page", "list"]).await?;

    Ok(())
}

#[tokio::test]
async fn declined_page_loads_nothing() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let routes = RouteTable::from_json(
        r#"[
            {"path": "/login", "requires_auth": false},
            {"path": "/", "endpoints": []},
            {"path": "/expired", "endpoints": ["/api/expired"], "allowed_roles": []}
        ]"#,
    )?;
    let ctx = AppContext::with_storage(backend.config(), Arc::new(MemoryStorage::new()), routes)?;
    ctx.client.authenticate(common::EMAIL, common::PASSWORD).await?;

    run(&ctx, &["page", "open", "/expired"]).await?;
    assert_eq!(backend.expired_hits(), 0);
    assert!(ctx.session.is_authenticated());

    Ok(())
}

#[tokio::test]
async fn unauthorized_page_data_ends_the_session() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let routes = RouteTable::from_json(
        r#"[{"path": "/expired", "title": "Expired", "endpoints": ["/api/expired", "/api/apaar/overview"]}]"#,
    )?;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let ctx = AppContext::with_storage(backend.config(), storage.clone(), routes)?;
    ctx.client.authenticate(common::EMAIL, common::PASSWORD).await?;

    let err = run(&ctx, &["page", "open", "/expired"]).await.unwrap_err();
    assert!(err.to_string().contains("edudash auth login"));
    assert_eq!(backend.expired_hits(), 1);
    assert!(!ctx.session.is_authenticated());
    assert_eq!(storage.get_item(TOKEN_KEY)?, None);

    Ok(())
}

#[test]
fn routes_file_overrides_defaults() -> Result<()> {
    let dir = common::temp_dir();
    assert_eq!(RouteTable::load(&dir)?, RouteTable::defaults());

    std::fs::create_dir_all(&dir)?;
    std::fs::write(
        dir.join("routes.json"),
        r#"[{"path": "/reports", "title": "Reports", "allowed_roles": ["admin"]}]"#,
    )?;
    let table = RouteTable::load(&dir)?;
    assert_eq!(table.routes().len(), 1);
    let reports = table.find("/reports")?;
    assert!(reports.requires_auth);
    assert_eq!(reports.allowed_roles, Some(vec!["admin".to_string()]));
    assert!(table.find("/enrolment").is_err());

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}

#[tokio::test]
async fn scope_commands_walk_the_hierarchy() -> Result<()> {
    let backend = common::StubBackend::spawn().await?;
    let ctx = common::context(backend.config(), Arc::new(MemoryStorage::new()))?;

    run(&ctx, &["scope", "district", "2701"]).await?;
    run(&ctx, &["scope", "block", "270101"]).await?;
    run(&ctx, &["scope", "school", "27010100202"]).await?;

    let scope = ctx.scope.current();
    assert_eq!(scope.district_name.as_deref(), Some("Pune"));
    assert_eq!(scope.block_name.as_deref(), Some("Haveli"));
    assert_eq!(scope.school_name.as_deref(), Some("ZP School Lohegaon"));
    assert_eq!(scope.version, 3);

    run(&ctx, &["scope", "district", "2702"]).await?;
    let scope = ctx.scope.current();
    assert_eq!(scope.district_code.as_deref(), Some("2702"));
    assert_eq!(scope.block_code, None);
    assert_eq!(scope.udise_code, None);

    let err = run(&ctx, &["scope", "block", "999999"]).await.unwrap_err();
    assert_eq!(err.to_string(), "Block '999999' not found");

    run(&ctx, &["scope", "clear"]).await?;
    assert!(ctx.scope.current().is_empty());

    Ok(())
}
