use clap::Subcommand;
use serde_json::{json, Map, Value};

use crate::cli::utils::*;
use crate::cli::{AppContext, OutputFormat};
use crate::error::ClientError;
use crate::gate::{Decision, Route};

#[derive(Subcommand)]
pub enum PageCommands {
    #[command(about = "List dashboard pages and whether the current session may open them")]
    List,

    #[command(about = "Open a page: run the route gate, then load its data for the current scope")]
    Open {
        #[arg(help = "Page path, e.g. /enrolment")]
        path: String,
    },
}

pub async fn handle(ctx: &AppContext, cmd: PageCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PageCommands::List => list_pages(ctx, &output_format),
        PageCommands::Open { path } => open_page(ctx, &path, &output_format).await,
    }
}

fn list_pages(ctx: &AppContext, output_format: &OutputFormat) -> anyhow::Result<()> {
    let snapshot = ctx.session.snapshot();
    let pages: Vec<(&Route, Decision)> = ctx
        .routes
        .routes()
        .iter()
        .map(|route| (route, ctx.gate.evaluate(&snapshot, route)))
        .collect();

    match output_format {
        OutputFormat::Json => {
            let pages: Vec<Value> = pages
                .iter()
                .map(|(route, decision)| {
                    json!({
                        "path": route.path,
                        "title": route.title,
                        "requires_auth": route.requires_auth,
                        "allowed_roles": route.allowed_roles,
                        "gate": decision,
                    })
                })
                .collect();
            output_value(output_format, &json!({ "pages": pages }))
        }
        OutputFormat::Text => {
            let width = pages.iter().map(|(r, _)| r.path.len()).max().unwrap_or(0);
            for (route, decision) in &pages {
                let roles = match &route.allowed_roles {
                    Some(roles) if roles.is_empty() => " [nobody]".to_string(),
                    Some(roles) => format!(" [{}]", roles.join(", ")),
                    None => String::new(),
                };
                println!(
                    "{:<width$}  {:<12}  {}{}",
                    route.path,
                    describe(decision),
                    route.title,
                    roles,
                    width = width
                );
            }
            Ok(())
        }
    }
}

async fn open_page(ctx: &AppContext, path: &str, output_format: &OutputFormat) -> anyhow::Result<()> {
    let route = ctx.routes.find(path)?;
    let decision = ctx.gate.evaluate(&ctx.session.snapshot(), route);

    if decision != Decision::Render {
        tracing::info!("Gate declined {}: {:?}", route.path, decision);
        return match output_format {
            OutputFormat::Json => output_value(
                output_format,
                &json!({ "route": route.path, "gate": decision }),
            ),
            OutputFormat::Text => {
                println!("{}: {}", route.path, describe(&decision));
                Ok(())
            }
        };
    }

    let mut data = Map::new();
    for (endpoint, result) in ctx.client.get_many(&route.endpoints).await {
        let value = match result {
            Ok(value) => value,
            Err(e @ ClientError::Unauthorized(_)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", endpoint, e);
                json!({ "error": e.to_string(), "code": e.error_code() })
            }
        };
        data.insert(endpoint, value);
    }

    let page = json!({
        "route": route.path,
        "title": route.title,
        "gate": decision,
        "scope": ctx.scope.current(),
        "data": data,
    });
    output_value(output_format, &page)
}

fn describe(decision: &Decision) -> String {
    match decision {
        Decision::Loading => "loading".to_string(),
        Decision::Render => "render".to_string(),
        Decision::Redirect(to) => format!("-> {}", to),
    }
}
