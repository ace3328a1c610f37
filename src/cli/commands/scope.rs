use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::{AppContext, OutputFormat};
use crate::scope::Scope;

/// Upper bound the backend accepts for school listings
const MAX_SCHOOLS: u32 = 5000;

#[derive(Subcommand)]
pub enum ScopeCommands {
    #[command(about = "Show the current scope")]
    Show,

    #[command(about = "List districts")]
    Districts,

    #[command(about = "List blocks of a district (defaults to current district)")]
    Blocks {
        #[arg(help = "District code")]
        district: Option<String>,
    },

    #[command(about = "List schools of a block (defaults to current block)")]
    Schools {
        #[arg(help = "Block code")]
        block: Option<String>,
        #[arg(long, short, help = "Case-insensitive school name search")]
        query: Option<String>,
        #[arg(long, default_value_t = 500, help = "Maximum number of schools")]
        limit: u32,
    },

    #[command(about = "Select a district; clears block and school")]
    District {
        #[arg(help = "District code")]
        code: String,
    },

    #[command(about = "Select a block in the current district; clears school")]
    Block {
        #[arg(help = "Block code")]
        code: String,
    },

    #[command(about = "Select a school in the current block")]
    School {
        #[arg(help = "UDISE code")]
        udise: String,
    },

    #[command(about = "Clear the scope (state-wide view)")]
    Clear,
}

pub async fn handle(ctx: &AppContext, cmd: ScopeCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ScopeCommands::Show => output_scope(&output_format, &ctx.scope.current()),
        ScopeCommands::Districts => {
            let districts = ctx.client.districts().await?;
            let rows: Vec<_> = districts
                .iter()
                .map(|d| (d.district_code.clone(), d.district_name.clone()))
                .collect();
            output_rows(&output_format, "districts", json!(districts), &rows)
        }
        ScopeCommands::Blocks { district } => {
            let district = resolve_target_item(district, ctx.scope.current().district_code, "district")?;
            let blocks = ctx.client.blocks(&district).await?;
            let rows: Vec<_> = blocks
                .iter()
                .map(|b| (b.block_code.clone(), b.block_name.clone()))
                .collect();
            output_rows(&output_format, "blocks", json!(blocks), &rows)
        }
        ScopeCommands::Schools { block, query, limit } => {
            let block = resolve_target_item(block, ctx.scope.current().block_code, "block")?;
            let schools = ctx
                .client
                .schools(&block, query.as_deref(), limit.clamp(1, MAX_SCHOOLS))
                .await?;
            let rows: Vec<_> = schools
                .iter()
                .map(|s| (s.udise_code.clone(), s.school_name.clone()))
                .collect();
            output_rows(&output_format, "schools", json!(schools), &rows)
        }
        ScopeCommands::District { code } => {
            let district = ctx
                .client
                .districts()
                .await?
                .into_iter()
                .find(|d| d.district_code == code)
                .ok_or_else(|| not_found("district", &code))?;
            let scope = ctx
                .scope
                .select_district(&district.district_code, Some(&district.district_name))?;
            switched(&output_format, "district", &district.district_name, &scope)
        }
        ScopeCommands::Block { code } => {
            let current = ctx.scope.current();
            let district = resolve_target_item(None, current.district_code, "district")?;
            let block = ctx
                .client
                .blocks(&district)
                .await?
                .into_iter()
                .find(|b| b.block_code == code)
                .ok_or_else(|| not_found("block", &code))?;
            let scope = ctx.scope.select_block(&block.block_code, Some(&block.block_name))?;
            switched(&output_format, "block", &block.block_name, &scope)
        }
        ScopeCommands::School { udise } => {
            let current = ctx.scope.current();
            let block = resolve_target_item(None, current.block_code, "block")?;
            let school = ctx
                .client
                .schools(&block, None, MAX_SCHOOLS)
                .await?
                .into_iter()
                .find(|s| s.udise_code == udise)
                .ok_or_else(|| not_found("school", &udise))?;
            let scope = ctx.scope.select_school(&school.udise_code, Some(&school.school_name))?;
            switched(&output_format, "school", &school.school_name, &scope)
        }
        ScopeCommands::Clear => {
            let scope = ctx.scope.clear()?;
            output_success(
                &output_format,
                "Scope cleared",
                Some(json!({ "scope": scope })),
            )
        }
    }
}

fn not_found(item_type: &str, code: &str) -> anyhow::Error {
    anyhow::anyhow!("{} '{}' not found", title_case(item_type), code)
}

fn switched(output_format: &OutputFormat, item_type: &str, name: &str, scope: &Scope) -> anyhow::Result<()> {
    output_success(
        output_format,
        &format!("Switched to {} '{}'", item_type, name),
        Some(json!({ "scope": scope })),
    )
}

fn output_scope(output_format: &OutputFormat, scope: &Scope) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_value(output_format, &json!({ "scope": scope })),
        OutputFormat::Text => {
            if scope.is_empty() {
                println!("No scope selected (state-wide view)");
            }
            let levels = [
                ("District", &scope.district_code, &scope.district_name),
                ("Block", &scope.block_code, &scope.block_name),
                ("School", &scope.udise_code, &scope.school_name),
            ];
            for (label, code, name) in levels {
                match (code, name) {
                    (Some(code), Some(name)) => println!("{}: {} ({})", label, name, code),
                    (Some(code), None) => println!("{}: {}", label, code),
                    (None, Some(name)) => println!("{}: {}", label, name),
                    (None, None) => {}
                }
            }
            println!("Version: {}", scope.version);
            Ok(())
        }
    }
}
