use std::io::{self, BufRead, Write};

use chrono::Utc;
use clap::Subcommand;
use serde_json::json;

use crate::auth::inspect_token;
use crate::cli::utils::*;
use crate::cli::{AppContext, OutputFormat};

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to the dashboard backend")]
    Login {
        #[arg(help = "Email address")]
        email: String,
        #[arg(long, env = "EDUDASH_PASSWORD", hide_env_values = true, help = "Password; the interactive prompt echoes input, so prefer this flag or EDUDASH_PASSWORD")]
        password: Option<String>,
    },

    #[command(about = "Logout and remove the stored credential")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Show current user information from the backend")]
    Whoami,
}

pub async fn handle(ctx: &AppContext, cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuthCommands::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password()?,
            };

            let user = ctx.client.authenticate(&email, &password).await?;
            let data = json!({
                "user": user,
                "permissions": user.permissions(),
            });
            output_success(
                &output_format,
                &format!("Logged in as {} ({})", user.email().unwrap_or(email.as_str()), user.role),
                Some(data),
            )
        }
        AuthCommands::Logout => {
            ctx.session.logout();
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let user = ctx.session.user();
            let claims = ctx.session.credential().as_deref().and_then(inspect_token);
            let now = Utc::now();

            match output_format {
                OutputFormat::Json => {
                    let status = json!({
                        "authenticated": user.is_some(),
                        "user": user,
                        "permissions": user.as_ref().and_then(|u| u.permissions()),
                        "token": claims.as_ref().map(|c| json!({
                            "subject": c.sub,
                            "expires_at": c.expires_at(),
                            "expired": c.is_expired(now),
                        })),
                    });
                    output_value(&output_format, &status)
                }
                OutputFormat::Text => {
                    match &user {
                        Some(user) => {
                            println!("Logged in as {}", user.email().or(user.full_name()).unwrap_or("<unknown>"));
                            println!("Role: {}", user.role);
                            if let Some(district) = user.district_code() {
                                println!("District: {}", district);
                            }
                        }
                        None => println!("Not logged in"),
                    }
                    if let Some(expires_at) = claims.as_ref().and_then(|c| c.expires_at()) {
                        let state = if expires_at <= now { "expired" } else { "expires" };
                        println!("Token {} at {}", state, expires_at.to_rfc3339());
                    }
                    Ok(())
                }
            }
        }
        AuthCommands::Whoami => {
            let me = ctx.client.whoami().await?;
            output_value(&output_format, &me)
        }
    }
}

fn prompt_password() -> anyhow::Result<String> {
    eprint!("Password (input is echoed; use --password or EDUDASH_PASSWORD to avoid): ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(&['\r', '\n'][..]).to_string();
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}
