pub mod commands;
pub mod utils;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::gate::{RouteGate, RouteTable};
use crate::interceptor::ScopeInterceptor;
use crate::scope::ScopeService;
use crate::session::SessionService;
use crate::storage::{FileStorage, Storage};

#[derive(Parser)]
#[command(name = "edudash")]
#[command(about = "Edudash CLI - Scoped access to the education statistics dashboard API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Authentication and session management")]
    Auth {
        #[command(subcommand)]
        cmd: commands::auth::AuthCommands,
    },

    #[command(about = "District / block / school scope selection")]
    Scope {
        #[command(subcommand)]
        cmd: commands::scope::ScopeCommands,
    },

    #[command(about = "Open dashboard pages through the route gate")]
    Page {
        #[command(subcommand)]
        cmd: commands::page::PageCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Everything a command needs, wired once per process
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: ClientConfig,
    pub session: SessionService,
    pub scope: ScopeService,
    pub client: ApiClient,
    pub routes: RouteTable,
    pub gate: RouteGate,
}

impl AppContext {
    /// Wire services over the configured storage directory and restore the
    /// persisted session before any command looks at it
    pub fn from_config(config: ClientConfig) -> ClientResult<Self> {
        let dir = config.storage_dir()?;
        let routes = RouteTable::load(&dir)?;
        let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir));
        Self::with_storage(config, storage, routes)
    }

    pub fn with_storage(config: ClientConfig, storage: Arc<dyn Storage>, routes: RouteTable) -> ClientResult<Self> {
        let session = SessionService::new(storage.clone());
        session.restore_session();

        let scope = ScopeService::new(storage.clone());
        let interceptor = ScopeInterceptor::new(storage, &config)?;
        let client = ApiClient::new(&config, session.clone(), interceptor)?;
        let gate = RouteGate::new(&config.routes);

        Ok(Self {
            config,
            session,
            scope,
            client,
            routes,
            gate,
        })
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = AppContext::from_config(ClientConfig::from_env())?;
    run_with(&ctx, cli).await
}

pub async fn run_with(ctx: &AppContext, cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    // A 401 from the login exchange rejects the offered password, not the stored credential
    let expires_on_401 = !matches!(
        cli.command,
        Commands::Auth {
            cmd: commands::auth::AuthCommands::Login { .. }
        }
    );

    let result = match cli.command {
        Commands::Auth { cmd } => commands::auth::handle(ctx, cmd, output_format).await,
        Commands::Scope { cmd } => commands::scope::handle(ctx, cmd, output_format).await,
        Commands::Page { cmd } => commands::page::handle(ctx, cmd, output_format).await,
    };

    result.map_err(|e| {
        let unauthorized = e
            .downcast_ref::<ClientError>()
            .map(ClientError::is_unauthorized)
            .unwrap_or(false);
        if unauthorized && expires_on_401 {
            ctx.session.expire();
            e.context("Session expired or rejected; run `edudash auth login` again")
        } else {
            e
        }
    })
}
