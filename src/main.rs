//! Gmail MCP Server
//!
//! Serves the inbox tools over stdio, or with `--setup` runs the one-time
//! browser authorization and stores the token.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use gmail_inbox_mcp::config::Config;
use gmail_inbox_mcp::error::{AuthError, GmailMcpError};
use gmail_inbox_mcp::gmail::auth::{CredentialManager, GoogleOAuthProvider};
use gmail_inbox_mcp::gmail::client::GmailClient;
use gmail_inbox_mcp::mcp::server::McpServer;

/// Gmail MCP Server
#[derive(Parser)]
#[command(name = "gmail-mcp")]
#[command(author, version, about = "Gmail MCP Server - triage your inbox from an MCP client")]
struct Cli {
    /// Authorize Gmail access in the browser and save the token (run this first)
    #[arg(long)]
    setup: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries protocol frames
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let manager = Arc::new(CredentialManager::new(
        &config,
        Arc::new(GoogleOAuthProvider::new()),
    ));

    if cli.setup {
        run_setup(&config, &manager).await
    } else {
        match run_server(manager).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        }
    }
}

async fn run_setup(config: &Config, manager: &CredentialManager) -> ExitCode {
    eprintln!("Gmail MCP setup");
    eprintln!("  Credentials: {}", config.credentials_path.display());
    eprintln!("  Token:       {}", config.token_path.display());
    eprintln!();
    eprintln!("A browser window will open to authorize Gmail access.");

    match manager.obtain_session(true).await {
        Ok(_) => {
            eprintln!("Authentication successful. Token saved to {}", config.token_path.display());
            ExitCode::SUCCESS
        }
        Err(e @ GmailMcpError::Auth(AuthError::CredentialsFileMissing { .. })) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Authentication failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_server(manager: Arc<CredentialManager>) -> anyhow::Result<()> {
    // Fail at startup rather than on the first tool call
    manager
        .obtain_session(false)
        .await
        .context("could not obtain a Gmail session")?;

    let gmail_client = Arc::new(GmailClient::new(manager));

    let mut server = McpServer::new();
    server.attach(gmail_client);
    tracing::info!("Gmail MCP server ready on stdio");

    let served = server.run_stdio().await;
    server.detach();
    served.context("MCP server stopped")?;

    Ok(())
}
