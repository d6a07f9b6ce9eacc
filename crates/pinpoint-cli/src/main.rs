//! Pinpoint CLI — ask questions, let the model reach for tools.

use anyhow::{Context, Result, bail};
use clap::Parser;
use pinpoint_api::OpenAiClient;
use pinpoint_config::PinpointConfig;
use pinpoint_core::{Orchestrator, Session};
use pinpoint_mcp::McpServerConfig;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pinpoint", version, about = "An LLM assistant with stdio tool servers")]
struct Cli {
    /// Process a single query and exit (non-interactive)
    #[arg(short, long)]
    query: Option<String>,

    /// Path to a settings file (default: ./pinpoint.toml, then ~/.pinpoint/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tool server to connect to (defaults to the sole configured entry)
    #[arg(long)]
    server: Option<String>,

    /// Model (deployment) to use
    #[arg(long)]
    model: Option<String>,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = PinpointConfig::load(cli.config.as_deref()).map_err(|e| anyhow::anyhow!("{e}"))?;
    let model = cli.model.unwrap_or_else(|| config.model.clone());
    tracing::debug!(%model, servers = config.servers.len(), "configuration resolved");

    let (server_name, server_config) = select_server(&config.servers, cli.server.as_deref())?;

    let backend =
        OpenAiClient::new(&config.api_key, &config.endpoint).context("Failed to create backend client")?;
    let orchestrator = Orchestrator::new(Arc::new(backend), model);

    let session = Session::connect(server_name.clone(), server_config)
        .await
        .with_context(|| format!("Failed to start tool server '{server_name}'"))?;

    let tool_names: Vec<&str> = session.tools().iter().map(|t| t.name.as_str()).collect();
    eprintln!(
        "Connected to server '{}' with tools: {tool_names:?}",
        session.server_name()
    );

    // Run the chosen mode, then close the session on every exit path.
    let outcome = match &cli.query {
        Some(query) => run_once(&orchestrator, &session, query).await,
        None => shell(&orchestrator, &session).await,
    };
    session.close().await;
    outcome
}

/// One-shot mode: a single query, result on stdout.
async fn run_once(orchestrator: &Orchestrator, session: &Session, query: &str) -> Result<()> {
    let answer = orchestrator
        .process_query(session, query)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{answer}");
    Ok(())
}

/// Interactive shell: read a line, answer it, repeat. "quit" or EOF exits;
/// a per-query error is printed and the loop continues.
async fn shell(orchestrator: &Orchestrator, session: &Session) -> Result<()> {
    eprintln!("Type your queries or 'quit' to exit.\n");
    let stdin = io::stdin();

    loop {
        eprint!("> ");
        io::stderr().flush()?;

        let mut input = String::new();
        let bytes_read = stdin.lock().read_line(&mut input)?;
        if bytes_read == 0 {
            eprintln!();
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") {
            break;
        }

        match orchestrator.process_query(session, input).await {
            Ok(answer) => {
                println!("\n{answer}\n");
            }
            Err(e) => {
                eprintln!("\nError: {e}");
            }
        }
    }

    Ok(())
}

/// Pick the tool server to launch: the named one, or the sole entry.
fn select_server<'a>(
    servers: &'a HashMap<String, McpServerConfig>,
    requested: Option<&str>,
) -> Result<(&'a String, &'a McpServerConfig)> {
    match requested {
        Some(name) => servers
            .get_key_value(name)
            .ok_or_else(|| anyhow::anyhow!("Tool server '{name}' is not configured")),
        None => match servers.len() {
            0 => bail!("No tool servers configured (add a [servers.<name>] entry to pinpoint.toml)"),
            1 => Ok(servers.iter().next().expect("len checked")),
            _ => {
                let mut names: Vec<&str> = servers.keys().map(String::as_str).collect();
                names.sort_unstable();
                bail!("Multiple tool servers configured ({names:?}); pass --server <name>")
            }
        },
    }
}
