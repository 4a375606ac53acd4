//! `adk-mcp-server` binary.
//!
//! Speaks MCP on stdin/stdout, so logs go to stderr or the configured log
//! file and never to stdout.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use adk_mcp_server::{McpServer, ServerConfig, ServerState, Settings, builtin_registry};
use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let mut warning = None;
    if let Some(path) = log_file {
        match open_log_file(path) {
            Ok(file) => {
                tracing_subscriber::registry()
                    .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                    .with(env_filter)
                    .init();
                tracing::info!(path = %path.display(), "Logging initialized");
                return;
            }
            Err(e) => warning = Some(format!("Failed to open log file {}: {e}", path.display())),
        }
    }

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
    if let Some(warning) = warning {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn load_settings() -> Result<Settings> {
    let config = ServerConfig::load().context("loading configuration")?;
    Ok(config.unwrap_or_default().resolve())
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_settings()?;
    init_tracing(settings.log_file.as_deref());
    tracing::debug!(?settings, "Resolved settings");

    let state = Arc::new(ServerState::with_gemini(settings));
    let server = McpServer::new(state, builtin_registry()?);

    tokio::select! {
        result = server.serve_stdio() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}
