//! # quizzer
//!
//! Live quiz server binary. Loads settings, wires the quiz store into the
//! execution registry and starts the HTTP/WebSocket server.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use quizzer_core::InMemoryStore;
use quizzer_core::logging::init_subscriber;
use quizzer_execution::ExecutionRegistry;
use quizzer_server::config::ServerConfig;
use quizzer_server::server::QuizzerServer;
use quizzer_server::shutdown::wait_for_signal;
use quizzer_settings::QuizzerSettings;

/// Quizzer live quiz server.
#[derive(Parser, Debug)]
#[command(name = "quizzer", about = "Quizzer live quiz server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.quizzer/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// JSON fixtures to seed the quiz store with.
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `quizzer_execution=trace`.
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn settings(&self) -> Result<QuizzerSettings> {
        let mut settings = match &self.settings {
            Some(path) => quizzer_settings::load_settings_from_path(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => quizzer_settings::load_settings().context("Failed to load settings")?,
        };
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
        if let Some(path) = &self.fixtures {
            settings.store.fixtures_path = Some(path.to_string_lossy().into_owned());
        }
        Ok(settings)
    }
}

fn open_store(fixtures: Option<&Path>) -> Result<InMemoryStore> {
    match fixtures {
        Some(path) => InMemoryStore::load(path)
            .with_context(|| format!("Failed to load fixtures from {}", path.display())),
        None => {
            tracing::warn!("no fixtures configured, starting with an empty quiz store");
            Ok(InMemoryStore::new())
        }
    }
}

/// Build the registry and server from resolved settings.
fn build(settings: &QuizzerSettings) -> Result<(Arc<ExecutionRegistry>, QuizzerServer)> {
    let store = open_store(settings.store.fixtures_path.as_deref().map(Path::new))?;
    let registry = Arc::new(ExecutionRegistry::new(
        Arc::new(store),
        settings.execution.clone(),
    ));
    let server = QuizzerServer::new(ServerConfig::from(&settings.server), Arc::clone(&registry));
    Ok((registry, server))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.settings()?;

    init_subscriber(&settings.logging.level, settings.logging.format);

    let (registry, mut server) = build(&settings)?;
    match quizzer_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled"),
    }
    let sweeper = registry.spawn_sweeper();

    let (addr, handle) = server
        .listen()
        .await
        .context("Failed to bind server")?;

    tracing::info!("Quizzer listening on http://{addr}");

    wait_for_signal().await;

    tracing::info!(active = registry.len(), "Shutting down...");
    registry.shutdown();
    server
        .shutdown()
        .graceful_shutdown(vec![handle, sweeper], None)
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
