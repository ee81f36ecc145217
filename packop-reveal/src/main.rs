//! Pack opening reveal (packop) - Main entry point
//!
//! `packop serve` hosts the HTTP/SSE control surface; `packop reveal` plays
//! a pack directly in the terminal, logging every stage.

use std::fs::OpenOptions;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use packop_common::config::{LoggingConfig, TomlConfig};
use packop_common::events::{EventBus, RevealEvent};
use packop_reveal::api::{self, AppContext};
use packop_reveal::pack::PackSession;
use packop_reveal::RevealController;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for packop
#[derive(Parser, Debug)]
#[command(name = "packop")]
#[command(about = "Timed, audio-synchronized reveal of collectible cards")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP/SSE control surface
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long, env = "PACKOP_PORT")]
        port: Option<u16>,
    },

    /// Play a pack in the terminal (press Enter to skip)
    Reveal {
        /// Content references in pack order
        #[arg(required = true)]
        references: Vec<String>,

        /// Disable audio cues
        #[arg(long)]
        no_audio: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::load_resolved(args.config.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    info!(
        "Starting packop v{} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    match args.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(config).await
        }
        Command::Reveal {
            references,
            no_audio,
        } => {
            if no_audio {
                config.audio.enabled = false;
            }
            reveal(config, references).await
        }
    }
}

/// Initialize tracing: RUST_LOG wins over the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "packop={level},packop_reveal={level},packop_common={level},tower_http=info",
            level = logging.level
        ))
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

async fn serve(config: TomlConfig) -> Result<()> {
    let controller = RevealController::from_config(&config, EventBus::default())
        .context("Failed to initialize reveal controller")?;
    let ctx = AppContext::new(Arc::new(controller), config.server.port);

    api::run(ctx, shutdown_signal()).await.context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn reveal(config: TomlConfig, references: Vec<String>) -> Result<()> {
    let pack = PackSession::new(references).context("Invalid pack")?;
    let controller = Arc::new(
        RevealController::from_config(&config, EventBus::default())
            .context("Failed to initialize reveal controller")?,
    );

    let progress = tokio::spawn(log_progress(Arc::clone(&controller)));
    let skip = tokio::spawn(skip_on_enter(Arc::clone(&controller)));

    let result = tokio::select! {
        outcome = pack.run(Arc::clone(&controller)) => Some(outcome),
        _ = shutdown_signal() => None,
    };

    skip.abort();
    progress.abort();
    controller.close();

    match result {
        Some(outcome) => {
            let outcome = outcome.context("Pack session failed")?;
            info!(
                "Pack finished: {} card(s) revealed{}",
                outcome.revealed,
                if outcome.skipped { ", rest skipped" } else { "" }
            );
        }
        None => info!("Reveal interrupted"),
    }
    Ok(())
}

/// Log stage and artwork progress of the terminal reveal
async fn log_progress(controller: Arc<RevealController>) {
    let mut rx = controller.events().subscribe();
    loop {
        match rx.recv().await {
            Ok(RevealEvent::StageEntered { ordinal, stage, .. }) => {
                info!("#{:04} {}", ordinal, stage);
            }
            Ok(RevealEvent::ResolutionFinished { status, url, .. }) => {
                info!("Artwork {:?}: {}", status, url);
            }
            Ok(RevealEvent::RunCompleted { ordinal, .. }) => {
                info!("#{:04} RECOVERED", ordinal);
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                warn!("Progress log lagged by {} events", n);
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Treat every line on stdin as a skip request
///
/// Stdin is read on a detached thread so a pending read never holds up
/// runtime shutdown.
async fn skip_on_enter(controller: Arc<RevealController>) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let reader = std::thread::Builder::new()
        .name("packop-stdin".to_string())
        .spawn(move || {
            for _ in std::io::stdin().lock().lines().map_while(|line| line.ok()) {
                if tx.send(()).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = reader {
        warn!("Skip from terminal unavailable: {}", e);
        return;
    }

    while rx.recv().await.is_some() {
        if !controller.skip() {
            info!("Skip is only available for packs with more than one card");
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
