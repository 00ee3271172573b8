//! drainify - record tracks announced by an MPRIS media player.
//!
//! Playback notifications arrive as JSON lines on standard input. Each track
//! is captured from a PulseAudio sink by an external encoder, then tagged.

pub mod capture;
pub mod config;
pub mod notification;
pub mod recorder;
pub mod tagging;
pub mod utils;

use anyhow::Context;
use capture::CommandLauncher;
use clap::Parser;
use config::Args;
use recorder::RecordingCoordinator;
use std::sync::Arc;
use tagging::Id3Tagger;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse arguments and record until interrupted
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drainify=debug,drainify_lib=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting drainify v{}", env!("CARGO_PKG_VERSION"));

    let settings = Args::parse()
        .into_settings()
        .context("Invalid configuration")?;
    tracing::info!("Recording from sink {}", settings.sink);
    tracing::info!("Saving recordings to {:?}", settings.output_directory);
    if settings.user_agent.is_none() {
        tracing::info!("No user agent configured, cover art will not be downloaded.");
    }

    let tagger = Id3Tagger::new(settings.user_agent.as_deref()).context("Failed to set up tagging")?;
    let coordinator = RecordingCoordinator::new(
        Arc::new(settings),
        Arc::new(CommandLauncher::new()),
        Arc::new(tagger),
    );

    let notifications =
        notification::spawn_stdin_source().context("Failed to start notification reader")?;

    tracing::info!("Start recording on next track.");
    coordinator.run(notifications, shutdown_signal()).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received terminate signal"),
    }
}
