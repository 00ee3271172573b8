//! Recording coordinator
//!
//! Turns the stream of playback notifications into recording sessions:
//! picks the start delay, applies the skip guards, aborts unfinished
//! recordings when the listener skips ahead or stops playback.

use super::registry::SessionRegistry;
use super::session::{RecordingSession, SessionContext};
use super::state::{SkipReason, StartOutcome};
use crate::capture::CaptureLauncher;
use crate::config::Settings;
use crate::notification::Notification;
use crate::tagging::Tagger;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Extra delay after an advertisement, which tends to spill into the next track
pub const ADVERT_EXTRA_DELAY: f64 = 0.5;

/// Owns the session registry. Driven by a single task, so no locking.
pub struct RecordingCoordinator {
    context: SessionContext,
    registry: SessionRegistry,
    /// Most recently created session, advertisements included
    previous: Option<Arc<RecordingSession>>,
}

impl RecordingCoordinator {
    /// Create a coordinator with an empty registry
    pub fn new(
        settings: Arc<Settings>,
        launcher: Arc<dyn CaptureLauncher>,
        tagger: Arc<dyn Tagger>,
    ) -> Self {
        Self {
            context: SessionContext {
                settings,
                launcher,
                tagger,
            },
            registry: SessionRegistry::new(),
            previous: None,
        }
    }

    /// Sessions seen so far, oldest first
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Delay for the next session, based on how the previous one went
    pub fn next_delay(&self) -> f64 {
        match &self.previous {
            None => {
                tracing::info!("This is the first recording, starting without delay.");
                0.0
            }
            Some(previous) if !previous.is_complete() => {
                tracing::debug!("Previous track was interrupted, starting without delay.");
                0.0
            }
            Some(previous) if previous.is_advert() => {
                self.context.settings.delay_seconds + ADVERT_EXTRA_DELAY
            }
            Some(_) => self.context.settings.delay_seconds,
        }
    }

    /// React to one playback notification
    pub async fn handle_notification(&mut self, notification: Notification) {
        self.registry.prune();

        if notification.status.is_halted() {
            tracing::info!("Playback {:?}, stopping recordings.", notification.status);
            self.stop_all().await;
            return;
        }

        let Some(metadata) = notification.metadata else {
            tracing::info!("No information about the current song. Skip to next song...");
            return;
        };

        let delay = self.next_delay();
        let session = RecordingSession::new(self.context.clone(), metadata, delay);
        let interrupted = self
            .previous
            .as_ref()
            .is_some_and(|previous| !previous.is_complete());

        match session.check_guards(&self.registry) {
            Some(SkipReason::DuplicateActive) => {
                // a repeated notification for the track being recorded
                tracing::info!("\"{}\" {}", session.filename(), SkipReason::DuplicateActive);
                return;
            }
            Some(reason) => {
                tracing::info!("\"{}\" {}", session.filename(), reason);
                if interrupted {
                    self.stop_all().await;
                }
                if reason == SkipReason::ExistingFile {
                    self.registry.insert(Arc::clone(&session));
                }
            }
            None => {
                if interrupted {
                    tracing::info!("Current recording is incomplete, song was probably skipped.");
                    self.stop_all().await;
                }
                tracing::info!(
                    "Recording \"{}\" (delay {:.2}s, expected end {})",
                    session.filename(),
                    session.delay_seconds(),
                    session.end_time().format("%H:%M:%S")
                );
                let outcome = session.start(&self.registry).await;
                if outcome != StartOutcome::Started {
                    tracing::debug!("\"{}\" did not start: {:?}", session.filename(), outcome);
                }
                self.registry.insert(Arc::clone(&session));
            }
        }

        self.previous = Some(session);
    }

    /// Abort every active session and wait until none is running.
    ///
    /// Sessions already within the completion margin are left to finish on
    /// their own; this still waits for them. With an encoder that consumes
    /// `@delay` such a session runs on into the next track, so a skip right
    /// after a track change can hold dispatch for up to the completion margin.
    pub async fn stop_all(&self) {
        let active = self.registry.active();
        if active.is_empty() {
            return;
        }

        tracing::info!("Stopping {} active recording(s)...", active.len());
        let mut aborts = JoinSet::new();
        for session in active {
            aborts.spawn(async move {
                session.abort().await;
                session.settled().await;
            });
        }
        while let Some(result) = aborts.join_next().await {
            if let Err(e) = result {
                tracing::warn!("Abort task failed: {}", e);
            }
        }
        tracing::debug!("All recordings stopped");
    }

    /// Wait for tagging or cleanup of every started session
    pub async fn drain(&self) {
        for session in self.registry.iter() {
            session.finalized().await;
        }
    }

    /// Consume notifications until the source closes or `shutdown` resolves.
    ///
    /// On shutdown running recordings are aborted. When the source closes
    /// they are left to finish.
    pub async fn run<F>(mut self, mut notifications: mpsc::Receiver<Notification>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                received = notifications.recv() => match received {
                    Some(notification) => self.handle_notification(notification).await,
                    None => {
                        tracing::info!("Notification source ended, waiting for running recordings.");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    tracing::info!("Received shutdown request. Quitting...");
                    self.stop_all().await;
                    break;
                }
            }
        }

        self.drain().await;
        tracing::info!("Coordinator stopped");
    }
}
