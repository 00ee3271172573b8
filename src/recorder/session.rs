//! Recording sessions
//!
//! One session captures one track to one file. The session owns the capture
//! process through a reaper task; aborts reach the process only through the
//! reaper's kill switch, so exactly one side observes the exit and performs
//! the terminal transition.

use super::filename::{format_filename, sanitize_filename};
use super::registry::SessionRegistry;
use super::state::{SessionState, SkipReason, StartOutcome};
use crate::capture::{render_command, CaptureExit, CaptureLauncher, CaptureProcess, CommandValues};
use crate::config::Settings;
use crate::notification::TrackMetadata;
use crate::tagging::{TagOutcome, Tagger};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use uuid::Uuid;

/// Tolerance in milliseconds for deciding a track has effectively played to its end
pub const COMPLETION_MARGIN_MS: i64 = 5_000;

/// Reported lengths below this are never recorded
pub const MIN_LENGTH_SECONDS: f64 = 1.0;

/// How long a capture may run past its expected end before it is killed
pub const OVERRUN_GRACE: Duration = Duration::from_secs(30);

/// How long to wait for a killed process to exit
pub const KILL_GRACE: Duration = Duration::from_secs(5);

/// Reply channel for a kill request, carrying the observed exit
type KillAck = oneshot::Sender<Option<CaptureExit>>;

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionContext {
    /// Immutable runtime settings
    pub settings: Arc<Settings>,
    /// Starts capture processes
    pub launcher: Arc<dyn CaptureLauncher>,
    /// Tags finished recordings
    pub tagger: Arc<dyn Tagger>,
}

/// How the reaper's wait ended
enum Ending {
    Exited(std::io::Result<CaptureExit>),
    Overran,
    KillRequested(KillAck),
}

/// One capture attempt, end to end
pub struct RecordingSession {
    id: Uuid,
    metadata: TrackMetadata,
    filename: String,
    output_path: PathBuf,
    delay_seconds: f64,
    end_time: DateTime<Utc>,
    state: watch::Sender<SessionState>,
    /// Set once finalization (tagging or cleanup) is done
    finalized: watch::Sender<bool>,
    kill_switch: Mutex<Option<oneshot::Sender<KillAck>>>,
    context: SessionContext,
}

impl RecordingSession {
    /// Create a session starting now
    pub fn new(context: SessionContext, metadata: TrackMetadata, delay_seconds: f64) -> Arc<Self> {
        Self::new_at(context, metadata, delay_seconds, Utc::now())
    }

    /// Create a session with an explicit creation time
    pub fn new_at(
        context: SessionContext,
        metadata: TrackMetadata,
        delay_seconds: f64,
        created_at: DateTime<Utc>,
    ) -> Arc<Self> {
        let settings = &context.settings;
        let filename = format_filename(&metadata, &settings.name_pattern);
        let output_path = settings.output_directory.join(format!(
            "{}.{}",
            sanitize_filename(&filename),
            settings.extension
        ));

        let end_time = expected_end(created_at, delay_seconds + metadata.length_seconds);

        let (state, _) = watch::channel(SessionState::Pending);
        let (finalized, _) = watch::channel(false);

        Arc::new(Self {
            id: Uuid::new_v4(),
            metadata,
            filename,
            output_path,
            delay_seconds,
            end_time,
            state,
            finalized,
            kill_switch: Mutex::new(None),
            context,
        })
    }

    /// Unique session id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Filename before sanitization, as shown in logs
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Sanitized output path. Two sessions with the same path are duplicates.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Delay before capture starts, in seconds
    pub fn delay_seconds(&self) -> f64 {
        self.delay_seconds
    }

    /// Expected capture length in seconds
    pub fn length_seconds(&self) -> f64 {
        self.metadata.length_seconds
    }

    /// Creation time plus delay plus expected length. Never recomputed.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Whether the track is an advertisement (empty artist)
    pub fn is_advert(&self) -> bool {
        self.metadata.artist.is_empty()
    }

    /// Whether a capture process is running
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Whether the expected duration has elapsed, within the grace margin
    pub fn is_complete(&self) -> bool {
        self.is_complete_at(Utc::now())
    }

    /// `is_complete` evaluated at `now`
    pub fn is_complete_at(&self, now: DateTime<Utc>) -> bool {
        now + chrono::Duration::milliseconds(COMPLETION_MARGIN_MS) > self.end_time
    }

    /// First guard that prevents this session from capturing, if any
    pub fn check_guards(&self, registry: &SessionRegistry) -> Option<SkipReason> {
        if self.is_advert() {
            Some(SkipReason::Advertisement)
        } else if self.length_seconds() < MIN_LENGTH_SECONDS {
            Some(SkipReason::TooShort)
        } else if registry.has_active(&self.output_path, self.id) {
            Some(SkipReason::DuplicateActive)
        } else if self.output_path.exists() {
            Some(SkipReason::ExistingFile)
        } else {
            None
        }
    }

    /// Spawn the capture process and its reaper.
    ///
    /// Re-checks the guards first. When the command does not take `@delay`
    /// itself, the caller is held for the delay before the process starts.
    pub async fn start(self: &Arc<Self>, registry: &SessionRegistry) -> StartOutcome {
        if self.state() != SessionState::Pending {
            tracing::warn!("\"{}\" was already started", self.filename);
            return StartOutcome::Skipped(SkipReason::DuplicateActive);
        }
        if let Some(reason) = self.check_guards(registry) {
            tracing::info!("\"{}\" {}", self.filename, reason);
            return StartOutcome::Skipped(reason);
        }

        let settings = &self.context.settings;
        if !settings.command_consumes_delay() && self.delay_seconds > 0.0 {
            tracing::debug!("Waiting {:.2}s before recording \"{}\"", self.delay_seconds, self.filename);
            tokio::time::sleep(Duration::from_secs_f64(self.delay_seconds)).await;
        }

        let values = CommandValues {
            sink: &settings.sink,
            length_seconds: self.length_seconds(),
            delay_seconds: self.delay_seconds,
            output_path: &self.output_path,
        };
        let process = render_command(&settings.command, &values).and_then(|argv| {
            tracing::info!("Starting: {}", argv.join(" "));
            self.context.launcher.launch(&argv)
        });
        let process = match process {
            Ok(process) => process,
            Err(e) => {
                tracing::error!(code = e.code(), "Could not record \"{}\": {}", self.filename, e);
                self.transition(SessionState::Pending, SessionState::Failed);
                self.finalized.send_replace(true);
                return StartOutcome::SpawnFailed;
            }
        };

        let (kill_tx, kill_rx) = oneshot::channel();
        *self.kill_switch.lock() = Some(kill_tx);
        self.transition(SessionState::Pending, SessionState::Active);

        tokio::spawn(Arc::clone(self).reap(process, kill_rx));
        StartOutcome::Started
    }

    /// Kill a running capture and discard its output.
    ///
    /// Does nothing unless the session is active and not yet complete.
    pub async fn abort(&self) {
        if !self.is_active() || self.is_complete() {
            return;
        }

        let kill = self.kill_switch.lock().take();
        let Some(kill) = kill else {
            // another abort is in flight
            self.settled().await;
            return;
        };

        tracing::info!("Abort recording \"{}\"...", self.filename);
        let (ack_tx, ack_rx) = oneshot::channel();
        if kill.send(ack_tx).is_err() {
            self.settled().await;
            return;
        }

        match ack_rx.await {
            Ok(exit) => {
                if self.transition(SessionState::Active, SessionState::Aborted) {
                    match exit {
                        Some(exit) => tracing::info!("Aborted recording \"{}\" ({}).", self.filename, exit),
                        None => tracing::warn!("Aborted recording \"{}\", exit not observed.", self.filename),
                    }
                    self.remove_output().await;
                    self.finalized.send_replace(true);
                }
            }
            // the reaper saw a natural exit first
            Err(_) => self.settled().await,
        }
    }

    /// Wait until no capture process is running for this session
    pub async fn settled(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|state| *state != SessionState::Active).await;
    }

    /// Wait until tagging or cleanup of a started session is done
    pub async fn finalized(&self) {
        if self.state() == SessionState::Pending {
            return;
        }
        let mut rx = self.finalized.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Compare-and-set; only the first writer of a terminal state wins
    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    async fn reap(self: Arc<Self>, mut process: Box<dyn CaptureProcess>, kill_rx: oneshot::Receiver<KillAck>) {
        let expected = Duration::try_from_secs_f64((self.delay_seconds + self.length_seconds()).max(0.0))
            .unwrap_or(Duration::MAX);
        let budget = expected.saturating_add(OVERRUN_GRACE);

        // an exit that is already observable wins over a pending kill request
        let ending = tokio::select! {
            biased;
            result = tokio::time::timeout(budget, process.wait()) => match result {
                Ok(exit) => Ending::Exited(exit),
                Err(_) => Ending::Overran,
            },
            Ok(ack) = kill_rx => Ending::KillRequested(ack),
        };

        match ending {
            Ending::KillRequested(ack) => {
                let exit = kill_and_wait(process.as_mut()).await;
                let _ = ack.send(exit);
            }
            Ending::Exited(Ok(exit)) if exit.success() => {
                if self.transition(SessionState::Active, SessionState::Completed) {
                    tracing::info!("Finished recording \"{}\".", self.filename);
                    let outcome = self.context.tagger.tag(&self.output_path, &self.metadata).await;
                    self.log_tag_outcome(&outcome);
                    self.finalized.send_replace(true);
                }
            }
            Ending::Exited(Ok(exit)) => {
                tracing::warn!("Capture encountered {} while recording \"{}\".", exit, self.filename);
                self.fail().await;
            }
            Ending::Exited(Err(e)) => {
                tracing::warn!("Lost track of capture for \"{}\": {}", self.filename, e);
                self.fail().await;
            }
            Ending::Overran => {
                tracing::warn!(
                    "Capture for \"{}\" ran {}s past its expected end, killing it.",
                    self.filename,
                    OVERRUN_GRACE.as_secs()
                );
                kill_and_wait(process.as_mut()).await;
                self.fail().await;
            }
        }
    }

    async fn fail(&self) {
        if self.transition(SessionState::Active, SessionState::Failed) {
            self.remove_output().await;
            self.finalized.send_replace(true);
        }
    }

    fn log_tag_outcome(&self, outcome: &TagOutcome) {
        let Some(failure) = outcome.failure() else {
            tracing::debug!("Tagged \"{}\"", self.filename);
            return;
        };
        if matches!(outcome, TagOutcome::TaggedWithoutCover(_)) {
            tracing::warn!("Tagged \"{}\" without cover art: {}", self.filename, failure);
        } else {
            tracing::warn!("Keeping \"{}\" untagged: {}", self.filename, failure);
        }
    }

    /// Best-effort removal of the output file
    async fn remove_output(&self) {
        tracing::info!("Removing \"{}\"...", self.filename);
        match tokio::fs::remove_file(&self.output_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Unable to remove file {:?}. Does not exist.", self.output_path);
            }
            Err(e) => tracing::warn!("Failed to remove {:?}: {}", self.output_path, e),
        }
    }
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("id", &self.id)
            .field("filename", &self.filename)
            .field("state", &self.state())
            .field("end_time", &self.end_time)
            .finish()
    }
}

/// `created_at` plus `seconds`, saturating at the latest representable time
fn expected_end(created_at: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    // the cast saturates at i64::MAX
    let millis = (seconds.max(0.0) * 1000.0).round() as i64;
    created_at
        .checked_add_signed(chrono::Duration::milliseconds(millis))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Kill `process` and wait a bounded time for it to exit
async fn kill_and_wait(process: &mut dyn CaptureProcess) -> Option<CaptureExit> {
    if let Err(e) = process.kill() {
        tracing::debug!("Kill request failed: {}", e);
    }
    match tokio::time::timeout(KILL_GRACE, process.wait()).await {
        Ok(Ok(exit)) => Some(exit),
        Ok(Err(e)) => {
            tracing::warn!("Failed to wait for killed capture: {}", e);
            None
        }
        Err(_) => {
            tracing::error!(
                "Capture process {:?} did not exit within {}s of being killed",
                process.id(),
                KILL_GRACE.as_secs()
            );
            None
        }
    }
}
