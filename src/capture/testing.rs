//! In-process capture doubles for lifecycle tests

use super::traits::{CaptureExit, CaptureLauncher, CaptureProcess};
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;

/// Handle to one fake process
#[derive(Clone)]
pub struct FakeHandle {
    pub argv: Vec<String>,
    exit_tx: Arc<watch::Sender<Option<CaptureExit>>>,
    killed: Arc<Mutex<bool>>,
}

impl FakeHandle {
    /// Make the process exit with `code`
    pub fn exit(&self, code: i32) {
        let _ = self.exit_tx.send(Some(CaptureExit { code: Some(code) }));
    }

    pub fn was_killed(&self) -> bool {
        *self.killed.lock()
    }
}

struct FakeProcess {
    exit_rx: watch::Receiver<Option<CaptureExit>>,
    killed: Arc<Mutex<bool>>,
    /// When false, a kill is recorded but the process keeps running
    obeys_kill: bool,
}

#[async_trait]
impl CaptureProcess for FakeProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    async fn wait(&mut self) -> std::io::Result<CaptureExit> {
        if self.obeys_kill && *self.killed.lock() {
            return Ok(CaptureExit { code: None });
        }
        let exit = *self
            .exit_rx
            .wait_for(|exit| exit.is_some())
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::BrokenPipe, "handle dropped"))?;
        Ok(exit.unwrap_or(CaptureExit { code: None }))
    }

    fn kill(&mut self) -> std::io::Result<()> {
        *self.killed.lock() = true;
        Ok(())
    }
}

/// Launcher recording every launch and handing out controllable processes
#[derive(Default)]
pub struct FakeLauncher {
    launched: Mutex<Vec<FakeHandle>>,
    fail: Mutex<bool>,
    ignore_kills: Mutex<bool>,
}

impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make subsequent launches fail to spawn
    pub fn fail_launches(&self) {
        *self.fail.lock() = true;
    }

    /// Make subsequently launched processes survive being killed
    pub fn ignore_kills(&self) {
        *self.ignore_kills.lock() = true;
    }

    pub fn launched(&self) -> Vec<FakeHandle> {
        self.launched.lock().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launched.lock().len()
    }
}

impl CaptureLauncher for FakeLauncher {
    fn launch(&self, argv: &[String]) -> AppResult<Box<dyn CaptureProcess>> {
        if *self.fail.lock() {
            return Err(AppError::Capture("spawn refused".to_string()));
        }
        let (exit_tx, exit_rx) = watch::channel(None);
        let killed = Arc::new(Mutex::new(false));
        self.launched.lock().push(FakeHandle {
            argv: argv.to_vec(),
            exit_tx: Arc::new(exit_tx),
            killed: Arc::clone(&killed),
        });
        Ok(Box::new(FakeProcess {
            exit_rx,
            killed,
            obeys_kill: !*self.ignore_kills.lock(),
        }))
    }
}
