//! Capture trait definitions
//!
//! The audio encode runs in an external process. These traits are the seam
//! between session supervision and however that process is started.

use crate::utils::AppResult;
use async_trait::async_trait;

/// How a capture process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureExit {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl CaptureExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for CaptureExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// A running capture process
#[async_trait]
pub trait CaptureProcess: Send {
    /// OS process id, if known
    fn id(&self) -> Option<u32>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> std::io::Result<CaptureExit>;

    /// Forcibly terminate the process without waiting
    fn kill(&mut self) -> std::io::Result<()>;
}

/// Starts capture processes from a rendered command line
pub trait CaptureLauncher: Send + Sync {
    fn launch(&self, argv: &[String]) -> AppResult<Box<dyn CaptureProcess>>;
}
