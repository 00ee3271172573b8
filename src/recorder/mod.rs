//! Recording system module
//!
//! - `RecordingSession` captures one track and owns its capture process
//! - `SessionRegistry` keeps sessions in arrival order
//! - `RecordingCoordinator` turns playback notifications into sessions

pub mod coordinator;
pub mod filename;
pub mod registry;
pub mod session;
pub mod state;

pub use coordinator::RecordingCoordinator;
pub use registry::SessionRegistry;
pub use session::{RecordingSession, SessionContext};
pub use state::{SessionState, SkipReason, StartOutcome};
