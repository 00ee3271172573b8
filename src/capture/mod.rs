//! Capture process plumbing
//!
//! Rendering the configured capture command and supervising the external
//! encoder it starts.

pub mod command;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{render_command, CommandLauncher, CommandValues};
pub use traits::{CaptureExit, CaptureLauncher, CaptureProcess};
