//! Line-oriented notification source
//!
//! Reads one JSON-encoded `PropertiesChanged` payload per line and forwards
//! the decoded notifications, in order, over a bounded channel.

use super::types::{Notification, PropertiesChanged};
use crate::utils::AppResult;
use std::io::{BufRead, BufReader, Read};
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 64;

/// Decode a single line. Blank lines decode to `None`.
pub fn decode_line(line: &str) -> AppResult<Option<Notification>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let changed: PropertiesChanged = serde_json::from_str(line)?;
    Ok(changed.into_notification())
}

/// Read notifications from standard input
pub fn spawn_stdin_source() -> std::io::Result<mpsc::Receiver<Notification>> {
    spawn_line_reader(std::io::stdin())
}

/// Spawn a reader over `reader`.
///
/// A pending blocking read cannot be cancelled, so the reader runs on a
/// detached thread that never holds up shutdown. The returned receiver
/// closes when the reader reaches end of input.
pub fn spawn_line_reader<R>(reader: R) -> std::io::Result<mpsc::Receiver<Notification>>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

    std::thread::Builder::new()
        .name("notification-reader".to_string())
        .spawn(move || {
            for line in BufReader::new(reader).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("Failed to read notification input: {}", e);
                        break;
                    }
                };
                if let Some(notification) = decode_or_log(&line) {
                    if tx.blocking_send(notification).is_err() {
                        break;
                    }
                }
            }
            tracing::info!("Notification source closed");
        })?;

    Ok(rx)
}

fn decode_or_log(line: &str) -> Option<Notification> {
    match decode_line(line) {
        Ok(Some(notification)) => Some(notification),
        Ok(None) => {
            tracing::debug!("Ignoring notification without playback information");
            None
        }
        Err(e) => {
            tracing::warn!("Dropping undecodable notification: {}", e);
            None
        }
    }
}
