//! Runtime configuration
//!
//! Command-line arguments and the immutable settings value derived from them.

use crate::utils::{AppError, AppResult};
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_NAME_PATTERN: &str = "@artist - @album - @trackNumber - @title";

pub const DEFAULT_COMMAND: &str = "ffmpeg -y -hide_banner -loglevel error -ss @delay -f pulse -ac 2 -ar 44100 -i @sink -c:a libmp3lame -qscale:a 3 -filter:a silenceremove=start_periods=1:start_duration=1:start_threshold=0:detection=peak -t @length @file";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36";

/// Command-line arguments for drainify
#[derive(Parser, Debug, Clone)]
#[command(name = "drainify")]
#[command(about = "Record tracks played by an MPRIS media player via PulseAudio")]
#[command(version)]
pub struct Args {
    /// Directory for storing files (default: current directory)
    #[arg(long, env = "DRAINIFY_DIR")]
    pub dir: Option<PathBuf>,

    /// File name pattern for recordings
    #[arg(long, default_value = DEFAULT_NAME_PATTERN, env = "DRAINIFY_NAME")]
    pub name: String,

    /// PulseAudio sink to record from
    #[arg(long, env = "DRAINIFY_SINK")]
    pub sink: String,

    /// Seconds to wait after switching tracks before starting to record
    #[arg(long, default_value_t = 2.0, env = "DRAINIFY_DELAY")]
    pub delay: f64,

    /// Capture command. Placeholders: @sink, @length, @delay, @file
    #[arg(long, default_value = DEFAULT_COMMAND, env = "DRAINIFY_COMMAND")]
    pub command: String,

    /// User-Agent for cover art downloads. Empty disables downloads.
    #[arg(long, default_value = DEFAULT_USER_AGENT, env = "DRAINIFY_USERAGENT")]
    pub useragent: String,

    /// File extension of recordings
    #[arg(long, default_value = "mp3", env = "DRAINIFY_EXTENSION")]
    pub extension: String,
}

/// Immutable settings shared by the coordinator and its sessions
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub output_directory: PathBuf,
    pub name_pattern: String,
    pub command: String,
    pub sink: String,
    /// Nominal inter-track delay in seconds
    pub delay_seconds: f64,
    pub user_agent: Option<String>,
    pub extension: String,
}

impl Settings {
    /// Whether the capture command skips the delay itself
    pub fn command_consumes_delay(&self) -> bool {
        self.command.contains("@delay")
    }

    fn validate(&self) -> AppResult<()> {
        if self.sink.trim().is_empty() {
            return Err(AppError::Config("sink must not be empty".to_string()));
        }
        if !self.delay_seconds.is_finite() || self.delay_seconds < 0.0 {
            return Err(AppError::Config(format!(
                "delay must be a non-negative number of seconds, got {}",
                self.delay_seconds
            )));
        }
        if !self.command.contains("@file") {
            return Err(AppError::Template(
                "capture command must contain @file".to_string(),
            ));
        }
        if self.extension.is_empty() || self.extension.contains(['/', '\\']) {
            return Err(AppError::Config(format!(
                "invalid file extension {:?}",
                self.extension
            )));
        }
        Ok(())
    }
}

impl Args {
    /// Resolve the output directory and build validated settings.
    ///
    /// A missing output directory is created.
    pub fn into_settings(self) -> AppResult<Settings> {
        let dir = match self.dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        if !dir.exists() {
            tracing::info!("Creating output directory {:?}", dir);
            std::fs::create_dir_all(&dir)?;
        }
        let output_directory = std::fs::canonicalize(&dir)?;

        let user_agent = Some(self.useragent).filter(|ua| !ua.trim().is_empty());

        let settings = Settings {
            output_directory,
            name_pattern: self.name,
            command: self.command,
            sink: self.sink,
            delay_seconds: self.delay,
            user_agent,
            extension: self.extension.trim_start_matches('.').to_string(),
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(dir: PathBuf) -> Args {
        Args::parse_from([
            "drainify",
            "--sink",
            "combined.monitor",
            "--dir",
            dir.to_str().unwrap(),
        ])
    }

    #[test]
    fn test_defaults() {
        let dir = tempdir().unwrap();
        let settings = args(dir.path().to_path_buf()).into_settings().unwrap();

        assert_eq!(settings.name_pattern, DEFAULT_NAME_PATTERN);
        assert_eq!(settings.delay_seconds, 2.0);
        assert_eq!(settings.extension, "mp3");
        assert!(settings.user_agent.is_some());
        assert!(settings.command_consumes_delay());
        assert!(settings.output_directory.is_absolute());
    }

    #[test]
    fn test_missing_directory_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let settings = args(nested.clone()).into_settings().unwrap();
        assert!(nested.is_dir());
        assert_eq!(settings.output_directory, std::fs::canonicalize(nested).unwrap());
    }

    #[test]
    fn test_empty_user_agent_disables_cover_art() {
        let dir = tempdir().unwrap();
        let mut a = args(dir.path().to_path_buf());
        a.useragent = String::new();
        assert!(a.into_settings().unwrap().user_agent.is_none());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let dir = tempdir().unwrap();

        let mut a = args(dir.path().to_path_buf());
        a.delay = -1.0;
        assert!(matches!(a.into_settings(), Err(AppError::Config(_))));

        let mut a = args(dir.path().to_path_buf());
        a.command = "ffmpeg -i @sink out.mp3".to_string();
        assert!(matches!(a.into_settings(), Err(AppError::Template(_))));
    }
}
