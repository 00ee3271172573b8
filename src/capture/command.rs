//! Command template rendering and process launching
//!
//! The capture command is a whitespace-separated template. Placeholders are
//! substituted per token so an output path containing spaces stays a single
//! argument.

use super::traits::{CaptureExit, CaptureLauncher, CaptureProcess};
use crate::utils::{AppError, AppResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Values substituted into the capture command template
#[derive(Debug, Clone)]
pub struct CommandValues<'a> {
    pub sink: &'a str,
    pub length_seconds: f64,
    pub delay_seconds: f64,
    pub output_path: &'a Path,
}

/// Render `template` into an argument vector
pub fn render_command(template: &str, values: &CommandValues<'_>) -> AppResult<Vec<String>> {
    let length = format!("{:.2}", values.length_seconds);
    let delay = format!("{:.2}", values.delay_seconds);
    let file = values.output_path.to_string_lossy();

    let argv: Vec<String> = template
        .split_whitespace()
        .map(|token| {
            token
                .replace("@length", &length)
                .replace("@sink", values.sink)
                .replace("@delay", &delay)
                .replace("@file", &file)
        })
        .collect();

    if argv.is_empty() {
        return Err(AppError::Template("capture command is empty".to_string()));
    }
    Ok(argv)
}

/// Launches capture commands as child processes
#[derive(Debug, Default, Clone)]
pub struct CommandLauncher;

impl CommandLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureLauncher for CommandLauncher {
    fn launch(&self, argv: &[String]) -> AppResult<Box<dyn CaptureProcess>> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| AppError::Template("capture command is empty".to_string()))?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Capture(format!("Failed to start {}: {}", program, e)))?;

        Ok(Box::new(ChildProcess { child }))
    }
}

/// `tokio::process::Child` as a capture process
struct ChildProcess {
    child: Child,
}

#[async_trait]
impl CaptureProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> std::io::Result<CaptureExit> {
        let status = self.child.wait().await?;
        Ok(CaptureExit { code: status.code() })
    }

    fn kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn values(path: &Path) -> CommandValues<'_> {
        CommandValues {
            sink: "combined.monitor",
            length_seconds: 180.0,
            delay_seconds: 2.0,
            output_path: path,
        }
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let path = PathBuf::from("/music/Daft Punk - Discovery - 1 - One More Time.mp3");
        let argv = render_command(
            "ffmpeg -ss @delay -f pulse -i @sink -t @length @file",
            &values(&path),
        )
        .unwrap();

        assert_eq!(
            argv,
            vec![
                "ffmpeg",
                "-ss",
                "2.00",
                "-f",
                "pulse",
                "-i",
                "combined.monitor",
                "-t",
                "180.00",
                "/music/Daft Punk - Discovery - 1 - One More Time.mp3",
            ]
        );
    }

    #[test]
    fn test_render_placeholder_inside_token() {
        let path = PathBuf::from("/tmp/x.mp3");
        let argv = render_command("enc --out=@file --dur=@length", &values(&path)).unwrap();
        assert_eq!(argv[1], "--out=/tmp/x.mp3");
        assert_eq!(argv[2], "--dur=180.00");
    }

    #[test]
    fn test_render_empty_template() {
        let path = PathBuf::from("/tmp/x.mp3");
        assert!(matches!(
            render_command("   ", &values(&path)),
            Err(AppError::Template(_))
        ));
    }

    #[tokio::test]
    async fn test_launch_missing_program() {
        let result = CommandLauncher::new().launch(&["drainify-no-such-program".to_string()]);
        assert!(matches!(result, Err(AppError::Capture(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_codes() {
        let launcher = CommandLauncher::new();

        let mut ok = launcher.launch(&["true".to_string()]).unwrap();
        assert!(ok.wait().await.unwrap().success());

        let mut failed = launcher.launch(&["false".to_string()]).unwrap();
        let exit = failed.wait().await.unwrap();
        assert!(!exit.success());
        assert_eq!(exit.code, Some(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_kill_running_process() {
        let launcher = CommandLauncher::new();
        let mut process = launcher
            .launch(&["sleep".to_string(), "30".to_string()])
            .unwrap();
        assert!(process.id().is_some());

        process.kill().unwrap();
        let exit = process.wait().await.unwrap();
        assert_eq!(exit.code, None);
    }
}
