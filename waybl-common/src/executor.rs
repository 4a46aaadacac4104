use std::fmt;
use std::future::Future;
use std::path::PathBuf;

use crate::error::{ProcessError, WayblError};
use crate::Result;

/// A program and its arguments, kept as plain data so it can be logged and inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
}

/// Runs external commands. Success means a zero exit status.
pub trait CommandRunner: Send + Sync + 'static {
    fn run(&self, command: ExternalCommand) -> impl Future<Output = Result<CommandOutput>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }

    fn build(command: &ExternalCommand) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);

        // Set environment variables from current session, with fallbacks
        if let Ok(display) = std::env::var("WAYLAND_DISPLAY") {
            cmd.env("WAYLAND_DISPLAY", display);
        } else {
            cmd.env("WAYLAND_DISPLAY", "wayland-0");
        }

        if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
            cmd.env("XDG_RUNTIME_DIR", runtime_dir);
        } else {
            let uid = rustix::process::getuid();
            cmd.env("XDG_RUNTIME_DIR", format!("/run/user/{}", uid.as_raw()));
        }

        if let Ok(socket) = std::env::var("SWAYSOCK") {
            cmd.env("SWAYSOCK", socket);
        }

        cmd
    }
}

impl CommandRunner for ProcessExecutor {
    fn run(&self, command: ExternalCommand) -> impl Future<Output = Result<CommandOutput>> + Send {
        async move {
            log::debug!("Executing command: {}", command);

            let output = Self::build(&command)
                .output()
                .await
                .map_err(|e| {
                    WayblError::Process(ProcessError::Execution {
                        command: command.to_string(),
                        source: e,
                    })
                })?;

            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            if !stdout.trim().is_empty() {
                log::debug!("{} stdout: {}", command.program_name(), stdout.trim());
            }

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                log::debug!(
                    "{} failed with exit code {}: {}",
                    command.program_name(),
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                );
                return Err(WayblError::Process(ProcessError::NonZeroExit {
                    code: output.status.code().unwrap_or(-1),
                    stderr,
                }));
            }

            Ok(CommandOutput { stdout })
        }
    }
}
