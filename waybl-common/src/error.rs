use std::path::PathBuf;
use thiserror::Error;

/// Main error type for waybl operations
#[derive(Error, Debug)]
pub enum WayblError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Window manager IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Blur generation error: {0}")]
    Blur(#[from] BlurError),

    #[error("Wallpaper error: {0}")]
    Apply(#[from] ApplyError),

    #[error("Process execution error: {0}")]
    Process(#[from] ProcessError),
}

/// Startup configuration errors. These are the only fatal ones.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Failed to create cache directory: {path:?}")]
    CacheDir { path: PathBuf, source: std::io::Error },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("No wallpaper given")]
    NoWallpaper,
}

/// Transport errors talking to the window manager
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Neither SWAYSOCK nor I3SOCK is set")]
    SocketNotFound,

    #[error("Failed to connect to window manager socket: {path:?}")]
    Connection { path: PathBuf, source: std::io::Error },

    #[error("IPC transport failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected IPC frame: {message}")]
    InvalidFrame { message: String },

    #[error("Failed to decode IPC payload: {message}")]
    Decode { message: String },

    #[error("Window manager rejected the event subscription")]
    SubscriptionRejected,
}

/// Blurred image generation errors
#[derive(Error, Debug)]
pub enum BlurError {
    #[error("Source wallpaper does not exist: {path:?}")]
    SourceMissing { path: PathBuf },

    #[error("Failed to prepare cached image {path:?}")]
    CacheFile { path: PathBuf, source: std::io::Error },

    #[error("Image processing failed for {output}: {source}")]
    Render { output: String, source: ProcessError },
}

/// Wallpaper application errors
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Image does not exist: {path:?}")]
    MissingImage { path: PathBuf },

    #[error("Wallpaper for {output} could not be set after {attempts} attempts: {last}")]
    Exhausted {
        output: String,
        attempts: u32,
        last: ProcessError,
    },
}

/// Process execution errors
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Command execution failed: {command:?}")]
    Execution { command: String, source: std::io::Error },

    #[error("Command returned non-zero exit code: {code}")]
    NonZeroExit { code: i32, stderr: String },
}

pub type Result<T> = std::result::Result<T, WayblError>;

impl From<serde_json::Error> for WayblError {
    fn from(err: serde_json::Error) -> Self {
        WayblError::Ipc(IpcError::Decode {
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for WayblError {
    fn from(err: std::io::Error) -> Self {
        WayblError::Ipc(IpcError::Io(err))
    }
}

// Error reporting utilities
pub trait ErrorReporting {
    fn log_error(&self, context: &str);
    fn user_friendly_message(&self) -> String;
}

impl ErrorReporting for WayblError {
    fn log_error(&self, context: &str) {
        log::error!("{}: {}", context, self.user_friendly_message());
    }

    fn user_friendly_message(&self) -> String {
        match self {
            WayblError::Config(ConfigError::NoHomeDir) => {
                "Could not determine your home directory. Pass --cache-dir explicitly.".to_string()
            }
            WayblError::Config(ConfigError::CacheDir { path, source }) => {
                format!("Cannot create cache directory {:?}: {}", path, source)
            }
            WayblError::Config(ConfigError::NoWallpaper) => {
                "No wallpaper given. Pass a path or <output>:<path>.".to_string()
            }
            WayblError::Ipc(IpcError::SocketNotFound) => {
                "sway IPC socket not found. Is sway running?".to_string()
            }
            WayblError::Blur(BlurError::SourceMissing { path }) => {
                format!("Wallpaper not found: {:?}", path)
            }
            WayblError::Blur(BlurError::Render {
                output,
                source: ProcessError::Execution { .. },
            }) => {
                format!("Could not run ImageMagick for {}. Is it installed?", output)
            }
            WayblError::Process(ProcessError::NonZeroExit { code, stderr }) => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    format!("Command returned non-zero exit code: {}", code)
                } else {
                    format!("Command returned non-zero exit code {}: {}", code, stderr)
                }
            }
            _ => self.to_string(),
        }
    }
}
