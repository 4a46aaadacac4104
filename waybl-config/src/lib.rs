use clap::Parser;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use waybl_common::{
    error::ConfigError, BlurSettings, OutputWallpapers, Result, RetryPolicy, WayblError,
};

const CACHE_DIR_NAME: &str = ".waybl";

#[derive(Parser, Debug)]
#[command(name = "waybl")]
#[command(about = "waybl (blur the wallpaper of outputs with nothing on them)")]
#[command(version = "0.1.0")]
pub struct Args {
    /// Wallpaper for all outputs, or <output>:<path> for a single output
    #[arg(value_name = "WALLPAPER")]
    pub wallpapers: Vec<String>,

    /// ImageMagick blur geometry, <radius>[x<sigma>]
    #[arg(short, long, default_value = "0x2")]
    pub blur: String,

    /// Where blurred wallpapers are kept (default: ~/.waybl)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Pause between attempts to set a wallpaper
    #[arg(long, value_name = "DURATION", default_value = "2s")]
    pub retry_delay: String,
}

/// Runtime configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub wallpapers: OutputWallpapers,
    pub blur: BlurSettings,
    pub cache_dir: PathBuf,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Self> {
        let mut per_output = HashMap::new();
        let mut global = None;

        for arg in &args.wallpapers {
            match arg.split_once(':') {
                Some((output, path)) => {
                    if output.is_empty() || path.is_empty() {
                        return Err(invalid("wallpaper", arg));
                    }
                    per_output.insert(output.to_string(), expand_path(path));
                }
                None => {
                    if global.is_some() {
                        log::warn!("More than one global wallpaper given, using {}", arg);
                    }
                    global = Some(expand_path(arg));
                }
            }
        }

        let wallpapers = OutputWallpapers::new(per_output, global);
        if wallpapers.is_empty() {
            return Err(WayblError::Config(ConfigError::NoWallpaper));
        }

        let blur = args.blur.parse::<BlurSettings>()?;
        let retry_delay = waybl_common::parse_duration(&args.retry_delay)
            .map_err(|_| invalid("retry-delay", &args.retry_delay))?;

        let cache_dir = match args.cache_dir {
            Some(dir) => expand_path(&dir.to_string_lossy()),
            None => Self::default_cache_dir()?,
        };

        let config = Self {
            wallpapers,
            blur,
            cache_dir,
            retry: RetryPolicy::with_delay(retry_delay),
        };
        config.log_summary();
        Ok(config)
    }

    fn default_cache_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(WayblError::Config(ConfigError::NoHomeDir))?;
        Ok(home.join(CACHE_DIR_NAME))
    }

    /// Creates the cache directory if needed.
    pub fn ensure_cache_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| {
            WayblError::Config(ConfigError::CacheDir {
                path: self.cache_dir.clone(),
                source: e,
            })
        })?;
        log::debug!("Cache directory: {:?}", self.cache_dir);
        Ok(())
    }

    fn log_summary(&self) {
        if let Some(global) = self.wallpapers.global() {
            log::info!("Global wallpaper: {:?}", global);
        }
        for (output, path) in self.wallpapers.overrides() {
            log::info!("Wallpaper for {}: {:?}", output, path);
        }
        log::info!("Blur: {}", self.blur);
    }
}

fn invalid(field: &str, value: &str) -> WayblError {
    WayblError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Expands `$VAR`, `${VAR}` and a leading `~`, then makes the path absolute.
pub fn expand_path(raw: &str) -> PathBuf {
    let expanded = expand_env(raw, |name| env::var(name).ok());
    let path = expand_home(&expanded, dirs::home_dir().as_deref());
    std::path::absolute(&path).unwrap_or(path)
}

fn expand_home(raw: &str, home: Option<&Path>) -> PathBuf {
    match (raw.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home.to_path_buf(),
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(rest.trim_start_matches('/')),
        _ => PathBuf::from(raw),
    }
}

// Unknown variables expand to nothing.
fn expand_env<F>(raw: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, remainder) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], &braced[end + 1..]),
                None => {
                    // unterminated, keep it literally
                    out.push('$');
                    rest = after;
                    continue;
                }
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], &after[end..])
        };

        if name.is_empty() {
            out.push('$');
        } else if let Some(value) = lookup(name) {
            out.push_str(&value);
        }
        rest = remainder;
    }

    out.push_str(rest);
    out
}
