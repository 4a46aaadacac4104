use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, WayblError};

const DEFAULT_BLUR: &str = "0x2";
const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// ImageMagick blur geometry, `<radius>[x<sigma>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlurSettings {
    radius: String,
}

impl BlurSettings {
    pub fn radius(&self) -> &str {
        &self.radius
    }
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            radius: DEFAULT_BLUR.to_string(),
        }
    }
}

impl FromStr for BlurSettings {
    type Err = WayblError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            WayblError::Config(ConfigError::InvalidValue {
                field: "blur".to_string(),
                value: s.to_string(),
            })
        };
        let is_amount = |part: &str| part.parse::<f32>().map(|v| v.is_finite() && v >= 0.0).unwrap_or(false);

        let s = s.trim();
        let valid = match s.split_once('x') {
            Some((radius, sigma)) => is_amount(radius) && is_amount(sigma),
            None => is_amount(s),
        };
        if !valid {
            return Err(invalid());
        }

        Ok(Self {
            radius: s.to_string(),
        })
    }
}

impl fmt::Display for BlurSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.radius)
    }
}

/// How often and how far apart wallpaper application is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

/// Source wallpaper per output, with an optional global fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputWallpapers {
    per_output: HashMap<String, PathBuf>,
    global: Option<PathBuf>,
}

impl OutputWallpapers {
    pub fn new(per_output: HashMap<String, PathBuf>, global: Option<PathBuf>) -> Self {
        Self { per_output, global }
    }

    pub fn source_for(&self, output: &str) -> Option<&Path> {
        self.per_output
            .get(output)
            .or(self.global.as_ref())
            .map(PathBuf::as_path)
    }

    pub fn is_empty(&self) -> bool {
        self.per_output.is_empty() && self.global.is_none()
    }

    pub fn global(&self) -> Option<&Path> {
        self.global.as_deref()
    }

    pub fn overrides(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.per_output.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }
}
