use std::time::Duration;
use std::str::FromStr;
use anyhow::{Result, Context};

/// Parses `2s`, `750ms`, `1m 30s`, or a bare number of seconds.
pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let trimmed = duration_str.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    humantime::Duration::from_str(trimmed)
        .map(Duration::from)
        .with_context(|| format!("Invalid duration: {}", duration_str))
}
