use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};

use crate::export::ExportFormat;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_WINDOW_DAYS: i64 = 14;
pub const DEFAULT_CACHE_WINDOWS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Session settings, read from `TELEMETRY_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub api_base_url: String,
    pub api_token: Option<String>,
    /// Length of the initial trailing window, in days.
    pub window_days: i64,
    /// Windows kept per resource in the query cache.
    pub cache_windows: usize,
    /// Offset used to display ping timestamps.
    pub display_offset: FixedOffset,
    pub export_format: ExportFormat,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            window_days: DEFAULT_WINDOW_DAYS,
            cache_windows: DEFAULT_CACHE_WINDOWS,
            display_offset: Utc.fix(),
            export_format: ExportFormat::Kml,
        }
    }
}

impl ViewerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unset or empty keys keep their defaults; malformed values are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let offset_minutes: i32 = parse_var(&get, "TELEMETRY_DISPLAY_OFFSET_MINUTES", 0)?;
        let display_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::Invalid {
                key: "TELEMETRY_DISPLAY_OFFSET_MINUTES",
                value: offset_minutes.to_string(),
            })?;

        Ok(Self {
            api_base_url: get("TELEMETRY_API_BASE_URL").unwrap_or(defaults.api_base_url),
            api_token: get("TELEMETRY_API_TOKEN"),
            window_days: parse_var(&get, "TELEMETRY_WINDOW_DAYS", defaults.window_days)?.max(0),
            cache_windows: parse_var(&get, "TELEMETRY_CACHE_WINDOWS", defaults.cache_windows)?
                .max(1),
            display_offset,
            export_format: parse_var(&get, "TELEMETRY_EXPORT_FORMAT", defaults.export_format)?,
        })
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}
