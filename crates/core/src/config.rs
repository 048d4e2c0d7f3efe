use std::env;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Result, SpanweaveError};
use crate::model::log::LogLevel;

/// Ambient settings for the standard logger chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub min_level: LogLevel,
    pub sampling_rate: f64,
    pub include_context: bool,
    pub include_span: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Debug,
            sampling_rate: 1.0,
            include_context: true,
            include_span: true,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file at `SPANWEAVE_CONFIG` (if any), then
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(file_overrides) = load_file_overrides()? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        apply_overrides(&mut cfg, load_env_overrides(), "environment")?;
        Ok(cfg)
    }

    /// Defaults plus environment overrides only.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        apply_overrides(&mut cfg, load_env_overrides(), "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    min_level: Option<String>,
    sampling_rate: Option<f64>,
    include_context: Option<bool>,
    include_span: Option<bool>,
}

fn load_file_overrides() -> Result<Option<ConfigOverrides>> {
    let Ok(path) = env::var("SPANWEAVE_CONFIG") else {
        return Ok(None);
    };
    let path = PathBuf::from(path);
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(&path)
        .map_err(|e| SpanweaveError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| SpanweaveError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> ConfigOverrides {
    ConfigOverrides {
        min_level: env::var("SPANWEAVE_MIN_LEVEL").ok(),
        sampling_rate: env::var("SPANWEAVE_SAMPLING_RATE")
            .ok()
            .and_then(|v| v.parse().ok()),
        include_context: env::var("SPANWEAVE_INCLUDE_CONTEXT")
            .ok()
            .map(|v| parse_bool(&v)),
        include_span: env::var("SPANWEAVE_INCLUDE_SPAN")
            .ok()
            .map(|v| parse_bool(&v)),
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.min_level {
        cfg.min_level = LogLevel::from_str(&v).map_err(|e| {
            SpanweaveError::Config(format!("bad min_level in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.sampling_rate {
        if !(0.0..=1.0).contains(&v) {
            return Err(SpanweaveError::Config(format!(
                "bad sampling_rate in {source}: must be within [0, 1] (value={v})"
            )));
        }
        cfg.sampling_rate = v;
    }
    if let Some(v) = overrides.include_context {
        cfg.include_context = v;
    }
    if let Some(v) = overrides.include_span {
        cfg.include_span = v;
    }
    Ok(())
}
