/// Configuration loading from TOML file with environment overrides
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Result, SyncError};
use crate::types::Config;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| SyncError::ConfigError(format!("Failed to read config file: {}", e)))?;

    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config)?;

    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content)
        .map_err(|e| SyncError::ConfigError(format!("Failed to parse config: {}", e)))
}

/// Overlay deployment secrets and endpoints from the environment
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let set = |key: &str, target: &mut String| {
        if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
            *target = value.trim().to_string();
        }
    };

    set("IDENTITY_URL", &mut config.endpoints.identity_url);
    set("TELEMETRY_URL", &mut config.endpoints.telemetry_url);
    set("INGEST_URL", &mut config.endpoints.ingest_url);
    set("AUTH_USERNAME", &mut config.credentials.username);
    set("AUTH_PASSWORD", &mut config.credentials.password);
    set("AUTH_DOMAIN", &mut config.credentials.domain);

    if let Some(grain) = lookup("GRANULARITY").and_then(|v| v.trim().parse::<u64>().ok()) {
        config.sync.resume_granularity = grain;
    }
}

fn validate_config(config: &Config) -> Result<()> {
    // Validate endpoints
    if config.endpoints.identity_url.is_empty() {
        return Err(SyncError::ConfigError("endpoints.identity_url is empty".to_string()));
    }
    if config.endpoints.telemetry_url.is_empty() {
        return Err(SyncError::ConfigError("endpoints.telemetry_url is empty".to_string()));
    }
    if config.endpoints.ingest_url.is_empty() {
        return Err(SyncError::ConfigError("endpoints.ingest_url is empty".to_string()));
    }

    // Validate tracked metrics
    if config.sync.tracked_metrics.is_empty() {
        return Err(SyncError::ConfigError("sync.tracked_metrics is empty".to_string()));
    }
    let mut seen = HashSet::new();
    for metric in &config.sync.tracked_metrics {
        if !seen.insert(metric.as_str()) {
            return Err(SyncError::ConfigError(format!(
                "Duplicate tracked metric: {}",
                metric
            )));
        }
    }

    // Validate granularities
    if config.sync.initial_granularity == 0 || config.sync.resume_granularity == 0 {
        return Err(SyncError::ConfigError("Granularity must be > 0".to_string()));
    }

    if config.request_timeout_sec == 0 {
        return Err(SyncError::ConfigError("request_timeout_sec must be > 0".to_string()));
    }

    Ok(())
}
