//! Configuration loader: merges defaults, config.toml, .env and environment.

use common::config::RideConfig;
use common::{ActorRole, Error};
use std::path::Path;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::Config(format!("{env_name} must be an integer > 0"))),
    }
}

fn validate_config(config: &RideConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    let base = config.base_url.trim();
    if base.is_empty() {
        issues.push("base_url must not be empty".into());
    } else if !base.starts_with("http://") && !base.starts_with("https://") {
        issues.push("base_url must start with http:// or https://".into());
    }

    let endpoints = [
        ("endpoints.current_rides", &config.endpoints.current_rides),
        ("endpoints.accepted_requests", &config.endpoints.accepted_requests),
        ("endpoints.status_refresh", &config.endpoints.status_refresh),
        ("endpoints.update_status", &config.endpoints.update_status),
        ("endpoints.cancel_ride", &config.endpoints.cancel_ride),
        ("endpoints.active_requests", &config.endpoints.active_requests),
        ("endpoints.accept_requests", &config.endpoints.accept_requests),
    ];
    for (name, path) in endpoints {
        if path.trim().is_empty() {
            issues.push(format!("{name} must not be empty"));
        }
    }

    if config.timing.request_timeout_secs == 0 {
        issues.push("timing.request_timeout_secs must be > 0".into());
    }
    if config.timing.request_timeout_secs > 120 {
        issues.push("timing.request_timeout_secs must be <= 120".into());
    }
    if config.timing.poll_interval_secs == 0 {
        issues.push("timing.poll_interval_secs must be > 0".into());
    }

    if config.limits.refresh_concurrency == 0 {
        issues.push("limits.refresh_concurrency must be > 0".into());
    }
    if config.limits.reads_per_sec == 0 {
        issues.push("limits.reads_per_sec must be > 0".into());
    }
    if config.limits.writes_per_sec == 0 {
        issues.push("limits.writes_per_sec must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

fn apply_env_overrides(
    config: &mut RideConfig,
    var: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(url) = var("SENIORGO_API_BASE_URL") {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            tracing::warn!("Ignoring empty SENIORGO_API_BASE_URL override");
        } else {
            config.base_url = trimmed.to_string();
        }
    }
    if let Some(email) = var("SENIORGO_ACTOR_EMAIL") {
        config.actor_email = email.trim().to_string();
    }
    if let Some(role) = var("SENIORGO_ACTOR_ROLE") {
        config.actor_role = ActorRole::parse(&role).ok_or_else(|| {
            Error::Config("SENIORGO_ACTOR_ROLE must be one of: senior, volunteer, admin".into())
        })?;
    }
    if let Some(raw) = var("SENIORGO_REQUEST_TIMEOUT_SECS") {
        config.timing.request_timeout_secs =
            parse_positive_u64(&raw, "SENIORGO_REQUEST_TIMEOUT_SECS")?;
    }
    if let Some(raw) = var("SENIORGO_POLL_INTERVAL_SECS") {
        config.timing.poll_interval_secs = parse_positive_u64(&raw, "SENIORGO_POLL_INTERVAL_SECS")?;
    }
    if let Some(raw) = var("SENIORGO_REFRESH_CONCURRENCY") {
        config.limits.refresh_concurrency =
            parse_positive_u64(&raw, "SENIORGO_REFRESH_CONCURRENCY")? as usize;
    }
    Ok(())
}

/// Load configuration from environment and optional config file.
pub fn load_config(config_path: &Path) -> Result<RideConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults, replaced by the config file if present.
    let mut config = RideConfig::default();
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    }

    // 3. Environment variables take priority.
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;
    Ok(config)
}
