//! Config loader — reads `~/.pleasance/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.pleasance/config.json`
//! 3. Plain environment names used by the deployment scripts
//!    (`ANTHROPIC_BASE_URL`, `PLEASANCE_API`, `AGENT_SECRET`, `AGENT_ID`, `BATCH_SIZE`)
//! 4. Environment variables `PLEASANCE_<SECTION>__<FIELD>`

use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path (or `path`) + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    let config = load_config_from_path(&config_path);
    apply_env_overrides(config, |key| std::env::var(key).ok())
}

/// Load config from a specific file path, without env overrides.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return Config::default();
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return Config::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            Config::default()
        }
    }
}

/// Apply environment overrides, reading variables through `lookup`.
///
/// Supported overrides (plain names first, prefixed names win):
/// - `ANTHROPIC_BASE_URL`, `PLEASANCE_PROXY__BASE_URL` → `proxy.base_url`
/// - `PLEASANCE_PROXY__API_KEY` → `proxy.api_key`
/// - `PLEASANCE_PROXY__CALL_TIMEOUT_SECS` → `proxy.call_timeout_secs`
/// - `PLEASANCE_PROXY__HEALTH_TIMEOUT_SECS` → `proxy.health_timeout_secs`
/// - `PLEASANCE_API`, `PLEASANCE_CATALOG__BASE_URL` → `catalog.base_url`
/// - `AGENT_SECRET`, `PLEASANCE_CATALOG__AGENT_SECRET` → `catalog.agent_secret`
/// - `AGENT_ID`, `PLEASANCE_CATALOG__AGENT_ID` → `catalog.agent_id`
/// - `PLEASANCE_GENERATION__CHAIN` → `generation.chain`
/// - `PLEASANCE_REVIEW__CHAIN` → `review.chain`
/// - `BATCH_SIZE`, `PLEASANCE_BATCH__SIZE` → `batch.size`
/// - `PLEASANCE_BATCH__CONCURRENCY` → `batch.concurrency`
/// - `PLEASANCE_BATCH__DEADLINE_SECS` → `batch.deadline_secs`
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    let var = |names: &[&str]| -> Option<String> {
        names
            .iter()
            .rev()
            .find_map(|name| lookup(name).filter(|v| !v.is_empty()))
    };

    // Proxy
    if let Some(val) = var(&["ANTHROPIC_BASE_URL", "PLEASANCE_PROXY__BASE_URL"]) {
        config.proxy.base_url = val;
    }
    if let Some(val) = var(&["PLEASANCE_PROXY__API_KEY"]) {
        config.proxy.api_key = Some(val);
    }
    if let Some(n) = parsed(var(&["PLEASANCE_PROXY__CALL_TIMEOUT_SECS"])) {
        config.proxy.call_timeout_secs = n;
    }
    if let Some(n) = parsed(var(&["PLEASANCE_PROXY__HEALTH_TIMEOUT_SECS"])) {
        config.proxy.health_timeout_secs = n;
    }

    // Content API
    if let Some(val) = var(&["PLEASANCE_API", "PLEASANCE_CATALOG__BASE_URL"]) {
        config.catalog.base_url = val;
    }
    if let Some(val) = var(&["AGENT_SECRET", "PLEASANCE_CATALOG__AGENT_SECRET"]) {
        config.catalog.agent_secret = Some(val);
    }
    if let Some(val) = var(&["AGENT_ID", "PLEASANCE_CATALOG__AGENT_ID"]) {
        config.catalog.agent_id = val;
    }

    // Chains
    if let Some(val) = var(&["PLEASANCE_GENERATION__CHAIN"]) {
        config.generation.chain = val;
    }
    if let Some(val) = var(&["PLEASANCE_REVIEW__CHAIN"]) {
        config.review.chain = val;
    }

    // Batch
    if let Some(n) = parsed(var(&["BATCH_SIZE", "PLEASANCE_BATCH__SIZE"])) {
        config.batch.size = n;
    }
    if let Some(n) = parsed(var(&["PLEASANCE_BATCH__CONCURRENCY"])) {
        config.batch.concurrency = n;
    }
    if let Some(n) = parsed(var(&["PLEASANCE_BATCH__DEADLINE_SECS"])) {
        config.batch.deadline_secs = Some(n);
    }

    config
}

fn parsed<T: FromStr>(value: Option<String>) -> Option<T> {
    let value = value?;
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring unparsable numeric env value: {}", value);
            None
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
