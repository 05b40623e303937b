use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use storesight_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => render(&config),
        Err(error) => format!("config validation failed: {error}"),
    }
}

/// Effective values with the layer each one came from. Store tokens are
/// redacted to their prefix.
pub fn render(config: &AppConfig) -> String {
    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, Some(env_key), config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let executor = &config.executor;
    let pipeline = &config.pipeline;
    let fields = [
        ("executor.mode", executor.mode.as_str().to_string(), "STORESIGHT_EXECUTOR_MODE"),
        (
            "executor.base_url",
            executor.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            "STORESIGHT_EXECUTOR_BASE_URL",
        ),
        ("executor.api_version", executor.api_version.clone(), "STORESIGHT_EXECUTOR_API_VERSION"),
        (
            "executor.timeout_secs",
            executor.timeout_secs.to_string(),
            "STORESIGHT_EXECUTOR_TIMEOUT_SECS",
        ),
        ("executor.mock_seed", executor.mock_seed.to_string(), "STORESIGHT_EXECUTOR_MOCK_SEED"),
        (
            "pipeline.default_window_days",
            pipeline.default_window_days.to_string(),
            "STORESIGHT_PIPELINE_DEFAULT_WINDOW_DAYS",
        ),
        (
            "pipeline.max_window_days",
            pipeline.max_window_days.to_string(),
            "STORESIGHT_PIPELINE_MAX_WINDOW_DAYS",
        ),
        (
            "pipeline.high_confidence_days",
            pipeline.high_confidence_days.to_string(),
            "STORESIGHT_PIPELINE_HIGH_CONFIDENCE_DAYS",
        ),
        (
            "pipeline.medium_confidence_days",
            pipeline.medium_confidence_days.to_string(),
            "STORESIGHT_PIPELINE_MEDIUM_CONFIDENCE_DAYS",
        ),
        (
            "pipeline.density_floor",
            pipeline.density_floor.to_string(),
            "STORESIGHT_PIPELINE_DENSITY_FLOOR",
        ),
        (
            "pipeline.default_top_n",
            pipeline.default_top_n.to_string(),
            "STORESIGHT_PIPELINE_DEFAULT_TOP_N",
        ),
        ("pipeline.row_cap", pipeline.row_cap.to_string(), "STORESIGHT_PIPELINE_ROW_CAP"),
        (
            "server.bind_address",
            config.server.bind_address.clone(),
            "STORESIGHT_SERVER_BIND_ADDRESS",
        ),
        ("server.port", config.server.port.to_string(), "STORESIGHT_SERVER_PORT"),
        (
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            "STORESIGHT_SERVER_GRACEFUL_SHUTDOWN_SECS",
        ),
        ("logging.level", config.logging.level.clone(), "STORESIGHT_LOGGING_LEVEL"),
        ("logging.format", config.logging.format.as_str().to_string(), "STORESIGHT_LOGGING_FORMAT"),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        fields.iter().map(|(key, value, env_key)| render_line(key, value, source(key, env_key))),
    );

    let stores_source = source("stores", "STORESIGHT_STORE_DOMAIN");
    for store in &config.stores {
        let token = redact_token(store.access_token.expose_secret());
        lines.push(render_line(
            &format!("stores[{}].access_token", store.domain),
            &token,
            stores_source.clone(),
        ));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("storesight.toml"), PathBuf::from("config/storesight.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

pub fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once(['-', '_']) {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
