use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::intent::MAX_WINDOW_DAYS;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub executor: ExecutorConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
    pub stores: Vec<StoreConfig>,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    pub mode: ExecutorMode,
    pub base_url: Option<String>,
    pub api_version: String,
    pub timeout_secs: u64,
    pub mock_seed: u64,
}

/// Heuristic cutoffs and limits used by the query pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub default_window_days: u32,
    /// Longest window a question may ask for; longer ones are shortened.
    pub max_window_days: u32,
    pub high_confidence_days: u32,
    pub medium_confidence_days: u32,
    pub density_floor: u32,
    pub default_top_n: u32,
    pub row_cap: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub domain: String,
    pub access_token: SecretString,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorMode {
    Mock,
    Http,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub executor_mode: Option<ExecutorMode>,
    pub executor_base_url: Option<String>,
    pub executor_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub store_domain: Option<String>,
    pub store_access_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_window_days: 30,
            max_window_days: 3_650,
            high_confidence_days: 30,
            medium_confidence_days: 7,
            density_floor: 3,
            default_top_n: 5,
            row_cap: 100,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig {
                mode: ExecutorMode::Mock,
                base_url: None,
                api_version: "2024-01".to_string(),
                timeout_secs: 10,
                mock_seed: 42,
            },
            pipeline: PipelineConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            stores: vec![StoreConfig {
                domain: "demo-store.myshopify.com".to_string(),
                access_token: secret_value("mock-token".to_string()),
            }],
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for ExecutorMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "http" | "real" => Ok(Self::Http),
            other => Err(ConfigError::Validation(format!(
                "unsupported executor mode `{other}` (expected mock|http)"
            ))),
        }
    }
}

impl ExecutorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mock => "mock",
            Self::Http => "http",
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("storesight.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn find_store(&self, domain: &str) -> Option<&StoreConfig> {
        let wanted = domain.trim();
        self.stores.iter().find(|store| store.domain.eq_ignore_ascii_case(wanted))
    }

    fn upsert_store(&mut self, domain: String, access_token: SecretString) {
        match self.stores.iter_mut().find(|store| store.domain.eq_ignore_ascii_case(&domain)) {
            Some(existing) => existing.access_token = access_token,
            None => self.stores.push(StoreConfig { domain, access_token }),
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(executor) = patch.executor {
            if let Some(mode) = executor.mode {
                self.executor.mode = mode;
            }
            if let Some(base_url) = executor.base_url {
                self.executor.base_url = Some(base_url);
            }
            if let Some(api_version) = executor.api_version {
                self.executor.api_version = api_version;
            }
            if let Some(timeout_secs) = executor.timeout_secs {
                self.executor.timeout_secs = timeout_secs;
            }
            if let Some(mock_seed) = executor.mock_seed {
                self.executor.mock_seed = mock_seed;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(default_window_days) = pipeline.default_window_days {
                self.pipeline.default_window_days = default_window_days;
            }
            if let Some(high_confidence_days) = pipeline.high_confidence_days {
                self.pipeline.high_confidence_days = high_confidence_days;
            }
            if let Some(max_window_days) = pipeline.max_window_days {
                self.pipeline.max_window_days = max_window_days;
            }
            if let Some(medium_confidence_days) = pipeline.medium_confidence_days {
                self.pipeline.medium_confidence_days = medium_confidence_days;
            }
            if let Some(density_floor) = pipeline.density_floor {
                self.pipeline.density_floor = density_floor;
            }
            if let Some(default_top_n) = pipeline.default_top_n {
                self.pipeline.default_top_n = default_top_n;
            }
            if let Some(row_cap) = pipeline.row_cap {
                self.pipeline.row_cap = row_cap;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(stores) = patch.stores {
            self.stores = stores
                .into_iter()
                .map(|store| StoreConfig {
                    domain: store.domain,
                    access_token: secret_value(store.access_token),
                })
                .collect();
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STORESIGHT_EXECUTOR_MODE") {
            self.executor.mode = value.parse()?;
        }
        if let Some(value) = read_env("STORESIGHT_EXECUTOR_BASE_URL") {
            self.executor.base_url = Some(value);
        }
        if let Some(value) = read_env("STORESIGHT_EXECUTOR_API_VERSION") {
            self.executor.api_version = value;
        }
        if let Some(value) = read_env("STORESIGHT_EXECUTOR_TIMEOUT_SECS") {
            self.executor.timeout_secs = parse_u64("STORESIGHT_EXECUTOR_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("STORESIGHT_EXECUTOR_MOCK_SEED") {
            self.executor.mock_seed = parse_u64("STORESIGHT_EXECUTOR_MOCK_SEED", &value)?;
        }

        if let Some(value) = read_env("STORESIGHT_PIPELINE_DEFAULT_WINDOW_DAYS") {
            self.pipeline.default_window_days =
                parse_u32("STORESIGHT_PIPELINE_DEFAULT_WINDOW_DAYS", &value)?;
        }
        if let Some(value) = read_env("STORESIGHT_PIPELINE_MAX_WINDOW_DAYS") {
            self.pipeline.max_window_days =
                parse_u32("STORESIGHT_PIPELINE_MAX_WINDOW_DAYS", &value)?;
        }
        if let Some(value) = read_env("STORESIGHT_PIPELINE_HIGH_CONFIDENCE_DAYS") {
            self.pipeline.high_confidence_days =
                parse_u32("STORESIGHT_PIPELINE_HIGH_CONFIDENCE_DAYS", &value)?;
        }
        if let Some(value) = read_env("STORESIGHT_PIPELINE_MEDIUM_CONFIDENCE_DAYS") {
            self.pipeline.medium_confidence_days =
                parse_u32("STORESIGHT_PIPELINE_MEDIUM_CONFIDENCE_DAYS", &value)?;
        }
        if let Some(value) = read_env("STORESIGHT_PIPELINE_DENSITY_FLOOR") {
            self.pipeline.density_floor = parse_u32("STORESIGHT_PIPELINE_DENSITY_FLOOR", &value)?;
        }
        if let Some(value) = read_env("STORESIGHT_PIPELINE_DEFAULT_TOP_N") {
            self.pipeline.default_top_n = parse_u32("STORESIGHT_PIPELINE_DEFAULT_TOP_N", &value)?;
        }
        if let Some(value) = read_env("STORESIGHT_PIPELINE_ROW_CAP") {
            self.pipeline.row_cap = parse_u32("STORESIGHT_PIPELINE_ROW_CAP", &value)?;
        }

        if let Some(value) = read_env("STORESIGHT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("STORESIGHT_SERVER_PORT") {
            self.server.port = parse_u16("STORESIGHT_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("STORESIGHT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("STORESIGHT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let store_domain = read_env("STORESIGHT_STORE_DOMAIN");
        let store_token = read_env("STORESIGHT_STORE_ACCESS_TOKEN");
        match (store_domain, store_token) {
            (Some(domain), Some(token)) => self.upsert_store(domain, secret_value(token)),
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::Validation(
                    "STORESIGHT_STORE_DOMAIN and STORESIGHT_STORE_ACCESS_TOKEN must be set together"
                        .to_string(),
                ));
            }
            (None, None) => {}
        }

        let log_level =
            read_env("STORESIGHT_LOGGING_LEVEL").or_else(|| read_env("STORESIGHT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STORESIGHT_LOGGING_FORMAT").or_else(|| read_env("STORESIGHT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(mode) = overrides.executor_mode {
            self.executor.mode = mode;
        }
        if let Some(base_url) = overrides.executor_base_url {
            self.executor.base_url = Some(base_url);
        }
        if let Some(timeout_secs) = overrides.executor_timeout_secs {
            self.executor.timeout_secs = timeout_secs;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let (Some(domain), Some(token)) =
            (overrides.store_domain, overrides.store_access_token)
        {
            self.upsert_store(domain, secret_value(token));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_executor(&self.executor)?;
        validate_pipeline(&self.pipeline)?;
        validate_server(&self.server)?;
        validate_stores(&self.stores)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("storesight.toml"), PathBuf::from("config/storesight.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_executor(executor: &ExecutorConfig) -> Result<(), ConfigError> {
    if executor.timeout_secs == 0 || executor.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "executor.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if executor.mode == ExecutorMode::Http {
        let Some(base_url) = executor.base_url.as_deref().map(str::trim) else {
            return Err(ConfigError::Validation(
                "executor.base_url is required when executor.mode = \"http\"".to_string(),
            ));
        };
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Validation(
                "executor.base_url must start with http:// or https://".to_string(),
            ));
        }
        if executor.api_version.trim().is_empty() {
            return Err(ConfigError::Validation(
                "executor.api_version must not be empty in http mode".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.default_window_days == 0 {
        return Err(ConfigError::Validation(
            "pipeline.default_window_days must be greater than zero".to_string(),
        ));
    }

    if pipeline.max_window_days < pipeline.default_window_days
        || pipeline.max_window_days > MAX_WINDOW_DAYS
    {
        return Err(ConfigError::Validation(format!(
            "pipeline.max_window_days must be in range pipeline.default_window_days..={MAX_WINDOW_DAYS}"
        )));
    }

    if pipeline.medium_confidence_days == 0
        || pipeline.medium_confidence_days > pipeline.high_confidence_days
    {
        return Err(ConfigError::Validation(
            "pipeline.medium_confidence_days must be in range 1..=pipeline.high_confidence_days"
                .to_string(),
        ));
    }

    if pipeline.density_floor == 0 {
        return Err(ConfigError::Validation(
            "pipeline.density_floor must be greater than zero".to_string(),
        ));
    }

    if pipeline.row_cap == 0 || pipeline.row_cap > 1_000 {
        return Err(ConfigError::Validation(
            "pipeline.row_cap must be in range 1..=1000".to_string(),
        ));
    }

    if pipeline.default_top_n == 0 || pipeline.default_top_n > pipeline.row_cap {
        return Err(ConfigError::Validation(
            "pipeline.default_top_n must be in range 1..=pipeline.row_cap".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_stores(stores: &[StoreConfig]) -> Result<(), ConfigError> {
    for (index, store) in stores.iter().enumerate() {
        let domain = store.domain.trim();
        if domain.is_empty() {
            return Err(ConfigError::Validation(format!("stores[{index}].domain is required")));
        }
        if domain.contains('/') || domain.contains(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "stores[{index}].domain must be a bare host name like `shop.myshopify.com`"
            )));
        }
        if store.access_token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "stores[{index}].access_token is required for `{domain}`"
            )));
        }

        let duplicate =
            stores[..index].iter().any(|other| other.domain.trim().eq_ignore_ascii_case(domain));
        if duplicate {
            return Err(ConfigError::Validation(format!(
                "stores[{index}].domain `{domain}` is registered more than once"
            )));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    executor: Option<ExecutorPatch>,
    pipeline: Option<PipelinePatch>,
    server: Option<ServerPatch>,
    stores: Option<Vec<StorePatch>>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct ExecutorPatch {
    mode: Option<ExecutorMode>,
    base_url: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
    mock_seed: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    default_window_days: Option<u32>,
    max_window_days: Option<u32>,
    high_confidence_days: Option<u32>,
    medium_confidence_days: Option<u32>,
    density_floor: Option<u32>,
    default_top_n: Option<u32>,
    row_cap: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct StorePatch {
    domain: String,
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
