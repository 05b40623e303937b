use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use storesight_agent::{QueryPipeline, ReferenceDate};
use storesight_core::config::{AppConfig, ConfigError, ExecutorMode};
use storesight_data::{build_executor, BuildError};
use thiserror::Error;
use tracing::info;

/// Shared by every gateway request.
pub struct Application {
    pub config: AppConfig,
    pub pipeline: QueryPipeline,
}

pub type AppState = Arc<Application>;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("data executor construction failed: {0}")]
    Executor(#[from] BuildError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<AppState, BootstrapError> {
    build_application(config, Utc::now().date_naive()).map(Arc::new)
}

/// Builds the executor anchored at `anchor`. The mock dataset is generated
/// backwards from that date, so mock pipelines keep it as their reference date.
pub fn build_application(
    config: AppConfig,
    anchor: NaiveDate,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        executor_mode = config.executor.mode.as_str(),
        stores = config.stores.len(),
        "starting application bootstrap"
    );

    let executor = build_executor(&config.executor, &config.pipeline, anchor)?;
    let reference_date = match config.executor.mode {
        ExecutorMode::Mock => ReferenceDate::Fixed(anchor),
        ExecutorMode::Http => ReferenceDate::Today,
    };
    let pipeline = QueryPipeline::new(
        executor,
        config.pipeline.clone(),
        Duration::from_secs(config.executor.timeout_secs),
    )
    .with_reference_date(reference_date);
    info!(
        event_name = "system.bootstrap.pipeline_ready",
        correlation_id = "bootstrap",
        executor = pipeline.executor_name(),
        "query pipeline constructed"
    );

    Ok(Application { config, pipeline })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use storesight_agent::ReferenceDate;
    use storesight_core::config::{AppConfig, ConfigOverrides, ExecutorMode, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, build_application, BootstrapError};

    #[test]
    fn mock_pipeline_keeps_the_dataset_anchor_as_reference_date() {
        let anchor = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap_or_default();
        let app = build_application(AppConfig::default(), anchor).expect("bootstrap");
        assert_eq!(app.pipeline.reference_date(), ReferenceDate::Fixed(anchor));
    }

    #[test]
    fn http_pipeline_follows_the_wall_clock() {
        let mut config = AppConfig::default();
        config.executor.mode = ExecutorMode::Http;
        config.executor.base_url = Some("http://127.0.0.1:9".to_string());

        let anchor = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap_or_default();
        let app = build_application(config, anchor).expect("bootstrap");
        assert_eq!(app.pipeline.reference_date(), ReferenceDate::Today);
    }

    #[test]
    fn default_config_bootstraps_mock_pipeline() {
        let app = bootstrap_with_config(AppConfig::default()).expect("bootstrap");
        assert_eq!(app.pipeline.executor_name(), "mock");
        assert!(app.config.find_store("demo-store.myshopify.com").is_some());
    }

    #[test]
    fn http_mode_without_base_url_fails_fast() {
        let mut config = AppConfig::default();
        config.executor.mode = ExecutorMode::Http;

        let error = bootstrap_with_config(config).err().expect("bootstrap should fail");
        assert!(matches!(error, BootstrapError::Executor(_)));
        assert!(error.to_string().contains("executor.base_url"));
    }

    #[test]
    fn config_validation_errors_surface_as_config_failures() {
        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                executor_mode: Some(ExecutorMode::Http),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .map_err(BootstrapError::from)
        .err()
        .expect("validation should fail");

        assert!(matches!(error, BootstrapError::Config(_)));
        assert!(error.to_string().contains("executor.base_url"));
    }
}
