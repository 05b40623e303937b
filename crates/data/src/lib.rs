pub mod http;
pub mod mock;

use std::sync::Arc;

use chrono::NaiveDate;
use storesight_core::config::{ExecutorConfig, ExecutorMode, PipelineConfig};
use storesight_core::DataExecutor;
use thiserror::Error;
use tracing::info;

pub use http::HttpExecutor;
pub use mock::{MockDataset, MockExecutor};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("executor.base_url is required for http mode")]
    MissingBaseUrl,
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Resolves `executor.mode` into the executor shared by every request.
pub fn build_executor(
    executor: &ExecutorConfig,
    pipeline: &PipelineConfig,
    anchor: NaiveDate,
) -> Result<Arc<dyn DataExecutor>, BuildError> {
    let built: Arc<dyn DataExecutor> = match executor.mode {
        ExecutorMode::Mock => Arc::new(
            MockExecutor::seeded(executor.mock_seed, anchor)
                .with_limits(pipeline.default_top_n, pipeline.row_cap),
        ),
        ExecutorMode::Http => {
            let base_url = executor.base_url.as_deref().ok_or(BuildError::MissingBaseUrl)?;
            Arc::new(HttpExecutor::new(base_url, &executor.api_version, executor.timeout_secs)?)
        }
    };

    info!(
        event_name = "data.executor.built",
        executor = built.name(),
        mode = executor.mode.as_str(),
        "data executor ready"
    );
    Ok(built)
}
